//! RadPrep server core.
//!
//! Axum HTTP server over the restructuring pipeline and the Postgres
//! study-content store (chapters, questions, flashcards, PDF chunks).

pub mod config;
pub mod models;
pub mod routes;
pub mod sink;
pub mod state;
