//! Persistence models over sqlx/Postgres.
//!
//! Referential integrity on delete is enforced in code: children go
//! before parents, inside one transaction.

pub mod chapter;
pub mod flashcard;
pub mod pdf_chunk;
pub mod question;

pub use chapter::{Chapter, ChapterId, RESTRUCTURED_SOURCE_SUFFIX};
pub use flashcard::{Flashcard, Review};
pub use pdf_chunk::PdfChunk;
pub use question::{Attempt, Question};
