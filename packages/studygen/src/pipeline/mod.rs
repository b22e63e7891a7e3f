//! The content-preservation pipeline.

pub mod controller;
pub mod facts;
pub mod patch;
pub mod prompts;
pub mod verify;

pub use controller::{
    ChapterInput, ChapterSink, Pipeline, RestructureOptions, RestructuredGuide, RunOutcome,
};
pub use verify::{VerifierReport, ALL_PRESENT_SENTINEL, MISSING_MARKER};
