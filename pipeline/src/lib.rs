//! Processing pipeline: uploads → face embeddings → identity clusters →
//! published albums.
//!
//! ```text
//! Upload ──save──▶ ImageRef ──filter──▶ FaceEmbedder::embed ──▶ cluster ──▶ Workspace::publish
//! ```
//!
//! Per-image failures are collected in the [`ProcessingReport`]; only a run
//! in which no image produced an embedding fails with
//! [`ProcessError::NoValidInput`].

mod config;
mod error;
mod processor;
mod report;

pub use config::ProcessorConfig;
pub use error::ProcessError;
pub use processor::Processor;
pub use report::{Assignment, ProcessingReport, SkipReason, SkippedImage, Upload};
