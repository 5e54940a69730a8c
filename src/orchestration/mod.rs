//! # Orchestration
//!
//! Coordinates the write-then-publish flow: state tracking for each run and
//! the pipeline that sequences validation, storage, and event publication
//! under the configured strategy.

pub mod states;
pub mod write_pipeline;

pub use states::WriteState;
pub use write_pipeline::{PublishStrategy, WriteError, WriteOutcome, WritePipeline};
