//! Ingestion daemon: file-ready gating, the batch/watch loop, and the
//! remote mirror.

pub mod mirror;
pub mod ready;
pub mod runner;

pub use mirror::RemoteMirror;
pub use runner::{IngestRunner, RunnerOptions};
