/// Batch pipeline
///
/// This module handles:
/// - Resolving per-item naming and structured fields (item.rs)
/// - The progress reporter and its signal protocol (progress.rs)
/// - Driving items through extraction, statistics and output (orchestrator.rs)

pub mod item;
pub mod orchestrator;
pub mod progress;

pub use item::{ItemResult, RunMode};
pub use orchestrator::{BatchOrchestrator, RunSummary};
