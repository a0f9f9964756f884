pub mod diff_orchestrator;
pub mod pipeline;

pub use diff_orchestrator::DiffOrchestrator;
pub use pipeline::{process, process_images, process_with, run_timed, PipelineOptions, StageTimings};
