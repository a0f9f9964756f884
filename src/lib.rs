// Library exports for the spot-the-difference generator

// Core modules
pub mod core;
pub mod orchestration;
pub mod phases;
pub mod utils;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{ArchiveError, ConfigError, PipelineError, PipelineResult, SettingsError},
    settings::Settings,
    types::{BoundingBox, Centroid, DiffResult, DimensionPolicy, DistanceMetric, Region},
};

pub use orchestration::{process, process_images, process_with, DiffOrchestrator, PipelineOptions};

pub use utils::Metrics;
