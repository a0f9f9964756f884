pub mod config;
pub mod errors;
pub mod settings;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    ArchiveError, ConfigError, DataUrlError, ImageRole, PipelineError, PipelineResult,
    SettingsError,
};
pub use settings::Settings;
pub use types::{
    BoundingBox, Centroid, DiffResult, DifferenceMask, DimensionPolicy, DistanceMetric,
    RawComponent, Region,
};
