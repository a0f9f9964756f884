use crate::core::errors::ConfigError;
use crate::core::types::{DimensionPolicy, DistanceMetric};
use std::env;
use std::str::FromStr;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Request limits
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Upload ceiling for one request (both images together)
    pub max_upload_bytes: usize,
    /// Pipeline runs allowed at once; each occupies a blocking thread
    pub max_concurrent_jobs: usize,
}

/// Pipeline behaviour that is fixed per deployment rather than per request
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dimension_policy: DimensionPolicy,
    pub distance_metric: DistanceMetric,
}

/// Output encoding configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub jpeg_quality: u8,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let dimension_policy = match env::var("DIMENSION_POLICY") {
            Ok(s) => DimensionPolicy::from_str(&s)?,
            Err(_) => DimensionPolicy::default(),
        };

        let distance_metric = match env::var("DISTANCE_METRIC") {
            Ok(s) => DistanceMetric::from_str(&s)?,
            Err(_) => DistanceMetric::default(),
        };

        Ok(Self {
            server: ServerConfig {
                port: parse_var("SERVER_PORT")?.unwrap_or(8085),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            limits: LimitsConfig {
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES")?.unwrap_or(100 * 1024 * 1024),
                max_concurrent_jobs: parse_var("MAX_CONCURRENT_JOBS")?
                    .unwrap_or_else(num_cpus::get),
            },
            pipeline: PipelineConfig {
                dimension_policy,
                distance_metric,
            },
            output: OutputConfig {
                jpeg_quality: parse_var("JPEG_QUALITY")?.unwrap_or(90),
            },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidUploadLimit(self.limits.max_upload_bytes));
        }

        if self.limits.max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidJobLimit(self.limits.max_concurrent_jobs));
        }

        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(ConfigError::InvalidJpegQuality(self.output.jpeg_quality));
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.limits.max_upload_bytes
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.limits.max_concurrent_jobs
    }

    pub fn dimension_policy(&self) -> DimensionPolicy {
        self.pipeline.dimension_policy
    }

    pub fn distance_metric(&self) -> DistanceMetric {
        self.pipeline.distance_metric
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.output.jpeg_quality
    }
}

impl Default for Config {
    /// Built-in defaults without reading the environment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8085,
                host: "0.0.0.0".to_string(),
                log_level: Level::INFO,
            },
            limits: LimitsConfig {
                max_upload_bytes: 100 * 1024 * 1024,
                max_concurrent_jobs: num_cpus::get().max(1),
            },
            pipeline: PipelineConfig {
                dimension_policy: DimensionPolicy::default(),
                distance_metric: DistanceMetric::default(),
            },
            output: OutputConfig { jpeg_quality: 90 },
        }
    }
}

/// Parse an optional environment variable; a present but malformed value is an error
fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarError(format!("{}='{}'", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_upload_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.dimension_policy(), DimensionPolicy::Resample);
        assert_eq!(config.distance_metric(), DistanceMetric::Luma);
    }

    #[test]
    fn test_validation_rejects_bad_limits() {
        let mut config = Config::default();
        config.limits.max_concurrent_jobs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidJobLimit(0))));

        let mut config = Config::default();
        config.output.jpeg_quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidJpegQuality(0))));

        let mut config = Config::default();
        config.limits.max_upload_bytes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUploadLimit(0))));
    }
}
