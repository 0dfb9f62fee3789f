//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over the configured level. Output is human-readable
//! (`pretty`) or one JSON object per line (`json`), to stderr or a file.

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{ConfigError, LoggingConfig};

/// Filter used when `RUST_LOG` is not set
pub fn default_directives(level: &str) -> String {
    format!("bizdesk={level},tower_http={level}", level = level)
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(&config.level)))
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    let json = config.format.eq_ignore_ascii_case("json");

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match &config.file {
        Some(path) => {
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::Logging(e.to_string()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ConfigError::Logging(format!("{}: {}", path, e)))?;
            let writer = Mutex::new(file);
            if json {
                tracing_subscriber::fmt::layer().json().with_writer(writer).boxed()
            } else {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed()
            }
        }
        None => {
            if json {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .boxed()
            } else {
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .boxed()
            }
        }
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
