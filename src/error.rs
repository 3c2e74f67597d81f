use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading or validating ad schedule configuration.
///
/// The scheduler itself never fails; only the configuration surface does.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid ad break position {0} (expected 0, -1, or a positive number of seconds)")]
    InvalidPosition(f64),

    #[error("invalid play-ads-after time {0}")]
    InvalidThreshold(f64),
}
