use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "HealthAI";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default listen address. The client suite points at `http://localhost:8000`.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

/// Default request body limit for image uploads (MB).
pub const DEFAULT_MAX_UPLOAD_MB: usize = 20;

const ENV_MODELS_DIR: &str = "HEALTHAI_MODELS_DIR";
const ENV_BIND: &str = "HEALTHAI_BIND";
const ENV_MAX_UPLOAD_MB: &str = "HEALTHAI_MAX_UPLOAD_MB";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "healthai_lib=info,healthai=info,tower_http=warn"
}

/// Get the application data directory (~/HealthAI/).
///
/// Falls back to the working directory when no home directory can be
/// resolved (containers running as a user without a passwd entry).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the models directory holding one folder per predictive task.
pub fn models_dir() -> PathBuf {
    app_data_dir().join("models")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value}")]
    InvalidBind { var: &'static str, value: String },
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Runtime configuration for the inference server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub models_dir: PathBuf,
    /// Maximum accepted request body in bytes (multipart image uploads).
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Factored out from `from_env` so tests never touch process-wide env vars.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBind {
                var: ENV_BIND,
                value: bind_raw.clone(),
            })?;

        let models_dir = lookup(ENV_MODELS_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(models_dir);

        let max_upload_mb = match lookup(ENV_MAX_UPLOAD_MB) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(mb) if mb > 0 => mb,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        var: ENV_MAX_UPLOAD_MB,
                        value: raw,
                    })
                }
            },
            None => DEFAULT_MAX_UPLOAD_MB,
        };

        Ok(Self {
            bind_addr,
            models_dir,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }
}
