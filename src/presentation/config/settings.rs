use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub model: ModelSettings,
    pub sweep: SweepSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub history_interval: Duration,
    pub staging_interval: Duration,
}

impl Settings {
    /// All knobs come from the environment; unset variables fall back to
    /// development defaults.
    pub fn from_env() -> Self {
        Self {
            server: ServerSettings {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(3000),
            },
            storage: StorageSettings {
                base_dir: std::env::var("STORAGE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./data")),
            },
            model: ModelSettings {
                api_key: std::env::var("CLAUDE_API_KEY").unwrap_or_default(),
                model: std::env::var("CLAUDE_MODEL")
                    .unwrap_or_else(|_| "claude-3-haiku-20240307".to_string()),
            },
            sweep: SweepSettings {
                history_interval: Duration::from_secs(
                    std::env::var("HISTORY_SWEEP_SECS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(3600),
                ),
                staging_interval: Duration::from_secs(
                    std::env::var("STAGING_SWEEP_SECS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(3600),
                ),
            },
        }
    }
}
