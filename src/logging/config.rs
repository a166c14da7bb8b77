use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Logging settings derived from `ENVIRONMENT`, `LOG_LEVEL` and `LOG_DIR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub environment: String,
    pub level: String,
    pub directory: String,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var("ENVIRONMENT").ok(),
            std::env::var("LOG_LEVEL").ok(),
            std::env::var("LOG_DIR").ok(),
        )
    }

    pub fn resolve(
        environment: Option<String>,
        level: Option<String>,
        directory: Option<String>,
    ) -> Self {
        let environment = environment.unwrap_or_else(|| "development".to_string());
        let production = environment == "production";
        Self {
            level: level.unwrap_or_else(|| if production { "info" } else { "debug" }.to_string()),
            directory: directory.unwrap_or_else(|| "logs".to_string()),
            format: if production {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
            environment,
        }
    }

    /// Default filter directive when `RUST_LOG` is unset.
    pub fn filter_directive(&self) -> String {
        format!(
            "casestudy_backend={},tower_http=debug,axum=debug",
            self.level
        )
    }
}
