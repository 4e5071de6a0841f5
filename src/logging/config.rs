use serde::{Deserialize, Serialize};

/// Default directory for rolling log files
pub const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Logging settings resolved from `ENVIRONMENT`, `LOG_LEVEL` and `LOG_DIR`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub environment: String,
    pub level: LogLevel,
    pub dir: String,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let default_level = if environment == "production" {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };
        let level = lookup("LOG_LEVEL")
            .and_then(|s| s.parse().ok())
            .unwrap_or(default_level);
        let dir = lookup("LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_DIR.to_string());

        Self {
            environment,
            level,
            dir,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn filter_directive(&self) -> String {
        format!(
            "bloggen_backend={},tower_http=debug,axum=debug,sqlx=warn",
            self.level
        )
    }
}
