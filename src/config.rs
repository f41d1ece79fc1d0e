//! Application-level configuration loading: listener, store backend and quiz pacing.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVEQUIZ_BACK_CONFIG_PATH";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_JOIN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TRANSITION_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    server: ServerConfig,
    store: StoreConfig,
    quiz: QuizConfig,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        backend = app_config.store.backend_name(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document.
    pub fn from_json_str(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// HTTP listener settings.
    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    /// Selected persistence backend.
    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    /// Quiz pacing and submission policy.
    pub fn quiz(&self) -> &QuizConfig {
        &self.quiz
    }

    /// Same configuration with different quiz settings.
    pub fn with_quiz(mut self, quiz: QuizConfig) -> Self {
        self.quiz = quiz;
        self
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port bound on all interfaces.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

/// Persistence backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process-local maps, optionally primed from a seed file.
    Memory {
        /// JSON seed loaded at startup.
        #[serde(default)]
        seed_path: Option<PathBuf>,
    },
    /// MongoDB; unset fields fall back to `MONGO_URI` and `MONGO_DB`.
    Mongodb {
        /// Connection string.
        #[serde(default)]
        uri: Option<String>,
        /// Database name.
        #[serde(default)]
        database: Option<String>,
    },
}

impl StoreConfig {
    /// Short name used in logs.
    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreConfig::Memory { .. } => "memory",
            StoreConfig::Mongodb { .. } => "mongodb",
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory { seed_path: None }
    }
}

/// Quiz pacing and submission policy.
#[derive(Debug, Clone)]
pub struct QuizConfig {
    /// Delay between two countdown ticks.
    pub tick_interval: Duration,
    /// Refuse answers once the question's countdown expired.
    pub reject_late_answers: bool,
    /// How long a fresh connection may stay silent before joining an event.
    pub join_timeout: Duration,
    /// Upper bound for one lifecycle transition, store writes included.
    pub transition_timeout: Duration,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            reject_late_answers: true,
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECS),
            transition_timeout: Duration::from_millis(DEFAULT_TRANSITION_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    store: StoreConfig,
    #[serde(default)]
    quiz: RawQuizConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawQuizConfig {
    tick_interval_ms: Option<u64>,
    reject_late_answers: Option<bool>,
    join_timeout_secs: Option<u64>,
    transition_timeout_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            server: value.server,
            store: value.store,
            quiz: value.quiz.into(),
        }
    }
}

impl From<RawQuizConfig> for QuizConfig {
    fn from(value: RawQuizConfig) -> Self {
        let defaults = QuizConfig::default();

        let tick_interval = match value.tick_interval_ms {
            Some(0) => {
                warn!("quiz.tick_interval_ms must be positive; using default");
                defaults.tick_interval
            }
            Some(ms) => Duration::from_millis(ms),
            None => defaults.tick_interval,
        };

        Self {
            tick_interval,
            reject_late_answers: value
                .reject_late_answers
                .unwrap_or(defaults.reject_late_answers),
            join_timeout: value
                .join_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.join_timeout),
            transition_timeout: value
                .transition_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.transition_timeout),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config.server().port, DEFAULT_PORT);
        assert_eq!(config.store().backend_name(), "memory");
        assert_eq!(config.quiz().tick_interval, Duration::from_secs(1));
        assert!(config.quiz().reject_late_answers);
    }

    #[test]
    fn sections_are_read() {
        let config = AppConfig::from_json_str(
            r#"{
                "server": { "port": 9000 },
                "store": { "backend": "mongodb", "uri": "mongodb://db:27017", "database": "quiz" },
                "quiz": { "tick_interval_ms": 250, "reject_late_answers": false, "join_timeout_secs": 5 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.server().port, 9000);
        match config.store() {
            StoreConfig::Mongodb { uri, database } => {
                assert_eq!(uri.as_deref(), Some("mongodb://db:27017"));
                assert_eq!(database.as_deref(), Some("quiz"));
            }
            other => panic!("unexpected store {other:?}"),
        }
        assert_eq!(config.quiz().tick_interval, Duration::from_millis(250));
        assert!(!config.quiz().reject_late_answers);
        assert_eq!(config.quiz().join_timeout, Duration::from_secs(5));
        assert_eq!(config.quiz().transition_timeout, Duration::from_secs(5));
    }

    #[test]
    fn zero_tick_interval_is_replaced() {
        let config = AppConfig::from_json_str(r#"{ "quiz": { "tick_interval_ms": 0 } }"#).unwrap();
        assert_eq!(config.quiz().tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(AppConfig::from_json_str(r#"{ "store": { "backend": "redis" } }"#).is_err());
    }

    #[test]
    fn bundled_example_parses() {
        let config = AppConfig::from_json_str(include_str!("../config/app.example.json")).unwrap();
        assert!(matches!(
            config.store(),
            StoreConfig::Memory { seed_path: Some(_) }
        ));
    }
}
