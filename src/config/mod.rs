use std::env;
use std::fmt;
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level process configuration, sourced from the environment and `.env`.
///
/// Business parameters (margins, cycles, thresholds) live in the JSON document
/// loaded by [`crate::workflows::outreach::BusinessConfig`]; this struct only
/// tells the binary where to find things and how loudly to log.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub paths: PathConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let business_config = env::var("CRM_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.json"));
        if business_config.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath {
                variable: "CRM_CONFIG_PATH",
            });
        }

        let output_dir = match env::var("CRM_OUTPUT_DIR") {
            Ok(value) if value.trim().is_empty() => {
                return Err(ConfigError::EmptyPath {
                    variable: "CRM_OUTPUT_DIR",
                })
            }
            Ok(value) => Some(PathBuf::from(value)),
            Err(_) => None,
        };

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            paths: PathConfig {
                business_config,
                output_dir,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Filesystem locations used by the batch job.
#[derive(Debug, Clone)]
pub struct PathConfig {
    pub business_config: PathBuf,
    pub output_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Resolves a report file name against the configured output directory.
    pub fn output_file(&self, file_name: &str) -> Option<PathBuf> {
        self.output_dir.as_ref().map(|dir| dir.join(file_name))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    EmptyPath { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyPath { variable } => {
                write!(f, "{variable} must not be empty when set")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("CRM_CONFIG_PATH");
        env::remove_var("CRM_OUTPUT_DIR");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.paths.business_config, PathBuf::from("config.json"));
        assert!(config.paths.output_dir.is_none());
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn output_dir_resolves_report_files() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        env::set_var("CRM_OUTPUT_DIR", "/tmp/crm-reports");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(
            config.paths.output_file("actions.json"),
            Some(PathBuf::from("/tmp/crm-reports/actions.json"))
        );
        reset_env();
    }

    #[test]
    fn rejects_blank_output_dir() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CRM_OUTPUT_DIR", "  ");
        let err = AppConfig::load().expect_err("blank dir rejected");
        assert!(err.to_string().contains("CRM_OUTPUT_DIR"));
        reset_env();
    }
}
