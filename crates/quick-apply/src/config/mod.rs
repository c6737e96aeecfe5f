use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub browser: BrowserConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let storage = StorageConfig {
            answers_path: env_path("ANSWERS_PATH", "answers.json"),
            ledger_path: env_path("JOBS_LEDGER_PATH", "jobs.json"),
        };

        let browser = BrowserConfig {
            webdriver_url: env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| "http://localhost:9515".to_string()),
            debugger_address: env::var("BROWSER_DEBUGGER_ADDRESS")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            job_url_template: env::var("JOB_URL_TEMPLATE")
                .unwrap_or_else(|_| DEFAULT_JOB_URL_TEMPLATE.to_string()),
        };

        let stall_threshold = u32::try_from(env_number("STALL_THRESHOLD", 1)?)
            .map_err(|_| ConfigError::InvalidNumber {
                key: "STALL_THRESHOLD",
            })?;
        if stall_threshold == 0 {
            return Err(ConfigError::InvalidStallThreshold);
        }

        let engine = EngineConfig {
            element_timeout: Duration::from_millis(env_number("ELEMENT_TIMEOUT_MS", 5_000)?),
            confirmation_timeout: Duration::from_millis(env_number(
                "CONFIRMATION_TIMEOUT_MS",
                5_000,
            )?),
            settle_delay: Duration::from_millis(env_number("SETTLE_DELAY_MS", 1_000)?),
            stall_threshold,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage,
            browser,
            engine,
        })
    }
}

const DEFAULT_JOB_URL_TEMPLATE: &str = "https://www.linkedin.com/jobs/view/{job_id}/";

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn env_number(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Locations of the JSON documents shared between runs.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub answers_path: PathBuf,
    pub ledger_path: PathBuf,
}

/// WebDriver endpoint and job page addressing.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub debugger_address: Option<String>,
    pub job_url_template: String,
}

impl BrowserConfig {
    /// Expands the job URL template for a posting id.
    pub fn job_url(&self, job_id: &str) -> String {
        self.job_url_template.replace("{job_id}", job_id)
    }
}

/// Bounded waits and the stall guard used by the application state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub element_timeout: Duration,
    pub confirmation_timeout: Duration,
    pub settle_delay: Duration,
    pub stall_threshold: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_secs(5),
            confirmation_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_secs(1),
            stall_threshold: 1,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidStallThreshold,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
            ConfigError::InvalidStallThreshold => {
                write!(f, "STALL_THRESHOLD must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidStallThreshold => None,
        }
    }
}

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
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "ANSWERS_PATH",
            "JOBS_LEDGER_PATH",
            "WEBDRIVER_URL",
            "BROWSER_DEBUGGER_ADDRESS",
            "JOB_URL_TEMPLATE",
            "ELEMENT_TIMEOUT_MS",
            "CONFIRMATION_TIMEOUT_MS",
            "SETTLE_DELAY_MS",
            "STALL_THRESHOLD",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.storage.answers_path, PathBuf::from("answers.json"));
        assert_eq!(config.browser.webdriver_url, "http://localhost:9515");
        assert!(config.browser.debugger_address.is_none());
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn rejects_zero_stall_threshold() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("STALL_THRESHOLD", "0");
        let err = AppConfig::load().expect_err("zero threshold rejected");
        assert!(matches!(err, ConfigError::InvalidStallThreshold));
        reset_env();
    }

    #[test]
    fn rejects_stall_threshold_beyond_u32() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("STALL_THRESHOLD", "4294967296");
        let err = AppConfig::load().expect_err("oversized threshold rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "STALL_THRESHOLD"
            }
        ));
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_timeouts() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ELEMENT_TIMEOUT_MS", "soon");
        let err = AppConfig::load().expect_err("bad timeout rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "ELEMENT_TIMEOUT_MS"
            }
        ));
        reset_env();
    }

    #[test]
    fn expands_job_url_template() {
        let browser = BrowserConfig {
            webdriver_url: "http://localhost:9515".to_string(),
            debugger_address: None,
            job_url_template: DEFAULT_JOB_URL_TEMPLATE.to_string(),
        };
        assert_eq!(
            browser.job_url("4012345678"),
            "https://www.linkedin.com/jobs/view/4012345678/"
        );
    }
}
