use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Sport Watch";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_HOST: &str = "SPORT_WATCH_HOST";
pub const ENV_PORT: &str = "SPORT_WATCH_PORT";
pub const ENV_DB: &str = "SPORT_WATCH_DB";
pub const ENV_SESSION_TTL_DAYS: &str = "SPORT_WATCH_SESSION_TTL_DAYS";
pub const ENV_PASSWORD_ITERATIONS: &str = "SPORT_WATCH_PASSWORD_ITERATIONS";
pub const ENV_CORS_ORIGINS: &str = "SPORT_WATCH_CORS_ORIGINS";

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SESSION_TTL_DAYS: i64 = 14;
/// PBKDF2-SHA256 work factor for new password hashes.
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 600_000;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "sport_watch=info,tower_http=warn"
}

/// Get the application data directory (`<data_dir>/sport-watch`).
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sport-watch")
}

/// Default database location.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("db.sqlite3")
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid {expected}: {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Runtime configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_ttl_days: i64,
    pub password_iterations: u32,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            db_path: default_db_path(),
            session_ttl_days: DEFAULT_SESSION_TTL_DAYS,
            password_iterations: DEFAULT_PASSWORD_ITERATIONS,
            cors_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &'static str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = match get(ENV_HOST) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: ENV_HOST,
                expected: "IP address",
                value: raw,
            })?,
            None => defaults.host,
        };

        let port = match get(ENV_PORT) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: ENV_PORT,
                expected: "port number",
                value: raw,
            })?,
            None => defaults.port,
        };

        let db_path = match get(ENV_DB) {
            Some(raw) => PathBuf::from(raw),
            None => {
                tracing::info!(path = %defaults.db_path.display(), "{ENV_DB} unset, using default");
                defaults.db_path
            }
        };

        let session_ttl_days = match get(ENV_SESSION_TTL_DAYS) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(days) if days > 0 => days,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: ENV_SESSION_TTL_DAYS,
                        expected: "positive number of days",
                        value: raw,
                    })
                }
            },
            None => defaults.session_ttl_days,
        };

        let password_iterations = match get(ENV_PASSWORD_ITERATIONS) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: ENV_PASSWORD_ITERATIONS,
                        expected: "positive iteration count",
                        value: raw,
                    })
                }
            },
            None => defaults.password_iterations,
        };

        let cors_origins = get(ENV_CORS_ORIGINS)
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            db_path,
            session_ttl_days,
            password_iterations,
            cors_origins,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
