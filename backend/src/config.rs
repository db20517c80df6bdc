use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub schedule: ScheduleConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS.
    pub frontend_url: String,
    /// Upper bound for a single request, including a generation run.
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Whether the background worker periodically calls `generate(false)`.
    pub auto_generate: bool,
    /// How often (seconds) the worker checks whether regeneration is due.
    pub check_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for the generate endpoint
    pub generate_per_second: u32,
    /// Burst size for the generate endpoint
    pub generate_burst: u32,
}

fn parse_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or(defaults.server.host),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL").unwrap_or(defaults.server.frontend_url),
                request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.server.request_timeout_seconds),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.database.max_connections),
            },
            schedule: ScheduleConfig {
                auto_generate: parse_bool("SCHEDULE_AUTO_GENERATE", defaults.schedule.auto_generate),
                check_interval_seconds: env::var("SCHEDULE_CHECK_INTERVAL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.schedule.check_interval_seconds),
            },
            rate_limit: RateLimitConfig {
                generate_per_second: env::var("RATE_LIMIT_GENERATE_PER_SECOND")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.rate_limit.generate_per_second),
                generate_burst: env::var("RATE_LIMIT_GENERATE_BURST")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.rate_limit.generate_burst),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
                request_timeout_seconds: 60,
            },
            database: DatabaseConfig {
                url: "sqlite://data/eod_scheduler.db".to_string(),
                max_connections: 5,
            },
            schedule: ScheduleConfig {
                auto_generate: true,
                check_interval_seconds: 60 * 60,
            },
            rate_limit: RateLimitConfig {
                generate_per_second: 1,
                generate_burst: 5,
            },
        }
    }
}
