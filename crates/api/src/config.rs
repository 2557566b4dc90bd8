//! Application configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `SAGA_TIMEOUT_SECS` — age after which a `Started` saga is failed (default: `300`)
/// - `SAGA_MONITOR_PERIOD_SECS` — timeout scan interval (default: `60`)
/// - `ORDER_ADVANCE_PERIOD_SECS` — pending-to-processing job interval (default: `60`)
/// - `RATE_LIMIT_PER_MINUTE` — requests allowed per client per minute (default: `100`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub saga_timeout_secs: u64,
    pub saga_monitor_period_secs: u64,
    pub order_advance_period_secs: u64,
    pub rate_limit_per_minute: u64,
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parsed("PORT", 3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            saga_timeout_secs: env_parsed("SAGA_TIMEOUT_SECS", 300),
            saga_monitor_period_secs: env_parsed("SAGA_MONITOR_PERIOD_SECS", 60),
            order_advance_period_secs: env_parsed("ORDER_ADVANCE_PERIOD_SECS", 60),
            rate_limit_per_minute: env_parsed("RATE_LIMIT_PER_MINUTE", 100),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            saga_timeout_secs: 300,
            saga_monitor_period_secs: 60,
            order_advance_period_secs: 60,
            rate_limit_per_minute: 100,
        }
    }
}
