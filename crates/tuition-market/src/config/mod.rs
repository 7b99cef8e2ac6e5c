use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

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

/// Top-level configuration for the marketplace service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub marketplace: MarketplaceConfig,
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

        let latest_limit = env::var("MARKET_LATEST_LIMIT")
            .unwrap_or_else(|_| MarketplaceConfig::DEFAULT_LATEST_LIMIT.to_string())
            .parse::<usize>()
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or(ConfigError::InvalidLatestLimit)?;

        let payment_currency = env::var("MARKET_PAYMENT_CURRENCY")
            .unwrap_or_else(|_| MarketplaceConfig::DEFAULT_CURRENCY.to_string())
            .trim()
            .to_ascii_lowercase();
        if payment_currency.len() != 3 || !payment_currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(ConfigError::InvalidCurrency(payment_currency));
        }

        let bootstrap_admin = env::var("MARKET_BOOTSTRAP_ADMIN")
            .ok()
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            marketplace: MarketplaceConfig {
                latest_limit,
                payment_currency,
                bootstrap_admin,
            },
        })
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

/// Tunables for the listing projections and payment hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketplaceConfig {
    pub latest_limit: usize,
    pub payment_currency: String,
    /// Email seeded as an Admin account at startup; Admins cannot self-register.
    pub bootstrap_admin: Option<String>,
}

impl MarketplaceConfig {
    pub const DEFAULT_LATEST_LIMIT: usize = 6;
    pub const DEFAULT_CURRENCY: &'static str = "bdt";
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            latest_limit: Self::DEFAULT_LATEST_LIMIT,
            payment_currency: Self::DEFAULT_CURRENCY.to_string(),
            bootstrap_admin: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLatestLimit,
    InvalidCurrency(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLatestLimit => {
                write!(f, "MARKET_LATEST_LIMIT must be a positive integer")
            }
            ConfigError::InvalidCurrency(value) => write!(
                f,
                "MARKET_PAYMENT_CURRENCY must be a three letter code, got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLatestLimit
            | ConfigError::InvalidCurrency(_) => None,
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
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("MARKET_LATEST_LIMIT");
        env::remove_var("MARKET_PAYMENT_CURRENCY");
        env::remove_var("MARKET_BOOTSTRAP_ADMIN");
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
        assert_eq!(config.marketplace, MarketplaceConfig::default());
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
    fn rejects_zero_latest_limit() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MARKET_LATEST_LIMIT", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidLatestLimit)
        ));
        reset_env();
    }

    #[test]
    fn normalises_payment_currency() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MARKET_PAYMENT_CURRENCY", " USD ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.marketplace.payment_currency, "usd");

        env::set_var("MARKET_PAYMENT_CURRENCY", "dollars");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidCurrency(_))
        ));
        reset_env();
    }

    #[test]
    fn blank_bootstrap_admin_is_ignored() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MARKET_BOOTSTRAP_ADMIN", "   ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.marketplace.bootstrap_admin, None);

        env::set_var("MARKET_BOOTSTRAP_ADMIN", " ops@example.com ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.marketplace.bootstrap_admin.as_deref(),
            Some("ops@example.com")
        );
        reset_env();
    }
}
