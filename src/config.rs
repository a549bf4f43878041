use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    /// Base URL the reset link points at; checked again when a reset is requested.
    pub frontend_url: Option<String>,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    pub log_level: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;

        let host: IpAddr = env_or("GATEHOUSE_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid GATEHOUSE_HOST: {e}"))?;

        let port: u16 = env_or("GATEHOUSE_PORT", "8010")
            .parse()
            .map_err(|e| format!("Invalid GATEHOUSE_PORT: {e}"))?;

        let frontend_url = std::env::var("FRONTEND_URL").ok();

        let rate_limit_max: u32 = env_or("GATEHOUSE_RATE_LIMIT_MAX", "5")
            .parse()
            .map_err(|e| format!("Invalid GATEHOUSE_RATE_LIMIT_MAX: {e}"))?;

        let rate_limit_window_secs: u64 = env_or("GATEHOUSE_RATE_LIMIT_WINDOW_SECS", "60")
            .parse()
            .map_err(|e| format!("Invalid GATEHOUSE_RATE_LIMIT_WINDOW_SECS: {e}"))?;

        let log_level = env_or("GATEHOUSE_LOG_LEVEL", "info");

        let smtp = match (
            std::env::var("GATEHOUSE_SMTP_HOST").ok(),
            std::env::var("GATEHOUSE_SMTP_PORT").ok(),
            std::env::var("GATEHOUSE_SMTP_USER").ok(),
            std::env::var("GATEHOUSE_SMTP_PASS").ok(),
            std::env::var("GATEHOUSE_SMTP_FROM").ok(),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid GATEHOUSE_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            frontend_url,
            rate_limit_max,
            rate_limit_window_secs,
            log_level,
            smtp,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
