use serde::Deserialize;

use crate::models::ServiceName;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub defraudadores_url: String,
    pub restringido_url: String,
    pub externas_url: String,
    pub backend_timeout_secs: u64,
    pub rate_limit_period_ms: u64,
    pub rate_limit_burst: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            defraudadores_url: required_url("DEFRAUDADORES_URL")?,
            restringido_url: required_url("RESTRINGIDO_URL")?,
            externas_url: required_url("EXTERNAS_URL")?,
            backend_timeout_secs: positive_or_default("BACKEND_TIMEOUT_SECS", 10)?,
            rate_limit_period_ms: positive_or_default("RATE_LIMIT_PERIOD_MS", 100)?,
            rate_limit_burst: positive_or_default("RATE_LIMIT_BURST", 20)?,
        };

        // Log successful configuration load
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Defraudadores URL: {}", config.defraudadores_url);
        tracing::debug!("Restringido URL: {}", config.restringido_url);
        tracing::debug!("Externas URL: {}", config.externas_url);
        tracing::debug!("Backend timeout: {}s", config.backend_timeout_secs);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Endpoint of the given blacklist backend.
    pub fn service_url(&self, service: ServiceName) -> &str {
        match service {
            ServiceName::Defraudadores => &self.defraudadores_url,
            ServiceName::Restringido => &self.restringido_url,
            ServiceName::Externas => &self.externas_url,
        }
    }
}

fn required_url(var: &str) -> anyhow::Result<String> {
    let url = std::env::var(var)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", var))?;
    validate_url(var, url)
}

fn validate_url(var: &str, url: String) -> anyhow::Result<String> {
    if url.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", var);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", var);
    }
    Ok(url)
}

fn positive_or_default<T>(var: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match std::env::var(var) {
        Ok(raw) => {
            let value: T = raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("{} must be a positive integer", var))?;
            if value <= T::default() {
                anyhow::bail!("{} must be a positive integer", var);
            }
            Ok(value)
        }
        Err(_) => Ok(default),
    }
}
