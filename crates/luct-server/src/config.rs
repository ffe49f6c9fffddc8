use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use luct_api::token::DEFAULT_TTL_HOURS;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your_jwt_secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Unset and empty values fall
    /// back to defaults, except the JWT secret which has none.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("LUCT_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("LUCT_JWT_SECRET is unset or still a placeholder");
        }

        let port = match var("LUCT_PORT") {
            Some(v) => v.parse().with_context(|| format!("LUCT_PORT is not a port: {v}"))?,
            None => 5000,
        };

        let token_ttl_hours = match var("LUCT_TOKEN_TTL_HOURS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("LUCT_TOKEN_TTL_HOURS is not a number: {v}"))?,
            None => DEFAULT_TTL_HOURS,
        };
        if token_ttl_hours <= 0 {
            bail!("LUCT_TOKEN_TTL_HOURS must be positive");
        }

        Ok(Self {
            jwt_secret,
            db_path: var("LUCT_DB_PATH").unwrap_or_else(|| "luct.db".into()).into(),
            host: var("LUCT_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            token_ttl_hours,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}
