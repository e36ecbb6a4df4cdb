//! Process configuration, read from `.env` and the environment.

use anyhow::{Context, Result};
use rand::RngCore;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// HMAC key for identity tokens.
    pub token_secret: Vec<u8>,
    /// Set when no secret was configured and one was generated for this process.
    pub ephemeral_secret: bool,
    /// `tracing` filter directive.
    pub logs_level: String,
    /// Comma-separated allow-list; `None` means permissive CORS.
    pub cors_origins: Option<String>,
    pub max_frame_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let (token_secret, ephemeral_secret) = match var("TOKEN_SECRET") {
            Some(secret) => (secret.into_bytes(), false),
            None => {
                let mut secret = vec![0u8; 32];
                rand::rng().fill_bytes(&mut secret);
                (secret, true)
            }
        };

        Ok(Config {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: var("PORT")
                .unwrap_or_else(|| "3000".to_owned())
                .parse()
                .context("Invalid PORT")?,
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://parley.db?mode=rwc".to_owned()),
            token_secret,
            ephemeral_secret,
            logs_level: var("LOGS_LEVEL")
                .unwrap_or_else(|| "parley=debug,tower_http=info".to_owned()),
            cors_origins: var("CORS_ORIGINS"),
            max_frame_bytes: var("MAX_FRAME_BYTES")
                .unwrap_or_else(|| "65536".to_owned())
                .parse()
                .context("Invalid MAX_FRAME_BYTES")?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    dotenv::var(key).ok().filter(|value| !value.is_empty())
}
