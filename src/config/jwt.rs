use anyhow::Result;
use std::env;

/// Verification settings for bearer tokens issued by the identity service.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub leeway_secs: u64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self> {
        let secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable must be set"))?;

        if secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters"
            ));
        }

        let leeway_secs = env::var("JWT_LEEWAY_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            secret,
            leeway_secs,
        })
    }
}
