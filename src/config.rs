//! Environment-backed configuration.

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub nats_url: Option<String>,
    pub gateway: Option<GatewayConfig>,
}

/// Razorpay-style gateway credentials. Optional so the service can boot in
/// environments where payments are not yet configured; payment endpoints
/// answer 503 until they are.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8084".to_string())
            .parse()
            .context("PORT is not a valid port number")?;
        let nats_url = std::env::var("NATS_URL").ok();

        let gateway = match (
            std::env::var("GATEWAY_KEY_ID").ok(),
            std::env::var("GATEWAY_KEY_SECRET").ok(),
        ) {
            (Some(key_id), Some(key_secret)) => Some(GatewayConfig {
                key_id,
                key_secret,
                base_url: std::env::var("GATEWAY_URL")
                    .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
            }),
            _ => {
                tracing::warn!("gateway keys not set; payment endpoints are disabled");
                None
            }
        };

        Ok(Self {
            database_url,
            port,
            nats_url,
            gateway,
        })
    }
}
