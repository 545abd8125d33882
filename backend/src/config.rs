use std::env;

use crate::models::child::AnchorNetwork;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    // Ledger
    pub xrpl_rpc_url: String,
    pub xrpl_network: AnchorNetwork,
    pub issuer_address: Option<String>,
    pub issuer_seed: Option<String>,
    pub anchor_amount_drops: u64,
    pub ledger_poll_interval_ms: u64,
    pub ledger_max_polls: u32,
    // Access
    pub staff_api_key: String,
    pub view_token_secret: String,
    pub view_token_ttl_seconds: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost".into()),
            xrpl_rpc_url: env::var("XRPL_RPC_URL")
                .unwrap_or_else(|_| "https://s.altnet.rippletest.net:51234".into()),
            xrpl_network: env::var("XRPL_NETWORK")
                .unwrap_or_else(|_| "testnet".into())
                .parse()?,
            issuer_address: env::var("XRPL_ISSUER_ADDRESS").ok().filter(|s| !s.is_empty()),
            issuer_seed: env::var("XRPL_ISSUER_SEED").ok().filter(|s| !s.is_empty()),
            anchor_amount_drops: env::var("ANCHOR_AMOUNT_DROPS")
                .unwrap_or_else(|_| "1000000".into())
                .parse()?,
            ledger_poll_interval_ms: env::var("LEDGER_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".into())
                .parse()?,
            ledger_max_polls: env::var("LEDGER_MAX_POLLS")
                .unwrap_or_else(|_| "90".into())
                .parse()?,
            staff_api_key: required("STAFF_API_KEY")?,
            view_token_secret: required("VIEW_TOKEN_SECRET")?,
            view_token_ttl_seconds: env::var("VIEW_TOKEN_TTL_SECONDS")
                .unwrap_or_else(|_| "86400".into())
                .parse()?,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
