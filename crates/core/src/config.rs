//! Environment-style configuration for both keeper bots.
//!
//! Missing required variables abort startup with a descriptive error; every
//! optional variable falls back to the testnet deployment's defaults.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::info;

/// Environment variable names.
pub mod env {
    pub const RPC_URL: &str = "RPC_URL";
    pub const NETWORK_PASSPHRASE: &str = "NETWORK_PASSPHRASE";
    pub const SECRET_KEY: &str = "SECRET_KEY";
    pub const LIQUIDATOR_SECRET_KEY: &str = "LIQUIDATOR_SECRET_KEY";
    pub const PERP_CONTRACT: &str = "PERP_CONTRACT";
    pub const ORACLE_CONTRACT: &str = "ORACLE_CONTRACT";
    pub const SYMBOLS: &str = "SYMBOLS";
    pub const WATCH_TRADERS: &str = "WATCH_TRADERS";
    pub const FUNDING_INTERVAL_SECS: &str = "FUNDING_INTERVAL_SECS";
    pub const MAX_PRICE_AGE_SECS: &str = "MAX_PRICE_AGE_SECS";
    pub const MMR_BP: &str = "MMR_BP";
    pub const EVENT_SCAN_INTERVAL_SECS: &str = "EVENT_SCAN_INTERVAL_SECS";
    pub const SWEEP_INTERVAL_SECS: &str = "SWEEP_INTERVAL_SECS";
    pub const SCAN_LOOKBACK_LEDGERS: &str = "SCAN_LOOKBACK_LEDGERS";
    pub const CONFIRM_TIMEOUT_SECS: &str = "CONFIRM_TIMEOUT_SECS";
}

/// Public testnet RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://soroban-testnet.stellar.org";

/// Testnet network passphrase.
pub const DEFAULT_NETWORK_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Reflector oracle deployment on testnet.
pub const DEFAULT_ORACLE_CONTRACT: &str =
    "CCYOZJCOPG34LLQQ7N24YXBM7LL62R7ONMZ3G6WZAAYPB5OYKOMJRN63";

fn required(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| anyhow!("Missing env var: {name}"))
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_secs(name: &str, default: u64) -> Result<Duration> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Duration::from_secs)
            .with_context(|| format!("Invalid {name}: {raw}")),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

/// Split a comma-separated list, dropping empty segments.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Funding keeper configuration.
#[derive(Debug, Clone)]
pub struct FundingBotConfig {
    pub rpc_url: String,
    pub network_passphrase: String,
    pub secret_key: String,
    pub perp_contract: String,
    pub oracle_contract: String,
    pub symbols: Vec<String>,
    pub interval: Duration,
    pub max_price_age: Duration,
}

impl FundingBotConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            rpc_url: optional(env::RPC_URL, DEFAULT_RPC_URL),
            network_passphrase: optional(env::NETWORK_PASSPHRASE, DEFAULT_NETWORK_PASSPHRASE),
            secret_key: required(env::SECRET_KEY)?,
            perp_contract: required(env::PERP_CONTRACT)?,
            oracle_contract: optional(env::ORACLE_CONTRACT, DEFAULT_ORACLE_CONTRACT),
            symbols: parse_list(&optional(env::SYMBOLS, "XLM,BTC,ETH")),
            interval: parse_secs(env::FUNDING_INTERVAL_SECS, 3600)?,
            max_price_age: parse_secs(env::MAX_PRICE_AGE_SECS, 900)?,
        })
    }

    pub fn log_config(&self) {
        info!(
            rpc = %self.rpc_url,
            perp = %self.perp_contract,
            oracle = %self.oracle_contract,
            symbols = ?self.symbols,
            interval_secs = self.interval.as_secs(),
            max_price_age_secs = self.max_price_age.as_secs(),
            "funding bot configuration"
        );
    }
}

/// Liquidation keeper configuration.
#[derive(Debug, Clone)]
pub struct LiquidatorBotConfig {
    pub rpc_url: String,
    pub network_passphrase: String,
    pub secret_key: String,
    pub perp_contract: String,
    pub symbols: Vec<String>,
    /// Externally supplied trader addresses seeding the full-sweep scan.
    pub watch_traders: Vec<String>,
    /// Maintenance margin ratio in basis points.
    pub mmr_bp: i128,
    pub event_scan_interval: Duration,
    pub sweep_interval: Duration,
    /// Look-back window for the first incremental scan.
    pub lookback_ledgers: u32,
    pub confirm_timeout: Duration,
}

impl LiquidatorBotConfig {
    pub fn from_env() -> Result<Self> {
        let mmr_raw = optional(env::MMR_BP, "1000");
        let mmr_bp: i128 = mmr_raw
            .parse()
            .with_context(|| format!("Invalid {}: {mmr_raw}", env::MMR_BP))?;

        let lookback_raw = optional(env::SCAN_LOOKBACK_LEDGERS, "100");
        let lookback_ledgers: u32 = lookback_raw
            .parse()
            .with_context(|| format!("Invalid {}: {lookback_raw}", env::SCAN_LOOKBACK_LEDGERS))?;

        Ok(Self {
            rpc_url: optional(env::RPC_URL, DEFAULT_RPC_URL),
            network_passphrase: optional(env::NETWORK_PASSPHRASE, DEFAULT_NETWORK_PASSPHRASE),
            secret_key: required(env::LIQUIDATOR_SECRET_KEY)?,
            perp_contract: required(env::PERP_CONTRACT)?,
            symbols: parse_list(&optional(env::SYMBOLS, "XLMUSD,BTCUSD,ETHUSD")),
            watch_traders: parse_list(&optional(env::WATCH_TRADERS, "")),
            mmr_bp,
            event_scan_interval: parse_secs(env::EVENT_SCAN_INTERVAL_SECS, 10)?,
            sweep_interval: parse_secs(env::SWEEP_INTERVAL_SECS, 60)?,
            lookback_ledgers,
            confirm_timeout: parse_secs(env::CONFIRM_TIMEOUT_SECS, 300)?,
        })
    }

    pub fn log_config(&self) {
        info!(
            rpc = %self.rpc_url,
            perp = %self.perp_contract,
            symbols = ?self.symbols,
            watched_traders = self.watch_traders.len(),
            mmr_bp = %self.mmr_bp,
            event_scan_secs = self.event_scan_interval.as_secs(),
            sweep_secs = self.sweep_interval.as_secs(),
            lookback_ledgers = self.lookback_ledgers,
            "liquidator bot configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_and_drops_empties() {
        assert_eq!(parse_list("XLM, BTC ,ETH"), vec!["XLM", "BTC", "ETH"]);
        assert_eq!(parse_list(""), Vec::<String>::new());
        assert_eq!(parse_list("BTCUSD,,"), vec!["BTCUSD"]);
    }
}
