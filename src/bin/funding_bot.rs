//! FlashPerp funding keeper.
//!
//! Refreshes each market's funding index hourly from the oracle price feed,
//! skipping feeds older than the staleness bound. The first tick runs
//! immediately at startup.

use std::sync::Arc;

use anyhow::Result;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flashperp_chain::{ContractClient, Keypair, OracleContract, PerpContract, SorobanRpc};
use flashperp_core::{FundingBotConfig, FundingUpdater};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,flashperp_core=debug,flashperp_chain=debug")),
        )
        .init();

    // Missing required configuration aborts here with a non-zero exit.
    let config = FundingBotConfig::from_env()?;
    config.log_config();

    info!("Starting FlashPerp funding bot");

    let rpc = Arc::new(SorobanRpc::new(&config.rpc_url));
    let keypair = Keypair::from_secret(&config.secret_key)?;
    let client = Arc::new(ContractClient::new(
        rpc,
        keypair,
        &config.network_passphrase,
    ));
    info!(account = %client.account_id(), "funding keeper identity");

    let exchange = Arc::new(PerpContract::new(client.clone(), config.perp_contract.clone()));
    let oracle = Arc::new(OracleContract::new(client, config.oracle_contract.clone()));

    let updater = FundingUpdater::new(
        oracle,
        exchange,
        config.symbols.clone(),
        config.max_price_age,
    );

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => updater.tick().await,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
