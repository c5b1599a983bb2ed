//! One-shot oracle query.
//!
//! Funds a throwaway account through friendbot (only needed to build the
//! simulated transactions) and prints the 6-decimal price for each symbol.

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flashperp_chain::{ContractClient, Keypair, OracleContract, PriceFeed, SorobanRpc};
use flashperp_core::config::{
    self, DEFAULT_NETWORK_PASSPHRASE, DEFAULT_ORACLE_CONTRACT, DEFAULT_RPC_URL,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let rpc_url =
        std::env::var(config::env::RPC_URL).unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());
    let passphrase = std::env::var(config::env::NETWORK_PASSPHRASE)
        .unwrap_or_else(|_| DEFAULT_NETWORK_PASSPHRASE.to_string());
    let oracle_id = std::env::var(config::env::ORACLE_CONTRACT)
        .unwrap_or_else(|_| DEFAULT_ORACLE_CONTRACT.to_string());
    let symbols = config::parse_list(
        &std::env::var(config::env::SYMBOLS).unwrap_or_else(|_| "XLM,BTC,ETH".to_string()),
    );

    let rpc = Arc::new(SorobanRpc::new(&rpc_url));

    let keypair = Keypair::random();
    rpc.request_airdrop(&keypair.account_id()).await?;

    let client = Arc::new(ContractClient::new(rpc, keypair, &passphrase));
    let oracle = OracleContract::new(client, oracle_id);

    for symbol in &symbols {
        match oracle.last_price(symbol).await {
            Ok(p) => println!(
                "{symbol} price: {} ({} at 1e6)",
                p.price as f64 / 1_000_000.0,
                p.price
            ),
            Err(e) => eprintln!("Failed to fetch {symbol}: {e}"),
        }
    }

    Ok(())
}
