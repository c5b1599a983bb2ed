//! FlashPerp liquidation keeper.
//!
//! Runs two independent timers over a shared scanner: a short-interval
//! incremental event scan and a slower full sweep across every known
//! (trader, symbol) pair. Shutdown lets in-flight scans finish; nothing is
//! interrupted mid-submission.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flashperp_chain::{ContractClient, Keypair, PerpContract, SorobanRpc};
use flashperp_core::{
    HealthEvaluator, LiquidationExecutor, LiquidatorBotConfig, PositionScanner,
};

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

    let config = LiquidatorBotConfig::from_env()?;
    config.log_config();

    info!("Starting FlashPerp liquidator bot");

    let rpc = Arc::new(SorobanRpc::new(&config.rpc_url));
    let keypair = Keypair::from_secret(&config.secret_key)?;
    let client = Arc::new(
        ContractClient::new(rpc, keypair, &config.network_passphrase)
            .with_confirm_timeout(config.confirm_timeout),
    );
    info!(liquidator = %client.account_id(), "liquidator identity");

    let exchange = Arc::new(PerpContract::new(client, config.perp_contract.clone()));
    let executor = LiquidationExecutor::new(exchange.clone());
    let evaluator = Arc::new(HealthEvaluator::new(
        exchange.clone(),
        executor,
        config.mmr_bp,
    ));
    let scanner = Arc::new(PositionScanner::new(
        exchange,
        evaluator,
        config.symbols.clone(),
        config.watch_traders.clone(),
        config.lookback_ledgers,
    ));

    // Initial pass over the watch list before the timers start.
    scanner.sweep().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let events_handle = spawn_cycle(
        scanner.clone(),
        config.event_scan_interval,
        shutdown_rx.clone(),
        CycleKind::Events,
    );
    let sweep_handle = spawn_cycle(
        scanner,
        config.sweep_interval,
        shutdown_rx,
        CycleKind::Sweep,
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, letting in-flight scans finish");
    shutdown_tx.send(true).ok();
    let _ = tokio::join!(events_handle, sweep_handle);

    Ok(())
}

#[derive(Clone, Copy)]
enum CycleKind {
    Events,
    Sweep,
}

/// Periodic scanner cycle that exits once shutdown is signalled, always
/// completing the tick it is in.
fn spawn_cycle(
    scanner: Arc<PositionScanner>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    kind: CycleKind,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => match kind {
                    CycleKind::Events => scanner.scan_events().await,
                    CycleKind::Sweep => scanner.sweep().await,
                },
                _ = shutdown.changed() => break,
            }
        }
    })
}
