//! Position scanning for the liquidation bot.
//!
//! Two complementary passes share one evaluator: an incremental scan that
//! follows position events from a ledger checkpoint, and a periodic full
//! sweep over every known (trader, symbol) pair that backstops anything the
//! incremental pass missed or misdecoded.

use std::sync::Arc;

use anyhow::Result;
use dashmap::DashSet;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use flashperp_chain::EventSource;

use crate::health::HealthEvaluator;

/// Last ledger sequence up to which events have been processed.
///
/// Held as an explicit state object so real persistence can replace it
/// without touching call sites. In-memory only: a restart re-derives it from
/// the look-back window.
#[derive(Debug, Default)]
pub struct ScanCheckpoint {
    last_checked: Option<u32>,
}

impl ScanCheckpoint {
    pub fn get(&self) -> Option<u32> {
        self.last_checked
    }

    /// Initialize to `ledger - lookback` on first use; returns the scan start.
    pub fn init_if_empty(&mut self, ledger: u32, lookback: u32) -> u32 {
        *self
            .last_checked
            .get_or_insert_with(|| ledger.saturating_sub(lookback))
    }

    /// Advance after a completed scan.
    pub fn advance(&mut self, ledger: u32) {
        self.last_checked = Some(ledger);
    }
}

/// Event-driven scanner plus full-sweep backstop.
pub struct PositionScanner {
    events: Arc<dyn EventSource>,
    evaluator: Arc<HealthEvaluator>,
    symbols: Vec<String>,
    /// Traders worth sweeping: the configured watch list plus every trader
    /// seen in a position event.
    traders: DashSet<String>,
    checkpoint: Mutex<ScanCheckpoint>,
    lookback_ledgers: u32,
}

impl PositionScanner {
    pub fn new(
        events: Arc<dyn EventSource>,
        evaluator: Arc<HealthEvaluator>,
        symbols: Vec<String>,
        watch_traders: Vec<String>,
        lookback_ledgers: u32,
    ) -> Self {
        let traders = DashSet::new();
        for trader in watch_traders {
            traders.insert(trader);
        }
        Self {
            events,
            evaluator,
            symbols,
            traders,
            checkpoint: Mutex::new(ScanCheckpoint::default()),
            lookback_ledgers,
        }
    }

    /// Current checkpoint, if a scan has completed or started.
    pub fn checkpoint(&self) -> Option<u32> {
        self.checkpoint.lock().get()
    }

    /// Traders currently in the sweep set.
    pub fn known_traders(&self) -> Vec<String> {
        self.traders.iter().map(|t| t.key().clone()).collect()
    }

    /// Incremental pass: process events since the checkpoint.
    pub async fn scan_events(&self) {
        if let Err(e) = self.try_scan_events().await {
            warn!(error = %e, "event scan failed, checkpoint unchanged");
        }
    }

    async fn try_scan_events(&self) -> Result<()> {
        let current = self.events.latest_ledger().await?;
        let start = self
            .checkpoint
            .lock()
            .init_if_empty(current, self.lookback_ledgers);

        let events = self.events.position_events(start).await?;
        debug!(
            start_ledger = start,
            current_ledger = current,
            count = events.len(),
            "scanned position events"
        );

        for event in &events {
            self.traders.insert(event.trader.clone());
            info!(
                trader = %event.trader,
                symbol = %event.symbol,
                kind = ?event.kind,
                "checking position after event"
            );
            self.evaluator.check(&event.trader, &event.symbol).await;
        }

        // Advance even when the page was empty; a failed query above has
        // already returned and left the checkpoint for a retry.
        self.checkpoint.lock().advance(current);
        Ok(())
    }

    /// Full sweep: re-check every known (trader, symbol) pair.
    pub async fn sweep(&self) {
        let traders = self.known_traders();
        info!(
            traders = traders.len(),
            symbols = self.symbols.len(),
            "running full position sweep"
        );

        for trader in &traders {
            for symbol in &self.symbols {
                self.evaluator.check(trader, symbol).await;
            }
        }
    }
}

impl std::fmt::Debug for PositionScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionScanner")
            .field("symbols", &self.symbols)
            .field("traders", &self.traders.len())
            .field("checkpoint", &self.checkpoint.lock().get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liquidator::LiquidationExecutor;
    use crate::testing::{MockEvents, MockExchange};
    use flashperp_chain::{PositionEvent, PositionEventKind};

    fn scanner_with(
        events: Arc<MockEvents>,
        exchange: Arc<MockExchange>,
        watch: Vec<String>,
    ) -> PositionScanner {
        let executor = LiquidationExecutor::new(exchange.clone());
        let evaluator = Arc::new(HealthEvaluator::new(exchange, executor, 1000));
        PositionScanner::new(
            events,
            evaluator,
            vec!["XLMUSD".to_string(), "BTCUSD".to_string()],
            watch,
            100,
        )
    }

    fn event(trader: &str, symbol: &str) -> PositionEvent {
        PositionEvent {
            kind: PositionEventKind::Updated,
            trader: trader.to_string(),
            symbol: symbol.to_string(),
            ledger: 1,
        }
    }

    #[tokio::test]
    async fn test_first_scan_initializes_checkpoint_with_lookback() {
        let events = Arc::new(MockEvents::new(5_000));
        let exchange = Arc::new(MockExchange::new());
        let scanner = scanner_with(events.clone(), exchange, vec![]);

        assert_eq!(scanner.checkpoint(), None);
        scanner.scan_events().await;

        assert_eq!(events.queried_from(), vec![4_900]);
        assert_eq!(scanner.checkpoint(), Some(5_000));
    }

    #[tokio::test]
    async fn test_empty_scan_still_advances_checkpoint() {
        let events = Arc::new(MockEvents::new(5_000));
        let exchange = Arc::new(MockExchange::new());
        let scanner = scanner_with(events.clone(), exchange, vec![]);

        scanner.scan_events().await;
        events.set_ledger(5_010);
        scanner.scan_events().await;

        assert_eq!(scanner.checkpoint(), Some(5_010));
        assert_eq!(events.queried_from(), vec![4_900, 5_000]);
    }

    #[tokio::test]
    async fn test_failed_scan_leaves_checkpoint_unchanged() {
        let events = Arc::new(MockEvents::new(5_000));
        let exchange = Arc::new(MockExchange::new());
        let scanner = scanner_with(events.clone(), exchange, vec![]);

        scanner.scan_events().await;
        assert_eq!(scanner.checkpoint(), Some(5_000));

        events.set_ledger(5_020);
        events.fail_next_query();
        scanner.scan_events().await;

        // Query failed: the 5_000.. range is retried next tick.
        assert_eq!(scanner.checkpoint(), Some(5_000));
    }

    #[tokio::test]
    async fn test_events_feed_evaluator_and_trader_set() {
        let events = Arc::new(MockEvents::new(5_000));
        events.push(event("GTRADER", "BTCUSD"));
        let exchange = Arc::new(MockExchange::new());
        let scanner = scanner_with(events, exchange.clone(), vec![]);

        scanner.scan_events().await;

        // The evaluator ran (position read happened) and the trader joined
        // the sweep set.
        assert_eq!(
            exchange.position_reads(),
            vec![("GTRADER".to_string(), "BTCUSD".to_string())]
        );
        assert_eq!(scanner.known_traders(), vec!["GTRADER".to_string()]);
    }

    #[tokio::test]
    async fn test_sweep_covers_watch_list_across_symbols() {
        let events = Arc::new(MockEvents::new(1_000));
        let exchange = Arc::new(MockExchange::new());
        let scanner = scanner_with(events, exchange.clone(), vec!["GWATCHED".to_string()]);

        scanner.sweep().await;

        let mut reads = exchange.position_reads();
        reads.sort();
        assert_eq!(
            reads,
            vec![
                ("GWATCHED".to_string(), "BTCUSD".to_string()),
                ("GWATCHED".to_string(), "XLMUSD".to_string()),
            ]
        );
    }
}
