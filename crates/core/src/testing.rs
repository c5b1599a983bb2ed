//! Mock chain-trait implementations for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use flashperp_chain::{
    ChainError, EventSource, OracleError, OraclePrice, PerpExchange, Position, PositionEvent,
    PriceFeed,
};

/// Scripted exchange that records every interaction.
#[derive(Default)]
pub struct MockExchange {
    positions: HashMap<(String, String), Position>,
    mark_prices: HashMap<String, i128>,
    fail_liquidate: bool,
    failing_pokes: HashSet<String>,
    position_reads: Mutex<Vec<(String, String)>>,
    liquidations: Mutex<Vec<(String, String)>>,
    pokes: Mutex<Vec<String>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, trader: &str, symbol: &str, position: Position) -> Self {
        self.positions
            .insert((trader.to_string(), symbol.to_string()), position);
        self
    }

    pub fn with_mark_price(mut self, symbol: &str, price: i128) -> Self {
        self.mark_prices.insert(symbol.to_string(), price);
        self
    }

    pub fn failing_liquidations(mut self) -> Self {
        self.fail_liquidate = true;
        self
    }

    pub fn failing_poke(mut self, symbol: &str) -> Self {
        self.failing_pokes.insert(symbol.to_string());
        self
    }

    pub fn position_reads(&self) -> Vec<(String, String)> {
        self.position_reads.lock().clone()
    }

    pub fn liquidations(&self) -> Vec<(String, String)> {
        self.liquidations.lock().clone()
    }

    pub fn pokes(&self) -> Vec<String> {
        self.pokes.lock().clone()
    }
}

#[async_trait]
impl PerpExchange for MockExchange {
    async fn position(&self, trader: &str, symbol: &str) -> Result<Option<Position>, ChainError> {
        self.position_reads
            .lock()
            .push((trader.to_string(), symbol.to_string()));
        Ok(self
            .positions
            .get(&(trader.to_string(), symbol.to_string()))
            .copied())
    }

    async fn mark_price(&self, symbol: &str) -> Result<i128, ChainError> {
        self.mark_prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ChainError::Simulation(format!("no mark price for {symbol}")))
    }

    async fn poke_funding(&self, symbol: &str) -> Result<String, ChainError> {
        if self.failing_pokes.contains(symbol) {
            return Err(ChainError::Simulation(format!("poke rejected for {symbol}")));
        }
        self.pokes.lock().push(symbol.to_string());
        Ok(format!("poke-{symbol}"))
    }

    async fn liquidate(&self, trader: &str, symbol: &str) -> Result<String, ChainError> {
        if self.fail_liquidate {
            return Err(ChainError::TransactionFailed {
                hash: "deadbeef".into(),
            });
        }
        self.liquidations
            .lock()
            .push((trader.to_string(), symbol.to_string()));
        Ok(format!("liq-{trader}-{symbol}"))
    }
}

/// Scripted oracle feed.
#[derive(Default)]
pub struct MockFeed {
    prices: HashMap<String, OraclePrice>,
    no_price: HashSet<String>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: &str, price: OraclePrice) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }

    pub fn with_no_price(mut self, symbol: &str) -> Self {
        self.no_price.insert(symbol.to_string());
        self
    }
}

#[async_trait]
impl PriceFeed for MockFeed {
    async fn last_price(&self, symbol: &str) -> Result<OraclePrice, OracleError> {
        if self.no_price.contains(symbol) {
            return Err(OracleError::NoPrice);
        }
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| OracleError::Malformed(format!("no fixture for {symbol}")))
    }
}

/// Scripted ledger-event feed.
pub struct MockEvents {
    ledger: AtomicU32,
    events: Mutex<Vec<PositionEvent>>,
    fail_next: AtomicBool,
    queried_from: Mutex<Vec<u32>>,
}

impl MockEvents {
    pub fn new(ledger: u32) -> Self {
        Self {
            ledger: AtomicU32::new(ledger),
            events: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
            queried_from: Mutex::new(Vec::new()),
        }
    }

    pub fn set_ledger(&self, ledger: u32) {
        self.ledger.store(ledger, Ordering::SeqCst);
    }

    pub fn push(&self, event: PositionEvent) {
        self.events.lock().push(event);
    }

    pub fn fail_next_query(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Start ledgers of every `position_events` query, in order.
    pub fn queried_from(&self) -> Vec<u32> {
        self.queried_from.lock().clone()
    }
}

#[async_trait]
impl EventSource for MockEvents {
    async fn latest_ledger(&self) -> Result<u32, ChainError> {
        Ok(self.ledger.load(Ordering::SeqCst))
    }

    async fn position_events(&self, start_ledger: u32) -> Result<Vec<PositionEvent>, ChainError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ChainError::Rpc {
                code: -32600,
                message: "scripted failure".into(),
            });
        }
        self.queried_from.lock().push(start_ledger);
        Ok(std::mem::take(&mut *self.events.lock()))
    }
}
