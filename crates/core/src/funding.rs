//! Periodic funding-rate refresh.
//!
//! Each tick walks the configured symbols sequentially: read the oracle
//! price, reject stale feeds, then poke the exchange's funding index. One
//! symbol's failure never aborts the rest of the tick.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use flashperp_chain::{PerpExchange, PriceFeed};

/// Wall-clock Unix seconds.
fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Drives `poke_funding` for a set of markets.
pub struct FundingUpdater {
    feed: Arc<dyn PriceFeed>,
    exchange: Arc<dyn PerpExchange>,
    symbols: Vec<String>,
    max_price_age: Duration,
}

impl FundingUpdater {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        exchange: Arc<dyn PerpExchange>,
        symbols: Vec<String>,
        max_price_age: Duration,
    ) -> Self {
        Self {
            feed,
            exchange,
            symbols,
            max_price_age,
        }
    }

    /// One full pass over the symbol list.
    pub async fn tick(&self) {
        info!(symbols = self.symbols.len(), "running funding update");

        for symbol in &self.symbols {
            if let Err(e) = self.update_symbol(symbol).await {
                warn!(
                    symbol = %symbol,
                    error = %e,
                    "funding update failed, will retry next round"
                );
            }
        }
    }

    async fn update_symbol(&self, symbol: &str) -> Result<()> {
        let price = self.feed.last_price(symbol).await?;

        let now = unix_now();
        if price.is_stale(self.max_price_age.as_secs(), now) {
            warn!(
                symbol = %symbol,
                age_secs = price.age(now),
                max_age_secs = self.max_price_age.as_secs(),
                "oracle price stale, skipping"
            );
            return Ok(());
        }

        info!(symbol = %symbol, price = %price.price, "oracle price fetched");

        let hash = self.exchange.poke_funding(symbol).await?;
        info!(symbol = %symbol, tx = %hash, "funding poked");
        Ok(())
    }
}

impl std::fmt::Debug for FundingUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FundingUpdater")
            .field("symbols", &self.symbols)
            .field("max_price_age", &self.max_price_age)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockExchange, MockFeed};
    use flashperp_chain::OraclePrice;

    fn updater(feed: Arc<MockFeed>, exchange: Arc<MockExchange>, symbols: &[&str]) -> FundingUpdater {
        FundingUpdater::new(
            feed,
            exchange,
            symbols.iter().map(|s| s.to_string()).collect(),
            Duration::from_secs(900),
        )
    }

    #[tokio::test]
    async fn test_fresh_price_is_poked() {
        let feed = Arc::new(MockFeed::new().with_price(
            "XLM",
            OraclePrice {
                price: 120_000,
                timestamp: unix_now(),
            },
        ));
        let exchange = Arc::new(MockExchange::new());

        updater(feed, exchange.clone(), &["XLM"]).tick().await;
        assert_eq!(exchange.pokes(), vec!["XLM".to_string()]);
    }

    #[tokio::test]
    async fn test_stale_price_is_skipped() {
        let feed = Arc::new(MockFeed::new().with_price(
            "XLM",
            OraclePrice {
                price: 120_000,
                timestamp: unix_now().saturating_sub(10_000),
            },
        ));
        let exchange = Arc::new(MockExchange::new());

        updater(feed, exchange.clone(), &["XLM"]).tick().await;
        assert!(exchange.pokes().is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_the_tick() {
        let now = unix_now();
        let feed = Arc::new(
            MockFeed::new()
                .with_no_price("XLM") // oracle has nothing for this one
                .with_price(
                    "BTC",
                    OraclePrice {
                        price: 65_000_000_000,
                        timestamp: now,
                    },
                )
                .with_price(
                    "ETH",
                    OraclePrice {
                        price: 3_000_000_000,
                        timestamp: now,
                    },
                ),
        );
        let exchange = Arc::new(MockExchange::new().failing_poke("BTC"));

        updater(feed, exchange.clone(), &["XLM", "BTC", "ETH"]).tick().await;

        // XLM had no price, BTC submission failed, ETH still went through.
        assert_eq!(exchange.pokes(), vec!["ETH".to_string()]);
    }
}
