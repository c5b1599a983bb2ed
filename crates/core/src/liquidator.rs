//! Liquidation executor for on-chain liquidation transactions.

use std::sync::Arc;

use tracing::{error, info};

use flashperp_chain::PerpExchange;

/// Submits liquidations and reports the outcome as a boolean.
///
/// Every failure is caught and logged rather than propagated: the evaluator
/// re-checks the same position on the next scan, and a timed-out submission
/// that actually landed resolves itself there (the position reads as closed).
pub struct LiquidationExecutor {
    exchange: Arc<dyn PerpExchange>,
}

impl LiquidationExecutor {
    pub fn new(exchange: Arc<dyn PerpExchange>) -> Self {
        Self { exchange }
    }

    /// Liquidate one position. Returns `true` only on confirmed success.
    pub async fn liquidate(&self, trader: &str, symbol: &str) -> bool {
        info!(trader = %trader, symbol = %symbol, "submitting liquidation");

        match self.exchange.liquidate(trader, symbol).await {
            Ok(hash) => {
                info!(trader = %trader, symbol = %symbol, tx = %hash, "liquidation confirmed");
                true
            }
            Err(e) => {
                error!(
                    trader = %trader,
                    symbol = %symbol,
                    error = %e,
                    "liquidation failed, will retry on next scan"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for LiquidationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiquidationExecutor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockExchange;

    #[tokio::test]
    async fn test_success_reports_true() {
        let exchange = Arc::new(MockExchange::new());
        let executor = LiquidationExecutor::new(exchange.clone());

        assert!(executor.liquidate("trader", "XLMUSD").await);
        assert_eq!(
            exchange.liquidations(),
            vec![("trader".to_string(), "XLMUSD".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failure_is_swallowed_and_reports_false() {
        let exchange = Arc::new(MockExchange::new().failing_liquidations());
        let executor = LiquidationExecutor::new(exchange);

        assert!(!executor.liquidate("trader", "XLMUSD").await);
    }
}
