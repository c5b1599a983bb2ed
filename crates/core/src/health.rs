//! Position health evaluation.
//!
//! Margin ratios are expressed in basis points out of [`BPS`]. A position
//! whose current notional is zero is treated as fully healthy rather than
//! dividing by zero, and a missing mark price always resolves to a no-op:
//! the bot never liquidates on uncertain data.

use std::sync::Arc;

use tracing::{debug, warn};

use flashperp_chain::{PerpExchange, Position};

use crate::liquidator::LiquidationExecutor;

/// Basis points in 100%.
pub const BPS: i128 = 10_000;

/// Fixed-point scale of prices and notionals (6 decimals).
pub const PRICE_SCALE: i128 = 1_000_000;

/// Margin ratio of a position at the given mark price, in basis points.
pub fn margin_ratio_bp(position: &Position, mark_price: i128) -> i128 {
    let current_notional = (position.size.abs() * mark_price) / PRICE_SCALE;
    if current_notional == 0 {
        return BPS;
    }
    position.margin * BPS / current_notional
}

/// Result of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    /// No open position for this (trader, symbol).
    NoPosition,
    /// Data was unavailable this round; nothing was decided.
    Skipped,
    /// Margin ratio at or above the maintenance threshold.
    Healthy,
    /// Liquidation was triggered and confirmed.
    Liquidated,
    /// Liquidation was triggered but did not confirm; retried next scan.
    LiquidationFailed,
}

/// Evaluates positions and triggers the liquidation executor.
pub struct HealthEvaluator {
    exchange: Arc<dyn PerpExchange>,
    executor: LiquidationExecutor,
    mmr_bp: i128,
}

impl HealthEvaluator {
    pub fn new(exchange: Arc<dyn PerpExchange>, executor: LiquidationExecutor, mmr_bp: i128) -> Self {
        Self {
            exchange,
            executor,
            mmr_bp,
        }
    }

    /// Check one (trader, symbol) pair and liquidate when undercollateralized.
    pub async fn check(&self, trader: &str, symbol: &str) -> HealthOutcome {
        let position = match self.exchange.position(trader, symbol).await {
            Ok(Some(position)) if position.size != 0 => position,
            Ok(_) => return HealthOutcome::NoPosition,
            Err(e) => {
                warn!(trader = %trader, symbol = %symbol, error = %e, "position read failed");
                return HealthOutcome::Skipped;
            }
        };

        // Fail open on missing mark price.
        let mark_price = match self.exchange.mark_price(symbol).await {
            Ok(price) => price,
            Err(e) => {
                warn!(
                    trader = %trader,
                    symbol = %symbol,
                    error = %e,
                    "mark price unavailable, skipping health check"
                );
                return HealthOutcome::Skipped;
            }
        };

        let ratio = margin_ratio_bp(&position, mark_price);
        debug!(
            trader = %trader,
            symbol = %symbol,
            ratio_bp = %ratio,
            mmr_bp = %self.mmr_bp,
            "position margin ratio"
        );

        if ratio >= self.mmr_bp {
            return HealthOutcome::Healthy;
        }

        warn!(
            trader = %trader,
            symbol = %symbol,
            ratio_bp = %ratio,
            "position below maintenance margin"
        );
        if self.executor.liquidate(trader, symbol).await {
            HealthOutcome::Liquidated
        } else {
            HealthOutcome::LiquidationFailed
        }
    }
}

impl std::fmt::Debug for HealthEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthEvaluator")
            .field("mmr_bp", &self.mmr_bp)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockExchange;

    fn position(size: i128, margin: i128) -> Position {
        Position {
            size,
            notional: 0,
            margin,
            funding_index: 0,
        }
    }

    fn evaluator(exchange: Arc<MockExchange>, mmr_bp: i128) -> HealthEvaluator {
        let executor = LiquidationExecutor::new(exchange.clone());
        HealthEvaluator::new(exchange, executor, mmr_bp)
    }

    #[test]
    fn test_margin_ratio_worked_examples() {
        // notional = 10 * 2_000_000 / 1_000_000 = 20
        let healthy = position(10, 100);
        assert_eq!(margin_ratio_bp(&healthy, 2_000_000), 50_000);

        let thin = position(10, 1);
        assert_eq!(margin_ratio_bp(&thin, 2_000_000), 500);
    }

    #[test]
    fn test_margin_ratio_zero_notional_is_full_health() {
        let p = position(10, 0);
        assert_eq!(margin_ratio_bp(&p, 0), BPS);
        // Tiny size truncates to zero notional as well.
        let dust = position(1, 5);
        assert_eq!(margin_ratio_bp(&dust, 999_999), BPS);
    }

    #[test]
    fn test_margin_ratio_uses_absolute_size() {
        let long = position(10, 1);
        let short = position(-10, 1);
        assert_eq!(
            margin_ratio_bp(&long, 2_000_000),
            margin_ratio_bp(&short, 2_000_000)
        );
    }

    #[tokio::test]
    async fn test_zero_size_never_liquidates() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_position("trader", "BTCUSD", position(0, 0))
                .with_mark_price("BTCUSD", 2_000_000),
        );
        let evaluator = evaluator(exchange.clone(), 1000);

        assert_eq!(
            evaluator.check("trader", "BTCUSD").await,
            HealthOutcome::NoPosition
        );
        assert!(exchange.liquidations().is_empty());
    }

    #[tokio::test]
    async fn test_missing_mark_price_fails_open() {
        let exchange = Arc::new(
            MockExchange::new().with_position("trader", "BTCUSD", position(10, 1)),
        );
        let evaluator = evaluator(exchange.clone(), 1000);

        assert_eq!(
            evaluator.check("trader", "BTCUSD").await,
            HealthOutcome::Skipped
        );
        assert!(exchange.liquidations().is_empty());
    }

    #[tokio::test]
    async fn test_undercollateralized_triggers_single_liquidation() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_position("trader", "BTCUSD", position(10, 1))
                .with_mark_price("BTCUSD", 2_000_000),
        );
        let evaluator = evaluator(exchange.clone(), 1000);

        assert_eq!(
            evaluator.check("trader", "BTCUSD").await,
            HealthOutcome::Liquidated
        );
        assert_eq!(
            exchange.liquidations(),
            vec![("trader".to_string(), "BTCUSD".to_string())]
        );
    }

    #[tokio::test]
    async fn test_healthy_position_is_left_alone() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_position("trader", "BTCUSD", position(10, 100))
                .with_mark_price("BTCUSD", 2_000_000),
        );
        let evaluator = evaluator(exchange.clone(), 1000);

        assert_eq!(
            evaluator.check("trader", "BTCUSD").await,
            HealthOutcome::Healthy
        );
        assert!(exchange.liquidations().is_empty());
    }

    #[tokio::test]
    async fn test_failed_liquidation_is_reported_not_raised() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_position("trader", "BTCUSD", position(10, 1))
                .with_mark_price("BTCUSD", 2_000_000)
                .failing_liquidations(),
        );
        let evaluator = evaluator(exchange.clone(), 1000);

        assert_eq!(
            evaluator.check("trader", "BTCUSD").await,
            HealthOutcome::LiquidationFailed
        );
    }
}
