//! Perp exchange contract client.

use async_trait::async_trait;

use crate::contract::ContractClient;
use crate::error::ChainError;
use crate::scval::ScVal;

/// One trader's open exposure in one market, as stored by the exchange.
/// `size` is signed (positive = long); amounts are 6-decimal fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub size: i128,
    pub notional: i128,
    pub margin: i128,
    pub funding_index: i128,
}

impl Position {
    /// Decode from the contract's map representation. Fields the contract
    /// omits default to zero, matching how absent struct members read.
    pub fn from_scval(val: &ScVal) -> Result<Self, ChainError> {
        if !matches!(val, ScVal::Map(_)) {
            return Err(ChainError::Decode(format!(
                "position: expected map, got {}",
                val.kind()
            )));
        }
        let field = |name: &str| val.map_get(name).and_then(ScVal::as_i128).unwrap_or(0);
        Ok(Self {
            size: field("size"),
            notional: field("notional"),
            margin: field("margin"),
            funding_index: field("funding_index"),
        })
    }
}

/// Operations the bots consume from the exchange contract.
#[async_trait]
pub trait PerpExchange: Send + Sync {
    /// Read a trader's position; `None` when no position is open.
    async fn position(&self, trader: &str, symbol: &str) -> Result<Option<Position>, ChainError>;

    /// The exchange's mark price for a market (6-decimal fixed point).
    async fn mark_price(&self, symbol: &str) -> Result<i128, ChainError>;

    /// Refresh the funding index from the oracle. Returns the tx hash on
    /// confirmed success.
    async fn poke_funding(&self, symbol: &str) -> Result<String, ChainError>;

    /// Liquidate a trader's position, crediting the configured signer.
    async fn liquidate(&self, trader: &str, symbol: &str) -> Result<String, ChainError>;
}

/// Exchange contract bound to a contract id and signing client.
pub struct PerpContract {
    client: std::sync::Arc<ContractClient>,
    contract_id: String,
}

impl PerpContract {
    pub fn new(client: std::sync::Arc<ContractClient>, contract_id: String) -> Self {
        Self {
            client,
            contract_id,
        }
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub(crate) fn client(&self) -> &ContractClient {
        &self.client
    }
}

impl std::fmt::Debug for PerpContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerpContract")
            .field("contract_id", &self.contract_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PerpExchange for PerpContract {
    async fn position(&self, trader: &str, symbol: &str) -> Result<Option<Position>, ChainError> {
        let result = self
            .client
            .view(
                &self.contract_id,
                "get_position",
                vec![ScVal::address(trader)?, ScVal::sym(symbol)],
            )
            .await?;

        match result {
            ScVal::Void => Ok(None),
            map @ ScVal::Map(_) => Ok(Some(Position::from_scval(&map)?)),
            other => Err(ChainError::Decode(format!(
                "get_position: unexpected {} result",
                other.kind()
            ))),
        }
    }

    async fn mark_price(&self, symbol: &str) -> Result<i128, ChainError> {
        let result = self
            .client
            .view(&self.contract_id, "get_mark_price_view", vec![ScVal::sym(symbol)])
            .await?;

        result.as_i128().ok_or_else(|| {
            ChainError::Decode(format!(
                "get_mark_price_view: expected integer, got {}",
                result.kind()
            ))
        })
    }

    async fn poke_funding(&self, symbol: &str) -> Result<String, ChainError> {
        self.client
            .invoke(&self.contract_id, "poke_funding", vec![ScVal::sym(symbol)])
            .await
    }

    async fn liquidate(&self, trader: &str, symbol: &str) -> Result<String, ChainError> {
        self.client
            .invoke(
                &self.contract_id,
                "liquidate",
                vec![
                    ScVal::address(&self.client.account_id())?,
                    ScVal::address(trader)?,
                    ScVal::sym(symbol),
                ],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_from_map() {
        let val = ScVal::Map(vec![
            (ScVal::sym("funding_index"), ScVal::I128(3)),
            (ScVal::sym("margin"), ScVal::I128(1_000_000)),
            (ScVal::sym("notional"), ScVal::I128(20_000_000)),
            (ScVal::sym("size"), ScVal::I128(-10_000_000)),
        ]);

        let position = Position::from_scval(&val).unwrap();
        assert_eq!(position.size, -10_000_000);
        assert_eq!(position.notional, 20_000_000);
        assert_eq!(position.margin, 1_000_000);
        assert_eq!(position.funding_index, 3);
    }

    #[test]
    fn test_position_missing_fields_default_to_zero() {
        let val = ScVal::Map(vec![(ScVal::sym("size"), ScVal::I128(5))]);
        let position = Position::from_scval(&val).unwrap();
        assert_eq!(position.size, 5);
        assert_eq!(position.margin, 0);
    }

    #[test]
    fn test_position_rejects_non_map() {
        assert!(Position::from_scval(&ScVal::I128(1)).is_err());
        assert!(Position::from_scval(&ScVal::Void).is_err());
    }
}
