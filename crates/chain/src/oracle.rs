//! Oracle price reader.
//!
//! Queries the oracle contract's `lastprice`/`decimals` methods and rescales
//! every price to the exchange's 6-decimal fixed-point representation. The
//! decimal exponent is fetched once and cached for the process lifetime.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::contract::ContractClient;
use crate::error::ChainError;
use crate::scval::ScVal;

/// Decimal places of the exchange's fixed-point prices.
pub const PRICE_DECIMALS: u32 = 6;

/// Exponent assumed when the oracle's `decimals` method is unreachable.
const DEFAULT_ORACLE_DECIMALS: u32 = 14;

/// Errors specific to oracle price reads.
///
/// `NoPrice` and `Malformed` are deliberately distinct: an oracle that
/// answers "no price for this asset" is not the same failure as a payload we
/// cannot interpret, and neither may ever be read as price zero.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle returned no price")]
    NoPrice,

    #[error("malformed price payload: {0}")]
    Malformed(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// A price observation rescaled to 6 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OraclePrice {
    pub price: i128,
    /// Unix seconds of the oracle's observation.
    pub timestamp: u64,
}

impl OraclePrice {
    /// Age in seconds relative to `now`.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    /// Strictly older than `max_age_secs`: a price exactly at the boundary
    /// is still acceptable.
    pub fn is_stale(&self, max_age_secs: u64, now: u64) -> bool {
        self.age(now) > max_age_secs
    }
}

/// Price source abstraction consumed by the funding updater.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn last_price(&self, symbol: &str) -> Result<OraclePrice, OracleError>;
}

/// Oracle contract client.
pub struct OracleContract {
    client: Arc<ContractClient>,
    contract_id: String,
    /// Cached decimal exponent, fetched on first use.
    decimals: RwLock<Option<u32>>,
}

impl OracleContract {
    pub fn new(client: Arc<ContractClient>, contract_id: String) -> Self {
        Self {
            client,
            contract_id,
            decimals: RwLock::new(None),
        }
    }

    async fn decimals(&self) -> u32 {
        if let Some(cached) = *self.decimals.read() {
            return cached;
        }

        let fetched = match self.client.view(&self.contract_id, "decimals", vec![]).await {
            Ok(val) => match val.as_u32() {
                Some(d) => d,
                None => {
                    warn!(
                        got = val.kind(),
                        default = DEFAULT_ORACLE_DECIMALS,
                        "oracle decimals had unexpected shape, using default"
                    );
                    DEFAULT_ORACLE_DECIMALS
                }
            },
            Err(e) => {
                warn!(
                    error = %e,
                    default = DEFAULT_ORACLE_DECIMALS,
                    "oracle decimals unreachable, using default"
                );
                DEFAULT_ORACLE_DECIMALS
            }
        };

        *self.decimals.write() = Some(fetched);
        debug!(decimals = fetched, "cached oracle decimal exponent");
        fetched
    }
}

impl std::fmt::Debug for OracleContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleContract")
            .field("contract_id", &self.contract_id)
            .field("decimals", &*self.decimals.read())
            .finish()
    }
}

#[async_trait]
impl PriceFeed for OracleContract {
    async fn last_price(&self, symbol: &str) -> Result<OraclePrice, OracleError> {
        // Asset::Other(symbol) encodes as a two-symbol vector.
        let asset = ScVal::Vec(vec![ScVal::sym("Other"), ScVal::sym(symbol)]);
        let raw = self
            .client
            .view(&self.contract_id, "lastprice", vec![asset])
            .await?;

        let observed = decode_price(&raw)?;
        let decimals = self.decimals().await;
        Ok(OraclePrice {
            price: rescale(observed.price, decimals),
            timestamp: observed.timestamp,
        })
    }
}

/// Rescale a raw oracle price to [`PRICE_DECIMALS`] by integer division.
pub fn rescale(price: i128, from_decimals: u32) -> i128 {
    if from_decimals >= PRICE_DECIMALS {
        price / 10i128.pow(from_decimals - PRICE_DECIMALS)
    } else {
        price * 10i128.pow(PRICE_DECIMALS - from_decimals)
    }
}

/// Normalize the oracle's `Option<Price>` result.
///
/// Observed wire shapes: `Void` for `None`, a bare `{price, timestamp}` map,
/// or a tagged `["Some"|"None", value]` vector.
fn decode_price(val: &ScVal) -> Result<OraclePrice, OracleError> {
    match val {
        ScVal::Void => Err(OracleError::NoPrice),
        ScVal::Map(_) => price_from_map(val),
        ScVal::Vec(items) => {
            let tag = items
                .first()
                .and_then(ScVal::as_symbol)
                .ok_or_else(|| OracleError::Malformed("tagged variant without symbol tag".into()))?;
            match tag {
                "None" | "none" => Err(OracleError::NoPrice),
                "Some" | "some" => {
                    let inner = items.get(1).ok_or_else(|| {
                        OracleError::Malformed("Some variant without payload".into())
                    })?;
                    price_from_map(inner)
                }
                other => Err(OracleError::Malformed(format!("unknown variant tag {other:?}"))),
            }
        }
        other => Err(OracleError::Malformed(format!(
            "unexpected {} result",
            other.kind()
        ))),
    }
}

fn price_from_map(val: &ScVal) -> Result<OraclePrice, OracleError> {
    if !matches!(val, ScVal::Map(_)) {
        return Err(OracleError::Malformed(format!(
            "expected price record, got {}",
            val.kind()
        )));
    }
    let price = val
        .map_get("price")
        .and_then(ScVal::as_i128)
        .ok_or_else(|| OracleError::Malformed("missing price field".into()))?;
    let timestamp = val
        .map_get("timestamp")
        .and_then(ScVal::as_timestamp)
        .ok_or_else(|| OracleError::Malformed("missing timestamp field".into()))?;
    Ok(OraclePrice { price, timestamp })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price_map(price: i128, timestamp: u64) -> ScVal {
        ScVal::Map(vec![
            (ScVal::sym("price"), ScVal::I128(price)),
            (ScVal::sym("timestamp"), ScVal::U64(timestamp)),
        ])
    }

    #[test]
    fn test_decode_bare_record() {
        let p = decode_price(&price_map(42, 1_700_000_000)).unwrap();
        assert_eq!(p.price, 42);
        assert_eq!(p.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_decode_tagged_some() {
        let val = ScVal::Vec(vec![ScVal::sym("Some"), price_map(7, 9)]);
        let p = decode_price(&val).unwrap();
        assert_eq!(p.price, 7);
    }

    #[test]
    fn test_none_and_malformed_are_distinct_errors() {
        assert!(matches!(
            decode_price(&ScVal::Void),
            Err(OracleError::NoPrice)
        ));
        assert!(matches!(
            decode_price(&ScVal::Vec(vec![ScVal::sym("None")])),
            Err(OracleError::NoPrice)
        ));

        // A record missing its price field is malformed, never price zero.
        let broken = ScVal::Map(vec![(ScVal::sym("timestamp"), ScVal::U64(1))]);
        assert!(matches!(
            decode_price(&broken),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(
            decode_price(&ScVal::I128(5)),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_rescale_truncates_within_one_unit() {
        let raw = 123_456_789_012_345_678i128;
        for decimals in PRICE_DECIMALS..=18 {
            let scaled = rescale(raw, decimals);
            let back = scaled * 10i128.pow(decimals - PRICE_DECIMALS);
            assert!(back <= raw);
            assert!(raw - back < 10i128.pow(decimals - PRICE_DECIMALS));
        }
    }

    #[test]
    fn test_rescale_fourteen_to_six() {
        // 2.5 at 14 decimals -> 2.5 at 6 decimals.
        assert_eq!(rescale(250_000_000_000_000, 14), 2_500_000);
        // Exponents below six scale up.
        assert_eq!(rescale(2_500, 3), 2_500_000);
    }

    #[test]
    fn test_staleness_boundary_is_strict() {
        let price = OraclePrice {
            price: 1,
            timestamp: 1_000,
        };
        assert!(!price.is_stale(900, 1_900)); // exactly 900s old: acceptable
        assert!(price.is_stale(900, 1_901)); // 901s old: stale
        assert_eq!(price.age(900), 0); // clock skew clamps to zero
    }
}
