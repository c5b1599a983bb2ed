//! FlashPerp ledger interaction layer.
//!
//! This crate provides:
//! - A typed JSON-RPC client for the Soroban RPC surface
//! - The simulate → prepare → sign → submit → confirm transaction pipeline
//! - Exchange and oracle contract clients behind trait seams
//! - Position event queries and decoding
//! - Strkey/XDR plumbing for the handful of structures the bots touch
//!
//! Everything network-facing returns [`ChainError`]; oracle reads add their
//! own [`OracleError`] taxonomy on top.

mod contract;
mod error;
mod events;
mod exchange;
mod keypair;
mod oracle;
mod rpc;
mod scval;
pub mod strkey;
mod transaction;
mod xdr;

pub use contract::ContractClient;
pub use error::ChainError;
pub use events::{EventSource, PositionEvent, PositionEventKind};
pub use exchange::{PerpContract, PerpExchange, Position};
pub use keypair::Keypair;
pub use oracle::{rescale, OracleContract, OracleError, OraclePrice, PriceFeed, PRICE_DECIMALS};
pub use rpc::{
    GetTransactionResponse, LatestLedger, NetworkInfo, RawEvent, SendResponse, SimulateResponse,
    SimulateResult, SorobanRpc,
};
pub use transaction::{network_id, Transaction, BASE_FEE};
