//! Error types for the ledger interaction layer.

use thiserror::Error;

/// Errors surfaced by the RPC client and the transaction pipeline.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Transport-level failure talking to the RPC endpoint.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Structured JSON-RPC error returned by the endpoint.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The simulation step rejected the transaction (contract-level error).
    #[error("simulation rejected: {0}")]
    Simulation(String),

    /// The endpoint refused the submitted transaction.
    #[error("submission rejected ({status}): {detail}")]
    Submission { status: String, detail: String },

    /// The transaction was included but failed on-chain.
    #[error("transaction {hash} failed on-chain")]
    TransactionFailed { hash: String },

    /// Confirmation polling exhausted its timeout. The transaction may still
    /// have succeeded; callers re-read ground truth on their next tick.
    #[error("no confirmation for {hash} within {timeout_secs}s")]
    ConfirmationTimeout { hash: String, timeout_secs: u64 },

    /// Account entry missing from the ledger (unfunded or mistyped key).
    #[error("account {0} not found on ledger")]
    AccountNotFound(String),

    /// Unexpected shape in an XDR payload or RPC response.
    #[error("decode error: {0}")]
    Decode(String),

    /// Malformed strkey (account id, secret seed, or contract id).
    #[error("invalid strkey: {0}")]
    Key(String),
}
