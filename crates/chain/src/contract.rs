//! High-level contract invocation over the RPC client.
//!
//! `view` covers read-only calls (simulate and decode the return value);
//! `invoke` runs the full mutating pipeline: simulate, prepare, sign, submit,
//! then poll for confirmation under a bounded timeout. Submission is
//! at-most-once per call; a confirmation timeout is reported as an error and
//! left for the caller's next tick to reconcile against ledger state.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::ChainError;
use crate::keypair::Keypair;
use crate::rpc::{SimulateResponse, SorobanRpc};
use crate::scval::ScVal;
use crate::strkey;
use crate::transaction::{network_id, Transaction};

/// Validity window for read-only simulations.
const VIEW_TIMEOUT_SECS: u64 = 30;
/// Default bound on confirmation polling.
const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(300);
/// Delay between confirmation polls.
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Signing contract client bound to one account and one network.
pub struct ContractClient {
    rpc: Arc<SorobanRpc>,
    keypair: Keypair,
    network_id: [u8; 32],
    confirm_timeout: Duration,
}

impl ContractClient {
    pub fn new(rpc: Arc<SorobanRpc>, keypair: Keypair, network_passphrase: &str) -> Self {
        Self {
            rpc,
            keypair,
            network_id: network_id(network_passphrase),
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    /// Override the confirmation polling bound.
    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// `G...` account id of the signing key.
    pub fn account_id(&self) -> String {
        self.keypair.account_id()
    }

    /// The underlying RPC client.
    pub fn rpc(&self) -> &SorobanRpc {
        &self.rpc
    }

    async fn build(
        &self,
        contract_id: &str,
        function: &str,
        args: Vec<ScVal>,
        timeout_secs: u64,
    ) -> Result<Transaction, ChainError> {
        let contract = strkey::decode_contract(contract_id)?;
        let sequence = self
            .rpc
            .account_sequence(&self.keypair.public_key())
            .await?;
        Ok(
            Transaction::new(self.keypair.public_key(), sequence + 1, contract, function, args)
                .with_timeout(timeout_secs),
        )
    }

    /// Read-only call: simulate and decode the return value.
    pub async fn view(
        &self,
        contract_id: &str,
        function: &str,
        args: Vec<ScVal>,
    ) -> Result<ScVal, ChainError> {
        let tx = self
            .build(contract_id, function, args, VIEW_TIMEOUT_SECS)
            .await?;
        let sim = self.rpc.simulate_transaction(&tx.envelope_base64()).await?;

        if let Some(error) = sim.error {
            return Err(ChainError::Simulation(error));
        }
        let result = sim
            .results
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| ChainError::Decode(format!("{function}: simulation had no result")))?;
        ScVal::from_base64(&result.xdr)
    }

    /// Mutating call: full simulate → prepare → sign → submit → confirm
    /// pipeline. Returns the transaction hash on confirmed success.
    pub async fn invoke(
        &self,
        contract_id: &str,
        function: &str,
        args: Vec<ScVal>,
    ) -> Result<String, ChainError> {
        let mut tx = self
            .build(contract_id, function, args, self.confirm_timeout.as_secs())
            .await?;

        let sim = self.rpc.simulate_transaction(&tx.envelope_base64()).await?;
        if let Some(error) = sim.error {
            return Err(ChainError::Simulation(error));
        }
        let (resource_data, auth, resource_fee) = prepare_inputs(sim)?;
        tx.apply_simulation(resource_data, auth, resource_fee);

        // The hash is known before submission; polling uses it even when the
        // endpoint's response omits one.
        let hash = hex::encode(tx.hash(&self.network_id));
        let envelope = tx.signed_envelope_base64(&self.keypair, &self.network_id);
        let submitted = self.rpc.send_transaction(&envelope).await?;

        match submitted.status.as_str() {
            "PENDING" | "DUPLICATE" => {}
            status => {
                return Err(ChainError::Submission {
                    status: status.to_string(),
                    detail: submitted
                        .error_result_xdr
                        .unwrap_or_else(|| "no error detail".into()),
                });
            }
        }

        info!(
            function = %function,
            hash = %hash,
            "transaction submitted, awaiting confirmation"
        );
        self.await_confirmation(&hash).await?;
        Ok(hash)
    }

    /// Poll `getTransaction` until the status leaves NOT_FOUND, bounded by
    /// the configured timeout.
    async fn await_confirmation(&self, hash: &str) -> Result<(), ChainError> {
        let deadline = Instant::now() + self.confirm_timeout;

        loop {
            let status = self.rpc.get_transaction(hash).await?;
            match status.status.as_str() {
                "SUCCESS" => {
                    debug!(hash = %hash, "transaction confirmed");
                    return Ok(());
                }
                "FAILED" => {
                    return Err(ChainError::TransactionFailed {
                        hash: hash.to_string(),
                    });
                }
                _ => {} // NOT_FOUND: still pending
            }

            if Instant::now() >= deadline {
                warn!(hash = %hash, "confirmation polling timed out");
                return Err(ChainError::ConfirmationTimeout {
                    hash: hash.to_string(),
                    timeout_secs: self.confirm_timeout.as_secs(),
                });
            }
            sleep(CONFIRM_POLL_INTERVAL).await;
        }
    }
}

impl std::fmt::Debug for ContractClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractClient")
            .field("account_id", &self.keypair.account_id())
            .field("rpc", &self.rpc.url())
            .finish_non_exhaustive()
    }
}

/// Extract the prepare-step inputs from a successful simulation.
fn prepare_inputs(sim: SimulateResponse) -> Result<(Vec<u8>, Vec<Vec<u8>>, u64), ChainError> {
    let resource_data = sim
        .transaction_data
        .as_deref()
        .ok_or_else(|| ChainError::Decode("simulation returned no transaction data".into()))
        .and_then(|data| {
            BASE64
                .decode(data)
                .map_err(|e| ChainError::Decode(format!("invalid base64 transaction data: {e}")))
        })?;

    let resource_fee = sim
        .min_resource_fee
        .as_deref()
        .unwrap_or("0")
        .parse::<u64>()
        .map_err(|e| ChainError::Decode(format!("unparseable min resource fee: {e}")))?;

    let mut auth = Vec::new();
    if let Some(results) = sim.results {
        for result in results {
            for entry in result.auth {
                auth.push(BASE64.decode(&entry).map_err(|e| {
                    ChainError::Decode(format!("invalid base64 auth entry: {e}"))
                })?);
            }
        }
    }

    Ok((resource_data, auth, resource_fee))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::SimulateResult;

    fn sim(data: Option<&str>, fee: Option<&str>) -> SimulateResponse {
        SimulateResponse {
            error: None,
            transaction_data: data.map(str::to_string),
            min_resource_fee: fee.map(str::to_string),
            results: Some(vec![SimulateResult {
                auth: vec![BASE64.encode([1u8, 2, 3, 4])],
                xdr: ScVal::Void.to_base64(),
            }]),
        }
    }

    #[test]
    fn test_prepare_inputs_decodes_all_parts() {
        let response = sim(Some(&BASE64.encode([7u8; 8])), Some("2500"));
        let (data, auth, fee) = prepare_inputs(response).unwrap();
        assert_eq!(data, vec![7u8; 8]);
        assert_eq!(auth, vec![vec![1u8, 2, 3, 4]]);
        assert_eq!(fee, 2500);
    }

    #[test]
    fn test_prepare_inputs_requires_transaction_data() {
        assert!(matches!(
            prepare_inputs(sim(None, Some("1"))),
            Err(ChainError::Decode(_))
        ));
    }

    #[test]
    fn test_prepare_inputs_rejects_bad_fee() {
        let response = sim(Some(&BASE64.encode([0u8; 4])), Some("not-a-number"));
        assert!(matches!(
            prepare_inputs(response),
            Err(ChainError::Decode(_))
        ));
    }
}
