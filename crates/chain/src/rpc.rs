//! JSON-RPC client for a Soroban RPC endpoint.
//!
//! Thin typed wrapper over the methods the bots consume: latest ledger,
//! account sequence lookup, transaction simulate/send/get, contract events,
//! and the friendbot airdrop for throwaway accounts.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ChainError;
use crate::strkey;
use crate::xdr::{XdrReader, XdrWriter};

/// Soroban RPC client.
pub struct SorobanRpc {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// `getLatestLedger` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestLedger {
    pub sequence: u32,
}

/// `getNetwork` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub passphrase: String,
    #[serde(default)]
    pub friendbot_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerEntries {
    #[serde(default)]
    entries: Option<Vec<LedgerEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerEntry {
    xdr: String,
}

/// `simulateTransaction` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub transaction_data: Option<String>,
    /// Stringified stroop amount.
    #[serde(default)]
    pub min_resource_fee: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<SimulateResult>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResult {
    #[serde(default)]
    pub auth: Vec<String>,
    pub xdr: String,
}

/// `sendTransaction` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub status: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub error_result_xdr: Option<String>,
}

/// `getTransaction` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionResponse {
    pub status: String,
}

/// One raw contract event from `getEvents`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default)]
    pub contract_id: String,
    #[serde(default)]
    pub topic: Vec<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub ledger: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventsParams {
    start_ledger: u32,
    filters: Vec<EventFilter>,
    pagination: Pagination,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventFilter {
    #[serde(rename = "type")]
    kind: &'static str,
    contract_ids: Vec<String>,
    topics: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct Pagination {
    limit: u32,
}

impl SorobanRpc {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<T, ChainError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response: RpcResponse<T> = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        response.result.ok_or_else(|| {
            ChainError::Decode(format!("{method}: response carried neither result nor error"))
        })
    }

    /// Current ledger sequence number.
    pub async fn latest_ledger(&self) -> Result<u32, ChainError> {
        let ledger: LatestLedger = self.call("getLatestLedger", serde_json::json!({})).await?;
        Ok(ledger.sequence)
    }

    /// Network metadata (passphrase, friendbot URL).
    pub async fn network(&self) -> Result<NetworkInfo, ChainError> {
        self.call("getNetwork", serde_json::json!({})).await
    }

    /// Current sequence number of an account, read from its ledger entry.
    pub async fn account_sequence(&self, public_key: &[u8; 32]) -> Result<i64, ChainError> {
        let key = account_ledger_key(public_key);
        let entries: LedgerEntries = self
            .call("getLedgerEntries", serde_json::json!({ "keys": [key] }))
            .await?;

        let entry = entries
            .entries
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| ChainError::AccountNotFound(strkey::encode_account(public_key)))?;

        decode_account_sequence(&entry.xdr)
    }

    pub async fn simulate_transaction(
        &self,
        envelope_base64: &str,
    ) -> Result<SimulateResponse, ChainError> {
        self.call(
            "simulateTransaction",
            serde_json::json!({ "transaction": envelope_base64 }),
        )
        .await
    }

    pub async fn send_transaction(&self, envelope_base64: &str) -> Result<SendResponse, ChainError> {
        self.call(
            "sendTransaction",
            serde_json::json!({ "transaction": envelope_base64 }),
        )
        .await
    }

    pub async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse, ChainError> {
        self.call("getTransaction", serde_json::json!({ "hash": hash }))
            .await
    }

    /// Contract events since `start_ledger`, filtered to one contract and a
    /// set of leading topic symbols (base64-encoded ScVal symbols).
    pub async fn contract_events(
        &self,
        start_ledger: u32,
        contract_id: &str,
        leading_topics: &[String],
    ) -> Result<Vec<RawEvent>, ChainError> {
        let topics = leading_topics
            .iter()
            .map(|t| vec![t.clone(), "*".to_string(), "*".to_string()])
            .collect();

        let params = EventsParams {
            start_ledger,
            filters: vec![EventFilter {
                kind: "contract",
                contract_ids: vec![contract_id.to_string()],
                topics,
            }],
            pagination: Pagination { limit: 100 },
        };

        let response: EventsResponse = self.call("getEvents", params).await?;
        debug!(
            start_ledger,
            count = response.events.len(),
            "fetched contract events"
        );
        Ok(response.events)
    }

    /// Fund an account through the network's friendbot (testnets only).
    pub async fn request_airdrop(&self, account_id: &str) -> Result<(), ChainError> {
        let network = self.network().await?;
        let friendbot = network.friendbot_url.ok_or_else(|| ChainError::Rpc {
            code: -1,
            message: "network exposes no friendbot".into(),
        })?;

        self.client
            .get(&friendbot)
            .query(&[("addr", account_id)])
            .send()
            .await?
            .error_for_status()?;

        debug!(account = %account_id, "friendbot airdrop requested");
        Ok(())
    }
}

impl std::fmt::Debug for SorobanRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SorobanRpc").field("url", &self.url).finish()
    }
}

/// Base64 XDR `LedgerKey` for an account entry.
fn account_ledger_key(public_key: &[u8; 32]) -> String {
    let mut w = XdrWriter::new();
    w.u32(0); // ACCOUNT
    w.u32(0); // PUBLIC_KEY_TYPE_ED25519
    w.bytes_fixed(public_key);
    BASE64.encode(w.finish())
}

/// Pull the sequence number out of a base64 `LedgerEntryData` for an account.
fn decode_account_sequence(entry_xdr: &str) -> Result<i64, ChainError> {
    let raw = BASE64
        .decode(entry_xdr)
        .map_err(|e| ChainError::Decode(format!("invalid base64 ledger entry: {e}")))?;
    let mut r = XdrReader::new(&raw);

    let kind = r.u32()?;
    if kind != 0 {
        return Err(ChainError::Decode(format!(
            "expected account ledger entry, got discriminant {kind}"
        )));
    }
    let key_type = r.u32()?;
    if key_type != 0 {
        return Err(ChainError::Decode(format!(
            "unsupported account key type {key_type}"
        )));
    }
    r.bytes_fixed(32)?; // account id
    r.i64()?; // balance
    r.i64() // seqNum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_ledger_key_shape() {
        let key = account_ledger_key(&[3u8; 32]);
        let raw = BASE64.decode(key).unwrap();
        // 4 (entry type) + 4 (key type) + 32 (key)
        assert_eq!(raw.len(), 40);
        assert_eq!(&raw[..8], &[0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_account_sequence() {
        let mut w = XdrWriter::new();
        w.u32(0); // ACCOUNT
        w.u32(0); // PUBLIC_KEY_TYPE_ED25519
        w.bytes_fixed(&[9u8; 32]);
        w.i64(5_000_000_000); // balance
        w.i64(12_884_901_889); // seqNum
        let encoded = BASE64.encode(w.finish());

        assert_eq!(decode_account_sequence(&encoded).unwrap(), 12_884_901_889);
    }

    #[test]
    fn test_decode_rejects_non_account_entry() {
        let mut w = XdrWriter::new();
        w.u32(6); // CONTRACT_DATA
        let encoded = BASE64.encode(w.finish());
        assert!(matches!(
            decode_account_sequence(&encoded),
            Err(ChainError::Decode(_))
        ));
    }
}
