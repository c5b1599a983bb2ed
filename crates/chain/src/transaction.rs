//! Single-operation contract invocation envelopes.
//!
//! The bots only ever build one shape of transaction: one
//! invoke-host-function operation calling a contract method. Resource
//! footprint and authorization entries produced by simulation are spliced in
//! verbatim before signing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::keypair::Keypair;
use crate::scval::ScVal;
use crate::xdr::XdrWriter;

/// Base fee in stroops for a single-operation transaction.
pub const BASE_FEE: u32 = 100;

const ENVELOPE_TYPE_TX: u32 = 2;
const PRECOND_NONE: u32 = 0;
const PRECOND_TIME: u32 = 1;
const MEMO_NONE: u32 = 0;
const OP_INVOKE_HOST_FUNCTION: u32 = 24;
const HOST_FUNCTION_INVOKE_CONTRACT: u32 = 0;

/// Network id: SHA-256 of the network passphrase.
pub fn network_id(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

/// An invoke-contract transaction under construction.
#[derive(Debug, Clone)]
pub struct Transaction {
    source: [u8; 32],
    fee: u32,
    seq_num: i64,
    time_bounds_max: Option<u64>,
    contract: [u8; 32],
    function: String,
    args: Vec<ScVal>,
    /// Raw `SorobanTransactionData` XDR from simulation.
    resource_data: Option<Vec<u8>>,
    /// Raw `SorobanAuthorizationEntry` XDR blobs from simulation.
    auth: Vec<Vec<u8>>,
}

impl Transaction {
    pub fn new(
        source: [u8; 32],
        seq_num: i64,
        contract: [u8; 32],
        function: &str,
        args: Vec<ScVal>,
    ) -> Self {
        Self {
            source,
            fee: BASE_FEE,
            seq_num,
            time_bounds_max: None,
            contract,
            function: function.to_string(),
            args,
            resource_data: None,
            auth: Vec::new(),
        }
    }

    /// Set an absolute validity deadline `timeout` seconds from now.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.time_bounds_max = Some(now + timeout_secs);
        self
    }

    /// Attach the resource footprint, authorization entries and resource fee
    /// returned by simulation. Must run before signing.
    pub fn apply_simulation(&mut self, resource_data: Vec<u8>, auth: Vec<Vec<u8>>, resource_fee: u64) {
        self.resource_data = Some(resource_data);
        self.auth = auth;
        self.fee = self
            .fee
            .saturating_add(resource_fee.min(u32::MAX as u64) as u32);
    }

    /// XDR of the transaction body (without envelope framing or signatures).
    fn body(&self) -> Vec<u8> {
        let mut w = XdrWriter::new();

        // sourceAccount: MuxedAccount, KEY_TYPE_ED25519
        w.u32(0);
        w.bytes_fixed(&self.source);

        w.u32(self.fee);
        w.i64(self.seq_num);

        // cond: Preconditions
        match self.time_bounds_max {
            Some(max) => {
                w.u32(PRECOND_TIME);
                w.u64(0); // minTime
                w.u64(max);
            }
            None => w.u32(PRECOND_NONE),
        }

        w.u32(MEMO_NONE);

        // operations<>
        w.u32(1);
        w.u32(0); // no per-operation source account
        w.u32(OP_INVOKE_HOST_FUNCTION);
        w.u32(HOST_FUNCTION_INVOKE_CONTRACT);
        // InvokeContractArgs
        w.u32(1); // SC_ADDRESS_TYPE_CONTRACT
        w.bytes_fixed(&self.contract);
        w.string(&self.function);
        w.u32(self.args.len() as u32);
        for arg in &self.args {
            arg.write(&mut w);
        }
        // auth<>
        w.u32(self.auth.len() as u32);
        for entry in &self.auth {
            w.bytes_fixed(entry);
        }

        // ext
        match &self.resource_data {
            Some(data) => {
                w.u32(1);
                w.bytes_fixed(data);
            }
            None => w.u32(0),
        }

        w.finish()
    }

    /// Hash that identifies the transaction and doubles as the signature
    /// payload: SHA-256 over network id, envelope type and body.
    pub fn hash(&self, network_id: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(network_id);
        hasher.update(ENVELOPE_TYPE_TX.to_be_bytes());
        hasher.update(self.body());
        hasher.finalize().into()
    }

    /// Base64 envelope without signatures, as fed to simulation.
    pub fn envelope_base64(&self) -> String {
        self.envelope(&[])
    }

    /// Sign with `keypair` on the given network and return the envelope.
    pub fn signed_envelope_base64(&self, keypair: &Keypair, network_id: &[u8; 32]) -> String {
        let signature = keypair.sign(&self.hash(network_id));
        self.envelope(&[(keypair.hint(), signature)])
    }

    fn envelope(&self, signatures: &[([u8; 4], [u8; 64])]) -> String {
        let mut w = XdrWriter::new();
        w.u32(ENVELOPE_TYPE_TX);
        w.bytes_fixed(&self.body());
        w.u32(signatures.len() as u32);
        for (hint, signature) in signatures {
            w.bytes_fixed(hint);
            w.bytes_var(signature);
        }
        BASE64.encode(w.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    fn sample() -> Transaction {
        Transaction::new(
            [1u8; 32],
            42,
            [2u8; 32],
            "poke_funding",
            vec![ScVal::sym("XLM")],
        )
    }

    #[test]
    fn test_hash_depends_on_network() {
        let tx = sample();
        let testnet = network_id("Test SDF Network ; September 2015");
        let mainnet = network_id("Public Global Stellar Network ; September 2015");
        assert_ne!(tx.hash(&testnet), tx.hash(&mainnet));
    }

    #[test]
    fn test_simulation_bumps_fee_and_body() {
        let mut tx = sample();
        let net = network_id("test");
        let unprepared = tx.hash(&net);

        tx.apply_simulation(vec![0u8; 8], vec![], 5_000);
        assert_ne!(tx.hash(&net), unprepared);

        let plain = sample().envelope_base64();
        let prepared = tx.envelope_base64();
        assert_ne!(plain, prepared);
    }

    #[test]
    fn test_signed_envelope_signature_verifies() {
        let keypair = Keypair::random();
        let net = network_id("Test SDF Network ; September 2015");
        let tx = sample();
        let envelope = tx.signed_envelope_base64(&keypair, &net);

        // The signature embedded in the envelope tail must verify against the
        // transaction hash.
        let raw = BASE64.decode(envelope).unwrap();
        let sig_bytes: [u8; 64] = raw[raw.len() - 64..].try_into().unwrap();
        let verifying = VerifyingKey::from_bytes(&keypair.public_key()).unwrap();
        assert!(verifying
            .verify(&tx.hash(&net), &Signature::from_bytes(&sig_bytes))
            .is_ok());
    }

    #[test]
    fn test_timeout_sets_upper_time_bound() {
        let tx = sample().with_timeout(30);
        assert!(tx.time_bounds_max.is_some());
    }
}
