//! Ed25519 signing keys addressed by strkey.

use ed25519_dalek::{Signer, SigningKey};

use crate::error::ChainError;
use crate::strkey;

/// Signing keypair for a ledger account.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Parse an `S...` secret seed strkey.
    pub fn from_secret(secret: &str) -> Result<Self, ChainError> {
        let seed = strkey::decode_seed(secret)?;
        Ok(Self {
            signing: SigningKey::from_bytes(&seed),
        })
    }

    /// Generate a throwaway keypair (used with a friendbot airdrop to pay
    /// simulation fees without touching an operator key).
    pub fn random() -> Self {
        Self {
            signing: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Raw ed25519 public key.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// `G...` account id.
    pub fn account_id(&self) -> String {
        strkey::encode_account(&self.public_key())
    }

    /// Signature hint: the trailing four bytes of the public key.
    pub fn hint(&self) -> [u8; 4] {
        let pk = self.public_key();
        [pk[28], pk[29], pk[30], pk[31]]
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("account_id", &self.account_id())
            .finish_non_exhaustive()
    }
}
