//! Ed25519 signing account

use crate::error::{BotError, Result};
use ed25519_dalek::{Signer, SigningKey};

/// AIP-80 prefix some wallets export keys with
const AIP80_PREFIX: &str = "ed25519-priv-";

/// Key material plus the address it signs for
#[derive(Clone)]
pub struct LocalAccount {
    address: String,
    key: SigningKey,
}

impl std::fmt::Debug for LocalAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAccount")
            .field("address", &self.address)
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

impl LocalAccount {
    /// Parse a hex private key (`0x`-prefixed, bare, or AIP-80)
    pub fn from_private_key(address: &str, private_key: &str) -> Result<Self> {
        let key_hex = private_key
            .trim()
            .trim_start_matches(AIP80_PREFIX)
            .trim_start_matches("0x");

        let bytes = hex::decode(key_hex)
            .map_err(|e| BotError::Validation(format!("Invalid privateKey: {}", e)))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            BotError::Validation(format!(
                "Invalid privateKey: expected 32 bytes, got {}",
                b.len()
            ))
        })?;

        Ok(Self {
            address: address.to_string(),
            key: SigningKey::from_bytes(&bytes),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.key.verifying_key().to_bytes()))
    }

    /// Sign the BCS signing message returned by `encode_submission`
    pub fn sign_hex(&self, message: &[u8]) -> String {
        let signature = self.key.sign(message);
        format!("0x{}", hex::encode(signature.to_bytes()))
    }
}
