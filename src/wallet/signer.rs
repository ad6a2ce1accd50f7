//! Seed-phrase signing identity
//!
//! Keys are derived along `m/44'/784'/{index}'/0'/0'` (all hardened, as
//! ed25519 requires). The account address is the blake2b-256 hash of the
//! scheme flag followed by the public key.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use solana_sdk::derivation_path::DerivationPath;
use solana_sdk::signature::Signature;
use solana_sdk::signer::keypair::{
    generate_seed_from_seed_phrase_and_passphrase, keypair_from_seed_and_derivation_path, Keypair,
};
use solana_sdk::signer::Signer;
use tracing::debug;

use crate::error::{Error, Result};
use crate::ledger::Address;

type Blake2b256 = Blake2b<U32>;

/// Signature scheme flag for ed25519
pub const ED25519_FLAG: u8 = 0x00;

/// Intent prefix: transaction data, version 0, app id 0
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// Accepted seed phrase lengths in words
const PHRASE_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Anything able to sign transactions for one address
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Serialized signature over encoded transaction bytes
    fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<String>;
}

pub fn blake2b256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Address owned by an ed25519 public key
pub fn address_from_public_key(public_key: &[u8; 32]) -> Address {
    let mut data = Vec::with_capacity(33);
    data.push(ED25519_FLAG);
    data.extend_from_slice(public_key);
    Address::new(blake2b256(&data))
}

/// Digest actually signed for `tx_bytes`
pub fn transaction_digest(tx_bytes: &[u8]) -> [u8; 32] {
    let mut message = Vec::with_capacity(TRANSACTION_INTENT.len() + tx_bytes.len());
    message.extend_from_slice(&TRANSACTION_INTENT);
    message.extend_from_slice(tx_bytes);
    blake2b256(&message)
}

pub fn derivation_path(account_index: u32) -> String {
    format!("m/44'/784'/{}'/0'/0'", account_index)
}

/// Ed25519 key derived from a seed phrase
pub struct MnemonicSigner {
    keypair: Keypair,
    address: Address,
    account_index: u32,
}

impl MnemonicSigner {
    pub fn from_phrase(phrase: &str, account_index: u32) -> Result<Self> {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if !PHRASE_WORD_COUNTS.contains(&words.len()) {
            return Err(Error::InvalidKeypair(format!(
                "seed phrase has {} words, expected 12, 15, 18, 21 or 24",
                words.len()
            )));
        }

        let normalized = words.join(" ");
        let seed = generate_seed_from_seed_phrase_and_passphrase(&normalized, "");
        let path = DerivationPath::from_absolute_path_str(&derivation_path(account_index))
            .map_err(|e| Error::InvalidKeypair(format!("Bad derivation path: {}", e)))?;
        let keypair = keypair_from_seed_and_derivation_path(&seed, Some(path))
            .map_err(|e| Error::InvalidKeypair(format!("Key derivation failed: {}", e)))?;

        let address = address_from_public_key(&keypair.pubkey().to_bytes());
        debug!("Derived account {} at index {}", address.short_hex(), account_index);

        Ok(Self {
            keypair,
            address,
            account_index,
        })
    }

    /// Load the phrase from the named environment variable
    pub fn from_env(var: &str, account_index: u32) -> Result<Self> {
        let phrase = std::env::var(var).map_err(|_| Error::MissingEnvVar(var.to_string()))?;
        Self::from_phrase(&phrase, account_index)
    }

    pub fn account_index(&self) -> u32 {
        self.account_index
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.keypair.pubkey().to_bytes()
    }
}

impl TransactionSigner for MnemonicSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<String> {
        let digest = transaction_digest(tx_bytes);
        let signature = self.keypair.sign_message(&digest);

        let mut serialized = Vec::with_capacity(97);
        serialized.push(ED25519_FLAG);
        serialized.extend_from_slice(signature.as_ref());
        serialized.extend_from_slice(&self.public_key());
        Ok(BASE64.encode(serialized))
    }
}

/// Check a serialized signature against the bytes it claims to sign
pub fn verify_transaction(tx_bytes: &[u8], serialized: &str) -> Result<Address> {
    let raw = BASE64
        .decode(serialized)
        .map_err(|e| Error::Serialization(format!("Bad signature encoding: {}", e)))?;
    if raw.len() != 97 || raw[0] != ED25519_FLAG {
        return Err(Error::Serialization("unsupported signature layout".into()));
    }

    let signature = Signature::try_from(&raw[1..65])
        .map_err(|e| Error::Serialization(format!("Bad signature bytes: {}", e)))?;
    let mut public_key = [0u8; 32];
    public_key.copy_from_slice(&raw[65..]);

    if !signature.verify(&public_key, &transaction_digest(tx_bytes)) {
        return Err(Error::InvalidKeypair("signature does not verify".into()));
    }
    Ok(address_from_public_key(&public_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "film crazy soon outside stand loop subway crumble thrive popular green nuclear struggle pistol arm wife phrase warfare march wheat nephew ask sunny firm";

    #[test]
    fn test_derivation_is_deterministic() {
        let a = MnemonicSigner::from_phrase(PHRASE, 0).unwrap();
        let b = MnemonicSigner::from_phrase(&format!("  {}  ", PHRASE), 0).unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_account_index_changes_address() {
        let first = MnemonicSigner::from_phrase(PHRASE, 0).unwrap();
        let second = MnemonicSigner::from_phrase(PHRASE, 1).unwrap();
        assert_ne!(first.address(), second.address());
        assert_eq!(second.account_index(), 1);
    }

    #[test]
    fn test_address_matches_public_key() {
        let signer = MnemonicSigner::from_phrase(PHRASE, 0).unwrap();
        assert_eq!(signer.address(), address_from_public_key(&signer.public_key()));
    }

    #[test]
    fn test_signature_verifies() {
        let signer = MnemonicSigner::from_phrase(PHRASE, 0).unwrap();
        let tx = b"transaction bytes";

        let sig = signer.sign_transaction(tx).unwrap();
        assert_eq!(BASE64.decode(&sig).unwrap().len(), 97);
        assert_eq!(verify_transaction(tx, &sig).unwrap(), signer.address());
        assert!(verify_transaction(b"other bytes", &sig).is_err());
    }

    #[test]
    fn test_rejects_bad_phrase() {
        assert!(matches!(
            MnemonicSigner::from_phrase("too short", 0),
            Err(Error::InvalidKeypair(_))
        ));
    }

    #[test]
    fn test_missing_env_var() {
        assert!(matches!(
            MnemonicSigner::from_env("NAVI_TEST_PHRASE_THAT_IS_NOT_SET", 0),
            Err(Error::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_derivation_path_format() {
        assert_eq!(derivation_path(3), "m/44'/784'/3'/0'/0'");
    }

    #[test]
    fn test_blake2b256_empty() {
        assert_eq!(
            hex::encode(blake2b256(b"")),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }
}
