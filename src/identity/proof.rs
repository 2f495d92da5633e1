use std::fmt;
use std::fs;
use std::path::Path;

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SECRET_FILE: &str = "proof_secret";

/// Server-side key used to derive provider proofs.
///
/// The proof is a keyed hash of the provider's subject id, so the same
/// subject always maps to the same proof (and can be looked up through an
/// index) while the raw id is never written to the store.
#[derive(Clone)]
pub struct ProofKey(Vec<u8>);

impl ProofKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    /// Load the hex secret from `<data_dir>/proof_secret`, creating it on first run.
    pub fn load_or_create(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join(SECRET_FILE);

        if path.exists() {
            let raw = fs::read_to_string(&path)?;
            Ok(Self(hex::decode(raw.trim())?))
        } else {
            let bytes: [u8; 32] = rand::thread_rng().gen();
            fs::write(&path, hex::encode(bytes))?;
            tracing::info!("Created new proof secret at {}", path.display());
            Ok(Self(bytes.to_vec()))
        }
    }

    pub fn prove(&self, subject_id: &str) -> ExternalProof {
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.0) else {
            unreachable!("HMAC accepts keys of any length");
        };
        mac.update(subject_id.as_bytes());
        ExternalProof(hex::encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for ProofKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProofKey(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalProof(String);

impl ExternalProof {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_is_deterministic_per_key() {
        let key = ProofKey::new(b"secret".to_vec());
        assert_eq!(key.prove("google-123"), key.prove("google-123"));
        assert_ne!(key.prove("google-123"), key.prove("google-124"));
    }

    #[test]
    fn proof_depends_on_key() {
        let a = ProofKey::new(b"one".to_vec());
        let b = ProofKey::new(b"two".to_vec());
        assert_ne!(a.prove("subject"), b.prove("subject"));
    }

    #[test]
    fn proof_never_contains_subject() {
        let key = ProofKey::new(b"secret".to_vec());
        let proof = key.prove("subject-id-42");
        assert_eq!(proof.as_str().len(), 64);
        assert!(proof.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!proof.as_str().contains("subject"));
    }

    #[test]
    fn load_or_create_persists_secret() {
        let tmp = tempfile::tempdir().unwrap();
        let first = ProofKey::load_or_create(tmp.path()).unwrap();
        let second = ProofKey::load_or_create(tmp.path()).unwrap();
        assert_eq!(first.prove("x"), second.prove("x"));

        let raw = fs::read_to_string(tmp.path().join(SECRET_FILE)).unwrap();
        assert_eq!(raw.len(), 64);
    }
}
