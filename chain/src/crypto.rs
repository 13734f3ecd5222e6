//! Thin facade over the node's cryptographic primitives.
//!
//! Everything the protocol signs or hashes goes through this module:
//!
//! - Ed25519 keypair generation, signing, and verification
//!   (via `ed25519-dalek`),
//! - SHA-256 hashing to lowercase hex,
//! - deterministic message-ID derivation.
//!
//! Signatures cross the wire as base64 strings and hashes as lowercase
//! hex strings, so the facade produces and consumes those encodings
//! directly rather than raw byte arrays.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Generates a fresh Ed25519 keypair.
///
/// The secret half stays with the local node; the public half is what the
/// membership distributes to peers.
pub fn generate_keypair() -> (VerifyingKey, SigningKey) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    (verifying_key, signing_key)
}

/// Signs `data` with the given secret key, returning a base64 signature.
pub fn sign(data: &[u8], signing_key: &SigningKey) -> String {
    let signature = signing_key.sign(data);
    BASE64.encode(signature.to_bytes())
}

/// Verifies a base64 signature over `data` against a public key.
///
/// Any decoding failure (bad base64, wrong length) counts as an invalid
/// signature; callers drop the input and log at warn per the protocol's
/// error handling rules.
pub fn verify(data: &[u8], signature_b64: &str, verifying_key: &VerifyingKey) -> bool {
    let Ok(bytes) = BASE64.decode(signature_b64) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    verifying_key.verify(data, &signature).is_ok()
}

/// Computes the SHA-256 digest of `data` as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Derives the stable message identifier for a chat message.
///
/// `message_id = sha256_hex(content ∥ author_id ∥ timestamp)`, where the
/// timestamp is the decimal millisecond value. The same inputs always map
/// to the same id, which is what makes the pool's dedup keying work.
pub fn message_id(content: &str, author_id: &str, timestamp: u64) -> String {
    sha256_hex(format!("{content}{author_id}{timestamp}").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let (pk, sk) = generate_keypair();
        let sig = sign(b"turn 4: hello", &sk);

        assert!(verify(b"turn 4: hello", &sig, &pk));
        assert!(!verify(b"turn 4: hell0", &sig, &pk));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let (_, sk) = generate_keypair();
        let (other_pk, _) = generate_keypair();
        let sig = sign(b"payload", &sk);

        assert!(!verify(b"payload", &sig, &other_pk));
    }

    #[test]
    fn verify_rejects_garbage_signature() {
        let (pk, _) = generate_keypair();

        assert!(!verify(b"payload", "not-base64!!", &pk));
        assert!(!verify(b"payload", "QUJD", &pk)); // valid base64, wrong length
    }

    #[test]
    fn sha256_hex_known_vector() {
        // SHA-256("abc"), lowercase hex.
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn message_id_is_deterministic() {
        let a = message_id("hi", "alice", 1_700_000_000_000);
        let b = message_id("hi", "alice", 1_700_000_000_000);
        let c = message_id("hi", "alice", 1_700_000_000_001);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
