//! # Digital Signatures
//!
//! Ed25519 signing and verification — the backbone of authentication in LIEN.
//!
//! Every off-protocol proposal is consummated by checking a signature over
//! its digest. This module provides the signing/verification functions and,
//! more importantly, the [`SignatureScheme`] seam that decides *what counts
//! as a valid signature for a given address*.
//!
//! ## Why a trait and not just a function?
//!
//! Addresses in LIEN are hashes of Ed25519 public keys, so the obvious rule
//! is "the attached key must hash to the signer's address and the signature
//! must verify." That rule lives in [`Ed25519Scheme`] and is the default
//! everywhere. But some signers aren't single keys — custodial desks,
//! multi-party wallets, hardware-backed policy engines. Those plug in
//! through the same trait without the proposal engine knowing or caring.
//!
//! ## Strictness
//!
//! We use `ed25519-dalek`'s strict verification by default. This means we
//! reject some edge-case signatures that lenient implementations accept.
//! This is deliberate: stricter is safer, and we don't need to be
//! compatible with legacy Ed25519 implementations that get the cofactor
//! wrong.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::keys::{LienKeypair, LienPublicKey, LienSignature};
use crate::identity::Address;

/// Errors during signature operations.
///
/// Intentionally vague — we don't tell attackers why verification failed.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignatureBytes,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Sign a message using a LIEN keypair.
///
/// Produces a 64-byte Ed25519 signature over the given message bytes.
/// The signature is deterministic — signing the same message with the same
/// key will always produce the same signature (RFC 8032). No nonce reuse
/// bugs possible. Thank you, Bernstein.
///
/// # Example
///
/// ```
/// use lien_protocol::crypto::{sign, verify, LienKeypair};
///
/// let keypair = LienKeypair::generate();
/// let message = b"offer 1000 units against collection #7";
/// let signature = sign(&keypair, message);
///
/// assert!(verify(&keypair.public_key(), message, &signature));
/// ```
pub fn sign(keypair: &LienKeypair, message: &[u8]) -> LienSignature {
    keypair.sign(message)
}

/// Verify an Ed25519 signature against a public key and message.
///
/// Returns `true` if the signature is valid, `false` otherwise.
/// We intentionally don't distinguish between "invalid signature" and
/// "wrong public key" — both are just "nope." Giving attackers a
/// detailed error oracle is a bad idea.
pub fn verify(public_key: &LienPublicKey, message: &[u8], signature: &LienSignature) -> bool {
    public_key.verify(message, signature)
}

/// Verify a signature using raw byte components.
///
/// This is the "I got these bytes off the wire and need to check them"
/// variant. It parses the public key and signature bytes, then does the
/// verification. Useful when payloads arrive as byte slices rather than
/// typed structs.
pub fn verify_raw(
    public_key_bytes: &[u8; 32],
    message: &[u8],
    signature_bytes: &[u8; 64],
) -> Result<(), SignatureError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;

    let signature = DalekSignature::from_bytes(signature_bytes);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}

// ---------------------------------------------------------------------------
// KeyedSignature + SignatureScheme
// ---------------------------------------------------------------------------

/// A signature bundled with the public key that (allegedly) produced it.
///
/// LIEN addresses are hashes, so a bare signature is unverifiable — the
/// verifier has no key to check against. Proposals therefore travel with
/// the signer's public key attached, and verification re-derives the
/// address from the key before checking the signature. An attacker can
/// attach any key they like; they just can't make it hash to someone
/// else's address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedSignature {
    /// The public key the signer claims as their identity.
    pub public_key: LienPublicKey,

    /// Ed25519 signature over a 32-byte digest.
    pub signature: LienSignature,
}

impl KeyedSignature {
    /// Sign a digest with `keypair` and bundle the public key alongside.
    pub fn over(keypair: &LienKeypair, digest: &[u8; 32]) -> Self {
        Self {
            public_key: keypair.public_key(),
            signature: keypair.sign(digest),
        }
    }
}

/// Decides whether a [`KeyedSignature`] is valid for a given signer address.
///
/// The proposal engine holds one of these as a trait object and never
/// inspects signatures itself. Swapping the scheme swaps the protocol's
/// notion of authorization for off-protocol proposals — which is exactly
/// the kind of decision that should live behind one narrow interface.
pub trait SignatureScheme: Send + Sync {
    /// Returns `true` iff `keyed` is a valid signature by `signer` over
    /// `digest`, under this scheme's rules.
    fn is_valid(&self, signer: &Address, digest: &[u8; 32], keyed: &KeyedSignature) -> bool;
}

/// The default scheme: one address, one Ed25519 key.
///
/// Valid iff the attached public key hashes to `signer` and the Ed25519
/// signature verifies over the digest. Stateless, so one instance serves
/// every verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Scheme;

impl SignatureScheme for Ed25519Scheme {
    fn is_valid(&self, signer: &Address, digest: &[u8; 32], keyed: &KeyedSignature) -> bool {
        if Address::from_public_key(&keyed.public_key) != *signer {
            return false;
        }
        verify(&keyed.public_key, digest, &keyed.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::LienKeypair;

    #[test]
    fn test_sign_and_verify() {
        let kp = LienKeypair::generate();
        let msg = b"hello, world";
        let sig = sign(&kp, msg);
        assert!(verify(&kp.public_key(), msg, &sig));
    }

    #[test]
    fn test_wrong_message_fails() {
        let kp = LienKeypair::generate();
        let sig = sign(&kp, b"correct message");
        assert!(!verify(&kp.public_key(), b"wrong message", &sig));
    }

    #[test]
    fn test_wrong_key_fails() {
        let kp1 = LienKeypair::generate();
        let kp2 = LienKeypair::generate();
        let msg = b"test message";
        let sig = sign(&kp1, msg);
        // Verifying with a different key should fail.
        assert!(!verify(&kp2.public_key(), msg, &sig));
    }

    #[test]
    fn test_verify_raw_roundtrip() {
        let kp = LienKeypair::generate();
        let msg = b"bytes go in, bytes come out";
        let sig = sign(&kp, msg);

        let pk_bytes = kp.public_key_bytes();
        let mut sig_arr = [0u8; 64];
        sig_arr.copy_from_slice(sig.as_bytes());
        assert!(verify_raw(&pk_bytes, msg, &sig_arr).is_ok());
    }

    #[test]
    fn test_verify_raw_with_invalid_pubkey() {
        // All zeros is not a valid Ed25519 public key (it's the identity
        // point, which is a small-order point that should be rejected).
        let bad_pk = [0u8; 32];
        let msg = b"doesn't matter";
        let sig = [0u8; 64];
        assert!(verify_raw(&bad_pk, msg, &sig).is_err());
    }

    #[test]
    fn ed25519_scheme_accepts_matching_key_and_signature() {
        let kp = LienKeypair::generate();
        let signer = Address::from_public_key(&kp.public_key());
        let digest = crate::crypto::blake3_hash(b"proposal preimage");

        let keyed = KeyedSignature::over(&kp, &digest);
        assert!(Ed25519Scheme.is_valid(&signer, &digest, &keyed));
    }

    #[test]
    fn ed25519_scheme_rejects_key_address_mismatch() {
        // A valid signature by the wrong identity: the attached key does not
        // hash to the claimed signer address, so the attestation is worthless.
        let signer_kp = LienKeypair::generate();
        let other_kp = LienKeypair::generate();
        let signer = Address::from_public_key(&signer_kp.public_key());
        let digest = crate::crypto::blake3_hash(b"proposal preimage");

        let keyed = KeyedSignature::over(&other_kp, &digest);
        assert!(!Ed25519Scheme.is_valid(&signer, &digest, &keyed));
    }

    #[test]
    fn ed25519_scheme_rejects_tampered_digest() {
        let kp = LienKeypair::generate();
        let signer = Address::from_public_key(&kp.public_key());
        let digest = crate::crypto::blake3_hash(b"original");
        let tampered = crate::crypto::blake3_hash(b"tampered");

        let keyed = KeyedSignature::over(&kp, &digest);
        assert!(!Ed25519Scheme.is_valid(&signer, &tampered, &keyed));
    }

    #[test]
    fn custom_scheme_through_trait_object() {
        // A stand-in for non-key signers (policy engines, custodial desks):
        // accepts anything. The point is that a Box<dyn SignatureScheme>
        // swaps cleanly.
        struct AcceptAll;
        impl SignatureScheme for AcceptAll {
            fn is_valid(&self, _: &Address, _: &[u8; 32], _: &KeyedSignature) -> bool {
                true
            }
        }

        let scheme: Box<dyn SignatureScheme> = Box::new(AcceptAll);
        let kp = LienKeypair::generate();
        let signer = Address::from_public_key(&kp.public_key());
        let digest = [9u8; 32];
        let keyed = KeyedSignature::over(&kp, &digest);
        assert!(scheme.is_valid(&signer, &digest, &keyed));
    }

    #[test]
    fn keyed_signature_serde_roundtrip() {
        let kp = LienKeypair::generate();
        let keyed = KeyedSignature::over(&kp, &[3u8; 32]);

        let json = serde_json::to_string(&keyed).unwrap();
        let back: KeyedSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, keyed);
    }
}
