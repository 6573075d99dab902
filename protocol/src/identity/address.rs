//! # LIEN Addresses
//!
//! An address is the protocol-facing identity of every participant and
//! component: lenders, borrowers, token contracts, the loan engine itself.
//! It is derived from an Ed25519 public key via BLAKE3 hashing and rendered
//! Bech32:
//!
//! ```text
//! public_key (32 bytes)
//!     -> BLAKE3(public_key) -> 32 bytes
//!     -> Bech32("lien", hash) -> lien1qw508d6qe...
//! ```
//!
//! The `lien` human-readable prefix (HRP) makes addresses immediately
//! recognizable. Bech32 encoding provides built-in error detection — it
//! can detect up to 4 character errors — which matters when users are
//! copy-pasting addresses into loan terms.
//!
//! ## Why BLAKE3 instead of raw public key?
//!
//! - Provides a layer of indirection (quantum resistance hedge).
//! - Consistent 32-byte output regardless of future key scheme changes.
//! - Lets non-key entities (the engine, token contracts, pools) live in
//!   the same address space: their addresses are domain-separated hashes
//!   of a label instead of a key (see [`Address::of_component`]).

use bech32::{Bech32, Hrp};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::config::{ADDRESS_HRP, COMPONENT_ADDRESS_DOMAIN};
use crate::crypto::hash::domain_separated_hash;
use crate::crypto::keys::LienPublicKey;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while parsing an address string.
#[derive(Debug, Error)]
pub enum AddressError {
    /// The Bech32 string could not be decoded.
    #[error("bech32 decode error: {0}")]
    Bech32Decode(String),

    /// The decoded address has an unexpected human-readable prefix.
    #[error("invalid HRP: expected '{expected}', got '{got}'")]
    InvalidHrp {
        /// The expected HRP.
        expected: String,
        /// The HRP that was actually found.
        got: String,
    },

    /// The decoded data has an unexpected length.
    #[error("invalid address data length: expected {expected} bytes, got {got}")]
    InvalidDataLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A LIEN address — 32 bytes of BLAKE3 output, rendered `lien1…`.
///
/// `Copy` on purpose: addresses are keys in every map this protocol owns,
/// and threading `&Address` through five layers of ledger code buys nothing
/// over copying 32 bytes.
///
/// # Examples
///
/// ```
/// use lien_protocol::crypto::keys::LienKeypair;
/// use lien_protocol::identity::Address;
///
/// let kp = LienKeypair::generate();
/// let addr = Address::from_public_key(&kp.public_key());
/// let encoded = addr.to_string();
/// assert!(encoded.starts_with("lien1"));
///
/// let recovered: Address = encoded.parse().unwrap();
/// assert_eq!(addr, recovered);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    bytes: [u8; 32],
}

impl Address {
    /// Derive the address of a public key: `BLAKE3(key bytes)`.
    pub fn from_public_key(pk: &LienPublicKey) -> Self {
        Self {
            bytes: *blake3::hash(pk.as_bytes()).as_bytes(),
        }
    }

    /// Deterministic address for a named protocol component.
    ///
    /// Components that are code rather than keys — the loan engine, test
    /// pools, system issuers — still need to hold assets and carry
    /// capability tags. Their addresses are domain-separated hashes of a
    /// label, so `of_component("loan-engine")` is the same address on
    /// every deployment and can never collide with a key-derived address
    /// (different BLAKE3 domain).
    pub fn of_component(label: &str) -> Self {
        Self {
            bytes: domain_separated_hash(COMPONENT_ADDRESS_DOMAIN, label.as_bytes()),
        }
    }

    /// Construct from raw hash bytes. Used by the asset ledger when it
    /// derives token contract addresses from registration parameters.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Encode as a Bech32 string, `lien1…`.
    pub fn to_bech32(&self) -> String {
        let hrp = Hrp::parse(ADDRESS_HRP).expect("static HRP is valid");
        bech32::encode::<Bech32>(hrp, &self.bytes)
            .expect("encoding a 32-byte payload should never fail")
    }

    /// Parse a Bech32-encoded address, validating HRP, checksum and length.
    pub fn parse(addr: &str) -> Result<Self, AddressError> {
        let (hrp, data) =
            bech32::decode(addr).map_err(|e| AddressError::Bech32Decode(e.to_string()))?;

        let expected_hrp = Hrp::parse(ADDRESS_HRP).expect("static HRP is valid");
        if hrp != expected_hrp {
            return Err(AddressError::InvalidHrp {
                expected: ADDRESS_HRP.to_string(),
                got: hrp.to_string(),
            });
        }

        if data.len() != 32 {
            return Err(AddressError::InvalidDataLength {
                expected: 32,
                got: data.len(),
            });
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&data);
        Ok(Self { bytes })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bech32())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full Bech32 is 60+ characters; debug output showing twelve is
        // enough to tell two addresses apart at a glance.
        let encoded = self.to_bech32();
        write!(f, "Address({}...)", &encoded[..12])
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Addresses cross the wire as their Bech32 strings. Serializing the raw
// bytes would leak an unreadable array into every JSON payload and lose
// the checksum protection that is the whole point of Bech32.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_bech32())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}
