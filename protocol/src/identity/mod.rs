//! # Identity Module
//!
//! Addressing for the LIEN protocol. Every participant — and every
//! component that holds assets or capability tags — is identified by a
//! 32-byte [`Address`], rendered as a Bech32 string with the `lien` HRP
//! (human-readable, checksummed, hard to fat-finger).
//!
//! The identity stack is deliberately shallow:
//!
//! 1. **Keypair** — Raw Ed25519 key material (see [`crate::crypto::keys`]).
//!    Signs proposals, proves ownership.
//! 2. **Address** — BLAKE3 hash of the public key, Bech32-encoded. This is
//!    what users see, share, and paste into loan terms. Components without
//!    keys (the engine, pools, token contracts) get deterministic addresses
//!    in a separate hash domain.
//!
//! ## Design Decisions
//!
//! - Bech32 (not Bech32m) for addresses — we're encoding raw hashes, not
//!   witness programs. The error-detection properties of Bech32 are
//!   sufficient for our use case.
//! - Addresses are `Copy` and totally ordered, because they key every map
//!   in the protocol and show up in sorted debug output constantly.

pub mod address;

pub use address::{Address, AddressError};

// Re-exported so call sites can write `identity::{Address, LienKeypair}`
// without reaching into the crypto module hierarchy.
pub use crate::crypto::keys::{LienKeypair, LienPublicKey, LienSignature};
