//! # Cryptographic Primitives for LIEN
//!
//! Everything security-relevant in the protocol flows through this module.
//! Proposal digests, proposal signatures, address derivation, collateral
//! state fingerprints — all of it bottoms out here.
//!
//! We deliberately chose boring, well-audited cryptography:
//!
//! - **Ed25519** for signatures — fast, deterministic, and nobody has broken it.
//! - **BLAKE3** for hashing — because we live in the future.
//!
//! That is the whole list. A lending protocol does not need novel
//! cryptography; it needs cryptography that will still be standing when
//! someone's collateral depends on it.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around audited
//! implementations. If you're tempted to optimize these functions, please
//! reconsider. Then reconsider again. Then go read about timing attacks
//! and come back when you've lost the urge.

pub mod hash;
pub mod keys;
pub mod signatures;

// Re-export the things people actually need so they don't have to memorize
// our module hierarchy. Life's too short for five levels of `use` statements.
pub use hash::{blake3_hash, blake3_hash_multi, domain_separated_hash};
pub use keys::{LienKeypair, LienPublicKey, LienSignature};
pub use signatures::{sign, verify, Ed25519Scheme, KeyedSignature, SignatureScheme};
