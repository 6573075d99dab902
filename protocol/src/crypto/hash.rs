//! # Hashing Utilities
//!
//! Cryptographic hash functions used throughout LIEN. There is exactly one
//! hash family here and we refuse to add more without a very good reason:
//!
//! - **BLAKE3** — Fast on every platform, parallelizable, and provably
//!   secure under standard assumptions. Used for proposal digests, address
//!   derivation, token contract addresses, and collateral state
//!   fingerprints (which is to say: everywhere).
//!
//! ## On domain separation
//!
//! Almost nothing in this protocol hashes "raw" data. A proposal digest, a
//! token address, and a state fingerprint over the same bytes must never
//! collide, so every structured hash goes through
//! [`domain_separated_hash`] with a versioned context string from
//! [`crate::config`]. The context strings are part of the protocol's wire
//! compatibility surface — changing one is a hard fork of every signed
//! proposal in flight.

/// Compute the BLAKE3 hash of the input data.
///
/// Returns a 32-byte digest as a fixed-size array. This is the workhorse
/// hash function of LIEN — fast, secure, and elegant. Uses the `blake3`
/// crate which automatically takes advantage of SIMD instructions on
/// supported platforms.
///
/// BLAKE3 is a Merkle-tree-based hash that can hash large inputs in
/// parallel across multiple cores. For typical proposal preimages (<1KB),
/// single-threaded performance is what matters, and it's still ~5x faster
/// than SHA-256.
///
/// # Example
///
/// ```
/// use lien_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"LIEN protocol");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Compute a domain-separated hash using BLAKE3 with a context string.
///
/// Domain separation prevents hash collisions across different protocol
/// contexts. For example, `domain_separated_hash("lien/proposal/v1", data)`
/// and `domain_separated_hash("lien/fingerprint/v1", data)` will never
/// collide even if `data` is the same, because the domain tag is mixed
/// into the hash.
///
/// This uses BLAKE3's built-in `derive_key` mode, which is the proper way
/// to do domain separation with BLAKE3. Don't try to prepend a tag manually —
/// that's what amateurs do. BLAKE3's `derive_key` uses a different internal
/// IV derived from the context string, making cross-context collisions
/// impossible by construction.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Hash multiple byte slices together without concatenation overhead.
///
/// Instead of allocating a buffer to concatenate inputs, we feed them
/// sequentially into the hasher. Same result, less allocation. Particularly
/// useful for hashing composite structures like `(collection || token_id ||
/// state)` without the temporary buffer.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Serde adapter: `[u8; 32]` as a lowercase hex string.
///
/// Digests and fingerprints travel through JSON constantly (proposals,
/// API responses) and a 64-char hex string beats an array of 32 numbers
/// every time. Use with `#[serde(with = "hex32")]`.
pub mod hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes of hex"))
    }
}

/// Serde adapter: `Option<[u8; 32]>` as hex-or-null.
pub mod hex32_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<[u8; 32]>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<[u8; 32]>, D::Error> {
        let opt = Option::<String>::deserialize(deserializer)?;
        match opt {
            None => Ok(None),
            Some(s) => {
                let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
                let arr = bytes
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("expected 32 bytes of hex"))?;
                Ok(Some(arr))
            }
        }
    }
}

/// Serde adapter: `Vec<u8>` as a hex string (module params and other
/// opaque payloads).
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake3_deterministic() {
        let a = blake3_hash(b"lien");
        let b = blake3_hash(b"lien");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_blake3_different_inputs() {
        let a = blake3_hash(b"lien");
        let b = blake3_hash(b"Lien"); // case sensitive!
        assert_ne!(a, b);
    }

    #[test]
    fn test_domain_separation() {
        // Same data, different contexts = different hashes.
        // This is the whole point of domain separation.
        let data = b"same data";
        let hash_a = domain_separated_hash("context-a", data);
        let hash_b = domain_separated_hash("context-b", data);
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn test_domain_separated_is_not_plain_blake3() {
        // Domain-separated hash should differ from a plain BLAKE3 hash.
        let data = b"test data";
        let plain = blake3_hash(data);
        let separated = domain_separated_hash("lien-test", data);
        assert_ne!(plain, separated);
    }

    #[test]
    fn test_blake3_hash_multi() {
        // Hashing parts separately via update() should equal hashing them
        // concatenated. This is a fundamental property of the construction.
        let part1 = b"hello";
        let part2 = b" world";

        let multi = blake3_hash_multi(&[part1, part2]);
        let single = blake3_hash(b"hello world");
        assert_eq!(multi, single);
    }

    #[test]
    fn test_domain_separation_is_stable() {
        // The derive_key construction must be stable across releases —
        // every signed proposal in flight depends on it.
        let digest = domain_separated_hash("lien/test-vector/v1", b"stable");
        let again = domain_separated_hash("lien/test-vector/v1", b"stable");
        assert_eq!(digest, again);
    }

    #[test]
    fn test_hex32_roundtrip_as_string() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "hex32")]
            digest: [u8; 32],
            #[serde(with = "hex32_opt")]
            maybe: Option<[u8; 32]>,
        }

        let w = Wrapper {
            digest: [0xab; 32],
            maybe: None,
        };
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains(&"ab".repeat(32)));
        assert!(json.contains("null"));

        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.digest, [0xab; 32]);
        assert_eq!(back.maybe, None);
    }

    #[test]
    fn test_hex32_rejects_short_input() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "hex32")]
            #[allow(dead_code)]
            digest: [u8; 32],
        }
        assert!(serde_json::from_str::<Wrapper>(r#"{"digest":"abcd"}"#).is_err());
    }
}
