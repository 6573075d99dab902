//! # Asset Abstraction
//!
//! One value type for everything the protocol moves: fungible balances,
//! single NFTs, and multi-token units. The rest of the codebase — vault,
//! proposals, loans — handles `Asset` and never branches on token standard
//! semantics itself; the category dispatch lives in exactly one place
//! ([`AssetLedger`]).
//!
//! ## Design Principles
//!
//! 1. **Closed category set.** `AssetCategory` is an enum, so "unsupported
//!    category" is unrepresentable in memory. The dynamic failure that
//!    remains is declaring the wrong category for a registered token,
//!    which the ledger rejects with `CategoryMismatch`.
//! 2. **Normalization at the edges, not everywhere.** A fungible asset has
//!    no meaningful token id (forced to 0), a single NFT has no meaningful
//!    amount (forced to 1), and a multi-token amount of 0 means "one
//!    standard unit". Constructors and [`Asset::normalized`] enforce this
//!    so two spellings of the same asset hash identically.
//! 3. **Assets are data.** No methods mutate anything; all movement goes
//!    through the ledger, which is where authorization and bookkeeping
//!    live.

pub mod ledger;

pub use ledger::{AssetLedger, LedgerError, LedgerSnapshot, ReceiverPolicy, TokenRecord};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::Address;

// ---------------------------------------------------------------------------
// AssetCategory
// ---------------------------------------------------------------------------

/// The three token shapes the protocol understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    /// Divisible balance-style tokens. Identified by contract address
    /// alone; `token_id` is meaningless and normalized to 0.
    Fungible,

    /// Unique tokens with one owner per id. `amount` is meaningless and
    /// normalized to 1.
    NftSingle,

    /// Semi-fungible tokens: per-id balances. An `amount` of 0 transfers
    /// one standard unit.
    NftMulti,
}

impl AssetCategory {
    /// Stable discriminant byte used in hash preimages (token addresses,
    /// proposal digests). Never reorder these.
    pub fn tag(&self) -> u8 {
        match self {
            AssetCategory::Fungible => 0,
            AssetCategory::NftSingle => 1,
            AssetCategory::NftMulti => 2,
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetCategory::Fungible => "fungible",
            AssetCategory::NftSingle => "nft",
            AssetCategory::NftMulti => "multi-token",
        };
        write!(f, "{}", s)
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// A concrete quantity of a concrete token.
///
/// The same value describes collateral ("token #42 of collection X") and
/// credit ("1,000 units of token Y") — nothing in the type distinguishes
/// the roles, which is the point: the engine can escrow an NFT and pay out
/// a fungible balance through the same custody code.
///
/// # Examples
///
/// ```
/// use lien_protocol::asset::Asset;
/// use lien_protocol::identity::Address;
///
/// let token = Address::of_component("doc-token");
/// let credit = Asset::fungible(token, 1_000);
/// assert_eq!(credit.token_id, 0); // normalized
/// assert_eq!(credit.transfer_amount(), 1_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    /// Which token standard this asset lives under.
    pub category: AssetCategory,

    /// The token contract address in the ledger.
    pub address: Address,

    /// Token id within the contract. 0 for fungible assets.
    pub token_id: u64,

    /// Quantity in smallest units. 1 for single NFTs.
    pub amount: u64,
}

impl Asset {
    /// A fungible amount. `token_id` is forced to 0.
    pub fn fungible(address: Address, amount: u64) -> Self {
        Self {
            category: AssetCategory::Fungible,
            address,
            token_id: 0,
            amount,
        }
    }

    /// A single NFT. `amount` is forced to 1.
    pub fn nft(address: Address, token_id: u64) -> Self {
        Self {
            category: AssetCategory::NftSingle,
            address,
            token_id,
            amount: 1,
        }
    }

    /// A multi-token quantity. An `amount` of 0 is kept as written and
    /// means "one standard unit" at transfer time.
    pub fn multi(address: Address, token_id: u64, amount: u64) -> Self {
        Self {
            category: AssetCategory::NftMulti,
            address,
            token_id,
            amount,
        }
    }

    /// The number of units a transfer of this asset actually moves.
    pub fn transfer_amount(&self) -> u64 {
        match self.category {
            AssetCategory::Fungible => self.amount,
            AssetCategory::NftSingle => 1,
            AssetCategory::NftMulti => self.amount.max(1),
        }
    }

    /// Canonical form: irrelevant fields forced to their normalized
    /// values. Digests and loan records always use this form, so
    /// `fungible(X, 100, token_id=7)` and `fungible(X, 100)` — however
    /// the first one was produced — identify the same asset.
    pub fn normalized(&self) -> Self {
        match self.category {
            AssetCategory::Fungible => Self {
                token_id: 0,
                ..*self
            },
            AssetCategory::NftSingle => Self { amount: 1, ..*self },
            AssetCategory::NftMulti => Self {
                amount: self.amount.max(1),
                ..*self
            },
        }
    }

    /// Append this asset's canonical preimage contribution to `out`.
    ///
    /// Layout: category tag (1 byte) || address (32 bytes) || token_id
    /// (8 bytes LE) || amount (8 bytes LE), all from the normalized form.
    /// Fixed-width on purpose — no length ambiguity, no serializer
    /// involvement.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let canonical = self.normalized();
        out.push(canonical.category.tag());
        out.extend_from_slice(canonical.address.as_bytes());
        out.extend_from_slice(&canonical.token_id.to_le_bytes());
        out.extend_from_slice(&canonical.amount.to_le_bytes());
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category {
            AssetCategory::Fungible => write!(f, "{} of {}", self.amount, self.address),
            AssetCategory::NftSingle => write!(f, "#{} of {}", self.token_id, self.address),
            AssetCategory::NftMulti => {
                write!(
                    f,
                    "{}x #{} of {}",
                    self.transfer_amount(),
                    self.token_id,
                    self.address
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::of_component(label)
    }

    #[test]
    fn fungible_constructor_normalizes_token_id() {
        let a = Asset::fungible(addr("t"), 500);
        assert_eq!(a.token_id, 0);
        assert_eq!(a.amount, 500);
    }

    #[test]
    fn nft_constructor_normalizes_amount() {
        let a = Asset::nft(addr("c"), 42);
        assert_eq!(a.amount, 1);
        assert_eq!(a.token_id, 42);
    }

    #[test]
    fn multi_zero_amount_transfers_one_unit() {
        let a = Asset::multi(addr("m"), 7, 0);
        assert_eq!(a.transfer_amount(), 1);

        let b = Asset::multi(addr("m"), 7, 25);
        assert_eq!(b.transfer_amount(), 25);
    }

    #[test]
    fn nft_single_always_transfers_one() {
        let mut a = Asset::nft(addr("c"), 1);
        // Even if someone fabricates a weird amount by field access, the
        // transfer amount stays pinned at one.
        a.amount = 99;
        assert_eq!(a.transfer_amount(), 1);
        assert_eq!(a.normalized().amount, 1);
    }

    #[test]
    fn normalization_makes_equivalent_spellings_equal() {
        let mut sloppy = Asset::fungible(addr("t"), 100);
        sloppy.token_id = 7;
        let clean = Asset::fungible(addr("t"), 100);
        assert_ne!(sloppy, clean);
        assert_eq!(sloppy.normalized(), clean.normalized());
    }

    #[test]
    fn encode_is_fixed_width_and_canonical() {
        let a = Asset::fungible(addr("t"), 100);
        let mut sloppy = a;
        sloppy.token_id = 9;

        let mut buf_a = Vec::new();
        let mut buf_b = Vec::new();
        a.encode_into(&mut buf_a);
        sloppy.encode_into(&mut buf_b);

        // 1 tag + 32 address + 8 id + 8 amount.
        assert_eq!(buf_a.len(), 49);
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn encode_distinguishes_categories() {
        let coll = addr("x");
        let mut single = Vec::new();
        let mut multi = Vec::new();
        Asset::nft(coll, 1).encode_into(&mut single);
        Asset::multi(coll, 1, 1).encode_into(&mut multi);
        assert_ne!(single, multi);
    }

    #[test]
    fn category_tags_are_stable() {
        assert_eq!(AssetCategory::Fungible.tag(), 0);
        assert_eq!(AssetCategory::NftSingle.tag(), 1);
        assert_eq!(AssetCategory::NftMulti.tag(), 2);
    }

    #[test]
    fn serde_roundtrip() {
        let a = Asset::multi(addr("m"), 3, 12);
        let json = serde_json::to_string(&a).unwrap();
        let back: Asset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn display_formats() {
        let t = addr("d");
        assert!(Asset::fungible(t, 10).to_string().starts_with("10 of "));
        assert!(Asset::nft(t, 4).to_string().starts_with("#4 of "));
        assert!(Asset::multi(t, 4, 3).to_string().starts_with("3x #4 of "));
    }
}
