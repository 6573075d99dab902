//! # Collateral State Fingerprints
//!
//! Some collateral is not inert. A vault-share NFT re-prices as its
//! vault earns; a position token's internals drift with the market. A
//! lender who signed an offer against *yesterday's* state of such a
//! token should not be bound when the state has moved.
//!
//! Proposals may therefore pin a 32-byte fingerprint of the collateral's
//! state. At evaluation time the engine recomputes the fingerprint and
//! refuses acceptance on any mismatch. What "the state" means is
//! token-specific, so the computation is a trait seam: each stateful
//! token contract registers a [`StateFingerprintComputer`] and plain
//! tokens register nothing (pinning a fingerprint against a token with
//! no computer is an acceptance-time error, not a silent pass).

use std::collections::HashMap;

use crate::asset::{Asset, AssetLedger};
use crate::config::FINGERPRINT_DOMAIN;
use crate::crypto::hash::domain_separated_hash;
use crate::identity::Address;

/// Computes the current state fingerprint of one asset.
///
/// Implementations read whatever the token considers "state" and hash it.
/// `None` means the state could not be determined — treated by the
/// engine exactly like a mismatch.
pub trait StateFingerprintComputer: Send + Sync {
    /// Fingerprint of `asset`'s current state on `ledger`.
    fn fingerprint(&self, ledger: &AssetLedger, asset: &Asset) -> Option<[u8; 32]>;
}

/// Fingerprint computers keyed by token contract address.
#[derive(Default)]
pub struct FingerprintRegistry {
    computers: HashMap<Address, Box<dyn StateFingerprintComputer>>,
}

impl FingerprintRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the computer for one token contract.
    pub fn register(&mut self, token: Address, computer: Box<dyn StateFingerprintComputer>) {
        self.computers.insert(token, computer);
    }

    /// The computer for `token`, if one is registered.
    pub fn computer_for(&self, token: &Address) -> Option<&dyn StateFingerprintComputer> {
        self.computers.get(token).map(|c| c.as_ref())
    }
}

impl std::fmt::Debug for FingerprintRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintRegistry")
            .field("registered", &self.computers.len())
            .finish()
    }
}

/// The stock computer: hashes the token's mutable state bytes (as stored
/// on the ledger) together with its identity, in the fingerprint domain.
///
/// `(collection || token_id || state)` — including the identity prevents
/// two tokens that happen to share state bytes from sharing fingerprints.
/// A token whose state was never set fingerprints its empty state, which
/// is still a meaningful pin ("accept only while untouched").
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenStateComputer;

impl StateFingerprintComputer for TokenStateComputer {
    fn fingerprint(&self, ledger: &AssetLedger, asset: &Asset) -> Option<[u8; 32]> {
        let state = ledger
            .token_state(&asset.address, asset.token_id)
            .unwrap_or(&[]);

        let mut preimage = Vec::with_capacity(32 + 8 + state.len());
        preimage.extend_from_slice(asset.address.as_bytes());
        preimage.extend_from_slice(&asset.token_id.to_le_bytes());
        preimage.extend_from_slice(state);
        Some(domain_separated_hash(FINGERPRINT_DOMAIN, &preimage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::of_component(label)
    }

    fn nft_ledger() -> (AssetLedger, Address, Address) {
        let mut ledger = AssetLedger::new();
        let issuer = addr("issuer");
        let coll = ledger.register_collection("POS", issuer).unwrap();
        ledger.mint_nft(&issuer, &coll, &addr("alice"), 1).unwrap();
        (ledger, coll, issuer)
    }

    #[test]
    fn fingerprint_tracks_state_changes() {
        let (mut ledger, coll, issuer) = nft_ledger();
        let asset = Asset::nft(coll, 1);
        let computer = TokenStateComputer;

        let untouched = computer.fingerprint(&ledger, &asset).unwrap();

        ledger
            .set_token_state(&issuer, &coll, 1, vec![1, 2, 3])
            .unwrap();
        let touched = computer.fingerprint(&ledger, &asset).unwrap();
        assert_ne!(untouched, touched);

        // Setting the state back restores the fingerprint.
        ledger.set_token_state(&issuer, &coll, 1, vec![]).unwrap();
        assert_eq!(computer.fingerprint(&ledger, &asset).unwrap(), untouched);
    }

    #[test]
    fn identical_state_on_different_tokens_differs() {
        let (mut ledger, coll, issuer) = nft_ledger();
        ledger.mint_nft(&issuer, &coll, &addr("bob"), 2).unwrap();
        ledger.set_token_state(&issuer, &coll, 1, vec![9]).unwrap();
        ledger.set_token_state(&issuer, &coll, 2, vec![9]).unwrap();

        let computer = TokenStateComputer;
        let one = computer.fingerprint(&ledger, &Asset::nft(coll, 1)).unwrap();
        let two = computer.fingerprint(&ledger, &Asset::nft(coll, 2)).unwrap();
        assert_ne!(one, two);
    }

    #[test]
    fn registry_is_per_token_contract() {
        let (ledger, coll, _) = nft_ledger();
        let mut registry = FingerprintRegistry::new();
        assert!(registry.computer_for(&coll).is_none());

        registry.register(coll, Box::new(TokenStateComputer));
        let computer = registry.computer_for(&coll).unwrap();
        assert!(computer.fingerprint(&ledger, &Asset::nft(coll, 1)).is_some());
        assert!(registry.computer_for(&addr("other")).is_none());
    }
}
