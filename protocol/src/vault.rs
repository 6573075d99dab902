//! # Vault
//!
//! Balance-verified custody. The vault owns one address (the loan
//! engine's component address) and moves assets in and out of it — but
//! it never trusts a transfer to have done what it said. Every route
//! measures the receiving side before and after and compares the delta
//! against the declared amount.
//!
//! ## Why measure?
//!
//! Token contracts lie. A fee-on-transfer token delivers less than was
//! sent; a broken one delivers nothing and returns success. Custody code
//! that records the *declared* amount while holding the *delivered*
//! amount is insolvent from day one. The vault instead treats the ledger
//! delta as truth: if it doesn't match, the whole move is rolled back
//! and reported as [`VaultError::IncompleteTransfer`].
//!
//! The vault's address registers a `SelfInitiatedOnly` receiver policy,
//! so NFTs can't be stranded on it by unsolicited safe-transfers.

use thiserror::Error;

use crate::asset::{Asset, AssetLedger, LedgerError, ReceiverPolicy};
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Custody failures.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The receiving side gained less (or more) than the declared amount.
    /// The transfer has been rolled back.
    #[error("incomplete transfer: expected delta {expected}, measured {received}")]
    IncompleteTransfer {
        /// The declared transfer amount.
        expected: u64,
        /// The delta the ledger actually showed.
        received: u64,
    },

    /// A route was asked to move assets from an address to itself.
    #[error("transfer source and destination are both {address}")]
    SameSourceAndDestination {
        /// The offending address.
        address: Address,
    },

    /// The underlying ledger refused the move.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// PoolAdapter
// ---------------------------------------------------------------------------

/// Bridge to an external liquidity pool.
///
/// A lender can point a proposal at a yield position instead of idle
/// balance; at origination the vault asks the adapter to unwind just
/// enough of the position to fund the loan. The adapter does the
/// pool-specific work; the vault only verifies the resulting deltas.
pub trait PoolAdapter {
    /// Move `asset` out of `pool`, crediting `to` (whose position is
    /// `owner`'s).
    fn withdraw(
        &mut self,
        ledger: &mut AssetLedger,
        pool: &Address,
        owner: &Address,
        to: &Address,
        asset: &Asset,
    ) -> Result<(), LedgerError>;

    /// Move `asset` from `from` into `pool`, crediting `owner`'s
    /// position.
    fn supply(
        &mut self,
        ledger: &mut AssetLedger,
        pool: &Address,
        owner: &Address,
        from: &Address,
        asset: &Asset,
    ) -> Result<(), LedgerError>;
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Balance-verified custody routes around one address.
#[derive(Debug)]
pub struct Vault {
    address: Address,
}

impl Vault {
    /// A vault custodying at `address`. Installs the self-initiated-only
    /// receiver policy so third parties cannot push NFTs at the custody
    /// address directly.
    pub fn new(address: Address, ledger: &mut AssetLedger) -> Self {
        ledger.set_receiver_policy(address, ReceiverPolicy::SelfInitiatedOnly);
        Self { address }
    }

    /// The custody address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Pull `asset` from `from` into custody. Requires `from` to have
    /// approved the vault beforehand (allowance or NFT approval).
    pub fn pull(
        &self,
        ledger: &mut AssetLedger,
        asset: &Asset,
        from: &Address,
    ) -> Result<(), VaultError> {
        if *from == self.address {
            return Err(VaultError::SameSourceAndDestination {
                address: self.address,
            });
        }
        let custody = self.address;
        self.verified_move(ledger, asset, from, &custody)
    }

    /// Push `asset` out of custody to `to`.
    pub fn push(
        &self,
        ledger: &mut AssetLedger,
        asset: &Asset,
        to: &Address,
    ) -> Result<(), VaultError> {
        if *to == self.address {
            return Err(VaultError::SameSourceAndDestination {
                address: self.address,
            });
        }
        let custody = self.address;
        self.verified_move(ledger, asset, &custody, to)
    }

    /// Route `asset` directly from `from` to `to` on the vault's
    /// authority, without parking it in custody. This is how loan credit
    /// travels lender → borrower at origination.
    pub fn push_from(
        &self,
        ledger: &mut AssetLedger,
        asset: &Asset,
        from: &Address,
        to: &Address,
    ) -> Result<(), VaultError> {
        if from == to {
            return Err(VaultError::SameSourceAndDestination { address: *from });
        }
        self.verified_move(ledger, asset, from, to)
    }

    /// Unwind part of a pool position into `owner`'s hands, verifying the
    /// owner-side delta.
    pub fn withdraw_from_pool(
        &self,
        ledger: &mut AssetLedger,
        adapter: &mut dyn PoolAdapter,
        pool: &Address,
        owner: &Address,
        asset: &Asset,
    ) -> Result<(), VaultError> {
        let expected = asset.transfer_amount();
        let snapshot = ledger.snapshot();
        let before = ledger.balance_of(asset, owner)?;

        if let Err(err) = adapter.withdraw(ledger, pool, owner, owner, asset) {
            ledger.restore(snapshot);
            return Err(err.into());
        }

        let after = ledger.balance_of(asset, owner)?;
        let received = after.saturating_sub(before);
        if received != expected {
            ledger.restore(snapshot);
            return Err(VaultError::IncompleteTransfer { expected, received });
        }
        Ok(())
    }

    /// Move custody funds into a pool under `owner`'s position, verifying
    /// the custody-side decrease.
    pub fn supply_to_pool(
        &self,
        ledger: &mut AssetLedger,
        adapter: &mut dyn PoolAdapter,
        pool: &Address,
        owner: &Address,
        asset: &Asset,
    ) -> Result<(), VaultError> {
        let expected = asset.transfer_amount();
        let snapshot = ledger.snapshot();
        let before = ledger.balance_of(asset, &self.address)?;

        if let Err(err) = adapter.supply(ledger, pool, owner, &self.address, asset) {
            ledger.restore(snapshot);
            return Err(err.into());
        }

        let after = ledger.balance_of(asset, &self.address)?;
        let sent = before.saturating_sub(after);
        if sent != expected {
            ledger.restore(snapshot);
            return Err(VaultError::IncompleteTransfer {
                expected,
                received: sent,
            });
        }
        Ok(())
    }

    /// The shared verified-transfer core: snapshot, move on the vault's
    /// authority, measure the recipient delta, and roll the whole thing
    /// back on any mismatch.
    fn verified_move(
        &self,
        ledger: &mut AssetLedger,
        asset: &Asset,
        from: &Address,
        to: &Address,
    ) -> Result<(), VaultError> {
        let expected = asset.transfer_amount();
        let snapshot = ledger.snapshot();
        let before = ledger.balance_of(asset, to)?;

        if let Err(err) = ledger.transfer_from(asset, &self.address, from, to) {
            ledger.restore(snapshot);
            return Err(err.into());
        }

        let after = ledger.balance_of(asset, to)?;
        let received = after.saturating_sub(before);
        if received != expected {
            ledger.restore(snapshot);
            return Err(VaultError::IncompleteTransfer { expected, received });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetCategory;

    fn addr(label: &str) -> Address {
        Address::of_component(label)
    }

    struct Fixture {
        ledger: AssetLedger,
        vault: Vault,
        token: Address,
        issuer: Address,
        alice: Address,
        bob: Address,
    }

    fn fixture() -> Fixture {
        let mut ledger = AssetLedger::new();
        let issuer = addr("issuer");
        let alice = addr("alice");
        let bob = addr("bob");
        let vault = Vault::new(addr("custody"), &mut ledger);
        let token = ledger.register_fungible("CRD", issuer).unwrap();
        ledger.mint(&issuer, &token, &alice, 1_000).unwrap();
        Fixture {
            ledger,
            vault,
            token,
            issuer,
            alice,
            bob,
        }
    }

    fn approve_vault(fx: &mut Fixture, owner: &Address, amount: u64) {
        let asset = Asset::fungible(fx.token, amount);
        let spender = fx.vault.address();
        fx.ledger.approve(&asset, owner, &spender).unwrap();
    }

    #[test]
    fn pull_takes_custody_via_allowance() {
        let mut fx = fixture();
        let alice = fx.alice;
        approve_vault(&mut fx, &alice, 400);

        let asset = Asset::fungible(fx.token, 400);
        fx.vault.pull(&mut fx.ledger, &asset, &fx.alice).unwrap();

        let probe = Asset::fungible(fx.token, 0);
        assert_eq!(
            fx.ledger
                .balance_of(&probe, &fx.vault.address())
                .unwrap(),
            400
        );
        assert_eq!(fx.ledger.balance_of(&probe, &fx.alice).unwrap(), 600);
    }

    #[test]
    fn pull_without_allowance_fails_cleanly() {
        let mut fx = fixture();
        let asset = Asset::fungible(fx.token, 400);
        assert!(matches!(
            fx.vault.pull(&mut fx.ledger, &asset, &fx.alice),
            Err(VaultError::Ledger(LedgerError::InsufficientAllowance { .. }))
        ));
    }

    #[test]
    fn pull_rejects_fee_shaved_delivery_and_rolls_back() {
        let mut ledger = AssetLedger::new();
        let issuer = addr("issuer");
        let alice = addr("alice");
        let vault = Vault::new(addr("custody"), &mut ledger);
        // 1% transfer fee: the vault would receive 99 of 100.
        let token = ledger
            .register_fungible_with_fee("FEE", issuer, 100)
            .unwrap();
        ledger.mint(&issuer, &token, &alice, 1_000).unwrap();
        ledger
            .approve(&Asset::fungible(token, 100), &alice, &vault.address())
            .unwrap();

        let asset = Asset::fungible(token, 100);
        let err = vault.pull(&mut ledger, &asset, &alice).unwrap_err();
        assert!(matches!(
            err,
            VaultError::IncompleteTransfer {
                expected: 100,
                received: 99
            }
        ));

        // Rolled back: Alice keeps her balance AND her allowance.
        let probe = Asset::fungible(token, 0);
        assert_eq!(ledger.balance_of(&probe, &alice).unwrap(), 1_000);
        assert_eq!(ledger.allowance(&token, &alice, &vault.address()), 100);
    }

    #[test]
    fn push_returns_custody_funds() {
        let mut fx = fixture();
        let alice = fx.alice;
        approve_vault(&mut fx, &alice, 400);
        let asset = Asset::fungible(fx.token, 400);
        fx.vault.pull(&mut fx.ledger, &asset, &fx.alice).unwrap();

        let out = Asset::fungible(fx.token, 150);
        fx.vault.push(&mut fx.ledger, &out, &fx.bob).unwrap();

        let probe = Asset::fungible(fx.token, 0);
        assert_eq!(fx.ledger.balance_of(&probe, &fx.bob).unwrap(), 150);
        assert_eq!(
            fx.ledger
                .balance_of(&probe, &fx.vault.address())
                .unwrap(),
            250
        );
    }

    #[test]
    fn push_from_routes_between_third_parties() {
        let mut fx = fixture();
        let alice = fx.alice;
        approve_vault(&mut fx, &alice, 500);

        let asset = Asset::fungible(fx.token, 500);
        fx.vault
            .push_from(&mut fx.ledger, &asset, &fx.alice, &fx.bob)
            .unwrap();

        let probe = Asset::fungible(fx.token, 0);
        assert_eq!(fx.ledger.balance_of(&probe, &fx.bob).unwrap(), 500);
        // Nothing parked in custody along the way.
        assert_eq!(
            fx.ledger
                .balance_of(&probe, &fx.vault.address())
                .unwrap(),
            0
        );
    }

    #[test]
    fn self_routes_are_rejected() {
        let mut fx = fixture();
        let asset = Asset::fungible(fx.token, 10);
        let custody = fx.vault.address();

        assert!(matches!(
            fx.vault.pull(&mut fx.ledger, &asset, &custody),
            Err(VaultError::SameSourceAndDestination { .. })
        ));
        assert!(matches!(
            fx.vault.push(&mut fx.ledger, &asset, &custody),
            Err(VaultError::SameSourceAndDestination { .. })
        ));
        assert!(matches!(
            fx.vault
                .push_from(&mut fx.ledger, &asset, &fx.alice, &fx.alice),
            Err(VaultError::SameSourceAndDestination { .. })
        ));
    }

    #[test]
    fn vault_pulls_nfts_through_its_own_policy() {
        let mut ledger = AssetLedger::new();
        let issuer = addr("issuer");
        let alice = addr("alice");
        let vault = Vault::new(addr("custody"), &mut ledger);
        let coll = ledger.register_collection("ART", issuer).unwrap();
        ledger.mint_nft(&issuer, &coll, &alice, 9).unwrap();

        let asset = Asset::nft(coll, 9);

        // Unsolicited push at the custody address bounces off the policy.
        assert!(matches!(
            ledger.transfer(&asset, &alice, &vault.address()),
            Err(LedgerError::UnsupportedTransferFunction { .. })
        ));

        // The vault's own pull is self-initiated and goes through.
        ledger.approve(&asset, &alice, &vault.address()).unwrap();
        vault.pull(&mut ledger, &asset, &alice).unwrap();
        assert_eq!(ledger.balance_of(&asset, &vault.address()).unwrap(), 1);
        assert_eq!(asset.category, AssetCategory::NftSingle);
    }

    // -----------------------------------------------------------------------
    // Pool routes
    // -----------------------------------------------------------------------

    /// A pool that holds deposits at its own address and honors every
    /// request. Positions are implicit (the tests only watch deltas).
    struct HonestPool;

    impl PoolAdapter for HonestPool {
        fn withdraw(
            &mut self,
            ledger: &mut AssetLedger,
            pool: &Address,
            _owner: &Address,
            to: &Address,
            asset: &Asset,
        ) -> Result<(), LedgerError> {
            ledger.transfer(asset, pool, to)
        }

        fn supply(
            &mut self,
            ledger: &mut AssetLedger,
            pool: &Address,
            _owner: &Address,
            from: &Address,
            asset: &Asset,
        ) -> Result<(), LedgerError> {
            ledger.transfer(asset, from, pool)
        }
    }

    /// A pool that quietly delivers half of what was asked.
    struct ShortchangingPool;

    impl PoolAdapter for ShortchangingPool {
        fn withdraw(
            &mut self,
            ledger: &mut AssetLedger,
            pool: &Address,
            _owner: &Address,
            to: &Address,
            asset: &Asset,
        ) -> Result<(), LedgerError> {
            let short = Asset::fungible(asset.address, asset.amount / 2);
            ledger.transfer(&short, pool, to)
        }

        fn supply(
            &mut self,
            ledger: &mut AssetLedger,
            pool: &Address,
            _owner: &Address,
            from: &Address,
            asset: &Asset,
        ) -> Result<(), LedgerError> {
            let short = Asset::fungible(asset.address, asset.amount / 2);
            ledger.transfer(&short, from, pool)
        }
    }

    #[test]
    fn pool_withdraw_verifies_owner_delta() {
        let mut fx = fixture();
        let pool = addr("pool");
        fx.ledger.mint(&fx.issuer, &fx.token, &pool, 10_000).unwrap();

        let asset = Asset::fungible(fx.token, 2_000);
        fx.vault
            .withdraw_from_pool(&mut fx.ledger, &mut HonestPool, &pool, &fx.alice, &asset)
            .unwrap();
        assert_eq!(
            fx.ledger
                .balance_of(&Asset::fungible(fx.token, 0), &fx.alice)
                .unwrap(),
            3_000
        );
    }

    #[test]
    fn shortchanging_pool_is_caught_and_rolled_back() {
        let mut fx = fixture();
        let pool = addr("pool");
        fx.ledger.mint(&fx.issuer, &fx.token, &pool, 10_000).unwrap();

        let asset = Asset::fungible(fx.token, 2_000);
        let err = fx
            .vault
            .withdraw_from_pool(
                &mut fx.ledger,
                &mut ShortchangingPool,
                &pool,
                &fx.alice,
                &asset,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::IncompleteTransfer {
                expected: 2_000,
                received: 1_000
            }
        ));

        // Pool balance restored too.
        assert_eq!(
            fx.ledger
                .balance_of(&Asset::fungible(fx.token, 0), &pool)
                .unwrap(),
            10_000
        );
    }

    #[test]
    fn pool_supply_verifies_custody_decrease() {
        let mut fx = fixture();
        let pool = addr("pool");
        let alice = fx.alice;
        approve_vault(&mut fx, &alice, 600);
        fx.vault
            .pull(&mut fx.ledger, &Asset::fungible(fx.token, 600), &fx.alice)
            .unwrap();

        let asset = Asset::fungible(fx.token, 600);
        fx.vault
            .supply_to_pool(&mut fx.ledger, &mut HonestPool, &pool, &fx.alice, &asset)
            .unwrap();
        assert_eq!(
            fx.ledger
                .balance_of(&Asset::fungible(fx.token, 0), &pool)
                .unwrap(),
            600
        );
    }
}
