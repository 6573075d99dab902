//! # Nonce Registry
//!
//! Replay protection for off-protocol-signed proposals. Every proposal
//! names a `(space, nonce)` coordinate per owner; the registry tracks
//! which coordinates are burned.
//!
//! ## The space trick
//!
//! A naive registry needs one revocation per outstanding proposal to
//! walk away from them all. Spaces fix that in O(1): each owner has a
//! monotonically increasing *current space*, and a nonce is usable only
//! if its space **equals** the owner's current space. Bumping the space
//! therefore invalidates every nonce ever issued in the old spaces in
//! one write — the panic button after a key leak or a mass mis-signing.
//!
//! Within a space, revocation is per-nonce and permanent. Nothing is
//! ever un-revoked and spaces never decrease; proposals from a past
//! space stay dead even though their nonces were never individually
//! burned.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::config::TAG_NONCE_MANAGER;
use crate::hub::{CapabilityOracle, HubError};
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Nonce-registry failures.
#[derive(Debug, Error)]
pub enum NonceError {
    /// The coordinate was already burned. Revocation is not idempotent:
    /// a second revoke is reported so callers notice double-submission.
    #[error("nonce {nonce} in space {space} of {owner} is already revoked")]
    AlreadyRevoked {
        /// Whose nonce grid.
        owner: Address,
        /// The space coordinate.
        space: u64,
        /// The nonce coordinate.
        nonce: u64,
    },

    /// Delegated revocation requires the nonce-manager tag.
    #[error(transparent)]
    Hub(#[from] HubError),
}

// ---------------------------------------------------------------------------
// NonceRegistry
// ---------------------------------------------------------------------------

/// Per-owner `(space, nonce)` revocation grid.
///
/// The Proposal Engine keeps two of these — one for offers, one for
/// requests — so the same numeric nonce can exist independently in both
/// roles without colliding.
#[derive(Debug, Default)]
pub struct NonceRegistry {
    revoked: HashSet<(Address, u64, u64)>,
    spaces: HashMap<Address, u64>,
}

impl NonceRegistry {
    /// An empty registry: every owner starts in space 0 with no
    /// revocations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Owner's current space. Starts at 0, only ever increases.
    pub fn current_space(&self, owner: &Address) -> u64 {
        self.spaces.get(owner).copied().unwrap_or(0)
    }

    /// Burn a nonce in the owner's current space.
    pub fn revoke(&mut self, owner: &Address, nonce: u64) -> Result<(), NonceError> {
        let space = self.current_space(owner);
        self.revoke_in_space(owner, space, nonce)
    }

    /// Burn a nonce at an explicit space coordinate.
    ///
    /// Revoking in a non-current space is allowed — it closes the door on
    /// a proposal that would come back to life if the owner's space were
    /// ever believed to be different than it is.
    pub fn revoke_in_space(
        &mut self,
        owner: &Address,
        space: u64,
        nonce: u64,
    ) -> Result<(), NonceError> {
        if !self.revoked.insert((*owner, space, nonce)) {
            return Err(NonceError::AlreadyRevoked {
                owner: *owner,
                space,
                nonce,
            });
        }
        Ok(())
    }

    /// Burn a nonce on behalf of another owner. `caller` must hold the
    /// nonce-manager tag — this is how loan engines consume single-use
    /// proposal nonces at origination.
    pub fn revoke_on_behalf(
        &mut self,
        oracle: &dyn CapabilityOracle,
        caller: &Address,
        owner: &Address,
        space: u64,
        nonce: u64,
    ) -> Result<(), NonceError> {
        oracle.require(caller, TAG_NONCE_MANAGER)?;
        self.revoke_in_space(owner, space, nonce)
    }

    /// Move the owner into a fresh space, invalidating every nonce of
    /// every earlier space at once. Returns the new space.
    pub fn revoke_space(&mut self, owner: &Address) -> u64 {
        let next = self.current_space(owner) + 1;
        self.spaces.insert(*owner, next);
        next
    }

    /// Was this exact coordinate individually burned?
    pub fn is_revoked(&self, owner: &Address, space: u64, nonce: u64) -> bool {
        self.revoked.contains(&(*owner, space, nonce))
    }

    /// Is the coordinate spendable right now? True iff the space is the
    /// owner's current space and the nonce was never burned in it.
    pub fn is_usable(&self, owner: &Address, space: u64, nonce: u64) -> bool {
        space == self.current_space(owner) && !self.is_revoked(owner, space, nonce)
    }

    /// Infallible revocation for validated commit phases. Unlike
    /// [`revoke_in_space`](Self::revoke_in_space) this does not object to
    /// an already-burned coordinate: by the time a commit phase runs, the
    /// usability check has already passed.
    pub(crate) fn mark_revoked(&mut self, owner: &Address, space: u64, nonce: u64) {
        self.revoked.insert((*owner, space, nonce));
    }
}
