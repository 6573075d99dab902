//! # Claim Tokens
//!
//! One claim token per loan, same numeric id, minted to the lender at
//! origination. Whoever holds the claim holds the lender's side of the
//! loan — the right to the repayment, or to the collateral after a
//! default. Claims transfer freely, so a lender can sell a performing
//! loan without the borrower's involvement, and they burn exactly once
//! when the claim is paid out.
//!
//! Ids come from a strictly increasing counter that never reuses a
//! value, even when an origination fails after allocating — a gap in
//! the id sequence is harmless, a reused id is not.

use std::collections::HashMap;
use thiserror::Error;

use crate::config::TAG_ACTIVE_LOAN;
use crate::hub::{CapabilityOracle, HubError};
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Claim-token failures.
#[derive(Debug, Error)]
pub enum ClaimError {
    /// No live claim with this id.
    #[error("claim {0} does not exist")]
    UnknownClaim(u64),

    /// Transfers are holder-only.
    #[error("caller {caller} does not hold claim {id}")]
    CallerNotHolder {
        /// The claim in question.
        id: u64,
        /// Who tried to move it.
        caller: Address,
    },

    /// Burns are reserved for the engine that minted the claim.
    #[error("caller {caller} did not mint claim {id}")]
    CallerNotMinter {
        /// The claim in question.
        id: u64,
        /// Who tried to burn it.
        caller: Address,
    },

    /// Minting requires the active-loan tag.
    #[error(transparent)]
    Hub(#[from] HubError),
}

// ---------------------------------------------------------------------------
// ClaimTokens
// ---------------------------------------------------------------------------

/// The claim-token book: a counter plus holder and minter maps.
#[derive(Debug, Default)]
pub struct ClaimTokens {
    next_id: u64,
    holders: HashMap<u64, Address>,
    minters: HashMap<u64, Address>,
}

impl ClaimTokens {
    /// An empty book; the first claim will be id 1.
    pub fn new() -> Self {
        Self { next_id: 1, holders: HashMap::new(), minters: HashMap::new() }
    }

    /// Mint a claim to `holder`. `caller` (the minting engine) must hold
    /// the active-loan tag and is the only address that may later burn
    /// the claim. Returns the new id.
    pub fn mint(
        &mut self,
        oracle: &dyn CapabilityOracle,
        caller: &Address,
        holder: &Address,
    ) -> Result<u64, ClaimError> {
        oracle.require(caller, TAG_ACTIVE_LOAN)?;
        let id = self.allocate();
        self.bind(id, *holder, *caller);
        Ok(id)
    }

    /// Move a claim to a new holder. Holder-only.
    pub fn transfer(&mut self, caller: &Address, id: u64, to: &Address) -> Result<(), ClaimError> {
        let holder = self
            .holders
            .get_mut(&id)
            .ok_or(ClaimError::UnknownClaim(id))?;
        if holder != caller {
            return Err(ClaimError::CallerNotHolder { id, caller: *caller });
        }
        *holder = *to;
        Ok(())
    }

    /// Destroy a claim. Only the engine that minted it may burn it.
    pub fn burn(&mut self, caller: &Address, id: u64) -> Result<(), ClaimError> {
        let minter = self
            .minters
            .get(&id)
            .ok_or(ClaimError::UnknownClaim(id))?;
        if minter != caller {
            return Err(ClaimError::CallerNotMinter { id, caller: *caller });
        }
        self.release(id);
        Ok(())
    }

    /// Current holder of a claim, if it is live.
    pub fn holder_of(&self, id: u64) -> Option<Address> {
        self.holders.get(&id).copied()
    }

    /// Ids handed out so far (live or not).
    pub fn issued(&self) -> u64 {
        self.next_id - 1
    }

    /// Reserve the next id without creating a claim. Failed originations
    /// leave a gap in the sequence, which is fine.
    pub(crate) fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Attach holder and minter to a previously allocated id. Commit-phase
    /// counterpart of [`mint`](Self::mint); infallible.
    pub(crate) fn bind(&mut self, id: u64, holder: Address, minter: Address) {
        self.holders.insert(id, holder);
        self.minters.insert(id, minter);
    }

    /// Drop a claim from the book without authority checks. Commit-phase
    /// counterpart of [`burn`](Self::burn).
    pub(crate) fn release(&mut self, id: u64) {
        self.holders.remove(&id);
        self.minters.remove(&id);
    }
}
