//! # Utilized-Credit Ledger
//!
//! Tracks how much of a reusable proposal's credit limit has been
//! consumed. A lender signs one offer with a 100k cap; five borrowers
//! originate 20k loans against it; the sixth finds the line exhausted.
//!
//! ## What is deliberately NOT here
//!
//! The limit itself. Limits live inside proposals (signed, off-protocol
//! artifacts) and arrive with every call — storing them here would mean
//! a registration step for every signed offer, which defeats the point
//! of off-protocol negotiation. This ledger only remembers the running
//! total per `(owner, credit line id)`.
//!
//! Consumption is monotonic: repayments do not free up the line. An
//! owner who wants the headroom back issues a new proposal with a fresh
//! credit line id.

use std::collections::HashMap;
use thiserror::Error;

use crate::config::TAG_ACTIVE_LOAN;
use crate::hub::{CapabilityOracle, HubError};
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Credit-ledger failures.
#[derive(Debug, Error)]
pub enum CreditError {
    /// The requested draw does not fit under the line's cap.
    #[error(
        "available credit limit exceeded for {owner}: used {used} + requested {requested} > limit {limit}"
    )]
    LimitExceeded {
        /// The line's owner.
        owner: Address,
        /// Consumption before this draw.
        used: u64,
        /// The rejected draw.
        requested: u64,
        /// The cap the proposal carried.
        limit: u64,
    },

    /// Drawing down a line is reserved for tagged loan engines.
    #[error(transparent)]
    Hub(#[from] HubError),
}

// ---------------------------------------------------------------------------
// UtilizedCredit
// ---------------------------------------------------------------------------

/// Monotonic per-`(owner, line)` consumption tally.
#[derive(Debug, Default)]
pub struct UtilizedCredit {
    used: HashMap<(Address, [u8; 32]), u64>,
}

impl UtilizedCredit {
    /// An empty ledger: every line starts at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Units already drawn against `owner`'s line `id`.
    pub fn utilized(&self, owner: &Address, id: &[u8; 32]) -> u64 {
        self.used.get(&(*owner, *id)).copied().unwrap_or(0)
    }

    /// Draw `amount` against the line, enforcing `limit`. The caller must
    /// hold the active-loan tag — credit consumption is an engine-side
    /// effect of origination, never a user-callable operation.
    ///
    /// Overflow of the running total is treated as a limit failure: a
    /// draw that cannot even be added is certainly over any cap.
    pub fn utilize(
        &mut self,
        oracle: &dyn CapabilityOracle,
        caller: &Address,
        owner: &Address,
        id: &[u8; 32],
        amount: u64,
        limit: u64,
    ) -> Result<(), CreditError> {
        oracle.require(caller, TAG_ACTIVE_LOAN)?;

        let used = self.utilized(owner, id);
        let total = used.checked_add(amount).ok_or(CreditError::LimitExceeded {
            owner: *owner,
            used,
            requested: amount,
            limit,
        })?;
        if total > limit {
            return Err(CreditError::LimitExceeded {
                owner: *owner,
                used,
                requested: amount,
                limit,
            });
        }

        self.used.insert((*owner, *id), total);
        Ok(())
    }

    /// Headroom check without consumption, for read-only evaluation.
    pub fn fits(&self, owner: &Address, id: &[u8; 32], amount: u64, limit: u64) -> bool {
        match self.utilized(owner, id).checked_add(amount) {
            Some(total) => total <= limit,
            None => false,
        }
    }

    /// Infallible recorder for validated commit phases: the headroom
    /// check already passed, so this just bumps the tally.
    pub(crate) fn record_usage(&mut self, owner: &Address, id: &[u8; 32], amount: u64) {
        let entry = self.used.entry((*owner, *id)).or_insert(0);
        *entry = entry.saturating_add(amount);
    }
}
