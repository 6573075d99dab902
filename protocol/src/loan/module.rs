//! # Loan Modules
//!
//! A loan is Running until it is repaid or its clock runs out — unless a
//! strategy module says otherwise. Proposals may bind a module (health
//! factors, oracle-driven LTV triggers, auction-based liquidation) and
//! the engine consults it instead of inventing policy of its own.
//!
//! The seam is deliberately narrow. A module gets exactly two moments:
//!
//! - [`LoanModule::on_loan_created`] — once, at origination, with the
//!   draft loan and the proposal's opaque params. The module may reject
//!   the loan outright (bad params, unhealthy starting position) and
//!   must return [`ON_LOAN_CREATED_MAGIC`] to prove it really speaks
//!   this interface rather than being an arbitrary contract somebody
//!   pointed a proposal at.
//! - [`LoanModule::is_defaulted`] — read-only, any time, to express an
//!   earlier-than-expiration default.
//!
//! Modules read loan state through what they are handed and never reach
//! back into the engine.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use super::Loan;
use crate::identity::Address;

/// The value [`LoanModule::on_loan_created`] must return. A module that
/// answers anything else was not written against this hook and its loans
/// do not originate.
pub const ON_LOAN_CREATED_MAGIC: [u8; 4] = *b"LNOK";

/// Module-side refusals.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module examined the draft loan and said no.
    #[error("module rejected the loan: {0}")]
    Rejected(String),

    /// The proposal's params don't parse as this module expects.
    #[error("invalid module params: {0}")]
    InvalidParams(String),
}

/// A pluggable default/liquidation strategy.
pub trait LoanModule: Send + Sync {
    /// Origination hook: inspect the draft loan and the proposal's
    /// params, set up any internal state, and return the magic value.
    fn on_loan_created(&mut self, loan: &Loan, params: &[u8]) -> Result<[u8; 4], ModuleError>;

    /// Is this loan in default at `now`, by this module's policy?
    fn is_defaulted(&self, loan: &Loan, now: DateTime<Utc>) -> bool;
}

/// Modules known to one engine, keyed by their component address.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<Address, Box<dyn LoanModule>>,
}

impl ModuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a module at an address.
    pub fn register(&mut self, address: Address, module: Box<dyn LoanModule>) {
        self.modules.insert(address, module);
    }

    /// Is anything registered at this address?
    pub fn is_registered(&self, address: &Address) -> bool {
        self.modules.contains_key(address)
    }

    /// Read-only access to a module.
    pub fn get(&self, address: &Address) -> Option<&dyn LoanModule> {
        self.modules.get(address).map(|m| m.as_ref())
    }

    /// Mutable access, for the origination hook.
    pub fn get_mut(&mut self, address: &Address) -> Option<&mut dyn LoanModule> {
        match self.modules.get_mut(address) {
            Some(m) => Some(m.as_mut()),
            None => None,
        }
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("registered", &self.modules.len())
            .finish()
    }
}
