//! # Loan Engine
//!
//! Where proposals become loans and loans end. The engine owns the
//! custody vault, the claim-token book, and the loan records; everything
//! else (validation, replay protection, credit lines) it delegates to
//! the Proposal Engine it embeds.
//!
//! ## Lifecycle
//!
//! ```text
//! originate ──▶ Running ──repay──▶ Repaid ──claim──▶ (gone)
//!                  │
//!                  └──clock runs out──▶ Defaulted ──claim──▶ (gone)
//! ```
//!
//! `Defaulted` is never written anywhere: it is *derived* from a Running
//! record whose expiration has passed ([`Loan::status_at`]). That keeps
//! the state machine impossible to wedge — there is no "mark defaulted"
//! transaction to forget, front-run, or replay. A claimed loan is
//! deleted outright; absence from the book is the terminal state.
//!
//! ## Design Principles
//!
//! 1. **Validate first, commit last.** Every fallible check runs before
//!    the first ledger mutation; the custody phase runs under a ledger
//!    snapshot; the final bookkeeping (consume proposal, bind claim,
//!    insert record) cannot fail.
//! 2. **Time is an argument.** Every lifecycle operation takes `now`
//!    explicitly. The engine has no clock of its own, which makes
//!    "day 8 of a 7-day loan" a unit test instead of a deployment story.
//! 3. **Money is checked arithmetic.** Repayment amounts are computed
//!    once, in u128, at origination, and frozen into the record.

pub mod engine;
pub mod module;
pub mod terms;
pub mod token;

pub use engine::{LoanEngine, LoanError};
pub use module::{LoanModule, ModuleError, ModuleRegistry, ON_LOAN_CREATED_MAGIC};
pub use terms::Terms;
pub use token::{ClaimError, ClaimTokens};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::identity::Address;
use crate::proposal::ModuleBinding;

/// Where a loan is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Originated, not yet settled, clock still running.
    Running,

    /// Borrower settled in full; the claim pays out the repayment.
    Repaid,

    /// Clock ran out on a Running loan; the claim pays out the
    /// collateral. Derived, never stored.
    Defaulted,
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LoanStatus::Running => "running",
            LoanStatus::Repaid => "repaid",
            LoanStatus::Defaulted => "defaulted",
        })
    }
}

/// One live loan. Deleted at claim; a missing record means the loan is
/// over and settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    /// Loan id, equal to its claim token's id.
    pub id: u64,

    /// Stored status: `Running` or `Repaid`. Ask
    /// [`status_at`](Self::status_at) for the effective one.
    pub status: LoanStatus,

    /// Who posted the collateral and owes the repayment.
    pub borrower: Address,

    /// Who funded the loan. The *claim holder* — possibly someone who
    /// bought the claim since — is who actually collects.
    pub original_lender: Address,

    /// What sits in custody while the loan runs.
    pub collateral: Asset,

    /// The principal that went to the borrower.
    pub credit: Asset,

    /// The frozen settlement figure: principal + fixed interest + the
    /// full-duration APR accrual.
    pub repay_amount: u64,

    /// Agreed length in seconds.
    pub duration_secs: u64,

    /// When the loan began.
    pub originated_at: DateTime<Utc>,

    /// `originated_at + duration`. Repayment closes and default opens
    /// here, in the same instant.
    pub expiration: DateTime<Utc>,

    /// Bound strategy module, if the proposal named one.
    pub module: Option<ModuleBinding>,
}

impl Loan {
    /// Effective status at `now`: a Running loan whose expiration has
    /// passed reads as Defaulted.
    pub fn status_at(&self, now: DateTime<Utc>) -> LoanStatus {
        match self.status {
            LoanStatus::Running if now >= self.expiration => LoanStatus::Defaulted,
            status => status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_loan() -> Loan {
        let originated_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Loan {
            id: 1,
            status: LoanStatus::Running,
            borrower: Address::of_component("borrower"),
            original_lender: Address::of_component("lender"),
            collateral: Asset::nft(Address::of_component("art"), 1),
            credit: Asset::fungible(Address::of_component("credit"), 10_000),
            repay_amount: 10_523,
            duration_secs: 604_800,
            originated_at,
            expiration: originated_at + chrono::Duration::seconds(604_800),
            module: None,
        }
    }

    #[test]
    fn running_loan_defaults_exactly_at_expiration() {
        let loan = sample_loan();
        let just_before = loan.expiration - chrono::Duration::seconds(1);

        assert_eq!(loan.status_at(just_before), LoanStatus::Running);
        // The boundary instant itself is already a default.
        assert_eq!(loan.status_at(loan.expiration), LoanStatus::Defaulted);
        assert_eq!(
            loan.status_at(loan.expiration + chrono::Duration::days(365)),
            LoanStatus::Defaulted
        );
    }

    #[test]
    fn repaid_loan_never_defaults() {
        let mut loan = sample_loan();
        loan.status = LoanStatus::Repaid;
        assert_eq!(
            loan.status_at(loan.expiration + chrono::Duration::days(1)),
            LoanStatus::Repaid
        );
    }
}
