//! # LTV Watch
//!
//! An oracle-priced loan-to-value trigger. The engine's own default rule
//! only fires at expiration; this watch can fire *early*, the moment the
//! debt outgrows the collateral backing it:
//!
//! ```text
//! repay_amount / collateral_value  >  ceiling_bps / 10_000   ⇒   default
//! ```
//!
//! Collateral is valued through a [`PriceOracle`](crate::oracle::PriceOracle)
//! in the loan's own credit token, so the ratio compares like with like.
//! Two rules keep the trigger honest:
//!
//! - The watch only ever *adds* a default trigger. A loan past its
//!   expiration is defaulted regardless of what the oracle says, exactly
//!   as it would be with no module bound.
//! - No early default on a price the oracle refuses to stand behind. A
//!   stale or missing quote means the ratio is unknown, and an unknown
//!   ratio forecloses nobody.
//!
//! At origination the watch prices the draft loan and rejects one that
//! is already above its ceiling — an offer signed against last week's
//! prices does not get to originate underwater.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use lien_protocol::config::BPS_DENOMINATOR;
use lien_protocol::loan::{Loan, LoanModule, LoanStatus, ModuleError, ON_LOAN_CREATED_MAGIC};

use crate::oracle::PriceOracle;

/// Early-default policy: defaulted when the repay amount exceeds the
/// ceiling share of the collateral's oracle value.
pub struct LtvWatch {
    oracle: Box<dyn PriceOracle>,
    ceiling_bps: u32,
    overrides: HashMap<u64, u32>,
}

impl LtvWatch {
    /// A watch that allows debt up to `ceiling_bps` basis points of
    /// collateral value, priced through `oracle`. A ceiling above 10,000
    /// admits undercollateralized loans; that is a policy choice, not an
    /// error.
    pub fn new(oracle: Box<dyn PriceOracle>, ceiling_bps: u32) -> Self {
        Self {
            oracle,
            ceiling_bps,
            overrides: HashMap::new(),
        }
    }

    /// The ceiling that applies to a loan.
    pub fn ceiling_for(&self, loan_id: u64) -> u32 {
        self.overrides.get(&loan_id).copied().unwrap_or(self.ceiling_bps)
    }

    /// The collateral's oracle value in the loan's credit token, at `now`.
    fn collateral_value(&self, loan: &Loan, now: DateTime<Utc>) -> Option<u64> {
        let quote = self
            .oracle
            .quote(&loan.collateral.address, &loan.credit.address, now)
            .ok()?;
        quote.value_of(loan.collateral.transfer_amount())
    }

    /// Is the loan's ratio above the ceiling, given a collateral value?
    fn above_ceiling(&self, loan: &Loan, value: u64) -> bool {
        if value == 0 {
            // Worthless collateral backs nothing.
            return true;
        }
        let ceiling = self.ceiling_for(loan.id) as u128;
        (loan.repay_amount as u128) * BPS_DENOMINATOR > (value as u128) * ceiling
    }

    fn parse_params(params: &[u8]) -> Result<Option<u32>, ModuleError> {
        match params.len() {
            0 => Ok(None),
            4 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(params);
                let ceiling = u32::from_le_bytes(buf);
                if ceiling == 0 {
                    return Err(ModuleError::InvalidParams(
                        "a zero LTV ceiling admits no loan".into(),
                    ));
                }
                Ok(Some(ceiling))
            }
            n => Err(ModuleError::InvalidParams(format!(
                "expected 0 or 4 bytes of ceiling basis points, got {n}"
            ))),
        }
    }
}

impl LoanModule for LtvWatch {
    /// Validates params and prices the draft loan as of its origination
    /// instant. A loan already above its ceiling, or one whose collateral
    /// the oracle cannot price, is rejected outright.
    fn on_loan_created(&mut self, loan: &Loan, params: &[u8]) -> Result<[u8; 4], ModuleError> {
        if let Some(ceiling) = Self::parse_params(params)? {
            self.overrides.insert(loan.id, ceiling);
        }

        let value = match self
            .oracle
            .quote(&loan.collateral.address, &loan.credit.address, loan.originated_at)
        {
            Ok(quote) => quote.value_of(loan.collateral.transfer_amount()),
            Err(e) => {
                self.overrides.remove(&loan.id);
                return Err(ModuleError::Rejected(format!(
                    "collateral cannot be priced: {e}"
                )));
            }
        };

        // An overflowing value is merely "more than the ledger can
        // count" — healthy by any ceiling.
        if let Some(value) = value {
            if self.above_ceiling(loan, value) {
                let ceiling = self.ceiling_for(loan.id);
                self.overrides.remove(&loan.id);
                return Err(ModuleError::Rejected(format!(
                    "loan starts above its LTV ceiling: owes {} against collateral worth {value}, ceiling {ceiling} bps",
                    loan.repay_amount
                )));
            }
        }

        Ok(ON_LOAN_CREATED_MAGIC)
    }

    fn is_defaulted(&self, loan: &Loan, now: DateTime<Utc>) -> bool {
        if loan.status == LoanStatus::Repaid {
            return false;
        }
        // Past expiration the maturity rule stands on its own.
        if loan.status_at(now) == LoanStatus::Defaulted {
            return true;
        }
        match self.collateral_value(loan, now) {
            Some(value) => self.above_ceiling(loan, value),
            // No trusted price, no early default.
            None => false,
        }
    }
}

impl std::fmt::Debug for LtvWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LtvWatch")
            .field("ceiling_bps", &self.ceiling_bps)
            .field("overrides", &self.overrides.len())
            .finish()
    }
}
