//! # Maturity Watch
//!
//! The mildest strategy: a loan is not in default the instant its clock
//! runs out, but only once a grace period has also passed. Lending desks
//! that settle through slow rails want exactly this — the engine's claim
//! routing still flips at expiration, but dashboards, liquidation bots
//! and anything else asking the engine "is this loan defaulted?" hold
//! their fire until the grace window closes.
//!
//! The watch carries one default grace period. A proposal can override
//! it per loan by binding eight little-endian bytes of seconds as module
//! params; empty params mean "use the watch's default". Anything else is
//! rejected at origination, so a loan that exists has a well-formed
//! grace period.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use lien_protocol::loan::{Loan, LoanModule, LoanStatus, ModuleError, ON_LOAN_CREATED_MAGIC};

/// Grace-period default policy: defaulted when `now >= expiration + grace`.
#[derive(Debug, Clone)]
pub struct MaturityWatch {
    grace_secs: u64,
    overrides: HashMap<u64, u64>,
}

impl MaturityWatch {
    /// A watch that grants every loan `grace_secs` of grace unless the
    /// proposal overrides it.
    pub fn new(grace_secs: u64) -> Self {
        Self {
            grace_secs,
            overrides: HashMap::new(),
        }
    }

    /// The grace period that applies to a loan.
    pub fn grace_for(&self, loan_id: u64) -> u64 {
        self.overrides.get(&loan_id).copied().unwrap_or(self.grace_secs)
    }

    /// The instant a loan becomes defaulted under this policy. `None`
    /// when the grace period cannot be projected onto the clock; such a
    /// loan never reads as defaulted here.
    fn deadline(&self, loan: &Loan) -> Option<DateTime<Utc>> {
        let grace = i64::try_from(self.grace_for(loan.id)).ok()?;
        loan.expiration.checked_add_signed(Duration::try_seconds(grace)?)
    }

    fn parse_params(params: &[u8]) -> Result<Option<u64>, ModuleError> {
        match params.len() {
            0 => Ok(None),
            8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(params);
                let secs = u64::from_le_bytes(buf);
                // An override the clock cannot represent would silently
                // disable default; refuse it up front instead.
                let as_signed = i64::try_from(secs).map_err(|_| {
                    ModuleError::InvalidParams(format!("grace period {secs}s does not fit the clock"))
                })?;
                Duration::try_seconds(as_signed).ok_or_else(|| {
                    ModuleError::InvalidParams(format!("grace period {secs}s does not fit the clock"))
                })?;
                Ok(Some(secs))
            }
            n => Err(ModuleError::InvalidParams(format!(
                "expected 0 or 8 bytes of grace seconds, got {n}"
            ))),
        }
    }
}

impl LoanModule for MaturityWatch {
    fn on_loan_created(&mut self, loan: &Loan, params: &[u8]) -> Result<[u8; 4], ModuleError> {
        if let Some(grace) = Self::parse_params(params)? {
            self.overrides.insert(loan.id, grace);
        }
        Ok(ON_LOAN_CREATED_MAGIC)
    }

    fn is_defaulted(&self, loan: &Loan, now: DateTime<Utc>) -> bool {
        if loan.status == LoanStatus::Repaid {
            return false;
        }
        match self.deadline(loan) {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}
