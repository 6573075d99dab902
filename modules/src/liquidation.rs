//! # Dutch Auction Sale
//!
//! A liquidation pricer. Once a loan defaults, the claim holder usually
//! does not want the collateral — they want their money back. This
//! module plans how to ask for it: the collateral goes on sale at a
//! premium over the debt and the asking price walks down linearly to a
//! floor over a decay window. The first bidder willing to pay the
//! current price clears the position.
//!
//! ```text
//! price
//!   │ start ×──╲
//!   │           ╲
//!   │            ╲______ floor
//!   └────────┬───┬────────── time
//!       expiration  +decay
//! ```
//!
//! Both multiples are expressed in basis points of the loan's repay
//! amount, so a plan of 12,000 → 5,000 bps over a day asks 120% of the
//! debt at default and settles for 50% a day later. The module answers
//! prices; moving the collateral to a bidder stays the claim holder's
//! transaction through the ordinary ledger.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use lien_protocol::config::BPS_DENOMINATOR;
use lien_protocol::loan::{Loan, LoanModule, LoanStatus, ModuleError, ON_LOAN_CREATED_MAGIC};

/// One descent: start multiple, floor multiple, decay window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Descent {
    start_bps: u32,
    floor_bps: u32,
    decay_secs: u64,
}

impl Descent {
    fn validated(start_bps: u32, floor_bps: u32, decay_secs: u64) -> Result<Self, ModuleError> {
        if start_bps == 0 {
            return Err(ModuleError::InvalidParams(
                "a zero start multiple gives the collateral away".into(),
            ));
        }
        if start_bps < floor_bps {
            return Err(ModuleError::InvalidParams(format!(
                "descent must not rise: start {start_bps} bps is below floor {floor_bps} bps"
            )));
        }
        if decay_secs == 0 {
            return Err(ModuleError::InvalidParams(
                "a zero decay window is not an auction".into(),
            ));
        }
        Ok(Self {
            start_bps,
            floor_bps,
            decay_secs,
        })
    }
}

/// Linear-descent liquidation pricing for defaulted loans.
#[derive(Debug, Clone)]
pub struct DutchAuctionSale {
    plan: Descent,
    overrides: HashMap<u64, Descent>,
}

impl DutchAuctionSale {
    /// A sale policy descending from `start_bps` to `floor_bps` of the
    /// repay amount over `decay_secs` after default.
    pub fn new(start_bps: u32, floor_bps: u32, decay_secs: u64) -> Result<Self, ModuleError> {
        Ok(Self {
            plan: Descent::validated(start_bps, floor_bps, decay_secs)?,
            overrides: HashMap::new(),
        })
    }

    fn plan_for(&self, loan_id: u64) -> Descent {
        self.overrides.get(&loan_id).copied().unwrap_or(self.plan)
    }

    /// `bps` basis points of `amount`, floored. `None` when the share
    /// does not fit the ledger's units.
    fn share_of(amount: u64, bps: u32) -> Option<u64> {
        let share = (amount as u128) * (bps as u128) / BPS_DENOMINATOR;
        u64::try_from(share).ok()
    }

    /// The asking price for a loan's collateral at `now`.
    ///
    /// `None` while the loan is not in default — a running or repaid
    /// loan's collateral is simply not for sale. From the default
    /// instant the price descends linearly from the start multiple to
    /// the floor, where it stays.
    pub fn sale_price_at(&self, loan: &Loan, now: DateTime<Utc>) -> Option<u64> {
        if loan.status_at(now) != LoanStatus::Defaulted {
            return None;
        }
        let plan = self.plan_for(loan.id);
        let start = Self::share_of(loan.repay_amount, plan.start_bps)?;
        let floor = Self::share_of(loan.repay_amount, plan.floor_bps)?;

        let elapsed = u64::try_from(now.signed_duration_since(loan.expiration).num_seconds()).ok()?;
        if elapsed >= plan.decay_secs {
            return Some(floor);
        }

        // start >= floor by construction, and the cut never exceeds the
        // span, so the subtraction cannot underflow.
        let span = (start - floor) as u128;
        let cut = span * elapsed as u128 / plan.decay_secs as u128;
        Some(start - cut as u64)
    }
}

impl LoanModule for DutchAuctionSale {
    fn on_loan_created(&mut self, loan: &Loan, params: &[u8]) -> Result<[u8; 4], ModuleError> {
        match params.len() {
            0 => {}
            16 => {
                let mut start = [0u8; 4];
                let mut floor = [0u8; 4];
                let mut decay = [0u8; 8];
                start.copy_from_slice(&params[0..4]);
                floor.copy_from_slice(&params[4..8]);
                decay.copy_from_slice(&params[8..16]);
                let descent = Descent::validated(
                    u32::from_le_bytes(start),
                    u32::from_le_bytes(floor),
                    u64::from_le_bytes(decay),
                )?;
                self.overrides.insert(loan.id, descent);
            }
            n => {
                return Err(ModuleError::InvalidParams(format!(
                    "expected 0 or 16 bytes of descent plan, got {n}"
                )));
            }
        }
        Ok(ON_LOAN_CREATED_MAGIC)
    }

    /// The auction module prices liquidations; it does not move the
    /// default trigger. Expiration rules, exactly as with no module.
    fn is_defaulted(&self, loan: &Loan, now: DateTime<Utc>) -> bool {
        loan.status_at(now) == LoanStatus::Defaulted
    }
}
