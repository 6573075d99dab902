//! Resolved loan terms and the repayment arithmetic.

use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::config::{BPS_DENOMINATOR, SECONDS_PER_YEAR};
use crate::identity::Address;
use crate::proposal::ModuleBinding;

/// What a loan will actually be, with lender and borrower resolved.
///
/// Emitted by the Proposal Engine at evaluation, consumed by the Loan
/// Engine at origination, never persisted — the loan record is built
/// from it and then the terms are gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terms {
    /// Who funds the loan and receives the claim token.
    pub lender: Address,

    /// Who posts collateral and receives the principal.
    pub borrower: Address,

    /// The asset locked in custody for the loan's lifetime.
    pub collateral: Asset,

    /// The fungible principal, normalized.
    pub credit: Asset,

    /// Flat interest in credit units.
    pub fixed_interest: u64,

    /// Accruing interest, basis points per year.
    pub accruing_apr_bps: u32,

    /// Loan length in seconds.
    pub duration_secs: u64,

    /// Strategy module governing default determination, if bound.
    pub module: Option<ModuleBinding>,
}

impl Terms {
    /// The amount that settles the loan, fixed for its whole life:
    ///
    /// ```text
    /// principal
    ///   + fixed_interest
    ///   + principal * apr_bps * duration_secs / (10_000 * seconds_per_year)
    /// ```
    ///
    /// The accrual is projected over the **full** duration at origination
    /// — repaying early does not discount it, repaying late is not
    /// possible (the repayment window closes at expiration). Computed in
    /// u128 with checked steps; `None` means the terms do not fit in the
    /// ledger's u64 units and the loan must not originate.
    pub fn repayment_amount(&self) -> Option<u64> {
        let principal = self.credit.transfer_amount() as u128;

        let accrual = principal
            .checked_mul(self.accruing_apr_bps as u128)?
            .checked_mul(self.duration_secs as u128)?
            / (BPS_DENOMINATOR * SECONDS_PER_YEAR);

        let total = principal
            .checked_add(self.fixed_interest as u128)?
            .checked_add(accrual)?;

        u64::try_from(total).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;

    fn terms(principal: u64, fixed: u64, apr_bps: u32, duration_secs: u64) -> Terms {
        let token = Address::of_component("credit-token");
        Terms {
            lender: Address::of_component("lender"),
            borrower: Address::of_component("borrower"),
            collateral: Asset::nft(Address::of_component("art"), 1),
            credit: Asset::fungible(token, principal),
            fixed_interest: fixed,
            accruing_apr_bps: apr_bps,
            duration_secs,
            module: None,
        }
    }

    #[test]
    fn principal_only_loan_repays_principal() {
        assert_eq!(terms(10_000, 0, 0, 604_800).repayment_amount(), Some(10_000));
    }

    #[test]
    fn fixed_interest_is_flat() {
        assert_eq!(
            terms(10_000, 500, 0, 604_800).repayment_amount(),
            Some(10_500)
        );
    }

    #[test]
    fn apr_accrues_over_the_full_duration() {
        // 10k at 12% APR for one week:
        // 10_000 * 1_200 * 604_800 / (10_000 * 31_536_000) = 23 (floored).
        assert_eq!(
            terms(10_000, 500, 1_200, 604_800).repayment_amount(),
            Some(10_523)
        );
    }

    #[test]
    fn one_year_at_fifty_percent() {
        // A full year makes the APR math exact: 50% of 100k is 50k.
        assert_eq!(
            terms(100_000, 0, 5_000, 31_536_000).repayment_amount(),
            Some(150_000)
        );
    }

    #[test]
    fn sub_unit_accrual_floors_to_zero() {
        // Tiny principal, short duration: the accrual rounds down to 0
        // rather than up to 1.
        assert_eq!(terms(100, 0, 1_200, 3_600).repayment_amount(), Some(100));
    }

    #[test]
    fn overflowing_terms_refuse_to_produce_a_number() {
        assert_eq!(
            terms(u64::MAX, u64::MAX, 0, 604_800).repayment_amount(),
            None
        );
        // Accrual pushes the u128 total past u64 range.
        assert_eq!(
            terms(u64::MAX, 0, 160_000, 31_536_000).repayment_amount(),
            None
        );
    }
}
