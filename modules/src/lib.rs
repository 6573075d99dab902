//! # LIEN Protocol Strategy Modules
//!
//! Pluggable default and liquidation policies for the LIEN loan engine.
//! The engine itself knows exactly one rule — a Running loan whose clock
//! ran out is in default. Everything smarter lives here, behind the
//! `LoanModule` seam a proposal can bind:
//!
//! - **Maturity Watch** — a grace period after expiration before the
//!   loan reads as defaulted. The gentlest policy.
//! - **LTV Watch** — an oracle-priced loan-to-value ceiling that can put
//!   a loan in default *before* maturity when collateral value collapses.
//! - **Dutch Auction Sale** — a liquidation pricer that walks the
//!   collateral's asking price down from a premium to a floor once a
//!   loan defaults.
//! - **Price Oracle** — the quote seam the LTV watch reads, with an
//!   in-tree fixed-price board for tests and devnets.
//!
//! ## Design Principles
//!
//! 1. All price and ratio math is checked — u128 intermediates, no
//!    wrapping, no silent truncation.
//! 2. Time is an argument. Modules never read a clock; staleness, grace
//!    and decay are all computed from the `now` the caller supplies.
//! 3. Modules observe, the engine owns. A module reads the loan record
//!    it is handed and answers questions; it never mutates ledger or
//!    engine state.
//! 4. Per-loan overrides travel as proposal params, validated once at
//!    origination. A loan that originates has well-formed policy.

pub mod liquidation;
pub mod ltv;
pub mod maturity;
pub mod oracle;
