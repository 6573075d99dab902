//! # Price Oracle
//!
//! The quote seam for strategies that need to know what collateral is
//! worth. An oracle answers one question: how many smallest units of a
//! *quote* asset does one unit of a *base* asset buy, as of `now`?
//!
//! Staleness is the oracle's problem, not the caller's. A strategy asks
//! for a price and either gets one it may act on or an error it must
//! respect — there is no "here's a price, check the timestamp yourself"
//! footgun in this interface.
//!
//! Prices are fixed-point: a price of [`PRICE_SCALE`] means 1 base unit
//! equals 1 quote unit. For NFT collections the base unit is one token,
//! so the price is a per-token valuation of the collection.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use lien_protocol::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an oracle refused to quote.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The oracle has never seen a price for this pair.
    #[error("no price posted for {base} / {quote}")]
    UnknownPair {
        /// The asset being priced.
        base: Address,
        /// The asset prices are denominated in.
        quote: Address,
    },

    /// The posted price is older than the oracle tolerates.
    #[error("price for {base} / {quote} is stale: posted {updated_at}, asked at {now}")]
    StalePrice {
        /// The asset being priced.
        base: Address,
        /// The asset prices are denominated in.
        quote: Address,
        /// When the price was last posted.
        updated_at: DateTime<Utc>,
        /// The instant the quote was requested for.
        now: DateTime<Utc>,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Fixed-point price scale: a price of `PRICE_SCALE` is parity, one base
/// unit per quote unit.
pub const PRICE_SCALE: u64 = 1_000_000;

/// One answered price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Quote units per base unit, scaled by [`PRICE_SCALE`].
    pub price: u64,

    /// When this price was posted.
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// The value of `units` base units in quote units, floored. `None`
    /// when the product overflows the ledger's range.
    pub fn value_of(&self, units: u64) -> Option<u64> {
        let value = (units as u128)
            .checked_mul(self.price as u128)?
            / PRICE_SCALE as u128;
        u64::try_from(value).ok()
    }
}

/// Something that prices assets. Implementations decide for themselves
/// how fresh a price must be to count as an answer.
pub trait PriceOracle: Send + Sync {
    /// The price of `base` denominated in `quote`, valid at `now`.
    fn quote(&self, base: &Address, quote: &Address, now: DateTime<Utc>) -> Result<Quote, OracleError>;
}

// ---------------------------------------------------------------------------
// FixedPriceOracle
// ---------------------------------------------------------------------------

struct Board {
    prices: HashMap<(Address, Address), Quote>,
    max_age_secs: u64,
}

/// A settable price board with a freshness window.
///
/// Prices are posted by whoever holds a handle; `quote` refuses once a
/// posting is older than `max_age_secs`. Clones share the same board, so
/// a handle given to a strategy and a handle kept by an operator see the
/// same prices — exactly the shape a price-feed process wants.
#[derive(Clone)]
pub struct FixedPriceOracle {
    inner: Arc<RwLock<Board>>,
}

impl FixedPriceOracle {
    /// A board that trusts prices for `max_age_secs` after posting.
    pub fn new(max_age_secs: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Board {
                prices: HashMap::new(),
                max_age_secs,
            })),
        }
    }

    /// Post (or replace) the price of `base` in `quote` units.
    pub fn set(&self, base: Address, quote: Address, price: u64, updated_at: DateTime<Utc>) {
        self.inner
            .write()
            .prices
            .insert((base, quote), Quote { price, updated_at });
    }

    /// Drop the posting for a pair, if any.
    pub fn clear(&self, base: &Address, quote: &Address) {
        self.inner.write().prices.remove(&(*base, *quote));
    }
}

impl PriceOracle for FixedPriceOracle {
    fn quote(&self, base: &Address, quote: &Address, now: DateTime<Utc>) -> Result<Quote, OracleError> {
        let board = self.inner.read();
        let posted = board
            .prices
            .get(&(*base, *quote))
            .copied()
            .ok_or(OracleError::UnknownPair {
                base: *base,
                quote: *quote,
            })?;

        // Strictly older than the window is stale; the boundary second
        // still counts. A posting dated in the future is simply fresh.
        let age = now.signed_duration_since(posted.updated_at).num_seconds();
        if age > 0 && age as u64 > board.max_age_secs {
            return Err(OracleError::StalePrice {
                base: *base,
                quote: *quote,
                updated_at: posted.updated_at,
                now,
            });
        }

        Ok(posted)
    }
}

impl std::fmt::Debug for FixedPriceOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let board = self.inner.read();
        f.debug_struct("FixedPriceOracle")
            .field("pairs", &board.prices.len())
            .field("max_age_secs", &board.max_age_secs)
            .finish()
    }
}
