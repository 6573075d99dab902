//! # Protocol Configuration & Constants
//!
//! Every magic number in LIEN lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! These values define the DNA of the protocol. The hash domain strings in
//! particular are load-bearing: every signed proposal in flight commits to
//! them, so changing one after launch is somewhere between "difficult" and
//! "career-ending". Choose wisely during devnet.

// ---------------------------------------------------------------------------
// Protocol Identity
// ---------------------------------------------------------------------------

/// Protocol fingerprint for identification in status endpoints and logs.
/// Uniquely identifies the LIEN protocol family and build generation.
pub const PROTOCOL_FINGERPRINT: &str = "ALAS-LIEN-2026";

/// Major version — bump on breaking changes to hashing or acceptance rules.
/// A.k.a. "every outstanding signed proposal is now confetti."
pub const PROTOCOL_VERSION_MAJOR: u16 = 0;

/// Minor version — bump on backward-compatible additions.
pub const PROTOCOL_VERSION_MINOR: u16 = 1;

/// Patch version — bump on bug fixes that don't touch the wire surface.
pub const PROTOCOL_VERSION_PATCH: u16 = 0;

/// The full version string, assembled at compile time so we don't allocate
/// for something this trivial at runtime.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Human-readable prefix for all LIEN addresses. Bech32 HRP — short enough
/// to type, long enough to be unambiguous.
pub const ADDRESS_HRP: &str = "lien";

// ---------------------------------------------------------------------------
// Hash Domains
// ---------------------------------------------------------------------------
//
// Every structured hash in the protocol runs through BLAKE3 derive_key with
// one of these context strings. The `/v1` suffix is the schema version: if
// a preimage layout ever changes, the domain changes with it, and old
// digests become unreproducible instead of silently ambiguous.

/// Domain for proposal digests — the hash that proposers sign.
pub const PROPOSAL_DOMAIN: &str = "lien/proposal/v1";

/// Domain for deterministic component addresses (engine, pools, issuers).
pub const COMPONENT_ADDRESS_DOMAIN: &str = "lien/component-address/v1";

/// Domain for token contract addresses derived at registration.
pub const TOKEN_ADDRESS_DOMAIN: &str = "lien/token-address/v1";

/// Domain for collateral state fingerprints.
pub const FINGERPRINT_DOMAIN: &str = "lien/state-fingerprint/v1";

// ---------------------------------------------------------------------------
// Capability Tags
// ---------------------------------------------------------------------------
//
// Tags are granted in the hub by its owner and checked by components at
// their trust boundaries. They are plain strings, not an enum, because the
// tag namespace is open — a deployment can mint new tags for new component
// families without touching this crate.

/// Held by loan engines. Grants the right to mint claim tokens and to
/// consume utilized credit on behalf of accepted proposals.
pub const TAG_ACTIVE_LOAN: &str = "ACTIVE_LOAN";

/// Held by components allowed to revoke nonces on behalf of their owners
/// (e.g. an engine cancelling the proposal it just consumed out-of-band).
pub const TAG_NONCE_MANAGER: &str = "NONCE_MANAGER";

/// Held by registered default/liquidation modules. Without it, a module
/// binding in a proposal is dead on arrival.
pub const TAG_LOAN_MODULE: &str = "LOAN_MODULE";

// ---------------------------------------------------------------------------
// Loan Parameters
// ---------------------------------------------------------------------------

/// Minimum loan duration. Ten minutes. Anything shorter is either a typo
/// or an attempt to grief borrowers with loans that default before the
/// origination confirmation reaches them.
pub const MIN_LOAN_DURATION_SECS: u64 = 600;

/// Ceiling on the accruing interest rate: 160,000 basis points = 1,600% APR.
/// Above this we're not facilitating credit, we're facilitating a mugging.
pub const MAX_ACCRUING_APR_BPS: u32 = 160_000;

/// Basis-point denominator. 10,000 bps = 100%.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Seconds in the interest-accrual year (365 days, no leap anything).
/// Loan math wants a fixed denominator, not a calendar.
pub const SECONDS_PER_YEAR: u128 = 31_536_000;

/// Upper bound on module hook parameter blobs. Params configure per-loan
/// strategy state (a grace period, an LTV ceiling) — if you need more than
/// this, you need a config channel, not a proposal field.
pub const MAX_MODULE_PARAMS_LEN: usize = 256;

// ---------------------------------------------------------------------------
// Well-Known Components
// ---------------------------------------------------------------------------

/// Component label of the canonical loan engine. Its address is
/// `Address::of_component(LOAN_ENGINE_COMPONENT)` on every deployment.
pub const LOAN_ENGINE_COMPONENT: &str = "loan-engine";

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default RPC API port. Picked because it wasn't taken.
pub const DEFAULT_RPC_PORT: u16 = 9850;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9851;
