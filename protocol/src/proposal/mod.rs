//! # Proposal Engine
//!
//! Loan terms are negotiated off-protocol. A lender (or borrower) fills
//! in a [`Proposal`], signs its digest, and hands it around — a chat
//! message, a marketplace listing, an email attachment. Nothing touches
//! protocol state until a counterparty shows up with the proposal and
//! the signature and asks the Loan Engine to originate against it.
//!
//! This module is the gatekeeper for that moment. It answers exactly one
//! question — *may this acceptor originate against this proposal right
//! now?* — and answers it without mutating anything. The split matters:
//!
//! - [`ProposalEngine::evaluate`] runs the full acceptance algorithm
//!   read-only and emits an [`Acceptance`]: the resolved [`Terms`] plus a
//!   private consumption plan.
//! - `consume` commits the plan (credit tally, single-use nonce burn)
//!   and cannot fail. The Loan Engine calls it only after custody
//!   transfers succeed, which is how a failed origination leaves no
//!   trace in the nonce or credit books.
//!
//! ## Two ways to validate authorship
//!
//! A digest is accepted when it is **on record** (the proposer called
//! [`ProposalEngine::make`] — useful for contract-driven flows where no
//! private key holds the proposer address) **or** when it carries a
//! signature the engine's [`SignatureScheme`] accepts. The default
//! scheme is Ed25519 over the digest, with the attached public key
//! required to hash to the proposer's address.
//!
//! ## Replay and reuse
//!
//! Every proposal names a nonce coordinate in its role's registry
//! (offers and requests burn nonces independently). A `credit_limit` of
//! zero marks the proposal single-use: its nonce is revoked at
//! consumption. A non-zero limit makes it a reusable credit line: the
//! nonce survives, and each origination draws the principal from the
//! limit until the line is exhausted.

pub mod fingerprint;

pub use fingerprint::{FingerprintRegistry, StateFingerprintComputer, TokenStateComputer};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::asset::{Asset, AssetCategory, AssetLedger};
use crate::config::{
    MAX_ACCRUING_APR_BPS, MAX_MODULE_PARAMS_LEN, MIN_LOAN_DURATION_SECS, PROPOSAL_DOMAIN,
};
use crate::credit::UtilizedCredit;
use crate::crypto::hash::domain_separated_hash;
use crate::crypto::signatures::{Ed25519Scheme, KeyedSignature, SignatureScheme};
use crate::hub::CapabilityOracle;
use crate::identity::Address;
use crate::loan::Terms;
use crate::nonce::{NonceError, NonceRegistry};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a proposal cannot be made or accepted.
#[derive(Debug, Error)]
pub enum ProposalError {
    /// Only the proposer may put their own proposal on record.
    #[error("caller {caller} is not the proposer {proposer}")]
    CallerNotProposer {
        /// Who tried.
        caller: Address,
        /// Who the proposal names.
        proposer: Address,
    },

    /// The proposal is neither on record nor carries a signature the
    /// scheme accepts for the proposer.
    #[error("proposal signature is missing or invalid")]
    InvalidSignature,

    /// The proposal's own deadline has passed.
    #[error("proposal expired at {expiration}")]
    Expired {
        /// The deadline that passed.
        expiration: DateTime<Utc>,
    },

    /// The proposal is addressed to somebody else.
    #[error("proposal is reserved for {expected}, not {caller}")]
    CallerNotAcceptor {
        /// The fixed acceptor the proposal names.
        expected: Address,
        /// Who actually tried to accept.
        caller: Address,
    },

    /// Proposers cannot accept their own proposals.
    #[error("{address} cannot accept their own proposal")]
    AcceptorIsProposer {
        /// The address on both sides.
        address: Address,
    },

    /// The proposal's nonce coordinate is revoked or from a stale space.
    #[error("nonce {nonce} in space {space} of {owner} is not usable")]
    NonceNotUsable {
        /// The nonce's owner (the proposer).
        owner: Address,
        /// The space coordinate.
        space: u64,
        /// The nonce coordinate.
        nonce: u64,
    },

    /// The proposal pins a collateral state but no fingerprint computer
    /// is registered for the collateral's token contract.
    #[error("no state fingerprint computer registered for token {token}")]
    NoStateFingerprintComputer {
        /// The collateral's token contract.
        token: Address,
    },

    /// The collateral's fingerprint could not be computed at all.
    #[error("collateral state of token {token} is unavailable")]
    CollateralStateUnavailable {
        /// The collateral's token contract.
        token: Address,
    },

    /// The collateral's state moved since the proposal was signed.
    #[error(
        "collateral state mismatch: proposal pinned {}, current is {}",
        hex::encode(pinned),
        hex::encode(computed)
    )]
    CollateralStateMismatch {
        /// The fingerprint the proposal pinned.
        pinned: [u8; 32],
        /// The fingerprint computed right now.
        computed: [u8; 32],
    },

    /// The draw does not fit under the proposal's credit line.
    #[error(
        "available credit limit exceeded: used {used} + requested {requested} > limit {limit}"
    )]
    AvailableCreditLimitExceeded {
        /// Units already drawn against the line.
        used: u64,
        /// The principal this acceptance would draw.
        requested: u64,
        /// The effective cap.
        limit: u64,
    },

    /// Loans shorter than the protocol minimum are rejected outright.
    #[error("loan duration {duration_secs}s is below the {minimum_secs}s minimum")]
    DurationTooShort {
        /// The proposal's duration.
        duration_secs: u64,
        /// The protocol floor.
        minimum_secs: u64,
    },

    /// Accruing interest above the protocol ceiling.
    #[error("accruing APR {apr_bps} bps exceeds the {maximum_bps} bps maximum")]
    AprTooHigh {
        /// The proposal's APR.
        apr_bps: u32,
        /// The protocol ceiling.
        maximum_bps: u32,
    },

    /// Credit must be a fungible asset.
    #[error("credit asset must be fungible, got {category}")]
    CreditNotFungible {
        /// The category the proposal declared.
        category: AssetCategory,
    },

    /// A loan of nothing is not a loan.
    #[error("credit principal must be non-zero")]
    ZeroPrincipal,

    /// Module parameters above the size cap.
    #[error("module params of {len} bytes exceed the {max} byte maximum")]
    ModuleParamsTooLong {
        /// Declared params length.
        len: usize,
        /// The cap.
        max: usize,
    },

    /// Nonce registry refusal during an explicit revocation call.
    #[error(transparent)]
    Nonce(#[from] NonceError),
}

// ---------------------------------------------------------------------------
// Proposal
// ---------------------------------------------------------------------------

/// Which side of the loan the proposer is volunteering for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalIntent {
    /// Proposer lends; the acceptor borrows.
    Offer,
    /// Proposer borrows; the acceptor lends.
    Request,
}

impl ProposalIntent {
    fn tag(self) -> u8 {
        match self {
            ProposalIntent::Offer => 0,
            ProposalIntent::Request => 1,
        }
    }
}

/// A strategy module bound into the proposal: the module's address plus
/// opaque parameters the module interprets at origination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleBinding {
    /// The module's component address (must be registered and tagged).
    pub module: Address,

    /// Module-specific parameters, at most
    /// [`MAX_MODULE_PARAMS_LEN`] bytes.
    #[serde(with = "crate::crypto::hash::hex_bytes")]
    pub params: Vec<u8>,
}

/// A signed, off-protocol-negotiable loan proposal.
///
/// This is the artifact that travels between parties. Its digest — not
/// its JSON — is what gets signed, so field order and encoding in
/// [`Proposal::signable_bytes`] are wire-compatibility surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Offer (proposer lends) or Request (proposer borrows).
    pub intent: ProposalIntent,

    /// Who signed (or will put on record) this proposal.
    pub proposer: Address,

    /// Restrict acceptance to one counterparty, or leave open.
    pub acceptor: Option<Address>,

    /// What the borrower locks up.
    pub collateral: Asset,

    /// Optional pin of the collateral's state fingerprint. Acceptance
    /// fails if the collateral's state has moved since signing.
    #[serde(with = "crate::crypto::hash::hex32_opt")]
    pub collateral_state: Option<[u8; 32]>,

    /// What the lender hands over. Must be fungible; `amount` is the
    /// principal.
    pub credit: Asset,

    /// Flat interest in credit units, owed regardless of duration.
    pub fixed_interest: u64,

    /// Accruing interest in basis points per year, projected over the
    /// full duration at origination.
    pub accruing_apr_bps: u32,

    /// Loan length in seconds; expiration = origination time + duration.
    pub duration_secs: u64,

    /// Last moment the proposal itself can be accepted (distinct from
    /// the loan's own lifetime). `None` means no deadline.
    pub expiration: Option<DateTime<Utc>>,

    /// Identifies the credit line this proposal draws from. Multiple
    /// proposals may share a line; a fresh id opens a fresh line.
    #[serde(with = "crate::crypto::hash::hex32")]
    pub credit_limit_id: [u8; 32],

    /// Cap of the credit line, in credit units. Zero marks the proposal
    /// single-use: effective cap = principal, nonce burned on use.
    pub credit_limit: u64,

    /// Nonce space coordinate (must equal the proposer's current space).
    pub nonce_space: u64,

    /// Nonce coordinate within the space.
    pub nonce: u64,

    /// Optional strategy module governing default determination for
    /// loans born of this proposal.
    pub module: Option<ModuleBinding>,
}

impl Proposal {
    /// The deterministic signature preimage.
    ///
    /// Fixed-width little-endian integers, one tag byte per enum, a
    /// presence byte before every optional field, and length prefixes
    /// for the variable-width module params. JSON/serde is intentionally
    /// avoided here: the preimage must be byte-identical across
    /// serializer versions or every signature in flight breaks.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(256);

        bytes.push(self.intent.tag());
        bytes.extend_from_slice(self.proposer.as_bytes());

        match &self.acceptor {
            Some(address) => {
                bytes.push(1);
                bytes.extend_from_slice(address.as_bytes());
            }
            None => bytes.push(0),
        }

        self.collateral.encode_into(&mut bytes);

        match &self.collateral_state {
            Some(fingerprint) => {
                bytes.push(1);
                bytes.extend_from_slice(fingerprint);
            }
            None => bytes.push(0),
        }

        self.credit.encode_into(&mut bytes);

        bytes.extend_from_slice(&self.fixed_interest.to_le_bytes());
        bytes.extend_from_slice(&self.accruing_apr_bps.to_le_bytes());
        bytes.extend_from_slice(&self.duration_secs.to_le_bytes());

        match &self.expiration {
            Some(expiration) => {
                bytes.push(1);
                bytes.extend_from_slice(&expiration.timestamp().to_le_bytes());
            }
            None => bytes.push(0),
        }

        bytes.extend_from_slice(&self.credit_limit_id);
        bytes.extend_from_slice(&self.credit_limit.to_le_bytes());
        bytes.extend_from_slice(&self.nonce_space.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());

        match &self.module {
            Some(binding) => {
                bytes.push(1);
                bytes.extend_from_slice(binding.module.as_bytes());
                bytes.extend_from_slice(&(binding.params.len() as u32).to_le_bytes());
                bytes.extend_from_slice(&binding.params);
            }
            None => bytes.push(0),
        }

        bytes
    }

    /// The digest parties sign: domain-separated BLAKE3 over
    /// [`signable_bytes`](Self::signable_bytes). Any field change
    /// changes the digest.
    pub fn digest(&self) -> [u8; 32] {
        domain_separated_hash(PROPOSAL_DOMAIN, &self.signable_bytes())
    }

    /// The principal this proposal moves on acceptance.
    pub fn principal(&self) -> u64 {
        self.credit.transfer_amount()
    }

    /// Single-use proposals burn their nonce on consumption.
    pub fn is_single_use(&self) -> bool {
        self.credit_limit == 0
    }

    /// The effective cap of the credit line: the declared limit, or the
    /// principal itself for single-use proposals.
    pub fn effective_credit_limit(&self) -> u64 {
        if self.is_single_use() {
            self.principal()
        } else {
            self.credit_limit
        }
    }
}

// ---------------------------------------------------------------------------
// Acceptance
// ---------------------------------------------------------------------------

/// What evaluation decided to do at commit time. Private to the crate:
/// only engines commit plans.
#[derive(Debug, Clone)]
pub(crate) struct ConsumptionPlan {
    pub(crate) intent: ProposalIntent,
    pub(crate) owner: Address,
    pub(crate) line: [u8; 32],
    pub(crate) draw: u64,
    pub(crate) space: u64,
    pub(crate) nonce: u64,
    pub(crate) revoke_nonce: bool,
}

/// The positive outcome of [`ProposalEngine::evaluate`]: resolved terms
/// plus the consumption plan the engine commits after custody succeeds.
#[derive(Debug, Clone)]
pub struct Acceptance {
    /// The proposal digest acceptance was computed for.
    pub digest: [u8; 32],

    /// Resolved loan terms with lender/borrower assigned by intent.
    pub terms: Terms,

    pub(crate) plan: ConsumptionPlan,
}

// ---------------------------------------------------------------------------
// ProposalEngine
// ---------------------------------------------------------------------------

/// Validates acceptances and keeps the books proposals consume: the
/// made-set, one nonce registry per role, and the utilized-credit tally.
pub struct ProposalEngine {
    made: HashSet<[u8; 32]>,
    offer_nonces: NonceRegistry,
    request_nonces: NonceRegistry,
    credit: UtilizedCredit,
    fingerprints: FingerprintRegistry,
    scheme: Box<dyn SignatureScheme>,
}

impl Default for ProposalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProposalEngine {
    /// An engine with the default Ed25519 signature scheme.
    pub fn new() -> Self {
        Self::with_scheme(Box::new(Ed25519Scheme))
    }

    /// An engine with a custom signature scheme (contract-signer
    /// deployments).
    pub fn with_scheme(scheme: Box<dyn SignatureScheme>) -> Self {
        Self {
            made: HashSet::new(),
            offer_nonces: NonceRegistry::new(),
            request_nonces: NonceRegistry::new(),
            credit: UtilizedCredit::new(),
            fingerprints: FingerprintRegistry::new(),
            scheme,
        }
    }

    /// Register a fingerprint computer for one token contract.
    pub fn register_fingerprint_computer(
        &mut self,
        token: Address,
        computer: Box<dyn StateFingerprintComputer>,
    ) {
        self.fingerprints.register(token, computer);
    }

    // -- making -------------------------------------------------------------

    /// Put a proposal digest on record, waiving the signature requirement
    /// for future acceptances. Only the proposer may do this. Returns the
    /// digest.
    pub fn make(&mut self, proposal: &Proposal, caller: &Address) -> Result<[u8; 32], ProposalError> {
        if *caller != proposal.proposer {
            return Err(ProposalError::CallerNotProposer {
                caller: *caller,
                proposer: proposal.proposer,
            });
        }
        let digest = proposal.digest();
        self.made.insert(digest);
        Ok(digest)
    }

    /// Is this digest on record?
    pub fn is_made(&self, digest: &[u8; 32]) -> bool {
        self.made.contains(digest)
    }

    // -- evaluation ---------------------------------------------------------

    /// Run the full acceptance algorithm read-only.
    ///
    /// On success the returned [`Acceptance`] carries everything the Loan
    /// Engine needs to originate; nothing here has been consumed yet.
    pub fn evaluate(
        &self,
        ledger: &AssetLedger,
        proposal: &Proposal,
        signature: Option<&KeyedSignature>,
        acceptor: &Address,
        now: DateTime<Utc>,
    ) -> Result<Acceptance, ProposalError> {
        let digest = proposal.digest();

        // Authorship: on record, or signed by the proposer.
        if !self.made.contains(&digest) {
            let keyed = signature.ok_or(ProposalError::InvalidSignature)?;
            if !self.scheme.is_valid(&proposal.proposer, &digest, keyed) {
                return Err(ProposalError::InvalidSignature);
            }
        }

        // The proposal's own deadline.
        if let Some(expiration) = proposal.expiration {
            if now >= expiration {
                return Err(ProposalError::Expired { expiration });
            }
        }

        // Who may accept.
        if let Some(expected) = proposal.acceptor {
            if expected != *acceptor {
                return Err(ProposalError::CallerNotAcceptor {
                    expected,
                    caller: *acceptor,
                });
            }
        }
        if *acceptor == proposal.proposer {
            return Err(ProposalError::AcceptorIsProposer { address: *acceptor });
        }

        // Replay protection.
        let registry = self.registry(proposal.intent);
        if !registry.is_usable(&proposal.proposer, proposal.nonce_space, proposal.nonce) {
            return Err(ProposalError::NonceNotUsable {
                owner: proposal.proposer,
                space: proposal.nonce_space,
                nonce: proposal.nonce,
            });
        }

        // Pinned collateral state.
        if let Some(pinned) = proposal.collateral_state {
            let computer = self
                .fingerprints
                .computer_for(&proposal.collateral.address)
                .ok_or(ProposalError::NoStateFingerprintComputer {
                    token: proposal.collateral.address,
                })?;
            let computed = computer
                .fingerprint(ledger, &proposal.collateral)
                .ok_or(ProposalError::CollateralStateUnavailable {
                    token: proposal.collateral.address,
                })?;
            if computed != pinned {
                return Err(ProposalError::CollateralStateMismatch { pinned, computed });
            }
        }

        // Credit headroom on the line.
        let principal = proposal.principal();
        let limit = proposal.effective_credit_limit();
        let used = self.credit.utilized(&proposal.proposer, &proposal.credit_limit_id);
        if !self
            .credit
            .fits(&proposal.proposer, &proposal.credit_limit_id, principal, limit)
        {
            return Err(ProposalError::AvailableCreditLimitExceeded {
                used,
                requested: principal,
                limit,
            });
        }

        // Shape limits.
        if proposal.duration_secs < MIN_LOAN_DURATION_SECS {
            return Err(ProposalError::DurationTooShort {
                duration_secs: proposal.duration_secs,
                minimum_secs: MIN_LOAN_DURATION_SECS,
            });
        }
        if proposal.accruing_apr_bps > MAX_ACCRUING_APR_BPS {
            return Err(ProposalError::AprTooHigh {
                apr_bps: proposal.accruing_apr_bps,
                maximum_bps: MAX_ACCRUING_APR_BPS,
            });
        }
        if proposal.credit.category != AssetCategory::Fungible {
            return Err(ProposalError::CreditNotFungible {
                category: proposal.credit.category,
            });
        }
        if principal == 0 {
            return Err(ProposalError::ZeroPrincipal);
        }
        if let Some(binding) = &proposal.module {
            if binding.params.len() > MAX_MODULE_PARAMS_LEN {
                return Err(ProposalError::ModuleParamsTooLong {
                    len: binding.params.len(),
                    max: MAX_MODULE_PARAMS_LEN,
                });
            }
        }

        // Roles fall out of the intent.
        let (lender, borrower) = match proposal.intent {
            ProposalIntent::Offer => (proposal.proposer, *acceptor),
            ProposalIntent::Request => (*acceptor, proposal.proposer),
        };

        Ok(Acceptance {
            digest,
            terms: Terms {
                lender,
                borrower,
                collateral: proposal.collateral.normalized(),
                credit: proposal.credit.normalized(),
                fixed_interest: proposal.fixed_interest,
                accruing_apr_bps: proposal.accruing_apr_bps,
                duration_secs: proposal.duration_secs,
                module: proposal.module.clone(),
            },
            plan: ConsumptionPlan {
                intent: proposal.intent,
                owner: proposal.proposer,
                line: proposal.credit_limit_id,
                draw: principal,
                space: proposal.nonce_space,
                nonce: proposal.nonce,
                revoke_nonce: proposal.is_single_use(),
            },
        })
    }

    /// Commit an acceptance's consumption plan. Infallible: every check
    /// already passed in [`evaluate`](Self::evaluate), and the Loan
    /// Engine calls this only after custody transfers succeed.
    pub(crate) fn consume(&mut self, acceptance: &Acceptance) {
        let plan = &acceptance.plan;
        self.credit.record_usage(&plan.owner, &plan.line, plan.draw);
        if plan.revoke_nonce {
            self.registry_mut(plan.intent)
                .mark_revoked(&plan.owner, plan.space, plan.nonce);
        }
    }

    // -- nonce pass-throughs ------------------------------------------------

    /// Burn a nonce in the owner's current space of the role's registry.
    pub fn revoke_nonce(
        &mut self,
        intent: ProposalIntent,
        owner: &Address,
        nonce: u64,
    ) -> Result<(), ProposalError> {
        self.registry_mut(intent).revoke(owner, nonce)?;
        Ok(())
    }

    /// Burn a nonce at an explicit space coordinate.
    pub fn revoke_nonce_in_space(
        &mut self,
        intent: ProposalIntent,
        owner: &Address,
        space: u64,
        nonce: u64,
    ) -> Result<(), ProposalError> {
        self.registry_mut(intent).revoke_in_space(owner, space, nonce)?;
        Ok(())
    }

    /// Burn somebody else's nonce; caller must hold the nonce-manager tag.
    pub fn revoke_nonce_on_behalf(
        &mut self,
        oracle: &dyn CapabilityOracle,
        intent: ProposalIntent,
        caller: &Address,
        owner: &Address,
        space: u64,
        nonce: u64,
    ) -> Result<(), ProposalError> {
        self.registry_mut(intent)
            .revoke_on_behalf(oracle, caller, owner, space, nonce)?;
        Ok(())
    }

    /// Invalidate every outstanding nonce of the owner in the role's
    /// registry; returns the new space.
    pub fn revoke_nonce_space(&mut self, intent: ProposalIntent, owner: &Address) -> u64 {
        self.registry_mut(intent).revoke_space(owner)
    }

    /// Is this nonce coordinate currently spendable?
    pub fn nonce_usable(
        &self,
        intent: ProposalIntent,
        owner: &Address,
        space: u64,
        nonce: u64,
    ) -> bool {
        self.registry(intent).is_usable(owner, space, nonce)
    }

    /// The owner's current space in the role's registry.
    pub fn current_nonce_space(&self, intent: ProposalIntent, owner: &Address) -> u64 {
        self.registry(intent).current_space(owner)
    }

    /// Units already drawn against a credit line.
    pub fn utilized(&self, owner: &Address, line: &[u8; 32]) -> u64 {
        self.credit.utilized(owner, line)
    }

    fn registry(&self, intent: ProposalIntent) -> &NonceRegistry {
        match intent {
            ProposalIntent::Offer => &self.offer_nonces,
            ProposalIntent::Request => &self.request_nonces,
        }
    }

    fn registry_mut(&mut self, intent: ProposalIntent) -> &mut NonceRegistry {
        match intent {
            ProposalIntent::Offer => &mut self.offer_nonces,
            ProposalIntent::Request => &mut self.request_nonces,
        }
    }
}
