//! The Loan Engine proper: origination, repayment, claims.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use super::module::{LoanModule, ModuleError, ModuleRegistry, ON_LOAN_CREATED_MAGIC};
use super::token::{ClaimError, ClaimTokens};
use super::{Loan, LoanStatus};
use crate::asset::{Asset, AssetLedger};
use crate::config::{LOAN_ENGINE_COMPONENT, TAG_ACTIVE_LOAN, TAG_LOAN_MODULE};
use crate::crypto::signatures::KeyedSignature;
use crate::hub::{CapabilityOracle, HubError};
use crate::identity::Address;
use crate::proposal::{Proposal, ProposalEngine, ProposalError};
use crate::vault::{Vault, VaultError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything the loan lifecycle can refuse to do.
#[derive(Debug, Error)]
pub enum LoanError {
    /// No loan with this id — never originated, or already claimed.
    #[error("loan {0} not found")]
    LoanNotFound(u64),

    /// The operation needs a running loan.
    #[error("loan {id} is {status}; operation needs a running loan")]
    InvalidStatus {
        /// The loan.
        id: u64,
        /// Its effective status.
        status: LoanStatus,
    },

    /// The repayment window closed at expiration.
    #[error("loan {id} expired at {expiration}; repayment window is closed")]
    LoanExpired {
        /// The loan.
        id: u64,
        /// When the window closed.
        expiration: DateTime<Utc>,
    },

    /// The loan is still running; there is nothing to claim yet.
    #[error("loan {id} is running until {expiration}; nothing to claim yet")]
    LoanNotYetDefaulted {
        /// The loan.
        id: u64,
        /// When a default would begin.
        expiration: DateTime<Utc>,
    },

    /// Claims pay out to their holder only.
    #[error("caller {caller} does not hold the claim for loan {id}")]
    CallerNotClaimHolder {
        /// The loan.
        id: u64,
        /// Who tried to claim.
        caller: Address,
    },

    /// The proposal binds a module this engine has never seen.
    #[error("module {module} is not registered with this engine")]
    ModuleNotRegistered {
        /// The module's address.
        module: Address,
    },

    /// The module's hook answered with the wrong magic value.
    #[error(
        "module {module} returned {}, not the origination magic",
        hex::encode(got)
    )]
    UnexpectedModuleResponse {
        /// The module's address.
        module: Address,
        /// What it returned instead.
        got: [u8; 4],
    },

    /// The agreed terms produce a repayment that does not fit in u64.
    #[error("repayment amount overflows the ledger's units")]
    RepayAmountOverflow,

    /// The duration cannot be projected onto the clock.
    #[error("loan duration {duration_secs}s does not fit the clock")]
    InvalidDuration {
        /// The offending duration.
        duration_secs: u64,
    },

    /// Proposal validation refused the acceptance.
    #[error(transparent)]
    Proposal(#[from] ProposalError),

    /// Custody refused or detected an incomplete transfer.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// A capability tag was missing.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// The bound module rejected the loan.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// Claim-token bookkeeping refused.
    #[error(transparent)]
    Claim(#[from] ClaimError),
}

// ---------------------------------------------------------------------------
// LoanEngine
// ---------------------------------------------------------------------------

/// The component that turns acceptances into running loans and running
/// loans into settlements. Owns the vault, the claim book, the loan
/// records, the module registry and an embedded [`ProposalEngine`].
pub struct LoanEngine {
    address: Address,
    vault: Vault,
    proposals: ProposalEngine,
    claims: ClaimTokens,
    loans: HashMap<u64, Loan>,
    modules: ModuleRegistry,
}

impl LoanEngine {
    /// A fresh engine at the well-known component address. Registers its
    /// custody address's receiver policy on the ledger.
    pub fn new(ledger: &mut AssetLedger) -> Self {
        Self::at(Address::of_component(LOAN_ENGINE_COMPONENT), ledger)
    }

    /// A fresh engine at an explicit address (side-by-side deployments).
    pub fn at(address: Address, ledger: &mut AssetLedger) -> Self {
        let vault = Vault::new(address, ledger);
        Self {
            address,
            vault,
            proposals: ProposalEngine::new(),
            claims: ClaimTokens::new(),
            loans: HashMap::new(),
            modules: ModuleRegistry::new(),
        }
    }

    /// The engine's component address — also the custody address and the
    /// address capability tags attach to.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The embedded proposal engine (making, nonce administration,
    /// credit-line queries).
    pub fn proposals(&self) -> &ProposalEngine {
        &self.proposals
    }

    /// Mutable access to the embedded proposal engine.
    pub fn proposals_mut(&mut self) -> &mut ProposalEngine {
        &mut self.proposals
    }

    /// Register a strategy module. Registration alone grants nothing:
    /// origination additionally requires the module to hold the
    /// loan-module tag.
    pub fn register_module(&mut self, address: Address, module: Box<dyn LoanModule>) {
        self.modules.register(address, module);
    }

    /// Is a module registered at this address?
    pub fn module_registered(&self, address: &Address) -> bool {
        self.modules.is_registered(address)
    }

    // -- origination --------------------------------------------------------

    /// Originate a loan from a proposal.
    ///
    /// Runs the proposal acceptance algorithm, authorizes the engine and
    /// any bound module against the capability registry, moves custody
    /// (collateral borrower → vault, credit lender → borrower), and only
    /// then commits: consumes the proposal, binds the claim token to the
    /// lender, inserts the Running record. A failure at any point leaves
    /// the ledger and the proposal books untouched (a burned loan id is
    /// the one permitted scar).
    pub fn originate(
        &mut self,
        oracle: &dyn CapabilityOracle,
        ledger: &mut AssetLedger,
        proposal: &Proposal,
        signature: Option<&KeyedSignature>,
        acceptor: &Address,
        now: DateTime<Utc>,
    ) -> Result<u64, LoanError> {
        // Full read-only validation.
        let acceptance = self
            .proposals
            .evaluate(ledger, proposal, signature, acceptor, now)?;
        let terms = &acceptance.terms;

        // The engine itself must be authorized to run loans.
        oracle.require(&self.address, TAG_ACTIVE_LOAN)?;

        // A bound module must be both registered and tagged.
        if let Some(binding) = &terms.module {
            if !self.modules.is_registered(&binding.module) {
                return Err(LoanError::ModuleNotRegistered {
                    module: binding.module,
                });
            }
            oracle.require(&binding.module, TAG_LOAN_MODULE)?;
        }

        // Build the draft record. The id is burned even if we fail below.
        let id = self.claims.allocate();
        let repay_amount = terms
            .repayment_amount()
            .ok_or(LoanError::RepayAmountOverflow)?;
        let lifetime = i64::try_from(terms.duration_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or(LoanError::InvalidDuration {
                duration_secs: terms.duration_secs,
            })?;
        let expiration = now
            .checked_add_signed(lifetime)
            .ok_or(LoanError::InvalidDuration {
                duration_secs: terms.duration_secs,
            })?;

        let draft = Loan {
            id,
            status: LoanStatus::Running,
            borrower: terms.borrower,
            original_lender: terms.lender,
            collateral: terms.collateral,
            credit: terms.credit,
            repay_amount,
            duration_secs: terms.duration_secs,
            originated_at: now,
            expiration,
            module: terms.module.clone(),
        };

        // The module sees the finished draft and may still veto.
        if let Some(binding) = &draft.module {
            let module = self
                .modules
                .get_mut(&binding.module)
                .ok_or(LoanError::ModuleNotRegistered {
                    module: binding.module,
                })?;
            let answer = module.on_loan_created(&draft, &binding.params)?;
            if answer != ON_LOAN_CREATED_MAGIC {
                return Err(LoanError::UnexpectedModuleResponse {
                    module: binding.module,
                    got: answer,
                });
            }
        }

        // Custody, all or nothing. Each vault route rolls back its own
        // partial work; the outer snapshot additionally unwinds the pull
        // when the push fails.
        let snapshot = ledger.snapshot();
        self.vault.pull(ledger, &draft.collateral, &draft.borrower)?;
        if let Err(err) =
            self.vault
                .push_from(ledger, &draft.credit, &draft.original_lender, &draft.borrower)
        {
            ledger.restore(snapshot);
            return Err(err.into());
        }

        // Infallible commit.
        self.proposals.consume(&acceptance);
        self.claims.bind(id, draft.original_lender, self.address);
        self.loans.insert(id, draft);
        Ok(id)
    }

    // -- repayment ----------------------------------------------------------

    /// Repay a running loan before its expiration. Anyone may pay; the
    /// repayment is pulled from `payer` into custody and the collateral
    /// goes back to the borrower immediately.
    pub fn repay(
        &mut self,
        ledger: &mut AssetLedger,
        loan_id: u64,
        payer: &Address,
        now: DateTime<Utc>,
    ) -> Result<(), LoanError> {
        let loan = self
            .loans
            .get(&loan_id)
            .ok_or(LoanError::LoanNotFound(loan_id))?;
        match loan.status {
            LoanStatus::Running => {}
            status => return Err(LoanError::InvalidStatus { id: loan_id, status }),
        }
        if now >= loan.expiration {
            return Err(LoanError::LoanExpired {
                id: loan_id,
                expiration: loan.expiration,
            });
        }

        let repayment = Asset::fungible(loan.credit.address, loan.repay_amount);
        let collateral = loan.collateral;
        let borrower = loan.borrower;

        let snapshot = ledger.snapshot();
        self.vault.pull(ledger, &repayment, payer)?;
        if let Err(err) = self.vault.push(ledger, &collateral, &borrower) {
            ledger.restore(snapshot);
            return Err(err.into());
        }

        self.loans
            .get_mut(&loan_id)
            .ok_or(LoanError::LoanNotFound(loan_id))?
            .status = LoanStatus::Repaid;
        Ok(())
    }

    // -- claims -------------------------------------------------------------

    /// Settle a claim: the repayment for a repaid loan, the collateral
    /// for a defaulted one. Holder-only. Burns the claim and deletes the
    /// loan record in the same stroke — a second claim finds nothing.
    pub fn claim(
        &mut self,
        ledger: &mut AssetLedger,
        loan_id: u64,
        caller: &Address,
        now: DateTime<Utc>,
    ) -> Result<(), LoanError> {
        let loan = self
            .loans
            .get(&loan_id)
            .ok_or(LoanError::LoanNotFound(loan_id))?;
        let holder = self
            .claims
            .holder_of(loan_id)
            .ok_or(LoanError::LoanNotFound(loan_id))?;
        if holder != *caller {
            return Err(LoanError::CallerNotClaimHolder {
                id: loan_id,
                caller: *caller,
            });
        }

        let payout = match loan.status_at(now) {
            LoanStatus::Repaid => Asset::fungible(loan.credit.address, loan.repay_amount),
            LoanStatus::Defaulted => loan.collateral,
            LoanStatus::Running => {
                return Err(LoanError::LoanNotYetDefaulted {
                    id: loan_id,
                    expiration: loan.expiration,
                })
            }
        };

        self.vault.push(ledger, &payout, caller)?;

        self.claims.release(loan_id);
        self.loans.remove(&loan_id);
        Ok(())
    }

    /// Hand a claim to a new holder. Holder-only; the loan itself is
    /// untouched.
    pub fn transfer_claim(
        &mut self,
        caller: &Address,
        loan_id: u64,
        to: &Address,
    ) -> Result<(), LoanError> {
        self.claims.transfer(caller, loan_id, to)?;
        Ok(())
    }

    // -- getters ------------------------------------------------------------

    /// The loan record, if the loan is live.
    pub fn loan(&self, id: u64) -> Option<&Loan> {
        self.loans.get(&id)
    }

    /// All live loans, in no particular order.
    pub fn loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans.values()
    }

    /// Effective status at `now`.
    pub fn status_at(&self, id: u64, now: DateTime<Utc>) -> Result<LoanStatus, LoanError> {
        self.loans
            .get(&id)
            .map(|loan| loan.status_at(now))
            .ok_or(LoanError::LoanNotFound(id))
    }

    /// The frozen settlement figure.
    pub fn repayment_amount(&self, id: u64) -> Result<u64, LoanError> {
        self.loans
            .get(&id)
            .map(|loan| loan.repay_amount)
            .ok_or(LoanError::LoanNotFound(id))
    }

    /// Is the loan in default at `now`?
    ///
    /// When the loan binds a module that is still registered and tagged,
    /// the module's policy answers; a module whose tag was withdrawn no
    /// longer speaks for default and the expiration rule takes over.
    pub fn is_defaulted(
        &self,
        oracle: &dyn CapabilityOracle,
        id: u64,
        now: DateTime<Utc>,
    ) -> Result<bool, LoanError> {
        let loan = self.loans.get(&id).ok_or(LoanError::LoanNotFound(id))?;
        if let Some(binding) = &loan.module {
            if oracle.has_tag(&binding.module, TAG_LOAN_MODULE) {
                if let Some(module) = self.modules.get(&binding.module) {
                    return Ok(module.is_defaulted(loan, now));
                }
            }
        }
        Ok(loan.status_at(now) == LoanStatus::Defaulted)
    }

    /// Holder of a loan's claim token, if the loan is live.
    pub fn claim_holder(&self, id: u64) -> Option<Address> {
        self.claims.holder_of(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TAG_NONCE_MANAGER;
    use crate::crypto::keys::LienKeypair;
    use crate::hub::Hub;
    use crate::proposal::{ModuleBinding, ProposalIntent};
    use chrono::TimeZone;

    fn addr(label: &str) -> Address {
        Address::of_component(label)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    struct World {
        hub: Hub,
        ledger: AssetLedger,
        engine: LoanEngine,
        lender_keys: LienKeypair,
        lender: Address,
        borrower: Address,
        issuer: Address,
        credit_token: Address,
        art: Address,
    }

    fn world() -> World {
        let operator = addr("operator");
        let mut hub = Hub::new(operator);
        let mut ledger = AssetLedger::new();
        let engine = LoanEngine::new(&mut ledger);
        hub.set_tag(&operator, engine.address(), TAG_ACTIVE_LOAN, true)
            .unwrap();
        hub.set_tag(&operator, engine.address(), TAG_NONCE_MANAGER, true)
            .unwrap();

        let issuer = addr("issuer");
        let lender_keys = LienKeypair::from_seed(&[21u8; 32]);
        let lender = Address::from_public_key(&lender_keys.public_key());
        let borrower = addr("borrower");

        let credit_token = ledger.register_fungible("CRD", issuer).unwrap();
        ledger.mint(&issuer, &credit_token, &lender, 100_000).unwrap();
        let art = ledger.register_collection("ART", issuer).unwrap();
        ledger.mint_nft(&issuer, &art, &borrower, 1).unwrap();

        World {
            hub,
            ledger,
            engine,
            lender_keys,
            lender,
            borrower,
            issuer,
            credit_token,
            art,
        }
    }

    fn offer(w: &World) -> Proposal {
        Proposal {
            intent: ProposalIntent::Offer,
            proposer: w.lender,
            acceptor: None,
            collateral: Asset::nft(w.art, 1),
            collateral_state: None,
            credit: Asset::fungible(w.credit_token, 10_000),
            fixed_interest: 500,
            accruing_apr_bps: 1_200,
            duration_secs: 7 * 24 * 3_600,
            expiration: None,
            credit_limit_id: [0x11; 32],
            credit_limit: 0,
            nonce_space: 0,
            nonce: 1,
            module: None,
        }
    }

    fn approvals(w: &mut World) {
        let vault = w.engine.address();
        let collateral = Asset::nft(w.art, 1);
        let borrower = w.borrower;
        w.ledger.approve(&collateral, &borrower, &vault).unwrap();
        let credit = Asset::fungible(w.credit_token, 100_000);
        let lender = w.lender;
        w.ledger.approve(&credit, &lender, &vault).unwrap();
    }

    fn signed(w: &World, p: &Proposal) -> KeyedSignature {
        KeyedSignature::over(&w.lender_keys, &p.digest())
    }

    fn originate(w: &mut World, p: &Proposal) -> Result<u64, LoanError> {
        let sig = signed(w, p);
        let borrower = w.borrower;
        w.engine
            .originate(&w.hub, &mut w.ledger, p, Some(&sig), &borrower, t0())
    }

    #[test]
    fn origination_moves_both_legs_and_binds_the_claim() {
        let mut w = world();
        approvals(&mut w);
        let p = offer(&w);

        let id = originate(&mut w, &p).unwrap();
        assert_eq!(id, 1);

        let probe = Asset::fungible(w.credit_token, 0);
        assert_eq!(w.ledger.balance_of(&probe, &w.borrower).unwrap(), 10_000);
        assert_eq!(w.ledger.balance_of(&probe, &w.lender).unwrap(), 90_000);
        assert_eq!(
            w.ledger
                .balance_of(&Asset::nft(w.art, 1), &w.engine.address())
                .unwrap(),
            1
        );

        let loan = w.engine.loan(id).unwrap();
        assert_eq!(loan.status, LoanStatus::Running);
        assert_eq!(loan.repay_amount, 10_523);
        assert_eq!(loan.expiration, t0() + chrono::Duration::days(7));
        assert_eq!(w.engine.claim_holder(id), Some(w.lender));

        // Single-use: the nonce died with the origination.
        assert!(matches!(
            originate(&mut w, &p),
            Err(LoanError::Proposal(ProposalError::NonceNotUsable { .. }))
        ));
    }

    #[test]
    fn untagged_engine_cannot_originate() {
        let mut w = world();
        approvals(&mut w);
        let operator = addr("operator");
        let engine_addr = w.engine.address();
        w.hub
            .set_tag(&operator, engine_addr, TAG_ACTIVE_LOAN, false)
            .unwrap();

        let p = offer(&w);
        assert!(matches!(
            originate(&mut w, &p),
            Err(LoanError::Hub(HubError::MissingTag { .. }))
        ));
        // Nothing moved, nothing consumed.
        assert!(w
            .engine
            .proposals()
            .nonce_usable(ProposalIntent::Offer, &w.lender, 0, 1));
    }

    #[test]
    fn custody_failure_rolls_the_whole_origination_back() {
        let mut w = world();
        // Only the collateral approval; the lender never approved credit.
        let vault = w.engine.address();
        let collateral = Asset::nft(w.art, 1);
        let borrower = w.borrower;
        w.ledger.approve(&collateral, &borrower, &vault).unwrap();

        let p = offer(&w);
        assert!(matches!(
            originate(&mut w, &p),
            Err(LoanError::Vault(VaultError::Ledger(_)))
        ));

        // The pull was unwound: the borrower still owns the NFT and can
        // still spend the approval; the nonce is still alive.
        assert_eq!(
            w.ledger
                .balance_of(&Asset::nft(w.art, 1), &w.borrower)
                .unwrap(),
            1
        );
        assert!(w
            .engine
            .proposals()
            .nonce_usable(ProposalIntent::Offer, &w.lender, 0, 1));
        assert_eq!(w.engine.proposals().utilized(&w.lender, &p.credit_limit_id), 0);

        // Fixing the approval succeeds — on a fresh id, with the gap kept.
        let credit = Asset::fungible(w.credit_token, 100_000);
        let lender = w.lender;
        w.ledger.approve(&credit, &lender, &vault).unwrap();
        assert_eq!(originate(&mut w, &p).unwrap(), 2);
    }

    // -----------------------------------------------------------------------
    // Modules at origination
    // -----------------------------------------------------------------------

    struct Agreeable;
    impl LoanModule for Agreeable {
        fn on_loan_created(&mut self, _: &Loan, _: &[u8]) -> Result<[u8; 4], ModuleError> {
            Ok(ON_LOAN_CREATED_MAGIC)
        }
        fn is_defaulted(&self, loan: &Loan, now: DateTime<Utc>) -> bool {
            loan.status_at(now) == LoanStatus::Defaulted
        }
    }

    struct WrongMagic;
    impl LoanModule for WrongMagic {
        fn on_loan_created(&mut self, _: &Loan, _: &[u8]) -> Result<[u8; 4], ModuleError> {
            Ok([0u8; 4])
        }
        fn is_defaulted(&self, _: &Loan, _: DateTime<Utc>) -> bool {
            false
        }
    }

    fn with_module(w: &mut World, p: &mut Proposal, module: Box<dyn LoanModule>) -> Address {
        let operator = addr("operator");
        let module_addr = addr("strategy");
        w.engine.register_module(module_addr, module);
        w.hub
            .set_tag(&operator, module_addr, TAG_LOAN_MODULE, true)
            .unwrap();
        p.module = Some(ModuleBinding {
            module: module_addr,
            params: vec![],
        });
        module_addr
    }

    #[test]
    fn bound_module_must_be_registered_and_tagged() {
        let mut w = world();
        approvals(&mut w);
        let mut p = offer(&w);
        p.module = Some(ModuleBinding {
            module: addr("stranger"),
            params: vec![],
        });
        assert!(matches!(
            originate(&mut w, &p),
            Err(LoanError::ModuleNotRegistered { .. })
        ));

        // Registered but untagged is still refused.
        w.engine.register_module(addr("stranger"), Box::new(Agreeable));
        assert!(matches!(
            originate(&mut w, &p),
            Err(LoanError::Hub(HubError::MissingTag { .. }))
        ));
    }

    #[test]
    fn wrong_magic_vetoes_origination_before_custody() {
        let mut w = world();
        approvals(&mut w);
        let mut p = offer(&w);
        with_module(&mut w, &mut p, Box::new(WrongMagic));

        assert!(matches!(
            originate(&mut w, &p),
            Err(LoanError::UnexpectedModuleResponse { .. })
        ));
        assert_eq!(
            w.ledger
                .balance_of(&Asset::nft(w.art, 1), &w.borrower)
                .unwrap(),
            1
        );

        // The failed attempt burned id 1.
        p.module = None;
        assert_eq!(originate(&mut w, &p).unwrap(), 2);
    }

    #[test]
    fn tagged_module_answers_is_defaulted() {
        let mut w = world();
        approvals(&mut w);
        let mut p = offer(&w);
        with_module(&mut w, &mut p, Box::new(Agreeable));

        let id = originate(&mut w, &p).unwrap();
        assert!(!w.engine.is_defaulted(&w.hub, id, t0()).unwrap());
        assert!(w
            .engine
            .is_defaulted(&w.hub, id, t0() + chrono::Duration::days(8))
            .unwrap());
    }

    // -----------------------------------------------------------------------
    // Repayment & claims
    // -----------------------------------------------------------------------

    fn funded_loan(w: &mut World) -> u64 {
        approvals(w);
        let p = offer(w);
        let id = originate(w, &p).unwrap();
        // The borrower needs interest money and a repayment approval.
        let issuer = w.issuer;
        let borrower = w.borrower;
        w.ledger
            .mint(&issuer, &w.credit_token, &borrower, 1_000)
            .unwrap();
        let vault = w.engine.address();
        w.ledger
            .approve(&Asset::fungible(w.credit_token, 11_000), &borrower, &vault)
            .unwrap();
        id
    }

    #[test]
    fn repay_returns_collateral_and_parks_the_repayment() {
        let mut w = world();
        let id = funded_loan(&mut w);
        let borrower = w.borrower;

        w.engine
            .repay(&mut w.ledger, id, &borrower, t0() + chrono::Duration::days(3))
            .unwrap();

        assert_eq!(
            w.ledger
                .balance_of(&Asset::nft(w.art, 1), &w.borrower)
                .unwrap(),
            1
        );
        assert_eq!(
            w.ledger
                .balance_of(&Asset::fungible(w.credit_token, 0), &w.engine.address())
                .unwrap(),
            10_523
        );
        assert_eq!(w.engine.loan(id).unwrap().status, LoanStatus::Repaid);

        // A second repayment has nothing to repay.
        assert!(matches!(
            w.engine
                .repay(&mut w.ledger, id, &borrower, t0() + chrono::Duration::days(3)),
            Err(LoanError::InvalidStatus {
                status: LoanStatus::Repaid,
                ..
            })
        ));
    }

    #[test]
    fn repayment_window_closes_at_expiration() {
        let mut w = world();
        let id = funded_loan(&mut w);
        let borrower = w.borrower;

        assert!(matches!(
            w.engine
                .repay(&mut w.ledger, id, &borrower, t0() + chrono::Duration::days(7)),
            Err(LoanError::LoanExpired { .. })
        ));
    }

    #[test]
    fn claim_on_repaid_loan_pays_the_holder_and_deletes_the_loan() {
        let mut w = world();
        let id = funded_loan(&mut w);
        let borrower = w.borrower;
        let lender = w.lender;
        w.engine
            .repay(&mut w.ledger, id, &borrower, t0() + chrono::Duration::days(1))
            .unwrap();

        // Wrong caller bounces.
        assert!(matches!(
            w.engine
                .claim(&mut w.ledger, id, &borrower, t0() + chrono::Duration::days(2)),
            Err(LoanError::CallerNotClaimHolder { .. })
        ));

        w.engine
            .claim(&mut w.ledger, id, &lender, t0() + chrono::Duration::days(2))
            .unwrap();
        assert_eq!(
            w.ledger
                .balance_of(&Asset::fungible(w.credit_token, 0), &w.lender)
                .unwrap(),
            100_523
        );

        // Exactly once.
        assert!(w.engine.loan(id).is_none());
        assert_eq!(w.engine.claim_holder(id), None);
        assert!(matches!(
            w.engine
                .claim(&mut w.ledger, id, &lender, t0() + chrono::Duration::days(2)),
            Err(LoanError::LoanNotFound(_))
        ));
    }

    #[test]
    fn claim_before_default_is_refused() {
        let mut w = world();
        let id = funded_loan(&mut w);
        let lender = w.lender;

        assert!(matches!(
            w.engine
                .claim(&mut w.ledger, id, &lender, t0() + chrono::Duration::days(3)),
            Err(LoanError::LoanNotYetDefaulted { .. })
        ));
    }

    #[test]
    fn defaulted_claim_pays_collateral_to_the_current_holder() {
        let mut w = world();
        let id = funded_loan(&mut w);
        let lender = w.lender;
        let buyer = addr("claim-buyer");

        // The lender sells the claim mid-loan.
        w.engine.transfer_claim(&lender, id, &buyer).unwrap();
        assert_eq!(w.engine.claim_holder(id), Some(buyer));

        // Day 8: default. The old lender can no longer claim.
        let day8 = t0() + chrono::Duration::days(8);
        assert!(matches!(
            w.engine.claim(&mut w.ledger, id, &lender, day8),
            Err(LoanError::CallerNotClaimHolder { .. })
        ));

        w.engine.claim(&mut w.ledger, id, &buyer, day8).unwrap();
        assert_eq!(
            w.ledger.balance_of(&Asset::nft(w.art, 1), &buyer).unwrap(),
            1
        );
        assert!(w.engine.loan(id).is_none());
    }
}
