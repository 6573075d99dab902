//! Interactive CLI demo of the full LIEN protocol lifecycle.
//!
//! Walks through identity creation, market bootstrap, off-protocol offer
//! signing, loan origination, repayment, claim settlement, and a second
//! act where a loan defaults and the claim — sold mid-loan — pays out
//! collateral to its buyer. The output uses ANSI escape codes for
//! colored, storytelling-style terminal rendering.
//!
//! Run with:
//!   cargo run --example demo --release

use std::time::Instant;

use chrono::{DateTime, Duration, TimeZone, Utc};

use lien_protocol::asset::{Asset, AssetLedger};
use lien_protocol::config::TAG_ACTIVE_LOAN;
use lien_protocol::crypto::keys::LienKeypair;
use lien_protocol::crypto::signatures::KeyedSignature;
use lien_protocol::hub::Hub;
use lien_protocol::identity::Address;
use lien_protocol::loan::{LoanEngine, LoanStatus};
use lien_protocol::proposal::{Proposal, ProposalIntent};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const ITALIC: &str = "\x1b[3m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    LIEN PROTOCOL  --  Interactive Lifecycle Demo                   {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    Version 0.1.0  |  Ed25519 + BLAKE3 + Bech32                     {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!(
        "{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]=============================================================={RESET}"
    );
    println!("{BOLD}{WHITE}  {title}{RESET}");
    println!(
        "{CYAN}------------------------------------------------------------------------{RESET}"
    );
}

fn subsection(text: &str) {
    println!("{DIM}{CYAN}  >> {text}{RESET}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn info(label: &str, value: &str) {
    println!("{WHITE}  {BOLD}{label}:{RESET} {YELLOW}{value}{RESET}");
}

fn timing(label: &str, elapsed: std::time::Duration) {
    let ms = elapsed.as_secs_f64() * 1000.0;
    println!("{DIM}{MAGENTA}  [{label}: {ms:.2} ms]{RESET}");
}

fn address_display(name: &str, addr: &Address, color: &str) {
    let encoded = addr.to_bech32();
    let prefix = &encoded[..5];
    let suffix = &encoded[encoded.len().saturating_sub(8)..];
    println!(
        "  {color}{BOLD}{name}{RESET}  {DIM}{prefix}...{suffix}{RESET}  {DIM}({} chars){RESET}",
        encoded.len()
    );
}

fn balance_row(name: &str, balance: u64, color: &str) {
    println!("  {color}{BOLD}{name:<12}{RESET}  {WHITE}{balance:>12}{RESET} {DIM}CRD{RESET}");
}

fn separator() {
    println!(
        "{DIM}{CYAN}  . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . {RESET}"
    );
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The demo's fixed clock origin. Loans live on a simulated calendar —
/// nobody wants to watch a 7-day demo in real time.
fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn credit_balance(ledger: &AssetLedger, token: &Address, who: &Address) -> u64 {
    ledger
        .balance_of(&Asset::fungible(*token, 0), who)
        .expect("credit token is registered")
}

fn owns_art(ledger: &AssetLedger, art: &Address, who: &Address) -> bool {
    ledger
        .balance_of(&Asset::nft(*art, 1), who)
        .expect("collection is registered")
        == 1
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let demo_start = Instant::now();

    banner();

    // -----------------------------------------------------------------------
    // Step 1: Identity Creation
    // -----------------------------------------------------------------------

    section(1, "Participant Identity Generation");
    subsection("Generating Ed25519 keypairs and deriving Bech32 addresses...");

    let t = Instant::now();
    let lender_keys = LienKeypair::generate();
    let borrower_keys = LienKeypair::generate();
    timing("keygen x2", t.elapsed());

    let lender = Address::from_public_key(&lender_keys.public_key());
    let borrower = Address::from_public_key(&borrower_keys.public_key());
    let fund = Address::of_component("distressed-debt-fund");

    println!();
    address_display("Lender   ", &lender, BLUE);
    address_display("Borrower ", &borrower, GREEN);
    address_display("Fund     ", &fund, MAGENTA);
    println!();

    // Verify address roundtrip.
    let recovered = Address::parse(&lender.to_bech32()).unwrap();
    assert_eq!(lender, recovered);
    success("All addresses start with 'lien1' and pass Bech32 roundtrip verification");

    // -----------------------------------------------------------------------
    // Step 2: Market Bootstrap
    // -----------------------------------------------------------------------

    section(2, "Market Bootstrap");
    subsection("Initializing capability registry, asset ledger, and loan engine...");

    let t = Instant::now();
    let operator = Address::of_component("operator");
    let issuer = Address::of_component("issuer");
    let mut hub = Hub::new(operator);
    let mut ledger = AssetLedger::new();
    let mut engine = LoanEngine::new(&mut ledger);
    hub.set_tag(&operator, engine.address(), TAG_ACTIVE_LOAN, true)
        .unwrap();
    timing("bootstrap", t.elapsed());

    info("Engine address", &engine.address().to_bech32()[..24]);
    success("Loan engine deployed and granted the active-loan capability");

    subsection("Registering tokens and funding participants...");
    let credit_token = ledger.register_fungible("CRD", issuer).unwrap();
    let art = ledger.register_collection("ART", issuer).unwrap();
    ledger.mint(&issuer, &credit_token, &lender, 100_000).unwrap();
    ledger.mint(&issuer, &credit_token, &borrower, 1_000).unwrap();
    ledger.mint_nft(&issuer, &art, &borrower, 1).unwrap();

    println!();
    println!("  {BOLD}{WHITE}--- Initial Positions ---{RESET}");
    balance_row("Lender", 100_000, BLUE);
    balance_row("Borrower", 1_000, GREEN);
    println!("  {GREEN}{BOLD}{:<12}{RESET}  {WHITE}{:>12}{RESET} {DIM}ART #1{RESET}", "Borrower", 1);
    println!();
    success("Credit token CRD and NFT collection ART registered; parties funded");

    // -----------------------------------------------------------------------
    // Step 3: Off-Protocol Offer
    // -----------------------------------------------------------------------

    section(3, "Off-Protocol Offer Signing");
    subsection("The lender drafts and signs an offer; nothing touches the ledger yet...");

    let offer = Proposal {
        intent: ProposalIntent::Offer,
        proposer: lender,
        acceptor: None,
        collateral: Asset::nft(art, 1),
        collateral_state: None,
        credit: Asset::fungible(credit_token, 10_000),
        fixed_interest: 500,
        accruing_apr_bps: 1_200,
        duration_secs: 7 * 24 * 3_600,
        expiration: None,
        credit_limit_id: [0x11; 32],
        credit_limit: 0,
        nonce_space: 0,
        nonce: 1,
        module: None,
    };

    let t = Instant::now();
    let digest = offer.digest();
    let signature = KeyedSignature::over(&lender_keys, &digest);
    timing("digest + sign", t.elapsed());

    info("Terms", "10,000 CRD against ART #1, 7 days");
    info("Interest", "500 fixed + 12.00% APR accruing");
    info("Proposal digest", &hex::encode(digest)[..16]);
    info("Signature", &signature.signature.to_hex()[..32]);
    success("Offer signed; it can now travel by chat, listing, or carrier pigeon");

    // -----------------------------------------------------------------------
    // Step 4: Origination
    // -----------------------------------------------------------------------

    section(4, "Origination: The Borrower Accepts");
    subsection("Granting vault approvals and originating at the simulated clock's t0...");

    let vault = engine.address();
    ledger
        .approve(&Asset::nft(art, 1), &borrower, &vault)
        .unwrap();
    ledger
        .approve(&Asset::fungible(credit_token, 100_000), &lender, &vault)
        .unwrap();

    let t = Instant::now();
    let loan_id = engine
        .originate(&hub, &mut ledger, &offer, Some(&signature), &borrower, t0())
        .unwrap();
    timing("originate (verify + custody + commit)", t.elapsed());

    let loan = engine.loan(loan_id).unwrap();
    info("Loan id", &loan_id.to_string());
    info("Repayment owed", &format!("{} CRD", loan.repay_amount));
    info("Expires", &loan.expiration.to_rfc3339());
    info(
        "Claim holder",
        &engine.claim_holder(loan_id).unwrap().to_bech32()[..24],
    );

    separator();
    println!();
    println!("  {BOLD}{WHITE}--- Positions After Origination ---{RESET}");
    balance_row("Lender", credit_balance(&ledger, &credit_token, &lender), BLUE);
    balance_row("Borrower", credit_balance(&ledger, &credit_token, &borrower), GREEN);
    balance_row("Custody", credit_balance(&ledger, &credit_token, &vault), CYAN);
    println!(
        "  {CYAN}{BOLD}{:<12}{RESET}  {DIM}holds ART #1 in escrow{RESET}",
        "Custody"
    );
    println!();
    success("Collateral escrowed, credit delivered, claim token minted to the lender");

    // -----------------------------------------------------------------------
    // Step 5: Repayment
    // -----------------------------------------------------------------------

    section(5, "Repayment (Simulated Day 3)");
    subsection("The borrower repays principal + interest; collateral comes home...");

    ledger
        .approve(&Asset::fungible(credit_token, 11_000), &borrower, &vault)
        .unwrap();

    let day3 = t0() + Duration::days(3);
    let t = Instant::now();
    engine.repay(&mut ledger, loan_id, &borrower, day3).unwrap();
    timing("repay", t.elapsed());

    assert_eq!(engine.status_at(loan_id, day3).unwrap(), LoanStatus::Repaid);
    assert!(owns_art(&ledger, &art, &borrower));

    info("Repaid", "10,523 CRD (10,000 principal + 500 fixed + 23 accrued)");
    info("Collateral", "ART #1 returned to the borrower");
    success("Loan repaid three days into its seven-day window");

    // -----------------------------------------------------------------------
    // Step 6: Claim Settlement
    // -----------------------------------------------------------------------

    section(6, "Claim Settlement");
    subsection("The lender presents the claim and collects the repayment...");

    let t = Instant::now();
    engine.claim(&mut ledger, loan_id, &lender, day3).unwrap();
    timing("claim", t.elapsed());

    assert!(engine.loan(loan_id).is_none());
    info(
        "Lender balance",
        &format!("{} CRD", credit_balance(&ledger, &credit_token, &lender)),
    );
    success("Repayment collected; claim burned; loan record closed");

    // -----------------------------------------------------------------------
    // Step 7: Second Act — Default and Claim Trading
    // -----------------------------------------------------------------------

    section(7, "Second Act: Default and Claim Trading");
    subsection("Same parties, fresh nonce. This time the borrower will not repay...");

    let mut second = offer.clone();
    second.nonce = 2;
    let second_sig = KeyedSignature::over(&lender_keys, &second.digest());

    ledger
        .approve(&Asset::nft(art, 1), &borrower, &vault)
        .unwrap();
    let second_id = engine
        .originate(&hub, &mut ledger, &second, Some(&second_sig), &borrower, t0())
        .unwrap();
    info("Loan id", &second_id.to_string());

    subsection("Mid-loan, the lender sells the claim to a distressed-debt fund...");
    engine.transfer_claim(&lender, second_id, &fund).unwrap();
    assert_eq!(engine.claim_holder(second_id), Some(fund));
    success("Claim transferred; the loan record itself never moved");

    subsection("Simulated day 8: the repayment window has closed...");
    let day8 = t0() + Duration::days(8);
    assert_eq!(
        engine.status_at(second_id, day8).unwrap(),
        LoanStatus::Defaulted
    );
    assert!(engine.is_defaulted(&hub, second_id, day8).unwrap());
    info("Status", "defaulted (derived from the clock, not stored)");

    let t = Instant::now();
    engine.claim(&mut ledger, second_id, &fund, day8).unwrap();
    timing("default claim", t.elapsed());

    assert!(owns_art(&ledger, &art, &fund));
    success("The fund claimed ART #1; the borrower keeps the borrowed 10,000 CRD");

    // -----------------------------------------------------------------------
    // Final Summary
    // -----------------------------------------------------------------------

    let total_elapsed = demo_start.elapsed();

    println!();
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    DEMO COMPLETE -- Final Summary                                  {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!();

    println!("  {BOLD}{WHITE}Protocol Statistics:{RESET}");
    println!("  {DIM}----------------------------------------------{RESET}");
    info("Participants", "3 (Lender, Borrower, Fund)");
    info("Loans originated", "2");
    info("Outcomes", "1 repaid, 1 defaulted");
    info("Claims settled", "2 (one traded mid-loan)");
    info("Signing algorithm", "Ed25519 (ed25519-dalek 2.1)");
    info("Hash function", "BLAKE3 (domain-separated digests)");
    info("Address format", "Bech32 with 'lien' HRP");
    info("Replay protection", "per-role nonce registries, O(1) mass revocation");
    info("Custody model", "balance-verified vault (delta-checked transfers)");
    println!();

    // Final balance table.
    {
        let lender_final = credit_balance(&ledger, &credit_token, &lender);
        let borrower_final = credit_balance(&ledger, &credit_token, &borrower);
        let fund_final = credit_balance(&ledger, &credit_token, &fund);
        let custody_final = credit_balance(&ledger, &credit_token, &vault);

        println!("  {BOLD}{WHITE}Final Balances:{RESET}");
        println!("  {DIM}----------------------------------------------{RESET}");
        balance_row("Lender", lender_final, BLUE);
        balance_row("Borrower", borrower_final, GREEN);
        balance_row("Fund", fund_final, MAGENTA);
        balance_row("Custody", custody_final, CYAN);
        println!(
            "  {MAGENTA}{BOLD}{:<12}{RESET}  {DIM}holds ART #1 (claimed collateral){RESET}",
            "Fund"
        );

        let total_in_system = lender_final + borrower_final + fund_final + custody_final;
        println!();
        println!(
            "  {ITALIC}{DIM}Conservation check: {total_in_system} CRD in circulation, matching supply {}{RESET}",
            ledger.total_supply(&credit_token)
        );
        assert_eq!(total_in_system, ledger.total_supply(&credit_token));
    }

    println!();
    println!(
        "  {BOLD}{GREEN}Total demo time: {:.2}s{RESET}",
        total_elapsed.as_secs_f64()
    );
    println!();
}
