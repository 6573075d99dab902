//! # REST API
//!
//! Builds the axum router that exposes the lending node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! Addresses travel as Bech32 strings, digests and signatures as hex.
//! Protocol refusals (bad nonce, underfunded borrower, expired window, ...)
//! map to 422 with the engine's own error message in the body; unknown
//! loans map to 404.
//!
//! ## Endpoints
//!
//! | Method | Path                        | Description                        |
//! |--------|-----------------------------|------------------------------------|
//! | GET    | `/health`                   | Liveness probe                     |
//! | GET    | `/status`                   | Desk status summary                |
//! | POST   | `/assets/fungible`          | Register a fungible token          |
//! | POST   | `/assets/collection`        | Register an NFT/multi collection   |
//! | POST   | `/assets/mint`              | Mint units or tokens (faucet)      |
//! | POST   | `/assets/approve`           | Approve a spender for an asset     |
//! | POST   | `/assets/balance`           | Balance of an asset position       |
//! | POST   | `/proposals/digest`         | Canonical digest of a proposal     |
//! | POST   | `/proposals/make`           | Put a proposal on record           |
//! | GET    | `/credit/:owner`            | Utilized amount of a credit line   |
//! | POST   | `/loans/originate`          | Accept a proposal, originate       |
//! | GET    | `/loans`                    | List loans                         |
//! | GET    | `/loans/:id`                | One loan with effective status     |
//! | POST   | `/loans/:id/repay`          | Repay a running loan               |
//! | POST   | `/loans/:id/claim`          | Settle a claim                     |
//! | POST   | `/loans/:id/transfer-claim` | Assign a claim to a new holder     |
//! | GET    | `/nonces/:owner`            | Nonce space and usability          |
//! | POST   | `/nonces/revoke`            | Burn a single nonce                |
//! | POST   | `/nonces/revoke-space`      | Burn every outstanding nonce       |

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use lien_protocol::asset::{Asset, AssetLedger};
use lien_protocol::config::{TAG_ACTIVE_LOAN, TAG_NONCE_MANAGER};
use lien_protocol::crypto::KeyedSignature;
use lien_protocol::hub::Hub;
use lien_protocol::identity::Address;
use lien_protocol::loan::{Loan, LoanEngine, LoanError, LoanStatus};
use lien_protocol::proposal::{Proposal, ProposalIntent, TokenStateComputer};

use crate::metrics::{NodeMetrics, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// The full lending desk hosted by this node: capability registry, asset
/// ledger, and loan engine, plus the operator who owns the registry.
///
/// Lives behind one lock because the engines borrow each other on every
/// mutation (origination moves ledger assets under hub authority).
pub struct Desk {
    /// Capability tag registry, owned by the operator.
    pub hub: Hub,
    /// Token balances, owners, and allowances.
    pub ledger: AssetLedger,
    /// Proposals, nonces, credit lines, loans, and claims.
    pub engine: LoanEngine,
    /// The node operator's address. Hub owner and devnet issuer.
    pub operator: Address,
}

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network identifier (e.g., "devnet", "testnet", "mainnet").
    pub network: String,
    /// The lending desk, shared between handlers and background tasks.
    pub desk: Arc<RwLock<Desk>>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured RPC port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/assets/fungible", post(register_fungible_handler))
        .route("/assets/collection", post(register_collection_handler))
        .route("/assets/mint", post(mint_handler))
        .route("/assets/approve", post(approve_handler))
        .route("/assets/balance", post(balance_handler))
        .route("/proposals/digest", post(digest_handler))
        .route("/proposals/make", post(make_handler))
        .route("/credit/:owner", get(credit_handler))
        .route("/loans/originate", post(originate_handler))
        .route("/loans", get(list_loans_handler))
        .route("/loans/:id", get(get_loan_handler))
        .route("/loans/:id/repay", post(repay_handler))
        .route("/loans/:id/claim", post(claim_handler))
        .route("/loans/:id/transfer-claim", post(transfer_claim_handler))
        .route("/nonces/:owner", get(nonce_handler))
        .route("/nonces/revoke", post(revoke_nonce_handler))
        .route("/nonces/revoke-space", post(revoke_space_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Request body for `POST /assets/fungible`.
#[derive(Debug, Deserialize)]
pub struct RegisterFungibleRequest {
    /// Token symbol, e.g. "CRD".
    pub symbol: String,
    /// Issuer address. Defaults to the node operator.
    #[serde(default)]
    pub issuer: Option<Address>,
    /// Transfer fee in basis points, burned on every transfer.
    #[serde(default)]
    pub fee_bps: u32,
}

/// Request body for `POST /assets/collection`.
#[derive(Debug, Deserialize)]
pub struct RegisterCollectionRequest {
    /// Collection symbol, e.g. "ART".
    pub symbol: String,
    /// Issuer address. Defaults to the node operator.
    #[serde(default)]
    pub issuer: Option<Address>,
    /// Register a multi-token (per-id balance) collection instead of a
    /// single-NFT one.
    #[serde(default)]
    pub multi: bool,
}

/// Request body for `POST /assets/mint`.
///
/// The field shape picks the mint flavor: `amount` alone mints fungible
/// units, `token_id` alone mints one NFT, both mint multi-token units.
#[derive(Debug, Deserialize)]
pub struct MintRequest {
    /// Token contract to mint under.
    pub token: Address,
    /// Recipient.
    pub to: Address,
    /// Minting caller. Must be the issuer; defaults to the node operator.
    #[serde(default)]
    pub caller: Option<Address>,
    /// Token id for NFT and multi-token mints.
    #[serde(default)]
    pub token_id: Option<u64>,
    /// Unit amount for fungible and multi-token mints.
    #[serde(default)]
    pub amount: Option<u64>,
}

/// Request body for `POST /assets/approve`.
#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    /// What to approve: the asset's `amount` becomes the allowance for
    /// fungible (and multi) positions; an NFT approval covers its id.
    pub asset: Asset,
    /// The asset owner granting the approval.
    pub owner: Address,
    /// The spender. Defaults to the loan engine's vault address, which
    /// is what proposals need before origination.
    #[serde(default)]
    pub spender: Option<Address>,
}

/// Request body for `POST /assets/balance`.
#[derive(Debug, Deserialize)]
pub struct BalanceRequest {
    /// The asset position to read. `token_id` selects the id for NFT
    /// and multi-token queries.
    pub asset: Asset,
    /// Whose balance.
    pub owner: Address,
}

/// Request body for `POST /proposals/digest`.
#[derive(Debug, Deserialize)]
pub struct DigestRequest {
    /// The proposal to digest.
    pub proposal: Proposal,
}

/// Request body for `POST /proposals/make`.
#[derive(Debug, Deserialize)]
pub struct MakeRequest {
    /// The proposal to put on record.
    pub proposal: Proposal,
    /// The caller. Must be the proposer.
    pub caller: Address,
}

/// Request body for `POST /loans/originate`.
#[derive(Debug, Deserialize)]
pub struct OriginateRequest {
    /// The proposal being accepted.
    pub proposal: Proposal,
    /// The proposer's signature over the proposal digest. May be omitted
    /// when the proposal was put on record via `/proposals/make`.
    #[serde(default)]
    pub signature: Option<KeyedSignature>,
    /// Who accepts the proposal and takes the other side.
    pub acceptor: Address,
}

/// Request body for `POST /loans/:id/repay`.
#[derive(Debug, Deserialize)]
pub struct RepayRequest {
    /// Who pays. Usually the borrower, but anyone may repay.
    pub payer: Address,
}

/// Request body for `POST /loans/:id/claim`.
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    /// The claim holder settling the loan.
    pub caller: Address,
}

/// Request body for `POST /loans/:id/transfer-claim`.
#[derive(Debug, Deserialize)]
pub struct TransferClaimRequest {
    /// The current claim holder.
    pub caller: Address,
    /// The new holder.
    pub to: Address,
}

/// Request body for `POST /nonces/revoke`.
#[derive(Debug, Deserialize)]
pub struct RevokeNonceRequest {
    /// Which registry: offer nonces or request nonces.
    pub intent: ProposalIntent,
    /// Who asks. Self-revocation needs no capability; revoking on behalf
    /// of someone else requires the nonce-manager tag.
    pub caller: Address,
    /// Whose nonce. Defaults to the caller.
    #[serde(default)]
    pub owner: Option<Address>,
    /// Space coordinate. Defaults to the owner's current space.
    #[serde(default)]
    pub space: Option<u64>,
    /// The nonce to burn.
    pub nonce: u64,
}

/// Request body for `POST /nonces/revoke-space`.
#[derive(Debug, Deserialize)]
pub struct RevokeSpaceRequest {
    /// Which registry: offer nonces or request nonces.
    pub intent: ProposalIntent,
    /// Whose space to roll forward.
    pub owner: Address,
}

/// Query string for `GET /nonces/:owner`.
#[derive(Debug, Deserialize)]
pub struct NonceQuery {
    /// Which registry: offer nonces or request nonces.
    pub intent: ProposalIntent,
    /// Space coordinate to probe. Defaults to the current space.
    #[serde(default)]
    pub space: Option<u64>,
    /// Nonce to probe. When present the response carries `usable`.
    #[serde(default)]
    pub nonce: Option<u64>,
}

/// Query string for `GET /credit/:owner`.
#[derive(Debug, Deserialize)]
pub struct CreditQuery {
    /// Hex-encoded 32-byte credit line id.
    pub line: String,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Network identifier.
    pub network: String,
    /// The node operator's address.
    pub operator: Address,
    /// The loan engine's vault address.
    pub vault: Address,
    /// Loans with a live record, any effective status.
    pub total_loans: u64,
    /// Loans still running at the time of the response.
    pub running_loans: u64,
    /// Running loans whose clock has run out, claim not yet settled.
    pub defaulted_loans: u64,
    /// Repaid loans whose claim has not been settled yet.
    pub repaid_awaiting_claim: u64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// One loan as reported by the loan endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanView {
    /// The loan record.
    pub loan: Loan,
    /// Effective status at response time: "running", "repaid", or
    /// "defaulted".
    pub status: String,
    /// Current holder of the loan's claim.
    pub claim_holder: Option<Address>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Protocol refusal: the request parsed fine, the engine said no.
fn refused(err: impl std::fmt::Display) -> Response {
    json_error(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
}

/// Maps engine errors to HTTP: unknown loans are 404, everything else
/// is a refusal.
fn loan_error_response(err: LoanError) -> Response {
    match err {
        LoanError::LoanNotFound(id) => {
            json_error(StatusCode::NOT_FOUND, format!("loan {} not found", id))
        }
        other => refused(other),
    }
}

fn parse_address(s: &str) -> Result<Address, Response> {
    Address::parse(s).map_err(|e| json_error(StatusCode::BAD_REQUEST, e.to_string()))
}

fn parse_hex32(s: &str) -> Result<[u8; 32], Response> {
    let bytes = hex::decode(s)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, format!("invalid hex: {}", e)))?;
    bytes.as_slice().try_into().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            format!("expected 32 bytes, got {}", bytes.len()),
        )
    })
}

/// Re-derives the loan gauges from the engine's live records. Called after
/// every mutation and by the background sampler.
pub fn refresh_gauges(engine: &LoanEngine, metrics: &NodeMetrics) {
    let mut live = 0i64;
    let mut owed = 0i64;
    for loan in engine.loans() {
        if loan.status == LoanStatus::Running {
            live += 1;
            owed = owed.saturating_add(i64::try_from(loan.repay_amount).unwrap_or(i64::MAX));
        }
    }
    metrics.running_loans.set(live);
    metrics.escrowed_value_units.set(owed);
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
///
/// This is the liveness probe for orchestrators (k8s, systemd, etc.).
/// It intentionally does not inspect the desk — that belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns a desk summary with loan counts by effective
/// status at the time of the request.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let desk = state.desk.read();

    let mut total = 0u64;
    let mut running = 0u64;
    let mut defaulted = 0u64;
    let mut awaiting = 0u64;
    for loan in desk.engine.loans() {
        total += 1;
        match loan.status_at(now) {
            LoanStatus::Running => running += 1,
            LoanStatus::Defaulted => defaulted += 1,
            LoanStatus::Repaid => awaiting += 1,
        }
    }

    let resp = StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        operator: desk.operator,
        vault: desk.engine.address(),
        total_loans: total,
        running_loans: running,
        defaulted_loans: defaulted,
        repaid_awaiting_claim: awaiting,
        timestamp: now.to_rfc3339(),
    };
    Json(resp)
}

/// `POST /assets/fungible` — registers a fungible token, optionally with
/// a transfer fee.
async fn register_fungible_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterFungibleRequest>,
) -> Response {
    let mut desk = state.desk.write();
    let issuer = req.issuer.unwrap_or(desk.operator);
    let result = if req.fee_bps > 0 {
        desk.ledger
            .register_fungible_with_fee(&req.symbol, issuer, req.fee_bps)
    } else {
        desk.ledger.register_fungible(&req.symbol, issuer)
    };
    match result {
        Ok(token) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "token": token, "symbol": req.symbol })),
        )
            .into_response(),
        Err(e) => refused(e),
    }
}

/// `POST /assets/collection` — registers an NFT collection, or a
/// multi-token one when `multi` is set.
async fn register_collection_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterCollectionRequest>,
) -> Response {
    let mut desk = state.desk.write();
    let issuer = req.issuer.unwrap_or(desk.operator);
    let result = if req.multi {
        desk.ledger.register_multi_collection(&req.symbol, issuer)
    } else {
        desk.ledger.register_collection(&req.symbol, issuer)
    };
    match result {
        Ok(collection) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "collection": collection, "symbol": req.symbol })),
        )
            .into_response(),
        Err(e) => refused(e),
    }
}

/// `POST /assets/mint` — the devnet faucet. Mints fungible units, one
/// NFT, or multi-token units depending on which fields are present.
async fn mint_handler(State(state): State<AppState>, Json(req): Json<MintRequest>) -> Response {
    let mut desk = state.desk.write();
    let caller = req.caller.unwrap_or(desk.operator);

    let minted = match (req.token_id, req.amount) {
        (None, Some(amount)) => {
            if let Err(e) = desk.ledger.mint(&caller, &req.token, &req.to, amount) {
                return refused(e);
            }
            Asset::fungible(req.token, amount)
        }
        (Some(token_id), None) => {
            if let Err(e) = desk.ledger.mint_nft(&caller, &req.token, &req.to, token_id) {
                return refused(e);
            }
            Asset::nft(req.token, token_id)
        }
        (Some(token_id), Some(amount)) => {
            if let Err(e) = desk
                .ledger
                .mint_multi(&caller, &req.token, &req.to, token_id, amount)
            {
                return refused(e);
            }
            Asset::multi(req.token, token_id, amount)
        }
        (None, None) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "mint needs an amount (fungible), a token_id (nft), or both (multi-token)",
            )
        }
    };

    match desk.ledger.balance_of(&minted, &req.to) {
        Ok(balance) => Json(serde_json::json!({ "balance": balance })).into_response(),
        Err(e) => refused(e),
    }
}

/// `POST /assets/approve` — approves a spender for an asset position.
/// The spender defaults to the loan engine's vault address.
async fn approve_handler(
    State(state): State<AppState>,
    Json(req): Json<ApproveRequest>,
) -> Response {
    let mut desk = state.desk.write();
    let spender = req.spender.unwrap_or_else(|| desk.engine.address());
    match desk.ledger.approve(&req.asset, &req.owner, &spender) {
        Ok(()) => Json(serde_json::json!({ "approved": true, "spender": spender })).into_response(),
        Err(e) => refused(e),
    }
}

/// `POST /assets/balance` — reads the balance of an asset position.
async fn balance_handler(
    State(state): State<AppState>,
    Json(req): Json<BalanceRequest>,
) -> Response {
    let desk = state.desk.read();
    match desk.ledger.balance_of(&req.asset, &req.owner) {
        Ok(balance) => Json(serde_json::json!({ "balance": balance })).into_response(),
        Err(e) => refused(e),
    }
}

/// `POST /proposals/digest` — returns the canonical digest a proposer
/// signs. Pure; touches no state.
async fn digest_handler(Json(req): Json<DigestRequest>) -> impl IntoResponse {
    Json(serde_json::json!({ "digest": hex::encode(req.proposal.digest()) }))
}

/// `POST /proposals/make` — puts a proposal on record so it can be
/// accepted without a detached signature.
async fn make_handler(State(state): State<AppState>, Json(req): Json<MakeRequest>) -> Response {
    let mut desk = state.desk.write();
    match desk.engine.proposals_mut().make(&req.proposal, &req.caller) {
        Ok(digest) => {
            state.metrics.proposals_made_total.inc();
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "digest": hex::encode(digest) })),
            )
                .into_response()
        }
        Err(e) => refused(e),
    }
}

/// `GET /credit/:owner?line=<hex32>` — units already drawn against a
/// credit line.
async fn credit_handler(
    Path(owner): Path<String>,
    Query(q): Query<CreditQuery>,
    State(state): State<AppState>,
) -> Response {
    let owner = match parse_address(&owner) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let line = match parse_hex32(&q.line) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    let desk = state.desk.read();
    let utilized = desk.engine.proposals().utilized(&owner, &line);
    Json(serde_json::json!({
        "owner": owner,
        "line": q.line,
        "utilized": utilized,
    }))
    .into_response()
}

/// `POST /loans/originate` — accepts a proposal and originates the loan:
/// verifies authorization, escrows collateral, moves credit, and mints
/// the claim to the lender.
async fn originate_handler(
    State(state): State<AppState>,
    Json(req): Json<OriginateRequest>,
) -> Response {
    let now = Utc::now();
    let timer = state.metrics.origination_seconds.start_timer();
    let mut guard = state.desk.write();
    let desk = &mut *guard;

    match desk.engine.originate(
        &desk.hub,
        &mut desk.ledger,
        &req.proposal,
        req.signature.as_ref(),
        &req.acceptor,
        now,
    ) {
        Ok(id) => {
            timer.observe_duration();
            state.metrics.loans_originated_total.inc();
            refresh_gauges(&desk.engine, &state.metrics);
            let loan = desk.engine.loan(id).cloned();
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "id": id, "loan": loan })),
            )
                .into_response()
        }
        Err(e) => {
            timer.stop_and_discard();
            loan_error_response(e)
        }
    }
}

/// `GET /loans` — lists every loan with a live record, ordered by id.
async fn list_loans_handler(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let desk = state.desk.read();
    let mut views: Vec<LoanView> = desk
        .engine
        .loans()
        .map(|loan| LoanView {
            status: loan.status_at(now).to_string(),
            claim_holder: desk.engine.claim_holder(loan.id),
            loan: loan.clone(),
        })
        .collect();
    views.sort_by_key(|v| v.loan.id);
    Json(views)
}

/// `GET /loans/:id` — one loan with its effective status and claim
/// holder. 404 once the claim has settled and the record is gone.
async fn get_loan_handler(Path(id): Path<u64>, State(state): State<AppState>) -> Response {
    let now = Utc::now();
    let desk = state.desk.read();
    match desk.engine.loan(id) {
        Some(loan) => {
            let view = LoanView {
                status: loan.status_at(now).to_string(),
                claim_holder: desk.engine.claim_holder(id),
                loan: loan.clone(),
            };
            Json(view).into_response()
        }
        None => json_error(StatusCode::NOT_FOUND, format!("loan {} not found", id)),
    }
}

/// `POST /loans/:id/repay` — settles a running loan: pulls the repayment
/// from the payer and returns the collateral to the borrower.
async fn repay_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<RepayRequest>,
) -> Response {
    let now = Utc::now();
    let mut guard = state.desk.write();
    let desk = &mut *guard;
    match desk.engine.repay(&mut desk.ledger, id, &req.payer, now) {
        Ok(()) => {
            state.metrics.loans_repaid_total.inc();
            refresh_gauges(&desk.engine, &state.metrics);
            Json(serde_json::json!({ "id": id, "status": "repaid" })).into_response()
        }
        Err(e) => loan_error_response(e),
    }
}

/// `POST /loans/:id/claim` — settles the claim: pays the repayment after
/// a repay, or the collateral after a default.
async fn claim_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<ClaimRequest>,
) -> Response {
    let now = Utc::now();
    let mut guard = state.desk.write();
    let desk = &mut *guard;

    // What the claim pays, read before settlement deletes the record.
    let payout = match desk.engine.status_at(id, now) {
        Ok(LoanStatus::Defaulted) => "collateral",
        Ok(_) => "repayment",
        Err(e) => return loan_error_response(e),
    };

    match desk.engine.claim(&mut desk.ledger, id, &req.caller, now) {
        Ok(()) => {
            state.metrics.loans_claimed_total.inc();
            if payout == "collateral" {
                state.metrics.defaulted_claims_total.inc();
            }
            refresh_gauges(&desk.engine, &state.metrics);
            Json(serde_json::json!({ "id": id, "payout": payout })).into_response()
        }
        Err(e) => loan_error_response(e),
    }
}

/// `POST /loans/:id/transfer-claim` — assigns the loan's claim to a new
/// holder. Future payouts follow the claim.
async fn transfer_claim_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<TransferClaimRequest>,
) -> Response {
    let mut guard = state.desk.write();
    match guard.engine.transfer_claim(&req.caller, id, &req.to) {
        Ok(()) => Json(serde_json::json!({ "id": id, "holder": req.to })).into_response(),
        Err(e) => loan_error_response(e),
    }
}

/// `GET /nonces/:owner?intent=offer[&space=..][&nonce=..]` — reports the
/// owner's current nonce space, and whether a probed nonce is usable.
async fn nonce_handler(
    Path(owner): Path<String>,
    Query(q): Query<NonceQuery>,
    State(state): State<AppState>,
) -> Response {
    let owner = match parse_address(&owner) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let desk = state.desk.read();
    let proposals = desk.engine.proposals();
    let current_space = proposals.current_nonce_space(q.intent, &owner);
    let usable = q.nonce.map(|nonce| {
        let space = q.space.unwrap_or(current_space);
        proposals.nonce_usable(q.intent, &owner, space, nonce)
    });
    Json(serde_json::json!({
        "owner": owner,
        "intent": q.intent,
        "current_space": current_space,
        "usable": usable,
    }))
    .into_response()
}

/// `POST /nonces/revoke` — burns a single nonce. Self-revocation is
/// always allowed; revoking someone else's nonce requires the caller to
/// hold the nonce-manager tag.
async fn revoke_nonce_handler(
    State(state): State<AppState>,
    Json(req): Json<RevokeNonceRequest>,
) -> Response {
    let mut guard = state.desk.write();
    let desk = &mut *guard;
    let owner = req.owner.unwrap_or(req.caller);

    let result = if owner == req.caller {
        match req.space {
            Some(space) => desk
                .engine
                .proposals_mut()
                .revoke_nonce_in_space(req.intent, &owner, space, req.nonce),
            None => desk
                .engine
                .proposals_mut()
                .revoke_nonce(req.intent, &owner, req.nonce),
        }
    } else {
        let space = req.space.unwrap_or_else(|| {
            desk.engine
                .proposals()
                .current_nonce_space(req.intent, &owner)
        });
        desk.engine.proposals_mut().revoke_nonce_on_behalf(
            &desk.hub,
            req.intent,
            &req.caller,
            &owner,
            space,
            req.nonce,
        )
    };

    match result {
        Ok(()) => {
            state.metrics.nonce_revocations_total.inc();
            Json(serde_json::json!({ "revoked": true })).into_response()
        }
        Err(e) => refused(e),
    }
}

/// `POST /nonces/revoke-space` — rolls the owner's nonce space forward,
/// invalidating every outstanding proposal nonce in one move.
async fn revoke_space_handler(
    State(state): State<AppState>,
    Json(req): Json<RevokeSpaceRequest>,
) -> Response {
    let mut guard = state.desk.write();
    let space = guard
        .engine
        .proposals_mut()
        .revoke_nonce_space(req.intent, &req.owner);
    state.metrics.nonce_revocations_total.inc();
    Json(serde_json::json!({ "space": space })).into_response()
}

// ---------------------------------------------------------------------------
// Desk Bootstrap
// ---------------------------------------------------------------------------

/// Builds a fresh desk for the given operator: hub, ledger, and engine
/// wired together, the vault tagged for escrow, the operator tagged as
/// nonce manager, and a few devnet assets minted.
pub fn bootstrap(operator: Address) -> anyhow::Result<Desk> {
    let mut ledger = AssetLedger::new();
    let mut engine = LoanEngine::new(&mut ledger);
    let mut hub = Hub::new(operator);

    // The vault needs the active-loan tag before it can hold escrow, and
    // the operator services third-party revocation requests.
    hub.set_tag(&operator, engine.address(), TAG_ACTIVE_LOAN, true)?;
    hub.set_tag(&operator, operator, TAG_NONCE_MANAGER, true)?;

    // Devnet conveniences: a credit token, an art collection with a few
    // pieces, and pinned-state support for the collection.
    let credit = ledger.register_fungible("CRD", operator)?;
    let art = ledger.register_collection("ART", operator)?;
    ledger.mint(&operator, &credit, &operator, 1_000_000)?;
    for token_id in 1..=3 {
        ledger.mint_nft(&operator, &art, &operator, token_id)?;
    }
    engine
        .proposals_mut()
        .register_fingerprint_computer(art, Box::new(TokenStateComputer));

    tracing::info!(
        operator = %operator.to_bech32(),
        vault = %engine.address().to_bech32(),
        credit_token = %credit.to_bech32(),
        collection = %art.to_bech32(),
        "desk bootstrapped"
    );

    Ok(Desk {
        hub,
        ledger,
        engine,
        operator,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use lien_protocol::crypto::LienKeypair;
    use std::sync::Arc;
    use tower::ServiceExt;

    const DAY_SECS: u64 = 86_400;

    /// Creates a test AppState with a freshly bootstrapped desk.
    fn test_app_state() -> AppState {
        let operator = Address::of_component("operator");
        let desk = bootstrap(operator).expect("bootstrap");
        AppState {
            version: "0.1.0-test".into(),
            network: "devnet".into(),
            desk: Arc::new(RwLock::new(desk)),
            metrics: Arc::new(NodeMetrics::new()),
        }
    }

    fn lender_keys() -> LienKeypair {
        LienKeypair::from_seed(&[0x4C; 32])
    }

    /// Standard devnet offer: 10k credit against NFT #9 for a week,
    /// 500 flat interest plus 12% APR.
    fn demo_offer(credit_token: Address, collection: Address) -> Proposal {
        Proposal {
            intent: ProposalIntent::Offer,
            proposer: Address::from_public_key(&lender_keys().public_key()),
            acceptor: None,
            collateral: Asset::nft(collection, 9),
            collateral_state: None,
            credit: Asset::fungible(credit_token, 10_000),
            fixed_interest: 500,
            accruing_apr_bps: 1_200,
            duration_secs: 7 * DAY_SECS,
            expiration: None,
            credit_limit_id: [0x11; 32],
            credit_limit: 0,
            nonce_space: 0,
            nonce: 1,
            module: None,
        }
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a POST request with JSON body and returns (status, body_bytes).
    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    fn json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    /// Registers a token and a collection over HTTP, mints the lender's
    /// credit and the borrower's NFT #9, and approves the vault for both
    /// sides. Returns (credit_token, collection, lender, borrower).
    async fn fund_market(router: &Router) -> (Address, Address, Address, Address) {
        let lender = Address::from_public_key(&lender_keys().public_key());
        let borrower = Address::of_component("borrower");

        let (status, body) = post_json(
            router,
            "/assets/fungible",
            serde_json::json!({ "symbol": "USD" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let credit_token = Address::parse(json(&body)["token"].as_str().unwrap()).unwrap();

        let (status, body) = post_json(
            router,
            "/assets/collection",
            serde_json::json!({ "symbol": "PIX" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let collection = Address::parse(json(&body)["collection"].as_str().unwrap()).unwrap();

        let (status, _) = post_json(
            router,
            "/assets/mint",
            serde_json::json!({ "token": credit_token, "to": lender, "amount": 50_000 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(
            router,
            "/assets/mint",
            serde_json::json!({ "token": collection, "to": borrower, "token_id": 9 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Spender omitted: defaults to the vault.
        let (status, _) = post_json(
            router,
            "/assets/approve",
            serde_json::json!({ "asset": Asset::fungible(credit_token, 50_000), "owner": lender }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(
            router,
            "/assets/approve",
            serde_json::json!({ "asset": Asset::nft(collection, 9), "owner": borrower }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        (credit_token, collection, lender, borrower)
    }

    // -- 1. Health endpoint --------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let state = test_app_state();
        let router = create_router(state);
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["status"], "ok");
    }

    // -- 2. Status reports the genesis desk ----------------------------------

    #[tokio::test]
    async fn status_reports_the_genesis_desk() {
        let state = test_app_state();
        let operator = Address::of_component("operator");
        let router = create_router(state);
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.version, "0.1.0-test");
        assert_eq!(resp.network, "devnet");
        assert_eq!(resp.operator, operator);
        assert_eq!(resp.total_loans, 0);
        assert_eq!(resp.running_loans, 0);
    }

    // -- 3. Faucet: register, mint, read back --------------------------------

    #[tokio::test]
    async fn faucet_registers_mints_and_reports_balance() {
        let state = test_app_state();
        let router = create_router(state);
        let alice = Address::of_component("alice");

        let (status, body) = post_json(
            &router,
            "/assets/fungible",
            serde_json::json!({ "symbol": "USD" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let token = Address::parse(json(&body)["token"].as_str().unwrap()).unwrap();

        let (status, body) = post_json(
            &router,
            "/assets/mint",
            serde_json::json!({ "token": token, "to": alice, "amount": 5_000 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["balance"], 5_000);

        let (status, body) = post_json(
            &router,
            "/assets/balance",
            serde_json::json!({ "asset": Asset::fungible(token, 0), "owner": alice }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["balance"], 5_000);
    }

    // -- 4. Mint without a shape is a 400 ------------------------------------

    #[tokio::test]
    async fn shapeless_mint_is_a_bad_request() {
        let state = test_app_state();
        let router = create_router(state);
        let alice = Address::of_component("alice");

        let (status, body) = post_json(
            &router,
            "/assets/fungible",
            serde_json::json!({ "symbol": "USD" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let token = Address::parse(json(&body)["token"].as_str().unwrap()).unwrap();

        let (status, body) = post_json(
            &router,
            "/assets/mint",
            serde_json::json!({ "token": token, "to": alice }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("amount"));
    }

    // -- 5. Full lifecycle over HTTP: make, originate, repay, claim -----------

    #[tokio::test]
    async fn full_loan_lifecycle_over_http() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let (credit_token, collection, lender, borrower) = fund_market(&router).await;
        let proposal = demo_offer(credit_token, collection);

        // The lender puts the offer on record instead of shipping a
        // detached signature.
        let (status, body) = post_json(
            &router,
            "/proposals/make",
            serde_json::json!({ "proposal": proposal, "caller": lender }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            json(&body)["digest"].as_str().unwrap(),
            hex::encode(proposal.digest())
        );

        // The borrower accepts. No signature needed for a made proposal.
        let (status, body) = post_json(
            &router,
            "/loans/originate",
            serde_json::json!({ "proposal": proposal, "acceptor": borrower }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = json(&body)["id"].as_u64().unwrap();

        // Principal arrived, status is running, repayment is fixed at
        // origination: 10_000 + 500 flat + 23 accrued over the week.
        let (status, body) = get(&router, &format!("/loans/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        let view: LoanView = serde_json::from_slice(&body).unwrap();
        assert_eq!(view.status, "running");
        assert_eq!(view.loan.repay_amount, 10_523);
        assert_eq!(view.claim_holder, Some(lender));

        let (_, body) = post_json(
            &router,
            "/assets/balance",
            serde_json::json!({ "asset": Asset::fungible(credit_token, 0), "owner": borrower }),
        )
        .await;
        assert_eq!(json(&body)["balance"], 10_000);

        // Top the borrower up and repay.
        let (status, _) = post_json(
            &router,
            "/assets/mint",
            serde_json::json!({ "token": credit_token, "to": borrower, "amount": 1_000 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = post_json(
            &router,
            "/assets/approve",
            serde_json::json!({ "asset": Asset::fungible(credit_token, 11_000), "owner": borrower }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = post_json(
            &router,
            &format!("/loans/{}/repay", id),
            serde_json::json!({ "payer": borrower }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["status"], "repaid");

        // Collateral is already home; the lender settles the claim.
        let (status, body) = post_json(
            &router,
            &format!("/loans/{}/claim", id),
            serde_json::json!({ "caller": lender }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["payout"], "repayment");

        let (_, body) = post_json(
            &router,
            "/assets/balance",
            serde_json::json!({ "asset": Asset::fungible(credit_token, 0), "owner": lender }),
        )
        .await;
        assert_eq!(json(&body)["balance"], 50_523);

        let (_, body) = post_json(
            &router,
            "/assets/balance",
            serde_json::json!({ "asset": Asset::nft(collection, 9), "owner": borrower }),
        )
        .await;
        assert_eq!(json(&body)["balance"], 1);

        // Record is gone after settlement.
        let (status, _) = get(&router, &format!("/loans/{}", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // The counters saw the whole story.
        assert_eq!(state.metrics.proposals_made_total.get(), 1);
        assert_eq!(state.metrics.loans_originated_total.get(), 1);
        assert_eq!(state.metrics.loans_repaid_total.get(), 1);
        assert_eq!(state.metrics.loans_claimed_total.get(), 1);
        assert_eq!(state.metrics.defaulted_claims_total.get(), 0);
        assert_eq!(state.metrics.running_loans.get(), 0);
    }

    // -- 6. Signed origination over HTTP --------------------------------------

    #[tokio::test]
    async fn signed_origination_over_http() {
        let state = test_app_state();
        let router = create_router(state);
        let (credit_token, collection, _, borrower) = fund_market(&router).await;
        let proposal = demo_offer(credit_token, collection);
        let signature = KeyedSignature::over(&lender_keys(), &proposal.digest());

        let (status, body) = post_json(
            &router,
            "/loans/originate",
            serde_json::json!({
                "proposal": proposal,
                "signature": signature,
                "acceptor": borrower,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json(&body)["loan"]["status"], "running");
    }

    // -- 7. Unsigned, unmade proposals are refused ----------------------------

    #[tokio::test]
    async fn unsigned_unmade_proposal_is_refused() {
        let state = test_app_state();
        let router = create_router(state);
        let (credit_token, collection, _, borrower) = fund_market(&router).await;
        let proposal = demo_offer(credit_token, collection);

        let (status, body) = post_json(
            &router,
            "/loans/originate",
            serde_json::json!({ "proposal": proposal, "acceptor": borrower }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("signature"));
    }

    // -- 8. Unknown loans map to 404 ------------------------------------------

    #[tokio::test]
    async fn unknown_loans_map_to_404() {
        let state = test_app_state();
        let router = create_router(state);
        let payer = Address::of_component("payer");

        let (status, _) = get(&router, "/loans/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = post_json(
            &router,
            "/loans/99/repay",
            serde_json::json!({ "payer": payer }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("not found"));
    }

    // -- 9. Nonce queries and self-revocation ---------------------------------

    #[tokio::test]
    async fn nonce_queries_and_self_revocation() {
        let state = test_app_state();
        let router = create_router(state);
        let lender = Address::from_public_key(&lender_keys().public_key());
        let base = format!("/nonces/{}", lender.to_bech32());

        let (status, body) = get(&router, &format!("{}?intent=offer", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["current_space"], 0);

        let (status, _) = post_json(
            &router,
            "/nonces/revoke",
            serde_json::json!({ "intent": "offer", "caller": lender, "nonce": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get(&router, &format!("{}?intent=offer&nonce=5", base)).await;
        assert_eq!(json(&body)["usable"], false);
        let (_, body) = get(&router, &format!("{}?intent=offer&nonce=6", base)).await;
        assert_eq!(json(&body)["usable"], true);

        // Rolling the space forward invalidates everything at once.
        let (status, body) = post_json(
            &router,
            "/nonces/revoke-space",
            serde_json::json!({ "intent": "offer", "owner": lender }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["space"], 1);

        let (_, body) = get(&router, &format!("{}?intent=offer", base)).await;
        assert_eq!(json(&body)["current_space"], 1);
    }

    // -- 10. Third-party revocation needs the manager tag ----------------------

    #[tokio::test]
    async fn third_party_revocation_needs_the_manager_tag() {
        let state = test_app_state();
        let operator = Address::of_component("operator");
        let router = create_router(state);
        let lender = Address::from_public_key(&lender_keys().public_key());
        let stranger = Address::of_component("stranger");

        let (status, _) = post_json(
            &router,
            "/nonces/revoke",
            serde_json::json!({
                "intent": "offer",
                "caller": stranger,
                "owner": lender,
                "nonce": 3,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        // The operator was tagged nonce-manager at bootstrap.
        let (status, _) = post_json(
            &router,
            "/nonces/revoke",
            serde_json::json!({
                "intent": "offer",
                "caller": operator,
                "owner": lender,
                "nonce": 3,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let base = format!("/nonces/{}", lender.to_bech32());
        let (_, body) = get(&router, &format!("{}?intent=offer&nonce=3", base)).await;
        assert_eq!(json(&body)["usable"], false);
    }

    // -- 11. Claim transfer reroutes the payout --------------------------------

    #[tokio::test]
    async fn claim_transfer_reroutes_the_payout() {
        let state = test_app_state();
        let router = create_router(state);
        let (credit_token, collection, lender, borrower) = fund_market(&router).await;
        let fund = Address::of_component("fund");
        let proposal = demo_offer(credit_token, collection);
        let signature = KeyedSignature::over(&lender_keys(), &proposal.digest());

        let (status, body) = post_json(
            &router,
            "/loans/originate",
            serde_json::json!({
                "proposal": proposal,
                "signature": signature,
                "acceptor": borrower,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = json(&body)["id"].as_u64().unwrap();

        let (status, body) = post_json(
            &router,
            &format!("/loans/{}/transfer-claim", id),
            serde_json::json!({ "caller": lender, "to": fund }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["holder"], serde_json::json!(fund));

        let (_, body) = get(&router, &format!("/loans/{}", id)).await;
        let view: LoanView = serde_json::from_slice(&body).unwrap();
        assert_eq!(view.claim_holder, Some(fund));

        // The old holder can no longer settle.
        let (status, _) = post_json(
            &router,
            &format!("/loans/{}/repay", id),
            serde_json::json!({ "payer": borrower }),
        )
        .await;
        // Borrower still owes more than their 10k principal.
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = post_json(
            &router,
            "/assets/mint",
            serde_json::json!({ "token": credit_token, "to": borrower, "amount": 1_000 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = post_json(
            &router,
            "/assets/approve",
            serde_json::json!({ "asset": Asset::fungible(credit_token, 11_000), "owner": borrower }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = post_json(
            &router,
            &format!("/loans/{}/repay", id),
            serde_json::json!({ "payer": borrower }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(
            &router,
            &format!("/loans/{}/claim", id),
            serde_json::json!({ "caller": lender }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = post_json(
            &router,
            &format!("/loans/{}/claim", id),
            serde_json::json!({ "caller": fund }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["payout"], "repayment");

        let (_, body) = post_json(
            &router,
            "/assets/balance",
            serde_json::json!({ "asset": Asset::fungible(credit_token, 0), "owner": fund }),
        )
        .await;
        assert_eq!(json(&body)["balance"], 10_523);
    }

    // -- 12. Credit line endpoint tracks utilization ---------------------------

    #[tokio::test]
    async fn credit_endpoint_tracks_utilization() {
        let state = test_app_state();
        let router = create_router(state);
        let (credit_token, collection, lender, borrower) = fund_market(&router).await;

        // A reusable line capped at 30k.
        let mut proposal = demo_offer(credit_token, collection);
        proposal.credit_limit = 30_000;
        let signature = KeyedSignature::over(&lender_keys(), &proposal.digest());

        let line_hex = hex::encode(proposal.credit_limit_id);
        let base = format!("/credit/{}?line={}", lender.to_bech32(), line_hex);

        let (status, body) = get(&router, &base).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["utilized"], 0);

        let (status, _) = post_json(
            &router,
            "/loans/originate",
            serde_json::json!({
                "proposal": proposal,
                "signature": signature,
                "acceptor": borrower,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = get(&router, &base).await;
        assert_eq!(json(&body)["utilized"], 10_000);
    }
}
