// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # LIEN Protocol — Core Library
//!
//! This is the beating heart of LIEN: peer-to-peer collateralized lending
//! with terms negotiated wherever people actually negotiate — chats,
//! marketplaces, spreadsheets — and settled here.
//!
//! A lender signs a proposal. A borrower shows up with it. The engine
//! validates the signature, the nonce, the credit line and the collateral's
//! state, locks the collateral in a balance-verified vault, routes the
//! principal, and hands the lender a transferable claim token. Repay in
//! time and the collateral comes back; don't, and the claim takes it.
//!
//! ## Architecture
//!
//! The protocol is split into modules that mirror the actual concerns of a
//! lending desk:
//!
//! - **crypto** — Ed25519 signatures and BLAKE3 hashing. Don't roll your own.
//! - **identity** — Addresses: hashed public keys in Bech32 clothing.
//! - **asset** — One `Asset` value for fungible tokens, NFTs and
//!   multi-tokens, plus the in-memory ledger they live on.
//! - **vault** — Custody that measures what it receives. Trust, but verify
//!   the delta.
//! - **nonce** — Replay protection with an O(1) panic button.
//! - **credit** — Utilized-credit tallies for reusable offers.
//! - **proposal** — The acceptance algorithm. The gate everything walks
//!   through.
//! - **loan** — Origination, repayment, default, claims.
//! - **hub** — One capability-tag registry instead of n ACLs.
//! - **config** — Protocol constants and domain strings.
//!
//! ## Design Philosophy
//!
//! 1. Correctness over performance (but we're still fast).
//! 2. Validate first, commit last — failed operations leave no trace.
//! 3. Every public API is documented. Internal shame is documented too.
//! 4. If it touches money, it has tests. Plural.

pub mod asset;
pub mod config;
pub mod credit;
pub mod crypto;
pub mod hub;
pub mod identity;
pub mod loan;
pub mod nonce;
pub mod proposal;
pub mod vault;
