//! # Asset Ledger
//!
//! The in-memory token book the protocol moves value on. It plays the role
//! the external token standards play for an on-chain deployment: balances,
//! owners, allowances, operator approvals — plus the awkward behaviors
//! real tokens exhibit and custody code must survive (transfer fees,
//! unsolicited safe-transfers).
//!
//! ## Architecture
//!
//! One `AssetLedger` holds every registered token contract:
//!
//! - **Fungible** tokens: per-holder balances, spender allowances, an
//!   optional transfer fee in basis points (the fee is burned — the
//!   simplest way to model a token whose recipient receives less than
//!   was sent).
//! - **NFT collections**: one owner per token id, per-token approvals,
//!   per-owner operator approvals, and mutable per-token state bytes
//!   (what collateral fingerprints pin).
//! - **Multi-token collections**: per-(id, holder) balances with operator
//!   approvals.
//!
//! Token contract addresses are content-derived at registration —
//! BLAKE3 over (category, symbol, issuer) in the token-address domain —
//! so the same registration always yields the same address and distinct
//! registrations can't collide.
//!
//! ## Atomicity
//!
//! Individual ledger operations are atomic: every precondition is checked
//! before the first write. Multi-transfer operations (originations move
//! two assets) get all-or-nothing semantics from [`AssetLedger::snapshot`] /
//! [`AssetLedger::restore`] — the books are plain maps, so a snapshot is
//! one clone and a restore is one assignment.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::{Asset, AssetCategory};
use crate::config::TOKEN_ADDRESS_DOMAIN;
use crate::crypto::hash::domain_separated_hash;
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong moving or minting assets.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No token contract is registered at this address.
    #[error("unknown token contract: {0}")]
    UnknownToken(Address),

    /// Registration would collide with an existing token contract.
    #[error("token already registered at {token}")]
    TokenExists {
        /// The derived contract address.
        token: Address,
    },

    /// The asset's declared category does not match the registered token.
    #[error("asset declared {declared} but token {token} is registered {registered}")]
    CategoryMismatch {
        /// The token contract.
        token: Address,
        /// What the registry says the token is.
        registered: AssetCategory,
        /// What the asset claimed it was.
        declared: AssetCategory,
    },

    /// Minting and state mutation are issuer-only.
    #[error("caller {caller} is not the issuer of token {token}")]
    NotIssuer {
        /// The token contract.
        token: Address,
        /// Who tried.
        caller: Address,
    },

    /// Not enough balance to cover the transfer.
    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance {
        /// Current balance of the debited party.
        available: u64,
        /// Amount the transfer needed.
        required: u64,
    },

    /// Not enough allowance for a delegated fungible transfer.
    #[error("insufficient allowance for {spender}: have {available}, need {required}")]
    InsufficientAllowance {
        /// The would-be spender.
        spender: Address,
        /// Remaining allowance.
        available: u64,
        /// Amount the transfer needed.
        required: u64,
    },

    /// The token id has never been minted in this collection.
    #[error("token #{token_id} of {token} does not exist")]
    UnknownTokenId {
        /// The collection.
        token: Address,
        /// The missing id.
        token_id: u64,
    },

    /// Single NFTs have exactly one mint per id.
    #[error("token #{token_id} of {token} already minted")]
    TokenIdExists {
        /// The collection.
        token: Address,
        /// The duplicate id.
        token_id: u64,
    },

    /// The debited party does not hold the token being moved.
    #[error("token #{token_id} of {token} is not held by {holder}")]
    NotTokenHolder {
        /// The collection.
        token: Address,
        /// The id in question.
        token_id: u64,
        /// Who the transfer claimed holds it.
        holder: Address,
    },

    /// The operator has neither a per-token approval nor an operator grant.
    #[error("operator {operator} is not approved to move holdings of {owner}")]
    NotApproved {
        /// The holdings' owner.
        owner: Address,
        /// The unapproved operator.
        operator: Address,
    },

    /// The receiver rejects transfers it did not initiate itself.
    ///
    /// This is the safe-transfer guard: custody components register a
    /// `SelfInitiatedOnly` policy so third parties can't strand NFTs on
    /// them with unsolicited pushes.
    #[error("receiver {receiver} only accepts transfers it initiated (operator was {operator})")]
    UnsupportedTransferFunction {
        /// The receiving address with the restrictive policy.
        receiver: Address,
        /// Who actually initiated the transfer.
        operator: Address,
    },

    /// Arithmetic overflow on balances or supply.
    #[error("supply overflow for token {token}")]
    SupplyOverflow {
        /// The token contract.
        token: Address,
    },

    /// Fee must fit in [0, 10_000] basis points.
    #[error("transfer fee {fee_bps} bps exceeds 10000")]
    InvalidFee {
        /// The rejected fee.
        fee_bps: u32,
    },
}

// ---------------------------------------------------------------------------
// Records & policies
// ---------------------------------------------------------------------------

/// Registration record of a token contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Which standard the contract implements.
    pub category: AssetCategory,

    /// Human-facing symbol, fixed at registration.
    pub symbol: String,

    /// The only address allowed to mint and to mutate token state.
    pub issuer: Address,

    /// Transfer fee in basis points. Zero for honest tokens; fungible
    /// contracts may charge up to 100%. The fee is burned on transfer.
    pub fee_bps: u32,

    /// Fungible: units in circulation. NFT collections: ids minted.
    pub total_supply: u64,
}

/// How an address treats inbound NFT safe-transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverPolicy {
    /// Accept anything. The default for addresses with no registered policy.
    AcceptAll,

    /// Accept only transfers the receiver itself initiated (operator ==
    /// receiver). Custody components use this.
    SelfInitiatedOnly,
}

/// The cloneable interior. Kept as one struct so a snapshot is a single
/// clone and a restore is a single assignment.
#[derive(Debug, Clone, Default)]
struct Books {
    tokens: HashMap<Address, TokenRecord>,
    /// Fungible balances: (token, holder) -> units.
    balances: HashMap<(Address, Address), u64>,
    /// Fungible allowances: (token, owner, spender) -> units.
    allowances: HashMap<(Address, Address, Address), u64>,
    /// Single-NFT ownership: (collection, id) -> holder.
    owners: HashMap<(Address, u64), Address>,
    /// Single-NFT per-token approvals: (collection, id) -> spender.
    token_approvals: HashMap<(Address, u64), Address>,
    /// Multi-token balances: (collection, id, holder) -> units.
    holdings: HashMap<(Address, u64, Address), u64>,
    /// Collection-wide operator grants: (collection, owner, operator).
    operators: HashSet<(Address, Address, Address)>,
    /// Mutable per-token state bytes: (collection, id) -> state.
    token_state: HashMap<(Address, u64), Vec<u8>>,
    /// Inbound-transfer policies by receiver address.
    receivers: HashMap<Address, ReceiverPolicy>,
}

/// An opaque point-in-time copy of the books. Produce with
/// [`AssetLedger::snapshot`], consume with [`AssetLedger::restore`].
#[derive(Debug)]
pub struct LedgerSnapshot {
    books: Books,
}

// ---------------------------------------------------------------------------
// AssetLedger
// ---------------------------------------------------------------------------

/// The token book. See the module docs for the full tour.
#[derive(Debug, Default)]
pub struct AssetLedger {
    books: Books,
}

impl AssetLedger {
    /// An empty ledger with no registered tokens.
    pub fn new() -> Self {
        Self::default()
    }

    // -- registration -------------------------------------------------------

    /// Register a fungible token with no transfer fee.
    pub fn register_fungible(
        &mut self,
        symbol: &str,
        issuer: Address,
    ) -> Result<Address, LedgerError> {
        self.register(AssetCategory::Fungible, symbol, issuer, 0)
    }

    /// Register a fungible token that burns `fee_bps` of every transfer.
    ///
    /// Exists so custody code can be tested against tokens where the
    /// recipient receives less than was sent.
    pub fn register_fungible_with_fee(
        &mut self,
        symbol: &str,
        issuer: Address,
        fee_bps: u32,
    ) -> Result<Address, LedgerError> {
        self.register(AssetCategory::Fungible, symbol, issuer, fee_bps)
    }

    /// Register a single-NFT collection.
    pub fn register_collection(
        &mut self,
        symbol: &str,
        issuer: Address,
    ) -> Result<Address, LedgerError> {
        self.register(AssetCategory::NftSingle, symbol, issuer, 0)
    }

    /// Register a multi-token collection.
    pub fn register_multi_collection(
        &mut self,
        symbol: &str,
        issuer: Address,
    ) -> Result<Address, LedgerError> {
        self.register(AssetCategory::NftMulti, symbol, issuer, 0)
    }

    fn register(
        &mut self,
        category: AssetCategory,
        symbol: &str,
        issuer: Address,
        fee_bps: u32,
    ) -> Result<Address, LedgerError> {
        if fee_bps > 10_000 {
            return Err(LedgerError::InvalidFee { fee_bps });
        }

        let address = derive_token_address(category, symbol, &issuer);
        if self.books.tokens.contains_key(&address) {
            return Err(LedgerError::TokenExists { token: address });
        }

        self.books.tokens.insert(
            address,
            TokenRecord {
                category,
                symbol: symbol.to_string(),
                issuer,
                fee_bps,
                total_supply: 0,
            },
        );
        Ok(address)
    }

    /// Registration record for a token contract, if any.
    pub fn token(&self, address: &Address) -> Option<&TokenRecord> {
        self.books.tokens.get(address)
    }

    /// Units in circulation (fungible) or ids minted (collections).
    pub fn total_supply(&self, address: &Address) -> u64 {
        self.books
            .tokens
            .get(address)
            .map(|t| t.total_supply)
            .unwrap_or(0)
    }

    // -- minting ------------------------------------------------------------

    /// Mint fungible units to `to`. Issuer-only.
    pub fn mint(
        &mut self,
        caller: &Address,
        token: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let record = self.expect_token(token, AssetCategory::Fungible)?;
        if record.issuer != *caller {
            return Err(LedgerError::NotIssuer {
                token: *token,
                caller: *caller,
            });
        }

        let supply = record.total_supply;
        let new_supply = supply
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow { token: *token })?;

        let balance = self.fungible_balance_raw(token, to);
        let new_balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow { token: *token })?;

        self.books
            .tokens
            .get_mut(token)
            .expect("checked above")
            .total_supply = new_supply;
        self.books.balances.insert((*token, *to), new_balance);
        Ok(())
    }

    /// Mint a single NFT to `to`. Issuer-only; each id mints once.
    pub fn mint_nft(
        &mut self,
        caller: &Address,
        collection: &Address,
        to: &Address,
        token_id: u64,
    ) -> Result<(), LedgerError> {
        let record = self.expect_token(collection, AssetCategory::NftSingle)?;
        if record.issuer != *caller {
            return Err(LedgerError::NotIssuer {
                token: *collection,
                caller: *caller,
            });
        }
        if self.books.owners.contains_key(&(*collection, token_id)) {
            return Err(LedgerError::TokenIdExists {
                token: *collection,
                token_id,
            });
        }

        self.books.owners.insert((*collection, token_id), *to);
        let record = self.books.tokens.get_mut(collection).expect("checked above");
        record.total_supply = record.total_supply.saturating_add(1);
        Ok(())
    }

    /// Mint multi-token units of `token_id` to `to`. Issuer-only.
    pub fn mint_multi(
        &mut self,
        caller: &Address,
        collection: &Address,
        to: &Address,
        token_id: u64,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let record = self.expect_token(collection, AssetCategory::NftMulti)?;
        if record.issuer != *caller {
            return Err(LedgerError::NotIssuer {
                token: *collection,
                caller: *caller,
            });
        }

        let held = self.multi_balance_raw(collection, token_id, to);
        let new_held = held
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow { token: *collection })?;

        self.books
            .holdings
            .insert((*collection, token_id, *to), new_held);
        let record = self.books.tokens.get_mut(collection).expect("checked above");
        record.total_supply = record
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow { token: *collection })?;
        Ok(())
    }

    // -- the four category-dispatched operations ----------------------------

    /// How much of `asset` does `who` hold?
    ///
    /// Fungible: the balance. Single NFT: 1 if `who` owns `token_id`, else
    /// 0. Multi-token: the per-id balance. The asset's `amount` field is
    /// ignored — this is a query about the id, not the quantity.
    pub fn balance_of(&self, asset: &Asset, who: &Address) -> Result<u64, LedgerError> {
        self.expect_token(&asset.address, asset.category)?;
        Ok(match asset.category {
            AssetCategory::Fungible => self.fungible_balance_raw(&asset.address, who),
            AssetCategory::NftSingle => {
                match self.books.owners.get(&(asset.address, asset.token_id)) {
                    Some(owner) if owner == who => 1,
                    _ => 0,
                }
            }
            AssetCategory::NftMulti => {
                self.multi_balance_raw(&asset.address, asset.token_id, who)
            }
        })
    }

    /// Move `asset` from `from` to `to`, initiated by `from` itself.
    pub fn transfer(
        &mut self,
        asset: &Asset,
        from: &Address,
        to: &Address,
    ) -> Result<(), LedgerError> {
        self.move_asset(asset, from, from, to)
    }

    /// Move `asset` from `from` to `to` on the authority of `operator`.
    ///
    /// Fungible: consumes allowance unless `operator == from`. NFTs:
    /// requires a per-token approval or an operator grant.
    pub fn transfer_from(
        &mut self,
        asset: &Asset,
        operator: &Address,
        from: &Address,
        to: &Address,
    ) -> Result<(), LedgerError> {
        self.move_asset(asset, operator, from, to)
    }

    /// Grant `spender` the right to move `asset` on behalf of `caller`.
    ///
    /// Fungible: sets the allowance to `asset.amount` (absolute, not
    /// additive). Single NFT: approves `spender` for that one token id.
    /// Multi-token: grants `spender` operator status over the whole
    /// collection.
    pub fn approve(
        &mut self,
        asset: &Asset,
        caller: &Address,
        spender: &Address,
    ) -> Result<(), LedgerError> {
        self.expect_token(&asset.address, asset.category)?;
        match asset.category {
            AssetCategory::Fungible => {
                self.books
                    .allowances
                    .insert((asset.address, *caller, *spender), asset.amount);
            }
            AssetCategory::NftSingle => {
                let owner = self
                    .books
                    .owners
                    .get(&(asset.address, asset.token_id))
                    .ok_or(LedgerError::UnknownTokenId {
                        token: asset.address,
                        token_id: asset.token_id,
                    })?;
                if owner != caller {
                    return Err(LedgerError::NotTokenHolder {
                        token: asset.address,
                        token_id: asset.token_id,
                        holder: *caller,
                    });
                }
                self.books
                    .token_approvals
                    .insert((asset.address, asset.token_id), *spender);
            }
            AssetCategory::NftMulti => {
                self.books
                    .operators
                    .insert((asset.address, *caller, *spender));
            }
        }
        Ok(())
    }

    /// Remaining fungible allowance of `spender` over `owner`'s balance.
    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> u64 {
        self.books
            .allowances
            .get(&(*token, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    // -- receiver policies --------------------------------------------------

    /// Set how `address` treats inbound NFT safe-transfers.
    pub fn set_receiver_policy(&mut self, address: Address, policy: ReceiverPolicy) {
        self.books.receivers.insert(address, policy);
    }

    // -- per-token state ----------------------------------------------------

    /// Replace the state bytes of one token. Issuer-only; the token id
    /// must exist (for single NFTs, minted; for multi, any id).
    ///
    /// This is the mutable payload that collateral state fingerprints
    /// pin: a vault-share token updating its internal accounting, for
    /// example, changes these bytes and thereby invalidates proposals
    /// that fingerprinted the old state.
    pub fn set_token_state(
        &mut self,
        caller: &Address,
        collection: &Address,
        token_id: u64,
        state: Vec<u8>,
    ) -> Result<(), LedgerError> {
        let record = self
            .books
            .tokens
            .get(collection)
            .ok_or(LedgerError::UnknownToken(*collection))?;
        if record.issuer != *caller {
            return Err(LedgerError::NotIssuer {
                token: *collection,
                caller: *caller,
            });
        }
        if record.category == AssetCategory::NftSingle
            && !self.books.owners.contains_key(&(*collection, token_id))
        {
            return Err(LedgerError::UnknownTokenId {
                token: *collection,
                token_id,
            });
        }

        self.books.token_state.insert((*collection, token_id), state);
        Ok(())
    }

    /// Current state bytes of one token, if any were ever set.
    pub fn token_state(&self, collection: &Address, token_id: u64) -> Option<&[u8]> {
        self.books
            .token_state
            .get(&(*collection, token_id))
            .map(|v| v.as_slice())
    }

    // -- snapshots ----------------------------------------------------------

    /// Point-in-time copy of the books.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            books: self.books.clone(),
        }
    }

    /// Throw away the current books and restore a snapshot.
    pub fn restore(&mut self, snapshot: LedgerSnapshot) {
        self.books = snapshot.books;
    }

    // -- internals ----------------------------------------------------------

    fn expect_token(
        &self,
        address: &Address,
        declared: AssetCategory,
    ) -> Result<&TokenRecord, LedgerError> {
        let record = self
            .books
            .tokens
            .get(address)
            .ok_or(LedgerError::UnknownToken(*address))?;
        if record.category != declared {
            return Err(LedgerError::CategoryMismatch {
                token: *address,
                registered: record.category,
                declared,
            });
        }
        Ok(record)
    }

    fn fungible_balance_raw(&self, token: &Address, who: &Address) -> u64 {
        self.books
            .balances
            .get(&(*token, *who))
            .copied()
            .unwrap_or(0)
    }

    fn multi_balance_raw(&self, collection: &Address, token_id: u64, who: &Address) -> u64 {
        self.books
            .holdings
            .get(&(*collection, token_id, *who))
            .copied()
            .unwrap_or(0)
    }

    fn check_receiver(&self, to: &Address, operator: &Address) -> Result<(), LedgerError> {
        if let Some(ReceiverPolicy::SelfInitiatedOnly) = self.books.receivers.get(to) {
            if operator != to {
                return Err(LedgerError::UnsupportedTransferFunction {
                    receiver: *to,
                    operator: *operator,
                });
            }
        }
        Ok(())
    }

    fn move_asset(
        &mut self,
        asset: &Asset,
        operator: &Address,
        from: &Address,
        to: &Address,
    ) -> Result<(), LedgerError> {
        let record = self.expect_token(&asset.address, asset.category)?;
        let fee_bps = record.fee_bps;

        match asset.category {
            AssetCategory::Fungible => {
                let amount = asset.transfer_amount();

                // Delegated transfers consume allowance; self-transfers don't.
                if operator != from {
                    let available = self.allowance(&asset.address, from, operator);
                    if available < amount {
                        return Err(LedgerError::InsufficientAllowance {
                            spender: *operator,
                            available,
                            required: amount,
                        });
                    }
                    self.books
                        .allowances
                        .insert((asset.address, *from, *operator), available - amount);
                }

                let from_balance = self.fungible_balance_raw(&asset.address, from);
                if from_balance < amount {
                    return Err(LedgerError::InsufficientBalance {
                        available: from_balance,
                        required: amount,
                    });
                }

                // The fee is burned: recipient gets the net, supply shrinks.
                let fee = (amount as u128 * fee_bps as u128 / 10_000) as u64;
                let net = amount - fee;

                let to_balance = self.fungible_balance_raw(&asset.address, to);
                let new_to = to_balance
                    .checked_add(net)
                    .ok_or(LedgerError::SupplyOverflow {
                        token: asset.address,
                    })?;

                self.books
                    .balances
                    .insert((asset.address, *from), from_balance - amount);
                self.books.balances.insert((asset.address, *to), new_to);
                if fee > 0 {
                    let record = self
                        .books
                        .tokens
                        .get_mut(&asset.address)
                        .expect("checked above");
                    record.total_supply = record.total_supply.saturating_sub(fee);
                }
            }
            AssetCategory::NftSingle => {
                let key = (asset.address, asset.token_id);
                let owner = self
                    .books
                    .owners
                    .get(&key)
                    .copied()
                    .ok_or(LedgerError::UnknownTokenId {
                        token: asset.address,
                        token_id: asset.token_id,
                    })?;
                if owner != *from {
                    return Err(LedgerError::NotTokenHolder {
                        token: asset.address,
                        token_id: asset.token_id,
                        holder: *from,
                    });
                }

                let approved = operator == from
                    || self.books.token_approvals.get(&key) == Some(operator)
                    || self
                        .books
                        .operators
                        .contains(&(asset.address, *from, *operator));
                if !approved {
                    return Err(LedgerError::NotApproved {
                        owner: *from,
                        operator: *operator,
                    });
                }

                self.check_receiver(to, operator)?;

                self.books.owners.insert(key, *to);
                // A transfer consumes the per-token approval, always.
                self.books.token_approvals.remove(&key);
            }
            AssetCategory::NftMulti => {
                let amount = asset.transfer_amount();

                let approved = operator == from
                    || self
                        .books
                        .operators
                        .contains(&(asset.address, *from, *operator));
                if !approved {
                    return Err(LedgerError::NotApproved {
                        owner: *from,
                        operator: *operator,
                    });
                }

                self.check_receiver(to, operator)?;

                let held = self.multi_balance_raw(&asset.address, asset.token_id, from);
                if held < amount {
                    return Err(LedgerError::InsufficientBalance {
                        available: held,
                        required: amount,
                    });
                }
                let to_held = self.multi_balance_raw(&asset.address, asset.token_id, to);
                let new_to = to_held
                    .checked_add(amount)
                    .ok_or(LedgerError::SupplyOverflow {
                        token: asset.address,
                    })?;

                self.books
                    .holdings
                    .insert((asset.address, asset.token_id, *from), held - amount);
                self.books
                    .holdings
                    .insert((asset.address, asset.token_id, *to), new_to);
            }
        }
        Ok(())
    }
}

/// Content-derived token contract address:
/// `BLAKE3_derive_key(token-domain, category || len(symbol) || symbol || issuer)`.
fn derive_token_address(category: AssetCategory, symbol: &str, issuer: &Address) -> Address {
    let mut preimage = Vec::with_capacity(1 + 4 + symbol.len() + 32);
    preimage.push(category.tag());
    preimage.extend_from_slice(&(symbol.len() as u32).to_le_bytes());
    preimage.extend_from_slice(symbol.as_bytes());
    preimage.extend_from_slice(issuer.as_bytes());
    Address::from_bytes(domain_separated_hash(TOKEN_ADDRESS_DOMAIN, &preimage))
}
