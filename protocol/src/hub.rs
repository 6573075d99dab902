//! # Access Registry
//!
//! A single-owner table of capability tags. Components that must gate an
//! operation ("only tagged loan engines may mint claim tokens", "only
//! tagged managers may revoke someone else's nonce") look the caller up
//! here instead of keeping their own ACLs.
//!
//! ## Why tags instead of per-component owner lists?
//!
//! One registry means one place to audit who can do what, and one
//! ownership handover when the operator key rotates. Components never
//! store a reference to the registry — they take a [`CapabilityOracle`]
//! per call, so tests can hand in a permissive stub and deployments can
//! swap registries without touching component state.
//!
//! The well-known tags live in [`crate::config`]: `ACTIVE_LOAN`
//! (loan engines), `NONCE_MANAGER` (delegated nonce revocation) and
//! `LOAN_MODULE` (registered strategy modules). The table itself is
//! open — any string can be a tag.

use std::collections::HashSet;
use thiserror::Error;

use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Access-registry failures.
#[derive(Debug, Error)]
pub enum HubError {
    /// Tag administration is owner-only.
    #[error("caller {caller} is not the registry owner")]
    CallerNotOwner {
        /// Who tried to administrate.
        caller: Address,
    },

    /// The address does not hold the required tag.
    #[error("address {address} does not hold the '{tag}' tag")]
    MissingTag {
        /// The untagged address.
        address: Address,
        /// The tag the operation needed.
        tag: String,
    },
}

// ---------------------------------------------------------------------------
// CapabilityOracle
// ---------------------------------------------------------------------------

/// Read-only capability lookup, injected per call.
///
/// [`Hub`] is the production implementation; tests are free to implement
/// this on a unit struct that grants everything.
pub trait CapabilityOracle {
    /// Does `address` hold `tag`?
    fn has_tag(&self, address: &Address, tag: &str) -> bool;

    /// Fail with [`HubError::MissingTag`] unless `address` holds `tag`.
    fn require(&self, address: &Address, tag: &str) -> Result<(), HubError> {
        if self.has_tag(address, tag) {
            Ok(())
        } else {
            Err(HubError::MissingTag {
                address: *address,
                tag: tag.to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// The single-owner tag table.
#[derive(Debug)]
pub struct Hub {
    owner: Address,
    grants: HashSet<(Address, String)>,
}

impl Hub {
    /// A fresh registry owned by `owner`, with no grants.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            grants: HashSet::new(),
        }
    }

    /// Current registry owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Grant or withdraw a tag. Owner-only.
    pub fn set_tag(
        &mut self,
        caller: &Address,
        subject: Address,
        tag: &str,
        enabled: bool,
    ) -> Result<(), HubError> {
        if *caller != self.owner {
            return Err(HubError::CallerNotOwner { caller: *caller });
        }
        if enabled {
            self.grants.insert((subject, tag.to_string()));
        } else {
            self.grants.remove(&(subject, tag.to_string()));
        }
        Ok(())
    }

    /// Hand the registry to a new owner. Owner-only. Grants survive the
    /// handover untouched.
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> Result<(), HubError> {
        if *caller != self.owner {
            return Err(HubError::CallerNotOwner { caller: *caller });
        }
        self.owner = new_owner;
        Ok(())
    }
}

impl CapabilityOracle for Hub {
    fn has_tag(&self, address: &Address, tag: &str) -> bool {
        self.grants.contains(&(*address, tag.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TAG_ACTIVE_LOAN, TAG_NONCE_MANAGER};

    fn addr(label: &str) -> Address {
        Address::of_component(label)
    }

    #[test]
    fn owner_grants_and_withdraws_tags() {
        let owner = addr("operator");
        let engine = addr("engine");
        let mut hub = Hub::new(owner);

        assert!(!hub.has_tag(&engine, TAG_ACTIVE_LOAN));

        hub.set_tag(&owner, engine, TAG_ACTIVE_LOAN, true).unwrap();
        assert!(hub.has_tag(&engine, TAG_ACTIVE_LOAN));
        hub.require(&engine, TAG_ACTIVE_LOAN).unwrap();

        hub.set_tag(&owner, engine, TAG_ACTIVE_LOAN, false).unwrap();
        assert!(!hub.has_tag(&engine, TAG_ACTIVE_LOAN));
    }

    #[test]
    fn non_owner_cannot_administrate() {
        let owner = addr("operator");
        let mallory = addr("mallory");
        let mut hub = Hub::new(owner);

        let err = hub
            .set_tag(&mallory, mallory, TAG_ACTIVE_LOAN, true)
            .unwrap_err();
        assert!(matches!(err, HubError::CallerNotOwner { caller } if caller == mallory));
    }

    #[test]
    fn tags_are_independent_per_address_and_name() {
        let owner = addr("operator");
        let a = addr("a");
        let b = addr("b");
        let mut hub = Hub::new(owner);

        hub.set_tag(&owner, a, TAG_ACTIVE_LOAN, true).unwrap();

        assert!(hub.has_tag(&a, TAG_ACTIVE_LOAN));
        assert!(!hub.has_tag(&a, TAG_NONCE_MANAGER));
        assert!(!hub.has_tag(&b, TAG_ACTIVE_LOAN));
    }

    #[test]
    fn require_names_the_missing_tag() {
        let hub = Hub::new(addr("operator"));
        let err = hub.require(&addr("x"), TAG_NONCE_MANAGER).unwrap_err();
        match err {
            HubError::MissingTag { tag, .. } => assert_eq!(tag, TAG_NONCE_MANAGER),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ownership_transfer_moves_admin_rights() {
        let old = addr("old-op");
        let new = addr("new-op");
        let subject = addr("subject");
        let mut hub = Hub::new(old);

        hub.set_tag(&old, subject, TAG_ACTIVE_LOAN, true).unwrap();
        hub.transfer_ownership(&old, new).unwrap();

        // Old owner is locked out; grants survive.
        assert!(matches!(
            hub.set_tag(&old, subject, TAG_ACTIVE_LOAN, false),
            Err(HubError::CallerNotOwner { .. })
        ));
        assert!(hub.has_tag(&subject, TAG_ACTIVE_LOAN));
        hub.set_tag(&new, subject, TAG_ACTIVE_LOAN, false).unwrap();
    }

    #[test]
    fn capability_oracle_is_object_safe() {
        let owner = addr("operator");
        let engine = addr("engine");
        let mut hub = Hub::new(owner);
        hub.set_tag(&owner, engine, TAG_ACTIVE_LOAN, true).unwrap();

        let oracle: &dyn CapabilityOracle = &hub;
        assert!(oracle.has_tag(&engine, TAG_ACTIVE_LOAN));
    }
}
