//! Administrative capability checks
//!
//! Gates market listing, role management, and every parameter setter. A
//! caller without the required role fails with `AccessControlDenied`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tenor_common::{AccountId, LedgerError, Result};
use tracing::info;

/// Capability held by an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Lists markets and manages roles; implies every other role
    Admin,
    /// Updates curve, fee, and cap parameters
    ParameterManager,
}

#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    grants: BTreeMap<AccountId, BTreeSet<Role>>,
}

impl AccessControl {
    /// Access control with `admin` as the sole administrator
    pub fn new(admin: AccountId) -> Self {
        let mut grants = BTreeMap::new();
        grants.insert(admin, BTreeSet::from([Role::Admin]));
        Self { grants }
    }

    pub fn has_role(&self, account: &AccountId, role: Role) -> bool {
        self.grants
            .get(account)
            .map_or(false, |roles| roles.contains(&Role::Admin) || roles.contains(&role))
    }

    pub fn ensure_role(&self, caller: &AccountId, role: Role) -> Result<()> {
        if !self.has_role(caller, role) {
            return Err(LedgerError::AccessControlDenied(caller.to_string()));
        }
        Ok(())
    }

    pub fn grant(&mut self, caller: &AccountId, account: AccountId, role: Role) -> Result<()> {
        self.ensure_role(caller, Role::Admin)?;
        info!(%caller, %account, ?role, "role granted");
        self.grants.entry(account).or_default().insert(role);
        Ok(())
    }

    pub fn revoke(&mut self, caller: &AccountId, account: &AccountId, role: Role) -> Result<()> {
        self.ensure_role(caller, Role::Admin)?;
        if role == Role::Admin && caller == account {
            return Err(LedgerError::InvalidParameters(
                "administrators cannot revoke their own role".to_string(),
            ));
        }
        if let Some(roles) = self.grants.get_mut(account) {
            roles.remove(&role);
            if roles.is_empty() {
                self.grants.remove(account);
            }
        }
        info!(%caller, %account, ?role, "role revoked");
        Ok(())
    }
}
