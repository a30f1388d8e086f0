use std::collections::BTreeMap;

use super::{AccountId, LedgerError, User};

/// Registered users keyed by account id.
#[derive(Debug, Clone, Default)]
pub struct UserRegistry {
    users: BTreeMap<AccountId, User>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted records.
    pub fn from_users(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
        }
    }

    /// Register a new user with zero balance, zero debt and no rental.
    pub fn add_user(
        &mut self,
        id: &str,
        name: String,
        surname: String,
    ) -> Result<&User, LedgerError> {
        if self.users.contains_key(id) {
            return Err(LedgerError::DuplicateUser(id.to_string()));
        }
        let user = User::new(id.to_string(), name, surname);
        Ok(self.users.entry(id.to_string()).or_insert(user))
    }

    pub fn get_user(&self, id: &str) -> Result<&User, LedgerError> {
        self.users
            .get(id)
            .ok_or_else(|| LedgerError::UserNotFound(id.to_string()))
    }

    pub(crate) fn get_user_mut(&mut self, id: &str) -> Result<&mut User, LedgerError> {
        self.users
            .get_mut(id)
            .ok_or_else(|| LedgerError::UserNotFound(id.to_string()))
    }

    pub fn is_user(&self, id: &str) -> bool {
        self.users.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Users in account-id order.
    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }
}
