//! Accounts known by the instance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config;
use crate::security::{is_valid_email, verify_hash};

/// Account privileges.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages every class.
    Admin,
    /// Manages resources of their own class.
    Delegate,
    #[default]
    Student,
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub class_id: Option<String>,
    #[serde(skip)]
    password_hash: String,
}

impl Account {
    /// Whether this account may read resources of `class_id`.
    pub fn can_view(&self, class_id: &str) -> bool {
        self.role == Role::Admin || self.class_id.as_deref() == Some(class_id)
    }

    /// Whether this account may modify resources of `class_id`.
    pub fn can_manage(&self, class_id: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Delegate => self.class_id.as_deref() == Some(class_id),
            Role::Student => false,
        }
    }
}

impl From<config::Account> for Account {
    fn from(account: config::Account) -> Self {
        Self {
            email: account.email.to_lowercase(),
            name: account.name,
            role: account.role,
            class_id: account.class_id,
            password_hash: account.password_hash,
        }
    }
}

/// Read-only account directory, keyed by lowercase email.
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: HashMap<String, Account>,
}

impl AccountStore {
    /// Create a new [`AccountStore`].
    pub fn new(accounts: impl IntoIterator<Item = config::Account>) -> Self {
        let accounts = accounts
            .into_iter()
            .map(Account::from)
            .map(|account| (account.email.clone(), account))
            .collect();

        Self { accounts }
    }

    /// Find an account by email.
    pub fn get(&self, email: &str) -> Option<&Account> {
        self.accounts.get(&email.to_lowercase())
    }

    /// Every account attached to `class_id`, sorted by name.
    pub fn members(&self, class_id: &str) -> Vec<&Account> {
        let mut members: Vec<&Account> = self
            .accounts
            .values()
            .filter(|account| account.class_id.as_deref() == Some(class_id))
            .collect();
        members.sort_by(|a, b| a.name.cmp(&b.name).then(a.email.cmp(&b.email)));
        members
    }

    /// Check credentials.
    ///
    /// Unknown accounts still pay for one digest to keep timings close.
    pub fn authenticate(&self, email: &str, password: &str) -> Option<&Account> {
        if !is_valid_email(email) {
            return None;
        }

        match self.get(email) {
            Some(account) if verify_hash(password, &account.password_hash) => {
                Some(account)
            },
            Some(_) => None,
            None => {
                verify_hash(password, crate::security::EMPTY_DIGEST);
                None
            },
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::security::hash_string;

    pub(crate) const ADMIN_PASSWORD: &str = "StRong_PaÂ§$W0rD";
    pub(crate) const DELEGATE_PASSWORD: &str = "delegue-l3";
    pub(crate) const STUDENT_PASSWORD: &str = "etudiant-l3";

    pub(crate) fn accounts() -> Vec<config::Account> {
        vec![
            config::Account {
                email: "admin@ecole.sn".into(),
                name: "Administrator".into(),
                role: Role::Admin,
                class_id: None,
                password_hash: hash_string(ADMIN_PASSWORD),
            },
            config::Account {
                email: "Delegue@Ecole.sn".into(),
                name: "Awa Diop".into(),
                role: Role::Delegate,
                class_id: Some("l3-info".into()),
                password_hash: hash_string(DELEGATE_PASSWORD),
            },
            config::Account {
                email: "etudiant@ecole.sn".into(),
                name: "=HYPERLINK(\"http://evil\")".into(),
                role: Role::Student,
                class_id: Some("l3-info".into()),
                password_hash: hash_string(STUDENT_PASSWORD),
            },
            config::Account {
                email: "autre@ecole.sn".into(),
                name: "Moussa Ba".into(),
                role: Role::Student,
                class_id: Some("m1-math".into()),
                password_hash: hash_string(STUDENT_PASSWORD),
            },
        ]
    }

    #[test]
    fn test_authenticate() {
        let store = AccountStore::new(accounts());
        assert_eq!(store.len(), 4);

        let account = store.authenticate("DELEGUE@ecole.sn", DELEGATE_PASSWORD);
        assert_eq!(account.map(|a| a.role), Some(Role::Delegate));

        assert!(store.authenticate("delegue@ecole.sn", "wrong").is_none());
        assert!(store.authenticate("nobody@ecole.sn", DELEGATE_PASSWORD).is_none());
        assert!(store.authenticate("not-an-email", DELEGATE_PASSWORD).is_none());
    }

    #[test]
    fn test_permissions() {
        let store = AccountStore::new(accounts());
        let admin = store.get("admin@ecole.sn").unwrap();
        let delegate = store.get("delegue@ecole.sn").unwrap();
        let student = store.get("etudiant@ecole.sn").unwrap();

        assert!(admin.can_manage("m1-math") && admin.can_view("m1-math"));
        assert!(delegate.can_manage("l3-info"));
        assert!(!delegate.can_manage("m1-math"));
        assert!(!delegate.can_view("m1-math"));
        assert!(student.can_view("l3-info"));
        assert!(!student.can_manage("l3-info"));
    }

    #[test]
    fn test_members() {
        let store = AccountStore::new(accounts());
        let members = store.members("l3-info");
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].email, "etudiant@ecole.sn"); // '=' sorts first.
        assert!(store.members("unknown").is_empty());
    }

    #[test]
    fn test_hash_never_serialized() {
        let store = AccountStore::new(accounts());
        let json = serde_json::to_string(store.get("admin@ecole.sn").unwrap()).unwrap();
        assert!(!json.contains(&hash_string(ADMIN_PASSWORD)));
        assert!(json.contains("\"classId\":null"));
    }
}
