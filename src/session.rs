//! Opaque bearer sessions.
//!
//! Tokens are random strings handed to the client once. Only their SHA-256
//! digest is kept in memory, so a dump of the store cannot be replayed.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde::Serialize;

use crate::account::Account;
use crate::config;
use crate::security::hash_string;

pub const TOKEN_LENGTH: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown session")]
    Unknown,
    #[error("session closed after inactivity")]
    Expired,
}

/// Server-side session data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub email: String,
    pub remember_me: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Issued token.
#[derive(Debug)]
pub struct Issued {
    pub token: String,
    /// Seconds before the session expires if unused.
    pub expires_in: u64,
}

/// Manage sessions.
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<String, Session>,
    inactivity: TimeDelta,
    remember_me: TimeDelta,
    config: config::Session,
}

fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

impl SessionManager {
    /// Create a new [`SessionManager`].
    pub fn new(config: config::Session) -> Self {
        Self {
            sessions: DashMap::new(),
            inactivity: seconds(config.inactivity_timeout),
            remember_me: seconds(config.remember_me),
            config,
        }
    }

    /// Open a session for `account`.
    pub fn create(&self, account: &Account, remember_me: bool) -> Issued {
        self.create_at(account, remember_me, Utc::now())
    }

    fn create_at(
        &self,
        account: &Account,
        remember_me: bool,
        now: DateTime<Utc>,
    ) -> Issued {
        let token = Alphanumeric.sample_string(&mut OsRng, TOKEN_LENGTH);

        self.sessions.insert(
            hash_string(&token),
            Session {
                email: account.email.clone(),
                remember_me,
                created_at: now,
                last_seen: now,
            },
        );

        Issued {
            token,
            expires_in: if remember_me {
                self.config.remember_me
            } else {
                self.config.inactivity_timeout
            },
        }
    }

    /// Resolve a token and mark the session as used.
    pub fn authenticate(&self, token: &str) -> Result<Session, SessionError> {
        self.authenticate_at(token, Utc::now())
    }

    fn authenticate_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        let key = hash_string(token);

        match self.sessions.get_mut(&key) {
            None => return Err(SessionError::Unknown),
            Some(mut session) if !self.is_expired(&session, now) => {
                session.last_seen = now;
                return Ok(session.clone());
            },
            Some(_) => (),
        }

        // guard is released, the entry can be removed.
        self.sessions.remove(&key);
        tracing::debug!("session expired");
        Err(SessionError::Expired)
    }

    /// Close a session. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(&hash_string(token)).is_some()
    }

    /// Drop every expired session and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !self.is_expired(session, now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        if session.remember_me {
            now.signed_duration_since(session.created_at) > self.remember_me
        } else {
            now.signed_duration_since(session.last_seen) > self.inactivity
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStore;
    use crate::account::tests::accounts;

    fn manager() -> SessionManager {
        SessionManager::new(config::Session::default())
    }

    fn account() -> Account {
        AccountStore::new(accounts())
            .get("etudiant@ecole.sn")
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_token_shape() {
        let manager = manager();
        let issued = manager.create(&account(), false);

        assert_eq!(issued.token.len(), TOKEN_LENGTH);
        assert!(issued.token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(issued.expires_in, 15 * 60);
        assert_eq!(manager.authenticate(&issued.token).unwrap().email, "etudiant@ecole.sn");
        assert_eq!(manager.authenticate("nope"), Err(SessionError::Unknown));
    }

    #[test]
    fn test_inactivity() {
        let manager = manager();
        let start = Utc::now();
        let issued = manager.create_at(&account(), false, start);

        // Activity keeps the session alive.
        let ten = start + TimeDelta::minutes(10);
        assert!(manager.authenticate_at(&issued.token, ten).is_ok());
        let twenty = start + TimeDelta::minutes(20);
        assert!(manager.authenticate_at(&issued.token, twenty).is_ok());

        let later = twenty + TimeDelta::minutes(16);
        assert_eq!(
            manager.authenticate_at(&issued.token, later),
            Err(SessionError::Expired)
        );
        // Removed once expired.
        assert_eq!(
            manager.authenticate_at(&issued.token, later),
            Err(SessionError::Unknown)
        );
    }

    #[test]
    fn test_remember_me() {
        let manager = manager();
        let start = Utc::now();
        let issued = manager.create_at(&account(), true, start);
        assert_eq!(issued.expires_in, 30 * 24 * 60 * 60);

        let idle = start + TimeDelta::hours(5);
        assert!(manager.authenticate_at(&issued.token, idle).is_ok());

        let past_lifetime = start + TimeDelta::days(31);
        assert_eq!(
            manager.authenticate_at(&issued.token, past_lifetime),
            Err(SessionError::Expired)
        );
    }

    #[test]
    fn test_revoke_and_purge() {
        let manager = manager();
        let start = Utc::now();
        let first = manager.create_at(&account(), false, start);
        let _second = manager.create_at(&account(), true, start);
        assert_eq!(manager.len(), 2);

        assert!(manager.revoke(&first.token));
        assert!(!manager.revoke(&first.token));

        manager.create_at(&account(), false, start);
        assert_eq!(manager.purge_expired_at(start + TimeDelta::hours(1)), 1);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_token_not_stored() {
        let manager = manager();
        let issued = manager.create(&account(), false);
        assert!(manager.sessions.get(&issued.token).is_none());
        assert!(manager.sessions.contains_key(&hash_string(&issued.token)));
    }
}
