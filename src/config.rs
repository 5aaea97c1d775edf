//! Configuration manager for class connect.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;
use crate::account::Role;
use crate::security::{is_sha256_hex, is_valid_email};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_PORT: u16 = 8888;

/// Environment variables injecting the administrator account.
pub const ADMIN_EMAIL_ENV: &str = "ADMIN_EMAIL";
pub const ADMIN_PASSWORD_HASH_ENV: &str = "ADMIN_PASSWORD_HASH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Domain name of current instance.
    pub url: String,
    /// Listening port.
    pub port: u16,
    #[serde(skip_deserializing)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Session lifetimes.
    pub session: Session,
    /// Uploaded documents limits.
    pub upload: Upload,
    /// Requests limits.
    pub rate_limit: RateLimit,
    /// Known accounts. Passwords are SHA-256 hex digests.
    #[serde(skip_serializing)]
    pub accounts: Vec<Account>,
    /// Known classes.
    #[serde(skip_serializing)]
    pub classes: Vec<Class>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: "Class Connect".into(),
            url: String::default(),
            port: DEFAULT_PORT,
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            session: Session::default(),
            upload: Upload::default(),
            rate_limit: RateLimit::default(),
            accounts: Vec::new(),
            classes: Vec::new(),
        }
    }
}

/// Session configuration, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    /// Idle time before a session is closed.
    pub inactivity_timeout: u64,
    /// Absolute lifetime of a "remember me" session.
    pub remember_me: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            inactivity_timeout: 15 * 60,
            remember_me: 30 * 24 * 60 * 60,
        }
    }
}

/// Upload configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Upload {
    /// Maximum decoded size of an uploaded document, in bytes.
    pub max_size: usize,
}

impl Default for Upload {
    fn default() -> Self {
        Self {
            max_size: 5 * 1024 * 1024, // 5 MiB.
        }
    }
}

/// Rate limit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimit {
    /// Login attempts per minute and per client.
    pub login: usize,
    /// Identify clients by the first `X-Forwarded-For` entry. Only enable
    /// behind a reverse proxy that overwrites the header.
    pub trust_forwarded: bool,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            login: 5,
            trust_forwarded: false,
        }
    }
}

/// Account entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Role,
    pub class_id: Option<String>,
    pub password_hash: String,
}

/// Class entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub id: String,
    pub name: String,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    /// Default configuration serving the given accounts and classes.
    pub fn with_directory(accounts: Vec<Account>, classes: Vec<Class>) -> Self {
        Self {
            accounts,
            classes,
            ..Default::default()
        }
    }

    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Application version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            PathBuf::from(DEFAULT_CONFIG_PATH)
        };

        let mut config = match File::open(&file_path) {
            Ok(file) => match serde_yaml::from_reader::<_, Configuration>(file) {
                Ok(config) => config,
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        };

        // set app version.
        config.version = VERSION.to_owned();

        if !config.url.is_empty() {
            config.url = Self::normalize_url(&config.url)?;
        }

        config.inject_admin(
            std::env::var(ADMIN_EMAIL_ENV).ok(),
            std::env::var(ADMIN_PASSWORD_HASH_ENV).ok(),
        );
        config.retain_valid_accounts();

        Ok(Arc::new(config))
    }

    /// Add an administrator from deployment secrets.
    ///
    /// An existing account with the same email is replaced.
    fn inject_admin(&mut self, email: Option<String>, hash: Option<String>) {
        let (Some(email), Some(password_hash)) = (email, hash) else {
            return;
        };
        let email = email.to_lowercase();

        self.accounts
            .retain(|account| account.email.to_lowercase() != email);
        self.accounts.push(Account {
            name: "Administrator".into(),
            email,
            role: Role::Admin,
            class_id: None,
            password_hash: password_hash.to_lowercase(),
        });
    }

    /// Skip accounts with a malformed email or password digest.
    fn retain_valid_accounts(&mut self) {
        self.accounts.retain(|account| {
            if !is_valid_email(&account.email) {
                tracing::error!(email = %account.email, "skipping account with invalid email");
                false
            } else if !is_sha256_hex(&account.password_hash) {
                tracing::error!(email = %account.email, "skipping account with invalid `password_hash`, expected 64 hex characters");
                false
            } else {
                true
            }
        });

        if !self.accounts.iter().any(|account| account.role == Role::Admin) {
            tracing::warn!(
                "no administrator configured, set `{ADMIN_EMAIL_ENV}` and `{ADMIN_PASSWORD_HASH_ENV}`"
            );
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found or invalid");
        Self::default()
    }
}
