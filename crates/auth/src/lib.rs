//! Local auth provider: an email/password account registry with salted
//! SHA-256 digests and a single current session, optionally persisted to disk.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use chrono::{DateTime, Utc};
use folio_core::{
    model::{Session, SignUp, UserProfile},
    traits::AuthProvider,
};
use parking_lot::RwLock;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(String),
    #[error("password must have at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("email already registered: {0}")]
    EmailInUse(String),
    #[error("no account for {0}")]
    UnknownAccount(String),
    #[error("wrong password")]
    WrongPassword,
    #[error("io error: {0}")]
    Io(String),
    #[error("serde error: {0}")]
    Serde(String),
}

#[derive(Clone, Serialize, Deserialize)]
struct Account {
    uid: String,
    email: String,
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    salt: String,
    #[serde(rename = "passwordSha256")]
    password_sha256: String,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
}

impl Account {
    fn profile(&self) -> UserProfile {
        UserProfile {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct Registry {
    accounts: Vec<Account>,
}

pub struct LocalAuth {
    dir: Option<PathBuf>,
    accounts: RwLock<Vec<Account>>,
    session: watch::Sender<Option<Session>>,
}

impl LocalAuth {
    /// Registry and session live only as long as this value.
    #[must_use]
    pub fn in_memory() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            dir: None,
            accounts: RwLock::new(Vec::new()),
            session,
        }
    }

    /// Loads `users.json` and `session.json` from `dir`, creating it if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, AuthError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| AuthError::Io(e.to_string()))?;
        let registry: Registry = read_json(&dir.join(USERS_FILE))?.unwrap_or_default();
        let session: Option<Session> = read_json(&dir.join(SESSION_FILE))?;
        // a session for an account that no longer exists is dropped
        let session =
            session.filter(|s| registry.accounts.iter().any(|account| account.uid == s.uid));
        debug!(
            accounts = registry.accounts.len(),
            signed_in = session.is_some(),
            "local auth loaded"
        );
        let (sender, _) = watch::channel(session);
        Ok(Self {
            dir: Some(dir),
            accounts: RwLock::new(registry.accounts),
            session: sender,
        })
    }

    pub fn profile(&self, uid: &str) -> Option<UserProfile> {
        self.accounts
            .read()
            .iter()
            .find(|a| a.uid == uid)
            .map(Account::profile)
    }

    fn set_session(&self, session: Option<Session>) -> Result<(), AuthError> {
        if let Some(dir) = &self.dir {
            let path = dir.join(SESSION_FILE);
            match &session {
                Some(s) => write_json(&path, s)?,
                None => match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(AuthError::Io(e.to_string())),
                },
            }
        }
        self.session.send_replace(session);
        Ok(())
    }

    fn start_session(&self, account: &Account) -> Result<Session, AuthError> {
        let session = Session {
            uid: account.uid.clone(),
            email: account.email.clone(),
            signed_in_at: Utc::now(),
        };
        self.set_session(Some(session.clone()))?;
        Ok(session)
    }
}

impl AuthProvider for LocalAuth {
    type Error = AuthError;

    fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, Self::Error> {
        let email = normalize_email(email);
        let account = self
            .accounts
            .read()
            .iter()
            .find(|a| a.email == email)
            .cloned()
            .ok_or_else(|| AuthError::UnknownAccount(email.clone()))?;
        if digest(&account.salt, password.expose_secret()) != account.password_sha256 {
            return Err(AuthError::WrongPassword);
        }
        let session = self.start_session(&account)?;
        info!(uid = %session.uid, "signed in");
        Ok(session)
    }

    fn sign_up(&self, request: &SignUp) -> Result<Session, Self::Error> {
        let email = normalize_email(&request.email);
        if !email_pattern().is_match(&email) {
            return Err(AuthError::InvalidEmail(email));
        }
        let password = request.password.expose_secret();
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        let account = {
            let mut accounts = self.accounts.write();
            if accounts.iter().any(|a| a.email == email) {
                return Err(AuthError::EmailInUse(email));
            }
            let salt = uuid::Uuid::new_v4().simple().to_string();
            let account = Account {
                uid: format!("usr_{}", uuid::Uuid::new_v4().simple()),
                email,
                display_name: request
                    .display_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_owned),
                password_sha256: digest(&salt, password),
                salt,
                created_at: Utc::now(),
            };
            let mut next = accounts.clone();
            next.push(account.clone());
            if let Some(dir) = &self.dir {
                write_json(
                    &dir.join(USERS_FILE),
                    &Registry {
                        accounts: next.clone(),
                    },
                )?;
            }
            *accounts = next;
            account
        };
        let session = self.start_session(&account)?;
        info!(uid = %session.uid, "account created");
        Ok(session)
    }

    fn sign_out(&self) -> Result<(), Self::Error> {
        let previous = self.session.borrow().as_ref().map(|s| s.uid.clone());
        self.set_session(None)?;
        if let Some(uid) = previous {
            info!(uid = %uid, "signed out");
        }
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}

const USERS_FILE: &str = "users.json";
const SESSION_FILE: &str = "session.json";

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"))
}

fn digest(salt: &str, password: &str) -> String {
    let mut h = Sha256::new();
    h.update(salt.as_bytes());
    h.update(password.as_bytes());
    hex::encode(h.finalize())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, AuthError> {
    match fs::read(path) {
        Ok(data) => serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| AuthError::Serde(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AuthError::Io(e.to_string())),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AuthError> {
    let data = serde_json::to_vec_pretty(value).map_err(|e| AuthError::Serde(e.to_string()))?;
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
    {
        let mut f = File::create(&tmp).map_err(|e| AuthError::Io(e.to_string()))?;
        f.write_all(&data)
            .map_err(|e| AuthError::Io(e.to_string()))?;
        f.sync_all().map_err(|e| AuthError::Io(e.to_string()))?;
    }
    fs::rename(&tmp, path).map_err(|e| AuthError::Io(e.to_string()))
}
