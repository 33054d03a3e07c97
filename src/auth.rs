//! Static account list gating the editing commands.
//!
//! Accounts are `username:<argon2 PHC string>` entries separated by `;`,
//! kept in the settings store. Logging in mints a random token; the settings
//! keep the token plus a digest binding it to the account's password hash,
//! so changing the password or removing the account ends the session.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::storage::{SettingsError, SettingsStore};

pub const KEY_ACCOUNTS: &str = "accounts";
pub const KEY_SESSION: &str = "session_token";
/// `username:digest` record of the saved session
pub const KEY_SESSION_DIGEST: &str = "session_digest";

const SALT_SIZE: usize = 16;
const TOKEN_SIZE: usize = 32;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid account entry: {0}")]
    InvalidAccount(String),
    #[error("Password hashing failed: {0}")]
    Hash(String),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    /// Salted argon2 hash in PHC string form
    pub password_hash: String,
}

impl Account {
    pub fn new(username: impl Into<String>, password: &str) -> Result<Self, AuthError> {
        Ok(Self {
            username: username.into(),
            password_hash: hash_password(password)?,
        })
    }

    fn verify(&self, password: &str) -> bool {
        match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    fn session_digest(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.update(b":");
        hasher.update(self.password_hash.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub token: String,
    digest: String,
}

/// Argon2id hash of `password` with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| AuthError::Hash(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

fn generate_token() -> String {
    let mut token = [0u8; TOKEN_SIZE];
    rand::thread_rng().fill_bytes(&mut token);
    hex::encode(token)
}

fn ct_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    accounts: Vec<Account>,
}

impl StaticAuthenticator {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    /// Parse a `;`-separated `user:hash` list
    pub fn parse(list: &str) -> Result<Self, AuthError> {
        let mut accounts = Vec::new();
        for entry in list.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (username, hash) = entry
                .split_once(':')
                .ok_or_else(|| AuthError::InvalidAccount(entry.to_string()))?;
            let (username, hash) = (username.trim(), hash.trim());
            if username.is_empty() || PasswordHash::new(hash).is_err() {
                return Err(AuthError::InvalidAccount(entry.to_string()));
            }
            accounts.push(Account {
                username: username.to_string(),
                password_hash: hash.to_string(),
            });
        }
        Ok(Self { accounts })
    }

    pub fn from_settings(settings: &SettingsStore) -> Result<Self, AuthError> {
        match settings.get_non_empty(KEY_ACCOUNTS) {
            Some(list) => Self::parse(&list),
            None => Ok(Self::default()),
        }
    }

    pub fn has_accounts(&self) -> bool {
        !self.accounts.is_empty()
    }

    fn account(&self, username: &str) -> Option<&Account> {
        let mut found = None;
        for account in &self.accounts {
            if ct_equal(&account.username, username) && found.is_none() {
                found = Some(account);
            }
        }
        found
    }

    pub fn login(&self, username: &str, password: &str) -> Option<Session> {
        let account = self.account(username).filter(|a| a.verify(password))?;
        let token = generate_token();
        log::info!("Logged in as {}", account.username);
        Some(Session {
            username: account.username.clone(),
            digest: account.session_digest(&token),
            token,
        })
    }

    /// Whether `token` matches a `username:digest` session record for a
    /// current account
    pub fn verify_session(&self, record: &str, token: &str) -> Option<Session> {
        let (username, digest) = record.trim().split_once(':')?;
        let account = self.account(username)?;
        let expected = account.session_digest(token.trim());
        if !ct_equal(&expected, digest) {
            return None;
        }
        Some(Session {
            username: account.username.clone(),
            token: token.trim().to_string(),
            digest: expected,
        })
    }

    /// Session saved in settings, if it is still valid
    pub fn current_session(&self, settings: &SettingsStore) -> Option<Session> {
        let token = settings.get_non_empty(KEY_SESSION)?;
        let record = settings.get_non_empty(KEY_SESSION_DIGEST)?;
        self.verify_session(&record, &token)
    }
}

pub fn save_session(settings: &mut SettingsStore, session: &Session) -> Result<(), AuthError> {
    settings.set(KEY_SESSION, &session.token)?;
    settings.set(
        KEY_SESSION_DIGEST,
        &format!("{}:{}", session.username, session.digest),
    )?;
    Ok(())
}

pub fn clear_session(settings: &mut SettingsStore) -> Result<(), AuthError> {
    settings.remove(KEY_SESSION)?;
    settings.remove(KEY_SESSION_DIGEST)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> StaticAuthenticator {
        StaticAuthenticator::new(vec![
            Account::new("ana", "s3cret").unwrap(),
            Account::new("rui", "hunter2").unwrap(),
        ])
    }

    fn record(session: &Session) -> String {
        format!("{}:{}", session.username, session.digest)
    }

    #[test]
    fn test_login() {
        let auth = authenticator();
        let session = auth.login("ana", "s3cret").unwrap();
        assert_eq!(session.username, "ana");
        assert_eq!(session.token.len(), 64);
        assert_eq!(auth.verify_session(&record(&session), &session.token), Some(session.clone()));

        assert!(auth.login("ana", "hunter2").is_none());
        assert!(auth.login("nobody", "s3cret").is_none());
        assert!(auth.verify_session(&record(&session), "deadbeef").is_none());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("s3cret").unwrap();
        let b = hash_password("s3cret").unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_tokens_are_fresh_per_login() {
        let auth = authenticator();
        let first = auth.login("ana", "s3cret").unwrap();
        let second = auth.login("ana", "s3cret").unwrap();
        assert_ne!(first.token, second.token);

        let rui = auth.login("rui", "hunter2").unwrap();
        // A token only verifies against its own account's record
        let forged = format!("ana:{}", rui.digest);
        assert!(auth.verify_session(&forged, &rui.token).is_none());
    }

    #[test]
    fn test_account_list_alone_grants_no_session() {
        let auth = authenticator();
        let ana = &auth.accounts[0];
        let guess = hex::encode(Sha256::digest(format!("ana:{}", ana.password_hash).as_bytes()));
        assert!(auth.verify_session(&format!("ana:{}", guess), &guess).is_none());
    }

    #[test]
    fn test_password_change_invalidates_session() {
        let session = authenticator().login("ana", "s3cret").unwrap();
        let changed = StaticAuthenticator::new(vec![Account::new("ana", "new-pass").unwrap()]);
        assert!(changed.verify_session(&record(&session), &session.token).is_none());
    }

    #[test]
    fn test_parse_account_list() {
        let list = format!(
            "ana:{}; rui:{}",
            hash_password("a").unwrap(),
            hash_password("b").unwrap()
        );
        let auth = StaticAuthenticator::parse(&list).unwrap();
        assert!(auth.login("ana", "a").is_some());
        assert!(auth.login("rui", "b").is_some());
        assert!(auth.login("rui", "a").is_none());

        assert!(matches!(
            StaticAuthenticator::parse("ana"),
            Err(AuthError::InvalidAccount(_))
        ));
        assert!(matches!(
            StaticAuthenticator::parse("ana:not-a-hash"),
            Err(AuthError::InvalidAccount(_))
        ));
        assert!(!StaticAuthenticator::parse("").unwrap().has_accounts());
    }

    #[test]
    fn test_session_persists_in_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = SettingsStore::open(dir.path().join("settings.json")).unwrap();
        settings
            .set(KEY_ACCOUNTS, &format!("ana:{}", hash_password("s3cret").unwrap()))
            .unwrap();

        let auth = StaticAuthenticator::from_settings(&settings).unwrap();
        assert!(auth.current_session(&settings).is_none());

        let session = auth.login("ana", "s3cret").unwrap();
        save_session(&mut settings, &session).unwrap();
        assert_eq!(auth.current_session(&settings), Some(session));

        clear_session(&mut settings).unwrap();
        assert!(auth.current_session(&settings).is_none());
    }
}
