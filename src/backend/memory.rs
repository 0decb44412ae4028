//! In-process stand-in for the hosted service.
//!
//! Accounts are argon2-hashed, ids and timestamps are assigned here the way the hosted
//! service assigns them, and every data call is filtered on the owner's `user_id`.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use parking_lot::RwLock;
use password_hash::{PasswordHash, SaltString};
use tracing::debug;

use super::{AuthGrant, BackendError, EntryService, IdentityService, Owner, SignUpReceipt};
use crate::identity::{Credentials, Identity};
use crate::journal::{EntryId, EntryPatch, JournalEntry, NewEntry};

const MIN_PASSWORD_LEN: usize = 6;

/// Access token lifetime, matching the hosted service's default JWT expiry.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct Account {
    id: String,
    email: String,
    password_hash: String,
    confirmed: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Lowercased email -> account
    accounts: HashMap<String, Account>,
    rows: BTreeMap<EntryId, JournalEntry>,
    next_id: EntryId,
    tokens: HashMap<String, IssuedToken>,
}

#[derive(Debug, Clone)]
struct IssuedToken {
    user_id: String,
    expires_at: Instant,
}

pub struct MemoryBackend {
    auto_confirm: bool,
    token_ttl: Duration,
    state: RwLock<MemoryState>,
}

impl Default for MemoryBackend {
    fn default() -> Self { Self::new(true) }
}

fn hash_password(password: &str) -> Result<String, BackendError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| BackendError::Rejected { status: 500, message: e.to_string() })?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| BackendError::Rejected { status: 500, message: e.to_string() })?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| BackendError::Rejected { status: 500, message: e.to_string() })?
        .to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

fn gen_token() -> Result<String, BackendError> {
    let mut buf = [0u8; 24];
    getrandom::getrandom(&mut buf).map_err(|e| BackendError::Rejected { status: 500, message: e.to_string() })?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

fn invalid_credentials() -> BackendError {
    BackendError::InvalidCredentials("Invalid login credentials".into())
}

impl MemoryBackend {
    /// `auto_confirm = false` leaves new accounts unusable until [`MemoryBackend::confirm_email`].
    pub fn new(auto_confirm: bool) -> Self {
        Self {
            auto_confirm,
            token_ttl: DEFAULT_TOKEN_TTL,
            state: RwLock::new(MemoryState { next_id: 1, ..Default::default() }),
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Stands in for the user following the emailed confirmation link.
    pub fn confirm_email(&self, email: &str) -> bool {
        let mut st = self.state.write();
        match st.accounts.get_mut(&email.trim().to_lowercase()) {
            Some(acct) => { acct.confirmed = true; true }
            None => false,
        }
    }

    pub fn row_count(&self) -> usize {
        self.state.read().rows.len()
    }

    /// Tokens still held; expired ones are dropped at the next sign-in.
    pub fn token_count(&self) -> usize {
        self.state.read().tokens.len()
    }

    // The hosted service rejects a bearer token it did not issue, or one issued to someone else.
    fn check_owner(st: &MemoryState, owner: &Owner) -> Result<(), BackendError> {
        match owner.access_token.as_deref() {
            None => Ok(()),
            Some(tok) => match st.tokens.get(tok) {
                Some(t) if t.user_id != owner.user_id => Err(BackendError::Unauthorized("invalid JWT".into())),
                Some(t) if t.expires_at <= Instant::now() => Err(BackendError::Unauthorized("JWT expired".into())),
                Some(_) => Ok(()),
                None => Err(BackendError::Unauthorized("invalid JWT".into())),
            },
        }
    }
}

#[async_trait]
impl IdentityService for MemoryBackend {
    async fn sign_in_with_password(&self, creds: &Credentials) -> Result<AuthGrant, BackendError> {
        let key = creds.email.trim().to_lowercase();
        let acct = self.state.read().accounts.get(&key).cloned().ok_or_else(invalid_credentials)?;
        if !verify_password(&acct.password_hash, &creds.password) {
            return Err(invalid_credentials());
        }
        if !acct.confirmed {
            return Err(BackendError::Rejected { status: 400, message: "Email not confirmed".into() });
        }
        let token = gen_token()?;
        {
            let now = Instant::now();
            let mut st = self.state.write();
            st.tokens.retain(|_, t| t.expires_at > now);
            st.tokens.insert(token.clone(), IssuedToken { user_id: acct.id.clone(), expires_at: now + self.token_ttl });
        }
        debug!(target: "backend", user_id = %acct.id, "memory sign-in");
        Ok(AuthGrant { user: Identity { id: acct.id, email: acct.email }, access_token: Some(token) })
    }

    async fn sign_up(&self, creds: &Credentials) -> Result<SignUpReceipt, BackendError> {
        let email = creds.email.trim();
        let at = email.find('@');
        if !matches!(at, Some(i) if i > 0 && i + 1 < email.len()) {
            return Err(BackendError::Rejected { status: 422, message: "Unable to validate email address: invalid format".into() });
        }
        if creds.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BackendError::Rejected {
                status: 422,
                message: format!("Password should be at least {} characters.", MIN_PASSWORD_LEN),
            });
        }
        let key = email.to_lowercase();
        if self.state.read().accounts.contains_key(&key) {
            return Err(BackendError::Rejected { status: 422, message: "User already registered".into() });
        }
        // Hash outside the lock
        let password_hash = hash_password(&creds.password)?;
        let acct = Account { id: uuid::Uuid::new_v4().to_string(), email: email.to_string(), password_hash, confirmed: self.auto_confirm };
        {
            let mut st = self.state.write();
            if st.accounts.contains_key(&key) {
                return Err(BackendError::Rejected { status: 422, message: "User already registered".into() });
            }
            st.accounts.insert(key, acct.clone());
        }
        debug!(target: "backend", user_id = %acct.id, "memory sign-up");
        Ok(SignUpReceipt {
            user: Identity { id: acct.id, email: acct.email },
            confirmation_pending: !self.auto_confirm,
        })
    }
}

#[async_trait]
impl EntryService for MemoryBackend {
    async fn insert(&self, owner: &Owner, entry: &NewEntry) -> Result<JournalEntry, BackendError> {
        let mut st = self.state.write();
        Self::check_owner(&st, owner)?;
        let id = st.next_id;
        st.next_id += 1;
        let row = JournalEntry {
            id,
            user_id: owner.user_id.clone(),
            title: entry.title.clone(),
            content: entry.content.clone(),
            mood: entry.mood,
            created_at: Utc::now(),
        };
        st.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn select_by_owner(&self, owner: &Owner) -> Result<Vec<JournalEntry>, BackendError> {
        let st = self.state.read();
        Self::check_owner(&st, owner)?;
        Ok(st.rows.values().rev().filter(|r| r.user_id == owner.user_id).cloned().collect())
    }

    async fn update_by_id(&self, owner: &Owner, id: EntryId, patch: &EntryPatch) -> Result<JournalEntry, BackendError> {
        let mut st = self.state.write();
        Self::check_owner(&st, owner)?;
        match st.rows.get_mut(&id) {
            Some(row) if row.user_id == owner.user_id => {
                patch.apply_to(row);
                Ok(row.clone())
            }
            _ => Err(BackendError::NotFound(format!("entry {} not found", id))),
        }
    }

    async fn delete_by_id(&self, owner: &Owner, id: EntryId) -> Result<(), BackendError> {
        let mut st = self.state.write();
        Self::check_owner(&st, owner)?;
        let owned = st.rows.get(&id).is_some_and(|row| row.user_id == owner.user_id);
        if !owned {
            return Err(BackendError::NotFound(format!("entry {} not found", id)));
        }
        st.rows.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
