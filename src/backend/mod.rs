//! Seam to the hosted identity + tabular data service.
//!
//! Two traits mirror the two service surfaces the application consumes. `remote` talks to the
//! hosted service over HTTP; `memory` is an in-process stand-in with the same observable
//! semantics, used by tests and offline development.

mod memory;
mod remote;

use async_trait::async_trait;
use thiserror::Error;

use crate::identity::{Credentials, Identity};
use crate::journal::{EntryId, EntryPatch, JournalEntry, NewEntry};

pub use memory::MemoryBackend;
pub use remote::ServiceClient;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected service response: {0}")]
    Decode(String),

    #[error("{0}")]
    Misconfigured(String),
}

/// Result of a successful password sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub user: Identity,
    pub access_token: Option<String>,
}

/// Result of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpReceipt {
    pub user: Identity,
    /// True when the account cannot be used until the emailed link is followed.
    pub confirmation_pending: bool,
}

/// Who a data request is made for. Every query is filtered on `user_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub user_id: String,
    pub access_token: Option<String>,
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_in_with_password(&self, creds: &Credentials) -> Result<AuthGrant, BackendError>;
    async fn sign_up(&self, creds: &Credentials) -> Result<SignUpReceipt, BackendError>;
}

#[async_trait]
pub trait EntryService: Send + Sync {
    async fn insert(&self, owner: &Owner, entry: &NewEntry) -> Result<JournalEntry, BackendError>;
    /// All rows for the owner, newest (highest id) first.
    async fn select_by_owner(&self, owner: &Owner) -> Result<Vec<JournalEntry>, BackendError>;
    async fn update_by_id(&self, owner: &Owner, id: EntryId, patch: &EntryPatch) -> Result<JournalEntry, BackendError>;
    async fn delete_by_id(&self, owner: &Owner, id: EntryId) -> Result<(), BackendError>;
}
