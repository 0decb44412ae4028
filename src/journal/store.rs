use std::sync::Arc;

use tracing::{info, warn};

use super::entry::{EntryId, EntryPatch, JournalEntry, NewEntry};
use crate::backend::{EntryService, Owner};
use crate::error::{AppError, AppResult};
use crate::identity::Session;

/// Entry Store Adapter: one request per call, scoped to the session's owner.
///
/// Ordering, filtering and id assignment are done by the service. There is no caching and no
/// conflict detection; concurrent edits from two sessions are last-write-wins.
#[derive(Clone)]
pub struct EntryStore {
    service: Arc<dyn EntryService>,
}

fn owner_of(session: &Session) -> Owner {
    Owner { user_id: session.identity.id.clone(), access_token: session.access_token.clone() }
}

impl EntryStore {
    pub fn new(service: Arc<dyn EntryService>) -> Self {
        Self { service }
    }

    pub async fn create(&self, session: &Session, entry: &NewEntry) -> AppResult<JournalEntry> {
        let row = self.service.insert(&owner_of(session), entry).await.map_err(|e| {
            warn!(target: "journal", user_id = %session.identity.id, "insert failed: {}", e);
            AppError::from(e)
        })?;
        info!(target: "journal", user_id = %session.identity.id, entry_id = row.id, "entry created");
        Ok(row)
    }

    pub async fn list(&self, session: &Session) -> AppResult<Vec<JournalEntry>> {
        self.service.select_by_owner(&owner_of(session)).await.map_err(|e| {
            warn!(target: "journal", user_id = %session.identity.id, "select failed: {}", e);
            AppError::from(e)
        })
    }

    pub async fn update(&self, session: &Session, id: EntryId, patch: &EntryPatch) -> AppResult<JournalEntry> {
        if patch.is_empty() {
            return Err(AppError::user("empty_patch", "nothing to update"));
        }
        let row = self.service.update_by_id(&owner_of(session), id, patch).await.map_err(|e| {
            warn!(target: "journal", user_id = %session.identity.id, entry_id = id, "update failed: {}", e);
            AppError::from(e)
        })?;
        info!(target: "journal", user_id = %session.identity.id, entry_id = id, "entry updated");
        Ok(row)
    }

    pub async fn delete(&self, session: &Session, id: EntryId) -> AppResult<()> {
        self.service.delete_by_id(&owner_of(session), id).await.map_err(|e| {
            warn!(target: "journal", user_id = %session.identity.id, entry_id = id, "delete failed: {}", e);
            AppError::from(e)
        })?;
        info!(target: "journal", user_id = %session.identity.id, entry_id = id, "entry deleted");
        Ok(())
    }
}
