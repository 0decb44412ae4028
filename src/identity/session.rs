use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use tracing::debug;

use super::principal::Identity;
use crate::error::{AppError, AppResult};
use crate::journal::EntryId;

pub type SessionToken = String;

/// Per-session view state that survives between interactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub editing: Option<EntryId>,
    pub pending_delete: Option<EntryId>,
}

/// Authenticated context for one browser. Passed into and returned from workflow steps.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionToken,
    pub csrf: String,
    pub identity: Identity,
    /// Bearer token from the identity service, used for data requests.
    pub access_token: Option<String>,
    pub issued_at: Instant,
    pub expires_at: Instant,
    pub view: ViewState,
}

fn gen_id() -> AppResult<String> {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AppError::internal("rng_unavailable".to_string(), e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

impl Session {
    pub fn issue(identity: Identity, access_token: Option<String>, ttl: Duration) -> AppResult<Self> {
        let now = Instant::now();
        Ok(Self {
            session_id: gen_id()?,
            csrf: gen_id()?,
            identity,
            access_token,
            issued_at: now,
            expires_at: now + ttl,
            view: ViewState::default(),
        })
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }

    pub fn csrf_matches(&self, provided: &str) -> bool {
        !provided.is_empty() && self.csrf == provided
    }
}

/// Process-local table of live sessions, keyed by cookie token. Nothing is persisted.
pub struct SessionStore {
    pub ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, Session>>,
}

impl Default for SessionStore {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()) }
    }

    /// Look up a live session; expired ones are dropped on the way.
    pub fn get(&self, token: &str) -> Option<Session> {
        let expired = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(s) if !s.is_expired() => return Some(s.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.sessions.write().remove(token);
            debug!(target: "auth", "session expired");
        }
        None
    }

    /// Store a freshly issued session.
    pub fn insert(&self, session: &Session) {
        let mut map = self.sessions.write();
        map.retain(|_, s| !s.is_expired());
        map.insert(session.session_id.clone(), session.clone());
    }

    /// Replace the stored copy of a session that is still live. A session removed (logout,
    /// expiry) while a request held a copy stays removed; returns false in that case.
    pub fn update(&self, session: &Session) -> bool {
        let mut map = self.sessions.write();
        match map.get_mut(&session.session_id) {
            Some(stored) if !stored.is_expired() => {
                *stored = session.clone();
                true
            }
            Some(_) => {
                map.remove(&session.session_id);
                false
            }
            None => false,
        }
    }

    pub fn remove(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn who() -> Identity {
        Identity { id: "u-1".into(), email: "a@example.com".into() }
    }

    #[test]
    fn issue_generates_distinct_tokens() {
        let a = Session::issue(who(), None, Duration::from_secs(60)).unwrap();
        let b = Session::issue(who(), None, Duration::from_secs(60)).unwrap();
        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.session_id, a.csrf);
        assert_eq!(a.session_id.len(), 43);
    }

    #[test]
    fn insert_update_get_remove() {
        let store = SessionStore::default();
        let mut s = Session::issue(who(), Some("jwt".into()), store.ttl).unwrap();
        store.insert(&s);
        assert_eq!(store.get(&s.session_id).unwrap().identity, who());

        s.view.editing = Some(4);
        assert!(store.update(&s));
        assert_eq!(store.get(&s.session_id).unwrap().view.editing, Some(4));

        assert!(store.remove(&s.session_id));
        assert!(store.get(&s.session_id).is_none());
        assert!(!store.remove(&s.session_id));
    }

    #[test]
    fn update_does_not_revive_a_removed_session() {
        let store = SessionStore::default();
        let s = Session::issue(who(), None, store.ttl).unwrap();
        store.insert(&s);
        let mut in_flight = store.get(&s.session_id).unwrap();

        assert!(store.remove(&s.session_id));
        in_flight.view.editing = Some(1);
        assert!(!store.update(&in_flight));
        assert!(store.get(&s.session_id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn expired_sessions_are_not_returned() {
        let store = SessionStore::new(Duration::from_secs(0));
        let s = Session::issue(who(), None, store.ttl).unwrap();
        store.insert(&s);
        assert!(store.get(&s.session_id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn csrf_requires_exact_non_empty_match() {
        let s = Session::issue(who(), None, Duration::from_secs(60)).unwrap();
        let token = s.csrf.clone();
        assert!(s.csrf_matches(&token));
        assert!(!s.csrf_matches(""));
        assert!(!s.csrf_matches("nope"));
    }
}
