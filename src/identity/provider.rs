use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::principal::{Credentials, Identity};
use super::session::Session;
use crate::backend::IdentityService;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user: Identity,
    pub confirmation_pending: bool,
}

/// Session/Auth Adapter over the external identity service.
///
/// No retries, no token refresh, no local password policy.
#[derive(Clone)]
pub struct AuthAdapter {
    service: Arc<dyn IdentityService>,
    pub session_ttl: Duration,
}

impl AuthAdapter {
    pub fn new(service: Arc<dyn IdentityService>, session_ttl: Duration) -> Self {
        Self { service, session_ttl }
    }

    pub async fn login(&self, creds: &Credentials) -> AppResult<Session> {
        match self.service.sign_in_with_password(creds).await {
            Ok(grant) => {
                let session = Session::issue(grant.user, grant.access_token, self.session_ttl)?;
                info!(target: "auth", user_id = %session.identity.id, "login ok");
                Ok(session)
            }
            Err(e) => {
                warn!(target: "auth", email = %creds.email, "login failed: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// Confirmation (when the service requires it) happens out of band; this never logs in.
    pub async fn signup(&self, creds: &Credentials) -> AppResult<SignUpOutcome> {
        match self.service.sign_up(creds).await {
            Ok(receipt) => {
                info!(target: "auth", user_id = %receipt.user.id, pending = receipt.confirmation_pending, "signup ok");
                Ok(SignUpOutcome { user: receipt.user, confirmation_pending: receipt.confirmation_pending })
            }
            Err(e) => {
                warn!(target: "auth", email = %creds.email, "signup failed: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// Local only; always succeeds.
    pub fn logout(&self, session: Session) {
        info!(target: "auth", user_id = %session.identity.id, "logout");
        drop(session);
    }
}
