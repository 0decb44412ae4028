//! HTTP client for the hosted service.
//!
//! Identity calls go to `auth/v1/*`, data calls to `rest/v1/<table>` using the service's
//! filter syntax (`col=eq.value`, `order=col.desc`). Every request carries the project API key;
//! data requests use the signed-in user's access token as bearer when one is available.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AuthGrant, BackendError, EntryService, IdentityService, Owner, SignUpReceipt};
use crate::identity::{Credentials, Identity};
use crate::journal::{EntryId, EntryPatch, JournalEntry, Mood, NewEntry};

const AUTH_TOKEN_PATH: &str = "auth/v1/token";
const AUTH_SIGNUP_PATH: &str = "auth/v1/signup";
const REST_PATH: &str = "rest/v1";

#[derive(Clone)]
pub struct ServiceClient {
    base: Url,
    key: String,
    table: String,
    client: Client,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceFault {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<String>,
    #[serde(default)]
    confirmed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: ServiceUser,
}

// Sign-up answers with a full session when the project auto-confirms, else with the bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session { access_token: String, user: ServiceUser },
    User(ServiceUser),
}

#[derive(Serialize)]
struct InsertRow<'a> {
    title: &'a str,
    content: &'a str,
    mood: Mood,
    user_id: &'a str,
}

impl ServiceUser {
    fn into_identity(self, fallback_email: &str) -> Identity {
        Identity { id: self.id, email: self.email.unwrap_or_else(|| fallback_email.to_string()) }
    }
}

/// Pull a human readable message out of an error body; the two service halves use different shapes.
fn describe(status: StatusCode, body: &str) -> (Option<String>, String) {
    let fault: ServiceFault = serde_json::from_str(body).unwrap_or_default();
    let message = fault
        .msg
        .or(fault.error_description)
        .or(fault.message)
        .or(fault.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.trim().to_string()
            }
        });
    (fault.error_code, message)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

impl ServiceClient {
    pub fn new(url: &str, key: &str, table: &str) -> Result<Self, BackendError> {
        if url.trim().is_empty() {
            return Err(BackendError::Misconfigured("service URL is not set".into()));
        }
        if key.trim().is_empty() {
            return Err(BackendError::Misconfigured("service API key is not set".into()));
        }
        let mut base = Url::parse(url.trim())
            .map_err(|e| BackendError::Misconfigured(format!("invalid service URL '{}': {}", url, e)))?;
        // Keep any path prefix when joining relative endpoints
        if !base.path().ends_with('/') {
            let p = format!("{}/", base.path());
            base.set_path(&p);
        }
        let client = Client::builder().build()?;
        Ok(Self { base, key: key.trim().to_string(), table: table.to_string(), client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base.join(path).map_err(|e| BackendError::Misconfigured(format!("bad endpoint {}: {}", path, e)))
    }

    fn table_url(&self) -> Result<Url, BackendError> {
        self.endpoint(&format!("{}/{}", REST_PATH, self.table))
    }

    fn with_keys(&self, req: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        req.header("apikey", self.key.as_str()).bearer_auth(bearer.unwrap_or(&self.key))
    }

    async fn read_rows(resp: Response) -> Result<Vec<JournalEntry>, BackendError> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let (_, message) = describe(status, &body);
            return Err(match status.as_u16() {
                401 => BackendError::Unauthorized(message),
                404 => BackendError::NotFound(message),
                s => BackendError::Rejected { status: s, message },
            });
        }
        decode(&body)
    }
}

#[async_trait]
impl IdentityService for ServiceClient {
    async fn sign_in_with_password(&self, creds: &Credentials) -> Result<AuthGrant, BackendError> {
        let url = self.endpoint(AUTH_TOKEN_PATH)?;
        debug!(target: "backend", email = %creds.email, "sign_in_with_password");
        let resp = self
            .with_keys(self.client.post(url), None)
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({"email": creds.email, "password": creds.password}))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let (code, message) = describe(status, &body);
            let unconfirmed = code.as_deref() == Some("email_not_confirmed")
                || message.to_ascii_lowercase().contains("not confirmed");
            return Err(match status.as_u16() {
                400 | 401 if !unconfirmed => BackendError::InvalidCredentials(message),
                s => BackendError::Rejected { status: s, message },
            });
        }
        let token: TokenResponse = decode(&body)?;
        Ok(AuthGrant { user: token.user.into_identity(&creds.email), access_token: Some(token.access_token) })
    }

    async fn sign_up(&self, creds: &Credentials) -> Result<SignUpReceipt, BackendError> {
        let url = self.endpoint(AUTH_SIGNUP_PATH)?;
        debug!(target: "backend", email = %creds.email, "sign_up");
        let resp = self
            .with_keys(self.client.post(url), None)
            .json(&serde_json::json!({"email": creds.email, "password": creds.password}))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let (_, message) = describe(status, &body);
            return Err(BackendError::Rejected { status: status.as_u16(), message });
        }
        Ok(match decode::<SignUpResponse>(&body)? {
            SignUpResponse::Session { user, .. } => {
                SignUpReceipt { user: user.into_identity(&creds.email), confirmation_pending: false }
            }
            SignUpResponse::User(user) => {
                let pending = user.email_confirmed_at.is_none() && user.confirmed_at.is_none();
                SignUpReceipt { user: user.into_identity(&creds.email), confirmation_pending: pending }
            }
        })
    }
}

#[async_trait]
impl EntryService for ServiceClient {
    async fn insert(&self, owner: &Owner, entry: &NewEntry) -> Result<JournalEntry, BackendError> {
        let url = self.table_url()?;
        let row = InsertRow { title: &entry.title, content: &entry.content, mood: entry.mood, user_id: &owner.user_id };
        let resp = self
            .with_keys(self.client.post(url), owner.access_token.as_deref())
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        Self::read_rows(resp)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode("insert returned no row".into()))
    }

    async fn select_by_owner(&self, owner: &Owner) -> Result<Vec<JournalEntry>, BackendError> {
        let url = self.table_url()?;
        let query = [("select", "*".to_string()), ("user_id", eq(&owner.user_id)), ("order", "id.desc".to_string())];
        let resp = self
            .with_keys(self.client.get(url), owner.access_token.as_deref())
            .query(&query)
            .send()
            .await?;
        Self::read_rows(resp).await
    }

    async fn update_by_id(&self, owner: &Owner, id: EntryId, patch: &EntryPatch) -> Result<JournalEntry, BackendError> {
        let url = self.table_url()?;
        let resp = self
            .with_keys(self.client.patch(url), owner.access_token.as_deref())
            .query(&[("id", eq(id)), ("user_id", eq(&owner.user_id))])
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;
        Self::read_rows(resp)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("entry {} not found", id)))
    }

    async fn delete_by_id(&self, owner: &Owner, id: EntryId) -> Result<(), BackendError> {
        let url = self.table_url()?;
        let resp = self
            .with_keys(self.client.delete(url), owner.access_token.as_deref())
            .query(&[("id", eq(id)), ("user_id", eq(&owner.user_id))])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        if Self::read_rows(resp).await?.is_empty() {
            return Err(BackendError::NotFound(format!("entry {} not found", id)));
        }
        Ok(())
    }
}
