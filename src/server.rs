//!
//! moodjournal HTTP server
//! -----------------------
//! Axum front end for the journal workflow. Every form post is mapped to a workflow
//! [`Action`]; the returned [`Transition`] decides what is stored in the session table, which
//! cookie is sent back and which page is rendered.
//!
//! Responsibilities:
//! - Session management with an HttpOnly cookie + per-session CSRF token.
//! - Login/signup/logout and entry create/edit/delete form endpoints.
//! - HTML rendering of view models (see `render`).
//! - Graceful shutdown on Ctrl+C / SIGTERM.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use anyhow::Context;
use serde::Deserialize;
use tokio::signal;
use tracing::{debug, info, warn};

use crate::backend::{EntryService, IdentityService, MemoryBackend, ServiceClient};
use crate::config::{BackendConfig, Config};
use crate::error::{AppError, AppResult};
use crate::identity::{AuthAdapter, Credentials, Session, SessionStore};
use crate::journal::{EntryId, EntryStore};
use crate::workflow::{Action, AuthTab, EntryForm, Flash, PatchForm, Transition, ViewModel, Workflow};

mod render;

pub use render::Renderer;

pub const SESSION_COOKIE: &str = "journal_session";

const SESSION_ENDED: &str = "Your session has ended. Please log in again.";

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<Workflow>,
    pub sessions: Arc<SessionStore>,
    renderer: Arc<Renderer>,
    secure_cookies: bool,
}

impl AppState {
    /// Wire the configured backend into a workflow.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let (identity, entries): (Arc<dyn IdentityService>, Arc<dyn EntryService>) = match &config.backend {
            BackendConfig::Remote { url, key } => {
                let client = Arc::new(ServiceClient::new(url, key, &config.table)?);
                info!(target: "startup", url = %client.base_url(), table = %config.table, "using hosted backend");
                (client.clone(), client)
            }
            BackendConfig::Memory { auto_confirm } => {
                let mem = Arc::new(MemoryBackend::new(*auto_confirm));
                warn!(target: "startup", auto_confirm = *auto_confirm, "using in-memory backend; data is lost on exit");
                (mem.clone(), mem)
            }
        };
        Self::with_services(identity, entries, config)
    }

    pub fn with_services(identity: Arc<dyn IdentityService>, entries: Arc<dyn EntryService>, config: &Config) -> AppResult<Self> {
        let auth = AuthAdapter::new(identity, config.session_ttl);
        let workflow = Workflow::new(auth, EntryStore::new(entries), config.workflow);
        Ok(Self {
            workflow: Arc::new(workflow),
            sessions: Arc::new(SessionStore::new(config.session_ttl)),
            renderer: Arc::new(Renderer::new()?),
            secure_cookies: config.secure_cookies,
        })
    }

    /// Cookie token (if sent) and the live session it names (if any).
    fn lookup(&self, headers: &HeaderMap) -> (Option<String>, Option<Session>) {
        let token = parse_cookie(headers, SESSION_COOKIE);
        let session = token.as_deref().and_then(|t| self.sessions.get(t));
        (token, session)
    }

    /// Persist the transition's session, fix up the cookie and render the page.
    ///
    /// A session that arrived with the request is only written back while it is still stored,
    /// so a logout that finished while this request was in flight stays in effect.
    fn respond(&self, prior: Option<String>, mut t: Transition) -> Response {
        let mut headers = HeaderMap::new();
        let carried = match &t.session {
            Some(s) if prior.as_deref() == Some(s.session_id.as_str()) => Some(self.sessions.update(s)),
            _ => None,
        };
        if carried == Some(false) {
            debug!(target: "http", "session ended while the request was in flight");
            t = Transition {
                session: None,
                view: ViewModel::auth(AuthTab::Login, "", Some(Flash::error(SESSION_ENDED))),
                error: Some(AppError::auth("session_ended", SESSION_ENDED)),
            };
        }
        match &t.session {
            Some(s) => {
                if carried.is_none() {
                    self.sessions.insert(s);
                    if let Some(old) = &prior {
                        self.sessions.remove(old);
                    }
                    if let Some(v) = set_session_cookie(&s.session_id, self.secure_cookies) {
                        headers.insert(header::SET_COOKIE, v);
                    }
                }
            }
            None => {
                if let Some(old) = &prior {
                    self.sessions.remove(old);
                    if let Some(v) = clear_session_cookie(self.secure_cookies) {
                        headers.insert(header::SET_COOKIE, v);
                    }
                }
            }
        }
        let status = t.error.as_ref().map(AppError::status_code).unwrap_or(StatusCode::OK);
        if let Some(e) = t.error.as_ref().filter(|_| status.is_server_error()) {
            tracing::error!(target: "http", status = status.as_u16(), error = %e, "request failed");
        }
        match self.renderer.render(&t.view) {
            Ok(body) => (status, headers, Html(body)).into_response(),
            Err(e) => {
                tracing::error!(target: "http", error = %e, "render failed");
                (headers, e).into_response()
            }
        }
    }

    /// Run a session-bound action after checking the form's CSRF token.
    async fn guarded(&self, headers: &HeaderMap, csrf: &str, action: Action) -> Response {
        let (token, session) = self.lookup(headers);
        let t = match session {
            Some(s) if !s.csrf_matches(csrf) => {
                warn!(target: "http", action = action.name(), "csrf token mismatch");
                let err = AppError::csrf("csrf_mismatch", "Request blocked: the form was stale or forged. Please try again.");
                self.workflow.reject(s, err).await
            }
            session => self.workflow.handle(session, action).await,
        };
        self.respond(token, t)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "ok" }))
        .route("/csrf", get(get_csrf))
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route("/logout", post(logout))
        .route("/entries", post(create_entry))
        .route("/entries/{id}", post(save_entry))
        .route("/entries/{id}/edit", post(begin_edit))
        .route("/entries/{id}/cancel", post(cancel_edit))
        .route("/entries/{id}/delete", post(request_delete))
        .route("/entries/{id}/delete/confirm", post(confirm_delete))
        .route("/entries/{id}/delete/cancel", post(cancel_delete))
        .with_state(state)
}

/// Build the configured app and serve it until Ctrl+C / SIGTERM.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config).context("While wiring the backend")?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind((config.bind.as_str(), config.http_port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.bind, config.http_port))?;
    info!(target: "startup", addr = %listener.local_addr()?, backend = config.backend.kind(), "Starting server");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!(target: "startup", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(target: "startup", "Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!(target: "startup", "Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
                info!(target: "startup", "Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(target: "startup", "Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(header::COOKIE) {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name && !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

fn cookie_attrs(secure: bool) -> &'static str {
    if secure { "HttpOnly; Secure; SameSite=Strict; Path=/" } else { "HttpOnly; SameSite=Strict; Path=/" }
}

fn set_session_cookie(sid: &str, secure: bool) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{}={}; {}", SESSION_COOKIE, sid, cookie_attrs(secure))).ok()
}

fn clear_session_cookie(secure: bool) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; {}",
        SESSION_COOKIE,
        cookie_attrs(secure)
    ))
    .ok()
}

#[derive(Debug, Deserialize)]
struct TabQuery {
    tab: Option<String>,
}

#[derive(Deserialize)]
struct CredentialsForm {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct CsrfForm {
    #[serde(default)]
    csrf: String,
}

#[derive(Debug, Deserialize)]
struct CreateForm {
    #[serde(default)]
    csrf: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    mood: String,
}

#[derive(Debug, Deserialize)]
struct EditForm {
    #[serde(default)]
    csrf: String,
    title: Option<String>,
    content: Option<String>,
    mood: Option<String>,
}

async fn index(State(state): State<AppState>, headers: HeaderMap, Query(q): Query<TabQuery>) -> Response {
    let tab = match q.tab.as_deref() {
        Some("signup") => AuthTab::Signup,
        _ => AuthTab::Login,
    };
    let (token, session) = state.lookup(&headers);
    let t = state.workflow.view(session, tab).await;
    state.respond(token, t)
}

async fn get_csrf(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    // Must be logged in to fetch CSRF token
    match state.lookup(&headers).1 {
        Some(s) => (StatusCode::OK, Json(serde_json::json!({"status":"ok","csrf": s.csrf}))),
        None => (StatusCode::UNAUTHORIZED, Json(serde_json::json!({"status":"unauthorized"}))),
    }
}

async fn login(State(state): State<AppState>, headers: HeaderMap, Form(f): Form<CredentialsForm>) -> Response {
    let (token, session) = state.lookup(&headers);
    let t = state.workflow.handle(session, Action::Login(Credentials::new(f.email, f.password))).await;
    state.respond(token, t)
}

async fn signup(State(state): State<AppState>, headers: HeaderMap, Form(f): Form<CredentialsForm>) -> Response {
    let (token, session) = state.lookup(&headers);
    let t = state.workflow.handle(session, Action::SignUp(Credentials::new(f.email, f.password))).await;
    state.respond(token, t)
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (token, session) = state.lookup(&headers);
    debug!(target: "http", had_session = session.is_some(), "logout");
    let t = state.workflow.handle(session, Action::Logout).await;
    state.respond(token, t)
}

async fn create_entry(State(state): State<AppState>, headers: HeaderMap, Form(f): Form<CreateForm>) -> Response {
    let form = EntryForm { title: f.title, content: f.content, mood: f.mood };
    state.guarded(&headers, &f.csrf, Action::Create(form)).await
}

async fn save_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<EntryId>,
    Form(f): Form<EditForm>,
) -> Response {
    let patch = PatchForm { title: f.title, content: f.content, mood: f.mood };
    state.guarded(&headers, &f.csrf, Action::SaveEdit(id, patch)).await
}

async fn begin_edit(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<EntryId>, Form(f): Form<CsrfForm>) -> Response {
    state.guarded(&headers, &f.csrf, Action::BeginEdit(id)).await
}

async fn cancel_edit(State(state): State<AppState>, headers: HeaderMap, Path(_id): Path<EntryId>, Form(f): Form<CsrfForm>) -> Response {
    state.guarded(&headers, &f.csrf, Action::CancelEdit).await
}

async fn request_delete(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<EntryId>, Form(f): Form<CsrfForm>) -> Response {
    state.guarded(&headers, &f.csrf, Action::RequestDelete(id)).await
}

async fn confirm_delete(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<EntryId>, Form(f): Form<CsrfForm>) -> Response {
    state.guarded(&headers, &f.csrf, Action::ConfirmDelete(id)).await
}

async fn cancel_delete(State(state): State<AppState>, headers: HeaderMap, Path(_id): Path<EntryId>, Form(f): Form<CsrfForm>) -> Response {
    state.guarded(&headers, &f.csrf, Action::CancelDelete).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cookie_picks_named_pair() {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_static("theme=dark; journal_session=abc123; other=1"));
        assert_eq!(parse_cookie(&h, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(parse_cookie(&h, "missing"), None);
    }

    #[test]
    fn session_cookie_flags() {
        let v = set_session_cookie("sid", true).unwrap();
        let s = v.to_str().unwrap();
        assert!(s.starts_with("journal_session=sid;"));
        assert!(s.contains("HttpOnly") && s.contains("Secure") && s.contains("SameSite=Strict"));
        let v = set_session_cookie("sid", false).unwrap();
        assert!(!v.to_str().unwrap().contains("Secure"));
        assert!(clear_session_cookie(true).unwrap().to_str().unwrap().contains("Max-Age=0"));
    }

    fn memory_state() -> AppState {
        let config = Config { backend: BackendConfig::Memory { auto_confirm: true }, secure_cookies: false, ..Config::default() };
        AppState::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn in_flight_request_does_not_revive_logged_out_session() {
        let state = memory_state();
        let creds = || Credentials::new("u@example.com", "hunter22");
        state.workflow.handle(None, Action::SignUp(creds())).await;
        let t = state.workflow.handle(None, Action::Login(creds())).await;
        let sid = t.session.as_ref().unwrap().session_id.clone();
        state.respond(None, t);

        // a create picks up its copy of the session, then a logout completes first
        let copy = state.sessions.get(&sid).unwrap();
        let form = EntryForm { title: "late".into(), content: String::new(), mood: "happy".into() };
        let pending = state.workflow.handle(Some(copy), Action::Create(form)).await;
        let out = state.workflow.handle(state.sessions.get(&sid), Action::Logout).await;
        state.respond(Some(sid.clone()), out);
        assert!(state.sessions.get(&sid).is_none());

        let resp = state.respond(Some(sid.clone()), pending);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
        assert!(state.sessions.get(&sid).is_none());
    }

    #[tokio::test]
    async fn carried_session_keeps_view_state_without_new_cookie() {
        let state = memory_state();
        let creds = || Credentials::new("v@example.com", "hunter22");
        state.workflow.handle(None, Action::SignUp(creds())).await;
        let t = state.workflow.handle(None, Action::Login(creds())).await;
        let sid = t.session.as_ref().unwrap().session_id.clone();
        assert!(state.respond(None, t).headers().get(header::SET_COOKIE).is_some());

        let t = state.workflow.handle(state.sessions.get(&sid), Action::BeginEdit(7)).await;
        let resp = state.respond(Some(sid.clone()), t);
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(state.sessions.get(&sid).unwrap().view.editing, Some(7));
    }
}
