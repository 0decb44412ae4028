//! The journal page as explicit state transitions.
//!
//! Every user interaction is an [`Action`]. [`Workflow::handle`] takes the current session (if
//! any) by value and returns a [`Transition`]: the session to keep (or `None` to drop it), the
//! view model to render, and the error that interrupted the step, if one did. Nothing is kept in
//! ambient state; the caller decides where the returned session lives.
//!
//! The two page flavours differ only in [`WorkflowOptions`]: whether deletes ask for
//! confirmation and whether editing is toggled per entry or always open.

mod options;
mod view;

use tracing::debug;

use crate::error::AppError;
use crate::identity::{AuthAdapter, Credentials, Session};
use crate::journal::{EntryId, EntryPatch, EntryStore, NewEntry};

pub use options::{EditStyle, WorkflowOptions};
pub use view::{AuthTab, AuthView, DashboardView, EntryCard, Flash, FlashLevel, ViewModel};

const LOGIN_REQUIRED: &str = "Please log in to continue.";
const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";

/// Raw create-form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryForm {
    pub title: String,
    pub content: String,
    pub mood: String,
}

/// Raw edit-form fields; `None` means the field was not submitted and stays as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchForm {
    pub title: Option<String>,
    pub content: Option<String>,
    pub mood: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Action {
    Login(Credentials),
    SignUp(Credentials),
    Logout,
    Create(EntryForm),
    BeginEdit(EntryId),
    CancelEdit,
    SaveEdit(EntryId, PatchForm),
    RequestDelete(EntryId),
    ConfirmDelete(EntryId),
    CancelDelete,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Login(_) => "login",
            Action::SignUp(_) => "signup",
            Action::Logout => "logout",
            Action::Create(_) => "create",
            Action::BeginEdit(_) => "begin_edit",
            Action::CancelEdit => "cancel_edit",
            Action::SaveEdit(..) => "save_edit",
            Action::RequestDelete(_) => "request_delete",
            Action::ConfirmDelete(_) => "confirm_delete",
            Action::CancelDelete => "cancel_delete",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub session: Option<Session>,
    pub view: ViewModel,
    pub error: Option<AppError>,
}

type Outcome = (Option<Flash>, Option<AppError>);

fn failed(prefix: &str, e: AppError) -> Outcome {
    (Some(Flash::error(format!("{}: {}", prefix, e.message()))), Some(e))
}

pub struct Workflow {
    auth: AuthAdapter,
    entries: EntryStore,
    options: WorkflowOptions,
}

impl Workflow {
    pub fn new(auth: AuthAdapter, entries: EntryStore, options: WorkflowOptions) -> Self {
        Self { auth, entries, options }
    }

    /// Plain page load.
    pub async fn view(&self, session: Option<Session>, tab: AuthTab) -> Transition {
        match session {
            Some(s) => self.dashboard(s, (None, None)).await,
            None => Transition { session: None, view: ViewModel::auth(tab, "", None), error: None },
        }
    }

    pub async fn handle(&self, session: Option<Session>, action: Action) -> Transition {
        debug!(target: "workflow", action = action.name(), has_session = session.is_some(), "handle");
        let action = match action {
            Action::Login(creds) => return self.login(session, creds).await,
            Action::SignUp(creds) => return self.signup(session, creds).await,
            Action::Logout => return self.logout(session),
            other => other,
        };
        let Some(session) = session else {
            return Transition {
                session: None,
                view: ViewModel::auth(AuthTab::Login, "", Some(Flash::error(LOGIN_REQUIRED))),
                error: Some(AppError::auth("login_required", LOGIN_REQUIRED)),
            };
        };
        self.protected(session, action).await
    }

    /// Re-render the dashboard for a request refused before it reached an action.
    pub async fn reject(&self, session: Session, error: AppError) -> Transition {
        let flash = Flash::error(error.message());
        self.dashboard(session, (Some(flash), Some(error))).await
    }

    async fn login(&self, prior: Option<Session>, creds: Credentials) -> Transition {
        // A new login always replaces whatever session the browser had
        if let Some(old) = prior {
            self.auth.logout(old);
        }
        match self.auth.login(&creds).await {
            Ok(session) => self.dashboard(session, (Some(Flash::success("✅ Logged in successfully!")), None)).await,
            Err(e) => Transition {
                session: None,
                view: ViewModel::auth(AuthTab::Login, creds.email, Some(Flash::error(format!("Login failed: {}", e.message())))),
                error: Some(e),
            },
        }
    }

    async fn signup(&self, session: Option<Session>, creds: Credentials) -> Transition {
        let (tab, outcome) = match self.auth.signup(&creds).await {
            Ok(o) if o.confirmation_pending => {
                (AuthTab::Login, (Some(Flash::success("✅ Account created. Please check your email to confirm.")), None))
            }
            Ok(_) => (AuthTab::Login, (Some(Flash::success("✅ Account created. You can log in now.")), None)),
            Err(e) => (AuthTab::Signup, failed("Signup failed", e)),
        };
        match session {
            Some(s) => self.dashboard(s, outcome).await,
            None => Transition { session: None, view: ViewModel::auth(tab, creds.email, outcome.0), error: outcome.1 },
        }
    }

    fn logout(&self, session: Option<Session>) -> Transition {
        let flash = session.map(|s| {
            self.auth.logout(s);
            Flash::info("You have been logged out.")
        });
        Transition { session: None, view: ViewModel::auth(AuthTab::Login, "", flash), error: None }
    }

    async fn protected(&self, mut session: Session, action: Action) -> Transition {
        let outcome: Outcome = match action {
            Action::Create(form) => match NewEntry::from_form(&form.title, &form.content, &form.mood) {
                Ok(entry) => match self.entries.create(&session, &entry).await {
                    Ok(_) => (Some(Flash::success("✅ Entry saved!")), None),
                    Err(e) => failed("Error saving entry", e),
                },
                Err(e) => failed("Error saving entry", e),
            },
            Action::BeginEdit(id) => {
                if self.options.edit_style == EditStyle::Toggle {
                    session.view.editing = Some(id);
                    session.view.pending_delete = None;
                }
                (None, None)
            }
            Action::CancelEdit => {
                session.view.editing = None;
                (None, None)
            }
            Action::SaveEdit(id, form) => {
                let patch = EntryPatch::from_form(form.title.as_deref(), form.content.as_deref(), form.mood.as_deref());
                let saved = match patch {
                    Ok(p) => self.entries.update(&session, id, &p).await,
                    Err(e) => Err(e),
                };
                match saved {
                    Ok(_) => {
                        session.view.editing = None;
                        (Some(Flash::success("✅ Entry updated!")), None)
                    }
                    Err(e) => failed("Error updating entry", e),
                }
            }
            Action::RequestDelete(id) if self.options.confirm_delete => {
                session.view.pending_delete = Some(id);
                (None, None)
            }
            Action::RequestDelete(id) | Action::ConfirmDelete(id) => self.delete(&mut session, id).await,
            Action::CancelDelete => {
                session.view.pending_delete = None;
                (None, None)
            }
            Action::Login(_) | Action::SignUp(_) | Action::Logout => (None, None),
        };
        self.dashboard(session, outcome).await
    }

    async fn delete(&self, session: &mut Session, id: EntryId) -> Outcome {
        session.view.pending_delete = None;
        match self.entries.delete(session, id).await {
            Ok(()) => {
                if session.view.editing == Some(id) {
                    session.view.editing = None;
                }
                (Some(Flash::success("🗑️ Entry deleted.")), None)
            }
            Err(e) => failed("Error deleting entry", e),
        }
    }

    /// Re-list the owner's entries and build the dashboard, the equivalent of a full rerun.
    ///
    /// The data service refusing the session's access token ends the session.
    async fn dashboard(&self, session: Session, outcome: Outcome) -> Transition {
        let (mut flash, mut error) = outcome;
        let listed = self.entries.list(&session).await;
        if let Some(e) = listed.as_ref().err().or(error.as_ref()).filter(|e| matches!(e, AppError::Auth { .. })) {
            debug!(target: "workflow", code = e.code_str(), "access token refused; ending session");
            self.auth.logout(session);
            return Transition {
                session: None,
                view: ViewModel::auth(AuthTab::Login, "", Some(Flash::error(SESSION_EXPIRED))),
                error: Some(AppError::auth("session_expired", SESSION_EXPIRED)),
            };
        }
        let entries = match listed {
            Ok(rows) => rows,
            Err(e) => {
                if !matches!(flash, Some(Flash { level: FlashLevel::Error, .. })) {
                    flash = Some(Flash::error(format!("Error fetching entries: {}", e.message())));
                }
                error = error.or(Some(e));
                Vec::new()
            }
        };
        let view = ViewModel::Dashboard(DashboardView::build(&session, &self.options, entries, flash));
        Transition { session: Some(session), view, error }
    }
}
