use serde::Serialize;

use super::options::{EditStyle, WorkflowOptions};
use crate::identity::Session;
use crate::journal::{EntryId, JournalEntry, Mood};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

/// One-shot message shown above the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(msg: impl Into<String>) -> Self { Self { level: FlashLevel::Success, message: msg.into() } }
    pub fn info(msg: impl Into<String>) -> Self { Self { level: FlashLevel::Info, message: msg.into() } }
    pub fn error(msg: impl Into<String>) -> Self { Self { level: FlashLevel::Error, message: msg.into() } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthTab {
    #[default]
    Login,
    Signup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthView {
    pub tab: AuthTab,
    /// Prefill for the email field after a failed attempt.
    pub email: String,
    pub flash: Option<Flash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryCard {
    pub id: EntryId,
    pub title: String,
    pub content: String,
    pub mood: String,
    pub created_at: String,
    pub editing: bool,
    pub confirming_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardView {
    pub email: String,
    pub csrf: String,
    pub moods: Vec<&'static str>,
    pub entries: Vec<EntryCard>,
    pub edit_style: EditStyle,
    pub confirm_delete: bool,
    pub flash: Option<Flash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewModel {
    Auth(AuthView),
    Dashboard(DashboardView),
}

impl ViewModel {
    pub fn auth(tab: AuthTab, email: impl Into<String>, flash: Option<Flash>) -> Self {
        ViewModel::Auth(AuthView { tab, email: email.into(), flash })
    }

    pub fn flash(&self) -> Option<&Flash> {
        match self {
            ViewModel::Auth(v) => v.flash.as_ref(),
            ViewModel::Dashboard(v) => v.flash.as_ref(),
        }
    }

    pub fn dashboard(&self) -> Option<&DashboardView> {
        match self {
            ViewModel::Dashboard(v) => Some(v),
            ViewModel::Auth(_) => None,
        }
    }
}

impl DashboardView {
    pub fn build(session: &Session, options: &WorkflowOptions, entries: Vec<JournalEntry>, flash: Option<Flash>) -> Self {
        let inline = options.edit_style == EditStyle::Inline;
        let entries = entries
            .into_iter()
            .map(|e| EntryCard {
                editing: inline || session.view.editing == Some(e.id),
                confirming_delete: options.confirm_delete && session.view.pending_delete == Some(e.id),
                id: e.id,
                title: e.title,
                content: e.content,
                mood: e.mood.label().to_string(),
                created_at: e.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            })
            .collect();
        Self {
            email: session.identity.email.clone(),
            csrf: session.csrf.clone(),
            moods: Mood::labels(),
            entries,
            edit_style: options.edit_style,
            confirm_delete: options.confirm_delete,
            flash,
        }
    }

    pub fn card(&self, id: EntryId) -> Option<&EntryCard> {
        self.entries.iter().find(|c| c.id == id)
    }
}
