use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub type EntryId = i64;

/// Fixed mood label set. Stored and transmitted as the label text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mood {
    Happy,
    Sad,
    Angry,
    Neutral,
}

impl Mood {
    pub const ALL: [Mood; 4] = [Mood::Happy, Mood::Sad, Mood::Angry, Mood::Neutral];

    pub fn label(&self) -> &'static str {
        match self {
            Mood::Happy => "😊 Happy",
            Mood::Sad => "😢 Sad",
            Mood::Angry => "😤 Angry",
            Mood::Neutral => "😐 Neutral",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Angry => "angry",
            Mood::Neutral => "neutral",
        }
    }

    pub fn labels() -> Vec<&'static str> {
        Mood::ALL.iter().map(|m| m.label()).collect()
    }
}

impl Display for Mood {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mood {
    type Err = AppError;

    /// Accepts the full label or the bare name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        Mood::ALL
            .into_iter()
            .find(|m| m.label() == t || m.name().eq_ignore_ascii_case(t))
            .ok_or_else(|| AppError::user("invalid_mood".to_string(), format!("unknown mood '{}'", t)))
    }
}

impl TryFrom<String> for Mood {
    type Error = AppError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl From<Mood> for String {
    fn from(m: Mood) -> Self { m.label().to_string() }
}

/// One stored journal row, as returned by the data service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub mood: Mood,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the author when creating an entry. The owner comes from the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
    pub mood: Mood,
}

impl NewEntry {
    pub fn new(title: impl Into<String>, content: impl Into<String>, mood: Mood) -> Self {
        Self { title: title.into(), content: content.into(), mood }
    }

    /// Build from raw form text. Only the mood is checked, everything else is passed through.
    pub fn from_form(title: &str, content: &str, mood: &str) -> Result<Self, AppError> {
        Ok(Self { title: title.trim().to_string(), content: content.to_string(), mood: mood.parse()? })
    }
}

/// Partial update. Absent fields are not sent and keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
}

impl EntryPatch {
    pub fn from_form(title: Option<&str>, content: Option<&str>, mood: Option<&str>) -> Result<Self, AppError> {
        let mood = match mood {
            Some(m) => Some(m.parse()?),
            None => None,
        };
        Ok(Self { title: title.map(|t| t.trim().to_string()), content: content.map(str::to_string), mood })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.mood.is_none()
    }

    pub fn apply_to(&self, entry: &mut JournalEntry) {
        if let Some(t) = &self.title { entry.title = t.clone(); }
        if let Some(c) = &self.content { entry.content = c.clone(); }
        if let Some(m) = self.mood { entry.mood = m; }
    }
}
