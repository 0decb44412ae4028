use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// How an entry switches into edit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditStyle {
    /// An Edit button opens the form for one entry at a time.
    #[default]
    Toggle,
    /// Every expanded entry shows its edit form.
    Inline,
}

impl FromStr for EditStyle {
    type Err = AppError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "toggle" => Ok(EditStyle::Toggle),
            "inline" => Ok(EditStyle::Inline),
            other => Err(AppError::config("invalid_edit_style".to_string(), format!("unknown edit style '{}', expected toggle|inline", other))),
        }
    }
}

/// The behavioural switches between the two page flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowOptions {
    /// Ask before deleting.
    pub confirm_delete: bool,
    pub edit_style: EditStyle,
}

impl Default for WorkflowOptions {
    fn default() -> Self { Self::classic() }
}

impl WorkflowOptions {
    pub fn classic() -> Self {
        Self { confirm_delete: true, edit_style: EditStyle::Toggle }
    }

    pub fn streamlined() -> Self {
        Self { confirm_delete: false, edit_style: EditStyle::Inline }
    }
}
