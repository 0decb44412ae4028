//! Startup configuration.
//!
//! Everything is read from the environment (after `.env` is loaded by the binary). Lookups go
//! through a closure so tests can supply their own variables.

use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::workflow::{EditStyle, WorkflowOptions};

pub const DEFAULT_HTTP_PORT: u16 = 8501;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_TABLE: &str = "journal_entries";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Hosted identity + data service.
    Remote { url: String, key: String },
    /// In-process service; nothing leaves the process.
    Memory { auto_confirm: bool },
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Remote { .. } => "remote",
            BackendConfig::Memory { .. } => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub http_port: u16,
    pub bind: String,
    pub backend: BackendConfig,
    pub table: String,
    pub workflow: WorkflowOptions,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            bind: DEFAULT_BIND.to_string(),
            backend: BackendConfig::Memory { auto_confirm: true },
            table: DEFAULT_TABLE.to_string(),
            workflow: WorkflowOptions::default(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            secure_cookies: true,
        }
    }
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(name: &str, value: &str, expected: &str) -> AppError {
    AppError::config("invalid_setting".to_string(), format!("{}='{}' is invalid, expected {}", name, value, expected))
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |k: &str, default: bool| -> AppResult<bool> {
            match var(k) {
                Some(v) => parse_bool(&v).ok_or_else(|| invalid(k, &v, "true|false")),
                None => Ok(default),
            }
        };

        let http_port = match var("JOURNAL_HTTP_PORT") {
            Some(v) => v.parse::<u16>().map_err(|_| invalid("JOURNAL_HTTP_PORT", &v, "a port number"))?,
            None => DEFAULT_HTTP_PORT,
        };
        let backend = match var("JOURNAL_BACKEND").as_deref().unwrap_or("remote") {
            "remote" => Self::remote_backend(var("SUPABASE_URL"), var("SUPABASE_KEY"))?,
            "memory" => BackendConfig::Memory { auto_confirm: flag("JOURNAL_MEMORY_AUTOCONFIRM", true)? },
            other => return Err(invalid("JOURNAL_BACKEND", other, "remote|memory")),
        };
        let edit_style = match var("JOURNAL_EDIT_STYLE") {
            Some(v) => v.parse::<EditStyle>()?,
            None => EditStyle::default(),
        };
        let session_ttl = match var("JOURNAL_SESSION_TTL_SECS") {
            Some(v) => Duration::from_secs(v.parse::<u64>().map_err(|_| invalid("JOURNAL_SESSION_TTL_SECS", &v, "seconds"))?),
            None => Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        };

        Ok(Self {
            http_port,
            bind: var("JOURNAL_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            backend,
            table: var("JOURNAL_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            workflow: WorkflowOptions { confirm_delete: flag("JOURNAL_CONFIRM_DELETE", true)?, edit_style },
            session_ttl,
            secure_cookies: flag("JOURNAL_SECURE_COOKIE", true)?,
        })
    }

    /// The hosted backend cannot work without both settings, so refuse to start.
    pub fn remote_backend(url: Option<String>, key: Option<String>) -> AppResult<BackendConfig> {
        let url = url.ok_or_else(|| AppError::config("missing_setting", "SUPABASE_URL is not set"))?;
        let key = key.ok_or_else(|| AppError::config("missing_setting", "SUPABASE_KEY is not set"))?;
        Ok(BackendConfig::Remote { url, key })
    }
}
