use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_SLACK_HANDLE_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: i64,
    pub name: String,
    pub slack_handle: Option<String>,
    pub active: bool,
    pub date_added: NaiveDateTime,
}

/// Payload for creating or updating a team member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberForm {
    pub name: String,
    #[serde(default)]
    pub slack_handle: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl TeamMemberForm {
    /// Trimmed slack handle, `None` when absent or blank.
    pub fn normalized_slack_handle(&self) -> Option<String> {
        self.slack_handle
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push("Name is required".to_string());
        }
        if name.chars().count() > MAX_NAME_LEN {
            errors.push(format!("Name must be less than {} characters", MAX_NAME_LEN));
        }

        if let Some(handle) = self.normalized_slack_handle() {
            if handle.len() > MAX_SLACK_HANDLE_LEN {
                errors.push(format!(
                    "Slack handle must be less than {} characters",
                    MAX_SLACK_HANDLE_LEN
                ));
            }
            if !is_valid_slack_handle(&handle) {
                errors.push("Slack handle format is invalid (should start with @)".to_string());
            }
        }

        errors
    }
}

/// `@` followed by at least one of `[A-Za-z0-9._-]`.
pub fn is_valid_slack_handle(handle: &str) -> bool {
    match handle.strip_prefix('@') {
        Some(rest) if !rest.is_empty() => rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')),
        _ => false,
    }
}
