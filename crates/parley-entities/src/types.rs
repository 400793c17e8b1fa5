//! Shared enums stored as text columns
//!
//! NOTE: all enums use db_type = "Text" for SQLite compatibility.

use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use utoipa::ToSchema;

/// Visitor presence status
///
/// Activity pings may only relax `Offline`/`Away` into `Idle`; they never
/// overwrite an active status. Stronger transitions go through explicit
/// status sets or the hand-off path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum VisitorStatus {
    #[sea_orm(string_value = "online")]
    Online,
    #[sea_orm(string_value = "idle")]
    Idle,
    #[sea_orm(string_value = "away")]
    Away,
    #[sea_orm(string_value = "offline")]
    Offline,
    #[sea_orm(string_value = "waiting_for_agent")]
    WaitingForAgent,
}

impl VisitorStatus {
    /// True for statuses an inferred activity update must not downgrade
    pub fn is_engaged(&self) -> bool {
        matches!(
            self,
            VisitorStatus::Online | VisitorStatus::Idle | VisitorStatus::WaitingForAgent
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitorStatus::Online => "online",
            VisitorStatus::Idle => "idle",
            VisitorStatus::Away => "away",
            VisitorStatus::Offline => "offline",
            VisitorStatus::WaitingForAgent => "waiting_for_agent",
        }
    }
}

impl Display for VisitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Widget UI state reported by the embedded snippet
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum WidgetState {
    #[sea_orm(string_value = "minimized")]
    Minimized,
    #[sea_orm(string_value = "maximized")]
    Maximized,
}

/// Who authored a message turn
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    #[sea_orm(string_value = "visitor")]
    Visitor,
    #[sea_orm(string_value = "agent")]
    Agent,
    #[sea_orm(string_value = "ai")]
    Ai,
    #[sea_orm(string_value = "system")]
    System,
}

/// Message content kind
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[sea_orm(string_value = "text")]
    Text,
    #[sea_orm(string_value = "image")]
    Image,
    #[sea_orm(string_value = "file")]
    File,
    #[sea_orm(string_value = "system")]
    System,
    #[sea_orm(string_value = "ai_suggestion")]
    AiSuggestion,
}

/// Agent account status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum AgentAccountStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "suspended")]
    Suspended,
}

/// Agent presence as reported by the dashboard
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum AgentPresence {
    #[sea_orm(string_value = "online")]
    Online,
    #[sea_orm(string_value = "away")]
    Away,
    #[sea_orm(string_value = "offline")]
    Offline,
}

/// What initiated a hand-off
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum HandoffTrigger {
    /// The AI engine detected the visitor wants a human
    #[sea_orm(string_value = "ai")]
    Ai,
    /// The visitor explicitly requested an agent
    #[sea_orm(string_value = "visitor_request")]
    VisitorRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engaged_statuses() {
        assert!(VisitorStatus::Online.is_engaged());
        assert!(VisitorStatus::Idle.is_engaged());
        assert!(VisitorStatus::WaitingForAgent.is_engaged());
        assert!(!VisitorStatus::Away.is_engaged());
        assert!(!VisitorStatus::Offline.is_engaged());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&VisitorStatus::WaitingForAgent).unwrap();
        assert_eq!(json, "\"waiting_for_agent\"");
        let back: VisitorStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VisitorStatus::WaitingForAgent);
    }
}
