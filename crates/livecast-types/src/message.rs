//! Viewer chat log entries and revenue figures.
//!
//! The chat log is a display record for the audience. It is separate from
//! the interrupt queue: nothing here reaches the narration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Variant of a chat log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Normal,
    Superchat,
    Gift,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Superchat => "superchat",
            Self::Gift => "gift",
        }
    }
}

impl std::str::FromStr for MessageKind {
    type Err = crate::ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "superchat" => Ok(Self::Superchat),
            "gift" => Ok(Self::Gift),
            _ => Err(crate::ParseLabelError(s.to_string())),
        }
    }
}

/// A gift attached to a chat log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    pub gift_key: String,
    pub gift_name: String,
    /// Value of a single unit.
    pub value: i64,
    pub quantity: i64,
}

impl Gift {
    pub fn total_value(&self) -> f64 {
        (self.value as f64) * (self.quantity as f64)
    }
}

/// One entry in the viewer chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub avatar_color: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gift: Option<Gift>,
}

impl ChatMessage {
    /// Creates an entry stamped with a fresh id and the current time.
    pub fn new(
        username: impl Into<String>,
        avatar_color: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            username: username.into(),
            avatar_color: avatar_color.into(),
            kind,
            content: None,
            amount: None,
            pinned: None,
            gift: None,
        }
    }
}

/// Money received through superchats and gifts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueTotals {
    pub superchat: f64,
    pub gifts: f64,
}

impl RevenueTotals {
    pub fn total(&self) -> f64 {
        self.superchat + self.gifts
    }
}
