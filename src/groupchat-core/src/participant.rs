//! Participant definitions and the roster.
//!
//! The roster is fixed at startup and shared read-only between sessions.

use serde::{Deserialize, Serialize};

use crate::error::GroupChatError;

/// Display metadata carried through to the delivery surfaces.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Presentation {
    /// Icon shown next to the speaker (usually an emoji).
    pub emoji: Option<String>,
    /// CSS color used by the web page.
    pub color: Option<String>,
}

/// An AI participant in the discussion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantDescriptor {
    /// Display name, unique within the roster.
    pub name: String,
    /// Backend model identifier (e.g., "deepseek-ai/DeepSeek-V3").
    pub model: String,
    #[serde(flatten)]
    pub presentation: Presentation,
}

impl ParticipantDescriptor {
    /// Create a new participant with the given name and model.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            presentation: Presentation::default(),
        }
    }

    /// Set the icon.
    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.presentation.emoji = Some(emoji.into());
        self
    }

    /// Set the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.presentation.color = Some(color.into());
        self
    }

    /// Name prefixed with the icon, if any.
    pub fn label(&self) -> String {
        match &self.presentation.emoji {
            Some(emoji) => format!("{} {}", emoji, self.name),
            None => self.name.clone(),
        }
    }
}

/// The ordered list of participants. Registry order is turn order.
#[derive(Debug, Clone)]
pub struct Roster {
    participants: Vec<ParticipantDescriptor>,
}

impl Roster {
    /// Build a roster, rejecting empty rosters, duplicate names and blank model ids.
    pub fn new(participants: Vec<ParticipantDescriptor>) -> Result<Self, GroupChatError> {
        if participants.is_empty() {
            return Err(GroupChatError::ConfigError(
                "roster must contain at least one participant".to_string(),
            ));
        }

        for (i, p) in participants.iter().enumerate() {
            if p.name.trim().is_empty() {
                return Err(GroupChatError::ConfigError(format!(
                    "participant #{} has an empty name",
                    i + 1
                )));
            }
            if p.model.trim().is_empty() {
                return Err(GroupChatError::ConfigError(format!(
                    "participant '{}' has an empty model id",
                    p.name
                )));
            }
            if participants[..i].iter().any(|other| other.name == p.name) {
                return Err(GroupChatError::ConfigError(format!(
                    "duplicate participant name '{}'",
                    p.name
                )));
            }
        }

        Ok(Self { participants })
    }

    pub fn participants(&self) -> &[ParticipantDescriptor] {
        &self.participants
    }

    pub fn find(&self, name: &str) -> Option<&ParticipantDescriptor> {
        self.participants.iter().find(|p| p.name == name)
    }

    /// Names of everyone except `speaker`, in roster order.
    pub fn others(&self, speaker: &str) -> Vec<&str> {
        self.participants
            .iter()
            .filter(|p| p.name != speaker)
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.participants.iter().map(|p| p.name.as_str()).collect()
    }
}
