//! Flat message records handed to the delivery surfaces.

use serde::Serialize;

use crate::orchestrator::DiscussionOrchestrator;
use crate::transcript::{Transcript, Turn, TurnKind};

/// One entry of the "all messages" payload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MessageView {
    pub speaker: String,
    pub content: String,
    /// `user`, `ai`, `error` or `summary`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
}

impl MessageView {
    pub fn from_turn(turn: &Turn, orchestrator: &DiscussionOrchestrator) -> Self {
        let presentation = orchestrator.presentation_for(turn);
        Self {
            speaker: turn.speaker.clone(),
            content: turn.text.clone(),
            kind: type_tag(turn.kind),
            emoji: presentation.and_then(|p| p.emoji.clone()),
            color: presentation.and_then(|p| p.color.clone()),
            round: turn.round,
        }
    }

    /// Every turn of `transcript`, in order.
    pub fn all(transcript: &Transcript, orchestrator: &DiscussionOrchestrator) -> Vec<Self> {
        transcript
            .turns()
            .iter()
            .map(|turn| Self::from_turn(turn, orchestrator))
            .collect()
    }
}

fn type_tag(kind: TurnKind) -> &'static str {
    match kind {
        TurnKind::User => "user",
        TurnKind::Reply => "ai",
        TurnKind::Failure | TurnKind::SummaryFailure => "error",
        TurnKind::Summary => "summary",
    }
}
