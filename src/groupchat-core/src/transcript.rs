//! Turns and the append-only transcript of one discussion session.

use serde::{Deserialize, Serialize};

/// What a turn is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// The user's opening question.
    User,
    /// A participant's successful reply.
    Reply,
    /// A participant's completion call failed; the text carries the error.
    Failure,
    /// The moderator's closing summary.
    Summary,
    /// The summary call failed; the text carries the error.
    SummaryFailure,
}

impl TurnKind {
    pub fn is_failure(self) -> bool {
        matches!(self, TurnKind::Failure | TurnKind::SummaryFailure)
    }
}

/// One contribution to the discussion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    /// Who spoke: the user label, a participant name or the summarizer name.
    pub speaker: String,
    pub text: String,
    /// Set for participant turns only.
    pub round: Option<u32>,
    pub kind: TurnKind,
}

impl Turn {
    pub fn user(label: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            speaker: label.into(),
            text: question.into(),
            round: None,
            kind: TurnKind::User,
        }
    }

    pub fn reply(speaker: impl Into<String>, text: impl Into<String>, round: u32) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            round: Some(round),
            kind: TurnKind::Reply,
        }
    }

    pub fn failure(speaker: impl Into<String>, text: impl Into<String>, round: u32) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            round: Some(round),
            kind: TurnKind::Failure,
        }
    }

    pub fn summary(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            round: None,
            kind: TurnKind::Summary,
        }
    }

    pub fn summary_failure(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            round: None,
            kind: TurnKind::SummaryFailure,
        }
    }
}

/// Ordered history of one session. The first turn is always the user's
/// question; turns are only ever appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Start a transcript seeded with the user's question.
    pub fn open(user_label: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user(user_label, question)],
        }
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Never true: a transcript always holds the question.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn question(&self) -> &str {
        &self.turns[0].text
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Turns belonging to a round, in speaking order.
    pub fn round(&self, round: u32) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(move |t| t.round == Some(round))
    }

    /// Render the whole history as the context block for the next call.
    ///
    /// Every turn is replayed verbatim; there is no windowing, so the block
    /// grows with rounds x participants.
    pub fn render(&self) -> String {
        let mut text = String::new();
        for turn in &self.turns {
            text.push_str(&turn.speaker);
            text.push('：');
            text.push_str(&turn.text);
            text.push_str("\n\n");
        }
        text
    }
}
