//! Discussion orchestration logic.
//!
//! Drives rounds over the roster, one completion call at a time, and closes
//! with a moderator summary. Every session owns its transcript; the
//! orchestrator itself only holds shared read-only state.

use std::sync::Arc;

use futures::Stream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::completion::{CompletionClient, CompletionRequest};
use crate::config::Config;
use crate::error::{BackendError, GroupChatError};
use crate::participant::{ParticipantDescriptor, Presentation, Roster};
use crate::prompts::PromptSet;
use crate::transcript::{Transcript, Turn, TurnKind};

/// Rounds used when the caller gives none, or gives something unusable.
pub const DEFAULT_ROUNDS: u32 = 2;

/// Parse a user-supplied round count.
///
/// Absent, blank, non-numeric and negative input fall back to `default`.
/// An explicit `0` is honoured and yields a discussion with no rounds.
pub fn parse_rounds(input: Option<&str>, default: u32) -> u32 {
    match input.map(str::trim) {
        Some(text) if !text.is_empty() => text.parse::<u32>().unwrap_or(default),
        _ => default,
    }
}

/// Same policy as [`parse_rounds`] for a JSON request field.
pub fn rounds_from_json(value: Option<&Value>, default: u32) -> u32 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(default),
        Some(Value::String(s)) => parse_rounds(Some(s), default),
        _ => default,
    }
}

/// Settings shared by every session of an orchestrator.
#[derive(Debug, Clone)]
pub struct DiscussionSettings {
    /// Speaker label of the opening turn.
    pub user_label: String,
    pub summarizer: ParticipantDescriptor,
    pub prompts: PromptSet,
    pub reply_max_tokens: u32,
    pub summary_max_tokens: u32,
    pub reply_max_chars: u32,
}

impl DiscussionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            user_label: config.discussion.user_label.clone(),
            summarizer: config.summarizer.descriptor(),
            prompts: config.prompts.clone(),
            reply_max_tokens: config.discussion.reply_max_tokens,
            summary_max_tokens: config.discussion.summary_max_tokens,
            reply_max_chars: config.discussion.reply_max_chars,
        }
    }
}

impl Default for DiscussionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A question and how many rounds to discuss it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionRequest {
    pub question: String,
    pub rounds: u32,
}

impl DiscussionRequest {
    pub fn new(question: impl Into<String>, rounds: u32) -> Self {
        Self {
            question: question.into(),
            rounds,
        }
    }
}

/// Events produced while a session runs, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscussionEvent {
    /// A turn was appended to the transcript.
    Turn(Turn),
    /// A new round is starting.
    RoundStarted { round: u32, total: u32 },
    /// A participant's completion call is about to be issued.
    Composing { speaker: String, round: u32 },
    /// The moderator's summary call is about to be issued.
    Summarizing { speaker: String },
    /// The session was cancelled; no further calls will be made.
    Cancelled,
    /// Always the last event of a session.
    Finished,
}

/// Runs discussions between the roster participants.
#[derive(Clone)]
pub struct DiscussionOrchestrator {
    client: Arc<dyn CompletionClient>,
    roster: Arc<Roster>,
    settings: Arc<DiscussionSettings>,
}

impl DiscussionOrchestrator {
    pub fn new(client: Arc<dyn CompletionClient>, roster: Roster, settings: DiscussionSettings) -> Self {
        Self {
            client,
            roster: Arc::new(roster),
            settings: Arc::new(settings),
        }
    }

    /// Build an orchestrator from a loaded config and a backend client.
    pub fn from_config(client: Arc<dyn CompletionClient>, config: &Config) -> Result<Self, GroupChatError> {
        Ok(Self::new(
            client,
            config.roster()?,
            DiscussionSettings::from_config(config),
        ))
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn settings(&self) -> &DiscussionSettings {
        &self.settings
    }

    /// Validate the request and open a new session with its own transcript.
    pub fn start(&self, request: DiscussionRequest) -> Result<DiscussionSession, GroupChatError> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(GroupChatError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }

        info!(
            rounds = request.rounds,
            participants = self.roster.participants().len(),
            "starting discussion"
        );

        Ok(DiscussionSession {
            orchestrator: self.clone(),
            rounds: request.rounds,
            transcript: Transcript::open(&self.settings.user_label, question),
            step: Step::Opening,
            cancel: CancellationToken::new(),
        })
    }

    /// Run a full discussion and return its transcript.
    pub async fn run(&self, request: DiscussionRequest) -> Result<Transcript, GroupChatError> {
        let mut session = self.start(request)?;
        while session.next_event().await.is_some() {}
        Ok(session.into_transcript())
    }

    /// Display metadata for the speaker of `turn`.
    pub fn presentation_for(&self, turn: &Turn) -> Option<&Presentation> {
        match turn.kind {
            TurnKind::User => None,
            TurnKind::Reply | TurnKind::Failure => {
                self.roster.find(&turn.speaker).map(|p| &p.presentation)
            }
            TurnKind::Summary | TurnKind::SummaryFailure => Some(&self.settings.summarizer.presentation),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Opening,
    RoundStart { round: u32 },
    Composing { round: u32, index: usize },
    Speaking { round: u32, index: usize },
    Summarizing,
    Summary,
    Finishing,
    Done,
}

/// One discussion in progress.
///
/// A lazy, finite sequence of [`DiscussionEvent`]s: nothing happens until
/// [`next_event`](Self::next_event) is awaited, at most one completion call
/// is outstanding, and once exhausted it stays exhausted.
pub struct DiscussionSession {
    orchestrator: DiscussionOrchestrator,
    rounds: u32,
    transcript: Transcript,
    step: Step,
    cancel: CancellationToken,
}

impl DiscussionSession {
    /// Stop issuing completion calls once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }

    /// Advance the discussion by one event. Returns `None` once finished.
    pub async fn next_event(&mut self) -> Option<DiscussionEvent> {
        if self.cancel.is_cancelled() && !matches!(self.step, Step::Finishing | Step::Done) {
            return Some(self.cancelled());
        }

        match self.step {
            Step::Opening => {
                self.step = self.after_round(0);
                Some(DiscussionEvent::Turn(self.transcript.turns()[0].clone()))
            }
            Step::RoundStart { round } => {
                debug!(round, total = self.rounds, "round started");
                self.step = Step::Composing { round, index: 0 };
                Some(DiscussionEvent::RoundStarted {
                    round,
                    total: self.rounds,
                })
            }
            Step::Composing { round, index } => {
                self.step = Step::Speaking { round, index };
                Some(DiscussionEvent::Composing {
                    speaker: self.orchestrator.roster.participants()[index].name.clone(),
                    round,
                })
            }
            Step::Speaking { round, index } => {
                let participant = self.orchestrator.roster.participants()[index].clone();
                let request = self.participant_request(&participant);

                let Some(outcome) = self.call(&request).await else {
                    return Some(self.cancelled());
                };

                let turn = match outcome {
                    Ok(text) => {
                        debug!(speaker = %participant.name, round, "reply received");
                        Turn::reply(&participant.name, text, round)
                    }
                    Err(e) => {
                        warn!(
                            speaker = %participant.name,
                            model = %participant.model,
                            round,
                            error = %e,
                            "participant failed to respond"
                        );
                        let text = self.orchestrator.settings.prompts.failure_text(e.message());
                        Turn::failure(&participant.name, text, round)
                    }
                };

                self.transcript.push(turn.clone());
                self.step = if index + 1 < self.orchestrator.roster.participants().len() {
                    Step::Composing {
                        round,
                        index: index + 1,
                    }
                } else {
                    self.after_round(round)
                };
                Some(DiscussionEvent::Turn(turn))
            }
            Step::Summarizing => {
                self.step = Step::Summary;
                Some(DiscussionEvent::Summarizing {
                    speaker: self.orchestrator.settings.summarizer.name.clone(),
                })
            }
            Step::Summary => {
                let settings = &self.orchestrator.settings;
                let request = CompletionRequest {
                    model: settings.summarizer.model.clone(),
                    system: settings.prompts.summary_instruction(),
                    user: self.transcript.render(),
                    max_tokens: settings.summary_max_tokens,
                };

                let Some(outcome) = self.call(&request).await else {
                    return Some(self.cancelled());
                };

                let settings = &self.orchestrator.settings;
                let name = settings.summarizer.name.clone();
                let turn = match outcome {
                    Ok(text) => Turn::summary(name, text),
                    Err(e) => {
                        warn!(model = %settings.summarizer.model, error = %e, "summary failed");
                        Turn::summary_failure(name, settings.prompts.summary_failure_text(e.message()))
                    }
                };

                self.transcript.push(turn.clone());
                self.step = Step::Finishing;
                Some(DiscussionEvent::Turn(turn))
            }
            Step::Finishing => {
                info!(turns = self.transcript.len(), "discussion finished");
                self.step = Step::Done;
                Some(DiscussionEvent::Finished)
            }
            Step::Done => None,
        }
    }

    /// Adapt the session into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = DiscussionEvent> + Send + 'static {
        futures::stream::unfold(self, |mut session| async move {
            session.next_event().await.map(|event| (event, session))
        })
    }

    fn after_round(&self, round: u32) -> Step {
        if round < self.rounds {
            Step::RoundStart { round: round + 1 }
        } else {
            Step::Summarizing
        }
    }

    fn participant_request(&self, participant: &ParticipantDescriptor) -> CompletionRequest {
        let roster = &self.orchestrator.roster;
        let settings = &self.orchestrator.settings;
        let others = roster.others(&participant.name);
        CompletionRequest {
            model: participant.model.clone(),
            system: settings.prompts.participant_instruction(
                &participant.name,
                &others,
                settings.reply_max_chars,
            ),
            user: self.transcript.render(),
            max_tokens: settings.reply_max_tokens,
        }
    }

    /// Issue one completion call. `None` means the session was cancelled
    /// while waiting and the result was discarded.
    async fn call(&self, request: &CompletionRequest) -> Option<Result<String, BackendError>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.orchestrator.client.complete(request) => Some(result),
        }
    }

    fn cancelled(&mut self) -> DiscussionEvent {
        info!(turns = self.transcript.len(), "discussion cancelled");
        self.step = Step::Finishing;
        DiscussionEvent::Cancelled
    }
}
