//! Group Chat Core Library
//!
//! Runs a multi-round discussion between several LLM participants and a
//! closing moderator summary, independent of how the result is delivered.

pub mod completion;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod participant;
pub mod probe;
pub mod prompts;
pub mod transcript;
pub mod view;

pub use completion::{
    CompletionClient, CompletionRequest, OpenAiCompletionClient, RetryingClient,
};
pub use config::{Config, SummarizerConfig};
pub use error::{BackendError, GroupChatError};
pub use orchestrator::{
    DEFAULT_ROUNDS, DiscussionEvent, DiscussionOrchestrator, DiscussionRequest, DiscussionSession,
    DiscussionSettings, parse_rounds, rounds_from_json,
};
pub use participant::{ParticipantDescriptor, Presentation, Roster};
pub use prompts::PromptSet;
pub use transcript::{Transcript, Turn, TurnKind};
pub use view::MessageView;
