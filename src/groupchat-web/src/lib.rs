//! Group Chat web surface.
//!
//! Serves the index page, a health check, a synchronous JSON endpoint and a
//! Server-Sent-Events endpoint. Every request runs its own discussion
//! session; only the roster and the backend client are shared.

mod page;
mod routes;

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use groupchat_core::{
    CompletionClient, Config, DiscussionOrchestrator, DiscussionRequest, GroupChatError, Roster,
    rounds_from_json,
};
use serde_json::{Value, json};

pub use routes::router;

/// Address used when neither `--bind` nor `PORT` is given.
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Pick the listen address: explicit flag, then `PORT` on all interfaces, then the default.
pub fn resolve_bind_addr(flag: Option<String>, port: Option<String>) -> String {
    if let Some(addr) = flag {
        return addr;
    }
    match port.map(|p| p.trim().to_string()) {
        Some(p) if !p.is_empty() => format!("0.0.0.0:{}", p),
        _ => DEFAULT_BIND.to_string(),
    }
}

/// Shared, read-only server state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    /// `None` when the backend credential is missing.
    orchestrator: Option<DiscussionOrchestrator>,
    roster: Roster,
    api_key_env: String,
    default_rounds: u32,
    max_rounds: u32,
}

impl AppState {
    pub fn new(
        config: &Config,
        client: Option<Arc<dyn CompletionClient>>,
    ) -> Result<Self, GroupChatError> {
        let orchestrator = client
            .map(|client| DiscussionOrchestrator::from_config(client, config))
            .transpose()?;

        Ok(Self {
            inner: Arc::new(Inner {
                orchestrator,
                roster: config.roster()?,
                api_key_env: config.backend.api_key_env.clone(),
                default_rounds: config.discussion.default_rounds,
                max_rounds: config.discussion.max_rounds,
            }),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.inner.orchestrator.is_some()
    }

    pub fn roster(&self) -> &Roster {
        &self.inner.roster
    }

    /// Validate a `{question, rounds}` body and hand back the orchestrator to run it.
    ///
    /// Input problems are reported before a missing backend credential.
    fn prepare(&self, body: &[u8]) -> Result<(DiscussionOrchestrator, DiscussionRequest), GroupChatError> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|_| GroupChatError::InvalidInput("request body must be JSON".to_string()))?;

        let question = payload
            .get("question")
            .and_then(Value::as_str)
            .ok_or_else(|| GroupChatError::InvalidInput("question is required".to_string()))?
            .trim();
        if question.is_empty() {
            return Err(GroupChatError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }

        let rounds = rounds_from_json(payload.get("rounds"), self.inner.default_rounds);
        if rounds > self.inner.max_rounds {
            return Err(GroupChatError::InvalidInput(format!(
                "rounds must be at most {}",
                self.inner.max_rounds
            )));
        }

        let orchestrator = self.inner.orchestrator.clone().ok_or_else(|| {
            GroupChatError::ConfigError(format!(
                "API key is not configured; set {}",
                self.inner.api_key_env
            ))
        })?;

        Ok((orchestrator, DiscussionRequest::new(question, rounds)))
    }
}

/// HTTP mapping of [`GroupChatError`].
#[derive(Debug)]
pub struct ApiError(GroupChatError);

impl From<GroupChatError> for ApiError {
    fn from(err: GroupChatError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            GroupChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GroupChatError::ConfigError(_) | GroupChatError::SessionError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_flag_wins() {
        assert_eq!(
            resolve_bind_addr(Some("0.0.0.0:8080".to_string()), Some("9000".to_string())),
            "0.0.0.0:8080"
        );
    }

    #[test]
    fn test_bind_from_port_env() {
        assert_eq!(resolve_bind_addr(None, Some("10000".to_string())), "0.0.0.0:10000");
    }

    #[test]
    fn test_bind_default() {
        assert_eq!(resolve_bind_addr(None, None), DEFAULT_BIND);
        assert_eq!(resolve_bind_addr(None, Some(" ".to_string())), DEFAULT_BIND);
    }

    #[test]
    fn test_prepare_validation_order() {
        let state = AppState::new(&Config::default(), None).unwrap();

        let err = state.prepare(b"not json").err().unwrap();
        assert!(matches!(err, GroupChatError::InvalidInput(_)));

        let err = state.prepare(br#"{"rounds": 2}"#).err().unwrap();
        assert!(matches!(err, GroupChatError::InvalidInput(_)));

        let err = state.prepare(br#"{"question": "  "}"#).err().unwrap();
        assert!(matches!(err, GroupChatError::InvalidInput(_)));

        let err = state.prepare(br#"{"question": "q", "rounds": 99}"#).err().unwrap();
        assert!(matches!(err, GroupChatError::InvalidInput(_)));

        let err = state.prepare(br#"{"question": "q"}"#).err().unwrap();
        assert!(matches!(err, GroupChatError::ConfigError(_)));
        assert!(err.to_string().contains("SILICONFLOW_API_KEY"));
    }
}
