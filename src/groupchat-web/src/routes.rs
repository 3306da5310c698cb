//! HTTP handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use groupchat_core::{DiscussionEvent, DiscussionOrchestrator, MessageView};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::page::render_index;
use crate::{ApiError, AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
        .with_state(state)
}

#[derive(Serialize)]
struct ChatResponse {
    messages: Vec<MessageView>,
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(state.roster()))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "api_key_set": state.is_configured() }))
}

/// Run the whole discussion and answer with every message at once.
async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Json<ChatResponse>, ApiError> {
    let (orchestrator, request) = state.prepare(&body)?;
    info!(rounds = request.rounds, "chat request");

    let transcript = orchestrator.run(request).await?;
    Ok(Json(ChatResponse {
        messages: MessageView::all(&transcript, &orchestrator),
    }))
}

/// Stream the discussion as Server-Sent Events, one event per step.
///
/// If the client disconnects the stream is dropped with the session inside
/// it, so no further completion calls are made.
async fn chat_stream(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let (orchestrator, request) = state.prepare(&body)?;
    info!(rounds = request.rounds, "streaming chat request");

    let session = orchestrator.start(request)?;
    let stream = session
        .into_stream()
        .map(move |event| sse_event(&orchestrator, event));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn sse_event(orchestrator: &DiscussionOrchestrator, event: DiscussionEvent) -> Result<Event, axum::Error> {
    match event {
        DiscussionEvent::Turn(turn) => Event::default()
            .event("turn")
            .json_data(MessageView::from_turn(&turn, orchestrator)),
        DiscussionEvent::RoundStarted { round, total } => Event::default()
            .event("round")
            .json_data(json!({ "round": round, "total": total })),
        DiscussionEvent::Composing { speaker, round } => {
            let emoji = orchestrator
                .roster()
                .find(&speaker)
                .and_then(|p| p.presentation.emoji.clone());
            Event::default()
                .event("composing")
                .json_data(json!({ "speaker": speaker, "emoji": emoji, "round": round }))
        }
        DiscussionEvent::Summarizing { speaker } => {
            let emoji = orchestrator.settings().summarizer.presentation.emoji.clone();
            Event::default()
                .event("summarizing")
                .json_data(json!({ "speaker": speaker, "emoji": emoji }))
        }
        DiscussionEvent::Cancelled => Event::default().event("cancelled").json_data(json!({})),
        DiscussionEvent::Finished => Event::default().event("done").json_data(json!({})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use groupchat_core::{BackendError, CompletionClient, CompletionRequest, Config};
    use serde_json::Value;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Fails every call to the "KIMI" model, answers everything else.
    struct FakeBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for FakeBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.model.contains("Kimi") {
                Err(BackendError::new("rate limited"))
            } else {
                Ok(format!("answer from {}", request.model))
            }
        }
    }

    fn app_with_backend() -> (Router, Arc<FakeBackend>) {
        let backend = Arc::new(FakeBackend {
            calls: AtomicUsize::new(0),
        });
        let state = AppState::new(&Config::default(), Some(backend.clone())).unwrap();
        (router(state), backend)
    }

    fn app_without_backend() -> Router {
        router(AppState::new(&Config::default(), None).unwrap())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_missing_key() {
        let response = app_without_backend()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "status": "ok", "api_key_set": false })
        );
    }

    #[tokio::test]
    async fn test_health_reports_configured_key() {
        let (app, _) = app_with_backend();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["api_key_set"], json!(true));
    }

    #[tokio::test]
    async fn test_index_lists_roster() {
        let response = app_without_backend()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        for name in ["DeepSeek", "KIMI", "智谱", "千问"] {
            assert!(html.contains(name), "missing {}", name);
        }
    }

    #[tokio::test]
    async fn test_chat_rejects_blank_question_without_calls() {
        let (app, backend) = app_with_backend();
        let response = app
            .oneshot(post_json("/chat", r#"{"question": "   ", "rounds": 2}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chat_rejects_missing_body() {
        let (app, _) = app_with_backend();
        let response = app.oneshot(post_json("/chat", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_without_key_is_server_error() {
        let response = app_without_backend()
            .oneshot(post_json("/chat", r#"{"question": "hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("SILICONFLOW_API_KEY"));
    }

    #[tokio::test]
    async fn test_chat_returns_all_messages() {
        let (app, backend) = app_with_backend();
        let response = app
            .oneshot(post_json("/chat", r#"{"question": "Is X true?", "rounds": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1 + 4 + 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 5);

        let types: Vec<_> = messages.iter().map(|m| m["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["user", "ai", "error", "ai", "ai", "summary"]);

        assert_eq!(messages[0]["content"], json!("Is X true?"));
        assert_eq!(messages[2]["speaker"], json!("KIMI"));
        assert_eq!(messages[2]["content"], json!("[发言失败：rate limited]"));
        assert_eq!(messages[2]["round"], json!(1));
        assert_eq!(messages[2]["emoji"], json!("🟣"));
        assert_eq!(messages[5]["speaker"], json!("主持人"));
        assert_eq!(messages[5]["color"], json!("#E74C3C"));
    }

    #[tokio::test]
    async fn test_chat_zero_rounds_only_summarizes() {
        let (app, backend) = app_with_backend();
        let response = app
            .oneshot(post_json("/chat", r#"{"question": "q", "rounds": 0}"#))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chat_rejects_too_many_rounds() {
        let (app, backend) = app_with_backend();
        let response = app
            .oneshot(post_json("/chat", r#"{"question": "q", "rounds": 500}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stream_emits_events_in_order() {
        let (app, _) = app_with_backend();
        let response = app
            .oneshot(post_json("/chat/stream", r#"{"question": "q", "rounds": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let body = body_string(response).await;
        let events: Vec<_> = body
            .lines()
            .filter_map(|line| line.strip_prefix("event: "))
            .collect();

        assert_eq!(events.first(), Some(&"turn"));
        assert_eq!(events[1], "round");
        assert_eq!(events.iter().filter(|e| **e == "composing").count(), 4);
        assert_eq!(events.iter().filter(|e| **e == "turn").count(), 1 + 4 + 1);
        assert_eq!(&events[events.len() - 3..], &["summarizing", "turn", "done"]);
        assert!(body.contains("[发言失败：rate limited]"));
    }

    #[tokio::test]
    async fn test_stream_validates_before_streaming() {
        let response = app_without_backend()
            .oneshot(post_json("/chat/stream", r#"{"question": ""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app_without_backend()
            .oneshot(post_json("/chat/stream", r#"{"question": "q"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
