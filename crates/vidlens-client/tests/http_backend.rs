//! Integration tests for `HttpBackend` against an in-process axum server.
//!
//! The server mimics the analysis backend's routes and records every request
//! so tests can check both directions of the wire contract.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use vidlens_chat::{AgentType, AnalysisResult, BackendError, ChatBackend};
use vidlens_client::HttpBackend;
use vidlens_core::types::TranscriptId;

// =============================================================================
// Helpers
// =============================================================================

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Recorded {
    fn push(&self, route: &str, body: Value) {
        self.requests
            .lock()
            .unwrap()
            .push((route.to_string(), body));
    }

    fn last(&self) -> (String, Value) {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

async fn add_transcript(State(rec): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    let ok = body["transcript_id"] != "broken";
    rec.push("add-transcript", body);
    Json(json!({"success": ok, "message": "Transcript added to vector store"}))
}

async fn ask(State(rec): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    let answer = format!("general: {}", body["question"].as_str().unwrap_or_default());
    rec.push("ask", body);
    Json(json!({"response": answer}))
}

async fn ask_rag(State(rec): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    rec.push("ask-rag", body);
    Json(json!({"response": "from transcript", "sources": []}))
}

async fn agents(
    State(rec): State<Recorded>,
    Path(id): Path<String>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if id == "missing" {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Transcript not found"})),
        ));
    }
    let tasks: Vec<String> = fields.into_iter().map(|(_, v)| v).collect();
    rec.push("agents", json!({"id": id, "tasks": tasks}));

    let mut results = serde_json::Map::new();
    for task in &tasks {
        match task.as_str() {
            "summarize" => {
                results.insert("summary".into(), json!("A short talk."));
            }
            "highlight" => {
                results.insert(
                    "highlights".into(),
                    json!([{"timestamp": "00:00:05", "text": "Hello", "reason": "opening"}]),
                );
            }
            // The violation agent produced nothing.
            _ => {
                results.insert("violations".into(), Value::Null);
            }
        }
    }
    Ok(Json(json!({"id": id, "tasks": tasks, "results": results})))
}

async fn clear(State(rec): State<Recorded>, Path(session_id): Path<String>) -> Json<Value> {
    rec.push("clear", json!({"session_id": session_id}));
    Json(json!({"success": true, "message": "Chat history cleared"}))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

/// Start the mock backend on an ephemeral port.
async fn start_server() -> (HttpBackend, Recorded) {
    let recorded = Recorded::default();
    let api = Router::new()
        .route("/chat/add-transcript", post(add_transcript))
        .route("/chat/ask", post(ask))
        .route("/chat/ask-rag", post(ask_rag))
        .route("/transcript/agents/{id}", post(agents))
        .route("/chat/clear/{session_id}", delete(clear))
        .with_state(recorded.clone());
    let app = Router::new()
        .nest("/api", api)
        .route("/broken/chat/ask", post(broken));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let backend = HttpBackend::with_client(reqwest::Client::new(), &format!("http://{}/api", addr));
    (backend, recorded)
}

// =============================================================================
// Ingestion
// =============================================================================

#[tokio::test]
async fn test_ingest_transcript_sends_id() {
    let (backend, rec) = start_server().await;
    let ok = backend
        .ingest_transcript(&TranscriptId::new("t-42"))
        .await
        .unwrap();
    assert!(ok);
    let (route, body) = rec.last();
    assert_eq!(route, "add-transcript");
    assert_eq!(body, json!({"transcript_id": "t-42"}));
}

#[tokio::test]
async fn test_ingest_transcript_reports_backend_failure_flag() {
    let (backend, _) = start_server().await;
    let ok = backend
        .ingest_transcript(&TranscriptId::new("broken"))
        .await
        .unwrap();
    assert!(!ok);
}

// =============================================================================
// Questions
// =============================================================================

#[tokio::test]
async fn test_ask_general_body_and_answer() {
    let (backend, rec) = start_server().await;
    let session = Uuid::new_v4();
    let answer = backend.ask_general(session, "hello", true).await.unwrap();
    assert_eq!(answer, "general: hello");

    let (route, body) = rec.last();
    assert_eq!(route, "ask");
    assert_eq!(body["session_id"], session.to_string());
    assert_eq!(body["question"], "hello");
    assert_eq!(body["include_history"], true);
}

#[tokio::test]
async fn test_ask_retrieval_uses_rag_route() {
    let (backend, rec) = start_server().await;
    let answer = backend
        .ask_retrieval(Uuid::new_v4(), "what is said at 2:00?", false)
        .await
        .unwrap();
    assert_eq!(answer, "from transcript");
    let (route, body) = rec.last();
    assert_eq!(route, "ask-rag");
    assert_eq!(body["include_history"], false);
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let (backend, _) = start_server().await;
    let broken = HttpBackend::with_client(
        reqwest::Client::new(),
        &backend.base_url().replace("/api", "/broken"),
    );
    let err = broken
        .ask_general(Uuid::new_v4(), "hi", true)
        .await
        .unwrap_err();
    assert_eq!(err, BackendError::Status(500));
}

#[tokio::test]
async fn test_unreachable_backend_is_http_error() {
    let backend = HttpBackend::with_client(reqwest::Client::new(), "http://127.0.0.1:9/api");
    let err = backend
        .ask_general(Uuid::new_v4(), "hi", true)
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Http(_)));
}

// =============================================================================
// Analysis tasks
// =============================================================================

#[tokio::test]
async fn test_run_analysis_tasks_form_fields_and_results() {
    let (backend, rec) = start_server().await;
    let results = backend
        .run_analysis_tasks(
            &TranscriptId::new("t-1"),
            &[AgentType::Summarize, AgentType::Highlight, AgentType::Violation],
        )
        .await
        .unwrap();

    let (route, body) = rec.last();
    assert_eq!(route, "agents");
    assert_eq!(body["id"], "t-1");
    assert_eq!(body["tasks"], json!(["summarize", "highlight", "violation"]));

    // The null violations entry is not authoritative and is skipped.
    assert_eq!(results.len(), 2);
    assert_eq!(
        results.get(&AgentType::Summarize),
        Some(&AnalysisResult::Summary("A short talk.".to_string()))
    );
    assert!(matches!(
        results.get(&AgentType::Highlight),
        Some(AnalysisResult::Highlights(items)) if items.len() == 1
    ));
    assert!(!results.contains_key(&AgentType::Violation));
}

#[tokio::test]
async fn test_run_analysis_tasks_encodes_transcript_id() {
    let (backend, rec) = start_server().await;
    backend
        .run_analysis_tasks(&TranscriptId::new("talk/1?x#y"), &[AgentType::Summarize])
        .await
        .unwrap();
    let (route, body) = rec.last();
    assert_eq!(route, "agents");
    assert_eq!(body["id"], "talk/1?x#y");
    assert_eq!(body["tasks"], json!(["summarize"]));
}

#[tokio::test]
async fn test_run_analysis_tasks_rejected_with_detail() {
    let (backend, _) = start_server().await;
    let err = backend
        .run_analysis_tasks(&TranscriptId::new("missing"), &[AgentType::Summarize])
        .await
        .unwrap_err();
    assert_eq!(err, BackendError::Rejected("Transcript not found".to_string()));
}

// =============================================================================
// History
// =============================================================================

#[tokio::test]
async fn test_clear_history_uses_session_path() {
    let (backend, rec) = start_server().await;
    let session = Uuid::new_v4();
    assert!(backend.clear_history(session).await.unwrap());
    let (route, body) = rec.last();
    assert_eq!(route, "clear");
    assert_eq!(body["session_id"], session.to_string());
}
