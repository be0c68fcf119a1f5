//! HTTP client for the transcript analysis backend.
//!
//! Implements [`ChatBackend`] over the backend's REST API:
//!
//! - `POST /chat/add-transcript` index a transcript for retrieval
//! - `POST /chat/ask` general question
//! - `POST /chat/ask-rag` question answered from the indexed transcript
//! - `POST /transcript/agents/{id}` run analysis tasks (form encoded)
//! - `DELETE /chat/clear/{session_id}` drop the backend's session history

mod wire;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use vidlens_chat::{AgentType, AnalysisResult, BackendError, ChatBackend};
use vidlens_core::config::BackendConfig;
use vidlens_core::types::{SessionId, TranscriptId};

use wire::{
    AddTranscriptRequest, AgentsResponse, AskRequest, AskResponse, ErrorResponse, SuccessResponse,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`ChatBackend`] backed by the analysis service's REST API.
///
/// Per-call time limits are applied by the orchestrator; the client itself
/// only bounds connection setup.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Http(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(http, &config.base_url))
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| BackendError::Http(format!("invalid base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::Http(format!("base URL cannot take a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and decode a JSON body from a successful response.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, BackendError> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        if status.is_client_error() {
            if let Ok(error) = serde_json::from_str::<ErrorResponse>(&body) {
                tracing::warn!(status = status.as_u16(), detail = %error.detail, "{} rejected", what);
                return Err(BackendError::Rejected(error.detail));
            }
        }
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "{} failed", what);
            return Err(BackendError::Status(status.as_u16()));
        }

        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn ingest_transcript(&self, transcript_id: &TranscriptId) -> Result<bool, BackendError> {
        tracing::debug!(transcript_id = %transcript_id, "POST /chat/add-transcript");
        let request = self
            .http
            .post(self.endpoint(&["chat", "add-transcript"])?)
            .json(&AddTranscriptRequest {
                transcript_id: transcript_id.as_str(),
            });
        let response: SuccessResponse = self.send(request, "transcript ingestion").await?;
        Ok(response.success)
    }

    async fn ask_general(
        &self,
        session_id: SessionId,
        question: &str,
        include_history: bool,
    ) -> Result<String, BackendError> {
        let request = self.http.post(self.endpoint(&["chat", "ask"])?).json(&AskRequest {
            session_id: session_id.to_string(),
            question,
            include_history,
        });
        let response: AskResponse = self.send(request, "general question").await?;
        Ok(response.response)
    }

    async fn ask_retrieval(
        &self,
        session_id: SessionId,
        question: &str,
        include_history: bool,
    ) -> Result<String, BackendError> {
        let request = self.http.post(self.endpoint(&["chat", "ask-rag"])?).json(&AskRequest {
            session_id: session_id.to_string(),
            question,
            include_history,
        });
        let response: AskResponse = self.send(request, "transcript question").await?;
        Ok(response.response)
    }

    async fn run_analysis_tasks(
        &self,
        transcript_id: &TranscriptId,
        task_types: &[AgentType],
    ) -> Result<HashMap<AgentType, AnalysisResult>, BackendError> {
        let form: Vec<(&str, &str)> = task_types
            .iter()
            .map(|t| ("task_type", t.task_name()))
            .collect();
        tracing::debug!(transcript_id = %transcript_id, tasks = ?form, "POST /transcript/agents");

        let request = self
            .http
            .post(self.endpoint(&["transcript", "agents", transcript_id.as_str()])?)
            .form(&form);
        let response: AgentsResponse = self.send(request, "analysis tasks").await?;
        Ok(response.results.into_map())
    }

    async fn clear_history(&self, session_id: SessionId) -> Result<bool, BackendError> {
        let session = session_id.to_string();
        let request = self
            .http
            .delete(self.endpoint(&["chat", "clear", session.as_str()])?);
        let response: SuccessResponse = self.send(request, "history clear").await?;
        Ok(response.success)
    }
}
