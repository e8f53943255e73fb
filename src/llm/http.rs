//! JSON-over-HTTP language service.
//!
//! Endpoints:
//! - `POST {base}/v1/transcribe` returns `{"text": ...}`
//! - `POST {base}/v1/extract` returns an [`Extraction`]
//! - `POST {base}/v1/draft` returns a [`DraftedScript`]

use crate::error::{PodsynthError, Result};
use crate::job::{Document, ScriptSettings};
use crate::llm::{
    DocumentText, DraftedScript, Extraction, KnowledgeExtractor, PageTranscriber, ScriptDrafter,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
}

impl HttpLlmClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PodsynthError::Other(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// POST `body` and decode the JSON reply. Failures are reported as plain
    /// strings so each caller can wrap them in its own error variant.
    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> std::result::Result<T, String> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("request to {url} failed: {e}"))?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("{url} returned {status}: {}", detail.trim()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| format!("invalid response from {url}: {e}"))
    }
}

#[async_trait::async_trait]
impl PageTranscriber for HttpLlmClient {
    async fn transcribe_page(
        &self,
        document: &Document,
        page: usize,
        image: &str,
    ) -> Result<String> {
        let body = json!({
            "document": document.name,
            "page": page,
            "image": image,
        });
        let reply: TranscribeResponse =
            self.post("/v1/transcribe", body)
                .await
                .map_err(|message| PodsynthError::Transcription {
                    document: document.id.clone(),
                    page,
                    message,
                })?;
        Ok(reply.text)
    }
}

#[async_trait::async_trait]
impl KnowledgeExtractor for HttpLlmClient {
    async fn extract(&self, documents: &[DocumentText]) -> Result<Extraction> {
        self.post("/v1/extract", json!({ "documents": documents }))
            .await
            .map_err(|message| PodsynthError::Extraction { message })
    }
}

#[async_trait::async_trait]
impl ScriptDrafter for HttpLlmClient {
    async fn draft(
        &self,
        documents: &[DocumentText],
        knowledge: &serde_json::Value,
        settings: &ScriptSettings,
        language: Option<&str>,
    ) -> Result<DraftedScript> {
        let body = json!({
            "documents": documents,
            "knowledge": knowledge,
            "settings": settings,
            "language": language,
        });
        self.post("/v1/draft", body)
            .await
            .map_err(|message| PodsynthError::Draft { message })
    }
}
