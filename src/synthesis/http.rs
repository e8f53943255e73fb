//! JSON-over-HTTP speech synthesis provider.
//!
//! Talks to a service exposing:
//! - `POST {base}/v1/speech` for one voice
//! - `POST {base}/v1/dialogue` for a two-speaker exchange
//!
//! Both respond with either a WAV container or raw PCM16 mono at the
//! requested sample rate.

use crate::audio::wav::decode_provider_audio;
use crate::error::{PodsynthError, Result};
use crate::synthesis::provider::{
    DialogueRequest, SpeechRequest, SynthesizedAudio, Synthesizer,
};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    sample_rate: u32,
}

impl HttpSynthesizer {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        sample_rate: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PodsynthError::Other(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            sample_rate,
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<SynthesizedAudio> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PodsynthError::synthesis(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(PodsynthError::synthesis(format!(
                "{url} returned {status}: {}",
                detail.trim()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PodsynthError::synthesis(format!("failed to read audio body: {e}")))?;
        if bytes.is_empty() {
            return Err(PodsynthError::synthesis(format!("{url} returned no audio")));
        }

        let audio = decode_provider_audio(bytes.to_vec(), self.sample_rate)?;
        Ok(SynthesizedAudio {
            reported_duration: Some(audio.duration_seconds()),
            audio,
        })
    }
}

#[async_trait::async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize_single(&self, request: &SpeechRequest) -> Result<SynthesizedAudio> {
        self.post("/v1/speech", speech_body(request, self.sample_rate))
            .await
    }

    async fn synthesize_dialogue(&self, request: &DialogueRequest) -> Result<SynthesizedAudio> {
        self.post("/v1/dialogue", dialogue_body(request, self.sample_rate))
            .await
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn speech_body(request: &SpeechRequest, sample_rate: u32) -> serde_json::Value {
    json!({
        "text": request.text,
        "voice": request.voice,
        "language": request.language,
        "sample_rate_hz": sample_rate,
        "format": "pcm16",
    })
}

fn dialogue_body(request: &DialogueRequest, sample_rate: u32) -> serde_json::Value {
    let mut speakers: Vec<serde_json::Value> = Vec::new();
    for line in &request.lines {
        if !speakers.iter().any(|s| s["label"] == line.label.as_str()) {
            speakers.push(json!({ "label": line.label, "voice": line.voice }));
        }
    }
    let lines: Vec<serde_json::Value> = request
        .lines
        .iter()
        .map(|l| json!({ "speaker": l.label, "text": l.text }))
        .collect();

    json!({
        "speakers": speakers,
        "lines": lines,
        "language": request.language,
        "sample_rate_hz": sample_rate,
        "format": "pcm16",
    })
}
