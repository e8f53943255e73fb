use crate::audio::PcmAudio;
use crate::defaults;
use crate::error::{PodsynthError, Result};
use crate::job::SpeakerRole;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Single-speaker synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub language: Option<String>,
}

/// One line of a multi-speaker dialogue request.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueLine {
    pub text: String,
    pub role: SpeakerRole,
    pub voice: String,
    /// Speaker label the provider sees, e.g. "Speaker 1".
    pub label: String,
}

/// Multi-speaker synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueRequest {
    pub lines: Vec<DialogueLine>,
    pub language: Option<String>,
}

/// Audio returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub audio: PcmAudio,
    /// Duration in seconds, when the provider reports one.
    pub reported_duration: Option<f64>,
}

/// A speech synthesis backend.
///
/// One implementation per vendor, chosen once when the pipeline is built.
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    /// Render one utterance with one voice.
    async fn synthesize_single(&self, request: &SpeechRequest) -> Result<SynthesizedAudio>;

    /// Render a short exchange between up to two speakers as one buffer.
    async fn synthesize_dialogue(&self, request: &DialogueRequest) -> Result<SynthesizedAudio>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

#[async_trait::async_trait]
impl<T: Synthesizer + ?Sized> Synthesizer for Arc<T> {
    async fn synthesize_single(&self, request: &SpeechRequest) -> Result<SynthesizedAudio> {
        (**self).synthesize_single(request).await
    }

    async fn synthesize_dialogue(&self, request: &DialogueRequest) -> Result<SynthesizedAudio> {
        (**self).synthesize_dialogue(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Offline synthesizer that renders silence sized by word count.
///
/// Used for dry runs and tests. Failures and latency can be injected.
#[derive(Debug)]
pub struct SilentSynthesizer {
    sample_rate: u32,
    words_per_minute: u32,
    fail_dialogue: bool,
    fail_texts: Mutex<HashSet<String>>,
    latency: Option<Duration>,
    single_calls: AtomicUsize,
    dialogue_calls: AtomicUsize,
}

impl Default for SilentSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SilentSynthesizer {
    pub fn new() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            words_per_minute: defaults::WORDS_PER_MINUTE,
            fail_dialogue: false,
            fail_texts: Mutex::new(HashSet::new()),
            latency: None,
            single_calls: AtomicUsize::new(0),
            dialogue_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Reject every dialogue request.
    pub fn with_dialogue_failure(mut self) -> Self {
        self.fail_dialogue = true;
        self
    }

    /// Reject single-speaker requests for exactly this text.
    pub fn with_single_failure(self, text: &str) -> Self {
        if let Ok(mut texts) = self.fail_texts.lock() {
            texts.insert(text.to_string());
        }
        self
    }

    /// Stop rejecting single-speaker requests.
    pub fn clear_failures(&self) {
        if let Ok(mut texts) = self.fail_texts.lock() {
            texts.clear();
        }
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn dialogue_calls(&self) -> usize {
        self.dialogue_calls.load(Ordering::SeqCst)
    }

    fn render(&self, words: usize) -> PcmAudio {
        let seconds = words.max(1) as f64 * 60.0 / self.words_per_minute.max(1) as f64;
        let samples = (seconds * self.sample_rate as f64).round() as usize;
        PcmAudio::new(vec![0u8; samples * defaults::BYTES_PER_SAMPLE], self.sample_rate)
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn rejects(&self, text: &str) -> bool {
        self.fail_texts
            .lock()
            .map(|texts| texts.contains(text))
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl Synthesizer for SilentSynthesizer {
    async fn synthesize_single(&self, request: &SpeechRequest) -> Result<SynthesizedAudio> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.rejects(&request.text) {
            return Err(PodsynthError::synthesis(format!(
                "silent provider rejected text: {}",
                request.text
            )));
        }
        Ok(SynthesizedAudio {
            audio: self.render(request.text.split_whitespace().count()),
            reported_duration: None,
        })
    }

    async fn synthesize_dialogue(&self, request: &DialogueRequest) -> Result<SynthesizedAudio> {
        self.dialogue_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_dialogue {
            return Err(PodsynthError::synthesis(
                "silent provider rejected multi-speaker request",
            ));
        }
        let words = request
            .lines
            .iter()
            .map(|l| l.text.split_whitespace().count())
            .sum();
        Ok(SynthesizedAudio {
            audio: self.render(words),
            reported_duration: None,
        })
    }

    fn name(&self) -> &str {
        "silent"
    }
}
