//! Validated, time-bounded access to a [`Synthesizer`].

use crate::audio::PcmAudio;
use crate::defaults;
use crate::error::{PodsynthError, Result};
use crate::job::SpeakerRole;
use crate::synthesis::provider::{DialogueLine, DialogueRequest, SpeechRequest, Synthesizer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Provider voice id per speaker role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoiceMap {
    pub host: String,
    pub expert: String,
    pub simplifier: String,
}

impl Default for VoiceMap {
    fn default() -> Self {
        Self {
            host: defaults::HOST_VOICE.to_string(),
            expert: defaults::EXPERT_VOICE.to_string(),
            simplifier: defaults::SIMPLIFIER_VOICE.to_string(),
        }
    }
}

impl VoiceMap {
    pub fn voice_for(&self, role: SpeakerRole) -> &str {
        match role {
            SpeakerRole::Host => &self.host,
            SpeakerRole::Expert => &self.expert,
            SpeakerRole::Simplifier => &self.simplifier,
        }
    }
}

/// Client-side limits applied around every provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub words_per_minute: u32,
    pub voices: VoiceMap,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(defaults::SYNTHESIS_TIMEOUT_SECS),
            words_per_minute: defaults::WORDS_PER_MINUTE,
            voices: VoiceMap::default(),
        }
    }
}

/// Result of a single-speaker call.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleSynthesis {
    pub audio: PcmAudio,
    /// Seconds. Provider-reported when available, otherwise a words-per-minute
    /// estimate that is not sample-accurate.
    pub duration_estimate: f64,
}

/// One turn of a dialogue call.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueTurn {
    pub text: String,
    pub role: SpeakerRole,
}

impl DialogueTurn {
    pub fn new(text: impl Into<String>, role: SpeakerRole) -> Self {
        Self {
            text: text.into(),
            role,
        }
    }
}

/// Estimate spoken duration from word count.
pub fn estimate_duration(text: &str, words_per_minute: u32) -> f64 {
    let words = text.split_whitespace().count() as f64;
    words * 60.0 / words_per_minute.max(1) as f64
}

/// Wraps a provider with input validation, timeouts, and duration estimation.
#[derive(Clone)]
pub struct AudioSynthesisClient {
    provider: Arc<dyn Synthesizer>,
    settings: ClientSettings,
}

impl AudioSynthesisClient {
    pub fn new(provider: Arc<dyn Synthesizer>, settings: ClientSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn voice_for(&self, role: SpeakerRole) -> &str {
        self.settings.voices.voice_for(role)
    }

    /// Render one utterance.
    ///
    /// Fails on empty text, provider error, timeout, or a response with no
    /// samples.
    pub async fn synthesize_single(
        &self,
        text: &str,
        voice: &str,
        language: Option<&str>,
    ) -> Result<SingleSynthesis> {
        if text.trim().is_empty() {
            return Err(PodsynthError::synthesis("cannot synthesize empty text"));
        }

        let request = SpeechRequest {
            text: text.to_string(),
            voice: voice.to_string(),
            language: language.map(str::to_string),
        };
        let result = tokio::time::timeout(
            self.settings.timeout,
            self.provider.synthesize_single(&request),
        )
        .await
        .map_err(|_| self.timed_out("single-speaker"))??;
        if result.audio.is_empty() {
            return Err(self.no_audio("single-speaker"));
        }

        let duration_estimate = result
            .reported_duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or_else(|| estimate_duration(text, self.settings.words_per_minute));

        debug!(
            provider = self.provider.name(),
            voice,
            samples = result.audio.sample_count(),
            duration_estimate,
            "single-speaker synthesis complete"
        );

        Ok(SingleSynthesis {
            audio: result.audio,
            duration_estimate,
        })
    }

    /// Render a short exchange as one combined buffer.
    ///
    /// Requires at least two turns, no more than two distinct roles, and no
    /// empty text.
    pub async fn synthesize_dialogue(
        &self,
        turns: &[DialogueTurn],
        language: Option<&str>,
    ) -> Result<PcmAudio> {
        if turns.len() < 2 {
            return Err(PodsynthError::synthesis(format!(
                "dialogue needs at least 2 turns, got {}",
                turns.len()
            )));
        }
        if turns.iter().any(|t| t.text.trim().is_empty()) {
            return Err(PodsynthError::synthesis("dialogue contains empty text"));
        }
        let roles: BTreeSet<SpeakerRole> = turns.iter().map(|t| t.role).collect();
        if roles.len() > defaults::MAX_SPEAKERS {
            return Err(PodsynthError::synthesis(format!(
                "dialogue has {} speakers, at most {} supported",
                roles.len(),
                defaults::MAX_SPEAKERS
            )));
        }

        let request = DialogueRequest {
            lines: self.label_lines(turns),
            language: language.map(str::to_string),
        };
        let result = tokio::time::timeout(
            self.settings.timeout,
            self.provider.synthesize_dialogue(&request),
        )
        .await
        .map_err(|_| self.timed_out("multi-speaker"))??;
        if result.audio.is_empty() {
            return Err(self.no_audio("multi-speaker"));
        }

        debug!(
            provider = self.provider.name(),
            turns = turns.len(),
            samples = result.audio.sample_count(),
            "multi-speaker synthesis complete"
        );

        Ok(result.audio)
    }

    /// Label speakers "Speaker 1", "Speaker 2" in order of first appearance.
    fn label_lines(&self, turns: &[DialogueTurn]) -> Vec<DialogueLine> {
        let mut order: Vec<SpeakerRole> = Vec::new();
        turns
            .iter()
            .map(|turn| {
                let position = match order.iter().position(|r| *r == turn.role) {
                    Some(p) => p,
                    None => {
                        order.push(turn.role);
                        order.len() - 1
                    }
                };
                DialogueLine {
                    text: turn.text.clone(),
                    role: turn.role,
                    voice: self.voice_for(turn.role).to_string(),
                    label: format!("Speaker {}", position + 1),
                }
            })
            .collect()
    }

    fn no_audio(&self, mode: &str) -> PodsynthError {
        PodsynthError::synthesis(format!(
            "{} request to {} returned no audio",
            mode,
            self.provider.name()
        ))
    }

    fn timed_out(&self, mode: &str) -> PodsynthError {
        PodsynthError::synthesis(format!(
            "{} request to {} timed out after {}s",
            mode,
            self.provider.name(),
            self.settings.timeout.as_secs_f64()
        ))
    }
}
