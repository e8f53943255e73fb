use crate::defaults;
use crate::error::{PodsynthError, Result};
use crate::pipeline::PipelineConfig;
use crate::synthesis::{BatchConfig, ClientSettings, PlannerConfig, VoiceMap};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSection,
    pub planner: PlannerConfig,
    pub synthesis: SynthesisSection,
    pub voices: VoiceMap,
    pub llm: LlmSection,
    pub storage: StorageSection,
}

/// Per-invocation limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSection {
    pub pages_per_invocation: usize,
    pub turns_per_invocation: usize,
    pub invocation_budget_secs: u64,
    pub max_synthesis_attempts: u32,
    pub script_progress: u8,
}

/// Which implementation backs a provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// JSON-over-HTTP service at `endpoint`
    Http,
    /// Offline stand-in: silent audio, scripted text
    #[default]
    Silent,
}

/// Speech synthesis provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisSection {
    pub provider: ProviderKind,
    pub endpoint: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub words_per_minute: u32,
    pub inter_call_delay_ms: u64,
    pub sample_rate: u32,
}

/// Language service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSection {
    pub provider: ProviderKind,
    pub endpoint: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

/// Where jobs, transcriptions and clips are stored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StorageSection {
    pub data_dir: Option<PathBuf>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            pages_per_invocation: defaults::PAGES_PER_INVOCATION,
            turns_per_invocation: defaults::TURNS_PER_INVOCATION,
            invocation_budget_secs: defaults::INVOCATION_BUDGET_SECS,
            max_synthesis_attempts: defaults::MAX_SYNTHESIS_ATTEMPTS,
            script_progress: defaults::PROGRESS_SCRIPT,
        }
    }
}

impl Default for SynthesisSection {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Silent,
            endpoint: "http://localhost:8880".to_string(),
            api_key_env: "PODSYNTH_SYNTHESIS_API_KEY".to_string(),
            timeout_secs: defaults::SYNTHESIS_TIMEOUT_SECS,
            words_per_minute: defaults::WORDS_PER_MINUTE,
            inter_call_delay_ms: defaults::INTER_CALL_DELAY_MS,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Silent,
            endpoint: "http://localhost:8881".to_string(),
            api_key_env: "PODSYNTH_LLM_API_KEY".to_string(),
            timeout_secs: defaults::LLM_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PodsynthError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                PodsynthError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(PodsynthError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - PODSYNTH_DATA_DIR → storage.data_dir
    /// - PODSYNTH_SYNTHESIS_ENDPOINT → synthesis.endpoint
    /// - PODSYNTH_LLM_ENDPOINT → llm.endpoint
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("PODSYNTH_DATA_DIR")
            && !dir.is_empty()
        {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Ok(endpoint) = std::env::var("PODSYNTH_SYNTHESIS_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.synthesis.endpoint = endpoint;
        }

        if let Ok(endpoint) = std::env::var("PODSYNTH_LLM_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.llm.endpoint = endpoint;
        }

        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> Result<()> {
            Err(PodsynthError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        }

        if self.pipeline.pages_per_invocation == 0 {
            return invalid("pipeline.pages_per_invocation", "must be at least 1");
        }
        if self.pipeline.turns_per_invocation == 0 {
            return invalid("pipeline.turns_per_invocation", "must be at least 1");
        }
        if self.pipeline.max_synthesis_attempts == 0 {
            return invalid("pipeline.max_synthesis_attempts", "must be at least 1");
        }
        if !(defaults::PROGRESS_KNOWLEDGE..=defaults::PROGRESS_AUDIO_END)
            .contains(&self.pipeline.script_progress)
        {
            return invalid(
                "pipeline.script_progress",
                &format!(
                    "must be between {} and {}",
                    defaults::PROGRESS_KNOWLEDGE,
                    defaults::PROGRESS_AUDIO_END
                ),
            );
        }
        if !(1..=defaults::MAX_SPEAKERS).contains(&self.planner.max_speakers) {
            return invalid(
                "planner.max_speakers",
                &format!("must be between 1 and {}", defaults::MAX_SPEAKERS),
            );
        }
        if self.planner.char_budget == 0 {
            return invalid("planner.char_budget", "must be positive");
        }
        if self.planner.max_turns == 0 {
            return invalid("planner.max_turns", "must be at least 1");
        }
        if self.synthesis.words_per_minute == 0 {
            return invalid("synthesis.words_per_minute", "must be positive");
        }
        if self.synthesis.sample_rate == 0 {
            return invalid("synthesis.sample_rate", "must be positive");
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/podsynth/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("podsynth").join("config.toml"))
            .ok_or_else(|| PodsynthError::Other("Could not determine config directory".to_string()))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            pages_per_invocation: self.pipeline.pages_per_invocation,
            turns_per_invocation: self.pipeline.turns_per_invocation,
            invocation_budget: Duration::from_secs(self.pipeline.invocation_budget_secs),
            max_synthesis_attempts: self.pipeline.max_synthesis_attempts,
            script_progress: self.pipeline.script_progress,
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            planner: self.planner.clone(),
            inter_call_delay: Duration::from_millis(self.synthesis.inter_call_delay_ms),
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            timeout: Duration::from_secs(self.synthesis.timeout_secs),
            words_per_minute: self.synthesis.words_per_minute,
            voices: self.voices.clone(),
        }
    }
}

/// Read an API key from the named environment variable. Empty means unset.
pub fn api_key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|key| !key.is_empty())
}
