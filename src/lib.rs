//! podsynth - Resumable document-to-podcast generation
//!
//! Transcribes document pages, drafts a two-speaker script, and synthesizes it
//! into timed audio clips across many short, checkpointed invocations.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod job;
pub mod llm;
pub mod pipeline;
pub mod store;
pub mod synthesis;
pub mod timeline;

// Composition root: builds the pipeline from config
#[cfg(all(feature = "cli", feature = "http"))]
pub mod app;

// Collaborator traits
pub use llm::{KnowledgeExtractor, PageTranscriber, ScriptDrafter};
pub use store::{BlobStore, DocumentStore, JobStore};
pub use synthesis::Synthesizer;

// Pipeline
pub use pipeline::{AdvanceInput, AdvanceOutcome, Collaborators, PipelineConfig, PipelineOrchestrator};
pub use synthesis::{AudioBatchOrchestrator, AudioSynthesisClient, ChunkPlanner};

// Data model
pub use job::{Chapter, Document, Job, JobStatus, SpeakerRole, Turn};

// Error handling
pub use error::{PodsynthError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_has_hash_suffix_only_with_git_hash() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars, got: {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
