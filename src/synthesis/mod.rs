//! Speech synthesis: batch planning, provider access, and the batch driver.

pub mod batch;
pub mod clean;
pub mod client;
#[cfg(feature = "http")]
pub mod http;
pub mod planner;
pub mod provider;

pub use batch::{AudioBatchOrchestrator, BatchConfig, BatchProgress, TurnOutcome};
pub use client::{AudioSynthesisClient, ClientSettings, DialogueTurn, SingleSynthesis, VoiceMap};
pub use planner::{BatchMode, ChunkPlanner, PlannerConfig, SynthesisBatch};
pub use provider::{SilentSynthesizer, Synthesizer};
