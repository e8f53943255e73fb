//! Resumable generation pipeline.
//!
//! ```text
//! advance(job) ──► infer stage from persisted data
//!                    │
//!                    ├─ NeedsTranscription ─► transcribe N pages ─┐
//!                    ├─ NeedsScript ◄────── (all pages done) ◄────┘
//!                    │     extract knowledge, draft script
//!                    ├─ NeedsAudio ──► AudioBatchOrchestrator ─┐
//!                    ├─ Finalize ◄──── (no pending turns) ◄────┘
//!                    │     timeline, chapters, status=ready
//!                    └─ Complete
//! ```
//!
//! Every completed unit is persisted before the next one starts, so calling
//! `advance` again after a timeout resumes without repeating work.

pub mod orchestrator;
pub mod progress;
pub mod stage;

pub use orchestrator::{
    AdvanceInput, AdvanceOutcome, Collaborators, PipelineConfig, PipelineOrchestrator,
};
pub use stage::Stage;
