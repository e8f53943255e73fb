//! Persisted data model: jobs, chapters, turns, and source documents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a generation job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Generating,
    Ready,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Generating => "generating",
            JobStatus::Ready => "ready",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Speaker role of a dialogue turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    Host,
    Expert,
    Simplifier,
}

impl SpeakerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakerRole::Host => "host",
            SpeakerRole::Expert => "expert",
            SpeakerRole::Simplifier => "simplifier",
        }
    }
}

impl fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One speaker's utterance in the dialogue script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub id: String,
    pub chapter_id: String,
    pub speaker_role: SpeakerRole,
    pub text: String,
    /// Playable audio reference. Empty until synthesized.
    #[serde(default)]
    pub audio: String,
    /// Seconds. Zero until synthesized.
    #[serde(default)]
    pub duration: f64,
    /// Seconds from program start. Derived by the timeline.
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub is_breakpoint: bool,
    #[serde(default)]
    pub synthesis_attempts: u32,
}

impl Turn {
    pub fn new(
        id: impl Into<String>,
        chapter_id: impl Into<String>,
        speaker_role: SpeakerRole,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            chapter_id: chapter_id.into(),
            speaker_role,
            text: text.into(),
            audio: String::new(),
            duration: 0.0,
            timestamp: 0.0,
            is_breakpoint: false,
            synthesis_attempts: 0,
        }
    }

    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }

    /// Number of whitespace-separated words in the turn's text.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Navigational grouping of turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: f64,
    #[serde(default)]
    pub summary: String,
}

impl Chapter {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start_time: 0.0,
            end_time: 0.0,
            summary: String::new(),
        }
    }
}

/// A source document and its rendered page images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub page_images: Vec<String>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.page_images.len()
    }
}

/// Identifies one page of one document (1-based page numbers).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageKey {
    pub document_id: String,
    pub page: usize,
}

impl PageKey {
    pub fn new(document_id: impl Into<String>, page: usize) -> Self {
        Self {
            document_id: document_id.into(),
            page,
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_id, self.page)
    }
}

/// Author-facing knobs forwarded to the script drafter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScriptSettings {
    pub target_minutes: u32,
    pub style: String,
    pub include_simplifier: bool,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            target_minutes: 10,
            style: "conversational".to_string(),
            include_simplifier: false,
        }
    }
}

/// One generation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Opaque to the pipeline; produced by the knowledge extractor.
    #[serde(default)]
    pub knowledge: Option<serde_json::Value>,
    #[serde(default)]
    pub settings: ScriptSettings,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub duration: f64,
}

impl Job {
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            ..Self::default()
        }
    }

    pub fn completed_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.has_audio()).count()
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: JobPatch) {
        let JobPatch {
            status,
            progress,
            message,
            language,
            title,
            knowledge,
            settings,
            chapters,
            turns,
            duration,
        } = patch;
        if let Some(v) = status {
            self.status = v;
        }
        if let Some(v) = progress {
            self.progress = v.min(100);
        }
        if let Some(v) = message {
            self.message = v;
        }
        if let Some(v) = language {
            self.language = Some(v);
        }
        if let Some(v) = title {
            self.title = Some(v);
        }
        if let Some(v) = knowledge {
            self.knowledge = Some(v);
        }
        if let Some(v) = settings {
            self.settings = v;
        }
        if let Some(v) = chapters {
            self.chapters = v;
        }
        if let Some(v) = turns {
            self.turns = v;
        }
        if let Some(v) = duration {
            self.duration = v;
        }
    }
}

/// Partial job update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub knowledge: Option<serde_json::Value>,
    pub settings: Option<ScriptSettings>,
    pub chapters: Option<Vec<Chapter>>,
    pub turns: Option<Vec<Turn>>,
    pub duration: Option<f64>,
}

impl JobPatch {
    pub fn progress(progress: u8, message: impl Into<String>) -> Self {
        Self {
            progress: Some(progress),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn status(status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_turns(mut self, turns: Vec<Turn>) -> Self {
        self.turns = Some(turns);
        self
    }

    pub fn with_chapters(mut self, chapters: Vec<Chapter>) -> Self {
        self.chapters = Some(chapters);
        self
    }
}
