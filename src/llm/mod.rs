//! Language-service collaborators: page transcription, knowledge extraction,
//! and script drafting.
//!
//! Prompt content lives with each implementation; the pipeline only sees these
//! input/output contracts.

#[cfg(feature = "http")]
pub mod http;
pub mod mock;

use crate::error::Result;
use crate::job::{Document, ScriptSettings, SpeakerRole};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use mock::ScriptedLlm;

/// Full text of one document, assembled from its page transcriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentText {
    pub document_id: String,
    pub name: String,
    pub text: String,
}

/// Output of knowledge extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// Opaque structure forwarded to the drafter and stored on the job.
    pub knowledge: serde_json::Value,
    /// Detected language code, if any.
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftedChapter {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftedTurn {
    /// Index into the drafted chapter list.
    pub chapter: usize,
    pub speaker_role: SpeakerRole,
    pub text: String,
    #[serde(default)]
    pub is_breakpoint: bool,
}

/// Output of script drafting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftedScript {
    pub title: String,
    pub chapters: Vec<DraftedChapter>,
    pub turns: Vec<DraftedTurn>,
}

/// Turns one page image into text.
#[async_trait::async_trait]
pub trait PageTranscriber: Send + Sync {
    /// `page` is 1-based; `image` is the stored page image reference.
    async fn transcribe_page(&self, document: &Document, page: usize, image: &str)
    -> Result<String>;
}

/// Extracts a knowledge structure and language from document texts.
#[async_trait::async_trait]
pub trait KnowledgeExtractor: Send + Sync {
    async fn extract(&self, documents: &[DocumentText]) -> Result<Extraction>;
}

/// Drafts a two-speaker dialogue script.
#[async_trait::async_trait]
pub trait ScriptDrafter: Send + Sync {
    async fn draft(
        &self,
        documents: &[DocumentText],
        knowledge: &serde_json::Value,
        settings: &ScriptSettings,
        language: Option<&str>,
    ) -> Result<DraftedScript>;
}

#[async_trait::async_trait]
impl<T: PageTranscriber + ?Sized> PageTranscriber for Arc<T> {
    async fn transcribe_page(
        &self,
        document: &Document,
        page: usize,
        image: &str,
    ) -> Result<String> {
        (**self).transcribe_page(document, page, image).await
    }
}

#[async_trait::async_trait]
impl<T: KnowledgeExtractor + ?Sized> KnowledgeExtractor for Arc<T> {
    async fn extract(&self, documents: &[DocumentText]) -> Result<Extraction> {
        (**self).extract(documents).await
    }
}

#[async_trait::async_trait]
impl<T: ScriptDrafter + ?Sized> ScriptDrafter for Arc<T> {
    async fn draft(
        &self,
        documents: &[DocumentText],
        knowledge: &serde_json::Value,
        settings: &ScriptSettings,
        language: Option<&str>,
    ) -> Result<DraftedScript> {
        (**self)
            .draft(documents, knowledge, settings, language)
            .await
    }
}
