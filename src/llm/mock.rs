//! Deterministic language-service stand-in for tests and dry runs.

use crate::error::{PodsynthError, Result};
use crate::job::{Document, ScriptSettings, SpeakerRole};
use crate::llm::{
    DocumentText, DraftedChapter, DraftedScript, DraftedTurn, Extraction, KnowledgeExtractor,
    PageTranscriber, ScriptDrafter,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Implements all three language-service traits without a network.
///
/// Transcription echoes the page reference; extraction reports a word count;
/// drafting emits a fixed number of alternating host/expert turns, two per
/// chapter.
#[derive(Debug)]
pub struct ScriptedLlm {
    turns: usize,
    language: Option<String>,
    failing_pages: Mutex<HashSet<(String, usize)>>,
    fail_extraction: bool,
    fail_draft: bool,
    transcribe_calls: AtomicUsize,
    extract_calls: AtomicUsize,
    draft_calls: AtomicUsize,
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self::new(4)
    }
}

impl ScriptedLlm {
    pub fn new(turns: usize) -> Self {
        Self {
            turns,
            language: Some("en".to_string()),
            failing_pages: Mutex::new(HashSet::new()),
            fail_extraction: false,
            fail_draft: false,
            transcribe_calls: AtomicUsize::new(0),
            extract_calls: AtomicUsize::new(0),
            draft_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_language(mut self, language: Option<&str>) -> Self {
        self.language = language.map(str::to_string);
        self
    }

    pub fn with_failing_page(self, document_id: &str, page: usize) -> Self {
        if let Ok(mut pages) = self.failing_pages.lock() {
            pages.insert((document_id.to_string(), page));
        }
        self
    }

    pub fn with_extraction_failure(mut self) -> Self {
        self.fail_extraction = true;
        self
    }

    pub fn with_draft_failure(mut self) -> Self {
        self.fail_draft = true;
        self
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcribe_calls.load(Ordering::SeqCst)
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn draft_calls(&self) -> usize {
        self.draft_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PageTranscriber for ScriptedLlm {
    async fn transcribe_page(
        &self,
        document: &Document,
        page: usize,
        image: &str,
    ) -> Result<String> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        let fails = self
            .failing_pages
            .lock()
            .map(|p| p.contains(&(document.id.clone(), page)))
            .unwrap_or(false);
        if fails {
            return Err(PodsynthError::Transcription {
                document: document.id.clone(),
                page,
                message: "scripted failure".to_string(),
            });
        }
        Ok(format!("Text of {} page {} ({})", document.name, page, image))
    }
}

#[async_trait::async_trait]
impl KnowledgeExtractor for ScriptedLlm {
    async fn extract(&self, documents: &[DocumentText]) -> Result<Extraction> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_extraction {
            return Err(PodsynthError::Extraction {
                message: "scripted failure".to_string(),
            });
        }
        let words: usize = documents
            .iter()
            .map(|d| d.text.split_whitespace().count())
            .sum();
        Ok(Extraction {
            knowledge: json!({ "documents": documents.len(), "words": words }),
            language: self.language.clone(),
        })
    }
}

#[async_trait::async_trait]
impl ScriptDrafter for ScriptedLlm {
    async fn draft(
        &self,
        documents: &[DocumentText],
        _knowledge: &serde_json::Value,
        _settings: &ScriptSettings,
        _language: Option<&str>,
    ) -> Result<DraftedScript> {
        self.draft_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_draft {
            return Err(PodsynthError::Draft {
                message: "scripted failure".to_string(),
            });
        }

        let chapter_count = self.turns.div_ceil(2).max(1);
        let chapters = (0..chapter_count)
            .map(|i| DraftedChapter {
                id: Some(format!("ch-{}", i + 1)),
                title: format!("Part {}", i + 1),
                summary: String::new(),
            })
            .collect();
        let source = documents
            .first()
            .map(|d| d.name.as_str())
            .unwrap_or("the material");
        let turns = (0..self.turns)
            .map(|i| DraftedTurn {
                chapter: i / 2,
                speaker_role: if i % 2 == 0 {
                    SpeakerRole::Host
                } else {
                    SpeakerRole::Expert
                },
                text: format!("Line {} about {} with a few more words", i + 1, source),
                is_breakpoint: i % 2 == 1,
            })
            .collect();

        Ok(DraftedScript {
            title: format!("A conversation about {source}"),
            chapters,
            turns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document {
            id: "d1".to_string(),
            name: "notes".to_string(),
            page_images: vec!["p1.png".to_string()],
        }
    }

    #[tokio::test]
    async fn draft_alternates_speakers() {
        let llm = ScriptedLlm::new(5);
        let script = llm
            .draft(&[], &json!({}), &ScriptSettings::default(), None)
            .await
            .unwrap();
        assert_eq!(script.turns.len(), 5);
        assert_eq!(script.chapters.len(), 3);
        assert_eq!(script.turns[0].speaker_role, SpeakerRole::Host);
        assert_eq!(script.turns[1].speaker_role, SpeakerRole::Expert);
        assert!(script.turns.iter().all(|t| t.chapter < script.chapters.len()));
    }

    #[tokio::test]
    async fn failing_page_reports_transcription_error() {
        let llm = ScriptedLlm::default().with_failing_page("d1", 1);
        let err = llm.transcribe_page(&doc(), 1, "p1.png").await.unwrap_err();
        assert!(matches!(err, PodsynthError::Transcription { page: 1, .. }));
        assert_eq!(llm.transcribe_calls(), 1);
    }

    #[tokio::test]
    async fn extraction_reports_language() {
        let llm = ScriptedLlm::default().with_language(Some("de"));
        let out = llm.extract(&[]).await.unwrap();
        assert_eq!(out.language.as_deref(), Some("de"));
    }
}
