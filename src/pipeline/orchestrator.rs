//! The resumable `advance` entry point.

use crate::defaults;
use crate::error::{PodsynthError, Result};
use crate::job::{Chapter, Document, Job, JobPatch, JobStatus, PageKey, ScriptSettings, Turn};
use crate::llm::{
    DocumentText, DraftedScript, KnowledgeExtractor, PageTranscriber, ScriptDrafter,
};
use crate::pipeline::progress;
use crate::pipeline::stage::{self, Stage};
use crate::store::{DocumentStore, JobStore};
use crate::synthesis::batch::{AudioBatchOrchestrator, BatchProgress, TurnOutcome};
use crate::synthesis::clean::is_speakable;
use crate::timeline;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Capacity of the audio progress channel.
const PROGRESS_BUFFER: usize = 16;

/// Per-invocation limits.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub pages_per_invocation: usize,
    pub turns_per_invocation: usize,
    /// Wall-clock budget for one `advance`; no new page or turn starts after it.
    pub invocation_budget: Duration,
    pub max_synthesis_attempts: u32,
    /// Progress reported once the script is drafted.
    pub script_progress: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pages_per_invocation: defaults::PAGES_PER_INVOCATION,
            turns_per_invocation: defaults::TURNS_PER_INVOCATION,
            invocation_budget: Duration::from_secs(defaults::INVOCATION_BUDGET_SECS),
            max_synthesis_attempts: defaults::MAX_SYNTHESIS_ATTEMPTS,
            script_progress: defaults::PROGRESS_SCRIPT,
        }
    }
}

/// Inputs supplied with the first `advance` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdvanceInput {
    pub documents: Vec<Document>,
    pub settings: Option<ScriptSettings>,
    /// Declared language. Wins over the detected one.
    pub language: Option<String>,
}

/// What one `advance` call left behind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceOutcome {
    pub done: bool,
    pub status: JobStatus,
    pub progress: u8,
    pub completed_turns: usize,
    pub total_turns: usize,
}

impl AdvanceOutcome {
    fn from_job(job: &Job, done: bool) -> Self {
        Self {
            done,
            status: job.status,
            progress: job.progress,
            completed_turns: job.completed_turns(),
            total_turns: job.turns.len(),
        }
    }
}

/// External services the pipeline reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub jobs: Arc<dyn JobStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub transcriber: Arc<dyn PageTranscriber>,
    pub extractor: Arc<dyn KnowledgeExtractor>,
    pub drafter: Arc<dyn ScriptDrafter>,
}

/// Pages found without a stored transcription.
struct PageScan {
    pending: Vec<PageKey>,
    total: usize,
}

pub struct PipelineOrchestrator {
    jobs: Arc<dyn JobStore>,
    documents: Arc<dyn DocumentStore>,
    transcriber: Arc<dyn PageTranscriber>,
    extractor: Arc<dyn KnowledgeExtractor>,
    drafter: Arc<dyn ScriptDrafter>,
    audio: AudioBatchOrchestrator,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        audio: AudioBatchOrchestrator,
        config: PipelineConfig,
    ) -> Self {
        Self {
            jobs: collaborators.jobs,
            documents: collaborators.documents,
            transcriber: collaborators.transcriber,
            extractor: collaborators.extractor,
            drafter: collaborators.drafter,
            audio,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one bounded slice of work for `job_id`.
    ///
    /// Input errors are returned without touching stored state. Any other
    /// failure moves the job to `error` before it is returned.
    pub async fn advance(&self, job_id: &str, input: Option<AdvanceInput>) -> Result<AdvanceOutcome> {
        let deadline = Instant::now() + self.config.invocation_budget;

        let job = self.jobs.get(job_id).await?;
        if job.status == JobStatus::Ready {
            debug!(job_id, "job already ready");
            return Ok(AdvanceOutcome::from_job(&job, true));
        }
        self.check_input(&job, input.as_ref()).await?;

        match self.step(job, input, deadline).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if e.is_stage_fatal() {
                    self.fail(job_id, &e).await;
                }
                Err(e)
            }
        }
    }

    /// Reject a call that has nothing to work from.
    async fn check_input(&self, job: &Job, input: Option<&AdvanceInput>) -> Result<()> {
        if stage::has_script(job) {
            return Ok(());
        }
        let documents = match input {
            Some(input) if !input.documents.is_empty() => input.documents.clone(),
            _ => self.documents.list_documents(&job.id).await?,
        };
        if documents.is_empty() {
            return Err(PodsynthError::Input {
                message: format!("job {} has no documents", job.id),
            });
        }
        if let Some(doc) = documents.iter().find(|d| d.id.trim().is_empty()) {
            return Err(PodsynthError::Input {
                message: format!("document {:?} has no id", doc.name),
            });
        }
        if documents.iter().all(|d| d.page_count() == 0) {
            return Err(PodsynthError::Input {
                message: format!("documents of job {} have no pages", job.id),
            });
        }
        Ok(())
    }

    async fn step(
        &self,
        job: Job,
        input: Option<AdvanceInput>,
        deadline: Instant,
    ) -> Result<AdvanceOutcome> {
        let job_id = job.id.clone();
        if let Some(input) = input {
            self.store_input(&job_id, input).await?;
        }
        if job.status != JobStatus::Generating {
            let mut patch = JobPatch::status(JobStatus::Generating, "Generation started");
            if job.status == JobStatus::Error
                && let Some(turns) = reset_attempts(&job.turns)
            {
                info!(job_id, "retrying failed turns after error");
                patch = patch.with_turns(turns);
            }
            self.jobs.update(&job_id, patch).await?;
        }
        let job = self.jobs.get(&job_id).await?;

        let (documents, scan) = if stage::has_script(&job) {
            (Vec::new(), PageScan { pending: Vec::new(), total: 0 })
        } else {
            let documents = self.documents.list_documents(&job_id).await?;
            let scan = self.scan_pages(&job_id, &documents).await?;
            (documents, scan)
        };

        let stage = stage::infer(&job, scan.pending.len());
        info!(job_id, %stage, progress = job.progress, "advancing job");

        match stage {
            Stage::Complete => Ok(AdvanceOutcome::from_job(&job, true)),
            Stage::NeedsTranscription => {
                let remaining = self.transcribe(&job_id, &documents, scan, deadline).await?;
                if remaining > 0 || Instant::now() >= deadline {
                    return self.outcome(&job_id, false).await;
                }
                self.write_script(&job, &documents).await?;
                self.outcome(&job_id, false).await
            }
            Stage::NeedsScript => {
                self.write_script(&job, &documents).await?;
                self.outcome(&job_id, false).await
            }
            Stage::NeedsAudio => self.synthesize(job, deadline).await,
            Stage::Finalize => self.finalize(job).await,
        }
    }

    async fn store_input(&self, job_id: &str, input: AdvanceInput) -> Result<()> {
        let AdvanceInput {
            documents,
            settings,
            language,
        } = input;
        if !documents.is_empty() {
            debug!(job_id, documents = documents.len(), "storing documents");
            self.documents.put_documents(job_id, documents).await?;
        }
        if settings.is_some() || language.is_some() {
            let patch = JobPatch {
                settings,
                language,
                ..JobPatch::default()
            };
            self.jobs.update(job_id, patch).await?;
        }
        Ok(())
    }

    async fn outcome(&self, job_id: &str, done: bool) -> Result<AdvanceOutcome> {
        let job = self.jobs.get(job_id).await?;
        Ok(AdvanceOutcome::from_job(&job, done))
    }

    async fn fail(&self, job_id: &str, err: &PodsynthError) {
        error!(job_id, error = %err, "generation failed");
        let patch = JobPatch::status(JobStatus::Error, err.to_string());
        if let Err(write_err) = self.jobs.update(job_id, patch).await {
            error!(job_id, error = %write_err, "could not record job failure");
        }
    }

    async fn scan_pages(&self, job_id: &str, documents: &[Document]) -> Result<PageScan> {
        let mut pending = Vec::new();
        let mut total = 0;
        for document in documents {
            for page in 1..=document.page_count() {
                total += 1;
                if self
                    .documents
                    .get_page_transcription(job_id, &document.id, page)
                    .await?
                    .is_none()
                {
                    pending.push(PageKey::new(document.id.clone(), page));
                }
            }
        }
        Ok(PageScan { pending, total })
    }

    /// Transcribe up to `pages_per_invocation` pages. Returns how many pages
    /// are still untranscribed afterwards.
    async fn transcribe(
        &self,
        job_id: &str,
        documents: &[Document],
        scan: PageScan,
        deadline: Instant,
    ) -> Result<usize> {
        let mut remaining = scan.pending.len();
        let mut done = scan.total - remaining;

        for key in scan.pending.into_iter().take(self.config.pages_per_invocation) {
            if Instant::now() >= deadline {
                info!(job_id, remaining, "invocation deadline reached during transcription");
                break;
            }
            let Some(document) = documents.iter().find(|d| d.id == key.document_id) else {
                continue;
            };
            let image = document
                .page_images
                .get(key.page - 1)
                .map(String::as_str)
                .unwrap_or_default();

            let text = match self.transcriber.transcribe_page(document, key.page, image).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(job_id, page = %key, error = %e, "page transcription failed, storing placeholder");
                    placeholder(document, key.page, &e)
                }
            };
            self.documents
                .put_page_transcription(job_id, &key.document_id, key.page, &text)
                .await?;

            done += 1;
            remaining -= 1;
            let patch = JobPatch::progress(
                progress::transcription(done, scan.total),
                format!("Transcribed {done} of {} pages", scan.total),
            );
            self.jobs.update(job_id, patch).await?;
        }
        Ok(remaining)
    }

    async fn document_texts(
        &self,
        job_id: &str,
        documents: &[Document],
    ) -> Result<Vec<DocumentText>> {
        let mut texts = Vec::with_capacity(documents.len());
        for document in documents {
            let mut pages = Vec::with_capacity(document.page_count());
            for page in 1..=document.page_count() {
                if let Some(text) = self
                    .documents
                    .get_page_transcription(job_id, &document.id, page)
                    .await?
                {
                    pages.push(text);
                }
            }
            texts.push(DocumentText {
                document_id: document.id.clone(),
                name: document.name.clone(),
                text: pages.join("\n\n"),
            });
        }
        Ok(texts)
    }

    /// Knowledge extraction and script drafting in one slice.
    async fn write_script(&self, job: &Job, documents: &[Document]) -> Result<()> {
        let texts = self.document_texts(&job.id, documents).await?;
        self.jobs
            .update(
                &job.id,
                JobPatch::progress(defaults::PROGRESS_KNOWLEDGE, "Extracting knowledge"),
            )
            .await?;

        let extraction = self.extractor.extract(&texts).await?;
        let language = job.language.clone().or(extraction.language);
        let script = self
            .drafter
            .draft(&texts, &extraction.knowledge, &job.settings, language.as_deref())
            .await?;

        let title = script.title.clone();
        let (chapters, turns) = assemble_script(script)?;
        info!(
            job_id = %job.id,
            chapters = chapters.len(),
            turns = turns.len(),
            language = language.as_deref().unwrap_or("unknown"),
            "script drafted"
        );

        let patch = JobPatch {
            progress: Some(self.config.script_progress),
            message: Some(format!("Script ready with {} turns", turns.len())),
            language,
            title: Some(title),
            knowledge: Some(extraction.knowledge),
            chapters: Some(chapters),
            turns: Some(turns),
            ..JobPatch::default()
        };
        self.jobs.update(&job.id, patch).await
    }

    /// Hand a bounded slice of pending turns to the audio batch, persisting
    /// each result as it arrives.
    async fn synthesize(&self, job: Job, deadline: Instant) -> Result<AdvanceOutcome> {
        let job_id = job.id.clone();
        let max_attempts = self.config.max_synthesis_attempts;

        let batch: Vec<Turn> = job
            .turns
            .iter()
            .filter(|t| stage::is_pending(t) && t.synthesis_attempts < max_attempts)
            .take(self.config.turns_per_invocation)
            .cloned()
            .collect();
        if batch.is_empty() {
            return Err(exhausted(&job.turns, max_attempts));
        }
        debug!(job_id, turns = batch.len(), "starting audio slice");

        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        let (synthesized, persisted) = tokio::join!(
            self.audio
                .run(&job_id, batch, job.language.as_deref(), tx, Some(deadline)),
            self.persist_progress(&job_id, rx),
        );
        persisted?;
        synthesized?;

        let job = self.jobs.get(&job_id).await?;
        let pending: Vec<&Turn> = job.turns.iter().filter(|t| stage::is_pending(t)).collect();
        if pending.is_empty() {
            return self.finalize(job).await;
        }
        if pending.iter().all(|t| t.synthesis_attempts >= max_attempts) {
            return Err(exhausted(&job.turns, max_attempts));
        }
        Ok(AdvanceOutcome::from_job(&job, false))
    }

    /// Persist every synthesized turn as soon as it is reported. Returning
    /// drops the receiver, which stops the batch.
    async fn persist_progress(
        &self,
        job_id: &str,
        mut rx: mpsc::Receiver<BatchProgress>,
    ) -> Result<()> {
        while let Some(event) = rx.recv().await {
            debug!(
                job_id,
                completed = event.completed,
                total = event.total,
                "{}",
                event.message
            );
            let turns = match event.outcome {
                TurnOutcome::Synthesized(update) => {
                    let mut turns = self.jobs.get(job_id).await?.turns;
                    if let Some(turn) = turns.iter_mut().find(|t| t.id == update.id) {
                        turn.audio = update.audio;
                        turn.duration = update.duration;
                    }
                    turns
                }
                TurnOutcome::Failed { turn_id } => {
                    let mut turns = self.jobs.get(job_id).await?.turns;
                    if let Some(turn) = turns.iter_mut().find(|t| t.id == turn_id) {
                        turn.synthesis_attempts += 1;
                    }
                    self.jobs
                        .update(job_id, JobPatch::default().with_turns(turns))
                        .await?;
                    continue;
                }
                TurnOutcome::Skipped => continue,
            };
            let turns = timeline::recompute(&turns);
            let done = turns.iter().filter(|t| t.has_audio()).count();
            let patch = JobPatch {
                progress: Some(progress::audio(self.config.script_progress, done, turns.len())),
                message: Some(format!("Synthesized {done} of {} turns", turns.len())),
                duration: Some(timeline::total_duration(&turns)),
                turns: Some(turns),
                ..JobPatch::default()
            };
            self.jobs.update(job_id, patch).await?;
        }
        Ok(())
    }

    async fn finalize(&self, job: Job) -> Result<AdvanceOutcome> {
        let (kept, dropped): (Vec<Turn>, Vec<Turn>) =
            job.turns.iter().cloned().partition(Turn::has_audio);
        if !dropped.is_empty() {
            warn!(
                job_id = %job.id,
                dropped = dropped.len(),
                "dropping turns without speakable text before finalizing"
            );
        }
        let turns = timeline::recompute(&kept);
        let chapters = timeline::recompute_chapters(&job.chapters, &turns);
        let duration = timeline::total_duration(&turns);

        let patch = JobPatch {
            progress: Some(defaults::PROGRESS_DONE),
            duration: Some(duration),
            ..JobPatch::status(JobStatus::Ready, "Podcast ready")
        }
        .with_turns(turns)
        .with_chapters(chapters);
        self.jobs.update(&job.id, patch).await?;

        info!(job_id = %job.id, duration, "job ready");
        self.outcome(&job.id, true).await
    }
}

fn placeholder(document: &Document, page: usize, err: &PodsynthError) -> String {
    format!(
        "[Page {page} of {} could not be transcribed: {err}]",
        document.name
    )
}

/// Clear the attempt count of pending turns so a job in `error` gets a fresh
/// budget. `None` when there is nothing to reset.
fn reset_attempts(turns: &[Turn]) -> Option<Vec<Turn>> {
    if !turns
        .iter()
        .any(|t| stage::is_pending(t) && t.synthesis_attempts > 0)
    {
        return None;
    }
    let turns = turns
        .iter()
        .map(|t| {
            let mut turn = t.clone();
            if stage::is_pending(&turn) {
                turn.synthesis_attempts = 0;
            }
            turn
        })
        .collect();
    Some(turns)
}

fn exhausted(turns: &[Turn], max_attempts: u32) -> PodsynthError {
    let failed = turns.iter().filter(|t| stage::is_pending(t)).count();
    PodsynthError::synthesis(format!(
        "{failed} turns still have no audio after {max_attempts} attempts"
    ))
}

/// Give drafted chapters and turns stable ids and drop turns with nothing
/// to say.
fn assemble_script(script: DraftedScript) -> Result<(Vec<Chapter>, Vec<Turn>)> {
    let DraftedScript {
        title,
        chapters: drafted_chapters,
        turns: drafted_turns,
    } = script;

    let mut chapters: Vec<Chapter> = drafted_chapters
        .into_iter()
        .enumerate()
        .map(|(i, drafted)| {
            let id = drafted
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| chapter_id(i));
            Chapter {
                summary: drafted.summary,
                ..Chapter::new(id, drafted.title)
            }
        })
        .collect();
    if chapters.is_empty() {
        chapters.push(Chapter::new(chapter_id(0), title));
    }

    let drafted_count = drafted_turns.len();
    let turns: Vec<Turn> = drafted_turns
        .into_iter()
        .filter(|t| is_speakable(&t.text))
        .enumerate()
        .map(|(i, drafted)| {
            let chapter_id = chapters
                .get(drafted.chapter)
                .or_else(|| chapters.last())
                .map(|c| c.id.clone())
                .unwrap_or_default();
            Turn {
                is_breakpoint: drafted.is_breakpoint,
                ..Turn::new(turn_id(i), chapter_id, drafted.speaker_role, drafted.text)
            }
        })
        .collect();

    if turns.len() < drafted_count {
        warn!(
            dropped = drafted_count - turns.len(),
            "dropped drafted turns without speakable text"
        );
    }
    if turns.is_empty() {
        return Err(PodsynthError::Draft {
            message: "script contains no speakable turns".to_string(),
        });
    }
    Ok((chapters, turns))
}

fn turn_id(index: usize) -> String {
    format!("turn-{index:04}")
}

fn chapter_id(index: usize) -> String {
    format!("chapter-{:02}", index + 1)
}
