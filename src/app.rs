//! Composition root.
//!
//! Builds the pipeline from configuration: a file-backed store under the data
//! directory plus the providers selected in `[synthesis]` and `[llm]`.

use crate::config::{Config, ProviderKind, api_key_from_env};
use crate::error::{PodsynthError, Result};
use crate::job::{Document, Job, JobStatus, ScriptSettings};
use crate::llm::http::HttpLlmClient;
use crate::llm::{KnowledgeExtractor, PageTranscriber, ScriptDrafter, ScriptedLlm};
use crate::pipeline::{AdvanceOutcome, Collaborators, PipelineOrchestrator};
use crate::store::{DocumentStore, FsStore, JobStore};
use crate::synthesis::http::HttpSynthesizer;
use crate::synthesis::{AudioBatchOrchestrator, AudioSynthesisClient, SilentSynthesizer, Synthesizer};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Turns the offline language stand-in drafts per script.
const OFFLINE_SCRIPT_TURNS: usize = 8;

/// Document manifest accepted by `podsynth create`.
#[derive(Debug, Deserialize)]
struct Manifest {
    documents: Vec<Document>,
}

/// Resolve the data directory: `[storage] data_dir`, else the platform data dir.
pub fn data_dir(config: &Config) -> Result<PathBuf> {
    if let Some(dir) = &config.storage.data_dir {
        return Ok(dir.clone());
    }
    dirs::data_dir()
        .map(|dir| dir.join("podsynth"))
        .ok_or_else(|| PodsynthError::Other("Could not determine data directory".to_string()))
}

pub fn build_synthesizer(config: &Config) -> Result<Arc<dyn Synthesizer>> {
    let section = &config.synthesis;
    let synthesizer: Arc<dyn Synthesizer> = match section.provider {
        ProviderKind::Http => Arc::new(HttpSynthesizer::new(
            &section.endpoint,
            api_key_from_env(&section.api_key_env),
            section.sample_rate,
            Duration::from_secs(section.timeout_secs),
        )?),
        ProviderKind::Silent => {
            Arc::new(SilentSynthesizer::new().with_sample_rate(section.sample_rate))
        }
    };
    Ok(synthesizer)
}

type LanguageServices = (
    Arc<dyn PageTranscriber>,
    Arc<dyn KnowledgeExtractor>,
    Arc<dyn ScriptDrafter>,
);

pub fn build_language_services(config: &Config) -> Result<LanguageServices> {
    let section = &config.llm;
    match section.provider {
        ProviderKind::Http => {
            let client = Arc::new(HttpLlmClient::new(
                &section.endpoint,
                api_key_from_env(&section.api_key_env),
                Duration::from_secs(section.timeout_secs),
            )?);
            Ok(shared(client))
        }
        ProviderKind::Silent => Ok(shared(Arc::new(ScriptedLlm::new(OFFLINE_SCRIPT_TURNS)))),
    }
}

/// One service object behind all three language traits.
fn shared<T>(service: Arc<T>) -> LanguageServices
where
    T: PageTranscriber + KnowledgeExtractor + ScriptDrafter + 'static,
{
    let transcriber: Arc<dyn PageTranscriber> = service.clone();
    let extractor: Arc<dyn KnowledgeExtractor> = service.clone();
    let drafter: Arc<dyn ScriptDrafter> = service;
    (transcriber, extractor, drafter)
}

/// Wire a pipeline over `store` using the configured providers.
pub fn build_pipeline(config: &Config, store: Arc<FsStore>) -> Result<PipelineOrchestrator> {
    config.validate()?;

    let synthesizer = build_synthesizer(config)?;
    let (transcriber, extractor, drafter) = build_language_services(config)?;
    debug!(
        synthesis = synthesizer.name(),
        llm = ?config.llm.provider,
        data_dir = %store.root().display(),
        "building pipeline"
    );

    let client = AudioSynthesisClient::new(synthesizer, config.client_settings());
    let audio = AudioBatchOrchestrator::new(client, store.clone(), config.batch_config());
    let collaborators = Collaborators {
        jobs: store.clone(),
        documents: store,
        transcriber,
        extractor,
        drafter,
    };
    Ok(PipelineOrchestrator::new(
        collaborators,
        audio,
        config.pipeline_config(),
    ))
}

/// Create a job and store its documents.
pub async fn create_job(
    store: &FsStore,
    job_id: &str,
    owner_id: &str,
    manifest: &Path,
    language: Option<String>,
    target_minutes: Option<u32>,
) -> Result<Job> {
    match store.get(job_id).await {
        Ok(_) => {
            return Err(PodsynthError::Input {
                message: format!("job {job_id} already exists"),
            });
        }
        Err(PodsynthError::JobNotFound { .. }) => {}
        Err(e) => return Err(e),
    }

    let contents = std::fs::read_to_string(manifest).map_err(|e| PodsynthError::Input {
        message: format!("cannot read manifest {}: {e}", manifest.display()),
    })?;
    let manifest: Manifest = serde_json::from_str(&contents).map_err(|e| PodsynthError::Input {
        message: format!("invalid manifest: {e}"),
    })?;
    if manifest.documents.is_empty() {
        return Err(PodsynthError::Input {
            message: "manifest lists no documents".to_string(),
        });
    }

    let mut job = Job::new(job_id, owner_id);
    job.language = language;
    if let Some(minutes) = target_minutes {
        job.settings = ScriptSettings {
            target_minutes: minutes,
            ..ScriptSettings::default()
        };
    }

    store.put_documents(job_id, manifest.documents).await?;
    store.create(job.clone()).await?;
    info!(job_id, owner_id, "job created");
    Ok(job)
}

/// Call `advance` until the job is ready, fails, or `max_steps` runs out.
pub async fn run_until_done(
    pipeline: &PipelineOrchestrator,
    job_id: &str,
    max_steps: usize,
    mut on_step: impl FnMut(usize, &AdvanceOutcome),
) -> Result<AdvanceOutcome> {
    let mut last = None;
    for step in 1..=max_steps {
        let outcome = pipeline.advance(job_id, None).await?;
        on_step(step, &outcome);
        if outcome.done || outcome.status == JobStatus::Error {
            return Ok(outcome);
        }
        last = Some(outcome);
    }
    last.ok_or_else(|| PodsynthError::Input {
        message: "max steps must be at least 1".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn offline_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = Some(dir.to_path_buf());
        config.synthesis.inter_call_delay_ms = 0;
        config
    }

    fn write_manifest(dir: &Path) -> PathBuf {
        let path = dir.join("manifest.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"documents":[{{"id":"d1","name":"notes.pdf","pageImages":["p1.png","p2.png"]}}]}}"#
        )
        .unwrap();
        path
    }

    #[test]
    fn configured_data_dir_wins() {
        let config = offline_config(Path::new("/srv/podsynth"));
        assert_eq!(data_dir(&config).unwrap(), PathBuf::from("/srv/podsynth"));
    }

    #[test]
    fn silent_providers_are_selected_by_default() {
        let config = Config::default();
        assert_eq!(build_synthesizer(&config).unwrap().name(), "silent");
    }

    #[test]
    fn invalid_config_is_rejected_before_wiring() {
        let dir = TempDir::new().unwrap();
        let mut config = offline_config(dir.path());
        config.planner.max_speakers = 0;
        let store = Arc::new(FsStore::new(dir.path()));
        assert!(build_pipeline(&config, store).is_err());
    }

    #[tokio::test]
    async fn offline_job_runs_to_ready_on_disk() {
        let dir = TempDir::new().unwrap();
        let config = offline_config(dir.path());
        let store = Arc::new(FsStore::new(dir.path()));
        let manifest = write_manifest(dir.path());

        create_job(&store, "job-1", "alice", &manifest, Some("en".to_string()), None)
            .await
            .unwrap();
        let pipeline = build_pipeline(&config, store.clone()).unwrap();

        let mut steps = 0;
        let outcome = run_until_done(&pipeline, "job-1", 20, |_, _| steps += 1)
            .await
            .unwrap();

        assert!(outcome.done);
        assert_eq!(outcome.status, JobStatus::Ready);
        assert_eq!(outcome.progress, 100);
        assert_eq!(outcome.completed_turns, OFFLINE_SCRIPT_TURNS);
        assert!(steps >= 3);
        assert!(dir.path().join("blobs/jobs/job-1/turns/turn-0000.wav").exists());
    }

    #[tokio::test]
    async fn duplicate_job_is_an_input_error() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let manifest = write_manifest(dir.path());
        create_job(&store, "job-1", "alice", &manifest, None, None)
            .await
            .unwrap();
        let err = create_job(&store, "job-1", "alice", &manifest, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PodsynthError::Input { .. }));
    }
}
