//! File-backed stores rooted at one data directory.
//!
//! Layout:
//! - `jobs/<job>.json`
//! - `documents/<job>.json`
//! - `transcriptions/<job>/<document>/<page>.txt`
//! - `blobs/<path>`
//!
//! Record writes go to a temp file and are renamed into place so a killed
//! process never leaves a half-written record behind.

use crate::error::{PodsynthError, Result};
use crate::job::{Document, Job, JobPatch};
use crate::store::{BlobStore, DocumentStore, JobStore};
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles on job records.
    job_lock: Mutex<()>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            job_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn job_path(&self, job_id: &str) -> Result<PathBuf> {
        Ok(self.root.join("jobs").join(format!("{}.json", safe_id(job_id)?)))
    }

    fn documents_path(&self, job_id: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join("documents")
            .join(format!("{}.json", safe_id(job_id)?)))
    }

    fn transcription_path(&self, job_id: &str, document_id: &str, page: usize) -> Result<PathBuf> {
        Ok(self
            .root
            .join("transcriptions")
            .join(safe_id(job_id)?)
            .join(safe_id(document_id)?)
            .join(format!("{page}.txt")))
    }

    fn blob_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !clean || path.is_empty() {
            return Err(PodsynthError::persistence(format!("invalid blob path: {path}")));
        }
        Ok(self.root.join("blobs").join(relative))
    }

    async fn read_job(&self, job_id: &str) -> Result<Job> {
        let path = self.job_path(job_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PodsynthError::JobNotFound {
                job_id: job_id.to_string(),
            }),
            Err(e) => Err(PodsynthError::persistence(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn write_job(&self, job: &Job) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(job)?;
        write_atomic(&self.job_path(&job.id)?, &bytes).await
    }
}

/// Ids become file names; reject anything that could escape the directory.
fn safe_id(id: &str) -> Result<&str> {
    let ok = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && !id.contains('\0');
    if ok {
        Ok(id)
    } else {
        Err(PodsynthError::persistence(format!("invalid identifier: {id:?}")))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| PodsynthError::persistence(format!("no parent for {}", path.display())))?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| PodsynthError::persistence(format!("create {}: {e}", parent.display())))?;

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| PodsynthError::persistence(format!("write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| PodsynthError::persistence(format!("rename {}: {e}", path.display())))
}

#[async_trait::async_trait]
impl JobStore for FsStore {
    async fn get(&self, job_id: &str) -> Result<Job> {
        self.read_job(job_id).await
    }

    async fn update(&self, job_id: &str, patch: JobPatch) -> Result<()> {
        let _guard = self.job_lock.lock().await;
        let mut job = self.read_job(job_id).await?;
        job.apply(patch);
        self.write_job(&job).await
    }

    async fn create(&self, job: Job) -> Result<()> {
        let _guard = self.job_lock.lock().await;
        self.write_job(&job).await
    }
}

#[async_trait::async_trait]
impl DocumentStore for FsStore {
    async fn list_documents(&self, job_id: &str) -> Result<Vec<Document>> {
        let path = self.documents_path(job_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PodsynthError::persistence(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn put_documents(&self, job_id: &str, documents: Vec<Document>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&documents)?;
        write_atomic(&self.documents_path(job_id)?, &bytes).await
    }

    async fn get_page_transcription(
        &self,
        job_id: &str,
        document_id: &str,
        page: usize,
    ) -> Result<Option<String>> {
        let path = self.transcription_path(job_id, document_id, page)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PodsynthError::persistence(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn put_page_transcription(
        &self,
        job_id: &str,
        document_id: &str,
        page: usize,
        text: &str,
    ) -> Result<()> {
        let path = self.transcription_path(job_id, document_id, page)?;
        write_atomic(&path, text.as_bytes()).await
    }
}

#[async_trait::async_trait]
impl BlobStore for FsStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let target = self.blob_path(path)?;
        write_atomic(&target, &bytes).await?;
        Ok(format!("file://{}", target.display()))
    }
}
