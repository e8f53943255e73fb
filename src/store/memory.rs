//! In-memory stores for tests and embedding.

use crate::error::{PodsynthError, Result};
use crate::job::{Document, Job, JobPatch};
use crate::store::{BlobStore, DocumentStore, JobStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

fn poisoned() -> PodsynthError {
    PodsynthError::persistence("store lock poisoned")
}

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
    writes: AtomicUsize,
    /// Updates start failing once this many have succeeded.
    fail_after: Mutex<Option<usize>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(job: Job) -> Self {
        let store = Self::new();
        if let Ok(mut jobs) = store.jobs.lock() {
            jobs.insert(job.id.clone(), job);
        }
        store
    }

    /// Number of successful `update` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent `update` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        let limit = fail.then(|| self.write_count());
        if let Ok(mut fail_after) = self.fail_after.lock() {
            *fail_after = limit;
        }
    }

    /// Let `successful` more updates through, then fail the rest.
    pub fn fail_after_writes(&self, successful: usize) {
        if let Ok(mut fail_after) = self.fail_after.lock() {
            *fail_after = Some(self.write_count() + successful);
        }
    }

    fn rejects_write(&self) -> bool {
        self.fail_after
            .lock()
            .map(|limit| limit.is_some_and(|n| self.write_count() >= n))
            .unwrap_or(true)
    }

    /// Snapshot without going through the async trait.
    pub fn snapshot(&self, job_id: &str) -> Option<Job> {
        self.jobs.lock().ok()?.get(job_id).cloned()
    }
}

#[async_trait::async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, job_id: &str) -> Result<Job> {
        let jobs = self.jobs.lock().map_err(|_| poisoned())?;
        jobs.get(job_id)
            .cloned()
            .ok_or_else(|| PodsynthError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    async fn update(&self, job_id: &str, patch: JobPatch) -> Result<()> {
        if self.rejects_write() {
            return Err(PodsynthError::persistence("memory store rejected write"));
        }
        let mut jobs = self.jobs.lock().map_err(|_| poisoned())?;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| PodsynthError::JobNotFound {
                job_id: job_id.to_string(),
            })?;
        job.apply(patch);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.lock().map_err(|_| poisoned())?;
        jobs.insert(job.id.clone(), job);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, Vec<Document>>>,
    transcriptions: Mutex<HashMap<(String, String, usize), String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(job_id: &str, documents: Vec<Document>) -> Self {
        let store = Self::new();
        if let Ok(mut docs) = store.documents.lock() {
            docs.insert(job_id.to_string(), documents);
        }
        store
    }

    /// Number of stored page transcriptions across all jobs.
    pub fn transcription_count(&self) -> usize {
        self.transcriptions.lock().map(|t| t.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_documents(&self, job_id: &str) -> Result<Vec<Document>> {
        let docs = self.documents.lock().map_err(|_| poisoned())?;
        Ok(docs.get(job_id).cloned().unwrap_or_default())
    }

    async fn put_documents(&self, job_id: &str, documents: Vec<Document>) -> Result<()> {
        let mut docs = self.documents.lock().map_err(|_| poisoned())?;
        docs.insert(job_id.to_string(), documents);
        Ok(())
    }

    async fn get_page_transcription(
        &self,
        job_id: &str,
        document_id: &str,
        page: usize,
    ) -> Result<Option<String>> {
        let transcriptions = self.transcriptions.lock().map_err(|_| poisoned())?;
        let key = (job_id.to_string(), document_id.to_string(), page);
        Ok(transcriptions.get(&key).cloned())
    }

    async fn put_page_transcription(
        &self,
        job_id: &str,
        document_id: &str,
        page: usize,
        text: &str,
    ) -> Result<()> {
        let mut transcriptions = self.transcriptions.lock().map_err(|_| poisoned())?;
        let key = (job_id.to_string(), document_id.to_string(), page);
        transcriptions.insert(key, text.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, (Vec<u8>, String)>>,
    fail_puts: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.lock().ok()?.get(path).map(|(b, _)| b.clone())
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(PodsynthError::persistence("memory blob store rejected write"));
        }
        let mut blobs = self.blobs.lock().map_err(|_| poisoned())?;
        blobs.insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(format!("memory://{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn job_update_applies_patch() {
        let store = MemoryJobStore::with_job(Job::new("job-1", "owner"));
        store
            .update("job-1", JobPatch::progress(20, "transcribing"))
            .await
            .unwrap();
        let job = store.get("job-1").await.unwrap();
        assert_eq!(job.progress, 20);
        assert_eq!(job.message, "transcribing");
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn missing_job_is_reported() {
        let store = MemoryJobStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, PodsynthError::JobNotFound { .. }));
    }

    #[tokio::test]
    async fn failing_writes_surface_as_persistence_errors() {
        let store = MemoryJobStore::with_job(Job::new("job-1", "owner"));
        store.set_fail_writes(true);
        let err = store
            .update("job-1", JobPatch::progress(1, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, PodsynthError::Persistence { .. }));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn fail_after_lets_some_writes_through() {
        let store = MemoryJobStore::with_job(Job::new("job-1", "owner"));
        store.fail_after_writes(2);
        store.update("job-1", JobPatch::progress(1, "a")).await.unwrap();
        store.update("job-1", JobPatch::progress(2, "b")).await.unwrap();
        assert!(store.update("job-1", JobPatch::progress(3, "c")).await.is_err());
        assert_eq!(store.snapshot("job-1").unwrap().progress, 2);
    }

    #[tokio::test]
    async fn page_transcriptions_are_keyed_by_job_document_and_page() {
        let store = MemoryDocumentStore::new();
        store.put_page_transcription("j1", "d1", 1, "one").await.unwrap();
        store.put_page_transcription("j1", "d2", 1, "other").await.unwrap();
        store.put_page_transcription("j2", "d1", 1, "reused id").await.unwrap();

        assert_eq!(
            store.get_page_transcription("j1", "d1", 1).await.unwrap().as_deref(),
            Some("one")
        );
        assert_eq!(
            store.get_page_transcription("j2", "d1", 1).await.unwrap().as_deref(),
            Some("reused id")
        );
        assert_eq!(store.get_page_transcription("j1", "d1", 2).await.unwrap(), None);
        assert_eq!(store.get_page_transcription("j3", "d1", 1).await.unwrap(), None);
        assert_eq!(store.transcription_count(), 3);
    }

    #[tokio::test]
    async fn blob_put_returns_url_and_overwrites() {
        let store = MemoryBlobStore::new();
        let url = store.put("a/b.wav", vec![1, 2], "audio/wav").await.unwrap();
        assert_eq!(url, "memory://a/b.wav");
        store.put("a/b.wav", vec![3], "audio/wav").await.unwrap();
        assert_eq!(store.get("a/b.wav"), Some(vec![3]));
        assert_eq!(store.len(), 1);
    }
}
