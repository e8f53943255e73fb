//! Persistence collaborators: job records, documents and page transcriptions,
//! and audio blobs.
//!
//! The pipeline is the only writer. Every write is keyed by job, page, or
//! blob path and is safe to repeat.

pub mod fs;
pub mod memory;

use crate::error::Result;
use crate::job::{Document, Job, JobPatch};

pub use fs::FsStore;
pub use memory::{MemoryBlobStore, MemoryDocumentStore, MemoryJobStore};

/// Job records.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, job_id: &str) -> Result<Job>;

    /// Read-modify-write of one job record.
    async fn update(&self, job_id: &str, patch: JobPatch) -> Result<()>;

    async fn create(&self, job: Job) -> Result<()>;
}

/// Source documents and their per-page transcriptions.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_documents(&self, job_id: &str) -> Result<Vec<Document>>;

    async fn put_documents(&self, job_id: &str, documents: Vec<Document>) -> Result<()>;

    /// Transcriptions belong to the job that produced them. Page numbers are
    /// 1-based.
    async fn get_page_transcription(
        &self,
        job_id: &str,
        document_id: &str,
        page: usize,
    ) -> Result<Option<String>>;

    async fn put_page_transcription(
        &self,
        job_id: &str,
        document_id: &str,
        page: usize,
        text: &str,
    ) -> Result<()>;
}

/// Binary blobs addressed by path.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return a URL the player can fetch.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}
