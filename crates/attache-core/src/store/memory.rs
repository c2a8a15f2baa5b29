use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{attachment::AttachmentRecord, ports::AttachmentStore, Result};

use super::AttachmentIndex;

/// In-process store. Every operation holds one lock, so upserts are atomic.
#[derive(Debug, Default)]
pub struct MemoryAttachmentStore {
    inner: Mutex<AttachmentIndex>,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<AttachmentRecord>) -> Result<Self> {
        Ok(Self {
            inner: Mutex::new(AttachmentIndex::from_records(records)?),
        })
    }

    pub async fn records(&self) -> Vec<AttachmentRecord> {
        self.inner.lock().await.records()
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn get(&self, id: &str) -> Result<Option<AttachmentRecord>> {
        Ok(self.inner.lock().await.get(id))
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<AttachmentRecord>> {
        Ok(self.inner.lock().await.get_by_external_id(external_id))
    }

    async fn upsert(&self, record: AttachmentRecord) -> Result<AttachmentRecord> {
        self.inner.lock().await.upsert(record)
    }
}
