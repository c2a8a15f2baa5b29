use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{attachment::AttachmentRecord, ports::AttachmentStore, Result};

use super::AttachmentIndex;

/// Store persisted as a single JSON document.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// reader never observes a half-written store.
#[derive(Debug)]
pub struct JsonFileAttachmentStore {
    path: PathBuf,
    inner: Mutex<AttachmentIndex>,
}

impl JsonFileAttachmentStore {
    /// Open (or lazily create) the store at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let index = match load_records(&path).await? {
            Some(records) => AttachmentIndex::from_records(records)?,
            None => AttachmentIndex::default(),
        };
        tracing::debug!(path = %path.display(), records = index.len(), "attachment store opened");
        Ok(Self {
            path,
            inner: Mutex::new(index),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AttachmentStore for JsonFileAttachmentStore {
    async fn get(&self, id: &str) -> Result<Option<AttachmentRecord>> {
        Ok(self.inner.lock().await.get(id))
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<AttachmentRecord>> {
        Ok(self.inner.lock().await.get_by_external_id(external_id))
    }

    async fn upsert(&self, record: AttachmentRecord) -> Result<AttachmentRecord> {
        let mut guard = self.inner.lock().await;
        let mut next = guard.clone();
        let saved = next.upsert(record)?;
        save_records(&self.path, &next.records()).await?;
        *guard = next;
        Ok(saved)
    }
}

async fn load_records(path: &Path) -> Result<Option<Vec<AttachmentRecord>>> {
    let txt = match tokio::fs::read_to_string(path).await {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if txt.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&txt)?))
}

async fn save_records(path: &Path, records: &[AttachmentRecord]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let tmp = path.with_extension("json.tmp");
    let txt = serde_json::to_string_pretty(records)?;
    tokio::fs::write(&tmp, txt).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
