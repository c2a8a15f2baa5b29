//! Attachment store implementations.
//!
//! Production deployments put the ORM behind `AttachmentStore`; these two keep
//! the engine usable standalone (memory for tests, a JSON file for the bot).

mod file;
mod memory;

use std::collections::HashMap;

use crate::{attachment::AttachmentRecord, errors::Error, Result};

pub use file::JsonFileAttachmentStore;
pub use memory::MemoryAttachmentStore;

/// Records keyed by id, plus the `external_id -> id` secondary index.
#[derive(Clone, Debug, Default)]
pub(crate) struct AttachmentIndex {
    by_id: HashMap<String, AttachmentRecord>,
    by_external_id: HashMap<String, String>,
}

impl AttachmentIndex {
    pub(crate) fn from_records(records: Vec<AttachmentRecord>) -> Result<Self> {
        let mut index = Self::default();
        for r in records {
            index.upsert(r)?;
        }
        Ok(index)
    }

    pub(crate) fn get(&self, id: &str) -> Option<AttachmentRecord> {
        self.by_id.get(id).cloned()
    }

    pub(crate) fn get_by_external_id(&self, external_id: &str) -> Option<AttachmentRecord> {
        let id = self.by_external_id.get(external_id)?;
        self.by_id.get(id).cloned()
    }

    pub(crate) fn records(&self) -> Vec<AttachmentRecord> {
        let mut out: Vec<AttachmentRecord> = self.by_id.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Insert or replace by id, refusing to steal another record's external id.
    pub(crate) fn upsert(&mut self, record: AttachmentRecord) -> Result<AttachmentRecord> {
        if let Some(ext) = &record.external_id {
            if let Some(owner) = self.by_external_id.get(ext) {
                if owner != &record.id {
                    return Err(Error::Store(format!(
                        "external id {ext} already belongs to attachment {owner}"
                    )));
                }
            }
        }

        if let Some(previous) = self.by_id.get(&record.id) {
            if let Some(old_ext) = &previous.external_id {
                if record.external_id.as_ref() != Some(old_ext) {
                    self.by_external_id.remove(old_ext);
                }
            }
        }

        if let Some(ext) = &record.external_id {
            self.by_external_id.insert(ext.clone(), record.id.clone());
        }
        self.by_id.insert(record.id.clone(), record.clone());
        Ok(record)
    }
}
