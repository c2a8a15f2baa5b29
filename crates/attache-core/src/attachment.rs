use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

const FILENAME_MESSAGE_PREFIX: usize = 8;
const GENERATED_ID_LEN: usize = 12;

/// Durable representation of one media file referenced by a chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub chat_id: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_url: Option<String>,
    /// Unix seconds after which `last_url` must not be served without a refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_url_until: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Whatever a caller has just learned about an attachment.
///
/// Every field is optional; `None` means "no news", never "clear this".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartialAttachment {
    pub id: Option<String>,
    pub external_id: Option<String>,
    pub chat_id: Option<String>,
    pub message_id: Option<String>,
    pub size: Option<u64>,
    pub last_url: Option<String>,
    pub last_url_until: Option<i64>,
    pub extension: Option<String>,
    pub mime_type: Option<String>,
}

impl PartialAttachment {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn with_external_id(external_id: impl Into<String>) -> Self {
        Self {
            external_id: Some(external_id.into()),
            ..Default::default()
        }
    }

    /// Lay `incoming` over `self`: present incoming fields win, absent ones keep ours.
    pub fn overlay(self, incoming: PartialAttachment) -> PartialAttachment {
        PartialAttachment {
            id: incoming.id.or(self.id),
            external_id: incoming.external_id.or(self.external_id),
            chat_id: incoming.chat_id.or(self.chat_id),
            message_id: incoming.message_id.or(self.message_id),
            size: incoming.size.or(self.size),
            last_url: incoming.last_url.or(self.last_url),
            last_url_until: incoming.last_url_until.or(self.last_url_until),
            extension: incoming.extension.or(self.extension),
            mime_type: incoming.mime_type.or(self.mime_type),
        }
    }

    /// Turn a candidate with no stored counterpart into a working record.
    ///
    /// A missing `id` is replaced by a short random token. The owning chat and
    /// message must be known at creation.
    pub fn into_record(self) -> Result<AttachmentRecord> {
        let id = self.id.unwrap_or_else(generate_id);
        let Some(chat_id) = self.chat_id else {
            return Err(Error::InvalidAttachment(format!(
                "attachment {id} has no chat_id"
            )));
        };
        let Some(message_id) = self.message_id else {
            return Err(Error::InvalidAttachment(format!(
                "attachment {id} has no message_id"
            )));
        };

        Ok(AttachmentRecord {
            id,
            external_id: self.external_id,
            chat_id,
            message_id,
            size: self.size,
            last_url: self.last_url,
            last_url_until: self.last_url_until,
            extension: self.extension,
            mime_type: self.mime_type,
        })
    }
}

impl From<AttachmentRecord> for PartialAttachment {
    fn from(r: AttachmentRecord) -> Self {
        Self {
            id: Some(r.id),
            external_id: r.external_id,
            chat_id: Some(r.chat_id),
            message_id: Some(r.message_id),
            size: r.size,
            last_url: r.last_url,
            last_url_until: r.last_url_until,
            extension: r.extension,
            mime_type: r.mime_type,
        }
    }
}

impl AttachmentRecord {
    /// Merge a candidate onto this stored record.
    ///
    /// `id`, `chat_id` and `message_id` are fixed at creation: a re-send of the
    /// same file from another chat refreshes metadata but never moves the record.
    pub fn merge(&self, candidate: &PartialAttachment) -> AttachmentRecord {
        let merged = PartialAttachment::from(self.clone()).overlay(PartialAttachment {
            id: None,
            ..candidate.clone()
        });

        AttachmentRecord {
            id: self.id.clone(),
            external_id: merged.external_id,
            chat_id: self.chat_id.clone(),
            message_id: self.message_id.clone(),
            size: merged.size,
            last_url: merged.last_url,
            last_url_until: merged.last_url_until,
            extension: merged.extension,
            mime_type: merged.mime_type,
        }
    }

    pub fn is_stale(&self, now: i64) -> bool {
        match self.last_url_until {
            Some(until) => until <= now,
            None => true,
        }
    }

    /// Deterministic object name for durable storage.
    pub fn storage_filename(&self) -> String {
        let prefix: String = self
            .message_id
            .chars()
            .take(FILENAME_MESSAGE_PREFIX)
            .collect();
        match self.extension.as_deref().filter(|e| !e.is_empty()) {
            Some(ext) => format!("{prefix}_{}.{ext}", self.id),
            None => format!("{prefix}_{}", self.id),
        }
    }
}

fn generate_id() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(GENERATED_ID_LEN)
        .collect()
}
