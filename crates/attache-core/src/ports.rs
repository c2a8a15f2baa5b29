use async_trait::async_trait;

use crate::{
    attachment::AttachmentRecord,
    domain::{MediaInfo, Platform},
    Result,
};

/// Persistence for attachment records.
///
/// Implementations must make `upsert` atomic per record and must refuse to
/// store two records sharing one `external_id`.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<AttachmentRecord>>;
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<AttachmentRecord>>;
    async fn upsert(&self, record: AttachmentRecord) -> Result<AttachmentRecord>;
}

/// Hexagonal port for a source platform's media API (Telegram, WhatsApp).
///
/// Each call is a single attempt with a bounded timeout. Retries belong to the
/// caller.
#[async_trait]
pub trait PlatformMediaAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Resolve a platform file identifier to a live, short-lived origin URL.
    ///
    /// Fails with `Error::NotFound` when the platform does not know the id and
    /// `Error::ExternalService` for everything else.
    async fn get_media_info(&self, external_id: &str) -> Result<MediaInfo>;

    /// Fetch the bytes behind a platform URL. Non-2xx and empty bodies fail.
    async fn download_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// Long-lived object storage that hosts media independently of the origin.
#[async_trait]
pub trait DurableUploader: Send + Sync {
    /// Store `bytes` under `filename` and return a long-lived URL.
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<String>;
}
