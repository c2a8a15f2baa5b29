//! Attachment resolution and refresh.
//!
//! Every feature that hands media to a downstream tool (vision, transcription,
//! document search) or re-serves it to a user goes through
//! [`AttachmentResolver`], so the freshness policy lives in exactly one place:
//!
//! - identity: find the stored record by id, else by external id, and overlay
//!   the candidate onto it
//! - fresh (`last_url_until > now`): persist and return, no network
//! - stale: look the file up on the origin platform, download it, sniff the
//!   format if unknown, migrate it to durable storage, persist
//!
//! Origin failures are fatal to the one attachment. A durable-storage failure
//! is not: the record keeps the origin URL with the platform's short TTL.
//!
//! There is no per-id locking. Two callers refreshing the same stale record
//! may both run the full cycle; the last upsert wins and both results are valid.

use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::stream::{self, StreamExt};

use crate::{
    attachment::{AttachmentRecord, PartialAttachment},
    domain::Platform,
    errors::Error,
    ports::{AttachmentStore, DurableUploader, PlatformMediaAdapter},
    sniff::{detect_image_format, extension_for_mime},
    Result,
};

const GENERIC_MIME: &str = "application/octet-stream";

#[derive(Clone, Copy, Debug)]
pub struct ResolverConfig {
    /// Lifetime assigned to a URL after migration to durable storage.
    pub durable_ttl: Duration,
    /// Lifetime assumed for Telegram `file_path` links.
    pub telegram_url_ttl: Duration,
    /// Lifetime assumed for WhatsApp Graph media URLs.
    pub whatsapp_url_ttl: Duration,
    /// Upper bound on concurrent refreshes inside one `resolve_many` call.
    pub concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            durable_ttl: Duration::from_secs(10 * 365 * 24 * 60 * 60),
            telegram_url_ttl: Duration::from_secs(60 * 60),
            whatsapp_url_ttl: Duration::from_secs(5 * 60),
            concurrency: 8,
        }
    }
}

impl ResolverConfig {
    pub fn origin_ttl(&self, platform: Platform) -> Duration {
        match platform {
            Platform::Telegram => self.telegram_url_ttl,
            Platform::WhatsApp => self.whatsapp_url_ttl,
        }
    }
}

/// Resolves attachment references for one source platform.
pub struct AttachmentResolver {
    store: Arc<dyn AttachmentStore>,
    adapter: Arc<dyn PlatformMediaAdapter>,
    uploader: Arc<dyn DurableUploader>,
    cfg: ResolverConfig,
}

impl AttachmentResolver {
    pub fn new(
        store: Arc<dyn AttachmentStore>,
        adapter: Arc<dyn PlatformMediaAdapter>,
        uploader: Arc<dyn DurableUploader>,
        cfg: ResolverConfig,
    ) -> Self {
        Self {
            store,
            adapter,
            uploader,
            cfg,
        }
    }

    pub fn platform(&self) -> Platform {
        self.adapter.platform()
    }

    /// Record that an attachment was seen, without touching the network.
    ///
    /// Used at ingestion time. A record created here has no expiry and is
    /// therefore stale until its first resolve.
    pub async fn observe(&self, candidate: PartialAttachment) -> Result<AttachmentRecord> {
        let record = self.working_record(candidate).await?;
        tracing::debug!(
            attachment_id = %record.id,
            external_id = record.external_id.as_deref().unwrap_or(""),
            platform = %self.platform(),
            "attachment observed"
        );
        self.store.upsert(record).await
    }

    /// Merge `candidate` with what is stored and make sure the result is servable.
    pub async fn refresh(&self, candidate: PartialAttachment) -> Result<AttachmentRecord> {
        let record = self.working_record(candidate).await?;
        self.refresh_record(record).await
    }

    /// Resolve previously observed attachments, failing on the first error.
    ///
    /// All ids are processed before the error is returned, so one bad id never
    /// prevents its siblings from being refreshed and persisted.
    pub async fn resolve_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<AttachmentRecord>> {
        self.resolve_many(ids).await.into_iter().collect()
    }

    /// Resolve previously observed attachments, one outcome per id, in input order.
    pub async fn resolve_many<S: AsRef<str>>(&self, ids: &[S]) -> Vec<Result<AttachmentRecord>> {
        // Owned ids keep the buffered futures free of borrows from `ids`.
        let ids: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();
        stream::iter(ids)
            .map(|id| async move { self.resolve_one(&id).await })
            .buffered(self.cfg.concurrency.max(1))
            .collect()
            .await
    }

    async fn resolve_one(&self, id: &str) -> Result<AttachmentRecord> {
        let Some(record) = self.store.get(id).await? else {
            return Err(Error::NotFound(id.to_string()));
        };
        self.refresh_record(record).await
    }

    async fn working_record(&self, candidate: PartialAttachment) -> Result<AttachmentRecord> {
        match self.find_stored(&candidate).await? {
            Some(stored) => Ok(stored.merge(&candidate)),
            None => candidate.into_record(),
        }
    }

    async fn find_stored(&self, candidate: &PartialAttachment) -> Result<Option<AttachmentRecord>> {
        if let Some(id) = &candidate.id {
            if let Some(stored) = self.store.get(id).await? {
                return Ok(Some(stored));
            }
        }
        match &candidate.external_id {
            Some(ext) => self.store.get_by_external_id(ext).await,
            None => Ok(None),
        }
    }

    async fn refresh_record(&self, mut record: AttachmentRecord) -> Result<AttachmentRecord> {
        if !record.is_stale(unix_now()) {
            return self.store.upsert(record).await;
        }

        let Some(external_id) = record.external_id.clone() else {
            return Err(Error::MissingExternalId(record.id));
        };
        let platform = self.platform();

        let info = self
            .adapter
            .get_media_info(&external_id)
            .await
            .map_err(|e| {
                Error::ExternalService(format!("media info unavailable: {}", detail(&e)))
            })?;

        if info.size.is_some() {
            record.size = info.size;
        }
        if let Some(mime) = info.mime_type.filter(|m| !m.eq_ignore_ascii_case(GENERIC_MIME)) {
            record.mime_type = Some(mime);
        }

        let bytes = self
            .adapter
            .download_bytes(&info.url)
            .await
            .map_err(|e| Error::ExternalService(format!("download failed: {}", detail(&e))))?;

        if record.size.is_none() {
            record.size = Some(bytes.len() as u64);
        }
        infer_format(&mut record, &bytes);

        let filename = record.storage_filename();
        match self.uploader.upload(bytes, &filename).await {
            Ok(url) => {
                record.last_url = Some(url);
                record.last_url_until = Some(expires_at(self.cfg.durable_ttl));
                tracing::info!(
                    attachment_id = %record.id,
                    %platform,
                    filename = %filename,
                    "attachment migrated to durable storage"
                );
            }
            Err(e) => {
                record.last_url = Some(info.url);
                record.last_url_until = Some(expires_at(self.cfg.origin_ttl(platform)));
                tracing::warn!(
                    attachment_id = %record.id,
                    %platform,
                    error = %e,
                    "durable upload failed; serving origin url"
                );
            }
        }

        self.store.upsert(record).await
    }
}

/// One resolver per source platform, selected where the platform is known.
///
/// Resolvers usually share one store and one uploader; only the media adapter
/// (and with it the origin TTL) differs.
#[derive(Clone, Default)]
pub struct ResolverSet {
    by_platform: HashMap<Platform, Arc<AttachmentResolver>>,
}

impl ResolverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resolver` under its adapter's platform, replacing any previous one.
    pub fn with(mut self, resolver: AttachmentResolver) -> Self {
        self.by_platform.insert(resolver.platform(), Arc::new(resolver));
        self
    }

    pub fn get(&self, platform: Platform) -> Result<Arc<AttachmentResolver>> {
        self.by_platform
            .get(&platform)
            .cloned()
            .ok_or_else(|| Error::Config(format!("no resolver configured for {platform}")))
    }

    pub fn contains(&self, platform: Platform) -> bool {
        self.by_platform.contains_key(&platform)
    }

    pub fn platforms(&self) -> Vec<Platform> {
        let mut out: Vec<Platform> = self.by_platform.keys().copied().collect();
        out.sort_by_key(|p| p.as_str());
        out
    }
}

/// Fill in extension / mime type when the platform left them out.
fn infer_format(record: &mut AttachmentRecord, bytes: &[u8]) {
    if record.extension.is_none() && record.mime_type.is_none() {
        if let Some(fmt) = detect_image_format(bytes) {
            record.extension = Some(fmt.extension().to_string());
            record.mime_type = Some(fmt.mime_type().to_string());
        }
        return;
    }
    if record.extension.is_none() {
        record.extension = record
            .mime_type
            .as_deref()
            .and_then(extension_for_mime)
            .map(str::to_string);
    }
}

fn detail(e: &Error) -> String {
    match e {
        Error::ExternalService(s) | Error::NotFound(s) => s.clone(),
        other => other.to_string(),
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn expires_at(ttl: Duration) -> i64 {
    let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    unix_now().saturating_add(secs)
}
