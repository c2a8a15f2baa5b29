use std::sync::Arc;

use attache_core::{
    config::Config,
    engine::{AttachmentResolver, ResolverSet},
    ports::{AttachmentStore, DurableUploader},
    store::JsonFileAttachmentStore,
};
use attache_storage::{DisabledUploader, HttpUploader};
use attache_telegram::{Bot, TelegramMediaAdapter};
use attache_whatsapp::WhatsAppMediaAdapter;

#[tokio::main]
async fn main() -> Result<(), attache_core::Error> {
    attache_core::logging::init("attache")?;

    let cfg = Arc::new(Config::load()?);
    let bot = Bot::new(cfg.require_telegram_token()?);

    let store: Arc<dyn AttachmentStore> =
        Arc::new(JsonFileAttachmentStore::open(&cfg.attachment_store_file).await?);

    let uploader: Arc<dyn DurableUploader> = match &cfg.storage_upload_url {
        Some(upload_url) => Arc::new(HttpUploader::new(
            upload_url.clone(),
            cfg.storage_public_url
                .clone()
                .unwrap_or_else(|| upload_url.clone()),
            cfg.storage_auth_token.clone(),
            cfg.http_timeout,
        )?),
        None => {
            tracing::warn!("STORAGE_UPLOAD_URL not set; attachments will keep origin URLs");
            Arc::new(DisabledUploader)
        }
    };

    let telegram = Arc::new(TelegramMediaAdapter::new(bot.clone(), cfg.http_timeout)?);
    let mut resolvers = ResolverSet::new().with(AttachmentResolver::new(
        store.clone(),
        telegram,
        uploader.clone(),
        cfg.resolver,
    ));

    // Selected by platform wherever WhatsApp media ids enter the system.
    match &cfg.whatsapp_access_token {
        Some(token) => {
            let whatsapp = Arc::new(WhatsAppMediaAdapter::new(
                token.clone(),
                cfg.whatsapp_graph_url.clone(),
                cfg.whatsapp_graph_version.clone(),
                cfg.http_timeout,
            )?);
            resolvers = resolvers.with(AttachmentResolver::new(
                store,
                whatsapp,
                uploader,
                cfg.resolver,
            ));
        }
        None => tracing::info!("WHATSAPP_ACCESS_TOKEN not set; whatsapp resolver disabled"),
    }

    attache_telegram::router::run_polling(cfg, bot, Arc::new(resolvers))
        .await
        .map_err(|e| attache_core::Error::ExternalService(format!("telegram bot failed: {e}")))?;

    Ok(())
}
