use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use attache_core::{
    attachment::AttachmentRecord,
    config::Config,
    domain::{Platform, UserId},
    engine::{AttachmentResolver, ResolverSet},
    security::is_authorized,
    Result,
};

use crate::ingest::attachments_from_message;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub resolvers: Arc<ResolverSet>,
}

impl AppState {
    fn resolver(&self) -> Option<Arc<AttachmentResolver>> {
        match self.resolvers.get(Platform::Telegram) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::error!(error = %e, "telegram resolver missing");
                None
            }
        }
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    bot: Bot,
    resolvers: Arc<ResolverSet>,
) -> anyhow::Result<()> {
    // Fail at startup rather than on the first message.
    resolvers.get(Platform::Telegram)?;

    if let Ok(me) = bot.get_me().await {
        tracing::info!(username = %me.username(), "attache started");
    }
    tracing::info!(
        allowed_users = cfg.telegram_allowed_users.len(),
        platforms = ?resolvers.platforms(),
        store = %cfg.attachment_store_file.display(),
        "telegram ingestion ready"
    );

    let state = Arc::new(AppState { cfg, resolvers });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));
    if !is_authorized(user_id, &state.cfg.telegram_allowed_users) {
        let _ = bot
            .send_message(
                msg.chat.id,
                "Unauthorized. Contact the bot owner for access.",
            )
            .await;
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if let Some(ids) = parse_resolve_command(text) {
            return handle_resolve(bot, msg.chat.id, ids, state).await;
        }
        return Ok(());
    }

    let candidates = attachments_from_message(&msg);
    if candidates.is_empty() {
        return Ok(());
    }
    let Some(resolver) = state.resolver() else {
        return Ok(());
    };

    let mut ids = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match resolver.observe(candidate).await {
            Ok(record) => ids.push(record.id),
            Err(e) => tracing::warn!(error = %e, chat_id = msg.chat.id.0, "failed to record attachment"),
        }
    }
    if ids.is_empty() {
        let _ = bot
            .send_message(msg.chat.id, "📎 attachment unavailable")
            .await;
        return Ok(());
    }

    handle_resolve(bot, msg.chat.id, ids, state).await
}

async fn handle_resolve(
    bot: Bot,
    chat_id: teloxide::types::ChatId,
    ids: Vec<String>,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    if ids.is_empty() {
        let _ = bot
            .send_message(chat_id, "Usage: /resolve <attachment id> [...]")
            .await;
        return Ok(());
    }

    let Some(resolver) = state.resolver() else {
        return Ok(());
    };
    let outcomes = resolver.resolve_many(&ids).await;
    for (id, outcome) in ids.iter().zip(&outcomes) {
        if let Err(e) = outcome {
            tracing::warn!(attachment_id = %id, error = %e, "attachment resolve failed");
        }
    }

    let _ = bot
        .send_message(chat_id, format_outcomes(&ids, &outcomes))
        .await;
    Ok(())
}

/// `/resolve a b c` (or `/resolve@bot a b c`) -> ids; anything else -> None.
fn parse_resolve_command(text: &str) -> Option<Vec<String>> {
    let mut parts = text.split_whitespace();
    let command = parts.next()?;
    let name = command.split('@').next().unwrap_or(command);
    if name != "/resolve" {
        return None;
    }
    Some(parts.map(str::to_string).collect())
}

/// One line per attachment. Failures never leak internal detail to the chat.
fn format_outcomes(ids: &[String], outcomes: &[Result<AttachmentRecord>]) -> String {
    ids.iter()
        .zip(outcomes)
        .map(|(id, outcome)| match outcome {
            Ok(record) => match &record.last_url {
                Some(url) if !url.contains("/file/bot") => format!("📎 {id}: {url}"),
                Some(_) => format!("📎 {id}: available (temporary link)"),
                None => format!("📎 {id}: attachment unavailable"),
            },
            Err(e) => format!("📎 {id}: {}", e.user_message()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
