use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{engine::ResolverConfig, errors::Error, Result};

/// Typed configuration, loaded from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: Option<String>,
    pub telegram_allowed_users: Vec<i64>,

    // WhatsApp Cloud API
    pub whatsapp_access_token: Option<String>,
    pub whatsapp_graph_url: String,
    pub whatsapp_graph_version: String,

    // Durable storage
    pub storage_upload_url: Option<String>,
    pub storage_public_url: Option<String>,
    pub storage_auth_token: Option<String>,

    // Persistence
    pub attachment_store_file: PathBuf,

    // Network
    pub http_timeout: Duration,

    // Resolution policy
    pub resolver: ResolverConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").and_then(non_empty);
        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));

        let whatsapp_access_token = env_str("WHATSAPP_ACCESS_TOKEN").and_then(non_empty);
        let whatsapp_graph_url = env_str("WHATSAPP_GRAPH_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://graph.facebook.com".to_string());
        let whatsapp_graph_version = env_str("WHATSAPP_GRAPH_VERSION")
            .and_then(non_empty)
            .unwrap_or_else(|| "v19.0".to_string());

        let storage_upload_url = env_str("STORAGE_UPLOAD_URL").and_then(non_empty);
        // Public URL defaults to the upload URL (plain HTTP buckets serve what they accept).
        let storage_public_url = env_str("STORAGE_PUBLIC_URL")
            .and_then(non_empty)
            .or_else(|| storage_upload_url.clone());
        let storage_auth_token = env_str("STORAGE_AUTH_TOKEN").and_then(non_empty);

        let attachment_store_file = env_path("ATTACHMENT_STORE_FILE")
            .unwrap_or_else(|| PathBuf::from("/tmp/attache-attachments.json"));

        let http_timeout = Duration::from_millis(env_u64("HTTP_TIMEOUT_MS").unwrap_or(30_000));

        let defaults = ResolverConfig::default();
        let resolver = ResolverConfig {
            durable_ttl: env_u64("DURABLE_URL_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.durable_ttl),
            telegram_url_ttl: env_u64("TELEGRAM_URL_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.telegram_url_ttl),
            whatsapp_url_ttl: env_u64("WHATSAPP_URL_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.whatsapp_url_ttl),
            concurrency: env_usize("RESOLVE_CONCURRENCY")
                .unwrap_or(defaults.concurrency)
                .max(1),
        };

        if resolver.durable_ttl <= resolver.telegram_url_ttl
            || resolver.durable_ttl <= resolver.whatsapp_url_ttl
        {
            return Err(Error::Config(
                "DURABLE_URL_TTL_SECS must exceed the platform URL TTLs".to_string(),
            ));
        }

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            whatsapp_access_token,
            whatsapp_graph_url,
            whatsapp_graph_version,
            storage_upload_url,
            storage_public_url,
            storage_auth_token,
            attachment_store_file,
            http_timeout,
            resolver,
        })
    }

    pub fn require_telegram_token(&self) -> Result<&str> {
        self.telegram_bot_token.as_deref().ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
