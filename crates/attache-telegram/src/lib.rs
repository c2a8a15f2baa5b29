//! Telegram adapter (teloxide).
//!
//! Implements the `attache-core` `PlatformMediaAdapter` over the Bot API
//! `getFile` method, plus update ingestion and a small polling bot.

use std::time::Duration;

use async_trait::async_trait;

use teloxide::{prelude::*, RequestError};

pub mod ingest;
pub mod router;

pub use teloxide::Bot;

use attache_core::{
    domain::{MediaInfo, Platform},
    errors::Error,
    ports::PlatformMediaAdapter,
    Result,
};

#[derive(Clone)]
pub struct TelegramMediaAdapter {
    bot: Bot,
    http: reqwest::Client,
}

impl TelegramMediaAdapter {
    pub fn new(bot: Bot, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("telegram http client: {e}")))?;
        Ok(Self { bot, http })
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn map_get_file_err(file_id: &str, e: RequestError) -> Error {
        if let RequestError::Api(api) = &e {
            if is_missing_file(&api.to_string()) {
                return Error::NotFound(file_id.to_string());
            }
        }
        Error::ExternalService(format!("telegram getFile failed: {e}"))
    }
}

#[async_trait]
impl PlatformMediaAdapter for TelegramMediaAdapter {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn get_media_info(&self, external_id: &str) -> Result<MediaInfo> {
        let file = self
            .bot
            .get_file(external_id.to_string())
            .await
            .map_err(|e| Self::map_get_file_err(external_id, e))?;

        if file.path.is_empty() {
            return Err(Error::ExternalService(format!(
                "telegram getFile returned no file_path for {external_id}"
            )));
        }

        let size = match file.meta.size {
            0 => None,
            n => Some(u64::from(n)),
        };

        Ok(MediaInfo {
            url: file_url(self.bot.api_url().as_str(), self.bot.token(), &file.path),
            size,
            // getFile does not report a mime type; ingestion records it when the update carries one.
            mime_type: None,
        })
    }

    async fn download_bytes(&self, url: &str) -> Result<Vec<u8>> {
        // The URL embeds the bot token: never put it in an error or log line.
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| {
                Error::ExternalService(format!("telegram download error: {}", e.without_url()))
            })?;

        if !resp.status().is_success() {
            return Err(Error::ExternalService(format!(
                "telegram download failed: {}",
                resp.status()
            )));
        }

        let bytes = resp.bytes().await.map_err(|e| {
            Error::ExternalService(format!("telegram download error: {}", e.without_url()))
        })?;
        if bytes.is_empty() {
            return Err(Error::ExternalService(
                "telegram download returned an empty body".to_string(),
            ));
        }

        tracing::debug!(bytes = bytes.len(), "telegram file downloaded");
        Ok(bytes.to_vec())
    }
}

/// Bot API file download URL: `{api}/file/bot{token}/{file_path}`.
pub fn file_url(api_url: &str, token: &str, file_path: &str) -> String {
    format!(
        "{}/file/bot{token}/{}",
        api_url.trim_end_matches('/'),
        file_path.trim_start_matches('/')
    )
}

/// Whether a Bot API error description means "this file id does not exist".
fn is_missing_file(description: &str) -> bool {
    let d = description.to_lowercase();
    d.contains("file") && (d.contains("wrong") || d.contains("invalid") || d.contains("not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_url_joins_api_token_and_path() {
        assert_eq!(
            file_url("https://api.telegram.org/", "123:abc", "photos/file_1.jpg"),
            "https://api.telegram.org/file/bot123:abc/photos/file_1.jpg"
        );
        assert_eq!(
            file_url("http://localhost:8081", "t", "/voice/f.oga"),
            "http://localhost:8081/file/bott/voice/f.oga"
        );
    }

    #[test]
    fn missing_file_descriptions_are_recognised() {
        assert!(is_missing_file("Bad Request: wrong file_id or the file is temporarily unavailable"));
        assert!(is_missing_file("Bad Request: invalid file_id"));
        assert!(!is_missing_file("Bad Request: file is too big"));
        assert!(!is_missing_file("Unauthorized"));
    }

    #[test]
    fn adapter_reports_telegram_platform() {
        let adapter = TelegramMediaAdapter::new(Bot::new("1:x"), Duration::from_secs(1)).unwrap();
        assert_eq!(adapter.platform(), Platform::Telegram);
    }

    const TOKEN: &str = "123456:SECRET-token";

    fn adapter() -> TelegramMediaAdapter {
        TelegramMediaAdapter::new(Bot::new(TOKEN), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn download_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let path = format!("/file/bot{TOKEN}/photos/file_1.jpg");
        let mock = server
            .mock("GET", path.as_str())
            .with_status(200)
            .with_body("\u{ff}\u{d8}jpeg")
            .create_async()
            .await;

        let url = file_url(&server.url(), TOKEN, "photos/file_1.jpg");
        let bytes = adapter().download_bytes(&url).await.unwrap();
        assert_eq!(bytes, "\u{ff}\u{d8}jpeg".as_bytes());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_download_is_a_failure_without_token() {
        let mut server = mockito::Server::new_async().await;
        let path = format!("/file/bot{TOKEN}/photos/gone.jpg");
        let _mock = server
            .mock("GET", path.as_str())
            .with_status(404)
            .with_body(r#"{"ok":false,"error_code":404,"description":"Not Found"}"#)
            .create_async()
            .await;

        let url = file_url(&server.url(), TOKEN, "photos/gone.jpg");
        match adapter().download_bytes(&url).await.unwrap_err() {
            Error::ExternalService(msg) => {
                assert!(msg.contains("404"), "{msg}");
                assert!(!msg.contains("SECRET"), "{msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_download_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let path = format!("/file/bot{TOKEN}/voice/empty.oga");
        let _mock = server
            .mock("GET", path.as_str())
            .with_status(200)
            .create_async()
            .await;

        let url = file_url(&server.url(), TOKEN, "voice/empty.oga");
        let err = adapter().download_bytes(&url).await.unwrap_err();
        assert!(matches!(err, Error::ExternalService(_)));
    }

    #[tokio::test]
    async fn transport_errors_never_carry_the_token() {
        // Nothing listens on port 1.
        let url = file_url("http://127.0.0.1:1", TOKEN, "photos/file_1.jpg");
        match adapter().download_bytes(&url).await.unwrap_err() {
            Error::ExternalService(msg) => {
                assert!(!msg.contains("SECRET"), "{msg}");
                assert!(!msg.contains("/file/bot"), "{msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
