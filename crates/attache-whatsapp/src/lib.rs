//! WhatsApp adapter (Cloud API, Graph Media endpoints).
//!
//! A media id from a webhook is resolved with `GET /{version}/{media_id}`, which
//! returns a download URL that stays valid for a few minutes. Downloading that
//! URL needs the same bearer token.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use attache_core::{
    domain::{MediaInfo, Platform},
    errors::Error,
    ports::PlatformMediaAdapter,
    Result,
};

/// Graph error code for "object does not exist / unsupported get request".
const GRAPH_UNKNOWN_OBJECT: i64 = 100;

#[derive(Clone, Debug)]
pub struct WhatsAppMediaAdapter {
    access_token: String,
    graph_url: String,
    version: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GraphMedia {
    url: Option<String>,
    mime_type: Option<String>,
    // Documented as a string, observed as a number too.
    file_size: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

impl WhatsAppMediaAdapter {
    pub fn new(
        access_token: impl Into<String>,
        graph_url: impl Into<String>,
        version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("whatsapp http client: {e}")))?;
        Ok(Self {
            access_token: access_token.into(),
            graph_url: graph_url.into().trim_end_matches('/').to_string(),
            version: version.into(),
            http,
        })
    }

    pub fn media_endpoint(&self, media_id: &str) -> String {
        format!("{}/{}/{}", self.graph_url, self.version, media_id)
    }
}

#[async_trait]
impl PlatformMediaAdapter for WhatsAppMediaAdapter {
    fn platform(&self) -> Platform {
        Platform::WhatsApp
    }

    async fn get_media_info(&self, external_id: &str) -> Result<MediaInfo> {
        let resp = self
            .http
            .get(self.media_endpoint(external_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| Error::ExternalService(format!("whatsapp request error: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::ExternalService(format!("whatsapp read error: {e}")))?;

        if !status.is_success() {
            return Err(classify_graph_error(external_id, status.as_u16(), &body));
        }

        parse_media_info(&body)
    }

    async fn download_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| Error::ExternalService(format!("whatsapp download error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ExternalService(format!(
                "whatsapp download failed: {status} {}",
                truncate(&body)
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::ExternalService(format!("whatsapp download error: {e}")))?;
        if bytes.is_empty() {
            return Err(Error::ExternalService(
                "whatsapp download returned an empty body".to_string(),
            ));
        }

        tracing::debug!(bytes = bytes.len(), "whatsapp media downloaded");
        Ok(bytes.to_vec())
    }
}

fn parse_media_info(body: &str) -> Result<MediaInfo> {
    let media: GraphMedia = serde_json::from_str(body)
        .map_err(|e| Error::ExternalService(format!("whatsapp json error: {e}")))?;

    let url = media
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| Error::ExternalService("whatsapp media response has no url".to_string()))?;

    let size = match media.file_size {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    Ok(MediaInfo {
        url,
        size,
        mime_type: media.mime_type.filter(|m| !m.trim().is_empty()),
    })
}

fn classify_graph_error(media_id: &str, status: u16, body: &str) -> Error {
    let graph = serde_json::from_str::<GraphErrorBody>(body).ok();
    let unknown_object = graph
        .as_ref()
        .map(|g| g.error.code == GRAPH_UNKNOWN_OBJECT)
        .unwrap_or(false);

    if status == 404 || (status == 400 && unknown_object) {
        return Error::NotFound(media_id.to_string());
    }

    let detail = match graph {
        Some(g) => g.error.message,
        None => truncate(body),
    };
    Error::ExternalService(format!("whatsapp media lookup failed: {status} {detail}"))
}

fn truncate(s: &str) -> String {
    s.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(base: &str) -> WhatsAppMediaAdapter {
        WhatsAppMediaAdapter::new("wa-token", base, "v19.0", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn parses_string_and_numeric_sizes() {
        let a = parse_media_info(
            r#"{"url":"https://lookaside/x","mime_type":"image/jpeg","file_size":"303833","id":"1"}"#,
        )
        .unwrap();
        assert_eq!(a.url, "https://lookaside/x");
        assert_eq!(a.size, Some(303_833));
        assert_eq!(a.mime_type.as_deref(), Some("image/jpeg"));

        let b = parse_media_info(r#"{"url":"https://lookaside/y","file_size":12}"#).unwrap();
        assert_eq!(b.size, Some(12));
        assert_eq!(b.mime_type, None);
    }

    #[test]
    fn response_without_url_is_an_error() {
        let err = parse_media_info(r#"{"id":"1"}"#).unwrap_err();
        assert!(matches!(err, Error::ExternalService(_)));
    }

    #[test]
    fn unknown_media_maps_to_not_found() {
        let body = r#"{"error":{"message":"Unsupported get request.","type":"GraphMethodException","code":100}}"#;
        assert!(matches!(
            classify_graph_error("m1", 400, body),
            Error::NotFound(ref id) if id == "m1"
        ));
        assert!(matches!(classify_graph_error("m1", 404, ""), Error::NotFound(_)));

        match classify_graph_error("m1", 401, r#"{"error":{"message":"bad token","code":190}}"#) {
            Error::ExternalService(msg) => assert!(msg.contains("bad token")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn media_lookup_sends_bearer_token_to_versioned_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v19.0/12345")
            .match_header("authorization", "Bearer wa-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"url":"https://lookaside/x","mime_type":"audio/ogg","file_size":"5"}"#)
            .create_async()
            .await;

        let info = adapter(&server.url()).get_media_info("12345").await.unwrap();
        assert_eq!(info.url, "https://lookaside/x");
        assert_eq!(info.mime_type.as_deref(), Some("audio/ogg"));
        assert_eq!(info.size, Some(5));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_media_id_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v19.0/gone")
            .with_status(400)
            .with_body(r#"{"error":{"message":"Unsupported get request.","code":100}}"#)
            .create_async()
            .await;

        let err = adapter(&server.url()).get_media_info("gone").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref id) if id == "gone"));
    }

    #[tokio::test]
    async fn download_sends_bearer_token_and_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/media")
            .match_header("authorization", "Bearer wa-token")
            .with_status(200)
            .with_body("GIF89a....")
            .create_async()
            .await;

        let base = server.url();
        let bytes = adapter(&base)
            .download_bytes(&format!("{base}/media"))
            .await
            .unwrap();
        assert_eq!(bytes, b"GIF89a....");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_download_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/media")
            .with_status(200)
            .create_async()
            .await;

        let base = server.url();
        let err = adapter(&base)
            .download_bytes(&format!("{base}/media"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExternalService(_)));
    }

    #[tokio::test]
    async fn non_success_download_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/media")
            .with_status(410)
            .with_body("expired")
            .create_async()
            .await;

        let base = server.url();
        let err = adapter(&base)
            .download_bytes(&format!("{base}/media"))
            .await
            .unwrap_err();
        match err {
            Error::ExternalService(msg) => assert!(msg.contains("410"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
