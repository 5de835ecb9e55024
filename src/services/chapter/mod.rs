// Chapter source - resolves a chapter URL into page image URLs

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::core::errors::{ChapterError, ChapterResult};
use crate::core::types::Chapter;

static CHAPTER_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/chapter/([a-f0-9-]+)").unwrap());

/// Something that can turn a chapter URL into an ordered list of page URLs
#[async_trait]
pub trait ChapterSource: Send + Sync {
    async fn fetch_chapter(&self, chapter_url: &str) -> ChapterResult<Chapter>;
}

/// Extract the chapter id from a MangaDex chapter URL
pub fn extract_chapter_id(url: &str) -> Option<&str> {
    CHAPTER_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Build a page URL from an at-home server response
pub fn page_url(base_url: &str, hash: &str, file_name: &str) -> String {
    format!("{}/data/{}/{}", base_url.trim_end_matches('/'), hash, file_name)
}

#[derive(Debug, Deserialize)]
struct ChapterEnvelope {
    data: Option<ChapterData>,
}

#[derive(Debug, Deserialize)]
struct ChapterData {
    attributes: Option<ChapterAttributes>,
}

#[derive(Debug, Deserialize)]
struct ChapterAttributes {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeResponse {
    base_url: Option<String>,
    chapter: Option<AtHomeChapter>,
}

#[derive(Debug, Deserialize)]
struct AtHomeChapter {
    hash: Option<String>,
    data: Option<Vec<String>>,
}

/// MangaDex API client
pub struct MangaDexClient {
    http_client: reqwest::Client,
    api_base: String,
}

impl MangaDexClient {
    pub fn new(api_base: impl Into<String>, user_agent: &str, timeout: Duration) -> ChapterResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, endpoint: String) -> ChapterResult<T> {
        let response = self.http_client.get(&endpoint).send().await?;

        if !response.status().is_success() {
            return Err(ChapterError::UpstreamStatus {
                endpoint,
                status: response.status().as_u16(),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

fn chapter_from_parts(
    chapter_id: &str,
    envelope: ChapterEnvelope,
    at_home: AtHomeResponse,
) -> ChapterResult<Chapter> {
    let title = envelope
        .data
        .and_then(|d| d.attributes)
        .and_then(|a| a.title);

    let base_url = at_home
        .base_url
        .ok_or(ChapterError::MalformedResponse("baseUrl"))?;
    let chapter = at_home
        .chapter
        .ok_or(ChapterError::MalformedResponse("chapter"))?;
    let hash = chapter
        .hash
        .ok_or(ChapterError::MalformedResponse("chapter.hash"))?;
    let files = chapter
        .data
        .ok_or(ChapterError::MalformedResponse("chapter.data"))?;

    let images: Vec<String> = files
        .iter()
        .map(|file| page_url(&base_url, &hash, file))
        .collect();

    Ok(Chapter {
        chapter_id: chapter_id.to_string(),
        title,
        pages: images.len(),
        images,
    })
}

#[async_trait]
impl ChapterSource for MangaDexClient {
    #[instrument(skip(self))]
    async fn fetch_chapter(&self, chapter_url: &str) -> ChapterResult<Chapter> {
        let chapter_url = chapter_url.trim();
        if chapter_url.is_empty() {
            return Err(ChapterError::MissingUrl);
        }

        let chapter_id = extract_chapter_id(chapter_url)
            .ok_or_else(|| ChapterError::InvalidUrl(chapter_url.to_string()))?;

        debug!("Fetching chapter {}", chapter_id);

        let envelope: ChapterEnvelope = self
            .get_json(format!("{}/chapter/{}", self.api_base, chapter_id))
            .await?;
        let at_home: AtHomeResponse = self
            .get_json(format!("{}/at-home/server/{}", self.api_base, chapter_id))
            .await?;

        let chapter = chapter_from_parts(chapter_id, envelope, at_home)?;
        info!("Chapter {} has {} pages", chapter.chapter_id, chapter.pages);
        Ok(chapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extract_chapter_id() {
        assert_eq!(
            extract_chapter_id("https://mangadex.org/chapter/a1b2c3d4-0000-4e5f-9abc-def012345678/1"),
            Some("a1b2c3d4-0000-4e5f-9abc-def012345678")
        );
        assert_eq!(extract_chapter_id("https://mangadex.org/title/abc"), None);
        assert_eq!(extract_chapter_id("https://mangadex.org/chapter/XYZ"), None);
    }

    #[test]
    fn test_page_urls_from_at_home() {
        let envelope: ChapterEnvelope =
            serde_json::from_str(r#"{"data":{"attributes":{"title":"The Beginning"}}}"#).unwrap();
        let at_home: AtHomeResponse = serde_json::from_str(
            r#"{"result":"ok","baseUrl":"https://uploads.example.org","chapter":{"hash":"h4sh","data":["1-a.png","2-b.png"],"dataSaver":[]}}"#,
        )
        .unwrap();

        let chapter = chapter_from_parts("abc-123", envelope, at_home).unwrap();
        assert_eq!(chapter.title.as_deref(), Some("The Beginning"));
        assert_eq!(chapter.pages, 2);
        assert_eq!(
            chapter.images,
            vec![
                "https://uploads.example.org/data/h4sh/1-a.png",
                "https://uploads.example.org/data/h4sh/2-b.png",
            ]
        );
    }

    #[test]
    fn test_malformed_at_home_response() {
        let envelope: ChapterEnvelope = serde_json::from_str(r#"{"data":null}"#).unwrap();
        let at_home: AtHomeResponse =
            serde_json::from_str(r#"{"baseUrl":"https://x","chapter":{"data":[]}}"#).unwrap();

        assert!(matches!(
            chapter_from_parts("abc", envelope, at_home),
            Err(ChapterError::MalformedResponse("chapter.hash"))
        ));
    }

    #[tokio::test]
    async fn test_input_errors_before_any_request() {
        let client = MangaDexClient::new("http://127.0.0.1:9", "test-agent", Duration::from_secs(1)).unwrap();

        assert!(matches!(client.fetch_chapter("   ").await, Err(ChapterError::MissingUrl)));
        assert!(matches!(
            client.fetch_chapter("https://mangadex.org/title/whatever").await,
            Err(ChapterError::InvalidUrl(_))
        ));
    }

    const CHAPTER_ID: &str = "a1b2c3d4-0000-4e5f-9abc-def012345678";

    #[tokio::test]
    async fn test_fetch_chapter_from_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/chapter/{}", CHAPTER_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"attributes": {"title": "Prologue"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/at-home/server/{}", CHAPTER_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "baseUrl": "https://uploads.example.org",
                "chapter": {"hash": "h4sh", "data": ["1.png", "2.png", "3.png"]}
            })))
            .mount(&server)
            .await;

        let client = MangaDexClient::new(format!("{}/", server.uri()), "test-agent", Duration::from_secs(5)).unwrap();
        let chapter = client
            .fetch_chapter(&format!("https://mangadex.org/chapter/{}/1", CHAPTER_ID))
            .await
            .unwrap();

        assert_eq!(chapter.chapter_id, CHAPTER_ID);
        assert_eq!(chapter.title.as_deref(), Some("Prologue"));
        assert_eq!(chapter.pages, 3);
        assert_eq!(chapter.images[2], "https://uploads.example.org/data/h4sh/3.png");
    }

    #[tokio::test]
    async fn test_upstream_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = MangaDexClient::new(server.uri(), "test-agent", Duration::from_secs(5)).unwrap();
        let result = client
            .fetch_chapter(&format!("https://mangadex.org/chapter/{}", CHAPTER_ID))
            .await;

        match result {
            Err(e @ ChapterError::UpstreamStatus { status: 404, .. }) => {
                assert!(!e.is_input_error());
            }
            other => panic!("expected UpstreamStatus, got {:?}", other),
        }
        // The at-home lookup is never attempted
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}
