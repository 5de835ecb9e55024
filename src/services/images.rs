// Image source - fetches page images with the headers the CDN expects

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::core::errors::ImageLoadError;

/// Raw page image as served upstream
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ImageLoadError>;
}

/// HTTP image source sending a browser User-Agent and a fixed Referer
pub struct HttpImageSource {
    http_client: reqwest::Client,
    referer: String,
}

impl HttpImageSource {
    pub fn new(user_agent: &str, referer: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            http_client,
            referer: referer.into(),
        })
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ImageLoadError> {
        let fetch_error = |source| ImageLoadError::Fetch {
            url: url.to_string(),
            source,
        };

        let response = self
            .http_client
            .get(url)
            .header(reqwest::header::REFERER, &self.referer)
            .send()
            .await
            .map_err(fetch_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageLoadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(fetch_error)?.to_vec();
        debug!("Fetched {} bytes from {}", bytes.len(), url);

        Ok(FetchedImage { bytes, content_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source() -> HttpImageSource {
        HttpImageSource::new("test-agent/1.0", "https://mangadex.org/", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_referer_and_returns_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/h4sh/1.png"))
            .and(header("referer", "https://mangadex.org/"))
            .and(header("user-agent", "test-agent/1.0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
            )
            .expect(1)
            .mount(&server)
            .await;

        let image = source()
            .fetch(&format!("{}/data/h4sh/1.png", server.uri()))
            .await
            .unwrap();
        assert_eq!(image.bytes, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(image.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/data/h4sh/missing.png", server.uri());
        match source().fetch(&url).await {
            Err(ImageLoadError::Status { url: failed, status }) => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            }
            other => panic!("expected Status error, got {:?}", other),
        }
    }
}
