use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::provider::{build_http_client, send_with_retries, TranslationProvider};
use crate::core::errors::{TranslationError, TranslationResult};
use crate::core::types::ProviderKind;

pub const GOOGLE_TRANSLATE_ENDPOINT: &str =
    "https://translation.googleapis.com/language/translate/v2";

/// Google Cloud Translation (v2 REST API, API key auth)
pub struct GoogleTranslator {
    http_client: reqwest::Client,
    api_key: String,
    endpoint: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    data: Option<GoogleData>,
}

#[derive(Debug, Deserialize)]
struct GoogleData {
    #[serde(default)]
    translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTranslation {
    translated_text: Option<String>,
}

impl GoogleTranslator {
    pub fn new(api_key: impl Into<String>, timeout: Duration, max_retries: u32) -> TranslationResult<Self> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            api_key: api_key.into(),
            endpoint: GOOGLE_TRANSLATE_ENDPOINT.to_string(),
            max_retries,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Extract the first translation from a v2 response body
fn parse_response(body: &str) -> TranslationResult<String> {
    let response: GoogleResponse = serde_json::from_str(body)
        .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

    let translated = response
        .data
        .ok_or(TranslationError::MissingField("data"))?
        .translations
        .into_iter()
        .next()
        .ok_or(TranslationError::MissingField("data.translations"))?
        .translated_text
        .ok_or(TranslationError::MissingField("data.translations[0].translatedText"))?;

    let translated = translated.trim().to_string();
    if translated.is_empty() {
        return Err(TranslationError::EmptyTranslation);
    }
    Ok(translated)
}

#[async_trait]
impl TranslationProvider for GoogleTranslator {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    async fn translate(&self, text: &str, target_language: &str) -> TranslationResult<String> {
        let body = serde_json::json!({
            "q": text,
            "target": target_language,
            "format": "text",
        });

        let response = send_with_retries(self.kind(), self.max_retries, || {
            self.http_client
                .post(&self.endpoint)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
        })
        .await?;

        let translated = parse_response(&response)?;
        debug!("Google translated {} chars", translated.chars().count());
        Ok(translated)
    }
}
