use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::provider::{build_http_client, send_with_retries, TranslationProvider};
use crate::core::errors::{TranslationError, TranslationResult};
use crate::core::types::ProviderKind;

pub const MYMEMORY_ENDPOINT: &str = "https://api.mymemory.translated.net/get";

/// MyMemory free translation API (no key, rate limited by IP)
pub struct MyMemoryTranslator {
    http_client: reqwest::Client,
    endpoint: String,
    source_language: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryResponse {
    response_data: Option<MyMemoryData>,
    /// Sent as a number on success and sometimes as a string on errors
    response_status: Option<serde_json::Value>,
    response_details: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryData {
    translated_text: Option<String>,
}

impl MyMemoryTranslator {
    pub fn new(
        source_language: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> TranslationResult<Self> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            endpoint: MYMEMORY_ENDPOINT.to_string(),
            source_language: source_language.into(),
            max_retries,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn lang_pair(&self, target_language: &str) -> String {
        format!("{}|{}", self.source_language, target_language)
    }
}

fn status_code(value: &serde_json::Value) -> Option<u16> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extract the translation, treating an in-body error status as a failure
fn parse_response(body: &str) -> TranslationResult<String> {
    let response: MyMemoryResponse = serde_json::from_str(body)
        .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

    if let Some(status) = response.response_status.as_ref().and_then(status_code) {
        if status != 200 {
            return Err(TranslationError::ServiceStatus {
                status,
                body: response.response_details.unwrap_or_default(),
            });
        }
    }

    let translated = response
        .response_data
        .and_then(|data| data.translated_text)
        .ok_or(TranslationError::MissingField("responseData.translatedText"))?;

    let translated = translated.trim().to_string();
    if translated.is_empty() {
        return Err(TranslationError::EmptyTranslation);
    }
    Ok(translated)
}

#[async_trait]
impl TranslationProvider for MyMemoryTranslator {
    fn kind(&self) -> ProviderKind {
        ProviderKind::MyMemory
    }

    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    async fn translate(&self, text: &str, target_language: &str) -> TranslationResult<String> {
        let lang_pair = self.lang_pair(target_language);

        let response = send_with_retries(self.kind(), self.max_retries, || {
            self.http_client
                .get(&self.endpoint)
                .query(&[("q", text), ("langpair", lang_pair.as_str())])
        })
        .await?;

        let translated = parse_response(&response)?;
        debug!("MyMemory translated {} chars", translated.chars().count());
        Ok(translated)
    }
}
