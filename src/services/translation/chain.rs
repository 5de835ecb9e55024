use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::cache::TranslationCache;
use super::dictionary::DictionaryTranslator;
use super::google::GoogleTranslator;
use super::mymemory::MyMemoryTranslator;
use super::provider::TranslationProvider;
use crate::core::config::Config;
use crate::core::errors::TranslationResult;
use crate::core::types::{ProviderKind, TranslationOutcome};
use crate::middleware::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::utils::Metrics;

pub const MYMEMORY_NOTE: &str =
    "Using free translation service. Configure GOOGLE_TRANSLATE_API_KEY for better accuracy.";
pub const DICTIONARY_NOTE: &str =
    "Using basic word replacement. Configure GOOGLE_TRANSLATE_API_KEY for proper translations.";

/// Advisory note attached to outcomes of each tier
pub fn note_for(provider: ProviderKind) -> Option<&'static str> {
    match provider {
        ProviderKind::Google => None,
        ProviderKind::MyMemory => Some(MYMEMORY_NOTE),
        ProviderKind::Dictionary => Some(DICTIONARY_NOTE),
    }
}

struct Tier {
    provider: Arc<dyn TranslationProvider>,
    breaker: CircuitBreaker,
}

/// Ordered translation fallback chain.
///
/// Remote tiers are tried in order; each failure is logged and the next tier
/// is attempted. The dictionary tier always answers, so `translate` never
/// fails.
pub struct TranslationChain {
    tiers: Vec<Tier>,
    dictionary: DictionaryTranslator,
    cache: Option<TranslationCache>,
    metrics: Option<Metrics>,
}

impl TranslationChain {
    pub fn new(providers: Vec<Arc<dyn TranslationProvider>>) -> Self {
        Self::with_breaker_config(providers, CircuitBreakerConfig::default())
    }

    pub fn with_breaker_config(
        providers: Vec<Arc<dyn TranslationProvider>>,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        let tiers = providers
            .into_iter()
            .map(|provider| Tier {
                breaker: CircuitBreaker::with_config(provider.kind().label(), breaker_config.clone()),
                provider,
            })
            .collect();

        Self {
            tiers,
            dictionary: DictionaryTranslator::new(),
            cache: None,
            metrics: None,
        }
    }

    pub fn with_cache(mut self, cache: TranslationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the chain from configuration.
    ///
    /// Google is only part of the chain when an API key is configured;
    /// MyMemory can be switched off entirely.
    pub fn from_config(config: &Config, metrics: Option<Metrics>) -> TranslationResult<Self> {
        let mut providers: Vec<Arc<dyn TranslationProvider>> = Vec::new();

        if let Some(key) = config.google_api_key() {
            providers.push(Arc::new(GoogleTranslator::new(
                key,
                config.api_timeout(),
                config.max_retries(),
            )?));
        }

        if config.translation.mymemory_enabled {
            providers.push(Arc::new(MyMemoryTranslator::new(
                config.source_language(),
                config.api_timeout(),
                config.max_retries(),
            )?));
        }

        let mut chain = Self::new(providers)
            .with_cache(TranslationCache::new(config.translation.cache_entries, metrics.clone()));
        if let Some(metrics) = metrics {
            chain = chain.with_metrics(metrics);
        }

        info!(
            "Translation chain: {}",
            chain
                .tier_kinds()
                .iter()
                .map(|k| k.label())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(chain)
    }

    /// Provider order, dictionary last
    pub fn tier_kinds(&self) -> Vec<ProviderKind> {
        self.tiers
            .iter()
            .map(|tier| tier.provider.kind())
            .chain(std::iter::once(ProviderKind::Dictionary))
            .collect()
    }

    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn translate(&self, text: &str, target_language: &str) -> TranslationOutcome {
        let cache_key = self
            .cache
            .as_ref()
            .map(|_| TranslationCache::generate_key(target_language, text));

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(hit) = cache.get(key) {
                debug!("Translation cache hit ({})", hit.provider.label());
                self.record_outcome(hit.provider);
                return hit;
            }
        }

        for tier in &self.tiers {
            let kind = tier.provider.kind();

            if !tier.breaker.allow_request() {
                debug!("{} circuit is open, skipping", kind.label());
                continue;
            }

            let start = Instant::now();
            let result = tier.provider.translate(text, target_language).await;
            if let Some(ref m) = self.metrics {
                m.record_api_call(start.elapsed());
            }

            match result {
                Ok(translated) => {
                    tier.breaker.record_success();
                    let outcome = self.outcome(text, translated, target_language, kind);

                    if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                        cache.put(key, outcome.clone());
                    }
                    self.record_outcome(kind);
                    return outcome;
                }
                Err(e) => {
                    warn!("{} failed, falling back: {}", kind.label(), e);
                    if let Some(ref m) = self.metrics {
                        m.record_provider_failure(kind);
                    }
                    if tier.breaker.record_failure() {
                        if let Some(ref m) = self.metrics {
                            m.record_circuit_breaker_trip();
                        }
                    }
                }
            }
        }

        if !self.dictionary.supports(target_language) {
            warn!(
                "No dictionary for '{}', returning text marked untranslated",
                target_language
            );
        }
        let translated = self.dictionary.translate(text, target_language);
        self.record_outcome(ProviderKind::Dictionary);
        self.outcome(text, translated, target_language, ProviderKind::Dictionary)
    }

    fn outcome(
        &self,
        text: &str,
        translated: String,
        target_language: &str,
        provider: ProviderKind,
    ) -> TranslationOutcome {
        TranslationOutcome {
            original_text: text.to_string(),
            translated_text: translated,
            target_language: target_language.to_string(),
            provider,
            note: note_for(provider).map(str::to_string),
        }
    }

    fn record_outcome(&self, provider: ProviderKind) {
        if let Some(ref m) = self.metrics {
            m.record_translation(provider);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProvider;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_dictionary_only_chain() {
        let chain = TranslationChain::new(Vec::new());

        let outcome = chain.translate("Hello, how are you?", "th").await;
        assert_eq!(outcome.provider, ProviderKind::Dictionary);
        assert!(outcome.translated_text.contains("สวัสดี"));
        assert!(outcome.translated_text.contains("คุณ"));
        assert_eq!(outcome.note.as_deref(), Some(DICTIONARY_NOTE));
        assert_eq!(outcome.original_text, "Hello, how are you?");
    }

    #[tokio::test]
    async fn test_first_tier_failure_falls_through() {
        let google = Arc::new(ScriptedProvider::failing(ProviderKind::Google));
        let mymemory = Arc::new(ScriptedProvider::ok(ProviderKind::MyMemory, "สวัสดีครับ"));
        let chain = TranslationChain::new(vec![google.clone(), mymemory.clone()]);

        let outcome = chain.translate("hello", "th").await;
        assert_eq!(outcome.provider, ProviderKind::MyMemory);
        assert_eq!(outcome.translated_text, "สวัสดีครับ");
        assert_eq!(outcome.note.as_deref(), Some(MYMEMORY_NOTE));
        assert_eq!(google.calls(), 1);
        assert_eq!(mymemory.calls(), 1);
    }

    #[tokio::test]
    async fn test_google_success_has_no_note() {
        let google = Arc::new(ScriptedProvider::ok(ProviderKind::Google, "สวัสดี"));
        let mymemory = Arc::new(ScriptedProvider::ok(ProviderKind::MyMemory, "unused"));
        let chain = TranslationChain::new(vec![google, mymemory.clone()]);

        let outcome = chain.translate("hello", "th").await;
        assert_eq!(outcome.provider, ProviderKind::Google);
        assert!(outcome.note.is_none());
        assert_eq!(mymemory.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_remote_tiers_failing_is_never_an_error() {
        let metrics = Metrics::new();
        let chain = TranslationChain::new(vec![
            Arc::new(ScriptedProvider::failing(ProviderKind::Google)),
            Arc::new(ScriptedProvider::failing(ProviderKind::MyMemory)),
        ])
        .with_metrics(metrics.clone());

        let outcome = chain.translate("thank you", "th").await;
        assert_eq!(outcome.provider, ProviderKind::Dictionary);
        assert_eq!(outcome.translated_text, "ขอบคุณ คุณ");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.provider_failures.len(), 2);
        assert_eq!(snapshot.translations_by(ProviderKind::Dictionary), 1);
    }

    #[tokio::test]
    async fn test_open_circuit_skips_tier() {
        let flaky = Arc::new(ScriptedProvider::failing(ProviderKind::MyMemory));
        let chain = TranslationChain::with_breaker_config(
            vec![flaky.clone()],
            CircuitBreakerConfig {
                failure_threshold: 1,
                cool_down: Duration::from_secs(60),
                success_threshold: 1,
            },
        );

        chain.translate("hello", "th").await;
        let outcome = chain.translate("hello", "th").await;

        assert_eq!(outcome.provider, ProviderKind::Dictionary);
        assert_eq!(flaky.calls(), 1);
    }

    #[tokio::test]
    async fn test_only_remote_outcomes_are_cached() {
        let cache = TranslationCache::new(16, None);

        let dictionary_only = TranslationChain::new(Vec::new()).with_cache(cache.clone());
        dictionary_only.translate("hello", "th").await;
        assert!(cache.is_empty());

        let remote = Arc::new(ScriptedProvider::ok(ProviderKind::MyMemory, "สวัสดี"));
        let chain = TranslationChain::new(vec![remote.clone()]).with_cache(cache.clone());
        let first = chain.translate("hello", "th").await;
        let second = chain.translate("hello", "th").await;

        assert_eq!(first, second);
        assert_eq!(remote.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_target_is_marked_untranslated() {
        let chain = TranslationChain::new(vec![Arc::new(ScriptedProvider::failing(
            ProviderKind::MyMemory,
        ))]);

        let outcome = chain.translate("hello", "fr").await;
        assert_eq!(outcome.provider, ProviderKind::Dictionary);
        assert_eq!(outcome.translated_text, "[untranslated] hello");
        assert_eq!(outcome.target_language, "fr");
    }

    #[test]
    fn test_tier_order_from_config() {
        let config = Config::from_lookup(|key| match key {
            "GOOGLE_TRANSLATE_API_KEY" => Some("key".to_string()),
            _ => None,
        })
        .unwrap();
        let chain = TranslationChain::from_config(&config, None).unwrap();
        assert_eq!(
            chain.tier_kinds(),
            vec![ProviderKind::Google, ProviderKind::MyMemory, ProviderKind::Dictionary]
        );

        let config = Config::from_lookup(|key| match key {
            "MYMEMORY_ENABLED" => Some("false".to_string()),
            _ => None,
        })
        .unwrap();
        let chain = TranslationChain::from_config(&config, None).unwrap();
        assert_eq!(chain.tier_kinds(), vec![ProviderKind::Dictionary]);
    }

    #[tokio::test]
    async fn test_mymemory_outage_falls_through_to_dictionary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let mymemory = MyMemoryTranslator::new("en", Duration::from_secs(5), 1)
            .unwrap()
            .with_endpoint(server.uri());
        let metrics = Metrics::new();
        let chain = TranslationChain::new(vec![Arc::new(mymemory)]).with_metrics(metrics.clone());

        let outcome = chain.translate("thank you", "th").await;
        assert_eq!(outcome.provider, ProviderKind::Dictionary);
        assert_eq!(outcome.translated_text, "ขอบคุณ คุณ");

        // One retry for the 503, then the tier gives up
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.provider_failures, vec![("mymemory".to_string(), 1)]);
        assert_eq!(snapshot.api_calls_total, 1);
    }
}
