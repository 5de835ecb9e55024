use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::types::{PipelineStage, ProviderKind};

/// Latency samples kept per series; older samples are dropped
pub const MAX_LATENCY_SAMPLES: usize = 1024;

/// Process-wide metrics collector.
///
/// Tracks page pipeline outcomes, translation tier usage, remote API latency
/// and cache performance. Cheap to clone and safe to share between pages.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Page metrics
    pages_started: AtomicUsize,
    pages_completed: AtomicUsize,
    pages_failed: AtomicUsize,
    pages_without_text: AtomicUsize,
    chapters_loaded: AtomicUsize,

    // Stage metrics
    preprocess_ms: RwLock<VecDeque<u64>>,
    recognize_ms: RwLock<VecDeque<u64>>,
    translate_ms: RwLock<VecDeque<u64>>,
    failures_by_stage: DashMap<&'static str, AtomicUsize>,

    // Translation tier metrics
    outcomes_by_provider: DashMap<&'static str, AtomicUsize>,
    provider_failures: DashMap<&'static str, AtomicUsize>,
    api_calls_total: AtomicUsize,
    api_latency_ms: RwLock<VecDeque<u64>>,

    // Cache metrics
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    cache_size: AtomicUsize,

    circuit_breaker_trips: AtomicUsize,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                pages_started: AtomicUsize::new(0),
                pages_completed: AtomicUsize::new(0),
                pages_failed: AtomicUsize::new(0),
                pages_without_text: AtomicUsize::new(0),
                chapters_loaded: AtomicUsize::new(0),
                preprocess_ms: RwLock::new(VecDeque::new()),
                recognize_ms: RwLock::new(VecDeque::new()),
                translate_ms: RwLock::new(VecDeque::new()),
                failures_by_stage: DashMap::new(),
                outcomes_by_provider: DashMap::new(),
                provider_failures: DashMap::new(),
                api_calls_total: AtomicUsize::new(0),
                api_latency_ms: RwLock::new(VecDeque::new()),
                cache_hits: AtomicUsize::new(0),
                cache_misses: AtomicUsize::new(0),
                cache_size: AtomicUsize::new(0),
                circuit_breaker_trips: AtomicUsize::new(0),
                start_time: Instant::now(),
            }),
        }
    }

    // Page metrics
    pub fn record_chapter_loaded(&self, pages: usize) {
        self.inner.chapters_loaded.fetch_add(1, Ordering::Relaxed);
        self.inner.pages_started.fetch_add(pages, Ordering::Relaxed);
    }

    pub fn record_page_retry(&self) {
        self.inner.pages_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_completed(&self, text_detected: bool) {
        self.inner.pages_completed.fetch_add(1, Ordering::Relaxed);
        if !text_detected {
            self.inner.pages_without_text.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_page_failed(&self, stage: PipelineStage) {
        self.inner.pages_failed.fetch_add(1, Ordering::Relaxed);
        increment(&self.inner.failures_by_stage, stage_key(stage));
    }

    pub fn record_stage_duration(&self, stage: PipelineStage, duration: Duration) {
        let samples = match stage {
            PipelineStage::Preprocessing => &self.inner.preprocess_ms,
            PipelineStage::Recognizing => &self.inner.recognize_ms,
            PipelineStage::Translating => &self.inner.translate_ms,
            PipelineStage::Normalizing => return,
        };
        push_sample(samples, duration);
    }

    // Translation metrics
    pub fn record_translation(&self, provider: ProviderKind) {
        increment(&self.inner.outcomes_by_provider, provider.id());
    }

    pub fn record_provider_failure(&self, provider: ProviderKind) {
        increment(&self.inner.provider_failures, provider.id());
    }

    pub fn record_api_call(&self, duration: Duration) {
        self.inner.api_calls_total.fetch_add(1, Ordering::Relaxed);
        push_sample(&self.inner.api_latency_ms, duration);
    }

    // Cache metrics
    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_cache_size(&self, size: usize) {
        self.inner.cache_size.store(size, Ordering::Relaxed);
    }

    pub fn record_circuit_breaker_trip(&self) {
        self.inner.circuit_breaker_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let api_latency = self.inner.api_latency_ms.read();
        let api_latency_avg_ms = avg(&api_latency);
        let api_latency_p95_ms = percentile(&api_latency, 0.95);
        drop(api_latency);

        let cache_hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let cache_total = cache_hits + cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            cache_hits as f64 / cache_total as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            chapters_loaded: self.inner.chapters_loaded.load(Ordering::Relaxed),
            pages_started: self.inner.pages_started.load(Ordering::Relaxed),
            pages_completed: self.inner.pages_completed.load(Ordering::Relaxed),
            pages_failed: self.inner.pages_failed.load(Ordering::Relaxed),
            pages_without_text: self.inner.pages_without_text.load(Ordering::Relaxed),
            preprocess_avg_ms: avg(&self.inner.preprocess_ms.read()),
            recognize_avg_ms: avg(&self.inner.recognize_ms.read()),
            translate_avg_ms: avg(&self.inner.translate_ms.read()),
            failures_by_stage: counts(&self.inner.failures_by_stage),
            outcomes_by_provider: counts(&self.inner.outcomes_by_provider),
            provider_failures: counts(&self.inner.provider_failures),
            api_calls_total: self.inner.api_calls_total.load(Ordering::Relaxed),
            api_latency_avg_ms,
            api_latency_p95_ms,
            cache_hits,
            cache_misses,
            cache_hit_rate,
            cache_size: self.inner.cache_size.load(Ordering::Relaxed),
            circuit_breaker_trips: self.inner.circuit_breaker_trips.load(Ordering::Relaxed),
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Render metrics in the Prometheus text exposition format
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();

        counter(&mut out, "chapters_loaded_total", "Chapters loaded", s.chapters_loaded);
        counter(&mut out, "pages_started_total", "Page pipelines started", s.pages_started);
        counter(&mut out, "pages_completed_total", "Page pipelines that reached done", s.pages_completed);
        counter(&mut out, "pages_failed_total", "Page pipelines that failed", s.pages_failed);
        counter(&mut out, "pages_without_text_total", "Pages with no text detected", s.pages_without_text);

        labelled(&mut out, "page_failures_total", "Page failures by stage", "stage", &s.failures_by_stage);
        labelled(&mut out, "translations_total", "Translation outcomes by provider", "provider", &s.outcomes_by_provider);
        labelled(&mut out, "provider_failures_total", "Remote tier failures by provider", "provider", &s.provider_failures);

        out.push_str("# HELP stage_avg_duration_ms Average stage duration in milliseconds\n");
        out.push_str("# TYPE stage_avg_duration_ms gauge\n");
        out.push_str(&format!("stage_avg_duration_ms{{stage=\"preprocessing\"}} {}\n", s.preprocess_avg_ms));
        out.push_str(&format!("stage_avg_duration_ms{{stage=\"recognizing\"}} {}\n", s.recognize_avg_ms));
        out.push_str(&format!("stage_avg_duration_ms{{stage=\"translating\"}} {}\n\n", s.translate_avg_ms));

        counter(&mut out, "api_calls_total", "Remote translation API calls", s.api_calls_total);
        gauge(&mut out, "api_latency_avg_ms", "Average remote API latency", s.api_latency_avg_ms as f64);
        gauge(&mut out, "cache_hit_rate", "Translation cache hit rate (0.0 to 1.0)", s.cache_hit_rate);
        gauge(&mut out, "cache_size", "Translation cache entries", s.cache_size as f64);
        counter(&mut out, "circuit_breaker_trips_total", "Circuit breaker trips", s.circuit_breaker_trips);
        counter(&mut out, "uptime_seconds", "Application uptime in seconds", s.uptime_seconds as usize);

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub chapters_loaded: usize,
    pub pages_started: usize,
    pub pages_completed: usize,
    pub pages_failed: usize,
    pub pages_without_text: usize,
    pub preprocess_avg_ms: u64,
    pub recognize_avg_ms: u64,
    pub translate_avg_ms: u64,
    pub failures_by_stage: Vec<(String, usize)>,
    pub outcomes_by_provider: Vec<(String, usize)>,
    pub provider_failures: Vec<(String, usize)>,
    pub api_calls_total: usize,
    pub api_latency_avg_ms: u64,
    pub api_latency_p95_ms: u64,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_hit_rate: f64,
    pub cache_size: usize,
    pub circuit_breaker_trips: usize,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Count recorded for one provider id (0 if never seen)
    pub fn translations_by(&self, provider: ProviderKind) -> usize {
        self.outcomes_by_provider
            .iter()
            .find(|(id, _)| id == provider.id())
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

fn stage_key(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Preprocessing => "preprocessing",
        PipelineStage::Recognizing => "recognizing",
        PipelineStage::Normalizing => "normalizing",
        PipelineStage::Translating => "translating",
    }
}

fn increment(map: &DashMap<&'static str, AtomicUsize>, key: &'static str) {
    map.entry(key)
        .or_insert_with(|| AtomicUsize::new(0))
        .fetch_add(1, Ordering::Relaxed);
}

fn counts(map: &DashMap<&'static str, AtomicUsize>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = map
        .iter()
        .map(|entry| (entry.key().to_string(), entry.value().load(Ordering::Relaxed)))
        .collect();
    counts.sort();
    counts
}

fn counter(out: &mut String, name: &str, help: &str, value: usize) {
    out.push_str(&format!("# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n\n"));
}

fn gauge(out: &mut String, name: &str, help: &str, value: f64) {
    out.push_str(&format!("# HELP {name} {help}\n# TYPE {name} gauge\n{name} {value}\n\n"));
}

fn labelled(out: &mut String, name: &str, help: &str, label: &str, values: &[(String, usize)]) {
    out.push_str(&format!("# HELP {name} {help}\n# TYPE {name} counter\n"));
    for (key, value) in values {
        out.push_str(&format!("{name}{{{label}=\"{key}\"}} {value}\n"));
    }
    out.push('\n');
}

fn push_sample(samples: &RwLock<VecDeque<u64>>, duration: Duration) {
    let mut samples = samples.write();
    if samples.len() == MAX_LATENCY_SAMPLES {
        samples.pop_front();
    }
    samples.push_back(duration.as_millis() as u64);
}

fn percentile(values: &VecDeque<u64>, p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted: Vec<u64> = values.iter().copied().collect();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &VecDeque<u64>) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_chapter_loaded(3);
        metrics.record_page_completed(true);
        metrics.record_page_completed(false);
        metrics.record_page_failed(PipelineStage::Preprocessing);
        metrics.record_translation(ProviderKind::Dictionary);
        metrics.record_provider_failure(ProviderKind::MyMemory);
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.chapters_loaded, 1);
        assert_eq!(snapshot.pages_started, 3);
        assert_eq!(snapshot.pages_completed, 2);
        assert_eq!(snapshot.pages_without_text, 1);
        assert_eq!(snapshot.pages_failed, 1);
        assert_eq!(snapshot.failures_by_stage, vec![("preprocessing".to_string(), 1)]);
        assert_eq!(snapshot.translations_by(ProviderKind::Dictionary), 1);
        assert_eq!(snapshot.translations_by(ProviderKind::Google), 0);
        assert_eq!(snapshot.cache_hit_rate, 0.5);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_api_call(Duration::from_millis(100));
        metrics.record_translation(ProviderKind::MyMemory);

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("api_calls_total 1\n"));
        assert!(prometheus.contains("translations_total{provider=\"mymemory\"} 1\n"));
        assert!(prometheus.contains("# TYPE cache_hit_rate gauge"));
    }

    #[test]
    fn test_latency_samples_are_bounded() {
        let metrics = Metrics::new();
        for _ in 0..MAX_LATENCY_SAMPLES {
            metrics.record_api_call(Duration::from_millis(900));
            metrics.record_stage_duration(PipelineStage::Recognizing, Duration::from_millis(900));
        }
        for _ in 0..MAX_LATENCY_SAMPLES {
            metrics.record_api_call(Duration::from_millis(10));
            metrics.record_stage_duration(PipelineStage::Recognizing, Duration::from_millis(10));
        }

        assert_eq!(metrics.inner.api_latency_ms.read().len(), MAX_LATENCY_SAMPLES);
        assert_eq!(metrics.inner.recognize_ms.read().len(), MAX_LATENCY_SAMPLES);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.api_calls_total, 2 * MAX_LATENCY_SAMPLES);
        assert_eq!(snapshot.api_latency_avg_ms, 10);
        assert_eq!(snapshot.api_latency_p95_ms, 10);
        assert_eq!(snapshot.recognize_avg_ms, 10);
    }
}
