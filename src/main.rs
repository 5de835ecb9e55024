// Main entry point for the manga page OCR + translation service

use manga_translator::{
    core::{Config, LanguageProfile},
    orchestration::PageCoordinator,
    services::{
        ChapterSource, HttpImageSource, ImageSource, MangaDexClient, RecognitionAdapter,
        TesseractCliEngine, TranslationChain,
    },
    utils::Metrics,
    ChapterError, CoordinatorError,
};

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    coordinator: Arc<PageCoordinator>,
    chapters: Arc<dyn ChapterSource>,
    images: Arc<HttpImageSource>,
    chain: Arc<TranslationChain>,
    metrics: Metrics,
    ocr_available: bool,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: &str, details: Option<String>) -> ApiError {
    let mut body = serde_json::json!({ "error": message });
    if let Some(details) = details {
        body["details"] = serde_json::Value::String(details);
    }
    (status, Json(body))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new()?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let level = match config.log_level() {
        tracing::Level::TRACE => "trace",
        tracing::Level::DEBUG => "debug",
        tracing::Level::INFO => "info",
        tracing::Level::WARN => "warn",
        tracing::Level::ERROR => "error",
    };
    let filter = EnvFilter::new(format!(
        "manga_translator={level},manga_page_translator={level},tower_http=warn"
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== MANGA PAGE TRANSLATOR ===");
    info!(
        "Config: OCR={:?} target={} google={} mymemory={}",
        config.ocr_language(),
        config.target_language(),
        if config.google_api_key().is_some() { "ON" } else { "OFF" },
        if config.translation.mymemory_enabled { "ON" } else { "OFF" }
    );

    // Initialize metrics
    let metrics = Metrics::new();

    // OCR engine
    let engine = Arc::new(TesseractCliEngine::new(
        config.ocr.tesseract_path.clone(),
        config.ocr_timeout(),
    ));
    let ocr_available = engine.is_available().await;
    if !ocr_available {
        warn!(
            "tesseract not found at '{}'; every page will fail at the recognizing stage",
            config.ocr.tesseract_path
        );
    }

    // Sources and translation chain
    let images = Arc::new(HttpImageSource::new(
        &config.source.image_user_agent,
        config.source.image_referer.clone(),
        config.api_timeout(),
    )?);
    let chapters: Arc<dyn ChapterSource> = Arc::new(MangaDexClient::new(
        config.source.mangadex_api_base.clone(),
        &config.source.image_user_agent,
        config.api_timeout(),
    )?);
    let chain = Arc::new(TranslationChain::from_config(&config, Some(metrics.clone()))?);

    let page_images: Arc<dyn ImageSource> = images.clone();
    let coordinator = Arc::new(
        PageCoordinator::new(
            page_images,
            RecognitionAdapter::new(engine),
            chain.clone(),
            config.target_language(),
        )
        .with_metrics(metrics.clone()),
    );

    let state = AppState {
        config: config.clone(),
        coordinator,
        chapters,
        images,
        chain,
        metrics,
        ocr_available,
    };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/api/manga/chapter", post(load_chapter))
        .route("/api/pages", get(list_pages))
        .route("/api/pages/:index", get(get_page))
        .route("/api/pages/:index/retry", post(retry_page))
        .route("/api/translate", post(translate_text))
        .route("/api/proxy-image", get(proxy_image))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .with_state(state)
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /                        - Root endpoint");
    info!("  GET  /api/health              - Health check");
    info!("  POST /api/manga/chapter       - Load a MangaDex chapter and start page pipelines");
    info!("  GET  /api/pages               - All page states");
    info!("  GET  /api/pages/:index        - One page state");
    info!("  POST /api/pages/:index/retry  - Retry a failed or finished page");
    info!("  POST /api/translate           - Translate text through the fallback chain");
    info!("  GET  /api/proxy-image?url=    - Relay a page image");
    info!("  GET  /metrics                 - Prometheus metrics");
    info!("  GET  /stats                   - Detailed statistics");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Manga Page Translator - OCR + translation service"
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let tiers: Vec<&str> = state.chain.tier_kinds().iter().map(|k| k.label()).collect();

    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "ocrEngine": "tesseract",
        "ocrAvailable": state.ocr_available,
        "translationTiers": tiers,
        "targetLanguage": state.coordinator.target_language(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterRequest {
    chapter_url: Option<String>,
    language: Option<String>,
}

/// Resolve a chapter and start one pipeline per page.
///
/// Responds as soon as the page list is known; progress is polled through
/// the page endpoints.
async fn load_chapter(
    State(state): State<AppState>,
    Json(request): Json<ChapterRequest>,
) -> Result<Json<manga_translator::Chapter>, ApiError> {
    let profile = match request.language.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        Some(language) => language
            .parse::<LanguageProfile>()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, &e.to_string(), None))?,
        None => state.config.ocr_language(),
    };

    let chapter_url = request.chapter_url.unwrap_or_default();
    let chapter = state
        .chapters
        .fetch_chapter(&chapter_url)
        .await
        .map_err(|e: ChapterError| {
            if e.is_input_error() {
                api_error(StatusCode::BAD_REQUEST, &e.to_string(), None)
            } else {
                error!("Error fetching chapter: {}", e);
                api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to fetch chapter data",
                    Some(e.to_string()),
                )
            }
        })?;

    // Pipelines run detached; clients poll /api/pages
    let run = state.coordinator.start_chapter(&chapter, profile);
    tokio::spawn(run.join());

    Ok(Json(chapter))
}

async fn list_pages(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "summary": state.coordinator.summary(),
        "pages": state.coordinator.snapshot(),
    }))
}

async fn get_page(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<manga_translator::PageSnapshot>, ApiError> {
    state
        .coordinator
        .page(index)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, &format!("No page with index {}", index), None))
}

async fn retry_page(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    match state.coordinator.retry(index) {
        Ok(_handle) => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "page": state.coordinator.page(index) })),
        )),
        Err(e @ CoordinatorError::UnknownPage(_)) => {
            Err(api_error(StatusCode::NOT_FOUND, &e.to_string(), None))
        }
        Err(e @ CoordinatorError::NotTerminal { .. }) => {
            Err(api_error(StatusCode::CONFLICT, &e.to_string(), None))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest {
    text: Option<String>,
    target_language: Option<String>,
}

async fn translate_text(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let text = request.text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Text is required", None));
    }

    let target = request
        .target_language
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| state.config.target_language().to_string());

    let outcome = state.chain.translate(&text, &target).await;

    Ok(Json(serde_json::json!({
        "originalText": outcome.original_text,
        "translatedText": outcome.translated_text,
        "targetLanguage": outcome.target_language,
        "service": outcome.provider.label(),
        "provider": outcome.provider,
        "note": outcome.note,
    })))
}

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    url: Option<String>,
}

/// Relay a page image with the headers the upstream CDN requires
async fn proxy_image(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ApiError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "URL parameter is required", None))?;

    let image = state.images.fetch(&url).await.map_err(|e| {
        error!("Error proxying image: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to proxy image",
            Some(e.to_string()),
        )
    })?;

    let content_type = image
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        ],
        image.bytes,
    )
        .into_response())
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let snapshot = state.metrics.snapshot();
    let pages = state.coordinator.summary();

    serde_json::to_value(snapshot)
        .map(|metrics| Json(serde_json::json!({ "metrics": metrics, "pages": pages })))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialize metrics: {}", e),
            )
        })
}
