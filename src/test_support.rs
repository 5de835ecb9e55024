// Scripted collaborators for unit tests

use async_trait::async_trait;
use dashmap::DashMap;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::errors::{ImageLoadError, RecognitionError, TranslationError, TranslationResult};
use crate::core::types::{ProviderKind, RecognitionResult};
use crate::services::images::{FetchedImage, ImageSource};
use crate::services::ocr::{EngineEvent, EngineParameters, RecognitionEngine};
use crate::services::translation::TranslationProvider;
use crate::utils::encode_png;

/// PNG bytes of a white page with a dark square in the corner
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        if x == 0 && y == 0 {
            Rgba([20, 20, 20, 255])
        } else {
            Rgba([250, 250, 250, 255])
        }
    });
    encode_png(&img).unwrap()
}

/// Engine that replays a fixed event list and returns a fixed result
pub struct ScriptedEngine {
    result: Result<String, String>,
    events: Vec<EngineEvent>,
    calls: AtomicUsize,
    last_params: Mutex<Option<EngineParameters>>,
}

impl ScriptedEngine {
    pub fn text(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
            events: Vec::new(),
            calls: AtomicUsize::new(0),
            last_params: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            ..Self::text("")
        }
    }

    pub fn with_events(mut self, events: Vec<EngineEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> Option<EngineParameters> {
        self.last_params.lock().clone()
    }
}

#[async_trait]
impl RecognitionEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn recognize(
        &self,
        _image: &RgbaImage,
        params: &EngineParameters,
        on_event: &(dyn Fn(EngineEvent) + Send + Sync),
    ) -> Result<RecognitionResult, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock() = Some(params.clone());

        for event in &self.events {
            on_event(event.clone());
        }

        match &self.result {
            Ok(text) => Ok(RecognitionResult {
                text: text.clone(),
                words: None,
            }),
            Err(message) => Err(RecognitionError::EngineFailed(message.clone())),
        }
    }
}

/// Image source backed by a map; unknown URLs are load failures
#[derive(Default)]
pub struct InMemoryImageSource {
    images: DashMap<String, Vec<u8>>,
}

impl InMemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, bytes: Vec<u8>) {
        self.images.insert(url.to_string(), bytes);
    }
}

#[async_trait]
impl ImageSource for InMemoryImageSource {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ImageLoadError> {
        let bytes = self
            .images
            .get(url)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ImageLoadError::NotFound(url.to_string()))?;

        Ok(FetchedImage {
            bytes,
            content_type: Some("image/png".to_string()),
        })
    }
}

/// Translation provider with a canned reply, counting its calls
pub struct ScriptedProvider {
    kind: ProviderKind,
    reply: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn ok(kind: ProviderKind, reply: &str) -> Self {
        Self {
            kind,
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: ProviderKind) -> Self {
        Self {
            kind,
            reply: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn translate(&self, _text: &str, _target_language: &str) -> TranslationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().ok_or(TranslationError::ServiceStatus {
            status: 503,
            body: "scripted outage".to_string(),
        })
    }
}
