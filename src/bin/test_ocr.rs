//! Quick single-page check: binarize, OCR, normalize and translate a local image
//! Run with: cargo run --release --bin test_ocr -- <image_path> [latin|japanese]

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use manga_translator::{
    core::{Config, LanguageProfile},
    services::{
        normalize, preprocessing::preprocess_async, RecognitionAdapter, TesseractCliEngine,
        TranslationChain,
    },
    NO_TEXT_PLACEHOLDER,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("manga_translator=debug")
        .with_target(false)
        .init();

    let config = Config::new()?;

    // Get image path and profile from args
    let args: Vec<String> = std::env::args().collect();
    let sample_path = args.get(1).cloned().unwrap_or_else(|| "test_sample.png".to_string());
    let profile = match args.get(2) {
        Some(name) => name.parse::<LanguageProfile>()?,
        None => config.ocr_language(),
    };

    if !Path::new(&sample_path).exists() {
        eprintln!("Image not found: {}", sample_path);
        std::process::exit(1);
    }

    info!("Loading image: {}", sample_path);
    let image = image::open(&sample_path).with_context(|| format!("Failed to open {}", sample_path))?;
    info!("Image dimensions: {}x{}", image.width(), image.height());

    let bitmap = preprocess_async(image).await?;

    let engine = Arc::new(TesseractCliEngine::new(
        config.ocr.tesseract_path.clone(),
        config.ocr_timeout(),
    ));
    if !engine.is_available().await {
        anyhow::bail!("tesseract is not available at '{}'", config.ocr.tesseract_path);
    }

    info!("\n=== Running OCR ({:?}) ===", profile);
    let adapter = RecognitionAdapter::new(engine);
    let recognized = adapter
        .recognize(&bitmap, profile, |percent| info!("recognizing text: {}%", percent))
        .await?;

    let text = normalize(&recognized.text);

    println!("\n=== Results ===");
    println!("Raw:");
    for (i, line) in recognized.text.lines().enumerate() {
        println!("  {}. {}", i + 1, line);
    }

    if text.is_empty() {
        println!("Normalized: {}", NO_TEXT_PLACEHOLDER);
        return Ok(());
    }
    println!("Normalized: {}", text);

    let chain = TranslationChain::from_config(&config, None)?;
    let outcome = chain.translate(&text, config.target_language()).await;
    println!("\n{}", outcome.display_text());

    Ok(())
}
