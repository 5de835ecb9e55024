use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

use crate::core::errors::ImageLoadError;

/// Asynchronously decode an image from bytes using spawn_blocking.
///
/// Image decoding is CPU-intensive, especially for full manga pages.
pub async fn load_image_from_memory_async(bytes: Vec<u8>) -> Result<DynamicImage, ImageLoadError> {
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| ImageLoadError::TaskFailed(e.to_string()))?
        .map_err(ImageLoadError::from)
}

/// Asynchronously encode an image to PNG bytes using spawn_blocking.
///
/// Used to hand the binarized page to an out-of-process OCR engine.
pub async fn encode_png_async(img: RgbaImage) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || encode_png(&img))
        .await
        .context("Failed to spawn blocking task for PNG encoding")?
}

/// Synchronous PNG encoding for small images where spawn_blocking overhead isn't worth it
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .context("Failed to encode image as PNG")?;
    Ok(png_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[tokio::test]
    async fn test_encode_then_load_async() {
        let img = RgbaImage::from_pixel(4, 3, Rgba([255, 0, 0, 255]));

        let png_bytes = encode_png_async(img).await.unwrap();
        assert!(!png_bytes.is_empty());

        let loaded = load_image_from_memory_async(png_bytes).await.unwrap();
        assert_eq!(loaded.width(), 4);
        assert_eq!(loaded.height(), 3);
    }

    #[tokio::test]
    async fn test_load_garbage_is_decode_error() {
        let result = load_image_from_memory_async(b"definitely not an image".to_vec()).await;
        assert!(matches!(result, Err(ImageLoadError::Decode(_))));
    }
}
