// Image Preprocessor - grayscale + fixed-threshold binarization ahead of OCR

use image::{DynamicImage, RgbaImage};
use rayon::prelude::*;

use crate::core::errors::ImageLoadError;

/// Luma above this value becomes white, everything else black
pub const BINARIZE_THRESHOLD: u8 = 120;

/// Rec. 601 luma, rounded to the nearest integer
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

/// Binarize an RGBA buffer in place.
///
/// Each pixel's RGB channels become 255 when its luma is strictly greater
/// than the threshold and 0 otherwise. Alpha is left untouched and the
/// dimensions never change.
pub fn binarize_in_place(img: &mut RgbaImage) {
    let buf: &mut [u8] = img;
    buf.par_chunks_mut(4).for_each(|px| {
        let v = if luma(px[0], px[1], px[2]) > BINARIZE_THRESHOLD {
            255
        } else {
            0
        };
        px[0] = v;
        px[1] = v;
        px[2] = v;
    });
}

/// Return a binarized copy; the input buffer is not modified
pub fn binarize(img: &RgbaImage) -> RgbaImage {
    let mut out = img.clone();
    binarize_in_place(&mut out);
    out
}

/// Convert a decoded page to RGBA and binarize it on the blocking pool
pub async fn preprocess_async(img: DynamicImage) -> Result<RgbaImage, ImageLoadError> {
    tokio::task::spawn_blocking(move || {
        let mut rgba = img.into_rgba8();
        binarize_in_place(&mut rgba);
        rgba
    })
    .await
    .map_err(|e| ImageLoadError::TaskFailed(e.to_string()))
}
