//! src/services/transform_service.rs
//!
//! The image engine behind the pipeline: decode, optionally resize, and
//! re-encode per directive. The [`ImageEngine`] trait keeps the pipeline
//! testable against a stub engine without touching pixel data.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Detect source format | `image::guess_format` (magic bytes) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode JPEG | `JpegEncoder::new_with_quality` (alpha dropped) |
//! | Encode PNG | `PngEncoder::new_with_quality` |
//! | Encode WebP | `WebPEncoder::new_lossless` (the pure-Rust encoder is lossless-only) |
//! | Encode TIFF | `TiffEncoder` |

use crate::models::directive::{OutputFormat, TransformDirective};
use crate::models::payload::ImagePayload;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("unrecognized or corrupt image data: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode image as {format}: {source}")]
    Encode {
        format: &'static str,
        #[source]
        source: image::ImageError,
    },
    #[error("no encoder available for `{0}` output")]
    UnsupportedTarget(&'static str),
}

/// Opaque transform capability: raw bytes in, transformed bytes out.
///
/// Synchronous and CPU-bound; callers must not assume a call is cheap and
/// should keep it off the async reactor.
pub trait ImageEngine: Send + Sync {
    fn transform(
        &self,
        body: &[u8],
        directive: &TransformDirective,
    ) -> Result<ImagePayload, TransformError>;
}

/// Production engine on the `image` crate.
pub struct RasterEngine;

impl ImageEngine for RasterEngine {
    fn transform(
        &self,
        body: &[u8],
        directive: &TransformDirective,
    ) -> Result<ImagePayload, TransformError> {
        let detected = image::guess_format(body).map_err(TransformError::Decode)?;
        let decoded =
            image::load_from_memory_with_format(body, detected).map_err(TransformError::Decode)?;

        let resized = resize(decoded, directive.width, directive.height);
        let target = directive.format.map(image_format).unwrap_or(detected);
        encode(&resized, target, directive.quality, directive.compression)
    }
}

fn image_format(format: OutputFormat) -> ImageFormat {
    match format {
        OutputFormat::Jpeg => ImageFormat::Jpeg,
        OutputFormat::Png => ImageFormat::Png,
        OutputFormat::Webp => ImageFormat::WebP,
        OutputFormat::Tiff => ImageFormat::Tiff,
    }
}

/// Resize per directive. A single given dimension derives the other from the
/// source aspect ratio (never below 1px); both unspecified means no resize.
fn resize(image: DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (width, height) = match (width, height) {
        (0, 0) => return image,
        (w, 0) => (w, scaled(image.height(), w, image.width())),
        (0, h) => (scaled(image.width(), h, image.height()), h),
        (w, h) => (w, h),
    };
    image.resize_exact(width, height, FilterType::Lanczos3)
}

fn scaled(side: u32, target: u32, other_side: u32) -> u32 {
    let scaled = u64::from(side) * u64::from(target) / u64::from(other_side.max(1));
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

fn encode(
    image: &DynamicImage,
    target: ImageFormat,
    quality: u8,
    compression: u8,
) -> Result<ImagePayload, TransformError> {
    let mime = target.to_mime_type();
    let mut buffer = Cursor::new(Vec::new());

    let encoded = match target {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel; flatten before encoding.
            let opaque = DynamicImage::ImageRgb8(image.to_rgb8());
            opaque.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))
        }
        ImageFormat::Png => image.write_with_encoder(PngEncoder::new_with_quality(
            &mut buffer,
            png_compression(compression),
            PngFilterType::Adaptive,
        )),
        ImageFormat::WebP => image.write_with_encoder(WebPEncoder::new_lossless(&mut buffer)),
        ImageFormat::Tiff => image.write_with_encoder(TiffEncoder::new(&mut buffer)),
        other => return Err(TransformError::UnsupportedTarget(other.to_mime_type())),
    };
    encoded.map_err(|source| TransformError::Encode {
        format: mime,
        source,
    })?;

    Ok(ImagePayload::new(
        buffer.into_inner(),
        Some(mime.to_string()),
    ))
}

/// The PNG encoder exposes tiers rather than zlib levels; bucket 0-9 onto
/// fast/default/best.
fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=2 => CompressionType::Fast,
        3..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}
