//! Raster downscaling and re-encoding for remote generation.

use std::io::Cursor;

use alttext_core::{EncodedImage, ImageNormalizer, SVG_MIME_TYPE};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Largest edge, in pixels, of an image sent to the generator.
pub const MAX_DIMENSION: u32 = 1024;
/// JPEG quality used when re-encoding rasters.
pub const JPEG_QUALITY: u8 = 75;

const JPEG_MIME_TYPE: &str = "image/jpeg";

/// Normalizer that fits rasters inside a square bound and re-encodes them as JPEG.
///
/// Vector images are forwarded untouched.
#[derive(Debug, Clone, Copy)]
pub struct JpegNormalizer {
    max_dimension: u32,
    quality: u8,
}

impl Default for JpegNormalizer {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            quality: JPEG_QUALITY,
        }
    }
}

impl JpegNormalizer {
    /// Normalizer with a custom bound and quality.
    #[must_use]
    pub const fn new(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension,
            quality,
        }
    }

    /// Decode, downscale if needed, and re-encode `bytes` synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Decode`] when the bytes are not a readable image
    /// and [`MediaError::Encode`] when JPEG encoding fails.
    pub fn encode_raster(&self, bytes: &[u8]) -> MediaResult<Vec<u8>> {
        let decoded =
            image::load_from_memory(bytes).map_err(|source| MediaError::Decode { source })?;
        let fitted = if decoded.width() > self.max_dimension
            || decoded.height() > self.max_dimension
        {
            debug!(
                width = decoded.width(),
                height = decoded.height(),
                bound = self.max_dimension,
                "downscaling image"
            );
            decoded.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3)
        } else {
            decoded
        };

        // JPEG has no alpha channel.
        let rgb = DynamicImage::ImageRgb8(fitted.to_rgb8());
        let mut buffer = Cursor::new(Vec::new());
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, self.quality))
            .map_err(|source| MediaError::Encode { source })?;
        Ok(buffer.into_inner())
    }
}

#[async_trait]
impl ImageNormalizer for JpegNormalizer {
    async fn normalize(&self, bytes: Vec<u8>, mime: &str) -> anyhow::Result<EncodedImage> {
        if mime == SVG_MIME_TYPE {
            return Ok(EncodedImage {
                mime: SVG_MIME_TYPE.to_string(),
                base64: STANDARD.encode(bytes),
            });
        }

        let normalizer = *self;
        let encoded = tokio::task::spawn_blocking(move || normalizer.encode_raster(&bytes))
            .await
            .map_err(|source| MediaError::Worker { source })??;
        Ok(EncodedImage {
            mime: JPEG_MIME_TYPE.to_string(),
            base64: STANDARD.encode(encoded),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 128]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .expect("encode png");
        buffer.into_inner()
    }

    fn decode(encoded: &EncodedImage) -> DynamicImage {
        let bytes = STANDARD.decode(&encoded.base64).expect("base64");
        image::load_from_memory(&bytes).expect("decode jpeg")
    }

    #[tokio::test]
    async fn large_rasters_fit_inside_the_bound() -> anyhow::Result<()> {
        let encoded = JpegNormalizer::default()
            .normalize(png(2048, 1024), "image/png")
            .await?;
        assert_eq!(encoded.mime, "image/jpeg");
        let image = decode(&encoded);
        assert_eq!((image.width(), image.height()), (1024, 512));
        Ok(())
    }

    #[tokio::test]
    async fn tall_rasters_keep_their_aspect_ratio() -> anyhow::Result<()> {
        let encoded = JpegNormalizer::new(64, 75)
            .normalize(png(100, 400), "image/png")
            .await?;
        let image = decode(&encoded);
        assert_eq!((image.width(), image.height()), (16, 64));
        Ok(())
    }

    #[tokio::test]
    async fn small_rasters_are_never_enlarged() -> anyhow::Result<()> {
        let encoded = JpegNormalizer::default()
            .normalize(png(12, 8), "image/png")
            .await?;
        let image = decode(&encoded);
        assert_eq!((image.width(), image.height()), (12, 8));
        assert!(encoded.data_url().starts_with("data:image/jpeg;base64,"));
        Ok(())
    }

    #[tokio::test]
    async fn svg_is_forwarded_verbatim() -> anyhow::Result<()> {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="4"/>"#.to_vec();
        let encoded = JpegNormalizer::default()
            .normalize(svg.clone(), SVG_MIME_TYPE)
            .await?;
        assert_eq!(encoded.mime, SVG_MIME_TYPE);
        assert_eq!(STANDARD.decode(&encoded.base64)?, svg);
        Ok(())
    }

    #[tokio::test]
    async fn garbage_bytes_fail_to_decode() {
        let err = JpegNormalizer::default()
            .normalize(b"not an image".to_vec(), "image/png")
            .await
            .expect_err("decode should fail");
        assert!(matches!(
            err.downcast_ref::<MediaError>(),
            Some(MediaError::Decode { .. })
        ));
    }
}
