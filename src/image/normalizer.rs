use super::{MediaType, NormalizedImage};
use crate::models::{DEFAULT_IMAGE_BUDGET_KB, DEFAULT_IMAGE_MAX_DIMENSION};
use crate::Result;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::DynamicImage;

/// One pass of the compression schedule.
///
/// `quality` is the JPEG quality; PNG output always uses best compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionStep {
    pub max_dimension: u32,
    pub quality: u8,
}

pub struct ImageNormalizer {
    steps: Vec<CompressionStep>,
    size_budget_kb: u32,
}

impl ImageNormalizer {
    /// Two-pass schedule: `first_pass_dimension` at quality 80, then 1600px at
    /// quality 70 (never larger than the first pass).
    pub fn new(first_pass_dimension: u32) -> Self {
        Self {
            steps: vec![
                CompressionStep {
                    max_dimension: first_pass_dimension,
                    quality: 80,
                },
                CompressionStep {
                    max_dimension: first_pass_dimension.min(1600),
                    quality: 70,
                },
            ],
            size_budget_kb: DEFAULT_IMAGE_BUDGET_KB,
        }
    }

    pub fn with_steps(mut self, steps: Vec<CompressionStep>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_budget_kb(mut self, size_budget_kb: u32) -> Self {
        self.size_budget_kb = size_budget_kb;
        self
    }

    pub fn size_budget_kb(&self) -> u32 {
        self.size_budget_kb
    }

    /// Decode `data`, then downscale and re-encode it step by step until the
    /// encoded size fits the budget or the schedule runs out.
    pub fn normalize(&self, data: &[u8]) -> Result<NormalizedImage> {
        let original_size = data.len();
        let budget_bytes = self.size_budget_kb as usize * 1024;

        let mut img = image::load_from_memory(data)?;
        let media_type = if img.color().has_alpha() {
            MediaType::Png
        } else {
            MediaType::Jpeg
        };

        tracing::debug!(
            "Original image: {}x{}, {:.2} KB, encoding as {}",
            img.width(),
            img.height(),
            original_size as f64 / 1024.0,
            media_type
        );

        let mut encoded = None;
        for (index, step) in self.steps.iter().enumerate() {
            if index > 0 {
                tracing::info!("Image still too large, reducing further...");
            }

            img = shrink_to_fit(img, step.max_dimension);
            let bytes = encode(&img, media_type, step.quality)?;
            tracing::debug!(
                "Pass {}: {}x{} at quality {} -> {:.2} KB (ratio {:.2})",
                index + 1,
                img.width(),
                img.height(),
                step.quality,
                bytes.len() as f64 / 1024.0,
                bytes.len() as f64 / original_size.max(1) as f64
            );

            let fits = bytes.len() <= budget_bytes;
            encoded = Some(bytes);
            if fits {
                break;
            }
        }

        let bytes = match encoded {
            Some(bytes) => bytes,
            // Empty schedule: re-encode once at the decoded size.
            None => encode(&img, media_type, 80)?,
        };

        if bytes.len() > budget_bytes {
            tracing::warn!(
                "Image remains over budget after compression: {:.2} KB > {} KB",
                bytes.len() as f64 / 1024.0,
                self.size_budget_kb
            );
        }

        tracing::info!(
            "Normalized image: {:.2} KB -> {:.2} KB ({})",
            original_size as f64 / 1024.0,
            bytes.len() as f64 / 1024.0,
            media_type
        );

        Ok(NormalizedImage { bytes, media_type })
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_MAX_DIMENSION)
    }
}

/// Downscale so neither side exceeds `max_dimension`; never upscales.
fn shrink_to_fit(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    if img.width() <= max_dimension && img.height() <= max_dimension {
        return img;
    }
    img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

fn encode(img: &DynamicImage, media_type: MediaType, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    match media_type {
        MediaType::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, PngFilter::Adaptive);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
        }
        MediaType::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode_png(img: DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn create_rgba_image(width: u32, height: u32) -> Vec<u8> {
        encode_png(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 0, 0, 128]),
        )))
    }

    fn create_rgb_image(width: u32, height: u32) -> Vec<u8> {
        // Noisy pixels so JPEG output does not collapse to a few hundred bytes.
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8])
        });
        encode_png(DynamicImage::ImageRgb8(img))
    }

    #[test]
    fn test_alpha_input_produces_png() {
        let normalizer = ImageNormalizer::default();
        let result = normalizer.normalize(&create_rgba_image(20, 20)).unwrap();

        assert_eq!(result.media_type, MediaType::Png);
        assert_eq!(
            image::guess_format(&result.bytes).unwrap(),
            ImageFormat::Png
        );
    }

    #[test]
    fn test_opaque_input_produces_jpeg() {
        let normalizer = ImageNormalizer::default();
        let result = normalizer.normalize(&create_rgb_image(20, 20)).unwrap();

        assert_eq!(result.media_type, MediaType::Jpeg);
        assert_eq!(
            image::guess_format(&result.bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_output_within_budget() {
        let normalizer = ImageNormalizer::default().with_budget_kb(64);
        let result = normalizer.normalize(&create_rgb_image(200, 150)).unwrap();

        assert!(result.bytes.len() <= 64 * 1024);
    }

    #[test]
    fn test_first_pass_downscales_preserving_aspect_ratio() {
        let normalizer = ImageNormalizer::new(100);
        let result = normalizer.normalize(&create_rgb_image(400, 200)).unwrap();

        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!(decoded.width(), 100);
        assert_eq!(decoded.height(), 50);
    }

    #[test]
    fn test_small_images_are_not_upscaled() {
        let normalizer = ImageNormalizer::default();
        let result = normalizer.normalize(&create_rgba_image(10, 8)).unwrap();

        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 8));
    }

    #[test]
    fn test_second_pass_runs_when_over_budget() {
        let normalizer = ImageNormalizer::default()
            .with_steps(vec![
                CompressionStep {
                    max_dimension: 64,
                    quality: 80,
                },
                CompressionStep {
                    max_dimension: 16,
                    quality: 50,
                },
            ])
            .with_budget_kb(0);

        let result = normalizer.normalize(&create_rgb_image(128, 128)).unwrap();

        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }

    #[test]
    fn test_second_pass_skipped_when_first_fits() {
        let normalizer = ImageNormalizer::default().with_steps(vec![
            CompressionStep {
                max_dimension: 64,
                quality: 80,
            },
            CompressionStep {
                max_dimension: 16,
                quality: 50,
            },
        ]);

        let result = normalizer.normalize(&create_rgb_image(128, 128)).unwrap();

        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        let normalizer = ImageNormalizer::default();
        let err = normalizer.normalize(b"definitely not an image").unwrap_err();
        assert!(matches!(err, crate::Error::Image(_)));
    }

    #[test]
    fn test_second_step_never_exceeds_first() {
        let normalizer = ImageNormalizer::new(512);
        assert!(normalizer.steps.iter().all(|s| s.max_dimension <= 512));
        assert_eq!(normalizer.size_budget_kb(), DEFAULT_IMAGE_BUDGET_KB);
    }
}
