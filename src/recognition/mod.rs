//! Text recognition: overlay strip preparation and the engine boundary.
//!
//! The recognizer is an external best-effort service; its output is never
//! assumed accurate. What we control is the input: the bottom strip is
//! cropped, grayscaled, upscaled and binarized before it goes out, which is
//! most of what makes the burned-in text legible to an OCR engine.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{DynamicImage, GrayImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;

use crate::config::{EngineConfig, OverlayConfig};

/// A text-recognition engine, consumed as a black box.
pub trait TextRecognizer: Send + Sync {
    /// Recognize text in a prepared strip image (PNG bytes).
    fn recognize(&self, strip_png: &[u8]) -> Result<String>;
}

/// Crop the burned-in bottom strip and prepare it for recognition:
/// grayscale, upscale, binarize (white text on a black bar), PNG-encode.
pub fn prepare_strip(img: &DynamicImage, config: &OverlayConfig) -> Result<Vec<u8>> {
    let (width, height) = (img.width(), img.height());
    let strip_height = ((f64::from(height) * f64::from(config.strip_fraction)).ceil() as u32)
        .clamp(1, height);

    let strip = img.crop_imm(0, height - strip_height, width, strip_height);
    let mut gray: GrayImage = strip.to_luma8();

    if config.upscale > 1 {
        gray = image::imageops::resize(
            &gray,
            gray.width() * config.upscale,
            gray.height() * config.upscale,
            image::imageops::FilterType::Triangle,
        );
    }

    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > config.threshold { 255 } else { 0 };
    }

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(gray)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("failed to encode overlay strip")?;
    Ok(bytes)
}

#[derive(Debug, Serialize)]
struct RecognizeRequest<'a> {
    image: &'a str,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    text: String,
}

/// HTTP text-recognition client.
pub struct HttpOcr {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpOcr {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self {
            agent,
            endpoint: endpoint.to_string(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            &config.ocr_endpoint,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

impl TextRecognizer for HttpOcr {
    fn recognize(&self, strip_png: &[u8]) -> Result<String> {
        let request = RecognizeRequest {
            image: &BASE64.encode(strip_png),
        };

        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(&request)
            .map_err(|e| anyhow!("recognition request failed: {}", e))?;

        let body: RecognizeResponse = response
            .into_json()
            .map_err(|e| anyhow!("recognition engine returned malformed response: {}", e))?;

        tracing::debug!(text = %body.text, "Recognizer returned overlay text");
        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_prepare_strip_crops_and_binarizes() {
        // Bright band at the bottom, dark everywhere else.
        let mut img = image::RgbaImage::from_pixel(100, 100, Rgba([20, 20, 20, 255]));
        for y in 96..100 {
            for x in 0..100 {
                img.put_pixel(x, y, Rgba([230, 230, 230, 255]));
            }
        }
        let img = DynamicImage::ImageRgba8(img);

        let config = OverlayConfig {
            strip_fraction: 0.042,
            upscale: 2,
            threshold: 140,
        };
        let png = prepare_strip(&img, &config).unwrap();

        let strip = image::load_from_memory(&png).unwrap().to_luma8();
        // ceil(100 * 0.042) = 5 rows, doubled by the upscale.
        assert_eq!(strip.width(), 200);
        assert_eq!(strip.height(), 10);
        // Binarized: only pure black and pure white remain; the bottom rows
        // came from the bright band.
        assert!(strip.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(strip.get_pixel(100, 9).0[0], 255);
    }

    #[test]
    fn test_prepare_strip_handles_tiny_images() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            4,
            4,
            Rgba([255, 255, 255, 255]),
        ));
        let png = prepare_strip(&img, &OverlayConfig::default()).unwrap();
        assert!(!png.is_empty());
    }
}
