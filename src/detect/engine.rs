//! HTTP client for the external object-detection engine.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{DetectorBoxFormat, EngineConfig};

use super::{ObjectDetector, RawDetection};

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    image: &'a str,
}

// MegaDetector-style response: numeric category strings and a bbox in the
// engine's documented convention.
#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<WireDetection>,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    category: String,
    conf: f64,
    bbox: [f64; 4],
}

pub struct HttpDetector {
    agent: ureq::Agent,
    endpoint: String,
    box_format: DetectorBoxFormat,
}

impl HttpDetector {
    pub fn new(endpoint: &str, box_format: DetectorBoxFormat, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self {
            agent,
            endpoint: endpoint.to_string(),
            box_format,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            &config.detector_endpoint,
            config.detector_box_format,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

impl ObjectDetector for HttpDetector {
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<RawDetection>> {
        let request = DetectRequest {
            image: &BASE64.encode(image_bytes),
        };

        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(&request)
            .map_err(|e| anyhow!("detector request failed: {}", e))?;

        let body: DetectResponse = response
            .into_json()
            .map_err(|e| anyhow!("detector returned malformed response: {}", e))?;

        tracing::debug!(count = body.detections.len(), "Detector returned detections");

        Ok(body
            .detections
            .into_iter()
            .map(|d| RawDetection {
                label: d.category,
                confidence: d.conf,
                bbox: d.bbox,
            })
            .collect())
    }

    fn box_format(&self) -> DetectorBoxFormat {
        self.box_format
    }
}
