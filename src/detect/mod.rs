//! Object detection: the engine boundary and the box normalizer.
//!
//! The detector itself is an external service; this module defines the
//! trait the pipeline consumes, the raw output shape, and the conversion to
//! the canonical fractional representation everything downstream uses.

mod engine;
mod normalize;

pub use engine::HttpDetector;
pub use normalize::{normalize_detections, NormalizedDetection};

use anyhow::Result;

use crate::config::DetectorBoxFormat;

/// Canonical label for the class that triggers redaction.
pub const PERSON_LABEL: &str = "person";

/// One raw detection as the engine reported it, box still in the engine's
/// native convention.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub label: String,
    pub confidence: f64,
    pub bbox: [f64; 4],
}

/// An object-detection engine. Implementations are black boxes returning
/// raw detections for a full image.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<RawDetection>>;

    /// The coordinate convention `detect` reports boxes in.
    fn box_format(&self) -> DetectorBoxFormat;
}

/// Map a raw engine label through the fixed vocabulary.
///
/// MegaDetector-style engines report numeric category strings; named labels
/// pass through lowercased. Unknown labels are kept verbatim so a new
/// detector class degrades gracefully instead of disappearing.
pub fn canonical_label(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "1" | "animal" => "animal".to_string(),
        "2" | "person" | "human" => PERSON_LABEL.to_string(),
        "3" | "vehicle" => "vehicle".to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_mapping() {
        assert_eq!(canonical_label("1"), "animal");
        assert_eq!(canonical_label("2"), "person");
        assert_eq!(canonical_label("3"), "vehicle");
        assert_eq!(canonical_label("Person"), "person");
        assert_eq!(canonical_label("human"), "person");
    }

    #[test]
    fn test_unknown_labels_kept_verbatim() {
        assert_eq!(canonical_label("drone"), "drone");
        assert_eq!(canonical_label(" Bigfoot "), "Bigfoot");
    }
}
