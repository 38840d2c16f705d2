//! Conversion of raw detector output to the canonical box form.

use crate::config::DetectorBoxFormat;

use super::{canonical_label, RawDetection};

/// A detection in canonical form: fractional [0,1] coordinates, top-left
/// origin, `x_min < x_max` and `y_min < y_max` guaranteed.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDetection {
    pub label: String,
    pub confidence: f64,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// Normalize raw detections to the canonical representation.
///
/// Boxes are converted from the engine's convention, clamped to the frame,
/// and dropped when degenerate (zero or negative extent, or entirely outside
/// the frame — clamping collapses those to zero extent). Confidence is
/// clamped to [0,1]. No confidence thresholding happens here: presentation
/// layers decide what to show, the store keeps everything.
pub fn normalize_detections(
    raw: &[RawDetection],
    format: DetectorBoxFormat,
    width: u32,
    height: u32,
) -> Vec<NormalizedDetection> {
    let mut out = Vec::with_capacity(raw.len());

    for det in raw {
        let [a, b, c, d] = det.bbox;
        let (x_min, y_min, x_max, y_max) = match format {
            DetectorBoxFormat::FractionalXywh => (a, b, a + c, b + d),
            DetectorBoxFormat::FractionalXyxy => (a, b, c, d),
            DetectorBoxFormat::PixelXyxy => {
                if width == 0 || height == 0 {
                    continue;
                }
                (
                    a / f64::from(width),
                    b / f64::from(height),
                    c / f64::from(width),
                    d / f64::from(height),
                )
            }
        };

        let x_min = x_min.clamp(0.0, 1.0);
        let y_min = y_min.clamp(0.0, 1.0);
        let x_max = x_max.clamp(0.0, 1.0);
        let y_max = y_max.clamp(0.0, 1.0);

        if x_max <= x_min || y_max <= y_min {
            tracing::debug!(label = %det.label, bbox = ?det.bbox, "Dropping degenerate detection box");
            continue;
        }

        out.push(NormalizedDetection {
            label: canonical_label(&det.label),
            confidence: det.confidence.clamp(0.0, 1.0),
            x_min,
            y_min,
            x_max,
            y_max,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(label: &str, bbox: [f64; 4]) -> RawDetection {
        RawDetection {
            label: label.to_string(),
            confidence: 0.9,
            bbox,
        }
    }

    #[test]
    fn test_fractional_xywh_conversion() {
        let out = normalize_detections(
            &[raw("2", [0.1, 0.2, 0.3, 0.4])],
            DetectorBoxFormat::FractionalXywh,
            1920,
            1080,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "person");
        assert!((out[0].x_min - 0.1).abs() < 1e-9);
        assert!((out[0].x_max - 0.4).abs() < 1e-9);
        assert!((out[0].y_max - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_pixel_xyxy_conversion() {
        let out = normalize_detections(
            &[raw("1", [480.0, 270.0, 960.0, 540.0])],
            DetectorBoxFormat::PixelXyxy,
            1920,
            1080,
        );
        assert_eq!(out.len(), 1);
        assert!((out[0].x_min - 0.25).abs() < 1e-9);
        assert!((out[0].y_min - 0.25).abs() < 1e-9);
        assert!((out[0].x_max - 0.5).abs() < 1e-9);
        assert!((out[0].y_max - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_canonical_input_is_unchanged() {
        let out = normalize_detections(
            &[raw("animal", [0.25, 0.25, 0.5, 0.5])],
            DetectorBoxFormat::FractionalXyxy,
            100,
            100,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(
            (out[0].x_min, out[0].y_min, out[0].x_max, out[0].y_max),
            (0.25, 0.25, 0.5, 0.5)
        );
    }

    #[test]
    fn test_degenerate_boxes_dropped() {
        let out = normalize_detections(
            &[
                raw("1", [0.5, 0.5, 0.0, 0.2]),  // zero width
                raw("1", [0.5, 0.5, -0.1, 0.2]), // negative width
                raw("1", [0.6, 0.6, 0.5, 0.5]),  // inverted xyxy
            ],
            DetectorBoxFormat::FractionalXywh,
            100,
            100,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_out_of_frame_boxes_dropped() {
        let out = normalize_detections(
            &[raw("1", [1.2, 0.1, 0.3, 0.3]), raw("1", [-0.5, -0.5, 0.2, 0.2])],
            DetectorBoxFormat::FractionalXywh,
            100,
            100,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_overhanging_box_is_clamped() {
        let out = normalize_detections(
            &[raw("2", [0.8, 0.8, 0.5, 0.5])],
            DetectorBoxFormat::FractionalXywh,
            100,
            100,
        );
        assert_eq!(out.len(), 1);
        assert!((out[0].x_max - 1.0).abs() < 1e-9);
        assert!((out[0].y_max - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_clamped_and_everything_kept() {
        let mut det = raw("2", [0.1, 0.1, 0.2, 0.2]);
        det.confidence = 1.7;
        let mut low = raw("1", [0.5, 0.5, 0.2, 0.2]);
        low.confidence = 0.01;

        let out = normalize_detections(
            &[det, low],
            DetectorBoxFormat::FractionalXywh,
            100,
            100,
        );
        // No confidence threshold: both survive.
        assert_eq!(out.len(), 2);
        assert!((out[0].confidence - 1.0).abs() < 1e-9);
        assert!((out[1].confidence - 0.01).abs() < 1e-9);
    }
}
