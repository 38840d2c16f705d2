//! Permanent pixel redaction of person regions.
//!
//! Filled pixels cannot be recovered by any in-system operation; the
//! at-most-once guarantee lives in the `redacted` flag on each detection,
//! not in any property of the image itself.

use image::{Rgba, RgbaImage};

use crate::db::Detection;
use crate::detect::PERSON_LABEL;

const FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Fill every unredacted person region with opaque black.
///
/// Boxes are mapped from fractional coordinates to pixels rounding outward
/// (floor on the minimum edge, ceil on the maximum) so the fill never
/// under-covers a person region. Returns the ids of the detections that
/// were filled, in input order.
pub fn redact_person_regions(img: &mut RgbaImage, detections: &[Detection]) -> Vec<i64> {
    let (width, height) = (img.width(), img.height());
    let mut filled = Vec::new();

    for det in detections {
        if det.label != PERSON_LABEL || det.redacted {
            continue;
        }

        let x0 = ((det.x_min * f64::from(width)).floor().max(0.0)) as u32;
        let y0 = ((det.y_min * f64::from(height)).floor().max(0.0)) as u32;
        let x1 = ((det.x_max * f64::from(width)).ceil() as u32).min(width);
        let y1 = ((det.y_max * f64::from(height)).ceil() as u32).min(height);

        if x1 <= x0 || y1 <= y0 {
            continue;
        }

        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, FILL);
            }
        }

        tracing::debug!(
            detection = det.id,
            region = ?(x0, y0, x1, y1),
            "Redacted person region"
        );
        filled.push(det.id);
    }

    filled
}
