//! Detection rows: objects the detector found in a photo.
//!
//! Rows are created only when the normalizer output is applied; after that
//! the only mutable thing about a detection is its `redacted` flag, which
//! goes false -> true exactly once during publication.

use anyhow::Result;
use rusqlite::params;

use super::Database;

/// A stored detection with its canonical fractional bounding box.
#[derive(Debug, Clone)]
pub struct Detection {
    pub id: i64,
    pub photo_id: i64,
    pub label: String,
    pub confidence: f64,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub redacted: bool,
}

/// A detection about to be written, produced by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDetection {
    pub label: String,
    pub confidence: f64,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

fn detection_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Detection> {
    Ok(Detection {
        id: row.get(0)?,
        photo_id: row.get(1)?,
        label: row.get(2)?,
        confidence: row.get(3)?,
        x_min: row.get(4)?,
        y_min: row.get(5)?,
        x_max: row.get(6)?,
        y_max: row.get(7)?,
        redacted: row.get::<_, i64>(8)? != 0,
    })
}

const DETECTION_COLUMNS: &str =
    "id, photo_id, label, confidence, x_min, y_min, x_max, y_max, redacted";

impl Database {
    pub fn get_detections_for_photo(&self, photo_id: i64) -> Result<Vec<Detection>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DETECTION_COLUMNS} FROM detections WHERE photo_id = ? ORDER BY id"
        ))?;
        let mut detections = Vec::new();
        let rows = stmt.query_map([photo_id], detection_from_row)?;
        for row in rows {
            detections.push(row?);
        }
        Ok(detections)
    }

    /// Detections with the given label whose pixels have not been obscured yet.
    pub fn unredacted_detections_with_label(
        &self,
        photo_id: i64,
        label: &str,
    ) -> Result<Vec<Detection>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DETECTION_COLUMNS} FROM detections
             WHERE photo_id = ? AND label = ? AND redacted = 0
             ORDER BY id"
        ))?;
        let mut detections = Vec::new();
        let rows = stmt.query_map(params![photo_id, label], detection_from_row)?;
        for row in rows {
            detections.push(row?);
        }
        Ok(detections)
    }

    pub fn count_detections(&self, photo_id: i64) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM detections WHERE photo_id = ?",
            [photo_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
