//! Photo rows and the transactional writes the pipeline depends on.

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, params_from_iter, types::ToSql};

use super::detections::NewDetection;
use super::Database;

/// Photograph lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoStatus {
    Staging,
    Published,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::Staging => "staging",
            PhotoStatus::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "staging" => Some(PhotoStatus::Staging),
            "published" => Some(PhotoStatus::Published),
            _ => None,
        }
    }
}

/// One uploaded trail-camera photograph.
#[derive(Debug, Clone)]
pub struct Photo {
    pub id: i64,
    pub image_path: String,
    pub status: PhotoStatus,
    pub date_taken: Option<NaiveDate>,
    pub time_taken: Option<NaiveTime>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub camera_id: Option<i64>,
    pub uploaded_by: Option<String>,
    pub uploaded_at: String,
    pub analyzed_at: Option<String>,
}

/// Everything one analysis run writes, applied in a single transaction.
///
/// The write is a total overwrite of the parsed fields: a field the run
/// could not extract goes back to NULL, and the detection set is replaced,
/// never accumulated.
#[derive(Debug, Clone, Default)]
pub struct AnalysisWrite {
    pub date_taken: Option<NaiveDate>,
    pub time_taken: Option<NaiveTime>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub camera_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub detections: Vec<NewDetection>,
}

/// Manual edits; `Some` means "set this field". Absent fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct PhotoEdits {
    pub date_taken: Option<NaiveDate>,
    pub time_taken: Option<NaiveTime>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub camera_id: Option<i64>,
}

impl PhotoEdits {
    pub fn is_empty(&self) -> bool {
        self.date_taken.is_none()
            && self.time_taken.is_none()
            && self.temperature.is_none()
            && self.pressure.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.camera_id.is_none()
    }
}

/// Filters for the published-photo listing.
#[derive(Debug, Clone, Default)]
pub struct GalleryFilter {
    pub camera_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub pressure_min: Option<f64>,
    pub pressure_max: Option<f64>,
}

fn date_to_sql(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn time_to_sql(time: Option<NaiveTime>) -> Option<String> {
    time.map(|t| t.format("%H:%M:%S").to_string())
}

fn date_from_sql(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

fn time_from_sql(s: Option<String>) -> Option<NaiveTime> {
    s.and_then(|s| {
        NaiveTime::parse_from_str(&s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M"))
            .ok()
    })
}

fn photo_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Photo> {
    let status: String = row.get(2)?;
    Ok(Photo {
        id: row.get(0)?,
        image_path: row.get(1)?,
        status: PhotoStatus::parse(&status).unwrap_or(PhotoStatus::Staging),
        date_taken: date_from_sql(row.get(3)?),
        time_taken: time_from_sql(row.get(4)?),
        temperature: row.get(5)?,
        pressure: row.get(6)?,
        latitude: row.get(7)?,
        longitude: row.get(8)?,
        camera_id: row.get(9)?,
        uploaded_by: row.get(10)?,
        uploaded_at: row.get(11)?,
        analyzed_at: row.get(12)?,
    })
}

const PHOTO_COLUMNS: &str = "id, image_path, status, date_taken, time_taken, temperature, \
                             pressure, latitude, longitude, camera_id, uploaded_by, \
                             uploaded_at, analyzed_at";

impl Database {
    /// Register a freshly ingested photograph; all metadata starts NULL.
    pub fn create_photo(&self, image_path: &str, uploaded_by: Option<&str>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO photos (image_path, uploaded_by) VALUES (?, ?)",
            params![image_path, uploaded_by],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_photo(&self, photo_id: i64) -> Result<Option<Photo>> {
        let result = self.conn.query_row(
            &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?"),
            [photo_id],
            photo_from_row,
        );
        match result {
            Ok(photo) => Ok(Some(photo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_staging(&self) -> Result<Vec<Photo>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE status = 'staging' ORDER BY uploaded_at DESC"
        ))?;
        let mut photos = Vec::new();
        let rows = stmt.query_map([], photo_from_row)?;
        for row in rows {
            photos.push(row?);
        }
        Ok(photos)
    }

    /// Published photographs matching the filter, newest first.
    pub fn list_published(&self, filter: &GalleryFilter) -> Result<Vec<Photo>> {
        let mut sql = format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE status = 'published'");
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(camera_id) = filter.camera_id {
            sql.push_str(" AND camera_id = ?");
            values.push(Box::new(camera_id));
        }
        if let Some(start) = filter.start_date {
            sql.push_str(" AND date_taken >= ?");
            values.push(Box::new(start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = filter.end_date {
            sql.push_str(" AND date_taken <= ?");
            values.push(Box::new(end.format("%Y-%m-%d").to_string()));
        }
        if let Some(min) = filter.temp_min {
            sql.push_str(" AND temperature >= ?");
            values.push(Box::new(min));
        }
        if let Some(max) = filter.temp_max {
            sql.push_str(" AND temperature <= ?");
            values.push(Box::new(max));
        }
        if let Some(min) = filter.pressure_min {
            sql.push_str(" AND pressure >= ?");
            values.push(Box::new(min));
        }
        if let Some(max) = filter.pressure_max {
            sql.push_str(" AND pressure <= ?");
            values.push(Box::new(max));
        }
        sql.push_str(" ORDER BY uploaded_at DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut photos = Vec::new();
        let rows = stmt.query_map(params_from_iter(values.iter()), photo_from_row)?;
        for row in rows {
            photos.push(row?);
        }
        Ok(photos)
    }

    /// Apply one analysis run atomically: overwrite the parsed fields and
    /// replace the detection set. Either everything lands or nothing does.
    pub fn apply_analysis(&self, photo_id: i64, write: &AnalysisWrite) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "UPDATE photos
             SET date_taken = ?, time_taken = ?, temperature = ?, pressure = ?,
                 camera_id = ?, latitude = ?, longitude = ?,
                 analyzed_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            params![
                date_to_sql(write.date_taken),
                time_to_sql(write.time_taken),
                write.temperature,
                write.pressure,
                write.camera_id,
                write.latitude,
                write.longitude,
                photo_id
            ],
        )?;

        tx.execute("DELETE FROM detections WHERE photo_id = ?", [photo_id])?;
        for d in &write.detections {
            tx.execute(
                "INSERT INTO detections (photo_id, label, confidence, x_min, y_min, x_max, y_max)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![photo_id, d.label, d.confidence, d.x_min, d.y_min, d.x_max, d.y_max],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Apply validated manual edits; only the fields present are touched.
    pub fn update_photo_fields(&self, photo_id: i64, edits: &PhotoEdits) -> Result<()> {
        if edits.is_empty() {
            return Ok(());
        }

        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(date) = edits.date_taken {
            clauses.push("date_taken = ?");
            values.push(Box::new(date.format("%Y-%m-%d").to_string()));
        }
        if let Some(time) = edits.time_taken {
            clauses.push("time_taken = ?");
            values.push(Box::new(time.format("%H:%M:%S").to_string()));
        }
        if let Some(temp) = edits.temperature {
            clauses.push("temperature = ?");
            values.push(Box::new(temp));
        }
        if let Some(pressure) = edits.pressure {
            clauses.push("pressure = ?");
            values.push(Box::new(pressure));
        }
        if let Some(lat) = edits.latitude {
            clauses.push("latitude = ?");
            values.push(Box::new(lat));
        }
        if let Some(lon) = edits.longitude {
            clauses.push("longitude = ?");
            values.push(Box::new(lon));
        }
        if let Some(camera_id) = edits.camera_id {
            clauses.push("camera_id = ?");
            values.push(Box::new(camera_id));
        }

        let sql = format!("UPDATE photos SET {} WHERE id = ?", clauses.join(", "));
        values.push(Box::new(photo_id));
        self.conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    pub fn set_photo_status(&self, photo_id: i64, status: PhotoStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE photos SET status = ? WHERE id = ?",
            params![status.as_str(), photo_id],
        )?;
        Ok(())
    }

    /// Final publish write: flip the redacted flag on the filled detections
    /// and move the photo to published, in one transaction.
    ///
    /// Returns false when the photo was no longer in staging (e.g. another
    /// worker published it first); nothing is written in that case.
    pub fn commit_publish(&self, photo_id: i64, redacted_ids: &[i64]) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;

        let flipped = tx.execute(
            "UPDATE photos SET status = 'published' WHERE id = ? AND status = 'staging'",
            [photo_id],
        )?;
        if flipped == 0 {
            return Ok(false);
        }

        for detection_id in redacted_ids {
            tx.execute(
                "UPDATE detections SET redacted = 1 WHERE id = ?",
                [detection_id],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    /// Remove the photo row (detections cascade) and hand back the image
    /// path so the caller can delete the stored bytes.
    pub fn delete_photo(&self, photo_id: i64) -> Result<Option<String>> {
        let tx = self.conn.unchecked_transaction()?;

        let path: Option<String> = match tx.query_row(
            "SELECT image_path FROM photos WHERE id = ?",
            [photo_id],
            |row| row.get(0),
        ) {
            Ok(path) => Some(path),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        if path.is_some() {
            tx.execute("DELETE FROM photos WHERE id = ?", [photo_id])?;
        }

        tx.commit()?;
        Ok(path)
    }
}
