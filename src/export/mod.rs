//! Export of photograph records for offline analysis.

use anyhow::Result;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::db::Database;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

/// One photograph row as exported, camera resolved to its name.
#[derive(Debug, Serialize)]
pub struct ExportedPhoto {
    pub id: i64,
    pub status: String,
    pub date_taken: Option<String>,
    pub time_taken: Option<String>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub camera: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub uploaded_by: Option<String>,
    pub uploaded_at: String,
}

/// Export all photographs to a file. Returns the number of rows written.
pub fn export_photos(db: &Database, output_path: &Path, format: ExportFormat) -> Result<usize> {
    let photos = get_photos_for_export(db)?;
    let count = photos.len();

    match format {
        ExportFormat::Csv => export_csv(&photos, output_path)?,
        ExportFormat::Json => export_json(&photos, output_path)?,
    }

    tracing::info!(count, path = ?output_path, "Exported photographs");
    Ok(count)
}

fn get_photos_for_export(db: &Database) -> Result<Vec<ExportedPhoto>> {
    let mut stmt = db.conn.prepare(
        r#"
        SELECT p.id, p.status, p.date_taken, p.time_taken, p.temperature, p.pressure,
               c.name, p.latitude, p.longitude, p.uploaded_by, p.uploaded_at
        FROM photos p
        LEFT JOIN cameras c ON p.camera_id = c.id
        ORDER BY p.id
        "#,
    )?;

    let mut photos = Vec::new();
    let rows = stmt.query_map([], |row| {
        Ok(ExportedPhoto {
            id: row.get(0)?,
            status: row.get(1)?,
            date_taken: row.get(2)?,
            time_taken: row.get(3)?,
            temperature: row.get(4)?,
            pressure: row.get(5)?,
            camera: row.get(6)?,
            latitude: row.get(7)?,
            longitude: row.get(8)?,
            uploaded_by: row.get(9)?,
            uploaded_at: row.get(10)?,
        })
    })?;
    for row in rows {
        photos.push(row?);
    }
    Ok(photos)
}

fn export_csv(photos: &[ExportedPhoto], output_path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path)?;
    for photo in photos {
        writer.serialize(photo)?;
    }
    writer.flush()?;
    Ok(())
}

fn export_json(photos: &[ExportedPhoto], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    serde_json::to_writer_pretty(file, photos)?;
    Ok(())
}
