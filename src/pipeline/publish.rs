//! Publication state machine: staging -> published -> staging, plus delete.
//!
//! Publishing is the one irreversible step in the system: person regions
//! are blacked out in the stored image before the status flips, and
//! unpublishing never restores them.

use anyhow::Result;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

use crate::db::{Photo, PhotoEdits, PhotoStatus};
use crate::detect::PERSON_LABEL;
use crate::error::PublishError;
use crate::redact::redact_person_regions;

use super::Pipeline;

impl Pipeline {
    /// Publish a staging photograph, applying any pending edits first.
    ///
    /// Preconditions: date, time and camera must be set (temperature and
    /// pressure may be absent). If any unredacted person detection exists
    /// the image is redacted and atomically replaced before the status
    /// flips. A rejected or failed publish changes nothing.
    pub fn publish(
        &self,
        photo_id: i64,
        edits: Option<&PhotoEdits>,
    ) -> Result<Photo, PublishError> {
        let lock = self.photo_lock(photo_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let photo = self
            .db()
            .get_photo(photo_id)
            .map_err(PublishError::Storage)?
            .ok_or(PublishError::NotFound(photo_id))?;
        if photo.status == PhotoStatus::Published {
            return Err(PublishError::AlreadyPublished(photo_id));
        }

        if let Some(edits) = edits {
            if !edits.is_empty() {
                self.apply_edits_locked(photo_id, edits)?;
            }
        }

        let photo = self
            .db()
            .get_photo(photo_id)
            .map_err(PublishError::Storage)?
            .ok_or(PublishError::NotFound(photo_id))?;
        if photo.date_taken.is_none() {
            return Err(PublishError::MissingField("date"));
        }
        if photo.time_taken.is_none() {
            return Err(PublishError::MissingField("time"));
        }
        if photo.camera_id.is_none() {
            return Err(PublishError::MissingField("camera"));
        }

        let persons = self
            .db()
            .unredacted_detections_with_label(photo_id, PERSON_LABEL)
            .map_err(PublishError::Storage)?;

        let mut redacted_ids = Vec::new();
        if !persons.is_empty() {
            let bytes = self
                .store()
                .read(&photo.image_path)
                .map_err(PublishError::Storage)?;
            let format = image::guess_format(&bytes).unwrap_or(ImageFormat::Png);
            let mut rgba = image::load_from_memory(&bytes)
                .map_err(|e| PublishError::ImageDecode {
                    path: photo.image_path.clone(),
                    reason: e.to_string(),
                })?
                .to_rgba8();

            redacted_ids = redact_person_regions(&mut rgba, &persons);

            let encoded = encode_image(rgba, format).map_err(PublishError::Storage)?;
            // The image lands before the flags/status commit: a crash in
            // between re-runs redaction on already-black pixels, which is
            // harmless, while the reverse order could publish unredacted
            // pixels.
            self.store()
                .replace(&photo.image_path, &encoded)
                .map_err(PublishError::Storage)?;

            tracing::info!(
                photo = photo_id,
                regions = redacted_ids.len(),
                "Redacted person regions for publication"
            );
        }

        let committed = self
            .db()
            .commit_publish(photo_id, &redacted_ids)
            .map_err(PublishError::Storage)?;
        if !committed {
            // Another worker published first (cross-process race).
            return Err(PublishError::AlreadyPublished(photo_id));
        }

        tracing::info!(photo = photo_id, "Published photograph");
        self.db()
            .get_photo(photo_id)
            .map_err(PublishError::Storage)?
            .ok_or(PublishError::NotFound(photo_id))
    }

    /// Move a published photograph back to staging. Redaction is not
    /// reversed; the redacted image remains the photograph's image.
    pub fn unpublish(&self, photo_id: i64) -> Result<Photo, PublishError> {
        let lock = self.photo_lock(photo_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let photo = self
            .db()
            .get_photo(photo_id)
            .map_err(PublishError::Storage)?
            .ok_or(PublishError::NotFound(photo_id))?;
        if photo.status != PhotoStatus::Published {
            return Err(PublishError::NotPublished(photo_id));
        }

        self.db()
            .set_photo_status(photo_id, PhotoStatus::Staging)
            .map_err(PublishError::Storage)?;

        tracing::info!(photo = photo_id, "Unpublished photograph");
        self.db()
            .get_photo(photo_id)
            .map_err(PublishError::Storage)?
            .ok_or(PublishError::NotFound(photo_id))
    }

    /// Remove the photograph and its stored image irrecoverably. The
    /// referenced camera is untouched.
    pub fn delete(&self, photo_id: i64) -> Result<(), PublishError> {
        let lock = self.photo_lock(photo_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let image_path = self
            .db()
            .delete_photo(photo_id)
            .map_err(PublishError::Storage)?
            .ok_or(PublishError::NotFound(photo_id))?;

        self.store()
            .remove(&image_path)
            .map_err(PublishError::Storage)?;

        tracing::info!(photo = photo_id, "Deleted photograph");
        Ok(())
    }
}

/// Encode the redacted buffer back into the photograph's on-disk format.
/// JPEG has no alpha channel, so it gets the RGB flattening.
fn encode_image(rgba: RgbaImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgba8(rgba)
            .to_rgb8()
            .write_to(&mut cursor, ImageFormat::Jpeg)?,
        other => DynamicImage::ImageRgba8(rgba).write_to(&mut cursor, other)?,
    }
    Ok(bytes)
}
