//! Analysis orchestration.
//!
//! One `Pipeline` instance wires the store, the database and the two
//! external engines together and exposes the operations the web layer
//! consumes: ingest, analyze, edit, publish/unpublish/delete, camera
//! resolution and registry management.

mod publish;
mod registry;

use anyhow::{anyhow, Result};

use crate::config::{Config, OverlayConfig};
use crate::db::{
    AnalysisWrite, Camera, Database, Detection, NewDetection, Photo, PhotoEdits, PhotoStatus,
};
use crate::detect::{normalize_detections, ObjectDetector};
use crate::error::{AnalysisError, EditError};
use crate::locks::PhotoLocks;
use crate::overlay::{parse_overlay, OverlayFields, PRESSURE_RANGE_INHG, TEMPERATURE_RANGE_C};
use crate::recognition::{prepare_strip, TextRecognizer};
use crate::store::MediaStore;

const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// What one analysis run produced, as persisted.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub fields: OverlayFields,
    pub detections: Vec<Detection>,
}

pub struct Pipeline {
    db: Database,
    store: MediaStore,
    recognizer: Box<dyn TextRecognizer>,
    detector: Box<dyn ObjectDetector>,
    overlay: OverlayConfig,
    camera_defaults: (f64, f64),
    locks: PhotoLocks,
}

impl Pipeline {
    pub fn new(
        db: Database,
        store: MediaStore,
        recognizer: Box<dyn TextRecognizer>,
        detector: Box<dyn ObjectDetector>,
        config: &Config,
    ) -> Self {
        Self {
            db,
            store,
            recognizer,
            detector,
            overlay: config.overlay.clone(),
            camera_defaults: (
                config.cameras.default_latitude,
                config.cameras.default_longitude,
            ),
            locks: PhotoLocks::new(),
        }
    }

    /// Read access for listings, exports and the web layer.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The media store backing this pipeline.
    pub fn store(&self) -> &MediaStore {
        &self.store
    }

    /// Register uploaded image bytes: store them content-addressed and
    /// create a staging photograph with all metadata blank.
    pub fn ingest(&self, bytes: &[u8], uploaded_by: Option<&str>) -> Result<Photo> {
        let format = image::guess_format(bytes)
            .map_err(|e| anyhow!("upload is not a recognizable image: {}", e))?;
        let extension = format
            .extensions_str()
            .first()
            .copied()
            .unwrap_or("img");

        let relative = self.store.ingest(bytes, extension)?;
        let photo_id = self.db.create_photo(&relative, uploaded_by)?;

        tracing::info!(photo = photo_id, path = %relative, "Ingested photograph");
        self.db
            .get_photo(photo_id)?
            .ok_or_else(|| anyhow!("photo {} vanished after create", photo_id))
    }

    /// Run the full analysis for one staging photograph.
    ///
    /// Overlay noise and unrecognizable fields are not errors; engine
    /// transport failures are, and they leave the photograph's existing
    /// metadata untouched. All writes land in a single transaction.
    pub fn analyze(&self, photo_id: i64) -> Result<AnalysisOutcome, AnalysisError> {
        let lock = self.locks.for_photo(photo_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let photo = self
            .db
            .get_photo(photo_id)?
            .ok_or(AnalysisError::NotFound(photo_id))?;
        if photo.status == PhotoStatus::Published {
            return Err(AnalysisError::NotStaging(photo_id));
        }

        let bytes = self.store.read(&photo.image_path)?;
        let img = image::load_from_memory(&bytes).map_err(|e| AnalysisError::ImageDecode {
            path: photo.image_path.clone(),
            reason: e.to_string(),
        })?;

        let strip = prepare_strip(&img, &self.overlay)?;
        let text = self
            .recognizer
            .recognize(&strip)
            .map_err(|e| AnalysisError::RecognitionUnavailable(e.to_string()))?;

        let fields = parse_overlay(&text);
        tracing::debug!(photo = photo_id, raw = %fields.raw_text, "Parsed overlay");
        if !fields.unrecognized.is_empty() {
            tracing::debug!(
                photo = photo_id,
                tokens = ?fields.unrecognized,
                "Unrecognized overlay tokens"
            );
        }

        let camera = match fields.camera_token.as_deref() {
            Some(token) => {
                let (lat, lon) = self.camera_defaults;
                self.db.resolve_camera(token, lat, lon)?
            }
            None => None,
        };

        let raw_detections = self
            .detector
            .detect(&bytes)
            .map_err(|e| AnalysisError::RecognitionUnavailable(e.to_string()))?;
        let normalized = normalize_detections(
            &raw_detections,
            self.detector.box_format(),
            img.width(),
            img.height(),
        );

        // Photo location: keep explicit values, otherwise default from the
        // resolved camera's base coordinates.
        let (latitude, longitude) = match &camera {
            Some(cam) => (
                photo.latitude.or(Some(cam.base_latitude)),
                photo.longitude.or(Some(cam.base_longitude)),
            ),
            None => (photo.latitude, photo.longitude),
        };

        let write = AnalysisWrite {
            date_taken: fields.date,
            time_taken: fields.time,
            temperature: fields.temperature_c,
            pressure: fields.pressure_inhg,
            camera_id: camera.as_ref().map(|c| c.id),
            latitude,
            longitude,
            detections: normalized
                .iter()
                .map(|d| NewDetection {
                    label: d.label.clone(),
                    confidence: d.confidence,
                    x_min: d.x_min,
                    y_min: d.y_min,
                    x_max: d.x_max,
                    y_max: d.y_max,
                })
                .collect(),
        };
        self.db.apply_analysis(photo_id, &write)?;

        let detections = self.db.get_detections_for_photo(photo_id)?;
        tracing::info!(
            photo = photo_id,
            camera = ?fields.camera_token,
            detections = detections.len(),
            "Analysis complete"
        );

        Ok(AnalysisOutcome { fields, detections })
    }

    /// Validated, owner-agnostic manual edits for a staging photograph.
    pub fn edit_photo(&self, photo_id: i64, edits: &PhotoEdits) -> Result<Photo, EditError> {
        let lock = self.locks.for_photo(photo_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        self.apply_edits_locked(photo_id, edits)?;
        self.db
            .get_photo(photo_id)?
            .ok_or(EditError::PhotoNotFound(photo_id))
    }

    /// Edit body shared with publish (which already holds the photo lock).
    pub(crate) fn apply_edits_locked(
        &self,
        photo_id: i64,
        edits: &PhotoEdits,
    ) -> Result<(), EditError> {
        let photo = self
            .db
            .get_photo(photo_id)?
            .ok_or(EditError::PhotoNotFound(photo_id))?;
        if photo.status == PhotoStatus::Published {
            return Err(EditError::Published(photo_id));
        }

        self.validate_edits(edits)?;

        let mut edits = edits.clone();
        // Attaching a camera defaults the photo location to its base.
        if let Some(camera_id) = edits.camera_id {
            let camera = self
                .db
                .get_camera(camera_id)?
                .ok_or(EditError::UnknownCamera(camera_id))?;
            if edits.latitude.is_none() && photo.latitude.is_none() {
                edits.latitude = Some(camera.base_latitude);
            }
            if edits.longitude.is_none() && photo.longitude.is_none() {
                edits.longitude = Some(camera.base_longitude);
            }
        }

        self.db.update_photo_fields(photo_id, &edits)?;
        Ok(())
    }

    fn validate_edits(&self, edits: &PhotoEdits) -> Result<(), EditError> {
        check_range("temperature", edits.temperature, TEMPERATURE_RANGE_C)?;
        check_range("pressure", edits.pressure, PRESSURE_RANGE_INHG)?;
        check_range("latitude", edits.latitude, LATITUDE_RANGE)?;
        check_range("longitude", edits.longitude, LONGITUDE_RANGE)?;
        Ok(())
    }

    /// Resolve a raw camera token the way analysis does: normalize, then
    /// match-or-create against the registry.
    pub fn resolve_camera(&self, raw_token: &str) -> Result<Option<Camera>> {
        match crate::overlay::normalize_camera_token(raw_token) {
            Some(token) => {
                let (lat, lon) = self.camera_defaults;
                self.db.resolve_camera(&token, lat, lon)
            }
            None => Ok(None),
        }
    }

    pub(crate) fn photo_lock(&self, photo_id: i64) -> std::sync::Arc<std::sync::Mutex<()>> {
        self.locks.for_photo(photo_id)
    }
}

fn check_range(
    field: &'static str,
    value: Option<f64>,
    (min, max): (f64, f64),
) -> Result<(), EditError> {
    match value {
        Some(v) if v < min || v > max => Err(EditError::OutOfRange { field, min, max }),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{Config, DetectorBoxFormat};
    use crate::detect::RawDetection;
    use anyhow::anyhow;
    use image::Rgba;
    use std::sync::Mutex;

    /// Recognizer returning a fixed line, or failing when `text` is None.
    pub(crate) struct FakeOcr {
        pub text: Option<String>,
    }

    impl TextRecognizer for FakeOcr {
        fn recognize(&self, _strip_png: &[u8]) -> Result<String> {
            self.text
                .clone()
                .ok_or_else(|| anyhow!("recognition engine down"))
        }
    }

    /// Detector returning queued results, or failing once the queue is empty.
    pub(crate) struct FakeDetector {
        pub results: Mutex<Vec<Vec<RawDetection>>>,
    }

    impl FakeDetector {
        pub(crate) fn with(results: Vec<Vec<RawDetection>>) -> Self {
            Self {
                results: Mutex::new(results),
            }
        }
    }

    impl ObjectDetector for FakeDetector {
        fn detect(&self, _image_bytes: &[u8]) -> Result<Vec<RawDetection>> {
            let mut queue = self.results.lock().unwrap();
            if queue.is_empty() {
                return Err(anyhow!("detector down"));
            }
            Ok(queue.remove(0))
        }

        fn box_format(&self) -> DetectorBoxFormat {
            DetectorBoxFormat::FractionalXywh
        }
    }

    pub(crate) fn sample_jpeg() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(64, 48, Rgba([128, 160, 128, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .to_rgb8()
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Jpeg,
            )
            .unwrap();
        bytes
    }

    pub(crate) fn person_detection() -> RawDetection {
        RawDetection {
            label: "2".to_string(),
            confidence: 0.93,
            bbox: [0.25, 0.25, 0.5, 0.5],
        }
    }

    pub(crate) fn test_pipeline(
        media_root: &std::path::Path,
        ocr_text: Option<&str>,
        detector: FakeDetector,
    ) -> Pipeline {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let store = MediaStore::new(media_root).unwrap();
        Pipeline::new(
            db,
            store,
            Box::new(FakeOcr {
                text: ocr_text.map(str::to_string),
            }),
            Box::new(detector),
            &Config::default(),
        )
    }

    const OVERLAY_LINE: &str = "TRAILCAMQ5 10/04/2025 06:12 PM 14.2C 29.87inHg";

    #[test]
    fn test_analyze_full_run() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(
            dir.path(),
            Some(OVERLAY_LINE),
            FakeDetector::with(vec![vec![person_detection()]]),
        );

        let photo = pipeline.ingest(&sample_jpeg(), Some("researcher1")).unwrap();
        let outcome = pipeline.analyze(photo.id).unwrap();

        assert_eq!(outcome.fields.camera_token.as_deref(), Some("TRAILCAM05"));
        assert_eq!(outcome.detections.len(), 1);
        assert_eq!(outcome.detections[0].label, "person");
        assert!(!outcome.detections[0].redacted);

        let stored = pipeline.db().get_photo(photo.id).unwrap().unwrap();
        assert_eq!(
            stored.date_taken,
            chrono::NaiveDate::from_ymd_opt(2025, 10, 4)
        );
        assert_eq!(
            stored.time_taken,
            chrono::NaiveTime::from_hms_opt(18, 12, 0)
        );
        assert_eq!(stored.temperature, Some(14.2));
        assert_eq!(stored.pressure, Some(29.87));
        assert!(stored.camera_id.is_some());
        // Location defaulted from the auto-created camera's base.
        assert!(stored.latitude.is_some());
        assert!(stored.longitude.is_some());

        let camera = pipeline
            .db()
            .get_camera(stored.camera_id.unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(camera.name, "TRAILCAM05");
        assert!(camera.is_active);
    }

    #[test]
    fn test_reanalysis_replaces_detections() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(
            dir.path(),
            Some(OVERLAY_LINE),
            FakeDetector::with(vec![
                vec![person_detection(), person_detection()],
                vec![person_detection()],
            ]),
        );

        let photo = pipeline.ingest(&sample_jpeg(), None).unwrap();
        pipeline.analyze(photo.id).unwrap();
        assert_eq!(pipeline.db().count_detections(photo.id).unwrap(), 2);

        let outcome = pipeline.analyze(photo.id).unwrap();
        assert_eq!(outcome.detections.len(), 1);
        assert_eq!(pipeline.db().count_detections(photo.id).unwrap(), 1);
    }

    #[test]
    fn test_detector_failure_leaves_metadata_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(
            dir.path(),
            Some(OVERLAY_LINE),
            FakeDetector::with(vec![vec![person_detection()]]),
        );

        let photo = pipeline.ingest(&sample_jpeg(), None).unwrap();
        pipeline.analyze(photo.id).unwrap();
        let before = pipeline.db().get_photo(photo.id).unwrap().unwrap();

        // Second run: the detector queue is exhausted and errors.
        let err = pipeline.analyze(photo.id).unwrap_err();
        assert!(matches!(err, AnalysisError::RecognitionUnavailable(_)));

        let after = pipeline.db().get_photo(photo.id).unwrap().unwrap();
        assert_eq!(after.date_taken, before.date_taken);
        assert_eq!(after.temperature, before.temperature);
        assert_eq!(pipeline.db().count_detections(photo.id).unwrap(), 1);
    }

    #[test]
    fn test_ocr_failure_is_recognition_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path(), None, FakeDetector::with(vec![]));

        let photo = pipeline.ingest(&sample_jpeg(), None).unwrap();
        let err = pipeline.analyze(photo.id).unwrap_err();
        assert!(matches!(err, AnalysisError::RecognitionUnavailable(_)));
    }

    #[test]
    fn test_analyze_missing_photo() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path(), Some(""), FakeDetector::with(vec![]));
        assert!(matches!(
            pipeline.analyze(999),
            Err(AnalysisError::NotFound(999))
        ));
    }

    #[test]
    fn test_garbled_overlay_yields_null_fields_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(
            dir.path(),
            Some("##garbled@@ nonsense"),
            FakeDetector::with(vec![vec![]]),
        );

        let photo = pipeline.ingest(&sample_jpeg(), None).unwrap();
        let outcome = pipeline.analyze(photo.id).unwrap();
        assert!(outcome.fields.date.is_none());
        assert!(outcome.fields.camera_token.is_none());

        let stored = pipeline.db().get_photo(photo.id).unwrap().unwrap();
        assert!(stored.date_taken.is_none());
        assert!(stored.camera_id.is_none());
    }

    #[test]
    fn test_edit_validation() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path(), Some(""), FakeDetector::with(vec![]));
        let photo = pipeline.ingest(&sample_jpeg(), None).unwrap();

        let err = pipeline
            .edit_photo(
                photo.id,
                &PhotoEdits {
                    pressure: Some(112.0),
                    ..PhotoEdits::default()
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EditError::OutOfRange { field: "pressure", .. }
        ));

        let err = pipeline
            .edit_photo(
                photo.id,
                &PhotoEdits {
                    camera_id: Some(12345),
                    ..PhotoEdits::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, EditError::UnknownCamera(12345)));

        let edited = pipeline
            .edit_photo(
                photo.id,
                &PhotoEdits {
                    temperature: Some(3.5),
                    ..PhotoEdits::default()
                },
            )
            .unwrap();
        assert_eq!(edited.temperature, Some(3.5));
    }

    #[test]
    fn test_resolve_camera_surface() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path(), Some(""), FakeDetector::with(vec![]));

        let camera = pipeline.resolve_camera("trailcamq5").unwrap().unwrap();
        assert_eq!(camera.name, "TRAILCAM05");

        let again = pipeline.resolve_camera("TRAILCAM05").unwrap().unwrap();
        assert_eq!(camera.id, again.id);

        assert!(pipeline.resolve_camera("").unwrap().is_none());
    }
}
