//! Camera registry management: validated create/update/deactivate.
//!
//! The resolver auto-creates cameras during analysis; this is the explicit
//! researcher-facing side with full payload validation.

use anyhow::Result;

use crate::db::Camera;
use crate::error::EditError;

use super::Pipeline;

const NAME_MAX_LEN: usize = 64;
const DESCRIPTION_MAX_LEN: usize = 255;
const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

impl Pipeline {
    pub fn list_cameras(&self, query: Option<&str>) -> Result<Vec<Camera>> {
        self.db().list_cameras(query)
    }

    /// Explicitly create a camera with a validated payload.
    pub fn create_camera(
        &self,
        name: &str,
        base_latitude: f64,
        base_longitude: f64,
        description: &str,
        is_active: bool,
    ) -> Result<Camera, EditError> {
        let name = validate_camera_name(name)?;
        validate_coordinates(base_latitude, base_longitude)?;
        validate_description(description)?;

        if self.db().find_camera_by_name(&name)?.is_some() {
            return Err(EditError::DuplicateCameraName(name));
        }

        let id = self
            .db()
            .create_camera(&name, base_latitude, base_longitude, description, is_active)?;
        tracing::info!(camera = %name, id, "Created camera");
        self.db()
            .get_camera(id)?
            .ok_or(EditError::CameraNotFound(id))
    }

    pub fn update_camera(
        &self,
        camera_id: i64,
        name: &str,
        base_latitude: f64,
        base_longitude: f64,
        description: &str,
        is_active: bool,
    ) -> Result<Camera, EditError> {
        let name = validate_camera_name(name)?;
        validate_coordinates(base_latitude, base_longitude)?;
        validate_description(description)?;

        if self
            .db()
            .get_camera(camera_id)?
            .is_none()
        {
            return Err(EditError::CameraNotFound(camera_id));
        }
        if let Some(existing) = self.db().find_camera_by_name(&name)? {
            if existing.id != camera_id {
                return Err(EditError::DuplicateCameraName(name));
            }
        }

        self.db().update_camera(
            camera_id,
            &name,
            base_latitude,
            base_longitude,
            description,
            is_active,
        )?;
        self.db()
            .get_camera(camera_id)?
            .ok_or(EditError::CameraNotFound(camera_id))
    }

    /// Soft-deactivate: the camera stops matching overlay tokens but keeps
    /// its photo references.
    pub fn deactivate_camera(&self, camera_id: i64) -> Result<Camera, EditError> {
        self.set_camera_active(camera_id, false)
    }

    pub fn reactivate_camera(&self, camera_id: i64) -> Result<Camera, EditError> {
        self.set_camera_active(camera_id, true)
    }

    fn set_camera_active(&self, camera_id: i64, active: bool) -> Result<Camera, EditError> {
        if self.db().get_camera(camera_id)?.is_none() {
            return Err(EditError::CameraNotFound(camera_id));
        }
        self.db().set_camera_active(camera_id, active)?;
        tracing::info!(camera = camera_id, active, "Changed camera active state");
        self.db()
            .get_camera(camera_id)?
            .ok_or(EditError::CameraNotFound(camera_id))
    }
}

/// Uppercase and validate a camera name: first character alphanumeric, then
/// letters, digits, `-` or `_`, at most 64 characters total.
fn validate_camera_name(raw: &str) -> Result<String, EditError> {
    let name = raw.trim().to_ascii_uppercase();
    let mut chars = name.chars();

    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {
            name.len() >= 2
                && name.len() <= NAME_MAX_LEN
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(name)
    } else {
        Err(EditError::InvalidCameraName(raw.to_string()))
    }
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), EditError> {
    if latitude < LATITUDE_RANGE.0 || latitude > LATITUDE_RANGE.1 {
        return Err(EditError::OutOfRange {
            field: "latitude",
            min: LATITUDE_RANGE.0,
            max: LATITUDE_RANGE.1,
        });
    }
    if longitude < LONGITUDE_RANGE.0 || longitude > LONGITUDE_RANGE.1 {
        return Err(EditError::OutOfRange {
            field: "longitude",
            min: LONGITUDE_RANGE.0,
            max: LONGITUDE_RANGE.1,
        });
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), EditError> {
    if description.len() > DESCRIPTION_MAX_LEN {
        return Err(EditError::DescriptionTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{test_pipeline, FakeDetector};

    fn registry_pipeline(dir: &std::path::Path) -> Pipeline {
        test_pipeline(dir, Some(""), FakeDetector::with(vec![]))
    }

    #[test]
    fn test_create_normalizes_case() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = registry_pipeline(dir.path());

        let camera = pipeline
            .create_camera("trailcam05", 47.7, -122.2, "creek crossing", true)
            .unwrap();
        assert_eq!(camera.name, "TRAILCAM05");
        assert!(camera.is_active);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = registry_pipeline(dir.path());

        for bad in ["", "A", "-CAM05", "CAM 05", "CAM/05"] {
            let result = pipeline.create_camera(bad, 0.0, 0.0, "", true);
            assert!(
                matches!(result, Err(EditError::InvalidCameraName(_))),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = registry_pipeline(dir.path());

        pipeline
            .create_camera("TRAILCAM05", 0.0, 0.0, "", true)
            .unwrap();
        let result = pipeline.create_camera("trailcam05", 1.0, 1.0, "", true);
        assert!(matches!(result, Err(EditError::DuplicateCameraName(_))));
    }

    #[test]
    fn test_coordinate_validation() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = registry_pipeline(dir.path());

        let result = pipeline.create_camera("TRAILCAM05", 91.0, 0.0, "", true);
        assert!(matches!(
            result,
            Err(EditError::OutOfRange { field: "latitude", .. })
        ));

        let result = pipeline.create_camera("TRAILCAM05", 0.0, -181.0, "", true);
        assert!(matches!(
            result,
            Err(EditError::OutOfRange { field: "longitude", .. })
        ));
    }

    #[test]
    fn test_deactivate_then_reactivate_controls_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = registry_pipeline(dir.path());

        let camera = pipeline
            .create_camera("TRAILCAM05", 47.7, -122.2, "", true)
            .unwrap();

        pipeline.deactivate_camera(camera.id).unwrap();
        assert!(pipeline.resolve_camera("TRAILCAM05").unwrap().is_none());

        pipeline.reactivate_camera(camera.id).unwrap();
        let resolved = pipeline.resolve_camera("TRAILCAM05").unwrap().unwrap();
        assert_eq!(resolved.id, camera.id);
    }

    #[test]
    fn test_update_keeps_own_name() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = registry_pipeline(dir.path());

        let camera = pipeline
            .create_camera("TRAILCAM05", 47.7, -122.2, "", true)
            .unwrap();
        let updated = pipeline
            .update_camera(camera.id, "TRAILCAM05", 48.0, -122.0, "moved uphill", true)
            .unwrap();
        assert_eq!(updated.description, "moved uphill");
        assert!((updated.base_latitude - 48.0).abs() < 1e-9);
    }
}
