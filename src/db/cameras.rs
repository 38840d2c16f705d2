//! Camera registry: canonical identities for physical trail cameras.

use anyhow::Result;
use rusqlite::params;

use super::Database;

/// A camera/location identity. `name` is the canonical normalized form.
#[derive(Debug, Clone)]
pub struct Camera {
    pub id: i64,
    pub name: String,
    pub base_latitude: f64,
    pub base_longitude: f64,
    pub description: String,
    pub is_active: bool,
}

fn camera_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Camera> {
    Ok(Camera {
        id: row.get(0)?,
        name: row.get(1)?,
        base_latitude: row.get(2)?,
        base_longitude: row.get(3)?,
        description: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
    })
}

const CAMERA_COLUMNS: &str = "id, name, base_latitude, base_longitude, description, is_active";

impl Database {
    /// Create a camera explicitly. The caller validates the payload; a
    /// duplicate name surfaces as a constraint error.
    pub fn create_camera(
        &self,
        name: &str,
        base_latitude: f64,
        base_longitude: f64,
        description: &str,
        is_active: bool,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO cameras (name, base_latitude, base_longitude, description, is_active)
             VALUES (?, ?, ?, ?, ?)",
            params![name, base_latitude, base_longitude, description, is_active as i64],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_camera(&self, camera_id: i64) -> Result<Option<Camera>> {
        let result = self.conn.query_row(
            &format!("SELECT {CAMERA_COLUMNS} FROM cameras WHERE id = ?"),
            [camera_id],
            camera_from_row,
        );
        match result {
            Ok(camera) => Ok(Some(camera)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Find a camera by canonical name regardless of active state.
    pub fn find_camera_by_name(&self, name: &str) -> Result<Option<Camera>> {
        let result = self.conn.query_row(
            &format!("SELECT {CAMERA_COLUMNS} FROM cameras WHERE name = ?"),
            [name],
            camera_from_row,
        );
        match result {
            Ok(camera) => Ok(Some(camera)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Find an active camera by canonical name. Inactive cameras never match:
    /// attaching one requires explicit reactivation by a researcher.
    pub fn find_active_camera_by_name(&self, name: &str) -> Result<Option<Camera>> {
        let result = self.conn.query_row(
            &format!("SELECT {CAMERA_COLUMNS} FROM cameras WHERE name = ? AND is_active = 1"),
            [name],
            camera_from_row,
        );
        match result {
            Ok(camera) => Ok(Some(camera)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List cameras, optionally filtered by a name/description substring.
    pub fn list_cameras(&self, query: Option<&str>) -> Result<Vec<Camera>> {
        let mut cameras = Vec::new();
        match query {
            Some(q) if !q.is_empty() => {
                let pattern = format!("%{q}%");
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {CAMERA_COLUMNS} FROM cameras
                     WHERE name LIKE ? OR description LIKE ?
                     ORDER BY name"
                ))?;
                let rows = stmt.query_map(params![pattern, pattern], camera_from_row)?;
                for row in rows {
                    cameras.push(row?);
                }
            }
            _ => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("SELECT {CAMERA_COLUMNS} FROM cameras ORDER BY name"))?;
                let rows = stmt.query_map([], camera_from_row)?;
                for row in rows {
                    cameras.push(row?);
                }
            }
        }
        Ok(cameras)
    }

    pub fn update_camera(
        &self,
        camera_id: i64,
        name: &str,
        base_latitude: f64,
        base_longitude: f64,
        description: &str,
        is_active: bool,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE cameras
             SET name = ?, base_latitude = ?, base_longitude = ?, description = ?,
                 is_active = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            params![
                name,
                base_latitude,
                base_longitude,
                description,
                is_active as i64,
                camera_id
            ],
        )?;
        Ok(())
    }

    /// Soft activate/deactivate. Cameras referenced by photos are never deleted.
    pub fn set_camera_active(&self, camera_id: i64, active: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE cameras SET is_active = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![active as i64, camera_id],
        )?;
        Ok(())
    }

    /// Resolve a normalized camera token to an active camera, creating one
    /// with the default base location if the token is new.
    ///
    /// Creation is idempotent under the UNIQUE name constraint: losing a
    /// concurrent create race degrades to a re-read of the winning row. If
    /// the name belongs to an inactive camera the resolver attaches nothing,
    /// so the photo stays camera-less until a researcher reactivates it.
    pub fn resolve_camera(
        &self,
        name: &str,
        default_latitude: f64,
        default_longitude: f64,
    ) -> Result<Option<Camera>> {
        if name.is_empty() {
            return Ok(None);
        }

        if let Some(camera) = self.find_active_camera_by_name(name)? {
            return Ok(Some(camera));
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO cameras (name, base_latitude, base_longitude)
             VALUES (?, ?, ?)",
            params![name, default_latitude, default_longitude],
        )?;

        if inserted > 0 {
            tracing::info!(camera = %name, "Auto-created camera from overlay token");
        }

        let camera = self.find_active_camera_by_name(name)?;
        if camera.is_none() {
            tracing::warn!(
                camera = %name,
                "Overlay token matches an inactive camera; not attaching"
            );
        }
        Ok(camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_resolve_creates_once() {
        let db = test_db();
        let first = db.resolve_camera("TRAILCAM05", 47.0, -122.0).unwrap().unwrap();
        let second = db.resolve_camera("TRAILCAM05", 47.0, -122.0).unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(db.list_cameras(None).unwrap().len(), 1);
        assert!((first.base_latitude - 47.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_ignores_inactive() {
        let db = test_db();
        let id = db
            .create_camera("TRAILCAM07", 47.0, -122.0, "ridge line", true)
            .unwrap();
        db.set_camera_active(id, false).unwrap();

        // The name is taken but inactive: no attach, no duplicate row.
        let resolved = db.resolve_camera("TRAILCAM07", 47.0, -122.0).unwrap();
        assert!(resolved.is_none());
        assert_eq!(db.list_cameras(None).unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_after_losing_race_reads_winner() {
        let db = test_db();
        // Simulate another worker winning the create between lookup and insert.
        let winner = db
            .create_camera("TRAILCAM09", 10.0, 20.0, "", true)
            .unwrap();
        let resolved = db.resolve_camera("TRAILCAM09", 47.0, -122.0).unwrap().unwrap();
        assert_eq!(resolved.id, winner);
        assert!((resolved.base_latitude - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_resolution_yields_one_camera() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.db");
        {
            let db = Database::open(&path).unwrap();
            db.initialize().unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let path = path.clone();
            handles.push(std::thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                db.resolve_camera("TRAILCAM11", 1.0, 2.0)
                    .unwrap()
                    .unwrap()
                    .id
            }));
        }
        let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_cameras(None).unwrap().len(), 1);
    }

    #[test]
    fn test_list_cameras_filter() {
        let db = test_db();
        db.create_camera("TRAILCAM01", 0.0, 0.0, "creek crossing", true)
            .unwrap();
        db.create_camera("TRAILCAM02", 0.0, 0.0, "meadow", true)
            .unwrap();

        let creek = db.list_cameras(Some("creek")).unwrap();
        assert_eq!(creek.len(), 1);
        assert_eq!(creek[0].name, "TRAILCAM01");

        let all = db.list_cameras(None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_duplicate_create_errors() {
        let db = test_db();
        db.create_camera("TRAILCAM03", 0.0, 0.0, "", true).unwrap();
        assert!(db.create_camera("TRAILCAM03", 1.0, 1.0, "", true).is_err());
    }
}
