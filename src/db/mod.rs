mod schema;
pub mod cameras;
pub mod detections;
pub mod photos;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

pub use cameras::Camera;
pub use detections::{Detection, NewDetection};
pub use photos::{AnalysisWrite, GalleryFilter, Photo, PhotoEdits, PhotoStatus};
pub use schema::{MIGRATIONS, SCHEMA};

pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self { conn })
    }

    fn configure(conn: &Connection) -> Result<()> {
        // Referential integrity (camera SET NULL, detection CASCADE) needs
        // foreign keys on; writers from other connections wait instead of
        // failing immediately.
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(())
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        self.run_migrations()?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        for migration in MIGRATIONS {
            let _ = self.conn.execute(migration, []);
        }
        Ok(())
    }
}
