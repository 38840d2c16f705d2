pub const SCHEMA: &str = r#"
-- Cameras: canonical identity for a physical trail camera / location
CREATE TABLE IF NOT EXISTS cameras (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,       -- canonical form, e.g. TRAILCAM05
    base_latitude REAL NOT NULL,
    base_longitude REAL NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_cameras_active ON cameras(is_active);

-- Photos: one uploaded trail-camera image
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    image_path TEXT NOT NULL UNIQUE, -- relative to the media root
    status TEXT NOT NULL DEFAULT 'staging',  -- 'staging' or 'published'

    -- Overlay-derived metadata (null until analyzed or edited)
    date_taken TEXT,                 -- ISO date, YYYY-MM-DD
    time_taken TEXT,                 -- 24-hour HH:MM or HH:MM:SS
    temperature REAL,                -- degrees Celsius
    pressure REAL,                   -- inches of mercury

    -- Photo location (defaulted from the camera base when attached)
    latitude REAL,
    longitude REAL,

    camera_id INTEGER,
    uploaded_by TEXT,
    uploaded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    analyzed_at TEXT,

    FOREIGN KEY (camera_id) REFERENCES cameras(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_photos_status ON photos(status);
CREATE INDEX IF NOT EXISTS idx_photos_camera ON photos(camera_id);
CREATE INDEX IF NOT EXISTS idx_photos_date ON photos(date_taken);

-- Detections: objects found in a photo, canonical fractional boxes
CREATE TABLE IF NOT EXISTS detections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    photo_id INTEGER NOT NULL,
    label TEXT NOT NULL,             -- detector vocabulary, e.g. 'person'
    confidence REAL NOT NULL,        -- 0-1
    x_min REAL NOT NULL,             -- fractional [0,1], top-left origin
    y_min REAL NOT NULL,
    x_max REAL NOT NULL,
    y_max REAL NOT NULL,
    redacted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_detections_photo ON detections(photo_id);
CREATE INDEX IF NOT EXISTS idx_detections_label ON detections(label);
"#;

/// Idempotent upgrades for databases created before a column existed.
/// Failures are ignored; a column that is already present is fine.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE photos ADD COLUMN analyzed_at TEXT",
    "ALTER TABLE photos ADD COLUMN uploaded_by TEXT",
];
