//! SQLite-backed telemetry store

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::store::records::{Detection, DeviceHealth, LogEntry, NewDetection, SensorReading};
use crate::store::TelemetryStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS detection (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    species TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 1,
    confidence REAL,
    timestamp TEXT NOT NULL,
    x REAL,
    y REAL
);
CREATE INDEX IF NOT EXISTS idx_detection_timestamp ON detection(timestamp);

CREATE TABLE IF NOT EXISTS sensor_reading (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    temperature REAL,
    humidity REAL,
    pressure REAL,
    depth REAL,
    turbidity REAL,
    lux REAL,
    ph REAL,
    salinity REAL,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sensor_reading_timestamp ON sensor_reading(timestamp);

CREATE TABLE IF NOT EXISTS device_health (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cpu_temp REAL,
    gpu_temp REAL,
    battery_level REAL,
    fan_status TEXT,
    storage_used REAL,
    connectivity TEXT,
    yolo_fps REAL,
    model_name TEXT,
    cpu_usage REAL,
    gpu_usage REAL,
    ram_usage REAL,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_device_health_timestamp ON device_health(timestamp);

CREATE TABLE IF NOT EXISTS log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type TEXT NOT NULL,
    message TEXT,
    severity TEXT,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_log_timestamp ON log(timestamp);
"#;

const DETECTION_COLUMNS: &str = "id, species, count, confidence, timestamp, x, y";
const SENSOR_COLUMNS: &str =
    "id, temperature, humidity, pressure, depth, turbidity, lux, ph, salinity, timestamp";
const HEALTH_COLUMNS: &str = "id, cpu_temp, gpu_temp, battery_level, fan_status, storage_used, \
     connectivity, yolo_fps, model_name, cpu_usage, gpu_usage, ram_usage, timestamp";
const LOG_COLUMNS: &str = "id, event_type, message, severity, timestamp";

/// Telemetry database with a fresh connection per call
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open the database at `path`, creating file and schema if needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("{}: {}", parent.display(), e))
            })?;
        }

        let store = Self { path };
        store.conn()?.execute_batch(SCHEMA)?;
        tracing::info!("Telemetry database ready at {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        Ok(conn)
    }

    fn query_all<T, F>(&self, sql: &str, map: F) -> Result<Vec<T>, StoreError>
    where
        F: Fn(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| map(row))?;
        Ok(rows.collect::<rusqlite::Result<Vec<T>>>()?)
    }

    fn query_latest<T, F>(&self, sql: &str, map: F) -> Result<Option<T>, StoreError>
    where
        F: Fn(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.conn()?;
        Ok(conn.query_row(sql, [], |row| map(row)).optional()?)
    }
}

fn detection_from_row(row: &Row<'_>) -> rusqlite::Result<Detection> {
    Ok(Detection {
        id: row.get(0)?,
        species: row.get(1)?,
        count: row.get(2)?,
        confidence: row.get(3)?,
        timestamp: row.get(4)?,
        x: row.get(5)?,
        y: row.get(6)?,
    })
}

fn sensor_from_row(row: &Row<'_>) -> rusqlite::Result<SensorReading> {
    Ok(SensorReading {
        id: row.get(0)?,
        temperature: row.get(1)?,
        humidity: row.get(2)?,
        pressure: row.get(3)?,
        depth: row.get(4)?,
        turbidity: row.get(5)?,
        lux: row.get(6)?,
        ph: row.get(7)?,
        salinity: row.get(8)?,
        timestamp: row.get(9)?,
    })
}

fn health_from_row(row: &Row<'_>) -> rusqlite::Result<DeviceHealth> {
    Ok(DeviceHealth {
        id: row.get(0)?,
        cpu_temp: row.get(1)?,
        gpu_temp: row.get(2)?,
        battery_level: row.get(3)?,
        fan_status: row.get(4)?,
        storage_used: row.get(5)?,
        connectivity: row.get(6)?,
        yolo_fps: row.get(7)?,
        model_name: row.get(8)?,
        cpu_usage: row.get(9)?,
        gpu_usage: row.get(10)?,
        ram_usage: row.get(11)?,
        timestamp: row.get(12)?,
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        event_type: row.get(1)?,
        message: row.get(2)?,
        severity: row.get(3)?,
        timestamp: row.get(4)?,
    })
}

impl TelemetryStore for SqliteStore {
    fn insert_detections(&self, detections: &[NewDetection]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        // Dropping the transaction without commit rolls the batch back
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO detection (species, count, confidence, timestamp, x, y)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for d in detections {
                stmt.execute(params![d.species, d.count, d.confidence, d.timestamp, d.x, d.y])?;
            }
        }
        tx.commit()?;
        Ok(detections.len())
    }

    fn detections(&self) -> Result<Vec<Detection>, StoreError> {
        self.query_all(
            &format!("SELECT {} FROM detection ORDER BY timestamp ASC, id ASC", DETECTION_COLUMNS),
            detection_from_row,
        )
    }

    fn detection_count(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM detection", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn insert_sensor_reading(&self, r: &SensorReading) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sensor_reading
                (temperature, humidity, pressure, depth, turbidity, lux, ph, salinity, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                r.temperature,
                r.humidity,
                r.pressure,
                r.depth,
                r.turbidity,
                r.lux,
                r.ph,
                r.salinity,
                r.timestamp
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn sensor_readings(&self) -> Result<Vec<SensorReading>, StoreError> {
        self.query_all(
            &format!("SELECT {} FROM sensor_reading ORDER BY timestamp ASC, id ASC", SENSOR_COLUMNS),
            sensor_from_row,
        )
    }

    fn latest_sensor_reading(&self) -> Result<Option<SensorReading>, StoreError> {
        self.query_latest(
            &format!(
                "SELECT {} FROM sensor_reading ORDER BY timestamp DESC, id DESC LIMIT 1",
                SENSOR_COLUMNS
            ),
            sensor_from_row,
        )
    }

    fn insert_device_health(&self, h: &DeviceHealth) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO device_health
                (cpu_temp, gpu_temp, battery_level, fan_status, storage_used, connectivity,
                 yolo_fps, model_name, cpu_usage, gpu_usage, ram_usage, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                h.cpu_temp,
                h.gpu_temp,
                h.battery_level,
                h.fan_status,
                h.storage_used,
                h.connectivity,
                h.yolo_fps,
                h.model_name,
                h.cpu_usage,
                h.gpu_usage,
                h.ram_usage,
                h.timestamp
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn device_health(&self) -> Result<Vec<DeviceHealth>, StoreError> {
        self.query_all(
            &format!("SELECT {} FROM device_health ORDER BY timestamp ASC, id ASC", HEALTH_COLUMNS),
            health_from_row,
        )
    }

    fn latest_device_health(&self) -> Result<Option<DeviceHealth>, StoreError> {
        self.query_latest(
            &format!(
                "SELECT {} FROM device_health ORDER BY timestamp DESC, id DESC LIMIT 1",
                HEALTH_COLUMNS
            ),
            health_from_row,
        )
    }

    fn insert_log(&self, entry: &LogEntry) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO log (event_type, message, severity, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![entry.event_type, entry.message, entry.severity, entry.timestamp],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn logs(&self) -> Result<Vec<LogEntry>, StoreError> {
        self.query_all(
            &format!("SELECT {} FROM log ORDER BY timestamp DESC, id DESC", LOG_COLUMNS),
            log_from_row,
        )
    }
}
