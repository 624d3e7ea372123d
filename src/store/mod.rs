//! Telemetry storage
//!
//! The dashboard reads detections, sensor readings, device health and logs,
//! and the ingestion endpoint appends detections. Calls are blocking; async
//! callers run them on the blocking pool.

pub mod memory;
pub mod records;
pub mod sqlite;

pub use memory::MemoryStore;
pub use records::{Detection, DeviceHealth, LogEntry, NewDetection, SensorReading};
pub use sqlite::SqliteStore;

use crate::error::StoreError;

/// Storage backend for telemetry records
pub trait TelemetryStore: Send + Sync {
    /// Write all detections or none of them. Returns how many were written.
    fn insert_detections(&self, detections: &[NewDetection]) -> Result<usize, StoreError>;

    /// All detections, oldest first
    fn detections(&self) -> Result<Vec<Detection>, StoreError>;

    fn detection_count(&self) -> Result<u64, StoreError>;

    fn insert_sensor_reading(&self, reading: &SensorReading) -> Result<i64, StoreError>;

    /// All sensor readings, oldest first
    fn sensor_readings(&self) -> Result<Vec<SensorReading>, StoreError>;

    fn latest_sensor_reading(&self) -> Result<Option<SensorReading>, StoreError>;

    fn insert_device_health(&self, health: &DeviceHealth) -> Result<i64, StoreError>;

    /// All device health rows, oldest first
    fn device_health(&self) -> Result<Vec<DeviceHealth>, StoreError>;

    fn latest_device_health(&self) -> Result<Option<DeviceHealth>, StoreError>;

    fn insert_log(&self, entry: &LogEntry) -> Result<i64, StoreError>;

    /// All log entries, newest first
    fn logs(&self) -> Result<Vec<LogEntry>, StoreError>;
}
