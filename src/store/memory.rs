//! In-process telemetry store

use parking_lot::RwLock;

use crate::error::StoreError;
use crate::store::records::{Detection, DeviceHealth, LogEntry, NewDetection, SensorReading};
use crate::store::TelemetryStore;

#[derive(Default)]
struct Tables {
    next_id: i64,
    detections: Vec<Detection>,
    sensors: Vec<SensorReading>,
    health: Vec<DeviceHealth>,
    logs: Vec<LogEntry>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Volatile store, handy for tests and demos
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Stable sort on timestamp keeps insertion order for equal timestamps
fn oldest_first<T: Clone, F>(rows: &[T], key: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::NaiveDateTime,
{
    let mut rows = rows.to_vec();
    rows.sort_by_key(|r| key(r));
    rows
}

impl TelemetryStore for MemoryStore {
    fn insert_detections(&self, detections: &[NewDetection]) -> Result<usize, StoreError> {
        let mut tables = self.tables.write();
        for new in detections {
            let id = tables.allocate_id();
            tables.detections.push(Detection {
                id,
                species: new.species.clone(),
                count: new.count,
                confidence: new.confidence,
                timestamp: new.timestamp,
                x: Some(new.x),
                y: Some(new.y),
            });
        }
        Ok(detections.len())
    }

    fn detections(&self) -> Result<Vec<Detection>, StoreError> {
        Ok(oldest_first(&self.tables.read().detections, |d| d.timestamp))
    }

    fn detection_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.read().detections.len() as u64)
    }

    fn insert_sensor_reading(&self, reading: &SensorReading) -> Result<i64, StoreError> {
        let mut tables = self.tables.write();
        let id = tables.allocate_id();
        tables.sensors.push(SensorReading { id, ..reading.clone() });
        Ok(id)
    }

    fn sensor_readings(&self) -> Result<Vec<SensorReading>, StoreError> {
        Ok(oldest_first(&self.tables.read().sensors, |s| s.timestamp))
    }

    fn latest_sensor_reading(&self) -> Result<Option<SensorReading>, StoreError> {
        Ok(self.sensor_readings()?.pop())
    }

    fn insert_device_health(&self, health: &DeviceHealth) -> Result<i64, StoreError> {
        let mut tables = self.tables.write();
        let id = tables.allocate_id();
        tables.health.push(DeviceHealth { id, ..health.clone() });
        Ok(id)
    }

    fn device_health(&self) -> Result<Vec<DeviceHealth>, StoreError> {
        Ok(oldest_first(&self.tables.read().health, |h| h.timestamp))
    }

    fn latest_device_health(&self) -> Result<Option<DeviceHealth>, StoreError> {
        Ok(self.device_health()?.pop())
    }

    fn insert_log(&self, entry: &LogEntry) -> Result<i64, StoreError> {
        let mut tables = self.tables.write();
        let id = tables.allocate_id();
        tables.logs.push(LogEntry { id, ..entry.clone() });
        Ok(id)
    }

    fn logs(&self) -> Result<Vec<LogEntry>, StoreError> {
        let mut logs = oldest_first(&self.tables.read().logs, |l| l.timestamp);
        logs.reverse();
        Ok(logs)
    }
}
