//! Telemetry rows as stored and served

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};

/// A species sighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: i64,
    pub species: String,
    pub count: i64,
    #[serde(serialize_with = "confidence_2dp")]
    pub confidence: Option<f64>,
    pub timestamp: NaiveDateTime,
    /// Heatmap coordinates
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// A detection about to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewDetection {
    pub species: String,
    pub count: i64,
    pub confidence: Option<f64>,
    pub timestamp: NaiveDateTime,
    pub x: f64,
    pub y: f64,
}

/// Environmental reading from the node's sensors
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default)]
    pub id: i64,
    /// Water temperature
    pub temperature: Option<f64>,
    /// Internal humidity
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub depth: Option<f64>,
    /// Water clarity
    pub turbidity: Option<f64>,
    pub lux: Option<f64>,
    pub ph: Option<f64>,
    pub salinity: Option<f64>,
    pub timestamp: NaiveDateTime,
}

/// Node hardware and inference health
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceHealth {
    #[serde(default)]
    pub id: i64,
    pub cpu_temp: Option<f64>,
    pub gpu_temp: Option<f64>,
    pub battery_level: Option<f64>,
    pub fan_status: Option<String>,
    /// Percentage
    pub storage_used: Option<f64>,
    pub connectivity: Option<String>,
    pub yolo_fps: Option<f64>,
    pub model_name: Option<String>,
    pub cpu_usage: Option<f64>,
    pub gpu_usage: Option<f64>,
    pub ram_usage: Option<f64>,
    pub timestamp: NaiveDateTime,
}

/// Event log line
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub id: i64,
    /// detection, sensor, alert, ...
    pub event_type: String,
    pub message: Option<String>,
    /// info, warning, error
    pub severity: Option<String>,
    pub timestamp: NaiveDateTime,
}

/// Confidence is reported rounded to two decimals, and as 0 when unknown
fn confidence_2dp<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(c) if *c != 0.0 => serializer.serialize_f64((c * 100.0).round() / 100.0),
        _ => serializer.serialize_f64(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_micro_opt(9, 26, 53, 589_000)
            .unwrap()
    }

    #[test]
    fn test_detection_json() {
        let detection = Detection {
            id: 1,
            species: "Clownfish".to_string(),
            count: 1,
            confidence: Some(0.87654),
            timestamp: ts(),
            x: Some(0.25),
            y: Some(0.75),
        };

        let json = serde_json::to_value(&detection).unwrap();
        assert_eq!(json["confidence"], 0.88);
        assert_eq!(json["timestamp"], "2025-03-14T09:26:53.589");
        assert_eq!(json["species"], "Clownfish");
        assert_eq!(json["x"], 0.25);
    }

    #[test]
    fn test_missing_confidence_serializes_as_zero() {
        let detection = Detection {
            id: 2,
            species: "Unknown".to_string(),
            count: 1,
            confidence: None,
            timestamp: ts(),
            x: None,
            y: None,
        };

        let json = serde_json::to_value(&detection).unwrap();
        assert_eq!(json["confidence"], 0.0);
        assert!(json["x"].is_null());
    }
}
