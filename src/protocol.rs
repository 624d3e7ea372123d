//! JSON payloads exchanged over the HTTP API

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{Fanout, LifecycleScope};
use crate::relay::session::SessionState;
use crate::store::records::{DeviceHealth, SensorReading};

/// Generic `{status, message}` reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

impl StatusMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// Geographic placement of the camera node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    /// Metres below the surface
    pub depth: f64,
    pub region: String,
}

impl Default for CameraLocation {
    fn default() -> Self {
        Self {
            latitude: -18.2871,
            longitude: 147.6992,
            name: "Great Barrier Reef".to_string(),
            depth: 12.5,
            region: "Coral Sea, Australia".to_string(),
        }
    }
}

/// Detections reported for one analysed frame
#[derive(Debug, Clone, Deserialize)]
pub struct FrameReport {
    /// Echoed back as sent; any JSON value is accepted
    #[serde(default = "first_frame")]
    pub frame_number: Value,
    #[serde(default)]
    pub detections: Vec<DetectionInput>,
}

/// A single detection inside a [`FrameReport`]
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionInput {
    #[serde(default = "unknown_species")]
    pub species: String,
    /// Missing means 0.0; an explicit `null` is stored as unknown
    #[serde(default = "zero_confidence")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

fn unknown_species() -> String {
    "Unknown".to_string()
}

fn zero_confidence() -> Option<f64> {
    Some(0.0)
}

fn first_frame() -> Value {
    Value::from(0)
}

/// Reply to a successful [`FrameReport`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameAck {
    pub status: String,
    pub message: String,
    pub frame_number: Value,
    pub detections_count: usize,
}

impl FrameAck {
    pub fn new(frame_number: Value, detections_count: usize) -> Self {
        // Strings are shown bare, everything else as JSON
        let shown = match &frame_number {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            status: "success".to_string(),
            message: format!("Frame {} captured with {} detections", shown, detections_count),
            frame_number,
            detections_count,
        }
    }
}

/// Query string of the stop endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopParams {
    /// Stop only this session (session scope)
    pub session: Option<Uuid>,
}

/// Relay state reported by `/api/camera/status`
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    pub active: bool,
    pub lifecycle_scope: LifecycleScope,
    pub fanout: Fanout,
    pub sessions: Vec<SessionInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub state: SessionState,
    pub frames_sent: u64,
}

/// Summary returned by `/api/stats`
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_detections: u64,
    pub latest_sensor: Option<SensorReading>,
    pub latest_health: Option<DeviceHealth>,
}
