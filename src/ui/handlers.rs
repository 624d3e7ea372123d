//! HTTP API handlers

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::config::LifecycleScope;
use crate::error::StoreError;
use crate::protocol::{
    CameraLocation, FrameAck, FrameReport, Stats, StatusMessage, StopParams, StreamStatus,
};
use crate::store::{Detection, DeviceHealth, LogEntry, NewDetection, SensorReading, TelemetryStore};
use crate::ui::server::AppState;

/// Error reply: status code plus `{status: "error", message}`
pub type ApiError = (StatusCode, Json<StatusMessage>);

type ApiResult<T> = Result<Json<T>, ApiError>;

fn store_failure(err: StoreError) -> ApiError {
    tracing::error!("Telemetry store error: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(StatusMessage::error(err.to_string())),
    )
}

/// Run a store call off the async runtime
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&dyn TelemetryStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| StoreError::TaskFailed(e.to_string()))
        .and_then(|result| result)
        .map_err(store_failure)
}

/// Stop the camera stream
///
/// With `?session=<id>` in session scope only that viewer is stopped;
/// otherwise the stream is switched off for everyone.
pub async fn stop_camera(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StopParams>,
) -> ApiResult<StatusMessage> {
    if let (LifecycleScope::Session, Some(id)) = (state.sessions.scope(), params.session) {
        state.sessions.stop(id).map_err(|e| {
            (StatusCode::NOT_FOUND, Json(StatusMessage::error(e.to_string())))
        })?;
        tracing::info!(session = %id, "Camera stopped for one viewer");
        return Ok(Json(StatusMessage::success("Session stopped")));
    }

    state.lifecycle.stop();
    let stopped = state.sessions.stop_all();
    tracing::info!("Camera stopped ({} viewers)", stopped);
    Ok(Json(StatusMessage::success("Camera stopped")))
}

/// Relay state and live sessions
pub async fn camera_status(State(state): State<Arc<AppState>>) -> Json<StreamStatus> {
    Json(StreamStatus {
        active: state.lifecycle.is_active(),
        lifecycle_scope: state.config.relay.lifecycle_scope,
        fanout: state.config.relay.fanout,
        sessions: state.sessions.snapshot(),
    })
}

pub async fn camera_location(State(state): State<Arc<AppState>>) -> Json<CameraLocation> {
    Json(state.config.camera.clone())
}

/// Record the detections of one analysed frame
///
/// Any failure, including an unreadable body, is answered with a 500
/// `{status: "error", message}`.
pub async fn capture_frame(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FrameReport>, JsonRejection>,
) -> ApiResult<FrameAck> {
    let Json(report) = payload.map_err(|rejection| {
        let message = rejection.body_text();
        tracing::warn!("Rejected frame report: {}", message);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusMessage::error(message)),
        )
    })?;

    let timestamp = Utc::now().naive_utc();
    let batch: Vec<NewDetection> = report
        .detections
        .iter()
        .map(|d| NewDetection {
            species: d.species.clone(),
            count: 1,
            confidence: d.confidence,
            timestamp,
            x: d.x,
            y: d.y,
        })
        .collect();

    let written = with_store(&state, move |store| store.insert_detections(&batch)).await?;
    tracing::debug!(
        frame = %report.frame_number,
        "Recorded {} detections",
        written
    );

    Ok(Json(FrameAck::new(report.frame_number, written)))
}

/// All detections, oldest first
pub async fn get_detections(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Detection>> {
    with_store(&state, |store| store.detections()).await.map(Json)
}

pub async fn get_sensors(State(state): State<Arc<AppState>>) -> ApiResult<Vec<SensorReading>> {
    with_store(&state, |store| store.sensor_readings()).await.map(Json)
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> ApiResult<Vec<DeviceHealth>> {
    with_store(&state, |store| store.device_health()).await.map(Json)
}

/// Event log, newest first
pub async fn get_logs(State(state): State<Arc<AppState>>) -> ApiResult<Vec<LogEntry>> {
    with_store(&state, |store| store.logs()).await.map(Json)
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Stats> {
    with_store(&state, |store| {
        Ok(Stats {
            total_detections: store.detection_count()?,
            latest_sensor: store.latest_sensor_reading()?,
            latest_health: store.latest_device_health()?,
        })
    })
    .await
    .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::UpstreamError;
    use crate::relay::{Frame, FrameSource};
    use crate::store::MemoryStore;
    use crate::ui::server::router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct NoCamera;

    #[async_trait]
    impl FrameSource for NoCamera {
        async fn fetch(&self) -> Result<Frame, UpstreamError> {
            Err(UpstreamError::Connect("no camera in tests".into()))
        }
    }

    struct FailingStore;

    impl TelemetryStore for FailingStore {
        fn insert_detections(&self, _: &[NewDetection]) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }
        fn detections(&self) -> Result<Vec<Detection>, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }
        fn detection_count(&self) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }
        fn insert_sensor_reading(&self, _: &SensorReading) -> Result<i64, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }
        fn sensor_readings(&self) -> Result<Vec<SensorReading>, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }
        fn latest_sensor_reading(&self) -> Result<Option<SensorReading>, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }
        fn insert_device_health(&self, _: &DeviceHealth) -> Result<i64, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }
        fn device_health(&self) -> Result<Vec<DeviceHealth>, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }
        fn latest_device_health(&self) -> Result<Option<DeviceHealth>, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }
        fn insert_log(&self, _: &LogEntry) -> Result<i64, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }
        fn logs(&self) -> Result<Vec<LogEntry>, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }
    }

    fn app_with(config: AppConfig, store: Arc<dyn TelemetryStore>) -> (axum::Router, Arc<AppState>) {
        let state = Arc::new(AppState::with_source(config, store, Arc::new(NoCamera)));
        (router(state.clone()), state)
    }

    async fn call(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_capture_frame_records_detections() {
        let store = Arc::new(MemoryStore::new());
        let (app, _) = app_with(AppConfig::default(), store.clone());

        let (status, body) = call(
            &app,
            post_json(
                "/api/camera/frame",
                json!({
                    "frame_number": 42,
                    "detections": [
                        {"species": "Clownfish", "confidence": 0.91, "x": 0.2, "y": 0.4},
                        {"confidence": 0.5}
                    ]
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Frame 42 captured with 2 detections");
        assert_eq!(body["frame_number"], 42);
        assert_eq!(body["detections_count"], 2);

        let rows = store.detections().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].species, "Clownfish");
        assert_eq!(rows[0].count, 1);
        assert_eq!(rows[1].species, "Unknown");
        assert_eq!(rows[1].x, Some(0.0));
    }

    #[tokio::test]
    async fn test_capture_frame_defaults() {
        let store = Arc::new(MemoryStore::new());
        let (app, _) = app_with(AppConfig::default(), store.clone());

        let (status, body) = call(&app, post_json("/api/camera/frame", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Frame 0 captured with 0 detections");
        assert_eq!(store.detection_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_500() {
        let (app, _) = app_with(AppConfig::default(), Arc::new(FailingStore));

        let (status, body) = call(
            &app,
            post_json("/api/camera/frame", json!({"detections": [{"species": "Grouper"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("disk full"));

        let (status, _) = call(&app, get("/api/stats")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unreadable_frame_report_is_500() {
        let store = Arc::new(MemoryStore::new());
        let (app, _) = app_with(AppConfig::default(), store.clone());

        let requests = vec![
            Request::post("/api/camera/frame")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
            Request::post("/api/camera/frame")
                .body(Body::from(r#"{"frame_number": 1}"#))
                .unwrap(),
            post_json("/api/camera/frame", json!({"detections": 5})),
            post_json("/api/camera/frame", json!([1, 2, 3])),
        ];

        for request in requests {
            let (status, body) = call(&app, request).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["status"], "error");
            assert!(!body["message"].as_str().unwrap().is_empty());
        }
        assert_eq!(store.detection_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_null_confidence_is_stored_as_unknown() {
        let store = Arc::new(MemoryStore::new());
        let (app, _) = app_with(AppConfig::default(), store.clone());

        let (status, _) = call(
            &app,
            post_json(
                "/api/camera/frame",
                json!({"detections": [{"species": "Barracuda", "confidence": null}, {"species": "Wrasse"}]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let rows = store.detections().unwrap();
        assert_eq!(rows[0].confidence, None);
        assert_eq!(rows[1].confidence, Some(0.0));

        let (_, detections) = call(&app, get("/api/detections")).await;
        assert_eq!(detections[0]["confidence"], 0.0);
    }

    #[tokio::test]
    async fn test_frame_number_is_echoed_as_sent() {
        let (app, _) = app_with(AppConfig::default(), Arc::new(MemoryStore::new()));

        let (status, body) = call(&app, post_json("/api/camera/frame", json!({"frame_number": 1.5}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Frame 1.5 captured with 0 detections");
        assert_eq!(body["frame_number"], 1.5);

        let (status, body) = call(&app, post_json("/api/camera/frame", json!({"frame_number": "A7"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Frame A7 captured with 0 detections");
        assert_eq!(body["frame_number"], "A7");
    }

    #[tokio::test]
    async fn test_telemetry_queries() {
        let store = Arc::new(MemoryStore::new());
        let ts = |h| {
            NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        store
            .insert_sensor_reading(&SensorReading {
                temperature: Some(24.5),
                timestamp: ts(8),
                ..Default::default()
            })
            .unwrap();
        store
            .insert_sensor_reading(&SensorReading {
                temperature: Some(25.1),
                timestamp: ts(9),
                ..Default::default()
            })
            .unwrap();
        store
            .insert_log(&LogEntry {
                event_type: "alert".into(),
                message: Some("first".into()),
                timestamp: ts(8),
                ..Default::default()
            })
            .unwrap();
        store
            .insert_log(&LogEntry {
                event_type: "alert".into(),
                message: Some("second".into()),
                timestamp: ts(9),
                ..Default::default()
            })
            .unwrap();

        let (app, _) = app_with(AppConfig::default(), store);

        let (_, sensors) = call(&app, get("/api/sensors")).await;
        assert_eq!(sensors[0]["temperature"], 24.5);

        let (_, logs) = call(&app, get("/api/logs")).await;
        assert_eq!(logs[0]["message"], "second");

        let (status, stats) = call(&app, get("/api/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total_detections"], 0);
        assert_eq!(stats["latest_sensor"]["temperature"], 25.1);
        assert!(stats["latest_health"].is_null());
    }

    #[tokio::test]
    async fn test_camera_location_default() {
        let (app, _) = app_with(AppConfig::default(), Arc::new(MemoryStore::new()));
        let (status, body) = call(&app, get("/api/camera/location")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Great Barrier Reef");
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (app, state) = app_with(AppConfig::default(), Arc::new(MemoryStore::new()));
        state.lifecycle.start();

        for _ in 0..2 {
            let (status, body) = call(&app, Request::post("/api/camera/stop").body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "success");
            assert_eq!(body["message"], "Camera stopped");
            assert!(!state.lifecycle.is_active());
        }
    }

    #[tokio::test]
    async fn test_stop_single_session() {
        let mut config = AppConfig::default();
        config.relay.lifecycle_scope = LifecycleScope::Session;
        let (app, state) = app_with(config, Arc::new(MemoryStore::new()));
        state.lifecycle.start();

        let a = state.sessions.open();
        let b = state.sessions.open();

        let uri = format!("/api/camera/stop?session={}", a.id());
        let (status, body) = call(&app, Request::post(uri.as_str()).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Session stopped");
        assert!(!a.control().should_run());
        assert!(b.control().should_run());
        assert!(state.lifecycle.is_active());

        let uri = format!("/api/camera/stop?session={}", uuid::Uuid::new_v4());
        let (status, body) = call(&app, Request::post(uri.as_str()).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_camera_status() {
        let (app, state) = app_with(AppConfig::default(), Arc::new(MemoryStore::new()));
        let _session = state.sessions.open();

        let (_, body) = call(&app, get("/api/camera/status")).await;
        assert_eq!(body["active"], false);
        assert_eq!(body["lifecycle_scope"], "shared");
        assert_eq!(body["fanout"], "per_viewer");
        assert_eq!(body["sessions"][0]["state"], "idle");
    }
}
