//! # Reefwatch
//!
//! Dashboard backend for a remote camera-equipped sensor node, with a live
//! MJPEG relay for the node's camera.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────┐
//! │       SENSOR NODE (Pi)       │
//! │  ┌────────────────────────┐  │         ┌──────────────────────────┐
//! │  │ GET /video_feed (JPEG) │◄─┼─────────┤ Ingestion client (YOLO)  │
//! │  └───────────▲────────────┘  │         └────────────┬─────────────┘
//! └──────────────┼───────────────┘                      │ POST /api/camera/frame
//!                │ HTTP, one frame per fetch            ▼
//! ┌──────────────┼──────────────────────────────────────────────────────────┐
//! │              │               DASHBOARD SERVER                            │
//! │  ┌───────────┴──────────┐   ┌────────────────────────────────────────┐  │
//! │  │ UpstreamFrameSource  │   │ TelemetryStore (SQLite)                │  │
//! │  │ (relay::upstream)    │   │ detections / sensors / health / logs   │  │
//! │  └───────────▲──────────┘   └───────────────────▲────────────────────┘  │
//! │              │ fetch()                          │                       │
//! │  ┌───────────┴──────────┐   ┌───────────────────┴────────────────────┐  │
//! │  │ FrameRelay task      │   │ JSON handlers (ui::handlers)           │  │
//! │  │ (relay::pump)        │◄──┤ StreamLifecycle / SessionRegistry      │  │
//! │  └───────────┬──────────┘   └────────────────────────────────────────┘  │
//! │              │ single-slot handoff                                      │
//! │  ┌───────────▼──────────┐                                               │
//! │  │ StreamEndpoint       │  --frame\r\nContent-Type: image/jpeg\r\n\r\n  │
//! │  │ (ui::stream)         │  <jpeg>\r\n                                   │
//! │  └───────────┬──────────┘                                               │
//! └──────────────┼──────────────────────────────────────────────────────────┘
//!                ▼ multipart/x-mixed-replace; boundary=frame
//!          Browser viewers
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod store;
pub mod ui;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default upstream camera endpoint
    pub const DEFAULT_UPSTREAM_URL: &str = "http://172.16.96.90:8000/video_feed";

    /// Environment variable overriding the upstream camera endpoint
    pub const UPSTREAM_URL_ENV: &str = "PI_STREAM_URL";

    /// Default per-fetch upstream timeout in milliseconds
    pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 2000;

    /// Default delay before retrying a failed fetch, in milliseconds
    pub const DEFAULT_BACKOFF_MS: u64 = 200;

    /// Multipart boundary token (without the leading dashes)
    pub const MJPEG_BOUNDARY: &str = "frame";

    /// Content type of every relayed frame
    pub const FRAME_CONTENT_TYPE: &str = "image/jpeg";

    /// Default broadcast channel capacity (in frames) for shared fan-out
    pub const DEFAULT_BROADCAST_CAPACITY: usize = 4;

    /// Default HTTP port for the dashboard
    pub const DEFAULT_HTTP_PORT: u16 = 5000;

    /// Default SQLite database file name
    pub const DEFAULT_DATABASE_FILE: &str = "dashboard.db";
}
