//! HTTP server and shared application state

use axum::{
    routing::{get, post},
    Router,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::{AppConfig, Fanout, UiConfig};
use crate::error::{Error, Result};
use crate::relay::{BroadcastHub, FrameSource, HttpFrameSource, SessionRegistry, StreamLifecycle};
use crate::store::TelemetryStore;
use crate::ui::{handlers, stream};

/// State shared by every handler
pub struct AppState {
    pub config: AppConfig,
    pub lifecycle: StreamLifecycle,
    pub sessions: SessionRegistry,
    pub upstream: Arc<dyn FrameSource>,
    /// Present only in broadcast fan-out
    pub hub: Option<BroadcastHub>,
    pub store: Arc<dyn TelemetryStore>,
}

impl AppState {
    /// Build state that fetches from the configured camera over HTTP
    pub fn new(config: AppConfig, store: Arc<dyn TelemetryStore>) -> Result<Self> {
        let source = HttpFrameSource::new(&config.upstream)?;
        tracing::info!(
            "Camera upstream: {} (fetch timeout {:?})",
            source.url(),
            source.timeout()
        );
        let upstream: Arc<dyn FrameSource> = Arc::new(source);
        Ok(Self::with_source(config, store, upstream))
    }

    /// Build state around an arbitrary frame source
    pub fn with_source(
        config: AppConfig,
        store: Arc<dyn TelemetryStore>,
        upstream: Arc<dyn FrameSource>,
    ) -> Self {
        let lifecycle = StreamLifecycle::new();
        let sessions = SessionRegistry::new(lifecycle.clone(), config.relay.lifecycle_scope);

        let hub = match config.relay.fanout {
            Fanout::Broadcast => Some(BroadcastHub::new(
                upstream.clone(),
                config.relay.backoff(),
                config.relay.broadcast_capacity,
                lifecycle.clone(),
            )),
            Fanout::PerViewer => None,
        };

        Self {
            config,
            lifecycle,
            sessions,
            upstream,
            hub,
            store,
        }
    }

    /// Switch the stream off and end every session
    pub fn shutdown(&self) {
        self.lifecycle.stop();
        let stopped = self.sessions.stop_all();
        if let Some(hub) = &self.hub {
            hub.shutdown();
        }
        tracing::info!("Stopped {} viewer sessions", stopped);
    }
}

/// Build the dashboard router
pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.ui.static_dir.clone();

    let app = Router::new()
        // Camera relay
        .route("/api/camera/stream", get(stream::stream_camera))
        .route("/video_feed", get(stream::stream_camera))
        .route("/api/camera/stop", post(handlers::stop_camera))
        .route("/api/camera/status", get(handlers::camera_status))
        .route("/api/camera/location", get(handlers::camera_location))
        .route("/api/camera/frame", post(handlers::capture_frame))
        // Telemetry
        .route("/api/detections", get(handlers::get_detections))
        .route("/api/sensors", get(handlers::get_sensors))
        .route("/api/health", get(handlers::get_health))
        .route("/api/logs", get(handlers::get_logs))
        .route("/api/stats", get(handlers::get_stats))
        .with_state(state);

    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app,
    };

    app.layer(CorsLayer::permissive())
}

/// Dashboard HTTP server
pub struct WebServer {
    config: UiConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: UiConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Bind the listening socket with TCP_NODELAY and SO_REUSEADDR
    pub fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.http_port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address: {}", e)))?;

        let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nodelay(true)?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(1024)?;

        let std_listener: std::net::TcpListener = socket.into();
        Ok(TcpListener::from_std(std_listener)?)
    }

    /// Serve until `shutdown` resolves, then end all streams and drain
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind()?;
        tracing::info!("Dashboard listening on http://{}", listener.local_addr()?);

        let state = self.state.clone();
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                shutdown.await;
                // Long-lived MJPEG responses only finish once their relays stop
                state.shutdown();
            })
            .await?;

        Ok(())
    }
}
