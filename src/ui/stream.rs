//! MJPEG stream endpoint
//!
//! Each request opens a relay session, spawns its relay loop and streams the
//! frames it hands over as `multipart/x-mixed-replace` parts. The response
//! ends when the session stops; dropping the response stops the session.

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA},
        HeaderName, HeaderValue,
    },
    response::Response,
};
use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::relay::framing::{self, MULTIPART_CONTENT_TYPE};
use crate::relay::{slot, FrameRelay, FrameSource};
use crate::ui::server::AppState;

/// Response header carrying the session id, for `/api/camera/stop?session=`
pub const SESSION_HEADER: HeaderName = HeaderName::from_static("x-relay-session");

/// Stream the camera to one viewer
pub async fn stream_camera(State(state): State<Arc<AppState>>) -> Response {
    state.lifecycle.start();

    let session = state.sessions.open();
    let session_id = session.id();
    let frames_sent = session.frame_counter();

    let source: Arc<dyn FrameSource> = match &state.hub {
        Some(hub) => Arc::new(hub.subscribe()),
        None => state.upstream.clone(),
    };
    let relay = FrameRelay::new(source, state.config.relay.backoff());
    let (mut sink, rx) = slot();

    tokio::spawn(async move {
        session.begin();
        let control = session.control();
        let end = relay.run(&control, &mut sink).await;
        session.finish(end);
        tracing::debug!(session = %session.id(), stats = ?relay.stats(), "Relay finished");
    });

    let parts = ReceiverStream::new(rx).map(move |frame| {
        frames_sent.fetch_add(1, Ordering::Relaxed);
        Ok::<_, Infallible>(framing::encode_part(&frame))
    });

    mjpeg_response(Body::from_stream(parts), session_id)
}

fn mjpeg_response(body: Body, session: Uuid) -> Response {
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(MULTIPART_CONTENT_TYPE));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    if let Ok(value) = HeaderValue::from_str(&session.to_string()) {
        headers.insert(SESSION_HEADER, value);
    }
    response
}
