//! HTTP surface: dashboard API and the MJPEG stream endpoint

pub mod handlers;
pub mod server;
pub mod stream;

pub use server::{router, AppState, WebServer};
