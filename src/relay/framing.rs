//! Multipart wire framing for MJPEG viewers
//!
//! Each frame becomes one part of a `multipart/x-mixed-replace` body:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n\r\n
//! <jpeg bytes>\r\n
//! ```
//!
//! No per-part `Content-Length` is written; the boundary delimits the part.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{FRAME_CONTENT_TYPE, MJPEG_BOUNDARY};
use crate::relay::frame::Frame;

/// Response content type announcing the boundary used by [`encode_part`]
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Length of everything [`encode_part`] adds around the payload
pub fn framing_overhead() -> usize {
    // "--" boundary CRLF "Content-Type: " type CRLF CRLF ... CRLF
    2 + MJPEG_BOUNDARY.len() + 2 + 14 + FRAME_CONTENT_TYPE.len() + 4 + 2
}

/// Wrap a frame in its multipart part
pub fn encode_part(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::with_capacity(frame.len() + framing_overhead());
    buf.put_slice(b"--");
    buf.put_slice(MJPEG_BOUNDARY.as_bytes());
    buf.put_slice(b"\r\nContent-Type: ");
    buf.put_slice(frame.content_type().as_bytes());
    buf.put_slice(b"\r\n\r\n");
    buf.put_slice(frame.data());
    buf.put_slice(b"\r\n");
    buf.freeze()
}
