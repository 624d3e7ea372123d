//! Relayed frame payload

use bytes::Bytes;

use crate::constants::FRAME_CONTENT_TYPE;

/// One JPEG image as received from upstream.
///
/// The payload is never parsed or validated; it is passed through as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn content_type(&self) -> &'static str {
        FRAME_CONTENT_TYPE
    }
}
