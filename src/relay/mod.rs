//! Live camera relay
//!
//! Pulls still JPEG frames from the sensor node and hands them, in fetch
//! order, to whoever is serving a viewer. Upstream outages are absorbed with
//! a fixed backoff; a session ends only on a control stop, a closed viewer,
//! or a fatal upstream error.

pub mod broadcast;
pub mod frame;
pub mod framing;
pub mod lifecycle;
pub mod pump;
pub mod session;
pub mod upstream;

pub use broadcast::BroadcastHub;
pub use frame::Frame;
pub use lifecycle::StreamLifecycle;
pub use pump::{slot, FrameRelay, FrameSink, SessionEnd, SlotSink};
pub use session::{RelayControl, RelaySession, SessionRegistry, SessionState};
pub use upstream::{FrameSource, HttpFrameSource};
