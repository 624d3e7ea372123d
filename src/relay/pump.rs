//! Frame relay loop
//!
//! Moves frames from a [`FrameSource`] to a [`FrameSink`] until told to stop.
//! The sink is asked for room before every fetch, so the relay never runs
//! more than one frame ahead of the consumer and a closed consumer stops
//! upstream traffic straight away.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::relay::frame::Frame;
use crate::relay::session::RelayControl;
use crate::relay::upstream::FrameSource;

/// Why a relay loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The consumer went away
    Client,
    /// Stopped through the lifecycle or the session's own handle
    Control,
    /// The source reported an error that retrying cannot fix
    UpstreamFatal,
}

/// Destination of relayed frames
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Wait until the sink can take another frame. False once it is closed.
    async fn ready(&mut self) -> bool;

    /// Hand over one frame
    async fn publish(&mut self, frame: Frame) -> Result<(), RelayError>;

    /// Resolves once the sink can no longer accept frames
    async fn closed(&self);
}

/// Sending half of a single-slot handoff
pub struct SlotSink {
    tx: mpsc::Sender<Frame>,
    permit: Option<mpsc::OwnedPermit<Frame>>,
}

/// Create a single-slot handoff between a relay and one writer
pub fn slot() -> (SlotSink, mpsc::Receiver<Frame>) {
    let (tx, rx) = mpsc::channel(1);
    (SlotSink { tx, permit: None }, rx)
}

#[async_trait]
impl FrameSink for SlotSink {
    async fn ready(&mut self) -> bool {
        if self.permit.is_some() {
            return true;
        }
        match self.tx.clone().reserve_owned().await {
            Ok(permit) => {
                self.permit = Some(permit);
                true
            }
            Err(_) => false,
        }
    }

    async fn publish(&mut self, frame: Frame) -> Result<(), RelayError> {
        match self.permit.take() {
            Some(permit) => {
                if self.tx.is_closed() {
                    return Err(RelayError::DownstreamDisconnected);
                }
                permit.send(frame);
                Ok(())
            }
            None => self
                .tx
                .send(frame)
                .await
                .map_err(|_| RelayError::DownstreamDisconnected),
        }
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Relay counters
#[derive(Debug, Default)]
pub struct RelayStats {
    fetches: AtomicU64,
    failures: AtomicU64,
    frames: AtomicU64,
}

impl RelayStats {
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            fetches: self.fetches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    pub fetches: u64,
    pub failures: u64,
    pub frames: u64,
}

/// Fetch-and-publish loop with fixed-interval retry
pub struct FrameRelay {
    source: Arc<dyn FrameSource>,
    backoff: Duration,
    stats: RelayStats,
}

impl FrameRelay {
    pub fn new(source: Arc<dyn FrameSource>, backoff: Duration) -> Self {
        Self {
            source,
            backoff,
            stats: RelayStats::default(),
        }
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    /// Run until `control` stops, the sink closes, or the source fails fatally.
    ///
    /// Transient source errors never end the loop; they only delay the next
    /// attempt by the backoff interval. Frames reach the sink in fetch order.
    pub async fn run<S>(&self, control: &RelayControl, sink: &mut S) -> SessionEnd
    where
        S: FrameSink + ?Sized,
    {
        loop {
            if !control.should_run() {
                return SessionEnd::Control;
            }

            let ready = tokio::select! {
                biased;
                _ = control.stopped() => return SessionEnd::Control,
                ready = sink.ready() => ready,
            };
            if !ready {
                return SessionEnd::Client;
            }

            let fetched = tokio::select! {
                biased;
                _ = control.stopped() => return SessionEnd::Control,
                _ = sink.closed() => return SessionEnd::Client,
                fetched = self.source.fetch() => fetched,
            };
            self.stats.fetches.fetch_add(1, Ordering::Relaxed);

            match fetched {
                Ok(frame) => {
                    if sink.publish(frame).await.is_err() {
                        return SessionEnd::Client;
                    }
                    self.stats.frames.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) if !err.is_transient() => {
                    tracing::warn!("Upstream failed permanently: {}", err);
                    return SessionEnd::UpstreamFatal;
                }
                Err(err) => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Upstream unavailable ({}), retrying in {:?}", err, self.backoff);

                    tokio::select! {
                        biased;
                        _ = control.stopped() => return SessionEnd::Control,
                        _ = sink.closed() => return SessionEnd::Client,
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }
    }
}
