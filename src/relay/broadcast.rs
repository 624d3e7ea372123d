//! Shared upstream feed for broadcast fan-out
//!
//! One relay loop fetches from the camera and publishes into a `broadcast`
//! channel; every viewer session reads from its own subscription through
//! [`FeedSource`]. The shared loop starts with the first subscriber and exits
//! once the last one leaves or the lifecycle is switched off.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::{RelayError, UpstreamError};
use crate::relay::frame::Frame;
use crate::relay::lifecycle::StreamLifecycle;
use crate::relay::pump::{FrameRelay, FrameSink, SessionEnd};
use crate::relay::session::RelayControl;
use crate::relay::upstream::FrameSource;

/// How often the shared loop checks whether anyone is still subscribed
const SUBSCRIBER_POLL: Duration = Duration::from_millis(100);

type FeedItem = Result<Frame, UpstreamError>;

/// Owner of the shared relay loop
pub struct BroadcastHub {
    tx: broadcast::Sender<FeedItem>,
    relay: Arc<FrameRelay>,
    lifecycle: StreamLifecycle,
    shutdown: CancellationToken,
    running: Arc<Mutex<bool>>,
}

impl BroadcastHub {
    pub fn new(
        source: Arc<dyn FrameSource>,
        backoff: Duration,
        capacity: usize,
        lifecycle: StreamLifecycle,
    ) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            relay: Arc::new(FrameRelay::new(source, backoff)),
            lifecycle,
            shutdown: CancellationToken::new(),
            running: Arc::new(Mutex::new(false)),
        }
    }

    /// Join the shared feed, starting the relay loop if it is idle
    pub fn subscribe(&self) -> FeedSource {
        let rx = self.tx.subscribe();
        self.ensure_running();
        FeedSource {
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    /// Stop the shared loop for good
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn ensure_running(&self) {
        let mut running = self.running.lock();
        if *running {
            return;
        }
        *running = true;

        let tx = self.tx.clone();
        let relay = self.relay.clone();
        let control = RelayControl::new(self.shutdown.child_token(), Some(self.lifecycle.clone()));
        let running_flag = self.running.clone();

        tracing::info!("Starting shared camera feed");
        tokio::spawn(async move {
            let mut sink = FeedSink { tx: tx.clone() };
            loop {
                let end = relay.run(&control, &mut sink).await;

                // Checked under the lock so a subscriber arriving now either
                // sees `running == true` and is served by this loop, or sees
                // `false` and starts a fresh one.
                let mut running = running_flag.lock();
                if keep_serving(end, tx.receiver_count(), &control) {
                    continue;
                }
                if end == SessionEnd::UpstreamFatal {
                    let _ = tx.send(Err(UpstreamError::FeedClosed));
                }
                *running = false;
                tracing::info!(?end, stats = ?relay.stats(), "Shared camera feed stopped");
                break;
            }
        });
    }
}

/// Whether the shared loop must go on after a relay run returned.
///
/// A viewer may have restarted the lifecycle and subscribed between the run
/// ending and this check, so the end reason alone does not decide it. Fatal
/// upstream errors always end the loop.
fn keep_serving(end: SessionEnd, subscribers: usize, control: &RelayControl) -> bool {
    end != SessionEnd::UpstreamFatal && subscribers > 0 && control.should_run()
}

/// Publishes into the broadcast channel while anyone is listening
struct FeedSink {
    tx: broadcast::Sender<FeedItem>,
}

#[async_trait]
impl FrameSink for FeedSink {
    async fn ready(&mut self) -> bool {
        self.tx.receiver_count() > 0
    }

    async fn publish(&mut self, frame: Frame) -> Result<(), RelayError> {
        self.tx
            .send(Ok(frame))
            .map(|_| ())
            .map_err(|_| RelayError::DownstreamDisconnected)
    }

    async fn closed(&self) {
        while self.tx.receiver_count() > 0 {
            tokio::time::sleep(SUBSCRIBER_POLL).await;
        }
    }
}

/// One viewer's view of the shared feed
pub struct FeedSource {
    rx: tokio::sync::Mutex<broadcast::Receiver<FeedItem>>,
}

#[async_trait]
impl FrameSource for FeedSource {
    async fn fetch(&self) -> Result<Frame, UpstreamError> {
        let mut rx = self.rx.lock().await;
        loop {
            match rx.recv().await {
                Ok(item) => return item,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Viewer lagged, skipped {} frames", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return Err(UpstreamError::FeedClosed),
            }
        }
    }
}
