//! Process-wide stream on/off switch
//!
//! Backed by a `watch` channel so every read observes the latest committed
//! value and relays parked in a fetch or backoff wait are woken the moment
//! the stream is switched off.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared lifecycle flag. Clones refer to the same switch.
#[derive(Clone, Debug)]
pub struct StreamLifecycle {
    active: Arc<watch::Sender<bool>>,
}

impl StreamLifecycle {
    /// Create an inactive lifecycle
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Switch streaming on. Returns true if this call changed the state.
    pub fn start(&self) -> bool {
        let changed = self.active.send_if_modified(|active| {
            if *active {
                false
            } else {
                *active = true;
                true
            }
        });
        if changed {
            tracing::info!("Camera stream activated");
        }
        changed
    }

    /// Switch streaming off. Returns true if this call changed the state.
    pub fn stop(&self) -> bool {
        let changed = self.active.send_if_modified(|active| {
            if *active {
                *active = false;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!("Camera stream deactivated");
        }
        changed
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Resolves once the lifecycle is inactive (immediately if it already is)
    pub async fn stopped(&self) {
        let mut rx = self.active.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|active| !*active).await;
    }
}

impl Default for StreamLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_starts_inactive() {
        let lifecycle = StreamLifecycle::new();
        assert!(!lifecycle.is_active());

        assert!(lifecycle.start());
        assert!(lifecycle.is_active());
    }

    #[test]
    fn test_idempotent_transitions() {
        let lifecycle = StreamLifecycle::new();

        for n in 0..5 {
            let changed = lifecycle.start();
            assert_eq!(changed, n == 0);
            assert!(lifecycle.is_active());
        }

        for n in 0..5 {
            let changed = lifecycle.stop();
            assert_eq!(changed, n == 0);
            assert!(!lifecycle.is_active());
        }
    }

    #[test]
    fn test_clones_share_state() {
        let lifecycle = StreamLifecycle::new();
        let other = lifecycle.clone();

        other.start();
        assert!(lifecycle.is_active());
        lifecycle.stop();
        assert!(!other.is_active());
    }

    #[tokio::test]
    async fn test_concurrent_start_activates_once() {
        let lifecycle = StreamLifecycle::new();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let lifecycle = lifecycle.clone();
                tokio::spawn(async move { lifecycle.start() })
            })
            .collect();

        let mut transitions = 0;
        for handle in handles {
            if handle.await.unwrap() {
                transitions += 1;
            }
        }

        assert_eq!(transitions, 1);
        assert!(lifecycle.is_active());
    }

    #[tokio::test]
    async fn test_stopped_resolves_immediately_when_inactive() {
        let lifecycle = StreamLifecycle::new();
        tokio::time::timeout(Duration::from_millis(100), lifecycle.stopped())
            .await
            .expect("inactive lifecycle should resolve at once");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_wakes_on_stop() {
        let lifecycle = StreamLifecycle::new();
        lifecycle.start();

        let waiter = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.stopped().await })
        };

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!waiter.is_finished());

        lifecycle.stop();
        tokio::time::timeout(Duration::from_millis(10), waiter)
            .await
            .expect("waiter should wake on stop")
            .unwrap();
    }
}
