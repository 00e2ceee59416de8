//! Status subscription and the single-slot status cache
//!
//! The publisher side ([`StatusHub`]) fans each message out to every
//! subscriber's own bounded channel, keeping the newest messages when a
//! subscriber falls behind. The listener loop stores messages from
//! the home source in a [`StatusCache`]; everything else is ignored.

use crate::metrics::BridgeMetrics;
use crate::shutdown::ShutdownSignal;
use crossbeam_channel::{Receiver, RecvError, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

/// One status update as delivered by the publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage<S> {
    /// Set when the update comes from the primary ("home") source
    pub home: bool,
    pub status: S,
}

impl<S> StatusMessage<S> {
    pub fn home(status: S) -> Self {
        Self { home: true, status }
    }

    pub fn remote(status: S) -> Self {
        Self {
            home: false,
            status,
        }
    }
}

/// Fan-out publisher with per-subscriber channels.
///
/// Each subscriber's buffer holds the newest messages: publishing into a full
/// buffer evicts the oldest queued message rather than the incoming one.
///
/// # Example
///
/// ```
/// use lumen_bridge::{StatusHub, StatusMessage};
///
/// let hub = StatusHub::new(1);
/// let sub = hub.subscribe();
/// hub.publish(StatusMessage::home(1u32));
/// hub.publish(StatusMessage::home(2u32));
/// assert_eq!(sub.recv().unwrap().status, 2);
/// ```
pub struct StatusHub<S> {
    subscribers: Arc<Mutex<Vec<Subscriber<S>>>>,
    capacity: usize,
}

struct Subscriber<S> {
    tx: Sender<StatusMessage<S>>,
    // Hub-side receiving end, used only to evict a stale message
    evict: Receiver<StatusMessage<S>>,
    alive: Weak<()>,
}

/// Receiving end handed out by [`StatusHub::subscribe`].
///
/// Dropping it unsubscribes; the hub prunes the entry on the next publish.
pub struct StatusSubscription<S> {
    rx: Receiver<StatusMessage<S>>,
    _alive: Arc<()>,
}

impl<S> StatusSubscription<S> {
    pub fn receiver(&self) -> &Receiver<StatusMessage<S>> {
        &self.rx
    }

    /// Block until a message arrives or the hub closes.
    pub fn recv(&self) -> Result<StatusMessage<S>, RecvError> {
        self.rx.recv()
    }

    pub fn try_recv(&self) -> Result<StatusMessage<S>, TryRecvError> {
        self.rx.try_recv()
    }
}

impl<S> Clone for StatusHub<S> {
    fn clone(&self) -> Self {
        Self {
            subscribers: self.subscribers.clone(),
            capacity: self.capacity,
        }
    }
}

impl<S: Clone> StatusHub<S> {
    /// `capacity` is the per-subscriber buffer (at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> StatusSubscription<S> {
        let (tx, rx) = crossbeam_channel::bounded(self.capacity);
        let alive = Arc::new(());
        self.subscribers.lock().push(Subscriber {
            tx,
            evict: rx.clone(),
            alive: Arc::downgrade(&alive),
        });
        StatusSubscription { rx, _alive: alive }
    }

    /// Deliver `msg` to every subscriber without blocking.
    ///
    /// A full buffer drops its oldest message to make room. Subscribers that
    /// have gone away are removed. Returns the number of deliveries.
    pub fn publish(&self, msg: StatusMessage<S>) -> usize {
        let mut delivered = 0;
        self.subscribers.lock().retain(|sub| {
            if sub.alive.strong_count() == 0 {
                debug!("Status subscriber gone, removing");
                return false;
            }
            match sub.tx.try_send(msg.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                },
                Err(TrySendError::Full(msg)) => {
                    // The subscriber may have drained in between; either way there is room now
                    if sub.evict.try_recv().is_ok() {
                        trace!("Status subscriber behind, replacing queued message");
                    }
                    match sub.tx.try_send(msg) {
                        Ok(()) => delivered += 1,
                        Err(_) => trace!("Status subscriber busy, message skipped"),
                    }
                    true
                },
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Drop every subscriber channel; listeners see the publisher as closed.
    pub fn close(&self) {
        self.subscribers.lock().clear();
    }
}

/// Single-slot holder of the latest accepted status.
///
/// Readers only ever get a copy taken under the lock, so a read can never
/// observe a half-written snapshot.
#[derive(Debug, Default)]
pub struct StatusCache<S> {
    slot: Mutex<Option<S>>,
}

impl<S: Clone + Default> StatusCache<S> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Replace the held snapshot.
    pub fn update(&self, status: S) {
        *self.slot.lock() = Some(status);
    }

    /// Copy of the held snapshot, or `S::default()` before the first update.
    pub fn read(&self) -> S {
        self.slot.lock().clone().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

/// Cache-update loop.
///
/// Runs until shutdown is raised or the publisher closes the channel.
/// Dropping the subscription on exit unsubscribes from the hub.
pub fn status_listener<S: Clone + Default>(
    subscription: StatusSubscription<S>,
    cache: Arc<StatusCache<S>>,
    shutdown: ShutdownSignal,
    metrics: Arc<BridgeMetrics>,
) {
    debug!("Status listener started");

    loop {
        crossbeam_channel::select! {
            recv(subscription.receiver()) -> msg => match msg {
                Ok(msg) if msg.home => {
                    cache.update(msg.status);
                    metrics.status_accepted.fetch_add(1, Ordering::Relaxed);
                },
                Ok(_) => {
                    trace!("Ignoring status from non-home source");
                    metrics.status_ignored.fetch_add(1, Ordering::Relaxed);
                },
                Err(_) => {
                    debug!("Status publisher closed");
                    break;
                },
            },
            recv(shutdown.receiver()) -> _ => break,
        }
    }

    debug!("Status listener exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::Shutdown;
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Portal {
        level: u8,
        owner: String,
    }

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_cache_empty_reads_default() {
        let cache: StatusCache<Portal> = StatusCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.read(), Portal::default());
    }

    #[test]
    fn test_cache_latest_update_wins() {
        let cache = StatusCache::new();
        cache.update(Portal {
            level: 1,
            owner: "a".into(),
        });
        cache.update(Portal {
            level: 2,
            owner: "b".into(),
        });
        assert_eq!(cache.read().level, 2);
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_cache_read_is_a_copy() {
        let cache = StatusCache::new();
        cache.update(Portal {
            level: 3,
            owner: "x".into(),
        });
        let mut copy = cache.read();
        copy.level = 8;
        assert_eq!(cache.read().level, 3);
    }

    #[test]
    fn test_hub_prunes_dropped_subscribers() {
        let hub = StatusHub::new(1);
        let keep = hub.subscribe();
        let gone = hub.subscribe();
        drop(gone);

        assert_eq!(hub.publish(StatusMessage::home(1u8)), 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(keep.recv().unwrap().status, 1);
    }

    #[test]
    fn test_hub_full_buffer_keeps_newest() {
        let hub = StatusHub::new(1);
        let sub = hub.subscribe();

        assert_eq!(hub.publish(StatusMessage::home(1u8)), 1);
        assert_eq!(hub.publish(StatusMessage::home(2u8)), 1);
        assert_eq!(hub.publish(StatusMessage::home(3u8)), 1);
        assert_eq!(hub.subscriber_count(), 1);

        assert_eq!(sub.try_recv().unwrap().status, 3);
        assert!(sub.try_recv().is_err());
    }

    #[test]
    fn test_burst_before_listener_caches_latest() {
        let hub = StatusHub::new(1);
        let sub = hub.subscribe();
        let cache = Arc::new(StatusCache::new());
        let metrics = Arc::new(BridgeMetrics::new());
        let shutdown = Shutdown::new();

        // Both published before the listener has taken anything
        hub.publish(StatusMessage::home(Portal {
            level: 1,
            owner: "a".into(),
        }));
        hub.publish(StatusMessage::home(Portal {
            level: 2,
            owner: "b".into(),
        }));

        let handle = {
            let (cache, signal, metrics) = (cache.clone(), shutdown.signal(), metrics.clone());
            thread::spawn(move || status_listener(sub, cache, signal, metrics))
        };

        assert!(wait_for(|| metrics.snapshot().status_accepted >= 1));
        assert!(wait_for(|| cache.read().level == 2));
        assert_eq!(cache.read().owner, "b");

        shutdown.trigger();
        handle.join().unwrap();
    }

    #[test]
    fn test_listener_filters_non_home() {
        let hub = StatusHub::new(4);
        let cache = Arc::new(StatusCache::new());
        let metrics = Arc::new(BridgeMetrics::new());
        let shutdown = Shutdown::new();

        let handle = {
            let (rx, cache, signal, metrics) =
                (hub.subscribe(), cache.clone(), shutdown.signal(), metrics.clone());
            thread::spawn(move || status_listener(rx, cache, signal, metrics))
        };

        hub.publish(StatusMessage::home(Portal {
            level: 5,
            owner: "home".into(),
        }));
        assert!(wait_for(|| metrics.snapshot().status_accepted == 1));

        hub.publish(StatusMessage::remote(Portal {
            level: 1,
            owner: "elsewhere".into(),
        }));
        assert!(wait_for(|| metrics.snapshot().status_ignored == 1));

        assert_eq!(cache.read().owner, "home");

        shutdown.trigger();
        handle.join().unwrap();
    }

    #[test]
    fn test_listener_exits_when_publisher_closes() {
        let hub: StatusHub<Portal> = StatusHub::new(1);
        let rx = hub.subscribe();
        let shutdown = Shutdown::new();
        let signal = shutdown.signal();
        let handle = thread::spawn(move || {
            status_listener(
                rx,
                Arc::new(StatusCache::new()),
                signal,
                Arc::new(BridgeMetrics::new()),
            )
        });

        hub.close();
        assert!(wait_for(|| handle.is_finished()));
        handle.join().unwrap();
    }
}
