//! Listener registry and asynchronous event delivery

use super::pool::WorkerPool;
use super::{AnalogKeyboardListener, KeyboardEvent};
use crate::device::KeyboardSession;
use crate::keyboard::KeyStates;
use parking_lot::RwLock;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const WORKER_THREAD_NAME: &str = "analog keyboard event thread";

/// Token identifying a subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Subscribers = Vec<(ListenerId, Arc<dyn AnalogKeyboardListener>)>;

/// Delivers keyboard events to subscribed listeners.
///
/// Publishing never blocks: each listener receives the event as a separate
/// job on a fixed pool of worker threads. Deliveries to different listeners
/// are unordered, and a listener that panics is logged and skipped without
/// affecting the others.
pub struct EventBus {
    listeners: RwLock<Subscribers>,
    next_id: AtomicU64,
    pool: WorkerPool,
}

impl EventBus {
    pub fn new(worker_threads: usize) -> io::Result<Self> {
        Ok(Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            pool: WorkerPool::new(worker_threads, WORKER_THREAD_NAME)?,
        })
    }

    /// Subscribe `listener` to all future events
    pub fn add_listener(&self, listener: Arc<dyn AnalogKeyboardListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        log::debug!("listener {:?} added", id);
        id
    }

    /// Unsubscribe a listener. Events already queued for it may still be
    /// delivered. Returns `false` if the id was not subscribed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        if removed {
            log::debug!("listener {:?} removed", id);
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.size()
    }

    /// Queue `event` for every currently subscribed listener
    pub fn publish(&self, event: KeyboardEvent) {
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        if listeners.is_empty() {
            return;
        }

        let event = Arc::new(event);
        for listener in listeners {
            let event = Arc::clone(&event);
            self.pool.execute(move || deliver(&event, listener.as_ref()));
        }
    }

    pub fn fire_key_pressed(&self, keyboard: &Arc<KeyboardSession>, states: KeyStates) {
        self.publish(KeyboardEvent::KeyPressed {
            keyboard: Arc::clone(keyboard),
            states,
        });
    }

    pub fn fire_added(&self, keyboard: &Arc<KeyboardSession>) {
        self.publish(KeyboardEvent::Added(Arc::clone(keyboard)));
    }

    pub fn fire_removed(&self, keyboard: &Arc<KeyboardSession>) {
        self.publish(KeyboardEvent::Removed(Arc::clone(keyboard)));
    }

    pub fn fire_opened(&self, keyboard: &Arc<KeyboardSession>) {
        self.publish(KeyboardEvent::Opened(Arc::clone(keyboard)));
    }

    pub fn fire_closed(&self, keyboard: &Arc<KeyboardSession>) {
        self.publish(KeyboardEvent::Closed(Arc::clone(keyboard)));
    }

    pub fn fire_error(&self, keyboard: &Arc<KeyboardSession>, message: impl Into<String>) {
        self.publish(KeyboardEvent::Error {
            keyboard: Arc::clone(keyboard),
            message: message.into(),
        });
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("worker_threads", &self.worker_threads())
            .finish()
    }
}

fn deliver(event: &KeyboardEvent, listener: &dyn AnalogKeyboardListener) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| event.dispatch(listener)));
    if result.is_err() {
        log::error!(
            "listener panicked while handling {} for {}",
            event.kind(),
            event.keyboard().name()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{KeyboardSession, MemoryHandle, SessionOptions};
    use crate::device::{DeviceIdentity, KeyboardFamily};
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct Recorder {
        tx: Sender<&'static str>,
    }

    impl AnalogKeyboardListener for Recorder {
        fn keyboard_added(&self, _keyboard: &Arc<KeyboardSession>) {
            let _ = self.tx.send("added");
        }

        fn keyboard_error(&self, _keyboard: &Arc<KeyboardSession>, message: &str) {
            let _ = self.tx.send(if message == "boom" { "error" } else { "other" });
        }
    }

    struct Panicker;

    impl AnalogKeyboardListener for Panicker {
        fn keyboard_added(&self, _keyboard: &Arc<KeyboardSession>) {
            panic!("listener failure");
        }
    }

    fn recorder() -> (Arc<Recorder>, Receiver<&'static str>) {
        let (tx, rx) = unbounded();
        (Arc::new(Recorder { tx }), rx)
    }

    fn session(bus: &Arc<EventBus>) -> Arc<KeyboardSession> {
        let handle = MemoryHandle::new("mem:0", DeviceIdentity::new(0x31e3, 0x1402, 0xff54));
        KeyboardSession::new(
            Arc::new(handle),
            KeyboardFamily::Wooting,
            Arc::clone(bus),
            SessionOptions::default(),
        )
    }

    #[test]
    fn delivers_to_every_listener() {
        let bus = Arc::new(EventBus::new(3).unwrap());
        let (first, first_rx) = recorder();
        let (second, second_rx) = recorder();
        bus.add_listener(first);
        bus.add_listener(second);

        bus.fire_added(&session(&bus));

        assert_eq!(first_rx.recv_timeout(TIMEOUT), Ok("added"));
        assert_eq!(second_rx.recv_timeout(TIMEOUT), Ok("added"));
    }

    #[test]
    fn error_message_reaches_listener() {
        let bus = Arc::new(EventBus::new(1).unwrap());
        let (listener, rx) = recorder();
        bus.add_listener(listener);

        bus.fire_error(&session(&bus), "boom");

        assert_eq!(rx.recv_timeout(TIMEOUT), Ok("error"));
    }

    #[test]
    fn removed_listener_gets_nothing() {
        let bus = Arc::new(EventBus::new(1).unwrap());
        let (listener, rx) = recorder();
        let id = bus.add_listener(listener);

        assert!(bus.remove_listener(id));
        assert!(!bus.remove_listener(id));
        assert_eq!(bus.listener_count(), 0);

        bus.fire_added(&session(&bus));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn panicking_listener_does_not_affect_others() {
        let bus = Arc::new(EventBus::new(1).unwrap());
        bus.add_listener(Arc::new(Panicker));
        let (listener, rx) = recorder();
        bus.add_listener(listener);

        let keyboard = session(&bus);
        bus.fire_added(&keyboard);
        bus.fire_added(&keyboard);

        assert_eq!(rx.recv_timeout(TIMEOUT), Ok("added"));
        assert_eq!(rx.recv_timeout(TIMEOUT), Ok("added"));
    }

    #[test]
    fn ids_are_unique() {
        let bus = EventBus::new(1).unwrap();
        let (a, _rx_a) = recorder();
        let (b, _rx_b) = recorder();

        assert_ne!(bus.add_listener(a), bus.add_listener(b));
        assert_eq!(bus.worker_threads(), 1);
    }
}
