//! Lifecycle of one open keyboard
//!
//! A session owns a transport handle and the report parser for it. Opening
//! starts a dedicated reader thread that polls the handle with a bounded
//! timeout, so a close request is noticed within one read:
//!
//! ```text
//! Closed --open()--> Reading --close()--> Closing --reader exits--> Closed
//! ```
//!
//! A session is closed exactly when its reader thread is not running. The
//! reader closes the handle before it exits, so a closed session never holds
//! an open handle.

use super::transport::SharedHandle;
use super::{DeviceIdentity, KeyboardFamily};
use crate::error::{SessionError, TransportError};
use crate::event::EventBus;
use crate::keyboard::ReportParser;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const READER_THREAD_NAME: &str = "analog keyboard reader";

/// Reader settings of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Longest a single read waits for a report
    pub read_timeout: Duration,
    /// Read buffer size, `None` for the family's report size
    pub report_size: Option<usize>,
    /// Pause after a failed read
    pub error_backoff: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(1000),
            report_size: None,
            error_backoff: Duration::from_millis(50),
        }
    }
}

/// Lifecycle state of a session.
///
/// There is no opening state: `open` holds the session until the reader
/// thread is running or the open has failed, so callers only ever see
/// `Closed` before and `Reading` after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Closed,
    Reading,
    /// Close was requested, the reader has not exited yet
    Closing,
}

/// Static description of the keyboard behind a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyboardInfo {
    /// Model name, falling back to the product string reported by the device
    pub name: String,
    pub family: KeyboardFamily,
    pub identity: DeviceIdentity,
    pub serial_number: Option<String>,
    /// Transport path, unique per attached interface
    pub path: String,
}

impl KeyboardInfo {
    fn new(handle: &SharedHandle, family: KeyboardFamily) -> Self {
        let identity = handle.identity();
        let name = family
            .matching_descriptor(&identity)
            .map(|d| d.name.to_string())
            .or_else(|| handle.product_name())
            .unwrap_or_else(|| family.name().to_string());

        Self {
            name,
            family,
            identity,
            serial_number: handle.serial_number(),
            path: handle.path().to_string(),
        }
    }
}

enum Reader {
    /// Never opened
    Ready(ReportParser),
    Running(JoinHandle<()>),
    /// The reader ran, or failed to start
    Spent,
}

/// One recognized keyboard and its reader.
///
/// Sessions are shared as `Arc<KeyboardSession>` between the registry, the
/// reader thread and listeners. Two sessions are equal when they wrap the
/// same transport path.
pub struct KeyboardSession {
    info: KeyboardInfo,
    handle: SharedHandle,
    bus: Arc<EventBus>,
    options: SessionOptions,
    stop: AtomicBool,
    reader: Mutex<Reader>,
}

impl KeyboardSession {
    pub fn new(
        handle: SharedHandle,
        family: KeyboardFamily,
        bus: Arc<EventBus>,
        options: SessionOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            info: KeyboardInfo::new(&handle, family),
            handle,
            bus,
            options,
            stop: AtomicBool::new(false),
            reader: Mutex::new(Reader::Ready(ReportParser::new(family.keymap()))),
        })
    }

    pub fn info(&self) -> &KeyboardInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn path(&self) -> &str {
        &self.info.path
    }

    pub fn handle(&self) -> &SharedHandle {
        &self.handle
    }

    /// Open the handle and start reading reports.
    ///
    /// Fails with [`SessionError::AlreadyOpen`] while the reader runs and with
    /// [`SessionError::Spent`] once it has run; neither touches the handle. A
    /// failed handle open leaves the session closed and openable.
    pub fn open(self: &Arc<Self>) -> Result<(), SessionError> {
        let mut reader = self.reader.lock();
        match &*reader {
            Reader::Ready(_) => {}
            Reader::Running(thread) if !thread.is_finished() => {
                return Err(SessionError::AlreadyOpen)
            }
            Reader::Running(_) | Reader::Spent => return Err(SessionError::Spent),
        }

        self.handle.open()?;

        let Reader::Ready(parser) = mem::replace(&mut *reader, Reader::Spent) else {
            return Err(SessionError::Spent);
        };
        self.stop.store(false, Ordering::SeqCst);

        let session = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(READER_THREAD_NAME.to_string())
            .spawn(move || session.read_loop(parser));

        match spawned {
            Ok(thread) => {
                *reader = Reader::Running(thread);
                log::info!("Opened {} at {}", self.info.name, self.info.path);
                Ok(())
            }
            Err(e) => {
                self.handle.close();
                Err(SessionError::Spawn(e))
            }
        }
    }

    /// Ask the reader to stop after its current read.
    ///
    /// Returns immediately; the session reports closed once the reader has
    /// closed the handle and exited.
    pub fn close(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::NotOpen);
        }
        self.stop.store(true, Ordering::SeqCst);
        log::debug!("Close requested for {}", self.info.name);
        Ok(())
    }

    /// Whether the reader thread is not running
    pub fn is_closed(&self) -> bool {
        match &*self.reader.lock() {
            Reader::Running(thread) => thread.is_finished(),
            Reader::Ready(_) | Reader::Spent => true,
        }
    }

    /// Prevent any further `open` if the reader is not running.
    ///
    /// Returns false, leaving the session untouched, while the reader is
    /// still alive.
    pub(crate) fn retire(&self) -> bool {
        let mut reader = self.reader.lock();
        if let Reader::Running(thread) = &*reader {
            if !thread.is_finished() {
                return false;
            }
        }
        *reader = Reader::Spent;
        true
    }

    pub fn state(&self) -> SessionState {
        if self.is_closed() {
            SessionState::Closed
        } else if self.stop.load(Ordering::SeqCst) {
            SessionState::Closing
        } else {
            SessionState::Reading
        }
    }

    fn report_size(&self) -> usize {
        self.options
            .report_size
            .filter(|&size| size > 0)
            .unwrap_or_else(|| self.info.family.report_size())
    }

    fn read_loop(self: Arc<Self>, mut parser: ReportParser) {
        self.bus.fire_opened(&self);

        let mut buf = vec![0u8; self.report_size()];
        while !self.stop.load(Ordering::SeqCst) {
            match self.handle.read_timeout(&mut buf, self.options.read_timeout) {
                Ok(0) => {}
                Ok(len) => {
                    let states = parser.parse(&buf, len);
                    if !states.is_empty() {
                        self.bus.fire_key_pressed(&self, states);
                    }
                }
                Err(e) => {
                    log::warn!("Read from {} failed: {}", self.info.name, e);
                    let message = match e {
                        TransportError::Read(message) => message,
                        other => other.to_string(),
                    };
                    self.bus.fire_error(&self, message);
                    if !self.options.error_backoff.is_zero() {
                        thread::sleep(self.options.error_backoff);
                    }
                }
            }
        }

        self.handle.close();
        log::debug!("Reader for {} exited", self.info.name);
        log::info!("Closed {}", self.info.name);
        self.bus.fire_closed(&self);
    }
}

impl PartialEq for KeyboardSession {
    fn eq(&self, other: &Self) -> bool {
        self.info.path == other.info.path
    }
}

impl Eq for KeyboardSession {}

impl fmt::Debug for KeyboardSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyboardSession")
            .field("info", &self.info)
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Display for KeyboardSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.info.name, self.info.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MemoryHandle, ReadStep};
    use std::time::Instant;

    const WOOTING_60HE: DeviceIdentity = DeviceIdentity::new(0x31e3, 0x1312, 0xff54);

    fn fixture(handle: MemoryHandle) -> (Arc<MemoryHandle>, Arc<KeyboardSession>) {
        let handle = Arc::new(handle);
        let bus = Arc::new(EventBus::new(1).unwrap());
        let options = SessionOptions {
            read_timeout: Duration::from_millis(10),
            ..SessionOptions::default()
        };
        let session = KeyboardSession::new(handle.clone(), KeyboardFamily::Wooting, bus, options);
        (handle, session)
    }

    fn wait_closed(session: &KeyboardSession) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !session.is_closed() {
            assert!(Instant::now() < deadline, "reader did not exit");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn info_uses_model_name() {
        let (_, session) = fixture(
            MemoryHandle::new("mem:0", WOOTING_60HE)
                .with_serial_number("A01")
                .with_product_name("WootingHE"),
        );

        assert_eq!(session.name(), "Wooting 60HE");
        assert_eq!(session.info().serial_number.as_deref(), Some("A01"));
        assert_eq!(session.info().family, KeyboardFamily::Wooting);
        assert_eq!(session.to_string(), "Wooting 60HE [31e3:1312 (usage page 0xff54)]");
    }

    #[test]
    fn info_falls_back_to_product_name() {
        let identity = DeviceIdentity::new(0x31e3, 0x9999, 0xff54);
        let (_, session) = fixture(MemoryHandle::new("mem:0", identity).with_product_name("Prototype"));

        assert_eq!(session.name(), "Prototype");
    }

    #[test]
    fn open_and_close() {
        let (handle, session) = fixture(MemoryHandle::new("mem:0", WOOTING_60HE));
        assert_eq!(session.state(), SessionState::Closed);

        session.open().unwrap();
        assert_eq!(session.state(), SessionState::Reading);
        assert!(!session.is_closed());
        assert!(handle.is_open());
        assert_eq!(session.handle().path(), "mem:0");

        session.close().unwrap();
        wait_closed(&session);

        assert_eq!(session.state(), SessionState::Closed);
        assert!(!handle.is_open());
        assert_eq!(handle.opens(), 1);
        assert_eq!(handle.closes(), 1);
    }

    #[test]
    fn open_twice_fails_without_touching_handle() {
        let (handle, session) = fixture(MemoryHandle::new("mem:0", WOOTING_60HE));

        session.open().unwrap();
        assert!(matches!(session.open(), Err(SessionError::AlreadyOpen)));
        assert_eq!(handle.opens(), 1);

        session.close().unwrap();
        wait_closed(&session);
    }

    #[test]
    fn close_when_closed_fails() {
        let (handle, session) = fixture(MemoryHandle::new("mem:0", WOOTING_60HE));

        assert!(matches!(session.close(), Err(SessionError::NotOpen)));
        assert_eq!(handle.closes(), 0);
    }

    #[test]
    fn closing_until_reader_exits() {
        let (handle, session) = fixture(
            MemoryHandle::new("mem:0", WOOTING_60HE)
                .with_steps([ReadStep::Stall(Duration::from_millis(300))]),
        );

        session.open().unwrap();
        // Let the reader enter the stalled read
        while handle.reads() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        session.close().unwrap();

        assert_eq!(session.state(), SessionState::Closing);
        assert!(handle.is_open());
        wait_closed(&session);
        assert!(!handle.is_open());
    }

    #[test]
    fn reopen_is_refused() {
        let (handle, session) = fixture(MemoryHandle::new("mem:0", WOOTING_60HE));

        session.open().unwrap();
        session.close().unwrap();
        wait_closed(&session);

        assert!(matches!(session.open(), Err(SessionError::Spent)));
        assert_eq!(handle.opens(), 1);
    }

    #[test]
    fn retired_session_cannot_open() {
        let (handle, session) = fixture(MemoryHandle::new("mem:0", WOOTING_60HE));

        assert!(session.retire());
        assert!(matches!(session.open(), Err(SessionError::Spent)));
        assert_eq!(handle.opens(), 0);
    }

    #[test]
    fn retire_waits_for_reader() {
        let (_, session) = fixture(MemoryHandle::new("mem:0", WOOTING_60HE));

        session.open().unwrap();
        assert!(!session.retire());
        assert_eq!(session.state(), SessionState::Reading);

        session.close().unwrap();
        wait_closed(&session);
        assert!(session.retire());
    }

    #[test]
    fn failed_open_can_be_retried() {
        let (handle, session) = fixture(MemoryHandle::new("mem:0", WOOTING_60HE));
        handle.set_open_error(Some("access denied"));

        let err = session.open().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Open(ref m)) if m == "access denied"
        ));
        assert!(session.is_closed());

        handle.set_open_error(None);
        session.open().unwrap();
        session.close().unwrap();
        wait_closed(&session);
    }

    #[test]
    fn read_errors_do_not_stop_reader() {
        let (handle, session) = fixture(MemoryHandle::new("mem:0", WOOTING_60HE).with_steps([
            ReadStep::Error("first".to_string()),
            ReadStep::Error("second".to_string()),
        ]));

        session.open().unwrap();
        while handle.pending() > 0 {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!session.is_closed());

        session.close().unwrap();
        wait_closed(&session);
    }

    #[test]
    fn equality_by_path() {
        let (_, first) = fixture(MemoryHandle::new("mem:0", WOOTING_60HE));
        let (_, same) = fixture(MemoryHandle::new("mem:0", WOOTING_60HE));
        let (_, other) = fixture(MemoryHandle::new("mem:1", WOOTING_60HE));

        assert_eq!(*first, *same);
        assert_ne!(*first, *other);
    }
}
