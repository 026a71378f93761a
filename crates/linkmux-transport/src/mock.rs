//! In-memory link for tests and examples.
//!
//! A [`MockLink`] behaves like a real backend through the capability traits
//! while a cloned [`MockHandle`] lets the test script failures, inject
//! inbound frames, and inspect what was written.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use linkmux_frame::{Frame, FrameError};

use crate::error::{Result, TransportError};
use crate::traits::{Connectable, FrameReader, FrameWriter};

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    connect_attempts: u32,
    fail_connects: u32,
    fail_reads: u32,
    fail_writes: u32,
    incoming: VecDeque<Frame>,
    sent: Vec<Frame>,
}

/// Shared scripting/observation handle for a [`MockLink`].
#[derive(Debug, Clone, Default)]
pub struct MockHandle(Arc<Mutex<MockState>>);

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue an inbound frame for the link's reader to pick up.
    pub fn push_incoming(&self, frame: Frame) {
        self.lock().incoming.push_back(frame);
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_connects(&self, n: u32) {
        self.lock().fail_connects = n;
    }

    /// Make the next `n` reads fail with an I/O error.
    pub fn fail_reads(&self, n: u32) {
        self.lock().fail_reads = n;
    }

    /// Make the next `n` writes fail with an I/O error.
    pub fn fail_writes(&self, n: u32) {
        self.lock().fail_writes = n;
    }

    /// Total connect attempts seen, including failed ones.
    pub fn connect_attempts(&self) -> u32 {
        self.lock().connect_attempts
    }

    /// Whether the link currently believes it is connected.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Snapshot of every frame written so far.
    pub fn sent(&self) -> Vec<Frame> {
        self.lock().sent.clone()
    }

    /// Inbound frames not yet consumed by the reader.
    pub fn pending_incoming(&self) -> usize {
        self.lock().incoming.len()
    }
}

/// An in-memory link carrying frames through a shared queue.
#[derive(Debug)]
pub struct MockLink {
    endpoint: String,
    max_payload: Option<usize>,
    state: MockHandle,
}

impl MockLink {
    /// Create a link and the handle that scripts it.
    pub fn new(endpoint: impl Into<String>) -> (Self, MockHandle) {
        let state = MockHandle::default();
        (
            Self {
                endpoint: endpoint.into(),
                max_payload: None,
                state: state.clone(),
            },
            state,
        )
    }

    /// Impose a payload limit, mimicking a size-limited transport.
    pub fn with_max_payload(mut self, max: usize) -> Self {
        self.max_payload = Some(max);
        self
    }

    /// A second link over the same shared state, for tests that hand one
    /// link to a dispatcher and keep another for sends.
    pub fn attach(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            max_payload: self.max_payload,
            state: self.state.clone(),
        }
    }
}

impl Connectable for MockLink {
    fn connect(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.connect_attempts += 1;
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(TransportError::Connect {
                endpoint: self.endpoint.clone(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }
        state.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.state.lock().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn protocol(&self) -> &'static str {
        "mock"
    }
}

impl FrameWriter for MockLink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            state.connected = false;
            return Err(TransportError::Io(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            )));
        }
        if let Some(max) = self.max_payload {
            if frame.payload.len() > max {
                return Err(TransportError::Frame(FrameError::PayloadTooLarge {
                    size: frame.payload.len(),
                    max,
                }));
            }
        }
        state.sent.push(frame.clone());
        Ok(())
    }

    fn max_payload(&self) -> Option<usize> {
        self.max_payload
    }
}

impl FrameReader for MockLink {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(TransportError::NotConnected);
            }
            if state.fail_reads > 0 {
                state.fail_reads -= 1;
                state.connected = false;
                return Err(TransportError::Io(std::io::Error::from(
                    std::io::ErrorKind::ConnectionReset,
                )));
            }
            if let Some(frame) = state.incoming.pop_front() {
                return Ok(Some(frame));
            }
        }
        // Empty queue plays the role of a poll timeout; yield briefly so
        // dispatcher loops in tests do not spin hot.
        std::thread::sleep(Duration::from_millis(1));
        Ok(None)
    }
}
