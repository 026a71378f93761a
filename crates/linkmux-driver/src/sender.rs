//! Single-flight send path.

use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};

use linkmux_codec::{pack, Schema, Value};
use linkmux_frame::Frame;
use linkmux_transport::FrameWriter;
use tracing::warn;

use crate::error::{DriverError, Result};
use crate::lifecycle::ConnectRetry;
use crate::logging::DriverLog;
use crate::registry::{InstanceInfo, Operation, Registry};

/// Options for opening a send instance.
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Identifier stamped on every outbound frame; `None` for an anonymous
    /// channel.
    pub identifier: Option<u32>,
    /// Wall-clock bound on a single [`LinkSender::send`] call, reconnects
    /// included.
    pub send_timeout: Duration,
    pub startup: ConnectRetry,
    pub runtime: ConnectRetry,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            identifier: None,
            send_timeout: Duration::from_secs(5),
            startup: ConnectRetry::startup(),
            runtime: ConnectRetry::runtime(),
        }
    }
}

impl SendOptions {
    pub fn with_identifier(mut self, identifier: u32) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn with_startup(mut self, startup: ConnectRetry) -> Self {
        self.startup = startup;
        self
    }

    pub fn with_runtime(mut self, runtime: ConnectRetry) -> Self {
        self.runtime = runtime;
        self
    }
}

/// A registered send instance owning one outbound link.
///
/// `send` packs values per the instance's schema and writes one frame,
/// riding out link failures until the send timeout. At most one send is in
/// flight at a time; a concurrent call fails fast with
/// [`DriverError::SendBusy`] rather than queueing behind an unbounded
/// retry.
#[derive(Debug)]
pub struct LinkSender<L: FrameWriter> {
    name: String,
    channel: String,
    identifier: Option<u32>,
    schema: Schema,
    send_timeout: Duration,
    runtime: ConnectRetry,
    link: Mutex<L>,
    registry: Arc<Registry>,
    log: DriverLog,
}

impl<L: FrameWriter> LinkSender<L> {
    /// Validate, connect (with startup retry) and register a send instance.
    ///
    /// Validation runs before the first connect attempt, so an instance
    /// that would be rejected never touches the hardware. If the schema can
    /// never fit the transport's payload limit the instance is refused
    /// outright.
    pub fn open(
        name: impl Into<String>,
        schema: Schema,
        mut link: L,
        registry: Arc<Registry>,
        options: SendOptions,
    ) -> Result<Self> {
        let name = name.into();
        if let Some(max) = link.max_payload() {
            if schema.width() > max {
                return Err(DriverError::OversizePayload {
                    width: schema.width(),
                    max,
                });
            }
        }

        let info = InstanceInfo {
            name: name.clone(),
            protocol: link.protocol().to_string(),
            channel: link.endpoint().to_string(),
            operation: Operation::Send,
            identifier: options.identifier,
            running: false,
            message_count: 0,
        };
        registry.validate(&info)?;
        options.startup.establish(&mut link)?;

        let channel = info.channel.clone();
        if let Err(e) = registry.register(info) {
            link.disconnect();
            return Err(e);
        }

        let log = DriverLog::new(name.clone(), channel.clone(), options.identifier);
        log.created(link.protocol(), Operation::Send);
        Ok(Self {
            name,
            channel,
            identifier: options.identifier,
            schema,
            send_timeout: options.send_timeout,
            runtime: options.runtime,
            link: Mutex::new(link),
            registry,
            log,
        })
    }

    /// Pack `values` and write one frame.
    ///
    /// On a write failure the link is torn down, the channel's buffers are
    /// invalidated, and the send is retried on a fresh connection until the
    /// send timeout elapses. Returns the channel's send count for this
    /// identifier; counters only move on success.
    pub fn send(&self, values: &[Value]) -> Result<u64> {
        if !self.registry.is_running(&self.name) {
            return Err(DriverError::Stopped(self.name.clone()));
        }
        let payload = pack(&self.schema, values)?;

        let mut link = match self.link.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(DriverError::SendBusy),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let frame = Frame::new(self.identifier, payload);
        let deadline = Instant::now() + self.send_timeout;
        loop {
            if !link.is_connected() {
                self.reconnect_until(&mut link, deadline)?;
            }
            match link.write_frame(&frame) {
                Ok(()) => {
                    let count = self.registry.record_sent(
                        &self.name,
                        &self.channel,
                        self.identifier,
                        frame.payload.len(),
                    );
                    self.log.sent(count, frame.payload.len());
                    return Ok(count);
                }
                // Framing problems are not transient; retrying the same
                // frame would fail the same way.
                Err(e) if e.is_framing() => return Err(e.into()),
                Err(e) => {
                    warn!(
                        instance = %self.name,
                        channel = %self.channel,
                        error = %e,
                        "write failed, reconnecting"
                    );
                    link.disconnect();
                    self.registry.clear_channel(&self.channel);
                    if Instant::now() >= deadline {
                        return Err(DriverError::SendTimeout {
                            timeout: self.send_timeout,
                        });
                    }
                }
            }
        }
    }

    fn reconnect_until(&self, link: &mut L, deadline: Instant) -> Result<()> {
        loop {
            match link.connect() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        instance = %self.name,
                        endpoint = link.endpoint(),
                        error = %e,
                        "reconnect attempt failed"
                    );
                    if Instant::now() + self.runtime.backoff >= deadline {
                        return Err(DriverError::SendTimeout {
                            timeout: self.send_timeout,
                        });
                    }
                    std::thread::sleep(self.runtime.backoff);
                }
            }
        }
    }

    /// Mark the instance stopped and close its link. The registry slot and
    /// the identifier stay claimed.
    pub fn stop(&self) -> Result<()> {
        self.registry.mark_stopped(&self.name)?;
        let mut link = match self.link.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        link.disconnect();
        self.log.stopped();
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn identifier(&self) -> Option<u32> {
        self.identifier
    }

    /// Messages sent by this instance so far.
    pub fn count(&self) -> u64 {
        self.registry
            .instance(&self.name)
            .map(|i| i.message_count)
            .unwrap_or(0)
    }
}
