//! Receive instances and their view of the dispatched buffers.

use bytes::Bytes;
use linkmux_codec::{unpack, Schema, Value};
use linkmux_transport::FrameReader;
use std::sync::Arc;

use crate::dispatcher;
use crate::error::{DriverError, Result};
use crate::lifecycle::ConnectRetry;
use crate::logging::DriverLog;
use crate::registry::{InstanceInfo, Operation, Registry};

/// Options for opening a receive instance.
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    /// Identifier this instance claims; `None` for an anonymous channel.
    pub identifier: Option<u32>,
    pub startup: ConnectRetry,
    pub runtime: ConnectRetry,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            identifier: None,
            startup: ConnectRetry::startup(),
            runtime: ConnectRetry::runtime(),
        }
    }
}

impl ReceiveOptions {
    pub fn with_identifier(mut self, identifier: u32) -> Self {
        self.identifier = Some(identifier);
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

/// A registered receive instance.
///
/// Receivers do not own a link. The first receiver on a channel connects
/// its link and hands it to that channel's dispatch loop; every receiver,
/// first or later, then reads the latest dispatched payload for its
/// identifier out of the registry. `receive` never blocks.
#[derive(Debug)]
pub struct LinkReceiver {
    name: String,
    channel: String,
    identifier: Option<u32>,
    schema: Schema,
    registry: Arc<Registry>,
    log: DriverLog,
}

impl LinkReceiver {
    /// Validate and register a receive instance, starting the channel's
    /// dispatch loop if this is the first receiver on it.
    ///
    /// Only the first receiver's link is connected and consumed; a later
    /// receiver's link is dropped unopened, since the running loop already
    /// owns the channel.
    pub fn open<L>(
        name: impl Into<String>,
        schema: Schema,
        mut link: L,
        registry: Arc<Registry>,
        options: ReceiveOptions,
    ) -> Result<Self>
    where
        L: FrameReader + Send + 'static,
    {
        let name = name.into();
        let info = InstanceInfo {
            name: name.clone(),
            protocol: link.protocol().to_string(),
            channel: link.endpoint().to_string(),
            operation: Operation::Receive,
            identifier: options.identifier,
            running: false,
            message_count: 0,
        };
        registry.validate(&info)?;

        let channel = info.channel.clone();
        let protocol = link.protocol();
        {
            let mut dispatch = registry.lock_dispatch();
            if !dispatch.contains_key(&channel) {
                options.startup.establish(&mut link)?;
                let handle =
                    dispatcher::spawn(registry.clone(), channel.clone(), link, options.runtime)?;
                dispatch.insert(channel.clone(), handle);
            }
        }
        registry.register(info)?;

        let log = DriverLog::new(name.clone(), channel.clone(), options.identifier);
        log.created(protocol, Operation::Receive);
        Ok(Self {
            name,
            channel,
            identifier: options.identifier,
            schema,
            registry,
            log,
        })
    }

    /// The latest payload for this identifier, unpacked per the schema.
    ///
    /// Non-blocking: `Ok(None)` means nothing has arrived since the channel
    /// last (re)connected. Repeated calls return the same payload until a
    /// newer frame overwrites it.
    pub fn receive(&self) -> Result<Option<Vec<Value>>> {
        match self.receive_raw()? {
            Some(payload) => Ok(Some(unpack(&self.schema, &payload)?)),
            None => Ok(None),
        }
    }

    /// The latest payload as raw bytes, skipping the codec. The usual path
    /// for anonymous channels without a fixed layout.
    pub fn receive_raw(&self) -> Result<Option<Bytes>> {
        if !self.registry.is_running(&self.name) {
            return Err(DriverError::Stopped(self.name.clone()));
        }
        let payload = self.registry.read_latest(&self.channel, self.identifier);
        self.registry
            .sync_receive_count(&self.name, &self.channel, self.identifier);
        Ok(payload)
    }

    /// Mark the instance stopped. The channel's dispatch loop keeps running
    /// for other receivers; use [`LinkReceiver::shutdown_dispatch`] to tear
    /// it down explicitly.
    pub fn stop(&self) -> Result<()> {
        self.registry.mark_stopped(&self.name)?;
        self.log.stopped();
        Ok(())
    }

    /// Cancel and join this channel's dispatch loop. Affects every receiver
    /// on the channel.
    pub fn shutdown_dispatch(&self) -> bool {
        self.registry.shutdown_dispatch(&self.channel)
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

    /// Messages the dispatcher has taken off the wire for this identifier.
    pub fn count(&self) -> u64 {
        self.registry
            .sync_receive_count(&self.name, &self.channel, self.identifier)
    }
}
