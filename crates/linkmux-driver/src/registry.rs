//! Instance registry and per-channel message state.
//!
//! The registry is the single source of truth for which driver instances
//! exist, which identifiers they claim, and the latest payload seen per
//! identifier on each channel. It enforces two uniqueness rules at
//! registration time:
//!
//! - instance names are unique across the whole registry
//! - identifiers are unique per `(channel, operation)`, and an anonymous
//!   instance (no identifier) must be alone in its scope, since its frames
//!   could not be told apart from anyone else's
//!
//! Stopped instances keep their registry slot; their names and identifiers
//! stay claimed as an audit trail of the process's driver history.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use bytes::Bytes;

use crate::dispatcher::DispatchHandle;
use crate::error::{DriverError, Result};

/// Direction of a driver instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Send,
    Receive,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Send => "send",
            Operation::Receive => "receive",
        })
    }
}

/// Registered facts about one driver instance.
#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub name: String,
    /// Transport kind label, e.g. `"serial"`.
    pub protocol: String,
    /// Channel the instance is bound to (the link endpoint).
    pub channel: String,
    pub operation: Operation,
    pub identifier: Option<u32>,
    pub running: bool,
    /// Messages sent or received by this instance so far.
    pub message_count: u64,
}

/// Cumulative traffic totals for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub sent_bytes: u64,
    pub received_bytes: u64,
}

#[derive(Debug, Default)]
struct ChannelState {
    /// Message counters per operation and identifier.
    counters: HashMap<(Operation, Option<u32>), u64>,
    /// Latest payload per receive identifier. Cleared wholesale when the
    /// channel's link fails, so a reader never sees pre-failure data as
    /// fresh.
    latest: HashMap<Option<u32>, Bytes>,
    stats: ChannelStats,
}

#[derive(Debug, Default)]
struct RegistryInner {
    instances: HashMap<String, InstanceInfo>,
    channels: HashMap<String, ChannelState>,
}

/// Shared instance/channel bookkeeping for a set of driver instances.
///
/// Usually accessed through [`Registry::shared`]; tests construct their own
/// with [`Registry::new`] to stay isolated.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<RegistryInner>,
    dispatch: Mutex<HashMap<String, DispatchHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn shared() -> Arc<Registry> {
        static SHARED: OnceLock<Arc<Registry>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(Registry::new())).clone()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn lock_dispatch(&self) -> MutexGuard<'_, HashMap<String, DispatchHandle>> {
        match self.dispatch.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Check the uniqueness rules for a prospective instance without
    /// registering it. Called before the first connect attempt so a doomed
    /// instance never touches the hardware.
    pub fn validate(&self, info: &InstanceInfo) -> Result<()> {
        let inner = self.lock();
        Self::check(&inner, info)
    }

    /// Register an instance, marking it running. Re-checks the uniqueness
    /// rules, since another registration may have won the race since
    /// [`Registry::validate`].
    pub fn register(&self, mut info: InstanceInfo) -> Result<()> {
        let mut inner = self.lock();
        Self::check(&inner, &info)?;
        info.running = true;
        inner.channels.entry(info.channel.clone()).or_default();
        inner.instances.insert(info.name.clone(), info);
        Ok(())
    }

    fn check(inner: &RegistryInner, info: &InstanceInfo) -> Result<()> {
        if inner.instances.contains_key(&info.name) {
            return Err(DriverError::DuplicateName(info.name.clone()));
        }
        let peers = inner
            .instances
            .values()
            .filter(|p| p.channel == info.channel && p.operation == info.operation);
        for peer in peers {
            match (info.identifier, peer.identifier) {
                (None, _) | (_, None) => {
                    return Err(DriverError::AnonymousConflict {
                        channel: info.channel.clone(),
                        operation: info.operation,
                    })
                }
                (Some(id), Some(taken)) if id == taken => {
                    return Err(DriverError::IdentifierConflict {
                        channel: info.channel.clone(),
                        operation: info.operation,
                        id,
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Flip an instance to stopped. Its slot stays claimed.
    pub fn mark_stopped(&self, name: &str) -> Result<()> {
        let mut inner = self.lock();
        let info = inner
            .instances
            .get_mut(name)
            .ok_or_else(|| DriverError::UnknownInstance(name.to_string()))?;
        info.running = false;
        Ok(())
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.lock()
            .instances
            .get(name)
            .map(|i| i.running)
            .unwrap_or(false)
    }

    /// Bump the send counter for `(channel, identifier)` and mirror it into
    /// the instance's own count. Returns the new count.
    pub fn record_sent(
        &self,
        name: &str,
        channel: &str,
        identifier: Option<u32>,
        payload_len: usize,
    ) -> u64 {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let chan = inner.channels.entry(channel.to_string()).or_default();
        let count = chan
            .counters
            .entry((Operation::Send, identifier))
            .or_insert(0);
        *count += 1;
        chan.stats.sent_bytes += payload_len as u64;
        let count = *count;
        if let Some(info) = inner.instances.get_mut(name) {
            info.message_count = count;
        }
        count
    }

    /// Store an inbound payload if a receive instance has claimed its
    /// identifier on this channel. A newer payload overwrites the old one.
    /// Returns false when no instance matches and the frame is dropped.
    pub fn record_received(&self, channel: &str, identifier: Option<u32>, payload: Bytes) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let claimed = inner.instances.values().any(|i| {
            i.operation == Operation::Receive && i.channel == channel && i.identifier == identifier
        });
        if !claimed {
            return false;
        }
        let chan = inner.channels.entry(channel.to_string()).or_default();
        *chan
            .counters
            .entry((Operation::Receive, identifier))
            .or_insert(0) += 1;
        chan.stats.received_bytes += payload.len() as u64;
        chan.latest.insert(identifier, payload);
        true
    }

    /// Latest payload buffered for `(channel, identifier)`, if any.
    pub fn read_latest(&self, channel: &str, identifier: Option<u32>) -> Option<Bytes> {
        self.lock()
            .channels
            .get(channel)?
            .latest
            .get(&identifier)
            .cloned()
    }

    /// Drop every buffered payload on a channel. Called on any link failure
    /// so stale pre-failure data cannot be read back as current.
    pub fn clear_channel(&self, channel: &str) {
        if let Some(chan) = self.lock().channels.get_mut(channel) {
            chan.latest.clear();
        }
    }

    /// Copy the channel's receive counter into the instance's own count and
    /// return it. Receivers call this on every read so their count tracks
    /// what the dispatcher has actually taken off the wire.
    pub fn sync_receive_count(&self, name: &str, channel: &str, identifier: Option<u32>) -> u64 {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let count = inner
            .channels
            .get(channel)
            .and_then(|c| c.counters.get(&(Operation::Receive, identifier)))
            .copied()
            .unwrap_or(0);
        if let Some(info) = inner.instances.get_mut(name) {
            info.message_count = count;
        }
        count
    }

    pub fn channel_stats(&self, channel: &str) -> Option<ChannelStats> {
        self.lock().channels.get(channel).map(|c| c.stats)
    }

    /// Snapshot of every registered instance, running or stopped.
    pub fn instances(&self) -> Vec<InstanceInfo> {
        let mut all: Vec<_> = self.lock().instances.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn instance(&self, name: &str) -> Option<InstanceInfo> {
        self.lock().instances.get(name).cloned()
    }

    /// Whether a dispatch loop is active for this channel.
    pub fn dispatch_running(&self, channel: &str) -> bool {
        self.lock_dispatch().contains_key(channel)
    }

    /// Cancel and join the channel's dispatch loop, if one is running.
    /// Registrations are untouched; this only stops the reader thread.
    pub fn shutdown_dispatch(&self, channel: &str) -> bool {
        let handle = self.lock_dispatch().remove(channel);
        match handle {
            Some(handle) => {
                handle.shutdown();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, channel: &str, operation: Operation, id: Option<u32>) -> InstanceInfo {
        InstanceInfo {
            name: name.to_string(),
            protocol: "mock".to_string(),
            channel: channel.to_string(),
            operation,
            identifier: id,
            running: false,
            message_count: 0,
        }
    }

    #[test]
    fn names_are_globally_unique() {
        let registry = Registry::new();
        registry
            .register(info("a", "ch0", Operation::Send, Some(1)))
            .unwrap();

        // Same name is rejected even on a different channel and operation.
        let err = registry
            .register(info("a", "ch1", Operation::Receive, Some(2)))
            .unwrap_err();
        assert!(matches!(err, DriverError::DuplicateName(_)));
    }

    #[test]
    fn identifier_scope_is_channel_and_operation() {
        let registry = Registry::new();
        registry
            .register(info("tx1", "ch0", Operation::Send, Some(1)))
            .unwrap();

        // Same id on the same channel but the other operation is fine.
        registry
            .register(info("rx1", "ch0", Operation::Receive, Some(1)))
            .unwrap();
        // Same id, same operation, different channel is fine.
        registry
            .register(info("tx2", "ch1", Operation::Send, Some(1)))
            .unwrap();

        let err = registry
            .register(info("tx3", "ch0", Operation::Send, Some(1)))
            .unwrap_err();
        assert!(matches!(err, DriverError::IdentifierConflict { id: 1, .. }));
    }

    #[test]
    fn anonymous_instance_must_be_alone_in_scope() {
        let registry = Registry::new();
        registry
            .register(info("rx1", "ch0", Operation::Receive, None))
            .unwrap();

        let err = registry
            .register(info("rx2", "ch0", Operation::Receive, Some(5)))
            .unwrap_err();
        assert!(matches!(err, DriverError::AnonymousConflict { .. }));

        let registry = Registry::new();
        registry
            .register(info("rx1", "ch0", Operation::Receive, Some(5)))
            .unwrap();
        let err = registry
            .register(info("rx2", "ch0", Operation::Receive, None))
            .unwrap_err();
        assert!(matches!(err, DriverError::AnonymousConflict { .. }));
    }

    #[test]
    fn stopped_instances_keep_their_claims() {
        let registry = Registry::new();
        registry
            .register(info("tx", "ch0", Operation::Send, Some(1)))
            .unwrap();
        registry.mark_stopped("tx").unwrap();
        assert!(!registry.is_running("tx"));

        // Both the name and the identifier stay taken.
        let err = registry
            .register(info("tx", "ch0", Operation::Send, Some(9)))
            .unwrap_err();
        assert!(matches!(err, DriverError::DuplicateName(_)));
        let err = registry
            .register(info("tx2", "ch0", Operation::Send, Some(1)))
            .unwrap_err();
        assert!(matches!(err, DriverError::IdentifierConflict { .. }));
    }

    #[test]
    fn newer_payload_overwrites_older() {
        let registry = Registry::new();
        registry
            .register(info("rx", "ch0", Operation::Receive, Some(7)))
            .unwrap();

        assert!(registry.record_received("ch0", Some(7), Bytes::from_static(b"old")));
        assert!(registry.record_received("ch0", Some(7), Bytes::from_static(b"new")));
        assert_eq!(
            registry.read_latest("ch0", Some(7)),
            Some(Bytes::from_static(b"new"))
        );
    }

    #[test]
    fn unclaimed_identifiers_are_dropped() {
        let registry = Registry::new();
        registry
            .register(info("rx", "ch0", Operation::Receive, Some(7)))
            .unwrap();

        assert!(!registry.record_received("ch0", Some(8), Bytes::from_static(b"x")));
        assert_eq!(registry.read_latest("ch0", Some(8)), None);
        // A send instance does not claim inbound frames.
        assert!(!registry.record_received("ch1", Some(7), Bytes::from_static(b"x")));
    }

    #[test]
    fn clear_channel_invalidates_buffers_but_not_counters() {
        let registry = Registry::new();
        registry
            .register(info("rx", "ch0", Operation::Receive, Some(7)))
            .unwrap();
        registry.record_received("ch0", Some(7), Bytes::from_static(b"data"));

        registry.clear_channel("ch0");
        assert_eq!(registry.read_latest("ch0", Some(7)), None);
        assert_eq!(registry.sync_receive_count("rx", "ch0", Some(7)), 1);
    }

    #[test]
    fn counters_and_stats_accumulate() {
        let registry = Registry::new();
        registry
            .register(info("tx", "ch0", Operation::Send, Some(1)))
            .unwrap();
        registry
            .register(info("rx", "ch0", Operation::Receive, Some(2)))
            .unwrap();

        assert_eq!(registry.record_sent("tx", "ch0", Some(1), 4), 1);
        assert_eq!(registry.record_sent("tx", "ch0", Some(1), 4), 2);
        registry.record_received("ch0", Some(2), Bytes::from_static(b"abcdef"));

        let stats = registry.channel_stats("ch0").unwrap();
        assert_eq!(stats.sent_bytes, 8);
        assert_eq!(stats.received_bytes, 6);
        assert_eq!(registry.instance("tx").unwrap().message_count, 2);
        assert_eq!(registry.sync_receive_count("rx", "ch0", Some(2)), 1);
        assert_eq!(registry.instance("rx").unwrap().message_count, 1);
    }

    #[test]
    fn instances_snapshot_is_sorted() {
        let registry = Registry::new();
        registry
            .register(info("zeta", "ch0", Operation::Send, Some(1)))
            .unwrap();
        registry
            .register(info("alpha", "ch1", Operation::Send, Some(1)))
            .unwrap();

        let names: Vec<_> = registry.instances().into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }
}
