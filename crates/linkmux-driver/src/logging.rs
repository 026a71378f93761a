//! Event helpers so every instance logs the same identifying fields.

use tracing::{debug, info};

use crate::registry::Operation;

#[derive(Debug, Clone)]
pub(crate) struct DriverLog {
    name: String,
    channel: String,
    identifier: Option<u32>,
}

impl DriverLog {
    pub(crate) fn new(name: String, channel: String, identifier: Option<u32>) -> Self {
        Self {
            name,
            channel,
            identifier,
        }
    }

    pub(crate) fn created(&self, protocol: &str, operation: Operation) {
        info!(
            instance = %self.name,
            channel = %self.channel,
            id = ?self.identifier,
            protocol,
            %operation,
            "driver instance registered"
        );
    }

    pub(crate) fn sent(&self, count: u64, len: usize) {
        debug!(
            instance = %self.name,
            channel = %self.channel,
            id = ?self.identifier,
            count,
            len,
            "message sent"
        );
    }

    pub(crate) fn stopped(&self) {
        info!(
            instance = %self.name,
            channel = %self.channel,
            id = ?self.identifier,
            "driver instance stopped"
        );
    }
}
