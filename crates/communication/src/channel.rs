//! Channel delivery (spec: "external providers for the channels are out of
//! scope"). `ChannelProvider` is the seam a host wires a real email/SMS/chat
//! integration into; `InMemoryChannelProvider` is the test double.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::CommResult;
use crate::types::Message;

/// Delivers a rendered message over its channel.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Attempts delivery, returning whether the provider accepted the message.
    async fn deliver(&self, message: &Message) -> CommResult<bool>;
}

/// Records every message handed to it instead of delivering anywhere.
#[derive(Debug, Default)]
pub struct InMemoryChannelProvider {
    sent: Mutex<Vec<Message>>,
}

impl InMemoryChannelProvider {
    /// Builds an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every message this provider has "delivered".
    #[must_use]
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ChannelProvider for InMemoryChannelProvider {
    async fn deliver(&self, message: &Message) -> CommResult<bool> {
        self.sent.lock().push(message.clone());
        Ok(true)
    }
}
