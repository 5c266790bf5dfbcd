/// Broadcast engine — relays one sender's message to every other
/// active session.
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::registry::{Registry, SessionId};

/// Fans a payload out over a registry snapshot.
///
/// Relay is prefix-agnostic: payloads go out byte-for-byte as received,
/// and embedding the author's nickname in the text is the sending
/// client's job.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Deliver `payload` to every registered session except `sender`.
    ///
    /// Fire-and-forget: a recipient whose outbound channel is gone is
    /// dropped from the registry and skipped, never retried; the
    /// remaining recipients are unaffected. The snapshot is taken under
    /// the registry lock, but the sends below happen after it is
    /// released, so a stalled client never blocks registry operations.
    pub fn broadcast(&self, sender: Option<SessionId>, payload: Bytes) {
        for recipient in self.registry.snapshot() {
            if sender == Some(recipient.id) {
                continue;
            }
            if recipient.tx.send(payload.clone()).is_err() {
                debug!(nickname = %recipient.nickname, "recipient gone, dropping from registry");
                self.registry.remove(&recipient.nickname, recipient.id);
            }
        }
    }
}
