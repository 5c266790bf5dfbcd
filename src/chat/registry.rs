/// Connection registry — the authoritative, concurrency-safe set of
/// active sessions.
///
/// One mutex guards the whole map: membership changes must be atomic
/// with the nickname-uniqueness check, so the structure (not the entry)
/// is the unit of locking. The lock is only ever held for map
/// operations, never across an await point or any network I/O —
/// broadcast takes a [`Registry::snapshot`] and releases the lock
/// before touching a socket.
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::mpsc;

/// Process-unique session identifier.
pub type SessionId = u64;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one registered session.
///
/// The session task owns the socket; everyone else reaches the client
/// through `tx`, which serializes outbound writes through that single
/// task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub nickname: String,
    pub addr: SocketAddr,
    pub tx: mpsc::UnboundedSender<Bytes>,
}

impl SessionHandle {
    /// Create a handle with a fresh session id.
    pub fn new(nickname: String, addr: SocketAddr, tx: mpsc::UnboundedSender<Bytes>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            nickname,
            addr,
            tx,
        }
    }
}

/// Why a registration was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("nickname en uso")]
    NicknameInUse,
    #[error("nickname vacío")]
    EmptyNickname,
}

/// Shared map of active sessions, keyed by nickname.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means some task panicked mid-operation;
    // the map itself is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionHandle>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Atomically check nickname uniqueness and insert.
    ///
    /// On [`RegistryError::NicknameInUse`] the registry is unchanged and
    /// the caller is responsible for rejecting the connection. Empty
    /// nicknames are refused here as a backstop even though the client
    /// is expected to validate first.
    pub fn register(&self, handle: SessionHandle) -> Result<(), RegistryError> {
        if handle.nickname.trim().is_empty() {
            return Err(RegistryError::EmptyNickname);
        }
        let mut sessions = self.lock();
        match sessions.entry(handle.nickname.clone()) {
            Entry::Occupied(_) => Err(RegistryError::NicknameInUse),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Idempotent removal by identity.
    ///
    /// The entry is removed only if both nickname and session id match,
    /// so a stale cleanup can never evict a newer session that reused
    /// the nickname. Returns whether anything was removed.
    pub fn remove(&self, nickname: &str, id: SessionId) -> bool {
        let mut sessions = self.lock();
        match sessions.get(nickname) {
            Some(current) if current.id == id => {
                sessions.remove(nickname);
                true
            }
            _ => false,
        }
    }

    /// Point-in-time copy of the active sessions, ordered by nickname.
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        let sessions = self.lock();
        let mut out: Vec<SessionHandle> = sessions.values().cloned().collect();
        out.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        out
    }

    pub fn contains(&self, nickname: &str) -> bool {
        self.lock().contains_key(nickname)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn handle(nickname: &str) -> (SessionHandle, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        (SessionHandle::new(nickname.to_string(), addr, tx), rx)
    }

    #[test]
    fn distinct_nicknames_both_register() {
        let registry = Registry::new();
        let (alice, _rx_a) = handle("alice");
        let (bob, _rx_b) = handle("bob");
        assert!(registry.register(alice).is_ok());
        assert!(registry.register(bob).is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_nickname_rejected_and_registry_unchanged() {
        let registry = Registry::new();
        let (first, _rx1) = handle("alice");
        let first_id = first.id;
        registry.register(first).unwrap();

        let (second, _rx2) = handle("alice");
        assert_eq!(
            registry.register(second),
            Err(RegistryError::NicknameInUse)
        );

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, first_id);
    }

    #[test]
    fn empty_nickname_rejected() {
        let registry = Registry::new();
        let (empty, _rx) = handle("");
        assert_eq!(registry.register(empty), Err(RegistryError::EmptyNickname));
        let (blank, _rx) = handle("   ");
        assert_eq!(registry.register(blank), Err(RegistryError::EmptyNickname));
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_register_same_nickname_exactly_one_wins() {
        let registry = Arc::new(Registry::new());
        let mut threads = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            threads.push(std::thread::spawn(move || {
                let (tx, _rx) = mpsc::unbounded_channel();
                let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
                registry
                    .register(SessionHandle::new("alice".to_string(), addr, tx))
                    .is_ok()
            }));
        }
        let wins: usize = threads
            .into_iter()
            .map(|t| t.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removed_nickname_is_reusable() {
        let registry = Registry::new();
        let (first, _rx1) = handle("alice");
        let first_id = first.id;
        registry.register(first).unwrap();

        assert!(registry.remove("alice", first_id));
        assert!(!registry.contains("alice"));

        let (second, _rx2) = handle("alice");
        assert!(registry.register(second).is_ok());
    }

    #[test]
    fn remove_is_idempotent_and_identity_guarded() {
        let registry = Registry::new();
        let (alice, _rx) = handle("alice");
        let id = alice.id;
        registry.register(alice).unwrap();

        // Wrong id is a no-op.
        assert!(!registry.remove("alice", id + 1000));
        assert!(registry.contains("alice"));

        assert!(registry.remove("alice", id));
        // Second call finds nothing.
        assert!(!registry.remove("alice", id));
        // Absent nickname is a no-op too.
        assert!(!registry.remove("nobody", 42));
    }

    #[test]
    fn stale_remove_never_evicts_reused_nickname() {
        let registry = Registry::new();
        let (first, _rx1) = handle("alice");
        let stale_id = first.id;
        registry.register(first).unwrap();
        registry.remove("alice", stale_id);

        let (second, _rx2) = handle("alice");
        registry.register(second).unwrap();

        // A late cleanup from the first session must not touch the new one.
        assert!(!registry.remove("alice", stale_id));
        assert!(registry.contains("alice"));
    }

    #[test]
    fn snapshot_is_ordered_and_isolated() {
        let registry = Registry::new();
        let (carol, _rx_c) = handle("carol");
        let (alice, _rx_a) = handle("alice");
        let (bob, _rx_b) = handle("bob");
        let bob_id = bob.id;
        registry.register(carol).unwrap();
        registry.register(alice).unwrap();
        registry.register(bob).unwrap();

        let snapshot = registry.snapshot();
        let names: Vec<&str> = snapshot.iter().map(|h| h.nickname.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);

        // Mutations after the snapshot don't reach the copy.
        registry.remove("bob", bob_id);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(registry.len(), 2);
    }
}
