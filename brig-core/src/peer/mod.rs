//! Authenticated, per-peer conversation channel (OTR-over-messaging
//! session layer). Grounded on `original_source/im/im.go`'s
//! `Conversation`/`Client` pair, reworked from goroutines + unbuffered
//! Go channels to `flume` channels guarded by `parking_lot::Mutex`
//! (§5: "the Conversation table is guarded by a mutex; individual
//! Conversations own their message channels").

mod kex;
mod smp;

pub use kex::{KeyExchange, KeyExchangeError, NoiseLikeExchange};

use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PeerError {
    #[error("timed out")]
    Timeout,
    #[error("conversation ended")]
    ConversationEnded,
    #[error("authentication failed")]
    AuthFailed,
    #[error("peer offline")]
    Offline,
    #[error("no conversation with {0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationState {
    Init,
    KeyExchange,
    AuthPending,
    SmpInProgress,
    Authorized,
    Dead,
}

/// `send`/stanza side of the XMPP-like transport spec.md treats as an
/// external collaborator. Incoming bytes are handed to a
/// [`PeerChannel`] via [`PeerChannel::deliver`] by whatever drives the
/// transport's receive loop; this trait only covers outbound send.
pub trait Transport: Send + Sync {
    fn send(&self, peer_id: &str, bytes: &[u8]) -> anyhow::Result<()>;
}

/// A per-peer session. Write before `AUTHORIZED` queues into
/// `backlog` (flushed in submission order on entering `AUTHORIZED`);
/// after `DEAD`, every operation fails with `ConversationEnded`.
pub struct Conversation {
    pub peer_id: String,
    pub initiated_by_us: bool,
    state: ConversationState,
    key: Option<[u8; 32]>,
    backlog: Vec<Vec<u8>>,
    dead: bool,
    inbox_tx: flume::Sender<Vec<u8>>,
    inbox_rx: flume::Receiver<Vec<u8>>,
}

impl Conversation {
    fn new(peer_id: impl Into<String>, initiated_by_us: bool) -> Self {
        let (inbox_tx, inbox_rx) = flume::unbounded();
        Conversation {
            peer_id: peer_id.into(),
            initiated_by_us,
            state: ConversationState::Init,
            key: None,
            backlog: Vec::new(),
            dead: false,
            inbox_tx,
            inbox_rx,
        }
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn is_authorized(&self) -> bool {
        self.state == ConversationState::Authorized
    }

    fn require_alive(&self) -> Result<(), PeerError> {
        if self.dead {
            Err(PeerError::ConversationEnded)
        } else {
            Ok(())
        }
    }

    fn begin_key_exchange(&mut self) -> Result<(), PeerError> {
        self.require_alive()?;
        self.state = ConversationState::KeyExchange;
        Ok(())
    }

    fn complete_key_exchange(&mut self, key: [u8; 32]) -> Result<(), PeerError> {
        self.require_alive()?;
        self.key = Some(key);
        self.state = ConversationState::AuthPending;
        Ok(())
    }

    fn begin_smp(&mut self) -> Result<(), PeerError> {
        self.require_alive()?;
        self.state = ConversationState::SmpInProgress;
        Ok(())
    }

    fn complete_smp(&mut self, ok: bool, transport: &dyn Transport) -> Result<(), PeerError> {
        self.require_alive()?;
        if ok {
            self.state = ConversationState::Authorized;
            self.flush_backlog(transport)?;
        } else {
            self.mark_dead();
        }
        Ok(())
    }

    /// Returns the conversation to `INIT` (the "reset/ended" arc in
    /// the diagram, taken before authorization completes).
    pub fn reset(&mut self) {
        if !self.dead {
            self.state = ConversationState::Init;
            self.key = None;
            self.backlog.clear();
        }
    }

    pub fn end(&mut self) {
        self.mark_dead();
    }

    fn mark_dead(&mut self) {
        self.state = ConversationState::Dead;
        self.dead = true;
    }

    fn flush_backlog(&mut self, transport: &dyn Transport) -> Result<(), PeerError> {
        for msg in self.backlog.drain(..) {
            transport
                .send(&self.peer_id, &msg)
                .map_err(|e| PeerError::Internal(e.to_string()))?;
        }
        Ok(())
    }

    pub fn write(&mut self, bytes: &[u8], transport: &dyn Transport) -> Result<usize, PeerError> {
        self.require_alive()?;
        if self.state == ConversationState::Authorized {
            transport
                .send(&self.peer_id, bytes)
                .map_err(|e| PeerError::Internal(e.to_string()))?;
        } else {
            self.backlog.push(bytes.to_vec());
        }
        Ok(bytes.len())
    }

    /// Called by whatever drains the transport to hand a
    /// whole application-level message to this conversation's reader.
    pub fn deliver(&self, bytes: Vec<u8>) {
        let _ = self.inbox_tx.send(bytes);
    }

    pub fn read(&self, timeout: Duration) -> Result<Vec<u8>, PeerError> {
        if self.dead {
            return Err(PeerError::ConversationEnded);
        }
        match self.inbox_rx.recv_timeout(timeout) {
            Ok(bytes) => Ok(bytes),
            Err(flume::RecvTimeoutError::Timeout) => Err(PeerError::Timeout),
            Err(flume::RecvTimeoutError::Disconnected) => Err(PeerError::ConversationEnded),
        }
    }
}

/// Default per-Read/Write timeout (spec.md §4.6: "default 20 s").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Owns every live conversation, the presence map, and the per-session
/// SMP-failure blacklist. One instance per local repository.
pub struct PeerChannel<T> {
    transport: Arc<T>,
    conversations: Mutex<HashMap<String, Arc<Mutex<Conversation>>>>,
    online: Mutex<HashSet<String>>,
    blacklist: Mutex<HashSet<String>>,
    new_peer_tx: flume::Sender<Arc<Mutex<Conversation>>>,
    new_peer_rx: flume::Receiver<Arc<Mutex<Conversation>>>,
}

impl<T: Transport> PeerChannel<T> {
    pub fn new(transport: Arc<T>) -> Self {
        let (new_peer_tx, new_peer_rx) = flume::unbounded();
        PeerChannel {
            transport,
            conversations: Mutex::new(HashMap::new()),
            online: Mutex::new(HashSet::new()),
            blacklist: Mutex::new(HashSet::new()),
            new_peer_tx,
            new_peer_rx,
        }
    }

    /// Triggers key exchange if absent, returns the conversation
    /// handle once it exists (may be pre-`AUTHORIZED`).
    pub fn talk(&self, peer_id: &str) -> Result<Arc<Mutex<Conversation>>, PeerError> {
        if self.blacklist.lock().contains(peer_id) {
            return Err(PeerError::AuthFailed);
        }
        let mut convs = self.conversations.lock();
        if let Some(existing) = convs.get(peer_id) {
            return Ok(existing.clone());
        }
        let mut conv = Conversation::new(peer_id, true);
        conv.begin_key_exchange()?;
        let handle = Arc::new(Mutex::new(conv));
        convs.insert(peer_id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Registers a conversation initiated by the remote peer and
    /// surfaces it to the next `listen` call.
    pub fn accept(&self, peer_id: &str) -> Arc<Mutex<Conversation>> {
        let mut convs = self.conversations.lock();
        let handle = convs
            .entry(peer_id.to_string())
            .or_insert_with(|| {
                let mut conv = Conversation::new(peer_id, false);
                let _ = conv.begin_key_exchange();
                Arc::new(Mutex::new(conv))
            })
            .clone();
        let _ = self.new_peer_tx.send(handle.clone());
        handle
    }

    /// Blocks until a peer initiates contact; returned once per new peer.
    pub fn listen(&self, timeout: Duration) -> Result<Arc<Mutex<Conversation>>, PeerError> {
        self.new_peer_rx
            .recv_timeout(timeout)
            .map_err(|_| PeerError::Timeout)
    }

    pub fn is_online(&self, peer_id: &str) -> bool {
        self.online.lock().contains(peer_id)
    }

    pub fn set_online(&self, peer_id: &str, online: bool) {
        let mut set = self.online.lock();
        if online {
            set.insert(peer_id.to_string());
        } else {
            set.remove(peer_id);
        }
        tracing::debug!(peer_id, online, "presence update");
    }

    /// Completes key exchange and runs the SMP authentication step for
    /// `peer_id`. On mismatch the conversation dies and the peer is
    /// blacklisted for the rest of this `PeerChannel`'s lifetime.
    pub fn authenticate(
        &self,
        peer_id: &str,
        kex: &dyn KeyExchange,
        peer_public_key: &[u8],
        session_salt: &[u8; 32],
        fingerprint: &[u8],
        peer_answer: &str,
    ) -> Result<(), PeerError> {
        let handle = self
            .conversations
            .lock()
            .get(peer_id)
            .ok_or_else(|| PeerError::NotFound(peer_id.to_string()))?
            .clone();

        let shared = kex
            .derive_shared_key(peer_public_key)
            .map_err(|_| PeerError::AuthFailed)?;

        {
            let mut conv = handle.lock();
            conv.complete_key_exchange(shared)?;
            conv.begin_smp()?;
        }

        let expected = smp::expected_answer(session_salt, fingerprint);
        let ok = expected == peer_answer;

        {
            let mut conv = handle.lock();
            conv.complete_smp(ok, self.transport.as_ref())?;
        }

        if !ok {
            self.blacklist.lock().insert(peer_id.to_string());
            tracing::info!(peer_id, "SMP authentication failed, peer blacklisted");
            return Err(PeerError::AuthFailed);
        }

        Ok(())
    }

    /// Hands a whole application-level message to `peer_id`'s reader.
    pub fn deliver(&self, peer_id: &str, bytes: Vec<u8>) {
        if let Some(conv) = self.conversations.lock().get(peer_id) {
            conv.lock().deliver(bytes);
        }
    }

    /// Ends every conversation (best-effort end-of-session marker),
    /// waking any pending reads/writes with `ConversationEnded`.
    pub fn close(&self) {
        let convs = self.conversations.lock();
        for conv in convs.values() {
            let mut c = conv.lock();
            let _ = self.transport.send(&c.peer_id, b"\0END\0");
            c.end();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ring::rand::SystemRandom;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl Transport for RecordingTransport {
        fn send(&self, peer_id: &str, bytes: &[u8]) -> anyhow::Result<()> {
            self.sent
                .lock()
                .push((peer_id.to_string(), bytes.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn write_before_authorized_queues_then_flushes() {
        crate::init_test_logging();
        let transport = Arc::new(RecordingTransport::default());
        let channel = PeerChannel::new(transport.clone());

        let conv = channel.talk("bob").unwrap();
        conv.lock().write(b"hello", transport.as_ref()).unwrap();
        assert!(transport.sent.lock().is_empty());

        {
            let mut c = conv.lock();
            c.complete_key_exchange([0u8; 32]).unwrap();
            c.begin_smp().unwrap();
            c.complete_smp(true, transport.as_ref()).unwrap();
        }

        assert_eq!(transport.sent.lock().len(), 1);
        assert!(conv.lock().is_authorized());
    }

    #[test]
    fn smp_mismatch_kills_conversation_and_blacklists_peer() {
        let transport = Arc::new(RecordingTransport::default());
        let channel = PeerChannel::new(transport);
        let rng = SystemRandom::new();
        let local_kex = NoiseLikeExchange::new(&rng).unwrap();
        let remote_kex = NoiseLikeExchange::new(&rng).unwrap();

        channel.talk("mallory").unwrap();
        let remote_public = remote_kex.local_public_key().to_vec();

        let err = channel
            .authenticate(
                "mallory",
                &local_kex,
                &remote_public,
                &[7u8; 32],
                b"mallorys-fingerprint",
                "wrong answer",
            )
            .unwrap_err();
        assert!(matches!(err, PeerError::AuthFailed));
        assert!(matches!(channel.talk("mallory"), Err(PeerError::AuthFailed)));
    }

    #[test]
    fn read_after_dead_returns_conversation_ended() {
        let transport = Arc::new(RecordingTransport::default());
        let channel = PeerChannel::new(transport);
        let conv = channel.talk("bob").unwrap();
        channel.close();

        let err = conv.lock().read(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, PeerError::ConversationEnded));
    }

    #[test]
    fn presence_is_a_pure_query() {
        let transport = Arc::new(RecordingTransport::default());
        let channel = PeerChannel::new(transport);
        assert!(!channel.is_online("bob"));
        channel.set_online("bob", true);
        assert!(channel.is_online("bob"));
        channel.set_online("bob", false);
        assert!(!channel.is_online("bob"));
    }
}
