/// Per-connection protocol driver — nickname handshake, relay loop,
/// cleanup.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use super::broadcast::Broadcaster;
use super::codec::{ChunkCodec, CodecError};
use super::config::ServerConfig;
use super::registry::{Registry, RegistryError, SessionHandle, SessionId};

/// Token sent to a fresh connection to request its nickname.
pub const HANDSHAKE_TOKEN: &str = "NICK";
/// Confirmation sent once the nickname is accepted.
pub const WELCOME: &str = "Conectado al servidor!";

const ERR_NICKNAME_IN_USE: &str = "ERROR: Nickname en uso";
const ERR_NICKNAME_EMPTY: &str = "ERROR: Nickname vacío";

/// Connection lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Active,
    Closed,
}

/// Drive one client connection from accept to teardown.
///
/// Any transport error here is terminal for this session only; the
/// caller logs it and moves on. Once the session is registered, every
/// exit path deregisters it and announces the departure.
pub(crate) async fn run_session(
    socket: TcpStream,
    addr: SocketAddr,
    registry: Arc<Registry>,
    broadcaster: Broadcaster,
    config: Arc<ServerConfig>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), CodecError> {
    let mut framed = Framed::new(socket, ChunkCodec);

    // Handshaking: request a nickname and wait for exactly one reply.
    framed
        .send(Bytes::from_static(HANDSHAKE_TOKEN.as_bytes()))
        .await?;

    let nickname = match next_frame(&mut framed, config.idle_timeout, &mut shutdown).await? {
        Some(reply) => String::from_utf8_lossy(&reply).trim().to_owned(),
        // Gone (or hung past the timeout) before naming itself.
        None => return Ok(()),
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let handle = SessionHandle::new(nickname.clone(), addr, tx);
    let session_id = handle.id;

    match registry.register(handle) {
        Ok(()) => {}
        Err(RegistryError::NicknameInUse) => {
            warn!(%addr, nickname = %nickname, "nickname collision, rejecting");
            framed
                .send(Bytes::from_static(ERR_NICKNAME_IN_USE.as_bytes()))
                .await?;
            return Ok(());
        }
        Err(RegistryError::EmptyNickname) => {
            framed
                .send(Bytes::from_static(ERR_NICKNAME_EMPTY.as_bytes()))
                .await?;
            return Ok(());
        }
    }

    info!(%addr, nickname = %nickname, "joined the chat");

    let result = relay(
        &mut framed,
        rx,
        session_id,
        &nickname,
        &broadcaster,
        &config,
        &mut shutdown,
    )
    .await;

    // Closed: deregister and tell the remaining peers, best-effort.
    // A failed broadcast send may already have removed this entry.
    if registry.remove(&nickname, session_id) {
        broadcaster.broadcast(
            Some(session_id),
            Bytes::from(format!("{nickname} ha salido del chat!")),
        );
        info!(%addr, nickname = %nickname, "left the chat");
    }

    result
}

/// Active state: confirm, announce the join, then relay until close.
async fn relay(
    framed: &mut Framed<TcpStream, ChunkCodec>,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    session_id: SessionId,
    nickname: &str,
    broadcaster: &Broadcaster,
    config: &ServerConfig,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), CodecError> {
    framed.send(Bytes::from_static(WELCOME.as_bytes())).await?;
    broadcaster.broadcast(
        Some(session_id),
        Bytes::from(format!("{nickname} se unió al chat!")),
    );

    let mut state = SessionState::Active;
    while state == SessionState::Active {
        tokio::select! {
            // Inbound from this client's socket.
            frame = framed.next() => match frame {
                Some(Ok(payload)) if !payload.is_empty() => {
                    broadcaster.broadcast(Some(session_id), payload);
                }
                // Zero-length read, read error, or EOF all close the
                // session the same way.
                Some(Ok(_)) => state = SessionState::Closed,
                Some(Err(e)) => {
                    debug!(nickname = %nickname, "read error, closing session: {e}");
                    state = SessionState::Closed;
                }
                None => state = SessionState::Closed,
            },

            // Outbound from other sessions (broadcasts, notices).
            Some(payload) = rx.recv() => {
                framed.send(payload).await?;
            }

            _ = shutdown.changed() => state = SessionState::Closed,

            _ = wait_idle(config.idle_timeout) => {
                info!(nickname = %nickname, "idle timeout, closing session");
                state = SessionState::Closed;
            }
        }
    }

    Ok(())
}

/// Read one frame, giving up on shutdown or (if configured) idle timeout.
async fn next_frame(
    framed: &mut Framed<TcpStream, ChunkCodec>,
    idle_timeout: Option<Duration>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Option<Bytes>, CodecError> {
    tokio::select! {
        frame = framed.next() => match frame {
            Some(Ok(payload)) => Ok(Some(payload)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        },
        _ = shutdown.changed() => Ok(None),
        _ = wait_idle(idle_timeout) => Ok(None),
    }
}

/// Pends forever when no idle timeout is configured.
async fn wait_idle(timeout: Option<Duration>) {
    match timeout {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}
