//! # Connection Handler
//!
//! One handler per accepted socket, owning the per-connection state machine:
//!
//! ```text
//! Authenticating -> Active -> Closing -> Closed
//! ```
//!
//! Frames are processed strictly in arrival order; decoding and dispatch are
//! synchronous between socket reads, so messages from one peer can never
//! interleave. The handler owns nothing shared: it holds the session id,
//! never the session record, and consults the shared credential store and
//! session registry for every decision.
//!
//! ## Timeouts
//! Reads are bounded by the idle timeout (the sole cancellation trigger) and
//! writes by the write timeout; a peer that cannot drain its socket is
//! treated as a transport fault rather than queued against unbounded memory.

use crate::auth::{AuthOutcome, CredentialStore};
use crate::config::{BrokerConfig, PROTOCOL_VERSION};
use crate::error::{constants, BrokerError, Result};
use crate::protocol::message::kind;
use crate::protocol::{FrameCodec, FrameEvent, Message};
use crate::session::SessionRegistry;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Reading frames, but only `auth_req` is acceptable.
    Authenticating,
    /// Authenticated; full dispatch table in effect.
    Active,
    /// Teardown decided; flush and clean up, then stop.
    Closing,
    /// Terminal.
    Closed,
}

/// Why a connection ended. Distinguishable in logs even where the registry
/// treats the outcomes identically (session ended either way).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent an explicit `disconnect`.
    ClientDisconnect,
    /// Peer closed the socket (end of stream).
    PeerClosed,
    /// No data within the idle timeout.
    IdleTimeout,
    /// Credentials rejected; one attempt per connection.
    AuthFailed,
    /// Username locked out.
    AccountLocked,
    /// Session expired or unknown on an authenticated-only message.
    SessionInvalid,
    /// Too many malformed/oversized frames.
    ProtocolViolations,
    /// Read/write error, write timeout, or internal failure.
    Transport,
}

/// Per-socket handler. Constructed by the broker, consumed by `run`.
pub struct ConnectionHandler {
    framed: Framed<TcpStream, FrameCodec>,
    peer: SocketAddr,
    state: ConnectionState,
    session_id: Option<String>,
    close_reason: Option<CloseReason>,
    violations: u32,
    violation_limit: u32,
    idle_timeout: Duration,
    write_timeout: Duration,
    credentials: Arc<CredentialStore>,
    sessions: Arc<SessionRegistry>,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        credentials: Arc<CredentialStore>,
        sessions: Arc<SessionRegistry>,
        config: &BrokerConfig,
    ) -> Self {
        Self {
            framed: Framed::new(stream, FrameCodec::from_config(&config.transport)),
            peer,
            state: ConnectionState::Authenticating,
            session_id: None,
            close_reason: None,
            violations: 0,
            violation_limit: config.transport.violation_limit,
            idle_timeout: config.server.idle_timeout,
            write_timeout: config.server.write_timeout,
            credentials,
            sessions,
        }
    }

    /// Drive the connection to completion. Never panics the task; every
    /// failure path degrades to a close with a logged reason.
    pub async fn run(mut self) {
        debug!(peer = %self.peer, "Connection accepted");

        while self.state == ConnectionState::Authenticating
            || self.state == ConnectionState::Active
        {
            match timeout(self.idle_timeout, self.framed.next()).await {
                Err(_) => {
                    warn!(peer = %self.peer, "Idle timeout, closing connection");
                    self.begin_close(CloseReason::IdleTimeout);
                }
                Ok(None) => {
                    self.begin_close(CloseReason::PeerClosed);
                }
                Ok(Some(Err(e))) => {
                    warn!(peer = %self.peer, error = %e, "Transport failure");
                    self.begin_close(CloseReason::Transport);
                }
                Ok(Some(Ok(FrameEvent::Malformed { len }))) => {
                    self.record_violation(&format!("malformed frame of {len} bytes"));
                }
                Ok(Some(Ok(FrameEvent::Oversized { declared }))) => {
                    self.record_violation(&format!("oversized frame declaring {declared} bytes"));
                }
                Ok(Some(Ok(FrameEvent::Message(msg)))) => {
                    if let Err(e) = self.handle_message(msg).await {
                        warn!(peer = %self.peer, error = %e, "Failed to process message");
                        self.begin_close(CloseReason::Transport);
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Decide teardown. First reason wins; later calls are no-ops.
    fn begin_close(&mut self, reason: CloseReason) {
        if self.state != ConnectionState::Closing && self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closing;
            self.close_reason = Some(reason);
        }
    }

    fn record_violation(&mut self, what: &str) {
        self.violations += 1;
        warn!(
            peer = %self.peer,
            violations = self.violations,
            "Protocol violation: {what}"
        );
        if self.violations >= self.violation_limit {
            self.begin_close(CloseReason::ProtocolViolations);
        }
    }

    async fn handle_message(&mut self, msg: Message) -> Result<()> {
        if msg.protocol_version != PROTOCOL_VERSION {
            // Advisory only: log it, never crash on it.
            debug!(
                peer = %self.peer,
                version = %msg.protocol_version,
                "Peer reports a different protocol version"
            );
        }

        match self.state {
            ConnectionState::Authenticating => {
                if msg.kind == kind::AUTH_REQUEST {
                    self.handle_auth(&msg).await
                } else {
                    // Not fatal: the connection stays open awaiting a valid
                    // auth_req, bounded by the idle timeout.
                    self.send(Message::error(None, 400, constants::ERR_AUTH_REQUIRED))
                        .await
                }
            }
            ConnectionState::Active => self.handle_active(msg).await,
            ConnectionState::Closing | ConnectionState::Closed => Ok(()),
        }
    }

    /// Process an `auth_req`. One failed or locked attempt closes the
    /// connection after the response is flushed, forcing a reconnect and
    /// bounding per-connection resource use.
    async fn handle_auth(&mut self, msg: &Message) -> Result<()> {
        let username = msg.data_str("username").unwrap_or_default();
        let password_digest = msg.data_str("password").unwrap_or_default();
        let device_name = msg.data_str("device_name").unwrap_or("Unknown Device");

        if username.is_empty() || password_digest.is_empty() {
            self.send(Message::auth_response(
                false,
                None,
                constants::ERR_INVALID_CREDENTIALS,
                None,
            ))
            .await?;
            self.begin_close(CloseReason::AuthFailed);
            return Ok(());
        }

        match self.credentials.authenticate(username, password_digest).await? {
            AuthOutcome::Accepted => {
                // Re-authentication on a live connection replaces the
                // session; end the old one so no orphan record lingers.
                if let Some(old) = self.session_id.take() {
                    self.sessions.end_session(&old).await?;
                }

                let session_id = self.sessions.create_session(username, device_name).await?;
                self.send(Message::auth_response(
                    true,
                    Some(session_id.clone()),
                    "Authentication successful",
                    None,
                ))
                .await?;

                info!(peer = %self.peer, username, "Connection authenticated");
                self.session_id = Some(session_id);
                self.state = ConnectionState::Active;
                Ok(())
            }
            AuthOutcome::Rejected(reason) => {
                self.send(Message::auth_response(false, None, &reason, None))
                    .await?;
                self.begin_close(CloseReason::AuthFailed);
                Ok(())
            }
            AuthOutcome::Locked { retry_after_secs } => {
                let reason = format!("Account locked. Retry in {retry_after_secs}s");
                self.send(Message::auth_response(false, None, &reason, None))
                    .await?;
                self.begin_close(CloseReason::AccountLocked);
                Ok(())
            }
        }
    }

    /// Dispatch table for an authenticated connection.
    async fn handle_active(&mut self, msg: Message) -> Result<()> {
        if msg.kind == kind::AUTH_REQUEST {
            return self.handle_auth(&msg).await;
        }

        let Some(session_id) = self.session_id.clone() else {
            self.send(Message::error(None, 401, constants::ERR_SESSION_INVALID))
                .await?;
            self.begin_close(CloseReason::SessionInvalid);
            return Ok(());
        };

        if !self.sessions.is_valid(&session_id).await {
            self.send(Message::error(
                Some(session_id),
                401,
                constants::ERR_SESSION_INVALID,
            ))
            .await?;
            self.begin_close(CloseReason::SessionInvalid);
            return Ok(());
        }

        self.sessions.touch(&session_id).await;

        match msg.kind.as_str() {
            kind::PING => {
                self.send(Message::pong(Some(session_id))).await
            }
            // The broker does not interpret capture or input payloads; in a
            // single-connection deployment they are acknowledged, in a relay
            // deployment a device registry would route them to the peer
            // connection instead.
            kind::SCREEN_CAPTURE | kind::MOUSE_EVENT | kind::KEY_EVENT => {
                self.send(Message::pong(Some(session_id))).await
            }
            kind::DISCONNECT => {
                self.send(Message::disconnect(Some(session_id), "OK")).await?;
                self.begin_close(CloseReason::ClientDisconnect);
                Ok(())
            }
            other => {
                // Recoverable client bug: answer 400 and stay active.
                let text = format!("Unknown message type: {other}");
                self.send(Message::error(Some(session_id), 400, &text)).await
            }
        }
    }

    /// Send one message, bounded by the write timeout. Persistent
    /// backpressure surfaces as `ConnectionTimeout`.
    async fn send(&mut self, msg: Message) -> Result<()> {
        match timeout(self.write_timeout, self.framed.send(msg)).await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::ConnectionTimeout),
        }
    }

    /// `Closing -> Closed`: flush pending writes, end the session
    /// (best-effort), close the socket.
    async fn shutdown(&mut self) {
        let reason = self.close_reason.unwrap_or(CloseReason::Transport);

        if let Err(e) = self.framed.close().await {
            debug!(peer = %self.peer, error = %e, "Error while closing socket");
        }

        if let Some(session_id) = self.session_id.take() {
            if let Err(e) = self.sessions.end_session(&session_id).await {
                warn!(session_id = %session_id, error = %e, "Failed to end session during teardown");
            }
        }

        self.state = ConnectionState::Closed;

        match reason {
            CloseReason::ClientDisconnect | CloseReason::PeerClosed => {
                info!(peer = %self.peer, reason = ?reason, "Connection closed");
            }
            _ => {
                warn!(peer = %self.peer, reason = ?reason, "Connection closed");
            }
        }
    }
}
