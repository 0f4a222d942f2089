//! Handshake, mode negotiation and request/response plumbing shared by
//! every connection mode.
//!
//! A connection moves through
//! `Disconnected → Handshaking → ModeNegotiated → Active → Closed`.
//! Reads block until the server answers; there is no timeout, retry or
//! reconnect anywhere in here.

use std::fmt;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::ConnectionError;
use crate::command::Command;
use crate::config::ConnectionConfig;
use crate::frame::{FrameDecoder, read_message, write_message};
use crate::init::{ClientInitMessage, ConnectionMode, PROTOCOL_VERSION, ServerInitMessage, SessionId};
use crate::response::BaseResponse;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport yet.
    Disconnected,
    /// Transport open, waiting for the server's init message.
    Handshaking,
    /// Mode selection sent, waiting for the server's verdict.
    ModeNegotiated,
    /// Ready for mode-specific traffic.
    Active,
    /// Transport released. Terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::ModeNegotiated => "negotiating its mode",
            ConnectionState::Active => "active",
            ConnectionState::Closed => "closed",
        })
    }
}

/// What the handshake established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Version announced by the server.
    pub protocol_version: u32,
    /// Server-assigned session ID.
    pub session_id: SessionId,
    /// Negotiated mode.
    pub mode: ConnectionMode,
}

/// One connection to the control server over a byte stream.
///
/// Mode-specific connections wrap this; it can also be used directly to
/// speak a mode this crate has no wrapper for.
pub struct BaseConnection<S = UnixStream> {
    stream: Option<S>,
    decoder: FrameDecoder,
    state: ConnectionState,
    session: Option<Session>,
    config: ConnectionConfig,
}

impl<S> fmt::Debug for BaseConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseConnection")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("socket_path", &self.config.socket_path)
            .finish_non_exhaustive()
    }
}

impl BaseConnection<UnixStream> {
    /// Open the configured socket and negotiate `init`'s mode.
    pub fn connect(&mut self, init: &ClientInitMessage) -> Result<&Session, ConnectionError> {
        if self.state != ConnectionState::Disconnected {
            return Err(ConnectionError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }
        let path = self.config.socket_path.clone();
        debug!(path = %path.display(), mode = %init.mode(), "connecting");
        let stream = UnixStream::connect(&path)
            .map_err(|source| ConnectionError::ConnectionFailed { path, source })?;
        self.open(stream, init)
    }
}

impl<S: Read + Write> BaseConnection<S> {
    /// A disconnected connection using `config`.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            stream: None,
            decoder: FrameDecoder::new(config.max_message_size),
            state: ConnectionState::Disconnected,
            session: None,
            config,
        }
    }

    /// Run the handshake over an already open transport.
    ///
    /// On any failure the transport is released and the connection ends up
    /// [`ConnectionState::Closed`].
    pub fn open(&mut self, stream: S, init: &ClientInitMessage) -> Result<&Session, ConnectionError> {
        if self.state != ConnectionState::Disconnected {
            return Err(ConnectionError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }
        self.stream = Some(stream);
        self.transition(ConnectionState::Handshaking);

        if let Err(err) = self.negotiate(init) {
            warn!(error = %err, "handshake failed");
            self.close();
            return Err(err);
        }
        self.session.as_ref().ok_or(ConnectionError::ConnectionClosed)
    }

    fn negotiate(&mut self, init: &ClientInitMessage) -> Result<(), ConnectionError> {
        let server: ServerInitMessage = self.receive()?;
        debug!(version = server.version, id = %server.id, "server init received");
        if server.version < PROTOCOL_VERSION {
            return Err(ConnectionError::IncompatibleVersion {
                required: PROTOCOL_VERSION,
                got: server.version,
            });
        }

        self.send(init)?;
        self.transition(ConnectionState::ModeNegotiated);

        let response = self.receive_response()?;
        if !response.success {
            return Err(ConnectionError::ModeRejected {
                mode: init.mode(),
                error_type: response.error_type.unwrap_or_default(),
                error_message: response.error_message.unwrap_or_default(),
            });
        }

        self.session = Some(Session {
            protocol_version: server.version,
            session_id: server.id,
            mode: init.mode(),
        });
        self.transition(ConnectionState::Active);
        Ok(())
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(from = %self.state, to = %next, "connection state");
        self.state = next;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Handshake outcome, once active.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Whether the transport is still held.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Settings this connection was created with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Release the transport. Calling this again does nothing.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.stream = None;
        self.transition(ConnectionState::Closed);
    }

    // ── Raw I/O ─────────────────────────────────────────────────────────

    /// Serialize `msg` and write it as one newline-terminated message.
    pub fn send<T: Serialize + ?Sized>(&mut self, msg: &T) -> Result<(), ConnectionError> {
        let json = serde_json::to_vec(msg).map_err(ConnectionError::Serialization)?;
        if self.config.trace_io {
            trace!(json = %String::from_utf8_lossy(&json), "send");
        }
        let result = match self.stream.as_mut() {
            Some(stream) => write_message(stream, &json),
            None => return Err(self.not_open("send a message")),
        };
        self.check(result)
    }

    /// Read the next message as raw JSON text.
    pub fn receive_json(&mut self) -> Result<String, ConnectionError> {
        let result = match self.stream.as_mut() {
            Some(stream) => read_message(stream, &mut self.decoder),
            None => return Err(self.not_open("receive a message")),
        };
        let bytes = self.check(result)?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                let err = ConnectionError::MalformedMessage {
                    details: format!("message is not UTF-8: {e}"),
                };
                return self.check(Err(err));
            }
        };
        if self.config.trace_io {
            trace!(json = %text, "recv");
        }
        Ok(text)
    }

    /// Read the next message and deserialize it.
    pub fn receive<T: DeserializeOwned>(&mut self) -> Result<T, ConnectionError> {
        let text = self.receive_json()?;
        let result = serde_json::from_str(&text).map_err(ConnectionError::Deserialization);
        self.check(result)
    }

    /// Read the next success/error envelope.
    pub fn receive_response(&mut self) -> Result<BaseResponse, ConnectionError> {
        self.receive()
    }

    /// Send `command`, wait for its envelope and return the result.
    pub fn perform_command(
        &mut self,
        command: &Command,
    ) -> Result<Option<serde_json::Value>, ConnectionError> {
        self.require_active("perform a command")?;
        self.send(command)?;
        self.receive_response()?.into_result(command)
    }

    /// Send `command` and return its reply as raw JSON text.
    pub fn perform_command_raw(&mut self, command: &Command) -> Result<String, ConnectionError> {
        self.require_active("perform a command")?;
        self.send(command)?;
        self.receive_json()
    }

    pub(crate) fn require_active(&self, operation: &'static str) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Active {
            Ok(())
        } else {
            Err(ConnectionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn not_open(&self, operation: &'static str) -> ConnectionError {
        ConnectionError::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Close the connection if `result` carries a fatal error.
    fn check<T>(&mut self, result: Result<T, ConnectionError>) -> Result<T, ConnectionError> {
        if let Err(err) = &result
            && err.is_fatal()
            && self.state == ConnectionState::Active
        {
            warn!(error = %err, "connection lost");
            self.close();
        }
        result
    }
}
