//! Intercept mode: the server hands over codes one at a time and waits for
//! a decision on each.
//!
//! A turn is `receive_code`, any number of nested commands (usually a
//! `flush`), then exactly one of ignore, cancel or resolve. Calls made out
//! of that order fail locally with [`ConnectionError::OutOfTurn`] and send
//! nothing.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use dsfapi_core::{Code, MessageType};
use tracing::{debug, warn};

use crate::ConnectionError;
use crate::command::Command;
use crate::config::{ConnectionConfig, InterceptOptions};
use crate::connection::{BaseConnection, ConnectionState, Session};
use crate::init::ClientInitMessage;
use crate::session::CommandSession;

/// What to do with an intercepted code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptDecision {
    /// Let the code run unmodified.
    Ignore,
    /// Drop the code.
    Cancel,
    /// Treat the code as handled and attach a result message.
    Resolve {
        /// Severity of the result message.
        message_type: MessageType,
        /// Result text.
        content: Option<String>,
    },
}

impl InterceptDecision {
    /// Resolve successfully with no message.
    pub fn resolved() -> Self {
        InterceptDecision::Resolve {
            message_type: MessageType::Success,
            content: None,
        }
    }

    fn into_command(self) -> Command {
        match self {
            InterceptDecision::Ignore => Command::ignore(),
            InterceptDecision::Cancel => Command::cancel(),
            InterceptDecision::Resolve {
                message_type,
                content,
            } => Command::resolve(message_type, content),
        }
    }
}

/// A connection in intercept mode.
#[derive(Debug)]
pub struct InterceptConnection<S = UnixStream> {
    base: BaseConnection<S>,
    options: InterceptOptions,
    code_pending: bool,
}

impl InterceptConnection<UnixStream> {
    /// Connect to the control server socket and start intercepting.
    pub fn connect(
        config: ConnectionConfig,
        options: InterceptOptions,
    ) -> Result<Self, ConnectionError> {
        let mut base = BaseConnection::new(config);
        base.connect(&ClientInitMessage::intercept(&options))?;
        Ok(Self::wrap(base, options))
    }
}

impl<S: Read + Write> InterceptConnection<S> {
    /// Start intercepting over an already open transport.
    pub fn from_stream(
        stream: S,
        config: ConnectionConfig,
        options: InterceptOptions,
    ) -> Result<Self, ConnectionError> {
        let mut base = BaseConnection::new(config);
        base.open(stream, &ClientInitMessage::intercept(&options))?;
        Ok(Self::wrap(base, options))
    }

    fn wrap(base: BaseConnection<S>, options: InterceptOptions) -> Self {
        Self {
            base,
            options,
            code_pending: false,
        }
    }

    /// Options the connection was negotiated with.
    pub fn options(&self) -> &InterceptOptions {
        &self.options
    }

    /// Handshake outcome.
    pub fn session(&self) -> Option<&Session> {
        self.base.session()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.base.state()
    }

    /// Whether a received code still needs a decision.
    pub fn has_pending_code(&self) -> bool {
        self.code_pending
    }

    /// Release the transport. Idempotent.
    pub fn close(&mut self) {
        self.base.close();
        self.code_pending = false;
    }

    /// Block until the server intercepts a code.
    pub fn receive_code(&mut self) -> Result<Code, ConnectionError> {
        if self.code_pending {
            return Err(ConnectionError::OutOfTurn {
                details: "the previous code has not been ignored, cancelled or resolved".into(),
            });
        }
        self.base.require_active("receive a code")?;
        let code: Code = self.base.receive()?;
        debug!(code = %code.short_str(), channel = %code.channel, "code intercepted");
        self.code_pending = true;
        Ok(code)
    }

    /// Let the pending code run unmodified.
    pub fn ignore_code(&mut self) -> Result<(), ConnectionError> {
        self.decide(InterceptDecision::Ignore)
    }

    /// Drop the pending code.
    pub fn cancel_code(&mut self) -> Result<(), ConnectionError> {
        self.decide(InterceptDecision::Cancel)
    }

    /// Resolve the pending code with a result message.
    pub fn resolve_code(
        &mut self,
        message_type: MessageType,
        content: Option<String>,
    ) -> Result<(), ConnectionError> {
        self.decide(InterceptDecision::Resolve {
            message_type,
            content,
        })
    }

    /// Send `decision` for the pending code, ending the turn.
    pub fn decide(&mut self, decision: InterceptDecision) -> Result<(), ConnectionError> {
        if !self.code_pending {
            return Err(ConnectionError::OutOfTurn {
                details: "no intercepted code is waiting for a decision".into(),
            });
        }
        self.base.send(&decision.into_command())?;
        self.code_pending = false;
        Ok(())
    }

    /// Handle codes until the server closes the connection.
    ///
    /// `handler` may issue nested commands (for example
    /// [`flush`](CommandSession::flush)) through the connection it is given.
    /// If it fails with a recoverable error the code is cancelled and the
    /// loop continues; a fatal error ends the loop.
    pub fn run<F>(&mut self, mut handler: F) -> Result<(), ConnectionError>
    where
        F: FnMut(&mut Self, &Code) -> Result<InterceptDecision, ConnectionError>,
    {
        loop {
            let code = match self.receive_code() {
                Ok(code) => code,
                Err(ConnectionError::ConnectionClosed) => return Ok(()),
                Err(err) => return Err(err),
            };
            let decision = match handler(self, &code) {
                Ok(decision) => decision,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(error = %err, code = %code.short_str(), "handler failed; cancelling code");
                    InterceptDecision::Cancel
                }
            };
            if self.code_pending {
                self.decide(decision)?;
            }
        }
    }
}

impl<S: Read + Write> CommandSession for InterceptConnection<S> {
    fn perform_command(
        &mut self,
        command: &Command,
    ) -> Result<Option<serde_json::Value>, ConnectionError> {
        self.require_turn(command)?;
        self.base.perform_command(command)
    }

    fn perform_command_raw(&mut self, command: &Command) -> Result<String, ConnectionError> {
        self.require_turn(command)?;
        self.base.perform_command_raw(command)
    }
}

impl<S: Read + Write> InterceptConnection<S> {
    fn require_turn(&self, command: &Command) -> Result<(), ConnectionError> {
        if self.code_pending {
            Ok(())
        } else {
            Err(ConnectionError::OutOfTurn {
                details: format!(
                    "{} can only be sent while an intercepted code is pending",
                    command.name()
                ),
            })
        }
    }
}
