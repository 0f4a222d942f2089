//! Subscribe mode: object model updates, each confirmed with `Acknowledge`.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use tracing::debug;

use crate::ConnectionError;
use crate::command::Command;
use crate::config::{ConnectionConfig, SubscribeOptions, SubscriptionMode};
use crate::connection::{BaseConnection, ConnectionState, Session};
use crate::init::ClientInitMessage;

/// One object model update.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// A complete model.
    Full(serde_json::Value),
    /// Only the keys that changed since the previous update.
    Patch(serde_json::Value),
}

impl Update {
    /// The update's JSON body.
    pub fn value(&self) -> &serde_json::Value {
        match self {
            Update::Full(value) | Update::Patch(value) => value,
        }
    }

    /// Whether this is a complete model.
    pub fn is_full(&self) -> bool {
        matches!(self, Update::Full(_))
    }
}

/// A connection in subscribe mode.
///
/// The first update is always a full model. In [`SubscriptionMode::Patch`]
/// every later update is a patch to merge into it. Closing the connection
/// is the only way to end the subscription.
#[derive(Debug)]
pub struct SubscribeConnection<S = UnixStream> {
    base: BaseConnection<S>,
    options: SubscribeOptions,
    received_full: bool,
}

impl SubscribeConnection<UnixStream> {
    /// Connect to the control server socket and subscribe.
    pub fn connect(
        config: ConnectionConfig,
        options: SubscribeOptions,
    ) -> Result<Self, ConnectionError> {
        let mut base = BaseConnection::new(config);
        base.connect(&ClientInitMessage::subscribe(&options))?;
        Ok(Self::wrap(base, options))
    }
}

impl<S: Read + Write> SubscribeConnection<S> {
    /// Subscribe over an already open transport.
    pub fn from_stream(
        stream: S,
        config: ConnectionConfig,
        options: SubscribeOptions,
    ) -> Result<Self, ConnectionError> {
        let mut base = BaseConnection::new(config);
        base.open(stream, &ClientInitMessage::subscribe(&options))?;
        Ok(Self::wrap(base, options))
    }

    fn wrap(base: BaseConnection<S>, options: SubscribeOptions) -> Self {
        Self {
            base,
            options,
            received_full: false,
        }
    }

    /// Options the connection was negotiated with.
    pub fn options(&self) -> &SubscribeOptions {
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

    /// Release the transport and end the subscription. Idempotent.
    pub fn close(&mut self) {
        self.base.close();
    }

    /// Receive the next update and acknowledge it.
    pub fn next_update(&mut self) -> Result<Update, ConnectionError> {
        let full = !self.received_full || self.options.mode == SubscriptionMode::Full;
        let text = self.receive_and_acknowledge()?;
        let value = serde_json::from_str(&text).map_err(ConnectionError::Deserialization)?;
        Ok(if full { Update::Full(value) } else { Update::Patch(value) })
    }

    /// Receive a full model and acknowledge it.
    pub fn get_object_model(&mut self) -> Result<serde_json::Value, ConnectionError> {
        let text = self.receive_and_acknowledge()?;
        serde_json::from_str(&text).map_err(ConnectionError::Deserialization)
    }

    /// Receive the next update as JSON text and acknowledge it.
    pub fn get_serialized_object_model(&mut self) -> Result<String, ConnectionError> {
        self.receive_and_acknowledge()
    }

    /// Receive a patch as JSON text and acknowledge it.
    pub fn get_object_model_patch(&mut self) -> Result<String, ConnectionError> {
        self.receive_and_acknowledge()
    }

    fn receive_and_acknowledge(&mut self) -> Result<String, ConnectionError> {
        self.base.require_active("receive an update")?;
        let text = self.base.receive_json()?;
        self.base.send(&Command::acknowledge())?;
        self.received_full = true;
        debug!(bytes = text.len(), "object model update acknowledged");
        Ok(text)
    }
}
