//! Handshake messages exchanged before a connection becomes active.

use std::fmt;

use dsfapi_core::CodeChannel;
use serde::{Deserialize, Serialize};

use crate::config::{InterceptOptions, InterceptionMode, SubscribeOptions, SubscriptionMode};

/// API version this client implements; the server must announce at least this.
pub const PROTOCOL_VERSION: u32 = 11;

/// Operating mode requested right after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionMode {
    /// Plain request/response commands.
    Command,
    /// Code interception.
    Intercept,
    /// Object model subscription.
    Subscribe,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionMode::Command => "Command",
            ConnectionMode::Intercept => "Intercept",
            ConnectionMode::Subscribe => "Subscribe",
        })
    }
}

/// Server-assigned session identifier. Older servers send a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionId {
    /// Numeric ID.
    Number(i64),
    /// Textual ID.
    Text(String),
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionId::Number(n) => write!(f, "{n}"),
            SessionId::Text(s) => f.write_str(s),
        }
    }
}

/// First message on every connection, sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInitMessage {
    /// Server API version.
    pub version: u32,
    /// Session identifier.
    pub id: SessionId,
}

/// Mode selection, the client's first message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode")]
pub enum ClientInitMessage {
    /// Enter command mode.
    Command {
        /// Client API version.
        version: u32,
    },
    /// Enter interception mode.
    #[serde(rename_all = "PascalCase")]
    Intercept {
        /// Client API version.
        #[serde(rename = "version")]
        version: u32,
        /// Interception stage.
        interception_mode: InterceptionMode,
        /// Channels to intercept.
        channels: Vec<CodeChannel>,
        /// Code filters.
        filters: Option<Vec<String>>,
        /// Intercept prioritized codes too.
        priority_codes: bool,
    },
    /// Enter subscription mode.
    #[serde(rename_all = "PascalCase")]
    Subscribe {
        /// Client API version.
        #[serde(rename = "version")]
        version: u32,
        /// Full or patch updates.
        subscription_mode: SubscriptionMode,
        /// Single path filter.
        filter: String,
        /// Multiple path filters.
        filters: Option<Vec<String>>,
    },
}

impl ClientInitMessage {
    /// Command mode at [`PROTOCOL_VERSION`].
    pub fn command() -> Self {
        ClientInitMessage::Command {
            version: PROTOCOL_VERSION,
        }
    }

    /// Interception mode at [`PROTOCOL_VERSION`].
    pub fn intercept(options: &InterceptOptions) -> Self {
        ClientInitMessage::Intercept {
            version: PROTOCOL_VERSION,
            interception_mode: options.mode,
            channels: options.channels.clone(),
            filters: options.filters.clone(),
            priority_codes: options.priority_codes,
        }
    }

    /// Subscription mode at [`PROTOCOL_VERSION`].
    pub fn subscribe(options: &SubscribeOptions) -> Self {
        ClientInitMessage::Subscribe {
            version: PROTOCOL_VERSION,
            subscription_mode: options.mode,
            filter: options.filter.clone(),
            filters: options.filters.clone(),
        }
    }

    /// Mode this message requests.
    pub fn mode(&self) -> ConnectionMode {
        match self {
            ClientInitMessage::Command { .. } => ConnectionMode::Command,
            ClientInitMessage::Intercept { .. } => ConnectionMode::Intercept,
            ClientInitMessage::Subscribe { .. } => ConnectionMode::Subscribe,
        }
    }
}
