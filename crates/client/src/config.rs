//! Configuration types for control server connections.

use std::path::PathBuf;

use dsfapi_core::CodeChannel;
use serde::{Deserialize, Serialize};

/// Default location of the control server socket.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/dsf/dcs.sock";

/// Default cap on a single incoming message (32 MiB). A full object model
/// dump is a few hundred kilobytes; this only guards against a runaway peer.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 32 * 1024 * 1024;

/// Transport settings shared by every connection mode.
///
/// Reads block until the server answers or the socket is closed; there are
/// no timeout or retry settings.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Path of the control server's Unix socket.
    pub socket_path: PathBuf,
    /// Largest accepted incoming message in bytes.
    pub max_message_size: usize,
    /// Log every raw JSON message sent and received at `trace` level.
    pub trace_io: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            trace_io: false,
        }
    }
}

impl ConnectionConfig {
    /// Default settings for a socket at `path`.
    pub fn with_socket_path(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: path.into(),
            ..Self::default()
        }
    }
}

/// When an interceptor sees codes relative to their execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterceptionMode {
    /// Before the code is processed internally.
    #[default]
    Pre,
    /// After internal processing, before the firmware runs it.
    Post,
    /// After the firmware has executed it.
    Executed,
}

/// Settings for an interception connection.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct InterceptOptions {
    /// Interception stage.
    pub mode: InterceptionMode,
    /// Channels to intercept.
    pub channels: Vec<CodeChannel>,
    /// Code filters (e.g. `M1234`); `None` intercepts everything.
    pub filters: Option<Vec<String>>,
    /// Also intercept prioritized codes.
    pub priority_codes: bool,
}

impl Default for InterceptOptions {
    fn default() -> Self {
        Self {
            mode: InterceptionMode::Pre,
            channels: CodeChannel::ALL.to_vec(),
            filters: None,
            priority_codes: false,
        }
    }
}

impl InterceptOptions {
    /// Default settings for the given stage.
    pub fn new(mode: InterceptionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// How object model updates are delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionMode {
    /// A complete model on every update.
    Full,
    /// The full model once, then only what changed.
    #[default]
    Patch,
}

/// Settings for a subscription connection.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Delivery mode.
    pub mode: SubscriptionMode,
    /// Single path filter (`""` for everything).
    pub filter: String,
    /// Multiple path filters.
    pub filters: Option<Vec<String>>,
}

impl SubscribeOptions {
    /// Default settings for the given mode.
    pub fn new(mode: SubscriptionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// What [`HttpEndpointSocket::close`](crate::HttpEndpointSocket::close) does
/// with requests that are still being handled.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Wait for in-flight handlers to finish.
    #[default]
    Drain,
    /// Cancel in-flight handlers.
    Abort,
}

/// Settings for an HTTP endpoint bridge.
#[cfg(feature = "http")]
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct HttpEndpointOptions {
    /// Handling of in-flight requests on close.
    pub shutdown: ShutdownPolicy,
    /// Log every raw JSON message at `trace` level.
    pub trace_io: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.socket_path, PathBuf::from("/var/run/dsf/dcs.sock"));
        assert_eq!(config.max_message_size, 32 * 1024 * 1024);
        assert!(!config.trace_io);

        let intercept = InterceptOptions::default();
        assert_eq!(intercept.mode, InterceptionMode::Pre);
        assert_eq!(intercept.channels.len(), 13);
        assert_eq!(intercept.channels[0], CodeChannel::Http);
        assert!(intercept.filters.is_none());

        let subscribe = SubscribeOptions::default();
        assert_eq!(subscribe.mode, SubscriptionMode::Patch);
        assert_eq!(subscribe.filter, "");
    }
}
