//! Duet Software Framework control server client.
//!
//! Talks to the control server over its Unix socket in one of three modes:
//! [`CommandConnection`] (request/reply), [`InterceptConnection`] (decide
//! the fate of codes before they run) and [`SubscribeConnection`] (object
//! model updates). The connection API is synchronous (`std::os::unix`);
//! only the HTTP endpoint bridge (feature `http`) needs a tokio runtime.
mod command;
mod command_connection;
mod config;
mod connection;
mod error;
mod frame;
#[cfg(feature = "http")]
mod http;
mod init;
mod intercept;
mod response;
mod session;
mod subscribe;
mod types;

#[cfg(test)]
mod test_support;

pub use command::Command;
pub use command_connection::CommandConnection;
#[cfg(feature = "http")]
pub use config::{HttpEndpointOptions, ShutdownPolicy};
pub use config::{
    ConnectionConfig, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_SOCKET_PATH, InterceptOptions,
    InterceptionMode, SubscribeOptions, SubscriptionMode,
};
pub use connection::{BaseConnection, ConnectionState, Session};
pub use error::ConnectionError;
pub use frame::{FrameDecoder, read_message, write_message};
#[cfg(feature = "http")]
pub use http::{HttpEndpointConnection, HttpEndpointSocket, NO_HANDLER_STATUS};
pub use init::{ClientInitMessage, ConnectionMode, PROTOCOL_VERSION, ServerInitMessage, SessionId};
pub use intercept::{InterceptConnection, InterceptDecision};
pub use response::{BaseResponse, TASK_CANCELED};
pub use session::CommandSession;
pub use subscribe::{SubscribeConnection, Update};
pub use types::{
    AccessLevel, HttpEndpointType, HttpResponseType, LogLevel, ReceivedHttpRequest,
    SendHttpResponse, SessionType, UnknownEndpointType,
};

pub use dsfapi_core;
