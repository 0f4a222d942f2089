//! Enumerations and payloads shared by command and endpoint messages.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// HTTP method (or WebSocket) served by a custom endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpEndpointType {
    /// `GET`
    #[serde(rename = "GET", alias = "get")]
    Get,
    /// `POST`
    #[serde(rename = "POST", alias = "post")]
    Post,
    /// `PUT`
    #[serde(rename = "PUT", alias = "put")]
    Put,
    /// `PATCH`
    #[serde(rename = "PATCH", alias = "patch")]
    Patch,
    /// `TRACE`
    #[serde(rename = "TRACE", alias = "trace")]
    Trace,
    /// `DELETE`
    #[serde(rename = "DELETE", alias = "delete")]
    Delete,
    /// `OPTIONS`
    #[serde(rename = "OPTIONS", alias = "options")]
    Options,
    /// WebSocket; the connection stays open after a response.
    #[serde(rename = "WebSocket", alias = "websocket")]
    WebSocket,
}

impl HttpEndpointType {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpEndpointType::Get => "GET",
            HttpEndpointType::Post => "POST",
            HttpEndpointType::Put => "PUT",
            HttpEndpointType::Patch => "PATCH",
            HttpEndpointType::Trace => "TRACE",
            HttpEndpointType::Delete => "DELETE",
            HttpEndpointType::Options => "OPTIONS",
            HttpEndpointType::WebSocket => "WebSocket",
        }
    }
}

impl fmt::Display for HttpEndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown endpoint type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown HTTP endpoint type: {0}")]
pub struct UnknownEndpointType(pub String);

impl FromStr for HttpEndpointType {
    type Err = UnknownEndpointType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "GET" => HttpEndpointType::Get,
            "POST" => HttpEndpointType::Post,
            "PUT" => HttpEndpointType::Put,
            "PATCH" => HttpEndpointType::Patch,
            "TRACE" => HttpEndpointType::Trace,
            "DELETE" => HttpEndpointType::Delete,
            "OPTIONS" => HttpEndpointType::Options,
            "WEBSOCKET" => HttpEndpointType::WebSocket,
            _ => return Err(UnknownEndpointType(s.to_string())),
        })
    }
}

/// How the web server interprets [`SendHttpResponse::response`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpResponseType {
    /// Status code only; the body is ignored.
    #[default]
    #[serde(alias = "statuscode")]
    StatusCode,
    /// `text/plain` body.
    #[serde(alias = "plaintext")]
    PlainText,
    /// `application/json` body.
    #[serde(rename = "JSON", alias = "json")]
    Json,
    /// The body is a path to a file to send.
    #[serde(alias = "file")]
    File,
}

/// Access granted to a user session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    /// Read-only access.
    ReadOnly,
    /// Full access.
    ReadWrite,
}

/// Origin of a user session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    /// Local client.
    Local,
    /// Remote HTTP client.
    #[serde(rename = "HTTP")]
    Http,
    /// Remote Telnet client.
    Telnet,
}

/// Log level attached to a generic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Log everything.
    Debug,
    /// Informational messages and above.
    Info,
    /// Warnings and errors.
    Warn,
    /// Do not log.
    Off,
}

/// A request forwarded from the web server to a custom endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReceivedHttpRequest {
    /// User session of the requester.
    pub session_id: i64,
    /// Query string arguments.
    pub queries: HashMap<String, String>,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Body content type.
    pub content_type: Option<String>,
    /// Request body.
    pub body: String,
}

/// Reply to a [`ReceivedHttpRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendHttpResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Body, or a file path for [`HttpResponseType::File`].
    pub response: String,
    /// Body interpretation.
    pub response_type: HttpResponseType,
}
