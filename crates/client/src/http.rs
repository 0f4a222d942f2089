//! Bridge for custom HTTP endpoints.
//!
//! After [`add_http_endpoint`](crate::CommandSession::add_http_endpoint)
//! registers `/machine/{namespace}/{path}`, the web server forwards every
//! matching request over a Unix socket at the returned path.
//! [`HttpEndpointSocket`] listens there and runs one task per accepted
//! connection on the tokio runtime.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, trace, warn};

use crate::ConnectionError;
use crate::config::{DEFAULT_MAX_MESSAGE_SIZE, HttpEndpointOptions, ShutdownPolicy};
use crate::frame::FrameDecoder;
use crate::types::{HttpEndpointType, HttpResponseType, ReceivedHttpRequest, SendHttpResponse};

/// Status and body sent when no handler is registered.
pub const NO_HANDLER_STATUS: u16 = 500;
const NO_HANDLER_BODY: &str = "No event handler registered";

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type Handler = Arc<dyn Fn(HttpEndpointConnection) -> BoxFuture + Send + Sync>;

// ── Connection ──────────────────────────────────────────────────────────

/// One forwarded request (or WebSocket session).
pub struct HttpEndpointConnection {
    stream: Option<UnixStream>,
    decoder: FrameDecoder,
    is_websocket: bool,
    trace_io: bool,
}

impl std::fmt::Debug for HttpEndpointConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEndpointConnection")
            .field("open", &self.stream.is_some())
            .field("is_websocket", &self.is_websocket)
            .finish_non_exhaustive()
    }
}

impl HttpEndpointConnection {
    fn new(stream: UnixStream, is_websocket: bool, trace_io: bool) -> Self {
        Self {
            stream: Some(stream),
            decoder: FrameDecoder::new(DEFAULT_MAX_MESSAGE_SIZE),
            is_websocket,
            trace_io,
        }
    }

    /// Whether the endpoint is a WebSocket.
    pub fn is_websocket(&self) -> bool {
        self.is_websocket
    }

    /// Whether the connection is still open.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Read the forwarded request.
    pub async fn read_request(&mut self) -> Result<ReceivedHttpRequest, ConnectionError> {
        self.receive().await
    }

    /// Send the reply. Closes the connection unless it is a WebSocket.
    pub async fn send_response(
        &mut self,
        status_code: u16,
        response: impl Into<String>,
        response_type: HttpResponseType,
    ) -> Result<(), ConnectionError> {
        let reply = SendHttpResponse {
            status_code,
            response: response.into(),
            response_type,
        };
        let result = self.send(&reply).await;
        if !self.is_websocket {
            self.close();
        }
        result
    }

    /// Read the next message and deserialize it.
    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<T, ConnectionError> {
        let text = self.receive_json().await?;
        serde_json::from_str(&text).map_err(ConnectionError::Deserialization)
    }

    /// Read the next message as JSON text.
    pub async fn receive_json(&mut self) -> Result<String, ConnectionError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::ConnectionClosed)?;
        let mut buf = [0u8; 8192];
        let bytes = loop {
            if let Some(frame) = self.decoder.next_frame()? {
                break frame;
            }
            let n = stream.read(&mut buf).await.map_err(ConnectionError::ReadFailed)?;
            if n == 0 {
                return Err(ConnectionError::ConnectionClosed);
            }
            self.decoder.push(&buf[..n]);
        };
        let text = String::from_utf8(bytes).map_err(|e| ConnectionError::MalformedMessage {
            details: format!("message is not UTF-8: {e}"),
        })?;
        if self.trace_io {
            trace!(json = %text, "endpoint recv");
        }
        Ok(text)
    }

    /// Serialize and send any message.
    pub async fn send<T: Serialize + ?Sized>(&mut self, msg: &T) -> Result<(), ConnectionError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::ConnectionClosed)?;
        let mut json = serde_json::to_vec(msg).map_err(ConnectionError::Serialization)?;
        if self.trace_io {
            trace!(json = %String::from_utf8_lossy(&json), "endpoint send");
        }
        json.push(b'\n');
        stream
            .write_all(&json)
            .await
            .map_err(ConnectionError::WriteFailed)?;
        stream.flush().await.map_err(ConnectionError::WriteFailed)
    }

    /// Close the connection. Idempotent.
    pub fn close(&mut self) {
        self.stream = None;
    }
}

// ── Listener ────────────────────────────────────────────────────────────

/// Listener for one registered endpoint.
///
/// Must be created inside a tokio runtime. Dropping it without calling
/// [`close`](HttpEndpointSocket::close) aborts everything and removes the
/// socket file.
pub struct HttpEndpointSocket {
    endpoint_type: HttpEndpointType,
    namespace: String,
    path: String,
    socket_path: PathBuf,
    handler: watch::Sender<Option<Handler>>,
    shutdown: Option<oneshot::Sender<()>>,
    accept_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for HttpEndpointSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEndpointSocket")
            .field("endpoint_type", &self.endpoint_type)
            .field("namespace", &self.namespace)
            .field("path", &self.path)
            .field("socket_path", &self.socket_path)
            .finish_non_exhaustive()
    }
}

impl HttpEndpointSocket {
    /// Listen on `socket_path`, replacing a stale socket file.
    pub async fn bind(
        endpoint_type: HttpEndpointType,
        namespace: impl Into<String>,
        path: impl Into<String>,
        socket_path: impl Into<PathBuf>,
        options: HttpEndpointOptions,
    ) -> Result<Self, ConnectionError> {
        let socket_path = socket_path.into();
        remove_socket_file(&socket_path)
            .await
            .map_err(|source| ConnectionError::ConnectionFailed {
                path: socket_path.clone(),
                source,
            })?;
        let listener =
            UnixListener::bind(&socket_path).map_err(|source| ConnectionError::ConnectionFailed {
                path: socket_path.clone(),
                source,
            })?;

        let (handler, handler_rx) = watch::channel(None);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let is_websocket = endpoint_type == HttpEndpointType::WebSocket;
        let accept_task = tokio::spawn(accept_loop(
            listener,
            handler_rx,
            shutdown_rx,
            is_websocket,
            options,
        ));

        let namespace = namespace.into();
        let path = path.into();
        debug!(
            endpoint = %endpoint_type,
            namespace = %namespace,
            path = %path,
            socket = %socket_path.display(),
            "HTTP endpoint listening"
        );
        Ok(Self {
            endpoint_type,
            namespace,
            path,
            socket_path,
            handler,
            shutdown: Some(shutdown),
            accept_task: Some(accept_task),
        })
    }

    /// Install (or replace) the request handler.
    ///
    /// The handler owns the connection it is given; connections accepted
    /// before this call keep the handler that was current at the time.
    pub fn set_endpoint_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(HttpEndpointConnection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |conn| Box::pin(handler(conn)) as BoxFuture);
        self.handler.send_replace(Some(handler));
    }

    /// Endpoint method.
    pub fn endpoint_type(&self) -> HttpEndpointType {
        self.endpoint_type
    }

    /// Endpoint namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Endpoint path below the namespace.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Socket file being listened on.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Stop accepting, settle in-flight handlers per the configured
    /// [`ShutdownPolicy`] and remove the socket file.
    pub async fn close(mut self) -> Result<(), ConnectionError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.accept_task.take()
            && let Err(err) = task.await
            && err.is_panic()
        {
            warn!("HTTP endpoint listener panicked");
        }
        remove_socket_file(&self.socket_path)
            .await
            .map_err(|source| ConnectionError::ConnectionFailed {
                path: self.socket_path.clone(),
                source,
            })?;
        debug!(socket = %self.socket_path.display(), "HTTP endpoint closed");
        Ok(())
    }
}

impl Drop for HttpEndpointSocket {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

async fn remove_socket_file(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

async fn accept_loop(
    listener: UnixListener,
    handler: watch::Receiver<Option<Handler>>,
    mut shutdown: oneshot::Receiver<()>,
    is_websocket: bool,
    options: HttpEndpointOptions,
) {
    let mut tasks = JoinSet::new();
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(err) = joined
                    && err.is_panic()
                {
                    warn!("HTTP endpoint handler panicked");
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let conn = HttpEndpointConnection::new(stream, is_websocket, options.trace_io);
                    let current = handler.borrow().clone();
                    tasks.spawn(async move {
                        match current {
                            Some(handler) => handler(conn).await,
                            None => reply_unhandled(conn).await,
                        }
                    });
                }
                Err(err) => {
                    warn!(error = %err, "HTTP endpoint accept failed");
                    break;
                }
            }
        }
    }
    drop(listener);

    match options.shutdown {
        ShutdownPolicy::Drain => while tasks.join_next().await.is_some() {},
        ShutdownPolicy::Abort => tasks.shutdown().await,
    }
}

async fn reply_unhandled(mut conn: HttpEndpointConnection) {
    warn!("HTTP endpoint request without a registered handler");
    if let Err(err) = conn
        .send_response(NO_HANDLER_STATUS, NO_HANDLER_BODY, HttpResponseType::StatusCode)
        .await
    {
        debug!(error = %err, "failed to send default response");
    }
    conn.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};

    async fn request(socket: &Path, body: &str) -> String {
        let mut stream = UnixStream::connect(socket).await.unwrap();
        let req = serde_json::json!({
            "sessionId": 1,
            "queries": {"name": "dsf"},
            "headers": {},
            "contentType": "text/plain",
            "body": body,
        });
        // The server may answer and hang up before reading the request.
        let _ = stream
            .write_all(serde_json::to_string(&req).unwrap().as_bytes())
            .await;
        let mut reply = String::new();
        BufReader::new(stream).read_line(&mut reply).await.unwrap();
        reply
    }

    #[tokio::test]
    async fn handler_answers_request() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("getIt-GET.sock");
        let socket = HttpEndpointSocket::bind(
            HttpEndpointType::Get,
            "custom",
            "getIt",
            &socket_path,
            HttpEndpointOptions::default(),
        )
        .await
        .unwrap();
        socket.set_endpoint_handler(|mut conn| async move {
            let req = conn.read_request().await.unwrap();
            let body = format!("hello {}", req.queries["name"]);
            conn.send_response(200, body, HttpResponseType::PlainText)
                .await
                .unwrap();
            assert!(!conn.is_open());
        });

        let reply = request(&socket_path, "").await;
        let reply: SendHttpResponse = serde_json::from_str(reply.trim()).unwrap();
        assert_eq!(reply.status_code, 200);
        assert_eq!(reply.response, "hello dsf");
        assert_eq!(reply.response_type, HttpResponseType::PlainText);

        socket.close().await.unwrap();
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn missing_handler_gets_500() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("ep.sock");
        let socket = HttpEndpointSocket::bind(
            HttpEndpointType::Post,
            "custom",
            "postIt",
            &socket_path,
            HttpEndpointOptions::default(),
        )
        .await
        .unwrap();

        let reply = request(&socket_path, "{}").await;
        let reply: SendHttpResponse = serde_json::from_str(reply.trim()).unwrap();
        assert_eq!(reply.status_code, 500);
        assert_eq!(reply.response, "No event handler registered");
        socket.close().await.unwrap();
    }

    #[tokio::test]
    async fn stale_socket_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("stale.sock");
        std::fs::write(&socket_path, b"").unwrap();
        let socket = HttpEndpointSocket::bind(
            HttpEndpointType::Get,
            "custom",
            "stale",
            &socket_path,
            HttpEndpointOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(socket.socket_path(), socket_path.as_path());
        drop(socket);
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn drain_waits_for_in_flight_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("slow.sock");
        let socket = HttpEndpointSocket::bind(
            HttpEndpointType::Get,
            "custom",
            "slow",
            &socket_path,
            HttpEndpointOptions::default(),
        )
        .await
        .unwrap();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let started_tx = std::sync::Mutex::new(Some(started_tx));
        socket.set_endpoint_handler(move |mut conn| {
            let started = started_tx.lock().unwrap().take();
            async move {
                conn.read_request().await.unwrap();
                if let Some(started) = started {
                    let _ = started.send(());
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                conn.send_response(204, "", HttpResponseType::StatusCode)
                    .await
                    .unwrap();
            }
        });

        let client = tokio::spawn({
            let socket_path = socket_path.clone();
            async move { request(&socket_path, "").await }
        });
        started_rx.await.unwrap();
        socket.close().await.unwrap();

        let reply: SendHttpResponse = serde_json::from_str(client.await.unwrap().trim()).unwrap();
        assert_eq!(reply.status_code, 204);
    }
    #[tokio::test]
    async fn websocket_stays_open_after_response() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("ws.sock");
        let socket = HttpEndpointSocket::bind(
            HttpEndpointType::WebSocket,
            "custom",
            "ws",
            &socket_path,
            HttpEndpointOptions::default(),
        )
        .await
        .unwrap();
        socket.set_endpoint_handler(|mut conn| async move {
            assert!(conn.is_websocket());
            conn.read_request().await.unwrap();
            conn.send_response(200, "welcome", HttpResponseType::PlainText)
                .await
                .unwrap();
            assert!(conn.is_open());
            let msg: serde_json::Value = conn.receive().await.unwrap();
            conn.send(&serde_json::json!({ "echo": msg["ping"] }))
                .await
                .unwrap();
            conn.close();
        });

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        write_half
            .write_all(br#"{"sessionId":1,"queries":{},"headers":{},"body":""}"#)
            .await
            .unwrap();
        let first: SendHttpResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first.response, "welcome");

        write_half.write_all(br#"{"ping":7}"#).await.unwrap();
        let second: serde_json::Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(second["echo"], 7);

        socket.close().await.unwrap();
    }

    #[tokio::test]
    async fn abort_cancels_in_flight_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("stuck.sock");
        let options = HttpEndpointOptions {
            shutdown: ShutdownPolicy::Abort,
            ..HttpEndpointOptions::default()
        };
        let socket = HttpEndpointSocket::bind(
            HttpEndpointType::Get,
            "custom",
            "stuck",
            &socket_path,
            options,
        )
        .await
        .unwrap();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (dropped_tx, dropped_rx) = oneshot::channel::<()>();
        let handles = std::sync::Mutex::new(Some((started_tx, dropped_tx)));
        socket.set_endpoint_handler(move |mut conn| {
            let handles = handles.lock().unwrap().take();
            async move {
                conn.read_request().await.unwrap();
                let Some((started, _dropped)) = handles else {
                    return;
                };
                let _ = started.send(());
                // never answers; only abort ends this task
                std::future::pending::<()>().await;
            }
        });

        let client = tokio::spawn({
            let socket_path = socket_path.clone();
            async move { request(&socket_path, "").await }
        });
        started_rx.await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), socket.close())
            .await
            .expect("close must not wait for a stuck handler")
            .unwrap();

        // the handler task was dropped along with its sender
        assert!(dropped_rx.await.is_err());
        assert_eq!(client.await.unwrap(), "");
        assert!(!socket_path.exists());
    }
}
