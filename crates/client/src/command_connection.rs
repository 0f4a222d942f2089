//! Command mode: one request, one reply.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use crate::command::Command;
use crate::config::ConnectionConfig;
use crate::connection::{BaseConnection, ConnectionState, Session};
use crate::init::ClientInitMessage;
use crate::session::CommandSession;
use crate::ConnectionError;

/// A connection in command mode.
///
/// All typed operations come from [`CommandSession`]. Requests are strictly
/// sequential; each call blocks until the server replies.
#[derive(Debug)]
pub struct CommandConnection<S = UnixStream> {
    base: BaseConnection<S>,
}

impl CommandConnection<UnixStream> {
    /// Connect to the control server socket and enter command mode.
    pub fn connect(config: ConnectionConfig) -> Result<Self, ConnectionError> {
        let mut base = BaseConnection::new(config);
        base.connect(&ClientInitMessage::command())?;
        Ok(Self { base })
    }
}

impl<S: Read + Write> CommandConnection<S> {
    /// Enter command mode over an already open transport.
    pub fn from_stream(stream: S, config: ConnectionConfig) -> Result<Self, ConnectionError> {
        let mut base = BaseConnection::new(config);
        base.open(stream, &ClientInitMessage::command())?;
        Ok(Self { base })
    }

    /// Handshake outcome.
    pub fn session(&self) -> Option<&Session> {
        self.base.session()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.base.state()
    }

    /// Release the transport. Idempotent.
    pub fn close(&mut self) {
        self.base.close();
    }
}

impl<S: Read + Write> CommandSession for CommandConnection<S> {
    fn perform_command(
        &mut self,
        command: &Command,
    ) -> Result<Option<serde_json::Value>, ConnectionError> {
        self.base.perform_command(command)
    }

    fn perform_command_raw(&mut self, command: &Command) -> Result<String, ConnectionError> {
        self.base.perform_command_raw(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedStream, sent_lines};
    use dsfapi_core::CodeChannel;

    #[test]
    fn sequential_commands() {
        let (stream, written) = ScriptedStream::new(&[
            r#"{"version":11,"id":"foobar"}"#,
            r#"{"success":true}"#,
            r#"{"result":"ok","success":true}"#,
            r#"{"result":"/opt/dsf/sd/sys/config.g","success":true}"#,
        ]);
        let mut conn = CommandConnection::from_stream(stream, ConnectionConfig::default()).unwrap();
        assert_eq!(conn.perform_simple_code("M115", CodeChannel::Sbc).unwrap(), "ok");
        assert_eq!(
            conn.resolve_path("0:/sys/config.g").unwrap(),
            "/opt/dsf/sd/sys/config.g"
        );
        assert_eq!(
            sent_lines(&written),
            [
                r#"{"mode":"Command","version":11}"#,
                r#"{"command":"SimpleCode","Code":"M115","Channel":"SBC"}"#,
                r#"{"command":"ResolvePath","Path":"0:/sys/config.g"}"#,
            ]
        );
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }
}
