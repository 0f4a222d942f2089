//! Typed command helpers available on command and interception connections.

use std::path::PathBuf;

use dsfapi_core::{Code, CodeChannel, CodeResult, MessageType};

use crate::ConnectionError;
use crate::command::Command;
use crate::response::decode_result;
use crate::types::{AccessLevel, HttpEndpointType, LogLevel, SessionType};

/// Request/response commands. All transports in command-capable modes
/// implement this.
///
/// Only [`perform_command`](CommandSession::perform_command) and
/// [`perform_command_raw`](CommandSession::perform_command_raw) are
/// required; every other method wraps one command and decodes its result.
pub trait CommandSession {
    /// Send a command and return its result member.
    fn perform_command(
        &mut self,
        command: &Command,
    ) -> Result<Option<serde_json::Value>, ConnectionError>;

    /// Send a command and return the whole reply as JSON text.
    fn perform_command_raw(&mut self, command: &Command) -> Result<String, ConnectionError>;

    // ── Codes ───────────────────────────────────────────────────────────

    /// Run a code given as text and return its output.
    fn perform_simple_code(
        &mut self,
        code: &str,
        channel: CodeChannel,
    ) -> Result<String, ConnectionError> {
        let result = self.perform_command(&Command::simple_code(code, channel))?;
        Ok(decode_result::<Option<String>>(result)?.unwrap_or_default())
    }

    /// Run a pre-parsed code and return its result messages.
    fn perform_code(&mut self, code: Code) -> Result<CodeResult, ConnectionError> {
        let result = self.perform_command(&Command::code(code))?;
        decode_result(result)
    }

    /// Wait for every pending code on `channel` to finish.
    ///
    /// `false` means the codes could not be flushed; cancelling the current
    /// code is usually the right reaction.
    fn flush(&mut self, channel: CodeChannel) -> Result<bool, ConnectionError> {
        let result = self.perform_command(&Command::flush(channel))?;
        Ok(decode_result::<Option<bool>>(result)?.unwrap_or(false))
    }

    /// Evaluate a firmware expression.
    fn evaluate_expression(
        &mut self,
        channel: CodeChannel,
        expression: &str,
    ) -> Result<serde_json::Value, ConnectionError> {
        let result = self.perform_command(&Command::evaluate_expression(channel, expression))?;
        Ok(result.unwrap_or_default())
    }

    // ── Object model ────────────────────────────────────────────────────

    /// Fetch the object model.
    fn get_object_model(&mut self) -> Result<serde_json::Value, ConnectionError> {
        let result = self.perform_command(&Command::get_object_model())?;
        Ok(result.unwrap_or_default())
    }

    /// Fetch the object model reply without decoding it.
    fn get_serialized_object_model(&mut self) -> Result<String, ConnectionError> {
        self.perform_command_raw(&Command::get_object_model())
    }

    /// Wait until the object model is up to date with the firmware.
    fn sync_object_model(&mut self) -> Result<(), ConnectionError> {
        self.perform_command(&Command::sync_object_model())?;
        Ok(())
    }

    /// Lock the object model for writing. Pair with
    /// [`unlock_object_model`](CommandSession::unlock_object_model).
    fn lock_object_model(&mut self) -> Result<(), ConnectionError> {
        self.perform_command(&Command::lock_object_model())?;
        Ok(())
    }

    /// Release the object model lock.
    fn unlock_object_model(&mut self) -> Result<(), ConnectionError> {
        self.perform_command(&Command::unlock_object_model())?;
        Ok(())
    }

    /// Set one property. The model should be locked first.
    fn set_object_model(&mut self, property_path: &str, value: &str) -> Result<bool, ConnectionError> {
        let result = self.perform_command(&Command::set_object_model(property_path, value))?;
        Ok(decode_result::<Option<bool>>(result)?.unwrap_or(false))
    }

    /// Apply a patch to one top-level key.
    fn patch_object_model(&mut self, key: &str, patch: &str) -> Result<(), ConnectionError> {
        self.perform_command(&Command::patch_object_model(key, patch))?;
        Ok(())
    }

    // ── Files ───────────────────────────────────────────────────────────

    /// Resolve a firmware path such as `0:/sys/config.g`.
    fn resolve_path(&mut self, path: &str) -> Result<String, ConnectionError> {
        let result = self.perform_command(&Command::resolve_path(path))?;
        Ok(decode_result::<Option<String>>(result)?.unwrap_or_default())
    }

    /// Parse a job file and return its metadata.
    fn get_file_info(&mut self, file_name: &str) -> Result<serde_json::Value, ConnectionError> {
        let result = self.perform_command(&Command::get_file_info(file_name))?;
        Ok(result.unwrap_or_default())
    }

    // ── HTTP endpoints ──────────────────────────────────────────────────

    /// Register `/machine/{namespace}/{path}` and return the socket path
    /// the web server will connect to.
    fn add_http_endpoint(
        &mut self,
        endpoint_type: HttpEndpointType,
        namespace: &str,
        path: &str,
        is_upload_request: bool,
    ) -> Result<PathBuf, ConnectionError> {
        let command = Command::add_http_endpoint(endpoint_type, namespace, path, is_upload_request);
        let result = self.perform_command(&command)?;
        decode_result::<String>(result).map(PathBuf::from)
    }

    /// Unregister an endpoint.
    fn remove_http_endpoint(
        &mut self,
        endpoint_type: HttpEndpointType,
        namespace: &str,
        path: &str,
    ) -> Result<bool, ConnectionError> {
        let result =
            self.perform_command(&Command::remove_http_endpoint(endpoint_type, namespace, path))?;
        Ok(decode_result::<Option<bool>>(result)?.unwrap_or(false))
    }

    // ── User sessions ───────────────────────────────────────────────────

    /// Register a user session and return its ID. `origin_port` defaults to
    /// this process's ID.
    fn add_user_session(
        &mut self,
        access_level: AccessLevel,
        session_type: SessionType,
        origin: &str,
        origin_port: Option<i64>,
    ) -> Result<i64, ConnectionError> {
        let port = origin_port.unwrap_or_else(|| i64::from(std::process::id()));
        let result = self.perform_command(&Command::add_user_session(
            access_level,
            session_type,
            origin,
            port,
        ))?;
        decode_result(result)
    }

    /// Remove a user session.
    fn remove_user_session(&mut self, id: i64) -> Result<bool, ConnectionError> {
        let result = self.perform_command(&Command::remove_user_session(id))?;
        Ok(decode_result::<Option<bool>>(result)?.unwrap_or(false))
    }

    /// Check a password against the one set by `M551`.
    fn check_password(&mut self, password: &str) -> Result<bool, ConnectionError> {
        let result = self.perform_command(&Command::check_password(password))?;
        Ok(decode_result::<Option<bool>>(result)?.unwrap_or(false))
    }

    // ── Messages and status ─────────────────────────────────────────────

    /// Write a generic message.
    fn write_message(
        &mut self,
        message_type: MessageType,
        content: &str,
        output_message: bool,
        log_level: Option<LogLevel>,
    ) -> Result<(), ConnectionError> {
        self.perform_command(&Command::write_message(
            message_type,
            content,
            output_message,
            log_level,
        ))?;
        Ok(())
    }

    /// Report (or stop reporting) a software update in progress.
    fn set_update_status(&mut self, updating: bool) -> Result<(), ConnectionError> {
        self.perform_command(&Command::set_update_status(updating))?;
        Ok(())
    }

    // ── Plugins ─────────────────────────────────────────────────────────

    /// Install or upgrade a plugin package.
    fn install_plugin(&mut self, plugin_file: &str) -> Result<(), ConnectionError> {
        self.perform_command(&Command::install_plugin(plugin_file))?;
        Ok(())
    }

    /// Start a plugin.
    fn start_plugin(&mut self, plugin: &str) -> Result<(), ConnectionError> {
        self.perform_command(&Command::start_plugin(plugin))?;
        Ok(())
    }

    /// Stop a plugin.
    fn stop_plugin(&mut self, plugin: &str) -> Result<(), ConnectionError> {
        self.perform_command(&Command::stop_plugin(plugin))?;
        Ok(())
    }

    /// Uninstall a plugin.
    fn uninstall_plugin(&mut self, plugin: &str) -> Result<(), ConnectionError> {
        self.perform_command(&Command::uninstall_plugin(plugin))?;
        Ok(())
    }

    /// Set custom data of a plugin.
    fn set_plugin_data(&mut self, plugin: &str, key: &str, value: &str) -> Result<(), ConnectionError> {
        self.perform_command(&Command::set_plugin_data(plugin, key, value))?;
        Ok(())
    }

    /// Start every enabled plugin.
    fn start_plugins(&mut self) -> Result<(), ConnectionError> {
        self.perform_command(&Command::start_plugins())?;
        Ok(())
    }

    /// Stop every running plugin.
    fn stop_plugins(&mut self) -> Result<(), ConnectionError> {
        self.perform_command(&Command::stop_plugins())?;
        Ok(())
    }
}
