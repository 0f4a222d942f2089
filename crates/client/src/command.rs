//! Command payloads sent to the control server.
//!
//! Every command is a variant of the closed [`Command`] enum and is built by
//! a factory function returning a fresh value. On the wire each one is a
//! single JSON object whose `command` member names the variant, followed by
//! the variant's PascalCase fields.

use dsfapi_core::{Code, CodeChannel, MessageType};
use serde::{Deserialize, Serialize};

use crate::types::{AccessLevel, HttpEndpointType, LogLevel, SessionType};

/// A request understood by the control server.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Command {
    // -- Subscription and interception control --
    /// Confirm receipt of an object model update.
    Acknowledge,
    /// Discard the intercepted code.
    Cancel,
    /// Let the intercepted code proceed unmodified.
    Ignore,
    /// Mark the intercepted code as handled.
    #[serde(rename_all = "PascalCase")]
    Resolve {
        /// Severity of the result message.
        #[serde(rename = "Type")]
        message_type: MessageType,
        /// Result message text.
        content: Option<String>,
    },

    // -- Code execution --
    /// Run a code given as text.
    #[serde(rename_all = "PascalCase")]
    SimpleCode {
        /// Code text.
        code: String,
        /// Channel to run it on.
        channel: CodeChannel,
    },
    /// Run a pre-parsed code.
    Code(Box<Code>),
    /// Wait for every pending code on a channel to finish.
    #[serde(rename_all = "PascalCase")]
    Flush {
        /// Channel to flush.
        channel: CodeChannel,
    },
    /// Evaluate a firmware expression.
    #[serde(rename_all = "PascalCase")]
    EvaluateExpression {
        /// Channel to evaluate on.
        channel: CodeChannel,
        /// Expression text.
        expression: String,
    },

    // -- Object model --
    /// Fetch the full object model.
    GetObjectModel,
    /// Wait for the object model to be refreshed from the firmware.
    SyncObjectModel,
    /// Lock the object model for writing.
    LockObjectModel,
    /// Release the object model lock.
    UnlockObjectModel,
    /// Set one atomic property.
    #[serde(rename_all = "PascalCase")]
    SetObjectModel {
        /// Dot-separated property path.
        property_path: String,
        /// New value as text.
        value: String,
    },
    /// Apply a patch to one object model key.
    #[serde(rename_all = "PascalCase")]
    PatchObjectModel {
        /// Top-level key.
        key: String,
        /// JSON patch text.
        patch: String,
    },

    // -- Files --
    /// Resolve a firmware-style path to a real path.
    #[serde(rename_all = "PascalCase")]
    ResolvePath {
        /// Firmware path.
        path: String,
    },
    /// Parse a job file and return its metadata.
    #[serde(rename_all = "PascalCase")]
    GetFileInfo {
        /// File to inspect.
        file_name: String,
    },

    // -- HTTP endpoints --
    /// Register a custom HTTP endpoint.
    #[serde(rename_all = "PascalCase")]
    AddHttpEndpoint {
        /// Method served.
        endpoint_type: HttpEndpointType,
        /// First path segment below `/machine/`.
        namespace: String,
        /// Remaining path.
        path: String,
        /// Whether request bodies are uploaded to a file.
        is_upload_request: bool,
    },
    /// Unregister a custom HTTP endpoint.
    #[serde(rename_all = "PascalCase")]
    RemoveHttpEndpoint {
        /// Method served.
        endpoint_type: HttpEndpointType,
        /// First path segment below `/machine/`.
        namespace: String,
        /// Remaining path.
        path: String,
    },

    // -- User sessions --
    /// Register a user session.
    #[serde(rename_all = "PascalCase")]
    AddUserSession {
        /// Granted access.
        access_level: AccessLevel,
        /// Session origin kind.
        session_type: SessionType,
        /// Origin address.
        origin: String,
        /// Origin port, or the client's process ID for local sessions.
        origin_port: i64,
    },
    /// Remove a user session.
    #[serde(rename_all = "PascalCase")]
    RemoveUserSession {
        /// Session ID.
        id: i64,
    },
    /// Check a password against the one set by `M551`.
    #[serde(rename_all = "PascalCase")]
    CheckPassword {
        /// Password to check.
        password: String,
    },

    // -- Messages and status --
    /// Write a generic message.
    #[serde(rename_all = "PascalCase")]
    WriteMessage {
        /// Severity.
        #[serde(rename = "Type")]
        message_type: MessageType,
        /// Message text.
        content: String,
        /// Show on the console and in the object model.
        output_message: bool,
        /// Log level, if the message should be logged.
        log_level: Option<LogLevel>,
    },
    /// Override the reported status during a software update.
    #[serde(rename_all = "PascalCase")]
    SetUpdateStatus {
        /// Whether an update is in progress.
        updating: bool,
    },

    // -- Plugins --
    /// Install or upgrade a plugin from a package file.
    #[serde(rename_all = "PascalCase")]
    InstallPlugin {
        /// Path of the plugin package.
        plugin_file: String,
    },
    /// Start a plugin.
    #[serde(rename_all = "PascalCase")]
    StartPlugin {
        /// Plugin name.
        plugin: String,
    },
    /// Stop a plugin.
    #[serde(rename_all = "PascalCase")]
    StopPlugin {
        /// Plugin name.
        plugin: String,
    },
    /// Uninstall a plugin.
    #[serde(rename_all = "PascalCase")]
    UninstallPlugin {
        /// Plugin name.
        plugin: String,
    },
    /// Set custom plugin data in the object model.
    #[serde(rename_all = "PascalCase")]
    SetPluginData {
        /// Plugin name.
        plugin: String,
        /// Data key.
        key: String,
        /// Data value as JSON text.
        value: String,
    },
    /// Start every enabled plugin.
    StartPlugins,
    /// Stop every running plugin.
    StopPlugins,
}

// ── Factories ───────────────────────────────────────────────────────────

impl Command {
    /// `Acknowledge`
    pub fn acknowledge() -> Self {
        Command::Acknowledge
    }

    /// `Cancel`
    pub fn cancel() -> Self {
        Command::Cancel
    }

    /// `Ignore`
    pub fn ignore() -> Self {
        Command::Ignore
    }

    /// `Resolve` with a result message of the given severity.
    pub fn resolve(message_type: MessageType, content: Option<String>) -> Self {
        Command::Resolve {
            message_type,
            content,
        }
    }

    /// `SimpleCode`
    pub fn simple_code(code: impl Into<String>, channel: CodeChannel) -> Self {
        Command::SimpleCode {
            code: code.into(),
            channel,
        }
    }

    /// `Code`
    pub fn code(code: Code) -> Self {
        Command::Code(Box::new(code))
    }

    /// `Flush`
    pub fn flush(channel: CodeChannel) -> Self {
        Command::Flush { channel }
    }

    /// `EvaluateExpression`
    pub fn evaluate_expression(channel: CodeChannel, expression: impl Into<String>) -> Self {
        Command::EvaluateExpression {
            channel,
            expression: expression.into(),
        }
    }

    /// `GetObjectModel`
    pub fn get_object_model() -> Self {
        Command::GetObjectModel
    }

    /// `SyncObjectModel`
    pub fn sync_object_model() -> Self {
        Command::SyncObjectModel
    }

    /// `LockObjectModel`
    pub fn lock_object_model() -> Self {
        Command::LockObjectModel
    }

    /// `UnlockObjectModel`
    pub fn unlock_object_model() -> Self {
        Command::UnlockObjectModel
    }

    /// `SetObjectModel`
    pub fn set_object_model(property_path: impl Into<String>, value: impl Into<String>) -> Self {
        Command::SetObjectModel {
            property_path: property_path.into(),
            value: value.into(),
        }
    }

    /// `PatchObjectModel`
    pub fn patch_object_model(key: impl Into<String>, patch: impl Into<String>) -> Self {
        Command::PatchObjectModel {
            key: key.into(),
            patch: patch.into(),
        }
    }

    /// `ResolvePath`
    pub fn resolve_path(path: impl Into<String>) -> Self {
        Command::ResolvePath { path: path.into() }
    }

    /// `GetFileInfo`
    pub fn get_file_info(file_name: impl Into<String>) -> Self {
        Command::GetFileInfo {
            file_name: file_name.into(),
        }
    }

    /// `AddHttpEndpoint`
    pub fn add_http_endpoint(
        endpoint_type: HttpEndpointType,
        namespace: impl Into<String>,
        path: impl Into<String>,
        is_upload_request: bool,
    ) -> Self {
        Command::AddHttpEndpoint {
            endpoint_type,
            namespace: namespace.into(),
            path: path.into(),
            is_upload_request,
        }
    }

    /// `RemoveHttpEndpoint`
    pub fn remove_http_endpoint(
        endpoint_type: HttpEndpointType,
        namespace: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Command::RemoveHttpEndpoint {
            endpoint_type,
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    /// `AddUserSession`
    pub fn add_user_session(
        access_level: AccessLevel,
        session_type: SessionType,
        origin: impl Into<String>,
        origin_port: i64,
    ) -> Self {
        Command::AddUserSession {
            access_level,
            session_type,
            origin: origin.into(),
            origin_port,
        }
    }

    /// `RemoveUserSession`
    pub fn remove_user_session(id: i64) -> Self {
        Command::RemoveUserSession { id }
    }

    /// `CheckPassword`
    pub fn check_password(password: impl Into<String>) -> Self {
        Command::CheckPassword {
            password: password.into(),
        }
    }

    /// `WriteMessage`
    pub fn write_message(
        message_type: MessageType,
        content: impl Into<String>,
        output_message: bool,
        log_level: Option<LogLevel>,
    ) -> Self {
        Command::WriteMessage {
            message_type,
            content: content.into(),
            output_message,
            log_level,
        }
    }

    /// `SetUpdateStatus`
    pub fn set_update_status(updating: bool) -> Self {
        Command::SetUpdateStatus { updating }
    }

    /// `InstallPlugin`
    pub fn install_plugin(plugin_file: impl Into<String>) -> Self {
        Command::InstallPlugin {
            plugin_file: plugin_file.into(),
        }
    }

    /// `StartPlugin`
    pub fn start_plugin(plugin: impl Into<String>) -> Self {
        Command::StartPlugin {
            plugin: plugin.into(),
        }
    }

    /// `StopPlugin`
    pub fn stop_plugin(plugin: impl Into<String>) -> Self {
        Command::StopPlugin {
            plugin: plugin.into(),
        }
    }

    /// `UninstallPlugin`
    pub fn uninstall_plugin(plugin: impl Into<String>) -> Self {
        Command::UninstallPlugin {
            plugin: plugin.into(),
        }
    }

    /// `SetPluginData`
    pub fn set_plugin_data(
        plugin: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Command::SetPluginData {
            plugin: plugin.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// `StartPlugins`
    pub fn start_plugins() -> Self {
        Command::StartPlugins
    }

    /// `StopPlugins`
    pub fn stop_plugins() -> Self {
        Command::StopPlugins
    }

    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Acknowledge => "Acknowledge",
            Command::Cancel => "Cancel",
            Command::Ignore => "Ignore",
            Command::Resolve { .. } => "Resolve",
            Command::SimpleCode { .. } => "SimpleCode",
            Command::Code(_) => "Code",
            Command::Flush { .. } => "Flush",
            Command::EvaluateExpression { .. } => "EvaluateExpression",
            Command::GetObjectModel => "GetObjectModel",
            Command::SyncObjectModel => "SyncObjectModel",
            Command::LockObjectModel => "LockObjectModel",
            Command::UnlockObjectModel => "UnlockObjectModel",
            Command::SetObjectModel { .. } => "SetObjectModel",
            Command::PatchObjectModel { .. } => "PatchObjectModel",
            Command::ResolvePath { .. } => "ResolvePath",
            Command::GetFileInfo { .. } => "GetFileInfo",
            Command::AddHttpEndpoint { .. } => "AddHttpEndpoint",
            Command::RemoveHttpEndpoint { .. } => "RemoveHttpEndpoint",
            Command::AddUserSession { .. } => "AddUserSession",
            Command::RemoveUserSession { .. } => "RemoveUserSession",
            Command::CheckPassword { .. } => "CheckPassword",
            Command::WriteMessage { .. } => "WriteMessage",
            Command::SetUpdateStatus { .. } => "SetUpdateStatus",
            Command::InstallPlugin { .. } => "InstallPlugin",
            Command::StartPlugin { .. } => "StartPlugin",
            Command::StopPlugin { .. } => "StopPlugin",
            Command::UninstallPlugin { .. } => "UninstallPlugin",
            Command::SetPluginData { .. } => "SetPluginData",
            Command::StartPlugins => "StartPlugins",
            Command::StopPlugins => "StopPlugins",
        }
    }
}
