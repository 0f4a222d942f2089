//! The generic success/error envelope every command is answered with.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::ConnectionError;
use crate::command::Command;

/// Server error type signalling a remotely cancelled command.
pub const TASK_CANCELED: &str = "TaskCanceledException";

/// Reply to a command or a mode selection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseResponse {
    /// Whether the command succeeded.
    pub success: bool,
    /// Command result on success.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Server-side exception type on failure.
    #[serde(default)]
    pub error_type: Option<String>,
    /// Server-side exception message on failure.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl BaseResponse {
    /// Turn a failed response into the matching error.
    ///
    /// `TaskCanceledException` becomes [`ConnectionError::TaskCanceled`];
    /// anything else becomes [`ConnectionError::InternalServerError`]
    /// carrying `command`.
    pub fn into_result(self, command: &Command) -> Result<Option<serde_json::Value>, ConnectionError> {
        if self.success {
            return Ok(self.result);
        }
        let error_type = self.error_type.unwrap_or_default();
        let error_message = self.error_message.unwrap_or_default();
        if error_type == TASK_CANCELED {
            Err(ConnectionError::TaskCanceled {
                message: error_message,
            })
        } else {
            Err(ConnectionError::InternalServerError {
                command: Box::new(command.clone()),
                error_type,
                error_message,
            })
        }
    }
}

/// Decode a successful result into `T`; a missing result decodes from `null`.
pub(crate) fn decode_result<T: DeserializeOwned>(
    result: Option<serde_json::Value>,
) -> Result<T, ConnectionError> {
    serde_json::from_value(result.unwrap_or(serde_json::Value::Null))
        .map_err(ConnectionError::UnexpectedResult)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsfapi_core::CodeChannel;

    fn parse(json: &str) -> BaseResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn success_carries_result() {
        let cmd = Command::flush(CodeChannel::Http);
        let result = parse(r#"{"result":true,"success":true}"#)
            .into_result(&cmd)
            .unwrap();
        assert_eq!(result, Some(serde_json::Value::Bool(true)));

        let result = parse(r#"{"success":true}"#).into_result(&cmd).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn cancellation_is_distinct() {
        let cmd = Command::simple_code("G4 S10", CodeChannel::Sbc);
        let err = parse(
            r#"{"success":false,"errorType":"TaskCanceledException","errorMessage":"aborted"}"#,
        )
        .into_result(&cmd)
        .unwrap_err();
        match err {
            ConnectionError::TaskCanceled { message } => assert_eq!(message, "aborted"),
            other => panic!("expected TaskCanceled, got {other:?}"),
        }
    }

    #[test]
    fn other_failures_carry_command() {
        let cmd = Command::simple_code("M999", CodeChannel::Sbc);
        let err = parse(
            r#"{"success":false,"errorType":"InvalidOperationException","errorMessage":"busy"}"#,
        )
        .into_result(&cmd)
        .unwrap_err();
        match err {
            ConnectionError::InternalServerError {
                command,
                error_type,
                error_message,
            } => {
                assert_eq!(*command, cmd);
                assert_eq!(error_type, "InvalidOperationException");
                assert_eq!(error_message, "busy");
            }
            other => panic!("expected InternalServerError, got {other:?}"),
        }
    }

    #[test]
    fn decode_missing_result_as_unit_or_option() {
        decode_result::<()>(None).unwrap();
        let path: Option<String> = decode_result(None).unwrap();
        assert!(path.is_none());
        let flag: bool = decode_result(Some(serde_json::json!(true))).unwrap();
        assert!(flag);
    }
}
