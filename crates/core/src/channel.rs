//! Code channels: the input sources a machine statement can arrive on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Logical source or destination of machine statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeChannel {
    /// Web interface requests.
    #[serde(rename = "HTTP")]
    Http,
    /// Telnet sessions.
    Telnet,
    /// The file being printed.
    File,
    /// USB serial.
    #[serde(rename = "USB")]
    Usb,
    /// Serial aux port.
    Aux,
    /// Trigger macros.
    Trigger,
    /// Code queue.
    Queue,
    /// Panel or display.
    #[serde(rename = "LCD")]
    Lcd,
    /// Single-board computer (the default for API clients).
    #[default]
    #[serde(rename = "SBC")]
    Sbc,
    /// Background daemon.
    Daemon,
    /// Second aux port.
    Aux2,
    /// Auto-pause handling.
    AutoPause,
    /// Anything the server reports that this crate does not know.
    #[serde(other)]
    Unknown,
}

impl CodeChannel {
    /// Every channel, in the order the server expects for interception.
    pub const ALL: [CodeChannel; 13] = [
        CodeChannel::Http,
        CodeChannel::Telnet,
        CodeChannel::File,
        CodeChannel::Usb,
        CodeChannel::Aux,
        CodeChannel::Trigger,
        CodeChannel::Queue,
        CodeChannel::Lcd,
        CodeChannel::Sbc,
        CodeChannel::Daemon,
        CodeChannel::Aux2,
        CodeChannel::AutoPause,
        CodeChannel::Unknown,
    ];

    /// Wire name of the channel.
    pub fn as_str(self) -> &'static str {
        match self {
            CodeChannel::Http => "HTTP",
            CodeChannel::Telnet => "Telnet",
            CodeChannel::File => "File",
            CodeChannel::Usb => "USB",
            CodeChannel::Aux => "Aux",
            CodeChannel::Trigger => "Trigger",
            CodeChannel::Queue => "Queue",
            CodeChannel::Lcd => "LCD",
            CodeChannel::Sbc => "SBC",
            CodeChannel::Daemon => "Daemon",
            CodeChannel::Aux2 => "Aux2",
            CodeChannel::AutoPause => "AutoPause",
            CodeChannel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CodeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized channel name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown code channel: {0:?}")]
pub struct UnknownChannel(pub String);

impl FromStr for CodeChannel {
    type Err = UnknownChannel;

    /// Case-insensitive lookup by wire name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CodeChannel::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}
