use std::fmt;

/// Errors raised by the connection multiplexer.
#[derive(Debug)]
pub enum CdpError {
    /// The WebSocket connection could not be established.
    Connect(String),

    /// The connection attempt exceeded its timeout.
    ConnectTimeout,

    /// The command could not be serialized into a JSON frame.
    InvalidCommand(String),

    /// No reply arrived before the per-command deadline.
    CommandTimeout {
        /// The CDP method that timed out.
        method: String,
    },

    /// The browser answered the command with a protocol-level error.
    Protocol { code: i64, message: String },

    /// The socket dropped and reconnection did not succeed.
    ConnectionClosed,
}

impl fmt::Display for CdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(msg) => write!(f, "websocket connect failed: {msg}"),
            Self::ConnectTimeout => write!(f, "websocket connect timed out"),
            Self::InvalidCommand(msg) => write!(f, "command could not be serialized: {msg}"),
            Self::CommandTimeout { method } => {
                write!(f, "command execution timed out: {method}")
            }
            Self::Protocol { code, message } => {
                write!(f, "protocol error ({code}): {message}")
            }
            Self::ConnectionClosed => write!(f, "websocket connection closed"),
        }
    }
}

impl std::error::Error for CdpError {}
