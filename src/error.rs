use std::fmt;

use crate::cdp::CdpError;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the automation layer.
#[derive(Debug)]
pub enum Error {
    /// The `/json` discovery endpoint was unreachable or malformed.
    InvalidBrowserUrl(String),

    /// The WebSocket dropped and reconnection failed.
    WebSocketConnectionClosed,

    /// A command could not be serialized for the wire.
    InvalidCommand(String),

    /// The per-command deadline elapsed without a reply.
    CommandExecutionTimeout {
        /// The CDP method that timed out.
        method: String,
    },

    /// A protocol-level error reported by the browser, code and message
    /// preserved verbatim.
    Protocol { code: i64, message: String },

    /// An immediate lookup matched nothing.
    ElementNotFound { selector: String },

    /// A polling lookup exhausted its deadline.
    WaitElementTimeout { selector: String },

    /// Interaction attempted on a hidden element.
    ElementNotVisible,

    /// The JavaScript click ran but the element rejected it.
    ElementNotInteractable,

    /// `set_input_files` called on something that is not
    /// `<input type="file">`.
    ElementNotAFileInput,

    /// Frame resolution or isolated-world creation failed.
    InvalidIFrame(String),

    /// `get_frame` invoked on an element that is not an `<iframe>`.
    NotAnIFrame,

    /// Network log access without network events enabled.
    NetworkEventsNotEnabled,

    /// The `execute_script` argument contract was violated.
    InvalidScriptWithElement(String),

    /// A dialog accessor was called while no dialog is open.
    NoDialogPresent,

    /// The operation requires a top-level page target, not an iframe.
    TopLevelTargetRequired,

    /// Navigation did not reach readiness within its budget.
    PageLoadTimeout,

    /// An expected download did not complete in time.
    DownloadTimeout,

    /// Screenshot path extension outside `{png, jpg, jpeg}`.
    InvalidFileExtension(String),

    /// An argument contract was violated (e.g. a find with no criteria).
    InvalidArgument(String),

    /// The browser replied with an unexpectedly shaped payload.
    InvalidResponse(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBrowserUrl(msg) => {
                write!(f, "browser endpoint unreachable or malformed: {msg}")
            }
            Self::WebSocketConnectionClosed => write!(f, "websocket connection closed"),
            Self::InvalidCommand(msg) => write!(f, "invalid command: {msg}"),
            Self::CommandExecutionTimeout { method } => {
                write!(f, "command execution timed out: {method}")
            }
            Self::Protocol { code, message } => write!(f, "protocol error ({code}): {message}"),
            Self::ElementNotFound { selector } => {
                write!(f, "element not found: {selector}")
            }
            Self::WaitElementTimeout { selector } => {
                write!(f, "timed out waiting for element: {selector}")
            }
            Self::ElementNotVisible => write!(f, "element is not visible"),
            Self::ElementNotInteractable => write!(f, "element is not interactable"),
            Self::ElementNotAFileInput => write!(f, "element is not a file input"),
            Self::InvalidIFrame(msg) => write!(f, "invalid iframe: {msg}"),
            Self::NotAnIFrame => write!(f, "element is not an iframe"),
            Self::NetworkEventsNotEnabled => {
                write!(f, "network events are not enabled for this tab")
            }
            Self::InvalidScriptWithElement(msg) => {
                write!(f, "invalid script/element combination: {msg}")
            }
            Self::NoDialogPresent => write!(f, "no dialog is currently open"),
            Self::TopLevelTargetRequired => {
                write!(f, "operation requires a top-level page target")
            }
            Self::PageLoadTimeout => write!(f, "page load timed out"),
            Self::DownloadTimeout => write!(f, "download did not complete in time"),
            Self::InvalidFileExtension(ext) => {
                write!(f, "unsupported screenshot extension: {ext}")
            }
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::InvalidResponse(msg) => write!(f, "unexpected response shape: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<CdpError> for Error {
    fn from(err: CdpError) -> Self {
        match err {
            CdpError::Connect(msg) => Self::InvalidBrowserUrl(msg),
            CdpError::ConnectTimeout => Self::InvalidBrowserUrl("connect timed out".into()),
            CdpError::InvalidCommand(msg) => Self::InvalidCommand(msg),
            CdpError::CommandTimeout { method } => Self::CommandExecutionTimeout { method },
            CdpError::Protocol { code, message } => Self::Protocol { code, message },
            CdpError::ConnectionClosed => Self::WebSocketConnectionClosed,
        }
    }
}
