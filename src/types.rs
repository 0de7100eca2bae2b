//! Errors and outcomes shared across the engine.

use std::fmt;
use std::path::{Path, PathBuf};

/// A shorthand for a Result whose error type is always an FtpError.
pub type Result<T> = ::std::result::Result<T, FtpError>;

/// `FtpError` is a library-global error type to describe the different kinds of
/// errors that might occur while driving an FTP session.
///
/// Errors for which [`FtpError::is_fatal`] returns true have already closed
/// the session that produced them.
#[derive(Debug)]
pub enum FtpError {
    /// The control connection could not be established.
    ConnectionError(::std::io::Error),
    /// A control line could not be parsed into a known status code.
    InvalidResponse(String),
    /// Malformed command text, a wrong argument count or an out of sequence call.
    InvalidCommand(String),
    /// The control channel failed or the session is already closed.
    ChannelTerminated(String),
    /// The server answered 421.
    ForcedLogout(String),
    /// The server answered with a recognised code that makes no sense in context.
    ProtocolViolation(String),
    /// The server did not accept the login.
    LoginRejected(String),
    /// No data connection could be accepted.
    DataConnectionFailed(String),
    /// The configuration could not be loaded or is invalid.
    Config(String),
}

impl FtpError {
    /// Returns true if this error terminated the session.
    pub fn is_fatal(&self) -> bool {
        match *self {
            FtpError::ChannelTerminated(_)
            | FtpError::ForcedLogout(_)
            | FtpError::ProtocolViolation(_)
            | FtpError::LoginRejected(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FtpError::ConnectionError(ref ioerr) => write!(f, "FTP ConnectionError: {}", ioerr),
            FtpError::InvalidResponse(ref desc) => write!(f, "FTP InvalidResponse: {}", desc),
            FtpError::InvalidCommand(ref desc) => write!(f, "FTP InvalidCommand: {}", desc),
            FtpError::ChannelTerminated(ref desc) => write!(f, "FTP ChannelTerminated: {}", desc),
            FtpError::ForcedLogout(ref desc) => write!(f, "FTP ForcedLogout: {}", desc),
            FtpError::ProtocolViolation(ref desc) => {
                write!(f, "FTP ProtocolViolation: {}", desc)
            }
            FtpError::LoginRejected(ref desc) => write!(f, "FTP LoginRejected: {}", desc),
            FtpError::DataConnectionFailed(ref desc) => {
                write!(f, "FTP DataConnectionFailed: {}", desc)
            }
            FtpError::Config(ref desc) => write!(f, "FTP Config: {}", desc),
        }
    }
}

impl ::std::error::Error for FtpError {
    fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
        match *self {
            FtpError::ConnectionError(ref ioerr) => Some(ioerr),
            _ => None,
        }
    }
}

impl From<::config::ConfigError> for FtpError {
    fn from(err: ::config::ConfigError) -> Self {
        FtpError::Config(err.to_string())
    }
}

/// Result of submitting a username.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    LoggedIn,
    PasswordRequired,
}

/// Result of a command that did not terminate the session.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The operation completed.
    Success,
    /// The operation completed and produced text (directory listings).
    Output(String),
    /// The server (or the local side of a transfer) reported a legitimate
    /// failure. The session remains usable.
    Failure(String),
    /// The remote file of an upload already exists. Pass the value back to
    /// `FtpSession::resume_upload` with the user's decision.
    ConfirmationRequired(PendingUpload),
    /// An overwrite was declined; nothing was sent.
    Cancelled,
}

/// An upload halted on a name collision, waiting for the user's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub(crate) local: PathBuf,
    pub(crate) remote: String,
}

impl PendingUpload {
    /// The local file that would be uploaded.
    pub fn local_path(&self) -> &Path {
        &self.local
    }

    /// The remote name that already exists.
    pub fn remote_name(&self) -> &str {
        &self.remote
    }
}
