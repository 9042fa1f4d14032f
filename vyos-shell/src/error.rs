//! Error types for vyos-shell.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for vyos-shell operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Driver-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Platform/mode graph errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Resource configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session could not be established before the retry deadline.
    #[error("Unable to establish CLI session within {elapsed:?}: {source}")]
    RetryExhausted {
        elapsed: Duration,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Whether this error means the session itself could not be set up.
    ///
    /// Only these errors are retried by
    /// [`retry_on_session_failure`](crate::retry::retry_on_session_failure);
    /// command failures surface immediately.
    pub fn is_session_establishment(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Channel(ChannelError::PtyOpenFailed | ChannelError::ShellRequestFailed) => true,
            _ => false,
        }
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key did not match the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host is not in known_hosts and strict checking is on
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts file could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The device never presented a known prompt after login
    #[error("No recognizable prompt after login within {0:?}")]
    NoInitialPrompt(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (pattern matching, PTY operations).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Failed to open PTY channel
    #[error("Failed to open PTY channel")]
    PtyOpenFailed,

    /// Failed to request shell
    #[error("Failed to request shell")]
    ShellRequestFailed,

    /// Neither a prompt, an action nor an error pattern matched in time
    #[error("Pattern not found within {0:?}")]
    PatternTimeout(Duration),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Driver layer errors (command execution, mode transitions).
#[derive(Error, Debug)]
pub enum DriverError {
    /// An error-map pattern matched the command output
    #[error("Command '{command}' failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// The command finished without its expected success marker
    #[error("Command '{command}' completed without a success marker")]
    SilentFailure { command: String },

    /// The expected prompt did not appear after a mode transition
    #[error("Failed to switch command mode from '{from}' to '{to}'")]
    ModeTransition { from: String, to: String },

    /// A template placeholder had no value
    #[error("Missing parameter '{name}' for command template '{template}'")]
    MissingParameter { template: String, name: String },

    /// The same prompt/response actions kept repeating without progress
    #[error("Action loop detected while executing '{command}'")]
    ActionLoop { command: String },

    /// Unknown command mode detected
    #[error("Unknown command mode from prompt: '{prompt}'")]
    UnknownMode { prompt: String },

    /// No path found between command modes
    #[error("No path from command mode '{from}' to '{to}'")]
    NoModePath { from: String, to: String },

    /// Invalid argument passed to a flow or runner
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

/// Platform/mode graph definition errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Invalid command mode graph
    #[error("Invalid platform definition: {message}")]
    InvalidDefinition { message: String },
}

/// Resource attribute errors, raised when the typed config is built.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required attribute is missing
    #[error("Missing required attribute '{0}'")]
    MissingAttribute(String),

    /// An attribute holds a value that cannot be used
    #[error("Invalid value '{value}' for attribute '{name}'")]
    InvalidAttribute { name: String, value: String },

    /// Unsupported CLI connection type
    #[error("Unsupported CLI connection type '{0}'")]
    UnsupportedConnectionType(String),

    /// A transfer URL could not be parsed
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The shell type is not one of the known resource types
    #[error("Unavailable shell type '{0}'")]
    UnavailableShellType(String),
}

/// Result type alias using vyos-shell's Error.
pub type Result<T> = std::result::Result<T, Error>;
