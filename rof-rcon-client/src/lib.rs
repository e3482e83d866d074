//! This crate provides a high-level cross-platform client for the remote console
//! (RCON) interface exposed by the Rise of Flight / IL-2 Sturmovik dedicated
//! server (DServer).
//!
//! The protocol is a strictly synchronous request/response exchange over one
//! persistent TCP connection: each command is sent as a length-prefixed,
//! NUL-terminated UTF-8 string, and each response is a length-prefixed,
//! URL-encoded `key=value` payload carrying a numeric `STATUS` field.
//!
//! The blocking client in [`sync`] is enabled by default. A
//! [Tokio](https://tokio.rs/)-based variant with the same surface is available
//! in [`async`](r#async) behind the `async` feature.
//!
//! # Example
//! ```rust,no_run
//! use rof_rcon_client::{Config, sync::RconClient};
//!
//! fn main() -> rof_rcon_client::Result<()> {
//!     let config = Config::new("admin", "password123")
//!         .host("127.0.0.1")
//!         .port(8991);
//!
//!     // Connects and authenticates immediately.
//!     let mut client = RconClient::new(config)?;
//!
//!     for player in client.get_player_list()? {
//!         println!("{} ({}ms)", player.name, player.ping);
//!     }
//!     Ok(())
//! }
//! ```

use std::time::Duration;

mod command;
mod protocol;

#[cfg(feature = "async")]
pub mod r#async;
#[cfg(feature = "sync")]
pub mod sync;

pub use self::command::{ChatTarget, Command, PlayerSelector};
pub use self::protocol::{Player, PlayerStatus, Response, Status};

/// Error type for RCON operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The initial TCP connection could not be established.
    #[error("failed to connect to {host}:{port}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The connection dropped mid-operation, or no connection is open.
    ///
    /// With auto-reconnect enabled this triggers one transparent
    /// reconnect-and-retry inside `execute`.
    #[error("rcon connection broken")]
    ConnectionBroken(#[source] std::io::Error),

    /// The server answered with a non-OK status.
    #[error("server returned {status} for command [{command}]")]
    Command { command: String, status: Status },

    /// The response bytes could not be decoded.
    #[error("malformed response")]
    Decode(#[from] DecodeError),
}

/// Reasons a response (or outgoing command) failed to decode.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("response is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("response payload is not NUL-terminated")]
    MissingTerminator,

    #[error("response length prefix is negative ({0})")]
    NegativeLength(i16),

    #[error("response is missing the STATUS field")]
    MissingStatus,

    #[error("unknown status code [{0}]")]
    UnknownStatus(String),

    #[error("unknown in-game status code [{0}]")]
    UnknownPlayerStatus(String),

    #[error("response is missing the [{0}] field")]
    MissingField(&'static str),

    #[error("field [{field}] holds a non-numeric value [{value}]")]
    InvalidNumber { field: &'static str, value: String },

    #[error("command is too long to frame ({0} bytes)")]
    CommandTooLong(usize),
}

/// [`Result`] alias for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for connection-level failures, the only kind the auto-reconnect
    /// wrapper is allowed to retry.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Connection { .. } | Error::ConnectionBroken(_))
    }

    pub(crate) fn not_connected() -> Self {
        Error::ConnectionBroken(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "no connection is open",
        ))
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Authenticated,
}

/// Outcome of a reconnect sequence.
///
/// Running out of attempts is not an error: the session is left disconnected
/// and the next command fails on the closed transport instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Reconnect {
    /// A connect attempt succeeded and the session is authenticated again.
    Reconnected,
    /// Every remaining attempt failed; the session stays disconnected.
    GaveUp,
}

/// Connection settings for an [`RconClient`](sync::RconClient).
#[derive(Debug, Clone)]
pub struct Config {
    pub login: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub auto_connect: bool,
    pub auto_reconnect: bool,
    pub connect_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl Config {
    /// Settings for the given credentials, targeting `localhost:8991` with
    /// auto-connect and auto-reconnect enabled, a 5 second connect timeout,
    /// and up to 10 reconnect attempts 5 seconds apart.
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Config {
            login: login.into(),
            password: password.into(),
            host: "localhost".to_string(),
            port: 8991,
            auto_connect: true,
            auto_reconnect: true,
            connect_timeout: Duration::from_secs(5),
            max_reconnect_attempts: 10,
            reconnect_delay: Duration::from_secs(5),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Delay between reconnect attempts. DServer ignores RCON traffic from
    /// clients that reconnect too quickly, so keep this at a few seconds
    /// against real servers.
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}
