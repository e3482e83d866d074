//! Blocking client, built on `std::net::TcpStream`.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use log::{debug, error, warn};

use crate::command::{ChatTarget, Command, PlayerSelector};
use crate::protocol::{self, Player, Response, Status};
use crate::{Config, Error, Reconnect, SessionState};

/// A blocking RCON session: one TCP connection carrying one serial command
/// stream.
///
/// The client is not internally synchronized; share it across threads only
/// behind external locking.
#[derive(Debug)]
pub struct RconClient {
    config: Config,
    transport: Transport,
    state: SessionState,
    reconnect_attempts: u32,
}

impl RconClient {
    /// Creates a session for `config`. When `auto_connect` is set (the
    /// default) this connects and authenticates before returning.
    pub fn new(config: Config) -> crate::Result<Self> {
        let mut client = RconClient {
            config,
            transport: Transport::new(),
            state: SessionState::Disconnected,
            reconnect_attempts: 0,
        };
        if client.config.auto_connect {
            client.connect()?;
        }
        Ok(client)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Opens the TCP connection and authenticates.
    pub fn connect(&mut self) -> crate::Result<()> {
        self.transport.open(
            &self.config.host,
            self.config.port,
            self.config.connect_timeout,
        )?;
        self.state = SessionState::Connected;
        debug!("rcon connected to {}:{}", self.config.host, self.config.port);

        self.authenticate()?;
        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// Closes the connection. Idempotent.
    pub fn disconnect(&mut self) {
        self.transport.close();
        if self.state != SessionState::Disconnected {
            debug!("rcon disconnected from the server");
        }
        self.state = SessionState::Disconnected;
    }

    /// Drops the current connection and retries `connect` with a fixed delay
    /// between attempts, up to the configured maximum.
    ///
    /// The attempt counter persists across calls until a connect succeeds, so
    /// once this has given up it keeps giving up until a manual [`connect`]
    /// works again. Authentication rejections propagate; only transport
    /// failures are retried.
    ///
    /// [`connect`]: RconClient::connect
    pub fn reconnect(&mut self) -> crate::Result<Reconnect> {
        self.disconnect();
        while self.reconnect_attempts < self.config.max_reconnect_attempts {
            std::thread::sleep(self.config.reconnect_delay);
            self.reconnect_attempts += 1;
            warn!(
                "rcon reconnecting to the server, attempt {} of {}",
                self.reconnect_attempts, self.config.max_reconnect_attempts
            );
            match self.connect() {
                Ok(()) => {
                    self.reconnect_attempts = 0;
                    warn!("rcon reconnected to the server");
                    return Ok(Reconnect::Reconnected);
                }
                Err(err) if err.is_transport() => {
                    // A failed attempt can die between the TCP connect and the
                    // auth exchange; never leave that half-open socket around.
                    self.disconnect();
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(Reconnect::GaveUp)
    }

    /// Sends a raw command string and decodes the response.
    ///
    /// On a transport-level failure with `auto_reconnect` enabled, this runs
    /// one [`reconnect`](RconClient::reconnect) sequence and retries the
    /// command once; a second failure propagates. Server-side rejections
    /// ([`Error::Command`]) are never retried.
    pub fn execute(&mut self, command: &str) -> crate::Result<Response> {
        if !self.config.auto_reconnect {
            return self.execute_once(command);
        }
        match self.execute_once(command) {
            Err(err) if err.is_transport() => {
                // A GaveUp outcome is not an error here: the retried execute
                // fails on the closed transport and reports that instead.
                let _ = self.reconnect()?;
                self.execute_once(command)
            }
            result => result,
        }
    }

    fn execute_once(&mut self, command: &str) -> crate::Result<Response> {
        let frame = protocol::encode_frame(command)?;
        self.transport.write_all(&frame)?;
        debug!("rcon sent command [{command}] to the server");

        let mut prefix = [0u8; 2];
        self.transport.read_exact(&mut prefix)?;
        let length = protocol::decode_length(prefix)?;

        let mut payload = vec![0u8; length];
        self.transport.read_exact(&mut payload)?;

        let response = protocol::decode_response(&payload)?;
        if response.status() == Status::Ok {
            debug!("rcon received a response from the server");
            Ok(response)
        } else {
            error!(
                "rcon received an error from the server: [{command}] => {}",
                response.status()
            );
            Err(Error::Command {
                command: command.to_string(),
                status: response.status(),
            })
        }
    }

    // Runs on the unwrapped path: authentication is already inside the
    // reconnect loop when it matters, so it must not recurse into it.
    fn authenticate(&mut self) -> crate::Result<()> {
        let command = Command::Auth {
            login: &self.config.login,
            password: &self.config.password,
        }
        .to_string();
        self.execute_once(&command)?;
        Ok(())
    }

    fn run(&mut self, command: Command<'_>) -> crate::Result<Response> {
        self.execute(&command.to_string())
    }

    pub fn my_status(&mut self) -> crate::Result<Response> {
        self.run(Command::MyStatus)
    }

    /// Returns the server console buffer.
    pub fn get_console_log(&mut self) -> crate::Result<String> {
        let mut response = self.run(Command::GetConsole)?;
        response
            .take("console")
            .ok_or(Error::Decode(crate::DecodeError::MissingField("console")))
    }

    /// Returns the connected players. A response without a `playerList`
    /// field means nobody is connected.
    pub fn get_player_list(&mut self) -> crate::Result<Vec<Player>> {
        let response = self.run(Command::GetPlayerList)?;
        match response.get("playerList") {
            Some(list) => Ok(protocol::parse_player_list(list)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn get_server_status(&mut self) -> crate::Result<Response> {
        self.run(Command::ServerStatus)
    }

    pub fn get_sps(&mut self) -> crate::Result<Response> {
        self.run(Command::SpsGet)
    }

    pub fn reset_sps(&mut self) -> crate::Result<Response> {
        self.run(Command::SpsReset)
    }

    pub fn shutdown(&mut self) -> crate::Result<Response> {
        self.run(Command::Shutdown)
    }

    /// Loads and opens the mission file at `path` on the server.
    pub fn open_sds(&mut self, path: &str) -> crate::Result<Response> {
        self.run(Command::OpenSds { path })
    }

    pub fn close_sds(&mut self) -> crate::Result<Response> {
        self.run(Command::CloseSds)
    }

    pub fn kick(&mut self, who: PlayerSelector<'_>) -> crate::Result<Response> {
        self.run(Command::Kick(who))
    }

    /// Bans a player; with `ban_account` the ban applies to the whole account
    /// rather than the single profile.
    pub fn ban(&mut self, who: PlayerSelector<'_>, ban_account: bool) -> crate::Result<Response> {
        self.run(Command::Ban { who, ban_account })
    }

    pub fn unban_all(&mut self) -> crate::Result<Response> {
        self.run(Command::UnbanAll)
    }

    /// Fires a server input (mission trigger) by name.
    pub fn server_input(&mut self, trigger: &str) -> crate::Result<Response> {
        self.run(Command::ServerInput { trigger })
    }

    pub fn send_stat_now(&mut self) -> crate::Result<Response> {
        self.run(Command::SendStatNow)
    }

    pub fn cut_chat_log(&mut self) -> crate::Result<Response> {
        self.run(Command::CutChatLog)
    }

    pub fn chat_to_all(&mut self, msg: &str) -> crate::Result<Response> {
        self.run(Command::Chat { target: ChatTarget::All, msg })
    }

    pub fn chat_to_coalition(&mut self, coalition: i32, msg: &str) -> crate::Result<Response> {
        self.run(Command::Chat { target: ChatTarget::Coalition(coalition), msg })
    }

    pub fn chat_to_country(&mut self, country: i32, msg: &str) -> crate::Result<Response> {
        self.run(Command::Chat { target: ChatTarget::Country(country), msg })
    }

    pub fn chat_to_client(&mut self, client: i32, msg: &str) -> crate::Result<Response> {
        self.run(Command::Chat { target: ChatTarget::Client(client), msg })
    }
}

impl Drop for RconClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Owns the raw TCP stream. Detects breakage; never retries.
#[derive(Debug)]
struct Transport {
    stream: Option<TcpStream>,
}

impl Transport {
    fn new() -> Self {
        Transport { stream: None }
    }

    fn open(
        &mut self,
        host: &str,
        port: u16,
        timeout: std::time::Duration,
    ) -> crate::Result<()> {
        self.close();

        let connection_error = |source| Error::Connection {
            host: host.to_string(),
            port,
            source,
        };

        let addrs = (host, port).to_socket_addrs().map_err(&connection_error)?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(connection_error(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no addresses")
        })))
    }

    fn close(&mut self) {
        // Dropping the stream closes the socket.
        self.stream = None;
    }

    fn write_all(&mut self, bytes: &[u8]) -> crate::Result<()> {
        let stream = self.stream.as_mut().ok_or_else(Error::not_connected)?;
        stream.write_all(bytes).map_err(Error::ConnectionBroken)
    }

    /// Blocks until `buf` is completely filled. A zero-length read means the
    /// peer closed the connection.
    fn read_exact(&mut self, buf: &mut [u8]) -> crate::Result<()> {
        let stream = self.stream.as_mut().ok_or_else(Error::not_connected)?;
        let mut filled = 0;
        while filled < buf.len() {
            match stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(Error::ConnectionBroken(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    )))
                }
                Ok(n) => filled += n,
                Err(ref err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::ConnectionBroken(err)),
            }
        }
        Ok(())
    }
}
