//! Tokio-based client, mirroring [`sync`](crate::sync) on
//! `tokio::net::TcpStream`.

use log::{debug, error, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::command::{ChatTarget, Command, PlayerSelector};
use crate::protocol::{self, Player, Response, Status};
use crate::{Config, Error, Reconnect, SessionState};

/// An asynchronous RCON session: one TCP connection carrying one serial
/// command stream.
pub struct RconClient {
    config: Config,
    transport: Transport,
    state: SessionState,
    reconnect_attempts: u32,
}

impl RconClient {
    /// Creates a session for `config`. When `auto_connect` is set (the
    /// default) this connects and authenticates before returning.
    pub async fn new(config: Config) -> crate::Result<Self> {
        let mut client = RconClient {
            config,
            transport: Transport::new(),
            state: SessionState::Disconnected,
            reconnect_attempts: 0,
        };
        if client.config.auto_connect {
            client.connect().await?;
        }
        Ok(client)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Opens the TCP connection and authenticates.
    pub async fn connect(&mut self) -> crate::Result<()> {
        self.transport
            .open(
                &self.config.host,
                self.config.port,
                self.config.connect_timeout,
            )
            .await?;
        self.state = SessionState::Connected;
        debug!("rcon connected to {}:{}", self.config.host, self.config.port);

        self.authenticate().await?;
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
    /// between attempts, up to the configured maximum. See
    /// [`sync::RconClient::reconnect`](crate::sync::RconClient::reconnect)
    /// for the full contract.
    pub async fn reconnect(&mut self) -> crate::Result<Reconnect> {
        self.disconnect();
        while self.reconnect_attempts < self.config.max_reconnect_attempts {
            tokio::time::sleep(self.config.reconnect_delay).await;
            self.reconnect_attempts += 1;
            warn!(
                "rcon reconnecting to the server, attempt {} of {}",
                self.reconnect_attempts, self.config.max_reconnect_attempts
            );
            match self.connect().await {
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

    /// Sends a raw command string and decodes the response, reconnecting and
    /// retrying once on transport-level failure when `auto_reconnect` is set.
    pub async fn execute(&mut self, command: &str) -> crate::Result<Response> {
        if !self.config.auto_reconnect {
            return self.execute_once(command).await;
        }
        match self.execute_once(command).await {
            Err(err) if err.is_transport() => {
                // A GaveUp outcome is not an error here: the retried execute
                // fails on the closed transport and reports that instead.
                let _ = self.reconnect().await?;
                self.execute_once(command).await
            }
            result => result,
        }
    }

    async fn execute_once(&mut self, command: &str) -> crate::Result<Response> {
        let frame = protocol::encode_frame(command)?;
        self.transport.write_all(&frame).await?;
        debug!("rcon sent command [{command}] to the server");

        let mut prefix = [0u8; 2];
        self.transport.read_exact(&mut prefix).await?;
        let length = protocol::decode_length(prefix)?;

        let mut payload = vec![0u8; length];
        self.transport.read_exact(&mut payload).await?;

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

    // Runs on the unwrapped path, same as the sync client.
    async fn authenticate(&mut self) -> crate::Result<()> {
        let command = Command::Auth {
            login: &self.config.login,
            password: &self.config.password,
        }
        .to_string();
        self.execute_once(&command).await?;
        Ok(())
    }

    async fn run(&mut self, command: Command<'_>) -> crate::Result<Response> {
        self.execute(&command.to_string()).await
    }

    pub async fn my_status(&mut self) -> crate::Result<Response> {
        self.run(Command::MyStatus).await
    }

    /// Returns the server console buffer.
    pub async fn get_console_log(&mut self) -> crate::Result<String> {
        let mut response = self.run(Command::GetConsole).await?;
        response
            .take("console")
            .ok_or(Error::Decode(crate::DecodeError::MissingField("console")))
    }

    /// Returns the connected players. A response without a `playerList`
    /// field means nobody is connected.
    pub async fn get_player_list(&mut self) -> crate::Result<Vec<Player>> {
        let response = self.run(Command::GetPlayerList).await?;
        match response.get("playerList") {
            Some(list) => Ok(protocol::parse_player_list(list)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_server_status(&mut self) -> crate::Result<Response> {
        self.run(Command::ServerStatus).await
    }

    pub async fn get_sps(&mut self) -> crate::Result<Response> {
        self.run(Command::SpsGet).await
    }

    pub async fn reset_sps(&mut self) -> crate::Result<Response> {
        self.run(Command::SpsReset).await
    }

    pub async fn shutdown(&mut self) -> crate::Result<Response> {
        self.run(Command::Shutdown).await
    }

    /// Loads and opens the mission file at `path` on the server.
    pub async fn open_sds(&mut self, path: &str) -> crate::Result<Response> {
        self.run(Command::OpenSds { path }).await
    }

    pub async fn close_sds(&mut self) -> crate::Result<Response> {
        self.run(Command::CloseSds).await
    }

    pub async fn kick(&mut self, who: PlayerSelector<'_>) -> crate::Result<Response> {
        self.run(Command::Kick(who)).await
    }

    /// Bans a player; with `ban_account` the ban applies to the whole account
    /// rather than the single profile.
    pub async fn ban(
        &mut self,
        who: PlayerSelector<'_>,
        ban_account: bool,
    ) -> crate::Result<Response> {
        self.run(Command::Ban { who, ban_account }).await
    }

    pub async fn unban_all(&mut self) -> crate::Result<Response> {
        self.run(Command::UnbanAll).await
    }

    /// Fires a server input (mission trigger) by name.
    pub async fn server_input(&mut self, trigger: &str) -> crate::Result<Response> {
        self.run(Command::ServerInput { trigger }).await
    }

    pub async fn send_stat_now(&mut self) -> crate::Result<Response> {
        self.run(Command::SendStatNow).await
    }

    pub async fn cut_chat_log(&mut self) -> crate::Result<Response> {
        self.run(Command::CutChatLog).await
    }

    pub async fn chat_to_all(&mut self, msg: &str) -> crate::Result<Response> {
        self.run(Command::Chat { target: ChatTarget::All, msg }).await
    }

    pub async fn chat_to_coalition(&mut self, coalition: i32, msg: &str) -> crate::Result<Response> {
        self.run(Command::Chat { target: ChatTarget::Coalition(coalition), msg })
            .await
    }

    pub async fn chat_to_country(&mut self, country: i32, msg: &str) -> crate::Result<Response> {
        self.run(Command::Chat { target: ChatTarget::Country(country), msg })
            .await
    }

    pub async fn chat_to_client(&mut self, client: i32, msg: &str) -> crate::Result<Response> {
        self.run(Command::Chat { target: ChatTarget::Client(client), msg })
            .await
    }
}

/// Owns the raw TCP stream. Detects breakage; never retries.
struct Transport {
    stream: Option<TcpStream>,
}

impl Transport {
    fn new() -> Self {
        Transport { stream: None }
    }

    async fn open(
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

        let connect = TcpStream::connect((host, port));
        match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(stream)) => {
                self.stream = Some(stream);
                Ok(())
            }
            Ok(Err(err)) => Err(connection_error(err)),
            Err(_) => Err(connection_error(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "connect timed out",
            ))),
        }
    }

    fn close(&mut self) {
        self.stream = None;
    }

    async fn write_all(&mut self, bytes: &[u8]) -> crate::Result<()> {
        let stream = self.stream.as_mut().ok_or_else(Error::not_connected)?;
        stream.write_all(bytes).await.map_err(Error::ConnectionBroken)
    }

    /// Completes once `buf` is filled. A zero-length read means the peer
    /// closed the connection.
    async fn read_exact(&mut self, buf: &mut [u8]) -> crate::Result<()> {
        let stream = self.stream.as_mut().ok_or_else(Error::not_connected)?;
        let mut filled = 0;
        while filled < buf.len() {
            match stream.read(&mut buf[filled..]).await {
                Ok(0) => {
                    return Err(Error::ConnectionBroken(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    )))
                }
                Ok(n) => filled += n,
                Err(err) => return Err(Error::ConnectionBroken(err)),
            }
        }
        Ok(())
    }
}
