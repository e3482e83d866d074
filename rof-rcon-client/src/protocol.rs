//! Wire codec for the DServer remote console.
//!
//! Frames are `int16-LE length | payload | 0x00`, where the length counts the
//! payload plus the terminating NUL. Response payloads are URL-encoded
//! `key=value` pairs; the mandatory `STATUS` pair carries a numeric result
//! code that is translated into a [`Status`] here.

use std::collections::HashMap;
use std::fmt;

use percent_encoding::percent_decode_str;

use crate::DecodeError;

/// Result code attached to every server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    UnknownError,
    UnknownCommand,
    ParamCount,
    RecvBuffer,
    AuthIncorrect,
    ServerNotRunning,
    ServerUser,
    UnknownUser,
    Protocol,
    OutBuffer,
}

impl Status {
    /// Translates the numeric code the server sends. Codes outside 1..=11 are
    /// not part of the protocol.
    pub(crate) fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Status::Ok),
            "2" => Some(Status::UnknownError),
            "3" => Some(Status::UnknownCommand),
            "4" => Some(Status::ParamCount),
            "5" => Some(Status::RecvBuffer),
            "6" => Some(Status::AuthIncorrect),
            "7" => Some(Status::ServerNotRunning),
            "8" => Some(Status::ServerUser),
            "9" => Some(Status::UnknownUser),
            "10" => Some(Status::Protocol),
            "11" => Some(Status::OutBuffer),
            _ => None,
        }
    }

    /// The server-side name of this result code.
    pub fn name(&self) -> &'static str {
        match self {
            Status::Ok => "RCR_OK",
            Status::UnknownError => "RCR_ERR_UNKNOWN",
            Status::UnknownCommand => "RCR_ERR_UNKNOWN_COMMAND",
            Status::ParamCount => "RCR_ERR_PARAM_COUNT",
            Status::RecvBuffer => "RCR_ERR_RECVBUFFER",
            Status::AuthIncorrect => "RCR_ERR_AUTH_INCORRECT",
            Status::ServerNotRunning => "RCR_ERR_SERVER_NOT_RUNNING",
            Status::ServerUser => "RCR_ERR_SERVER_USER",
            Status::UnknownUser => "RCR_ERR_UNKNOWN_USER",
            Status::Protocol => "RCR_ERR_PROTOCOL",
            Status::OutBuffer => "RCR_ERR_OUTBUFFER",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// In-game state of a connected player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Spectator,
    LobbyReady,
    None,
    DogfightReady,
    CraftsiteReady,
}

impl PlayerStatus {
    pub(crate) fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(PlayerStatus::Spectator),
            "1" => Some(PlayerStatus::LobbyReady),
            "2" => Some(PlayerStatus::None),
            "3" => Some(PlayerStatus::DogfightReady),
            "4" => Some(PlayerStatus::CraftsiteReady),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlayerStatus::Spectator => "PS_SPECTATOR",
            PlayerStatus::LobbyReady => "PS_LOBBY_READY",
            PlayerStatus::None => "PS______NONE",
            PlayerStatus::DogfightReady => "PS_DOGFIGHT_READY",
            PlayerStatus::CraftsiteReady => "PS_CRAFTSITE_READY",
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded server response: the translated status plus the remaining
/// fields of the payload.
#[derive(Debug, Clone)]
pub struct Response {
    status: Status,
    fields: HashMap<String, String>,
}

impl Response {
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn take(&mut self, field: &str) -> Option<String> {
        self.fields.remove(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One row of a `getplayerlist` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: u32,
    pub status: PlayerStatus,
    pub ping: u32,
    pub name: String,
    pub account_id: String,
    pub profile_id: String,
}

/// Frames a command for the wire: `int16-LE (len + 1) | command | 0x00`.
pub(crate) fn encode_frame(command: &str) -> Result<Vec<u8>, DecodeError> {
    let data_length = command.len() + 1;
    if data_length > i16::MAX as usize {
        return Err(DecodeError::CommandTooLong(command.len()));
    }

    let mut frame = Vec::with_capacity(2 + data_length);
    frame.extend_from_slice(&(data_length as i16).to_le_bytes());
    frame.extend_from_slice(command.as_bytes());
    frame.push(0);
    Ok(frame)
}

/// Interprets the 2-byte response length prefix.
pub(crate) fn decode_length(prefix: [u8; 2]) -> Result<usize, DecodeError> {
    let length = i16::from_le_bytes(prefix);
    if length < 0 {
        return Err(DecodeError::NegativeLength(length));
    }
    Ok(length as usize)
}

/// Decodes a response payload (including its trailing NUL) into a [`Response`].
pub(crate) fn decode_response(payload: &[u8]) -> Result<Response, DecodeError> {
    let body = payload
        .strip_suffix(&[0])
        .ok_or(DecodeError::MissingTerminator)?;
    let text = std::str::from_utf8(body)?;

    let mut fields: HashMap<String, String> = form_urlencoded::parse(text.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let code = fields.remove("STATUS").ok_or(DecodeError::MissingStatus)?;
    let status = Status::from_code(&code).ok_or(DecodeError::UnknownStatus(code))?;

    Ok(Response { status, fields })
}

/// Decodes the `playerList` field: rows separated by `|`, the first row being
/// a CSV header that names the columns of the rest.
pub(crate) fn parse_player_list(list: &str) -> Result<Vec<Player>, DecodeError> {
    let mut rows = list.split('|');
    let headers: Vec<&str> = match rows.next() {
        Some(header) => header.split(',').collect(),
        None => return Ok(Vec::new()),
    };

    let mut players = Vec::new();
    for row in rows {
        let record: HashMap<&str, &str> = headers.iter().copied().zip(row.split(',')).collect();

        let status_code = field(&record, "ingameStatus")?;
        let status = PlayerStatus::from_code(status_code)
            .ok_or_else(|| DecodeError::UnknownPlayerStatus(status_code.to_string()))?;

        players.push(Player {
            id: numeric_field(&record, "cId")?,
            status,
            ping: numeric_field(&record, "nServerPing")?,
            name: unquote_plus(field(&record, "name")?)?,
            account_id: unquote_plus(field(&record, "playerId")?)?,
            profile_id: unquote_plus(field(&record, "profileId")?)?,
        });
    }
    Ok(players)
}

fn field<'a>(record: &HashMap<&str, &'a str>, name: &'static str) -> Result<&'a str, DecodeError> {
    record.get(name).copied().ok_or(DecodeError::MissingField(name))
}

fn numeric_field(record: &HashMap<&str, &str>, name: &'static str) -> Result<u32, DecodeError> {
    let value = field(record, name)?;
    value.parse().map_err(|_| DecodeError::InvalidNumber {
        field: name,
        value: value.to_string(),
    })
}

/// Percent-decodes a field value, with `+` standing for a space.
fn unquote_plus(value: &str) -> Result<String, DecodeError> {
    let spaced = value.replace('+', " ");
    let decoded = percent_decode_str(&spaced).decode_utf8()?;
    Ok(decoded.into_owned())
}
