#![cfg(feature = "sync")]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rof_rcon_client::sync::RconClient;
use rof_rcon_client::{Config, Error, Reconnect, SessionState, Status};

const LOGIN: &str = "admin";
const PASSWORD: &str = "secret";

/// Binds a listener on an ephemeral port and runs `script` against it on a
/// background thread.
fn spawn_server<F>(script: F) -> u16
where
    F: FnOnce(TcpListener) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || script(listener));
    port
}

fn test_config(port: u16) -> Config {
    Config::new(LOGIN, PASSWORD)
        .host("127.0.0.1")
        .port(port)
        .connect_timeout(Duration::from_secs(1))
        .reconnect_delay(Duration::from_millis(1))
        .max_reconnect_attempts(3)
}

fn read_command(stream: &mut TcpStream) -> Option<String> {
    let mut prefix = [0u8; 2];
    stream.read_exact(&mut prefix).ok()?;
    let length = i16::from_le_bytes(prefix) as usize;
    let mut payload = vec![0u8; length];
    stream.read_exact(&mut payload).ok()?;
    assert_eq!(payload.pop(), Some(0), "request frame must end in NUL");
    Some(String::from_utf8(payload).unwrap())
}

fn respond(stream: &mut TcpStream, body: &str) {
    let mut frame = Vec::new();
    frame.extend_from_slice(&((body.len() + 1) as i16).to_le_bytes());
    frame.extend_from_slice(body.as_bytes());
    frame.push(0);
    stream.write_all(&frame).unwrap();
}

/// Reads the `auth` handshake and accepts it.
fn accept_auth(stream: &mut TcpStream) {
    let command = read_command(stream).unwrap();
    assert_eq!(command, format!("auth {LOGIN} {PASSWORD}"));
    respond(stream, "STATUS=1");
}

#[test]
fn connects_authenticates_and_executes() {
    let port = spawn_server(|listener| {
        let (mut stream, _) = listener.accept().unwrap();
        accept_auth(&mut stream);
        assert_eq!(read_command(&mut stream).unwrap(), "mystatus");
        respond(&mut stream, "STATUS=1&authed=1");
    });

    let mut client = RconClient::new(test_config(port)).unwrap();
    assert_eq!(client.state(), SessionState::Authenticated);

    let response = client.my_status().unwrap();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.get("authed"), Some("1"));
}

#[test]
fn rejected_auth_fails_construction() {
    let port = spawn_server(|listener| {
        let (mut stream, _) = listener.accept().unwrap();
        let _ = read_command(&mut stream).unwrap();
        respond(&mut stream, "STATUS=6");
    });

    let err = RconClient::new(test_config(port)).unwrap_err();
    match err {
        Error::Command { status, command } => {
            assert_eq!(status, Status::AuthIncorrect);
            assert_eq!(status.name(), "RCR_ERR_AUTH_INCORRECT");
            assert!(command.starts_with("auth "));
        }
        other => panic!("expected command error, got {other:?}"),
    }
}

#[test]
fn non_ok_status_does_not_reconnect() {
    // A single connection serves the whole test: if the error status had
    // triggered a reconnect, the follow-up command would hang on accept.
    let port = spawn_server(|listener| {
        let (mut stream, _) = listener.accept().unwrap();
        accept_auth(&mut stream);
        assert_eq!(read_command(&mut stream).unwrap(), "serverstatus");
        respond(&mut stream, "STATUS=8");
        assert_eq!(read_command(&mut stream).unwrap(), "mystatus");
        respond(&mut stream, "STATUS=1");
    });

    let mut client = RconClient::new(test_config(port)).unwrap();

    let err = client.get_server_status().unwrap_err();
    assert!(matches!(
        err,
        Error::Command { status: Status::ServerUser, .. }
    ));

    assert_eq!(client.my_status().unwrap().status(), Status::Ok);
}

#[test]
fn one_transport_failure_is_retried_transparently() {
    let port = spawn_server(|listener| {
        // First connection: accept auth, then drop mid-command.
        let (mut stream, _) = listener.accept().unwrap();
        accept_auth(&mut stream);
        let _ = read_command(&mut stream).unwrap();
        drop(stream);

        // Second connection: serve the retried command.
        let (mut stream, _) = listener.accept().unwrap();
        accept_auth(&mut stream);
        assert_eq!(read_command(&mut stream).unwrap(), "mystatus");
        respond(&mut stream, "STATUS=1&retried=yes");
    });

    let mut client = RconClient::new(test_config(port)).unwrap();

    let response = client.my_status().unwrap();
    assert_eq!(response.get("retried"), Some("yes"));
    assert_eq!(client.state(), SessionState::Authenticated);
}

#[test]
fn a_second_transport_failure_propagates() {
    let port = spawn_server(|listener| {
        for _ in 0..2 {
            let (mut stream, _) = listener.accept().unwrap();
            accept_auth(&mut stream);
            let _ = read_command(&mut stream).unwrap();
            drop(stream);
        }
    });

    let mut client = RconClient::new(test_config(port)).unwrap();

    let err = client.my_status().unwrap_err();
    assert!(err.is_transport(), "expected transport error, got {err:?}");
}

#[test]
fn reconnect_stops_after_max_attempts() {
    let attempts = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&attempts);
    let port = spawn_server(move |listener| {
        // Accept and immediately drop every connection so each attempt fails
        // at the authentication read.
        for stream in listener.incoming().flatten() {
            seen.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let config = test_config(port).auto_connect(false);
    let mut client = RconClient::new(config).unwrap();
    assert_eq!(client.state(), SessionState::Disconnected);

    assert_eq!(client.reconnect().unwrap(), Reconnect::GaveUp);
    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    // The counter persists after exhaustion, so another sequence gives up
    // without dialing again.
    assert_eq!(client.reconnect().unwrap(), Reconnect::GaveUp);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn missing_player_list_field_means_no_players() {
    let port = spawn_server(|listener| {
        let (mut stream, _) = listener.accept().unwrap();
        accept_auth(&mut stream);
        assert_eq!(read_command(&mut stream).unwrap(), "getplayerlist");
        respond(&mut stream, "STATUS=1");
    });

    let mut client = RconClient::new(test_config(port)).unwrap();
    assert!(client.get_player_list().unwrap().is_empty());
}

#[test]
fn player_list_rows_decode() {
    let port = spawn_server(|listener| {
        let (mut stream, _) = listener.accept().unwrap();
        accept_auth(&mut stream);
        assert_eq!(read_command(&mut stream).unwrap(), "getplayerlist");
        respond(
            &mut stream,
            "STATUS=1&playerList=cId,ingameStatus,nServerPing,name,playerId,profileId\
             |1,3,42,John+Doe,acct1,prof1|2,0,120,Ghost,acct2,prof2",
        );
    });

    let mut client = RconClient::new(test_config(port)).unwrap();

    let players = client.get_player_list().unwrap();
    assert_eq!(players.len(), 2);
    assert_eq!(players[0].id, 1);
    assert_eq!(players[0].name, "John Doe");
    assert_eq!(players[0].status.name(), "PS_DOGFIGHT_READY");
    assert_eq!(players[0].ping, 42);
    assert_eq!(players[0].account_id, "acct1");
    assert_eq!(players[0].profile_id, "prof1");
    assert_eq!(players[1].status.name(), "PS_SPECTATOR");
}

#[test]
fn console_log_requires_the_console_field() {
    let port = spawn_server(|listener| {
        let (mut stream, _) = listener.accept().unwrap();
        accept_auth(&mut stream);

        assert_eq!(read_command(&mut stream).unwrap(), "getconsole");
        respond(&mut stream, "STATUS=1&console=mission+started%0A");

        assert_eq!(read_command(&mut stream).unwrap(), "getconsole");
        respond(&mut stream, "STATUS=1");
    });

    let mut client = RconClient::new(test_config(port)).unwrap();

    assert_eq!(client.get_console_log().unwrap(), "mission started\n");

    let err = client.get_console_log().unwrap_err();
    assert!(matches!(
        err,
        Error::Decode(rof_rcon_client::DecodeError::MissingField("console"))
    ));
}

#[test]
fn command_wrappers_render_exact_wire_strings() {
    use rof_rcon_client::PlayerSelector;

    let port = spawn_server(|listener| {
        let (mut stream, _) = listener.accept().unwrap();
        accept_auth(&mut stream);

        for expected in [
            "kick name Bob",
            "banuser cid 5",
            "unbanall",
            "serverinput bridge_down",
            "chatmsg 0 -1 welcome",
            "opensds missions/dogfight.sds",
            "cutchatlog",
        ] {
            assert_eq!(read_command(&mut stream).unwrap(), expected);
            respond(&mut stream, "STATUS=1");
        }
    });

    let mut client = RconClient::new(test_config(port)).unwrap();

    client.kick(PlayerSelector::Name("Bob")).unwrap();
    client.ban(PlayerSelector::ClientId(5), true).unwrap();
    client.unban_all().unwrap();
    client.server_input("bridge_down").unwrap();
    client.chat_to_all("welcome").unwrap();
    client.open_sds("missions/dogfight.sds").unwrap();
    client.cut_chat_log().unwrap();
}
