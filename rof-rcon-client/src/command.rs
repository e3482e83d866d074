use std::fmt;

/// Ways the server can identify a player in `kick` and `ban` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSelector<'a> {
    /// In-game nickname.
    Name(&'a str),
    /// Client id assigned for the current connection (`cId`).
    ClientId(u32),
    /// Account login.
    Login(&'a str),
    /// Profile id string.
    ProfileIds(&'a str),
}

impl fmt::Display for PlayerSelector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerSelector::Name(name) => write!(f, "name {name}"),
            PlayerSelector::ClientId(cid) => write!(f, "cid {cid}"),
            PlayerSelector::Login(login) => write!(f, "playerid {login}"),
            PlayerSelector::ProfileIds(ids) => write!(f, "profileid {ids}"),
        }
    }
}

/// Recipient of a `chatmsg` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatTarget {
    All,
    Coalition(i32),
    Country(i32),
    Client(i32),
}

/// One remote-console command, rendered to its exact wire string by
/// [`Display`](fmt::Display).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Auth { login: &'a str, password: &'a str },
    MyStatus,
    GetConsole,
    GetPlayerList,
    ServerStatus,
    SpsGet,
    SpsReset,
    Shutdown,
    OpenSds { path: &'a str },
    CloseSds,
    Kick(PlayerSelector<'a>),
    Ban { who: PlayerSelector<'a>, ban_account: bool },
    UnbanAll,
    ServerInput { trigger: &'a str },
    SendStatNow,
    CutChatLog,
    Chat { target: ChatTarget, msg: &'a str },
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Auth { login, password } => write!(f, "auth {login} {password}"),
            Command::MyStatus => f.write_str("mystatus"),
            Command::GetConsole => f.write_str("getconsole"),
            Command::GetPlayerList => f.write_str("getplayerlist"),
            Command::ServerStatus => f.write_str("serverstatus"),
            Command::SpsGet => f.write_str("spsget"),
            Command::SpsReset => f.write_str("spsreset"),
            Command::Shutdown => f.write_str("shutdown"),
            Command::OpenSds { path } => write!(f, "opensds {path}"),
            Command::CloseSds => f.write_str("closesds"),
            Command::Kick(who) => write!(f, "kick {who}"),
            Command::Ban { who, ban_account } => {
                let verb = if *ban_account { "banuser" } else { "ban" };
                write!(f, "{verb} {who}")
            }
            Command::UnbanAll => f.write_str("unbanall"),
            Command::ServerInput { trigger } => write!(f, "serverinput {trigger}"),
            Command::SendStatNow => f.write_str("sendstatnow"),
            Command::CutChatLog => f.write_str("cutchatlog"),
            Command::Chat { target, msg } => match target {
                ChatTarget::All => write!(f, "chatmsg 0 -1 {msg}"),
                ChatTarget::Coalition(coalition) => write!(f, "chatmsg 1 {coalition} {msg}"),
                ChatTarget::Country(country) => write!(f, "chatmsg 2 {country} {msg}"),
                ChatTarget::Client(client) => write!(f, "chatmsg 3 {client} {msg}"),
            },
        }
    }
}
