use ansi_term::Colour::{Fixed, Green, Yellow};
use clap::Parser;
use log::{error, LevelFilter};
use rof_rcon_client::sync::RconClient;
use rof_rcon_client::{Config, Error, PlayerSelector};
use simplelog::{ColorChoice, Config as LogConfig, TermLogger, TerminalMode};
use std::fmt::{Display, Formatter};
use std::io::{BufRead, Write};

mod shell;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Address of the DServer console, e.g. `127.0.0.1:8991`.
    address: String,

    /// RCON login name.
    #[clap(short, long)]
    login: String,

    /// Print protocol-level debug logging.
    #[clap(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    TermLogger::init(
        if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .unwrap();

    // Try to split off a port, defaulting to the DServer default 8991.
    let (host, port) = match args.address.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => {
                eprintln!("Invalid address: {}", args.address);
                std::process::exit(1);
            }
        },
        None => (args.address.clone(), 8991),
    };

    print!("{}@{}:{}'s password: ", args.login, host, port);
    std::io::stdout().flush().unwrap();
    let password = rpassword::read_password().unwrap();

    let config = Config::new(args.login, password)
        .host(host.clone())
        .port(port);

    let mut client = match RconClient::new(config) {
        Ok(client) => client,
        Err(Error::Command { status, .. }) => {
            eprintln!("Authentication failed: {status}");
            std::process::exit(1);
        }
        Err(err) => {
            error!("Connection failed: {}", err);
            std::process::exit(1);
        }
    };

    println!(
        "Connected. View builtins with `!help`. {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let prompt = Prompt { host, port };
    repl_loop(&mut client, prompt)
}

#[derive(Clone)]
struct Prompt {
    host: String,
    port: u16,
}

impl Display for Prompt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}> ", Fixed(10).paint(format!("{}:{}", self.host, self.port)))
    }
}

fn repl_loop(client: &mut RconClient, prompt: Prompt) -> ! {
    let stdin = std::io::stdin();
    let mut input_lines = stdin.lock().lines();

    loop {
        print!("{prompt}");
        std::io::stdout().flush().unwrap();

        let line = match input_lines.next() {
            Some(line) => line.unwrap(),
            None => std::process::exit(0),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = if let Some(builtin) = line.strip_prefix('!') {
            run_builtin(client, builtin)
        } else {
            shell::run_raw(client, line)
        };

        match result {
            Ok(()) => {}
            Err(err) if err.is_transport() => {
                error!("Connection closed: {}", err);
                std::process::exit(1);
            }
            Err(err) => eprintln!("An error occurred: {err}"),
        }
    }
}

fn run_builtin(client: &mut RconClient, builtin: &str) -> rof_rcon_client::Result<()> {
    if builtin == "help" {
        println!(
            "{} {}",
            Green.paint(env!("CARGO_PKG_NAME")),
            env!("CARGO_PKG_VERSION")
        );
        println!();
        println!("{}", Yellow.paint("BUILTINS"));
        println!("    !help                View this help listing");
        println!("    !players             List the connected players");
        println!("    !console             Print the server console buffer");
        println!("    !status              Print the server status fields");
        println!("    !kick {}       Kick a player by nickname", Green.paint("<NAME>"));
        println!("    !quit                Disconnect and exit");
        println!(
            "    {}  Send a raw command to the server",
            Green.paint("<COMMAND> [ARGS...]")
        );
        Ok(())
    } else if builtin == "players" {
        let players = client.get_player_list()?;
        if players.is_empty() {
            println!("Nobody is connected.");
        }
        for player in players {
            println!(
                "  #{:<3} {:<24} {:>4}ms  {}",
                player.id, player.name, player.ping, player.status
            );
        }
        Ok(())
    } else if builtin == "console" {
        println!("{}", client.get_console_log()?);
        Ok(())
    } else if builtin == "status" {
        let response = client.get_server_status()?;
        shell::print_fields(&response);
        Ok(())
    } else if let Some(name) = builtin.strip_prefix("kick ") {
        client.kick(PlayerSelector::Name(name.trim()))?;
        println!("Kicked {}.", name.trim());
        Ok(())
    } else if builtin == "quit" {
        client.disconnect();
        std::process::exit(0);
    } else {
        eprintln!("Unknown builtin.");
        Ok(())
    }
}
