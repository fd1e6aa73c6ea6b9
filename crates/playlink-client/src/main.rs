//! Playlink client entry point.
//!
//! Wires configuration, the TCP transport factory, the session controller and
//! its runtime together, then drives the session from a line-oriented command
//! prompt on stdin.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config_from()        -- TOML config, client id generated on first run
//!  └─ SessionController::new()  -- TcpTransportFactory + LogListener/StatusBoard
//!  └─ SessionRuntime::run()     -- spawned; serializes all controller access
//!  └─ stdin command loop        -- connect / play / vol 40 / status / quit
//!       └─ SessionHandle        -- non-blocking commands into the runtime
//! ```
//!
//! `quit`, end of input and Ctrl-C all end with a best-effort logoff, a short
//! grace period and a disconnect.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use playlink_client::application::runtime::{SessionHandle, SessionRuntime};
use playlink_client::application::session::SessionController;
use playlink_client::infrastructure::{
    network::TcpTransportFactory,
    storage::config::{config_file_path, load_config_from, save_config_to},
    ui_bridge::{FanoutListener, LogListener, StatusBoard},
};
use playlink_core::protocol::messages::PlayerCommand;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Remote control for a media player over the Playlink protocol.
#[derive(Debug, Parser)]
#[command(name = "playlink-client", version)]
struct Cli {
    /// Path of the TOML config file.  Defaults to the platform config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server to connect to on start-up (`host:port`).  Overrides the config.
    #[arg(long, env = "PLAYLINK_TARGET")]
    target: Option<String>,

    /// Log filter used when `RUST_LOG` is not set.  Overrides the config.
    #[arg(long)]
    log_level: Option<String>,
}

// ── Interactive commands ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    Connect(Option<String>),
    Disconnect,
    Control(PlayerCommand, i16),
    Status,
    Quit,
}

const HELP: &str =
    "commands: connect [host:port] | disconnect | play | stop | next | prev | vol <0-100> | seek <secs> | status | quit";

/// Parses one input line.  Blank lines yield `Ok(None)`.
fn parse_command(line: &str) -> Result<Option<CliCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let numeric = |name: &str| -> Result<i16, String> {
        arg.ok_or_else(|| format!("{name} needs a number"))?
            .parse::<i16>()
            .map_err(|e| format!("{name}: {e}"))
    };

    let cmd = match verb {
        "connect" => CliCommand::Connect(arg.map(str::to_string)),
        "disconnect" => CliCommand::Disconnect,
        "play" | "pause" => CliCommand::Control(PlayerCommand::PlayPause, 0),
        "stop" => CliCommand::Control(PlayerCommand::Stop, 0),
        "next" => CliCommand::Control(PlayerCommand::Next, 0),
        "prev" => CliCommand::Control(PlayerCommand::Previous, 0),
        "vol" => CliCommand::Control(PlayerCommand::Volume, numeric("vol")?),
        "seek" => CliCommand::Control(PlayerCommand::Seek, numeric("seek")?),
        "status" => CliCommand::Status,
        "quit" | "exit" => CliCommand::Quit,
        other => return Err(format!("unknown command {other:?}; {HELP}")),
    };
    Ok(Some(cmd))
}

async fn execute(
    cmd: CliCommand,
    session: &SessionHandle,
    board: &StatusBoard,
    last_target: &mut Option<String>,
) -> anyhow::Result<()> {
    match cmd {
        CliCommand::Connect(target) => {
            if let Some(target) = target {
                *last_target = Some(target);
            }
            match last_target {
                Some(target) => session.connect(target.clone())?,
                None => println!("no target given and none configured"),
            }
        }
        CliCommand::Disconnect => {
            session.disconnect()?;
            board.mark_disconnected();
        }
        CliCommand::Control(command, param) => {
            if !session.is_ready() {
                println!("not connected; request dropped");
            }
            session.control(command, param)?;
        }
        CliCommand::Status => {
            let status = board.snapshot();
            let player = session.player_snapshot().await?;
            println!(
                "{:?}{}",
                status.status,
                status.message.map(|m| format!(" ({m})")).unwrap_or_default()
            );
            if let Some(name) = &player.player {
                println!(
                    "{name}: {:?}, volume {}%, repeat {}, shuffle {}",
                    player.state, player.volume, player.repeat, player.shuffle
                );
            }
            if let Some(track) = &player.track {
                println!("now playing: {} - {} ({})", track.artist, track.title, track.album);
            }
        }
        CliCommand::Quit => {}
    }
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path()?,
    };
    let mut config = load_config_from(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let level = cli
        .log_level
        .unwrap_or_else(|| config.client.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let (client_id, generated) = config.ensure_client_id();
    if generated {
        info!(%client_id, "generated client id");
        if let Err(e) = save_config_to(&config, &config_path) {
            warn!("could not persist client id: {e}");
        }
    }

    info!(name = %config.client.name, "Playlink client starting");

    // ── Session wiring ────────────────────────────────────────────────────────
    let board = StatusBoard::new();
    let listener = FanoutListener::new().with(LogListener).with(board.clone());
    let factory = TcpTransportFactory::new(config.session.transport_config());
    let (mut controller, events) =
        SessionController::new(config.client_info(), Box::new(factory), Box::new(listener));
    if let Some(timeout) = config.session.handshake_timeout() {
        controller = controller.with_handshake_timeout(timeout);
    }
    let (runtime, session) = SessionRuntime::new(controller, events);
    let runtime_task = tokio::spawn(runtime.run());

    let mut last_target = cli.target.or_else(|| config.session.default_target.clone());
    if let Some(target) = &last_target {
        session.connect(target.clone())?;
    }

    // ── Command loop ──────────────────────────────────────────────────────────
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(CliCommand::Quit)) => break,
                    Ok(Some(cmd)) => execute(cmd, &session, &board, &mut last_target).await?,
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("received Ctrl+C"),
                    Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
                }
                break;
            }
        }
    }

    info!("shutting down");
    session.shutdown(config.session.logoff_grace()).await?;
    runtime_task.await.context("session runtime panicked")?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
