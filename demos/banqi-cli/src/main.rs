//! Terminal banqi client.
//!
//! Connects to a pao game server, prints what happens, and forwards input:
//!
//! ```text
//! /move a1-a2    make a move
//! /board         ask for a fresh board
//! /resign        resign the game
//! /quit          leave
//! anything else  chat
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use pao_client::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "banqi-cli", about = "Play banqi on a pao server")]
struct Args {
    /// Game server, `host:port` or a `ws://` / `wss://` base
    #[arg(long, env = "PAO_SERVER", default_value = "localhost:2000")]
    server: String,

    /// Name shown to your opponent
    #[arg(long, env = "PAO_NAME")]
    name: String,

    /// Game to join
    #[arg(long = "game", env = "PAO_GAME")]
    game_id: String,

    /// Where remembered sessions are kept
    #[arg(long, env = "PAO_SESSION_FILE", default_value = "pao-sessions.json")]
    session_file: PathBuf,

    /// Per-dial timeout in seconds
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banqi_cli=info,pao_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let store = FileSessionStore::open(&args.session_file)?;
    let (client, mut events) = GameClient::builder()
        .server(&args.server)
        .connect_timeout(Duration::from_secs(args.connect_timeout))
        .build(WebSocketConnector, store);

    tracing::info!(server = %args.server, game = %args.game_id, "joining");
    let game_id = GameId::from(args.game_id.as_str());
    client
        .connect(ConnectionParams::new(&args.name, game_id))
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if print_event(&event) {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !forward(&client, line.trim()).await? {
                    break;
                }
            }
        }
    }

    client.shutdown().await?;
    Ok(())
}

/// Sends one line of input. Returns `false` when the user wants out.
async fn forward(client: &GameClient, line: &str) -> Result<bool, ClientError> {
    match line.split_once(' ').unwrap_or((line, "")) {
        ("", _) => {}
        ("/quit", _) => return Ok(false),
        ("/move", mv) if !mv.trim().is_empty() => {
            client.send_move(mv.trim()).await?;
        }
        ("/move", _) => println!("usage: /move <from>-<to>"),
        ("/board", _) => client.request_board().await?,
        ("/resign", _) => client.resign().await?,
        _ => client.chat(line).await?,
    }
    Ok(true)
}

/// Prints an event. Returns `true` once there is nothing left to wait for.
fn print_event(event: &ClientEvent) -> bool {
    match event {
        ClientEvent::StateChanged(state) => tracing::debug!(%state, "state"),
        ClientEvent::Connected => println!("* connected"),
        ClientEvent::Reconnecting { .. } => {}
        ClientEvent::GaveUp { .. } => return true,
        ClientEvent::Game(GameEvent::Chat(line)) => {
            println!("[{}] {}: {}", line.color, line.author, line.text);
        }
        ClientEvent::Game(GameEvent::ColorAssigned(color)) => {
            println!("* you play {color}");
        }
        ClientEvent::Game(GameEvent::BoardReplaced(snapshot)) => {
            print_board(snapshot);
        }
        ClientEvent::Game(GameEvent::GameOver(outcome)) => {
            let verdict = if outcome.you_win { "You win" } else { "You lose" };
            println!("* {verdict}: {} ({})", outcome.message, outcome.reason);
        }
        ClientEvent::Game(
            GameEvent::SessionSaved { .. } | GameEvent::Rejoined,
        ) => {}
    }
    false
}

fn print_board(snapshot: &GameSnapshot) {
    if let Some(rows) = &snapshot.board {
        for row in rows {
            let cells: Vec<&str> = row
                .iter()
                .map(|c| if c.is_empty() { ".." } else { c.as_str() })
                .collect();
            println!("  {}", cells.join(" "));
        }
    }
    if let Some(dead) = snapshot.dead.as_ref().filter(|d| !d.is_empty()) {
        println!("  captured: {}", dead.join(" "));
    }
    if snapshot.your_turn {
        println!("* your move");
    }
}
