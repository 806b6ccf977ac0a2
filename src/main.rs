// sudoku-peer - Headless peer with a line-oriented console

use clap::Parser;
use rand::Rng;
use sudoku_mesh::cli::{
    describe_game, render_grid, render_metrics, render_peers, render_traffic, Cli,
    ConsoleCommand,
};
use sudoku_mesh::{Node, NodeError, NodeHandle, SessionEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let (node, handle) = match Node::bind(cli.node_config()).await {
        Ok(pair) => pair,
        Err(err) => {
            error!("cannot start: {err}");
            return Err(err.into());
        }
    };
    let runtime = tokio::spawn(node.run());
    println!("listening as {}", handle.local_address());

    match &cli.join {
        Some(host) => {
            info!(%host, "joining existing game");
            handle.join(host.clone()).await?;
        }
        None => {
            let seed = cli
                .seed
                .unwrap_or_else(|| rand::thread_rng().gen_range(0..10_000));
            handle.start_game(seed).await?;
            println!("hosting game with seed {seed}");
        }
    }
    println!("{}", ConsoleCommand::usage());

    let mut events = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    if !run_command(&handle, &line).await? {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!("stdin closed: {err}");
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => announce(&handle, &event),
                Err(RecvError::Lagged(missed)) => warn!(missed, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    handle.stop().await;
    match runtime.await {
        Ok(result) => result?,
        Err(err) => warn!("node task failed: {err}"),
    }
    Ok(())
}

/// Execute one console line; returns false when the user quits
async fn run_command(handle: &NodeHandle, line: &str) -> Result<bool, NodeError> {
    let command = match ConsoleCommand::parse(line) {
        Ok(command) => command,
        Err(err) => {
            println!("{err}");
            return Ok(true);
        }
    };

    match command {
        ConsoleCommand::Set { row, col, value } => edit(handle, row, col, value).await?,
        ConsoleCommand::Clear { row, col } => edit(handle, row, col, 0).await?,
        ConsoleCommand::Show => show(handle),
        ConsoleCommand::Peers => println!("{}", render_peers(&handle.peers().await?)),
        ConsoleCommand::Stats => {
            println!("{}", render_metrics(&handle.metrics().await?));
            println!("{}", render_traffic(&handle.transport_stats().await?));
        }
        ConsoleCommand::Help => println!("{}", ConsoleCommand::usage()),
        ConsoleCommand::Quit => return Ok(false),
    }
    Ok(true)
}

async fn edit(handle: &NodeHandle, row: usize, col: usize, value: u8) -> Result<(), NodeError> {
    match handle.apply_local_edit(row, col, value).await {
        Ok(()) => Ok(()),
        Err(NodeError::Edit(err)) => {
            println!("{err}");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn show(handle: &NodeHandle) {
    match handle.game() {
        Some(game) => {
            println!("{}", describe_game(&game));
            print!("{}", render_grid(&game.puzzle, Some(&game.board)));
        }
        None => println!("waiting for game data"),
    }
}

fn announce(handle: &NodeHandle, event: &SessionEvent) {
    match event {
        SessionEvent::PeerJoined(peer) => println!("+ {peer}"),
        SessionEvent::PeerDeparted(peer) => println!("- {peer} left"),
        SessionEvent::PeerEvicted(peer) => println!("- {peer} timed out"),
        SessionEvent::Solved { seed } => println!("solved puzzle {seed}!"),
        SessionEvent::PuzzleRevealed => {
            println!("next puzzle:");
            show(handle);
        }
        SessionEvent::PuzzleChanged => {}
    }
}
