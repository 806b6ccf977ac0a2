// CLI - Command line arguments and console commands for a headless peer

use crate::game::{GameSnapshot, Grid, SyncConfig, SIZE};
use crate::node::NodeConfig;
use crate::sync::{MetricsSnapshot, PeerAddress, PeerInfo, SessionConfig};
use crate::transport::{TransportConfig, TransportStats};
use clap::Parser;
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

/// Peer-to-peer shared sudoku over UDP
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Join the mesh through this peer instead of hosting a new game
    #[arg(long, value_name = "IP:PORT")]
    pub join: Option<PeerAddress>,

    /// IP other peers should use to reach us (discovered when omitted)
    #[arg(long, value_name = "IP")]
    pub advertise: Option<String>,

    /// Interface to bind the UDP socket on
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Lowest local port to try
    #[arg(long, default_value_t = 49152)]
    pub port_min: u16,

    /// Highest local port to try
    #[arg(long, default_value_t = 65535)]
    pub port_max: u16,

    /// Seed for a hosted game (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Heartbeat period in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub ping_interval_ms: u64,

    /// Silence in milliseconds after which a peer is evicted
    #[arg(long, default_value_t = 10_000)]
    pub eviction_timeout_ms: u64,
}

impl Cli {
    pub fn node_config(&self) -> NodeConfig {
        let transport = TransportConfig::new()
            .with_bind_host(&self.bind)
            .with_port_range(self.port_min, self.port_max);
        let session = SessionConfig::new()
            .with_ping_interval(Duration::from_millis(self.ping_interval_ms))
            .with_eviction_timeout(Duration::from_millis(self.eviction_timeout_ms));

        let config = NodeConfig::new()
            .with_transport(transport)
            .with_session(session)
            .with_sync(SyncConfig::default());
        match &self.advertise {
            Some(host) => config.with_advertise_host(host),
            None => config,
        }
    }
}

// ============================================================================
// CONSOLE COMMANDS
// ============================================================================

const USAGE: &str =
    "commands: set/s <row> <col> <value>, clear/c <row> <col>, show/v, peers/p, stats/m, help/h, quit/q";

/// Console input errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("empty command")]
    Empty,

    #[error("{0} is not a number")]
    NotANumber(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command `{0}`. {USAGE}")]
    Unknown(String),
}

/// One line typed at the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Write `value` at (row, col); rows and columns are 1-based at the prompt
    Set { row: usize, col: usize, value: u8 },
    Clear { row: usize, col: usize },
    Show,
    Peers,
    Stats,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse a line. Case-insensitive; rows and columns are entered 1-9.
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = parts.first() else {
            return Err(ConsoleError::Empty);
        };

        let name = first.to_lowercase();
        let name = match name.as_str() {
            "s" => "set",
            "c" => "clear",
            "v" | "print" => "show",
            "p" => "peers",
            "m" | "metrics" => "stats",
            "h" | "?" => "help",
            "q" | "exit" => "quit",
            other => other,
        };

        match (name, parts.len()) {
            ("set", 4) => Ok(Self::Set {
                row: cell_index(parts[1])?,
                col: cell_index(parts[2])?,
                value: number(parts[3])?,
            }),
            ("set", _) => Err(ConsoleError::Usage("set <row> <col> <value>")),
            ("clear", 3) => Ok(Self::Clear {
                row: cell_index(parts[1])?,
                col: cell_index(parts[2])?,
            }),
            ("clear", _) => Err(ConsoleError::Usage("clear <row> <col>")),
            ("show", 1) => Ok(Self::Show),
            ("peers", 1) => Ok(Self::Peers),
            ("stats", 1) => Ok(Self::Stats),
            ("help", _) => Ok(Self::Help),
            ("quit", _) => Ok(Self::Quit),
            _ => Err(ConsoleError::Unknown(first.to_string())),
        }
    }

    pub fn usage() -> &'static str {
        USAGE
    }
}

fn number<T: std::str::FromStr>(text: &str) -> Result<T, ConsoleError> {
    text.parse()
        .map_err(|_| ConsoleError::NotANumber(text.to_string()))
}

/// 1-based console index to 0-based grid index; 0 maps past the grid
fn cell_index(text: &str) -> Result<usize, ConsoleError> {
    let index: usize = number(text)?;
    Ok(index.checked_sub(1).unwrap_or(SIZE))
}

// ============================================================================
// RENDERING
// ============================================================================

/// Draw a grid as text; blanks are dots and fixed cells are unmarked
pub fn render_grid(puzzle: &Grid, fixed: Option<&Grid>) -> String {
    let mut out = String::new();
    for (r, row) in puzzle.iter().enumerate() {
        if r > 0 && r % 3 == 0 {
            out.push_str("------+-------+------\n");
        }
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(c, &digit)| {
                let mut cell = match digit {
                    0 => ".".to_string(),
                    d => d.to_string(),
                };
                if c > 0 && c % 3 == 0 {
                    cell.insert_str(0, "| ");
                }
                let editable = fixed.map_or(false, |board| board[r][c] == 0);
                if editable && digit != 0 {
                    cell.push('*');
                } else {
                    cell.push(' ');
                }
                cell
            })
            .collect();
        out.push_str(cells.concat().trim_end());
        out.push('\n');
    }
    out
}

/// One-line summary of a game
pub fn describe_game(game: &GameSnapshot) -> String {
    let blanks = game.puzzle.iter().flatten().filter(|&&d| d == 0).count();
    let state = if game.terminal { "solved, next puzzle pending" } else { "in play" };
    format!("seed {} ({state}, {blanks} blank)", game.seed)
}

pub fn render_peers(peers: &[PeerInfo]) -> String {
    if peers.is_empty() {
        return "no peers".to_string();
    }
    let mut out = String::new();
    for peer in peers {
        let rtt = peer
            .last_rtt()
            .map(|rtt| format!("{:.1} ms", rtt.as_secs_f64() * 1000.0))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "{:<24} rtt {rtt}", peer.address().to_string());
    }
    out.trim_end().to_string()
}

pub fn render_metrics(metrics: &MetricsSnapshot) -> String {
    let average = metrics
        .average_latency
        .map(|secs| format!("{:.1} ms", secs * 1000.0))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "messages {} | throughput {:.2}/s | avg latency {average} | window {:.0}s",
        metrics.messages_count, metrics.throughput, metrics.window_secs
    )
}

pub fn render_traffic(stats: &TransportStats) -> String {
    format!(
        "datagrams out {} ({} B) | in {} ({} B) | send errors {}",
        stats.datagrams_sent,
        stats.bytes_sent,
        stats.datagrams_received,
        stats.bytes_received,
        stats.send_errors
    )
}
