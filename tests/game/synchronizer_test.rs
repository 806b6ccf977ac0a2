// Synchronizer Tests
// Tests for snapshot catch-up, move propagation and the win flow

use crate::common::{addr, Mesh};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use sudoku_mesh::game::{
    BacktrackingGenerator, EditError, Grid, StateSynchronizer, SyncConfig, SIZE,
};
use sudoku_mesh::sync::{AskGamedata, Envelope, Gamedata, Move, PeerAddress, SessionConfig, SessionEvent};

struct Player {
    address: PeerAddress,
    sync: StateSynchronizer,
}

fn player(mesh: &mut Mesh, port: u16, generator: BacktrackingGenerator) -> Player {
    let sync = StateSynchronizer::with_generator(SyncConfig::default(), Arc::new(generator));
    let installer = sync.clone();
    let address = mesh.add_node_with(port, SessionConfig::default(), move |session| {
        installer.install(session)
    });
    Player { address, sync }
}

fn host(mesh: &mut Mesh, port: u16, seed: u64, generator: BacktrackingGenerator) -> Player {
    let host = player(mesh, port, generator);
    let sync = host.sync.clone();
    mesh.session_mut(&host.address)
        .with_context(|ctx| sync.start_game(ctx, seed));
    host
}

fn editable_cells(board: &Grid) -> Vec<(usize, usize)> {
    (0..SIZE)
        .flat_map(|r| (0..SIZE).map(move |c| (r, c)))
        .filter(|&(r, c)| board[r][c] == 0)
        .collect()
}

fn edit(mesh: &mut Mesh, player: &Player, row: usize, col: usize, value: u8) -> Result<(), EditError> {
    let sync = player.sync.clone();
    mesh.session_mut(&player.address)
        .with_context(|ctx| sync.apply_local_edit(ctx, row, col, value))
}

/// Host plus a joiner that has already received its snapshot
fn synced_pair() -> (Mesh, Player, Player) {
    let mut mesh = Mesh::new();
    let a = host(&mut mesh, 5001, 314, BacktrackingGenerator::new());
    let b = player(&mut mesh, 5002, BacktrackingGenerator::new());
    mesh.session_mut(&b.address).hello(&a.address);
    mesh.run_until_quiet(16);
    mesh.advance(Duration::from_millis(50));
    mesh.run_until_quiet(16);
    (mesh, a, b)
}

// ============================================================================
// SNAPSHOT CATCH-UP
// ============================================================================

#[test]
fn test_joiner_receives_snapshot_after_delay() {
    let mut mesh = Mesh::new();
    let a = host(&mut mesh, 5001, 314, BacktrackingGenerator::new());
    let b = player(&mut mesh, 5002, BacktrackingGenerator::new());

    mesh.session_mut(&b.address).hello(&a.address);
    mesh.run_until_quiet(16);
    assert!(!b.sync.has_game(), "request is deferred, not immediate");
    assert_eq!(b.sync.pending_requests(), 1);

    mesh.advance(Duration::from_millis(50));
    mesh.run_until_quiet(16);

    assert_eq!(b.sync.fixed_board(), a.sync.fixed_board());
    assert_eq!(b.sync.current_puzzle(), a.sync.current_puzzle());
    assert_eq!(b.sync.pending_requests(), 0);
    let gamedata = mesh.delivered_kind("gamedata");
    assert_eq!(gamedata.len(), 1);
    assert_eq!(gamedata[0].envelope.decode::<Gamedata>().unwrap().seed, 314);
}

#[test]
fn test_snapshot_carries_edits_in_progress() {
    let mut mesh = Mesh::new();
    let a = host(&mut mesh, 5001, 9, BacktrackingGenerator::new());
    let (r, c) = editable_cells(&a.sync.fixed_board().unwrap())[0];
    edit(&mut mesh, &a, r, c, 4).unwrap();

    let b = player(&mut mesh, 5002, BacktrackingGenerator::new());
    mesh.session_mut(&b.address).hello(&a.address);
    mesh.run_until_quiet(16);
    mesh.advance(Duration::from_millis(50));
    mesh.run_until_quiet(16);

    assert_eq!(b.sync.current_puzzle().unwrap()[r][c], 4);
}

#[test]
fn test_host_does_not_request_snapshot() {
    let (mesh, _a, _b) = synced_pair();
    assert_eq!(mesh.delivered_kind("ask_gamedata").len(), 1);
}

#[test]
fn test_early_snapshot_cancels_pending_request() {
    let mut mesh = Mesh::new();
    let a = host(&mut mesh, 5001, 314, BacktrackingGenerator::new());
    let b = player(&mut mesh, 5002, BacktrackingGenerator::new());
    mesh.session_mut(&b.address).hello(&a.address);
    mesh.run_until_quiet(16);
    assert_eq!(b.sync.pending_requests(), 1);

    let snapshot = Gamedata {
        seed: 314,
        puzzle: a.sync.current_puzzle().unwrap(),
    };
    mesh.session_mut(&b.address)
        .dispatch(&Envelope::from_payload(&snapshot).unwrap());
    assert_eq!(b.sync.pending_requests(), 0);

    mesh.advance(Duration::from_secs(1));
    mesh.run_until_quiet(16);
    assert!(mesh.delivered_kind("ask_gamedata").is_empty());
}

#[test]
fn test_fired_requests_are_not_tracked_forever() {
    let mut mesh = Mesh::new();
    let b = player(&mut mesh, 5002, BacktrackingGenerator::new());
    let silent_one = mesh.add_node(5003);
    let silent_two = mesh.add_node(5004);

    mesh.session_mut(&b.address).hello(&silent_one);
    mesh.run_until_quiet(16);
    mesh.advance(Duration::from_millis(50));
    mesh.run_until_quiet(16);
    assert_eq!(mesh.delivered_kind("ask_gamedata").len(), 1);
    assert!(!b.sync.has_game());

    mesh.session_mut(&b.address).hello(&silent_two);
    mesh.run_until_quiet(16);

    assert_eq!(b.sync.pending_requests(), 1, "only the unsent request is kept");
}

#[test]
fn test_ask_without_game_is_ignored() {
    let mut mesh = Mesh::new();
    let b = player(&mut mesh, 5002, BacktrackingGenerator::new());

    let ask = AskGamedata::new(&addr(5001));
    mesh.session_mut(&b.address).dispatch(&Envelope::from_payload(&ask).unwrap());

    assert!(mesh.session_mut(&b.address).drain_outbox().is_empty());
}

#[test]
fn test_malformed_snapshot_ignored() {
    let mut mesh = Mesh::new();
    let b = player(&mut mesh, 5002, BacktrackingGenerator::new());

    let mut rows = vec![vec![0; SIZE]; SIZE];
    rows[0][0] = 42;
    let bad = Envelope::from_value(json!({"kind": "gamedata", "seed": 1, "puzzle": rows})).unwrap();
    mesh.session_mut(&b.address).dispatch(&bad);
    let short = Envelope::from_value(json!({"kind": "gamedata", "seed": 1, "puzzle": [[1, 2]]})).unwrap();
    mesh.session_mut(&b.address).dispatch(&short);

    assert!(!b.sync.has_game());
}

// ============================================================================
// MOVES
// ============================================================================

#[test]
fn test_local_edit_reaches_every_peer() {
    let (mut mesh, a, b) = synced_pair();
    let (r, c) = editable_cells(&a.sync.fixed_board().unwrap())[0];

    edit(&mut mesh, &b, r, c, 6).unwrap();
    mesh.run_until_quiet(16);

    assert_eq!(a.sync.current_puzzle().unwrap()[r][c], 6);
    assert_eq!(a.sync.current_puzzle(), b.sync.current_puzzle());
    assert!(mesh.take_events(&a.address).contains(&SessionEvent::PuzzleChanged));
}

#[test]
fn test_fixed_cell_edit_rejected_and_not_sent() {
    let (mut mesh, a, _b) = synced_pair();
    let board = a.sync.fixed_board().unwrap();
    let (r, c) = (0..SIZE)
        .flat_map(|r| (0..SIZE).map(move |c| (r, c)))
        .find(|&(r, c)| board[r][c] != 0)
        .unwrap();

    assert_eq!(edit(&mut mesh, &a, r, c, 1), Err(EditError::FixedCell { row: r, col: c }));
    assert!(mesh.session_mut(&a.address).drain_outbox().is_empty());
}

#[test]
fn test_remote_move_on_fixed_cell_dropped() {
    let (mut mesh, a, b) = synced_pair();
    let board = a.sync.fixed_board().unwrap();
    let (r, c) = (0..SIZE)
        .flat_map(|r| (0..SIZE).map(move |c| (r, c)))
        .find(|&(r, c)| board[r][c] != 0)
        .unwrap();
    let before = a.sync.current_puzzle();

    let forged = Move::new(r, c, board[r][c] % 9 + 1, &b.address);
    mesh.session_mut(&a.address).dispatch(&Envelope::from_payload(&forged).unwrap());

    assert_eq!(a.sync.current_puzzle(), before);
}

#[test]
fn test_edit_without_game() {
    let mut mesh = Mesh::new();
    let b = player(&mut mesh, 5002, BacktrackingGenerator::new());

    assert_eq!(edit(&mut mesh, &b, 0, 0, 1), Err(EditError::NoGame));
}

#[test]
fn test_move_from_unknown_sender_onboards_instead_of_applying() {
    let mut mesh = Mesh::new();
    let a = host(&mut mesh, 5001, 77, BacktrackingGenerator::new());
    let stranger = addr(5999);
    let (r, c) = editable_cells(&a.sync.fixed_board().unwrap())[0];
    let before = a.sync.current_puzzle();

    let mv = Move::new(r, c, 3, &stranger);
    mesh.session_mut(&a.address).dispatch(&Envelope::from_payload(&mv).unwrap());

    assert_eq!(a.sync.current_puzzle(), before);
    assert!(mesh.session(&a.address).peers().contains(&stranger));
    let outbox = mesh.session_mut(&a.address).drain_outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].to, stranger);
    assert_eq!(outbox[0].envelope.kind(), "gamedata");
}

#[test]
fn test_move_with_string_port_applied() {
    let (mut mesh, a, b) = synced_pair();
    let (r, c) = editable_cells(&a.sync.fixed_board().unwrap())[0];

    let mv = Envelope::from_value(json!({
        "kind": "move", "row": r, "col": c, "number": 2,
        "addr": b.address.host(), "port": b.address.port().to_string()
    }))
    .unwrap();
    mesh.session_mut(&a.address).dispatch(&mv);

    assert_eq!(a.sync.current_puzzle().unwrap()[r][c], 2);
}

// ============================================================================
// WIN FLOW
// ============================================================================

#[test]
fn test_win_regenerates_and_reveals_after_delay() {
    let one_blank = BacktrackingGenerator::new().with_blanks(1, 1);
    let mut mesh = Mesh::new();
    let a = host(&mut mesh, 5001, 500, one_blank.clone());
    mesh.take_events(&a.address);

    let solved_seed = a.sync.snapshot().unwrap().seed;
    let solution = one_blank.solution(solved_seed);
    let (r, c) = editable_cells(&a.sync.fixed_board().unwrap())[0];
    edit(&mut mesh, &a, r, c, solution[r][c]).unwrap();

    let game = a.sync.snapshot().unwrap();
    assert!(game.terminal);
    assert_eq!(game.seed, solved_seed + 1);
    assert_eq!(
        mesh.take_events(&a.address),
        vec![
            SessionEvent::PuzzleChanged,
            SessionEvent::Solved { seed: solved_seed },
            SessionEvent::PuzzleChanged,
        ]
    );

    // Edits wait for the reveal
    let (r2, c2) = editable_cells(&game.board)[0];
    assert_eq!(edit(&mut mesh, &a, r2, c2, 1), Err(EditError::GameOver));

    mesh.advance(Duration::from_millis(1999));
    assert!(a.sync.snapshot().unwrap().terminal);
    mesh.advance(Duration::from_millis(1));
    assert!(!a.sync.snapshot().unwrap().terminal);
    assert_eq!(mesh.take_events(&a.address), vec![SessionEvent::PuzzleRevealed]);
    assert!(edit(&mut mesh, &a, r2, c2, 1).is_ok());
}

#[test]
fn test_win_is_local_only() {
    let one_blank = BacktrackingGenerator::new().with_blanks(1, 1);
    let mut mesh = Mesh::new();
    let a = host(&mut mesh, 5001, 500, one_blank.clone());
    let b = player(&mut mesh, 5002, one_blank.clone());
    mesh.session_mut(&b.address).hello(&a.address);
    mesh.run_until_quiet(16);
    mesh.advance(Duration::from_millis(50));
    mesh.run_until_quiet(16);

    let seed = a.sync.snapshot().unwrap().seed;
    let solution = one_blank.solution(seed);
    let (r, c) = editable_cells(&a.sync.fixed_board().unwrap())[0];
    edit(&mut mesh, &a, r, c, solution[r][c]).unwrap();
    mesh.run_until_quiet(16);

    // The move completes b's copy too; each side detects its own win
    assert_eq!(b.sync.snapshot().unwrap().seed, seed + 1);
    assert!(mesh
        .take_events(&b.address)
        .contains(&SessionEvent::Solved { seed }));
    assert!(mesh.delivered_kind("gamedata").len() == 1);
}
