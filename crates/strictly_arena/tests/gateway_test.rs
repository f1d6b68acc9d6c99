//! Tests for the gateway dispatcher: matchmaking, moves, departures and persistence.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use strictly_arena::{
    ClientMessage, ConnectionId, Coordinates, Gateway, GatewayEvent, MemoryStore, Participant, RandomOpponent,
    Scheduler, ServerMessage, SessionStatus, Winner,
};

/// Scheduler that holds deferred events until the test releases them.
#[derive(Clone, Default)]
struct ManualScheduler {
    pending: Arc<Mutex<Vec<(Duration, GatewayEvent)>>>,
}

impl ManualScheduler {
    fn take(&self) -> Vec<(Duration, GatewayEvent)> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, event: GatewayEvent) {
        self.pending.lock().unwrap().push((delay, event));
    }
}

struct Harness {
    gateway: Gateway,
    scheduler: ManualScheduler,
    store: MemoryStore,
}

impl Harness {
    fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    fn with_store(store: MemoryStore) -> Self {
        let scheduler = ManualScheduler::default();
        let gateway = Gateway::new(
            Arc::new(store.clone()),
            Box::new(scheduler.clone()),
            RandomOpponent::seeded(7),
            Duration::from_millis(750),
        );
        Self {
            gateway,
            scheduler,
            store,
        }
    }

    fn connect(&mut self, raw: u64, identity: &str) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        let connection = ConnectionId::new(raw);
        self.gateway.handle(GatewayEvent::Connected {
            connection,
            identity: identity.to_string(),
            outbox,
        });
        (connection, rx)
    }

    fn new_game(&mut self, connection: ConnectionId, two_player: bool) {
        self.send(connection, ClientMessage::NewGame { two_player });
    }

    fn play(&mut self, connection: ConnectionId, x: i64, y: i64) {
        self.send(connection, ClientMessage::PlayerMove { x, y });
    }

    fn send(&mut self, connection: ConnectionId, message: ClientMessage) {
        self.gateway.handle(GatewayEvent::Message {
            connection,
            message,
        });
    }

    fn disconnect(&mut self, connection: ConnectionId) {
        self.gateway
            .handle(GatewayEvent::Disconnected { connection });
    }

    fn fire_timers(&mut self) {
        for (_, event) in self.scheduler.take() {
            self.gateway.handle(event);
        }
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

/// Lets spawned persistence tasks run to completion.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Pairs alice (X) with bob (O) and clears the start-of-game frames.
fn paired(
    harness: &mut Harness,
) -> (
    ConnectionId,
    mpsc::UnboundedReceiver<ServerMessage>,
    ConnectionId,
    mpsc::UnboundedReceiver<ServerMessage>,
) {
    let (alice, mut alice_rx) = harness.connect(1, "alice");
    let (bob, mut bob_rx) = harness.connect(2, "bob");
    harness.new_game(alice, true);
    harness.new_game(bob, true);
    drain(&mut alice_rx);
    drain(&mut bob_rx);
    (alice, alice_rx, bob, bob_rx)
}

#[tokio::test]
async fn test_two_player_requests_are_paired() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect(1, "alice");
    let (bob, mut bob_rx) = harness.connect(2, "bob");

    harness.new_game(alice, true);
    assert_eq!(drain(&mut alice_rx), vec![ServerMessage::WaitingPartner]);

    harness.new_game(bob, true);
    let bob_frames = drain(&mut bob_rx);
    assert_eq!(bob_frames.len(), 1);
    let ServerMessage::CurrentState { state } = &bob_frames[0] else {
        panic!("expected currentState, got {:?}", bob_frames[0]);
    };
    assert_eq!(state.participant1(), "alice");
    assert_eq!(
        *state.participant2(),
        Some(Participant::Human("bob".to_string()))
    );
    assert_eq!(*state.status(), SessionStatus::InProgress);

    // The waiting creator sees the same start-of-game state.
    assert_eq!(drain(&mut alice_rx), bob_frames);
    assert_eq!(harness.gateway.registry().waiting().count(), 0);
}

#[tokio::test]
async fn test_single_player_schedules_scripted_reply() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect(1, "alice");
    harness.new_game(alice, false);

    let frames = drain(&mut alice_rx);
    let [ServerMessage::CurrentState { state }] = frames.as_slice() else {
        panic!("expected one currentState, got {:?}", frames);
    };
    assert_eq!(*state.status(), SessionStatus::InProgress);
    assert_eq!(*state.participant2(), Some(Participant::Computer));

    harness.play(alice, 1, 1);
    drain(&mut alice_rx);
    let scheduled = harness.scheduler.take();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].0, Duration::from_millis(750));

    for (_, event) in scheduled {
        harness.gateway.handle(event);
    }
    let frames = drain(&mut alice_rx);
    let [ServerMessage::CurrentState { state }] = frames.as_slice() else {
        panic!("expected scripted move broadcast, got {:?}", frames);
    };
    assert_eq!(state.board().occupied_count(), 2);
    assert_eq!(*state.moves(), 2);
    assert!(!state.board().is_empty_at(Coordinates::new(1, 1)));
    assert!(!state.computer_to_move());
}

#[tokio::test]
async fn test_invalid_move_goes_only_to_requester() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx, bob, mut bob_rx) = paired(&mut harness);

    // Out of turn.
    harness.play(bob, 0, 0);
    assert!(matches!(
        drain(&mut bob_rx).as_slice(),
        [ServerMessage::InvalidMove { .. }]
    ));
    assert!(drain(&mut alice_rx).is_empty());

    // Occupied square.
    harness.play(alice, 0, 0);
    drain(&mut alice_rx);
    drain(&mut bob_rx);
    harness.play(bob, 0, 0);
    assert!(matches!(
        drain(&mut bob_rx).as_slice(),
        [ServerMessage::InvalidMove { .. }]
    ));
    assert!(drain(&mut alice_rx).is_empty());

    // Negative and oversized coordinates.
    harness.play(bob, -1, 0);
    harness.play(bob, 3, 0);
    assert_eq!(drain(&mut bob_rx).len(), 2);
    assert!(drain(&mut alice_rx).is_empty());
}

#[tokio::test]
async fn test_move_without_game_is_rejected() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect(1, "alice");
    harness.play(alice, 0, 0);
    assert!(matches!(
        drain(&mut alice_rx).as_slice(),
        [ServerMessage::InvalidMove { .. }]
    ));
}

#[tokio::test]
async fn test_move_while_waiting_for_partner_is_rejected() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect(1, "alice");
    harness.new_game(alice, true);
    drain(&mut alice_rx);
    harness.play(alice, 0, 0);
    assert!(matches!(
        drain(&mut alice_rx).as_slice(),
        [ServerMessage::InvalidMove { .. }]
    ));
}

#[tokio::test]
async fn test_disconnect_mid_game_notifies_partner_once() {
    let mut harness = Harness::new();
    let (alice, _alice_rx, _bob, mut bob_rx) = paired(&mut harness);

    harness.disconnect(alice);
    assert_eq!(drain(&mut bob_rx), vec![ServerMessage::PlayerLeft]);
    assert_eq!(harness.gateway.registry().session_count(), 0);

    harness.disconnect(alice);
    assert!(drain(&mut bob_rx).is_empty());

    settle().await;
    assert!(harness.store.completed_games().is_empty());
}

#[tokio::test]
async fn test_disconnect_while_pending_dequeues_silently() {
    let mut harness = Harness::new();
    let (alice, _alice_rx) = harness.connect(1, "alice");
    let (bob, mut bob_rx) = harness.connect(2, "bob");

    harness.new_game(alice, true);
    harness.disconnect(alice);
    assert_eq!(harness.gateway.registry().waiting().count(), 0);
    assert_eq!(harness.gateway.registry().session_count(), 0);

    harness.new_game(bob, true);
    assert_eq!(drain(&mut bob_rx), vec![ServerMessage::WaitingPartner]);
}

#[tokio::test]
async fn test_scripted_move_after_disconnect_is_a_no_op() {
    let mut harness = Harness::new();
    let (alice, _alice_rx) = harness.connect(1, "alice");
    harness.new_game(alice, false);
    harness.play(alice, 0, 0);
    harness.disconnect(alice);

    harness.fire_timers();
    settle().await;
    assert_eq!(harness.gateway.registry().session_count(), 0);
    assert!(harness.store.completed_games().is_empty());
}

#[tokio::test]
async fn test_new_game_leaves_previous_session() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx, _bob, mut bob_rx) = paired(&mut harness);

    harness.new_game(alice, false);
    assert_eq!(drain(&mut bob_rx), vec![ServerMessage::PlayerLeft]);

    // Alice only sees the new single-player game.
    let frames = drain(&mut alice_rx);
    let [ServerMessage::CurrentState { state }] = frames.as_slice() else {
        panic!("expected new game state, got {:?}", frames);
    };
    assert!(state.is_single_player());
    assert_eq!(harness.gateway.registry().session_count(), 1);
}

#[tokio::test]
async fn test_win_is_broadcast_and_persisted() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx, bob, mut bob_rx) = paired(&mut harness);

    for (connection, x, y) in [(alice, 0, 0), (bob, 0, 1), (alice, 1, 0), (bob, 1, 1), (alice, 2, 0)] {
        harness.play(connection, x, y);
    }

    let alice_frames = drain(&mut alice_rx);
    assert_eq!(alice_frames.len(), 5);
    assert_eq!(drain(&mut bob_rx), alice_frames);
    let Some(ServerMessage::CurrentState { state }) = alice_frames.last() else {
        panic!("expected final state");
    };
    assert_eq!(*state.status(), SessionStatus::Complete);
    assert_eq!(
        *state.winner(),
        Some(Winner::Participant(Participant::Human("alice".to_string())))
    );
    assert_eq!(harness.gateway.registry().session_count(), 0);

    settle().await;
    assert_eq!(harness.store.completed_games().len(), 1);
    let alice_stats = harness.store.participant("alice").unwrap();
    let bob_stats = harness.store.participant("bob").unwrap();
    assert_eq!((*alice_stats.wins(), *alice_stats.games_played()), (1, 1));
    assert_eq!((*bob_stats.wins(), *bob_stats.games_played()), (0, 1));
}

#[tokio::test]
async fn test_draw_never_increments_wins() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx, bob, _bob_rx) = paired(&mut harness);

    // (x = col, y = row); ends with X O X / X O O / O X X.
    let moves = [
        (alice, 0, 0),
        (bob, 1, 1),
        (alice, 2, 0),
        (bob, 1, 0),
        (alice, 1, 2),
        (bob, 2, 1),
        (alice, 0, 1),
        (bob, 0, 2),
        (alice, 2, 2),
    ];
    for (connection, x, y) in moves {
        harness.play(connection, x, y);
    }

    let frames = drain(&mut alice_rx);
    assert_eq!(frames.len(), 9);
    let Some(ServerMessage::CurrentState { state }) = frames.last() else {
        panic!("expected final state");
    };
    assert_eq!(*state.winner(), Some(Winner::Draw));

    settle().await;
    for identity in ["alice", "bob"] {
        let stats = harness.store.participant(identity).unwrap();
        assert_eq!(*stats.wins(), 0);
        assert_eq!(*stats.games_played(), 1);
    }
}

#[tokio::test]
async fn test_persistence_failure_does_not_affect_play() {
    let mut harness = Harness::with_store(MemoryStore::failing());
    let (alice, mut alice_rx, bob, mut bob_rx) = paired(&mut harness);

    for (connection, x, y) in [(alice, 0, 0), (bob, 0, 1), (alice, 1, 0), (bob, 1, 1), (alice, 2, 0)] {
        harness.play(connection, x, y);
    }
    settle().await;

    assert_eq!(drain(&mut alice_rx).len(), 5);
    assert_eq!(drain(&mut bob_rx).len(), 5);
    assert_eq!(harness.gateway.registry().session_count(), 0);

    // Both can start again.
    harness.new_game(alice, true);
    assert_eq!(drain(&mut alice_rx), vec![ServerMessage::WaitingPartner]);
    harness.new_game(bob, true);
    let bob_frames = drain(&mut bob_rx);
    assert!(matches!(
        bob_frames.as_slice(),
        [ServerMessage::CurrentState { state }] if *state.status() == SessionStatus::InProgress
    ));
    assert_eq!(drain(&mut alice_rx), bob_frames);
}

#[tokio::test]
async fn test_repeat_connections_keep_one_record() {
    let mut harness = Harness::new();
    harness.connect(1, "alice");
    harness.connect(2, "alice");
    settle().await;
    assert_eq!(harness.store.participant_count(), 1);
    assert_eq!(harness.store.participant("alice").map(|s| *s.games_played()), Some(0));
}

#[tokio::test]
async fn test_reconnect_keeps_counters() {
    let mut harness = Harness::new();
    let (alice, _alice_rx, bob, _bob_rx) = paired(&mut harness);
    for (connection, x, y) in [(alice, 0, 0), (bob, 0, 1), (alice, 1, 0), (bob, 1, 1), (alice, 2, 0)] {
        harness.play(connection, x, y);
    }
    settle().await;

    harness.disconnect(alice);
    harness.connect(3, "alice");
    settle().await;
    let stats = harness.store.participant("alice").unwrap();
    assert_eq!((*stats.wins(), *stats.games_played()), (1, 1));
}

#[tokio::test]
async fn test_shutdown_clears_registry() {
    let mut harness = Harness::new();
    let (alice, _alice_rx) = harness.connect(1, "alice");
    harness.new_game(alice, true);
    harness.gateway.handle(GatewayEvent::Shutdown);
    assert_eq!(harness.gateway.registry().session_count(), 0);
    assert_eq!(harness.gateway.registry().connection_count(), 0);
    assert_eq!(harness.gateway.registry().waiting().count(), 0);
}
