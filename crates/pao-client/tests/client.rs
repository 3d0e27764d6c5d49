//! Integration tests for the client lifecycle over the in-memory transport.
//!
//! All tests run with a paused clock: whenever every task is idle, Tokio
//! jumps straight to the next timer, so backoff delays cost nothing.

use std::sync::Arc;
use std::time::Duration;

use pao_client::prelude::*;
use pao_transport::MemoryPeer;
use tokio::sync::mpsc;
use tokio::time::Instant;

// =========================================================================
// Harness
// =========================================================================

const SERVER: &str = "game.test:2000";

struct Harness {
    client: GameClient,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    connector: MemoryConnector,
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
    store: Arc<MemorySessionStore>,
}

fn harness() -> Harness {
    harness_with_store(Arc::new(MemorySessionStore::new()))
}

fn harness_with_store(store: Arc<MemorySessionStore>) -> Harness {
    let (connector, peers) = MemoryConnector::new();
    let (client, events) = GameClient::builder()
        .server(SERVER)
        .build(connector.clone(), Arc::clone(&store));
    Harness {
        client,
        events,
        connector,
        peers,
        store,
    }
}

fn g7() -> GameId {
    GameId::from("G7")
}

fn params() -> ConnectionParams {
    ConnectionParams::new("ann", g7())
}

fn query(target: &str, key: &str) -> Option<String> {
    let url = url::Url::parse(target).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn session_json(token: &str, game: &str) -> String {
    serde_json::json!({"Action": "session", "SessionID": token, "GameID": game})
        .to_string()
}

fn game_over_json(you_win: bool, reason: &str) -> String {
    serde_json::json!({
        "Action": "gameover",
        "YouWin": you_win,
        "Message": "done",
        "Reason": reason,
    })
    .to_string()
}

fn chat_json(player: &str, message: &str) -> String {
    serde_json::json!({
        "Action": "chat",
        "Player": player,
        "Message": message,
        "Color": "red",
        "Auth": false,
    })
    .to_string()
}

/// Receives events until `pred` matches; returns everything seen, the
/// match last. Fails instead of hanging if it never comes.
async fn collect_until(
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
    pred: impl Fn(&ClientEvent) -> bool,
) -> Vec<ClientEvent> {
    let mut seen = Vec::new();
    let waited = tokio::time::timeout(Duration::from_secs(600), async {
        while let Some(event) = events.recv().await {
            let done = pred(&event);
            seen.push(event);
            if done {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(waited, Ok(true), "expected event never arrived: {seen:#?}");
    seen
}

/// Accepts the next dial and consumes the `board?` the client sends on
/// open.
async fn accept(peers: &mut mpsc::UnboundedReceiver<MemoryPeer>) -> MemoryPeer {
    let mut peer = peers.recv().await.expect("client should dial");
    let first = peer.recv().await.expect("client should send board?");
    assert_eq!(first, br#"{"Action":"board?"}"#);
    peer
}

/// The paused clock lands on timer ticks, so allow sub-tick slack.
fn assert_elapsed(since: Instant, expected: Duration) {
    let elapsed = since.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(5),
        "elapsed {elapsed:?}, expected {expected:?}"
    );
}

fn is_chat(text: &'static str) -> impl Fn(&ClientEvent) -> bool {
    move |e| {
        matches!(e, ClientEvent::Game(GameEvent::Chat(c)) if c.text == text)
    }
}

// =========================================================================
// Connect
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_opens_and_requests_board() {
    let mut h = harness();

    h.client.connect(params()).await.unwrap();
    let peer = accept(&mut h.peers).await;

    let target = peer.target().to_string();
    assert!(target.starts_with("ws://game.test:2000/game?"));
    assert_eq!(query(&target, "name").as_deref(), Some("ann"));
    assert_eq!(query(&target, "id").as_deref(), Some("G7"));
    assert_eq!(query(&target, "sessionId"), None);
    assert_eq!(
        h.client.connection_state().await.unwrap(),
        ConnectionState::Open
    );

    let seen =
        collect_until(&mut h.events, |e| *e == ClientEvent::Connected).await;
    assert_eq!(
        seen,
        vec![
            ClientEvent::StateChanged(ConnectionState::Connecting),
            ClientEvent::StateChanged(ConnectionState::Open),
            ClientEvent::Connected,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_open_is_rejected() {
    let mut h = harness();
    h.client.connect(params()).await.unwrap();
    let _peer = accept(&mut h.peers).await;

    let err = h.client.connect(params()).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::InvalidState(ConnectionState::Open)
    ));
    assert_eq!(h.connector.dialled().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_with_bad_server_is_an_error() {
    let (connector, _peers) = MemoryConnector::new();
    let (client, _events) = GameClient::builder()
        .server("ws://[bad")
        .build(connector.clone(), MemorySessionStore::new());

    let err = client.connect(params()).await.unwrap_err();

    assert!(matches!(err, ClientError::Protocol(_)));
    assert!(connector.dialled().is_empty());
    assert_eq!(
        client.connection_state().await.unwrap(),
        ConnectionState::Idle
    );
}

#[tokio::test(start_paused = true)]
async fn test_stored_token_is_presented() {
    let mut h = harness();
    h.store.save(&g7(), &SessionToken::from("stored-tok")).unwrap();

    h.client.connect(params()).await.unwrap();
    let peer = accept(&mut h.peers).await;

    assert_eq!(
        query(peer.target(), "sessionId").as_deref(),
        Some("stored-tok")
    );
    collect_until(&mut h.events, is_chat("Attempting to rejoin game...")).await;

    peer.send(session_json("stored-tok", "G7"));
    let seen = collect_until(&mut h.events, |e| {
        *e == ClientEvent::Game(GameEvent::Rejoined)
    })
    .await;
    assert!(seen.iter().any(is_chat("Successfully rejoined game!")));
}

#[tokio::test(start_paused = true)]
async fn test_explicit_token_wins_over_store() {
    let mut h = harness();
    h.store.save(&g7(), &SessionToken::from("stored")).unwrap();

    h.client
        .connect(params().with_session_token(SessionToken::from("mine")))
        .await
        .unwrap();
    let peer = accept(&mut h.peers).await;

    assert_eq!(query(peer.target(), "sessionId").as_deref(), Some("mine"));
}

#[tokio::test(start_paused = true)]
async fn test_token_survives_client_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");

    // First client learns a token, then goes away.
    {
        let (connector, mut peers) = MemoryConnector::new();
        let (client, mut events) = GameClient::builder()
            .server(SERVER)
            .build(connector, FileSessionStore::open(&path).unwrap());
        client.connect(params()).await.unwrap();
        let peer = accept(&mut peers).await;
        peer.send(session_json("durable", "G7"));
        collect_until(&mut events, |e| {
            matches!(e, ClientEvent::Game(GameEvent::SessionSaved { .. }))
        })
        .await;
        client.shutdown().await.unwrap();
    }

    // A brand-new client on the same file resumes the seat.
    let (connector, mut peers) = MemoryConnector::new();
    let (client, _events) = GameClient::builder()
        .server(SERVER)
        .build(connector, FileSessionStore::open(&path).unwrap());
    client.connect(params()).await.unwrap();
    let peer = accept(&mut peers).await;

    assert_eq!(query(peer.target(), "sessionId").as_deref(), Some("durable"));
}

// =========================================================================
// Reconnect
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnect_uses_latest_session_token() {
    let mut h = harness();
    h.client.connect(params()).await.unwrap();
    let peer = accept(&mut h.peers).await;

    peer.send(session_json("s1", "G7"));
    peer.send(session_json("s2", "G7"));
    collect_until(&mut h.events, |e| {
        matches!(
            e,
            ClientEvent::Game(GameEvent::SessionSaved { token, .. })
                if token.as_str() == "s2"
        )
    })
    .await;

    let dropped_at = Instant::now();
    peer.close();
    let peer = accept(&mut h.peers).await;

    assert_elapsed(dropped_at, Duration::from_secs(1));
    assert_eq!(query(peer.target(), "sessionId").as_deref(), Some("s2"));
    assert_eq!(
        h.store.load(&g7()).unwrap(),
        Some(SessionToken::from("s2"))
    );

    let seen =
        collect_until(&mut h.events, |e| *e == ClientEvent::Connected).await;
    assert!(seen.contains(&ClientEvent::Reconnecting {
        attempt: 1,
        delay: Duration::from_secs(1),
    }));
    assert!(
        seen.iter()
            .any(is_chat("Connection lost. Reconnecting... (attempt 1)"))
    );
    assert_eq!(
        h.client.connection_state().await.unwrap(),
        ConnectionState::Open
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_reuses_stored_token_before_any_session() {
    let mut h = harness();
    h.store.save(&g7(), &SessionToken::from("stored-tok")).unwrap();
    h.client.connect(params()).await.unwrap();
    let peer = accept(&mut h.peers).await;

    // Dropped before the server ever sends a `session` envelope.
    peer.close();
    let peer = accept(&mut h.peers).await;

    assert_eq!(h.connector.dialled().len(), 2);
    assert_eq!(
        query(peer.target(), "sessionId").as_deref(),
        Some("stored-tok")
    );
}

#[tokio::test(start_paused = true)]
async fn test_switching_games_does_not_leak_token() {
    let mut h = harness();
    h.client.connect(params()).await.unwrap();
    let peer = accept(&mut h.peers).await;
    peer.send(session_json("g7-token", "G7"));
    collect_until(&mut h.events, |e| {
        matches!(e, ClientEvent::Game(GameEvent::SessionSaved { .. }))
    })
    .await;
    peer.close();
    collect_until(&mut h.events, |e| {
        matches!(e, ClientEvent::Reconnecting { .. })
    })
    .await;

    // Join another game; its first dial fails, so a retry carries it.
    let g9 = GameId::from("G9");
    h.connector.refuse_next(1);
    h.client
        .connect(ConnectionParams::new("ann", g9.clone()))
        .await
        .unwrap();
    let peer = accept(&mut h.peers).await;

    assert_eq!(h.connector.dialled().len(), 3);
    assert_eq!(query(peer.target(), "id").as_deref(), Some("G9"));
    assert_eq!(query(peer.target(), "sessionId"), None);

    let game = h.client.game_state().await.unwrap();
    assert_eq!(game.game_id, g9);
    assert_eq!(
        h.store.load(&g7()).unwrap(),
        Some(SessionToken::from("g7-token"))
    );
    assert_eq!(h.store.load(&g9).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_successful_retry_resets_backoff() {
    let mut h = harness();
    h.client.connect(params()).await.unwrap();
    let peer = accept(&mut h.peers).await;
    collect_until(&mut h.events, |e| *e == ClientEvent::Connected).await;

    // Two refused retries, then the third gets through.
    h.connector.refuse_next(2);
    peer.close();
    let peer = accept(&mut h.peers).await;

    let seen = collect_until(&mut h.events, |e| *e == ClientEvent::Connected)
        .await;
    let delays: Vec<Duration> = seen
        .iter()
        .filter_map(|e| match e {
            ClientEvent::Reconnecting { delay, .. } => Some(*delay),
            _ => None,
        })
        .collect();
    assert_eq!(
        delays,
        [1000, 1500, 2250].map(Duration::from_millis).to_vec()
    );

    // The next outage starts from the top of the schedule again.
    peer.close();
    collect_until(&mut h.events, |e| {
        *e == ClientEvent::Reconnecting {
            attempt: 1,
            delay: Duration::from_secs(1),
        }
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_ten_failed_retries() {
    let mut h = harness();
    h.connector.refuse_all(true);
    let start = Instant::now();

    h.client.connect(params()).await.unwrap();
    let seen = collect_until(&mut h.events, |e| {
        matches!(e, ClientEvent::GaveUp { .. })
    })
    .await;

    // The first dial plus ten retries.
    assert_eq!(h.connector.dialled().len(), 11);
    assert!(start.elapsed() >= Duration::from_millis(104_886));

    let delays: Vec<Duration> = seen
        .iter()
        .filter_map(|e| match e {
            ClientEvent::Reconnecting { delay, .. } => Some(*delay),
            _ => None,
        })
        .collect();
    let expected: Vec<Duration> =
        BackoffPolicy::default().delays().take(10).collect();
    assert_eq!(delays, expected);
    assert_eq!(seen.last(), Some(&ClientEvent::GaveUp { attempts: 10 }));
    assert!(
        seen.contains(&ClientEvent::StateChanged(ConnectionState::Terminated))
    );

    // Nothing else is ever dialled.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.connector.dialled().len(), 11);
    assert_eq!(
        h.client.connection_state().await.unwrap(),
        ConnectionState::Terminated
    );

    let game = h.client.game_state().await.unwrap();
    let last = game.chat.last().unwrap();
    assert_eq!(
        last.text,
        "Connection lost. Unable to reconnect after 10 attempts."
    );
    assert_eq!(last.color, "red");

    // Terminated is final.
    assert!(matches!(
        h.client.connect(params()).await,
        Err(ClientError::InvalidState(ConnectionState::Terminated))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_custom_policy_is_respected() {
    let (connector, _peers) = MemoryConnector::new();
    connector.refuse_all(true);
    let (client, mut events) = GameClient::builder()
        .server(SERVER)
        .backoff(BackoffPolicy {
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(300),
            max_attempts: 2,
        })
        .build(connector.clone(), MemorySessionStore::new());

    client.connect(params()).await.unwrap();
    collect_until(&mut events, |e| *e == ClientEvent::GaveUp { attempts: 2 })
        .await;

    assert_eq!(connector.dialled().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_manual_connect_while_reconnecting_replaces_retry() {
    let mut h = harness();
    h.client.connect(params()).await.unwrap();
    let peer = accept(&mut h.peers).await;
    peer.close();
    collect_until(&mut h.events, |e| {
        matches!(e, ClientEvent::Reconnecting { .. })
    })
    .await;

    let before = Instant::now();
    h.client.connect(params()).await.unwrap();
    let _peer = accept(&mut h.peers).await;

    // Dialled right away, not after the scheduled delay.
    assert!(before.elapsed() < Duration::from_secs(1));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.connector.dialled().len(), 2);
}

// =========================================================================
// Sending
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_commands_while_disconnected_are_dropped() {
    let mut h = harness();
    h.connector.refuse_next(1);
    h.client.connect(params()).await.unwrap();

    // Not connected: this must vanish, not be queued.
    h.client.send_move("a1-a2").await.unwrap();

    let mut peer = accept(&mut h.peers).await;
    h.client.chat("hello").await.unwrap();

    let next = peer.recv().await.unwrap();
    assert_eq!(next, br#"{"Action":"chat","Argument":"hello"}"#);
}

#[tokio::test(start_paused = true)]
async fn test_convenience_commands_encode() {
    let mut h = harness();
    h.client.connect(params()).await.unwrap();
    let mut peer = accept(&mut h.peers).await;

    h.client.send_move("b2-b3").await.unwrap();
    h.client.request_board().await.unwrap();
    h.client.resign().await.unwrap();

    assert_eq!(
        peer.recv().await.unwrap(),
        br#"{"Action":"move","Argument":"b2-b3"}"#
    );
    assert_eq!(peer.recv().await.unwrap(), br#"{"Action":"board?"}"#);
    assert_eq!(peer.recv().await.unwrap(), br#"{"Action":"resign"}"#);
}

// =========================================================================
// Reconciliation through the actor
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_duplicate_gameover_is_applied_once() {
    let mut h = harness();
    h.client.connect(params()).await.unwrap();
    let peer = accept(&mut h.peers).await;

    peer.send(game_over_json(true, "capture"));
    peer.send(game_over_json(false, "resign"));
    peer.send(chat_json("bo", "gg"));
    let seen = collect_until(&mut h.events, is_chat("gg")).await;

    let overs: Vec<&ClientEvent> = seen
        .iter()
        .filter(|e| matches!(e, ClientEvent::Game(GameEvent::GameOver(_))))
        .collect();
    assert_eq!(overs.len(), 1);

    let game = h.client.game_state().await.unwrap();
    let outcome = game.outcome.unwrap();
    assert!(outcome.you_win);
    assert_eq!(outcome.reason, "capture");
}

#[tokio::test(start_paused = true)]
async fn test_gameover_clears_stored_session() {
    let mut h = harness();
    h.client.connect(params()).await.unwrap();
    let peer = accept(&mut h.peers).await;

    peer.send(session_json("abc", "G7"));
    collect_until(&mut h.events, |e| {
        matches!(e, ClientEvent::Game(GameEvent::SessionSaved { .. }))
    })
    .await;
    assert!(h.store.load(&g7()).unwrap().is_some());

    peer.send(game_over_json(false, "checkmate"));
    collect_until(&mut h.events, |e| {
        matches!(e, ClientEvent::Game(GameEvent::GameOver(_)))
    })
    .await;

    assert_eq!(h.store.load(&g7()).unwrap(), None);
    assert_eq!(
        h.client.connection_state().await.unwrap(),
        ConnectionState::Terminated
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_reconnect_after_gameover() {
    let mut h = harness();
    h.client.connect(params()).await.unwrap();
    let mut peer = accept(&mut h.peers).await;

    peer.send(game_over_json(true, "capture"));
    collect_until(&mut h.events, |e| {
        *e == ClientEvent::StateChanged(ConnectionState::Terminated)
    })
    .await;

    // The transport is still usable until the server hangs up.
    h.client.chat("gg").await.unwrap();
    assert_eq!(
        peer.recv().await.unwrap(),
        br#"{"Action":"chat","Argument":"gg"}"#
    );

    peer.close();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(h.connector.dialled().len(), 1);
    assert_eq!(
        h.client.connection_state().await.unwrap(),
        ConnectionState::Terminated
    );
}

#[tokio::test(start_paused = true)]
async fn test_garbage_frames_are_skipped() {
    let mut h = harness();
    h.client.connect(params()).await.unwrap();
    let peer = accept(&mut h.peers).await;

    peer.send("not json at all");
    peer.send(r#"{"NoAction":true}"#);
    peer.send(r#"{"Action":"spectators","Count":3}"#);
    peer.send(serde_json::json!({
        "Action": "board",
        "Board": [["rK", ""]],
        "YourTurn": true,
    })
    .to_string());

    collect_until(&mut h.events, |e| {
        matches!(e, ClientEvent::Game(GameEvent::BoardReplaced(_)))
    })
    .await;

    let game = h.client.game_state().await.unwrap();
    assert!(game.snapshot.your_turn);
    assert_eq!(
        h.client.connection_state().await.unwrap(),
        ConnectionState::Open
    );
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_drops_pending_retry() {
    let mut h = harness();
    h.client.connect(params()).await.unwrap();
    let peer = accept(&mut h.peers).await;
    peer.close();
    collect_until(&mut h.events, |e| {
        matches!(e, ClientEvent::Reconnecting { .. })
    })
    .await;

    h.client.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(h.connector.dialled().len(), 1);
    assert!(h.client.is_closed());
    assert!(matches!(
        h.client.connection_state().await,
        Err(ClientError::ClientClosed)
    ));
    // A second shutdown is harmless.
    h.client.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_transport() {
    let mut h = harness();
    h.client.connect(params()).await.unwrap();
    let mut peer = accept(&mut h.peers).await;

    h.client.shutdown().await.unwrap();

    assert_eq!(peer.recv().await, None);
    collect_until(&mut h.events, |e| {
        *e == ClientEvent::StateChanged(ConnectionState::Terminated)
    })
    .await;
}
