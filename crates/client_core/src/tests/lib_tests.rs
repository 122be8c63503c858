use super::*;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use shared::{domain::Vector, protocol::ClientCommand};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::net::TcpListener;

use crate::control::ArrowKey;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct FakeRobot {
    frames: mpsc::UnboundedSender<String>,
    greeting: Option<OperatingMode>,
}

async fn ws_route(ws: WebSocketUpgrade, State(robot): State<FakeRobot>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| robot_session(socket, robot))
}

async fn robot_session(mut socket: WebSocket, robot: FakeRobot) {
    if let Some(mode) = robot.greeting {
        let frame = ServerEvent::ModeChanged { mode }
            .encode()
            .expect("encode greeting");
        if socket.send(WsMessage::Text(frame)).await.is_err() {
            return;
        }
    }
    while let Some(Ok(message)) = socket.recv().await {
        if let WsMessage::Text(text) = message {
            let _ = robot.frames.send(text);
        }
    }
}

async fn spawn_robot(
    greeting: Option<OperatingMode>,
) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (frames, frames_rx) = mpsc::unbounded_channel();
    let app = Router::new()
        .route("/ws", get(ws_route))
        .with_state(FakeRobot { frames, greeting });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), frames_rx)
}

/// Drops its first operator as soon as a console message arrives, then
/// accepts the reconnect. Frames are reported as `(connection, command)`.
#[derive(Clone)]
struct FlakyRobot {
    frames: mpsc::UnboundedSender<(usize, String)>,
    connections: Arc<AtomicUsize>,
}

async fn flaky_route(ws: WebSocketUpgrade, State(robot): State<FlakyRobot>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| flaky_session(socket, robot))
}

async fn flaky_session(mut socket: WebSocket, robot: FlakyRobot) {
    let connection = robot.connections.fetch_add(1, Ordering::SeqCst);
    while let Some(Ok(message)) = socket.recv().await {
        let WsMessage::Text(text) = message else {
            continue;
        };
        let drop_link = connection == 0 && text.contains("console_message");
        let _ = robot.frames.send((connection, text));
        if drop_link {
            return;
        }
    }
}

async fn spawn_flaky_robot() -> (String, mpsc::UnboundedReceiver<(usize, String)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (frames, frames_rx) = mpsc::unbounded_channel();
    let app = Router::new()
        .route("/ws", get(flaky_route))
        .with_state(FlakyRobot {
            frames,
            connections: Arc::new(AtomicUsize::new(0)),
        });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), frames_rx)
}

async fn next_tagged(
    frames: &mut mpsc::UnboundedReceiver<(usize, String)>,
) -> (usize, ClientCommand) {
    let (connection, text) = time::timeout(WAIT, frames.recv())
        .await
        .expect("frame before timeout")
        .expect("robot still running");
    let command = ClientCommand::decode(&text).expect("valid command frame");
    (connection, command)
}

fn settings(server_url: String) -> ClientSettings {
    ClientSettings {
        server_url,
        heartbeat_interval: Duration::from_millis(20),
        reconnect_delay: Duration::from_millis(50),
        ..ClientSettings::default()
    }
}

async fn next_command(frames: &mut mpsc::UnboundedReceiver<String>) -> ClientCommand {
    let text = time::timeout(WAIT, frames.recv())
        .await
        .expect("frame before timeout")
        .expect("robot still running");
    ClientCommand::decode(&text).expect("valid command frame")
}

async fn wait_for_event(
    events: &mut broadcast::Receiver<ClientEvent>,
    wanted: impl Fn(&ClientEvent) -> bool,
) {
    time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if wanted(&event) => return,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("event before timeout");
}

#[tokio::test]
async fn held_key_is_streamed_and_mode_switch_stops_first() {
    let (url, mut frames) = spawn_robot(None).await;
    let client = TeleopClient::start(&settings(url)).expect("start");
    let mut events = client.subscribe_events();
    wait_for_event(&mut events, |e| {
        *e == ClientEvent::ConnectionChanged { connected: true }
    })
    .await;

    client
        .send(OperatorAction::Input(InputEvent::KeyDown(ArrowKey::Up)))
        .await
        .expect("send key");
    let forward = ClientCommand::motion(Vector::new(0, 255));
    while next_command(&mut frames).await != forward {}

    client
        .send(OperatorAction::SetMode(OperatingMode::Auto))
        .await
        .expect("send mode");
    let mut previous = None;
    loop {
        let command = next_command(&mut frames).await;
        if let ClientCommand::ChangeMode { mode } = command {
            assert_eq!(mode, OperatingMode::Auto);
            break;
        }
        previous = Some(command);
    }
    assert_eq!(previous, Some(ClientCommand::stop()));

    let session = client.shutdown().await.expect("shutdown");
    assert_eq!(session.mode(), OperatingMode::Auto);
    assert_eq!(session.state(), ControlState::Stop);
}

#[tokio::test]
async fn robot_reported_mode_is_adopted_without_echo() {
    let (url, mut frames) = spawn_robot(Some(OperatingMode::Pid)).await;
    let client = TeleopClient::start(&settings(url)).expect("start");
    let mut events = client.subscribe_events();
    wait_for_event(&mut events, |e| {
        *e == ClientEvent::ModeChanged(OperatingMode::Pid)
    })
    .await;

    let session = client.shutdown().await.expect("shutdown");
    assert_eq!(session.mode(), OperatingMode::Pid);

    while let Ok(text) = frames.try_recv() {
        let command = ClientCommand::decode(&text).expect("valid command frame");
        assert!(
            !matches!(command, ClientCommand::ChangeMode { .. }),
            "mode echoed back: {command:?}"
        );
    }
}

#[tokio::test]
async fn invalid_server_url_is_rejected_up_front() {
    let result = TeleopClient::start(&settings("gopher://rover".into()));
    assert!(matches!(result, Err(ClientError::InvalidServerUrl { .. })));
}

#[tokio::test]
async fn heartbeat_resumes_on_the_new_link_without_replaying_stale_commands() {
    let (url, mut frames) = spawn_flaky_robot().await;
    let client = TeleopClient::start(&settings(url)).expect("start");
    let mut events = client.subscribe_events();
    wait_for_event(&mut events, |e| {
        *e == ClientEvent::ConnectionChanged { connected: true }
    })
    .await;

    let marker = ClientCommand::ConsoleMessage {
        message: "before the drop".into(),
    };
    client
        .send(OperatorAction::Send(marker.clone()))
        .await
        .expect("send marker");
    loop {
        let (connection, command) = next_tagged(&mut frames).await;
        assert_eq!(connection, 0);
        if command == marker {
            break;
        }
    }

    wait_for_event(&mut events, |e| {
        *e == ClientEvent::ConnectionChanged { connected: false }
    })
    .await;
    wait_for_event(&mut events, |e| {
        *e == ClientEvent::ConnectionChanged { connected: true }
    })
    .await;

    client
        .send(OperatorAction::Input(InputEvent::KeyDown(ArrowKey::Up)))
        .await
        .expect("send key");
    let forward = ClientCommand::motion(Vector::new(0, 255));
    let mut beats = 0;
    while beats < 3 {
        let (connection, command) = next_tagged(&mut frames).await;
        assert_eq!(connection, 1, "frame after reconnect on an old link");
        assert_ne!(command, marker, "stale command replayed after reconnect");
        if command == forward {
            beats += 1;
        }
    }

    let session = client.shutdown().await.expect("shutdown");
    assert_eq!(
        session.state(),
        ControlState::Stop,
        "shutdown releases the held key"
    );
}
