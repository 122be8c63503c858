use super::*;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use shared::{
    domain::{OperatingMode, Vector},
    error::ErrorCode,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tower::ServiceExt;

type Operator = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn spawn_bridge(watchdog: Option<Duration>) -> String {
    let state = Arc::new(AppState::new(DriveLimits::default()));
    if let Some(timeout) = watchdog {
        spawn_watchdog(state.clone(), timeout);
    }
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, build_router(state)).await;
    });
    format!("ws://{addr}/ws")
}

async fn connect(url: &str) -> Operator {
    let (ws, _) = connect_async(url).await.expect("connect");
    ws
}

async fn next_event(ws: &mut Operator) -> ServerEvent {
    loop {
        let message = time::timeout(WAIT, ws.next())
            .await
            .expect("event before timeout")
            .expect("socket open")
            .expect("frame");
        if let WsMessage::Text(text) = message {
            return ServerEvent::decode(&text).expect("valid event");
        }
    }
}

async fn send(ws: &mut Operator, command: &ClientCommand) {
    ws.send(WsMessage::Text(command.encode().expect("encode")))
        .await
        .expect("send");
}

async fn skip_greeting(ws: &mut Operator) {
    for _ in 0..4 {
        next_event(ws).await;
    }
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = build_router(Arc::new(AppState::new(DriveLimits::default())));
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn ws_route_requires_upgrade() {
    let app = build_router(Arc::new(AppState::new(DriveLimits::default())));
    let request = Request::get("/ws").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn new_operator_is_greeted_with_status_and_mode() {
    let url = spawn_bridge(None).await;
    let mut ws = connect(&url).await;
    assert!(matches!(next_event(&mut ws).await, ServerEvent::Status { .. }));
    assert_eq!(
        next_event(&mut ws).await,
        ServerEvent::ModeChanged {
            mode: OperatingMode::Manual
        }
    );
    assert!(matches!(next_event(&mut ws).await, ServerEvent::ObjectLists(_)));
    assert_eq!(
        next_event(&mut ws).await,
        ServerEvent::CameraStatus { enabled: true }
    );
}

#[tokio::test]
async fn joystick_is_mixed_into_motor_pwm() {
    let url = spawn_bridge(None).await;
    let mut ws = connect(&url).await;
    skip_greeting(&mut ws).await;

    send(&mut ws, &ClientCommand::motion(Vector::new(-100, 50))).await;
    assert_eq!(next_event(&mut ws).await, ServerEvent::motors(-25, 75));
}

#[tokio::test]
async fn mode_change_is_broadcast_to_every_operator() {
    let url = spawn_bridge(None).await;
    let mut first = connect(&url).await;
    skip_greeting(&mut first).await;
    let mut second = connect(&url).await;
    skip_greeting(&mut second).await;

    send(
        &mut first,
        &ClientCommand::ChangeMode {
            mode: OperatingMode::Auto,
        },
    )
    .await;
    for ws in [&mut first, &mut second] {
        assert_eq!(next_event(ws).await, ServerEvent::motors(0, 0));
        assert_eq!(
            next_event(ws).await,
            ServerEvent::ModeChanged {
                mode: OperatingMode::Auto
            }
        );
    }
}

#[tokio::test]
async fn unknown_mode_gets_an_error_reply() {
    let url = spawn_bridge(None).await;
    let mut ws = connect(&url).await;
    skip_greeting(&mut ws).await;

    ws.send(WsMessage::Text(
        r#"{"event":"change_mode","data":{"mode":"warp"}}"#.to_string(),
    ))
    .await
    .expect("send");
    match next_event(&mut ws).await {
        ServerEvent::Error(err) => assert_eq!(err.code, ErrorCode::UnknownMode),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn watchdog_stops_motors_when_heartbeat_stops() {
    let url = spawn_bridge(Some(Duration::from_millis(100))).await;
    let mut ws = connect(&url).await;
    skip_greeting(&mut ws).await;

    send(&mut ws, &ClientCommand::motion(Vector::new(0, 255))).await;
    assert_eq!(next_event(&mut ws).await, ServerEvent::motors(127, 127));
    assert_eq!(next_event(&mut ws).await, ServerEvent::motors(0, 0));
}
