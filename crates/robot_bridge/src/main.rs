use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use shared::{
    error::ApiError,
    protocol::{ClientCommand, ServerEvent},
};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

mod config;
mod drive;

use config::load_settings;
use drive::{DriveController, DriveLimits};

const MIN_WATCHDOG_POLL: Duration = Duration::from_millis(10);

struct AppState {
    drive: Mutex<DriveController>,
    events: broadcast::Sender<ServerEvent>,
}

impl AppState {
    fn new(limits: DriveLimits) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            drive: Mutex::new(DriveController::new(limits)),
            events,
        }
    }

    fn broadcast(&self, events: Vec<ServerEvent>) {
        for event in events {
            let _ = self.events.send(event);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings()?;
    let state = Arc::new(AppState::new(settings.limits));
    let _watchdog = spawn_watchdog(state.clone(), settings.watchdog);
    let app = build_router(state);

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(
        %addr,
        watchdog_ms = settings.watchdog.as_millis() as u64,
        max_pwm = settings.limits.max_pwm,
        "robot bridge listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerEvent>(32);

    let greeting = state.drive.lock().await.greeting();
    for event in greeting {
        let _ = direct_tx.send(event).await;
    }
    info!("operator connected");

    let send_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(event) => event,
                    None => break,
                },
                broadcasted = events_rx.recv() => match broadcasted {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "operator lagging, events skipped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            let text = match event.encode() {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        match ClientCommand::decode(&text) {
            Ok(command) => {
                debug!(event = command.event_name(), "command received");
                let replies = state.drive.lock().await.handle(command, Instant::now());
                state.broadcast(replies);
            }
            Err(err) => {
                warn!(error = %err, "rejected command frame");
                let _ = direct_tx.send(ServerEvent::Error(ApiError::from(&err))).await;
            }
        }
    }

    info!("operator disconnected");
    send_task.abort();
}

fn spawn_watchdog(state: Arc<AppState>, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval((timeout / 4).max(MIN_WATCHDOG_POLL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let stopped = state
                .drive
                .lock()
                .await
                .check_watchdog(Instant::now(), timeout);
            if let Some(event) = stopped {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "no motion command within watchdog deadline, motors stopped"
                );
                let _ = state.events.send(event);
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
