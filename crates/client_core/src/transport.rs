//! Websocket channel to the robot.
//!
//! Sending is fire-and-forget. Nothing is queued across a disconnect: commands
//! sent while the link is down are dropped, and any still pending when a new
//! link comes up are discarded before the first write.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use shared::protocol::{ClientCommand, ServerEvent};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
    time,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::ClientError;

const OUTBOUND_CAPACITY: usize = 32;
const INBOUND_CAPACITY: usize = 256;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: String },
    Event(ServerEvent),
    /// An inbound frame that failed boundary validation.
    Rejected { reason: String },
}

/// Outbound side of the channel as seen by the session driver.
pub trait CommandSink: Send {
    fn send(&mut self, command: ClientCommand) -> Result<(), ClientError>;
}

#[derive(Debug, Clone)]
pub struct TransportHandle {
    outbound: mpsc::Sender<String>,
}

impl CommandSink for TransportHandle {
    fn send(&mut self, command: ClientCommand) -> Result<(), ClientError> {
        let text = command.encode()?;
        self.outbound.try_send(text).map_err(|err| match err {
            TrySendError::Full(_) => ClientError::Backpressure,
            TrySendError::Closed(_) => ClientError::Disconnected,
        })
    }
}

/// Derives the websocket endpoint from the configured server URL:
/// `http` maps to `ws`, `https` to `wss`, and a bare host gets the `/ws` path.
pub fn websocket_url(server_url: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidServerUrl {
        url: server_url.to_string(),
        reason,
    };

    let mut url = Url::parse(server_url.trim()).map_err(|err| invalid(err.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid(format!("cannot switch to scheme '{scheme}'")))?;
    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/ws");
    }
    Ok(url)
}

/// Spawns the connection task. It keeps reconnecting every `reconnect_delay`
/// until the returned handle (and all its clones) is dropped.
pub fn spawn_transport(
    url: Url,
    reconnect_delay: Duration,
) -> (TransportHandle, mpsc::Receiver<TransportEvent>, JoinHandle<()>) {
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let (events_tx, events_rx) = mpsc::channel(INBOUND_CAPACITY);
    let task = tokio::spawn(run_transport(url, reconnect_delay, outbound_rx, events_tx));
    (
        TransportHandle {
            outbound: outbound_tx,
        },
        events_rx,
        task,
    )
}

enum LinkExit {
    Shutdown,
    Lost(String),
}

async fn run_transport(
    url: Url,
    reconnect_delay: Duration,
    mut outbound: mpsc::Receiver<String>,
    events: mpsc::Sender<TransportEvent>,
) {
    let mut reported_down = false;
    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                discard_pending(&mut outbound);
                info!(%url, "transport: connected");
                if events.send(TransportEvent::Connected).await.is_err() {
                    return;
                }
                match pump(stream, &mut outbound, &events).await {
                    LinkExit::Shutdown => {
                        info!(%url, "transport: closed");
                        return;
                    }
                    LinkExit::Lost(reason) => {
                        warn!(%url, %reason, "transport: connection lost");
                        reported_down = true;
                        if events
                            .send(TransportEvent::Disconnected { reason })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }
            Err(err) => {
                debug!(%url, error = %err, "transport: connect failed");
                if !reported_down {
                    reported_down = true;
                    let reason = format!("failed to connect websocket: {err}");
                    if events
                        .send(TransportEvent::Disconnected { reason })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
        }

        if !wait_for_retry(reconnect_delay, &mut outbound).await {
            return;
        }
    }
}

async fn pump<S>(
    stream: WebSocketStream<S>,
    outbound: &mut mpsc::Receiver<String>,
    events: &mpsc::Sender<TransportEvent>,
) -> LinkExit
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut writer, mut reader) = stream.split();
    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(text) => {
                    if let Err(err) = writer.send(Message::Text(text)).await {
                        return LinkExit::Lost(err.to_string());
                    }
                }
                None => {
                    let _ = writer.close().await;
                    return LinkExit::Shutdown;
                }
            },
            incoming = reader.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let event = match ServerEvent::decode(&text) {
                        Ok(event) => TransportEvent::Event(event),
                        Err(err) => {
                            warn!(error = %err, "transport: rejected inbound frame");
                            TransportEvent::Rejected {
                                reason: err.to_string(),
                            }
                        }
                    };
                    if events.send(event).await.is_err() {
                        return LinkExit::Shutdown;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return LinkExit::Lost("closed by peer".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return LinkExit::Lost(err.to_string()),
            },
        }
    }
}

fn discard_pending(outbound: &mut mpsc::Receiver<String>) {
    let mut discarded = 0usize;
    while outbound.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        debug!(discarded, "transport: discarded commands queued before connect");
    }
}

/// Waits out the reconnect delay, dropping whatever arrives meanwhile.
/// Returns `false` once every sender is gone.
async fn wait_for_retry(delay: Duration, outbound: &mut mpsc::Receiver<String>) -> bool {
    let sleep = time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            dropped = outbound.recv() => match dropped {
                Some(_) => trace!("transport: dropped command while disconnected"),
                None => return false,
            },
        }
    }
}
