use std::time::Duration;

use shared::{domain::OperatingMode, protocol::ServerEvent};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time,
};
use tracing::{info, warn};

pub mod config;
pub mod control;
pub mod driver;
pub mod error;
pub mod heartbeat;
pub mod input;
pub mod reducer;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use config::{load_settings, ClientSettings};
pub use control::{ArrowKey, ControlState, PressedKeySet};
pub use driver::{OperatorAction, SessionDriver};
pub use error::ClientError;
pub use heartbeat::Heartbeat;
pub use input::{ButtonEvent, InputEvent, Intent};
pub use session::{ControlSession, InputOutcome};
pub use telemetry::TelemetryView;

const ACTION_QUEUE: usize = 64;
const EVENT_QUEUE: usize = 1024;
const TRANSPORT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// What the host UI observes.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    ConnectionChanged { connected: bool },
    /// The session switched mode, either on request or because the robot said so.
    ModeChanged(OperatingMode),
    Server(ServerEvent),
    Error(String),
}

/// A running teleop session: transport task plus session driver.
pub struct TeleopClient {
    actions: mpsc::Sender<OperatorAction>,
    events: broadcast::Sender<ClientEvent>,
    driver: JoinHandle<ControlSession>,
    transport: JoinHandle<()>,
}

impl TeleopClient {
    /// Spawns both tasks on the current tokio runtime.
    pub fn start(settings: &ClientSettings) -> Result<Self, ClientError> {
        let url = transport::websocket_url(&settings.server_url)?;
        info!(%url, mode = %settings.initial_mode, "starting teleop session");

        let (sink, inbound, transport) = transport::spawn_transport(url, settings.reconnect_delay);
        let (events, _) = broadcast::channel(EVENT_QUEUE);
        let (actions, actions_rx) = mpsc::channel(ACTION_QUEUE);

        let driver = SessionDriver::new(
            ControlSession::new(settings.deadzone_radius, settings.initial_mode),
            Heartbeat::new(settings.heartbeat_interval),
            sink,
            events.clone(),
        );
        let driver = tokio::spawn(driver.run(actions_rx, inbound));

        Ok(Self {
            actions,
            events,
            driver,
            transport,
        })
    }

    pub async fn send(&self, action: OperatorAction) -> Result<(), ClientError> {
        self.actions
            .send(action)
            .await
            .map_err(|_| ClientError::DriverStopped)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Stops the driver (which releases every input and sends a final stop)
    /// and then closes the connection.
    pub async fn shutdown(self) -> Result<ControlSession, ClientError> {
        let Self {
            actions,
            driver,
            mut transport,
            ..
        } = self;
        drop(actions);

        let session = driver.await.map_err(|_| ClientError::DriverStopped)?;
        if time::timeout(TRANSPORT_SHUTDOWN_GRACE, &mut transport)
            .await
            .is_err()
        {
            warn!("transport did not close in time, aborting");
            transport.abort();
        }
        info!(session = %session.id(), "teleop session closed");
        Ok(session)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
