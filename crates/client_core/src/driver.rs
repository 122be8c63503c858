//! The task that owns a [`ControlSession`].
//!
//! Operator actions, transport events and heartbeat ticks are multiplexed in
//! one `select!` loop. Each handler runs to completion before the next one
//! starts, so the heartbeat always reads a consistent state.

use shared::{
    domain::OperatingMode,
    protocol::{ClientCommand, ServerEvent},
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use crate::{
    heartbeat::Heartbeat,
    input::InputEvent,
    session::ControlSession,
    transport::{CommandSink, TransportEvent},
    ClientEvent,
};

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorAction {
    Input(InputEvent),
    SetMode(OperatingMode),
    ReleaseAll,
    /// Ancillary commands (recording, camera, parameters, console text).
    Send(ClientCommand),
}

pub struct SessionDriver<S> {
    session: ControlSession,
    heartbeat: Heartbeat,
    sink: S,
    connected: bool,
    events: broadcast::Sender<ClientEvent>,
}

impl<S: CommandSink> SessionDriver<S> {
    pub fn new(
        session: ControlSession,
        heartbeat: Heartbeat,
        sink: S,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            session,
            heartbeat,
            sink,
            connected: false,
            events,
        }
    }

    pub fn session(&self) -> &ControlSession {
        &self.session
    }

    /// Runs until the action channel closes, then releases every held input,
    /// sends a final stop and hands the session back.
    pub async fn run(
        mut self,
        mut actions: mpsc::Receiver<OperatorAction>,
        mut transport: mpsc::Receiver<TransportEvent>,
    ) -> ControlSession {
        let mut ticker = self.heartbeat.ticker();
        let mut transport_open = true;
        info!(
            session = %self.session.id(),
            mode = %self.session.mode(),
            period_ms = self.heartbeat.period().as_millis() as u64,
            "session driver started"
        );

        loop {
            tokio::select! {
                action = actions.recv() => match action {
                    Some(action) => self.handle_action(action),
                    None => break,
                },
                event = transport.recv(), if transport_open => match event {
                    Some(event) => self.handle_transport(event),
                    None => {
                        transport_open = false;
                        self.set_connected(false);
                    }
                },
                _ = ticker.tick() => self.on_tick(),
            }
        }

        let commands = self.session.release_all();
        self.emit_all(commands);
        if self.session.mode().is_manual() {
            self.emit(ClientCommand::stop());
        }
        info!(session = %self.session.id(), "session driver stopped");
        self.session
    }

    pub fn handle_action(&mut self, action: OperatorAction) {
        match action {
            OperatorAction::Input(event) => {
                let outcome = self.session.handle_input(event);
                self.emit_all(outcome.commands);
            }
            OperatorAction::SetMode(mode) => {
                let commands = self.session.set_operating_mode(mode);
                if !commands.is_empty() {
                    self.publish(ClientEvent::ModeChanged(mode));
                }
                self.emit_all(commands);
            }
            OperatorAction::ReleaseAll => {
                let commands = self.session.release_all();
                self.emit_all(commands);
            }
            OperatorAction::Send(ClientCommand::ChangeMode { mode }) => {
                self.handle_action(OperatorAction::SetMode(mode));
            }
            OperatorAction::Send(command) if command.is_motion() => {
                warn!(
                    event = command.event_name(),
                    "motion commands are produced by the session, ignoring"
                );
            }
            OperatorAction::Send(command) => self.emit(command),
        }
    }

    pub fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.set_connected(true),
            TransportEvent::Disconnected { reason } => {
                debug!(%reason, "transport reported disconnect");
                self.set_connected(false);
            }
            TransportEvent::Event(event) => {
                if let ServerEvent::ModeChanged { mode } = &event {
                    let commands = self.session.sync_operating_mode(*mode);
                    if !commands.is_empty() {
                        self.publish(ClientEvent::ModeChanged(*mode));
                    }
                    self.emit_all(commands);
                }
                self.publish(ClientEvent::Server(event));
            }
            TransportEvent::Rejected { reason } => {
                self.publish(ClientEvent::Error(format!("invalid server event: {reason}")));
            }
        }
    }

    pub fn on_tick(&mut self) {
        if let Some(command) = Heartbeat::beat(&self.session) {
            trace!(event = command.event_name(), "heartbeat");
            self.emit(command);
        }
    }

    fn set_connected(&mut self, connected: bool) {
        if self.connected == connected {
            return;
        }
        self.connected = connected;
        if connected {
            info!(session = %self.session.id(), "robot link up");
        } else {
            warn!(session = %self.session.id(), "robot link down");
        }
        self.publish(ClientEvent::ConnectionChanged { connected });
    }

    fn emit_all(&mut self, commands: Vec<ClientCommand>) {
        for command in commands {
            self.emit(command);
        }
    }

    fn emit(&mut self, command: ClientCommand) {
        let event = command.event_name();
        if !self.connected {
            trace!(event, "not connected, command dropped");
            return;
        }
        match self.sink.send(command) {
            Ok(()) => debug!(event, "command sent"),
            Err(err) => warn!(event, error = %err, "command dropped"),
        }
    }

    fn publish(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/driver_tests.rs"]
mod tests;
