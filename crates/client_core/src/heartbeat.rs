//! Fixed-period re-transmission of the current control state.
//!
//! The robot stops itself when no motion command arrives within its watchdog
//! deadline, so the state is resent every period even when nothing changed,
//! including an explicit zero vector while idle.

use std::time::Duration;

use shared::protocol::ClientCommand;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::{control::ControlState, session::ControlSession};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    period: Duration,
}

impl Heartbeat {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// First tick lands one full period after creation. A stalled loop resumes
    /// at the regular cadence instead of bursting the missed ticks.
    pub fn ticker(&self) -> Interval {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Command for one tick; `None` outside manual mode.
    pub fn beat(session: &ControlSession) -> Option<ClientCommand> {
        if !session.mode().is_manual() {
            return None;
        }
        Some(match session.state() {
            ControlState::Joystick(vector) => ClientCommand::motion(vector),
            ControlState::Turn(direction) => ClientCommand::turn_start(direction),
            ControlState::Stop => ClientCommand::stop(),
        })
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}
