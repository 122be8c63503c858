use shared::domain::{Direction, Vector};

use super::*;

#[test]
fn latest_intent_overwrites_state() {
    let joystick = reduce(
        ControlState::Stop,
        OperatingMode::Manual,
        Intent::Joystick(Vector::new(10, 20)),
    );
    assert_eq!(joystick.state, ControlState::Joystick(Vector::new(10, 20)));
    assert!(joystick.commands.is_empty());

    let replaced = reduce(
        joystick.state,
        OperatingMode::Manual,
        Intent::Joystick(Vector::new(-5, 0)),
    );
    assert_eq!(replaced.state, ControlState::Joystick(Vector::new(-5, 0)));
}

#[test]
fn entering_turn_starts_it_immediately() {
    let transition = reduce(
        ControlState::Stop,
        OperatingMode::Manual,
        Intent::Turn(Direction::Left),
    );
    assert_eq!(transition.state, ControlState::Turn(Direction::Left));
    assert_eq!(
        transition.commands,
        vec![ClientCommand::turn_start(Direction::Left)]
    );
}

#[test]
fn repeated_turn_intent_is_silent() {
    let transition = reduce(
        ControlState::Turn(Direction::Right),
        OperatingMode::Manual,
        Intent::Turn(Direction::Right),
    );
    assert!(transition.commands.is_empty());
}

#[test]
fn leaving_turn_stops_it_once() {
    let transition = reduce(
        ControlState::Turn(Direction::Left),
        OperatingMode::Manual,
        Intent::Stop,
    );
    assert_eq!(transition.state, ControlState::Stop);
    assert_eq!(
        transition.commands,
        vec![ClientCommand::turn_stop(Direction::Left)]
    );
}

#[test]
fn switching_turn_direction_stops_then_starts() {
    let transition = reduce(
        ControlState::Turn(Direction::Left),
        OperatingMode::Manual,
        Intent::Turn(Direction::Right),
    );
    assert_eq!(
        transition.commands,
        vec![
            ClientCommand::turn_stop(Direction::Left),
            ClientCommand::turn_start(Direction::Right),
        ]
    );
}

#[test]
fn joystick_takes_over_from_turn() {
    let transition = reduce(
        ControlState::Turn(Direction::Right),
        OperatingMode::Manual,
        Intent::Joystick(Vector::new(0, 255)),
    );
    assert_eq!(transition.state, ControlState::Joystick(Vector::new(0, 255)));
    assert_eq!(
        transition.commands,
        vec![ClientCommand::turn_stop(Direction::Right)]
    );
}

#[test]
fn non_manual_mode_forces_stop_and_ignores_intents() {
    for mode in [OperatingMode::Auto, OperatingMode::Pid, OperatingMode::Autotune] {
        let transition = reduce(
            ControlState::Joystick(Vector::new(100, 50)),
            mode,
            Intent::Turn(Direction::Left),
        );
        assert_eq!(transition.state, ControlState::Stop);
        assert!(transition.commands.is_empty());
    }
}

#[test]
fn reset_emits_a_single_stop() {
    let transition = reset();
    assert_eq!(transition.state, ControlState::Stop);
    assert_eq!(transition.commands, vec![ClientCommand::stop()]);
}
