//! Flight commands and the gamepad tables that produce them.
//!
//! Axis and button numbering follows the flat joydev layout: sticks report
//! -1.0..1.0 with down/right positive, buttons are small integers.

/// Direction argument of the flip maneuver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    Forward,
    Back,
    Left,
    Right,
}

impl FlipDirection {
    /// Wire letter of the SDK `flip` command.
    pub fn letter(&self) -> &'static str {
        match self {
            FlipDirection::Forward => "f",
            FlipDirection::Back => "b",
            FlipDirection::Left => "l",
            FlipDirection::Right => "r",
        }
    }
}

/// One instruction for the vehicle. Velocities are percentages in
/// -100..=100 for all four channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetVelocity {
        left_right: i32,
        forward_back: i32,
        up_down: i32,
        yaw: i32,
    },
    TakeOff,
    Land,
    Flip(FlipDirection),
    Emergency,
}

/// What a button press means to the flight loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Vehicle(Command),
    ToggleRecording,
    TakeStill,
    EmergencyStop,
}

/// Fixed button layout: start/select fly and land, the face buttons flip,
/// the shoulder buttons handle media, the guide button is the kill switch.
pub fn button_action(button: u8) -> Option<ButtonAction> {
    match button {
        7 => Some(ButtonAction::Vehicle(Command::TakeOff)),
        6 => Some(ButtonAction::Vehicle(Command::Land)),
        3 => Some(ButtonAction::Vehicle(Command::Flip(FlipDirection::Forward))),
        0 => Some(ButtonAction::Vehicle(Command::Flip(FlipDirection::Back))),
        2 => Some(ButtonAction::Vehicle(Command::Flip(FlipDirection::Left))),
        1 => Some(ButtonAction::Vehicle(Command::Flip(FlipDirection::Right))),
        5 => Some(ButtonAction::TakeStill),
        4 => Some(ButtonAction::ToggleRecording),
        8 => Some(ButtonAction::EmergencyStop),
        _ => None,
    }
}

pub const AXIS_YAW: u8 = 0;
pub const AXIS_FORWARD_BACK: u8 = 1;
pub const AXIS_LEFT_RIGHT: u8 = 3;
pub const AXIS_UP_DOWN: u8 = 4;

const AXIS_COUNT: usize = 8;

/// Rounds a stick reading to two decimal places before mapping.
pub fn round_axis(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Linear map of -1.0..1.0 onto -100..=100, fraction truncated toward zero.
pub fn map_axis(value: f64) -> i32 {
    let in_min = -1.0;
    let in_max = 1.0;
    let out_min = -100.0;
    let out_max = 100.0;
    (out_min + (out_max - out_min) * ((value - in_min) / (in_max - in_min))) as i32
}

/// Last known position of every stick axis. The flight loop applies axis
/// events here and asks for one velocity command per tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct StickState {
    axes: [f64; AXIS_COUNT],
}

impl StickState {
    /// Records an axis move. Returns true when the axis drives the vehicle.
    pub fn update(&mut self, axis: u8, value: f64) -> bool {
        let idx = axis as usize;
        if idx >= AXIS_COUNT {
            return false;
        }
        self.axes[idx] = value;
        matches!(
            axis,
            AXIS_LEFT_RIGHT | AXIS_FORWARD_BACK | AXIS_UP_DOWN | AXIS_YAW
        )
    }

    /// Velocity command for the current stick position. Forward/back and
    /// up/down sticks report down-positive, the vehicle wants the opposite.
    pub fn velocity(&self) -> Command {
        Command::SetVelocity {
            left_right: map_axis(round_axis(self.axes[AXIS_LEFT_RIGHT as usize])),
            forward_back: map_axis(round_axis(-self.axes[AXIS_FORWARD_BACK as usize])),
            up_down: map_axis(round_axis(-self.axes[AXIS_UP_DOWN as usize])),
            yaw: map_axis(round_axis(self.axes[AXIS_YAW as usize])),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_round_axis() {
        assert_eq!(round_axis(0.755), 0.76);
        assert_eq!(round_axis(-0.755), -0.76);
        assert_eq!(round_axis(0.0), 0.0);
        assert_eq!(round_axis(1.0), 1.0);
        assert_eq!(round_axis(0.124), 0.12);
    }

    #[test]
    fn test_map_axis_endpoints() {
        assert_eq!(map_axis(-1.0), -100);
        assert_eq!(map_axis(1.0), 100);
        assert_eq!(map_axis(0.0), 0);
    }

    #[test]
    fn test_map_axis_values() {
        assert_eq!(map_axis(0.76), 76);
        assert_eq!(map_axis(-0.76), -76);
        assert_eq!(map_axis(0.5), 50);
        assert_eq!(map_axis(-0.5), -50);
        assert_eq!(map_axis(0.01), 1);
    }

    #[test]
    fn test_map_axis_monotonic() {
        let mut last = map_axis(-1.0);
        for step in -99..=100 {
            let v = step as f64 / 100.0;
            let mapped = map_axis(v);
            assert!(mapped >= last, "map_axis not monotonic at {}", v);
            last = mapped;
        }
    }

    #[test]
    fn test_stick_state_inversions() {
        let mut sticks = StickState::default();
        assert!(sticks.update(AXIS_LEFT_RIGHT, 0.755));
        assert!(sticks.update(AXIS_FORWARD_BACK, -1.0));
        assert!(sticks.update(AXIS_UP_DOWN, 1.0));
        assert!(sticks.update(AXIS_YAW, -0.5));
        assert_eq!(
            sticks.velocity(),
            Command::SetVelocity {
                left_right: 76,
                forward_back: 100,
                up_down: -100,
                yaw: -50,
            }
        );
    }

    #[test]
    fn test_stick_state_ignores_other_axes() {
        let mut sticks = StickState::default();
        assert!(!sticks.update(2, 0.9));
        assert!(!sticks.update(42, 0.9));
        assert_eq!(
            sticks.velocity(),
            Command::SetVelocity {
                left_right: 0,
                forward_back: 0,
                up_down: 0,
                yaw: 0,
            }
        );
    }

    #[test]
    fn test_button_table() {
        assert_eq!(
            button_action(7),
            Some(ButtonAction::Vehicle(Command::TakeOff))
        );
        assert_eq!(button_action(6), Some(ButtonAction::Vehicle(Command::Land)));
        assert_eq!(
            button_action(3),
            Some(ButtonAction::Vehicle(Command::Flip(FlipDirection::Forward)))
        );
        assert_eq!(
            button_action(0),
            Some(ButtonAction::Vehicle(Command::Flip(FlipDirection::Back)))
        );
        assert_eq!(
            button_action(2),
            Some(ButtonAction::Vehicle(Command::Flip(FlipDirection::Left)))
        );
        assert_eq!(
            button_action(1),
            Some(ButtonAction::Vehicle(Command::Flip(FlipDirection::Right)))
        );
        assert_eq!(button_action(5), Some(ButtonAction::TakeStill));
        assert_eq!(button_action(4), Some(ButtonAction::ToggleRecording));
        assert_eq!(button_action(8), Some(ButtonAction::EmergencyStop));
        assert_eq!(button_action(9), None);
        assert_eq!(button_action(255), None);
    }

    #[test]
    fn test_flip_letters() {
        assert_eq!(FlipDirection::Forward.letter(), "f");
        assert_eq!(FlipDirection::Back.letter(), "b");
        assert_eq!(FlipDirection::Left.letter(), "l");
        assert_eq!(FlipDirection::Right.letter(), "r");
    }
}
