//! Gamepad input, flattened to the axis/button numbers the command tables
//! understand.

use gilrs::{Axis, Button, Event, EventType, Gilrs};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PadError {
    #[error("gamepad backend failed: {0}")]
    Init(String),
    #[error("no gamepad connected")]
    NoGamepad,
}

/// One controller event. Axis values are -1.0..1.0 with down/right
/// positive, button numbers follow the flat joydev layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PadEvent {
    Axis { axis: u8, value: f64 },
    Button { button: u8 },
}

/// Drains pending controller events without blocking.
pub trait EventPump {
    fn poll(&mut self) -> Option<PadEvent>;
}

pub struct GilrsPump {
    gilrs: Gilrs,
}

impl GilrsPump {
    pub fn new() -> Result<Self, PadError> {
        let method_name = "gilrs_pump_new";
        let gilrs = Gilrs::new().map_err(|e| PadError::Init(e.to_string()))?;
        let mut found = false;
        for (_id, gamepad) in gilrs.gamepads() {
            tracing::info!(method_name, name = gamepad.name(), "gamepad found");
            found = true;
        }
        if !found {
            return Err(PadError::NoGamepad);
        }
        Ok(Self { gilrs })
    }

    /// Stick axes by joydev number. The backend reports stick Y up-positive,
    /// the tables want down-positive, so Y values flip sign.
    fn map_axis(axis: Axis) -> Option<(u8, f64)> {
        match axis {
            Axis::LeftStickX => Some((0, 1.0)),
            Axis::LeftStickY => Some((1, -1.0)),
            Axis::LeftZ => Some((2, 1.0)),
            Axis::RightStickX => Some((3, 1.0)),
            Axis::RightStickY => Some((4, -1.0)),
            Axis::RightZ => Some((5, 1.0)),
            _ => None,
        }
    }

    fn map_button(button: Button) -> Option<u8> {
        match button {
            Button::South => Some(0),
            Button::East => Some(1),
            Button::West => Some(2),
            Button::North => Some(3),
            Button::LeftTrigger => Some(4),
            Button::RightTrigger => Some(5),
            Button::Select => Some(6),
            Button::Start => Some(7),
            Button::Mode => Some(8),
            _ => None,
        }
    }
}

impl EventPump for GilrsPump {
    fn poll(&mut self) -> Option<PadEvent> {
        while let Some(Event { event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::AxisChanged(axis, value, _) => {
                    if let Some((index, sign)) = Self::map_axis(axis) {
                        return Some(PadEvent::Axis {
                            axis: index,
                            value: sign * value as f64,
                        });
                    }
                }
                EventType::ButtonPressed(button, _) => {
                    if let Some(index) = Self::map_button(button) {
                        return Some(PadEvent::Button { button: index });
                    }
                }
                _ => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_button_layout() {
        assert_eq!(GilrsPump::map_button(Button::South), Some(0));
        assert_eq!(GilrsPump::map_button(Button::East), Some(1));
        assert_eq!(GilrsPump::map_button(Button::West), Some(2));
        assert_eq!(GilrsPump::map_button(Button::North), Some(3));
        assert_eq!(GilrsPump::map_button(Button::LeftTrigger), Some(4));
        assert_eq!(GilrsPump::map_button(Button::RightTrigger), Some(5));
        assert_eq!(GilrsPump::map_button(Button::Select), Some(6));
        assert_eq!(GilrsPump::map_button(Button::Start), Some(7));
        assert_eq!(GilrsPump::map_button(Button::Mode), Some(8));
        assert_eq!(GilrsPump::map_button(Button::LeftThumb), None);
    }

    #[test]
    fn test_stick_y_flips_sign() {
        assert_eq!(GilrsPump::map_axis(Axis::LeftStickY), Some((1, -1.0)));
        assert_eq!(GilrsPump::map_axis(Axis::RightStickY), Some((4, -1.0)));
        assert_eq!(GilrsPump::map_axis(Axis::LeftStickX), Some((0, 1.0)));
        assert_eq!(GilrsPump::map_axis(Axis::RightStickX), Some((3, 1.0)));
        assert_eq!(GilrsPump::map_axis(Axis::DPadX), None);
    }
}
