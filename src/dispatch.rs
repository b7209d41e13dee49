//! Demuxes flight commands onto the vehicle link.

use thiserror::Error;

use crate::command::Command;
use crate::link::{LinkError, VehicleLink};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Link(#[from] LinkError),
}

pub struct Dispatcher {
    link: Box<dyn VehicleLink>,
}

impl Dispatcher {
    pub fn new(link: Box<dyn VehicleLink>) -> Self {
        Self { link }
    }

    pub fn connect(&mut self) -> Result<(), DispatchError> {
        let method_name = "connect";
        tracing::info!(method_name, "vehicle handshake");
        Ok(self.link.connect()?)
    }

    pub fn stream_on(&mut self) -> Result<(), DispatchError> {
        Ok(self.link.stream_on()?)
    }

    pub fn stream_off(&mut self) -> Result<(), DispatchError> {
        Ok(self.link.stream_off()?)
    }

    /// Sends one command, exactly one link call, no retries. An emergency
    /// additionally reads the battery so the operator sees what the vehicle
    /// cut out at.
    pub fn send(&mut self, command: Command) -> Result<(), DispatchError> {
        let method_name = "send";
        match command {
            Command::SetVelocity {
                left_right,
                forward_back,
                up_down,
                yaw,
            } => self
                .link
                .send_velocity(left_right, forward_back, up_down, yaw)?,
            Command::TakeOff => self.link.take_off()?,
            Command::Land => self.link.land()?,
            Command::Flip(direction) => self.link.flip(direction)?,
            Command::Emergency => {
                self.link.emergency()?;
                match self.link.battery() {
                    Ok(level) => {
                        tracing::info!(method_name, battery = level, "emergency stop sent")
                    }
                    Err(e) => {
                        tracing::warn!(method_name, "battery unavailable after emergency: {}", e)
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::FlipDirection;
    use std::sync::{Arc, Mutex};

    struct RecordingLink {
        sent: Arc<Mutex<Vec<String>>>,
        battery: Result<i32, ()>,
    }

    impl RecordingLink {
        fn push(&self, cmd: &str) {
            self.sent.lock().unwrap().push(cmd.to_owned());
        }
    }

    impl VehicleLink for RecordingLink {
        fn connect(&mut self) -> Result<(), LinkError> {
            self.push("command");
            Ok(())
        }

        fn stream_on(&mut self) -> Result<(), LinkError> {
            self.push("streamon");
            Ok(())
        }

        fn stream_off(&mut self) -> Result<(), LinkError> {
            self.push("streamoff");
            Ok(())
        }

        fn send_velocity(
            &mut self,
            left_right: i32,
            forward_back: i32,
            up_down: i32,
            yaw: i32,
        ) -> Result<(), LinkError> {
            self.push(&format!("rc {left_right} {forward_back} {up_down} {yaw}"));
            Ok(())
        }

        fn take_off(&mut self) -> Result<(), LinkError> {
            self.push("takeoff");
            Ok(())
        }

        fn land(&mut self) -> Result<(), LinkError> {
            self.push("land");
            Ok(())
        }

        fn flip(&mut self, direction: FlipDirection) -> Result<(), LinkError> {
            self.push(&format!("flip {}", direction.letter()));
            Ok(())
        }

        fn emergency(&mut self) -> Result<(), LinkError> {
            self.push("emergency");
            Ok(())
        }

        fn battery(&mut self) -> Result<i32, LinkError> {
            self.push("battery?");
            self.battery.map_err(|_| LinkError::Timeout {
                cmd: "battery?".to_owned(),
                attempts: 1,
            })
        }
    }

    fn dispatcher(battery: Result<i32, ()>) -> (Dispatcher, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let link = RecordingLink {
            sent: sent.clone(),
            battery,
        };
        (Dispatcher::new(Box::new(link)), sent)
    }

    #[test]
    fn test_velocity_is_one_link_call() {
        let (mut dispatcher, sent) = dispatcher(Ok(87));
        dispatcher
            .send(Command::SetVelocity {
                left_right: 76,
                forward_back: 0,
                up_down: 0,
                yaw: 0,
            })
            .unwrap();
        assert_eq!(*sent.lock().unwrap(), vec!["rc 76 0 0 0"]);
    }

    #[test]
    fn test_emergency_reads_battery() {
        let (mut dispatcher, sent) = dispatcher(Ok(87));
        dispatcher.send(Command::Emergency).unwrap();
        assert_eq!(*sent.lock().unwrap(), vec!["emergency", "battery?"]);
    }

    #[test]
    fn test_emergency_tolerates_battery_failure() {
        let (mut dispatcher, sent) = dispatcher(Err(()));
        assert!(dispatcher.send(Command::Emergency).is_ok());
        assert_eq!(*sent.lock().unwrap(), vec!["emergency", "battery?"]);
    }

    #[test]
    fn test_flight_commands_pass_through() {
        let (mut dispatcher, sent) = dispatcher(Ok(87));
        dispatcher.send(Command::TakeOff).unwrap();
        dispatcher.send(Command::Flip(FlipDirection::Left)).unwrap();
        dispatcher.send(Command::Land).unwrap();
        assert_eq!(*sent.lock().unwrap(), vec!["takeoff", "flip l", "land"]);
    }
}
