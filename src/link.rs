//! Control channel to the vehicle, speaking the SDK text protocol over UDP.

use std::io;
use std::net::UdpSocket;
use std::time::Duration;

use thiserror::Error;

use crate::command::FlipDirection;
use crate::env;
use crate::utils;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("link i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("no reply to '{cmd}' after {attempts} attempt(s)")]
    Timeout { cmd: String, attempts: u32 },
    #[error("vehicle rejected '{cmd}': {reply}")]
    Rejected { cmd: String, reply: String },
    #[error("unreadable reply to '{cmd}': {reply}")]
    BadReply { cmd: String, reply: String },
}

/// Everything the flight loop needs from the wire protocol. Velocity and
/// emergency are fire-and-forget, the rest waits for the vehicle's reply.
pub trait VehicleLink {
    fn connect(&mut self) -> Result<(), LinkError>;
    fn stream_on(&mut self) -> Result<(), LinkError>;
    fn stream_off(&mut self) -> Result<(), LinkError>;
    fn send_velocity(
        &mut self,
        left_right: i32,
        forward_back: i32,
        up_down: i32,
        yaw: i32,
    ) -> Result<(), LinkError>;
    fn take_off(&mut self) -> Result<(), LinkError>;
    fn land(&mut self) -> Result<(), LinkError>;
    fn flip(&mut self, direction: FlipDirection) -> Result<(), LinkError>;
    fn emergency(&mut self) -> Result<(), LinkError>;
    fn battery(&mut self) -> Result<i32, LinkError>;
}

pub struct SdkLink {
    sock: UdpSocket,
    remote: String,
    retry_count: u32,
}

impl SdkLink {
    pub fn new(
        sock: UdpSocket,
        remote: String,
        retry_count: u32,
        response_timeout: Duration,
    ) -> Self {
        let method_name = "sdk_link_new";
        let r = sock.set_read_timeout(Some(response_timeout));
        if r.is_err() {
            tracing::warn!(method_name, "can't set read timeout: {}", r.unwrap_err());
        }
        Self {
            sock,
            remote,
            retry_count: retry_count.max(1),
        }
    }

    pub fn from_env() -> Self {
        let local_addr = format!("0.0.0.0:{}", *env::ENV_TELLO_LOCAL_PORT);
        let remote = format!("{}:{}", *env::ENV_TELLO_ADDR, *env::ENV_TELLO_CTRL_PORT);
        Self::new(
            utils::udp_sock(&local_addr),
            remote,
            *env::ENV_TELLO_RETRY_COUNT,
            Duration::from_millis(*env::ENV_TELLO_RESPONSE_TIMEOUT_MS),
        )
    }

    /// Sends a command and waits for the reply, retrying up to the
    /// configured attempt count.
    fn command(&mut self, cmd: &str) -> Result<String, LinkError> {
        let method_name = "command";
        for attempt in 0..self.retry_count {
            self.sock.send_to(cmd.as_bytes(), &self.remote)?;
            let mut buff: [u8; 1024] = [0; 1024];
            match self.sock.recv_from(&mut buff) {
                Ok((nread, _)) => {
                    let reply = String::from_utf8_lossy(&buff[..nread]).trim().to_owned();
                    tracing::debug!(method_name, cmd, reply, attempt, "reply");
                    return Ok(reply);
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    tracing::debug!(method_name, cmd, attempt, "no reply in time");
                }
                Err(e) => return Err(LinkError::Io(e)),
            }
        }
        Err(LinkError::Timeout {
            cmd: cmd.to_owned(),
            attempts: self.retry_count,
        })
    }

    fn expect_ok(&mut self, cmd: &str) -> Result<(), LinkError> {
        let reply = self.command(cmd)?;
        if reply.eq_ignore_ascii_case("ok") {
            Ok(())
        } else {
            Err(LinkError::Rejected {
                cmd: cmd.to_owned(),
                reply,
            })
        }
    }

    /// Sends without waiting for a reply.
    fn blind(&mut self, cmd: &str) -> Result<(), LinkError> {
        let method_name = "blind";
        tracing::debug!(method_name, cmd, "send");
        self.sock.send_to(cmd.as_bytes(), &self.remote)?;
        Ok(())
    }
}

impl VehicleLink for SdkLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        self.expect_ok("command")
    }

    fn stream_on(&mut self) -> Result<(), LinkError> {
        self.expect_ok("streamon")
    }

    fn stream_off(&mut self) -> Result<(), LinkError> {
        self.expect_ok("streamoff")
    }

    fn send_velocity(
        &mut self,
        left_right: i32,
        forward_back: i32,
        up_down: i32,
        yaw: i32,
    ) -> Result<(), LinkError> {
        self.blind(&format!("rc {left_right} {forward_back} {up_down} {yaw}"))
    }

    fn take_off(&mut self) -> Result<(), LinkError> {
        self.expect_ok("takeoff")
    }

    fn land(&mut self) -> Result<(), LinkError> {
        self.expect_ok("land")
    }

    fn flip(&mut self, direction: FlipDirection) -> Result<(), LinkError> {
        self.expect_ok(&format!("flip {}", direction.letter()))
    }

    fn emergency(&mut self) -> Result<(), LinkError> {
        self.blind("emergency")
    }

    fn battery(&mut self) -> Result<i32, LinkError> {
        let reply = self.command("battery?")?;
        reply.parse::<i32>().map_err(|_| LinkError::BadReply {
            cmd: "battery?".to_owned(),
            reply,
        })
    }
}
