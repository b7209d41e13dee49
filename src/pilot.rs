//! The flight loop: lifecycle, per-tick work, the emergency path and the
//! ordered shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::command::{button_action, ButtonAction, Command, StickState};
use crate::dispatch::{DispatchError, Dispatcher};
use crate::pad::{EventPump, PadEvent};
use crate::record::Recorder;
use crate::video::{FrameProducer, FrameSource, LatestFrameBuffer, Renderer, StreamGeometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Connecting,
    Streaming,
    Stopping,
    Stopped,
}

/// Why the flight ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTrigger {
    EmergencyButton,
    Interrupted,
    StreamDead,
    SurfaceClosed,
}

struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: LifecycleState::Connecting,
        }
    }

    fn state(&self) -> LifecycleState {
        self.state
    }

    fn advance(&mut self, next: LifecycleState) {
        let method_name = "lifecycle";
        let legal = matches!(
            (self.state, next),
            (LifecycleState::Connecting, LifecycleState::Streaming)
                | (LifecycleState::Streaming, LifecycleState::Stopping)
                | (LifecycleState::Stopping, LifecycleState::Stopped)
        );
        if legal {
            tracing::info!(method_name, "{:?} -> {:?}", self.state, next);
            self.state = next;
        } else {
            tracing::warn!(
                method_name,
                "illegal transition {:?} -> {:?} ignored",
                self.state,
                next
            );
        }
    }
}

/// Single-threaded orchestrator. Owns the dispatcher, the event pump, the
/// recorder and the render surface; the frame producer is its only helper
/// thread.
pub struct Pilot {
    dispatcher: Dispatcher,
    pump: Box<dyn EventPump>,
    recorder: Recorder,
    renderer: Option<Box<dyn Renderer>>,
    buffer: Arc<LatestFrameBuffer>,
    producer: Option<FrameProducer>,
    stop: Arc<AtomicBool>,
    lifecycle: Lifecycle,
    sticks: StickState,
    geometry: Option<StreamGeometry>,
    tick: Duration,
}

impl Pilot {
    pub fn new(
        dispatcher: Dispatcher,
        pump: Box<dyn EventPump>,
        recorder: Recorder,
        stop: Arc<AtomicBool>,
        tick: Duration,
    ) -> Self {
        Self {
            dispatcher,
            pump,
            recorder,
            renderer: None,
            buffer: Arc::new(LatestFrameBuffer::new()),
            producer: None,
            stop,
            lifecycle: Lifecycle::new(),
            sticks: StickState::default(),
            geometry: None,
            tick,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Brings the vehicle into streaming: handshake, stream reset, stream
    /// on, then the frame producer. Call once, before `run`.
    pub fn start(
        &mut self,
        source: Box<dyn FrameSource>,
        renderer: Box<dyn Renderer>,
    ) -> Result<(), DispatchError> {
        let method_name = "start";
        if self.lifecycle.state() != LifecycleState::Connecting {
            tracing::warn!(method_name, "already started: {:?}", self.lifecycle.state());
            return Ok(());
        }
        self.dispatcher.connect()?;
        // a stale stream from a previous run confuses the decoder
        let r = self.dispatcher.stream_off();
        if r.is_err() {
            tracing::debug!(method_name, "stream reset skipped: {}", r.unwrap_err());
        }
        self.dispatcher.stream_on()?;
        self.geometry = Some(source.geometry());
        self.renderer = Some(renderer);
        self.producer = Some(FrameProducer::spawn(
            source,
            self.buffer.clone(),
            self.stop.clone(),
        ));
        self.lifecycle.advance(LifecycleState::Streaming);
        Ok(())
    }

    /// Runs ticks until a stop trigger fires, then sends the emergency and
    /// tears everything down. Returns what ended the flight.
    pub fn run(&mut self) -> Option<StopTrigger> {
        let method_name = "run";
        if self.lifecycle.state() != LifecycleState::Streaming {
            tracing::warn!(method_name, "not streaming: {:?}", self.lifecycle.state());
            return None;
        }
        loop {
            let started = Instant::now();
            if let Some(trigger) = self.tick() {
                tracing::info!(method_name, "stop trigger: {:?}", trigger);
                self.emergency_stop();
                return Some(trigger);
            }
            let elapsed = started.elapsed();
            if elapsed < self.tick {
                thread::sleep(self.tick - elapsed);
            }
        }
    }

    /// One pass: newest frame to the surface and the recorder, then drain
    /// the pad and dispatch at most one velocity built from the latest
    /// stick position.
    fn tick(&mut self) -> Option<StopTrigger> {
        let method_name = "tick";
        if self.stop.load(Ordering::Relaxed) {
            return Some(StopTrigger::Interrupted);
        }

        let frame = self.buffer.try_take();
        if frame.is_none() && !self.producer_alive() {
            return Some(StopTrigger::StreamDead);
        }
        if let Some(frame) = frame {
            if let Some(renderer) = self.renderer.as_mut() {
                let r = renderer.render(&frame);
                if r.is_err() {
                    tracing::warn!(method_name, "render surface gone: {}", r.unwrap_err());
                    return Some(StopTrigger::SurfaceClosed);
                }
            }
            self.recorder.handle_frame(&frame);
        }

        let mut sticks_moved = false;
        while let Some(event) = self.pump.poll() {
            match event {
                PadEvent::Axis { axis, value } => {
                    sticks_moved |= self.sticks.update(axis, value);
                }
                PadEvent::Button { button } => {
                    if let Some(trigger) = self.press(button) {
                        return Some(trigger);
                    }
                }
            }
        }
        if sticks_moved {
            let r = self.dispatcher.send(self.sticks.velocity());
            if r.is_err() {
                tracing::warn!(method_name, "velocity dropped: {}", r.unwrap_err());
            }
        }
        None
    }

    fn producer_alive(&self) -> bool {
        self.producer.as_ref().map(|p| p.is_alive()).unwrap_or(false)
    }

    fn press(&mut self, button: u8) -> Option<StopTrigger> {
        let method_name = "press";
        match button_action(button) {
            Some(ButtonAction::Vehicle(command)) => {
                let r = self.dispatcher.send(command);
                if r.is_err() {
                    tracing::warn!(method_name, button, "command dropped: {}", r.unwrap_err());
                }
                None
            }
            Some(ButtonAction::ToggleRecording) => {
                if let Some(geometry) = self.geometry {
                    self.recorder.toggle_recording(geometry);
                }
                None
            }
            Some(ButtonAction::TakeStill) => {
                self.recorder.request_still();
                None
            }
            Some(ButtonAction::EmergencyStop) => Some(StopTrigger::EmergencyButton),
            None => {
                tracing::debug!(method_name, button, "unmapped button");
                None
            }
        }
    }

    /// One emergency to the vehicle, then the ordered teardown: join the
    /// producer, release the source, close the surface, release the writer,
    /// stream off.
    fn emergency_stop(&mut self) {
        let method_name = "emergency_stop";
        self.lifecycle.advance(LifecycleState::Stopping);
        let r = self.dispatcher.send(Command::Emergency);
        if r.is_err() {
            tracing::warn!(method_name, "emergency send failed: {}", r.unwrap_err());
        }
        if let Some(producer) = self.producer.take() {
            producer.stop();
            let source = producer.join();
            drop(source);
        }
        if let Some(mut renderer) = self.renderer.take() {
            renderer.close();
        }
        self.recorder.stop_recording();
        let r = self.dispatcher.stream_off();
        if r.is_err() {
            tracing::debug!(method_name, "stream off failed: {}", r.unwrap_err());
        }
        self.lifecycle.advance(LifecycleState::Stopped);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lifecycle_happy_path() {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Connecting);
        lifecycle.advance(LifecycleState::Streaming);
        assert_eq!(lifecycle.state(), LifecycleState::Streaming);
        lifecycle.advance(LifecycleState::Stopping);
        assert_eq!(lifecycle.state(), LifecycleState::Stopping);
        lifecycle.advance(LifecycleState::Stopped);
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_lifecycle_rejects_skips() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(LifecycleState::Stopping);
        assert_eq!(lifecycle.state(), LifecycleState::Connecting);
        lifecycle.advance(LifecycleState::Stopped);
        assert_eq!(lifecycle.state(), LifecycleState::Connecting);
    }

    #[test]
    fn test_lifecycle_stopped_is_terminal() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(LifecycleState::Streaming);
        lifecycle.advance(LifecycleState::Stopping);
        lifecycle.advance(LifecycleState::Stopped);
        lifecycle.advance(LifecycleState::Streaming);
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
        lifecycle.advance(LifecycleState::Connecting);
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_lifecycle_no_backwards_moves() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(LifecycleState::Streaming);
        lifecycle.advance(LifecycleState::Connecting);
        assert_eq!(lifecycle.state(), LifecycleState::Streaming);
    }
}
