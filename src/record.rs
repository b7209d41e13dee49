//! Video recording sessions and still capture.

use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::env;
use crate::utils;
use crate::video::{Frame, StreamGeometry};

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("media i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("still encode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("{0} pipe unavailable")]
    NoPipe(&'static str),
}

/// Appends frames to one recording session.
pub trait VideoSink {
    fn append(&mut self, frame: &Frame) -> Result<(), RecordError>;
    fn finish(&mut self) -> Result<(), RecordError>;
}

/// Everything a sink needs to open its destination.
#[derive(Debug, Clone)]
pub struct SinkSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub destination: String,
}

pub type SinkFactory = Box<dyn FnMut(&SinkSpec) -> Result<Box<dyn VideoSink>, RecordError>>;

enum RecordingState {
    Idle,
    Recording {
        sink: Box<dyn VideoSink>,
        started_at: DateTime<Local>,
    },
}

/// Owns the recording state and the still-capture request. A session that
/// can't open its writer never starts; stopping twice is harmless.
pub struct Recorder {
    state: RecordingState,
    make_sink: SinkFactory,
    media_dir: String,
    source_tag: String,
    container: String,
    still_requested: bool,
}

impl Recorder {
    pub fn new(
        make_sink: SinkFactory,
        media_dir: String,
        source_tag: String,
        container: String,
    ) -> Self {
        Self {
            state: RecordingState::Idle,
            make_sink,
            media_dir,
            source_tag,
            container,
            still_requested: false,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            FfmpegSink::factory(),
            env::ENV_TELLO_MEDIA_DIR.clone(),
            utils::addr_suffix(&env::ENV_TELLO_ADDR),
            env::ENV_TELLO_CONTAINER.clone(),
        )
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecordingState::Recording { .. })
    }

    pub fn toggle_recording(&mut self, geometry: StreamGeometry) {
        if self.is_recording() {
            self.stop_recording();
        } else {
            self.start_recording(geometry);
        }
    }

    pub fn start_recording(&mut self, geometry: StreamGeometry) {
        let method_name = "start_recording";
        if self.is_recording() {
            tracing::debug!(method_name, "already recording");
            return;
        }
        let destination = format!(
            "{}video_{}_{}.{}",
            self.media_dir,
            self.source_tag,
            utils::media_timestamp(),
            self.container
        );
        let spec = SinkSpec {
            width: geometry.width,
            height: geometry.height,
            fps: geometry.fps,
            destination: destination.clone(),
        };
        match (self.make_sink)(&spec) {
            Ok(sink) => {
                self.state = RecordingState::Recording {
                    sink,
                    started_at: Local::now(),
                };
                tracing::info!(method_name, destination, "recording started");
            }
            Err(e) => {
                tracing::warn!(method_name, destination, "can't open video writer: {}", e);
            }
        }
    }

    pub fn stop_recording(&mut self) {
        let method_name = "stop_recording";
        let state = std::mem::replace(&mut self.state, RecordingState::Idle);
        if let RecordingState::Recording {
            mut sink,
            started_at,
        } = state
        {
            let r = sink.finish();
            if r.is_err() {
                tracing::warn!(method_name, "video writer close failed: {}", r.unwrap_err());
            }
            let seconds = (Local::now() - started_at).num_seconds();
            tracing::info!(method_name, seconds, "recording stopped");
        }
    }

    /// Arms the snapshot flag; the next frame gets written out.
    pub fn request_still(&mut self) {
        self.still_requested = true;
    }

    pub fn handle_frame(&mut self, frame: &Frame) {
        let method_name = "handle_frame";
        let mut sink_gone = false;
        if let RecordingState::Recording { sink, .. } = &mut self.state {
            let r = sink.append(frame);
            if r.is_err() {
                tracing::warn!(method_name, "video writer append failed: {}", r.unwrap_err());
                sink_gone = true;
            }
        }
        if sink_gone {
            self.stop_recording();
        }
        if self.still_requested {
            self.save_still(frame);
            self.still_requested = false;
        }
    }

    fn save_still(&self, frame: &Frame) {
        let method_name = "save_still";
        let destination = format!(
            "{}picture_{}_{}.png",
            self.media_dir,
            self.source_tag,
            utils::media_timestamp()
        );
        let r = image::save_buffer(
            &destination,
            &frame.pixels,
            frame.width,
            frame.height,
            image::ExtendedColorType::Rgb8,
        );
        match r {
            Ok(()) => tracing::info!(method_name, destination, "picture saved"),
            Err(e) => tracing::warn!(method_name, destination, "can't save picture: {}", e),
        }
    }
}

/// Encodes a session by piping raw frames into an ffmpeg child.
pub struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl FfmpegSink {
    pub fn open(spec: &SinkSpec) -> Result<Self, RecordError> {
        let method_name = "ffmpeg_sink_open";
        let size = format!("{}x{}", spec.width, spec.height);
        let fps = spec.fps.to_string();
        let mut child = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s:v",
                &size,
                "-r",
                &fps,
                "-i",
                "-",
                "-c:v",
                "mpeg4",
                "-vtag",
                "XVID",
                &spec.destination,
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or(RecordError::NoPipe("ffmpeg stdin"))?;
        tracing::debug!(method_name, destination = spec.destination, "encoder started");
        Ok(Self {
            child,
            stdin: Some(stdin),
        })
    }

    pub fn factory() -> SinkFactory {
        Box::new(|spec| Ok(Box::new(FfmpegSink::open(spec)?) as Box<dyn VideoSink>))
    }
}

impl VideoSink for FfmpegSink {
    fn append(&mut self, frame: &Frame) -> Result<(), RecordError> {
        match self.stdin.as_mut() {
            Some(stdin) => {
                stdin.write_all(&frame.pixels)?;
                Ok(())
            }
            None => Err(RecordError::NoPipe("ffmpeg stdin")),
        }
    }

    fn finish(&mut self) -> Result<(), RecordError> {
        let method_name = "ffmpeg_sink_finish";
        // dropping stdin lets the encoder flush the container
        self.stdin = None;
        let status = self.child.wait()?;
        if !status.success() {
            tracing::warn!(method_name, "encoder exited with {}", status);
        }
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        let method_name = "ffmpeg_sink_drop";
        if self.stdin.take().is_none() {
            return;
        }
        let r = self.child.kill();
        if r.is_err() {
            tracing::debug!(method_name, "encoder already gone: {}", r.unwrap_err());
        }
        let r = self.child.wait();
        if r.is_err() {
            tracing::debug!(method_name, "encoder wait failed: {}", r.unwrap_err());
        }
    }
}
