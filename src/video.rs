//! Frame pipeline: decode source, latest-frame mailbox, producer thread and
//! the render surface.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::env;

const STATS_EVERY: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("video stream ended")]
    Eof,
    #[error("video i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("{0} pipe unavailable")]
    NoPipe(&'static str),
}

/// One decoded RGB24 frame. Moves from the producer through the mailbox to
/// the flight loop and is never shared.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub taken_at: DateTime<Local>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl StreamGeometry {
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Blocking source of decoded frames.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<Frame, StreamError>;
    fn geometry(&self) -> StreamGeometry;
}

/// Single-slot mailbox between the producer and the flight loop. A publish
/// replaces whatever is waiting, a take empties the slot. Neither side
/// blocks beyond the slot lock.
#[derive(Default)]
pub struct LatestFrameBuffer {
    slot: Mutex<Option<Frame>>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl LatestFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Frame) {
        let mut slot = self.slot.lock().unwrap();
        if slot.replace(frame).is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn try_take(&self) -> Option<Frame> {
        self.slot.lock().unwrap().take()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames that were replaced before anyone took them.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Background worker pulling frames from the source into the mailbox. Exits
/// on the shared stop flag or when the source fails, and hands the source
/// back on join so the owner releases it afterwards.
pub struct FrameProducer {
    handle: JoinHandle<Box<dyn FrameSource>>,
    alive: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl FrameProducer {
    pub fn spawn(
        mut source: Box<dyn FrameSource>,
        buffer: Arc<LatestFrameBuffer>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let method_name = "frame_producer";
        let alive = Arc::new(AtomicBool::new(true));
        let thread_alive = alive.clone();
        let thread_stop = stop.clone();
        let handle = thread::spawn(move || {
            let mut last_stats = Instant::now();
            while !thread_stop.load(Ordering::Relaxed) {
                match source.read_frame() {
                    Ok(frame) => {
                        buffer.publish(frame);
                        if last_stats.elapsed() >= STATS_EVERY {
                            tracing::info!(
                                method_name,
                                published = buffer.published(),
                                dropped = buffer.dropped(),
                                "stream stats"
                            );
                            last_stats = Instant::now();
                        }
                    }
                    Err(StreamError::Eof) => {
                        tracing::warn!(method_name, "video stream ended");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(method_name, "video stream failed: {}", e);
                        break;
                    }
                }
            }
            thread_alive.store(false, Ordering::Relaxed);
            source
        });
        Self {
            handle,
            alive,
            stop,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Waits for the worker and returns the source for release. None when
    /// the worker panicked.
    pub fn join(self) -> Option<Box<dyn FrameSource>> {
        let method_name = "frame_producer_join";
        match self.handle.join() {
            Ok(source) => Some(source),
            Err(_) => {
                tracing::error!(method_name, "frame producer panicked");
                None
            }
        }
    }
}

/// Frames decoded by an ffmpeg child reading the vehicle's UDP stream,
/// scaled to half the native size before they reach us.
pub struct FfmpegSource {
    child: Child,
    stdout: ChildStdout,
    geometry: StreamGeometry,
}

impl FfmpegSource {
    pub fn open(url: &str, native: StreamGeometry) -> Result<Self, StreamError> {
        let method_name = "ffmpeg_source_open";
        let geometry = StreamGeometry {
            width: native.width / 2,
            height: native.height / 2,
            fps: native.fps,
        };
        let scale = format!("scale={}:{}", geometry.width, geometry.height);
        let mut child = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-fflags",
                "nobuffer",
                "-i",
                url,
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-vf",
                &scale,
                "-an",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or(StreamError::NoPipe("ffmpeg stdout"))?;
        tracing::info!(
            method_name,
            url,
            width = geometry.width,
            height = geometry.height,
            "video decode started"
        );
        Ok(Self {
            child,
            stdout,
            geometry,
        })
    }

    pub fn from_env() -> Result<Self, StreamError> {
        let url = format!("udp://0.0.0.0:{}", *env::ENV_TELLO_VIDEO_PORT);
        let native = StreamGeometry {
            width: *env::ENV_TELLO_VIDEO_WIDTH,
            height: *env::ENV_TELLO_VIDEO_HEIGHT,
            fps: *env::ENV_TELLO_VIDEO_FPS,
        };
        Self::open(&url, native)
    }
}

impl FrameSource for FfmpegSource {
    fn read_frame(&mut self) -> Result<Frame, StreamError> {
        let mut pixels = vec![0; self.geometry.frame_bytes()];
        match self.stdout.read_exact(&mut pixels) {
            Ok(()) => Ok(Frame {
                width: self.geometry.width,
                height: self.geometry.height,
                pixels,
                taken_at: Local::now(),
            }),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(StreamError::Eof),
            Err(e) => Err(StreamError::Io(e)),
        }
    }

    fn geometry(&self) -> StreamGeometry {
        self.geometry
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let method_name = "ffmpeg_source_drop";
        let r = self.child.kill();
        if r.is_err() {
            tracing::debug!(method_name, "decoder already gone: {}", r.unwrap_err());
        }
        let r = self.child.wait();
        if r.is_err() {
            tracing::debug!(method_name, "decoder wait failed: {}", r.unwrap_err());
        }
    }
}

/// Where frames get shown to the operator. A render error means the surface
/// is gone and the flight has to end.
pub trait Renderer {
    fn render(&mut self, frame: &Frame) -> io::Result<()>;
    fn close(&mut self);
}

/// Renders by piping raw frames into an mplayer child. A broken pipe means
/// the operator closed the window.
pub struct MplayerRenderer {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl MplayerRenderer {
    pub fn start(geometry: StreamGeometry) -> Result<Self, StreamError> {
        let method_name = "mplayer_start";
        let rawvideo = format!(
            "w={}:h={}:format=rgb24:fps={}",
            geometry.width, geometry.height, geometry.fps
        );
        let mut child = Command::new("mplayer")
            .args(["-demuxer", "rawvideo", "-rawvideo", &rawvideo, "-nosound", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or(StreamError::NoPipe("mplayer stdin"))?;
        tracing::info!(method_name, rawvideo, "render window starting");
        Ok(Self {
            child,
            stdin: Some(stdin),
        })
    }

    fn shutdown(&mut self) {
        let method_name = "mplayer_shutdown";
        if self.stdin.take().is_none() {
            return;
        }
        let r = self.child.kill();
        if r.is_err() {
            tracing::debug!(method_name, "mplayer already gone: {}", r.unwrap_err());
        }
        let r = self.child.wait();
        if r.is_err() {
            tracing::debug!(method_name, "mplayer wait failed: {}", r.unwrap_err());
        }
    }
}

impl Renderer for MplayerRenderer {
    fn render(&mut self, frame: &Frame) -> io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(&frame.pixels),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "render window closed",
            )),
        }
    }

    fn close(&mut self) {
        self.shutdown();
    }
}

impl Drop for MplayerRenderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
