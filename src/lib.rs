pub mod command;
pub mod dispatch;
pub mod env;
pub mod link;
pub mod pad;
pub mod pilot;
pub mod record;
pub mod utils;
pub mod video;

#[macro_use]
extern crate lazy_static;

pub use command::{button_action, map_axis, round_axis, ButtonAction, Command, FlipDirection};
pub use dispatch::{DispatchError, Dispatcher};
pub use link::{LinkError, SdkLink, VehicleLink};
pub use pad::{EventPump, GilrsPump, PadError, PadEvent};
pub use pilot::{LifecycleState, Pilot, StopTrigger};
pub use record::{RecordError, Recorder, SinkFactory, SinkSpec, VideoSink};
pub use video::{
    FfmpegSource, Frame, FrameProducer, FrameSource, LatestFrameBuffer, MplayerRenderer, Renderer,
    StreamError, StreamGeometry,
};
