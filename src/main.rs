use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tello_pilot::env;
use tello_pilot::utils;
use tello_pilot::{
    Dispatcher, FfmpegSource, FrameSource, GilrsPump, MplayerRenderer, Pilot, Recorder, SdkLink,
};

fn main() {
    let level = env::ENV_TELLO_LOG
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    let method_name = "main";

    let stop = Arc::new(AtomicBool::new(false));
    let r = signal_hook::flag::register(signal_hook::consts::SIGINT, stop.clone());
    if r.is_err() {
        utils::fatal(&format!("can't register SIGINT handler: {}", r.unwrap_err()));
    }
    let r = signal_hook::flag::register(signal_hook::consts::SIGTERM, stop.clone());
    if r.is_err() {
        utils::fatal(&format!("can't register SIGTERM handler: {}", r.unwrap_err()));
    }

    let pump = match GilrsPump::new() {
        Ok(pump) => pump,
        Err(e) => utils::fatal(&format!("gamepad setup failed: {e}")),
    };

    let source = match FfmpegSource::from_env() {
        Ok(source) => source,
        Err(e) => utils::fatal(&format!("video decoder setup failed: {e}")),
    };
    let renderer = match MplayerRenderer::start(source.geometry()) {
        Ok(renderer) => renderer,
        Err(e) => utils::fatal(&format!("render window setup failed: {e}")),
    };

    let dispatcher = Dispatcher::new(Box::new(SdkLink::from_env()));
    let mut pilot = Pilot::new(
        dispatcher,
        Box::new(pump),
        Recorder::from_env(),
        stop,
        Duration::from_millis(*env::ENV_TELLO_TICK_MS),
    );

    let r = pilot.start(Box::new(source), Box::new(renderer));
    if r.is_err() {
        utils::fatal(&format!("vehicle handshake failed: {}", r.unwrap_err()));
    }
    let trigger = pilot.run();
    tracing::info!(method_name, "flight over: {:?}", trigger);
}
