//! Runs the whole pipeline against a simulated UWB module and a logging DMX
//! interface, and shows the result in the terminal. No hardware needed.

use followspot::{
    config::TrackerConfig,
    device_link::{DeviceLink, LinkSettings},
    dummy_uwb::DummyUwb,
    gui::run_monitor,
    lighting_frame::{LightingBus, MockBus},
    tracking_loop::TrackingLoop,
    visualizer::mailbox,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::spawn,
    time::Duration,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = TrackerConfig {
        link: LinkSettings {
            settle_delay: Duration::from_millis(50),
            read_timeout: None,
        },
        ..TrackerConfig::default()
    };
    let uwb = DummyUwb::builder().radius(2.5).noise(0.08).build();
    let link = DeviceLink::new(uwb, config.link);

    let (writer, reader) = mailbox();
    let mut tracking = TrackingLoop::start(
        link,
        || Ok(LightingBus::open(MockBus::new())?),
        writer,
        &config,
    )?;

    let stop = Arc::new(AtomicBool::new(false));
    let th_stop = Arc::clone(&stop);
    let tracking_thread = spawn(move || {
        tracking.run(&th_stop);
        tracking.stats()
    });

    let shown = run_monitor(&reader, &stop);
    stop.store(true, Ordering::Relaxed);
    let stats = tracking_thread.join().map_err(|_| "tracking thread panicked")?;
    println!(
        "{} reports applied, {} dropped, {} failed",
        stats.applied, stats.dropped, stats.failed
    );

    Ok(shown?)
}
