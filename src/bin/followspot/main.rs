//! Tracks a UWB tag and keeps a moving-head light pointed at it.

use clap::Parser;
use followspot::{
    args::TrackerArgs,
    config::TrackerConfig,
    device_link::{open_port, DeviceLink, SerialIo, UWB_BAUD_RATE},
    dummy_uwb::DummyUwb,
    error::TrackerError,
    gui::{pick_port, run_monitor},
    lighting_frame::{LightingBus, MockBus, DMX_BAUD_RATE},
    tracking_loop::{send_test_pattern, TrackingLoop},
    visualizer::mailbox,
};
use log::{error, info};
use serial2::SerialPort;
use std::{
    io::Write,
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::spawn,
};

type Port = Box<dyn SerialIo>;
type BusWriter = Box<dyn Write + Send>;

// Example:
// cargo run --bin followspot --
//                            --uwb-port  /dev/ttyACM0
//                            --dmx-port  /dev/ttyUSB0
//                            --fixture   Sparky
//                            --config    rig.ron
//                            --monitor

fn main() -> ExitCode {
    env_logger::init();
    let args = TrackerArgs::parse();
    info!("starting with {:?}", args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("followspot: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &TrackerArgs) -> Result<TrackerConfig, TrackerError> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::from_path(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(name) = &args.fixture {
        config.fixture = name.parse()?;
        config.custom_profile = None;
    }
    config.validate()?;
    Ok(config)
}

fn open_bus(args: &TrackerArgs) -> Result<LightingBus<BusWriter>, TrackerError> {
    let writer: BusWriter = if args.dmx_mock {
        Box::new(MockBus::new())
    } else {
        Box::new(open_port(&args.dmx_port, DMX_BAUD_RATE, None)?)
    };
    Ok(LightingBus::open(writer)?)
}

/// `None` when the operator quit the port picker.
fn open_link(
    args: &TrackerArgs,
    config: &TrackerConfig,
) -> Result<Option<DeviceLink<Port>>, TrackerError> {
    if args.dummy_uwb {
        let port: Port = Box::new(DummyUwb::builder().build());
        return Ok(Some(DeviceLink::new(port, config.link)));
    }

    let path = match &args.uwb_port {
        Some(path) => path.clone(),
        None => match pick_port(SerialPort::available_ports()?)? {
            Some(path) => path,
            None => return Ok(None),
        },
    };
    let port: Port = Box::new(open_port(&path, UWB_BAUD_RATE, config.link.read_timeout)?);
    info!("connected to {}", path.display());
    Ok(Some(DeviceLink::new(port, config.link)))
}

fn run(args: &TrackerArgs) -> Result<(), TrackerError> {
    let config = load_config(args)?;
    info!("driving {} with {:?}", config.fixture, config.profile());

    if args.send_test {
        let mut bus = open_bus(args)?;
        send_test_pattern(&mut bus, &config.profile())?;
        return Ok(());
    }

    let Some(link) = open_link(args, &config)? else {
        info!("no port picked, exiting");
        return Ok(());
    };

    let (writer, reader) = mailbox();
    let mut tracking = TrackingLoop::start(link, || open_bus(args), writer, &config)?;
    let stop = Arc::new(AtomicBool::new(false));

    if !args.monitor {
        tracking.run(&stop);
        tracking.close()?;
        return Ok(());
    }

    let th_stop = Arc::clone(&stop);
    let tracking_thread = spawn(move || {
        tracking.run(&th_stop);
        tracking.close()
    });

    let shown = run_monitor(&reader, &stop);
    stop.store(true, Ordering::Relaxed);
    info!("waiting for the tracking loop to finish its last read");
    let closed = tracking_thread
        .join()
        .map_err(|_| TrackerError::JoinError)?;

    shown?;
    closed.map(|_| ())
}
