//! visiond - robot vision telemetry agent.
//!
//! Reads the device config, starts the telemetry bus in the configured role,
//! starts every camera and runs the processing loop on the first one.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use vision_agent::config::{NtMode, VisionConfig, DEFAULT_CONFIG_PATH};
use vision_agent::detect::{TapeDetector, TapeDetectorParams};
use vision_agent::pipeline::ProcessingLoop;
use vision_agent::telemetry::{MqttBus, MqttBusOptions, TelemetryPublisher};
use vision_agent::CameraSet;

#[path = "../ui.rs"]
mod ui;

const IDLE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(author, version, about = "Robot vision telemetry agent")]
struct Args {
    /// Path to the device config file.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let report = ui::StartupReport::new(
        ui::StartupStyle::from_env(),
        std::io::stderr().is_terminal(),
    );

    let stage = report.stage("Read config");
    let cfg = match VisionConfig::load(&args.config) {
        Ok(cfg) => {
            drop(stage);
            cfg
        }
        Err(err) => {
            stage.fail();
            log::error!("{:#}", err);
            return Ok(());
        }
    };

    let publisher = {
        let _stage = report.stage("Start telemetry");
        match cfg.ntmode {
            NtMode::Server => log::info!("Setting up telemetry server"),
            NtMode::Client => log::info!("Setting up telemetry client for team {}", cfg.team),
        }
        let options = MqttBusOptions::for_role(cfg.ntmode, cfg.team, cfg.broker_addr.as_deref())?;
        Arc::new(TelemetryPublisher::new(MqttBus::connect(&options)?))
    };

    let mut cameras = {
        let _stage = report.stage("Start cameras");
        CameraSet::start(&cfg.cameras)
    };

    // Only the first configured camera is analysed; `cameras` keeps the rest
    // open for the life of the process.
    let _vision = match cameras.take_primary() {
        Some(stream) => {
            let detector = Box::new(TapeDetector::new(TapeDetectorParams::default()));
            Some(ProcessingLoop::spawn(stream, detector, publisher)?)
        }
        None => None,
    };
    log::info!("{} standby camera(s) open", cameras.standby().count());

    loop {
        std::thread::sleep(IDLE_INTERVAL);
    }
}
