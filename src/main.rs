//! Pan/tilt face-tracking CLI application

// Use jemalloc for better memory management (optional feature)
#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pantilt_tracker::camera::{init_sensor, CaptureDevice, SensorSettings, TestPatternCamera};
use pantilt_tracker::config::{
    AxisConfig, CameraConfig, CameraDriver, Config, DetectorBackend, DetectorConfig, ServoConfig,
    ServoDriver,
};
use pantilt_tracker::detect::{DisabledDetector, FeatureDetector};
use pantilt_tracker::resource::{MemInfoProbe, ResourceBudget};
use pantilt_tracker::servo::{Axis, PulseWidthLimits, PwmChannel, ServoAxis, SimulatedPwm};
use pantilt_tracker::transport::{FrameEncoder, FrameTransport};
use pantilt_tracker::{TrackerStats, TrackingController, TrackingSettings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pantilt-tracker")]
#[command(about = "Face-tracking pan/tilt camera with best-effort JPEG datagram streaming")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Stop after this many cycles (default: run until Ctrl+C)
    #[arg(long)]
    cycles: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    info!("Pan/tilt tracker starting");
    info!(config_path = %cli.config, "Loading configuration");

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config))?;

    info!(
        camera = ?config.camera.driver,
        detector = ?config.detector.backend,
        servo = ?config.servo.driver,
        dest = %format!("{}:{}", config.stream.dest_host, config.stream.dest_port),
        "Configuration loaded"
    );

    // The loop is synchronous; it gets its own blocking thread and checks the
    // stop flag between cycles.
    let stop = Arc::new(AtomicBool::new(false));
    let loop_stop = Arc::clone(&stop);
    let cycles = cli.cycles;
    let mut tracker = tokio::task::spawn_blocking(move || run_tracker(&config, &loop_stop, cycles));

    let stats = tokio::select! {
        result = &mut tracker => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            stop.store(true, Ordering::Relaxed);
            tracker.await?
        }
    };

    match stats {
        Ok(stats) => {
            info!(
                cycles = stats.cycles,
                sent = stats.frames_sent,
                skipped = stats.skipped_low_memory,
                targets = stats.targets_acquired,
                "Tracker stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Tracker failed");
            Err(e)
        }
    }
}

fn run_tracker(config: &Config, stop: &AtomicBool, cycles: Option<u64>) -> Result<TrackerStats> {
    let mut camera = build_camera(&config.camera)?;
    init_sensor(&mut camera, &SensorSettings::from(&config.camera))
        .context("Sensor initialization failed")?;

    let detector = build_detector(&config.detector)?;

    let limits = PulseWidthLimits::new(
        config.servo.min_pulse_width_us,
        config.servo.max_pulse_width_us,
    )?;
    let pan = build_axis(Axis::Pan, &config.servo, &config.servo.pan, limits)?;
    let tilt = build_axis(Axis::Tilt, &config.servo, &config.servo.tilt, limits)?;

    let budget = ResourceBudget::new(
        Box::new(MemInfoProbe::new()),
        config.resources.min_free_bytes,
    );

    let transport = FrameTransport::new(
        FrameEncoder::new(config.stream.quality)?,
        &config.stream.dest_host,
        config.stream.dest_port,
        config.stream.max_datagram_bytes,
    )?;

    let mut controller = TrackingController::new(
        camera,
        detector,
        pan,
        tilt,
        budget,
        transport,
        TrackingSettings::from(config),
    );

    Ok(controller.run(stop, cycles)?)
}

fn build_camera(config: &CameraConfig) -> Result<Box<dyn CaptureDevice>> {
    match config.driver {
        CameraDriver::TestPattern => Ok(Box::new(TestPatternCamera::new(config.fps))),
        CameraDriver::Gstreamer => gstreamer_camera(config),
    }
}

#[cfg(feature = "camera")]
fn gstreamer_camera(config: &CameraConfig) -> Result<Box<dyn CaptureDevice>> {
    let camera = pantilt_tracker::camera::GstCamera::new(&config.device, config.fps)?;
    Ok(Box::new(camera))
}

#[cfg(not(feature = "camera"))]
fn gstreamer_camera(_config: &CameraConfig) -> Result<Box<dyn CaptureDevice>> {
    bail!("camera driver \"gstreamer\" requires building with the `camera` feature")
}

fn build_detector(config: &DetectorConfig) -> Result<Box<dyn FeatureDetector>> {
    match config.backend {
        DetectorBackend::Disabled => {
            info!("Face detection disabled, servos will hold position");
            Ok(Box::new(DisabledDetector))
        }
        DetectorBackend::Rustface => rustface_detector(config),
    }
}

#[cfg(feature = "rustface")]
fn rustface_detector(config: &DetectorConfig) -> Result<Box<dyn FeatureDetector>> {
    let path = config
        .model_path
        .as_deref()
        .context("detector.model_path is not set")?;
    Ok(Box::new(pantilt_tracker::detect::RustfaceDetector::new(path)?))
}

#[cfg(not(feature = "rustface"))]
fn rustface_detector(_config: &DetectorConfig) -> Result<Box<dyn FeatureDetector>> {
    bail!("detector backend \"rustface\" requires building with the `rustface` feature")
}

fn build_axis(
    axis: Axis,
    servo: &ServoConfig,
    config: &AxisConfig,
    limits: PulseWidthLimits,
) -> Result<ServoAxis<Box<dyn PwmChannel>>> {
    let channel: Box<dyn PwmChannel> = match servo.driver {
        ServoDriver::Simulated => Box::new(SimulatedPwm::new()),
        ServoDriver::Hardware => hardware_pwm(servo, config)?,
    };

    ServoAxis::new(axis, channel, config.gain, limits, config.initial_pulse_width_us)
        .with_context(|| format!("Failed to initialize {} servo", axis))
}

#[cfg(feature = "rpi")]
fn hardware_pwm(servo: &ServoConfig, config: &AxisConfig) -> Result<Box<dyn PwmChannel>> {
    let pwm = pantilt_tracker::servo::HardwarePwm::new(
        config.channel,
        servo.frequency_hz,
        config.initial_pulse_width_us,
    )?;
    Ok(Box::new(pwm))
}

#[cfg(not(feature = "rpi"))]
fn hardware_pwm(_servo: &ServoConfig, _config: &AxisConfig) -> Result<Box<dyn PwmChannel>> {
    bail!("servo driver \"hardware\" requires building with the `rpi` feature")
}
