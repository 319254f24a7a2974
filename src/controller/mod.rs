//! The detection-to-actuation control loop.
//!
//! One cycle per captured frame: resource gate, capture, detect, select,
//! correct the servos, compress, transmit. Everything runs synchronously on the
//! caller's thread. Only the servo commands and the statistics outlive a cycle;
//! the frame and its compressed copy are dropped before `run_cycle` returns,
//! on every path.

mod stats;

pub use stats::TrackerStats;

use crate::camera::{CaptureDevice, CaptureError};
use crate::config::Config;
use crate::detect::{DetectParams, FeatureDetector};
use crate::frame::{BoundingBox, TrackingError};
use crate::resource::{Admission, ResourceBudget};
use crate::selector::SelectionStrategy;
use crate::servo::{PwmChannel, ServoAxis, ServoError};
use crate::transport::{FrameTransport, OverlayMode};
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Failures that end the loop. Everything else is dropped and the next
/// cycle runs.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("servo failed: {0}")]
    Servo(#[from] ServoError),
}

/// Where the controller currently is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Capturing,
    Detecting,
    Correcting,
    Compressing,
    Transmitting,
}

/// What happened to the frame after compression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent { bytes: usize },
    EncodeFailed,
    TransmitFailed,
}

/// Summary of one completed cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub detections: usize,
    pub target: Option<BoundingBox>,
    pub error: Option<TrackingError>,
    pub pan_us: u32,
    pub tilt_us: u32,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Free memory was below the threshold; nothing was captured or sent
    Skipped { free_bytes: u64 },

    Completed(CycleReport),
}

/// Fixed per-run tuning of the loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingSettings {
    pub params: DetectParams,
    pub strategy: SelectionStrategy,
    pub overlay: OverlayMode,
    pub stats_interval_cycles: u64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            params: DetectParams::default(),
            strategy: SelectionStrategy::default(),
            overlay: OverlayMode::default(),
            stats_interval_cycles: 100,
        }
    }
}

impl From<&Config> for TrackingSettings {
    fn from(config: &Config) -> Self {
        Self {
            params: DetectParams {
                threshold: config.detector.threshold,
                scale_factor: config.detector.scale_factor,
                min_face_size: config.detector.min_face_size,
            },
            strategy: config.detector.strategy,
            overlay: config.detector.overlay,
            stats_interval_cycles: config.app.stats_interval_cycles,
        }
    }
}

/// Owns every collaborator of the loop, including both servo axes
pub struct TrackingController<C, D, P> {
    camera: C,
    detector: D,
    pan: ServoAxis<P>,
    tilt: ServoAxis<P>,
    budget: ResourceBudget,
    transport: FrameTransport,
    settings: TrackingSettings,
    state: CycleState,
    stats: TrackerStats,
}

impl<C, D, P> TrackingController<C, D, P>
where
    C: CaptureDevice,
    D: FeatureDetector,
    P: PwmChannel,
{
    /// `camera` must already be initialized (see [`crate::camera::init_sensor`])
    pub fn new(
        camera: C,
        detector: D,
        pan: ServoAxis<P>,
        tilt: ServoAxis<P>,
        budget: ResourceBudget,
        transport: FrameTransport,
        settings: TrackingSettings,
    ) -> Self {
        Self {
            camera,
            detector,
            pan,
            tilt,
            budget,
            transport,
            settings,
            state: CycleState::Idle,
            stats: TrackerStats::default(),
        }
    }

    /// Runs one cycle. `Err` means a fatal hardware failure.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, TrackerError> {
        self.stats.cycles += 1;

        if let Admission::Skip { free_bytes } = self.budget.refresh() {
            self.stats.skipped_low_memory += 1;
            warn!(
                free_bytes,
                min_free_bytes = self.budget.min_free_bytes(),
                "Low memory, skipping frame"
            );
            return Ok(CycleOutcome::Skipped { free_bytes });
        }

        let outcome = self.process_frame();
        self.enter(CycleState::Idle);
        outcome.map(CycleOutcome::Completed)
    }

    fn process_frame(&mut self) -> Result<CycleReport, TrackerError> {
        self.enter(CycleState::Capturing);
        let frame = self.camera.snapshot()?;
        self.stats.frames_captured += 1;

        self.enter(CycleState::Detecting);
        let detections = match self.detector.detect(&frame, &self.settings.params) {
            Ok(boxes) => boxes,
            Err(e) => {
                self.stats.detect_errors += 1;
                warn!(error = %e, "Detection failed, treating frame as empty");
                Vec::new()
            }
        };
        let target = self.settings.strategy.select(&detections);

        // no target: hold the last position
        let error = match target {
            Some(target) => {
                self.enter(CycleState::Correcting);
                let error = TrackingError::between(&frame, &target);
                self.pan.correct(error.dx)?;
                self.tilt.correct(error.dy)?;
                self.stats.targets_acquired += 1;
                Some(error)
            }
            None => None,
        };

        self.enter(CycleState::Compressing);
        let overlay: &[BoundingBox] = match (self.settings.overlay, target.as_ref()) {
            (OverlayMode::All, _) => detections.as_slice(),
            (OverlayMode::Target, Some(target)) => slice::from_ref(target),
            _ => &[],
        };
        let encoded = self.transport.encode(&frame, overlay);
        drop(frame);

        let delivery = match encoded {
            Ok(payload) => {
                self.enter(CycleState::Transmitting);
                match self.transport.send(&payload) {
                    Ok(bytes) => {
                        self.stats.frames_sent += 1;
                        self.stats.bytes_sent += bytes as u64;
                        Delivery::Sent { bytes }
                    }
                    Err(e) => {
                        self.stats.send_errors += 1;
                        warn!(error = %e, size = payload.len(), "Frame dropped by transport");
                        Delivery::TransmitFailed
                    }
                }
            }
            Err(e) => {
                self.stats.encode_errors += 1;
                warn!(error = %e, "Frame dropped, compression failed");
                Delivery::EncodeFailed
            }
        };

        let report = CycleReport {
            detections: detections.len(),
            target,
            error,
            pan_us: self.pan.command(),
            tilt_us: self.tilt.command(),
            delivery,
        };

        debug!(
            detections = report.detections,
            target = ?report.target,
            error = ?report.error,
            pan_us = report.pan_us,
            tilt_us = report.tilt_us,
            delivery = ?report.delivery,
            "Cycle complete"
        );

        Ok(report)
    }

    /// Runs cycles until `stop` is set, `max_cycles` have run, or a fatal
    /// error occurs.
    pub fn run(&mut self, stop: &AtomicBool, max_cycles: Option<u64>) -> Result<TrackerStats, TrackerError> {
        info!(
            strategy = ?self.settings.strategy,
            overlay = ?self.settings.overlay,
            dest = %self.transport.destination(),
            "Tracking loop started"
        );

        let interval = self.settings.stats_interval_cycles.max(1);
        let mut last_report = (Instant::now(), self.stats.clone());
        let mut cycles_run = 0u64;

        while !stop.load(Ordering::Relaxed) {
            if max_cycles.is_some_and(|max| cycles_run >= max) {
                break;
            }

            self.run_cycle()?;
            cycles_run += 1;

            if self.stats.cycles % interval == 0 {
                let elapsed = last_report.0.elapsed().as_secs_f64();
                let stats = &self.stats;
                info!(
                    cycles = stats.cycles,
                    fps = %format!("{:.1}", stats.calculate_fps(&last_report.1, elapsed)),
                    kbps = %format!("{:.0}", stats.calculate_bitrate_kbps(&last_report.1, elapsed)),
                    skipped = stats.skipped_low_memory,
                    skip_rate = %format!("{:.2}", stats.skip_rate()),
                    drop_rate = %format!("{:.2}", stats.drop_rate()),
                    targets = stats.targets_acquired,
                    sent = stats.frames_sent,
                    send_errors = stats.send_errors,
                    free_bytes = ?self.budget.last_reading(),
                    pan_us = self.pan.command(),
                    tilt_us = self.tilt.command(),
                    "Stats"
                );
                last_report = (Instant::now(), stats.clone());
            }
        }

        info!(cycles = cycles_run, "Tracking loop stopped");
        Ok(self.stats.clone())
    }

    fn enter(&mut self, state: CycleState) {
        trace!(from = ?self.state, to = ?state, "Cycle state");
        self.state = state;
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn stats(&self) -> &TrackerStats {
        &self.stats
    }

    pub fn pan(&self) -> &ServoAxis<P> {
        &self.pan
    }

    pub fn tilt(&self) -> &ServoAxis<P> {
        &self.tilt
    }
}
