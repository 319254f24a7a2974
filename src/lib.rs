//! Face-tracking pan/tilt camera loop for small embedded boards
//!
//! Each cycle captures a grayscale frame, finds the closest face, nudges the
//! pan and tilt servos toward it and streams the frame as a single JPEG
//! datagram:
//! - Bounded proportional servo correction, clamped on every step
//! - Free-memory gate that skips whole cycles under pressure
//! - One self-contained JPEG per UDP datagram, no framing
//! - Pluggable capture, detection and PWM backends
//!
//! # Example
//!
//! ```no_run
//! use pantilt_tracker::servo::{Axis, PulseWidthLimits, ServoAxis, SimulatedPwm};
//!
//! let limits = PulseWidthLimits::new(560, 4200).unwrap();
//! let mut pan = ServoAxis::new(Axis::Pan, SimulatedPwm::new(), 2, limits, 1500).unwrap();
//! // target 60 px left of center
//! assert_eq!(pan.correct(60).unwrap(), 1620);
//! ```

pub mod camera;
pub mod config;
pub mod controller;
pub mod detect;
pub mod frame;
pub mod resource;
pub mod selector;
pub mod servo;
pub mod transport;

// Re-exports for convenience
pub use camera::{init_sensor, CaptureDevice, SensorSettings, TestPatternCamera};
pub use config::Config;
pub use controller::{CycleOutcome, CycleReport, TrackerStats, TrackingController, TrackingSettings};
pub use detect::{DetectParams, FeatureDetector};
pub use frame::{BoundingBox, Frame, TrackingError};
pub use resource::{MemInfoProbe, MemoryProbe, ResourceBudget};
pub use selector::SelectionStrategy;
pub use servo::{PulseWidthLimits, PwmChannel, ServoAxis};
pub use transport::{FrameEncoder, FrameTransport};
