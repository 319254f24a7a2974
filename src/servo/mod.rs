//! Pan/tilt servo axes with bounded proportional correction

#[cfg(feature = "rpi")]
mod hardware;

#[cfg(feature = "rpi")]
pub use hardware::HardwarePwm;

use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum ServoError {
    #[error("PWM error: {0}")]
    Pwm(String),

    #[error("unknown PWM channel: {0}")]
    UnknownChannel(u8),

    #[error("invalid pulse width limits: min {min}us must be below max {max}us")]
    InvalidLimits { min: u32, max: u32 },
}

/// PWM output driving one servo
pub trait PwmChannel {
    /// Currently applied pulse width in microseconds
    fn pulse_width(&self) -> Result<u32, ServoError>;

    /// Applies a new pulse width in microseconds
    fn set_pulse_width(&mut self, micros: u32) -> Result<(), ServoError>;
}

impl<P: PwmChannel + ?Sized> PwmChannel for Box<P> {
    fn pulse_width(&self) -> Result<u32, ServoError> {
        (**self).pulse_width()
    }

    fn set_pulse_width(&mut self, micros: u32) -> Result<(), ServoError> {
        (**self).set_pulse_width(micros)
    }
}

/// Which physical axis a servo moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Pan,
    Tilt,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Pan => f.write_str("pan"),
            Axis::Tilt => f.write_str("tilt"),
        }
    }
}

/// Mechanical pulse width range shared by both servos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseWidthLimits {
    min: u32,
    max: u32,
}

impl PulseWidthLimits {
    pub fn new(min: u32, max: u32) -> Result<Self, ServoError> {
        if min >= max {
            return Err(ServoError::InvalidLimits { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Clamps a signed candidate command into `[min, max]`
    pub fn clamp(&self, candidate: i64) -> u32 {
        candidate.clamp(self.min as i64, self.max as i64) as u32
    }
}

/// One servo axis: owns its command and applies `clamp(command + gain * error)`.
///
/// The stored command always lies inside the limits, and the physical output is
/// only ever written with a clamped value.
pub struct ServoAxis<P> {
    axis: Axis,
    channel: P,
    gain: i32,
    limits: PulseWidthLimits,
    command: u32,
}

impl<P: PwmChannel> ServoAxis<P> {
    /// Drives the servo to `initial` (clamped) and takes ownership of the channel
    pub fn new(
        axis: Axis,
        mut channel: P,
        gain: i32,
        limits: PulseWidthLimits,
        initial: u32,
    ) -> Result<Self, ServoError> {
        let command = limits.clamp(initial as i64);
        channel.set_pulse_width(command)?;

        debug!(axis = %axis, pulse_width_us = command, gain, "Servo axis ready");

        Ok(Self {
            axis,
            channel,
            gain,
            limits,
            command,
        })
    }

    /// Applies one proportional correction for a pixel error and returns the
    /// new command.
    pub fn correct(&mut self, error: i32) -> Result<u32, ServoError> {
        let candidate = self.command as i64 + self.gain as i64 * error as i64;
        let next = self.limits.clamp(candidate);

        self.channel.set_pulse_width(next)?;

        trace!(
            axis = %self.axis,
            error,
            from = self.command,
            to = next,
            clamped = (candidate != next as i64),
            "Servo corrected"
        );

        self.command = next;
        Ok(next)
    }

    pub fn command(&self) -> u32 {
        self.command
    }

    pub fn channel(&self) -> &P {
        &self.channel
    }
}

/// In-memory PWM output for hosts without servo hardware
#[derive(Debug, Clone, Default)]
pub struct SimulatedPwm {
    pulse_width: u32,
    writes: u64,
}

impl SimulatedPwm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_pulse_width` calls seen so far
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl PwmChannel for SimulatedPwm {
    fn pulse_width(&self) -> Result<u32, ServoError> {
        Ok(self.pulse_width)
    }

    fn set_pulse_width(&mut self, micros: u32) -> Result<(), ServoError> {
        self.pulse_width = micros;
        self.writes += 1;
        Ok(())
    }
}
