//! Raspberry Pi hardware PWM via rppal

use super::{PwmChannel, ServoError};
use rppal::pwm::{Channel, Polarity, Pwm};
use std::time::Duration;
use tracing::info;

/// Hardware PWM channel (PWM0 or PWM1) running at a fixed carrier frequency
pub struct HardwarePwm {
    pwm: Pwm,
    channel: u8,
}

impl HardwarePwm {
    pub fn new(channel: u8, frequency_hz: u32, initial_us: u32) -> Result<Self, ServoError> {
        let pwm_channel = match channel {
            0 => Channel::Pwm0,
            1 => Channel::Pwm1,
            other => return Err(ServoError::UnknownChannel(other)),
        };

        let period = Duration::from_micros(1_000_000 / frequency_hz.max(1) as u64);
        let pwm = Pwm::with_period(
            pwm_channel,
            period,
            Duration::from_micros(initial_us as u64),
            Polarity::Normal,
            true,
        )
        .map_err(|e| ServoError::Pwm(format!("PWM{}: {}", channel, e)))?;

        info!(channel, frequency_hz, initial_us, "Hardware PWM enabled");

        Ok(Self { pwm, channel })
    }
}

impl PwmChannel for HardwarePwm {
    fn pulse_width(&self) -> Result<u32, ServoError> {
        let width = self
            .pwm
            .pulse_width()
            .map_err(|e| ServoError::Pwm(format!("PWM{}: {}", self.channel, e)))?;
        Ok(width.as_micros() as u32)
    }

    fn set_pulse_width(&mut self, micros: u32) -> Result<(), ServoError> {
        self.pwm
            .set_pulse_width(Duration::from_micros(micros as u64))
            .map_err(|e| ServoError::Pwm(format!("PWM{}: {}", self.channel, e)))
    }
}
