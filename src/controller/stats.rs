//! Tracking loop statistics

use serde::{Deserialize, Serialize};

/// Counters accumulated across cycles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStats {
    /// Cycles started, including skipped ones
    pub cycles: u64,

    /// Cycles skipped by the free-memory gate
    pub skipped_low_memory: u64,

    pub frames_captured: u64,

    /// Detector calls that failed and counted as empty
    pub detect_errors: u64,

    /// Cycles in which a target was selected and the servos corrected
    pub targets_acquired: u64,

    /// Frames delivered as a datagram
    pub frames_sent: u64,

    /// Total payload bytes sent
    pub bytes_sent: u64,

    /// Frames dropped because compression failed
    pub encode_errors: u64,

    /// Frames dropped by the transport
    pub send_errors: u64,
}

impl TrackerStats {
    /// Sent frame rate based on delta
    pub fn calculate_fps(&self, previous: &Self, elapsed_secs: f64) -> f64 {
        if elapsed_secs == 0.0 {
            return 0.0;
        }

        let frames_delta = self.frames_sent.saturating_sub(previous.frames_sent);
        frames_delta as f64 / elapsed_secs
    }

    /// Bitrate in kbps based on delta
    pub fn calculate_bitrate_kbps(&self, previous: &Self, elapsed_secs: f64) -> f64 {
        if elapsed_secs == 0.0 {
            return 0.0;
        }

        let bytes_delta = self.bytes_sent.saturating_sub(previous.bytes_sent);
        (bytes_delta as f64 * 8.0) / elapsed_secs / 1000.0
    }

    /// Share of cycles lost to the memory gate
    pub fn skip_rate(&self) -> f64 {
        if self.cycles == 0 {
            return 0.0;
        }

        self.skipped_low_memory as f64 / self.cycles as f64
    }

    /// Share of captured frames that never reached the wire
    pub fn drop_rate(&self) -> f64 {
        if self.frames_captured == 0 {
            return 0.0;
        }

        (self.encode_errors + self.send_errors) as f64 / self.frames_captured as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_fps() {
        let prev = TrackerStats {
            frames_sent: 100,
            ..Default::default()
        };

        let current = TrackerStats {
            frames_sent: 130,
            ..Default::default()
        };

        assert_eq!(current.calculate_fps(&prev, 2.0), 15.0);
        assert_eq!(current.calculate_fps(&prev, 0.0), 0.0);
    }

    #[test]
    fn test_calculate_bitrate() {
        let prev = TrackerStats::default();
        let current = TrackerStats {
            bytes_sent: 125_000,
            ..Default::default()
        };

        assert_eq!(current.calculate_bitrate_kbps(&prev, 1.0), 1000.0);
    }

    #[test]
    fn test_rates() {
        let stats = TrackerStats {
            cycles: 10,
            skipped_low_memory: 2,
            frames_captured: 8,
            send_errors: 1,
            encode_errors: 1,
            ..Default::default()
        };

        assert_eq!(stats.skip_rate(), 0.2);
        assert_eq!(stats.drop_rate(), 0.25);
        assert_eq!(TrackerStats::default().skip_rate(), 0.0);
    }
}
