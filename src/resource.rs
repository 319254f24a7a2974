//! Free-memory admission gate run before each cycle's allocations

use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Reports how much memory is currently available to the process
pub trait MemoryProbe {
    /// `None` when the platform cannot report free memory
    fn free_bytes(&mut self) -> Option<u64>;
}

impl<M: MemoryProbe + ?Sized> MemoryProbe for Box<M> {
    fn free_bytes(&mut self) -> Option<u64> {
        (**self).free_bytes()
    }
}

/// Linux `/proc/meminfo` reader, preferring `MemAvailable` over `MemFree`
#[derive(Debug, Clone)]
pub struct MemInfoProbe {
    path: PathBuf,
    warned: bool,
}

impl MemInfoProbe {
    pub fn new() -> Self {
        Self::with_path("/proc/meminfo")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            warned: false,
        }
    }
}

impl Default for MemInfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for MemInfoProbe {
    fn free_bytes(&mut self) -> Option<u64> {
        match fs::read_to_string(&self.path) {
            Ok(content) => parse_meminfo(&content),
            Err(e) => {
                if !self.warned {
                    warn!(path = %self.path.display(), error = %e, "Free memory unavailable, resource gate open");
                    self.warned = true;
                }
                None
            }
        }
    }
}

/// Extracts available memory in bytes from `/proc/meminfo` text
pub fn parse_meminfo(content: &str) -> Option<u64> {
    let field = |name: &str| {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            let kib = rest.trim().trim_end_matches("kB").trim().parse::<u64>().ok()?;
            Some(kib * 1024)
        })
    };

    field("MemAvailable").or_else(|| field("MemFree"))
}

/// Outcome of the per-cycle memory check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Enough memory, or the probe could not tell
    Admit { free_bytes: Option<u64> },

    /// Below threshold: the cycle must not capture, detect or transmit
    Skip { free_bytes: u64 },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit { .. })
    }
}

/// Free-memory threshold check, refreshed once per cycle
pub struct ResourceBudget {
    probe: Box<dyn MemoryProbe>,
    min_free_bytes: u64,
    last_reading: Option<u64>,
}

impl ResourceBudget {
    pub fn new(probe: Box<dyn MemoryProbe>, min_free_bytes: u64) -> Self {
        Self {
            probe,
            min_free_bytes,
            last_reading: None,
        }
    }

    /// Takes a fresh reading and decides whether the cycle may proceed
    pub fn refresh(&mut self) -> Admission {
        let reading = self.probe.free_bytes();
        self.last_reading = reading;

        match reading {
            Some(free) if free < self.min_free_bytes => Admission::Skip { free_bytes: free },
            other => {
                debug!(free_bytes = ?other, "Resource gate open");
                Admission::Admit { free_bytes: other }
            }
        }
    }

    pub fn last_reading(&self) -> Option<u64> {
        self.last_reading
    }

    pub fn min_free_bytes(&self) -> u64 {
        self.min_free_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct Fixed(Option<u64>);

    impl MemoryProbe for Fixed {
        fn free_bytes(&mut self) -> Option<u64> {
            self.0
        }
    }

    const MEMINFO: &str = "MemTotal:        3884372 kB\nMemFree:          179508 kB\nMemAvailable:    2456124 kB\nBuffers:          123456 kB\n";

    #[test]
    fn test_parse_prefers_mem_available() {
        assert_eq!(parse_meminfo(MEMINFO), Some(2_456_124 * 1024));
    }

    #[test]
    fn test_parse_falls_back_to_mem_free() {
        let old_kernel = "MemTotal: 1000 kB\nMemFree: 50 kB\n";
        assert_eq!(parse_meminfo(old_kernel), Some(50 * 1024));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_meminfo("nothing here"), None);
        assert_eq!(parse_meminfo("MemAvailable: lots kB"), None);
    }

    #[test]
    fn test_probe_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MEMINFO.as_bytes()).unwrap();

        let mut probe = MemInfoProbe::with_path(file.path());
        assert_eq!(probe.free_bytes(), Some(2_456_124 * 1024));
    }

    #[test]
    fn test_missing_file_reports_unknown() {
        let mut probe = MemInfoProbe::with_path("/nonexistent/meminfo");
        assert_eq!(probe.free_bytes(), None);
        assert_eq!(probe.free_bytes(), None);
    }

    #[test]
    fn test_gate_threshold() {
        let mut low = ResourceBudget::new(Box::new(Fixed(Some(49_999))), 50_000);
        assert_eq!(low.refresh(), Admission::Skip { free_bytes: 49_999 });
        assert_eq!(low.last_reading(), Some(49_999));

        let mut exact = ResourceBudget::new(Box::new(Fixed(Some(50_000))), 50_000);
        assert!(exact.refresh().is_admitted());
    }

    #[test]
    fn test_unknown_reading_admits() {
        let mut budget = ResourceBudget::new(Box::new(Fixed(None)), 50_000);
        assert_eq!(budget.refresh(), Admission::Admit { free_bytes: None });
    }
}
