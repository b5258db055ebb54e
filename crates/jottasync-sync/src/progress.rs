//! Throughput accounting

use std::time::{Duration, Instant};

const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

/// Formats a byte count with binary units, e.g. `1.5 MiB`
#[must_use]
pub fn humanize_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Bytes sent for one directory and the time it took
#[derive(Debug)]
pub struct Throughput {
    started: Instant,
    bytes: u64,
}

impl Throughput {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            bytes: 0,
        }
    }

    pub fn add(&mut self, bytes: u64) {
        self.bytes += bytes;
    }

    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Human-readable rate, or `None` if nothing was sent
    #[must_use]
    pub fn rate(&self) -> Option<String> {
        if self.bytes == 0 {
            return None;
        }
        let secs = self.elapsed().as_secs_f64().max(0.001);
        Some(format!(
            "{}/s",
            humanize_bytes((self.bytes as f64 / secs) as u64)
        ))
    }
}
