//! Memory accounting for the streaming reader
//!
//! A [`MemoryTracker`] is owned by one reader and charged with the approximate
//! size of every record it buffers. The reader releases the charge when it
//! hands a batch to the caller, so `peak_usage` bounds what the engine held at
//! any one time. Pressure levels let the orchestrator warn before a badly
//! sized batch exhausts the process.

use tracing::warn;

/// Default share of the limit at which the tracker reports pressure.
pub const DEFAULT_WARNING_THRESHOLD_PCT: usize = 90;

/// Memory pressure levels relative to the configured limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressureLevel {
    #[default]
    Low, // < 50% of limit
    Normal,   // 50-75% of limit
    High,     // 75-90% of limit
    Critical, // > 90% of limit
}

/// Memory statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryStats {
    pub current_usage: usize,
    pub peak_usage: usize,
    pub memory_limit: usize,
    pub usage_percentage: f64,
}

#[derive(Debug, Clone)]
pub struct MemoryTracker {
    limit: usize,
    warning_threshold_pct: usize,
    current: usize,
    peak: usize,
    over_limit_reported: bool,
}

impl MemoryTracker {
    /// Tracker with a limit in bytes. A zero limit disables pressure levels.
    pub fn new(limit_bytes: usize) -> Self {
        Self {
            limit: limit_bytes,
            warning_threshold_pct: DEFAULT_WARNING_THRESHOLD_PCT,
            current: 0,
            peak: 0,
            over_limit_reported: false,
        }
    }

    pub fn with_limit_mb(limit_mb: usize) -> Self {
        Self::new(limit_mb.saturating_mul(1_000_000))
    }

    /// Percentage of the limit at which [`under_pressure`](Self::under_pressure)
    /// turns true. Clamped to 1..=100.
    pub fn with_warning_threshold(mut self, pct: usize) -> Self {
        self.warning_threshold_pct = pct.clamp(1, 100);
        self
    }

    pub fn track_allocation(&mut self, bytes: usize) {
        self.current = self.current.saturating_add(bytes);
        self.peak = self.peak.max(self.current);

        // once per crossing, re-armed when usage falls back under the limit
        if self.limit > 0 && self.current > self.limit && !self.over_limit_reported {
            self.over_limit_reported = true;
            warn!(
                current_bytes = self.current,
                limit_bytes = self.limit,
                "Buffered records exceed the memory limit"
            );
        }
    }

    pub fn track_deallocation(&mut self, bytes: usize) {
        self.current = self.current.saturating_sub(bytes);
        if self.current <= self.limit {
            self.over_limit_reported = false;
        }
    }

    pub fn current_usage(&self) -> usize {
        self.current
    }

    pub fn peak_usage(&self) -> usize {
        self.peak
    }

    pub fn warning_threshold_pct(&self) -> usize {
        self.warning_threshold_pct
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            current_usage: self.current,
            peak_usage: self.peak,
            memory_limit: self.limit,
            usage_percentage: self.usage_percentage(),
        }
    }

    pub fn pressure_level(&self) -> MemoryPressureLevel {
        if self.limit == 0 {
            return MemoryPressureLevel::Low;
        }

        let usage_ratio = self.current as f64 / self.limit as f64;

        match usage_ratio {
            r if r < 0.5 => MemoryPressureLevel::Low,
            r if r < 0.75 => MemoryPressureLevel::Normal,
            r if r < 0.9 => MemoryPressureLevel::High,
            _ => MemoryPressureLevel::Critical,
        }
    }

    /// True once current usage reaches the warning threshold.
    pub fn under_pressure(&self) -> bool {
        self.limit > 0 && self.usage_percentage() >= self.warning_threshold_pct as f64
    }

    fn usage_percentage(&self) -> f64 {
        if self.limit > 0 {
            (self.current as f64 / self.limit as f64) * 100.0
        } else {
            0.0
        }
    }
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::with_limit_mb(512)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_current_and_peak() {
        let mut tracker = MemoryTracker::new(1000);
        tracker.track_allocation(300);
        tracker.track_allocation(200);
        tracker.track_deallocation(500);
        tracker.track_allocation(100);

        assert_eq!(tracker.current_usage(), 100);
        assert_eq!(tracker.peak_usage(), 500);
    }

    #[test]
    fn test_deallocation_saturates() {
        let mut tracker = MemoryTracker::new(1000);
        tracker.track_allocation(10);
        tracker.track_deallocation(50);
        assert_eq!(tracker.current_usage(), 0);
    }

    #[test]
    fn test_pressure_levels() {
        let mut tracker = MemoryTracker::new(100);
        assert_eq!(tracker.pressure_level(), MemoryPressureLevel::Low);
        tracker.track_allocation(60);
        assert_eq!(tracker.pressure_level(), MemoryPressureLevel::Normal);
        tracker.track_allocation(20);
        assert_eq!(tracker.pressure_level(), MemoryPressureLevel::High);
        assert!(!tracker.under_pressure());
        tracker.track_allocation(15);
        assert_eq!(tracker.pressure_level(), MemoryPressureLevel::Critical);
        assert!(tracker.under_pressure());
    }

    #[test]
    fn test_warning_threshold_is_the_pressure_cutoff() {
        let mut tracker = MemoryTracker::new(100).with_warning_threshold(40);
        tracker.track_allocation(39);
        assert!(!tracker.under_pressure());
        tracker.track_allocation(1);
        assert!(tracker.under_pressure());
        assert_eq!(tracker.pressure_level(), MemoryPressureLevel::Low);

        assert_eq!(MemoryTracker::new(100).with_warning_threshold(0).warning_threshold_pct(), 1);
        assert_eq!(MemoryTracker::new(100).with_warning_threshold(250).warning_threshold_pct(), 100);
    }

    #[test]
    fn test_over_limit_warning_rearms_after_release() {
        let mut tracker = MemoryTracker::new(10);
        tracker.track_allocation(20);
        assert!(tracker.over_limit_reported);
        tracker.track_allocation(20);
        assert!(tracker.over_limit_reported);
        tracker.track_deallocation(40);
        assert!(!tracker.over_limit_reported);
    }

    #[test]
    fn test_zero_limit_never_reports_pressure() {
        let mut tracker = MemoryTracker::new(0);
        tracker.track_allocation(1 << 30);
        assert_eq!(tracker.pressure_level(), MemoryPressureLevel::Low);
        assert_eq!(tracker.stats().usage_percentage, 0.0);
    }

    #[test]
    fn test_stats() {
        let mut tracker = MemoryTracker::new(200);
        tracker.track_allocation(50);
        let stats = tracker.stats();
        assert_eq!(stats.current_usage, 50);
        assert_eq!(stats.memory_limit, 200);
        assert_eq!(stats.usage_percentage, 25.0);
    }
}
