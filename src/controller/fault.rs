//! # Fault Detection Module
//!
//! Per-unit input freshness tracking.
//!
//! Each connected unit carries a [`FaultRecord`]. `read()` refreshes it every
//! tick the transport delivers a valid report; the [`FaultDetector`] inspects it
//! every tick and declares a critical fault when the unit has been silent for
//! longer than the staleness window, or has sent too many malformed reports in a
//! row.
//!
//! The staleness window is measured from the last good read, and a connect
//! counts as a read: the clock restarts at the connect instant, never at
//! construction time.
//!
//! ```
//! use astro_controller::controller::fault::{FaultDetector, FaultRecord};
//!
//! let detector = FaultDetector::new(1000, 10);
//! let mut record = FaultRecord::default();
//!
//! record.on_connect(5_000);
//! assert!(detector.evaluate(&record, 5_900).is_none());
//! assert!(detector.evaluate(&record, 6_500).is_some());
//! ```

/// Fault bookkeeping for one physical unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultRecord {
    /// Time of the last valid read (or connect), in milliseconds.
    pub last_read_ms: u64,
    /// Consecutive malformed reports.
    pub bad_data_count: u32,
    /// Fault-forced disconnects.
    pub disconnect_count: u32,
    /// Successful connects following a fault-forced disconnect.
    pub reconnect_count: u32,
    awaiting_reconnect: bool,
}

impl FaultRecord {
    /// Restarts tracking at the connect instant.
    pub fn on_connect(&mut self, now_ms: u64) {
        self.last_read_ms = now_ms;
        self.bad_data_count = 0;
        if self.awaiting_reconnect {
            self.reconnect_count = self.reconnect_count.saturating_add(1);
            self.awaiting_reconnect = false;
        }
    }

    /// Records a valid report.
    pub fn record_read(&mut self, now_ms: u64) {
        self.last_read_ms = self.last_read_ms.max(now_ms);
        self.bad_data_count = 0;
    }

    /// Records a malformed report.
    pub fn record_bad_data(&mut self) {
        self.bad_data_count = self.bad_data_count.saturating_add(1);
    }

    /// Records a fault-forced disconnect.
    pub fn on_fault(&mut self) {
        self.disconnect_count = self.disconnect_count.saturating_add(1);
        self.awaiting_reconnect = true;
    }
}

/// Staleness and bad-data thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultDetector {
    timeout_ms: u64,
    max_bad_data: u32,
}

impl Default for FaultDetector {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            max_bad_data: 10,
        }
    }
}

impl FaultDetector {
    /// Creates a detector.
    ///
    /// # Arguments
    ///
    /// * `timeout_ms` - Longest tolerated silence while connected
    /// * `max_bad_data` - Malformed reports tolerated in a row
    #[must_use]
    pub fn new(timeout_ms: u64, max_bad_data: u32) -> Self {
        Self {
            timeout_ms,
            max_bad_data,
        }
    }

    /// Staleness threshold in milliseconds.
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Evaluates a connected unit's record.
    ///
    /// Returns the fault reason, or `None` while the unit is healthy. Callers
    /// only evaluate connected units, which is what keeps a fault from firing
    /// twice.
    #[must_use]
    pub fn evaluate(&self, record: &FaultRecord, now_ms: u64) -> Option<String> {
        let silent_ms = now_ms.saturating_sub(record.last_read_ms);
        if silent_ms > self.timeout_ms {
            return Some(format!(
                "no input for {} ms (limit {} ms)",
                silent_ms, self.timeout_ms
            ));
        }
        if record.bad_data_count > self.max_bad_data {
            return Some(format!(
                "{} malformed reports in a row (limit {})",
                record.bad_data_count, self.max_bad_data
            ));
        }
        None
    }
}
