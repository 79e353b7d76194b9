//! Cache statistics tracking and reporting.

use std::time::Instant;

/// Streaming cache statistics for monitoring and debugging.
#[derive(Debug, Clone)]
pub struct CacheStats {
    // Registration
    pub registrations: u64,
    pub already_resident: u64,
    pub priority_updates: u64,
    pub rejected_out_of_slots: u64,

    // Loads
    pub loads_completed: u64,
    pub loads_failed: u64,
    pub bytes_loaded: u64,

    // Lifecycle
    pub evictions: u64,
    pub stale_results_dropped: u64,
    pub resets: u64,

    // Timing
    pub created_at: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStats {
    /// Create a new statistics tracker.
    pub fn new() -> Self {
        Self {
            registrations: 0,
            already_resident: 0,
            priority_updates: 0,
            rejected_out_of_slots: 0,
            loads_completed: 0,
            loads_failed: 0,
            bytes_loaded: 0,
            evictions: 0,
            stale_results_dropped: 0,
            resets: 0,
            created_at: Instant::now(),
        }
    }

    /// Fraction of registrations that found the key already resident.
    pub fn hit_rate(&self) -> f64 {
        if self.registrations == 0 {
            0.0
        } else {
            self.already_resident as f64 / self.registrations as f64
        }
    }

    /// Fraction of finished loads that failed.
    pub fn failure_rate(&self) -> f64 {
        let total = self.loads_completed + self.loads_failed;
        if total == 0 {
            0.0
        } else {
            self.loads_failed as f64 / total as f64
        }
    }

    /// Uptime since statistics started.
    pub fn uptime(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    pub fn record_registration(&mut self) {
        self.registrations += 1;
    }

    pub fn record_already_resident(&mut self) {
        self.already_resident += 1;
    }

    pub fn record_priority_update(&mut self) {
        self.priority_updates += 1;
    }

    pub fn record_out_of_slots(&mut self) {
        self.rejected_out_of_slots += 1;
    }

    pub fn record_load_completed(&mut self, bytes: usize) {
        self.loads_completed += 1;
        self.bytes_loaded += bytes as u64;
    }

    pub fn record_load_failed(&mut self) {
        self.loads_failed += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_stale_drop(&mut self) {
        self.stale_results_dropped += 1;
    }

    pub fn record_reset(&mut self) {
        self.resets += 1;
    }
}
