//! Synchronization detection and adaptive resync.
//!
//! The receiver feeds the drive-coordinate error of each received frame back
//! into its oscillator and watches a sliding window of error norms. Once the
//! window is full the mean decides the phase transition:
//!
//! - mean below the lock threshold: trajectories have converged, decoding
//!   may begin (`Synchronized`, terminal)
//! - mean above the resync threshold: tracking has been lost; local state is
//!   reset to the canonical initial condition and the window cleared
//!   (`Resyncing`, then back to `Searching`)
//! - otherwise: keep stepping (`Searching`)
//!
//! A tick with no received frame never touches the window or the oscillator.

use crate::error::Result;
use crate::oscillator::{Oscillator, State};
use std::collections::VecDeque;

/// Synchronization phase of a receiver session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Still converging; window not full or mean between the thresholds
    Searching,

    /// Mean window error below the lock threshold; terminal for this phase
    Synchronized,

    /// Tracking error exceeded the upper threshold; state and window were
    /// just reset
    Resyncing,
}

/// Thresholds and window size for the transition rule.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Number of error samples the sliding window holds
    pub window: usize,

    /// Mean error below this declares synchronization
    pub lock_threshold: f64,

    /// Mean error above this triggers a resync
    pub resync_threshold: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window: 100,
            lock_threshold: 1e-4,
            resync_threshold: 1e-2,
        }
    }
}

/// Bounded FIFO of recent error norms.
#[derive(Debug, Clone)]
pub struct ErrorWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl ErrorWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once at capacity.
    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of the held samples; `None` while empty.
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Drives a receiver oscillator toward the transmitter's trajectory and
/// detects when the two have synchronized.
#[derive(Debug, Clone)]
pub struct SyncController {
    config: SyncConfig,
    window: ErrorWindow,
    status: SyncStatus,
    resyncs: u64,
}

impl SyncController {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            window: ErrorWindow::new(config.window),
            config,
            status: SyncStatus::Searching,
            resyncs: 0,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Mean of the current error window, if any samples are held.
    pub fn mean_error(&self) -> Option<f64> {
        self.window.mean()
    }

    /// Times the controller has reset the local state.
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Consume one received frame's state: record the tracking error, apply
    /// the control step, and evaluate the transition rule.
    ///
    /// `Synchronized` is terminal: once reached, further calls return it
    /// without stepping.
    ///
    /// # Errors
    /// Propagates oscillator divergence.
    pub fn track(
        &mut self,
        oscillator: &mut Oscillator,
        received: &State,
        dt: f64,
    ) -> Result<SyncStatus> {
        if self.status == SyncStatus::Synchronized {
            return Ok(self.status);
        }
        // A reset reported last call resumes searching now
        if self.status == SyncStatus::Resyncing {
            self.status = SyncStatus::Searching;
        }

        let error = *received - oscillator.state();
        self.window.push(error.norm());

        // Only the drive coordinate is fed back
        oscillator.step(error.x, dt)?;

        if self.window.is_full() {
            // Window is non-empty here
            let mean = self.window.mean().unwrap_or(f64::INFINITY);
            if mean < self.config.lock_threshold {
                self.status = SyncStatus::Synchronized;
            } else if mean > self.config.resync_threshold {
                oscillator.reset();
                self.window.clear();
                self.resyncs += 1;
                self.status = SyncStatus::Resyncing;
            }
        }

        Ok(self.status)
    }
}

impl Default for SyncController {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}
