//! Receiver session: adaptive synchronization, then the decode loop.
//!
//! Phase 1 tracks incoming frames through the [`SyncController`] until the
//! trajectories lock. Phase 2 demasks each frame against the local
//! synchronized estimate, decodes the perturbation to a character, keeps the
//! oscillator tracking despite the masking offset, and emits an observation
//! event per tick to the external display collaborator.
//!
//! Frames whose sequence number is not strictly greater than the last
//! accepted one are rejected in both phases; the channel is assumed in-order
//! and duplicates would corrupt both synchronization and decoding.

use crate::codec::SymbolCodec;
use crate::error::{Error, Result};
use crate::metrics::SessionMetrics;
use crate::oscillator::{Oscillator, Role, State};
use crate::sync::{SyncConfig, SyncController, SyncStatus};
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// One decode-tick observation handed to the display collaborator.
#[derive(Debug, Clone, Copy)]
pub struct StepEvent {
    /// Receiver state after the tracking step
    pub state: State,

    /// Recovered perturbation (masked drive coordinate minus local estimate)
    pub perturbation: f64,

    /// Norm of the tracking error remaining after the step (received state
    /// minus the updated local estimate)
    pub error_norm: f64,

    /// Character the perturbation decoded to
    pub decoded: char,
}

/// Fire-and-forget observation sink; the core consumes no return value.
pub trait StepObserver {
    /// Called once per decode tick.
    fn on_step(&mut self, event: &StepEvent);

    /// Synchronization-phase progress hook.
    fn on_sync(&mut self, _status: SyncStatus, _mean_error: Option<f64>) {}
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl StepObserver for NullObserver {
    fn on_step(&mut self, _event: &StepEvent) {}
}

/// Configuration for a receiver session.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Integration time step in seconds
    pub dt: f64,

    /// Bound on each transport receive call
    pub recv_timeout: Duration,

    /// End the session after this many consecutive empty ticks; `None`
    /// runs until the stop flag (real deployments)
    pub idle_limit: Option<u64>,

    /// Synchronization thresholds and window size
    pub sync: SyncConfig,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            dt: 0.001,
            recv_timeout: Duration::from_millis(100),
            idle_limit: None,
            sync: SyncConfig::default(),
        }
    }
}

impl ReceiverConfig {
    /// Deterministic test/demo profile: poll-style receives that give up
    /// after the channel stays empty.
    pub fn accelerated(idle_limit: u64) -> Self {
        Self {
            recv_timeout: Duration::ZERO,
            idle_limit: Some(idle_limit),
            ..Self::default()
        }
    }
}

/// Receiver state machine: `AdaptiveSync -> DecodeLoop`.
pub struct ReceiverSession<T: Transport, O: StepObserver> {
    transport: T,
    codec: SymbolCodec,
    observer: O,
    config: ReceiverConfig,
    oscillator: Oscillator,
    controller: SyncController,
    last_seq: Option<u64>,
    decoded: String,
    metrics: SessionMetrics,
}

impl<T: Transport, O: StepObserver> ReceiverSession<T, O> {
    pub fn new(transport: T, codec: SymbolCodec, observer: O, config: ReceiverConfig) -> Self {
        Self {
            transport,
            codec,
            observer,
            controller: SyncController::new(config.sync),
            config,
            oscillator: Oscillator::new(Role::Receiver),
            last_seq: None,
            decoded: String::new(),
            metrics: SessionMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Message decoded so far.
    pub fn decoded(&self) -> &str {
        &self.decoded
    }

    /// Run both phases, close the transport, and return the decoded
    /// message buffer (the flush path for graceful shutdown).
    pub fn run(&mut self, stop: &AtomicBool) -> Result<String> {
        let result = self.synchronize(stop).and_then(|synced| {
            if synced {
                self.decode_loop(stop)
            } else {
                Ok(())
            }
        });

        self.metrics.complete();
        self.metrics.resyncs = self.controller.resyncs();
        self.transport.close();

        result.map(|_| std::mem::take(&mut self.decoded))
    }

    /// Phase 1: loop until synchronized. Resyncs never exit the loop.
    ///
    /// Returns `Ok(false)` if the stop flag ended the phase first.
    ///
    /// # Errors
    /// Oscillator divergence, or channel starvation when an idle limit is
    /// configured.
    fn synchronize(&mut self, stop: &AtomicBool) -> Result<bool> {
        let mut idle: u64 = 0;

        loop {
            if stop.load(Ordering::Relaxed) {
                return Ok(false);
            }

            let frame = match self.transport.recv(self.config.recv_timeout) {
                Some(frame) => frame,
                None => {
                    // No data this tick: the oscillator does not advance
                    self.metrics.empty_ticks += 1;
                    idle += 1;
                    if let Some(limit) = self.config.idle_limit {
                        if idle >= limit {
                            return Err(Error::Channel(
                                "channel went silent before synchronization".to_string(),
                            ));
                        }
                    }
                    continue;
                }
            };
            idle = 0;

            if !self.accept_seq(frame.seq) {
                continue;
            }
            self.metrics.frames_received += 1;
            self.metrics.sync_ticks += 1;

            let status = self
                .controller
                .track(&mut self.oscillator, &frame.state, self.config.dt)?;
            self.observer.on_sync(status, self.controller.mean_error());

            if status == SyncStatus::Synchronized {
                return Ok(true);
            }
        }
    }

    /// Phase 2: demask, decode, track, observe.
    fn decode_loop(&mut self, stop: &AtomicBool) -> Result<()> {
        let mut idle: u64 = 0;

        loop {
            if stop.load(Ordering::Relaxed) {
                return Ok(());
            }

            let frame = match self.transport.recv(self.config.recv_timeout) {
                Some(frame) => frame,
                None => {
                    self.metrics.empty_ticks += 1;
                    idle += 1;
                    if let Some(limit) = self.config.idle_limit {
                        if idle >= limit {
                            return Ok(());
                        }
                    }
                    continue;
                }
            };
            idle = 0;

            if !self.accept_seq(frame.seq) {
                continue;
            }
            self.metrics.frames_received += 1;

            let local = self.oscillator.state();

            // Demask: the perturbation is whatever the masked drive
            // coordinate carries beyond our synchronized estimate
            let perturbation = frame.state.x - local.x;
            let decoded = self.codec.decode(perturbation);
            self.decoded.push(decoded);
            self.metrics.chars_decoded += 1;

            // Keep tracking despite the masking offset
            let error = frame.state - local;
            let state = self.oscillator.step(error.x, self.config.dt)?;

            let event = StepEvent {
                state,
                perturbation,
                error_norm: (frame.state - state).norm(),
                decoded,
            };
            self.observer.on_step(&event);
        }
    }

    /// Sequence gate: accept only strictly increasing numbers.
    fn accept_seq(&mut self, seq: u64) -> bool {
        if let Some(last) = self.last_seq {
            if seq <= last {
                self.metrics.frames_rejected += 1;
                return false;
            }
        }
        self.last_seq = Some(seq);
        true
    }
}
