//! Sender session: preamble then interleaved sync/message transmission.
//!
//! The sender runs two phases with no return transition:
//!
//! 1. **Preamble** — a fixed number of unmasked frames, each carrying the
//!    true state in both fields, paced so the receiver's error window can
//!    converge incrementally.
//! 2. **Messaging** — lines are read from the message source; each
//!    character is encoded as a perturbation, added to the drive coordinate
//!    of a freshly stepped state, and transmitted. Every `sync_interval`
//!    message ticks (and whenever the counter sits on the interval with no
//!    pending character) a plain sync frame keeps the receiver locked.
//!
//! Pacing is explicit configuration rather than an implicit wall-clock
//! sleep: real deployments pace at `dt` seconds per tick, tests run with
//! zero pacing at full speed.

use crate::codec::SymbolCodec;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::metrics::SessionMetrics;
use crate::oscillator::{Oscillator, Role, State};
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Source of message text, one line per call.
///
/// `Ok(None)` means end of input and ends the messaging phase. An empty
/// line is a no-op that keeps the sync cadence alive.
pub trait MessageSource {
    fn next_line(&mut self) -> Result<Option<String>>;
}

/// Fixed list of lines; used by tests and the demo runner.
#[derive(Debug, Default)]
pub struct QueuedSource {
    lines: std::collections::VecDeque<String>,
}

impl QueuedSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl MessageSource for QueuedSource {
    fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

/// Configuration for a sender session.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Destination "host:port"
    pub dest: String,

    /// Integration time step in seconds
    pub dt: f64,

    /// Unmasked frames sent before any message
    pub preamble_steps: u32,

    /// Message ticks between background sync frames
    pub sync_interval: u64,

    /// Delay between sends; zero for accelerated deterministic runs
    pub pace: Duration,
}

impl SenderConfig {
    /// Real-time defaults: pacing equals the integration step, keeping
    /// simulated and wall-clock time approximately aligned.
    pub fn new(dest: impl Into<String>) -> Self {
        let dt = 0.001;
        Self {
            dest: dest.into(),
            dt,
            preamble_steps: 1000,
            sync_interval: 10,
            pace: Duration::from_secs_f64(dt),
        }
    }

    /// Same protocol constants with no pacing delay.
    pub fn accelerated(dest: impl Into<String>) -> Self {
        Self {
            pace: Duration::ZERO,
            ..Self::new(dest)
        }
    }
}

/// Sender state machine: `Preamble -> Messaging`.
pub struct SenderSession<T: Transport, S: MessageSource> {
    transport: T,
    source: S,
    codec: SymbolCodec,
    config: SenderConfig,
    oscillator: Oscillator,
    seq: u64,
    last_timestamp: u64,
    started: Instant,
    metrics: SessionMetrics,
}

impl<T: Transport, S: MessageSource> SenderSession<T, S> {
    pub fn new(transport: T, source: S, codec: SymbolCodec, config: SenderConfig) -> Self {
        Self {
            transport,
            source,
            codec,
            config,
            oscillator: Oscillator::new(Role::Transmitter),
            seq: 0,
            last_timestamp: 0,
            started: Instant::now(),
            metrics: SessionMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Run both phases to completion (end of input or stop flag), then
    /// close the transport. Frames are atomic, so shutdown needs no
    /// partial-frame cleanup.
    ///
    /// # Errors
    /// `Error::Config` for a zero `sync_interval`; otherwise transport and
    /// oscillator failures.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        if self.config.sync_interval == 0 {
            return Err(Error::Config(
                "sync_interval must be at least 1".to_string(),
            ));
        }

        let result = self
            .preamble(stop)
            .and_then(|_| self.messaging(stop));

        self.metrics.complete();
        self.transport.close();
        result
    }

    fn preamble(&mut self, stop: &AtomicBool) -> Result<()> {
        for _ in 0..self.config.preamble_steps {
            if stop.load(Ordering::Relaxed) {
                return Ok(());
            }

            let state = self.oscillator.step(0.0, self.config.dt)?;
            self.send_frame(state, Some(state))?;
            self.metrics.preamble_frames += 1;
            self.pace();
        }
        Ok(())
    }

    fn messaging(&mut self, stop: &AtomicBool) -> Result<()> {
        let mut counter: u64 = 0;

        loop {
            if stop.load(Ordering::Relaxed) {
                return Ok(());
            }

            // Background sync cadence while no message character is pending
            if counter % self.config.sync_interval == 0 {
                let state = self.oscillator.step(0.0, self.config.dt)?;
                self.send_frame(state, Some(state))?;
                self.metrics.sync_frames += 1;
            }

            let line = match self.source.next_line()? {
                Some(line) => line,
                None => return Ok(()),
            };

            for ch in line.chars() {
                if stop.load(Ordering::Relaxed) {
                    return Ok(());
                }

                let perturbation = match self.codec.encode(ch) {
                    Ok(p) => p,
                    Err(_) => {
                        // Outside the alphabet: skip rather than abort
                        self.metrics.chars_skipped += 1;
                        continue;
                    }
                };

                let true_state = self.oscillator.step(0.0, self.config.dt)?;
                let masked = State {
                    x: true_state.x + perturbation,
                    ..true_state
                };

                self.send_frame(masked, Some(true_state))?;
                self.metrics.message_frames += 1;
                counter += 1;
                self.pace();
            }
        }
    }

    fn send_frame(&mut self, state: State, true_state: Option<State>) -> Result<()> {
        let frame = Frame::new(self.seq, self.next_timestamp(), state, true_state);
        self.transport.send(&frame, &self.config.dest)?;
        self.seq += 1;
        Ok(())
    }

    /// Nanoseconds since session start, forced strictly increasing.
    fn next_timestamp(&mut self) -> u64 {
        let now = self.started.elapsed().as_nanos() as u64;
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    fn pace(&self) {
        if !self.config.pace.is_zero() {
            std::thread::sleep(self.config.pace);
        }
    }
}
