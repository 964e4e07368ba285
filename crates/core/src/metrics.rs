//! Metrics collection and reporting for link sessions.
//!
//! Sender and receiver are separate processes, so each session keeps its own
//! counters and the application prints them at shutdown. Updates happen
//! inline in the single-threaded session loops.
//!
//! # Thread Safety
//!
//! `SessionMetrics` is NOT thread-safe; each session owns exactly one.

use std::time::{Duration, Instant};

/// Counters for one session (sender or receiver; unused fields stay zero).
#[derive(Debug, Clone)]
pub struct SessionMetrics {
    // === Timing ===
    /// When the session started
    pub start_time: Instant,

    /// When the session ended (set on completion)
    pub end_time: Option<Instant>,

    // === Sending ===
    /// Preamble frames sent
    pub preamble_frames: u64,

    /// Background sync frames sent during the messaging phase
    pub sync_frames: u64,

    /// Masked message frames sent
    pub message_frames: u64,

    /// Input characters skipped because they fall outside the alphabet
    pub chars_skipped: u64,

    // === Receiving ===
    /// Frames accepted from the transport
    pub frames_received: u64,

    /// Receive calls that produced no frame this tick
    pub empty_ticks: u64,

    /// Frames rejected as duplicates or out-of-order by sequence number
    pub frames_rejected: u64,

    /// Frames consumed while searching for synchronization
    pub sync_ticks: u64,

    /// Times the controller reset local state
    pub resyncs: u64,

    /// Characters appended to the decoded buffer
    pub chars_decoded: u64,
}

impl SessionMetrics {
    /// Create new metrics with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            end_time: None,
            preamble_frames: 0,
            sync_frames: 0,
            message_frames: 0,
            chars_skipped: 0,
            frames_received: 0,
            empty_ticks: 0,
            frames_rejected: 0,
            sync_ticks: 0,
            resyncs: 0,
            chars_decoded: 0,
        }
    }

    /// Mark the session as complete.
    pub fn complete(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Total duration (or current elapsed if not complete).
    pub fn duration(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// Total frames sent across all phases.
    pub fn frames_sent(&self) -> u64 {
        self.preamble_frames + self.sync_frames + self.message_frames
    }

    /// Fraction of receive ticks that carried a frame.
    pub fn arrival_rate(&self) -> f64 {
        let ticks = self.frames_received + self.empty_ticks;
        if ticks == 0 {
            0.0
        } else {
            self.frames_received as f64 / ticks as f64
        }
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Session Summary ===");
        println!("Duration: {} ms", self.duration().as_millis());
        println!();

        if self.frames_sent() > 0 {
            println!("=== Sent ===");
            println!("Preamble frames: {}", self.preamble_frames);
            println!("Sync frames: {}", self.sync_frames);
            println!("Message frames: {}", self.message_frames);
            if self.chars_skipped > 0 {
                println!("Characters skipped (outside alphabet): {}", self.chars_skipped);
            }
            println!();
        }

        if self.frames_received + self.empty_ticks > 0 {
            println!("=== Received ===");
            println!("Frames received: {}", self.frames_received);
            println!("Empty ticks: {}", self.empty_ticks);
            println!("Arrival rate: {:.2}%", self.arrival_rate() * 100.0);
            println!("Rejected (dup/out-of-order): {}", self.frames_rejected);
            println!("Sync ticks: {}", self.sync_ticks);
            println!("Resyncs: {}", self.resyncs);
            println!("Characters decoded: {}", self.chars_decoded);
            println!();
        }
    }

    /// Export metrics as a simple text format (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "duration_ms={}\n\
             preamble_frames={}\n\
             sync_frames={}\n\
             message_frames={}\n\
             chars_skipped={}\n\
             frames_received={}\n\
             empty_ticks={}\n\
             frames_rejected={}\n\
             sync_ticks={}\n\
             resyncs={}\n\
             chars_decoded={}\n",
            self.duration().as_millis(),
            self.preamble_frames,
            self.sync_frames,
            self.message_frames,
            self.chars_skipped,
            self.frames_received,
            self.empty_ticks,
            self.frames_rejected,
            self.sync_ticks,
            self.resyncs,
            self.chars_decoded,
        )
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
