//! Stdout observation sink.
//!
//! The protocol core emits one event per decode tick through the
//! `StepObserver` interface; this implementation prints them. Any other
//! presentation (plotting, dashboards) would implement the same trait
//! without touching the core.

use chaoslink_core::receiver::{StepEvent, StepObserver};
use chaoslink_core::sync::SyncStatus;
use std::io::Write;

/// Prints decoded characters as they arrive, plus sync-phase progress.
pub struct PrintObserver {
    quiet: bool,
    sync_ticks: u64,
    announced_lock: bool,
}

impl PrintObserver {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            sync_ticks: 0,
            announced_lock: false,
        }
    }
}

impl StepObserver for PrintObserver {
    fn on_step(&mut self, event: &StepEvent) {
        if self.quiet {
            return;
        }
        // Stream characters without line buffering so the message appears
        // as it decodes
        print!("{}", event.decoded);
        let _ = std::io::stdout().flush();
    }

    fn on_sync(&mut self, status: SyncStatus, mean_error: Option<f64>) {
        self.sync_ticks += 1;

        match status {
            SyncStatus::Synchronized if !self.announced_lock => {
                self.announced_lock = true;
                match mean_error {
                    Some(mean) => println!("Synchronized (MAE: {mean:.2e})"),
                    None => println!("Synchronized"),
                }
            }
            SyncStatus::Resyncing => {
                println!("Resetting synchronization...");
            }
            _ if !self.quiet && self.sync_ticks % 500 == 0 => {
                if let Some(mean) = mean_error {
                    println!("Searching... (MAE: {mean:.2e})");
                }
            }
            _ => {}
        }
    }
}
