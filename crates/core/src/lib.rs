//! chaoslink-core: covert point-to-point messaging over chaos synchronization
//!
//! Two processes each run the same continuous-time nonlinear oscillator. The
//! receiver's copy is driven toward the sender's by Lyapunov feedback until
//! the trajectories synchronize; the sender then embeds message characters
//! as small perturbations on the transmitted drive coordinate, which the
//! receiver strips off by comparing against its own synchronized estimate.
//!
//! # Architecture
//!
//! The system is designed around clear module boundaries:
//! - `oscillator`: chaotic dynamics and the feedback-control variant
//! - `codec`: character <-> bounded perturbation mapping
//! - `frame`: wire frame serialization with CRC and sequence numbers
//! - `transport`: datagram send/receive abstraction (UDP implementation)
//! - `link`: deterministic in-process lossy channel for tests and demos
//! - `sync`: synchronization detection and adaptive resync
//! - `sender`: preamble + interleaved sync/message state machine
//! - `receiver`: adaptive-sync + decode-loop state machine
//! - `metrics`: observable session behavior
//!
//! # Design Principles
//!
//! - **No panics**: all errors are structured and recoverable
//! - **Loss is not an error**: a timed-out or malformed datagram is "no
//!   data this tick" and the loops proceed
//! - **Deterministic**: identical inputs reproduce identical trajectories;
//!   the simulated channel is seeded
//! - **Single-threaded**: each session is one cooperative control loop; the
//!   only suspension points are the bounded receive and the pacing delay

pub mod codec;
pub mod error;
pub mod frame;
pub mod link;
pub mod metrics;
pub mod oscillator;
pub mod receiver;
pub mod sender;
pub mod sync;
pub mod transport;

// Re-export commonly used types
pub use error::{Error, Result};
