//! Error types for the chaoslink system.
//!
//! All operations return structured errors rather than panicking.
//! This enables graceful shutdown and clear error reporting.

use thiserror::Error;

/// Top-level error type for all operations in the system.
///
/// Each variant corresponds to a specific failure domain:
/// - Oscillator: numerical divergence of the chaotic state
/// - Codec: symbol encode failures (decode always clamps)
/// - Frame: wire frame serialization/parsing
/// - CRC: datagram corruption detected
/// - I/O: socket and file operations
#[derive(Debug, Error)]
pub enum Error {
    /// Oscillator state left the finite domain
    #[error("oscillator error: {0}")]
    Oscillator(#[from] OscillatorError),

    /// Symbol codec error (e.g., character outside the alphabet)
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Wire frame error (e.g., invalid header, length mismatch)
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// CRC validation failed, indicating datagram corruption
    #[error("CRC mismatch: expected {expected:#010x}, got {actual:#010x}")]
    Crc { expected: u32, actual: u32 },

    /// Socket or file I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/channel error (e.g., send on a closed transport)
    #[error("channel error: {0}")]
    Channel(String),
}

/// Oscillator errors.
#[derive(Debug, Error)]
pub enum OscillatorError {
    /// A state coordinate became NaN or infinite.
    ///
    /// An unchecked non-finite state would silently disable both
    /// synchronization and decoding, so integration aborts instead.
    #[error("state diverged to non-finite values at step {step}")]
    Diverged { step: u64 },
}

/// Symbol codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Character is outside the printable-ASCII alphabet (32..=127)
    #[error("character {0:?} is outside the printable ASCII alphabet")]
    OutOfAlphabet(char),

    /// Configured scale must be positive and finite
    #[error("invalid codec scale: {0}")]
    InvalidScale(f64),
}

/// Wire frame errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Invalid magic number in the frame header
    #[error("invalid frame magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic { expected: [u8; 2], actual: [u8; 2] },

    /// Buffer is too short to contain a valid frame
    #[error("frame too short: need at least {required} bytes, got {actual}")]
    FrameTooShort { required: usize, actual: usize },

    /// Flag bits we do not understand (future/incompatible sender)
    #[error("unknown flag bits: {0:#04x}")]
    UnknownFlags(u8),

    /// Buffer length doesn't match what the flags imply
    #[error("frame length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A state coordinate on the wire is NaN or infinite
    #[error("frame carries non-finite state coordinates")]
    NonFiniteState,
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
