//! Wire frame format.
//!
//! One frame per datagram. Frames carry the (possibly masked) oscillator
//! state, an optional diagnostic true state, a sender-monotonic sequence
//! number, and a nanosecond timestamp.
//!
//! # Frame Format
//!
//! ```text
//! +--------------------+
//! | Magic (2 bytes)    |  0x43 0x4C ("CL")
//! +--------------------+
//! | flags (1)          |  bit0 = true_state present
//! +--------------------+
//! | seq (8)            |  u64 LE, strictly increasing per sender
//! +--------------------+
//! | timestamp_ns (8)   |  u64 LE, nanoseconds since session start
//! +--------------------+
//! | state (12)         |  3 x f32 LE (x, y, z)
//! +--------------------+
//! | true_state (12)    |  3 x f32 LE, only when flags bit0 set
//! +--------------------+
//! | crc32 (4)          |  u32 LE over all preceding bytes
//! +--------------------+
//! ```
//!
//! # CRC Coverage
//!
//! The checksum covers the header and both state payloads, so a corrupted
//! datagram is detected at parse time and dropped by the transport instead
//! of poisoning the receiver's synchronization.
//!
//! # Precision
//!
//! Coordinates travel as single-precision floats. The quantization error
//! (~1e-7 relative) is orders of magnitude below half a codec scale step,
//! so masking round trips are unaffected.

use crate::error::{FrameError, Result};
use crate::oscillator::State;

/// Magic number for frames: "CL"
const MAGIC: [u8; 2] = [0x43, 0x4C];

/// Flag bit: the diagnostic true_state field is present.
const FLAG_TRUE_STATE: u8 = 0x01;

/// Size of a frame without the optional true_state field.
pub const BASE_SIZE: usize = 35;

/// Size of a frame carrying true_state.
pub const FULL_SIZE: usize = BASE_SIZE + 12;

/// A single protocol frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Sender-monotonic sequence number
    pub seq: u64,

    /// Nanoseconds since the sender's session start
    pub timestamp_ns: u64,

    /// Transmitted state; the drive coordinate may carry a perturbation
    pub state: State,

    /// Unmasked state, present on sync/diagnostic frames
    pub true_state: Option<State>,
}

impl Frame {
    pub fn new(seq: u64, timestamp_ns: u64, state: State, true_state: Option<State>) -> Self {
        Self {
            seq,
            timestamp_ns,
            state,
            true_state,
        }
    }

    /// Serialized size of this frame in bytes.
    pub fn size(&self) -> usize {
        if self.true_state.is_some() {
            FULL_SIZE
        } else {
            BASE_SIZE
        }
    }

    /// Serialize this frame into bytes for transmission.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());

        let mut flags = 0u8;
        if self.true_state.is_some() {
            flags |= FLAG_TRUE_STATE;
        }

        bytes.extend_from_slice(&MAGIC);
        bytes.push(flags);
        bytes.extend_from_slice(&self.seq.to_le_bytes());
        bytes.extend_from_slice(&self.timestamp_ns.to_le_bytes());
        write_state(&mut bytes, &self.state);
        if let Some(ts) = &self.true_state {
            write_state(&mut bytes, ts);
        }

        let crc = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());

        bytes
    }

    /// Deserialize a frame from bytes.
    ///
    /// # Errors
    /// - `FrameError::FrameTooShort` if the buffer can't hold a frame
    /// - `FrameError::InvalidMagic` if the magic doesn't match
    /// - `FrameError::UnknownFlags` for flag bits we don't understand
    /// - `FrameError::LengthMismatch` if the length contradicts the flags
    /// - `Error::Crc` on checksum mismatch
    /// - `FrameError::NonFiniteState` if a coordinate is NaN/Inf
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < BASE_SIZE {
            return Err(FrameError::FrameTooShort {
                required: BASE_SIZE,
                actual: bytes.len(),
            }
            .into());
        }

        let magic: [u8; 2] = bytes[0..2].try_into().unwrap();
        if magic != MAGIC {
            return Err(FrameError::InvalidMagic {
                expected: MAGIC,
                actual: magic,
            }
            .into());
        }

        let flags = bytes[2];
        if flags & !FLAG_TRUE_STATE != 0 {
            return Err(FrameError::UnknownFlags(flags).into());
        }

        let has_true_state = flags & FLAG_TRUE_STATE != 0;
        let expected = if has_true_state { FULL_SIZE } else { BASE_SIZE };
        if bytes.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: bytes.len(),
            }
            .into());
        }

        // Verify CRC before trusting any field
        let body = &bytes[..bytes.len() - 4];
        let stored = u32::from_le_bytes(bytes[bytes.len() - 4..].try_into().unwrap());
        let computed = crc32fast::hash(body);
        if stored != computed {
            return Err(crate::error::Error::Crc {
                expected: stored,
                actual: computed,
            });
        }

        let seq = u64::from_le_bytes(bytes[3..11].try_into().unwrap());
        let timestamp_ns = u64::from_le_bytes(bytes[11..19].try_into().unwrap());
        let state = read_state(&bytes[19..31]);
        let true_state = if has_true_state {
            Some(read_state(&bytes[31..43]))
        } else {
            None
        };

        if !state.is_finite() || true_state.map_or(false, |s| !s.is_finite()) {
            return Err(FrameError::NonFiniteState.into());
        }

        Ok(Self {
            seq,
            timestamp_ns,
            state,
            true_state,
        })
    }
}

fn write_state(bytes: &mut Vec<u8>, state: &State) {
    bytes.extend_from_slice(&(state.x as f32).to_le_bytes());
    bytes.extend_from_slice(&(state.y as f32).to_le_bytes());
    bytes.extend_from_slice(&(state.z as f32).to_le_bytes());
}

fn read_state(bytes: &[u8]) -> State {
    State {
        x: f32::from_le_bytes(bytes[0..4].try_into().unwrap()) as f64,
        y: f32::from_le_bytes(bytes[4..8].try_into().unwrap()) as f64,
        z: f32::from_le_bytes(bytes[8..12].try_into().unwrap()) as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn sample_state() -> State {
        State::new(0.125, -0.25, 0.5)
    }

    #[test]
    fn test_round_trip_without_true_state() {
        let frame = Frame::new(7, 1_000_000, sample_state(), None);

        let bytes = frame.serialize();
        assert_eq!(bytes.len(), BASE_SIZE);

        let parsed = Frame::deserialize(&bytes).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_round_trip_with_true_state() {
        let frame = Frame::new(8, 2_000_000, sample_state(), Some(State::INITIAL));

        let bytes = frame.serialize();
        assert_eq!(bytes.len(), FULL_SIZE);

        let parsed = Frame::deserialize(&bytes).unwrap();
        assert_eq!(parsed.seq, 8);
        assert_eq!(parsed.timestamp_ns, 2_000_000);
        assert!(parsed.true_state.is_some());
        // f32 representable values survive exactly
        assert_eq!(parsed.state, sample_state());
    }

    #[test]
    fn test_f32_precision_below_codec_step() {
        // Quantization must stay far below half a codec scale step
        let frame = Frame::new(0, 0, State::new(0.086842105, 0.11, 0.12), None);
        let parsed = Frame::deserialize(&frame.serialize()).unwrap();

        assert!((parsed.state.x - 0.086842105).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = Frame::new(1, 1, sample_state(), None).serialize();
        bytes[0] = 0xFF;

        let result = Frame::deserialize(&bytes);
        assert!(matches!(
            result,
            Err(Error::Frame(FrameError::InvalidMagic { .. }))
        ));
    }

    #[test]
    fn test_too_short() {
        let bytes = vec![0x43, 0x4C, 0x00, 0x01];
        let result = Frame::deserialize(&bytes);
        assert!(matches!(
            result,
            Err(Error::Frame(FrameError::FrameTooShort { .. }))
        ));
    }

    #[test]
    fn test_unknown_flags() {
        let mut bytes = Frame::new(1, 1, sample_state(), None).serialize();
        bytes[2] = 0x80;

        let result = Frame::deserialize(&bytes);
        assert!(matches!(
            result,
            Err(Error::Frame(FrameError::UnknownFlags(0x80)))
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let mut bytes = Frame::new(1, 1, sample_state(), None).serialize();
        bytes.push(0);

        let result = Frame::deserialize(&bytes);
        assert!(matches!(
            result,
            Err(Error::Frame(FrameError::LengthMismatch { .. }))
        ));
    }

    #[test]
    fn test_crc_detects_corruption() {
        let mut bytes = Frame::new(3, 9, sample_state(), Some(sample_state())).serialize();
        // Flip one payload bit
        bytes[25] ^= 0x10;

        let result = Frame::deserialize(&bytes);
        assert!(matches!(result, Err(Error::Crc { .. })));
    }

    #[test]
    fn test_non_finite_state_rejected() {
        // Build a frame with a NaN coordinate, recompute a valid CRC, and
        // verify the finite-domain guard still rejects it.
        let mut bytes = Frame::new(1, 1, sample_state(), None).serialize();
        bytes.truncate(BASE_SIZE - 4);
        bytes[19..23].copy_from_slice(&f32::NAN.to_le_bytes());
        let crc = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());

        let result = Frame::deserialize(&bytes);
        assert!(matches!(
            result,
            Err(Error::Frame(FrameError::NonFiniteState))
        ));
    }
}
