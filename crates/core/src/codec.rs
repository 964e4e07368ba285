//! Symbol codec: printable ASCII characters to bounded scalar perturbations.
//!
//! A character is embedded as a small additive offset on the drive
//! coordinate before transmission. The offset is `(codepoint - 32) * scale`,
//! so the whole alphabet fits inside the fixed perturbation amplitude and
//! never dominates the carrier trajectory.
//!
//! # Scale
//!
//! Two constants exist in the historical behavior: a bare default of `0.001`
//! and the amplitude-derived `MAX_AMPLITUDE / 95`. The codec takes the scale
//! as configuration with the derived value as the default; both endpoints
//! must agree on it.

use crate::error::{CodecError, Result};

/// Largest perturbation magnitude the masking budget allows.
pub const MAX_AMPLITUDE: f64 = 0.25;

/// Number of scale steps spanning the printable-ASCII alphabet.
pub const ALPHABET_SPAN: f64 = 95.0;

/// First codepoint of the alphabet (space).
const ALPHABET_LOW: u32 = 32;

/// Last codepoint of the alphabet (DEL).
const ALPHABET_HIGH: u32 = 127;

/// Amplitude-derived scale: `MAX_AMPLITUDE / 95` (~0.002632).
pub const DERIVED_SCALE: f64 = MAX_AMPLITUDE / ALPHABET_SPAN;

/// Legacy scale observed in one source variant of the protocol.
pub const LEGACY_SCALE: f64 = 0.001;

/// Character <-> perturbation mapping with a configurable scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolCodec {
    scale: f64,
}

impl SymbolCodec {
    /// Create a codec with an explicit scale.
    ///
    /// # Errors
    /// `CodecError::InvalidScale` if the scale is not positive and finite.
    pub fn new(scale: f64) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CodecError::InvalidScale(scale).into());
        }
        Ok(Self { scale })
    }

    /// Codec using the legacy `0.001` scale.
    pub fn legacy() -> Self {
        Self {
            scale: LEGACY_SCALE,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Encode a character as a perturbation.
    ///
    /// # Errors
    /// `CodecError::OutOfAlphabet` for characters outside printable ASCII
    /// 32..=127.
    pub fn encode(&self, ch: char) -> Result<f64> {
        let cp = ch as u32;
        if !(ALPHABET_LOW..=ALPHABET_HIGH).contains(&cp) {
            return Err(CodecError::OutOfAlphabet(ch).into());
        }
        Ok((cp - ALPHABET_LOW) as f64 * self.scale)
    }

    /// Decode a recovered perturbation back to a character.
    ///
    /// Values implying a codepoint outside the alphabet clamp to the
    /// boundary characters rather than erroring; channel noise maps to the
    /// nearest symbol.
    pub fn decode(&self, value: f64) -> char {
        let cp = (value / self.scale).round() as i64 + ALPHABET_LOW as i64;
        let cp = cp.clamp(ALPHABET_LOW as i64, ALPHABET_HIGH as i64) as u32;
        // In-range by construction
        char::from_u32(cp).unwrap_or(' ')
    }
}

impl Default for SymbolCodec {
    fn default() -> Self {
        Self {
            scale: DERIVED_SCALE,
        }
    }
}
