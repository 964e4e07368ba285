//! Chua-type chaotic oscillator with Lyapunov feedback control.
//!
//! Both endpoints of the link run the same continuous-time nonlinear
//! oscillator. The transmitter integrates the free dynamics; the receiver
//! additionally injects a feedback term proportional to the drive-signal
//! error, which forces its trajectory onto the transmitter's.
//!
//! # Dynamics
//!
//! With the piecewise-linear nonlinearity
//! `f(x) = b*x + 0.5*(a - b)*(|x + i0| - |x - i0|)`:
//!
//! ```text
//! dx = -alpha * (x + y + f(x))    [+ g_x * e]
//! dy = -beta * (x + y) - gamma*z  [+ g_y * e]
//! dz = y                          [+ g_z * e]
//! ```
//!
//! where the bracketed terms apply only to receiver instances and `e` is the
//! error on the drive coordinate. Integration is explicit Euler with the time
//! step divided by a fixed circuit time-scale constant (physical seconds to
//! simulation time).
//!
//! # Determinism
//!
//! `step` is a pure function of (state, error signal, dt, parameters):
//! identical inputs reproduce bit-identical outputs. No global state.

use crate::error::{OscillatorError, Result};

/// Circuit time-scale divisor: one second of wall-clock time maps to
/// `1 / 6349.2` units of simulation time.
pub const TIME_SCALE: f64 = 6349.2;

/// A point in the oscillator's three-dimensional state space.
///
/// `x` is the drive coordinate: the one transmitted on the wire, masked by
/// the message perturbation, and fed back as the control error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct State {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl State {
    /// Canonical initial condition shared by transmitter and receiver.
    pub const INITIAL: State = State {
        x: 0.1,
        y: 0.11,
        z: 0.12,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm of the state treated as a vector.
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// L2 distance to another state.
    pub fn distance(&self, other: &State) -> f64 {
        (*self - *other).norm()
    }

    /// True if every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl std::ops::Sub for State {
    type Output = State;

    fn sub(self, rhs: State) -> State {
        State {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

/// Whether an oscillator instance drives or is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Free-running dynamics; its trajectory is the reference.
    Transmitter,

    /// Feedback-controlled dynamics; converges onto the transmitter.
    Receiver,
}

/// Canonical oscillator parameters.
///
/// Ratios of the reference circuit components; the feedback gains are the
/// ones for which the error dynamics admit a Lyapunov function, guaranteeing
/// convergence of the controlled trajectory.
#[derive(Debug, Clone, Copy)]
pub struct Params {
    /// R/L1 ratio
    pub alpha: f64,
    /// R/L2 ratio
    pub beta: f64,
    /// 1/L2
    pub gamma: f64,
    /// Inner-segment slope ratio Ra/R
    pub a: f64,
    /// Outer-segment slope ratio Rb/R
    pub b: f64,
    /// Breakpoint of the piecewise-linear nonlinearity
    pub i0: f64,
    /// Feedback gains (g_x, g_y, g_z) applied to the receiver derivatives
    pub gains: [f64; 3],
    /// Physical-to-simulation time conversion divisor
    pub time_scale: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            alpha: 6.3,
            beta: 0.7,
            gamma: 7.0,
            a: -1.143,
            b: -0.714,
            i0: 3.9,
            gains: [1.0, -7.0, 0.0],
            time_scale: TIME_SCALE,
        }
    }
}

/// A single oscillator instance.
///
/// Created at session start with the canonical initial condition, stepped
/// once per processed tick, and reset to the initial condition on resync.
#[derive(Debug, Clone)]
pub struct Oscillator {
    params: Params,
    role: Role,
    state: State,
    steps: u64,
}

impl Oscillator {
    /// Create an oscillator with default parameters and the canonical
    /// initial condition.
    pub fn new(role: Role) -> Self {
        Self::with_params(role, Params::default())
    }

    /// Create an oscillator with explicit parameters.
    pub fn with_params(role: Role, params: Params) -> Self {
        Self {
            params,
            role,
            state: State::INITIAL,
            steps: 0,
        }
    }

    /// Current state (copy).
    pub fn state(&self) -> State {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Ticks integrated since creation or the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Reset to the canonical initial condition (resync path).
    pub fn reset(&mut self) {
        self.state = State::INITIAL;
        self.steps = 0;
    }

    /// The piecewise-linear nonlinearity
    /// `f(x) = b*x + 0.5*(a - b)*(|x + i0| - |x - i0|)`.
    ///
    /// Inside the breakpoints this reduces to `a*x`; outside, the slope
    /// flattens to `b` with a constant offset.
    pub fn nonlinearity(&self, x: f64) -> f64 {
        let p = &self.params;
        p.b * x + 0.5 * (p.a - p.b) * ((x + p.i0).abs() - (x - p.i0).abs())
    }

    /// Advance one Euler step and return the new state.
    ///
    /// # Arguments
    /// - `error_signal`: drive-coordinate error; ignored by transmitters
    /// - `dt`: physical time step in seconds (divided by the time scale
    ///   before integration)
    ///
    /// # Errors
    /// `OscillatorError::Diverged` if any coordinate leaves the finite
    /// domain after the update.
    pub fn step(&mut self, error_signal: f64, dt: f64) -> Result<State> {
        let p = self.params;
        let State { x, y, z } = self.state;

        let mut dx = -p.alpha * (x + y + self.nonlinearity(x));
        let mut dy = -p.beta * (x + y) - p.gamma * z;
        let mut dz = y;

        // Lyapunov control injection, receiver side only
        if self.role == Role::Receiver {
            dx += p.gains[0] * error_signal;
            dy += p.gains[1] * error_signal;
            dz += p.gains[2] * error_signal;
        }

        let h = dt / p.time_scale;
        self.state = State {
            x: x + dx * h,
            y: y + dy * h,
            z: z + dz * h,
        };
        self.steps += 1;

        if !self.state.is_finite() {
            return Err(OscillatorError::Diverged { step: self.steps }.into());
        }

        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.001;

    #[test]
    fn test_nonlinearity_at_origin() {
        let osc = Oscillator::new(Role::Transmitter);
        assert_eq!(osc.nonlinearity(0.0), 0.0);
    }

    #[test]
    fn test_nonlinearity_at_breakpoints() {
        let osc = Oscillator::new(Role::Transmitter);
        let p = Params::default();

        // At +i0 and -i0 the closed form is b*i0 + (a-b)*i0 = a*i0 (odd symmetry)
        let at_pos = osc.nonlinearity(p.i0);
        let at_neg = osc.nonlinearity(-p.i0);
        assert!((at_pos - p.a * p.i0).abs() < 1e-12, "f(i0) = {at_pos}");
        assert!((at_neg + p.a * p.i0).abs() < 1e-12, "f(-i0) = {at_neg}");
    }

    #[test]
    fn test_nonlinearity_inner_segment() {
        // Between the breakpoints |x+i0| - |x-i0| = 2x, so f(x) = a*x
        let osc = Oscillator::new(Role::Transmitter);
        let p = Params::default();

        for x in [-3.0, -1.0, 0.5, 1.0, 3.5] {
            let f = osc.nonlinearity(x);
            assert!((f - p.a * x).abs() < 1e-12, "f({x}) = {f}");
        }
    }

    #[test]
    fn test_nonlinearity_outer_segments() {
        // Beyond +i0: f(x) = b*x + (a-b)*i0
        let osc = Oscillator::new(Role::Transmitter);
        let p = Params::default();

        let above = osc.nonlinearity(5.0);
        assert!((above - (p.b * 5.0 + (p.a - p.b) * p.i0)).abs() < 1e-12);

        let below = osc.nonlinearity(-5.0);
        assert!((below - (p.b * -5.0 - (p.a - p.b) * p.i0)).abs() < 1e-12);
    }

    #[test]
    fn test_step_determinism() {
        let mut a = Oscillator::new(Role::Receiver);
        let mut b = Oscillator::new(Role::Receiver);

        for i in 0..500 {
            let e = (i as f64) * 1e-5;
            let sa = a.step(e, DT).unwrap();
            let sb = b.step(e, DT).unwrap();
            // Bit-identical, not approximately equal
            assert_eq!(sa, sb);
        }
    }

    #[test]
    fn test_transmitter_ignores_error_signal() {
        let mut a = Oscillator::new(Role::Transmitter);
        let mut b = Oscillator::new(Role::Transmitter);

        let sa = a.step(0.0, DT).unwrap();
        let sb = b.step(123.456, DT).unwrap();

        assert_eq!(sa, sb);
    }

    #[test]
    fn test_receiver_applies_gains() {
        let mut free = Oscillator::new(Role::Receiver);
        let mut driven = Oscillator::new(Role::Receiver);

        let s0 = free.step(0.0, DT).unwrap();
        let s1 = driven.step(1.0, DT).unwrap();

        let h = DT / TIME_SCALE;
        let g = Params::default().gains;
        assert!((s1.x - s0.x - g[0] * h).abs() < 1e-15);
        assert!((s1.y - s0.y - g[1] * h).abs() < 1e-15);
        assert!((s1.z - s0.z - g[2] * h).abs() < 1e-15);
    }

    #[test]
    fn test_reset_restores_initial_condition() {
        let mut osc = Oscillator::new(Role::Receiver);
        for _ in 0..100 {
            osc.step(0.01, DT).unwrap();
        }
        osc.reset();

        assert_eq!(osc.state(), State::INITIAL);
        assert_eq!(osc.steps(), 0);
    }

    #[test]
    fn test_divergence_guard() {
        let mut osc = Oscillator::new(Role::Transmitter);

        // A pathological time step blows the explicit Euler update up to
        // infinity within a few iterations.
        let mut diverged = false;
        for _ in 0..16 {
            if osc.step(0.0, 1e300).is_err() {
                diverged = true;
                break;
            }
        }
        assert!(diverged, "expected Diverged error");
    }

    #[test]
    fn test_state_distance_and_norm() {
        let a = State::new(1.0, 2.0, 2.0);
        let b = State::new(0.0, 0.0, 0.0);

        assert_eq!(a.norm(), 3.0);
        assert_eq!(a.distance(&b), 3.0);
        assert_eq!(b.distance(&a), 3.0);
    }
}
