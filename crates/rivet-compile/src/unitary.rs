//! 2x2 unitaries for single-qubit fusion and block re-instantiation.

use std::f64::consts::PI;

use num_complex::Complex64;
use rivet_ir::StandardGate;

const EPSILON: f64 = 1e-10;

/// A 2x2 unitary in row-major order `[[a, b], [c, d]]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unitary2x2 {
    /// Matrix elements `[a, b, c, d]`.
    pub data: [Complex64; 4],
}

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

impl Unitary2x2 {
    /// Build from elements.
    pub fn new(a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Self {
        Self { data: [a, b, c, d] }
    }

    /// Identity.
    pub fn identity() -> Self {
        Self::new(c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(1.0, 0.0))
    }

    /// `diag(1, e^{iλ})`.
    pub fn phase(lambda: f64) -> Self {
        Self::new(c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), Complex64::from_polar(1.0, lambda))
    }

    /// `Rz(θ) = diag(e^{-iθ/2}, e^{iθ/2})`.
    pub fn rz(theta: f64) -> Self {
        Self::new(
            Complex64::from_polar(1.0, -theta / 2.0),
            c(0.0, 0.0),
            c(0.0, 0.0),
            Complex64::from_polar(1.0, theta / 2.0),
        )
    }

    /// `Ry(θ)`.
    pub fn ry(theta: f64) -> Self {
        let (s, co) = (theta / 2.0).sin_cos();
        Self::new(c(co, 0.0), c(-s, 0.0), c(s, 0.0), c(co, 0.0))
    }

    /// `Rx(θ)`.
    pub fn rx(theta: f64) -> Self {
        let (s, co) = (theta / 2.0).sin_cos();
        Self::new(c(co, 0.0), c(0.0, -s), c(0.0, -s), c(co, 0.0))
    }

    /// `U(θ, φ, λ)`.
    pub fn u(theta: f64, phi: f64, lambda: f64) -> Self {
        let (s, co) = (theta / 2.0).sin_cos();
        Self::new(
            c(co, 0.0),
            -Complex64::from_polar(s, lambda),
            Complex64::from_polar(s, phi),
            Complex64::from_polar(co, phi + lambda),
        )
    }

    /// Matrix of a numeric single-qubit standard gate.
    ///
    /// Returns `None` for multi-qubit gates and for symbolic parameters.
    pub fn from_gate(gate: &StandardGate) -> Option<Self> {
        let half = 0.5;
        let m = match gate {
            StandardGate::I => Self::identity(),
            StandardGate::X => Self::new(c(0.0, 0.0), c(1.0, 0.0), c(1.0, 0.0), c(0.0, 0.0)),
            StandardGate::Y => Self::new(c(0.0, 0.0), c(0.0, -1.0), c(0.0, 1.0), c(0.0, 0.0)),
            StandardGate::Z => Self::phase(PI),
            StandardGate::H => {
                let s = std::f64::consts::FRAC_1_SQRT_2;
                Self::new(c(s, 0.0), c(s, 0.0), c(s, 0.0), c(-s, 0.0))
            }
            StandardGate::S => Self::phase(PI / 2.0),
            StandardGate::Sdg => Self::phase(-PI / 2.0),
            StandardGate::T => Self::phase(PI / 4.0),
            StandardGate::Tdg => Self::phase(-PI / 4.0),
            StandardGate::SX => {
                Self::new(c(half, half), c(half, -half), c(half, -half), c(half, half))
            }
            StandardGate::SXdg => {
                Self::new(c(half, -half), c(half, half), c(half, half), c(half, -half))
            }
            StandardGate::Rx(t) => Self::rx(t.as_f64()?),
            StandardGate::Ry(t) => Self::ry(t.as_f64()?),
            StandardGate::Rz(t) => Self::rz(t.as_f64()?),
            StandardGate::P(l) => Self::phase(l.as_f64()?),
            StandardGate::U(t, p, l) => Self::u(t.as_f64()?, p.as_f64()?, l.as_f64()?),
            _ => return None,
        };
        Some(m)
    }

    /// Matrix product `self * other` (apply `other` first).
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        let [a, b, c0, d] = self.data;
        let [e, f, g, h] = other.data;
        Self::new(a * e + b * g, a * f + b * h, c0 * e + d * g, c0 * f + d * h)
    }

    /// Conjugate transpose.
    #[must_use]
    pub fn dagger(&self) -> Self {
        let [a, b, c0, d] = self.data;
        Self::new(a.conj(), c0.conj(), b.conj(), d.conj())
    }

    /// `|tr(self† other)| / 2`: 1 when equal up to global phase.
    pub fn fidelity(&self, other: &Self) -> f64 {
        let m = self.dagger().mul(other);
        ((m.data[0] + m.data[3]).norm() / 2.0).min(1.0)
    }

    /// Whether this is the identity up to global phase.
    pub fn is_identity(&self) -> bool {
        1.0 - self.fidelity(&Self::identity()) < EPSILON
    }

    /// `(θ, φ, λ)` with `self = e^{iγ} U(θ, φ, λ)`.
    pub fn to_u_params(&self) -> (f64, f64, f64) {
        let [a, b, c0, d] = self.data;
        let det = a * d - b * c0;
        let strip = Complex64::from_polar(1.0, -det.arg() / 2.0);
        let (a, c0) = (a * strip, c0 * strip);

        // SU(2) form: a = cos(θ/2) e^{-i(φ+λ)/2}, c = sin(θ/2) e^{i(φ-λ)/2}
        let theta = 2.0 * c0.norm().atan2(a.norm());
        if a.norm() < EPSILON {
            // θ = π: only φ - λ is determined
            let diff = 2.0 * c0.arg();
            return (theta, diff, 0.0);
        }
        let sum = -2.0 * a.arg();
        if c0.norm() < EPSILON {
            return (theta, 0.0, sum);
        }
        let diff = 2.0 * c0.arg();
        (theta, (sum + diff) / 2.0, (sum - diff) / 2.0)
    }

    /// Wrap an angle to `(-π, π]`.
    pub fn normalize_angle(angle: f64) -> f64 {
        if !angle.is_finite() {
            return 0.0;
        }
        let mut a = angle.rem_euclid(2.0 * PI);
        if a > PI {
            a -= 2.0 * PI;
        }
        a
    }
}

impl Default for Unitary2x2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Unitary2x2 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Unitary2x2::mul(&self, &rhs)
    }
}
