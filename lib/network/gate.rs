//! Superoperator tables for the operations a circuit may contain.
//!
//! Every leg of a tensor carries one of four values, `d = 2 * ket + bra`,
//! indexing the entries of a single-qubit density matrix. A unitary gate *U*
//! acts on density matrices as *ρ* → *U ρ U*<sup>†</sup>, which in these
//! coordinates is the tensor
//! ```text
//! T[in..., out...] = U[r, p] * conj(U[s, q])
//! ```
//! where *p* and *q* collect the ket and bra bits of the input legs (first
//! qubit most significant) and *r* and *s* do the same for the output legs.
//! Legs are ordered inputs first, then outputs.
//!
//! Initial states, measurements, and the depolarizing channel are not unitary
//! and are given as explicit tables instead.

use std::f64::consts::PI;
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::c;

/// A single-qubit operator applied at the end of a qubit line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Measurement {
    /// Trace the qubit out.
    Trace,
    /// Expectation value of Pauli X.
    X,
    /// Expectation value of Pauli Y.
    Y,
    /// Expectation value of Pauli Z.
    Z,
    /// Projection onto ∣0⟩.
    Zero,
    /// Projection onto ∣1⟩.
    One,
}

impl Measurement {
    /// Parse a measurement character. Anything unrecognized traces.
    pub fn from_char(c: char) -> Self {
        match c {
            'X' => Self::X,
            'Y' => Self::Y,
            'Z' => Self::Z,
            '0' => Self::Zero,
            '1' => Self::One,
            _ => Self::Trace,
        }
    }

    fn tensor(&self) -> Vec<C64> {
        match self {
            Self::Trace => vec![c!(1.0), c!(0.0), c!(0.0), c!(1.0)],
            Self::X => vec![c!(0.0), c!(1.0), c!(1.0), c!(0.0)],
            Self::Y => vec![c!(0.0), c!(0.0, 1.0), c!(0.0, -1.0), c!(0.0)],
            Self::Z => vec![c!(1.0), c!(0.0), c!(0.0), c!(-1.0)],
            Self::Zero => vec![c!(1.0), c!(0.0), c!(0.0), c!(0.0)],
            Self::One => vec![c!(0.0), c!(0.0), c!(0.0), c!(1.0)],
        }
    }
}

/// The operation a node represents.
#[derive(Clone, Debug, PartialEq)]
pub enum GateKind {
    /// ∣0⟩⟨0∣ at the start of a qubit line.
    InitState,
    /// Hadamard.
    H,
    /// Pauli X.
    X,
    /// Pauli Y.
    Y,
    /// Pauli Z.
    Z,
    /// Rotation about X by an angle.
    Rx(f64),
    /// Rotation about Y by an angle.
    Ry(f64),
    /// Rotation about Z by an angle.
    Rz(f64),
    /// Relative phase on ∣1⟩.
    Phase(f64),
    /// Depolarizing channel with a given error probability.
    Depolarizer(f64),
    /// Controlled NOT, control first.
    Cnot,
    /// Swap.
    Swap,
    /// Controlled Z.
    Cz,
    /// Controlled phase.
    CPhase(f64),
    /// Controlled phase of 2π/2<sup>*k* + 1</sup>, as used in the quantum
    /// Fourier transform.
    CRk(usize),
    /// A user-defined single-qubit unitary.
    Custom1(String, nd::Array2<C64>),
    /// A user-defined two-qubit unitary.
    Custom2(String, nd::Array2<C64>),
    /// A measurement or trace at the end of a qubit line.
    Measure(Measurement),
    /// The result of a contraction.
    Intermediate,
}

impl GateKind {
    /// Number of qubit lines the operation touches.
    pub fn num_qubits(&self) -> usize {
        match self {
            Self::Cnot
            | Self::Swap
            | Self::Cz
            | Self::CPhase(_)
            | Self::CRk(_)
            | Self::Custom2(..) => 2,
            Self::Intermediate => 0,
            _ => 1,
        }
    }

    /// Rank of the tensor built for the operation.
    pub fn rank(&self) -> usize {
        match self {
            Self::InitState | Self::Measure(_) => 1,
            Self::Intermediate => 0,
            _ => 2 * self.num_qubits(),
        }
    }

    /// Return `true` for initial states and measurements.
    pub fn is_boundary(&self) -> bool {
        matches!(self, Self::InitState | Self::Measure(_))
    }

    /// Short display label.
    pub fn label(&self) -> String {
        match self {
            Self::InitState => "|0><0|".into(),
            Self::H => "H".into(),
            Self::X => "X".into(),
            Self::Y => "Y".into(),
            Self::Z => "Z".into(),
            Self::Rx(a) => format!("Rx({})", a),
            Self::Ry(a) => format!("Ry({})", a),
            Self::Rz(a) => format!("Rz({})", a),
            Self::Phase(a) => format!("Phase({})", a),
            Self::Depolarizer(p) => format!("Depol({})", p),
            Self::Cnot => "CNOT".into(),
            Self::Swap => "SWAP".into(),
            Self::Cz => "CZ".into(),
            Self::CPhase(a) => format!("CPhase({})", a),
            Self::CRk(k) => format!("CR{}", k),
            Self::Custom1(name, _) | Self::Custom2(name, _) => name.clone(),
            Self::Measure(Measurement::Trace) => "Tr".into(),
            Self::Measure(Measurement::X) => "MX".into(),
            Self::Measure(Measurement::Y) => "MY".into(),
            Self::Measure(Measurement::Z) => "MZ".into(),
            Self::Measure(Measurement::Zero) => "|0>".into(),
            Self::Measure(Measurement::One) => "|1>".into(),
            Self::Intermediate => "".into(),
        }
    }

    /// Get the unitary matrix of the operation, if it has one.
    pub fn unitary(&self) -> Option<nd::Array2<C64>> {
        let z = c!(0.0);
        let o = c!(1.0);
        let u = match self {
            Self::H => {
                let h = c!(std::f64::consts::FRAC_1_SQRT_2);
                nd::array![[h, h], [h, -h]]
            },
            Self::X => nd::array![[z, o], [o, z]],
            Self::Y => nd::array![[z, c!(0.0, -1.0)], [c!(0.0, 1.0), z]],
            Self::Z => nd::array![[o, z], [z, -o]],
            Self::Rx(a) => {
                let (s, co) = (a / 2.0).sin_cos();
                nd::array![[c!(co), c!(0.0, -s)], [c!(0.0, -s), c!(co)]]
            },
            Self::Ry(a) => {
                let (s, co) = (a / 2.0).sin_cos();
                nd::array![[c!(co), c!(-s)], [c!(s), c!(co)]]
            },
            Self::Rz(a) => {
                nd::array![[C64::cis(-a / 2.0), z], [z, C64::cis(a / 2.0)]]
            },
            Self::Phase(a) => nd::array![[o, z], [z, C64::cis(*a)]],
            Self::Cnot => nd::array![
                [o, z, z, z],
                [z, o, z, z],
                [z, z, z, o],
                [z, z, o, z],
            ],
            Self::Swap => nd::array![
                [o, z, z, z],
                [z, z, o, z],
                [z, o, z, z],
                [z, z, z, o],
            ],
            Self::Cz => controlled_phase(PI),
            Self::CPhase(a) => controlled_phase(*a),
            Self::CRk(k) => {
                let denom = 2.0_f64.powi((*k as i32).saturating_add(1));
                controlled_phase(2.0 * PI / denom)
            },
            Self::Custom1(_, u) | Self::Custom2(_, u) => u.clone(),
            _ => { return None; },
        };
        Some(u)
    }

    /// Build the flat tensor for the operation. Intermediates have no fixed
    /// tensor and give `None`.
    pub fn tensor(&self) -> Option<Vec<C64>> {
        match self {
            Self::InitState => Some(vec![c!(1.0), c!(0.0), c!(0.0), c!(0.0)]),
            Self::Measure(m) => Some(m.tensor()),
            Self::Depolarizer(p) => Some(depolarizer(*p)),
            Self::Intermediate => None,
            _ => self.unitary().map(|u| superoperator(&u)),
        }
    }
}

fn controlled_phase(angle: f64) -> nd::Array2<C64> {
    let mut u: nd::Array2<C64> = nd::Array2::eye(4);
    u[[3, 3]] = C64::cis(angle);
    u
}

// ρ → (1 - p) ρ + (p / 3) (XρX + YρY + ZρZ)
fn depolarizer(p: f64) -> Vec<C64> {
    let mut t = vec![c!(0.0); 16];
    t[0] = c!(1.0 - 2.0 * p / 3.0);
    t[15] = c!(1.0 - 2.0 * p / 3.0);
    t[5] = c!(1.0 - 4.0 * p / 3.0);
    t[10] = c!(1.0 - 4.0 * p / 3.0);
    t[3] = c!(2.0 * p / 3.0);
    t[12] = c!(2.0 * p / 3.0);
    t
}

/// Build the `U ⊗ U*` superoperator tensor of a 2<sup>*n*</sup> ×
/// 2<sup>*n*</sup> unitary as a flat array of 4<sup>2*n*</sup> values.
pub fn superoperator(u: &nd::Array2<C64>) -> Vec<C64> {
    let n = u.nrows().trailing_zeros() as usize;
    let rank = 2 * n;
    (0..1_usize << (2 * rank))
        .map(|flat| {
            let (mut p, mut q, mut r, mut s) = (0, 0, 0, 0);
            for leg in 0..rank {
                let digit = (flat >> (2 * leg)) & 3;
                let (ket, bra) = (digit >> 1, digit & 1);
                let shift = n - 1 - leg % n;
                if leg < n {
                    p |= ket << shift;
                    q |= bra << shift;
                } else {
                    r |= ket << shift;
                    s |= bra << shift;
                }
            }
            u[[r, p]] * u[[s, q]].conj()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: C64, b: C64) -> bool { (a - b).norm() < 1e-9 }

    fn at(t: &[C64], idx: &[usize]) -> C64 {
        t[idx.iter().rev().fold(0, |acc, k| 4 * acc + k)]
    }

    #[test]
    fn hadamard() {
        let t = GateKind::H.tensor().unwrap();
        assert_eq!(t.len(), 16);
        assert!(close(at(&t, &[0, 0]), c!(0.5)));
        assert!(close(at(&t, &[0, 3]), c!(0.5)));
        assert!(close(at(&t, &[1, 2]), c!(0.5)));
        assert!(close(at(&t, &[1, 1]), c!(-0.5)));
        assert!(close(at(&t, &[3, 0]), c!(0.5)));
        assert!(close(at(&t, &[3, 3]), c!(0.5)));
        assert!(close(at(&t, &[1, 0]), c!(0.5)));
        assert!(close(at(&t, &[2, 3]), c!(-0.5)));
    }

    #[test]
    fn rotations() {
        let a = 0.3;
        let (s, co) = (a / 2.0_f64).sin_cos();
        let ry = GateKind::Ry(a).tensor().unwrap();
        assert!(close(at(&ry, &[0, 0]), c!(co * co)));
        assert!(close(at(&ry, &[0, 3]), c!(s * s)));
        assert!(close(at(&ry, &[1, 2]), c!(-s * s)));
        assert!(close(at(&ry, &[2, 0]), c!(-s * co)));
        let rx = GateKind::Rx(a).tensor().unwrap();
        assert!(close(at(&rx, &[1, 2]), c!(s * s)));
        assert!(close(at(&rx, &[0, 3]), c!(s * s)));
        assert!(close(at(&rx, &[0, 1]), c!(0.0, co * s)));
        let rz = GateKind::Rz(a).tensor().unwrap();
        assert!(close(at(&rz, &[1, 1]), C64::cis(-a)));
        assert!(close(at(&rz, &[2, 2]), C64::cis(a)));
        assert!(close(at(&rz, &[0, 0]), c!(1.0)));
        let ph = GateKind::Phase(a).tensor().unwrap();
        assert!(close(at(&ph, &[1, 1]), C64::cis(-a)));
        assert!(close(at(&ph, &[3, 3]), c!(1.0)));
    }

    #[test]
    fn two_qubit() {
        let cnot = GateKind::Cnot.tensor().unwrap();
        assert_eq!(cnot.len(), 256);
        assert!(close(at(&cnot, &[1, 0, 1, 1]), c!(1.0)));
        assert!(close(at(&cnot, &[3, 0, 3, 3]), c!(1.0)));
        assert!(close(at(&cnot, &[0, 1, 0, 1]), c!(1.0)));
        assert!(close(at(&cnot, &[3, 3, 3, 0]), c!(1.0)));
        assert!(close(at(&cnot, &[3, 3, 3, 3]), c!(0.0)));
        let swap = GateKind::Swap.tensor().unwrap();
        assert!(close(at(&swap, &[1, 2, 2, 1]), c!(1.0)));
        assert!(close(at(&swap, &[1, 2, 1, 2]), c!(0.0)));
        let cz = GateKind::Cz.tensor().unwrap();
        assert!(close(at(&cz, &[1, 3, 1, 3]), c!(-1.0)));
        assert!(close(at(&cz, &[1, 0, 1, 0]), c!(1.0)));
        assert!(close(at(&cz, &[1, 1, 1, 1]), c!(-1.0)));
        let k = 2;
        let theta = 2.0 * PI / 2.0_f64.powi(k as i32 + 1);
        let crk = GateKind::CRk(k).tensor().unwrap();
        assert!(close(at(&crk, &[1, 1, 1, 1]), C64::cis(-theta)));
        let cp = GateKind::CPhase(theta).tensor().unwrap();
        assert_eq!(crk.len(), cp.len());
        assert!(crk.iter().zip(cp.iter()).all(|(a, b)| close(*a, *b)));
    }

    #[test]
    fn fixed_tables() {
        assert_eq!(GateKind::InitState.tensor().unwrap()[0], c!(1.0));
        assert_eq!(
            GateKind::Measure(Measurement::Y).tensor().unwrap(),
            vec![c!(0.0), c!(0.0, 1.0), c!(0.0, -1.0), c!(0.0)],
        );
        let d = GateKind::Depolarizer(0.3).tensor().unwrap();
        assert!(close(at(&d, &[0, 0]), c!(0.8)));
        assert!(close(at(&d, &[1, 1]), c!(0.6)));
        assert!(close(at(&d, &[3, 0]), c!(0.2)));
        assert!(close(at(&d, &[0, 3]), c!(0.2)));
        assert!(GateKind::Intermediate.tensor().is_none());
    }

    #[test]
    fn ranks() {
        assert_eq!(GateKind::InitState.rank(),                     1);
        assert_eq!(GateKind::H.rank(),                             2);
        assert_eq!(GateKind::CPhase(0.1).rank(),                   4);
        assert_eq!(GateKind::Measure(Measurement::Trace).rank(),   1);
        assert!(GateKind::Measure(Measurement::One).is_boundary());
        assert!(!GateKind::Swap.is_boundary());
        assert_eq!(Measurement::from_char('q'), Measurement::Trace);
    }
}
