//! Quantum circuit simulation by tensor network contraction.
//!
//! A circuit is turned into a network of density-operator tensors, which is
//! then contracted pair by pair down to a single scalar: the expectation value
//! of the measurement applied at the end of the circuit. The cost of a
//! contraction grows exponentially with the ranks of the tensors involved, so
//! the order in which pairs are contracted is everything.
//!
//! - [`network`] builds networks from circuit descriptions and performs
//! individual pairwise contractions.
//! - [`contract`] provides the ordering strategies, from random pairing to
//! cost-scored search and externally computed tree decompositions.
//! - [`config`] reads run settings for the `qtn` executable.
//!
//! # Example
//! ```
//! use qtn::{ c, contract::ContractionTools, deadline::Deadline, network::Network };
//!
//! // a Bell pair, projected onto |00>
//! let net = Network::parse("2\nH 0\nCNOT 0 1\n", "00").unwrap();
//! let mut tools = ContractionTools::with_seed(&net, 0);
//! let p = tools.contract_stochastic(Deadline::from_secs(10.0)).unwrap().unwrap();
//! assert!((p - c!(0.5)).norm() < 1e-9);
//! ```
//!
//! # Further reading
//! - I. L. Markov and Y. Shi, "Simulating quantum computation by contracting
//! tensor networks." [arXiv:quant-ph/0511069](https://arxiv.org/abs/quant-ph/0511069)
//! - E. S. Fried *et al.*, "qTorch: The quantum tensor contraction handler."
//! [arXiv:1709.03636](https://arxiv.org/abs/1709.03636)
//!

pub mod deadline;
pub mod network;
pub mod contract;
pub mod config;
pub(crate) mod vizdefs;

pub extern crate num_complex;
/// Handy macro to create `num_complex::Complex64`s from more natural and
/// succinct syntax.
///
/// ```
/// use std::f64::consts::PI;
/// use num_complex::Complex64;
/// use qtn::c;
///
/// assert_eq!( c!(i (-1.0)),    Complex64::new(0.0, -1.0)      );
/// assert_eq!( c!(e PI),        Complex64::cis(PI)             );
/// assert_eq!( c!(1.0),         Complex64::new(1.0, 0.0)       );
/// assert_eq!( c!(1.0 + i 1.0), Complex64::new(1.0, 1.0)       );
/// assert_eq!( c!(1.0 - i 1.0), Complex64::new(1.0, -1.0)      );
/// assert_eq!( c!(1.0 + 1.0 i), Complex64::new(1.0, 1.0)       );
/// assert_eq!( c!(1.0 - 1.0 i), Complex64::new(1.0, -1.0)      );
/// assert_eq!( c!(1.0, 1.0),    Complex64::new(1.0, 1.0)       );
/// assert_eq!( c!(1.0, e PI),   Complex64::from_polar(1.0, PI) );
/// ```
#[macro_export]
macro_rules! c {
    ( i $im:expr )
        => { $crate::num_complex::Complex64::new(0.0, $im) };
    ( e $ph:expr )
        => { $crate::num_complex::Complex64::cis($ph) };
    ( $re:expr )
        => { $crate::num_complex::Complex64::new($re, 0.0) };
    ( $re:literal + i $im:literal )
        => { $crate::num_complex::Complex64::new($re, $im) };
    ( $re:literal - i $im:literal )
        => { $crate::num_complex::Complex64::new($re, -$im) };
    ( $re:literal + $im:literal i )
        => { $crate::num_complex::Complex64::new($re, $im) };
    ( $re:literal - $im:literal i )
        => { $crate::num_complex::Complex64::new($re, -$im) };
    ( $r:expr, e $ph:expr )
        => { $crate::num_complex::Complex64::from_polar($r, $ph) };
    ( $re:expr, $im:expr )
        => { $crate::num_complex::Complex64::new($re, $im) };
}
