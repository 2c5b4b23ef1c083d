//! Strategies for choosing the order in which a network is contracted.
//!
//! Every strategy repeatedly picks a pair of live nodes and hands it to
//! [`Network::contract_nodes_within`], whose admission threshold bounds how
//! much the result may grow. Rejections are counted, and a strategy relaxes its
//! threshold once the count passes a budget that scales with the number of
//! live nodes. All strategies run against a [`Deadline`]: when it expires they
//! return `Ok(None)` and leave the network partially contracted.
//!
//! Since the final scalar doesn't depend on the order of contraction, every
//! strategy gives the same value up to rounding.

use std::{ path::PathBuf, time::Duration };
use num_complex::Complex64 as C64;
use rand::{ rngs::StdRng, Rng, SeedableRng };
use thiserror::Error;
use crate::{
    deadline::Deadline,
    network::{ Network, NetworkError, NodeId },
};

/// Errors for fallible contraction strategies.
#[derive(Debug, Error)]
pub enum ContractError {
    /// Returned when a strategy stops with the network incomplete before its
    /// deadline.
    #[error("contraction failure: {0}")]
    ContractionFailure(String),

    /// Returned when a user-defined sequence ends with the network
    /// incomplete.
    #[error("user-defined contraction sequence did not contract the network: {0}")]
    InvalidUserContractionSequence(String),

    /// Returned when the external ordering solver produced no usable output.
    #[error("QuickBB failure: {0}; use the simple-stoch contraction method instead")]
    QbbFailure(String),

    /// Returned when a sequence or solver file cannot be parsed.
    #[error("invalid file format: {0}")]
    InvalidFileFormat(String),

    /// Error from the underlying network.
    #[error("{0}")]
    Network(#[from] NetworkError),

    /// I/O error when reading or writing a file.
    #[error("{0}")]
    IOError(#[from] std::io::Error),
}
pub type ContractResult<T> = Result<T, ContractError>;

pub mod topology;
pub use topology::Topology;

pub(crate) mod stochastic;

pub(crate) mod cost;

pub(crate) mod edges;

pub(crate) mod sequence;

pub mod linegraph;
pub use linegraph::{ Arch, LineGraph };

/// A contraction ordering strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Random pairs within two parallel chunks, then over all leftovers.
    Stochastic,
    /// Sampled adjacent pairs scored by a `p_value`-hop neighbor lookahead.
    CostSimple { p_value: usize },
    /// Sampled adjacent pairs scored by every order of absorbing their
    /// neighborhood; `samples` candidates per sampler per step.
    CostBruteForce { samples: usize },
    /// Sweep inward from initial states and measurements.
    FromEdges,
    /// Replay node pairs read from a file.
    UserDefined(PathBuf),
}

/// Drives a [`Network`] to a scalar with one of several ordering strategies.
///
/// Randomness comes from a single seeded generator; parallel workers get their
/// own generators seeded from it, so a fixed seed fixes every draw made by a
/// single-threaded strategy.
pub struct ContractionTools<'a> {
    network: &'a Network,
    rng: StdRng,
}

impl<'a> ContractionTools<'a> {
    /// Create a new set of tools seeded from system entropy.
    pub fn new(network: &'a Network) -> Self {
        Self { network, rng: StdRng::from_entropy() }
    }

    /// Create a new set of tools with a fixed seed.
    pub fn with_seed(network: &'a Network, seed: u64) -> Self {
        Self { network, rng: StdRng::seed_from_u64(seed) }
    }

    /// Get the network being contracted.
    pub fn network(&self) -> &'a Network { self.network }

    pub(crate) fn fork_seed(&mut self) -> u64 { self.rng.gen() }

    pub(crate) fn rng(&mut self) -> &mut StdRng { &mut self.rng }

    /// Run a strategy.
    pub fn contract(&mut self, strategy: &Strategy, deadline: Deadline)
        -> ContractResult<Option<C64>>
    {
        match strategy {
            Strategy::Stochastic
                => self.contract_stochastic(deadline),
            Strategy::CostSimple { p_value }
                => self.contract_cost_simple(*p_value, deadline),
            Strategy::CostBruteForce { samples }
                => self.contract_cost_brute_force(*samples, deadline),
            Strategy::FromEdges
                => self.contract_from_edges(deadline),
            Strategy::UserDefined(path)
                => self.contract_user_defined(path, deadline),
        }
    }

    // common exit: the value if done, nothing if time ran out, else an error
    pub(crate) fn finish(&self, deadline: &Deadline, what: &str)
        -> ContractResult<Option<C64>>
    {
        if let Some(value) = self.network.final_value() {
            return Ok(Some(value));
        }
        if deadline.expired() || self.network.was_interrupted() {
            return Ok(None);
        }
        Err(ContractError::ContractionFailure(
            format!("{} stopped with {} live node(s)", what, self.network.num_uncontracted())
        ))
    }

    /// Search for a contraction sequence with the stochastic strategy.
    ///
    /// The network is snapshotted, then contracted under a fresh `budget` up to
    /// `attempts` times. On the first success, the network is restored and the
    /// `(a, b)` pairs of the successful run are returned, ready for
    /// [`contract_given_sequence`][Self::contract_given_sequence]. Returns
    /// `None` if no attempt finished in time.
    pub fn preprocess(&mut self, budget: Duration, attempts: usize)
        -> ContractResult<Option<Vec<(NodeId, NodeId)>>>
    {
        let snapshot = self.network.snapshot();
        let known = self.network.lineages().len();
        for attempt in 0..attempts {
            self.network.restore(snapshot.clone());
            if self.contract_stochastic(Deadline::new(budget))?.is_some() {
                let pairs: Vec<(NodeId, NodeId)> =
                    self.network.lineages().into_iter().skip(known).collect();
                log::info!(attempt = attempt, steps = pairs.len(); "found a contraction sequence");
                self.network.restore(snapshot);
                return Ok(Some(pairs));
            }
        }
        self.network.restore(snapshot);
        Ok(None)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::c;

    pub(crate) fn approx(a: C64, b: C64) -> bool { (a - b).norm() < 1e-5 }

    pub(crate) const BELL: &str = "2\nH 0\nCNOT 0 1\n";

    pub(crate) fn strategies() -> Vec<Strategy> {
        vec![
            Strategy::Stochastic,
            Strategy::CostSimple { p_value: 0 },
            Strategy::CostSimple { p_value: 2 },
            Strategy::CostBruteForce { samples: 3 },
            Strategy::FromEdges,
        ]
    }

    #[test]
    fn bell_under_every_strategy() {
        for strategy in strategies() {
            for (m, p) in [("00", 0.5), ("11", 0.5), ("01", 0.0), ("10", 0.0)] {
                let net = Network::parse(BELL, m).unwrap();
                let mut tools = ContractionTools::with_seed(&net, 10546);
                let v = tools.contract(&strategy, Deadline::from_secs(60.0))
                    .unwrap().unwrap();
                assert!(approx(v, c!(p)), "{:?} {}: {}", strategy, m, v);
                net.check_invariants().unwrap();
            }
        }
    }

    #[test]
    fn rotation_measurements() {
        for strategy in strategies() {
            for (m, p) in [("X", 0.0998334), ("Y", 0.0), ("Z", 0.995004)] {
                let net = Network::parse("1\nRy 0.1 0\n", m).unwrap();
                let mut tools = ContractionTools::with_seed(&net, 7);
                let v = tools.contract(&strategy, Deadline::from_secs(60.0))
                    .unwrap().unwrap();
                assert!(approx(v, c!(p)), "{:?} {}: {}", strategy, m, v);
            }
        }
    }

    fn cat(n: usize) -> String {
        let mut circuit = format!("{}\nH 0\n", n);
        (0..n - 1).for_each(|q| circuit.push_str(&format!("CNOT {} {}\n", q, q + 1)));
        circuit
    }

    #[test]
    fn cat_states() {
        for n in [8, 100] {
            for (m, p) in [
                ("0".repeat(n), 0.5),
                ("1".repeat(n), 0.5),
                (format!("1{}", "0".repeat(n - 1)), 0.0),
            ] {
                let net = Network::parse(&cat(n), &m).unwrap();
                net.reduce_circuit().unwrap();
                let mut tools = ContractionTools::with_seed(&net, 3);
                let v = tools.contract_stochastic(Deadline::from_secs(120.0))
                    .unwrap().unwrap();
                assert!(approx(v, c!(p)), "{} qubits, {}: {}", n, &m[..4], v);
            }
        }
    }

    #[test]
    fn toffoli() {
        // Toffoli on (0, 1; 2) from H, T, T†, and CNOT, after preparing the
        // input bits with X gates
        let t = std::f64::consts::FRAC_PI_4;
        let body = format!(
            "H 2\nCNOT 1 2\nPhase {m} 2\nCNOT 0 2\nPhase {p} 2\nCNOT 1 2\n\
            Phase {m} 2\nCNOT 0 2\nPhase {p} 1\nPhase {p} 2\nH 2\nCNOT 0 1\n\
            Phase {p} 0\nPhase {m} 1\nCNOT 0 1\n",
            p = t, m = -t,
        );
        for input in 0..8_usize {
            let bits = [input >> 2 & 1, input >> 1 & 1, input & 1];
            let mut circuit = String::from("3\n");
            bits.iter().enumerate()
                .filter(|(_, b)| **b == 1)
                .for_each(|(q, _)| circuit.push_str(&format!("X {}\n", q)));
            circuit.push_str(&body);
            let out = [bits[0], bits[1], bits[2] ^ (bits[0] & bits[1])];
            let m: String = out.iter().map(|b| b.to_string()).collect();
            let net = Network::parse(&circuit, &m).unwrap();
            net.reduce_circuit().unwrap();
            let mut tools = ContractionTools::with_seed(&net, input as u64);
            let v = tools.contract_stochastic(Deadline::from_secs(60.0))
                .unwrap().unwrap();
            assert!(approx(v, c!(1.0)), "input {:?}: {}", bits, v);
        }
    }

    #[test]
    fn teleportation() {
        // teleport Ry(0.7)|0> from qubit 0 to qubit 2; each pair of classical
        // outcomes is corrected with controlled gates
        let theta: f64 = 0.7;
        let prepare = format!("Ry {} 0\nH 1\nCNOT 1 2\nCNOT 0 1\nH 0\n", theta);
        let corrected = format!("{}CNOT 1 2\nCZ 0 2\n", prepare);
        let p1 = (theta / 2.0).sin().powi(2);
        for (m0, m1) in [('0', '0'), ('0', '1'), ('1', '0'), ('1', '1')] {
            for (target, expected) in [('1', p1 / 4.0), ('0', (1.0 - p1) / 4.0)] {
                let m = format!("{}{}{}", m0, m1, target);
                let net = Network::parse(&corrected, &m).unwrap();
                let mut tools = ContractionTools::with_seed(&net, 11);
                let v = tools.contract_stochastic(Deadline::from_secs(60.0))
                    .unwrap().unwrap();
                assert!(approx(v, c!(expected)), "{}: {}", m, v);
            }
        }
        // tracing out the sender leaves the teleported qubit intact
        let net = Network::parse(&corrected, "--1").unwrap();
        let v = net.contract_linearly().unwrap();
        assert!(approx(v, c!(p1)));
    }

    #[test]
    fn custom_hadamard() {
        let path = std::env::temp_dir()
            .join(format!("qtn-custom-h-{}.txt", std::process::id()));
        std::fs::write(&path, "0.707107 0.707107 0.707107 -0.707107").unwrap();
        let circuit = format!("1\ndef1 myH {}\nmyH 0\n", path.display());
        let net = Network::parse(&circuit, "0").unwrap();
        std::fs::remove_file(&path).ok();
        let mut tools = ContractionTools::with_seed(&net, 1);
        let v = tools.contract_stochastic(Deadline::from_secs(60.0)).unwrap().unwrap();
        assert!(approx(v, c!(0.5)));
    }

    #[test]
    fn tiny_deadline() {
        for strategy in strategies() {
            let net = Network::parse(&cat(12), &"0".repeat(12)).unwrap();
            let mut tools = ContractionTools::with_seed(&net, 5);
            let res = tools.contract(&strategy, Deadline::from_secs(0.0)).unwrap();
            assert!(res.is_none(), "{:?}", strategy);
            assert!(!net.is_done());
        }

        let path = std::env::temp_dir()
            .join(format!("qtn-tiny-deadline-{}.txt", std::process::id()));
        std::fs::write(&path, "0 12\n1 13\n").unwrap();
        let net = Network::parse(&cat(12), &"0".repeat(12)).unwrap();
        let mut tools = ContractionTools::with_seed(&net, 5);
        let res = tools.contract_user_defined(&path, Deadline::from_secs(0.0));
        std::fs::remove_file(&path).ok();
        assert!(res.unwrap().is_none());
        assert!(!net.is_done());

        let net = Network::parse(&cat(12), &"0".repeat(12)).unwrap();
        let lg = LineGraph::new(&net);
        let order: Vec<usize> = (1..=lg.num_vertices()).collect();
        assert!(lg.contract_ordering(&order, Deadline::from_secs(0.0)).unwrap().is_none());
        assert!(!net.is_done());
        assert_eq!(net.num_uncontracted(), net.num_nodes());
    }

    #[test]
    fn unconnected_circuits() {
        for strategy in strategies() {
            let net = Network::parse("3\nH 2\nH 1\nH 0\n", "").unwrap();
            let mut tools = ContractionTools::with_seed(&net, 2);
            let v = tools.contract(&strategy, Deadline::from_secs(60.0)).unwrap().unwrap();
            assert!(approx(v, c!(1.0)), "{:?}: {}", strategy, v);
            let net = Network::parse("3\nH 2\nH 0\nCNOT 0 1\n", "110").unwrap();
            let mut tools = ContractionTools::with_seed(&net, 2);
            let v = tools.contract(&strategy, Deadline::from_secs(60.0)).unwrap().unwrap();
            assert!(approx(v, c!(0.25)), "{:?}: {}", strategy, v);
        }
    }

    #[test]
    fn preprocess_then_replay() {
        let circuit = "4\nH 0\nCNOT 0 1\nRx 0.4 2\nCNOT 1 2\nCZ 2 3\nH 3\n";
        let net = Network::parse(circuit, "0Z1X").unwrap();
        let expected = Network::parse(circuit, "0Z1X").unwrap()
            .contract_linearly().unwrap();
        let mut tools = ContractionTools::with_seed(&net, 99);
        let pairs = tools.preprocess(Duration::from_secs(30), 5).unwrap().unwrap();
        assert!(!net.is_done());
        assert_eq!(net.num_uncontracted(), 14);
        let v = tools.contract_given_sequence(&pairs, Deadline::from_secs(60.0))
            .unwrap().unwrap();
        assert!(approx(v, expected));
    }
}
