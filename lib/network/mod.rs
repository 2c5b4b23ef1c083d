//! Tensor networks built from quantum circuits.
//!
//! A circuit on *n* qubits becomes a network of density-operator tensors:
//! one rank-1 initial state per qubit, one rank-2 (single-qubit) or rank-4
//! (two-qubit) superoperator per gate, and one rank-1 measurement or trace
//! per qubit. Every tensor leg ranges over four values, the entries of a
//! single-qubit density matrix. Contracting the whole network yields the
//! expectation value of the measurement.
//!
//! Nodes and wires live in index arenas owned by a [`Network`]; wires refer to
//! their endpoints by [`NodeId`] and nodes refer to their legs by [`WireId`].

use thiserror::Error;

/// Errors for fallible operations on tensor networks.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Returned when a circuit, measurement, or gate file cannot be opened.
    #[error("invalid input or output file: {0}")]
    InvalidFile(String),

    /// Returned when a file's contents cannot be parsed.
    #[error("invalid file format: {0}")]
    InvalidFileFormat(String),

    /// Returned when a description does not give a usable network.
    #[error("invalid tensor network: {0}")]
    InvalidTensorNetwork(String),

    /// Returned when a function is passed an argument it cannot use.
    #[error("invalid function input: {0}")]
    InvalidFunctionInput(String),

    /// Returned when a node's wire count disagrees with its rank.
    #[error("node {0} has {1} wire(s) but rank {2}")]
    NumWiresVsNodeRank(NodeId, usize, usize),

    /// Returned when a contraction method cannot be applied to the network.
    #[error("invalid contraction method: {0}")]
    InvalidContractionMethod(String),

    /// Returned when a graphviz graph cannot be assembled.
    #[error("graphviz error: {0}")]
    Graphviz(String),

    /// Returned when the worker pool cannot be built.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// I/O error when reading or writing a file.
    #[error("{0}")]
    IOError(#[from] std::io::Error),
}
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Index of a node in its network's arena.
pub type NodeId = usize;

/// Index of a wire in its network's arena.
pub type WireId = usize;

/// Index of a qubit line.
pub type QubitId = usize;

pub(crate) mod node;
pub use node::*;

pub(crate) mod wire;
pub use wire::*;

pub mod gate;
pub use gate::{ GateKind, Measurement };

pub(crate) mod parse;
pub use parse::Source;

pub(crate) mod network;
pub use network::*;

pub(crate) mod export;
