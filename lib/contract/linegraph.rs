//! Contraction ordered by an external tree-decomposition solver.
//!
//! The *line graph* of a network has one vertex per wire, with an edge between
//! two wires whenever they meet at a node. It is written out in a DIMACS-like
//! CNF format (1-based vertex IDs) for QuickBB, whose minimum-fill elimination
//! ordering of the line graph is then replayed wire by wire.

use std::{
    fs,
    path::{ Path, PathBuf },
    process::Command,
};
use log::{ debug, info, warn };
use num_complex::Complex64 as C64;
use rustc_hash::FxHashSet;
use crate::{
    contract::{ ContractError, ContractResult },
    deadline::Deadline,
    network::{ Network, WireId },
};
use ContractError::*;

/// Marker line preceding the elimination ordering in the solver's output.
pub const ORDERING_MARKER: &str = " The optimal ordering is ";

/// Marker preceding the reported tree-width in the solver's output.
pub const TREEWIDTH_MARKER: &str = " The treewidth of the graph in the file ";

// admission threshold while replaying the solver's ordering
const REPLAY_THRESHOLD: i32 = 100;

/// Which build of the solver executable to run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Arch {
    #[default]
    Bits64,
    Bits32,
}

impl Arch {
    /// Name of the solver executable for this build.
    pub fn executable(&self) -> &'static str {
        match self {
            Self::Bits64 => "quickbb_64",
            Self::Bits32 => "quickbb_32",
        }
    }
}

/// The line graph of a network's live nodes, plus where its solver files go.
#[derive(Debug)]
pub struct LineGraph<'a> {
    network: &'a Network,
    vertices: Vec<WireId>,
    edges: Vec<(usize, usize)>,
    cnf_path: PathBuf,
    out_path: PathBuf,
    stat_path: PathBuf,
}

impl<'a> LineGraph<'a> {
    /// Build the line graph of the network's current live nodes. Vertices are
    /// numbered in the order their wires are first met.
    pub fn new(network: &'a Network) -> Self {
        let (vertices, edges) = {
            let state = network.lock();
            let mut vertices: Vec<WireId> = Vec::new();
            let mut edges: Vec<(usize, usize)> = Vec::new();
            let mut seen: FxHashSet<(usize, usize)> = FxHashSet::default();
            for id in state.uncontracted.iter() {
                let mut here: Vec<usize> = Vec::new();
                for w in state.nodes[*id].wires.iter() {
                    let v =
                        match vertices.iter().position(|x| x == w) {
                            Some(v) => v,
                            None => { vertices.push(*w); vertices.len() - 1 },
                        };
                    for u in here.iter() {
                        let e = ((*u).min(v), (*u).max(v));
                        if e.0 != e.1 && seen.insert(e) { edges.push(e); }
                    }
                    here.push(v);
                }
            }
            (vertices, edges)
        };
        debug!(
            vertices = vertices.len(), edges = edges.len();
            "built line graph"
        );
        Self {
            network,
            vertices,
            edges,
            cnf_path: PathBuf::from("output/lg.cnf"),
            out_path: PathBuf::from("output/qbb.out"),
            stat_path: PathBuf::from("output/qbb-stats.out"),
        }
    }

    /// Set where the CNF file is written.
    pub fn with_cnf_path<P>(mut self, path: P) -> Self
    where P: AsRef<Path>
    {
        self.cnf_path = path.as_ref().to_path_buf();
        self
    }

    /// Set where the solver writes its ordering.
    pub fn with_out_path<P>(mut self, path: P) -> Self
    where P: AsRef<Path>
    {
        self.out_path = path.as_ref().to_path_buf();
        self
    }

    /// Set where the solver writes its statistics.
    pub fn with_stat_path<P>(mut self, path: P) -> Self
    where P: AsRef<Path>
    {
        self.stat_path = path.as_ref().to_path_buf();
        self
    }

    /// Get the number of vertices (wires).
    pub fn num_vertices(&self) -> usize { self.vertices.len() }

    /// Get the number of edges.
    pub fn num_edges(&self) -> usize { self.edges.len() }

    /// Get the wire behind each vertex.
    pub fn vertices(&self) -> &[WireId] { &self.vertices }

    /// Get the edges as pairs of 0-based vertex indices.
    pub fn edges(&self) -> &[(usize, usize)] { &self.edges }

    /// Render the line graph in CNF: a `p cnf <vertices> <edges>` header, then
    /// one `a b 0` line per edge with 1-based vertex IDs.
    pub fn to_cnf(&self) -> String {
        let mut out = format!("p cnf {} {}\n", self.vertices.len(), self.edges.len());
        for (a, b) in self.edges.iter() {
            out.push_str(&format!("{} {} 0\n", a + 1, b + 1));
        }
        out
    }

    /// Write [`to_cnf`][Self::to_cnf] to the configured CNF path, creating its
    /// directory if needed.
    pub fn write_cnf(&self) -> ContractResult<()> {
        if let Some(dir) = self.cnf_path.parent() {
            if !dir.as_os_str().is_empty() { fs::create_dir_all(dir)?; }
        }
        fs::write(&self.cnf_path, self.to_cnf())?;
        Ok(())
    }

    /// Write the CNF file and run the solver on it for `seconds`.
    ///
    /// Any previous solver output is removed first, so a run that produces
    /// nothing is caught when the ordering is read.
    pub fn run_quickbb(&self, seconds: u64, arch: Arch) -> ContractResult<()> {
        self.write_cnf()?;
        if let Some(dir) = self.out_path.parent() {
            if !dir.as_os_str().is_empty() { fs::create_dir_all(dir)?; }
        }
        if self.out_path.exists() { fs::remove_file(&self.out_path)?; }
        info!(
            solver = arch.executable(), seconds = seconds;
            "running tree-decomposition solver"
        );
        let status =
            Command::new(arch.executable())
            .arg("--min-fill-ordering")
            .arg("--lb")
            .arg("--time").arg(seconds.to_string())
            .arg("--outfile").arg(&self.out_path)
            .arg("--statfile").arg(&self.stat_path)
            .arg("--cnffile").arg(&self.cnf_path)
            .status()
            .map_err(|e| QbbFailure(
                format!("could not run {}: {}", arch.executable(), e)))?;
        if !status.success() {
            warn!(status = status.to_string(); "solver exited unsuccessfully");
        }
        Ok(())
    }

    /// Read the elimination ordering (1-based vertex IDs) from the solver's
    /// output file.
    pub fn read_ordering(&self) -> ContractResult<Vec<usize>> {
        let text = fs::read_to_string(&self.out_path)
            .map_err(|e| QbbFailure(
                format!("could not read {}: {}", self.out_path.display(), e)))?;
        parse_ordering(&text, self.vertices.len())
    }

    /// Read the tree-width reported in the solver's output file.
    pub fn treewidth(&self) -> ContractResult<usize> {
        let text = fs::read_to_string(&self.out_path)
            .map_err(|e| QbbFailure(
                format!("could not read {}: {}", self.out_path.display(), e)))?;
        parse_treewidth(&text)
            .ok_or_else(|| QbbFailure("no tree-width in solver output".into()))
    }

    /// Contract the network along an elimination ordering: for each vertex in
    /// turn, contract the two nodes its wire joins, unless the wire was
    /// already summed over by an earlier contraction.
    ///
    /// Fails unless exactly one live node holding one value is left.
    pub fn contract_ordering(&self, order: &[usize], deadline: Deadline)
        -> ContractResult<Option<C64>>
    {
        let net = self.network;
        for k in order.iter() {
            if deadline.expired() { break; }
            let Some(w) = k.checked_sub(1).and_then(|v| self.vertices.get(v)) else {
                return Err(InvalidFileFormat(format!("vertex {} out of range", k)));
            };
            let Some(wire) = net.wire(*w) else { continue; };
            if wire.is_contracted() { continue; }
            let Some((a, b)) = wire.ends() else { continue; };
            net.contract_nodes_within(a, b, REPLAY_THRESHOLD, &deadline);
        }
        if let Some(value) = net.final_value() {
            return Ok(Some(value));
        }
        if deadline.expired() || net.was_interrupted() {
            return Ok(None);
        }
        let live = net.num_uncontracted();
        if live != 1 {
            return Err(ContractionFailure(
                format!("{} live nodes remain after replaying the ordering", live)));
        }
        Err(ContractionFailure("final node holds more than one value".into()))
    }

    /// Read the solver's ordering and contract along it.
    pub fn contract(&self, deadline: Deadline) -> ContractResult<Option<C64>> {
        let order = self.read_ordering()?;
        self.contract_ordering(&order, deadline)
    }
}

/// Extract the elimination ordering from solver output: the IDs following
/// [`ORDERING_MARKER`], on the same line or the next one.
pub fn parse_ordering(text: &str, num_vertices: usize) -> ContractResult<Vec<usize>> {
    let marker = ORDERING_MARKER.trim();
    let mut lines = text.lines();
    let rest =
        loop {
            let Some(line) = lines.next() else {
                return Err(QbbFailure("no ordering in solver output".into()));
            };
            if let Some(k) = line.find(marker) {
                let rest = line[k + marker.len()..].trim();
                if !rest.is_empty() { break rest; }
                break lines.next().unwrap_or("");
            }
        };
    let order: Vec<usize> =
        rest.split_whitespace()
        .map(|tok| {
            tok.parse::<usize>().ok()
                .filter(|v| (1..=num_vertices).contains(v))
                .ok_or_else(|| InvalidFileFormat(
                    format!("invalid vertex '{}' in solver ordering", tok)))
        })
        .collect::<ContractResult<_>>()?;
    if order.is_empty() && num_vertices > 0 {
        return Err(QbbFailure("empty ordering in solver output".into()));
    }
    Ok(order)
}

/// Extract the tree-width from solver output: the third token after
/// [`TREEWIDTH_MARKER`] (the first two being the file name and "is").
pub fn parse_treewidth(text: &str) -> Option<usize> {
    text.lines()
        .find_map(|line| {
            line.find(TREEWIDTH_MARKER)
                .map(|k| &line[k + TREEWIDTH_MARKER.len()..])
        })
        .and_then(|rest| rest.split_whitespace().nth(2))
        .and_then(|tok| tok.parse().ok())
}
