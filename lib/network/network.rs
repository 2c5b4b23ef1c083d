use std::{
    mem,
    path::Path,
    sync::{ Mutex, MutexGuard, PoisonError },
};
use log::{ debug, info };
use num_complex::Complex64 as C64;
use rayon::prelude::*;
use crate::{
    c,
    deadline::Deadline,
    network::{
        GateKind,
        NetworkError,
        NetworkResult,
        Node,
        NodeId,
        QubitId,
        Source,
        Wire,
        WireId,
    },
};
use NetworkError::*;

/// Result rank at or above which the summation is split across the worker
/// pool.
pub const PAR_RANK: usize = 8;

/// Default size of the worker pool.
pub const DEFAULT_THREADS: usize = 2;

// deadline is polled once per this many output entries
const POLL_EVERY: usize = 64;

// everything behind the network lock
#[derive(Clone, Debug)]
pub(crate) struct State {
    pub(crate) nodes: Vec<Node>,
    pub(crate) wires: Vec<Wire>,
    pub(crate) uncontracted: Vec<NodeId>,
    pub(crate) by_line: Vec<Vec<NodeId>>,
    pub(crate) done: bool,
    pub(crate) final_value: Option<C64>,
    pub(crate) partial: C64,
    pub(crate) flops: u64,
    pub(crate) interrupted: bool,
}

impl State {
    pub(crate) fn new(
        nodes: Vec<Node>,
        wires: Vec<Wire>,
        by_line: Vec<Vec<NodeId>>,
    ) -> Self
    {
        let uncontracted: Vec<NodeId> = (0..nodes.len()).collect();
        Self {
            nodes,
            wires,
            uncontracted,
            by_line,
            done: false,
            final_value: None,
            partial: c!(1.0),
            flops: 0,
            interrupted: false,
        }
    }

    pub(crate) fn is_live(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|n| !n.contracted)
    }

    // admission control and the metadata half of a contraction
    fn plan(&mut self, a: NodeId, b: NodeId, threshold: i32) -> Option<Pending> {
        if a == b { return None; }
        let na = self.nodes.get(a)?;
        let nb = self.nodes.get(b)?;
        if na.contracted || nb.contracted || !na.ready || !nb.ready {
            return None;
        }
        let shared: Vec<(usize, usize)> =
            na.wires.iter().enumerate()
            .filter_map(|(ia, wa)| {
                nb.wires.iter().position(|wb| wb == wa).map(|ib| (ia, ib))
            })
            .collect();
        if shared.is_empty() { return None; }
        let rank = na.rank + nb.rank - 2 * shared.len();
        let ceiling = na.rank.max(nb.rank) as i64 + threshold as i64;
        if rank as i64 > ceiling { return None; }

        let open_a: Vec<usize> =
            (0..na.rank).filter(|ia| shared.iter().all(|(x, _)| x != ia)).collect();
        let open_b: Vec<usize> =
            (0..nb.rank).filter(|ib| shared.iter().all(|(_, y)| y != ib)).collect();
        let wires: Vec<WireId> =
            open_a.iter().map(|ia| na.wires[*ia])
            .chain(open_b.iter().map(|ib| nb.wires[*ib]))
            .collect();
        let summed: Vec<WireId> =
            shared.iter().map(|(ia, _)| na.wires[*ia]).collect();
        let mut qubits: Vec<QubitId> =
            na.qubits.iter().chain(nb.qubits.iter()).copied().collect();
        qubits.sort_unstable();
        qubits.dedup();
        let open: Vec<(usize, usize)> =
            open_a.iter().map(|ia| (1 << (2 * ia), 0))
            .chain(open_b.iter().map(|ib| (0, 1 << (2 * ib))))
            .collect();
        let strides: Vec<(usize, usize)> =
            shared.iter().map(|(ia, ib)| (1 << (2 * ia), 1 << (2 * ib))).collect();
        let work = 2 * (na.rank + nb.rank - shared.len()) as u32;
        let flops = 1_u64.checked_shl(work).unwrap_or(u64::MAX);

        let id = self.nodes.len();
        for w in wires.iter() {
            let wire = &mut self.wires[*w];
            wire.rebind(a, id);
            wire.rebind(b, id);
        }
        for w in summed.iter() {
            self.wires[*w].contracted = true;
        }
        let va = {
            let node = &mut self.nodes[a];
            node.contracted = true;
            mem::take(&mut node.values)
        };
        let vb = {
            let node = &mut self.nodes[b];
            node.contracted = true;
            mem::take(&mut node.values)
        };
        let mut node = Node::new(id, GateKind::Intermediate, Vec::new(), wires, qubits);
        node.ready = false;
        node.lineage = Some((a, b));
        node.label = format!("({},{})", a, b);
        self.nodes.push(node);
        self.uncontracted.retain(|n| *n != a);
        if let Some(slot) = self.uncontracted.iter_mut().find(|n| **n == b) {
            *slot = id;
        }
        Some(Pending { id, rank, a: va, b: vb, open, shared: strides, flops })
    }

    fn commit(&mut self, pending: Pending, values: Vec<C64>, complete: bool)
        -> NodeId
    {
        let id = pending.id;
        self.flops = self.flops.saturating_add(pending.flops);
        if !complete {
            self.interrupted = true;
            return id;
        }
        if pending.rank > 0 {
            let node = &mut self.nodes[id];
            node.values = values;
            node.ready = true;
            return id;
        }
        let scalar = values.first().copied().unwrap_or(c!(0.0));
        self.partial *= scalar;
        if self.uncontracted.len() == 1 {
            let value = self.partial;
            let node = &mut self.nodes[id];
            node.values = vec![value];
            node.ready = true;
            self.final_value = Some(value);
            self.done = true;
            debug!(id = id; "network contracted to a scalar");
        } else {
            // a finished connected component; its scalar is folded into the
            // running product
            let node = &mut self.nodes[id];
            node.values = vec![scalar];
            node.ready = true;
            node.contracted = true;
            self.uncontracted.retain(|n| *n != id);
            debug!(id = id; "component contracted to a scalar");
        }
        id
    }
}

// the numeric half of a contraction, computed outside the lock
struct Pending {
    id: NodeId,
    rank: usize,
    a: Vec<C64>,
    b: Vec<C64>,
    open: Vec<(usize, usize)>,
    shared: Vec<(usize, usize)>,
    flops: u64,
}

impl Pending {
    // one output entry: odometer over the summed digits, tracking flat
    // offsets into both inputs
    fn entry(&self, out: usize, digits: &mut [usize]) -> C64 {
        let (mut ja, mut jb) = (0, 0);
        for (j, (sa, sb)) in self.open.iter().enumerate() {
            let d = (out >> (2 * j)) & 3;
            ja += d * sa;
            jb += d * sb;
        }
        digits.iter_mut().for_each(|d| { *d = 0; });
        let mut acc = c!(0.0);
        loop {
            acc += self.a[ja] * self.b[jb];
            let mut k = 0;
            loop {
                if k == self.shared.len() { return acc; }
                let (sa, sb) = self.shared[k];
                digits[k] += 1;
                if digits[k] < 4 {
                    ja += sa;
                    jb += sb;
                    break;
                }
                digits[k] = 0;
                ja -= 3 * sa;
                jb -= 3 * sb;
                k += 1;
            }
        }
    }

    // fill a contiguous block of the output; `false` if the deadline hit
    fn fill(&self, start: usize, out: &mut [C64], deadline: &Deadline) -> bool {
        let mut digits: Vec<usize> = vec![0; self.shared.len()];
        for (k, v) in out.iter_mut().enumerate() {
            if k % POLL_EVERY == 0 && deadline.expired() { return false; }
            *v = self.entry(start + k, &mut digits);
        }
        true
    }
}

fn build_pool(threads: usize) -> NetworkResult<rayon::ThreadPool> {
    if threads == 0 {
        return Err(InvalidFunctionInput("thread count must be positive".into()));
    }
    Ok(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?)
}

/// A tensor network built from a quantum circuit.
///
/// All node and wire state sits behind a single lock so that a `Network` can
/// be shared between contraction worker threads. Contractions hold the lock
/// only while checking admission and rewiring; the summation itself runs
/// unlocked.
#[derive(Debug)]
pub struct Network {
    source: Source,
    pub(crate) state: Mutex<State>,
    pool: rayon::ThreadPool,
    threads: usize,
}

impl Network {
    /// Build a network from a description.
    pub fn from_source(source: Source) -> NetworkResult<Self> {
        let state = source.build()?;
        Ok(Self {
            source,
            state: Mutex::new(state),
            pool: build_pool(DEFAULT_THREADS)?,
            threads: DEFAULT_THREADS,
        })
    }

    /// Build a network from a circuit file and optional measurement file.
    pub fn from_files<P>(circuit: P, measurement: Option<P>) -> NetworkResult<Self>
    where P: AsRef<Path>
    {
        Self::from_source(Source::Files {
            circuit: circuit.as_ref().to_path_buf(),
            measurement: measurement.map(|p| p.as_ref().to_path_buf()),
        })
    }

    /// Build a network from in-memory circuit and measurement text.
    pub fn parse(circuit: &str, measurement: &str) -> NetworkResult<Self> {
        Self::from_source(Source::Text {
            circuit: circuit.to_string(),
            measurement: measurement.to_string(),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> State { self.lock().clone() }

    pub(crate) fn restore(&self, state: State) { *self.lock() = state; }

    /// Rebuild the network from its description, discarding all contraction
    /// progress.
    pub fn reset(&self) -> NetworkResult<()> {
        let state = self.source.build()?;
        *self.lock() = state;
        Ok(())
    }

    /// Replace the network's description and rebuild from it. On failure the
    /// network is left as it was.
    pub fn reset_with(&mut self, source: Source) -> NetworkResult<()> {
        let state = source.build()?;
        *self.lock() = state;
        self.source = source;
        Ok(())
    }

    /// Set the size of the worker pool used for large summations.
    pub fn set_num_threads(&mut self, threads: usize) -> NetworkResult<()> {
        self.pool = build_pool(threads)?;
        self.threads = threads;
        Ok(())
    }

    /// Get the size of the worker pool.
    pub fn num_threads(&self) -> usize { self.threads }

    /// Get the description the network was built from.
    pub fn source(&self) -> &Source { &self.source }

    /// Get the number of qubit lines.
    pub fn num_qubits(&self) -> usize { self.lock().by_line.len() }

    /// Get the number of nodes ever created, contracted or not.
    pub fn num_nodes(&self) -> usize { self.lock().nodes.len() }

    /// Get the number of wires ever created.
    pub fn num_wires(&self) -> usize { self.lock().wires.len() }

    /// Get a copy of a node.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.lock().nodes.get(id).cloned()
    }

    /// Get a copy of a wire.
    pub fn wire(&self, id: WireId) -> Option<Wire> {
        self.lock().wires.get(id).cloned()
    }

    /// Get the rank of a node.
    pub fn rank(&self, id: NodeId) -> Option<usize> {
        self.lock().nodes.get(id).map(|n| n.rank)
    }

    /// Return `true` if the node exists and hasn't been consumed.
    pub fn is_live(&self, id: NodeId) -> bool { self.lock().is_live(id) }

    /// Get the IDs of all nodes not yet consumed by a contraction.
    pub fn uncontracted(&self) -> Vec<NodeId> { self.lock().uncontracted.clone() }

    /// Get the number of nodes not yet consumed by a contraction.
    pub fn num_uncontracted(&self) -> usize { self.lock().uncontracted.len() }

    /// Get the nodes on each qubit line, in circuit order.
    pub fn by_line(&self) -> Vec<Vec<NodeId>> { self.lock().by_line.clone() }

    /// Return `true` once the whole network has been reduced to a scalar.
    pub fn is_done(&self) -> bool { self.lock().done }

    /// Get the final scalar, if the network is done.
    pub fn final_value(&self) -> Option<C64> { self.lock().final_value }

    /// Get the running count of floating-point operations.
    pub fn flops(&self) -> u64 { self.lock().flops }

    /// Return `true` if any summation was abandoned at a deadline.
    pub fn was_interrupted(&self) -> bool { self.lock().interrupted }

    /// Get the `(a, b)` pair of every contraction performed so far, in order.
    pub fn lineages(&self) -> Vec<(NodeId, NodeId)> {
        self.lock().nodes.iter().filter_map(|n| n.lineage).collect()
    }

    /// Contract two nodes sharing at least one wire, with no time limit.
    ///
    /// See [`Self::contract_nodes_within`].
    pub fn contract_nodes(&self, a: NodeId, b: NodeId, threshold: i32)
        -> Option<NodeId>
    {
        self.contract_nodes_within(a, b, threshold, &Deadline::never())
    }

    /// Contract two nodes into a new one, returning the new node's ID.
    ///
    /// Returns `None` without changing anything if the nodes are the same,
    /// either is missing, consumed, or still being computed, they share no
    /// wire, or the resulting rank would exceed `max(rank_a, rank_b) +
    /// threshold`.
    ///
    /// When the result has rank zero, its value is multiplied into the
    /// network's running scalar. If it was the last live node, the network is
    /// done and the node holds the final value; otherwise it is retired
    /// immediately as a finished connected component.
    ///
    /// If `deadline` passes during the summation, the new node is left
    /// incomplete, unusable in further contractions, and the network is
    /// flagged as interrupted.
    pub fn contract_nodes_within(
        &self,
        a: NodeId,
        b: NodeId,
        threshold: i32,
        deadline: &Deadline,
    ) -> Option<NodeId>
    {
        let pending = self.lock().plan(a, b, threshold)?;
        if pending.rank >= PAR_RANK {
            info!(
                a = a, b = b, rank = pending.rank;
                "contracting into a large node"
            );
        }
        let len = 1_usize << (2 * pending.rank);
        let mut values: Vec<C64> = vec![c!(0.0); len];
        let complete =
            if pending.rank >= PAR_RANK {
                let chunk = (len / (4 * self.threads)).max(1);
                self.pool.install(|| {
                    values.par_chunks_mut(chunk)
                        .enumerate()
                        .map(|(k, out)| pending.fill(k * chunk, out, deadline))
                        .reduce(|| true, |x, y| x && y)
                })
            } else {
                pending.fill(0, &mut values, deadline)
            };
        Some(self.lock().commit(pending, values, complete))
    }

    /// Contract nodes in creation order: the first live node with whatever is
    /// on the other end of its first wire.
    pub fn contract_linearly(&self) -> NetworkResult<C64> {
        while !self.is_done() {
            let pair = {
                let state = self.lock();
                state.uncontracted.first()
                    .and_then(|id| state.nodes[*id].wires.first())
                    .and_then(|w| state.wires[*w].ends())
            };
            let (a, b) = pair.ok_or_else(|| InvalidContractionMethod(
                "encountered a wire with an unbound end".into()))?;
            self.contract_nodes(a, b, 1000)
                .ok_or_else(|| InvalidContractionMethod(
                    format!("nodes {} and {} could not be contracted", a, b)))?;
        }
        self.final_value()
            .ok_or_else(|| InvalidTensorNetwork("no final value".into()))
    }

    // swap every occurrence of `old` for `new` in a by-line listing
    fn replace_in(lines: &mut [Vec<NodeId>], old: NodeId, new: NodeId) {
        lines.iter_mut()
            .flat_map(|line| line.iter_mut())
            .filter(|n| **n == old)
            .for_each(|n| { *n = new; });
    }

    /// Simplify the network before contraction.
    ///
    /// First, every single-qubit gate is absorbed into the node before it on
    /// its line (initial states absorbing gates stay initial states). Then
    /// consecutive two-qubit nodes acting on the same pair of lines are merged.
    /// Neither step increases any rank.
    pub fn reduce_circuit(&self) -> NetworkResult<()> {
        let mut lines = self.by_line();
        let mut reduced: Vec<Vec<NodeId>> = vec![Vec::new(); lines.len()];
        for q in 0..lines.len() {
            for k in 0..lines[q].len() {
                let id = lines[q][k];
                if self.rank(id) != Some(2) {
                    reduced[q].push(id);
                    continue;
                }
                let prev = *reduced[q].last()
                    .ok_or_else(|| InvalidTensorNetwork(
                        format!("gate {} has no predecessor on line {}", id, q)))?;
                let merged = self.contract_nodes(prev, id, 0)
                    .ok_or_else(|| InvalidTensorNetwork(
                        format!("could not absorb gate {} into node {}", id, prev)))?;
                {
                    let mut state = self.lock();
                    if state.nodes[prev].kind == GateKind::InitState {
                        let node = &mut state.nodes[merged];
                        node.kind = GateKind::InitState;
                        node.label = "|0><0| (reduced)".into();
                    }
                }
                Self::replace_in(&mut lines, prev, merged);
                Self::replace_in(&mut reduced, prev, merged);
            }
        }

        // merge runs of two-qubit nodes on the same pair of lines
        loop {
            let mut found: Option<(NodeId, NodeId)> = None;
            'search: for line in reduced.iter() {
                for w in line.windows(2) {
                    let (x, y) = (w[0], w[1]);
                    let (Some(nx), Some(ny)) = (self.node(x), self.node(y)) else {
                        continue;
                    };
                    let same_lines = {
                        let (mut qx, mut qy) = (nx.qubits.clone(), ny.qubits.clone());
                        qx.sort_unstable();
                        qy.sort_unstable();
                        qx == qy
                    };
                    if nx.rank != 4 || ny.rank != 4 || !same_lines || nx.qubits.len() != 2 {
                        continue;
                    }
                    let adjacent = nx.qubits.iter().all(|q| {
                        reduced[*q].windows(2).any(|v| v[0] == x && v[1] == y)
                    });
                    if adjacent {
                        found = Some((x, y));
                        break 'search;
                    }
                }
            }
            let Some((x, y)) = found else { break; };
            let merged = self.contract_nodes(x, y, 0)
                .ok_or_else(|| InvalidTensorNetwork(
                    format!("could not merge two-qubit nodes {} and {}", x, y)))?;
            reduced.iter_mut().for_each(|line| line.retain(|n| *n != y));
            Self::replace_in(&mut reduced, x, merged);
        }
        debug!(live = self.num_uncontracted(); "reduced circuit");
        self.lock().by_line = reduced;
        Ok(())
    }

    /// Check that every live node has one wire per leg, that every wire of a
    /// live node points back at it, and that every finished node holds
    /// 4<sup>rank</sup> values. A done network must have exactly one live
    /// node holding one value.
    pub fn check_invariants(&self) -> NetworkResult<()> {
        let state = self.lock();
        for id in state.uncontracted.iter() {
            let node = &state.nodes[*id];
            if node.wires.len() != node.rank {
                return Err(NumWiresVsNodeRank(*id, node.wires.len(), node.rank));
            }
            if node.ready && node.values.len() != 1 << (2 * node.rank) {
                return Err(InvalidTensorNetwork(format!(
                    "node {} holds {} values at rank {}",
                    id, node.values.len(), node.rank,
                )));
            }
            if let Some(w) = node.wires.iter().find(|w| !state.wires[**w].touches(*id)) {
                return Err(InvalidTensorNetwork(
                    format!("wire {} does not point back at node {}", w, id)));
            }
        }
        if state.done {
            let terminal = state.uncontracted.len() == 1
                && state.nodes[state.uncontracted[0]].values.len() == 1;
            if !terminal {
                return Err(InvalidTensorNetwork(
                    "done network does not hold a single scalar".into()));
            }
        }
        Ok(())
    }
}
