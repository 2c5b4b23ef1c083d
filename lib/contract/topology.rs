//! Point-in-time adjacency of a network's live nodes.

use rustc_hash::FxHashMap;
use crate::network::{ Network, NodeId };

/// A snapshot of which live nodes share wires, and how many.
///
/// Strategies that score candidate pairs before contracting work on a
/// `Topology` rather than the locked network, so that scoring needs no lock.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    live: Vec<NodeId>,
    ranks: FxHashMap<NodeId, usize>,
    adj: FxHashMap<NodeId, Vec<(NodeId, usize)>>,
}

impl Network {
    /// Take a snapshot of the live nodes and their connections.
    pub fn topology(&self) -> Topology {
        let state = self.lock();
        let live = state.uncontracted.clone();
        let mut ranks: FxHashMap<NodeId, usize> = FxHashMap::default();
        let mut adj: FxHashMap<NodeId, Vec<(NodeId, usize)>> = FxHashMap::default();
        for id in live.iter() {
            let node = &state.nodes[*id];
            ranks.insert(*id, node.rank);
            let mut neighbors: Vec<(NodeId, usize)> = Vec::new();
            for w in node.wires.iter() {
                let Some(other) = state.wires[*w].other_end(*id) else { continue; };
                if !state.is_live(other) { continue; }
                match neighbors.iter_mut().find(|(n, _)| *n == other) {
                    Some((_, count)) => { *count += 1; },
                    None => { neighbors.push((other, 1)); },
                }
            }
            neighbors.sort_unstable();
            adj.insert(*id, neighbors);
        }
        Topology { live, ranks, adj }
    }
}

impl Topology {
    /// Get the live nodes, in network order.
    pub fn live(&self) -> &[NodeId] { &self.live }

    /// Get the number of live nodes.
    pub fn len(&self) -> usize { self.live.len() }

    /// Return `true` if there are no live nodes.
    pub fn is_empty(&self) -> bool { self.live.is_empty() }

    /// Get the rank of a live node.
    pub fn rank(&self, id: NodeId) -> Option<usize> { self.ranks.get(&id).copied() }

    /// Get the live neighbors of a node with the number of wires shared with
    /// each, sorted by ID.
    pub fn neighbors(&self, id: NodeId) -> &[(NodeId, usize)] {
        self.adj.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Get the number of wires two nodes share.
    pub fn shared(&self, a: NodeId, b: NodeId) -> usize {
        self.neighbors(a).iter()
            .find(|(n, _)| *n == b)
            .map(|(_, k)| *k)
            .unwrap_or(0)
    }

    /// Rank of the node that contracting `a` and `b` would produce, if they
    /// are adjacent.
    pub fn merged_rank(&self, a: NodeId, b: NodeId) -> Option<usize> {
        let s = self.shared(a, b);
        if s == 0 || a == b { return None; }
        Some(self.rank(a)? + self.rank(b)? - 2 * s)
    }
}

#[cfg(test)]
mod tests {
    use crate::network::Network;

    #[test]
    fn bell_topology() {
        let net = Network::parse("2\nH 0\nCNOT 0 1\n", "00").unwrap();
        let topo = net.topology();
        assert_eq!(topo.len(),                 6);
        assert_eq!(topo.neighbors(3),          &[(1, 1), (2, 1), (4, 1), (5, 1)]);
        assert_eq!(topo.shared(0, 2),          1);
        assert_eq!(topo.shared(0, 1),          0);
        assert_eq!(topo.merged_rank(2, 3),     Some(4));
        assert_eq!(topo.merged_rank(0, 1),     None);
        net.contract_nodes(2, 3, 0).unwrap();
        let topo = net.topology();
        assert_eq!(topo.len(),                 5);
        assert_eq!(topo.rank(2),               None);
        assert_eq!(topo.neighbors(6),          &[(0, 1), (1, 1), (4, 1), (5, 1)]);
    }
}
