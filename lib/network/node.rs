use num_complex::Complex64 as C64;
use crate::network::{ GateKind, NodeId, QubitId, WireId };

/// A dense tensor with one leg per attached wire.
///
/// Values are stored flat, with leg *i* acting as the base-4 digit of place
/// value 4<sup>*i*</sup>, so that the first wire varies fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) rank: usize,
    pub(crate) values: Vec<C64>,
    pub(crate) wires: Vec<WireId>,
    pub(crate) contracted: bool,
    pub(crate) ready: bool,
    pub(crate) lineage: Option<(NodeId, NodeId)>,
    pub(crate) kind: GateKind,
    pub(crate) label: String,
    pub(crate) qubits: Vec<QubitId>,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        kind: GateKind,
        values: Vec<C64>,
        wires: Vec<WireId>,
        qubits: Vec<QubitId>,
    ) -> Self
    {
        let label = kind.label();
        Self {
            id,
            rank: wires.len(),
            values,
            wires,
            contracted: false,
            ready: true,
            lineage: None,
            kind,
            label,
            qubits,
        }
    }

    /// Get the node's index in its network.
    pub fn id(&self) -> NodeId { self.id }

    /// Get the number of open legs.
    pub fn rank(&self) -> usize { self.rank }

    /// Get the attached wires, in leg order.
    pub fn wires(&self) -> &[WireId] { &self.wires }

    /// Get the flat value array.
    pub fn values(&self) -> &[C64] { &self.values }

    /// Return `true` if the node has been consumed by a contraction.
    pub fn is_contracted(&self) -> bool { self.contracted }

    /// Return `true` if the node's values have been fully computed.
    pub fn is_ready(&self) -> bool { self.ready }

    /// Get the pair of nodes this one was contracted from, if any.
    pub fn lineage(&self) -> Option<(NodeId, NodeId)> { self.lineage }

    /// Get the operation this node represents.
    pub fn kind(&self) -> &GateKind { &self.kind }

    /// Get the display label.
    pub fn label(&self) -> &str { &self.label }

    /// Get the qubit lines the node sits on.
    pub fn qubits(&self) -> &[QubitId] { &self.qubits }

    /// Convert a per-leg index to a flat one. Returns `None` if the number of
    /// digits doesn't match the rank or any digit is out of range.
    pub fn flat_index(&self, idx: &[usize]) -> Option<usize> {
        (idx.len() == self.rank && idx.iter().all(|k| *k < 4))
            .then(|| idx.iter().rev().fold(0, |acc, k| 4 * acc + k))
    }

    /// Read a value by flat index.
    pub fn access(&self, flat: usize) -> Option<C64> {
        self.values.get(flat).copied()
    }

    /// Read a value by per-leg index. A rank-0 node is read with `&[]`.
    pub fn access_at(&self, idx: &[usize]) -> Option<C64> {
        self.flat_index(idx).and_then(|k| self.access(k))
    }

    /// Get a mutable reference to a value by per-leg index.
    pub fn index_mut(&mut self, idx: &[usize]) -> Option<&mut C64> {
        self.flat_index(idx).and_then(|k| self.values.get_mut(k))
    }

    /// Free the value array of a contracted node. Does nothing and returns
    /// `false` if the node is still live.
    pub fn clear_data(&mut self) -> bool {
        if self.contracted {
            self.values = Vec::new();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c;

    fn build_simple() -> Node {
        let values: Vec<C64> = (0..16).map(|k| c!(k as f64)).collect();
        Node::new(7, GateKind::Intermediate, values, vec![2, 5], vec![0])
    }

    #[test]
    fn indexing() {
        let mut n = build_simple();
        assert_eq!(n.rank(),                2        );
        assert_eq!(n.flat_index(&[1, 0]),   Some(1)  );
        assert_eq!(n.flat_index(&[0, 1]),   Some(4)  );
        assert_eq!(n.flat_index(&[3, 2]),   Some(11) );
        assert_eq!(n.flat_index(&[4, 0]),   None     );
        assert_eq!(n.flat_index(&[0]),      None     );
        assert_eq!(n.access_at(&[2, 3]),    Some(c!(14.0)));
        assert_eq!(n.access(16),            None     );
        *n.index_mut(&[2, 3]).unwrap() = c!(0.0, 1.0);
        assert_eq!(n.access(14),            Some(c!(0.0, 1.0)));
    }

    #[test]
    fn scalar_access() {
        let n = Node::new(0, GateKind::Intermediate, vec![c!(0.5)], vec![], vec![]);
        assert_eq!(n.access_at(&[]), Some(c!(0.5)));
    }

    #[test]
    fn clear_only_when_contracted() {
        let mut n = build_simple();
        assert!(!n.clear_data());
        assert_eq!(n.values().len(), 16);
        n.contracted = true;
        assert!(n.clear_data());
        assert!(n.values().is_empty());
    }
}
