use crate::network::{ NodeId, QubitId };

/// An edge between two tensor legs.
///
/// Either end may be unset while the network is being built (the output of
/// the last gate on a line waits for its measurement). Both ends are bound
/// once parsing finishes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wire {
    pub(crate) end_a: Option<NodeId>,
    pub(crate) end_b: Option<NodeId>,
    pub(crate) qubit: QubitId,
    pub(crate) contracted: bool,
}

impl Wire {
    pub(crate) fn new(end_a: Option<NodeId>, qubit: QubitId) -> Self {
        Self { end_a, end_b: None, qubit, contracted: false }
    }

    /// Get the first endpoint, if bound.
    pub fn end_a(&self) -> Option<NodeId> { self.end_a }

    /// Get the second endpoint, if bound.
    pub fn end_b(&self) -> Option<NodeId> { self.end_b }

    /// Get the qubit line this wire currently carries.
    pub fn qubit(&self) -> QubitId { self.qubit }

    /// Return `true` if the wire has been summed over.
    pub fn is_contracted(&self) -> bool { self.contracted }

    /// Return `true` if either end is `node`.
    pub fn touches(&self, node: NodeId) -> bool {
        self.end_a == Some(node) || self.end_b == Some(node)
    }

    /// Return both endpoints if both are bound.
    pub fn ends(&self) -> Option<(NodeId, NodeId)> {
        self.end_a.zip(self.end_b)
    }

    /// Given one endpoint, return the other.
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if self.end_a == Some(node) {
            self.end_b
        } else if self.end_b == Some(node) {
            self.end_a
        } else {
            None
        }
    }

    // point whichever end currently names `old` at `new`
    pub(crate) fn rebind(&mut self, old: NodeId, new: NodeId) {
        if self.end_a == Some(old) {
            self.end_a = Some(new);
        } else if self.end_b == Some(old) {
            self.end_b = Some(new);
        }
    }
}
