use std::{ fs, path::Path };
use log::{ debug, warn };
use num_complex::Complex64 as C64;
use rustc_hash::FxHashMap;
use crate::{
    contract::{ ContractError, ContractResult, ContractionTools },
    deadline::Deadline,
    network::{ NetworkError, NodeId },
};
use ContractError::*;

// admission threshold when replaying a sequence read from a file
const USER_THRESHOLD: i32 = 10_000;

// admission threshold when replaying a sequence found by search
const GIVEN_THRESHOLD: i32 = 100;

/// Parse a contraction sequence: one pair of whitespace-separated node IDs
/// per line, each less than `num_nodes`. Blank lines are skipped.
pub fn parse_sequence(text: &str, num_nodes: usize)
    -> ContractResult<Vec<(NodeId, NodeId)>>
{
    let parse_id = |tok: Option<&str>, line: usize| -> ContractResult<NodeId> {
        let tok = tok.ok_or_else(|| InvalidFileFormat(
            format!("line {}: expected two node IDs", line)))?;
        let id: NodeId = tok.parse()
            .map_err(|_| InvalidFileFormat(
                format!("line {}: invalid node ID '{}'", line, tok)))?;
        if id >= num_nodes {
            return Err(InvalidFileFormat(
                format!("line {}: node ID {} out of range", line, id)));
        }
        Ok(id)
    };
    text.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(k, l)| {
            let mut toks = l.split_whitespace();
            let a = parse_id(toks.next(), k + 1)?;
            let b = parse_id(toks.next(), k + 1)?;
            if let Some(extra) = toks.next() {
                return Err(InvalidFileFormat(
                    format!("line {}: unexpected token '{}' after node IDs", k + 1, extra)));
            }
            Ok((a, b))
        })
        .collect()
}

// follow the chain of contractions a node has been absorbed into
fn resolve(forward: &FxHashMap<NodeId, NodeId>, mut id: NodeId) -> NodeId {
    while let Some(next) = forward.get(&id) { id = *next; }
    id
}

impl<'a> ContractionTools<'a> {
    /// Contract pairs of nodes in the order listed in a file.
    ///
    /// IDs refer to the nodes present when contraction begins; once a node
    /// has been contracted, its ID stands for whatever node absorbed it. Pairs
    /// that resolve to the same node or to a node that is no longer live are
    /// skipped.
    pub fn contract_user_defined<P>(&mut self, path: P, deadline: Deadline)
        -> ContractResult<Option<C64>>
    where P: AsRef<Path>
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| NetworkError::InvalidFile(
                format!("{}: {}", path.display(), e)))?;
        let net = self.network();
        let pairs = parse_sequence(&text, net.num_nodes())?;
        debug!(steps = pairs.len(); "replaying user-defined sequence");
        let mut forward: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        for (a, b) in pairs.into_iter() {
            if deadline.expired() { break; }
            let (x, y) = (resolve(&forward, a), resolve(&forward, b));
            if x == y || !net.is_live(x) || !net.is_live(y) { continue; }
            match net.contract_nodes_within(x, y, USER_THRESHOLD, &deadline) {
                Some(c) => {
                    forward.insert(x, c);
                    forward.insert(y, c);
                },
                None => { warn!(a = a, b = b; "skipping pair that could not be contracted"); },
            }
        }
        if let Some(value) = net.final_value() { return Ok(Some(value)); }
        if deadline.expired() || net.was_interrupted() { return Ok(None); }
        Err(InvalidUserContractionSequence(
            format!("{} live node(s) remain", net.num_uncontracted())))
    }

    /// Contract pairs of node IDs exactly as given, e.g. as returned by
    /// [`preprocess`][Self::preprocess].
    pub fn contract_given_sequence(
        &mut self,
        sequence: &[(NodeId, NodeId)],
        deadline: Deadline,
    ) -> ContractResult<Option<C64>>
    {
        let net = self.network();
        for (a, b) in sequence.iter() {
            if deadline.expired() { break; }
            net.contract_nodes_within(*a, *b, GIVEN_THRESHOLD, &deadline);
        }
        self.finish(&deadline, "given sequence")
    }
}
