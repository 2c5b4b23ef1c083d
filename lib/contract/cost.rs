//! Cost-estimated contraction: score sampled adjacent pairs by looking ahead at
//! their neighborhoods, then contract the best one.

use std::{ cmp::Ordering, thread };
use itertools::Itertools;
use log::{ debug, trace };
use num_complex::Complex64 as C64;
use rand::{ rngs::StdRng, Rng, SeedableRng };
use crate::{
    contract::{ ContractError, ContractResult, ContractionTools, Topology },
    deadline::Deadline,
    network::NodeId,
};

// starting caps on a candidate's resulting rank and shared wire count
const SIMPLE_RANK_CAP: usize = 11;
const SIMPLE_WIRE_CAP: usize = 8;

// starting cap on a candidate's resulting rank for the brute-force samplers
const BRUTE_RANK_CAP: usize = 10;

// commit threshold for the brute-force strategy
const BRUTE_COMMIT: i32 = 15;

// the brute-force search gives up on orders passing through this rank
const BRUTE_MAX_RANK: usize = 17;

// largest neighborhood (merged pair plus ring) searched exhaustively
const BRUTE_MAX_CLUSTER: usize = 31;

// largest number of absorption orders searched for one candidate
const BRUTE_MAX_ORDERS: u64 = 1_000_000;

/// Number of concurrent samplers per brute-force step.
pub const NUM_SAMPLERS: usize = 2;

// a random live node and one of its live neighbors
fn pick_adjacent(topo: &Topology, rng: &mut StdRng) -> Option<(NodeId, NodeId)> {
    if topo.is_empty() { return None; }
    let a = topo.live()[rng.gen_range(0..topo.len())];
    let nbrs = topo.neighbors(a);
    if nbrs.is_empty() { return None; }
    let (b, _) = nbrs[rng.gen_range(0..nbrs.len())];
    Some((a, b))
}

fn same_pair(x: (NodeId, NodeId), y: (NodeId, NodeId)) -> bool {
    x == y || (x.0 == y.1 && x.1 == y.0)
}

fn pow4(e: usize) -> u64 { 4_u64.saturating_pow(e as u32) }

/// Estimate the cost of contracting `a` with `b`.
///
/// With `p_value == 0` this is just the rank of the result. Otherwise the
/// pair is rejected if its result would have rank above `rank_cap` or if it
/// shares more than `wire_cap` wires; an accepted pair costs the number of
/// multiply-adds of its own contraction plus those of `p_value` further
/// absorptions of randomly chosen neighbors of the growing cluster. A
/// neighbor whose absorption would pass `rank_cap + 1` is skipped, and the
/// whole estimate is rejected when too many are skipped in a row.
pub(crate) fn calculate_cost(
    topo: &Topology,
    rng: &mut StdRng,
    p_value: usize,
    a: NodeId,
    b: NodeId,
    rank_cap: usize,
    wire_cap: usize,
) -> Option<u64>
{
    let shared = topo.shared(a, b);
    let merged = topo.merged_rank(a, b)?;
    if p_value == 0 { return Some(merged as u64); }
    if merged > rank_cap || shared > wire_cap { return None; }

    let mut cost = pow4(topo.rank(a)? + topo.rank(b)? - shared);
    let mut rank = merged;
    let mut cluster: Vec<NodeId> = vec![a, b];
    let mut frontier: Vec<NodeId> =
        cluster.iter()
        .flat_map(|n| topo.neighbors(*n).iter().map(|(m, _)| *m))
        .filter(|m| !cluster.contains(m))
        .unique()
        .collect();
    let mut fails: usize = 0;
    let mut step: usize = 0;
    while step < p_value {
        if frontier.is_empty() { break; }
        if fails > 2 * frontier.len() { return None; }
        let k = rng.gen_range(0..frontier.len());
        let n = frontier[k];
        let s: usize = cluster.iter().map(|c| topo.shared(*c, n)).sum();
        let rn = topo.rank(n)?;
        let next = (rank + rn).saturating_sub(2 * s);
        if next > rank_cap + 1 {
            fails += 1;
            continue;
        }
        fails = 0;
        cost = cost.saturating_add(pow4(rank + rn - s));
        rank = next;
        frontier.swap_remove(k);
        cluster.push(n);
        for (m, _) in topo.neighbors(n).iter() {
            if !cluster.contains(m) && !frontier.contains(m) { frontier.push(*m); }
        }
        step += 1;
    }
    Some(cost)
}

/// Score of one candidate pair in the brute-force search.
///
/// Lower is better: first by the peak rank reached while absorbing the pair's
/// neighborhood, then by the number of intermediates at each rank, compared
/// from the highest rank down.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Score {
    pub peak: usize,
    pub hist: [u32; 20],
}

impl Score {
    fn flat(peak: usize) -> Self {
        let mut hist = [0; 20];
        if let Some(h) = hist.get_mut(peak) { *h += 1; }
        Self { peak, hist }
    }

    fn push(&mut self, rank: usize) {
        self.peak = self.peak.max(rank);
        if let Some(h) = self.hist.get_mut(rank) { *h += 1; }
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.peak.cmp(&other.peak)
            .then_with(|| self.hist.iter().rev().cmp(other.hist.iter().rev()))
    }
}

// the merged pair and its first ring of neighbors, as a small dense problem:
// ranks, and wire counts between every two members
struct Cluster {
    ranks: Vec<usize>,
    adj: Vec<Vec<usize>>,
}

impl Cluster {
    fn new(topo: &Topology, a: NodeId, b: NodeId) -> Option<Self> {
        let ring: Vec<NodeId> =
            [a, b].iter()
            .flat_map(|n| topo.neighbors(*n).iter().map(|(m, _)| *m))
            .filter(|m| *m != a && *m != b)
            .unique()
            .collect();
        let mut ranks: Vec<usize> = vec![topo.merged_rank(a, b)?];
        for n in ring.iter() { ranks.push(topo.rank(*n)?); }
        let k = ranks.len();
        let mut adj: Vec<Vec<usize>> = vec![vec![0; k]; k];
        for (i, n) in ring.iter().enumerate() {
            let s = topo.shared(a, *n) + topo.shared(b, *n);
            adj[0][i + 1] = s;
            adj[i + 1][0] = s;
            for (j, m) in ring.iter().enumerate().skip(i + 1) {
                let s = topo.shared(*n, *m);
                adj[i + 1][j + 1] = s;
                adj[j + 1][i + 1] = s;
            }
        }
        Some(Self { ranks, adj })
    }

    fn len(&self) -> usize { self.ranks.len() }

    // number of orders merging the cluster down to two members
    fn num_orders(&self) -> u64 {
        (3..=self.len() as u64)
            .map(|j| j * (j - 1) / 2)
            .fold(1_u64, |acc, c| acc.saturating_mul(c))
    }

    fn merge(&self, x: usize, y: usize) -> Self {
        let mut ranks = self.ranks.clone();
        let mut adj = self.adj.clone();
        ranks[x] = ranks[x] + ranks[y] - 2 * adj[x][y];
        for d in 0..adj.len() {
            if d != x && d != y {
                adj[x][d] += adj[y][d];
                adj[d][x] = adj[x][d];
            }
        }
        ranks.remove(y);
        adj.remove(y);
        adj.iter_mut().for_each(|row| { row.remove(y); });
        adj[x][x] = 0;
        Self { ranks, adj }
    }

    // best score over every order of pairwise merges down to two members
    fn search(&self, score: Score, best: &mut Option<Score>, deadline: &Deadline) {
        if deadline.expired() { return; }
        if self.len() <= 2 {
            if best.map_or(true, |b| score < b) { *best = Some(score); }
            return;
        }
        for (x, y) in (0..self.len()).tuple_combinations() {
            if self.adj[x][y] == 0 { continue; }
            let next = self.merge(x, y);
            let rank = next.ranks[x];
            if rank > BRUTE_MAX_RANK { continue; }
            let mut s = score;
            s.push(rank);
            next.search(s, best, deadline);
        }
    }
}

// draw up to `samples` candidates and keep the best-scoring one
fn sample_brute_force(
    topo: &Topology,
    seed: u64,
    samples: usize,
    rank_cap: usize,
    deadline: &Deadline,
) -> Option<(NodeId, NodeId, Score)>
{
    let n = topo.len();
    if n == 2 {
        let (a, b) = (topo.live()[0], topo.live()[1]);
        return Some((a, b, Score::flat(topo.merged_rank(a, b)?)));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<(NodeId, NodeId, Score)> = None;
    let mut taken: usize = 0;
    let mut fails: usize = 0;
    let mut blowups: usize = 0;
    while taken < samples && !deadline.expired() {
        if fails > 10 * n { break; }
        let Some((a, b)) = pick_adjacent(topo, &mut rng) else {
            fails += 1;
            continue;
        };
        let Some(r0) = topo.merged_rank(a, b) else {
            fails += 1;
            continue;
        };
        if r0 > rank_cap {
            fails += 1;
            continue;
        }
        let Some(cluster) = Cluster::new(topo, a, b) else {
            fails += 1;
            continue;
        };
        if cluster.len() > BRUTE_MAX_CLUSTER || cluster.num_orders() > BRUTE_MAX_ORDERS {
            blowups += 1;
            if blowups > 10 * n {
                return best.or(Some((a, b, Score::flat(r0))));
            }
            continue;
        }
        let mut found: Option<Score> = None;
        cluster.search(Score::flat(r0), &mut found, deadline);
        let score = found.unwrap_or_else(|| Score::flat(r0));
        if best.map_or(true, |(_, _, s)| score < s) {
            best = Some((a, b, score));
        }
        taken += 1;
    }
    best
}

impl<'a> ContractionTools<'a> {
    /// Contract by sampled, cost-scored adjacent pairs.
    ///
    /// Each step samples ⌈log<sub>2</sub> *n*⌉ adjacent pairs among the *n*
    /// live nodes, scores each with [`calculate_cost`], and contracts the
    /// cheapest. Rejected candidates are counted; after more than *n* of them
    /// both caps are raised by one.
    pub fn contract_cost_simple(&mut self, p_value: usize, deadline: Deadline)
        -> ContractResult<Option<C64>>
    {
        let net = self.network();
        let mut rank_cap = SIMPLE_RANK_CAP;
        let mut wire_cap = SIMPLE_WIRE_CAP;
        while !net.is_done() && !deadline.expired() {
            let topo = net.topology();
            let n = topo.len();
            if n < 2 { break; }
            let pair =
                if n == 2 {
                    Some((topo.live()[0], topo.live()[1]))
                } else {
                    let wanted = (n as f64).log2().ceil() as usize;
                    let mut best: Option<((NodeId, NodeId), u64)> = None;
                    let mut taken: usize = 0;
                    let mut fails: usize = 0;
                    while taken < wanted && !deadline.expired() {
                        let Some(pair) = pick_adjacent(&topo, self.rng()) else {
                            continue;
                        };
                        if best.is_some_and(|(p, _)| same_pair(p, pair)) { continue; }
                        let cost = calculate_cost(
                            &topo, self.rng(), p_value, pair.0, pair.1, rank_cap, wire_cap);
                        match cost {
                            Some(c) => {
                                if best.map_or(true, |(_, min)| c < min) {
                                    best = Some((pair, c));
                                }
                                taken += 1;
                            },
                            None => {
                                fails += 1;
                                if fails > n {
                                    rank_cap += 1;
                                    wire_cap += 1;
                                    fails = 0;
                                    trace!(rank_cap = rank_cap; "relaxed cost caps");
                                }
                            },
                        }
                    }
                    best.map(|(p, _)| p)
                };
            let Some((a, b)) = pair else { break; };
            if net.contract_nodes_within(a, b, 1_000_000, &deadline).is_none() {
                return Err(ContractError::ContractionFailure(
                    format!("could not contract chosen pair ({}, {})", a, b)));
            }
            debug!(live = net.num_uncontracted(); "cost-simple step");
        }
        self.finish(&deadline, "cost-based (simple) contraction")
    }

    /// Contract by adjacent pairs scored with an exhaustive local search.
    ///
    /// Each step runs [`NUM_SAMPLERS`] samplers on their own threads. A sampler
    /// draws up to `samples` adjacent pairs whose result stays under a rank cap,
    /// and scores each by trying every order of absorbing the pair's immediate
    /// neighbors, keeping the best [`Score`]. Neighborhoods with too many
    /// orders to search are skipped. The best pair over all samplers is
    /// contracted; if no sampler finds one, the cap is raised by one.
    pub fn contract_cost_brute_force(&mut self, samples: usize, deadline: Deadline)
        -> ContractResult<Option<C64>>
    {
        let net = self.network();
        let samples = samples.max(1);
        let mut rank_cap = BRUTE_RANK_CAP;
        while !net.is_done() && !deadline.expired() {
            let topo = net.topology();
            if topo.len() < 2 { break; }
            let seeds: Vec<u64> = (0..NUM_SAMPLERS).map(|_| self.fork_seed()).collect();
            let topo_ref = &topo;
            let found: Vec<Option<(NodeId, NodeId, Score)>> =
                thread::scope(|s| {
                    let handles: Vec<_> =
                        seeds.into_iter()
                        .map(|seed| s.spawn(move || {
                            sample_brute_force(topo_ref, seed, samples, rank_cap, &deadline)
                        }))
                        .collect();
                    handles.into_iter()
                        .map(|h| h.join())
                        .collect::<Result<Vec<_>, _>>()
                })
                .map_err(|_| ContractError::ContractionFailure(
                    "brute-force sampler panicked".into()))?;
            let Some((a, b, score)) =
                found.into_iter().flatten().min_by(|x, y| x.2.cmp(&y.2))
            else {
                rank_cap += 1;
                trace!(rank_cap = rank_cap; "relaxed brute-force cap");
                continue;
            };
            let threshold = BRUTE_COMMIT.max(rank_cap as i32);
            if net.contract_nodes_within(a, b, threshold, &deadline).is_none() {
                return Err(ContractError::ContractionFailure(
                    format!("could not contract chosen pair ({}, {})", a, b)));
            }
            debug!(
                live = net.num_uncontracted(), peak = score.peak;
                "cost-brute-force step"
            );
        }
        self.finish(&deadline, "cost-based (brute-force) contraction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    fn hist(entries: &[(usize, u32)]) -> [u32; 20] {
        let mut h = [0; 20];
        entries.iter().for_each(|(r, k)| { h[*r] = *k; });
        h
    }

    #[test]
    fn score_order() {
        let low = Score { peak: 4, hist: hist(&[(4, 3), (2, 1)]) };
        let high = Score { peak: 5, hist: hist(&[(5, 1)]) };
        assert!(low < high);
        // same peak: fewer intermediates at the highest differing rank wins
        let a = Score { peak: 6, hist: hist(&[(6, 1), (5, 1), (2, 9)]) };
        let b = Score { peak: 6, hist: hist(&[(6, 1), (5, 2)]) };
        assert!(a < b);
        let mut scores = vec![high, b, low, a];
        scores.sort();
        assert_eq!(scores, vec![low, a, b, high]);
    }

    #[test]
    fn simple_costs() {
        let net = Network::parse("2\nH 0\nCNOT 0 1\n", "00").unwrap();
        let topo = net.topology();
        let mut rng = StdRng::seed_from_u64(0);
        // H (2) into CNOT (4) sharing one wire
        assert_eq!(calculate_cost(&topo, &mut rng, 0, 2, 3, 11, 8), Some(4));
        assert_eq!(calculate_cost(&topo, &mut rng, 0, 0, 1, 11, 8), None);
        assert_eq!(calculate_cost(&topo, &mut rng, 1, 2, 3, 3, 8), None);
        let c = calculate_cost(&topo, &mut rng, 1, 2, 3, 11, 8).unwrap();
        assert!(c > pow4(5));
    }

    #[test]
    fn cluster_search() {
        let net = Network::parse("2\nH 0\nCNOT 0 1\n", "00").unwrap();
        let topo = net.topology();
        let cluster = Cluster::new(&topo, 2, 3).unwrap();
        // merged pair plus init 0, init 1, and both measurements
        assert_eq!(cluster.len(), 5);
        assert_eq!(cluster.ranks[0], 4);
        assert_eq!(cluster.num_orders(), 3 * 6 * 10);
        let mut best: Option<Score> = None;
        cluster.search(Score::flat(4), &mut best, &Deadline::never());
        let best = best.unwrap();
        // absorbing the boundary nodes one at a time only lowers the rank
        assert_eq!(best.peak, 4);
        assert_eq!(best.hist[3], 1);
    }

    #[test]
    fn brute_force_cat() {
        let mut circuit = String::from("6\nH 0\n");
        (0..5).for_each(|q| circuit.push_str(&format!("CNOT {} {}\n", q, q + 1)));
        let net = Network::parse(&circuit, "111111").unwrap();
        let mut tools = ContractionTools::with_seed(&net, 17);
        let v = tools.contract_cost_brute_force(3, Deadline::from_secs(60.0))
            .unwrap().unwrap();
        assert!((v - C64::new(0.5, 0.0)).norm() < 1e-5);
    }
}
