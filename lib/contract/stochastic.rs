use std::thread;
use log::debug;
use num_complex::Complex64 as C64;
use rand::{ rngs::StdRng, Rng, SeedableRng };
use crate::{
    contract::{ ContractError, ContractResult, ContractionTools },
    deadline::Deadline,
    network::{ Network, NodeId },
};

/// Number of disjoint chunks contracted in parallel before the leftovers are
/// pooled.
pub const NUM_CHUNKS: usize = 2;

// rank growth tolerated inside a chunk
const CHUNK_THRESHOLD: i32 = 1;

// pick two distinct positions in a pool of at least two
pub(crate) fn pick_two(rng: &mut StdRng, len: usize) -> Option<(usize, usize)> {
    let i = rng.gen_range(0..len);
    let j = rng.gen_range(0..len);
    (i != j).then_some((i, j))
}

// drop positions `i` and `j` from the pool, then add the result if it is still
// a live tensor
pub(crate) fn replace_pair(
    net: &Network,
    pool: &mut Vec<NodeId>,
    i: usize,
    j: usize,
    result: NodeId,
) {
    pool.swap_remove(i.max(j));
    pool.swap_remove(i.min(j));
    if net.is_live(result) && net.rank(result).is_some_and(|r| r > 0) {
        pool.push(result);
    }
}

// contract random pairs within one chunk until it's down to one node or too
// many attempts have been rejected
fn shrink_chunk(
    net: &Network,
    mut pool: Vec<NodeId>,
    seed: u64,
    deadline: &Deadline,
) -> Vec<NodeId>
{
    let mut rng = StdRng::seed_from_u64(seed);
    let mut fails: usize = 0;
    while pool.len() > 1 && fails < pool.len() * pool.len() {
        if deadline.expired() { break; }
        let Some((i, j)) = pick_two(&mut rng, pool.len()) else { continue; };
        match net.contract_nodes_within(pool[i], pool[j], CHUNK_THRESHOLD, deadline) {
            Some(c) => { replace_pair(net, &mut pool, i, j, c); },
            None => { fails += 1; },
        }
    }
    pool
}

impl<'a> ContractionTools<'a> {
    /// Contract by random pairs.
    ///
    /// The live nodes are split into [`NUM_CHUNKS`] chunks, each shrunk on its
    /// own thread with a small threshold. The leftovers are then pooled and
    /// contracted by random pairs, starting from a threshold of -1 that is
    /// raised by one whenever more than (pool size)<sup>2</sup> attempts in a
    /// row are rejected, and reset after every success.
    pub fn contract_stochastic(&mut self, deadline: Deadline)
        -> ContractResult<Option<C64>>
    {
        let net = self.network();
        let live = net.uncontracted();
        let chunk_len = live.len().div_ceil(NUM_CHUNKS).max(1);
        let seeds: Vec<u64> = (0..NUM_CHUNKS).map(|_| self.fork_seed()).collect();
        let leftovers: Vec<Vec<NodeId>> =
            thread::scope(|s| {
                let handles: Vec<_> =
                    live.chunks(chunk_len).zip(seeds)
                    .map(|(chunk, seed)| {
                        let pool = chunk.to_vec();
                        s.spawn(move || shrink_chunk(net, pool, seed, &deadline))
                    })
                    .collect();
                handles.into_iter()
                    .map(|h| h.join())
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(|_| ContractError::ContractionFailure(
                "stochastic worker panicked".into()))?;

        let mut pool: Vec<NodeId> = leftovers.concat();
        debug!(pooled = pool.len(); "merging stochastic chunks");
        let mut threshold: i32 = -1;
        let mut fails: usize = 0;
        while !net.is_done() && !deadline.expired() {
            if pool.len() < 2 { break; }
            let Some((i, j)) = pick_two(self.rng(), pool.len()) else { continue; };
            match net.contract_nodes_within(pool[i], pool[j], threshold, &deadline) {
                Some(c) => {
                    replace_pair(net, &mut pool, i, j, c);
                    threshold = -1;
                    fails = 0;
                },
                None => {
                    fails += 1;
                    if fails > pool.len() * pool.len() {
                        threshold += 1;
                        fails = 0;
                    }
                },
            }
        }
        self.finish(&deadline, "stochastic contraction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::tests::approx;

    #[test]
    fn seeded_runs_agree() {
        let circuit = "5\nH 0\nCNOT 0 1\nRy 0.3 2\nCNOT 1 2\nCZ 2 3\nSWAP 3 4\nRx 1.1 4\n";
        let reference = Network::parse(circuit, "0Z1XY").unwrap()
            .contract_linearly().unwrap();
        for seed in 0..10 {
            let net = Network::parse(circuit, "0Z1XY").unwrap();
            let mut tools = ContractionTools::with_seed(&net, seed);
            let v = tools.contract_stochastic(Deadline::from_secs(60.0))
                .unwrap().unwrap();
            assert!(approx(v, reference), "seed {}: {} vs {}", seed, v, reference);
        }
    }

    #[test]
    fn replace_pair_drops_scalars() {
        let net = Network::parse("1\nH 0\n", "0").unwrap();
        let mut pool = vec![0, 1, 2];
        let c = net.contract_nodes(0, 1, 0).unwrap();
        replace_pair(&net, &mut pool, 0, 1, c);
        assert_eq!(pool, vec![2, c]);
        let d = net.contract_nodes(2, c, 0).unwrap();
        replace_pair(&net, &mut pool, 0, 1, d);
        assert!(pool.is_empty());
        assert!(net.is_done());
    }
}
