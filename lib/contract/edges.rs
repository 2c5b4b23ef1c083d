use log::debug;
use num_complex::Complex64 as C64;
use rand::Rng;
use crate::{
    contract::{ ContractResult, ContractionTools },
    deadline::Deadline,
    network::NodeId,
};

impl<'a> ContractionTools<'a> {
    /// Contract inward from the boundary of the circuit.
    ///
    /// Initial states and measurements seed a working set; every other live
    /// node starts out in the interior. Each attempt pairs a random node from
    /// either set with a random working node, and a successful contraction
    /// puts its result into the working set. The threshold starts at -1, is
    /// raised by one after more than (total nodes)<sup>2</sup> rejections in a
    /// row, and is reset after every success.
    pub fn contract_from_edges(&mut self, deadline: Deadline)
        -> ContractResult<Option<C64>>
    {
        let net = self.network();
        let (mut working, mut interior): (Vec<NodeId>, Vec<NodeId>) =
            net.uncontracted().into_iter()
            .partition(|id| net.node(*id).is_some_and(|n| n.kind().is_boundary()));
        debug!(
            boundary = working.len(), interior = interior.len();
            "contracting from edges"
        );
        let mut threshold: i32 = -1;
        let mut fails: usize = 0;
        while !net.is_done() && !deadline.expired() {
            if working.is_empty() { working.append(&mut interior); }
            let total = working.len() + interior.len();
            if total < 2 { break; }
            if fails > total * total {
                threshold += 1;
                fails = 0;
            }
            let one = self.rng().gen_range(0..total);
            let two = self.rng().gen_range(0..working.len());
            let from_working = one >= interior.len();
            let x =
                if from_working {
                    let k = one - interior.len();
                    if k == two { continue; }
                    working[k]
                } else {
                    interior[one]
                };
            let y = working[two];
            let Some(c) = net.contract_nodes_within(x, y, threshold, &deadline) else {
                fails += 1;
                continue;
            };
            if from_working {
                let k = one - interior.len();
                working.swap_remove(k.max(two));
                working.swap_remove(k.min(two));
            } else {
                working.swap_remove(two);
                interior.swap_remove(one);
            }
            if net.is_live(c) && net.rank(c).is_some_and(|r| r > 0) {
                working.push(c);
            }
            threshold = -1;
            fails = 0;
        }
        self.finish(&deadline, "contraction from edges")
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        c,
        contract::{ ContractionTools, tests::approx },
        deadline::Deadline,
        network::Network,
    };

    #[test]
    fn reduced_circuit_from_edges() {
        let circuit = "4\nH 0\nCNOT 0 1\nRy 0.8 2\nCZ 1 2\nCNOT 2 3\nRz 0.2 3\nH 3\n";
        let expected = Network::parse(circuit, "0-Y1").unwrap()
            .contract_linearly().unwrap();
        let net = Network::parse(circuit, "0-Y1").unwrap();
        net.reduce_circuit().unwrap();
        let mut tools = ContractionTools::with_seed(&net, 4);
        let v = tools.contract_from_edges(Deadline::from_secs(60.0)).unwrap().unwrap();
        assert!(approx(v, expected), "{} vs {}", v, expected);
        net.check_invariants().unwrap();
    }

    #[test]
    fn single_line() {
        let net = Network::parse("1\nX 0\n", "1").unwrap();
        let mut tools = ContractionTools::with_seed(&net, 0);
        let v = tools.contract_from_edges(Deadline::from_secs(60.0)).unwrap().unwrap();
        assert!(approx(v, c!(1.0)));
    }
}
