//! Rendering the circuit structure of a network for outside tools.

use std::{ fs, io::Write, path::Path };
use rustc_hash::FxHashMap;
use crate::network::{ GateKind, Network, NetworkError, NetworkResult, NodeId };

impl Network {
    // live nodes numbered by position, plus (left, right) pairs of
    // neighbors along each qubit line
    fn line_edges(&self) -> (Vec<NodeId>, Vec<(usize, usize)>) {
        let state = self.lock();
        let order = state.uncontracted.clone();
        let index: FxHashMap<NodeId, usize> =
            order.iter().enumerate().map(|(k, id)| (*id, k)).collect();
        let edges: Vec<(usize, usize)> =
            state.by_line.iter()
            .flat_map(|line| line.windows(2))
            .filter_map(|w| index.get(&w[0]).zip(index.get(&w[1])))
            .map(|(a, b)| (*a, *b))
            .collect();
        (order, edges)
    }

    /// Render the live nodes as a graphviz graph, with one edge between
    /// neighboring nodes on each qubit line.
    pub fn to_graphviz(&self) -> NetworkResult<tabbycat::Graph> {
        use tabbycat::*;
        use tabbycat::attributes::*;
        use crate::vizdefs::*;
        let (order, edges) = self.line_edges();
        let name = self.source().name();
        let mut statements =
            StmtList::new()
            .add_attr(
                AttrType::Graph,
                AttrList::new().add_pair(rankdir(RankDir::LR)),
            )
            .add_attr(
                AttrType::Node,
                AttrList::new()
                    .add_pair(fontname(FONT))
                    .add_pair(fontsize(FONTSIZE))
                    .add_pair(margin(NODE_MARGIN))
                    .add_pair(height(GATE_HEIGHT)),
            );
        for (k, id) in order.iter().enumerate() {
            let Some(node) = self.node(*id) else { continue; };
            let mut attrs =
                AttrList::new()
                .add_pair(label(node.label().to_string()))
                .add_pair(style(Style::Filled))
                .add_pair(fillcolor(node_color(node.kind())));
            if node.rank() == 1 {
                attrs = attrs.add_pair(height(BOUNDARY_HEIGHT));
            }
            statements = statements.add_node(k.into(), None, Some(attrs));
        }
        for (a, b) in edges.into_iter() {
            statements =
                statements.add_edge(
                    Edge::head_node(a.into(), None)
                    .line_to_node(b.into(), None)
                );
        }
        GraphBuilder::default()
            .graph_type(GraphType::Graph)
            .strict(false)
            .id(Identity::quoted(&name))
            .stmts(statements)
            .build()
            .map_err(|e| NetworkError::Graphviz(e.to_string()))
    }

    /// Like [`to_graphviz`][Self::to_graphviz], but write the result to a
    /// file.
    pub fn save_graphviz<P>(&self, path: P) -> NetworkResult<()>
    where P: AsRef<Path>
    {
        let graphviz = self.to_graphviz()?;
        fs::OpenOptions::new()
            .write(true)
            .append(false)
            .create(true)
            .truncate(true)
            .open(path)?
            .write_all(format!("{}", graphviz).as_bytes())?;
        Ok(())
    }

    /// Render the live nodes as a plain edge list (`e a b` per line), for
    /// tree-width tools.
    pub fn to_treewidth_graph(&self) -> String {
        let (_, edges) = self.line_edges();
        let mut out = format!("c Created From File: {}\n", self.source().name());
        let lines: Vec<String> =
            edges.iter().map(|(a, b)| format!("e {} {}", a, b)).collect();
        out.push_str(&lines.join("\n"));
        out
    }

    /// Like [`to_treewidth_graph`][Self::to_treewidth_graph], but write the
    /// result to a file.
    pub fn save_treewidth_graph<P>(&self, path: P) -> NetworkResult<()>
    where P: AsRef<Path>
    {
        fs::write(path, self.to_treewidth_graph())?;
        Ok(())
    }
}

fn node_color(kind: &GateKind) -> tabbycat::attributes::Color {
    use crate::vizdefs::*;
    match kind {
        GateKind::InitState => INIT_COLOR,
        GateKind::Measure(_) => MEASURE_COLOR,
        GateKind::Intermediate => INTERMEDIATE_COLOR,
        k if k.num_qubits() == 2 => TWO_QUBIT_COLOR,
        _ => ONE_QUBIT_COLOR,
    }
}

#[cfg(test)]
mod tests {
    use crate::network::Network;

    #[test]
    fn treewidth_graph() {
        let net = Network::parse("2\nH 0\nCNOT 0 1\n", "00").unwrap();
        let text = net.to_treewidth_graph();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "c Created From File: circuit");
        // line 0: init-H, H-CNOT, CNOT-meas; line 1: init-CNOT, CNOT-meas
        assert_eq!(&lines[1..], &["e 0 2", "e 2 3", "e 3 4", "e 1 3", "e 3 5"]);
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn graphviz() {
        let net = Network::parse("2\nH 0\nCNOT 0 1\n", "01").unwrap();
        net.reduce_circuit().unwrap();
        let text = format!("{}", net.to_graphviz().unwrap());
        assert!(text.starts_with("graph"));
        assert!(text.contains("CNOT"));
        assert_eq!(text.matches("--").count(), 4);
    }
}
