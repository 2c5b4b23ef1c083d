//! Reading circuit, measurement, and custom-gate descriptions into a network.

use std::{ fs, path::{ Path, PathBuf } };
use log::{ debug, warn };
use ndarray as nd;
use num_complex::Complex64 as C64;
use rustc_hash::FxHashMap;
use crate::{
    c,
    network::{
        GateKind,
        Measurement,
        NetworkError,
        NetworkResult,
        Node,
        NodeId,
        QubitId,
        Wire,
        WireId,
        network::State,
    },
};
use NetworkError::*;

/// Where a network's description comes from, kept so that the network can be
/// rebuilt on reset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// A circuit file and optional measurement file. Without a measurement
    /// file, every qubit is traced out.
    Files { circuit: PathBuf, measurement: Option<PathBuf> },
    /// In-memory circuit and measurement descriptions.
    Text { circuit: String, measurement: String },
}

impl Source {
    /// Name used in exported graph headers.
    pub fn name(&self) -> String {
        match self {
            Self::Files { circuit, .. } => circuit.display().to_string(),
            Self::Text { .. } => "circuit".into(),
        }
    }

    pub(crate) fn build(&self) -> NetworkResult<State> {
        match self {
            Self::Files { circuit, measurement } => {
                let circuit_text = read(circuit)?;
                let measurement_text =
                    match measurement {
                        Some(path) => read(path)?,
                        None => {
                            warn!(
                                circuit = circuit.display().to_string();
                                "no measurement file given; all qubits will be traced out"
                            );
                            String::new()
                        },
                    };
                build(&circuit_text, &measurement_text)
            },
            Self::Text { circuit, measurement } => build(circuit, measurement),
        }
    }
}

fn read(path: &Path) -> NetworkResult<String> {
    fs::read_to_string(path)
        .map_err(|e| InvalidFile(format!("{}: {}", path.display(), e)))
}

fn build(circuit: &str, measurement: &str) -> NetworkResult<State> {
    let mut lines =
        circuit.lines()
        .enumerate()
        .map(|(k, line)| (k + 1, line.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty());
    let (_, first) =
        lines.next()
        .ok_or_else(|| InvalidFileFormat("empty circuit description".into()))?;
    let n: usize =
        first.parse()
        .map_err(|_| InvalidFileFormat(
            format!("expected a number of qubits, got '{}'", first)))?;
    if n == 0 {
        return Err(InvalidTensorNetwork("circuit has no qubits".into()));
    }
    let mut builder = Builder::new(n);
    for (k, line) in lines {
        builder.directive(k, line)?;
    }
    let mut chars = measurement.chars().filter(|c| !c.is_whitespace());
    for q in 0..n {
        let m = chars.next().map(Measurement::from_char)
            .unwrap_or(Measurement::Trace);
        builder.measure(m, q);
    }
    Ok(builder.finish())
}

struct Builder {
    n: usize,
    nodes: Vec<Node>,
    wires: Vec<Wire>,
    frontier: Vec<WireId>,
    by_line: Vec<Vec<NodeId>>,
    custom: FxHashMap<String, GateKind>,
}

impl Builder {
    fn new(n: usize) -> Self {
        let mut builder = Self {
            n,
            nodes: Vec::new(),
            wires: Vec::new(),
            frontier: Vec::with_capacity(n),
            by_line: vec![Vec::new(); n],
            custom: FxHashMap::default(),
        };
        for q in 0..n {
            let id = builder.nodes.len();
            let w = builder.new_wire(id, q);
            builder.frontier.push(w);
            builder.push_node(GateKind::InitState, vec![w], vec![q]);
        }
        builder
    }

    fn new_wire(&mut self, from: NodeId, q: QubitId) -> WireId {
        self.wires.push(Wire::new(Some(from), q));
        self.wires.len() - 1
    }

    fn push_node(&mut self, kind: GateKind, wires: Vec<WireId>, qubits: Vec<QubitId>)
        -> NodeId
    {
        let id = self.nodes.len();
        let values = kind.tensor().unwrap_or_default();
        qubits.iter().for_each(|q| self.by_line[*q].push(id));
        debug!(id = id, qubits:? = qubits; "creating {} node", kind.label());
        self.nodes.push(Node::new(id, kind, values, wires, qubits));
        id
    }

    // attach a gate to the current ends of its qubit lines
    fn apply(&mut self, kind: GateKind, qubits: &[QubitId]) -> NodeId {
        let id = self.nodes.len();
        let mut wires: Vec<WireId> = Vec::with_capacity(2 * qubits.len());
        for q in qubits.iter() {
            let w = self.frontier[*q];
            self.wires[w].end_b = Some(id);
            wires.push(w);
        }
        for q in qubits.iter() {
            let w = self.new_wire(id, *q);
            self.frontier[*q] = w;
            wires.push(w);
        }
        self.push_node(kind, wires, qubits.to_vec())
    }

    fn measure(&mut self, m: Measurement, q: QubitId) -> NodeId {
        let id = self.nodes.len();
        let w = self.frontier[q];
        self.wires[w].end_b = Some(id);
        self.push_node(GateKind::Measure(m), vec![w], vec![q])
    }

    fn qubit(&self, k: usize, tok: Option<&&str>) -> NetworkResult<QubitId> {
        let tok = tok.ok_or_else(|| InvalidFileFormat(
            format!("line {}: missing qubit index", k)))?;
        let q: QubitId = tok.parse()
            .map_err(|_| InvalidFileFormat(
                format!("line {}: invalid qubit index '{}'", k, tok)))?;
        (q < self.n).then_some(q)
            .ok_or_else(|| InvalidFileFormat(
                format!("line {}: qubit {} out of range for {} qubit(s)", k, q, self.n)))
    }

    fn pair(&self, k: usize, a: Option<&&str>, b: Option<&&str>)
        -> NetworkResult<[QubitId; 2]>
    {
        let c = self.qubit(k, a)?;
        let t = self.qubit(k, b)?;
        (c != t).then_some([c, t])
            .ok_or_else(|| InvalidFileFormat(
                format!("line {}: two-qubit gate applied to qubit {} twice", k, c)))
    }

    fn directive(&mut self, k: usize, line: &str) -> NetworkResult<()> {
        let toks: Vec<&str> = line.split_whitespace().collect();
        let head = toks[0];
        match head {
            "H" | "X" | "Y" | "Z" => {
                let kind = match head {
                    "H" => GateKind::H,
                    "X" => GateKind::X,
                    "Y" => GateKind::Y,
                    _ => GateKind::Z,
                };
                let q = self.qubit(k, toks.get(1))?;
                self.apply(kind, &[q]);
            },
            "Rx" | "Ry" | "Rz" | "Phase" => {
                let a = number(k, toks.get(1))?;
                let kind = match head {
                    "Rx" => GateKind::Rx(a),
                    "Ry" => GateKind::Ry(a),
                    "Rz" => GateKind::Rz(a),
                    _ => GateKind::Phase(a),
                };
                let q = self.qubit(k, toks.get(2))?;
                self.apply(kind, &[q]);
            },
            "Depolarize" => {
                let p = number(k, toks.get(1))?;
                if !(0.0..=1.0).contains(&p) {
                    return Err(InvalidFileFormat(
                        format!("line {}: depolarizing probability {} not in [0, 1]", k, p)));
                }
                let q = self.qubit(k, toks.get(2))?;
                self.apply(GateKind::Depolarizer(p), &[q]);
            },
            "CNOT" | "SWAP" | "CZ" | "CRk" => {
                let qs = self.pair(k, toks.get(1), toks.get(2))?;
                let kind = match head {
                    "CNOT" => GateKind::Cnot,
                    "SWAP" => GateKind::Swap,
                    "CZ" => GateKind::Cz,
                    _ => GateKind::CRk(qs[0]),
                };
                self.apply(kind, &qs);
            },
            "CPHASE" => {
                let a = number(k, toks.get(1))?;
                let qs = self.pair(k, toks.get(2), toks.get(3))?;
                self.apply(GateKind::CPhase(a), &qs);
            },
            "def1" | "def2" => {
                let (Some(name), Some(path)) = (toks.get(1), toks.get(2)) else {
                    return Err(InvalidFileFormat(
                        format!("line {}: expected '{} name path'", k, head)));
                };
                let dim = if head == "def1" { 2 } else { 4 };
                let u = load_unitary(path, dim)?;
                let kind =
                    if dim == 2 {
                        GateKind::Custom1(name.to_string(), u)
                    } else {
                        GateKind::Custom2(name.to_string(), u)
                    };
                self.custom.insert(name.to_string(), kind);
            },
            name => {
                let kind = self.custom.get(name).cloned()
                    .ok_or_else(|| InvalidFileFormat(
                        format!("line {}: unrecognized gate '{}'", k, name)))?;
                if kind.num_qubits() == 2 {
                    let qs = self.pair(k, toks.get(1), toks.get(2))?;
                    self.apply(kind, &qs);
                } else {
                    let q = self.qubit(k, toks.get(1))?;
                    self.apply(kind, &[q]);
                }
            },
        }
        Ok(())
    }

    fn finish(self) -> State {
        State::new(self.nodes, self.wires, self.by_line)
    }
}

fn number(k: usize, tok: Option<&&str>) -> NetworkResult<f64> {
    let tok = tok.ok_or_else(|| InvalidFileFormat(
        format!("line {}: missing parameter", k)))?;
    tok.parse()
        .map_err(|_| InvalidFileFormat(
            format!("line {}: invalid parameter '{}'", k, tok)))
}

/// Load a `dim × dim` matrix stored row-major as whitespace-separated complex
/// numbers, each either a plain real or `(re,im)`.
pub fn load_unitary<P>(path: P, dim: usize) -> NetworkResult<nd::Array2<C64>>
where P: AsRef<Path>
{
    let path = path.as_ref();
    let text = read(path)?;
    let values = parse_complexes(&text)
        .ok_or_else(|| InvalidFileFormat(
            format!("{}: malformed complex number", path.display())))?;
    if values.len() < dim * dim {
        return Err(InvalidFileFormat(
            format!("{}: expected {} entries, found {}",
                path.display(), dim * dim, values.len())));
    }
    nd::Array2::from_shape_vec((dim, dim), values[..dim * dim].to_vec())
        .map_err(|e| InvalidFileFormat(format!("{}: {}", path.display(), e)))
}

fn parse_complexes(text: &str) -> Option<Vec<C64>> {
    let mut out: Vec<C64> = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        if let Some(inner) = rest.strip_prefix('(') {
            let end = inner.find(')')?;
            let mut parts = inner[..end].split(',');
            let re: f64 = parts.next()?.trim().parse().ok()?;
            let im: f64 =
                match parts.next() {
                    Some(s) => s.trim().parse().ok()?,
                    None => 0.0,
                };
            if parts.next().is_some() { return None; }
            out.push(c!(re, im));
            rest = inner[end + 1..].trim_start();
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            out.push(c!(rest[..end].parse::<f64>().ok()?));
            rest = rest[end..].trim_start();
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    #[test]
    fn complexes() {
        let v = parse_complexes("(1,0) (0.5, -2)\n 3  (4)").unwrap();
        assert_eq!(v, vec![c!(1.0), c!(0.5, -2.0), c!(3.0), c!(4.0)]);
        assert!(parse_complexes("(1,0").is_none());
        assert!(parse_complexes("abc").is_none());
        assert!(parse_complexes("(1,2,3)").is_none());
    }

    #[test]
    fn structure() {
        let net = Network::parse("2\n# comment\nH 0\n\nCNOT 0 1 # trailing\n", "00")
            .unwrap();
        // 2 init + H + CNOT + 2 measurements
        assert_eq!(net.num_nodes(),       6);
        assert_eq!(net.num_qubits(),      2);
        assert_eq!(net.uncontracted().len(), 6);
        let by_line = net.by_line();
        assert_eq!(by_line[0],            vec![0, 2, 3, 4]);
        assert_eq!(by_line[1],            vec![1, 3, 5]);
        let cnot = net.node(3).unwrap();
        assert_eq!(cnot.rank(),           4);
        assert_eq!(cnot.qubits(),         &[0, 1]);
        assert_eq!(cnot.kind(),           &GateKind::Cnot);
        net.check_invariants().unwrap();
        for w in 0..net.num_wires() {
            assert!(net.wire(w).unwrap().ends().is_some());
        }
    }

    #[test]
    fn format_errors() {
        assert!(matches!(Network::parse("0\n", ""), Err(InvalidTensorNetwork(_))));
        assert!(matches!(Network::parse("two\n", ""), Err(InvalidFileFormat(_))));
        assert!(matches!(Network::parse("", ""), Err(InvalidFileFormat(_))));
        assert!(matches!(Network::parse("2\nH 2\n", ""), Err(InvalidFileFormat(_))));
        assert!(matches!(Network::parse("2\nCNOT 1 1\n", ""), Err(InvalidFileFormat(_))));
        assert!(matches!(Network::parse("2\nFOO 1\n", ""), Err(InvalidFileFormat(_))));
        assert!(matches!(Network::parse("2\nRx x 1\n", ""), Err(InvalidFileFormat(_))));
        assert!(matches!(Network::parse("2\nH\n", ""), Err(InvalidFileFormat(_))));
        assert!(matches!(
            Network::parse("1\ndef1 g /nonexistent/qtn/gate.txt\n", ""),
            Err(InvalidFile(_))
        ));
        assert!(matches!(
            Network::from_files("/nonexistent/qtn/circuit.qasm", None),
            Err(InvalidFile(_))
        ));
    }

    #[test]
    fn custom_two_qubit_gate() {
        let path = std::env::temp_dir()
            .join(format!("qtn-parse-cx-{}.txt", std::process::id()));
        fs::write(
            &path,
            "(1,0) (0,0) (0,0) (0,0)\n\
            (0,0) (1,0) (0,0) (0,0)\n\
            (0,0) (0,0) (0,0) (1,0)\n\
            (0,0) (0,0) (1,0) (0,0)\n",
        ).unwrap();
        let prep = "2\nH 0\nRy 0.4 1\nRx 1.3 0\n";
        for (c, t) in [(0, 1), (1, 0)] {
            let builtin = format!("{}CNOT {} {}\n", prep, c, t);
            let custom = format!("{}def2 cx {}\ncx {} {}\n", prep, path.display(), c, t);
            for m in ["00", "11", "01", "10", "XZ", "YY"] {
                let expected = Network::parse(&builtin, m).unwrap()
                    .contract_linearly().unwrap();
                let net = Network::parse(&custom, m).unwrap();
                assert!(matches!(net.node(5).unwrap().kind(), GateKind::Custom2(..)));
                let v = net.contract_linearly().unwrap();
                assert!((v - expected).norm() < 1e-9, "{} {} {}: {} vs {}", c, t, m, v, expected);
            }
        }
        fs::remove_file(&path).ok();
    }

    #[test]
    fn short_custom_gate() {
        let path = std::env::temp_dir()
            .join(format!("qtn-parse-short-{}.txt", std::process::id()));
        fs::write(&path, "(1,0) (0,0) (0,0)").unwrap();
        let circuit = format!("1\ndef1 g {}\ng 0\n", path.display());
        let res = Network::parse(&circuit, "0");
        fs::remove_file(&path).ok();
        assert!(matches!(res, Err(InvalidFileFormat(_))));
    }
}
