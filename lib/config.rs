//! Run configuration, read from a typed key/value file.
//!
//! Each entry sits on its own line as `>type key value`, where `type` is one
//! of `string`, `bool`, `int`, or `double`. Lines not starting with `>` are
//! ignored, and `#` starts a comment.
//!
//! ```text
//! >string qasm circuits/bell.qasm
//! >string measurement circuits/bell.meas
//! >string contractmethod cost-simple
//! >int pvalue 2
//! >double maxtime 30.0
//! ```

use std::{
    fs,
    path::{ Path, PathBuf },
    str::FromStr,
};
use log::warn;
use thiserror::Error;
use crate::{ contract::Strategy, network::{ DEFAULT_THREADS, PAR_RANK } };

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration file {0}")]
    InvalidFile(String),

    #[error("line {0}: unsupported type '{1}'; expected one of string, bool, int, double")]
    UnknownType(usize, String),

    #[error("line {0}: missing key or value")]
    MissingValue(usize),

    #[error("line {0}: invalid {1} value '{2}'")]
    BadValue(usize, &'static str, String),

    #[error("line {0}: key '{1}' must be given as {2}")]
    TypeMismatch(usize, String, &'static str),

    #[error("unknown contraction method '{0}'")]
    UnknownMethod(String),

    #[error("missing required key '{0}'")]
    MissingKey(&'static str),
}
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Default number of seconds given to the tree-decomposition solver.
pub const DEFAULT_QBB_SECONDS: u64 = 20;

/// Default wall-clock budget for contraction, in seconds.
pub const DEFAULT_MAX_TIME: f64 = 60.0;

/// How the network should be contracted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ContractMethod {
    /// Order from the tree-decomposition solver run on the line graph.
    LineGraphQbb,
    /// Random pairs.
    #[default]
    SimpleStoch,
    /// Sampled pairs scored by neighbor lookahead.
    CostSimple,
    /// Sampled pairs scored by exhaustive local search.
    CostBrute,
    /// Inward from the boundary.
    FromEdges,
    /// Pairs read from a file.
    UserDefined,
}

impl FromStr for ContractMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s {
            "linegraph-qbb" => Ok(Self::LineGraphQbb),
            "simple-stoch" => Ok(Self::SimpleStoch),
            "cost-simple" => Ok(Self::CostSimple),
            "cost-brute" => Ok(Self::CostBrute),
            "from-edges" => Ok(Self::FromEdges),
            "user-defined" => Ok(Self::UserDefined),
            _ => Err(ConfigError::UnknownMethod(s.to_string())),
        }
    }
}

// a parsed value, tagged by its declared type
#[derive(Clone, Debug, PartialEq)]
enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    Double(f64),
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "true" | "True" | "yes" | "Yes" => Some(true),
        "0" | "false" | "False" | "no" | "No" => Some(false),
        _ => None,
    }
}

// `>type key value` to `(key, value)`; `None` for lines without an entry
fn parse_entry(line: &str, lineno: usize) -> ConfigResult<Option<(String, Value)>> {
    let line = line.split('#').next().unwrap_or("").trim();
    let Some(entry) = line.strip_prefix('>') else { return Ok(None); };
    let mut toks = entry.split_whitespace();
    let ty = toks.next().ok_or(ConfigError::MissingValue(lineno))?;
    let key = toks.next().ok_or(ConfigError::MissingValue(lineno))?;
    let raw = toks.next().ok_or(ConfigError::MissingValue(lineno))?;
    let value =
        match ty {
            "string" => Value::Str(raw.to_string()),
            "bool" => Value::Bool(
                parse_bool(raw)
                    .ok_or_else(|| ConfigError::BadValue(lineno, "bool", raw.into()))?
            ),
            "int" => Value::Int(
                raw.parse()
                    .map_err(|_| ConfigError::BadValue(lineno, "int", raw.into()))?
            ),
            "double" => Value::Double(
                raw.parse()
                    .map_err(|_| ConfigError::BadValue(lineno, "double", raw.into()))?
            ),
            _ => { return Err(ConfigError::UnknownType(lineno, ty.to_string())); },
        };
    Ok(Some((key.to_string(), value)))
}

/// Settings for one simulation run.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub qasm: PathBuf,
    pub measurement: Option<PathBuf>,
    pub output_path: PathBuf,
    pub contract_method: ContractMethod,
    pub user_contract_seq: Option<PathBuf>,
    pub quickbb_seconds: u64,
    pub qbb_only: bool,
    pub read_qbb_res_only: bool,
    pub bits64: bool,
    pub threads: usize,
    pub max_time: f64,
    pub seed: Option<u64>,
    pub p_value: usize,
    pub samples: usize,
    pub visual_graph: Option<PathBuf>,
    pub tw_graph: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qasm: PathBuf::new(),
            measurement: None,
            output_path: PathBuf::from("output/qtn.out"),
            contract_method: ContractMethod::default(),
            user_contract_seq: None,
            quickbb_seconds: DEFAULT_QBB_SECONDS,
            qbb_only: false,
            read_qbb_res_only: false,
            bits64: true,
            threads: DEFAULT_THREADS,
            max_time: DEFAULT_MAX_TIME,
            seed: None,
            p_value: 1,
            samples: 3,
            visual_graph: None,
            tw_graph: None,
        }
    }
}

impl Config {
    /// Read a configuration file.
    pub fn from_file<P>(path: P) -> ConfigResult<Self>
    where P: AsRef<Path>
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Parse configuration text, starting from the defaults.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let mut config = Self::default();
        let mut have_qasm = false;
        for (k, line) in text.lines().enumerate() {
            let lineno = k + 1;
            let Some((key, value)) = parse_entry(line, lineno)? else { continue; };
            let mismatch = |expected: &'static str| {
                ConfigError::TypeMismatch(lineno, key.clone(), expected)
            };
            let count = |v: i64| -> ConfigResult<u64> {
                u64::try_from(v)
                    .map_err(|_| ConfigError::BadValue(lineno, "non-negative int", v.to_string()))
            };
            match (key.as_str(), value) {
                ("qasm", Value::Str(s)) => {
                    config.qasm = s.into();
                    have_qasm = true;
                },
                ("measurement", Value::Str(s))
                    => { config.measurement = Some(s.into()); },
                ("outputpath", Value::Str(s))
                    => { config.output_path = s.into(); },
                ("contractmethod", Value::Str(s))
                    => { config.contract_method = s.parse()?; },
                ("user-contract-seq", Value::Str(s))
                    => { config.user_contract_seq = Some(s.into()); },
                ("visualgraph", Value::Str(s))
                    => { config.visual_graph = Some(s.into()); },
                ("twgraph", Value::Str(s))
                    => { config.tw_graph = Some(s.into()); },
                ("qbbonly", Value::Bool(b))
                    => { config.qbb_only = b; },
                ("readqbbresonly", Value::Bool(b))
                    => { config.read_qbb_res_only = b; },
                ("64bit", Value::Bool(b))
                    => { config.bits64 = b; },
                ("quickbbseconds", Value::Int(i))
                    => { config.quickbb_seconds = count(i)?; },
                ("threads", Value::Int(i)) => {
                    // out-of-range counts are reset after parsing
                    config.threads = usize::try_from(i).unwrap_or(0);
                },
                ("seed", Value::Int(i))
                    => { config.seed = Some(count(i)?); },
                ("pvalue", Value::Int(i))
                    => { config.p_value = count(i)? as usize; },
                ("samples", Value::Int(i))
                    => { config.samples = count(i)? as usize; },
                ("maxtime", Value::Double(d))
                    => { config.max_time = d; },
                ("maxtime", Value::Int(i))
                    => { config.max_time = i as f64; },
                (
                    "qasm" | "measurement" | "outputpath" | "contractmethod"
                    | "user-contract-seq" | "visualgraph" | "twgraph",
                    _,
                ) => { return Err(mismatch("string")); },
                ("qbbonly" | "readqbbresonly" | "64bit", _)
                    => { return Err(mismatch("bool")); },
                ("quickbbseconds" | "threads" | "seed" | "pvalue" | "samples", _)
                    => { return Err(mismatch("int")); },
                ("maxtime", _)
                    => { return Err(mismatch("double")); },
                (other, _) => { warn!(key = other; "ignoring unknown configuration key"); },
            }
        }
        if !have_qasm { return Err(ConfigError::MissingKey("qasm")); }
        config.check_threads();
        Ok(config)
    }

    // thread counts beyond the number of entries in the smallest split
    // summation are pointless
    fn check_threads(&mut self) {
        let max = 1_usize << (2 * PAR_RANK);
        if self.threads == 0 || self.threads > max {
            warn!(
                threads = self.threads, default = DEFAULT_THREADS;
                "invalid thread count; resetting to default"
            );
            self.threads = DEFAULT_THREADS;
        }
    }

    /// The strategy to run for every method except [`ContractMethod::LineGraphQbb`].
    ///
    /// A user-defined method without a sequence file falls back to the
    /// stochastic strategy.
    pub fn strategy(&self) -> Option<Strategy> {
        match self.contract_method {
            ContractMethod::LineGraphQbb => None,
            ContractMethod::SimpleStoch => Some(Strategy::Stochastic),
            ContractMethod::CostSimple
                => Some(Strategy::CostSimple { p_value: self.p_value }),
            ContractMethod::CostBrute
                => Some(Strategy::CostBruteForce { samples: self.samples }),
            ContractMethod::FromEdges => Some(Strategy::FromEdges),
            ContractMethod::UserDefined => {
                match &self.user_contract_seq {
                    Some(path) => Some(Strategy::UserDefined(path.clone())),
                    None => {
                        warn!("no contraction sequence file given; contracting stochastically");
                        Some(Strategy::Stochastic)
                    },
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file() {
        let text = "\
# run settings
>string qasm circuits/bell.qasm
>string measurement circuits/bell.meas   # trailing comment
>string outputpath out/bell.out
>string contractmethod cost-brute
>int quickbbseconds 5
>bool qbbonly Yes
>bool 64bit 0
>int threads 4
>double maxtime 12.5
>int seed 42
>int samples 7
>string twgraph out/bell.tw
free text is ignored
";
        let config = Config::parse(text).unwrap();
        assert_eq!(config.qasm,             PathBuf::from("circuits/bell.qasm"));
        assert_eq!(config.measurement,      Some(PathBuf::from("circuits/bell.meas")));
        assert_eq!(config.output_path,      PathBuf::from("out/bell.out"));
        assert_eq!(config.contract_method,  ContractMethod::CostBrute);
        assert_eq!(config.quickbb_seconds,  5);
        assert!(config.qbb_only);
        assert!(!config.read_qbb_res_only);
        assert!(!config.bits64);
        assert_eq!(config.threads,          4);
        assert_eq!(config.max_time,         12.5);
        assert_eq!(config.seed,             Some(42));
        assert_eq!(config.tw_graph,         Some(PathBuf::from("out/bell.tw")));
        assert_eq!(config.visual_graph,     None);
        assert_eq!(config.strategy(),       Some(Strategy::CostBruteForce { samples: 7 }));
    }

    #[test]
    fn defaults() {
        let config = Config::parse(">string qasm a.qasm\n").unwrap();
        assert_eq!(config.output_path,      PathBuf::from("output/qtn.out"));
        assert_eq!(config.contract_method,  ContractMethod::SimpleStoch);
        assert_eq!(config.quickbb_seconds,  DEFAULT_QBB_SECONDS);
        assert_eq!(config.threads,          DEFAULT_THREADS);
        assert_eq!(config.max_time,         DEFAULT_MAX_TIME);
        assert_eq!(config.p_value,          1);
        assert_eq!(config.samples,          3);
        assert!(config.bits64);
        assert_eq!(config.strategy(),       Some(Strategy::Stochastic));
    }

    #[test]
    fn thread_reset() {
        let config = Config::parse(">string qasm a\n>int threads 0\n").unwrap();
        assert_eq!(config.threads, DEFAULT_THREADS);
        let config = Config::parse(">string qasm a\n>int threads 65537\n").unwrap();
        assert_eq!(config.threads, DEFAULT_THREADS);
        let config = Config::parse(">string qasm a\n>int threads 65536\n").unwrap();
        assert_eq!(config.threads, 65536);
    }

    #[test]
    fn methods() {
        let config = Config::parse(
            ">string qasm a\n>string contractmethod user-defined\n").unwrap();
        assert_eq!(config.strategy(), Some(Strategy::Stochastic));
        let config = Config::parse(
            ">string qasm a\n>string contractmethod user-defined\n\
            >string user-contract-seq s.txt\n").unwrap();
        assert_eq!(config.strategy(), Some(Strategy::UserDefined("s.txt".into())));
        let config = Config::parse(
            ">string qasm a\n>string contractmethod linegraph-qbb\n").unwrap();
        assert_eq!(config.strategy(), None);
    }

    #[test]
    fn errors() {
        use ConfigError::*;
        assert!(matches!(Config::parse(">int threads 2\n"), Err(MissingKey("qasm"))));
        assert!(matches!(Config::parse(">bool qbbonly maybe\n"), Err(BadValue(1, "bool", _))));
        assert!(matches!(Config::parse(">float x 1.0\n"), Err(UnknownType(1, _))));
        assert!(matches!(Config::parse(">string qasm\n"), Err(MissingValue(1))));
        assert!(matches!(Config::parse(">int qasm 3\n"), Err(TypeMismatch(1, _, "string"))));
        assert!(matches!(
            Config::parse(">string qasm a\n>string contractmethod magic\n"),
            Err(UnknownMethod(_)),
        ));
        assert!(matches!(Config::from_file("/nonexistent/run.inp"), Err(InvalidFile(_))));
    }
}
