use std::{
    fs,
    path::{ Path, PathBuf },
    process::ExitCode,
    time::Duration,
};
use anyhow::anyhow;
use clap::Parser;
use flexi_logger::Logger;
use log::{ error, info };
use num_complex::Complex64 as C64;
use qtn::{
    config::{ Config, ContractMethod },
    contract::{ Arch, ContractionTools, LineGraph },
    deadline::Deadline,
    network::Network,
};

/// Simulate a quantum circuit by contracting its tensor network.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Run configuration file (`>type key value` entries).
    input: PathBuf,

    /// Log more (-v for debug, -vv for trace); RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

enum Report {
    Value { value: C64, flops: u64, elapsed: Duration },
    SolverOnly,
}

impl Report {
    fn render(&self) -> String {
        match self {
            Self::Value { value, flops, elapsed } => format!(
                "Result of Contraction: ({},{})\n\
                Number of floating point ops in full contraction: {}\n\
                Contraction complete. {{ {:.6} s }}\n",
                value.re, value.im, flops, elapsed.as_secs_f64(),
            ),
            Self::SolverOnly => String::from(
                "QuickBB has been run. \
                Set qbbonly=false and readqbbresonly=true to contract the network.\n"
            ),
        }
    }
}

fn run(config: &Config) -> anyhow::Result<Report> {
    info!(
        qasm = config.qasm.display().to_string(),
        method = format!("{:?}", config.contract_method);
        "starting run"
    );
    let mut net = Network::from_files(&config.qasm, config.measurement.as_ref())?;
    net.set_num_threads(config.threads)?;
    let deadline = Deadline::from_secs(config.max_time);
    net.reduce_circuit()?;
    info!(live = net.num_uncontracted(); "reduced circuit");
    if let Some(path) = &config.visual_graph { net.save_graphviz(path)?; }
    if let Some(path) = &config.tw_graph { net.save_treewidth_graph(path)?; }

    let value =
        if config.contract_method == ContractMethod::LineGraphQbb {
            let lg = LineGraph::new(&net);
            let arch = if config.bits64 { Arch::Bits64 } else { Arch::Bits32 };
            if !config.read_qbb_res_only {
                lg.run_quickbb(config.quickbb_seconds, arch)?;
                if let Ok(tw) = lg.treewidth() {
                    info!(treewidth = tw; "solver finished");
                }
            }
            if config.qbb_only { return Ok(Report::SolverOnly); }
            lg.contract(deadline)?
        } else {
            let strategy = config.strategy()
                .ok_or_else(|| anyhow!("no strategy for {:?}", config.contract_method))?;
            let mut tools =
                match config.seed {
                    Some(seed) => ContractionTools::with_seed(&net, seed),
                    None => ContractionTools::new(&net),
                };
            tools.contract(&strategy, deadline)?
        };
    let value = value.ok_or_else(|| anyhow!(
        "contraction did not finish within {} seconds", config.max_time))?;
    Ok(Report::Value { value, flops: net.flops(), elapsed: deadline.elapsed() })
}

fn write_output(path: &Path, text: &str) {
    let res =
        path.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| fs::write(path, text));
    if let Err(e) = res {
        error!(path = path.display().to_string(); "could not write output: {}", e);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level =
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
    let _logger =
        match Logger::try_with_env_or_str(level).and_then(|l| l.start()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!("could not start logger: {}", e);
                None
            },
        };
    let config =
        match Config::from_file(&cli.input) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            },
        };
    match run(&config) {
        Ok(report) => {
            let text = report.render();
            print!("{}", text);
            write_output(&config.output_path, &text);
            ExitCode::SUCCESS
        },
        Err(e) => {
            let text = format!("ERROR: {:#}\n", e);
            eprint!("{}", text);
            write_output(&config.output_path, &text);
            ExitCode::FAILURE
        },
    }
}
