use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::error;
use switchyard::sim::config::RunConfig;
use switchyard::sim::top::{Sim, SimReport};

#[derive(Parser)]
#[command(version, about)]
struct SwitchyardArgs {
    #[arg(help = "Path to config.toml")]
    config_path: PathBuf,
    #[arg(long, help = "Override cycle limit")]
    timeout: Option<u64>,
    #[arg(long, help = "Override random seed")]
    seed: Option<u64>,
    #[arg(long, help = "Override transactions per requester")]
    txns: Option<u32>,
    #[arg(long, help = "Write the run report as JSON")]
    results_json: Option<PathBuf>,
}

fn run(argv: SwitchyardArgs) -> anyhow::Result<SimReport> {
    let text = fs::read_to_string(&argv.config_path)
        .with_context(|| format!("failed to read config file {}", argv.config_path.display()))?;
    let mut config = RunConfig::from_toml(&text)?;

    // override toml configs with argv
    config.sim.timeout = argv.timeout.unwrap_or(config.sim.timeout);
    config.sim.seed = argv.seed.unwrap_or(config.sim.seed);
    config.traffic.txns_per_requester = argv.txns.unwrap_or(config.traffic.txns_per_requester);
    if argv.results_json.is_some() {
        config.sim.results_json = argv.results_json;
    }
    let results_json = config.sim.results_json.clone();

    let mut sim = Sim::new(config)?;
    let report = sim.run()?;

    if let Some(path) = results_json {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(&path, json).with_context(|| format!("cannot write {}", path.display()))?;
    }
    Ok(report)
}

pub fn main() -> ExitCode {
    env_logger::init();

    match run(SwitchyardArgs::parse()) {
        Ok(report) => {
            println!("finished in {} cycles", report.cycles);
            for (i, req) in report.requesters.iter().enumerate() {
                let done = req.writes_done + req.reads_done;
                println!(
                    "requester {}: {} writes, {} reads, {} error responses, avg latency {:.1}, max {}",
                    i,
                    req.writes_done,
                    req.reads_done,
                    req.error_responses,
                    req.total_latency as f64 / done.max(1) as f64,
                    req.max_latency
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{:#}", err);
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
