use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use netlab_abstract::ScenarioSpec;
use netlab_sim_cli::scenarios;
use netlab_simulator::run_scenario;

#[derive(Parser, Debug)]
#[command(author, version, about = "Discrete-event topology and flow-statistics simulator")]
struct Args {
    /// Load a scenario description (TOML) from disk.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Run a builtin scenario: star, switched-lan or dual-campus.
    #[arg(long)]
    builtin: Option<String>,

    /// Write the final JSON report here instead of stdout.
    #[arg(long)]
    report_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let spec = args.load_spec()?;
    let report = run_scenario(&spec)?;
    for flow in &report.flows {
        info!(
            flow = %flow.flow,
            bytes_sent = flow.bytes_sent,
            bytes_received = flow.bytes_received,
            packets_lost = flow.packets_lost,
            "flow finished"
        );
    }

    let json = serde_json::to_string_pretty(&report)?;
    match &args.report_out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

impl Args {
    fn load_spec(&self) -> Result<ScenarioSpec> {
        match (&self.scenario, &self.builtin) {
            (Some(_), Some(_)) => bail!("--scenario and --builtin cannot be used together"),
            (Some(path), None) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                toml::from_str(&text).context("parsing scenario file")
            }
            (None, Some(name)) => scenarios::builtin_by_name(name).with_context(|| {
                format!(
                    "unknown builtin scenario '{name}', expected one of {:?}",
                    scenarios::BUILTIN_NAMES
                )
            }),
            (None, None) => bail!("pass --scenario <file> or --builtin <name>"),
        }
    }
}
