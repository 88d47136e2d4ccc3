//! `knx-sim`: run the premises of a configuration file.

use clap::Parser;
use knx_sim::configuration::{SimConfig, DEFAULT_CONFIG_PATH};
use knx_sim::error::Result;
use knx_sim::{dpt, sim_log, Premise};
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use tracing_subscriber::EnvFilter;

/// KNXnet/IP tunnelling gateway simulator
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "KNX_SIM_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log filter, a level or `target=level` directives
    #[arg(long, env = "KNX_SIM_LOG", default_value = "info")]
    log_level: String,

    /// Print the supported datapoint types and exit
    #[arg(long)]
    list_dpts: bool,

    /// Override the UDP port of a single-premise configuration
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|e| {
        eprintln!("invalid log filter '{filter}' ({e}), using 'info'");
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn list_dpts() {
    for info in dpt::all() {
        let range = match (info.min, info.max) {
            (Some(min), Some(max)) => format!("{min} .. {max}"),
            _ => String::new(),
        };
        println!(
            "{:<8} {:<28} {:<6} {} byte(s) {}",
            info.id, info.name, info.unit, info.size, range
        );
    }
}

fn load(args: &Args) -> Result<SimConfig> {
    let mut config = SimConfig::load(&args.config)?;
    if let Some(port) = args.port {
        config.override_port(port)?;
    }
    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let config = load(args)?;

    let mut premises = Vec::with_capacity(config.premises.len());
    for premise_config in config.premises {
        let mut premise = Premise::new(premise_config)?;
        premise.start()?;
        premises.push(premise);
    }
    sim_log!(info, "{} premise(s) running", premises.len());

    wait_for_shutdown();

    for premise in &mut premises {
        premise.stop();
    }
    Ok(())
}

/// Block until stdin closes on a terminal; otherwise until the process is killed
fn wait_for_shutdown() {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        sim_log!(info, "Press Ctrl-D to stop");
        for line in stdin.lock().lines() {
            if line.is_err() {
                break;
            }
        }
    } else {
        loop {
            thread::park();
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.list_dpts {
        list_dpts();
        return ExitCode::SUCCESS;
    }

    init_logging(&args.log_level);
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            sim_log!(error, "{e}");
            ExitCode::FAILURE
        }
    }
}
