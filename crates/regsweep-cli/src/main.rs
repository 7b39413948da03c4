use std::time::Duration;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use regsweep_core::SweepConfig;

mod cli;
mod output;
mod style;

use cli::RegsweepCli;
use output::OutputOptions;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = RegsweepCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let config = build_config(&cli).map_err(|err| eyre!("{err:#}"))?;
    let summary = regsweep_core::sweep(&config).map_err(|err| eyre!("{err:#}"))?;
    let outcome = regsweep_core::sweep_outcome(&summary);
    let opts = OutputOptions {
        quiet: cli.quiet,
        json: cli.json,
        no_color: cli.no_color,
    };
    let code = output::emit_output(&opts, &summary, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn build_config(cli: &RegsweepCli) -> anyhow::Result<SweepConfig> {
    let mut config = SweepConfig::from_env()?;
    if let Some(host) = &cli.host {
        config.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(path) = &cli.path {
        config.storage_root.clone_from(path);
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(secs) = cli.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    config.delete = cli.delete;
    Ok(config)
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("regsweep={level},regsweep_core={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
