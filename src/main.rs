use clap::Parser;
use infoflow::cli::Args;
use infoflow::{input, parser, report, Network, TrialRunner};
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn run(args: &Args) -> infoflow::Result<()> {
    let config = args.to_config()?;
    let start = Instant::now();

    let mut parsed = parser::parse_network_file(&args.network_file, args.is_directed())?;
    parsed.edges = input::aggregate_connections(&parsed.edges, config.connection_mode());
    let network = Network::from_input(&parsed, &config)?;
    info!(
        nodes = network.node_count(),
        links = network.link_count(),
        file = %args.network_file.display(),
        "read network"
    );

    let result = TrialRunner::new(&network, &config).run()?;
    info!(elapsed = ?start.elapsed(), "done");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if !args.silent {
        report::write_summary(&mut out, &result)?;
    }
    report::write_report(&mut out, &config, &network, &result)?;
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.silent { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}
