//! Main entry point for the transaction relay service.
//!
//! Runs the relay engine until interrupted, or inspects the reports persisted
//! by a previous run without contacting any chain.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use txrelay_config::Config;
use txrelay_core::{RelayBuilder, RelayFactories};

/// Command-line arguments for the relay service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the relay until Ctrl+C (default)
	Run,
	/// Print summary statistics of the persisted reports as JSON
	Stats,
	/// Write the transaction log of a chain as CSV
	ExportCsv {
		/// Chain whose live report is exported
		#[arg(long)]
		chain_id: u64,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Invalid config path: {}", args.config.display()))?;
	let config = Config::from_file(path).await?;
	tracing::info!("Loaded configuration [{}]", config.relay.id);

	let builder = RelayBuilder::new(config);
	let factories = RelayFactories::from_registries();

	match args.command.unwrap_or(Command::Run) {
		Command::Run => {
			let engine = builder.build(factories)?;
			tracing::info!("Started relay");
			engine.run().await?;
			tracing::info!("Stopped relay");
		},
		Command::Stats => {
			let monitor = builder.build_report_reader(&factories)?;
			monitor.load().await?;
			let stats = monitor.get_summary_stats().await;
			println!("{}", serde_json::to_string_pretty(&stats)?);
		},
		Command::ExportCsv { chain_id } => {
			let monitor = builder.build_report_reader(&factories)?;
			monitor.load().await?;
			match monitor.export_to_csv(chain_id).await {
				Some(location) => println!("{}", location),
				None => return Err(format!("No report to export for chain {}", chain_id).into()),
			}
		},
	}

	Ok(())
}
