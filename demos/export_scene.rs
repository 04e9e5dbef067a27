use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use i3dio::export::{ExportOptions, Exporter};
use i3dio::formats::parse_scene;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
	#[arg(help = "Path to a JSON scene dump")]
	scene: PathBuf,
	#[arg(help = "Where to write the .i3d file, defaults to the scene path with an .i3d extension")]
	output: Option<PathBuf>,
	#[arg(long, help = "Only export selected objects")]
	selection_only: bool,
	#[arg(long, help = "Stop at the first object that fails to export")]
	strict: bool,
	#[arg(short, long, help = "Log every node and bone")]
	verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();

	tracing_subscriber::registry()
		.with(fmt::layer())
		.with(if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO })
		.init();

	info!("Parsing scene {}", cli.scene.display());
	let scene = parse_scene(&fs::read_to_string(&cli.scene)?)?;

	let output = cli.output.unwrap_or_else(|| cli.scene.with_extension("i3d"));
	let options = ExportOptions::new(output)
		.with_selection_only(cli.selection_only)
		.with_strict(cli.strict);
	let report = Exporter::new(options).export(&scene)?;

	for warning in &report.warnings {
		warn!("Skipped: {warning}");
	}
	info!(
		"Exported {} nodes, {} shapes, {} materials and {} files to {}",
		report.nodes,
		report.shapes,
		report.materials,
		report.files,
		report.path.display()
	);
	Ok(())
}
