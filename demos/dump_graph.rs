use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use i3dio::export::{ExportOptions, Exporter};
use i3dio::formats::parse_scene;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
	#[arg(help = "Path to a JSON scene dump")]
	scene: PathBuf,
	#[arg(long, help = "Only show selected objects")]
	selection_only: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();

	let scene = parse_scene(&fs::read_to_string(&cli.scene)?)?;
	let options = ExportOptions::new(cli.scene.with_extension("i3d")).with_selection_only(cli.selection_only);
	let build = Exporter::new(options).build(&scene)?;

	let graph = &build.graph;
	println!("{graph}");
	for warning in &build.warnings {
		println!("skipped: {warning}");
	}
	Ok(())
}
