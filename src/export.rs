//! One export session: scene graph, document, indentation, file.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::formats::i3d::build_document;
use crate::formats::xml::{indent, XmlElement};
use crate::scene::{build_scene_graph, BuildError, BuildOptions, SceneBuild};
use crate::source::SourceScene;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
	/// Destination `.i3d` file. Its stem names the document.
	pub output: PathBuf,
	pub selection_only: bool,
	pub strict: bool,
}

impl ExportOptions {
	pub fn new(output: impl Into<PathBuf>) -> Self {
		Self {
			output: output.into(),
			selection_only: false,
			strict: false,
		}
	}

	pub fn with_selection_only(mut self, selection_only: bool) -> Self {
		self.selection_only = selection_only;
		self
	}

	pub fn with_strict(mut self, strict: bool) -> Self {
		self.strict = strict;
		self
	}

	fn build_options(&self) -> BuildOptions {
		BuildOptions {
			selection_only: self.selection_only,
			strict: self.strict,
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
	#[error(transparent)]
	Build(#[from] BuildError),
	#[error("Could not write {path:?}\n  - {source}")]
	Io { path: PathBuf, source: io::Error },
}

/// What an export produced.
#[derive(Debug)]
pub struct ExportReport {
	pub path: PathBuf,
	/// Scene nodes written, the synthetic root not included.
	pub nodes: usize,
	pub shapes: usize,
	pub materials: usize,
	pub files: usize,
	/// Objects that were skipped.
	pub warnings: Vec<BuildError>,
}

#[derive(Debug, Clone)]
pub struct Exporter {
	options: ExportOptions,
}

impl Exporter {
	pub fn new(options: ExportOptions) -> Self {
		Self { options }
	}

	pub fn options(&self) -> &ExportOptions {
		&self.options
	}

	/// Builds the scene graph without writing anything.
	pub fn build(&self, scene: &SourceScene) -> Result<SceneBuild, ExportError> {
		Ok(build_scene_graph(scene, self.options.build_options())?)
	}

	/// Builds the indented document for `scene`.
	pub fn document(&self, scene: &SourceScene) -> Result<(XmlElement, SceneBuild), ExportError> {
		let build = self.build(scene)?;
		let mut document = build_document(&build.graph, &document_name(&self.options.output));
		indent(&mut document, 0);
		Ok((document, build))
	}

	pub fn export(&self, scene: &SourceScene) -> Result<ExportReport, ExportError> {
		let path = &self.options.output;
		info!("Exporting {} objects to {}", scene.len(), path.display());

		let (document, build) = self.document(scene)?;
		let graph = &build.graph;
		info!(
			"Scene graph has {} nodes, {} shapes, {} materials, {} files",
			graph.len() - 1,
			graph.shapes.len(),
			graph.materials.len(),
			graph.files.len()
		);

		write_file(&document, path).map_err(|source| ExportError::Io {
			path: path.clone(),
			source,
		})?;

		if !build.warnings.is_empty() {
			warn!("{} objects were skipped, see the report", build.warnings.len());
		}
		info!("Wrote {}", path.display());

		Ok(ExportReport {
			path: path.clone(),
			nodes: graph.len() - 1,
			shapes: graph.shapes.len(),
			materials: graph.materials.len(),
			files: graph.files.len(),
			warnings: build.warnings,
		})
	}
}

fn write_file(document: &XmlElement, path: &Path) -> io::Result<()> {
	let file = File::create(path)?;
	document.write_to(BufWriter::new(file))
}

fn document_name(path: &Path) -> String {
	path.file_stem()
		.map(|stem| stem.to_string_lossy().into_owned())
		.unwrap_or_else(|| "untitled".to_owned())
}
