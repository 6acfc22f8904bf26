//! The supported input and output formats.
//!
//! Input formats are looked up by their id in [`INPUT_FORMATS`]. The `autodetect` format looks at the input to
//! decide which of the others to use.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, Write};
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use log::{info, trace, warn};
use serde::Deserialize;
use zip::ZipArchive;
use mapping_tree::{enigma_dir, enigma_file, proguard, tiny_v1, tiny_v2};
use mapping_tree::tree::mappings::{MappingTree, Order};
use mapping_tree::tree::names::DefaultNames;
use mapping_tree::visitor::{CancelToken, Cancellable, MappingVisitor};

/// The path of the mappings inside of a jar or zip file with tiny mappings.
const TINY_ZIP_ENTRY: &str = "mappings/mappings.tiny";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ENIGMA_EXTENSION: &str = ".mapping";

type ReadFn = fn(&Path, &DefaultNames, &mut dyn MappingVisitor) -> Result<()>;

/// An input format, with the function reading it.
pub(crate) struct InputFormat {
	pub(crate) id: &'static str,
	/// Whether the format is read from a directory instead of a file.
	directory: bool,
	read: ReadFn,
}

pub(crate) const AUTODETECT: &str = "autodetect";

pub(crate) static INPUT_FORMATS: &[InputFormat] = &[
	InputFormat { id: "tiny1", directory: false, read: |path, _, visitor| tiny_v1::read_file(path, visitor) },
	InputFormat { id: "tiny2", directory: false, read: |path, _, visitor| tiny_v2::read_file(path, visitor) },
	InputFormat { id: "proguard", directory: false, read: |path, names, visitor| proguard::read_file(path, names, visitor) },
	InputFormat { id: "enigma", directory: true, read: |path, names, visitor| enigma_dir::read(path, names, visitor) },
	InputFormat { id: "enigma_file", directory: false, read: |path, names, visitor| enigma_file::read_file(path, names, visitor) },
	InputFormat { id: "enigma_zip", directory: false, read: read_enigma_zip },
	InputFormat { id: "tiny_zip", directory: false, read: |path, _, visitor| read_tiny_zip(path, visitor) },
	InputFormat { id: AUTODETECT, directory: false, read: read_autodetect },
];

impl InputFormat {
	/// Finds the format with the given id. Unknown ids fall back to autodetection.
	pub(crate) fn by_id(id: &str) -> &'static InputFormat {
		if let Some(format) = INPUT_FORMATS.iter().find(|format| format.id == id) {
			return format;
		}
		warn!("unknown input format {id:?}, detecting the format instead");
		InputFormat::autodetect()
	}

	fn autodetect() -> &'static InputFormat {
		&INPUT_FORMATS[INPUT_FORMATS.len() - 1]
	}

	/// Reads the input at the given path into the visitor.
	pub(crate) fn read(&self, path: &Path, names: &DefaultNames, visitor: &mut dyn MappingVisitor) -> Result<()> {
		if self.id != AUTODETECT {
			if self.directory && !path.is_dir() {
				bail!("input {path:?} must be a directory for format {:?}", self.id);
			}
			if !self.directory && path.is_dir() {
				bail!("input {path:?} must be a file for format {:?}", self.id);
			}
		}
		(self.read)(path, names, visitor)
			.with_context(|| anyhow!("failed to read {path:?} as {:?}", self.id))
	}
}

fn read_autodetect(path: &Path, names: &DefaultNames, visitor: &mut dyn MappingVisitor) -> Result<()> {
	let format = detect(path)?;
	info!("detected format {:?} for {path:?}", format.id);
	format.read(path, names, visitor)
}

/// Detects the format of the input at the given path, from its contents.
pub(crate) fn detect(path: &Path) -> Result<&'static InputFormat> {
	let id = detect_id(path)
		.with_context(|| anyhow!("failed to detect the format of {path:?}"))?;
	INPUT_FORMATS.iter()
		.find(|format| format.id == id)
		.with_context(|| anyhow!("no format with id {id:?}"))
}

fn detect_id(path: &Path) -> Result<&'static str> {
	if path.is_dir() {
		return Ok("enigma");
	}

	let mut file = File::open(path)?;
	let mut magic = [0u8; 4];
	let magic_len = read_up_to(&mut file, &mut magic)?;
	file.rewind()?;

	if &magic[..magic_len] == ZIP_MAGIC {
		trace!("{path:?} is a zip file");
		let archive = ZipArchive::new(file)?;
		let has_tiny = archive.file_names().any(|name| name == TINY_ZIP_ENTRY);
		return Ok(if has_tiny { "tiny_zip" } else { "enigma_zip" });
	}

	let line = BufReader::new(file)
		.lines()
		.map(|line| line.map(|line| line.trim_end().to_owned()))
		.find(|line| !matches!(line, Ok(line) if line.trim().is_empty() || line.starts_with('#')))
		.transpose()?
		.context("no content found")?;
	trace!("detecting the format of {path:?} by its first line {line:?}");

	detect_line(&line).with_context(|| anyhow!("unknown format, first line is {line:?}"))
}

fn detect_line(line: &str) -> Option<&'static str> {
	if line.starts_with("tiny\t2\t") {
		Some("tiny2")
	} else if line.starts_with("v1\t") {
		Some("tiny1")
	} else if line.starts_with("CLASS ") || line.starts_with("CLASS\t") {
		Some("enigma_file")
	} else if line.contains(" -> ") && line.ends_with(':') {
		Some("proguard")
	} else {
		None
	}
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
	let mut len = 0;
	while len < buf.len() {
		match reader.read(&mut buf[len..])? {
			0 => break,
			n => len += n,
		}
	}
	Ok(len)
}

fn open_zip(path: &Path) -> Result<ZipArchive<File>> {
	let file = File::open(path)
		.with_context(|| anyhow!("failed to open zip file {path:?}"))?;
	ZipArchive::new(file)
		.with_context(|| anyhow!("failed to read zip file {path:?}"))
}

/// Reads the tiny file at `mappings/mappings.tiny` inside of a zip file. Its version is detected from its header.
fn read_tiny_zip(path: &Path, visitor: &mut dyn MappingVisitor) -> Result<()> {
	let mut archive = open_zip(path)?;
	let mut entry = archive.by_name(TINY_ZIP_ENTRY)
		.with_context(|| anyhow!("zip file {path:?} doesn't contain {TINY_ZIP_ENTRY:?}"))?;

	let mut content = Vec::new();
	entry.read_to_end(&mut content)?;

	if content.starts_with(b"v1\t") {
		tiny_v1::read(content.as_slice(), visitor)
	} else if content.starts_with(b"tiny\t") {
		tiny_v2::read(content.as_slice(), visitor)
	} else {
		bail!("{TINY_ZIP_ENTRY:?} in {path:?} is neither a tiny v1 nor a tiny v2 file")
	}
}

/// Reads all the `.mapping` files inside of a zip file, sorted by their path.
fn read_enigma_zip(path: &Path, names: &DefaultNames, visitor: &mut dyn MappingVisitor) -> Result<()> {
	let mut archive = open_zip(path)?;

	let mut files: Vec<String> = archive.file_names()
		.filter(|name| name.ends_with(ENIGMA_EXTENSION))
		.map(|name| name.to_owned())
		.collect();
	files.sort();

	visitor.visit_namespaces(&names.namespaces()?)?;
	for name in files {
		let entry = archive.by_name(&name)?;
		enigma_file::read_classes(entry, visitor)
			.with_context(|| anyhow!("failed to read {name:?} in zip file {path:?}"))?;
	}
	visitor.visit_end()
}

/// The output formats.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OutputFormat {
	Tiny1,
	#[default]
	Tiny2,
}

impl OutputFormat {
	/// Writes the tree, checking the token at every class.
	pub(crate) fn write(self, tree: &MappingTree, w: impl Write, order: Order, token: &CancelToken) -> Result<()> {
		match self {
			OutputFormat::Tiny1 => tree.accept(&mut Cancellable::new(tiny_v1::TinyV1Writer::new(w), token.clone()), order),
			OutputFormat::Tiny2 => tree.accept(&mut Cancellable::new(tiny_v2::TinyV2Writer::new(w), token.clone()), order),
		}
	}
}
