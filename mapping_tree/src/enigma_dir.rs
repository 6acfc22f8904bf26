//! Functions to read mappings in the "Enigma directory" format.
//!
//! An Enigma directory contains one Enigma file (ending in `.mapping`) per top level class, in subdirectories
//! following the package of the class. All the files are read into a single stream, in the order of their paths.

use std::path::Path;
use anyhow::{anyhow, Context, Result};
use log::trace;
use walkdir::WalkDir;
use crate::enigma_file;
use crate::tree::names::DefaultNames;
use crate::visitor::MappingVisitor;

const MAPPING_EXTENSION: &str = "mapping";

/// Reads all the `.mapping` files in the directory, and all of its subdirectories.
pub fn read(path: impl AsRef<Path>, names: &DefaultNames, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
	let path = path.as_ref();

	visitor.visit_namespaces(&names.namespaces()?)?;

	let files = WalkDir::new(path)
		.sort_by_file_name() // make it deterministic
		.into_iter()
		.filter_map(|entry| match entry {
			Ok(entry) if entry.file_type().is_dir() => None,
			// skip non enigma mapping files
			Ok(entry) if !entry.path().extension().is_some_and(|ex| ex == MAPPING_EXTENSION) => None,
			entry => Some(entry.map(|entry| entry.into_path())),
		});

	for file in files {
		let file = file.with_context(|| anyhow!("failed to walk mappings directory {path:?}"))?;
		trace!("reading enigma file {file:?}");
		enigma_file::read_classes_file(file, visitor)?;
	}

	visitor.visit_end()
}

#[cfg(test)]
mod testing {
	use std::fs;
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::tree::builder::MappingTreeBuilder;
	use crate::tree::mappings::Order;
	use crate::tree::names::DefaultNames;
	use crate::visitor::StreamChecker;

	#[test]
	fn read_sorted_files() -> Result<()> {
		let dir = tempfile::tempdir()?;
		fs::create_dir_all(dir.path().join("com/example"))?;
		fs::write(dir.path().join("com/example/Foo.mapping"), "CLASS b com/example/Foo\n\tFIELD a count I\n")?;
		fs::write(dir.path().join("com/example/Foo.txt"), "not a mapping file")?;
		fs::write(dir.path().join("Bar.mapping"), "CLASS a Bar\n")?;

		let mut checker = StreamChecker::new(MappingTreeBuilder::default());
		super::read(dir.path(), &DefaultNames::default(), &mut checker)?;
		let tree = checker.finish()?.finish()?;

		let expected = "\
tiny	2	0	source	target
c	a	Bar
c	b	com/example/Foo
	f	I	a	count
";
		assert_eq!(crate::tiny_v2::write_string(&tree, Order::Insertion)?, expected);
		Ok(())
	}

	#[test]
	fn broken_file_is_an_error() -> Result<()> {
		let dir = tempfile::tempdir()?;
		fs::write(dir.path().join("Foo.mapping"), "FIELD a b I\n")?;

		let mut checker = StreamChecker::new(MappingTreeBuilder::default());
		assert!(super::read(dir.path(), &DefaultNames::default(), &mut checker).is_err());
		Ok(())
	}
}
