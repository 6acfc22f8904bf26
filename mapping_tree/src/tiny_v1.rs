//! Functions to read and write mappings in the "Tiny v1" format.
//!
//! Tiny v1 files are flat: every line is a `CLASS`, `FIELD` or `METHOD` line, and members refer to their owner
//! by its name in the first namespace. Parameters, local variables and comments can't be represented.
//!
//! Since the members of a class may appear anywhere in the file, the reader collects them by their owner before
//! emitting anything.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::ops::ControlFlow;
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use log::debug;
use jvm_names::{ClassName, ClassNameSlice, FieldDescriptor, FieldDescriptorSlice, FieldName, FieldNameSlice, LocalVariableNameSlice, MethodDescriptor, MethodDescriptorSlice, MethodName, MethodNameSlice, ParameterNameSlice};
use crate::lines::Line;
use crate::lines::tiny_line::TinyLine;
use crate::tree::mappings::{LocalVariableKey, MappingTree, Order};
use crate::tree::names::{Namespace, Namespaces};
use crate::visitor::MappingVisitor;

const CLASS: &str = "CLASS";
const FIELD: &str = "FIELD";
const METHOD: &str = "METHOD";

#[derive(Debug, Default)]
struct V1Class {
	names: Option<Vec<Option<String>>>,
	fields: Vec<(FieldName, FieldDescriptor, Vec<Option<String>>)>,
	methods: Vec<(MethodName, MethodDescriptor, Vec<Option<String>>)>,
}

/// Reads a tiny v1 file, by opening the file given by the path.
pub fn read_file(path: impl AsRef<Path>, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
	let file = File::open(&path)
		.with_context(|| anyhow!("failed to open mappings file {:?}", path.as_ref()))?;
	read(file, visitor)
		.with_context(|| anyhow!("failed to read mappings file {:?} as tiny v1 file", path.as_ref()))
}

/// Reads the tiny v1 format, from the given reader.
pub fn read(reader: impl Read, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
	let mut lines = BufReader::new(reader)
		.lines()
		.enumerate()
		.filter(|(_, line)| !matches!(line, Ok(line) if line.is_empty() || line.starts_with('#')))
		.map(|(line_number, line)| -> Result<TinyLine> {
			TinyLine::new(line_number + 1, &line?)
		});

	let header = lines.next().context("no header line")??;
	if header.kind != "v1" {
		bail!("header version isn't tiny v1, in line {header:?}");
	}
	let namespaces = Namespaces::try_from(header.rest())?;
	let len = namespaces.len();

	let mut classes: IndexMap<ClassName, V1Class> = IndexMap::new();
	for line in lines {
		let mut line = line?;
		let line_number = line.line_number();

		let kind = std::mem::take(&mut line.kind);
		(|| -> Result<()> {
			match kind.as_str() {
				CLASS => {
					let names = line.into_names(len)?;
					let src = ClassName::try_from(src_name(&names)?)?;
					let class = classes.entry(src).or_default();
					if let Some(existing) = &class.names {
						bail!("class is declared a second time, already got {existing:?}");
					}
					class.names = Some(names);
				},
				FIELD => {
					let owner = ClassName::try_from(line.next()?)?;
					let desc = FieldDescriptor::try_from(line.next()?)?;
					let names = line.into_names(len)?;
					let src = FieldName::try_from(src_name(&names)?)?;
					classes.entry(owner).or_default().fields.push((src, desc, names));
				},
				METHOD => {
					let owner = ClassName::try_from(line.next()?)?;
					let desc = MethodDescriptor::try_from(line.next()?)?;
					let names = line.into_names(len)?;
					let src = MethodName::try_from(src_name(&names)?)?;
					classes.entry(owner).or_default().methods.push((src, desc, names));
				},
				tag => debug!("skipping line with unknown kind {tag:?}"),
			}
			Ok(())
		})().with_context(|| anyhow!("in line {line_number}"))?;
	}

	visitor.visit_namespaces(&namespaces)?;
	for (src, class) in classes {
		if visitor.visit_class(&src)?.is_break() {
			continue;
		}
		if let Some(names) = &class.names {
			visit_dst_names(visitor, names)?;
		}
		for (src, desc, names) in &class.fields {
			if visitor.visit_field(src, desc)?.is_continue() {
				visit_dst_names(visitor, names)?;
				visitor.visit_end()?;
			}
		}
		for (src, desc, names) in &class.methods {
			if visitor.visit_method(src, desc)?.is_continue() {
				visit_dst_names(visitor, names)?;
				visitor.visit_end()?;
			}
		}
		visitor.visit_end()?;
	}
	visitor.visit_end()
}

fn src_name(names: &[Option<String>]) -> Result<&str> {
	names.first()
		.and_then(Option::as_deref)
		.context("the name in the first namespace must not be empty")
}

fn visit_dst_names(visitor: &mut (impl MappingVisitor + ?Sized), names: &[Option<String>]) -> Result<()> {
	for (index, name) in names.iter().enumerate().skip(1) {
		if let Some(name) = name {
			visitor.visit_dst_name(Namespace::new(index), name)?;
		}
	}
	Ok(())
}

/// A [`MappingVisitor`] writing the tiny v1 format.
///
/// Parameters and local variables are skipped, and comments are dropped.
#[derive(Debug)]
pub struct TinyV1Writer<W: Write> {
	w: BufWriter<W>,
	len: usize,
	owner: Option<ClassName>,
	depth: usize,
	/// The start of the line of the current element, and its names.
	pending: Option<(String, Vec<Option<String>>)>,
}

impl<W: Write> TinyV1Writer<W> {
	pub fn new(w: W) -> TinyV1Writer<W> {
		TinyV1Writer {
			w: BufWriter::new(w),
			len: 0,
			owner: None,
			depth: 0,
			pending: None,
		}
	}

	fn flush_pending(&mut self) -> Result<()> {
		if let Some((prefix, names)) = self.pending.take() {
			self.w.write_all(prefix.as_bytes())?;
			for name in &names {
				self.w.write_all(b"\t")?;
				if let Some(name) = name {
					self.w.write_all(name.as_bytes())?;
				}
			}
			self.w.write_all(b"\n")?;
		}
		Ok(())
	}

	fn open(&mut self, prefix: String, src: &str) -> Result<ControlFlow<()>> {
		self.flush_pending()?;
		check_name(src)?;
		let mut names = vec![None; self.len];
		if let Some(first) = names.first_mut() {
			*first = Some(src.to_owned());
		}
		self.pending = Some((prefix, names));
		self.depth += 1;
		Ok(ControlFlow::Continue(()))
	}

	fn owner(&self) -> Result<&ClassName> {
		self.owner.as_ref().context("members must be inside of a class")
	}
}

fn check_name(name: &str) -> Result<()> {
	if name.contains(['\t', '\n', '\r']) {
		bail!("name {name:?} cannot be written to a tiny v1 file, it contains a tab or a line break");
	}
	Ok(())
}

impl<W: Write> MappingVisitor for TinyV1Writer<W> {
	fn visit_namespaces(&mut self, namespaces: &Namespaces) -> Result<()> {
		self.len = namespaces.len();
		write!(self.w, "v1")?;
		for namespace in namespaces.names() {
			write!(self.w, "\t{namespace}")?;
		}
		writeln!(self.w)?;
		Ok(())
	}

	fn visit_class(&mut self, src: &ClassNameSlice) -> Result<ControlFlow<()>> {
		self.owner = Some(src.to_owned());
		self.open(CLASS.to_owned(), src.as_inner())
	}

	fn visit_field(&mut self, src: &FieldNameSlice, desc: &FieldDescriptorSlice) -> Result<ControlFlow<()>> {
		let prefix = format!("{FIELD}\t{}\t{desc}", self.owner()?);
		self.open(prefix, src.as_inner())
	}

	fn visit_method(&mut self, src: &MethodNameSlice, desc: &MethodDescriptorSlice) -> Result<ControlFlow<()>> {
		let prefix = format!("{METHOD}\t{}\t{desc}", self.owner()?);
		self.open(prefix, src.as_inner())
	}

	fn visit_parameter(&mut self, _index: usize, _src: Option<&ParameterNameSlice>) -> Result<ControlFlow<()>> {
		Ok(ControlFlow::Break(()))
	}

	fn visit_local_variable(&mut self, _key: LocalVariableKey, _lvt_row_index: Option<usize>, _src: Option<&LocalVariableNameSlice>) -> Result<ControlFlow<()>> {
		Ok(ControlFlow::Break(()))
	}

	fn visit_dst_name(&mut self, namespace: Namespace, name: &str) -> Result<()> {
		check_name(name)?;
		let (_, names) = self.pending.as_mut()
			.context("destination names must directly follow the element they belong to")?;
		let slot = names.get_mut(namespace.index())
			.with_context(|| anyhow!("namespace {namespace:?} is out of range"))?;
		*slot = Some(name.to_owned());
		Ok(())
	}

	fn visit_comment(&mut self, _comment: &str) -> Result<()> {
		Ok(())
	}

	fn visit_end(&mut self) -> Result<()> {
		self.flush_pending()?;
		match self.depth {
			0 => self.w.flush()?,
			1 => {
				self.owner = None;
				self.depth = 0;
			},
			_ => self.depth -= 1,
		}
		Ok(())
	}
}

/// Writes the given tree to the given writer, in the tiny v1 format.
pub fn write(tree: &MappingTree, w: impl Write, order: Order) -> Result<()> {
	let mut writer = TinyV1Writer::new(w);
	tree.accept(&mut writer, order)
}

/// Writes the given tree into a `String`, in the tiny v1 format.
pub fn write_string(tree: &MappingTree, order: Order) -> Result<String> {
	let mut vec = Vec::new();
	write(tree, &mut vec, order)?;
	String::from_utf8(vec).context("failed to convert written mappings to utf8")
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use jvm_names::ClassName;
	use crate::tree::builder::MappingTreeBuilder;
	use crate::tree::mappings::{MappingTree, Order};
	use crate::tree::names::Namespace;
	use crate::visitor::StreamChecker;

	fn read(input: &str) -> Result<MappingTree> {
		let mut checker = StreamChecker::new(MappingTreeBuilder::default());
		super::read(input.as_bytes(), &mut checker)?;
		checker.finish()?.finish()
	}

	#[test]
	fn members_are_grouped_by_owner() -> Result<()> {
		let input = "\
v1	official	named
# a comment
FIELD	a	I	f	count
CLASS	b	com/example/Bar
CLASS	a	com/example/Foo
METHOD	a	(Lb;)V	m	doWork
METHOD	c	()V	n	run
";
		let tree = read(input)?;

		let names: Vec<String> = tree.classes().map(|class| class.src().to_string()).collect();
		assert_eq!(names, vec!["a", "b", "c"]);

		let a = tree.get_class(&ClassName::try_from("a")?).unwrap();
		assert_eq!(a.info.names.get(Namespace::new(1)).unwrap(), "com/example/Foo");
		assert_eq!(a.get_field("f", "I").unwrap().info.names.get(Namespace::new(1)).unwrap(), "count");

		let c = tree.get_class(&ClassName::try_from("c")?).unwrap();
		assert_eq!(c.info.names.get(Namespace::new(1)), None);

		let output = "\
v1	official	named
CLASS	a	com/example/Foo
FIELD	a	I	f	count
METHOD	a	(Lb;)V	m	doWork
CLASS	b	com/example/Bar
CLASS	c\t
METHOD	c	()V	n	run
";
		assert_eq!(super::write_string(&tree, Order::Insertion)?, output);
		Ok(())
	}

	#[test]
	fn parameters_and_comments_are_dropped() -> Result<()> {
		let input = "\
tiny	2	0	official	named
c	a	Foo
	c	A comment.
	m	()V	m	run
		p	1		arg
";
		let mut checker = StreamChecker::new(MappingTreeBuilder::default());
		crate::tiny_v2::read(input.as_bytes(), &mut checker)?;
		let tree = checker.finish()?.finish()?;

		let output = "\
v1	official	named
CLASS	a	Foo
METHOD	a	()V	m	run
";
		assert_eq!(super::write_string(&tree, Order::Insertion)?, output);
		Ok(())
	}
}
