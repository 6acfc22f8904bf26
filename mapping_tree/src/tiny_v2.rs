//! Functions to read and write mappings in the "Tiny v2" format.
//!
//! # Reading
//! You can read a `.tiny` file using the [`read_file`] method, by passing a path.
//! If you already have a [`Read`]er, you can use the [`read`] method. Both emit the mappings into a
//! [`MappingVisitor`].
//!
//! Sections and properties that aren't known are skipped. Comments are always unescaped, names only if the
//! `escaped-names` property is given.
//!
//! # Writing
//! The [`TinyV2Writer`] is a [`MappingVisitor`] that writes everything it's given. For writing a whole
//! [`MappingTree`], there are the [`write`][fn@write] and [`write_string`] methods.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::ops::ControlFlow;
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use jvm_names::{ClassName, ClassNameSlice, FieldDescriptor, FieldDescriptorSlice, FieldName, FieldNameSlice, LocalVariableName, LocalVariableNameSlice, MethodDescriptor, MethodDescriptorSlice, MethodName, MethodNameSlice, ParameterName, ParameterNameSlice};
use crate::lines::tiny_line::TinyLine;
use crate::lines::{IndentedLines, Line};
use crate::tree::mappings::{LocalVariableKey, MappingTree, Order};
use crate::tree::names::{Namespace, Namespaces};
use crate::visitor::MappingVisitor;

const ESCAPED_NAMES: &str = "escaped-names";

/// Reads a `.tiny` file (tiny v2), by opening the file given by the path.
pub fn read_file(path: impl AsRef<Path>, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
	let file = File::open(&path)
		.with_context(|| anyhow!("failed to open mappings file {:?}", path.as_ref()))?;
	read(file, visitor)
		.with_context(|| anyhow!("failed to read mappings file {:?} as tiny v2 file", path.as_ref()))
}

#[allow(clippy::tabs_in_doc_comments)]
/// Reads the tiny v2 format, from the given reader.
///
/// ```
/// # use pretty_assertions::assert_eq;
/// use mapping_tree::tree::builder::MappingTreeBuilder;
/// let string = "\
/// tiny	2	0	namespaceA	namespaceB	namespaceC
/// c	A	B	C
/// 	f	LA;	a	b	c
/// 	m	(LA;)V	a	b	c
/// ";
///
/// let mut builder = MappingTreeBuilder::default();
/// mapping_tree::tiny_v2::read(string.as_bytes(), &mut builder).unwrap();
/// let tree = builder.finish().unwrap();
///
/// tree.namespaces().check_that(&["namespaceA", "namespaceB", "namespaceC"]).unwrap();
/// assert_eq!(tree.class_count(), 1);
/// ```
pub fn read(reader: impl Read, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
	let mut lines = BufReader::new(reader)
		.lines()
		.enumerate()
		.filter(|(_, line)| !matches!(line, Ok(line) if line.is_empty()))
		.map(|(line_number, line)| -> Result<TinyLine> {
			TinyLine::new(line_number + 1, &line?)
		})
		.peekable();

	let mut header = lines.next().context("no header line")??;
	let header_line_number = header.line_number();

	if header.kind != "tiny" || header.next()? != "2" {
		bail!("header version isn't tiny v2, in line {header:?}");
	}
	let minor = header.next()?;
	if minor != "0" {
		debug!("reading tiny v2 file with unknown minor version {minor:?} as version 2.0");
	}

	let namespaces = Namespaces::try_from(header.rest())
		.with_context(|| anyhow!("on line {header_line_number}"))?;
	let len = namespaces.len();
	visitor.visit_namespaces(&namespaces)?;

	let mut escaped = false;
	while let Some(Ok(line)) = lines.peek() {
		if line.indentation() == 0 {
			break;
		}
		if let Some(property) = lines.next().transpose()? {
			if property.kind == ESCAPED_NAMES {
				escaped = true;
			} else {
				debug!("ignoring unknown property {:?} in line {}", property.kind, property.line_number());
			}
		}
	}

	let read_names = |line: TinyLine| -> Result<Vec<Option<String>>> {
		let names = line.into_names(len)?;
		if escaped {
			names.into_iter()
				.map(|name| name.map(|name| unescape(&name)).transpose())
				.collect()
		} else {
			Ok(names)
		}
	};

	IndentedLines::new(&mut lines).on_every_line(|iter, line| {
		if line.kind == "c" {
			let names = read_names(line)?;
			let src = ClassName::try_from(src_name(&names)?)?;

			if visitor.visit_class(&src)?.is_break() {
				return iter.skip_next_level();
			}
			visit_dst_names(visitor, &names)?;

			iter.next_level().on_every_line(|iter, mut line| {
				if line.kind == "f" {
					let desc = FieldDescriptor::try_from(line.next()?)?;
					let names = read_names(line)?;
					let src = FieldName::try_from(src_name(&names)?)?;

					if visitor.visit_field(&src, &desc)?.is_break() {
						return iter.skip_next_level();
					}
					visit_dst_names(visitor, &names)?;

					iter.next_level().on_every_line(|iter, line| {
						read_comment_or_skip(visitor, iter, line)
					}).context("reading field sub-sections")?;

					visitor.visit_end()
				} else if line.kind == "m" {
					let desc = MethodDescriptor::try_from(line.next()?)?;
					let names = read_names(line)?;
					let src = MethodName::try_from(src_name(&names)?)?;

					if visitor.visit_method(&src, &desc)?.is_break() {
						return iter.skip_next_level();
					}
					visit_dst_names(visitor, &names)?;

					iter.next_level().on_every_line(|iter, mut line| {
						if line.kind == "p" {
							let index = line.next()?.parse()?;
							let names = read_names(line)?;
							let src = names[0].as_deref().map(ParameterName::try_from).transpose()?;

							if visitor.visit_parameter(index, src.as_deref())?.is_break() {
								return iter.skip_next_level();
							}
							visit_dst_names(visitor, &names)?;

							iter.next_level().on_every_line(|iter, line| {
								read_comment_or_skip(visitor, iter, line)
							}).context("reading parameter sub-sections")?;

							visitor.visit_end()
						} else if line.kind == "v" {
							let lv_index = line.next()?.parse()?;
							let start_offset = line.next()?.parse()?;
							let lvt_row_index: i64 = line.next()?.parse()?;
							let lvt_row_index = usize::try_from(lvt_row_index).ok();
							let names = read_names(line)?;
							let src = names[0].as_deref().map(LocalVariableName::try_from).transpose()?;

							let key = LocalVariableKey { lv_index, start_offset };
							if visitor.visit_local_variable(key, lvt_row_index, src.as_deref())?.is_break() {
								return iter.skip_next_level();
							}
							visit_dst_names(visitor, &names)?;

							iter.next_level().on_every_line(|iter, line| {
								read_comment_or_skip(visitor, iter, line)
							}).context("reading local variable sub-sections")?;

							visitor.visit_end()
						} else {
							read_comment_or_skip(visitor, iter, line)
						}
					}).context("reading method sub-sections")?;

					visitor.visit_end()
				} else {
					read_comment_or_skip(visitor, iter, line)
				}
			}).context("reading class sub-sections")?;

			visitor.visit_end()
		} else {
			debug!("skipping unknown section {:?} in line {}", line.kind, line.line_number());
			iter.skip_next_level()
		}
	}).context("reading lines")?;

	if let Some(line) = lines.next() {
		bail!("expected end of input, got: {line:?}");
	}

	visitor.visit_end()
}

fn src_name(names: &[Option<String>]) -> Result<&str> {
	names.first()
		.and_then(Option::as_deref)
		.context("the name in the source namespace must not be empty")
}

fn visit_dst_names(visitor: &mut (impl MappingVisitor + ?Sized), names: &[Option<String>]) -> Result<()> {
	for (index, name) in names.iter().enumerate().skip(1) {
		if let Some(name) = name {
			visitor.visit_dst_name(Namespace::new(index), name)?;
		}
	}
	Ok(())
}

fn read_comment_or_skip<I>(visitor: &mut (impl MappingVisitor + ?Sized), iter: &mut IndentedLines<'_, I>, line: TinyLine) -> Result<()>
where
	I: Iterator<Item=Result<TinyLine>>,
{
	if line.kind == "c" {
		let comment = unescape(&line.end()?)?;
		visitor.visit_comment(&comment)?;
	} else {
		debug!("skipping unknown section {:?} in line {}", line.kind, line.line_number());
	}
	iter.skip_next_level()
}

fn unescape(string: &str) -> Result<String> {
	if !string.contains('\\') {
		return Ok(string.to_owned());
	}

	let mut result = String::with_capacity(string.len());
	let mut chars = string.chars();
	while let Some(ch) = chars.next() {
		if ch != '\\' {
			result.push(ch);
			continue;
		}
		result.push(match chars.next() {
			Some('\\') => '\\',
			Some('n') => '\n',
			Some('r') => '\r',
			Some('t') => '\t',
			Some('0') => '\0',
			Some(other) => bail!("unknown escape sequence \\{other} in {string:?}"),
			None => bail!("unfinished escape sequence at the end of {string:?}"),
		});
	}
	Ok(result)
}

fn escape(string: &str) -> Cow<'_, str> {
	if !string.contains(['\\', '\n', '\r', '\t', '\0']) {
		return Cow::Borrowed(string);
	}

	let mut result = String::with_capacity(string.len() + 8);
	for ch in string.chars() {
		match ch {
			'\\' => result.push_str("\\\\"),
			'\n' => result.push_str("\\n"),
			'\r' => result.push_str("\\r"),
			'\t' => result.push_str("\\t"),
			'\0' => result.push_str("\\0"),
			ch => result.push(ch),
		}
	}
	Cow::Owned(result)
}

/// A line of an element that still gets destination names.
#[derive(Debug)]
struct Pending {
	indent: usize,
	prefix: String,
	names: Vec<Option<String>>,
}

/// A [`MappingVisitor`] writing the tiny v2 format.
///
/// The header is written before any name is known, so the `escaped-names` property is never written, and names are
/// written as they are. Names containing a tab or a line break are an error, even though [`read`] accepts them in
/// escaped form. Comments are always escaped.
///
/// The output is flushed when the stream is closed.
#[derive(Debug)]
pub struct TinyV2Writer<W: Write> {
	w: BufWriter<W>,
	len: usize,
	depth: usize,
	pending: Option<Pending>,
}

impl<W: Write> TinyV2Writer<W> {
	pub fn new(w: W) -> TinyV2Writer<W> {
		TinyV2Writer {
			// the buffering makes it much faster
			w: BufWriter::new(w),
			len: 0,
			depth: 0,
			pending: None,
		}
	}

	fn flush_pending(&mut self) -> Result<()> {
		if let Some(pending) = self.pending.take() {
			for _ in 0..pending.indent {
				self.w.write_all(b"\t")?;
			}
			self.w.write_all(pending.prefix.as_bytes())?;
			for name in &pending.names {
				self.w.write_all(b"\t")?;
				if let Some(name) = name {
					self.w.write_all(name.as_bytes())?;
				}
			}
			self.w.write_all(b"\n")?;
		}
		Ok(())
	}

	fn open(&mut self, prefix: String, src: Option<&str>) -> Result<ControlFlow<()>> {
		self.flush_pending()?;
		if let Some(src) = src {
			check_name(src)?;
		}

		let mut names = vec![None; self.len];
		if let Some(first) = names.first_mut() {
			*first = src.map(ToOwned::to_owned);
		}
		self.pending = Some(Pending { indent: self.depth, prefix, names });
		self.depth += 1;
		Ok(ControlFlow::Continue(()))
	}
}

fn check_name(name: &str) -> Result<()> {
	if name.contains(['\t', '\n', '\r']) {
		bail!("name {name:?} cannot be written to a tiny v2 file, it contains a tab or a line break");
	}
	Ok(())
}

impl<W: Write> MappingVisitor for TinyV2Writer<W> {
	fn visit_namespaces(&mut self, namespaces: &Namespaces) -> Result<()> {
		self.len = namespaces.len();
		write!(self.w, "tiny\t2\t0")?;
		for namespace in namespaces.names() {
			write!(self.w, "\t{namespace}")?;
		}
		writeln!(self.w)?;
		Ok(())
	}

	fn visit_class(&mut self, src: &ClassNameSlice) -> Result<ControlFlow<()>> {
		self.open("c".to_owned(), Some(src.as_inner()))
	}

	fn visit_field(&mut self, src: &FieldNameSlice, desc: &FieldDescriptorSlice) -> Result<ControlFlow<()>> {
		self.open(format!("f\t{desc}"), Some(src.as_inner()))
	}

	fn visit_method(&mut self, src: &MethodNameSlice, desc: &MethodDescriptorSlice) -> Result<ControlFlow<()>> {
		self.open(format!("m\t{desc}"), Some(src.as_inner()))
	}

	fn visit_parameter(&mut self, index: usize, src: Option<&ParameterNameSlice>) -> Result<ControlFlow<()>> {
		self.open(format!("p\t{index}"), src.map(ParameterNameSlice::as_inner))
	}

	fn visit_local_variable(&mut self, key: LocalVariableKey, lvt_row_index: Option<usize>, src: Option<&LocalVariableNameSlice>) -> Result<ControlFlow<()>> {
		let prefix = match lvt_row_index {
			Some(lvt_row_index) => format!("v\t{}\t{}\t{lvt_row_index}", key.lv_index, key.start_offset),
			None => format!("v\t{}\t{}\t-1", key.lv_index, key.start_offset),
		};
		self.open(prefix, src.map(LocalVariableNameSlice::as_inner))
	}

	fn visit_dst_name(&mut self, namespace: Namespace, name: &str) -> Result<()> {
		check_name(name)?;
		let pending = self.pending.as_mut()
			.context("destination names must directly follow the element they belong to")?;
		let slot = pending.names.get_mut(namespace.index())
			.with_context(|| anyhow!("namespace {namespace:?} is out of range"))?;
		*slot = Some(name.to_owned());
		Ok(())
	}

	fn visit_comment(&mut self, comment: &str) -> Result<()> {
		self.flush_pending()?;
		for _ in 0..self.depth {
			self.w.write_all(b"\t")?;
		}
		writeln!(self.w, "c\t{}", escape(comment))?;
		Ok(())
	}

	fn visit_end(&mut self) -> Result<()> {
		self.flush_pending()?;
		if self.depth == 0 {
			self.w.flush()?;
		} else {
			self.depth -= 1;
		}
		Ok(())
	}
}

/// Writes the given tree to the given writer, in the tiny v2 format.
pub fn write(tree: &MappingTree, w: impl Write, order: Order) -> Result<()> {
	let mut writer = TinyV2Writer::new(w);
	tree.accept(&mut writer, order)
}

/// Writes the given tree into a `String`, in the tiny v2 format.
///
/// This method is of most use in test cases, where you also use the `pretty_assertions` crate for viewing string
/// diffs.
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
	fn round_trip() -> Result<()> {
		let input = "\
tiny	2	0	official	intermediary	named
c	a	class_1	com/example/Foo
	c	A class.\\nWith two lines.
	f	I	a	field_1	count
	m	(La;)V	b	method_1	doWork
		c	Does the work.
		p	1			other
			c	The other one.
		v	2	5	-1			tmp
		v	3	7	1			tmp2
c	b	class_2	
";
		let tree = read(input)?;
		assert_eq!(super::write_string(&tree, Order::Insertion)?, input);

		let foo = tree.get_class(&ClassName::try_from("a")?).unwrap();
		assert_eq!(foo.javadoc.as_ref().unwrap().0, "A class.\nWith two lines.");
		let method = foo.get_method("b", "(La;)V").unwrap();
		assert_eq!(method.local_variables.len(), 2);
		Ok(())
	}

	#[test]
	fn sorted_output() -> Result<()> {
		let input = "\
tiny	2	0	a	b
c	D	E
c	A	B
	m	()V	methodB	b
	f	I	x	y
	m	()V	methodA	a
";
		let output = "\
tiny	2	0	a	b
c	A	B
	f	I	x	y
	m	()V	methodA	a
	m	()V	methodB	b
c	D	E
";
		assert_eq!(super::write_string(&read(input)?, Order::Sorted)?, output);
		Ok(())
	}

	#[test]
	fn escaped_names_and_unknown_sections() -> Result<()> {
		let input = "\
tiny	2	0	a	b
	escaped-names
	some-property	value
c	A	B\\\\C
	x	unknown	section
		c	nested in it
	f	I	x	y
		c	field comment
x	top	level
	nested
";
		let tree = read(input)?;
		assert_eq!(tree.class_count(), 1);

		let a = tree.get_class(&ClassName::try_from("A")?).unwrap();
		assert_eq!(a.info.names.get(Namespace::new(1)).unwrap(), "B\\C");
		assert_eq!(a.get_field("x", "I").unwrap().javadoc.as_ref().unwrap().0, "field comment");
		Ok(())
	}

	#[test]
	fn escaped_tab_cannot_be_written() -> Result<()> {
		let input = "\
tiny	2	0	a	b
	escaped-names
c	A	B\\tC
";
		let tree = read(input)?;
		assert_eq!(tree.get_class(&ClassName::try_from("A")?).unwrap().info.names.get(Namespace::new(1)).unwrap(), "B\tC");

		assert!(super::write_string(&tree, Order::Insertion).is_err());
		Ok(())
	}

	#[test]
	fn wrong_column_count() {
		let input = "\
tiny	2	0	a	b
c	A	B	C
";
		assert!(read(input).is_err());
	}
}
