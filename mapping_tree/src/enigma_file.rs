//! Functions to read mappings in the "Enigma" format.
//!
//! An Enigma file maps classes of the source namespace to the target namespace, with inner classes nested inside
//! of their outer class:
//! ```text
//! CLASS a com/example/Foo
//! 	COMMENT Does the work.
//! 	CLASS b Inner
//! 	FIELD a count I
//! 	METHOD b doWork (La;)V
//! 		ARG 1 other
//! ```
//! Nested classes only give the part of the name after the `$`. Their target name is extended by the target name
//! of the outer class, unless it's given as a full name.
//!
//! Everything after a `#` is ignored, except on `COMMENT` lines. Access modifiers (`ACC:` fields) are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use jvm_names::{ClassName, FieldDescriptor, FieldName, MethodDescriptor, MethodName};
use crate::lines::IndentedLines;
use crate::tree::names::{DefaultNames, Namespace};
use crate::visitor::{replay, MappingEvent, MappingVisitor};
use self::enigma_line::EnigmaLine;

const CLASS: &str = "CLASS";
const FIELD: &str = "FIELD";
const METHOD: &str = "METHOD";
const PARAMETER: &str = "ARG";
const COMMENT: &str = "COMMENT";

const TARGET: Namespace = Namespace::new(1);

/// Reads an Enigma file, by opening the file given by the path.
pub fn read_file(path: impl AsRef<Path>, names: &DefaultNames, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
	let file = File::open(&path)
		.with_context(|| anyhow!("failed to open mappings file {:?}", path.as_ref()))?;
	read(file, names, visitor)
		.with_context(|| anyhow!("failed to read mappings file {:?} as enigma file", path.as_ref()))
}

/// Reads a single Enigma file, from the given reader.
pub fn read(reader: impl Read, names: &DefaultNames, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
	visitor.visit_namespaces(&names.namespaces()?)?;
	read_classes(reader, visitor)?;
	visitor.visit_end()
}

/// Reads the classes of an Enigma file, by opening the file given by the path. See [`read_classes`].
pub fn read_classes_file(path: impl AsRef<Path>, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
	let file = File::open(&path)
		.with_context(|| anyhow!("failed to open mappings file {:?}", path.as_ref()))?;
	read_classes(file, visitor)
		.with_context(|| anyhow!("failed to read mappings file {:?} as enigma file", path.as_ref()))
}

/// Reads the classes of an Enigma file, without giving the namespaces or the end of the stream to the visitor.
///
/// This allows reading many files into a single stream, like the files of an Enigma directory.
pub fn read_classes(reader: impl Read, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
	let mut lines = BufReader::new(reader)
		.lines()
		.enumerate()
		.filter_map(|(line_number, line)| -> Option<Result<EnigmaLine>> {
			match line {
				Ok(line) => EnigmaLine::new(line_number + 1, &line).transpose(),
				Err(e) => Some(Err(e.into())),
			}
		})
		.peekable();

	IndentedLines::new(&mut lines).on_every_line(|iter, line| {
		match line.kind.as_str() {
			CLASS => {
				let mut classes = Vec::new();
				parse_class(&mut classes, iter, line, None)?;
				for events in &classes {
					replay(events, visitor)?;
				}
				Ok(())
			},
			tag => bail!("unknown mapping target {tag:?} for inside root, allowed are: `CLASS`"),
		}
	}).context("reading lines")
}

/// The events of a single element. The comments are collected separately, as they may appear after the children
/// of the element, but have to be given to the visitor before them.
#[derive(Debug)]
struct Element {
	events: Vec<MappingEvent>,
	comments: Vec<String>,
	children: Vec<MappingEvent>,
}

impl Element {
	fn new(open: MappingEvent, dst: Option<String>) -> Element {
		let mut events = vec![open];
		if let Some(dst) = dst {
			events.push(MappingEvent::DstName(TARGET, dst));
		}
		Element { events, comments: Vec::new(), children: Vec::new() }
	}

	fn add_comment(&mut self, line: EnigmaLine) {
		self.comments.push(line.fields.join(" "));
	}

	fn finish(mut self) -> Vec<MappingEvent> {
		if !self.comments.is_empty() {
			self.events.push(MappingEvent::Comment(self.comments.join("\n")));
		}
		self.events.append(&mut self.children);
		self.events.push(MappingEvent::End);
		self.events
	}
}

/// Parses a class and all the classes nested in it. Every class gets its own list of events in `classes`, with
/// the outer classes coming first.
fn parse_class(
	classes: &mut Vec<Vec<MappingEvent>>,
	iter: &mut IndentedLines<impl Iterator<Item=Result<EnigmaLine>>>,
	line: EnigmaLine,
	parent: Option<(&ClassName, &ClassName)>,
) -> Result<()> {
	let (src, dst) = match line.fields.as_slice() {
		[src] => (src, None),
		[src, mod_] if is_modifier(mod_) => (src, None),
		[src, dst] => (src, Some(dst)),
		[src, dst, _mod] => (src, Some(dst)),
		slice => bail!("illegal number of arguments ({}) for class mapping, expected 1-3, got {slice:?}", slice.len()),
	};

	let src = ClassName::try_from(src.as_str())?;
	let dst = dst.map(|dst| ClassName::try_from(dst.as_str())).transpose()?;
	let (src, dst) = match parent {
		Some((parent_src, parent_dst)) => (
			ClassName::from_inner_class(parent_src.clone(), &src),
			dst.map(|dst| if dst.as_inner().contains('/') { dst } else { ClassName::from_inner_class(parent_dst.clone(), &dst) }),
		),
		None => (src, dst),
	};
	let nested_dst = dst.clone().unwrap_or_else(|| src.clone());

	let slot = classes.len();
	classes.push(Vec::new());

	let mut class = Element::new(MappingEvent::Class(src.clone()), dst.map(String::from));

	iter.next_level().on_every_line(|iter, line| {
		match line.kind.as_str() {
			CLASS => parse_class(classes, iter, line, Some((&src, &nested_dst))),
			FIELD => {
				let (src, dst, desc) = match line.fields.as_slice() {
					[src, desc] => (src, None, desc),
					[src, desc, mod_] if is_modifier(mod_) => (src, None, desc),
					[src, dst, desc] => (src, Some(dst), desc),
					[src, dst, desc, _mod] => (src, Some(dst), desc),
					slice => bail!("illegal number of arguments ({}) for field mapping, expected 2-4, got {slice:?}", slice.len()),
				};
				let open = MappingEvent::Field(FieldName::try_from(src.as_str())?, FieldDescriptor::try_from(desc.as_str())?);
				let mut field = Element::new(open, dst.cloned());

				iter.next_level().on_every_line(|_, line| {
					match line.kind.as_str() {
						COMMENT => {
							field.add_comment(line);
							Ok(())
						},
						tag => bail!("unknown mapping target {tag:?} for inside field, allowed are: `COMMENT`"),
					}
				}).context("reading `FIELD` sub-sections")?;

				class.children.extend(field.finish());
				Ok(())
			},
			METHOD => {
				let (src, dst, desc) = match line.fields.as_slice() {
					[src, desc] => (src, None, desc),
					[src, desc, mod_] if is_modifier(mod_) => (src, None, desc),
					[src, dst, desc] => (src, Some(dst), desc),
					[src, dst, desc, _mod] => (src, Some(dst), desc),
					slice => bail!("illegal number of arguments ({}) for method mapping, expected 2-4, got {slice:?}", slice.len()),
				};
				let open = MappingEvent::Method(MethodName::try_from(src.as_str())?, MethodDescriptor::try_from(desc.as_str())?);
				let mut method = Element::new(open, dst.cloned());

				iter.next_level().on_every_line(|iter, line| {
					match line.kind.as_str() {
						PARAMETER => {
							let (raw_index, dst) = match line.fields.as_slice() {
								[raw_index, dst] => (raw_index, dst),
								slice => bail!("illegal number of arguments ({}) for parameter mapping, expected 2, got {slice:?}", slice.len()),
							};

							let index: usize = raw_index.parse()
								.with_context(|| anyhow!("illegal parameter index {raw_index:?}, index cannot be negative"))?;

							let mut parameter = Element::new(MappingEvent::Parameter(index, None), Some(dst.clone()));

							iter.next_level().on_every_line(|_, line| {
								match line.kind.as_str() {
									COMMENT => {
										parameter.add_comment(line);
										Ok(())
									},
									tag => bail!("unknown mapping target {tag:?} for inside parameter, allowed are: `COMMENT`"),
								}
							}).context("reading `ARG` sub-sections")?;

							method.children.extend(parameter.finish());
							Ok(())
						},
						COMMENT => {
							method.add_comment(line);
							Ok(())
						},
						tag => bail!("unknown mapping target {tag:?} for inside method, allowed are: `ARG`, `COMMENT`"),
					}
				}).context("reading `METHOD` sub-sections")?;

				class.children.extend(method.finish());
				Ok(())
			},
			COMMENT => {
				class.add_comment(line);
				Ok(())
			},
			tag => bail!("unknown mapping target {tag:?} for inside class, allowed are: `CLASS`, `FIELD`, `METHOD`, `COMMENT`"),
		}
	}).with_context(|| anyhow!("reading `CLASS` sub-sections of {src:?}"))?;

	classes[slot] = class.finish();
	Ok(())
}

fn is_modifier(s: &str) -> bool {
	const MODIFIER: &str = "ACC:";
	s.starts_with(MODIFIER)
}

mod enigma_line {
	use anyhow::Result;
	use crate::lines::{split_indentation, Line};

	const JAVA_WHITESPACE: [char; 6] = [' ', '\t', '\n', '\x0b', '\x0c', '\x0d'];

	#[derive(Debug)]
	pub(crate) struct EnigmaLine {
		line_number: usize,
		indentation: usize,
		pub(crate) kind: String,
		/// The fields after the first one. For `COMMENT` lines, this is the text of the comment, as a single field.
		pub(crate) fields: Vec<String>,
	}

	impl EnigmaLine {
		/// Parses a line, giving back `None` for lines without any content.
		pub(crate) fn new(line_number: usize, line: &str) -> Result<Option<EnigmaLine>> {
			let (indentation, line) = split_indentation(line);

			if let Some(text) = line.strip_prefix(super::COMMENT).filter(|text| text.is_empty() || text.starts_with(JAVA_WHITESPACE)) {
				let text = text.strip_prefix(JAVA_WHITESPACE).unwrap_or(text);
				return Ok(Some(EnigmaLine {
					line_number,
					indentation,
					kind: super::COMMENT.to_owned(),
					fields: vec![text.to_owned()],
				}));
			}

			let line = line.split_once('#').map_or(line, |(non_comment, _)| non_comment);

			let mut fields = line.split(JAVA_WHITESPACE)
				.filter(|field| !field.is_empty())
				.map(|field| field.to_owned());

			let Some(kind) = fields.next() else {
				return Ok(None);
			};

			Ok(Some(EnigmaLine {
				line_number,
				indentation,
				kind,
				fields: fields.collect(),
			}))
		}
	}

	impl Line for EnigmaLine {
		fn indentation(&self) -> usize {
			self.indentation
		}
		fn line_number(&self) -> usize {
			self.line_number
		}
	}
}
