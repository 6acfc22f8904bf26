//! Functions to read ProGuard (and R8) mapping files.
//!
//! A ProGuard file maps the original names (the source namespace) to the obfuscated names:
//! ```text
//! com.example.Foo -> a:
//!     int count -> a
//!     1:4:void doWork(java.lang.String,int):12:15 -> b
//! ```
//! Types are written the way Java source does, and are turned into descriptors while reading.
//!
//! Lines of inlined methods that come from other classes are dropped. For a run of methods sharing the same
//! line range and the same obfuscated name, only the last one is kept, as that's the method the inlined ones were
//! inlined into. Methods with the same line range but different obfuscated names are distinct methods.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use indexmap::map::Entry;
use log::debug;
use jvm_names::{ClassName, FieldDescriptor, FieldName, MethodDescriptor, MethodName};
use crate::tree::names::{DefaultNames, Namespace};
use crate::visitor::MappingVisitor;

const ARROW: &str = " -> ";

#[derive(Debug)]
struct ProGuardClass {
	dst: String,
	fields: IndexMap<(FieldName, FieldDescriptor), String>,
	methods: IndexMap<(MethodName, MethodDescriptor), String>,
}

#[derive(Debug)]
struct PendingMethod {
	line_range: String,
	key: (MethodName, MethodDescriptor),
	dst: String,
}

#[derive(Debug)]
enum Member {
	Field(FieldName, FieldDescriptor, String),
	Method(PendingMethod),
}

/// Reads a ProGuard file, by opening the file given by the path.
pub fn read_file(path: impl AsRef<Path>, names: &DefaultNames, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
	let file = File::open(&path)
		.with_context(|| anyhow!("failed to open mappings file {:?}", path.as_ref()))?;
	read(file, names, visitor)
		.with_context(|| anyhow!("failed to read mappings file {:?} as proguard file", path.as_ref()))
}

/// Reads the ProGuard format, from the given reader.
///
/// The namespaces of the stream are the given default names, the original names being the source namespace.
pub fn read(reader: impl Read, names: &DefaultNames, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
	let mut classes: IndexMap<ClassName, ProGuardClass> = IndexMap::new();
	let mut current: Option<ClassName> = None;
	let mut pending: Option<PendingMethod> = None;

	for (line_number, line) in BufReader::new(reader).lines().enumerate() {
		let line = line?;
		let line_number = line_number + 1;

		(|| -> Result<()> {
			let trimmed = line.trim();
			if trimmed.is_empty() || trimmed.starts_with('#') {
				return Ok(());
			}

			if !line.starts_with(char::is_whitespace) {
				commit(&mut classes, current.as_ref(), pending.take())?;

				let (src, dst) = parse_class_line(trimmed)?;
				match classes.entry(src.clone()) {
					Entry::Occupied(e) => {
						debug!("class {src} is given a second time, with {dst:?}, keeping {:?}", e.get().dst);
					},
					Entry::Vacant(e) => {
						e.insert(ProGuardClass { dst, fields: IndexMap::new(), methods: IndexMap::new() });
					},
				}
				current = Some(src);
				return Ok(());
			}

			if current.is_none() {
				bail!("member line before the first class line");
			}

			match parse_member_line(trimmed)? {
				None => {},
				Some(Member::Field(name, desc, dst)) => {
					commit(&mut classes, current.as_ref(), pending.take())?;
					if let Some(class) = current.as_ref().and_then(|current| classes.get_mut(current)) {
						insert_first(&mut class.fields, (name, desc), dst);
					}
				},
				Some(Member::Method(method)) => {
					let same_run = pending.as_ref().is_some_and(|pending| {
						!method.line_range.is_empty() && pending.line_range == method.line_range && pending.dst == method.dst
					});
					if same_run {
						if let Some(inlined) = pending.replace(method) {
							debug!("dropping method {:?}, it's inlined into the next one", inlined.key);
						}
					} else {
						commit(&mut classes, current.as_ref(), pending.replace(method))?;
					}
				},
			}
			Ok(())
		})().with_context(|| anyhow!("in line {line_number}: {line:?}"))?;
	}
	commit(&mut classes, current.as_ref(), pending.take())?;

	visitor.visit_namespaces(&names.namespaces()?)?;
	let target = Namespace::new(1);
	for (src, class) in &classes {
		if visitor.visit_class(src)?.is_break() {
			continue;
		}
		visitor.visit_dst_name(target, &class.dst)?;
		for ((name, desc), dst) in &class.fields {
			if visitor.visit_field(name, desc)?.is_continue() {
				visitor.visit_dst_name(target, dst)?;
				visitor.visit_end()?;
			}
		}
		for ((name, desc), dst) in &class.methods {
			if visitor.visit_method(name, desc)?.is_continue() {
				visitor.visit_dst_name(target, dst)?;
				visitor.visit_end()?;
			}
		}
		visitor.visit_end()?;
	}
	visitor.visit_end()
}

fn commit(classes: &mut IndexMap<ClassName, ProGuardClass>, current: Option<&ClassName>, method: Option<PendingMethod>) -> Result<()> {
	if let Some(method) = method {
		let class = current.and_then(|current| classes.get_mut(current))
			.context("method outside of a class")?;
		insert_first(&mut class.methods, method.key, method.dst);
	}
	Ok(())
}

fn insert_first<K: std::fmt::Debug + std::hash::Hash + Eq>(map: &mut IndexMap<K, String>, key: K, dst: String) {
	match map.entry(key) {
		Entry::Occupied(e) => {
			if *e.get() != dst {
				debug!("member {:?} is given a second time, with {dst:?}, keeping {:?}", e.key(), e.get());
			}
		},
		Entry::Vacant(e) => {
			e.insert(dst);
		},
	}
}

fn parse_class_line(line: &str) -> Result<(ClassName, String)> {
	let line = line.strip_suffix(':')
		.with_context(|| anyhow!("class line must end with `:`"))?;
	let (src, dst) = line.split_once(ARROW)
		.with_context(|| anyhow!("class line must contain {ARROW:?}"))?;

	let src = ClassName::from_java_name(src.trim())?;
	let dst = ClassName::from_java_name(dst.trim())?;
	Ok((src, dst.into_inner()))
}

/// Parses a member line. Returns `None` for members that don't belong to the class, like inlined methods of
/// other classes.
fn parse_member_line(line: &str) -> Result<Option<Member>> {
	let (left, dst) = line.split_once(ARROW)
		.with_context(|| anyhow!("member line must contain {ARROW:?}"))?;
	let dst = dst.trim();

	let (line_range, left) = split_line_range(left);

	let (type_name, rest) = left.trim().split_once(' ')
		.with_context(|| anyhow!("member must have a type and a name"))?;
	let rest = rest.trim();

	if let Some((name, arguments)) = rest.split_once('(') {
		let (arguments, _original_lines) = arguments.split_once(')')
			.with_context(|| anyhow!("method arguments must end with `)`"))?;

		if name.contains('.') {
			debug!("skipping method {name:?}, it's inlined from another class");
			return Ok(None);
		}

		let name = MethodName::try_from(name)?;
		let desc = MethodDescriptor::from_java_signature(type_name, arguments)?;
		Ok(Some(Member::Method(PendingMethod {
			line_range: line_range.to_owned(),
			key: (name, desc),
			dst: dst.to_owned(),
		})))
	} else {
		if rest.contains('.') {
			debug!("skipping field {rest:?}, it's from another class");
			return Ok(None);
		}

		let name = FieldName::try_from(rest)?;
		let desc = FieldDescriptor::from_java_type_name(type_name)?;
		Ok(Some(Member::Field(name, desc, dst.to_owned())))
	}
}

/// Splits off a leading `start:end:` line range, if there is one. The range is given back without the last `:`.
fn split_line_range(left: &str) -> (&str, &str) {
	let end = left.find(|c: char| !c.is_ascii_digit() && c != ':').unwrap_or(left.len());
	match left[..end].strip_suffix(':') {
		Some(range) => (range, &left[end..]),
		None => ("", left),
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use jvm_names::ClassName;
	use crate::tree::builder::MappingTreeBuilder;
	use crate::tree::mappings::{MappingTree, Order};
	use crate::tree::names::{DefaultNames, Namespace};
	use crate::visitor::StreamChecker;

	fn read(input: &str) -> Result<MappingTree> {
		let mut checker = StreamChecker::new(MappingTreeBuilder::default());
		super::read(input.as_bytes(), &DefaultNames::default(), &mut checker)?;
		checker.finish()?.finish()
	}

	#[test]
	fn split_line_range() {
		assert_eq!(super::split_line_range("1:4:void a()"), ("1:4", "void a()"));
		assert_eq!(super::split_line_range("void a():12:15"), ("", "void a():12:15"));
		assert_eq!(super::split_line_range("int count"), ("", "int count"));
	}

	#[test]
	fn read_classes_and_members() -> Result<()> {
		let input = "\
# compiler: R8
com.example.Foo -> a:
    int count -> a
    java.lang.String[] names -> b
    1:4:void doWork(java.lang.String,int):12:15 -> c
    5:5:void com.example.Other.helper():30:30 -> d
    5:5:void helper():20 -> d
    6:6:long compute() -> e
    6:6:long run() -> f
    7:7:long run() -> g
com.example.Foo$Inner -> a$a:
";
		let tree = read(input)?;
		assert_eq!(tree.namespaces().names(), ["source", "target"]);

		let foo = tree.get_class(&ClassName::try_from("com/example/Foo")?).unwrap();
		assert_eq!(foo.info.names.get(Namespace::new(1)).unwrap(), "a");
		assert_eq!(foo.get_field("names", "[Ljava/lang/String;").unwrap().info.names.get(Namespace::new(1)).unwrap(), "b");
		assert_eq!(foo.get_method("doWork", "(Ljava/lang/String;I)V").unwrap().info.names.get(Namespace::new(1)).unwrap(), "c");
		assert_eq!(foo.get_method("helper", "()V").unwrap().info.names.get(Namespace::new(1)).unwrap(), "d");
		assert_eq!(foo.get_method("compute", "()J").unwrap().info.names.get(Namespace::new(1)).unwrap(), "e");
		assert_eq!(foo.get_method("run", "()J").unwrap().info.names.get(Namespace::new(1)).unwrap(), "f");

		let expected = "\
tiny	2	0	source	target
c	com/example/Foo	a
	f	I	count	a
	f	[Ljava/lang/String;	names	b
	m	(Ljava/lang/String;I)V	doWork	c
	m	()V	helper	d
	m	()J	compute	e
	m	()J	run	f
c	com/example/Foo$Inner	a$a
";
		assert_eq!(crate::tiny_v2::write_string(&tree, Order::Insertion)?, expected);
		Ok(())
	}

	#[test]
	fn same_line_range_with_different_names() -> Result<()> {
		let tree = read("com.example.Foo -> a:\n    1:1:void foo():10:10 -> a\n    1:1:void bar():20:20 -> b\n")?;

		let foo = tree.get_class(&ClassName::try_from("com/example/Foo")?).unwrap();
		assert_eq!(foo.get_method("foo", "()V").unwrap().info.names.get(Namespace::new(1)).unwrap(), "a");
		assert_eq!(foo.get_method("bar", "()V").unwrap().info.names.get(Namespace::new(1)).unwrap(), "b");
		Ok(())
	}

	#[test]
	fn inline_frames_keep_the_outer_method() -> Result<()> {
		let input = "\
com.example.Foo -> a:
    3:3:void inlined():10:10 -> a
    3:3:void alsoInlined():15:15 -> a
    3:3:void outer():20:20 -> a
    4:4:void other():30:30 -> b
";
		let tree = read(input)?;

		let expected = "\
tiny	2	0	source	target
c	com/example/Foo	a
	m	()V	outer	a
	m	()V	other	b
";
		assert_eq!(crate::tiny_v2::write_string(&tree, Order::Insertion)?, expected);
		Ok(())
	}

	#[test]
	fn custom_namespace_names() -> Result<()> {
		let names = DefaultNames { source: "named".to_owned(), target: "obf".to_owned() };
		let mut checker = StreamChecker::new(MappingTreeBuilder::default());
		super::read("a.B -> c:\n".as_bytes(), &names, &mut checker)?;
		let tree = checker.finish()?.finish()?;

		assert_eq!(tree.namespaces().names(), ["named", "obf"]);
		Ok(())
	}

	#[test]
	fn malformed() {
		assert!(read("com.example.Foo -> a\n").is_err());
		assert!(read("    int count -> a\n").is_err());
		assert!(read("com.example.Foo -> a:\n    count -> a\n").is_err());
	}
}
