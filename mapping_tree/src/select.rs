//! Projecting a tree onto a chosen list of namespaces.
//!
//! The first requested namespace is the primary one: elements are keyed by it in the output, so it must never be
//! empty. If an element has no name in it, the fallback namespaces are tried in order, and finally the source
//! namespace of the tree. The other requested namespaces are copied over as they are; a requested namespace that
//! the tree doesn't have results in empty slots.
//!
//! Descriptors in the output are remapped into the primary names of the classes.

use std::collections::HashMap;
use std::fmt::Display;
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use jvm_names::{ClassName, FieldDescriptor, FieldName, MethodDescriptor, MethodName};
use crate::MappingError;
use crate::remapper::{ClassTableRemapper, RemapMode, RemappedDescriptors};
use crate::tree::builder::{DefinitionMode, MappingTreeBuilder};
use crate::tree::mappings::{ClassNowodeMapping, JavadocMapping, MappingTree, MethodNowodeMapping};
use crate::tree::names::{Names, Namespace, Namespaces};
use crate::visitor::MappingVisitor;

/// Which namespaces to output, and how to fill the primary one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
	/// The namespaces of the output, in order. The first one is the primary namespace.
	pub namespaces: Vec<String>,
	/// The namespaces to take the primary name from, in order, if an element has no name in the primary namespace.
	pub fallback: Vec<String>,
	/// With [`RemapMode::Strict`], a class that's only named in the source namespace (and not in the primary or any
	/// fallback namespace) may not appear in a descriptor.
	pub remap_mode: RemapMode,
}

/// A name, and whether it was only found in the source namespace.
struct Resolved<T> {
	name: T,
	from_source: bool,
}

struct Projection<'a> {
	output: Namespaces,
	/// For each output namespace, the namespace of the tree it's taken from.
	table: Vec<Option<Namespace>>,
	/// The namespaces to take the primary name from, without the source namespace.
	chain: Vec<Namespace>,
	tree: &'a MappingTree,
	descriptors: RemappedDescriptors,
}

fn duplicate(what: &str, primary: impl Display, namespace: &str, existing: impl Display, new: impl Display) -> anyhow::Error {
	anyhow!(MappingError::ConflictingDefinition {
		element: format!("{what} {primary}"),
		namespace: namespace.to_owned(),
		existing: existing.to_string(),
		new: new.to_string(),
	})
}

impl<'a> Projection<'a> {
	fn new(tree: &'a MappingTree, selection: &Selection) -> Result<Projection<'a>> {
		let output = Namespaces::try_from(selection.namespaces.clone())
			.context("invalid output namespaces")?;

		let table: Vec<_> = output.names().iter()
			.map(|name| {
				let namespace = tree.namespaces().find_namespace(name);
				if namespace.is_none() {
					debug!("namespace {name:?} isn't part of {:?}, its names will be empty", tree.namespaces());
				}
				namespace
			})
			.collect();

		let mut chain: Vec<_> = table.first().copied().flatten().into_iter().collect();
		for name in &selection.fallback {
			match tree.namespaces().find_namespace(name) {
				Some(namespace) => chain.push(namespace),
				None => warn!("fallback namespace {name:?} isn't part of {:?}, ignoring it", tree.namespaces()),
			}
		}

		let mut projection = Projection { output, table, chain, tree, descriptors: RemappedDescriptors::default() };

		let classes: HashMap<ClassName, Option<ClassName>> = tree.classes()
			.map(|class| {
				let resolved = projection.resolve(class.info.names.names());
				let name = resolved.filter(|x| !x.from_source).map(|x| x.name);
				(class.src().clone(), name)
			})
			.collect();
		let remapper = ClassTableRemapper::new(classes, selection.remap_mode, projection.output.source_name());
		projection.descriptors = RemappedDescriptors::compute(tree, &remapper)?;

		Ok(projection)
	}

	fn resolve<T: Clone>(&self, names: &Names<T>) -> Option<Resolved<T>> {
		self.chain.iter()
			.find_map(|&namespace| names.get(namespace))
			.map(|name| Resolved { name: name.clone(), from_source: false })
			.or_else(|| names.src().map(|name| Resolved { name: name.clone(), from_source: true }))
	}

	fn primary<T: Clone>(&self, names: &Names<T>) -> Option<T> {
		self.resolve(names).map(|x| x.name)
	}

	fn primary_name(&self) -> &str {
		self.output.source_name()
	}

	fn accept_names<T: AsRef<str>>(&self, visitor: &mut (impl MappingVisitor + ?Sized), names: &Names<T>, javadoc: &Option<JavadocMapping>) -> Result<()> {
		for (index, namespace) in self.table.iter().enumerate().skip(1) {
			if let Some(name) = namespace.and_then(|namespace| names.get(namespace)) {
				visitor.visit_dst_name(Namespace(index), name.as_ref())?;
			}
		}
		if let Some(javadoc) = javadoc {
			visitor.visit_comment(&javadoc.0)?;
		}
		Ok(())
	}

	fn accept(&self, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
		visitor.visit_namespaces(&self.output)?;

		let mut seen: HashMap<ClassName, &ClassName> = HashMap::with_capacity(self.tree.class_count());
		for class in self.tree.classes() {
			let primary = self.primary(class.info.names.names())
				.with_context(|| anyhow!("class {:?} has no name", class.src()))?;
			if let Some(existing) = seen.get(&primary) {
				bail!(duplicate("class", &primary, self.primary_name(), existing, class.src()));
			}
			seen.insert(primary.clone(), class.src());

			self.accept_class(visitor, class, &primary)
				.with_context(|| anyhow!("while selecting class {:?}", class.src()))?;
		}

		visitor.visit_end()
	}

	fn accept_class(&self, visitor: &mut (impl MappingVisitor + ?Sized), class: &ClassNowodeMapping, primary: &ClassName) -> Result<()> {
		if visitor.visit_class(primary)?.is_break() {
			return Ok(());
		}
		self.accept_names(visitor, class.info.names.names(), &class.javadoc)?;

		let mut fields: HashMap<(FieldName, &FieldDescriptor), &FieldName> = HashMap::new();
		for field in class.fields.values() {
			let key = &field.info.key;
			let primary = self.primary(field.info.names.names())
				.with_context(|| anyhow!("field {:?} has no name", key.name))?;
			let desc = self.descriptors.field(&key.desc)
				.with_context(|| anyhow!("missing remapped descriptor for {:?}", key.desc))?;

			if let Some(existing) = fields.get(&(primary.clone(), desc)) {
				bail!(duplicate("field", format!("{primary} {desc}"), self.primary_name(), existing, &key.name));
			}
			fields.insert((primary.clone(), desc), &key.name);

			if visitor.visit_field(&primary, desc)?.is_continue() {
				self.accept_names(visitor, field.info.names.names(), &field.javadoc)?;
				visitor.visit_end()?;
			}
		}

		let mut methods: HashMap<(MethodName, &MethodDescriptor), &MethodName> = HashMap::new();
		for method in class.methods.values() {
			let key = &method.info.key;
			let primary = self.primary(method.info.names.names())
				.with_context(|| anyhow!("method {:?} has no name", key.name))?;
			let desc = self.descriptors.method(&key.desc)
				.with_context(|| anyhow!("missing remapped descriptor for {:?}", key.desc))?;

			if let Some(existing) = methods.get(&(primary.clone(), desc)) {
				bail!(duplicate("method", format!("{primary}{desc}"), self.primary_name(), existing, &key.name));
			}
			methods.insert((primary.clone(), desc), &key.name);

			if visitor.visit_method(&primary, desc)?.is_continue() {
				self.accept_method(visitor, method)?;
			}
		}

		visitor.visit_end()
	}

	fn accept_method(&self, visitor: &mut (impl MappingVisitor + ?Sized), method: &MethodNowodeMapping) -> Result<()> {
		self.accept_names(visitor, method.info.names.names(), &method.javadoc)?;

		for parameter in method.parameters.values() {
			let primary = self.primary(&parameter.info.names);
			if visitor.visit_parameter(parameter.info.key.index, primary.as_deref())?.is_continue() {
				self.accept_names(visitor, &parameter.info.names, &parameter.javadoc)?;
				visitor.visit_end()?;
			}
		}
		for local_variable in method.local_variables.values() {
			let info = &local_variable.info;
			let primary = self.primary(&info.names);
			if visitor.visit_local_variable(info.key, info.lvt_row_index, primary.as_deref())?.is_continue() {
				self.accept_names(visitor, &info.names, &local_variable.javadoc)?;
				visitor.visit_end()?;
			}
		}

		visitor.visit_end()
	}
}

impl MappingTree {
	/// Emits the tree, projected onto the selected namespaces, into the visitor.
	pub fn select_into(&self, selection: &Selection, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
		Projection::new(self, selection)?.accept(visitor)
	}

	/// Projects the tree onto the selected namespaces.
	pub fn select(&self, selection: &Selection) -> Result<MappingTree> {
		let mut builder = MappingTreeBuilder::new(DefinitionMode::Strict);
		self.select_into(selection, &mut builder)?;
		builder.finish()
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use jvm_names::{ClassName, FieldDescriptor, FieldName, MethodDescriptor, MethodName};
	use crate::MappingError;
	use crate::remapper::RemapMode;
	use crate::select::Selection;
	use crate::tree::builder::MappingTreeBuilder;
	use crate::tree::mappings::MappingTree;
	use crate::tree::names::{Namespace, Namespaces};
	use crate::visitor::{replay, MappingEvent};

	fn tree() -> Result<MappingTree> {
		let events = vec![
			MappingEvent::Namespaces(Namespaces::try_from(&["obf", "inter", "named"][..])?),
			MappingEvent::Class(ClassName::try_from("a")?),
			MappingEvent::DstName(Namespace::new(1), "class_1".to_owned()),
			MappingEvent::DstName(Namespace::new(2), "com/example/Foo".to_owned()),
			MappingEvent::Field(FieldName::try_from("f")?, FieldDescriptor::try_from("Lb;")?),
			MappingEvent::DstName(Namespace::new(1), "field_1".to_owned()),
			MappingEvent::End,
			MappingEvent::Method(MethodName::try_from("m")?, MethodDescriptor::try_from("(La;)V")?),
			MappingEvent::DstName(Namespace::new(2), "doWork".to_owned()),
			MappingEvent::End,
			MappingEvent::End,
			MappingEvent::Class(ClassName::try_from("b")?),
			MappingEvent::DstName(Namespace::new(1), "class_2".to_owned()),
			MappingEvent::End,
			MappingEvent::End,
		];
		let mut builder = MappingTreeBuilder::default();
		replay(&events, &mut builder)?;
		builder.finish()
	}

	fn selection(namespaces: &[&str], fallback: &[&str]) -> Selection {
		Selection {
			namespaces: namespaces.iter().map(|&x| x.to_owned()).collect(),
			fallback: fallback.iter().map(|&x| x.to_owned()).collect(),
			remap_mode: RemapMode::Lenient,
		}
	}

	#[test]
	fn primary_is_never_empty() -> Result<()> {
		let tree = tree()?;
		let selected = tree.select(&selection(&["named", "obf"], &["inter"]))?;

		let names: Vec<String> = selected.classes().map(|class| class.src().to_string()).collect();
		assert_eq!(names, vec!["com/example/Foo", "class_2"]);

		let foo = selected.get_class(&ClassName::try_from("com/example/Foo")?).unwrap();
		assert!(foo.get_field("field_1", "Lclass_2;").is_some());
		assert!(foo.get_method("doWork", "(Lcom/example/Foo;)V").is_some());

		// without a fallback, the source name is used
		let selected = tree.select(&selection(&["named"], &[]))?;
		let names: Vec<String> = selected.classes().map(|class| class.src().to_string()).collect();
		assert_eq!(names, vec!["com/example/Foo", "b"]);
		Ok(())
	}

	#[test]
	fn missing_namespaces_are_empty() -> Result<()> {
		let tree = tree()?;
		let selected = tree.select(&selection(&["obf", "missing", "named"], &[]))?;

		assert_eq!(selected.namespaces().names(), &["obf", "missing", "named"]);
		let a = selected.get_class(&ClassName::try_from("a")?).unwrap();
		assert_eq!(a.info.names.get(Namespace::new(1)), None);
		assert_eq!(a.info.names.get(Namespace::new(2)).unwrap(), "com/example/Foo");
		Ok(())
	}

	#[test]
	fn duplicate_requested_namespace() -> Result<()> {
		let error = tree()?.select(&selection(&["obf", "named", "obf"], &[])).unwrap_err();
		assert_eq!(MappingError::find(&error), Some(&MappingError::DuplicateNamespace("obf".to_owned())));
		Ok(())
	}

	#[test]
	fn colliding_primary_names() -> Result<()> {
		let tree = tree()?;
		// `a` is named `c` in `named`, and `c` falls back to its source name
		let events = vec![
			MappingEvent::Namespaces(Namespaces::try_from(&["obf", "named"][..])?),
			MappingEvent::Class(ClassName::try_from("a")?),
			MappingEvent::DstName(Namespace::new(1), "c".to_owned()),
			MappingEvent::End,
			MappingEvent::Class(ClassName::try_from("c")?),
			MappingEvent::End,
			MappingEvent::End,
		];
		let mut builder = MappingTreeBuilder::default();
		replay(&events, &mut builder)?;
		let colliding = builder.finish()?;

		let error = colliding.select(&selection(&["named"], &[])).unwrap_err();
		assert!(matches!(MappingError::find(&error), Some(MappingError::ConflictingDefinition { .. })));

		// the original tree doesn't collide
		tree.select(&selection(&["inter", "named"], &[]))?;
		Ok(())
	}

	#[test]
	fn strict_remapping_of_source_only_classes() -> Result<()> {
		let tree = tree()?;
		let mut strict = selection(&["named"], &[]);
		strict.remap_mode = RemapMode::Strict;

		// the field of `a` references `b`, which only has a source name
		let error = tree.select(&strict).unwrap_err();
		assert_eq!(MappingError::find(&error), Some(&MappingError::UnresolvedClass {
			class: "b".to_owned(),
			namespace: "named".to_owned(),
		}));

		strict.fallback = vec!["inter".to_owned()];
		tree.select(&strict)?;
		Ok(())
	}
}
