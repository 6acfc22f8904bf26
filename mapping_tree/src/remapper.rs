//! Remapping of the class names inside of descriptors.
//!
//! A [`ClassRemapper`] answers the question "what is the name of class X in namespace Y?". Given that, it can
//! remap field and method descriptors, keeping primitives and array dimensions exactly as they were.
//!
//! Classes the remapper doesn't know about, like classes of the JDK, are kept as they are.

use std::collections::{HashMap, HashSet};
use anyhow::{anyhow, bail, Context, Result};
use rayon::prelude::*;
use jvm_names::{ClassName, ClassNameSlice, FieldDescriptor, FieldDescriptorSlice, MethodDescriptor, MethodDescriptorSlice};
use jvm_names::descriptor::ParsedFieldDescriptor;
use crate::MappingError;
use crate::tree::mappings::MappingTree;
use crate::tree::names::Namespace;

/// A remapper for class names and descriptors.
pub trait ClassRemapper {
	/// Maps a class name to a new one, if the mapping exists.
	///
	/// If the mapping doesn't exist, returns `Ok(None)`.
	fn map_class_fail(&self, class: &ClassNameSlice) -> Result<Option<ClassName>>;

	/// Maps a class name to a new one, if the mapping doesn't exist, returns the old one.
	///
	/// Do not implement this yourself.
	fn map_class(&self, class: &ClassNameSlice) -> Result<ClassName> {
		Ok(self.map_class_fail(class)?.unwrap_or_else(|| class.to_owned()))
	}

	/// Maps a field descriptor to a new one.
	///
	/// Do not implement this yourself.
	fn map_field_desc(&self, desc: &FieldDescriptorSlice) -> Result<FieldDescriptor> {
		let ParsedFieldDescriptor(field_type) = desc.parse()?;
		let field_type = field_type.try_map_class(&mut |class| self.map_class(&class))?;
		Ok(ParsedFieldDescriptor(field_type).write())
	}

	/// Maps a method descriptor to a new one.
	///
	/// Do not implement this yourself.
	fn map_method_desc(&self, desc: &MethodDescriptorSlice) -> Result<MethodDescriptor> {
		let parsed = desc.parse()?
			.try_map_classes(&mut |class| self.map_class(&class))?;
		Ok(parsed.write())
	}
}

/// How to handle classes that are part of a tree but have no name in the target namespace.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum RemapMode {
	/// Keep the old name.
	#[default]
	Lenient,
	/// Fail with [`MappingError::UnresolvedClass`].
	///
	/// Classes that aren't part of the tree at all are kept as they are in both modes.
	Strict,
}

/// A [`ClassRemapper`] backed by a table of class names.
#[derive(Debug, Clone)]
pub struct ClassTableRemapper {
	/// Maps the known classes to their new name, if they have one.
	classes: HashMap<ClassName, Option<ClassName>>,
	mode: RemapMode,
	/// The name of the target namespace, for error messages.
	target: String,
}

impl ClassTableRemapper {
	pub fn new(classes: HashMap<ClassName, Option<ClassName>>, mode: RemapMode, target: impl Into<String>) -> ClassTableRemapper {
		ClassTableRemapper { classes, mode, target: target.into() }
	}
}

impl ClassRemapper for ClassTableRemapper {
	fn map_class_fail(&self, class: &ClassNameSlice) -> Result<Option<ClassName>> {
		match self.classes.get(class) {
			Some(Some(name)) => Ok(Some(name.clone())),
			Some(None) if self.mode == RemapMode::Strict => bail!(MappingError::UnresolvedClass {
				class: class.as_inner().to_owned(),
				namespace: self.target.clone(),
			}),
			_ => Ok(None),
		}
	}
}

impl MappingTree {
	/// Creates a remapper for the class names of the namespace `from` into the namespace `to`.
	pub fn remapper(&self, from: Namespace, to: Namespace, mode: RemapMode) -> Result<ClassTableRemapper> {
		let namespaces = self.namespaces();
		if namespaces.get(from).is_none() {
			bail!("namespace {from:?} is out of range for {namespaces:?}");
		}
		let target = namespaces.get(to)
			.with_context(|| anyhow!("namespace {to:?} is out of range for {namespaces:?}"))?;

		let mut classes = HashMap::with_capacity(self.class_count());
		for class in self.classes() {
			if let Some(from_name) = class.info.names.get(from) {
				classes.entry(from_name.clone())
					.or_insert_with(|| class.info.names.get(to).cloned());
			}
		}

		Ok(ClassTableRemapper::new(classes, mode, target))
	}
}

/// The remapped form of every distinct descriptor of a tree.
///
/// Remapping is a pure function of the descriptor and the remapper, so each distinct descriptor is only remapped
/// once. The descriptors are remapped in parallel.
#[derive(Debug, Clone, Default)]
pub struct RemappedDescriptors {
	fields: HashMap<FieldDescriptor, FieldDescriptor>,
	methods: HashMap<MethodDescriptor, MethodDescriptor>,
}

impl RemappedDescriptors {
	pub fn compute(tree: &MappingTree, remapper: &(impl ClassRemapper + Sync)) -> Result<RemappedDescriptors> {
		let field_descs: HashSet<&FieldDescriptor> = tree.classes()
			.flat_map(|class| class.fields.keys().map(|key| &key.desc))
			.collect();
		let method_descs: HashSet<&MethodDescriptor> = tree.classes()
			.flat_map(|class| class.methods.keys().map(|key| &key.desc))
			.collect();

		let fields = field_descs.into_par_iter()
			.map(|desc| {
				let mapped = remapper.map_field_desc(desc)
					.with_context(|| anyhow!("failed to remap field descriptor {desc:?}"))?;
				Ok((desc.clone(), mapped))
			})
			.collect::<Result<HashMap<_, _>>>()?;
		let methods = method_descs.into_par_iter()
			.map(|desc| {
				let mapped = remapper.map_method_desc(desc)
					.with_context(|| anyhow!("failed to remap method descriptor {desc:?}"))?;
				Ok((desc.clone(), mapped))
			})
			.collect::<Result<HashMap<_, _>>>()?;

		Ok(RemappedDescriptors { fields, methods })
	}

	/// Gets the remapped form of a field descriptor of the tree.
	pub fn field(&self, desc: &FieldDescriptorSlice) -> Option<&FieldDescriptor> {
		self.fields.get(desc)
	}

	/// Gets the remapped form of a method descriptor of the tree.
	pub fn method(&self, desc: &MethodDescriptorSlice) -> Option<&MethodDescriptor> {
		self.methods.get(desc)
	}
}
