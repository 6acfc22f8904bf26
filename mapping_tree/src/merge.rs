//! Merging mapping trees that share their source namespace.
//!
//! Elements are matched by their source keys. The namespaces of the result are the namespaces of all trees, in
//! the order they're first seen. Where two trees both have a name for an element in the same namespace, and the
//! names differ, the [`ConflictPolicy`] decides.

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use indexmap::map::Entry;
use log::debug;
use jvm_names::ClassName;
use crate::MappingError;
use crate::tree::mappings::{ClassMapping, ClassNowodeMapping, FieldMapping, FieldNowodeMapping, JavadocMapping, KeyedNames, LocalVariableMapping, LocalVariableNowodeMapping, MappingTree, MethodMapping, MethodNowodeMapping, ParameterMapping, ParameterNowodeMapping};
use crate::tree::names::{Names, Namespace, Namespaces};

/// What to do if two trees have different names for the same element in the same namespace.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
	/// Fail with [`MappingError::MergeConflict`].
	#[default]
	Fail,
	/// The name of the tree merged in later wins.
	Overwrite,
}

struct Merger<'a> {
	namespaces: &'a Namespaces,
	policy: ConflictPolicy,
}

impl Merger<'_> {
	fn conflict(&self, element: &str, namespace: &str, existing: &str, new: &str) -> Result<()> {
		match self.policy {
			ConflictPolicy::Fail => bail!(MappingError::MergeConflict {
				element: element.to_owned(),
				namespace: namespace.to_owned(),
				existing: existing.to_owned(),
				new: new.to_owned(),
			}),
			ConflictPolicy::Overwrite => {
				debug!("overwriting {existing:?} with {new:?} for {element} in namespace {namespace:?}");
				Ok(())
			},
		}
	}

	fn names<T: PartialEq + Clone + AsRef<str>>(&self, existing: &mut Names<T>, new: &Names<T>, element: &str) -> Result<()> {
		for (namespace, name) in new.iter() {
			let Some(slot) = existing.slot_mut(namespace) else {
				continue;
			};
			match slot {
				Some(old) if old == name => {},
				Some(old) => {
					self.conflict(element, &self.namespaces[namespace], old.as_ref(), name.as_ref())?;
					*old = name.clone();
				},
				None => *slot = Some(name.clone()),
			}
		}
		Ok(())
	}

	fn javadoc(&self, existing: &mut Option<JavadocMapping>, new: Option<JavadocMapping>, element: &str) -> Result<()> {
		let Some(new) = new else {
			return Ok(());
		};
		match existing {
			Some(old) if *old == new => {},
			Some(old) => {
				self.conflict(element, "comment", &old.0, &new.0)?;
				*old = new;
			},
			None => *existing = Some(new),
		}
		Ok(())
	}

	fn class(&self, existing: &mut ClassNowodeMapping, new: ClassNowodeMapping) -> Result<()> {
		let src = existing.src().clone();
		let element = format!("class {src}");
		self.names(existing.info.names.names_mut(), new.info.names.names(), &element)?;
		self.javadoc(&mut existing.javadoc, new.javadoc, &element)?;

		for (key, field) in new.fields {
			match existing.fields.entry(key) {
				Entry::Occupied(mut e) => {
					let element = format!("field {src}.{} {}", e.key().name, e.key().desc);
					let old = e.get_mut();
					self.names(old.info.names.names_mut(), field.info.names.names(), &element)?;
					self.javadoc(&mut old.javadoc, field.javadoc, &element)?;
				},
				Entry::Vacant(e) => {
					e.insert(field);
				},
			}
		}

		for (key, method) in new.methods {
			match existing.methods.entry(key) {
				Entry::Occupied(mut e) => {
					let element = format!("method {src}.{}{}", e.key().name, e.key().desc);
					self.method(e.get_mut(), method, &element)?;
				},
				Entry::Vacant(e) => {
					e.insert(method);
				},
			}
		}

		Ok(())
	}

	fn method(&self, existing: &mut MethodNowodeMapping, new: MethodNowodeMapping, method: &str) -> Result<()> {
		self.names(existing.info.names.names_mut(), new.info.names.names(), method)?;
		self.javadoc(&mut existing.javadoc, new.javadoc, method)?;

		for (key, parameter) in new.parameters {
			match existing.parameters.entry(key) {
				Entry::Occupied(mut e) => {
					let element = format!("{method}, parameter {}", key.index);
					let old = e.get_mut();
					self.names(&mut old.info.names, &parameter.info.names, &element)?;
					self.javadoc(&mut old.javadoc, parameter.javadoc, &element)?;
				},
				Entry::Vacant(e) => {
					e.insert(parameter);
				},
			}
		}

		for (key, local_variable) in new.local_variables {
			match existing.local_variables.entry(key) {
				Entry::Occupied(mut e) => {
					let element = format!("{method}, local variable {} at {}", key.lv_index, key.start_offset);
					let old = e.get_mut();
					match (old.info.lvt_row_index, local_variable.info.lvt_row_index) {
						(Some(a), Some(b)) if a != b => {
							self.conflict(&element, "lvt row index", &a.to_string(), &b.to_string())?;
							old.info.lvt_row_index = Some(b);
						},
						(None, Some(b)) => old.info.lvt_row_index = Some(b),
						_ => {},
					}
					self.names(&mut old.info.names, &local_variable.info.names, &element)?;
					self.javadoc(&mut old.javadoc, local_variable.javadoc, &element)?;
				},
				Entry::Vacant(e) => {
					e.insert(local_variable);
				},
			}
		}

		Ok(())
	}
}

fn project_keyed<T: Clone>(names: &KeyedNames<T>, table: &[Option<Namespace>]) -> KeyedNames<T> {
	KeyedNames::from_names(names.src().clone(), names.names().project(table))
}

/// Moves the names of every element of the class into the namespaces given by the table.
fn project_class(class: ClassNowodeMapping, table: &[Option<Namespace>]) -> ClassNowodeMapping {
	let fields = class.fields.into_iter()
		.map(|(key, field)| {
			let info = FieldMapping { names: project_keyed(&field.info.names, table), key: field.info.key };
			(key, FieldNowodeMapping { info, javadoc: field.javadoc })
		})
		.collect();

	let methods = class.methods.into_iter()
		.map(|(key, method)| {
			let parameters = method.parameters.into_iter()
				.map(|(key, parameter)| {
					let info = ParameterMapping { key: parameter.info.key, names: parameter.info.names.project(table) };
					(key, ParameterNowodeMapping { info, javadoc: parameter.javadoc })
				})
				.collect();
			let local_variables = method.local_variables.into_iter()
				.map(|(key, local_variable)| {
					let info = LocalVariableMapping {
						key: local_variable.info.key,
						lvt_row_index: local_variable.info.lvt_row_index,
						names: local_variable.info.names.project(table),
					};
					(key, LocalVariableNowodeMapping { info, javadoc: local_variable.javadoc })
				})
				.collect();
			let info = MethodMapping { names: project_keyed(&method.info.names, table), key: method.info.key };
			(key, MethodNowodeMapping { info, parameters, local_variables, javadoc: method.javadoc })
		})
		.collect();

	ClassNowodeMapping {
		info: ClassMapping { names: project_keyed(&class.info.names, table) },
		fields,
		methods,
		javadoc: class.javadoc,
	}
}

impl MappingTree {
	/// Merges another tree into this one. Both trees must have the same source namespace.
	///
	/// On conflicts, with [`ConflictPolicy::Overwrite`] the names of `other` win.
	pub fn merge(self, other: MappingTree, policy: ConflictPolicy) -> Result<MappingTree> {
		if self.namespaces().source_name() != other.namespaces().source_name() {
			bail!(
				"cannot merge mappings with different source namespaces: {:?} and {:?}",
				self.namespaces(), other.namespaces()
			);
		}

		let mut names: Vec<String> = self.namespaces().names().to_vec();
		for name in other.namespaces().names() {
			if !names.contains(name) {
				names.push(name.clone());
			}
		}
		let namespaces = Namespaces::try_from(names)?;

		let (ours, classes) = self.into_parts();
		let (theirs, other_classes) = other.into_parts();

		let our_table: Vec<_> = namespaces.names().iter().map(|name| ours.find_namespace(name)).collect();
		let their_table: Vec<_> = namespaces.names().iter().map(|name| theirs.find_namespace(name)).collect();

		let mut classes: IndexMap<ClassName, ClassNowodeMapping> = if ours.len() == namespaces.len() {
			classes
		} else {
			classes.into_iter().map(|(key, class)| (key, project_class(class, &our_table))).collect()
		};

		let merger = Merger { namespaces: &namespaces, policy };
		for (key, class) in other_classes {
			let class = project_class(class, &their_table);
			match classes.entry(key) {
				Entry::Occupied(mut e) => {
					let src = e.key().clone();
					merger.class(e.get_mut(), class)
						.with_context(|| anyhow!("while merging class {src:?}"))?;
				},
				Entry::Vacant(e) => {
					e.insert(class);
				},
			}
		}

		Ok(MappingTree::new(namespaces, classes))
	}
}

/// Merges all the trees, in order. See [`MappingTree::merge`].
pub fn merge(trees: impl IntoIterator<Item=MappingTree>, policy: ConflictPolicy) -> Result<MappingTree> {
	let mut trees = trees.into_iter();
	let first = trees.next().context("there are no mappings to merge")?;
	trees.try_fold(first, |merged, tree| merged.merge(tree, policy))
}
