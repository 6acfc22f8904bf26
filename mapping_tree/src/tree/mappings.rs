use std::collections::HashMap;
use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use log::debug;
use jvm_names::{ClassName, ClassNameSlice, FieldDescriptor, FieldName, LocalVariableName, MethodDescriptor, MethodName, ParameterName};
use crate::tree::names::{Names, Namespace, Namespaces};
use crate::tree::{NodeInfo, ToKey};
use crate::visitor::MappingVisitor;

/// The order in which [`MappingTree::accept`] visits the elements.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Order {
	/// The order in which the elements were first declared.
	#[default]
	Insertion,
	/// Sorted by the keys of the elements: classes by name, fields and methods by descriptor and then name,
	/// parameters and local variables by index.
	Sorted,
}

/// An immutable mapping tree, with one name slot per namespace for every element.
///
/// Build it with a [`MappingTreeBuilder`][crate::tree::builder::MappingTreeBuilder]. Elements are keyed by their
/// name in the source namespace.
#[derive(Debug, Clone)]
pub struct MappingTree {
	namespaces: Namespaces,
	classes: IndexMap<ClassName, ClassNowodeMapping>,
	/// For each namespace, the class names in that namespace, pointing to the keys of the classes.
	class_index: Vec<HashMap<ClassName, ClassName>>,
}

impl MappingTree {
	pub(crate) fn new(namespaces: Namespaces, classes: IndexMap<ClassName, ClassNowodeMapping>) -> MappingTree {
		let mut class_index: Vec<HashMap<ClassName, ClassName>> = vec![HashMap::new(); namespaces.len()];

		for (key, class) in &classes {
			for (namespace, name) in class.info.names.iter() {
				if let Some(index) = class_index.get_mut(namespace.0) {
					if let Some(existing) = index.get(name) {
						debug!("class name {name:?} in namespace {:?} is used by both {existing:?} and {key:?}", namespaces[namespace]);
					} else {
						index.insert(name.clone(), key.clone());
					}
				}
			}
		}

		MappingTree { namespaces, classes, class_index }
	}

	pub fn namespaces(&self) -> &Namespaces {
		&self.namespaces
	}

	pub fn classes(&self) -> impl Iterator<Item=&ClassNowodeMapping> {
		self.classes.values()
	}

	pub fn class_count(&self) -> usize {
		self.classes.len()
	}

	/// Gets a class by its name in the source namespace.
	pub fn get_class(&self, src: &ClassNameSlice) -> Option<&ClassNowodeMapping> {
		self.classes.get(src)
	}

	/// Gets a class by its name in any namespace.
	///
	/// If multiple classes have that name in the namespace, the first one declared is returned.
	pub fn get_class_in(&self, namespace: Namespace, name: &ClassNameSlice) -> Option<&ClassNowodeMapping> {
		let key = self.class_index.get(namespace.0)?.get(name)?;
		self.classes.get(key)
	}

	/// Gets the name of a class (given by its name in the source namespace) in the given namespace.
	pub fn get_class_name(&self, src: &ClassNameSlice, namespace: Namespace) -> Result<&ClassName> {
		self.classes.get(src)
			.with_context(|| anyhow!("no entry for class {src:?}"))?
			.info
			.names
			.get(namespace)
			.with_context(|| anyhow!("no name for namespace {namespace:?} for class {src:?}"))
	}

	pub(crate) fn into_parts(self) -> (Namespaces, IndexMap<ClassName, ClassNowodeMapping>) {
		(self.namespaces, self.classes)
	}

	/// Visits the whole tree, as one closed event stream.
	///
	/// Elements skipped by the visitor aren't descended into.
	pub fn accept(&self, visitor: &mut (impl MappingVisitor + ?Sized), order: Order) -> Result<()> {
		visitor.visit_namespaces(&self.namespaces)?;

		for class in sorted(self.classes.values(), order, |class| &class.info.names.src_key) {
			class.accept(visitor, order)
				.with_context(|| anyhow!("while visiting class {:?}", class.info.names.src_key))?;
		}

		visitor.visit_end()
	}
}

/// Returns the values in insertion order, or sorted by the key given.
fn sorted<'a, T, K: Ord + ?Sized + 'a>(values: impl Iterator<Item=&'a T>, order: Order, key: impl Fn(&'a T) -> &'a K) -> Vec<&'a T> {
	let mut values: Vec<_> = values.collect();
	if order == Order::Sorted {
		values.sort_by(|a, b| key(a).cmp(key(b)));
	}
	values
}

fn accept_names<T: AsRef<str>>(visitor: &mut (impl MappingVisitor + ?Sized), names: &Names<T>) -> Result<()> {
	for (namespace, name) in names.iter() {
		if !namespace.is_source() {
			visitor.visit_dst_name(namespace, name.as_ref())?;
		}
	}
	Ok(())
}

fn accept_javadoc(visitor: &mut (impl MappingVisitor + ?Sized), javadoc: &Option<JavadocMapping>) -> Result<()> {
	if let Some(javadoc) = javadoc {
		visitor.visit_comment(&javadoc.0)?;
	}
	Ok(())
}

/// A comment, attached to an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JavadocMapping(pub String);

/// The names of an element that's keyed by its source name. The source slot always has a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyedNames<T> {
	src_key: T,
	names: Names<T>,
}

impl<T: Clone> KeyedNames<T> {
	pub(crate) fn new(len: usize, src: T) -> KeyedNames<T> {
		KeyedNames {
			names: Names::from_src(len, Some(src.clone())),
			src_key: src,
		}
	}

	pub(crate) fn from_names(src: T, names: Names<T>) -> KeyedNames<T> {
		KeyedNames { src_key: src, names }
	}
}

impl<T> KeyedNames<T> {
	pub fn src(&self) -> &T {
		&self.src_key
	}

	pub fn names(&self) -> &Names<T> {
		&self.names
	}

	pub(crate) fn names_mut(&mut self) -> &mut Names<T> {
		&mut self.names
	}

	pub fn get(&self, namespace: Namespace) -> Option<&T> {
		self.names.get(namespace)
	}

	pub fn iter(&self) -> impl Iterator<Item=(Namespace, &T)> + '_ {
		self.names.iter()
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMapping {
	pub names: KeyedNames<ClassName>,
}

impl ToKey<ClassName> for ClassMapping {
	fn get_key(&self) -> ClassName {
		self.names.src_key.clone()
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassNowodeMapping {
	pub info: ClassMapping,
	pub fields: IndexMap<FieldKey, FieldNowodeMapping>,
	pub methods: IndexMap<MethodKey, MethodNowodeMapping>,
	pub javadoc: Option<JavadocMapping>,
}

impl NodeInfo<ClassMapping> for ClassNowodeMapping {
	fn get_node_info(&self) -> &ClassMapping {
		&self.info
	}

	fn new(info: ClassMapping) -> Self {
		ClassNowodeMapping {
			info,
			fields: IndexMap::new(),
			methods: IndexMap::new(),
			javadoc: None,
		}
	}
}

impl ClassNowodeMapping {
	pub fn src(&self) -> &ClassName {
		self.info.names.src()
	}

	/// Gets a field by its name and descriptor in the source namespace.
	pub fn get_field(&self, name: &str, desc: &str) -> Option<&FieldNowodeMapping> {
		let key = FieldKey {
			desc: FieldDescriptor::try_from(desc).ok()?,
			name: FieldName::try_from(name).ok()?,
		};
		self.fields.get(&key)
	}

	/// Gets a method by its name and descriptor in the source namespace.
	pub fn get_method(&self, name: &str, desc: &str) -> Option<&MethodNowodeMapping> {
		let key = MethodKey {
			desc: MethodDescriptor::try_from(desc).ok()?,
			name: MethodName::try_from(name).ok()?,
		};
		self.methods.get(&key)
	}

	fn accept(&self, visitor: &mut (impl MappingVisitor + ?Sized), order: Order) -> Result<()> {
		if visitor.visit_class(self.src())?.is_break() {
			return Ok(());
		}
		accept_names(visitor, self.info.names.names())?;
		accept_javadoc(visitor, &self.javadoc)?;

		for field in sorted(self.fields.values(), order, |field| &field.info.key) {
			field.accept(visitor)?;
		}
		for method in sorted(self.methods.values(), order, |method| &method.info.key) {
			method.accept(visitor, order)?;
		}

		visitor.visit_end()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
	pub desc: FieldDescriptor,
	pub name: FieldName,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
	pub key: FieldKey,
	pub names: KeyedNames<FieldName>,
}

impl ToKey<FieldKey> for FieldMapping {
	fn get_key(&self) -> FieldKey {
		self.key.clone()
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldNowodeMapping {
	pub info: FieldMapping,
	pub javadoc: Option<JavadocMapping>,
}

impl NodeInfo<FieldMapping> for FieldNowodeMapping {
	fn get_node_info(&self) -> &FieldMapping {
		&self.info
	}

	fn new(info: FieldMapping) -> FieldNowodeMapping {
		FieldNowodeMapping {
			info,
			javadoc: None,
		}
	}
}

impl FieldNowodeMapping {
	fn accept(&self, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
		if visitor.visit_field(&self.info.key.name, &self.info.key.desc)?.is_break() {
			return Ok(());
		}
		accept_names(visitor, self.info.names.names())?;
		accept_javadoc(visitor, &self.javadoc)?;
		visitor.visit_end()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
	pub desc: MethodDescriptor,
	pub name: MethodName,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodMapping {
	pub key: MethodKey,
	pub names: KeyedNames<MethodName>,
}

impl ToKey<MethodKey> for MethodMapping {
	fn get_key(&self) -> MethodKey {
		self.key.clone()
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodNowodeMapping {
	pub info: MethodMapping,
	pub parameters: IndexMap<ParameterKey, ParameterNowodeMapping>,
	pub local_variables: IndexMap<LocalVariableKey, LocalVariableNowodeMapping>,
	pub javadoc: Option<JavadocMapping>,
}

impl NodeInfo<MethodMapping> for MethodNowodeMapping {
	fn get_node_info(&self) -> &MethodMapping {
		&self.info
	}

	fn new(info: MethodMapping) -> Self {
		MethodNowodeMapping {
			info,
			parameters: IndexMap::new(),
			local_variables: IndexMap::new(),
			javadoc: None,
		}
	}
}

impl MethodNowodeMapping {
	fn accept(&self, visitor: &mut (impl MappingVisitor + ?Sized), order: Order) -> Result<()> {
		if visitor.visit_method(&self.info.key.name, &self.info.key.desc)?.is_break() {
			return Ok(());
		}
		accept_names(visitor, self.info.names.names())?;
		accept_javadoc(visitor, &self.javadoc)?;

		for parameter in sorted(self.parameters.values(), order, |parameter| &parameter.info.key) {
			parameter.accept(visitor)?;
		}
		for local_variable in sorted(self.local_variables.values(), order, |local_variable| &local_variable.info.key) {
			local_variable.accept(visitor)?;
		}

		visitor.visit_end()
	}
}

/// A parameter is keyed by its local variable index, as the formats give it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterKey {
	pub index: usize,
}

/// The names of a parameter. Unlike the other elements, the name in the source namespace may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMapping {
	pub key: ParameterKey,
	pub names: Names<ParameterName>,
}

impl ToKey<ParameterKey> for ParameterMapping {
	fn get_key(&self) -> ParameterKey {
		self.key
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterNowodeMapping {
	pub info: ParameterMapping,
	pub javadoc: Option<JavadocMapping>,
}

impl NodeInfo<ParameterMapping> for ParameterNowodeMapping {
	fn get_node_info(&self) -> &ParameterMapping {
		&self.info
	}

	fn new(info: ParameterMapping) -> ParameterNowodeMapping {
		ParameterNowodeMapping {
			info,
			javadoc: None,
		}
	}
}

impl ParameterNowodeMapping {
	fn accept(&self, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
		if visitor.visit_parameter(self.info.key.index, self.info.names.src().map(|x| x.as_slice()))?.is_break() {
			return Ok(());
		}
		accept_names(visitor, &self.info.names)?;
		accept_javadoc(visitor, &self.javadoc)?;
		visitor.visit_end()
	}
}

/// A local variable is keyed by its local variable index and the offset of the instruction where it starts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalVariableKey {
	pub lv_index: usize,
	pub start_offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariableMapping {
	pub key: LocalVariableKey,
	/// The row of the local variable table, if known.
	pub lvt_row_index: Option<usize>,
	pub names: Names<LocalVariableName>,
}

impl ToKey<LocalVariableKey> for LocalVariableMapping {
	fn get_key(&self) -> LocalVariableKey {
		self.key
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariableNowodeMapping {
	pub info: LocalVariableMapping,
	pub javadoc: Option<JavadocMapping>,
}

impl NodeInfo<LocalVariableMapping> for LocalVariableNowodeMapping {
	fn get_node_info(&self) -> &LocalVariableMapping {
		&self.info
	}

	fn new(info: LocalVariableMapping) -> LocalVariableNowodeMapping {
		LocalVariableNowodeMapping {
			info,
			javadoc: None,
		}
	}
}

impl LocalVariableNowodeMapping {
	fn accept(&self, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
		let src = self.info.names.src().map(|x| x.as_slice());
		if visitor.visit_local_variable(self.info.key, self.info.lvt_row_index, src)?.is_break() {
			return Ok(());
		}
		accept_names(visitor, &self.info.names)?;
		accept_javadoc(visitor, &self.javadoc)?;
		visitor.visit_end()
	}
}
