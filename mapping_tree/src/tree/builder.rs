//! Building a [`MappingTree`] from a stream of events.
//!
//! The [`MappingTreeBuilder`] is a [`MappingVisitor`]. Once it received the end of the stream, it can be turned
//! into the immutable [`MappingTree`] with [`MappingTreeBuilder::finish`].
//!
//! Elements are keyed by their source names. If an element is declared more than once, the [`DefinitionMode`]
//! decides what happens.

use std::ops::ControlFlow;
use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use indexmap::map::Entry;
use jvm_names::{ClassName, ClassNameSlice, FieldDescriptorSlice, FieldName, FieldNameSlice, LocalVariableName, LocalVariableNameSlice, MethodDescriptorSlice, MethodName, MethodNameSlice, ParameterName, ParameterNameSlice};
use crate::MappingError;
use crate::tree::mappings::{ClassMapping, ClassNowodeMapping, FieldKey, FieldMapping, FieldNowodeMapping, JavadocMapping, KeyedNames, LocalVariableKey, LocalVariableMapping, LocalVariableNowodeMapping, MappingTree, MethodKey, MethodMapping, MethodNowodeMapping, ParameterKey, ParameterMapping, ParameterNowodeMapping};
use crate::tree::names::{Names, Namespace};
use crate::tree::NodeInfo;
use crate::visitor::{ElementKind, MappingVisitor, StreamState};

/// What to do when an element is declared a second time.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum DefinitionMode {
	/// A redeclaration must be identical to the first declaration, in every name and in the comment.
	#[default]
	Strict,
	/// A redeclaration fills the slots that are still empty. Giving a different name for an already named slot
	/// is still an error.
	Merge,
}

/// What the current declaration of an element has given so far.
#[derive(Debug)]
struct Declaration {
	/// Whether the element already existed before this declaration.
	redeclared: bool,
	/// For each namespace, whether this declaration gave a name.
	seen: Vec<bool>,
	comment: Option<String>,
	lvt_row_index: Option<usize>,
}

impl Declaration {
	fn new(len: usize, redeclared: bool) -> Declaration {
		let mut seen = vec![false; len];
		if let Some(src) = seen.first_mut() {
			*src = true;
		}
		Declaration { redeclared, seen, comment: None, lvt_row_index: None }
	}

	fn strict_redeclaration(&self, mode: DefinitionMode) -> bool {
		self.redeclared && mode == DefinitionMode::Strict
	}
}

#[derive(Debug)]
enum Member {
	Field(FieldKey),
	Method(MethodKey),
}

#[derive(Debug)]
enum Local {
	Parameter(ParameterKey),
	LocalVariable(LocalVariableKey),
}

/// The path to the innermost open element.
#[derive(Debug, Default)]
struct Cursor {
	class: Option<(ClassName, Declaration)>,
	member: Option<(Member, Declaration)>,
	local: Option<(Local, Declaration)>,
}

impl Cursor {
	fn innermost(&mut self) -> Option<&mut Declaration> {
		if let Some((_, decl)) = &mut self.local {
			Some(decl)
		} else if let Some((_, decl)) = &mut self.member {
			Some(decl)
		} else {
			self.class.as_mut().map(|(_, decl)| decl)
		}
	}

	fn pop(&mut self) {
		if self.local.take().is_none() && self.member.take().is_none() {
			self.class = None;
		}
	}

	fn describe(&self) -> String {
		let mut s = String::new();
		if let Some((class, _)) = &self.class {
			s.push_str(&format!("class {class}"));
		}
		match &self.member {
			Some((Member::Field(key), _)) => s.push_str(&format!(", field {} {}", key.name, key.desc)),
			Some((Member::Method(key), _)) => s.push_str(&format!(", method {}{}", key.name, key.desc)),
			None => {},
		}
		match &self.local {
			Some((Local::Parameter(key), _)) => s.push_str(&format!(", parameter {}", key.index)),
			Some((Local::LocalVariable(key), _)) => s.push_str(&format!(", local variable {} at {}", key.lv_index, key.start_offset)),
			None => {},
		}
		s
	}
}

enum Current<'a> {
	Class(&'a mut ClassNowodeMapping),
	Field(&'a mut FieldNowodeMapping),
	Method(&'a mut MethodNowodeMapping),
	Parameter(&'a mut ParameterNowodeMapping),
	LocalVariable(&'a mut LocalVariableNowodeMapping),
}

fn missing_node(what: &str) -> anyhow::Error {
	anyhow!("the open {what} is missing from the tree")
}

/// Gets the innermost open element, together with its declaration.
fn current<'a>(classes: &'a mut IndexMap<ClassName, ClassNowodeMapping>, cursor: &'a mut Cursor) -> Result<(Current<'a>, &'a mut Declaration)> {
	let Cursor { class, member, local } = cursor;

	let (class_key, class_decl) = class.as_mut()
		.ok_or_else(|| anyhow!(MappingError::malformed("no element is open")))?;
	let class = classes.get_mut(&*class_key).ok_or_else(|| missing_node("class"))?;

	match member.as_mut() {
		None => Ok((Current::Class(class), class_decl)),
		Some((Member::Field(key), decl)) => {
			let field = class.fields.get_mut(&*key).ok_or_else(|| missing_node("field"))?;
			Ok((Current::Field(field), decl))
		},
		Some((Member::Method(key), decl)) => {
			let method = class.methods.get_mut(&*key).ok_or_else(|| missing_node("method"))?;
			match local.as_mut() {
				None => Ok((Current::Method(method), decl)),
				Some((Local::Parameter(key), decl)) => {
					let parameter = method.parameters.get_mut(&*key).ok_or_else(|| missing_node("parameter"))?;
					Ok((Current::Parameter(parameter), decl))
				},
				Some((Local::LocalVariable(key), decl)) => {
					let local_variable = method.local_variables.get_mut(&*key).ok_or_else(|| missing_node("local variable"))?;
					Ok((Current::LocalVariable(local_variable), decl))
				},
			}
		},
	}
}

#[derive(Debug)]
enum Slot {
	Name(Namespace),
	Comment,
	LvtRowIndex,
}

/// A conflict between the existing tree and the current declaration.
#[derive(Debug)]
struct Conflict {
	slot: Slot,
	existing: String,
	new: String,
}

fn define_name<T: PartialEq + AsRef<str>>(
	names: &mut Names<T>,
	decl: &mut Declaration,
	namespace: Namespace,
	name: T,
	mode: DefinitionMode,
) -> Result<(), Conflict> {
	if let Some(seen) = decl.seen.get_mut(namespace.0) {
		*seen = true;
	}
	if let Some(slot) = names.slot_mut(namespace) {
		match slot {
			Some(existing) if *existing == name => {},
			Some(existing) => {
				return Err(Conflict {
					slot: Slot::Name(namespace),
					existing: existing.as_ref().to_owned(),
					new: name.as_ref().to_owned(),
				});
			},
			None if decl.strict_redeclaration(mode) => {
				return Err(Conflict { slot: Slot::Name(namespace), existing: String::new(), new: name.as_ref().to_owned() });
			},
			None => *slot = Some(name),
		}
	}
	Ok(())
}

/// Applies the comment of the declaration, and checks that a strict redeclaration didn't leave anything out.
fn finish_declaration<T: AsRef<str>>(
	names: &Names<T>,
	javadoc: &mut Option<JavadocMapping>,
	decl: &mut Declaration,
	mode: DefinitionMode,
) -> Result<(), Conflict> {
	if decl.strict_redeclaration(mode) {
		for (namespace, name) in names.iter() {
			if !decl.seen.get(namespace.0).copied().unwrap_or(false) {
				return Err(Conflict { slot: Slot::Name(namespace), existing: name.as_ref().to_owned(), new: String::new() });
			}
		}
	}

	let strict = decl.strict_redeclaration(mode);
	let Some(new) = decl.comment.take() else {
		return match javadoc {
			Some(existing) if strict => Err(Conflict { slot: Slot::Comment, existing: existing.0.clone(), new: String::new() }),
			_ => Ok(()),
		};
	};
	match javadoc {
		Some(existing) if existing.0 != new => Err(Conflict { slot: Slot::Comment, existing: existing.0.clone(), new }),
		Some(_) => Ok(()),
		None if strict => Err(Conflict { slot: Slot::Comment, existing: String::new(), new }),
		None => {
			*javadoc = Some(JavadocMapping(new));
			Ok(())
		},
	}
}

fn define_lvt_row_index(existing: &mut Option<usize>, decl: &Declaration, new: Option<usize>, mode: DefinitionMode) -> Result<(), Conflict> {
	let conflict = |existing: Option<usize>| Conflict {
		slot: Slot::LvtRowIndex,
		existing: existing.map(|x| x.to_string()).unwrap_or_default(),
		new: new.map(|x| x.to_string()).unwrap_or_default(),
	};
	match (*existing, new) {
		(a, b) if a == b => Ok(()),
		(None, Some(_)) if !decl.strict_redeclaration(mode) => {
			*existing = new;
			Ok(())
		},
		(Some(_), None) if mode == DefinitionMode::Merge => Ok(()),
		(a, _) => Err(conflict(a)),
	}
}

/// Builds a [`MappingTree`] from visitor events.
///
/// ```
/// use jvm_names::ClassName;
/// use mapping_tree::tree::builder::MappingTreeBuilder;
/// use mapping_tree::tree::names::{Namespace, Namespaces};
/// use mapping_tree::visitor::MappingVisitor;
///
/// let mut builder = MappingTreeBuilder::default();
/// builder.visit_namespaces(&Namespaces::try_from(&["official", "named"][..]).unwrap()).unwrap();
/// builder.visit_class(&ClassName::try_from("a").unwrap()).unwrap();
/// builder.visit_dst_name(Namespace::new(1), "com/example/Main").unwrap();
/// builder.visit_end().unwrap();
/// builder.visit_end().unwrap();
///
/// let tree = builder.finish().unwrap();
/// let class = tree.get_class(&ClassName::try_from("a").unwrap()).unwrap();
/// assert_eq!(class.info.names.get(Namespace::new(1)).unwrap(), "com/example/Main");
/// ```
#[derive(Debug, Default)]
pub struct MappingTreeBuilder {
	mode: DefinitionMode,
	state: StreamState,
	classes: IndexMap<ClassName, ClassNowodeMapping>,
	cursor: Cursor,
}

impl MappingTreeBuilder {
	pub fn new(mode: DefinitionMode) -> MappingTreeBuilder {
		MappingTreeBuilder { mode, ..MappingTreeBuilder::default() }
	}

	/// Turns the builder into the immutable tree. Fails if the stream wasn't closed yet.
	pub fn finish(self) -> Result<MappingTree> {
		if !self.state.is_closed() {
			bail!(MappingError::malformed("the stream wasn't closed before finishing the tree"));
		}
		let namespaces = self.state.namespaces()?.clone();
		Ok(MappingTree::new(namespaces, self.classes))
	}

	fn check_mutable(&self) -> Result<()> {
		if self.state.is_closed() {
			bail!(MappingError::ImmutableTree);
		}
		Ok(())
	}

	fn len(&self) -> Result<usize> {
		Ok(self.state.namespaces()?.len())
	}

	fn conflict_error(&self, conflict: Conflict) -> anyhow::Error {
		let namespace = match conflict.slot {
			Slot::Name(namespace) => self.state.namespaces().ok()
				.and_then(|namespaces| namespaces.get(namespace))
				.map_or_else(|| format!("{namespace:?}"), ToOwned::to_owned),
			Slot::Comment => "comment".to_owned(),
			Slot::LvtRowIndex => "lvt row index".to_owned(),
		};
		anyhow!(MappingError::ConflictingDefinition {
			element: self.cursor.describe(),
			namespace,
			existing: conflict.existing,
			new: conflict.new,
		})
	}

	fn current_class(&mut self) -> Result<&mut ClassNowodeMapping> {
		let (key, _) = self.cursor.class.as_ref()
			.ok_or_else(|| anyhow!(MappingError::malformed("no class is open")))?;
		self.classes.get_mut(key).ok_or_else(|| missing_node("class"))
	}

	fn current_method(&mut self) -> Result<&mut MethodNowodeMapping> {
		let Some((Member::Method(key), _)) = &self.cursor.member else {
			bail!(MappingError::malformed("no method is open"));
		};
		let (class_key, _) = self.cursor.class.as_ref()
			.ok_or_else(|| anyhow!(MappingError::malformed("no class is open")))?;
		self.classes.get_mut(class_key).ok_or_else(|| missing_node("class"))?
			.methods.get_mut(key).ok_or_else(|| missing_node("method"))
	}
}

impl MappingVisitor for MappingTreeBuilder {
	fn visit_namespaces(&mut self, namespaces: &crate::tree::names::Namespaces) -> Result<()> {
		self.check_mutable()?;
		self.state.visit_namespaces(namespaces)
	}

	fn visit_class(&mut self, src: &ClassNameSlice) -> Result<ControlFlow<()>> {
		self.check_mutable()?;
		self.state.check_open(ElementKind::Class)?;
		let len = self.len()?;

		let redeclared = match self.classes.entry(src.to_owned()) {
			Entry::Occupied(_) => true,
			Entry::Vacant(e) => {
				e.insert(ClassNowodeMapping::new(ClassMapping { names: KeyedNames::new(len, src.to_owned()) }));
				false
			},
		};

		self.cursor.class = Some((src.to_owned(), Declaration::new(len, redeclared)));
		self.state.push(ElementKind::Class);
		Ok(ControlFlow::Continue(()))
	}

	fn visit_field(&mut self, src: &FieldNameSlice, desc: &FieldDescriptorSlice) -> Result<ControlFlow<()>> {
		self.check_mutable()?;
		self.state.check_open(ElementKind::Field)?;
		let len = self.len()?;

		let key = FieldKey { desc: desc.to_owned(), name: src.to_owned() };
		let redeclared = match self.current_class()?.fields.entry(key.clone()) {
			Entry::Occupied(_) => true,
			Entry::Vacant(e) => {
				e.insert(FieldNowodeMapping::new(FieldMapping {
					key: key.clone(),
					names: KeyedNames::new(len, src.to_owned()),
				}));
				false
			},
		};

		self.cursor.member = Some((Member::Field(key), Declaration::new(len, redeclared)));
		self.state.push(ElementKind::Field);
		Ok(ControlFlow::Continue(()))
	}

	fn visit_method(&mut self, src: &MethodNameSlice, desc: &MethodDescriptorSlice) -> Result<ControlFlow<()>> {
		self.check_mutable()?;
		self.state.check_open(ElementKind::Method)?;
		let len = self.len()?;

		let key = MethodKey { desc: desc.to_owned(), name: src.to_owned() };
		let redeclared = match self.current_class()?.methods.entry(key.clone()) {
			Entry::Occupied(_) => true,
			Entry::Vacant(e) => {
				e.insert(MethodNowodeMapping::new(MethodMapping {
					key: key.clone(),
					names: KeyedNames::new(len, src.to_owned()),
				}));
				false
			},
		};

		self.cursor.member = Some((Member::Method(key), Declaration::new(len, redeclared)));
		self.state.push(ElementKind::Method);
		Ok(ControlFlow::Continue(()))
	}

	fn visit_parameter(&mut self, index: usize, src: Option<&ParameterNameSlice>) -> Result<ControlFlow<()>> {
		self.check_mutable()?;
		self.state.check_open(ElementKind::Parameter)?;
		let len = self.len()?;
		let mode = self.mode;

		let key = ParameterKey { index };
		let mut decl = Declaration::new(len, false);
		let conflict = match self.current_method()?.parameters.entry(key) {
			Entry::Occupied(mut e) => {
				decl = Declaration::new(len, true);
				decl.seen[0] = false;
				match src {
					Some(src) => define_name(&mut e.get_mut().info.names, &mut decl, Namespace::SOURCE, src.to_owned(), mode).err(),
					None => None,
				}
			},
			Entry::Vacant(e) => {
				e.insert(ParameterNowodeMapping::new(ParameterMapping {
					key,
					names: Names::from_src(len, src.map(ToOwned::to_owned)),
				}));
				None
			},
		};

		self.cursor.local = Some((Local::Parameter(key), decl));
		if let Some(conflict) = conflict {
			return Err(self.conflict_error(conflict));
		}
		self.state.push(ElementKind::Parameter);
		Ok(ControlFlow::Continue(()))
	}

	fn visit_local_variable(&mut self, key: LocalVariableKey, lvt_row_index: Option<usize>, src: Option<&LocalVariableNameSlice>) -> Result<ControlFlow<()>> {
		self.check_mutable()?;
		self.state.check_open(ElementKind::LocalVariable)?;
		let len = self.len()?;
		let mode = self.mode;

		let mut decl = Declaration::new(len, false);
		decl.lvt_row_index = lvt_row_index;
		let conflict = match self.current_method()?.local_variables.entry(key) {
			Entry::Occupied(mut e) => {
				decl.redeclared = true;
				decl.seen[0] = false;
				let existing = e.get_mut();
				define_lvt_row_index(&mut existing.info.lvt_row_index, &decl, lvt_row_index, mode)
					.and_then(|()| match src {
						Some(src) => define_name(&mut existing.info.names, &mut decl, Namespace::SOURCE, src.to_owned(), mode),
						None => Ok(()),
					})
					.err()
			},
			Entry::Vacant(e) => {
				e.insert(LocalVariableNowodeMapping::new(LocalVariableMapping {
					key,
					lvt_row_index,
					names: Names::from_src(len, src.map(ToOwned::to_owned)),
				}));
				None
			},
		};

		self.cursor.local = Some((Local::LocalVariable(key), decl));
		if let Some(conflict) = conflict {
			return Err(self.conflict_error(conflict));
		}
		self.state.push(ElementKind::LocalVariable);
		Ok(ControlFlow::Continue(()))
	}

	fn visit_dst_name(&mut self, namespace: Namespace, name: &str) -> Result<()> {
		self.check_mutable()?;
		self.state.check_dst_name(namespace, name)?;
		let mode = self.mode;

		let result = {
			let (current, decl) = current(&mut self.classes, &mut self.cursor)?;
			match current {
				Current::Class(class) => {
					let name = ClassName::try_from(name)?;
					define_name(class.info.names.names_mut(), decl, namespace, name, mode)
				},
				Current::Field(field) => {
					let name = FieldName::try_from(name)?;
					define_name(field.info.names.names_mut(), decl, namespace, name, mode)
				},
				Current::Method(method) => {
					let name = MethodName::try_from(name)?;
					define_name(method.info.names.names_mut(), decl, namespace, name, mode)
				},
				Current::Parameter(parameter) => {
					let name = ParameterName::try_from(name)?;
					define_name(&mut parameter.info.names, decl, namespace, name, mode)
				},
				Current::LocalVariable(local_variable) => {
					let name = LocalVariableName::try_from(name)?;
					define_name(&mut local_variable.info.names, decl, namespace, name, mode)
				},
			}
		};

		result.map_err(|conflict| self.conflict_error(conflict))
	}

	fn visit_comment(&mut self, comment: &str) -> Result<()> {
		self.check_mutable()?;
		self.state.current()?;

		let decl = self.cursor.innermost()
			.ok_or_else(|| anyhow!(MappingError::malformed("no element is open for the comment")))?;
		match &mut decl.comment {
			Some(existing) => {
				existing.push('\n');
				existing.push_str(comment);
			},
			None => decl.comment = Some(comment.to_owned()),
		}
		Ok(())
	}

	fn visit_end(&mut self) -> Result<()> {
		self.check_mutable()?;
		if self.state.close()?.is_none() {
			// that was the end of the stream
			return Ok(());
		}
		let mode = self.mode;

		let result = {
			let (current, decl) = current(&mut self.classes, &mut self.cursor)?;
			match current {
				Current::Class(class) => finish_declaration(class.info.names.names(), &mut class.javadoc, decl, mode),
				Current::Field(field) => finish_declaration(field.info.names.names(), &mut field.javadoc, decl, mode),
				Current::Method(method) => finish_declaration(method.info.names.names(), &mut method.javadoc, decl, mode),
				Current::Parameter(parameter) => finish_declaration(&parameter.info.names, &mut parameter.javadoc, decl, mode),
				Current::LocalVariable(local_variable) => finish_declaration(&local_variable.info.names, &mut local_variable.javadoc, decl, mode),
			}
		};

		result.map_err(|conflict| self.conflict_error(conflict))
			.with_context(|| anyhow!("while closing {}", self.cursor.describe()))?;
		self.cursor.pop();
		Ok(())
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use jvm_names::{ClassName, FieldDescriptor, FieldName, MethodDescriptor, MethodName, ParameterName};
	use crate::MappingError;
	use crate::tree::builder::{DefinitionMode, MappingTreeBuilder};
	use crate::tree::names::{Namespace, Namespaces};
	use crate::visitor::{replay, MappingEvent, MappingVisitor};

	fn class(src: &str, dst: Option<&str>, comment: Option<&str>) -> Result<Vec<MappingEvent>> {
		let mut events = vec![MappingEvent::Class(ClassName::try_from(src)?)];
		if let Some(dst) = dst {
			events.push(MappingEvent::DstName(Namespace::new(1), dst.to_owned()));
		}
		if let Some(comment) = comment {
			events.push(MappingEvent::Comment(comment.to_owned()));
		}
		events.push(MappingEvent::End);
		Ok(events)
	}

	fn stream(classes: Vec<Vec<MappingEvent>>) -> Result<Vec<MappingEvent>> {
		let mut events = vec![MappingEvent::Namespaces(Namespaces::try_from(&["src", "dst"][..])?)];
		events.extend(classes.into_iter().flatten());
		events.push(MappingEvent::End);
		Ok(events)
	}

	fn build(mode: DefinitionMode, events: &[MappingEvent]) -> Result<crate::tree::mappings::MappingTree> {
		let mut builder = MappingTreeBuilder::new(mode);
		replay(events, &mut builder)?;
		builder.finish()
	}

	fn conflict(result: Result<crate::tree::mappings::MappingTree>) -> Option<String> {
		match result {
			Ok(_) => None,
			Err(e) => match MappingError::find(&e) {
				Some(MappingError::ConflictingDefinition { namespace, .. }) => Some(namespace.clone()),
				_ => None,
			},
		}
	}

	#[test]
	fn identical_redeclaration_is_accepted() -> Result<()> {
		let events = stream(vec![class("a", Some("A"), Some("doc"))?, class("a", Some("A"), Some("doc"))?])?;
		let tree = build(DefinitionMode::Strict, &events)?;
		assert_eq!(tree.class_count(), 1);
		Ok(())
	}

	#[test]
	fn strict_redeclaration_conflicts() -> Result<()> {
		let differing = stream(vec![class("a", Some("A"), None)?, class("a", Some("B"), None)?])?;
		assert_eq!(conflict(build(DefinitionMode::Strict, &differing)), Some("dst".to_owned()));

		let missing = stream(vec![class("a", Some("A"), None)?, class("a", None, None)?])?;
		assert_eq!(conflict(build(DefinitionMode::Strict, &missing)), Some("dst".to_owned()));

		let added = stream(vec![class("a", None, None)?, class("a", Some("A"), None)?])?;
		assert_eq!(conflict(build(DefinitionMode::Strict, &added)), Some("dst".to_owned()));

		let comment = stream(vec![class("a", None, Some("x"))?, class("a", None, Some("y"))?])?;
		assert_eq!(conflict(build(DefinitionMode::Strict, &comment)), Some("comment".to_owned()));
		Ok(())
	}

	#[test]
	fn merge_fills_empty_slots() -> Result<()> {
		let events = stream(vec![class("a", None, None)?, class("a", Some("A"), Some("doc"))?, class("a", None, None)?])?;
		let tree = build(DefinitionMode::Merge, &events)?;

		let a = tree.get_class(&ClassName::try_from("a")?).unwrap();
		assert_eq!(a.info.names.get(Namespace::new(1)).unwrap(), "A");
		assert_eq!(a.javadoc.as_ref().unwrap().0, "doc");

		let differing = stream(vec![class("a", Some("A"), None)?, class("a", Some("B"), None)?])?;
		assert_eq!(conflict(build(DefinitionMode::Merge, &differing)), Some("dst".to_owned()));
		Ok(())
	}

	#[test]
	fn comments_within_one_declaration_are_joined() -> Result<()> {
		let mut a = class("a", None, Some("first"))?;
		a.insert(2, MappingEvent::Comment("second".to_owned()));
		let tree = build(DefinitionMode::Strict, &stream(vec![a])?)?;

		let a = tree.get_class(&ClassName::try_from("a")?).unwrap();
		assert_eq!(a.javadoc.as_ref().unwrap().0, "first\nsecond");
		Ok(())
	}

	#[test]
	fn members_and_parameters() -> Result<()> {
		let events = stream(vec![vec![
			MappingEvent::Class(ClassName::try_from("a")?),
			MappingEvent::Field(FieldName::try_from("f")?, FieldDescriptor::try_from("La;")?),
			MappingEvent::DstName(Namespace::new(1), "field".to_owned()),
			MappingEvent::End,
			MappingEvent::Method(MethodName::try_from("m")?, MethodDescriptor::try_from("(I)V")?),
			MappingEvent::Parameter(1, None),
			MappingEvent::DstName(Namespace::new(1), "value".to_owned()),
			MappingEvent::End,
			MappingEvent::End,
			MappingEvent::End,
		]])?;
		let tree = build(DefinitionMode::Strict, &events)?;

		let a = tree.get_class(&ClassName::try_from("a")?).unwrap();
		let field = a.get_field("f", "La;").unwrap();
		assert_eq!(field.info.names.get(Namespace::new(1)).unwrap(), "field");

		let method = a.get_method("m", "(I)V").unwrap();
		let parameter = method.parameters.values().next().unwrap();
		assert_eq!(parameter.info.key.index, 1);
		assert_eq!(parameter.info.names.src(), None);
		assert_eq!(parameter.info.names.get(Namespace::new(1)), Some(&ParameterName::try_from("value")?));
		Ok(())
	}

	#[test]
	fn events_after_the_end_are_refused() -> Result<()> {
		let mut builder = MappingTreeBuilder::default();
		replay(&stream(vec![class("a", None, None)?])?, &mut builder)?;

		let error = builder.visit_class(&ClassName::try_from("b")?).unwrap_err();
		assert_eq!(MappingError::find(&error), Some(&MappingError::ImmutableTree));

		let error = builder.visit_end().unwrap_err();
		assert_eq!(MappingError::find(&error), Some(&MappingError::ImmutableTree));
		Ok(())
	}

	#[test]
	fn unclosed_stream_cannot_finish() -> Result<()> {
		let mut events = stream(vec![class("a", None, None)?])?;
		events.pop();

		let mut builder = MappingTreeBuilder::default();
		replay(&events, &mut builder)?;
		let error = builder.finish().unwrap_err();
		assert!(matches!(MappingError::find(&error), Some(MappingError::MalformedStream(_))));
		Ok(())
	}
}
