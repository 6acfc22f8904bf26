//! The event protocol that all readers emit into and all writers consume.
//!
//! A stream of events looks like this:
//! ```text
//! namespaces
//! class
//!     dst name*  comment*
//!     field | method
//!         dst name*  comment*
//!         parameter | local variable      (only inside of methods)
//!             dst name*  comment*
//!         end
//!     end
//! end
//! end                                      (closes the stream)
//! ```
//! Every `visit_class`, `visit_field`, `visit_method`, `visit_parameter` and `visit_local_variable` call returns
//! a [`ControlFlow`]. If the visitor returns [`ControlFlow::Break`], the element is skipped: the producer doesn't
//! emit any of its events, including its `visit_end`.
//!
//! Producers that can't guarantee the protocol themselves, or consumers that don't check it, can be combined with
//! the [`StreamChecker`], which turns every violation into a [`MappingError::MalformedStream`].

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use anyhow::{anyhow, bail, Context, Result};
use jvm_names::{ClassName, ClassNameSlice, FieldDescriptor, FieldDescriptorSlice, FieldName, FieldNameSlice, LocalVariableName, LocalVariableNameSlice, MethodDescriptor, MethodDescriptorSlice, MethodName, MethodNameSlice, ParameterName, ParameterNameSlice};
use crate::MappingError;
use crate::tree::mappings::LocalVariableKey;
use crate::tree::names::{Namespace, Namespaces};

/// A consumer of mapping events. See the [module documentation][self] for the order of events.
pub trait MappingVisitor {
	/// Declares the namespaces of the stream. This is the first event, and it's given exactly once.
	fn visit_namespaces(&mut self, namespaces: &Namespaces) -> Result<()>;

	fn visit_class(&mut self, src: &ClassNameSlice) -> Result<ControlFlow<()>>;

	fn visit_field(&mut self, src: &FieldNameSlice, desc: &FieldDescriptorSlice) -> Result<ControlFlow<()>>;

	fn visit_method(&mut self, src: &MethodNameSlice, desc: &MethodDescriptorSlice) -> Result<ControlFlow<()>>;

	/// Opens a parameter, given by its local variable index. The name in the source namespace may be absent.
	fn visit_parameter(&mut self, index: usize, src: Option<&ParameterNameSlice>) -> Result<ControlFlow<()>>;

	fn visit_local_variable(&mut self, key: LocalVariableKey, lvt_row_index: Option<usize>, src: Option<&LocalVariableNameSlice>) -> Result<ControlFlow<()>>;

	/// Sets the name of the innermost open element in a destination namespace.
	///
	/// The name is checked by the consumer, according to the kind of the element.
	fn visit_dst_name(&mut self, namespace: Namespace, name: &str) -> Result<()>;

	/// Attaches a comment to the innermost open element.
	fn visit_comment(&mut self, comment: &str) -> Result<()>;

	/// Closes the innermost open element, or the stream itself if no element is open.
	fn visit_end(&mut self) -> Result<()>;
}

impl<V: MappingVisitor + ?Sized> MappingVisitor for &mut V {
	fn visit_namespaces(&mut self, namespaces: &Namespaces) -> Result<()> {
		(**self).visit_namespaces(namespaces)
	}
	fn visit_class(&mut self, src: &ClassNameSlice) -> Result<ControlFlow<()>> {
		(**self).visit_class(src)
	}
	fn visit_field(&mut self, src: &FieldNameSlice, desc: &FieldDescriptorSlice) -> Result<ControlFlow<()>> {
		(**self).visit_field(src, desc)
	}
	fn visit_method(&mut self, src: &MethodNameSlice, desc: &MethodDescriptorSlice) -> Result<ControlFlow<()>> {
		(**self).visit_method(src, desc)
	}
	fn visit_parameter(&mut self, index: usize, src: Option<&ParameterNameSlice>) -> Result<ControlFlow<()>> {
		(**self).visit_parameter(index, src)
	}
	fn visit_local_variable(&mut self, key: LocalVariableKey, lvt_row_index: Option<usize>, src: Option<&LocalVariableNameSlice>) -> Result<ControlFlow<()>> {
		(**self).visit_local_variable(key, lvt_row_index, src)
	}
	fn visit_dst_name(&mut self, namespace: Namespace, name: &str) -> Result<()> {
		(**self).visit_dst_name(namespace, name)
	}
	fn visit_comment(&mut self, comment: &str) -> Result<()> {
		(**self).visit_comment(comment)
	}
	fn visit_end(&mut self) -> Result<()> {
		(**self).visit_end()
	}
}

/// A single event of the visitor protocol, in owned form.
///
/// A `Vec<MappingEvent>` is a [`MappingVisitor`] that records everything it's given, and [`replay`] feeds
/// recorded events into another visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingEvent {
	Namespaces(Namespaces),
	Class(ClassName),
	Field(FieldName, FieldDescriptor),
	Method(MethodName, MethodDescriptor),
	Parameter(usize, Option<ParameterName>),
	LocalVariable(LocalVariableKey, Option<usize>, Option<LocalVariableName>),
	DstName(Namespace, String),
	Comment(String),
	End,
}

impl MappingEvent {
	fn opens_element(&self) -> bool {
		matches!(self,
			MappingEvent::Class(_) | MappingEvent::Field(..) | MappingEvent::Method(..) |
			MappingEvent::Parameter(..) | MappingEvent::LocalVariable(..)
		)
	}

	/// Gives this event to the visitor.
	///
	/// Only events opening an element can return [`ControlFlow::Break`].
	pub fn accept(&self, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<ControlFlow<()>> {
		match self {
			MappingEvent::Namespaces(namespaces) => visitor.visit_namespaces(namespaces).map(ControlFlow::Continue),
			MappingEvent::Class(src) => visitor.visit_class(src),
			MappingEvent::Field(src, desc) => visitor.visit_field(src, desc),
			MappingEvent::Method(src, desc) => visitor.visit_method(src, desc),
			MappingEvent::Parameter(index, src) => visitor.visit_parameter(*index, src.as_deref()),
			MappingEvent::LocalVariable(key, lvt_row_index, src) => visitor.visit_local_variable(*key, *lvt_row_index, src.as_deref()),
			MappingEvent::DstName(namespace, name) => visitor.visit_dst_name(*namespace, name).map(ControlFlow::Continue),
			MappingEvent::Comment(comment) => visitor.visit_comment(comment).map(ControlFlow::Continue),
			MappingEvent::End => visitor.visit_end().map(ControlFlow::Continue),
		}
	}
}

/// Feeds recorded events into a visitor.
///
/// If the visitor skips an element, all events up to and including the matching end are left out.
pub fn replay<'a>(events: impl IntoIterator<Item=&'a MappingEvent>, visitor: &mut (impl MappingVisitor + ?Sized)) -> Result<()> {
	let mut skip_depth = 0usize;
	for event in events {
		if skip_depth > 0 {
			if event.opens_element() {
				skip_depth += 1;
			} else if *event == MappingEvent::End {
				skip_depth -= 1;
			}
			continue;
		}

		if event.accept(visitor)?.is_break() {
			skip_depth = 1;
		}
	}
	Ok(())
}

impl MappingVisitor for Vec<MappingEvent> {
	fn visit_namespaces(&mut self, namespaces: &Namespaces) -> Result<()> {
		self.push(MappingEvent::Namespaces(namespaces.clone()));
		Ok(())
	}
	fn visit_class(&mut self, src: &ClassNameSlice) -> Result<ControlFlow<()>> {
		self.push(MappingEvent::Class(src.to_owned()));
		Ok(ControlFlow::Continue(()))
	}
	fn visit_field(&mut self, src: &FieldNameSlice, desc: &FieldDescriptorSlice) -> Result<ControlFlow<()>> {
		self.push(MappingEvent::Field(src.to_owned(), desc.to_owned()));
		Ok(ControlFlow::Continue(()))
	}
	fn visit_method(&mut self, src: &MethodNameSlice, desc: &MethodDescriptorSlice) -> Result<ControlFlow<()>> {
		self.push(MappingEvent::Method(src.to_owned(), desc.to_owned()));
		Ok(ControlFlow::Continue(()))
	}
	fn visit_parameter(&mut self, index: usize, src: Option<&ParameterNameSlice>) -> Result<ControlFlow<()>> {
		self.push(MappingEvent::Parameter(index, src.map(ToOwned::to_owned)));
		Ok(ControlFlow::Continue(()))
	}
	fn visit_local_variable(&mut self, key: LocalVariableKey, lvt_row_index: Option<usize>, src: Option<&LocalVariableNameSlice>) -> Result<ControlFlow<()>> {
		self.push(MappingEvent::LocalVariable(key, lvt_row_index, src.map(ToOwned::to_owned)));
		Ok(ControlFlow::Continue(()))
	}
	fn visit_dst_name(&mut self, namespace: Namespace, name: &str) -> Result<()> {
		self.push(MappingEvent::DstName(namespace, name.to_owned()));
		Ok(())
	}
	fn visit_comment(&mut self, comment: &str) -> Result<()> {
		self.push(MappingEvent::Comment(comment.to_owned()));
		Ok(())
	}
	fn visit_end(&mut self) -> Result<()> {
		self.push(MappingEvent::End);
		Ok(())
	}
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ElementKind {
	Class,
	Field,
	Method,
	Parameter,
	LocalVariable,
}

impl ElementKind {
	/// The kind of element this one must be nested in, `None` for the top level.
	fn parent(self) -> Option<ElementKind> {
		match self {
			ElementKind::Class => None,
			ElementKind::Field | ElementKind::Method => Some(ElementKind::Class),
			ElementKind::Parameter | ElementKind::LocalVariable => Some(ElementKind::Method),
		}
	}

	fn check_name(self, name: &str) -> Result<()> {
		match self {
			ElementKind::Class => ClassName::check_valid(name),
			ElementKind::Field => FieldName::check_valid(name),
			ElementKind::Method => MethodName::check_valid(name),
			ElementKind::Parameter => ParameterName::check_valid(name),
			ElementKind::LocalVariable => LocalVariableName::check_valid(name),
		}
	}
}

/// Tracks the position in an event stream, and rejects events that violate the protocol.
#[derive(Debug, Default)]
pub(crate) struct StreamState {
	namespaces: Option<Namespaces>,
	stack: Vec<ElementKind>,
	closed: bool,
}

impl StreamState {
	pub(crate) fn is_closed(&self) -> bool {
		self.closed
	}

	pub(crate) fn namespaces(&self) -> Result<&Namespaces> {
		self.namespaces.as_ref()
			.ok_or_else(|| anyhow!(MappingError::malformed("no namespaces were declared")))
	}

	fn check_not_closed(&self) -> Result<()> {
		if self.closed {
			bail!(MappingError::malformed("got an event after the end of the stream"));
		}
		Ok(())
	}

	pub(crate) fn visit_namespaces(&mut self, namespaces: &Namespaces) -> Result<()> {
		self.check_not_closed()?;
		if let Some(existing) = &self.namespaces {
			bail!(MappingError::malformed(format!("namespaces {namespaces:?} declared again, already got {existing:?}")));
		}
		self.namespaces = Some(namespaces.clone());
		Ok(())
	}

	/// Checks that an element of the given kind may be opened now. Call [`StreamState::push`] once it's opened.
	pub(crate) fn check_open(&self, kind: ElementKind) -> Result<()> {
		self.check_not_closed()?;
		self.namespaces()?;
		let current = self.stack.last().copied();
		if current != kind.parent() {
			bail!(MappingError::malformed(match current {
				Some(current) => format!("{kind:?} cannot be opened inside of a {current:?}"),
				None => format!("{kind:?} cannot be opened at the top level"),
			}));
		}
		Ok(())
	}

	pub(crate) fn push(&mut self, kind: ElementKind) {
		self.stack.push(kind);
	}

	pub(crate) fn current(&self) -> Result<ElementKind> {
		self.check_not_closed()?;
		self.stack.last().copied()
			.ok_or_else(|| anyhow!(MappingError::malformed("no element is open")))
	}

	pub(crate) fn check_dst_name(&self, namespace: Namespace, name: &str) -> Result<ElementKind> {
		let kind = self.current()?;
		self.namespaces()?.check_destination(namespace)?;
		kind.check_name(name)
			.with_context(|| anyhow!("invalid name for {kind:?} in namespace {namespace:?}"))?;
		Ok(kind)
	}

	/// Closes the innermost element, returning its kind, or closes the stream, returning `None`.
	pub(crate) fn close(&mut self) -> Result<Option<ElementKind>> {
		self.check_not_closed()?;
		self.namespaces()?;
		let kind = self.stack.pop();
		if kind.is_none() {
			self.closed = true;
		}
		Ok(kind)
	}
}

/// A visitor that checks the event protocol before handing the events on.
///
/// Violations are reported as [`MappingError::MalformedStream`]. Destination names are also checked to be valid
/// names for the kind of element they're given for.
#[derive(Debug)]
pub struct StreamChecker<V> {
	inner: V,
	state: StreamState,
}

impl<V> StreamChecker<V> {
	pub fn new(inner: V) -> StreamChecker<V> {
		StreamChecker { inner, state: StreamState::default() }
	}

	/// Returns the inner visitor, after checking that the stream was closed.
	pub fn finish(self) -> Result<V> {
		if !self.state.is_closed() {
			bail!(MappingError::malformed("the stream wasn't closed"));
		}
		Ok(self.inner)
	}

	fn open(&mut self, kind: ElementKind, f: impl FnOnce(&mut V) -> Result<ControlFlow<()>>) -> Result<ControlFlow<()>> {
		self.state.check_open(kind)?;
		let flow = f(&mut self.inner)?;
		if flow.is_continue() {
			self.state.push(kind);
		}
		Ok(flow)
	}
}

impl<V: MappingVisitor> MappingVisitor for StreamChecker<V> {
	fn visit_namespaces(&mut self, namespaces: &Namespaces) -> Result<()> {
		self.state.visit_namespaces(namespaces)?;
		self.inner.visit_namespaces(namespaces)
	}

	fn visit_class(&mut self, src: &ClassNameSlice) -> Result<ControlFlow<()>> {
		self.open(ElementKind::Class, |inner| inner.visit_class(src))
	}

	fn visit_field(&mut self, src: &FieldNameSlice, desc: &FieldDescriptorSlice) -> Result<ControlFlow<()>> {
		self.open(ElementKind::Field, |inner| inner.visit_field(src, desc))
	}

	fn visit_method(&mut self, src: &MethodNameSlice, desc: &MethodDescriptorSlice) -> Result<ControlFlow<()>> {
		self.open(ElementKind::Method, |inner| inner.visit_method(src, desc))
	}

	fn visit_parameter(&mut self, index: usize, src: Option<&ParameterNameSlice>) -> Result<ControlFlow<()>> {
		self.open(ElementKind::Parameter, |inner| inner.visit_parameter(index, src))
	}

	fn visit_local_variable(&mut self, key: LocalVariableKey, lvt_row_index: Option<usize>, src: Option<&LocalVariableNameSlice>) -> Result<ControlFlow<()>> {
		self.open(ElementKind::LocalVariable, |inner| inner.visit_local_variable(key, lvt_row_index, src))
	}

	fn visit_dst_name(&mut self, namespace: Namespace, name: &str) -> Result<()> {
		self.state.check_dst_name(namespace, name)?;
		self.inner.visit_dst_name(namespace, name)
	}

	fn visit_comment(&mut self, comment: &str) -> Result<()> {
		self.state.current()?;
		self.inner.visit_comment(comment)
	}

	fn visit_end(&mut self) -> Result<()> {
		self.state.close()?;
		self.inner.visit_end()
	}
}

/// A shared flag for cooperatively cancelling a running job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	pub fn new() -> CancelToken {
		CancelToken::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::Relaxed);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Relaxed)
	}

	/// Returns [`MappingError::Cancelled`] if the token was cancelled.
	pub fn check(&self) -> Result<()> {
		if self.is_cancelled() {
			bail!(MappingError::Cancelled);
		}
		Ok(())
	}
}

/// A visitor that checks a [`CancelToken`] at every class, and aborts with [`MappingError::Cancelled`].
#[derive(Debug)]
pub struct Cancellable<V> {
	inner: V,
	token: CancelToken,
}

impl<V> Cancellable<V> {
	pub fn new(inner: V, token: CancelToken) -> Cancellable<V> {
		Cancellable { inner, token }
	}

	pub fn into_inner(self) -> V {
		self.inner
	}
}

impl<V: MappingVisitor> MappingVisitor for Cancellable<V> {
	fn visit_namespaces(&mut self, namespaces: &Namespaces) -> Result<()> {
		self.inner.visit_namespaces(namespaces)
	}
	fn visit_class(&mut self, src: &ClassNameSlice) -> Result<ControlFlow<()>> {
		self.token.check()?;
		self.inner.visit_class(src)
	}
	fn visit_field(&mut self, src: &FieldNameSlice, desc: &FieldDescriptorSlice) -> Result<ControlFlow<()>> {
		self.inner.visit_field(src, desc)
	}
	fn visit_method(&mut self, src: &MethodNameSlice, desc: &MethodDescriptorSlice) -> Result<ControlFlow<()>> {
		self.inner.visit_method(src, desc)
	}
	fn visit_parameter(&mut self, index: usize, src: Option<&ParameterNameSlice>) -> Result<ControlFlow<()>> {
		self.inner.visit_parameter(index, src)
	}
	fn visit_local_variable(&mut self, key: LocalVariableKey, lvt_row_index: Option<usize>, src: Option<&LocalVariableNameSlice>) -> Result<ControlFlow<()>> {
		self.inner.visit_local_variable(key, lvt_row_index, src)
	}
	fn visit_dst_name(&mut self, namespace: Namespace, name: &str) -> Result<()> {
		self.inner.visit_dst_name(namespace, name)
	}
	fn visit_comment(&mut self, comment: &str) -> Result<()> {
		self.inner.visit_comment(comment)
	}
	fn visit_end(&mut self) -> Result<()> {
		self.inner.visit_end()
	}
}

#[cfg(test)]
mod testing {
	use std::ops::ControlFlow;
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use jvm_names::{ClassName, FieldDescriptor, FieldName, MethodDescriptor, MethodName};
	use crate::MappingError;
	use crate::tree::names::{Namespace, Namespaces};
	use crate::visitor::{replay, CancelToken, Cancellable, MappingEvent, MappingVisitor, StreamChecker};

	fn events() -> Result<Vec<MappingEvent>> {
		Ok(vec![
			MappingEvent::Namespaces(Namespaces::try_from(&["a", "b"][..])?),
			MappingEvent::Class(ClassName::try_from("A")?),
			MappingEvent::DstName(Namespace::new(1), "B".to_owned()),
			MappingEvent::Field(FieldName::try_from("f")?, FieldDescriptor::try_from("I")?),
			MappingEvent::End,
			MappingEvent::End,
			MappingEvent::Class(ClassName::try_from("C")?),
			MappingEvent::Method(MethodName::try_from("m")?, MethodDescriptor::try_from("()V")?),
			MappingEvent::Parameter(1, None),
			MappingEvent::End,
			MappingEvent::End,
			MappingEvent::End,
			MappingEvent::End,
		])
	}

	/// Skips the class `A`, records everything else.
	struct SkipA(Vec<MappingEvent>);

	impl MappingVisitor for SkipA {
		fn visit_namespaces(&mut self, namespaces: &Namespaces) -> Result<()> {
			self.0.visit_namespaces(namespaces)
		}
		fn visit_class(&mut self, src: &jvm_names::ClassNameSlice) -> Result<ControlFlow<()>> {
			if src == "A" {
				return Ok(ControlFlow::Break(()));
			}
			self.0.visit_class(src)
		}
		fn visit_field(&mut self, src: &jvm_names::FieldNameSlice, desc: &jvm_names::FieldDescriptorSlice) -> Result<ControlFlow<()>> {
			self.0.visit_field(src, desc)
		}
		fn visit_method(&mut self, src: &jvm_names::MethodNameSlice, desc: &jvm_names::MethodDescriptorSlice) -> Result<ControlFlow<()>> {
			self.0.visit_method(src, desc)
		}
		fn visit_parameter(&mut self, index: usize, src: Option<&jvm_names::ParameterNameSlice>) -> Result<ControlFlow<()>> {
			self.0.visit_parameter(index, src)
		}
		fn visit_local_variable(&mut self, key: crate::tree::mappings::LocalVariableKey, lvt_row_index: Option<usize>, src: Option<&jvm_names::LocalVariableNameSlice>) -> Result<ControlFlow<()>> {
			self.0.visit_local_variable(key, lvt_row_index, src)
		}
		fn visit_dst_name(&mut self, namespace: Namespace, name: &str) -> Result<()> {
			self.0.visit_dst_name(namespace, name)
		}
		fn visit_comment(&mut self, comment: &str) -> Result<()> {
			self.0.visit_comment(comment)
		}
		fn visit_end(&mut self) -> Result<()> {
			self.0.visit_end()
		}
	}

	#[test]
	fn replay_skips_broken_elements() -> Result<()> {
		let events = events()?;

		let mut checker = StreamChecker::new(SkipA(Vec::new()));
		replay(&events, &mut checker)?;
		let recorded = checker.finish()?.0;

		let expected: Vec<MappingEvent> = events[..1].iter().chain(&events[6..]).cloned().collect();
		assert_eq!(recorded, expected);
		Ok(())
	}

	#[test]
	fn checker_rejects_misplaced_events() -> Result<()> {
		let events = events()?;

		// a parameter directly inside a class
		let mut broken = events.clone();
		broken.insert(2, MappingEvent::Parameter(0, None));
		let error = replay(&broken, &mut StreamChecker::new(Vec::<MappingEvent>::new())).unwrap_err();
		assert!(matches!(MappingError::find(&error), Some(MappingError::MalformedStream(_))));

		// a destination name for the source namespace
		let mut broken = events.clone();
		broken[2] = MappingEvent::DstName(Namespace::new(0), "B".to_owned());
		let error = replay(&broken, &mut StreamChecker::new(Vec::<MappingEvent>::new())).unwrap_err();
		assert!(matches!(MappingError::find(&error), Some(MappingError::MalformedStream(_))));

		// events after the end of the stream
		let mut broken = events.clone();
		broken.push(MappingEvent::End);
		let error = replay(&broken, &mut StreamChecker::new(Vec::<MappingEvent>::new())).unwrap_err();
		assert!(matches!(MappingError::find(&error), Some(MappingError::MalformedStream(_))));

		// a stream that's never closed
		let mut broken = events;
		broken.pop();
		let mut checker = StreamChecker::new(Vec::<MappingEvent>::new());
		replay(&broken, &mut checker)?;
		assert!(checker.finish().is_err());
		Ok(())
	}

	#[test]
	fn invalid_dst_names_are_rejected() -> Result<()> {
		let mut events = events()?;
		events[2] = MappingEvent::DstName(Namespace::new(1), "not.a;class".to_owned());
		assert!(replay(&events, &mut StreamChecker::new(Vec::<MappingEvent>::new())).is_err());
		Ok(())
	}

	#[test]
	fn cancellation() -> Result<()> {
		let token = CancelToken::new();
		token.cancel();

		let error = replay(&events()?, &mut Cancellable::new(Vec::<MappingEvent>::new(), token)).unwrap_err();
		assert_eq!(MappingError::find(&error), Some(&MappingError::Cancelled));
		Ok(())
	}
}
