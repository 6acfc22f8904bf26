pub mod mappings;
pub mod builder;

pub trait NodeInfo<I> {
	fn get_node_info(&self) -> &I;
	fn new(info: I) -> Self;
}

pub trait ToKey<K> {
	fn get_key(&self) -> K;
}

pub mod names {
	use std::fmt::{Debug, Formatter};
	use std::ops::{Index, IndexMut};
	use anyhow::{bail, Error, Result};
	use crate::MappingError;

	/// Describes a given namespace of a mapping tree, by its position.
	///
	/// The first namespace (position `0`) is the source namespace. The elements of a tree are keyed by their names
	/// in it.
	#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
	pub struct Namespace(pub(crate) usize);

	impl Namespace {
		/// The source namespace.
		pub const SOURCE: Namespace = Namespace(0);

		/// Creates a namespace for the given position.
		///
		/// Positions are checked against the declared namespaces by whoever receives them.
		pub const fn new(index: usize) -> Namespace {
			Namespace(index)
		}

		pub fn index(self) -> usize {
			self.0
		}

		pub fn is_source(self) -> bool {
			self.0 == 0
		}
	}

	/// A struct storing the names of the namespaces.
	///
	/// Invariants: there's at least one namespace, no name is empty, and no name appears twice.
	///
	/// Implements the [Index] trait for [Namespace].
	#[derive(Clone, PartialEq, Eq)]
	pub struct Namespaces {
		names: Vec<String>,
	}

	impl Index<Namespace> for Namespaces {
		type Output = String;

		fn index(&self, index: Namespace) -> &Self::Output {
			&self.names[index.0]
		}
	}

	impl Namespaces {
		pub fn names(&self) -> &[String] {
			&self.names
		}

		pub fn len(&self) -> usize {
			self.names.len()
		}

		/// A [`Namespaces`] is never empty, its constructors reject an empty list.
		pub fn is_empty(&self) -> bool {
			self.names.is_empty()
		}

		pub fn source_name(&self) -> &str {
			&self.names[0]
		}

		/// Returns the name of the namespace, or `None` if it's out of range.
		pub fn get(&self, namespace: Namespace) -> Option<&str> {
			self.names.get(namespace.0).map(String::as_str)
		}

		/// Iterates over all namespaces, including the source namespace.
		pub fn iter(&self) -> impl Iterator<Item=(Namespace, &str)> + '_ {
			self.names.iter().enumerate().map(|(id, name)| (Namespace(id), name.as_str()))
		}

		/// Iterates over the destination namespaces, that is every namespace except the source namespace.
		pub fn destinations(&self) -> impl Iterator<Item=Namespace> {
			(1..self.names.len()).map(Namespace)
		}

		pub fn find_namespace(&self, name: &str) -> Option<Namespace> {
			self.names.iter().position(|namespace| namespace == name).map(Namespace)
		}

		pub fn get_namespace(&self, name: &str) -> Result<Namespace> {
			match self.find_namespace(name) {
				Some(namespace) => Ok(namespace),
				None => bail!("cannot find namespace with name {name:?}, only got {self:?}"),
			}
		}

		/// Checks that the namespace can be used for a destination name, that is that it's in range and not the
		/// source namespace.
		pub(crate) fn check_destination(&self, namespace: Namespace) -> Result<()> {
			if namespace.is_source() {
				bail!(MappingError::malformed("a destination name cannot be given for the source namespace"));
			}
			if namespace.0 >= self.names.len() {
				bail!(MappingError::malformed(format!("namespace index {} is out of range for namespaces {self:?}", namespace.0)));
			}
			Ok(())
		}

		/// Returns an error if the names of `self` aren't the names given in the argument.
		/// This can be used to check that after reading mappings, you have the correct namespaces in them.
		pub fn check_that(&self, names: &[&str]) -> Result<()> {
			if self.names != names {
				bail!("expected namespaces {names:?}, got {self:?}");
			}
			Ok(())
		}
	}

	impl Debug for Namespaces {
		fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
			f.debug_list()
				.entries(&self.names)
				.finish()
		}
	}

	impl TryFrom<Vec<String>> for Namespaces {
		type Error = Error;

		fn try_from(value: Vec<String>) -> Result<Self> {
			if value.is_empty() {
				bail!("at least one namespace is required");
			}
			if value.iter().any(|i| i.is_empty()) {
				bail!("found empty namespace name in {value:?}, every namespace name must be non-empty");
			}
			for (i, name) in value.iter().enumerate() {
				if value[..i].contains(name) {
					bail!(MappingError::DuplicateNamespace(name.clone()));
				}
			}

			Ok(Namespaces { names: value })
		}
	}

	impl<'a> TryFrom<&[&'a str]> for Namespaces {
		type Error = Error;

		fn try_from(value: &[&'a str]) -> Result<Self> {
			Namespaces::try_from(value.iter().map(|&name| name.to_owned()).collect::<Vec<_>>())
		}
	}

	impl From<Namespaces> for Vec<String> {
		fn from(value: Namespaces) -> Self {
			value.names
		}
	}

	/// The namespace names used for formats that don't name their namespaces themselves, like ProGuard or
	/// Enigma.
	#[derive(Debug, Clone, PartialEq, Eq)]
	pub struct DefaultNames {
		pub source: String,
		pub target: String,
	}

	impl Default for DefaultNames {
		fn default() -> Self {
			DefaultNames {
				source: "source".to_owned(),
				target: "target".to_owned(),
			}
		}
	}

	impl DefaultNames {
		pub fn namespaces(&self) -> Result<Namespaces> {
			Namespaces::try_from(vec![self.source.clone(), self.target.clone()])
		}
	}

	/// A struct storing names for namespaces, one slot per namespace.
	///
	/// A slot with `None` means there's no name for the element in that namespace. Empty strings are never
	/// stored, readers turn empty columns into `None`.
	///
	/// Implements the [Index] and [IndexMut] traits for [Namespace].
	#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
	pub struct Names<T> {
		names: Vec<Option<T>>,
	}

	impl<T> Index<Namespace> for Names<T> {
		type Output = Option<T>;

		fn index(&self, index: Namespace) -> &Self::Output {
			&self.names[index.0]
		}
	}

	impl<T> IndexMut<Namespace> for Names<T> {
		fn index_mut(&mut self, index: Namespace) -> &mut Self::Output {
			&mut self.names[index.0]
		}
	}

	impl<T> Names<T> {
		pub(crate) fn none(len: usize) -> Names<T> {
			Names { names: std::iter::repeat_with(|| None).take(len).collect() }
		}

		pub(crate) fn from_src(len: usize, src: Option<T>) -> Names<T> {
			let mut names = Names::none(len);
			if let Some(first) = names.names.first_mut() {
				*first = src;
			}
			names
		}

		/// Gets the name in the source namespace.
		pub fn src(&self) -> Option<&T> {
			self.get(Namespace::SOURCE)
		}

		/// Gets the name in the given namespace, or `None` if there's no name, or the namespace is out of range.
		pub fn get(&self, namespace: Namespace) -> Option<&T> {
			self.names.get(namespace.0).and_then(Option::as_ref)
		}

		pub(crate) fn slot_mut(&mut self, namespace: Namespace) -> Option<&mut Option<T>> {
			self.names.get_mut(namespace.0)
		}

		pub fn names(&self) -> &[Option<T>] {
			&self.names
		}

		pub fn len(&self) -> usize {
			self.names.len()
		}

		pub fn is_empty(&self) -> bool {
			self.names.is_empty()
		}

		/// Iterates over the namespaces and names that are present.
		pub fn iter(&self) -> impl Iterator<Item=(Namespace, &T)> + '_ {
			self.names.iter()
				.enumerate()
				.filter_map(|(id, name)| name.as_ref().map(|name| (Namespace(id), name)))
		}

		/// Rearranges the names into a new set of namespaces.
		///
		/// Slot `i` of the result gets the name of namespace `table[i]` of `self`, or `None` if `table[i]` is
		/// `None`.
		pub(crate) fn project(&self, table: &[Option<Namespace>]) -> Names<T>
		where
			T: Clone,
		{
			let names = table.iter()
				.map(|namespace| namespace.and_then(|namespace| self.get(namespace)).cloned())
				.collect();
			Names { names }
		}
	}

	impl<T: Debug> Debug for Names<T> {
		fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
			f.debug_list()
				.entries(&self.names)
				.finish()
		}
	}

	/// Note that empty inputs are converted into `None`.
	impl<T> From<Vec<Option<T>>> for Names<T> where T: AsRef<str> {
		fn from(value: Vec<Option<T>>) -> Self {
			let names = value.into_iter()
				.map(|x| x.filter(|x| !x.as_ref().is_empty()))
				.collect();

			Names { names }
		}
	}

	impl<T> From<Names<T>> for Vec<Option<T>> {
		fn from(value: Names<T>) -> Self {
			value.names
		}
	}

	#[cfg(test)]
	mod testing {
		use anyhow::Result;
		use pretty_assertions::assert_eq;
		use crate::MappingError;
		use crate::tree::names::{Names, Namespace, Namespaces};

		#[test]
		fn duplicate_namespace() {
			let error = Namespaces::try_from(&["a", "b", "a"][..]).unwrap_err();
			assert_eq!(MappingError::find(&error), Some(&MappingError::DuplicateNamespace("a".to_owned())));

			assert!(Namespaces::try_from(&["a", ""][..]).is_err());
			assert!(Namespaces::try_from(Vec::<String>::new()).is_err());
		}

		#[test]
		fn never_empty() -> Result<()> {
			let namespaces = Namespaces::try_from(&["a"][..])?;
			assert!(!namespaces.is_empty());
			assert_eq!(namespaces.len(), 1);
			Ok(())
		}

		#[test]
		fn destination_checks() -> Result<()> {
			let namespaces = Namespaces::try_from(&["a", "b"][..])?;
			assert!(namespaces.check_destination(Namespace::new(1)).is_ok());
			assert!(namespaces.check_destination(Namespace::new(0)).is_err());
			assert!(namespaces.check_destination(Namespace::new(2)).is_err());
			Ok(())
		}

		#[test]
		fn projection() {
			let names: Names<String> = Names::from(vec![Some("a".to_owned()), Some(String::new()), Some("c".to_owned())]);
			assert_eq!(names.get(Namespace::new(1)), None);

			let projected = names.project(&[Some(Namespace::new(2)), None, Some(Namespace::new(0))]);
			assert_eq!(projected.names(), &[Some("c".to_owned()), None, Some("a".to_owned())]);
		}
	}
}
