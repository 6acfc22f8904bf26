use thiserror::Error;

/// The typed failures of reading, building, remapping and merging mappings.
///
/// These travel inside [`anyhow::Error`]s, wrapped in context about the file, line or element that was being
/// processed. Use [`MappingError::find`] to get them back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
	#[error("malformed mapping stream: {0}")]
	MalformedStream(String),

	#[error("namespace {0:?} is declared more than once")]
	DuplicateNamespace(String),

	#[error("conflicting definition of {element} in namespace {namespace:?}: {existing:?} vs {new:?}")]
	ConflictingDefinition {
		element: String,
		namespace: String,
		existing: String,
		new: String,
	},

	#[error("cannot merge {element} in namespace {namespace:?}: {existing:?} vs {new:?}")]
	MergeConflict {
		element: String,
		namespace: String,
		existing: String,
		new: String,
	},

	#[error("the mapping tree is already complete and cannot receive further events")]
	ImmutableTree,

	#[error("class {class:?} has no name in namespace {namespace:?}")]
	UnresolvedClass { class: String, namespace: String },

	#[error("the job was cancelled")]
	Cancelled,
}

impl MappingError {
	pub(crate) fn malformed(message: impl Into<String>) -> MappingError {
		MappingError::MalformedStream(message.into())
	}

	/// Finds the first [`MappingError`] in the chain of causes of the given error.
	pub fn find(error: &anyhow::Error) -> Option<&MappingError> {
		error.chain().find_map(|cause| cause.downcast_ref::<MappingError>())
	}
}

#[cfg(test)]
mod testing {
	use anyhow::{anyhow, Context, Result};
	use pretty_assertions::assert_eq;
	use crate::MappingError;

	#[test]
	fn find_through_context() {
		let result: Result<()> = Err(MappingError::ImmutableTree)
			.context("while visiting a class")
			.with_context(|| anyhow!("in file {:?}", "a.tiny"));

		let error = result.unwrap_err();
		assert_eq!(MappingError::find(&error), Some(&MappingError::ImmutableTree));

		let plain = anyhow!("something else");
		assert_eq!(MappingError::find(&plain), None);
	}
}
