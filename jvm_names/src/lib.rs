//! Validated names and descriptors of the Java Virtual Machine.
//!
//! Every name type comes as an owned/borrowed pair, like [`String`] and [`str`]. The owned types can only be
//! constructed through `TryFrom`, which checks the contents, or through the `unsafe` `from_inner_unchecked`
//! functions.

pub mod class;
pub mod member;
pub mod descriptor;

mod macros;
mod names;

pub use class::{ClassName, ClassNameSlice};
pub use member::{FieldName, FieldNameSlice, MethodName, MethodNameSlice, ParameterName, ParameterNameSlice,
	LocalVariableName, LocalVariableNameSlice};
pub use descriptor::{FieldDescriptor, FieldDescriptorSlice, MethodDescriptor, MethodDescriptorSlice};
