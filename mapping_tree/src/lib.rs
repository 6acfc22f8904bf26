//! Crate for reading, building, combining and writing multi-namespace mappings of JVM symbols.
//!
//! Every reader emits events into a [`visitor::MappingVisitor`], and every writer is one. In between, the events
//! can be collected into a [`tree::mappings::MappingTree`] with a [`tree::builder::MappingTreeBuilder`], which
//! can then be merged with other trees ([`merge`]), projected onto other namespaces ([`select`]), and used to
//! remap descriptors ([`remapper`]).
//!
//! Supported formats are Tiny v2 ([`tiny_v2`]), Tiny v1 ([`tiny_v1`]), ProGuard ([`proguard`]) and Enigma
//! ([`enigma_file`], [`enigma_dir`]).

mod error;
mod lines;

pub mod tree;
pub mod visitor;

pub mod remapper;
pub mod select;
pub mod merge;

pub mod tiny_v2;
pub mod tiny_v1;
pub mod proguard;
pub mod enigma_file;
pub mod enigma_dir;

pub use error::MappingError;
