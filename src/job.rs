use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use rayon::prelude::*;
use tempfile::NamedTempFile;
use mapping_tree::merge::{merge, ConflictPolicy};
use mapping_tree::select::Selection;
use mapping_tree::tiny_v1::TinyV1Writer;
use mapping_tree::tiny_v2::TinyV2Writer;
use mapping_tree::tree::builder::MappingTreeBuilder;
use mapping_tree::tree::mappings::{MappingTree, Order};
use mapping_tree::tree::names::DefaultNames;
use mapping_tree::visitor::{CancelToken, Cancellable, MappingVisitor, StreamChecker};
use crate::format::{InputFormat, OutputFormat};

/// A conversion of one or more inputs into a single output file.
pub(crate) struct Job {
	pub(crate) inputs: Vec<PathBuf>,
	pub(crate) from: &'static InputFormat,
	pub(crate) names: DefaultNames,
	pub(crate) selection: Option<Selection>,
	pub(crate) conflict_policy: ConflictPolicy,
	pub(crate) order: Order,
	pub(crate) output: PathBuf,
	pub(crate) output_format: OutputFormat,
}

impl Job {
	/// Runs the job. The output file is only created if the whole job succeeds.
	pub(crate) fn run(&self, token: &CancelToken) -> Result<()> {
		self.write_output(|file| self.convert(file, token))
	}

	/// Writes into a temporary file next to the output, which replaces the output only if `convert` succeeds.
	fn write_output(&self, convert: impl FnOnce(&mut File) -> Result<()>) -> Result<()> {
		let parent = self.output.parent()
			.filter(|parent| !parent.as_os_str().is_empty())
			.unwrap_or(Path::new("."));
		let mut temp = NamedTempFile::new_in(parent)
			.with_context(|| anyhow!("failed to create a temporary file next to {:?}", self.output))?;

		convert(temp.as_file_mut())?;

		temp.persist(&self.output)
			.with_context(|| anyhow!("failed to write output file {:?}", self.output))?;
		info!("wrote {:?}", self.output);
		Ok(())
	}

	fn convert(&self, w: impl Write, token: &CancelToken) -> Result<()> {
		if let ([input], None, Order::Insertion) = (self.inputs.as_slice(), &self.selection, self.order) {
			debug!("streaming {input:?} directly into the output");
			return match self.output_format {
				OutputFormat::Tiny1 => self.stream(input, TinyV1Writer::new(w), token),
				OutputFormat::Tiny2 => self.stream(input, TinyV2Writer::new(w), token),
			};
		}

		let trees = self.inputs.par_iter()
			.map(|input| self.read_tree(input, token))
			.collect::<Result<Vec<_>>>()?;

		info!("merging {} trees", trees.len());
		let tree = merge(trees, self.conflict_policy)?;
		token.check()?;

		let tree = match &self.selection {
			Some(selection) => {
				info!("selecting namespaces {:?}", selection.namespaces);
				tree.select(selection)?
			},
			None => tree,
		};

		token.check()?;
		self.output_format.write(&tree, w, self.order, token)
	}

	fn stream(&self, input: &Path, writer: impl MappingVisitor, token: &CancelToken) -> Result<()> {
		stream_into(|visitor| self.from.read(input, &self.names, visitor), writer, token)
	}

	fn read_tree(&self, input: &Path, token: &CancelToken) -> Result<MappingTree> {
		info!("reading {input:?}");
		let mut visitor = StreamChecker::new(Cancellable::new(MappingTreeBuilder::default(), token.clone()));
		self.from.read(input, &self.names, &mut visitor)?;
		visitor.finish()?
			.into_inner()
			.finish()
			.with_context(|| anyhow!("failed to build the mappings of {input:?}"))
	}
}

/// Sends the events produced by `read` through the protocol checks into the writer.
fn stream_into(read: impl FnOnce(&mut dyn MappingVisitor) -> Result<()>, writer: impl MappingVisitor, token: &CancelToken) -> Result<()> {
	let mut visitor = StreamChecker::new(Cancellable::new(writer, token.clone()));
	read(&mut visitor)?;
	visitor.finish()?;
	Ok(())
}

#[cfg(test)]
mod testing {
	use std::fs;
	use std::io::{self, Write};
	use std::path::{Path, PathBuf};
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use jvm_names::{MethodDescriptor, MethodName};
	use mapping_tree::MappingError;
	use mapping_tree::merge::ConflictPolicy;
	use mapping_tree::select::Selection;
	use mapping_tree::tiny_v2::TinyV2Writer;
	use mapping_tree::tree::mappings::Order;
	use mapping_tree::tree::names::{DefaultNames, Namespaces};
	use mapping_tree::visitor::{replay, CancelToken, MappingEvent};
	use crate::format::{InputFormat, OutputFormat};
	use crate::job::{stream_into, Job};

	fn job(inputs: Vec<PathBuf>, output: &Path) -> Job {
		Job {
			inputs,
			from: InputFormat::by_id("autodetect"),
			names: DefaultNames::default(),
			selection: None,
			conflict_policy: ConflictPolicy::Fail,
			order: Order::Insertion,
			output: output.to_owned(),
			output_format: OutputFormat::Tiny2,
		}
	}

	#[test]
	fn stream_proguard_to_tiny_v1() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let input = dir.path().join("mappings.txt");
		fs::write(&input, "com.example.Foo -> a:\n    void doWork() -> b\n")?;
		let output = dir.path().join("out.tiny");

		let mut job = job(vec![input], &output);
		job.output_format = OutputFormat::Tiny1;
		job.run(&CancelToken::new())?;

		let expected = "\
v1	source	target
CLASS	com/example/Foo	a
METHOD	com/example/Foo	()V	doWork	b
";
		assert_eq!(fs::read_to_string(&output)?, expected);
		Ok(())
	}

	#[test]
	fn merge_and_select() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let intermediary = dir.path().join("intermediary.tiny");
		fs::write(&intermediary, "tiny\t2\t0\tofficial\tintermediary\nc\ta\tclass_1\n\tm\t(La;)V\tb\tmethod_2\nc\tc\tclass_3\n")?;
		let named = dir.path().join("named.tiny");
		fs::write(&named, "tiny\t2\t0\tofficial\tnamed\nc\ta\tcom/example/Foo\n\tm\t(La;)V\tb\trun\n")?;
		let output = dir.path().join("out.tiny");

		let mut job = job(vec![intermediary, named], &output);
		job.selection = Some(Selection {
			namespaces: vec!["named".to_owned(), "official".to_owned()],
			fallback: vec!["intermediary".to_owned()],
			..Selection::default()
		});
		job.order = Order::Sorted;
		job.run(&CancelToken::new())?;

		let expected = "\
tiny	2	0	named	official
c	class_3	c
c	com/example/Foo	a
	m	(Lcom/example/Foo;)V	run	b
";
		assert_eq!(fs::read_to_string(&output)?, expected);
		Ok(())
	}

	#[test]
	fn malformed_input_leaves_no_output() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let input = dir.path().join("broken.tiny");
		fs::write(&input, "tiny\t2\t0\tofficial\tnamed\nc\ta\tFoo\n\tf\tI\n")?;
		let output = dir.path().join("out.tiny");

		assert!(job(vec![input], &output).run(&CancelToken::new()).is_err());
		assert!(!output.exists());
		assert_eq!(fs::read_dir(dir.path())?.count(), 1);
		Ok(())
	}

	#[test]
	fn conflicting_inputs_leave_no_output() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let first = dir.path().join("first.tiny");
		fs::write(&first, "tiny\t2\t0\tofficial\tnamed\nc\ta\tFoo\n")?;
		let second = dir.path().join("second.tiny");
		fs::write(&second, "tiny\t2\t0\tofficial\tnamed\nc\ta\tBar\n")?;
		let output = dir.path().join("out.tiny");

		let error = job(vec![first, second], &output).run(&CancelToken::new()).unwrap_err();
		assert!(matches!(MappingError::find(&error), Some(MappingError::MergeConflict { .. })));
		assert!(!output.exists());
		Ok(())
	}

	#[test]
	fn cancelled_job_leaves_no_output() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let input = dir.path().join("mappings.tiny");
		fs::write(&input, "tiny\t2\t0\tofficial\tnamed\nc\ta\tFoo\n")?;
		let output = dir.path().join("out.tiny");

		let token = CancelToken::new();
		token.cancel();
		let error = job(vec![input], &output).run(&token).unwrap_err();
		assert_eq!(MappingError::find(&error), Some(&MappingError::Cancelled));
		assert!(!output.exists());
		Ok(())
	}

	#[test]
	fn malformed_stream_leaves_no_output() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let output = dir.path().join("out.tiny");
		let job = job(Vec::new(), &output);

		let events = vec![
			MappingEvent::Namespaces(Namespaces::try_from(&["official", "named"][..])?),
			MappingEvent::Method(MethodName::try_from("run")?, MethodDescriptor::try_from("()V")?),
			MappingEvent::End,
		];
		let token = CancelToken::new();
		let error = job.write_output(|file| stream_into(|visitor| replay(&events, visitor), TinyV2Writer::new(file), &token))
			.unwrap_err();
		assert!(matches!(MappingError::find(&error), Some(MappingError::MalformedStream(_))));
		assert!(!output.exists());
		assert_eq!(fs::read_dir(dir.path())?.count(), 0);
		Ok(())
	}

	/// Cancels the token as soon as anything reaches the file.
	struct CancelOnWrite<W> {
		inner: W,
		token: CancelToken,
	}

	impl<W: Write> Write for CancelOnWrite<W> {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.token.cancel();
			self.inner.write(buf)
		}
		fn flush(&mut self) -> io::Result<()> {
			self.inner.flush()
		}
	}

	#[test]
	fn cancelled_while_writing_merged_tree() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let mut classes = String::from("tiny\t2\t0\tofficial\tnamed\n");
		for i in 0..2000 {
			classes.push_str(&format!("c\tclass_{i}\tcom/example/Class{i}\n"));
		}
		let first = dir.path().join("first.tiny");
		fs::write(&first, &classes)?;
		let second = dir.path().join("second.tiny");
		fs::write(&second, "tiny\t2\t0\tofficial\tnamed\nc\tother\tcom/example/Other\n")?;
		let output = dir.path().join("out.tiny");

		let job = job(vec![first, second], &output);
		let token = CancelToken::new();
		let error = job.write_output(|file| job.convert(CancelOnWrite { inner: file, token: token.clone() }, &token))
			.unwrap_err();
		assert_eq!(MappingError::find(&error), Some(&MappingError::Cancelled));
		assert!(!output.exists());
		Ok(())
	}
}
