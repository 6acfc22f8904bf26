use std::cmp::Ordering;
use std::fmt::Debug;
use std::iter::Peekable;
use anyhow::{anyhow, Context, Result};

pub(crate) trait Line: Debug {
	fn indentation(&self) -> usize;
	fn line_number(&self) -> usize;
}

/// Counts the leading tabs of a line, and returns the rest of it.
pub(crate) fn split_indentation(line: &str) -> (usize, &str) {
	let rest = line.trim_start_matches('\t');
	(line.len() - rest.len(), rest)
}

/// Iterates over the lines with exactly the indentation of its level.
///
/// A line with less indentation ends the iteration, a line with more indentation is an error, unless the lines of
/// the next level are read with [`IndentedLines::next_level`] or skipped with [`IndentedLines::skip_next_level`].
pub(crate) struct IndentedLines<'a, I: Iterator> {
	depth: usize,
	iter: &'a mut Peekable<I>,
}

impl<'a, I, L> IndentedLines<'a, I>
where
	I: Iterator<Item=Result<L>>,
	L: Line,
{
	pub(crate) fn new(iter: &'a mut Peekable<I>) -> IndentedLines<'a, I> {
		IndentedLines { depth: 0, iter }
	}

	pub(crate) fn next_level(&mut self) -> IndentedLines<'_, I> {
		IndentedLines { depth: self.depth + 1, iter: self.iter }
	}

	/// Consumes all the lines that are indented deeper than this level.
	pub(crate) fn skip_next_level(&mut self) -> Result<()> {
		while let Some(Ok(line)) = self.iter.peek() {
			if line.indentation() <= self.depth {
				break;
			}
			self.iter.next();
		}
		// a broken line ends the skipped block with its error
		match self.iter.next_if(Result::is_err) {
			Some(Err(e)) => Err(e),
			_ => Ok(()),
		}
	}

	/// Calls `f` for each line of this level. Errors get the number of the line they happened in.
	pub(crate) fn on_every_line(mut self, mut f: impl FnMut(&mut Self, L) -> Result<()>) -> Result<()> {
		while let Some(line) = self.next().transpose()? {
			let line_number = line.line_number();
			f(&mut self, line).with_context(|| anyhow!("in line {line_number}"))?;
		}
		Ok(())
	}
}

impl<I, L> Iterator for IndentedLines<'_, I>
where
	I: Iterator<Item=Result<L>>,
	L: Line,
{
	type Item = Result<L>;

	fn next(&mut self) -> Option<Self::Item> {
		let depth = match self.iter.peek()? {
			Ok(line) => line.indentation().cmp(&self.depth),
			Err(_) => return self.iter.next(),
		};
		match depth {
			Ordering::Less => None,
			Ordering::Equal => self.iter.next(),
			Ordering::Greater => {
				let line = self.iter.next()?;
				Some(line.and_then(|line| Err(anyhow!(
					"line {} is indented too deep, expected {} tabs: {line:?}", line.line_number(), self.depth
				))))
			},
		}
	}
}

pub(crate) mod tiny_line {
	use anyhow::{anyhow, bail, Context, Result};
	use crate::lines::{split_indentation, Line};

	/// A tab separated line, as used by the Tiny formats.
	#[derive(Debug)]
	pub(crate) struct TinyLine {
		line_number: usize,
		indentation: usize,
		pub(crate) kind: String,
		fields: std::vec::IntoIter<String>,
	}

	impl TinyLine {
		pub(crate) fn new(line_number: usize, line: &str) -> Result<TinyLine> {
			let (indentation, line) = split_indentation(line);

			// split always gives at least one field
			let mut fields = line.split('\t').map(str::to_owned);
			let kind = fields.next().unwrap_or_default();

			Ok(TinyLine { line_number, indentation, kind, fields: fields.collect::<Vec<_>>().into_iter() })
		}

		pub(crate) fn next(&mut self) -> Result<String> {
			let line_number = self.line_number;
			self.fields.next()
				.with_context(|| anyhow!("line {line_number} ended early, another field was expected"))
		}

		/// Returns the next field, which must also be the last one.
		pub(crate) fn end(mut self) -> Result<String> {
			let last = self.next()?;
			let extra = self.fields.as_slice();
			if !extra.is_empty() {
				bail!("line {} has {} fields too many: {extra:?}", self.line_number, extra.len());
			}
			Ok(last)
		}

		/// Returns the remaining fields.
		pub(crate) fn rest(self) -> Vec<String> {
			self.fields.collect()
		}

		/// Returns the remaining fields, which must be exactly one per namespace. Empty fields are turned into
		/// `None`.
		pub(crate) fn into_names(self, len: usize) -> Result<Vec<Option<String>>> {
			let line_number = self.line_number;
			let names = self.rest();
			if names.len() != len {
				bail!("line {line_number} contained {} names, expected one for each of the {len} namespaces: {names:?}", names.len());
			}
			Ok(names.into_iter()
				.map(|name| Some(name).filter(|name| !name.is_empty()))
				.collect())
		}
	}

	impl Line for TinyLine {
		fn indentation(&self) -> usize {
			self.indentation
		}
		fn line_number(&self) -> usize {
			self.line_number
		}
	}
}
