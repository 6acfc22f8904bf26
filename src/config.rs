//! The optional JSON job file.
//!
//! Every field is optional, and any option given on the command line overrides the one from the file:
//! ```json
//! {
//!     "from": "proguard",
//!     "output-format": "tiny2",
//!     "default-source-name": "named",
//!     "default-target-name": "official",
//!     "namespaces": ["official", "named"],
//!     "fallback": ["named"],
//!     "on-conflict": "fail",
//!     "strict": false,
//!     "sort": true,
//!     "output": "out/mappings.tiny",
//!     "inputs": ["mappings.txt"]
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use mapping_tree::merge::ConflictPolicy;
use crate::format::OutputFormat;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct JobConfig {
	pub(crate) from: Option<String>,
	pub(crate) output_format: Option<OutputFormat>,
	pub(crate) default_source_name: Option<String>,
	pub(crate) default_target_name: Option<String>,
	pub(crate) download: Option<bool>,
	pub(crate) namespaces: Option<Vec<String>>,
	pub(crate) fallback: Option<Vec<String>>,
	pub(crate) on_conflict: Option<OnConflict>,
	pub(crate) strict: Option<bool>,
	pub(crate) sort: Option<bool>,
	pub(crate) output: Option<PathBuf>,
	#[serde(default)]
	pub(crate) inputs: Vec<String>,
}

impl JobConfig {
	pub(crate) fn read(path: &Path) -> Result<JobConfig> {
		let file = File::open(path)
			.with_context(|| anyhow!("failed to open job file {path:?}"))?;
		serde_json::from_reader(BufReader::new(file))
			.with_context(|| anyhow!("failed to parse job file {path:?}"))
	}
}

/// What to do if two inputs have different names for the same element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OnConflict {
	/// Abort the job.
	Fail,
	/// Take the name from the input given later.
	Overwrite,
}

impl From<OnConflict> for ConflictPolicy {
	fn from(value: OnConflict) -> Self {
		match value {
			OnConflict::Fail => ConflictPolicy::Fail,
			OnConflict::Overwrite => ConflictPolicy::Overwrite,
		}
	}
}

#[cfg(test)]
mod testing {
	use std::path::PathBuf;
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::config::{JobConfig, OnConflict};
	use crate::format::OutputFormat;

	#[test]
	fn read() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let path = dir.path().join("job.json");
		std::fs::write(&path, r#"{
			"from": "enigma",
			"output-format": "tiny1",
			"namespaces": ["named", "official"],
			"on-conflict": "overwrite",
			"sort": true,
			"output": "out.tiny",
			"inputs": ["a", "b"]
		}"#)?;

		let config = JobConfig::read(&path)?;
		assert_eq!(config.from.as_deref(), Some("enigma"));
		assert_eq!(config.output_format, Some(OutputFormat::Tiny1));
		assert_eq!(config.namespaces, Some(vec!["named".to_owned(), "official".to_owned()]));
		assert_eq!(config.fallback, None);
		assert_eq!(config.on_conflict, Some(OnConflict::Overwrite));
		assert_eq!(config.strict, None);
		assert_eq!(config.sort, Some(true));
		assert_eq!(config.output, Some(PathBuf::from("out.tiny")));
		assert_eq!(config.inputs, vec!["a", "b"]);
		Ok(())
	}

	#[test]
	fn unknown_fields_are_rejected() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let path = dir.path().join("job.json");
		std::fs::write(&path, r#"{ "form": "enigma" }"#)?;

		assert!(JobConfig::read(&path).is_err());
		Ok(())
	}
}
