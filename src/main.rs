//! `mapping2tiny`, a converter of mapping files into the tiny formats.

use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use log::{warn, LevelFilter};
use tempfile::NamedTempFile;
use mapping_tree::remapper::RemapMode;
use mapping_tree::select::Selection;
use mapping_tree::tree::mappings::Order;
use mapping_tree::tree::names::DefaultNames;
use mapping_tree::visitor::CancelToken;
use crate::config::{JobConfig, OnConflict};
use crate::download::Downloader;
use crate::format::{InputFormat, OutputFormat, AUTODETECT};
use crate::job::Job;

mod config;
mod download;
mod format;
mod job;

#[derive(Debug, Parser)]
#[command(name = "mapping2tiny", version, about = "Converts mappings into the tiny v2 (or tiny v1) format")]
struct Cli {
	/// The format of the inputs: tiny1, tiny2, proguard, enigma, enigma_file, enigma_zip, tiny_zip or autodetect.
	#[arg(short = 'f', long = "from")]
	from: Option<String>,

	/// Write tiny v1 mappings.
	#[arg(short = '1', long = "tiny1", conflicts_with = "tiny2")]
	tiny1: bool,

	/// Write tiny v2 mappings (the default).
	#[arg(short = '2', long = "tiny2")]
	tiny2: bool,

	/// The name of the source namespace, for formats that don't name their namespaces.
	#[arg(short = 'c', long = "default-source-name")]
	default_source_name: Option<String>,

	/// The name of the target namespace, for formats that don't name their namespaces.
	#[arg(short = 'e', long = "default-target-name")]
	default_target_name: Option<String>,

	/// Treat the inputs as urls, and download them first.
	#[arg(short = 'w', long = "download")]
	download: bool,

	/// The file to write the mappings to.
	#[arg(short = 'o', long = "output")]
	output: Option<PathBuf>,

	/// The namespaces to write, in order. The first one is never left empty.
	#[arg(long = "namespaces", value_delimiter = ',')]
	namespaces: Option<Vec<String>>,

	/// The namespaces to take names for the first namespace from, if it has none.
	#[arg(long = "fallback", value_delimiter = ',')]
	fallback: Option<Vec<String>>,

	/// What to do if the inputs have different names for the same element.
	#[arg(long = "on-conflict", value_enum)]
	on_conflict: Option<OnConflict>,

	/// Fail on classes without a name in the first namespace, instead of keeping them in descriptors.
	#[arg(long = "strict")]
	strict: bool,

	/// Write the classes and members sorted, instead of in the order of the inputs.
	#[arg(long = "sort")]
	sort: bool,

	/// A JSON job file, giving defaults for all the other options.
	#[arg(long = "config")]
	config: Option<PathBuf>,

	/// Log more, give twice for even more.
	#[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
	verbose: u8,

	/// Log less, give twice for only errors.
	#[arg(short = 'q', long = "quiet", action = ArgAction::Count, conflicts_with = "verbose")]
	quiet: u8,

	/// The input files or directories, or urls with `--download`.
	inputs: Vec<String>,
}

impl Cli {
	fn log_level(&self) -> LevelFilter {
		match (self.verbose, self.quiet) {
			(0, 0) => LevelFilter::Info,
			(1, _) => LevelFilter::Debug,
			(_, 1) => LevelFilter::Warn,
			(0, _) => LevelFilter::Error,
			(_, _) => LevelFilter::Trace,
		}
	}

	/// Combines the command line with the job file. Options on the command line win.
	fn into_job(self, config: JobConfig, inputs: Vec<PathBuf>) -> Result<Job> {
		let from = self.from.or(config.from).unwrap_or_else(|| AUTODETECT.to_owned());

		let output_format = if self.tiny1 {
			OutputFormat::Tiny1
		} else if self.tiny2 {
			OutputFormat::Tiny2
		} else {
			config.output_format.unwrap_or_default()
		};

		let defaults = DefaultNames::default();
		let names = DefaultNames {
			source: self.default_source_name.or(config.default_source_name).unwrap_or(defaults.source),
			target: self.default_target_name.or(config.default_target_name).unwrap_or(defaults.target),
		};

		let strict = self.strict || config.strict.unwrap_or(false);
		let fallback = self.fallback.or(config.fallback).unwrap_or_default();
		let selection = match self.namespaces.or(config.namespaces) {
			Some(namespaces) => Some(Selection {
				namespaces,
				fallback,
				remap_mode: if strict { RemapMode::Strict } else { RemapMode::Lenient },
			}),
			None => {
				if !fallback.is_empty() {
					bail!("fallback namespaces need the output namespaces to be given with `--namespaces`");
				}
				if strict {
					warn!("`--strict` has no effect without `--namespaces`");
				}
				None
			},
		};

		let sort = self.sort || config.sort.unwrap_or(false);

		Ok(Job {
			inputs,
			from: InputFormat::by_id(&from),
			names,
			selection,
			conflict_policy: self.on_conflict.or(config.on_conflict).unwrap_or(OnConflict::Fail).into(),
			order: if sort { Order::Sorted } else { Order::Insertion },
			output: self.output.or(config.output).context("no output file given, use `--output`")?,
			output_format,
		})
	}
}

fn setup_logger(level: LevelFilter) -> Result<()> {
	fern::Dispatch::new()
		.format(|out, message, record| {
			out.finish(format_args!("[{}] {}", record.level(), message))
		})
		.level(level)
		.chain(std::io::stderr())
		.apply()
		.context("failed to set up logging")
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	setup_logger(cli.log_level())?;

	let config = match &cli.config {
		Some(path) => JobConfig::read(path)?,
		None => JobConfig::default(),
	};

	let download = cli.download || config.download.unwrap_or(false);
	let inputs = if cli.inputs.is_empty() { config.inputs.clone() } else { cli.inputs.clone() };
	if inputs.is_empty() {
		bail!("no inputs given");
	}

	// keeps the downloaded files alive until the job is done
	let mut downloads: Vec<NamedTempFile> = Vec::new();
	let inputs = if download {
		let downloader = Downloader::new();
		for url in &inputs {
			downloads.push(downloader.download(url).await?);
		}
		downloads.iter().map(|file| file.path().to_owned()).collect()
	} else {
		inputs.into_iter().map(PathBuf::from).collect()
	};

	let job = cli.into_job(config, inputs)?;

	let token = CancelToken::new();
	let ctrl_c_token = token.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!("cancelling, the output file won't be written");
			ctrl_c_token.cancel();
		}
	});

	tokio::task::spawn_blocking(move || job.run(&token)).await??;

	drop(downloads);
	Ok(())
}
