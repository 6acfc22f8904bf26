use std::io::Write;
use anyhow::{anyhow, bail, Context, Result};
use log::info;
use reqwest::{Client, Response};
use tempfile::NamedTempFile;

/// Downloads remote inputs into temporary files.
#[derive(Debug)]
pub(crate) struct Downloader {
	client: Client,
}

impl Downloader {
	pub(crate) fn new() -> Downloader {
		Downloader {
			client: Client::new(),
		}
	}

	async fn get(&self, url: &str) -> Result<Response> {
		let response = self.client.get(url).send().await?;

		if response.status().is_success() {
			Ok(response)
		} else {
			bail!("Got a \"{}\" for {url:?}", response.status());
		}
	}

	/// Downloads the given url into a temporary file, which is deleted once it's dropped.
	pub(crate) async fn download(&self, url: &str) -> Result<NamedTempFile> {
		info!("downloading {url:?}");

		let body = self.get(url).await?
			.bytes().await
			.with_context(|| anyhow!("failed to download {url:?}"))?;

		let mut file = tempfile::Builder::new()
			.prefix("mapping2tiny-")
			.suffix(".tmp")
			.tempfile()
			.context("failed to create a temporary file for a download")?;
		file.write_all(&body)?;
		file.flush()?;

		Ok(file)
	}
}
