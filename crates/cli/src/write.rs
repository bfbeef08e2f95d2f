//! The write command: load a payload, run one attempt, report.

use std::sync::Arc;

use tagwrite::{MemoryReader, WriteCoordinator};
use tracing::info;

use crate::cli::Cli;
use crate::config::{self, FileConfig, Settings};
use crate::error::{CliError, Result};
use crate::output::{StatusPrinter, WriteReport};

pub async fn run(cli: &Cli) -> Result<WriteReport> {
	let file = match &cli.config {
		Some(path) => config::load(path).await?,
		None => FileConfig::default(),
	};
	let settings = Settings::resolve(cli, file);

	let payload = tokio::fs::read(&cli.payload).await.map_err(|source| CliError::Read {
		path: cli.payload.clone(),
		source,
	})?;
	let bytes = payload.len();
	info!(path = %cli.payload.display(), bytes, tag = %settings.tag_kind, "Loaded payload");

	let reader = Arc::new(MemoryReader::new(settings.tag.clone()));
	let coordinator = WriteCoordinator::new(reader.clone())
		.with_config(settings.session.clone())
		.with_status_sink(StatusPrinter);

	let outcome = coordinator.write_async(payload).await;
	let mut report = WriteReport::from_outcome(coordinator.state(), &outcome, bytes, settings.tag_kind);

	if let Some(path) = &cli.dump {
		tokio::fs::write(path, reader.memory_image())
			.await
			.map_err(|source| CliError::Dump {
				path: path.clone(),
				source,
			})?;
		report = report.with_dump(path.clone());
	}

	Ok(report)
}
