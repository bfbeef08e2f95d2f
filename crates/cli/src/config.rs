//! Settings file and flag merging.
//!
//! The optional `--config` file is JSON:
//!
//! ```json
//! {
//!   "discovery_timeout_ms": 30000,
//!   "alert_message": "Hold the figure tag to the reader",
//!   "tag": "ntag216",
//!   "read_only": false,
//!   "collisions": 0
//! }
//! ```
//!
//! Every field is optional. Command-line flags win over file values.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tagwrite::{MemoryTagConfig, SessionConfig};

use crate::cli::{Cli, TagKind};
use crate::error::{CliError, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
	#[serde(flatten)]
	pub session: SessionConfig,
	pub tag: Option<TagKind>,
	pub read_only: Option<bool>,
	pub collisions: Option<usize>,
}

pub async fn load(path: &Path) -> Result<FileConfig> {
	let raw = tokio::fs::read(path).await.map_err(|source| CliError::Read {
		path: path.to_path_buf(),
		source,
	})?;
	serde_json::from_slice(&raw).map_err(|source| CliError::Config {
		path: path.to_path_buf(),
		source,
	})
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	pub session: SessionConfig,
	pub tag_kind: TagKind,
	pub tag: MemoryTagConfig,
}

impl Settings {
	pub fn resolve(cli: &Cli, file: FileConfig) -> Self {
		let mut session = file.session;
		if let Some(ms) = cli.timeout_ms {
			session = session.with_discovery_timeout(Duration::from_millis(ms));
		}

		let tag_kind = cli.tag.or(file.tag).unwrap_or_default();
		let tag = tag_kind
			.memory_config()
			.read_only(cli.read_only || file.read_only.unwrap_or(false))
			.with_collisions(cli.collisions.or(file.collisions).unwrap_or(0));

		Self { session, tag_kind, tag }
	}
}
