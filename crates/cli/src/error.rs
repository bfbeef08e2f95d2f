use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

/// Failures outside the write attempt itself.
///
/// Tag-level failures are reported through the result envelope, not here.
#[derive(Debug, Error)]
pub enum CliError {
	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to write {path}: {source}")]
	Dump {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config {path}: {source}")]
	Config {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
}

impl CliError {
	/// Machine-readable kind used in the JSON envelope.
	pub fn kind(&self) -> &'static str {
		match self {
			CliError::Read { .. } => "read_failed",
			CliError::Dump { .. } => "dump_failed",
			CliError::Config { .. } => "invalid_config",
		}
	}

	/// Process exit status; 1 is reserved for a failed write.
	pub fn exit_code(&self) -> i32 {
		2
	}
}
