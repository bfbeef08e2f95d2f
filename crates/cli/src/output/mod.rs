//! Result envelope and status printing.
//!
//! Every run ends with one envelope on stdout:
//!
//! ```json
//! {
//!   "ok": true,
//!   "state": "succeeded",
//!   "bytes": 540,
//!   "tag": "ntag216"
//! }
//! ```
//!
//! On failure:
//!
//! ```json
//! {
//!   "ok": false,
//!   "state": "failed",
//!   "error": { "kind": "not_writable", "message": "Tag is not writable" },
//!   "bytes": 540,
//!   "tag": "ntag216"
//! }
//! ```
//!
//! Status updates stream to stderr while the attempt runs.


use std::io::{self, Write};
use std::path::PathBuf;

use colored::Colorize;
use serde::{Deserialize, Serialize};
use tagwrite::{StatusSink, WriteState};

use crate::cli::TagKind;
use crate::error::CliError;

/// Output format for the result envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// Pretty-printed JSON
	Json,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
		}
	}
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
	pub ok: bool,
	/// Final coordinator state name.
	pub state: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ReportError>,
	/// Payload size in bytes.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub bytes: Option<usize>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tag: Option<TagKind>,
	/// Where the memory image was saved.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dump: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportError {
	pub kind: String,
	pub message: String,
}

impl WriteReport {
	pub fn from_outcome(state: WriteState, outcome: &tagwrite::Result<()>, bytes: usize, tag: TagKind) -> Self {
		Self {
			ok: outcome.is_ok(),
			state: state.name().to_string(),
			error: outcome.as_ref().err().map(|err| ReportError {
				kind: err.kind().to_string(),
				message: err.to_string(),
			}),
			bytes: Some(bytes),
			tag: Some(tag),
			dump: None,
		}
	}

	/// Envelope for a run that never reached the tag.
	pub fn from_cli_error(err: &CliError) -> Self {
		Self {
			ok: false,
			state: WriteState::Idle.name().to_string(),
			error: Some(ReportError {
				kind: err.kind().to_string(),
				message: err.to_string(),
			}),
			bytes: None,
			tag: None,
			dump: None,
		}
	}

	pub fn with_dump(mut self, path: PathBuf) -> Self {
		self.dump = Some(path);
		self
	}
}

pub fn print_report(report: &WriteReport, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(report) {
				println!("{json}");
			}
		}
		OutputFormat::Text => {
			let mut stdout = io::stdout().lock();
			let _ = stdout.write_all(render_text(report).as_bytes());
		}
	}
}

fn render_text(report: &WriteReport) -> String {
	let mut out = String::new();
	if report.ok {
		let bytes = report.bytes.unwrap_or(0);
		match report.tag {
			Some(tag) => out.push_str(&format!("Wrote {bytes} bytes to {tag}\n")),
			None => out.push_str(&format!("Wrote {bytes} bytes\n")),
		}
	} else if let Some(error) = &report.error {
		out.push_str(&format!("Error [{}]: {}\n", error.kind, error.message));
	}
	if let Some(path) = &report.dump {
		out.push_str(&format!("Saved tag memory: {}\n", path.display()));
	}
	out
}

/// Prints each status update to stderr, colored by state.
#[derive(Debug, Default)]
pub struct StatusPrinter;

impl StatusPrinter {
	fn line(state: &WriteState, message: &str) -> String {
		let label = format!("[{}]", state.name());
		let label = match state {
			WriteState::Succeeded => label.green().bold(),
			WriteState::Failed(_) => label.red().bold(),
			_ => label.cyan(),
		};
		format!("{label} {message}")
	}
}

impl StatusSink for StatusPrinter {
	fn update(&self, state: &WriteState, message: &str) {
		eprintln!("{}", Self::line(state, message));
	}
}
