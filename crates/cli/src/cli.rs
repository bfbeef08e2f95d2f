use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tagwrite::MemoryTagConfig;

use crate::output::OutputFormat;
use crate::styles::cli_styles;

/// Simulated tag model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
	/// 144-byte data area
	Ntag213,
	/// 496-byte data area
	Ntag215,
	/// 872-byte data area, fits a full 540-byte dump
	#[default]
	Ntag216,
}

impl TagKind {
	pub fn memory_config(self) -> MemoryTagConfig {
		match self {
			TagKind::Ntag213 => MemoryTagConfig::ntag213(),
			TagKind::Ntag215 => MemoryTagConfig::ntag215(),
			TagKind::Ntag216 => MemoryTagConfig::ntag216(),
		}
	}
}

impl std::fmt::Display for TagKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			TagKind::Ntag213 => write!(f, "ntag213"),
			TagKind::Ntag215 => write!(f, "ntag215"),
			TagKind::Ntag216 => write!(f, "ntag216"),
		}
	}
}

#[derive(Parser, Debug)]
#[command(name = "tagwrite")]
#[command(about = "Write an Amiibo dump onto an NFC tag")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format for the result
	#[arg(short = 'f', long, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// JSON settings file; flags override its values
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Payload to write, usually a 540-byte NTAG215 dump
	#[arg(value_name = "FILE")]
	pub payload: PathBuf,

	/// Give up if no single tag is handled within this many milliseconds
	#[arg(long, value_name = "MS")]
	pub timeout_ms: Option<u64>,

	/// Tag model to simulate
	#[arg(short, long, value_enum)]
	pub tag: Option<TagKind>,

	/// Simulate a locked tag
	#[arg(long)]
	pub read_only: bool,

	/// Polling rounds that report a second tag in the field
	#[arg(long, value_name = "N")]
	pub collisions: Option<usize>,

	/// Save the tag memory image here after the attempt
	#[arg(long, value_name = "PATH")]
	pub dump: Option<PathBuf>,
}
