//! Tag write-capability reporting.

use serde::{Deserialize, Serialize};

/// NDEF access level reported by a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NdefStatus {
	/// Tag is not NDEF formatted or cannot be read.
	NotSupported,
	ReadWrite,
	ReadOnly,
}

impl NdefStatus {
	pub fn is_writable(self) -> bool {
		self == Self::ReadWrite
	}
}

/// Result of a write-capability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStatus {
	pub status: NdefStatus,
	/// Largest NDEF message the tag accepts, in bytes.
	pub capacity: usize,
}

impl TagStatus {
	pub fn new(status: NdefStatus, capacity: usize) -> Self {
		Self { status, capacity }
	}
}
