//! Error types for reader sessions.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for reader and session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a reader session ended before the coordinator finished with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum InvalidationReason {
	/// Session deadline elapsed.
	Timeout,
	/// User dismissed the reader prompt.
	UserCanceled,
	/// Radio or reader hardware failure.
	ReaderError(String),
	/// Reader event stream closed or session was dropped.
	SessionClosed,
}

impl fmt::Display for InvalidationReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Timeout => write!(f, "session timed out"),
			Self::UserCanceled => write!(f, "session canceled by user"),
			Self::ReaderError(msg) => write!(f, "reader error: {msg}"),
			Self::SessionClosed => write!(f, "session closed"),
		}
	}
}

/// Errors that end a write attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// No NFC reader capability on this device.
	#[error("NFC not available")]
	Unavailable,

	/// Session ended before or during tag handling.
	#[error("Session invalidated: {0}")]
	DiscoveryInvalidated(InvalidationReason),

	/// Could not connect to the tag or query its status.
	#[error("Connection failed: {0}")]
	ConnectionFailed(String),

	/// Tag does not grant NDEF write access.
	#[error("Tag is not writable")]
	NotWritable,

	/// No payload was present when the write started.
	#[error("No data to write")]
	NoData,

	/// Tag rejected or lost the write.
	#[error("Write failed: {0}")]
	WriteFailed(String),

	/// Another session already holds the reader.
	#[error("A write session is already in progress")]
	Busy,
}

/// Machine-readable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	Unavailable,
	DiscoveryInvalidated,
	ConnectionFailed,
	NotWritable,
	NoData,
	WriteFailed,
	Busy,
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Unavailable => ErrorKind::Unavailable,
			Error::DiscoveryInvalidated(_) => ErrorKind::DiscoveryInvalidated,
			Error::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
			Error::NotWritable => ErrorKind::NotWritable,
			Error::NoData => ErrorKind::NoData,
			Error::WriteFailed(_) => ErrorKind::WriteFailed,
			Error::Busy => ErrorKind::Busy,
		}
	}

	/// Human-readable detail without the category prefix.
	pub fn reason(&self) -> String {
		match self {
			Error::DiscoveryInvalidated(reason) => reason.to_string(),
			Error::ConnectionFailed(msg) | Error::WriteFailed(msg) => msg.clone(),
			other => other.to_string(),
		}
	}

	/// Returns the invalidation reason if the session ended underneath the caller.
	pub fn invalidation(&self) -> Option<&InvalidationReason> {
		match self {
			Error::DiscoveryInvalidated(reason) => Some(reason),
			_ => None,
		}
	}

	/// Returns true if this is a session timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::DiscoveryInvalidated(InvalidationReason::Timeout))
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ErrorKind::Unavailable => "unavailable",
			ErrorKind::DiscoveryInvalidated => "discovery_invalidated",
			ErrorKind::ConnectionFailed => "connection_failed",
			ErrorKind::NotWritable => "not_writable",
			ErrorKind::NoData => "no_data",
			ErrorKind::WriteFailed => "write_failed",
			ErrorKind::Busy => "busy",
		};
		f.write_str(name)
	}
}
