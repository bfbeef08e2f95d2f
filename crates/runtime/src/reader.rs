//! Reader backend abstraction.
//!
//! A [`Reader`] is the exclusive hardware resource that polls for tags and
//! performs tag I/O. Discovery results and invalidations are pushed as
//! [`ReaderEvent`]s into the channel handed over in [`Reader::begin`];
//! connect, query and write are request/response futures.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use tagwrite_protocol::{NdefMessage, TagStatus};
use tokio::sync::mpsc;

use crate::error::{InvalidationReason, Result};

/// Boxed future returned by asynchronous reader operations.
pub type ReaderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Sender half of a session's event stream.
pub type EventSender = mpsc::UnboundedSender<ReaderEvent>;

/// Identifies one reader session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
	pub(crate) fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}

	pub fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "session#{}", self.0)
	}
}

/// A tag present in the field, valid only within the session that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagHandle {
	session: SessionId,
	uid: Vec<u8>,
}

impl TagHandle {
	pub fn new(session: SessionId, uid: impl Into<Vec<u8>>) -> Self {
		Self { session, uid: uid.into() }
	}

	pub fn session(&self) -> SessionId {
		self.session
	}

	pub fn uid(&self) -> &[u8] {
		&self.uid
	}
}

impl fmt::Display for TagHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, byte) in self.uid.iter().enumerate() {
			if i > 0 {
				f.write_str(":")?;
			}
			write!(f, "{byte:02X}")?;
		}
		Ok(())
	}
}

/// Asynchronous notification from a reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
	/// Tags currently in the field.
	TagsDetected(Vec<TagHandle>),
	/// Reader ended the session on its own.
	Invalidated(InvalidationReason),
}

/// Hardware boundary for tag discovery and I/O.
///
/// Implementations must reject a second concurrent [`begin`](Reader::begin)
/// with [`Error::Busy`](crate::Error::Busy) and treat
/// [`invalidate`](Reader::invalidate) on an idle reader as a no-op.
pub trait Reader: Send + Sync {
	/// Whether this device can read and write tags at all.
	fn is_available(&self) -> bool;

	/// Starts polling; events for `session` are pushed into `events`.
	fn begin(&self, session: SessionId, events: EventSender) -> Result<()>;

	/// Updates the prompt shown to the user while the session is active.
	fn set_alert(&self, message: &str);

	/// Resumes polling after a rejected discovery.
	fn restart_polling(&self);

	fn connect<'a>(&'a self, tag: &'a TagHandle) -> ReaderFuture<'a, ()>;

	fn query_status<'a>(&'a self, tag: &'a TagHandle) -> ReaderFuture<'a, TagStatus>;

	fn write_message<'a>(&'a self, tag: &'a TagHandle, message: &'a NdefMessage) -> ReaderFuture<'a, ()>;

	/// Stops the session. `error_message` is shown to the user when present.
	fn invalidate(&self, error_message: Option<&str>);
}
