//! Single-tag write state machine.
//!
//! A [`WriteCoordinator`] drives one write at a time:
//!
//! ```text
//! Idle → Discovering → Validating → Connecting → QueryingStatus → Writing → Succeeded
//!            ↑    │                                                           ↘ Failed(kind)
//!            └────┘ more than one tag: prompt and re-poll
//! ```
//!
//! The completion passed to [`write`](WriteCoordinator::write) fires exactly
//! once per call: synchronously for `Busy` and `Unavailable`, otherwise from
//! the task that runs the attempt. If that task is dropped before finishing,
//! the completion still fires with `DiscoveryInvalidated(SessionClosed)`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tagwrite_protocol::{NdefMessage, NdefRecord};
use tagwrite_runtime::{Error, InvalidationReason, Reader, Result, SessionConfig, TagHandle, TransportSession};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::payload::Payload;
use crate::state::WriteState;
use crate::status::{NullSink, StatusSink};

/// Prompt shown when several tags are in the field at once.
pub const MULTIPLE_TAGS_MESSAGE: &str = "More than one tag detected. Please present only one tag.";

/// Alert and status after a successful write.
pub const SUCCESS_MESSAGE: &str = "Write successful!";

/// One-shot callback receiving the outcome of a write.
pub type Completion = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// Drives payload writes onto one tag per attempt.
pub struct WriteCoordinator {
	reader: Arc<dyn Reader>,
	config: SessionConfig,
	progress: Progress,
}

impl WriteCoordinator {
	pub fn new(reader: Arc<dyn Reader>) -> Self {
		Self {
			reader,
			config: SessionConfig::default(),
			progress: Progress::new(Arc::new(NullSink)),
		}
	}

	pub fn with_config(mut self, config: SessionConfig) -> Self {
		self.config = config;
		self
	}

	/// Routes state transitions to `sink`. Takes effect for attempts started afterwards.
	pub fn with_status_sink(mut self, sink: impl StatusSink + 'static) -> Self {
		self.progress.sink = Arc::new(sink);
		self
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	pub fn state(&self) -> WriteState {
		self.progress.snapshot.lock().state
	}

	/// Last user-facing message.
	pub fn status(&self) -> String {
		self.progress.snapshot.lock().status.clone()
	}

	/// Starts writing `payload` to the next single tag presented.
	///
	/// Must be called from within a Tokio runtime; the attempt runs as a
	/// spawned task. `completion` fires exactly once.
	pub fn write<F>(&self, payload: impl Into<Payload>, completion: F)
	where
		F: FnOnce(Result<()>) + Send + 'static,
	{
		let payload = payload.into();
		let completion: Completion = Box::new(completion);

		if !self.progress.claim() {
			warn!(bytes = payload.len(), "Write rejected, another attempt is in flight");
			completion(Err(Error::Busy));
			return;
		}

		let mut attempt = Attempt {
			progress: self.progress.clone(),
			completion: Some(completion),
		};

		if !self.reader.is_available() {
			attempt.finish(Err(Error::Unavailable));
			return;
		}

		let Ok(handle) = Handle::try_current() else {
			warn!("No Tokio runtime to drive the write");
			attempt.finish(Err(Error::Unavailable));
			return;
		};

		let session = match TransportSession::begin(Arc::clone(&self.reader), &self.config) {
			Ok(session) => session,
			Err(err) => {
				attempt.finish(Err(err));
				return;
			}
		};

		info!(session = %session.id(), bytes = payload.len(), "Write attempt started");
		self.progress.update(WriteState::Discovering, &self.config.alert_message);

		let run = Run {
			session,
			payload: Some(payload),
			progress: self.progress.clone(),
		};
		handle.spawn(run.execute(attempt));
	}

	/// Starts a write and returns a future resolving to its outcome.
	///
	/// The attempt begins immediately, before the future is first polled.
	pub fn write_async(&self, payload: impl Into<Payload>) -> WriteOutcome {
		let (tx, rx) = oneshot::channel();
		self.write(payload, move |result| {
			let _ = tx.send(result);
		});
		WriteOutcome { rx }
	}
}

/// Future returned by [`WriteCoordinator::write_async`].
pub struct WriteOutcome {
	rx: oneshot::Receiver<Result<()>>,
}

impl Future for WriteOutcome {
	type Output = Result<()>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx)
			.poll(cx)
			.map(|result| result.unwrap_or(Err(Error::DiscoveryInvalidated(InvalidationReason::SessionClosed))))
	}
}

struct Snapshot {
	state: WriteState,
	status: String,
}

#[derive(Clone)]
struct Progress {
	snapshot: Arc<Mutex<Snapshot>>,
	sink: Arc<dyn StatusSink>,
}

impl Progress {
	fn new(sink: Arc<dyn StatusSink>) -> Self {
		Self {
			snapshot: Arc::new(Mutex::new(Snapshot {
				state: WriteState::Idle,
				status: String::new(),
			})),
			sink,
		}
	}

	/// Reserves the coordinator for a new attempt. False when one is in flight.
	fn claim(&self) -> bool {
		let mut snapshot = self.snapshot.lock();
		if snapshot.state.is_in_flight() {
			return false;
		}
		snapshot.state = WriteState::Discovering;
		true
	}

	fn update(&self, state: WriteState, message: &str) {
		{
			let mut snapshot = self.snapshot.lock();
			snapshot.state = state;
			snapshot.status = message.to_string();
		}
		debug!(%state, status = message, "Write state changed");
		self.sink.update(&state, message);
	}
}

/// Owns the completion until it fires.
struct Attempt {
	progress: Progress,
	completion: Option<Completion>,
}

impl Attempt {
	fn finish(&mut self, result: Result<()>) {
		let Some(completion) = self.completion.take() else {
			return;
		};

		match &result {
			Ok(()) => self.progress.update(WriteState::Succeeded, SUCCESS_MESSAGE),
			Err(err) => {
				info!(error = %err, kind = %err.kind(), "Write attempt failed");
				self.progress.update(WriteState::Failed(err.kind()), &err.to_string());
			}
		}
		completion(result);
	}
}

impl Drop for Attempt {
	fn drop(&mut self) {
		if self.completion.is_some() {
			warn!("Write attempt dropped before completion");
			self.finish(Err(Error::DiscoveryInvalidated(InvalidationReason::SessionClosed)));
		}
	}
}

/// State carried by the spawned task.
struct Run {
	session: TransportSession,
	payload: Option<Payload>,
	progress: Progress,
}

impl Run {
	async fn execute(mut self, mut attempt: Attempt) {
		let result = self.drive().await;

		match &result {
			Ok(()) => {
				self.session.set_alert(SUCCESS_MESSAGE);
				self.session.invalidate(None);
			}
			Err(err) => self.session.invalidate(Some(&err.to_string())),
		}
		drop(self);

		attempt.finish(result);
	}

	async fn drive(&mut self) -> Result<()> {
		let tag = self.discover_single().await?;

		self.progress.update(WriteState::Validating, &format!("Tag detected: {tag}"));

		self.progress.update(WriteState::Connecting, "Connecting to tag");
		self.session.connect(&tag).await.map_err(connection_failure)?;

		self.progress.update(WriteState::QueryingStatus, "Checking tag status");
		let status = self.session.query_writability(&tag).await.map_err(connection_failure)?;
		debug!(tag = %tag, status = ?status.status, capacity = status.capacity, "Tag status");
		if !status.status.is_writable() {
			return Err(Error::NotWritable);
		}

		self.progress.update(WriteState::Writing, "Writing data");
		self.write_payload(&tag).await
	}

	async fn discover_single(&mut self) -> Result<TagHandle> {
		loop {
			match self.session.next_discovery().await?.single() {
				Ok(tag) => return Ok(tag),
				Err(tags) => {
					warn!(session = %self.session.id(), count = tags.len(), "Multiple tags in field, polling again");
					self.session.set_alert(MULTIPLE_TAGS_MESSAGE);
					self.progress.update(WriteState::Discovering, MULTIPLE_TAGS_MESSAGE);
					self.session.restart_polling();
				}
			}
		}
	}

	async fn write_payload(&mut self, tag: &TagHandle) -> Result<()> {
		let payload = self.payload.take().ok_or(Error::NoData)?;
		let message = NdefMessage::single(NdefRecord::opaque(payload.as_bytes()));
		drop(payload);

		debug!(tag = %tag, bytes = message.encoded_len(), "Submitting NDEF message");
		self.session.write(tag, &message).await.map_err(write_failure)
	}
}

fn connection_failure(err: Error) -> Error {
	match err {
		Error::DiscoveryInvalidated(_) | Error::ConnectionFailed(_) => err,
		other => Error::ConnectionFailed(other.reason()),
	}
}

fn write_failure(err: Error) -> Error {
	match err {
		Error::DiscoveryInvalidated(_) | Error::WriteFailed(_) => err,
		other => Error::WriteFailed(other.reason()),
	}
}
