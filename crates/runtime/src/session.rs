//! Lifecycle of one reader session.
//!
//! A [`TransportSession`] owns the reader for as long as it is active. It
//! turns the reader's event stream into discovery results, enforces the
//! session deadline, and races every tag operation against invalidation so
//! that a timeout or cancellation during connect/query/write surfaces as
//! [`Error::DiscoveryInvalidated`].
//!
//! # Lifecycle
//!
//! 1. [`begin`](TransportSession::begin) checks availability and starts polling
//! 2. [`next_discovery`](TransportSession::next_discovery) yields tag reports
//! 3. `connect` / `query_writability` / `write` run one request at a time
//! 4. [`invalidate`](TransportSession::invalidate) (or drop) releases the reader
//!
//! Once invalidated, every further call fails with the recorded reason.

use std::sync::Arc;

use tagwrite_protocol::{NdefMessage, TagStatus};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, InvalidationReason, Result};
use crate::reader::{Reader, ReaderEvent, ReaderFuture, SessionId, TagHandle};

/// Non-empty set of tags reported by one discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTags {
	first: TagHandle,
	rest: Vec<TagHandle>,
}

impl DiscoveredTags {
	/// Returns `None` for an empty report.
	pub fn from_vec(mut tags: Vec<TagHandle>) -> Option<Self> {
		if tags.is_empty() {
			return None;
		}
		let first = tags.remove(0);
		Some(Self { first, rest: tags })
	}

	pub fn len(&self) -> usize {
		1 + self.rest.len()
	}

	pub fn is_empty(&self) -> bool {
		false
	}

	/// The only tag, or the whole set back when more than one was found.
	pub fn single(self) -> std::result::Result<TagHandle, Self> {
		if self.rest.is_empty() { Ok(self.first) } else { Err(self) }
	}

	pub fn iter(&self) -> impl Iterator<Item = &TagHandle> {
		std::iter::once(&self.first).chain(self.rest.iter())
	}
}

/// One active discovery/communication session with a reader.
pub struct TransportSession {
	id: SessionId,
	reader: Arc<dyn Reader>,
	events: mpsc::UnboundedReceiver<ReaderEvent>,
	deadline: Option<Instant>,
	invalidated: Option<InvalidationReason>,
}

impl TransportSession {
	/// Starts discovery on `reader` and advertises the configured prompt.
	pub fn begin(reader: Arc<dyn Reader>, config: &SessionConfig) -> Result<Self> {
		if !reader.is_available() {
			return Err(Error::Unavailable);
		}

		let id = SessionId::next();
		let (events_tx, events) = mpsc::unbounded_channel();
		reader.begin(id, events_tx)?;
		reader.set_alert(&config.alert_message);

		info!(session = %id, timeout_ms = config.discovery_timeout.as_millis() as u64, "Reader session started");

		Ok(Self {
			id,
			reader,
			events,
			deadline: Instant::now().checked_add(config.discovery_timeout),
			invalidated: None,
		})
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	pub fn is_active(&self) -> bool {
		self.invalidated.is_none()
	}

	/// Reason recorded when the session ended, if it has.
	pub fn invalidation(&self) -> Option<&InvalidationReason> {
		self.invalidated.as_ref()
	}

	pub fn set_alert(&self, message: &str) {
		if self.is_active() {
			self.reader.set_alert(message);
		}
	}

	pub fn restart_polling(&self) {
		if self.is_active() {
			debug!(session = %self.id, "Restarting polling");
			self.reader.restart_polling();
		}
	}

	/// Waits for the next non-empty tag report.
	pub async fn next_discovery(&mut self) -> Result<DiscoveredTags> {
		loop {
			match self.next_event().await? {
				ReaderEvent::TagsDetected(tags) => match DiscoveredTags::from_vec(tags) {
					Some(found) => {
						debug!(session = %self.id, count = found.len(), "Tags detected");
						return Ok(found);
					}
					None => warn!(session = %self.id, "Reader reported an empty tag set, still polling"),
				},
				ReaderEvent::Invalidated(reason) => return Err(self.mark_invalidated(reason)),
			}
		}
	}

	pub async fn connect(&mut self, tag: &TagHandle) -> Result<()> {
		self.check_tag(tag)?;
		let reader = Arc::clone(&self.reader);
		self.race(reader.connect(tag)).await
	}

	pub async fn query_writability(&mut self, tag: &TagHandle) -> Result<TagStatus> {
		self.check_tag(tag)?;
		let reader = Arc::clone(&self.reader);
		self.race(reader.query_status(tag)).await
	}

	pub async fn write(&mut self, tag: &TagHandle, message: &NdefMessage) -> Result<()> {
		self.check_tag(tag)?;
		let reader = Arc::clone(&self.reader);
		self.race(reader.write_message(tag, message)).await
	}

	/// Ends the session. No-op once already invalidated.
	pub fn invalidate(&mut self, error_message: Option<&str>) {
		if self.invalidated.is_some() {
			return;
		}
		self.reader.invalidate(error_message);
		self.invalidated = Some(InvalidationReason::SessionClosed);
		match error_message {
			Some(message) => info!(session = %self.id, error_message = message, "Reader session invalidated"),
			None => info!(session = %self.id, "Reader session finished"),
		}
	}

	fn check_tag(&self, tag: &TagHandle) -> Result<()> {
		if let Some(reason) = &self.invalidated {
			return Err(Error::DiscoveryInvalidated(reason.clone()));
		}
		if tag.session() != self.id {
			return Err(Error::ConnectionFailed(format!("tag {tag} belongs to {}, not {}", tag.session(), self.id)));
		}
		Ok(())
	}

	async fn race<T>(&mut self, mut op: ReaderFuture<'_, T>) -> Result<T> {
		loop {
			let event = tokio::select! {
				result = &mut op => return result,
				event = self.next_event() => event?,
			};
			match event {
				ReaderEvent::TagsDetected(tags) => {
					debug!(session = %self.id, count = tags.len(), "Ignoring tag report during tag operation");
				}
				ReaderEvent::Invalidated(reason) => return Err(self.mark_invalidated(reason)),
			}
		}
	}

	async fn next_event(&mut self) -> Result<ReaderEvent> {
		if let Some(reason) = &self.invalidated {
			return Err(Error::DiscoveryInvalidated(reason.clone()));
		}

		let event = match self.deadline {
			Some(deadline) => match time::timeout_at(deadline, self.events.recv()).await {
				Ok(event) => event,
				Err(_) => {
					self.reader.invalidate(Some("Session timed out"));
					return Err(self.mark_invalidated(InvalidationReason::Timeout));
				}
			},
			None => self.events.recv().await,
		};

		event.ok_or_else(|| self.mark_invalidated(InvalidationReason::SessionClosed))
	}

	fn mark_invalidated(&mut self, reason: InvalidationReason) -> Error {
		info!(session = %self.id, %reason, "Reader session ended");
		self.invalidated = Some(reason.clone());
		Error::DiscoveryInvalidated(reason)
	}
}

impl Drop for TransportSession {
	fn drop(&mut self) {
		if self.invalidated.is_none() {
			debug!(session = %self.id, "Dropping active session");
			self.reader.invalidate(None);
		}
	}
}
