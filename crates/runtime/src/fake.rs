//! Fake reader for unit testing session and coordinator flows.
//!
//! Provides an in-memory [`Reader`] whose behavior is scripted through a
//! [`FakeReaderController`]: tag reports and invalidations are injected as
//! events, connect/query/write answers are queued, and every call the reader
//! receives is recorded for inspection.
//!
//! # Example
//!
//! ```ignore
//! let (reader, controller) = FakeReaderBuilder::new().build();
//! let mut session = TransportSession::begin(reader, &SessionConfig::default())?;
//!
//! controller.present_tags(1);
//! let tag = session.next_discovery().await?.single().unwrap();
//!
//! controller.queue_write(Err(Error::WriteFailed("tag removed".into())));
//! assert!(session.write(&tag, &message).await.is_err());
//! assert_eq!(controller.submitted().len(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tagwrite_protocol::{NdefMessage, NdefStatus, TagStatus};
use tokio::sync::Notify;

use crate::error::{Error, InvalidationReason, Result};
use crate::reader::{EventSender, Reader, ReaderEvent, ReaderFuture, SessionId, TagHandle};

/// Capacity reported by default: the largest message an NTAG216 holds.
pub const DEFAULT_FAKE_CAPACITY: usize = 867;

/// Tag operation received by a [`FakeReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderCall {
	Connect,
	QueryStatus,
	WriteMessage,
}

/// Builder for creating fake reader instances.
pub struct FakeReaderBuilder {
	available: bool,
	status: TagStatus,
}

impl FakeReaderBuilder {
	pub fn new() -> Self {
		Self {
			available: true,
			status: TagStatus::new(NdefStatus::ReadWrite, DEFAULT_FAKE_CAPACITY),
		}
	}

	/// Reader reports no NFC capability.
	pub fn unavailable(mut self) -> Self {
		self.available = false;
		self
	}

	/// Answer given to status queries when none is queued.
	pub fn with_status(mut self, status: TagStatus) -> Self {
		self.status = status;
		self
	}

	/// Build the fake reader and return both the reader and a controller.
	pub fn build(self) -> (Arc<FakeReader>, FakeReaderController) {
		let state = Arc::new(Mutex::new(FakeState::new(self.status)));
		let write_gate = Arc::new(Notify::new());

		let reader = FakeReader {
			available: self.available,
			state: Arc::clone(&state),
			write_gate: Arc::clone(&write_gate),
		};

		(Arc::new(reader), FakeReaderController { state, write_gate })
	}
}

impl Default for FakeReaderBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct FakeState {
	session: Option<SessionId>,
	events: Option<EventSender>,
	next_uid: u8,
	default_status: TagStatus,
	connect_results: VecDeque<Result<()>>,
	query_results: VecDeque<Result<TagStatus>>,
	write_results: VecDeque<Result<()>>,
	hold_writes: bool,
	submitted: Vec<NdefMessage>,
	alerts: Vec<String>,
	invalidations: Vec<Option<String>>,
	calls: Vec<ReaderCall>,
	begins: usize,
	restarts: usize,
}

impl FakeState {
	fn new(default_status: TagStatus) -> Self {
		Self {
			session: None,
			events: None,
			next_uid: 1,
			default_status,
			connect_results: VecDeque::new(),
			query_results: VecDeque::new(),
			write_results: VecDeque::new(),
			hold_writes: false,
			submitted: Vec::new(),
			alerts: Vec::new(),
			invalidations: Vec::new(),
			calls: Vec::new(),
			begins: 0,
			restarts: 0,
		}
	}

	fn check_tag(&self, tag: &TagHandle) -> Result<()> {
		if self.session == Some(tag.session()) {
			Ok(())
		} else {
			Err(Error::ConnectionFailed("tag is no longer in range".to_string()))
		}
	}

	fn end(&mut self) {
		self.session = None;
		self.events = None;
	}
}

/// Scripted in-memory reader.
pub struct FakeReader {
	available: bool,
	state: Arc<Mutex<FakeState>>,
	write_gate: Arc<Notify>,
}

impl Reader for FakeReader {
	fn is_available(&self) -> bool {
		self.available
	}

	fn begin(&self, session: SessionId, events: EventSender) -> Result<()> {
		if !self.available {
			return Err(Error::Unavailable);
		}
		let mut state = self.state.lock();
		if state.session.is_some() {
			return Err(Error::Busy);
		}
		state.session = Some(session);
		state.events = Some(events);
		state.begins += 1;
		Ok(())
	}

	fn set_alert(&self, message: &str) {
		self.state.lock().alerts.push(message.to_string());
	}

	fn restart_polling(&self) {
		self.state.lock().restarts += 1;
	}

	fn connect<'a>(&'a self, tag: &'a TagHandle) -> ReaderFuture<'a, ()> {
		Box::pin(async move {
			let mut state = self.state.lock();
			state.calls.push(ReaderCall::Connect);
			state.check_tag(tag)?;
			state.connect_results.pop_front().unwrap_or(Ok(()))
		})
	}

	fn query_status<'a>(&'a self, tag: &'a TagHandle) -> ReaderFuture<'a, TagStatus> {
		Box::pin(async move {
			let mut state = self.state.lock();
			state.calls.push(ReaderCall::QueryStatus);
			state.check_tag(tag)?;
			let default = state.default_status;
			state.query_results.pop_front().unwrap_or(Ok(default))
		})
	}

	fn write_message<'a>(&'a self, tag: &'a TagHandle, message: &'a NdefMessage) -> ReaderFuture<'a, ()> {
		Box::pin(async move {
			let hold = {
				let mut state = self.state.lock();
				state.calls.push(ReaderCall::WriteMessage);
				state.check_tag(tag)?;
				state.submitted.push(message.clone());
				state.hold_writes
			};
			if hold {
				self.write_gate.notified().await;
			}
			self.state.lock().write_results.pop_front().unwrap_or(Ok(()))
		})
	}

	fn invalidate(&self, error_message: Option<&str>) {
		let mut state = self.state.lock();
		if state.session.is_none() {
			return;
		}
		state.invalidations.push(error_message.map(str::to_string));
		state.end();
	}
}

/// Controller for injecting events and inspecting reader traffic.
#[derive(Clone)]
pub struct FakeReaderController {
	state: Arc<Mutex<FakeState>>,
	write_gate: Arc<Notify>,
}

impl FakeReaderController {
	/// Report `count` tags in the field. Returns false when no session is active.
	pub fn present_tags(&self, count: usize) -> bool {
		let mut state = self.state.lock();
		let (Some(session), Some(events)) = (state.session, state.events.clone()) else {
			return false;
		};

		let mut tags = Vec::with_capacity(count);
		for _ in 0..count {
			let uid = state.next_uid;
			state.next_uid = state.next_uid.wrapping_add(1);
			tags.push(TagHandle::new(session, [0x04, uid, 0x5A, 0x3C, 0x21, 0x80, 0x90]));
		}
		events.send(ReaderEvent::TagsDetected(tags)).is_ok()
	}

	/// End the active session from the reader side.
	pub fn invalidate(&self, reason: InvalidationReason) -> bool {
		let mut state = self.state.lock();
		let delivered = match state.events.as_ref() {
			Some(events) => events.send(ReaderEvent::Invalidated(reason)).is_ok(),
			None => false,
		};
		state.end();
		delivered
	}

	pub fn queue_connect(&self, result: Result<()>) {
		self.state.lock().connect_results.push_back(result);
	}

	pub fn queue_query(&self, result: Result<TagStatus>) {
		self.state.lock().query_results.push_back(result);
	}

	pub fn queue_write(&self, result: Result<()>) {
		self.state.lock().write_results.push_back(result);
	}

	/// Make subsequent writes wait for [`release_write`](Self::release_write).
	pub fn hold_writes(&self) {
		self.state.lock().hold_writes = true;
	}

	/// Let one held write complete.
	pub fn release_write(&self) {
		self.write_gate.notify_one();
	}

	pub fn is_active(&self) -> bool {
		self.state.lock().session.is_some()
	}

	pub fn begin_count(&self) -> usize {
		self.state.lock().begins
	}

	pub fn restart_count(&self) -> usize {
		self.state.lock().restarts
	}

	pub fn alerts(&self) -> Vec<String> {
		self.state.lock().alerts.clone()
	}

	pub fn invalidations(&self) -> Vec<Option<String>> {
		self.state.lock().invalidations.clone()
	}

	/// Messages handed to `write_message`, whatever the outcome.
	pub fn submitted(&self) -> Vec<NdefMessage> {
		self.state.lock().submitted.clone()
	}

	pub fn calls(&self) -> Vec<ReaderCall> {
		self.state.lock().calls.clone()
	}
}
