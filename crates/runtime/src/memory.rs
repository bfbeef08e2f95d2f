//! Simulated Type 2 tag reader.
//!
//! [`MemoryReader`] keeps a byte image of one NTAG21x tag in memory and
//! answers reader operations against it: discovery reports the tag (plus a
//! second tag for a configurable number of polling rounds), status queries
//! read the capability container, and writes frame the NDEF message in a TLV
//! and store it in the data area.

use parking_lot::Mutex;
use tagwrite_protocol::t2t::{self, CapabilityContainer, CC_PAGE, DATA_PAGE, PAGE_SIZE};
use tagwrite_protocol::{DecodeError, NdefMessage, NdefStatus, TagStatus};
use tracing::debug;

use crate::error::{Error, Result};
use crate::reader::{EventSender, Reader, ReaderEvent, ReaderFuture, SessionId, TagHandle};

const HEADER_LEN: usize = DATA_PAGE * PAGE_SIZE;
const CASCADE_TAG: u8 = 0x88;

/// Shape of the simulated tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryTagConfig {
	pub uid: [u8; 7],
	/// Data area size in bytes, as advertised by the capability container.
	pub data_area_size: usize,
	pub read_only: bool,
	/// Polling rounds that report a second tag before the real one is alone.
	pub collisions: usize,
}

impl MemoryTagConfig {
	pub fn ntag213() -> Self {
		Self::with_data_area(144)
	}

	pub fn ntag215() -> Self {
		Self::with_data_area(496)
	}

	pub fn ntag216() -> Self {
		Self::with_data_area(872)
	}

	fn with_data_area(data_area_size: usize) -> Self {
		Self {
			uid: [0x04, 0x8A, 0x21, 0x5C, 0xE2, 0x3F, 0x80],
			data_area_size,
			read_only: false,
			collisions: 0,
		}
	}

	pub fn read_only(mut self, read_only: bool) -> Self {
		self.read_only = read_only;
		self
	}

	pub fn with_collisions(mut self, rounds: usize) -> Self {
		self.collisions = rounds;
		self
	}

	fn image(&self) -> Vec<u8> {
		let uid = self.uid;
		let mut image = vec![0u8; HEADER_LEN + self.data_area_size];

		image[..4].copy_from_slice(&[uid[0], uid[1], uid[2], CASCADE_TAG ^ uid[0] ^ uid[1] ^ uid[2]]);
		image[4..8].copy_from_slice(&uid[3..7]);
		let lock = if self.read_only { 0xFF } else { 0x00 };
		image[8..12].copy_from_slice(&[uid[3] ^ uid[4] ^ uid[5] ^ uid[6], 0x48, lock, lock]);

		let cc = CapabilityContainer::new(self.data_area_size, !self.read_only);
		image[CC_PAGE * PAGE_SIZE..HEADER_LEN].copy_from_slice(&cc.to_bytes());

		// empty NDEF TLV followed by the terminator
		if self.data_area_size >= 3 {
			image[HEADER_LEN..HEADER_LEN + 3].copy_from_slice(&[0x03, 0x00, 0xFE]);
		}
		image
	}
}

impl Default for MemoryTagConfig {
	fn default() -> Self {
		Self::ntag216()
	}
}

struct MemoryState {
	session: Option<SessionId>,
	events: Option<EventSender>,
	connected: bool,
	collisions_left: usize,
	memory: Vec<u8>,
}

/// Reader backed by an in-memory tag image.
pub struct MemoryReader {
	config: MemoryTagConfig,
	state: Mutex<MemoryState>,
}

impl MemoryReader {
	pub fn new(config: MemoryTagConfig) -> Self {
		let memory = config.image();
		Self {
			config,
			state: Mutex::new(MemoryState {
				session: None,
				events: None,
				connected: false,
				collisions_left: 0,
				memory,
			}),
		}
	}

	pub fn config(&self) -> &MemoryTagConfig {
		&self.config
	}

	/// Full tag image, header pages included.
	pub fn memory_image(&self) -> Vec<u8> {
		self.state.lock().memory.clone()
	}

	/// Decodes the NDEF message currently stored on the tag.
	pub fn stored_message(&self) -> std::result::Result<NdefMessage, DecodeError> {
		let state = self.state.lock();
		let value = t2t::find_ndef_tlv(&state.memory[HEADER_LEN..])?;
		NdefMessage::from_bytes(value)
	}

	fn poll(&self, state: &MemoryState) {
		let (Some(session), Some(events)) = (state.session, state.events.as_ref()) else {
			return;
		};

		let mut tags = vec![TagHandle::new(session, self.config.uid)];
		if state.collisions_left > 0 {
			let mut other = self.config.uid;
			other[6] ^= 0xFF;
			tags.push(TagHandle::new(session, other));
		}
		debug!(%session, count = tags.len(), "Simulated tags in field");
		let _ = events.send(ReaderEvent::TagsDetected(tags));
	}

	fn capability(memory: &[u8]) -> Result<CapabilityContainer> {
		let mut cc = [0u8; PAGE_SIZE];
		cc.copy_from_slice(&memory[CC_PAGE * PAGE_SIZE..HEADER_LEN]);
		CapabilityContainer::from_bytes(cc).map_err(|e| Error::ConnectionFailed(e.to_string()))
	}
}

fn check_connected(state: &MemoryState, tag: &TagHandle) -> Result<()> {
	if state.session != Some(tag.session()) {
		return Err(Error::ConnectionFailed("tag is no longer in range".to_string()));
	}
	if !state.connected {
		return Err(Error::ConnectionFailed("tag is not connected".to_string()));
	}
	Ok(())
}

impl Reader for MemoryReader {
	fn is_available(&self) -> bool {
		true
	}

	fn begin(&self, session: SessionId, events: EventSender) -> Result<()> {
		let mut state = self.state.lock();
		if state.session.is_some() {
			return Err(Error::Busy);
		}
		state.session = Some(session);
		state.events = Some(events);
		state.connected = false;
		state.collisions_left = self.config.collisions;
		self.poll(&state);
		Ok(())
	}

	fn set_alert(&self, message: &str) {
		debug!(prompt = message, "Reader prompt");
	}

	fn restart_polling(&self) {
		let mut state = self.state.lock();
		state.collisions_left = state.collisions_left.saturating_sub(1);
		self.poll(&state);
	}

	fn connect<'a>(&'a self, tag: &'a TagHandle) -> ReaderFuture<'a, ()> {
		Box::pin(async move {
			let mut state = self.state.lock();
			if state.session != Some(tag.session()) || tag.uid() != self.config.uid.as_slice() {
				return Err(Error::ConnectionFailed(format!("tag {tag} is not in range")));
			}
			state.connected = true;
			Ok(())
		})
	}

	fn query_status<'a>(&'a self, tag: &'a TagHandle) -> ReaderFuture<'a, TagStatus> {
		Box::pin(async move {
			let state = self.state.lock();
			check_connected(&state, tag)?;
			let cc = Self::capability(&state.memory)?;
			Ok(TagStatus::new(cc.status(), cc.max_message_len()))
		})
	}

	fn write_message<'a>(&'a self, tag: &'a TagHandle, message: &'a NdefMessage) -> ReaderFuture<'a, ()> {
		Box::pin(async move {
			let mut state = self.state.lock();
			check_connected(&state, tag).map_err(|e| Error::WriteFailed(e.reason()))?;

			let cc = Self::capability(&state.memory).map_err(|e| Error::WriteFailed(e.reason()))?;
			if cc.status() != NdefStatus::ReadWrite {
				return Err(Error::WriteFailed("tag is read-only".to_string()));
			}

			let encoded = message.to_bytes().map_err(|e| Error::WriteFailed(e.to_string()))?;
			if encoded.len() > cc.max_message_len() {
				return Err(Error::WriteFailed(format!(
					"NDEF message of {} bytes exceeds tag capacity of {} bytes",
					encoded.len(),
					cc.max_message_len()
				)));
			}
			let framed = t2t::wrap_ndef_tlv(&encoded).map_err(|e| Error::WriteFailed(e.to_string()))?;

			state.memory[HEADER_LEN..HEADER_LEN + framed.len()].copy_from_slice(&framed);
			debug!(bytes = encoded.len(), "Simulated tag written");
			Ok(())
		})
	}

	fn invalidate(&self, error_message: Option<&str>) {
		let mut state = self.state.lock();
		if state.session.take().is_none() {
			return;
		}
		if let Some(message) = error_message {
			debug!(error_message = message, "Reader session closed with error");
		}
		state.events = None;
		state.connected = false;
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::time::Duration;

	use tagwrite_protocol::NdefRecord;

	use super::*;
	use crate::config::SessionConfig;
	use crate::session::TransportSession;

	fn open(config: MemoryTagConfig) -> (Arc<MemoryReader>, TransportSession) {
		let reader = Arc::new(MemoryReader::new(config));
		let session_config = SessionConfig::default().with_discovery_timeout(Duration::from_secs(5));
		let session = TransportSession::begin(reader.clone(), &session_config).unwrap();
		(reader, session)
	}

	#[test]
	fn fresh_image_has_valid_header_and_empty_message() {
		let reader = MemoryReader::new(MemoryTagConfig::ntag215());
		let image = reader.memory_image();
		assert_eq!(image.len(), 16 + 496);
		assert_eq!(&image[12..16], &[0xE1, 0x10, 0x3E, 0x00]);
		assert_eq!(image[3], 0x88 ^ 0x04 ^ 0x8A ^ 0x21);

		let err = reader.stored_message().unwrap_err();
		assert_eq!(err, DecodeError::Truncated { offset: 0, needed: 1 });
	}

	#[tokio::test]
	async fn full_write_stores_opaque_record() {
		let (reader, mut session) = open(MemoryTagConfig::ntag216());
		let tag = session.next_discovery().await.unwrap().single().unwrap();

		session.connect(&tag).await.unwrap();
		let status = session.query_writability(&tag).await.unwrap();
		assert_eq!(status, TagStatus::new(NdefStatus::ReadWrite, 867));

		let payload: Vec<u8> = (0..540u32).map(|i| (i % 251) as u8).collect();
		let message = NdefMessage::single(NdefRecord::opaque(payload.clone()));
		session.write(&tag, &message).await.unwrap();

		let stored = reader.stored_message().unwrap();
		assert_eq!(stored.records.len(), 1);
		assert_eq!(stored.records[0].payload, payload);
	}

	#[tokio::test]
	async fn oversized_message_is_rejected() {
		let (reader, mut session) = open(MemoryTagConfig::ntag215());
		let tag = session.next_discovery().await.unwrap().single().unwrap();
		session.connect(&tag).await.unwrap();

		let before = reader.memory_image();
		let message = NdefMessage::single(NdefRecord::opaque(vec![0u8; 540]));
		let err = session.write(&tag, &message).await.unwrap_err();

		assert!(matches!(err, Error::WriteFailed(ref msg) if msg.contains("546 bytes")));
		assert_eq!(reader.memory_image(), before);
	}

	#[tokio::test]
	async fn read_only_tag_reports_read_only() {
		let (_reader, mut session) = open(MemoryTagConfig::ntag216().read_only(true));
		let tag = session.next_discovery().await.unwrap().single().unwrap();
		session.connect(&tag).await.unwrap();

		let status = session.query_writability(&tag).await.unwrap();
		assert_eq!(status.status, NdefStatus::ReadOnly);
	}

	#[tokio::test]
	async fn collisions_clear_after_restarts() {
		let (_reader, mut session) = open(MemoryTagConfig::ntag216().with_collisions(2));

		let first = session.next_discovery().await.unwrap();
		assert_eq!(first.len(), 2);
		session.restart_polling();
		assert_eq!(session.next_discovery().await.unwrap().len(), 2);
		session.restart_polling();
		assert_eq!(session.next_discovery().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn query_before_connect_fails() {
		let (_reader, mut session) = open(MemoryTagConfig::ntag213());
		let tag = session.next_discovery().await.unwrap().single().unwrap();

		let err = session.query_writability(&tag).await.unwrap_err();
		assert!(matches!(err, Error::ConnectionFailed(_)));
	}

	#[tokio::test]
	async fn reader_is_free_after_session_ends() {
		let reader = Arc::new(MemoryReader::new(MemoryTagConfig::default()));
		let config = SessionConfig::default();

		let mut first = TransportSession::begin(reader.clone(), &config).unwrap();
		assert!(matches!(TransportSession::begin(reader.clone(), &config), Err(Error::Busy)));
		first.invalidate(None);
		assert!(TransportSession::begin(reader, &config).is_ok());
	}
}
