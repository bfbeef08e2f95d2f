//! NDEF message and record wire format.
//!
//! An NDEF message is a sequence of records. Each record starts with a header
//! byte followed by the length fields, the type, the optional id and the
//! payload:
//!
//! ```text
//! ┌────┬────┬────┬────┬────┬─────┐
//! │ MB │ ME │ CF │ SR │ IL │ TNF │  header (1 byte)
//! └────┴────┴────┴────┴────┴─────┘
//!   type length        (1 byte)
//!   payload length     (1 byte if SR, else 4 bytes big-endian)
//!   id length          (1 byte, only if IL)
//!   type | id | payload
//! ```
//!
//! # Main Types
//!
//! - [`NdefMessage`] - Ordered list of records, encodable to bytes
//! - [`NdefRecord`] - A single record with TNF, type, id and payload
//! - [`TypeNameFormat`] - The 3-bit TNF field

use serde::{Deserialize, Serialize};
use thiserror::Error;

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

/// Errors produced while decoding NDEF bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
	/// Input ended before the record was complete.
	#[error("truncated NDEF data: needed {needed} bytes at offset {offset}")]
	Truncated { offset: usize, needed: usize },

	/// Chunked records (CF flag) are not supported.
	#[error("chunked NDEF records are not supported (offset {0})")]
	Chunked(usize),

	/// First record lacks MB or a later record sets it.
	#[error("invalid message begin flag at offset {0}")]
	MessageBegin(usize),

	/// Message contained no records.
	#[error("empty NDEF message")]
	Empty,

	/// Type length exceeds the 255-byte field.
	#[error("record type is {0} bytes, maximum is 255")]
	TypeTooLong(usize),

	/// Id length exceeds the 255-byte field.
	#[error("record id is {0} bytes, maximum is 255")]
	IdTooLong(usize),

	/// TLV or container structure is malformed.
	#[error("malformed tag structure: {0}")]
	Malformed(String),
}

/// Type Name Format of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeNameFormat {
	Empty,
	WellKnown,
	Media,
	AbsoluteUri,
	External,
	/// Opaque payload with no type information.
	Unknown,
	Unchanged,
	Reserved,
}

impl TypeNameFormat {
	pub fn to_bits(self) -> u8 {
		match self {
			Self::Empty => 0x00,
			Self::WellKnown => 0x01,
			Self::Media => 0x02,
			Self::AbsoluteUri => 0x03,
			Self::External => 0x04,
			Self::Unknown => 0x05,
			Self::Unchanged => 0x06,
			Self::Reserved => 0x07,
		}
	}

	pub fn from_bits(bits: u8) -> Self {
		match bits & TNF_MASK {
			0x00 => Self::Empty,
			0x01 => Self::WellKnown,
			0x02 => Self::Media,
			0x03 => Self::AbsoluteUri,
			0x04 => Self::External,
			0x05 => Self::Unknown,
			0x06 => Self::Unchanged,
			_ => Self::Reserved,
		}
	}
}

/// A single NDEF record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NdefRecord {
	pub tnf: TypeNameFormat,
	#[serde(rename = "type")]
	pub record_type: Vec<u8>,
	pub id: Vec<u8>,
	pub payload: Vec<u8>,
}

impl NdefRecord {
	/// Record carrying `payload` verbatim with TNF Unknown and empty type and id.
	pub fn opaque(payload: impl Into<Vec<u8>>) -> Self {
		Self {
			tnf: TypeNameFormat::Unknown,
			record_type: Vec::new(),
			id: Vec::new(),
			payload: payload.into(),
		}
	}

	fn is_short(&self) -> bool {
		self.payload.len() <= u8::MAX as usize
	}

	/// Number of bytes this record occupies on the wire.
	pub fn encoded_len(&self) -> usize {
		let payload_len_field = if self.is_short() { 1 } else { 4 };
		let id_len_field = usize::from(!self.id.is_empty());
		2 + payload_len_field + id_len_field + self.record_type.len() + self.id.len() + self.payload.len()
	}

	fn encode_into(&self, out: &mut Vec<u8>, first: bool, last: bool) -> Result<(), DecodeError> {
		let type_len = u8::try_from(self.record_type.len()).map_err(|_| DecodeError::TypeTooLong(self.record_type.len()))?;
		let id_len = u8::try_from(self.id.len()).map_err(|_| DecodeError::IdTooLong(self.id.len()))?;

		let mut header = self.tnf.to_bits();
		if first {
			header |= FLAG_MB;
		}
		if last {
			header |= FLAG_ME;
		}
		if self.is_short() {
			header |= FLAG_SR;
		}
		if id_len > 0 {
			header |= FLAG_IL;
		}

		out.push(header);
		out.push(type_len);
		if self.is_short() {
			out.push(self.payload.len() as u8);
		} else {
			out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
		}
		if id_len > 0 {
			out.push(id_len);
		}
		out.extend_from_slice(&self.record_type);
		out.extend_from_slice(&self.id);
		out.extend_from_slice(&self.payload);
		Ok(())
	}
}

/// An NDEF message: one or more records written as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NdefMessage {
	pub records: Vec<NdefRecord>,
}

impl NdefMessage {
	pub fn new(records: Vec<NdefRecord>) -> Self {
		Self { records }
	}

	/// Message containing exactly one record.
	pub fn single(record: NdefRecord) -> Self {
		Self { records: vec![record] }
	}

	pub fn encoded_len(&self) -> usize {
		self.records.iter().map(NdefRecord::encoded_len).sum()
	}

	/// Serializes the message, setting MB on the first record and ME on the last.
	pub fn to_bytes(&self) -> Result<Vec<u8>, DecodeError> {
		if self.records.is_empty() {
			return Err(DecodeError::Empty);
		}

		let mut out = Vec::with_capacity(self.encoded_len());
		let last = self.records.len() - 1;
		for (index, record) in self.records.iter().enumerate() {
			record.encode_into(&mut out, index == 0, index == last)?;
		}
		Ok(out)
	}

	/// Parses a message, stopping at the record flagged ME.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
		let mut reader = Cursor { bytes, offset: 0 };
		let mut records = Vec::new();

		loop {
			let header_offset = reader.offset;
			let header = reader.byte()?;

			if header & FLAG_CF != 0 {
				return Err(DecodeError::Chunked(header_offset));
			}
			let begins = header & FLAG_MB != 0;
			if begins != records.is_empty() {
				return Err(DecodeError::MessageBegin(header_offset));
			}

			let type_len = reader.byte()? as usize;
			let payload_len = if header & FLAG_SR != 0 {
				reader.byte()? as usize
			} else {
				let raw = reader.take(4)?;
				u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
			};
			let id_len = if header & FLAG_IL != 0 { reader.byte()? as usize } else { 0 };

			records.push(NdefRecord {
				tnf: TypeNameFormat::from_bits(header),
				record_type: reader.take(type_len)?.to_vec(),
				id: reader.take(id_len)?.to_vec(),
				payload: reader.take(payload_len)?.to_vec(),
			});

			if header & FLAG_ME != 0 {
				return Ok(Self { records });
			}
		}
	}
}

struct Cursor<'a> {
	bytes: &'a [u8],
	offset: usize,
}

impl<'a> Cursor<'a> {
	fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
		let end = self.offset.checked_add(len).filter(|end| *end <= self.bytes.len()).ok_or(DecodeError::Truncated {
			offset: self.offset,
			needed: len,
		})?;
		let slice = &self.bytes[self.offset..end];
		self.offset = end;
		Ok(slice)
	}

	fn byte(&mut self) -> Result<u8, DecodeError> {
		Ok(self.take(1)?[0])
	}
}
