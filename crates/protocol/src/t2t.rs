//! NFC Forum Type 2 tag memory structures.
//!
//! Type 2 tags (the NTAG21x family Amiibo figures use) are addressed in 4-byte
//! pages. Page 3 holds the capability container; the data area starts at
//! page 4 and stores the NDEF message inside an NDEF TLV followed by a
//! terminator TLV.

use serde::{Deserialize, Serialize};

use crate::ndef::DecodeError;
use crate::status::NdefStatus;

/// Bytes per page.
pub const PAGE_SIZE: usize = 4;
/// Page holding the capability container.
pub const CC_PAGE: usize = 3;
/// First page of the data area.
pub const DATA_PAGE: usize = 4;

const CC_MAGIC: u8 = 0xE1;
const TLV_NULL: u8 = 0x00;
const TLV_NDEF: u8 = 0x03;
const TLV_TERMINATOR: u8 = 0xFE;
const TLV_LONG_LENGTH: u8 = 0xFF;

/// Capability container stored in page 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityContainer {
	/// Mapping version, major in the high nibble.
	pub version: u8,
	/// Data area size in bytes (stored on the tag divided by 8).
	pub data_area_size: usize,
	/// Read access nibble, `0x0` grants read.
	pub read_access: u8,
	/// Write access nibble, `0x0` grants write, `0xF` denies it.
	pub write_access: u8,
}

impl CapabilityContainer {
	pub fn new(data_area_size: usize, writable: bool) -> Self {
		Self {
			version: 0x10,
			data_area_size,
			read_access: 0x0,
			write_access: if writable { 0x0 } else { 0xF },
		}
	}

	pub fn from_bytes(bytes: [u8; 4]) -> Result<Self, DecodeError> {
		if bytes[0] != CC_MAGIC {
			return Err(DecodeError::Malformed(format!("capability container magic is {:#04x}", bytes[0])));
		}
		Ok(Self {
			version: bytes[1],
			data_area_size: bytes[2] as usize * 8,
			read_access: bytes[3] >> 4,
			write_access: bytes[3] & 0x0F,
		})
	}

	pub fn to_bytes(self) -> [u8; 4] {
		let size = (self.data_area_size / 8).min(u8::MAX as usize) as u8;
		[CC_MAGIC, self.version, size, (self.read_access << 4) | (self.write_access & 0x0F)]
	}

	/// NDEF access granted by this container.
	pub fn status(&self) -> NdefStatus {
		match (self.read_access, self.write_access) {
			(0x0, 0x0) => NdefStatus::ReadWrite,
			(0x0, _) => NdefStatus::ReadOnly,
			_ => NdefStatus::NotSupported,
		}
	}

	/// Largest NDEF message that fits the data area, accounting for TLV overhead.
	pub fn max_message_len(&self) -> usize {
		max_message_len(self.data_area_size)
	}
}

/// Largest NDEF message a data area of `data_area_size` bytes can hold.
pub fn max_message_len(data_area_size: usize) -> usize {
	// tag + 1-byte length + terminator
	let short = data_area_size.saturating_sub(3);
	if short < TLV_LONG_LENGTH as usize {
		return short;
	}
	// tag + 3-byte length + terminator
	data_area_size.saturating_sub(5).min(u16::MAX as usize).max(TLV_LONG_LENGTH as usize - 1)
}

/// Wraps an encoded NDEF message in an NDEF TLV and appends the terminator.
pub fn wrap_ndef_tlv(message: &[u8]) -> Result<Vec<u8>, DecodeError> {
	let len = message.len();
	let mut out = Vec::with_capacity(len + 5);
	out.push(TLV_NDEF);
	if len < TLV_LONG_LENGTH as usize {
		out.push(len as u8);
	} else {
		let len = u16::try_from(len).map_err(|_| DecodeError::Malformed(format!("NDEF message of {len} bytes exceeds TLV limit")))?;
		out.push(TLV_LONG_LENGTH);
		out.extend_from_slice(&len.to_be_bytes());
	}
	out.extend_from_slice(message);
	out.push(TLV_TERMINATOR);
	Ok(out)
}

/// Finds the first NDEF TLV in a data area and returns its value.
pub fn find_ndef_tlv(data: &[u8]) -> Result<&[u8], DecodeError> {
	let mut offset = 0;
	while offset < data.len() {
		let tag = data[offset];
		match tag {
			TLV_NULL => {
				offset += 1;
				continue;
			}
			TLV_TERMINATOR => break,
			_ => {}
		}

		let (len, header) = match data.get(offset + 1) {
			Some(&TLV_LONG_LENGTH) => {
				let hi = data.get(offset + 2).copied();
				let lo = data.get(offset + 3).copied();
				match (hi, lo) {
					(Some(hi), Some(lo)) => (u16::from_be_bytes([hi, lo]) as usize, 4),
					_ => return Err(DecodeError::Malformed(format!("truncated TLV length at offset {offset}"))),
				}
			}
			Some(&len) => (len as usize, 2),
			None => return Err(DecodeError::Malformed(format!("truncated TLV at offset {offset}"))),
		};

		let start = offset + header;
		let end = start + len;
		if end > data.len() {
			return Err(DecodeError::Malformed(format!("TLV at offset {offset} overruns data area")));
		}
		if tag == TLV_NDEF {
			return Ok(&data[start..end]);
		}
		offset = end;
	}
	Err(DecodeError::Malformed("no NDEF TLV in data area".to_string()))
}
