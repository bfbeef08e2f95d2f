//! Wire types for writing NDEF data to NFC tags.
//!
//! - [`ndef`] - NDEF message/record encoding and decoding
//! - [`t2t`] - Type 2 tag capability container and TLV framing
//! - [`status`] - Write-capability query results

pub mod ndef;
pub mod status;
pub mod t2t;

pub use ndef::{DecodeError, NdefMessage, NdefRecord, TypeNameFormat};
pub use status::{NdefStatus, TagStatus};
pub use t2t::CapabilityContainer;
