//! Write opaque payloads onto NFC tags.
//!
//! [`WriteCoordinator`] discovers exactly one tag, checks that it accepts
//! NDEF writes, and writes the payload as a single record with an unknown
//! type name format. Readers plug in through [`tagwrite_runtime::Reader`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tagwrite::{MemoryReader, MemoryTagConfig, WriteCoordinator};
//!
//! let reader = Arc::new(MemoryReader::new(MemoryTagConfig::ntag216()));
//! let coordinator = WriteCoordinator::new(reader.clone())
//!     .with_status_sink(|state: &tagwrite::WriteState, message: &str| println!("[{state}] {message}"));
//!
//! coordinator.write_async(std::fs::read("figure.bin")?).await?;
//! ```

pub mod coordinator;
pub mod payload;
pub mod state;
pub mod status;

pub use coordinator::{Completion, MULTIPLE_TAGS_MESSAGE, SUCCESS_MESSAGE, WriteCoordinator, WriteOutcome};
pub use payload::Payload;
pub use state::WriteState;
pub use status::{NullSink, StatusSink};
pub use tagwrite_protocol::{NdefMessage, NdefRecord, NdefStatus, TagStatus, TypeNameFormat};
pub use tagwrite_runtime::{
	Error, ErrorKind, InvalidationReason, MemoryReader, MemoryTagConfig, Reader, Result, SessionConfig, TransportSession,
};
