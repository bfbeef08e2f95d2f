//! tagwrite runtime - reader backends and session lifecycle
//!
//! This crate owns everything between the write coordinator and the NFC
//! hardware:
//!
//! - **Reader**: the backend trait for polling and tag I/O
//! - **Session**: one exclusive discovery/communication session with a reader
//! - **Errors**: the closed error taxonomy shared with the coordinator
//! - **Backends**: a scripted fake for tests and a simulated Type 2 tag
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ WriteCoordinator │  state machine (tagwrite crate)
//! └────────┬─────────┘
//!          │ begin / next_discovery / connect / query / write / invalidate
//! ┌────────▼─────────┐
//! │ TransportSession │  deadline, invalidation racing, tag scoping
//! └────────┬─────────┘
//!          │ Reader trait + ReaderEvent channel
//! ┌────────▼─────────┐
//! │  Reader backend  │  FakeReader, MemoryReader, hardware
//! └──────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod fake;
pub mod memory;
pub mod reader;
pub mod session;

pub use config::SessionConfig;
pub use error::{Error, ErrorKind, InvalidationReason, Result};
pub use fake::{FakeReader, FakeReaderBuilder, FakeReaderController, ReaderCall};
pub use memory::{MemoryReader, MemoryTagConfig};
pub use reader::{EventSender, Reader, ReaderEvent, ReaderFuture, SessionId, TagHandle};
pub use session::{DiscoveredTags, TransportSession};
