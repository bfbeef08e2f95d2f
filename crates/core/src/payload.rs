//! Immutable payload bytes handed to a write.

use std::fmt;
use std::sync::Arc;

/// Raw bytes written verbatim as the record payload.
///
/// Cloning is cheap; the bytes are shared, never copied until the NDEF
/// record is built.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Payload(Arc<[u8]>);

impl Payload {
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl fmt::Debug for Payload {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Payload({} bytes)", self.0.len())
	}
}

impl AsRef<[u8]> for Payload {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

impl From<Vec<u8>> for Payload {
	fn from(bytes: Vec<u8>) -> Self {
		Self(bytes.into())
	}
}

impl From<&[u8]> for Payload {
	fn from(bytes: &[u8]) -> Self {
		Self(bytes.into())
	}
}

impl<const N: usize> From<[u8; N]> for Payload {
	fn from(bytes: [u8; N]) -> Self {
		Self(Arc::new(bytes))
	}
}

impl From<Arc<[u8]>> for Payload {
	fn from(bytes: Arc<[u8]>) -> Self {
		Self(bytes)
	}
}
