//! Status reporting for write attempts.

use crate::state::WriteState;

/// Receives every state transition together with a user-facing message.
///
/// Called from the task driving the write, never while coordinator state is
/// locked. Any `Fn(&WriteState, &str) + Send + Sync` closure is a sink.
pub trait StatusSink: Send + Sync {
	fn update(&self, state: &WriteState, message: &str);
}

impl<F> StatusSink for F
where
	F: Fn(&WriteState, &str) + Send + Sync,
{
	fn update(&self, state: &WriteState, message: &str) {
		self(state, message)
	}
}

/// Discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StatusSink for NullSink {
	fn update(&self, _state: &WriteState, _message: &str) {}
}
