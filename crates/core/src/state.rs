//! Write attempt states.

use std::fmt;

use serde::{Deserialize, Serialize};
use tagwrite_runtime::ErrorKind;

/// Where a write attempt currently stands.
///
/// `Succeeded` and `Failed` end the attempt; the next `write()` starts over
/// from `Discovering`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum WriteState {
	#[default]
	Idle,
	Discovering,
	Validating,
	Connecting,
	QueryingStatus,
	Writing,
	Succeeded,
	Failed(ErrorKind),
}

impl WriteState {
	/// True while a session is open and the completion has not fired.
	pub fn is_in_flight(self) -> bool {
		matches!(
			self,
			Self::Discovering | Self::Validating | Self::Connecting | Self::QueryingStatus | Self::Writing
		)
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Succeeded | Self::Failed(_))
	}

	/// State name without the failure kind.
	pub fn name(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Discovering => "discovering",
			Self::Validating => "validating",
			Self::Connecting => "connecting",
			Self::QueryingStatus => "querying_status",
			Self::Writing => "writing",
			Self::Succeeded => "succeeded",
			Self::Failed(_) => "failed",
		}
	}
}

impl fmt::Display for WriteState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Failed(kind) => write!(f, "failed({kind})"),
			other => f.write_str(other.name()),
		}
	}
}
