//! Reader session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prompt shown while waiting for a tag.
pub const DEFAULT_ALERT: &str = "Hold your device near the Amiibo tag to write";

/// Platform reader sessions end after 60 seconds.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings applied to every session a coordinator opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
	/// Deadline for the whole session, measured from `begin`.
	#[serde(rename = "discovery_timeout_ms", with = "duration_ms")]
	pub discovery_timeout: Duration,
	/// Prompt advertised when discovery starts.
	pub alert_message: String,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
			alert_message: DEFAULT_ALERT.to_string(),
		}
	}
}

impl SessionConfig {
	pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
		self.discovery_timeout = timeout;
		self
	}

	pub fn with_alert_message(mut self, message: impl Into<String>) -> Self {
		self.alert_message = message.into();
		self
	}
}

mod duration_ms {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
