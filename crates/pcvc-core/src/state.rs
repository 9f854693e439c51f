//! Synchronized mixer state: devices, the default device and its sessions.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Protocol version negotiated at handshake.
///
/// Every message on a connection must carry the same version; it is injected
/// into the reconciler, server and client rather than read from a global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(pub u32);

impl ProtocolVersion {
    /// The version this build speaks.
    pub const CURRENT: Self = Self(6);

    /// Read the `version` field of an untyped document.
    ///
    /// Returns `None` when the field is absent or not an unsigned 32-bit integer.
    #[must_use]
    pub fn from_document(value: &Value) -> Option<Self> {
        value
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .map(Self)
    }

    /// Fail with [`Error::VersionMismatch`] unless `found` equals `self`.
    ///
    /// # Errors
    /// Returns an error if the versions differ.
    pub fn check(self, found: Self) -> Result<()> {
        if self == found {
            Ok(())
        } else {
            Err(Error::VersionMismatch { expected: self, found })
        }
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of an audio output device. Compared by exact match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One application's audio stream on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Display name; not unique
    pub name: String,
    /// Identifier, unique within the device's session list
    pub id: String,
    /// Volume level (0.0 - 100.0)
    pub volume: f64,
    /// Muted state
    pub muted: bool,
}

/// The active output device and its mixer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultDevice {
    pub device_id: DeviceId,
    pub name: String,
    pub master_volume: f64,
    pub master_muted: bool,
    /// Sessions in host discovery order
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl DefaultDevice {
    /// Find a session by its exact id.
    #[must_use]
    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }
}

/// Complete snapshot of the host mixer, sent on handshake and after each update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullState {
    pub version: ProtocolVersion,
    /// All devices known to the host, id to display name
    #[serde(default)]
    pub device_ids: BTreeMap<DeviceId, String>,
    pub default_device: DefaultDevice,
}

impl FullState {
    /// Decode a full state received from the wire.
    ///
    /// The version is checked before the rest of the document so that a peer
    /// speaking another protocol revision reports a mismatch rather than a
    /// shape error.
    ///
    /// # Errors
    /// Returns [`Error::VersionMismatch`] if the version differs from `expected`,
    /// or [`Error::MalformedState`] if the document is not a full state.
    pub fn from_value(value: Value, expected: ProtocolVersion) -> Result<Self> {
        let found = ProtocolVersion::from_document(&value)
            .ok_or_else(|| Error::MalformedState("missing or invalid version".to_string()))?;
        expected.check(found)?;
        serde_json::from_value(value).map_err(|e| Error::MalformedState(e.to_string()))
    }

    /// Display name of a known device.
    #[must_use]
    pub fn device_name(&self, id: &str) -> Option<&str> {
        self.device_ids.get(id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn sample() -> Value {
        json!({
            "version": 6,
            "deviceIds": { "A": "Speakers", "B": "Headphones" },
            "defaultDevice": {
                "deviceId": "A",
                "name": "Speakers",
                "masterVolume": 80.0,
                "masterMuted": false,
                "sessions": [
                    { "name": "Chrome", "id": "s1", "volume": 35.0, "muted": false }
                ]
            }
        })
    }

    #[test]
    fn test_from_value_parses_camel_case_fields() {
        let state = FullState::from_value(sample(), ProtocolVersion(6)).unwrap();

        assert_eq!(state.default_device.device_id.as_str(), "A");
        assert_eq!(state.device_name("B"), Some("Headphones"));
        assert_eq!(state.default_device.session("s1").map(|s| s.volume), Some(35.0));
    }

    #[test]
    fn test_from_value_checks_version_first() {
        // A different revision may not even share the shape
        let err = FullState::from_value(json!({"version": 2}), ProtocolVersion(6)).unwrap_err();
        assert_matches!(
            err,
            Error::VersionMismatch { expected: ProtocolVersion(6), found: ProtocolVersion(2) }
        );
    }

    #[test]
    fn test_from_value_rejects_missing_version() {
        let mut doc = sample();
        doc.as_object_mut().unwrap().remove("version");

        assert_matches!(FullState::from_value(doc, ProtocolVersion(6)), Err(Error::MalformedState(_)));
    }

    #[test]
    fn test_from_value_rejects_wrong_shape() {
        let doc = json!({"version": 6, "defaultDevice": {"deviceId": "A"}});

        assert_matches!(FullState::from_value(doc, ProtocolVersion(6)), Err(Error::MalformedState(_)));
    }

    #[test]
    fn test_serialize_round_trip_is_structurally_equal() {
        let state = FullState::from_value(sample(), ProtocolVersion(6)).unwrap();
        let encoded = serde_json::to_value(&state).unwrap();

        assert_eq!(encoded, sample());
    }

    #[test]
    fn test_version_from_document_rejects_non_integers() {
        assert_eq!(ProtocolVersion::from_document(&json!({"version": "6"})), None);
        assert_eq!(ProtocolVersion::from_document(&json!({"version": -1})), None);
        assert_eq!(ProtocolVersion::from_document(&json!({"version": 6})), Some(ProtocolVersion(6)));
    }
}
