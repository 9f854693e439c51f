//! Sparse update documents exchanged after the handshake.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::state::{DeviceId, ProtocolVersion};

/// A partial patch to the mixer state.
///
/// `defaultDevice` is sparse: it carries the routing `deviceId` plus only the
/// fields that changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocument {
    pub version: ProtocolVersion,
    pub default_device: DevicePatch,
}

/// Sparse view of the default device inside an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<SessionPatch>>,
    /// Keys outside the protocol, kept so the classifier can reject them
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Patch for one session, addressed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

impl DevicePatch {
    /// Names of the keys present in this patch, in wire spelling.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        if self.device_id.is_some() {
            keys.push("deviceId");
        }
        if self.name.is_some() {
            keys.push("name");
        }
        if self.master_volume.is_some() {
            keys.push("masterVolume");
        }
        if self.master_muted.is_some() {
            keys.push("masterMuted");
        }
        if self.sessions.is_some() {
            keys.push("sessions");
        }
        keys.extend(self.extra.keys().map(String::as_str));
        keys
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Whether either master-level field is present.
    #[must_use]
    pub fn has_master_fields(&self) -> bool {
        self.master_volume.is_some() || self.master_muted.is_some()
    }
}

impl UpdateDocument {
    /// Parse a decoded JSON message into an update, validating its envelope.
    ///
    /// # Errors
    /// Returns [`Error::VersionMismatch`] if the version differs from `expected`,
    /// or [`Error::MalformedUpdate`] if the version or `defaultDevice` is missing
    /// or any field has the wrong type.
    pub fn from_value(value: Value, expected: ProtocolVersion) -> Result<Self> {
        let found = ProtocolVersion::from_document(&value)
            .ok_or_else(|| Error::malformed("missing or invalid version"))?;
        expected.check(found)?;

        match value.get("defaultDevice") {
            Some(Value::Object(map)) if !map.is_empty() => reject_nulls(map)?,
            Some(Value::Object(_)) => return Err(Error::malformed("defaultDevice is empty")),
            Some(_) => return Err(Error::malformed("defaultDevice is not an object")),
            None => return Err(Error::malformed("defaultDevice missing")),
        }

        serde_json::from_value(value).map_err(|e| Error::malformed(e.to_string()))
    }

    /// Switch the host's default output device.
    #[must_use]
    pub fn device_switch(version: ProtocolVersion, device_id: DeviceId) -> Self {
        Self::routed(version, device_id, DevicePatch::default())
    }

    /// Set the master volume of the routed device.
    #[must_use]
    pub fn master_volume(version: ProtocolVersion, device_id: DeviceId, volume: f64) -> Self {
        Self::routed(
            version,
            device_id,
            DevicePatch { master_volume: Some(volume), ..DevicePatch::default() },
        )
    }

    /// Set the master mute state of the routed device.
    #[must_use]
    pub fn master_muted(version: ProtocolVersion, device_id: DeviceId, muted: bool) -> Self {
        Self::routed(
            version,
            device_id,
            DevicePatch { master_muted: Some(muted), ..DevicePatch::default() },
        )
    }

    /// Patch a list of sessions on the routed device.
    #[must_use]
    pub fn sessions(
        version: ProtocolVersion,
        device_id: DeviceId,
        sessions: Vec<SessionPatch>,
    ) -> Self {
        Self::routed(
            version,
            device_id,
            DevicePatch { sessions: Some(sessions), ..DevicePatch::default() },
        )
    }

    fn routed(version: ProtocolVersion, device_id: DeviceId, patch: DevicePatch) -> Self {
        Self { version, default_device: DevicePatch { device_id: Some(device_id), ..patch } }
    }
}

// A null would deserialize as an absent key and change the update's shape.
fn reject_nulls(device: &Map<String, Value>) -> Result<()> {
    if let Some(key) = device.iter().find_map(|(k, v)| v.is_null().then_some(k)) {
        return Err(Error::malformed(format!("defaultDevice.{key} is null")));
    }

    let sessions = device.get("sessions").and_then(Value::as_array).into_iter().flatten();
    for (index, session) in sessions.enumerate() {
        let Some(fields) = session.as_object() else { continue };
        if let Some(key) = fields.iter().find_map(|(k, v)| v.is_null().then_some(k)) {
            return Err(Error::malformed(format!("sessions[{index}].{key} is null")));
        }
    }

    Ok(())
}
