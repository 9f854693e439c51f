//! Update classification and session targeting.
//!
//! Incoming documents are labelled once, at the boundary, into an [`UpdateKind`]
//! so the reconciler never probes raw JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::{DeviceId, FullState, Session};
use crate::update::{SessionPatch, UpdateDocument};

/// Category of a successfully classified update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateCategory {
    /// Default output device switched to another device
    DeviceSwitch,
    /// Master mute or volume changed on the default device
    MasterChange,
    /// Mute or volume changed on one or more sessions
    SessionChange,
}

impl fmt::Display for UpdateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DeviceSwitch => "device_switch",
            Self::MasterChange => "master_change",
            Self::SessionChange => "session_change",
        })
    }
}

/// Master-level fields carried by an update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MasterPatch {
    pub volume: Option<f64>,
    pub muted: Option<bool>,
}

/// A classified update, ready for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    DeviceSwitch { device_id: DeviceId, name: Option<String> },
    MasterChange { device_id: DeviceId, master: MasterPatch },
    /// Master fields sent alongside `sessions` are merged as well
    SessionChange { device_id: DeviceId, master: MasterPatch, sessions: Vec<SessionPatch> },
    /// The document matches no recognized shape
    Malformed(String),
}

impl UpdateKind {
    /// Category of this update, `None` if malformed.
    #[must_use]
    pub fn category(&self) -> Option<UpdateCategory> {
        match self {
            Self::DeviceSwitch { .. } => Some(UpdateCategory::DeviceSwitch),
            Self::MasterChange { .. } => Some(UpdateCategory::MasterChange),
            Self::SessionChange { .. } => Some(UpdateCategory::SessionChange),
            Self::Malformed(_) => None,
        }
    }

    /// Device a master or session change is routed to.
    #[must_use]
    pub fn routed_device(&self) -> Option<&DeviceId> {
        match self {
            Self::MasterChange { device_id, .. } | Self::SessionChange { device_id, .. } => {
                Some(device_id)
            }
            Self::DeviceSwitch { .. } | Self::Malformed(_) => None,
        }
    }
}

/// Determine what an update changes.
///
/// Master and session changes must be routed to the state's current default
/// device; a device switch may name any device.
#[must_use]
pub fn classify(state: &FullState, update: &UpdateDocument) -> UpdateKind {
    let kind = classify_shape(update);
    let current = &state.default_device.device_id;

    if let Some(device_id) = kind.routed_device()
        && device_id != current
    {
        return misrouted(device_id, current);
    }
    kind
}

/// Determine what an update changes from its keys alone, without checking
/// where it is routed.
#[must_use]
pub fn classify_shape(update: &UpdateDocument) -> UpdateKind {
    let patch = &update.default_device;

    if patch.is_empty() {
        return UpdateKind::Malformed("defaultDevice is empty".to_string());
    }
    let Some(device_id) = patch.device_id.clone() else {
        return UpdateKind::Malformed("deviceId missing".to_string());
    };
    if let Some(key) = patch.extra.keys().next() {
        return UpdateKind::Malformed(format!("unrecognized key `{key}` in defaultDevice"));
    }

    let master = MasterPatch { volume: patch.master_volume, muted: patch.master_muted };

    if let Some(sessions) = &patch.sessions {
        return UpdateKind::SessionChange { device_id, master, sessions: sessions.clone() };
    }

    if patch.has_master_fields() {
        return UpdateKind::MasterChange { device_id, master };
    }

    UpdateKind::DeviceSwitch { device_id, name: patch.name.clone() }
}

fn misrouted(device_id: &DeviceId, current: &DeviceId) -> UpdateKind {
    UpdateKind::Malformed(format!(
        "update routed to device {device_id} but default device is {current}"
    ))
}

/// Sessions whose name contains `query`, ignoring case.
///
/// All matches are returned in list order; an empty query matches everything.
#[must_use]
pub fn match_sessions<'a>(sessions: &'a [Session], query: &str) -> Vec<&'a Session> {
    let needle = query.to_lowercase();
    sessions.iter().filter(|s| s.name.to_lowercase().contains(&needle)).collect()
}

/// Patches flipping the mute state of every session matching `query`.
#[must_use]
pub fn mute_toggle_patches(sessions: &[Session], query: &str) -> Vec<SessionPatch> {
    match_sessions(sessions, query)
        .into_iter()
        .map(|s| SessionPatch {
            id: s.id.clone(),
            name: Some(s.name.clone()),
            volume: None,
            muted: Some(!s.muted),
        })
        .collect()
}

/// Patches setting the volume of every session matching `query`.
#[must_use]
pub fn volume_patches(sessions: &[Session], query: &str, volume: f64) -> Vec<SessionPatch> {
    match_sessions(sessions, query)
        .into_iter()
        .map(|s| SessionPatch {
            id: s.id.clone(),
            name: Some(s.name.clone()),
            volume: Some(volume),
            muted: None,
        })
        .collect()
}
