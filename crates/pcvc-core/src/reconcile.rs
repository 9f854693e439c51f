//! Merging classified updates into the authoritative state.

use tracing::{debug, warn};

use crate::classify::{MasterPatch, UpdateCategory, UpdateKind, classify};
use crate::error::{Error, Result};
use crate::state::{DefaultDevice, DeviceId, FullState, ProtocolVersion};
use crate::update::{SessionPatch, UpdateDocument};

/// Lowest accepted volume level.
pub const VOLUME_MIN: f64 = 0.0;
/// Highest accepted volume level.
pub const VOLUME_MAX: f64 = 100.0;

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub category: UpdateCategory,
    /// Ids of the sessions touched by the update, in patch order
    pub changed_sessions: Vec<String>,
}

/// Validates updates against the negotiated version and merges them.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    version: ProtocolVersion,
}

impl Reconciler {
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    #[must_use]
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Validate, classify and merge `update` into `state` in place.
    ///
    /// Nothing is mutated unless the update is valid.
    ///
    /// # Errors
    /// Returns [`Error::VersionMismatch`] if the update carries another version,
    /// or [`Error::MalformedUpdate`] if it matches no recognized shape.
    pub fn apply(&self, state: &mut FullState, update: &UpdateDocument) -> Result<Reconciled> {
        self.version.check(update.version)?;
        let kind = classify(state, update);
        merge(state, kind)
    }
}

/// Merge an already classified update into `state`.
///
/// # Errors
/// Returns [`Error::MalformedUpdate`] for [`UpdateKind::Malformed`].
pub fn merge(state: &mut FullState, kind: UpdateKind) -> Result<Reconciled> {
    match kind {
        UpdateKind::Malformed(reason) => Err(Error::MalformedUpdate(reason)),

        UpdateKind::DeviceSwitch { device_id, name } => {
            switch_device(state, device_id, name);
            Ok(Reconciled { category: UpdateCategory::DeviceSwitch, changed_sessions: Vec::new() })
        }

        UpdateKind::MasterChange { master, .. } => {
            apply_master(&mut state.default_device, master);
            Ok(Reconciled { category: UpdateCategory::MasterChange, changed_sessions: Vec::new() })
        }

        UpdateKind::SessionChange { master, sessions, .. } => {
            apply_master(&mut state.default_device, master);
            let changed_sessions = apply_sessions(&mut state.default_device, &sessions);
            Ok(Reconciled { category: UpdateCategory::SessionChange, changed_sessions })
        }
    }
}

/// Clamp a volume into [`VOLUME_MIN`]..=[`VOLUME_MAX`].
#[must_use]
pub fn clamp_volume(volume: f64) -> f64 {
    let clamped = volume.clamp(VOLUME_MIN, VOLUME_MAX);
    if (clamped - volume).abs() > f64::EPSILON {
        warn!(volume, clamped, "Volume out of range, clamping");
    }
    clamped
}

fn switch_device(state: &mut FullState, device_id: DeviceId, name: Option<String>) {
    let known = state.device_name(device_id.as_str()).map(str::to_string);
    if known.is_none() {
        warn!(device_id = %device_id, "Switching to a device the host does not list");
    }

    let device = &mut state.default_device;
    device.name = name.or(known).unwrap_or_else(|| device_id.to_string());
    debug!(from = %device.device_id, to = %device_id, "Default device switched");
    device.device_id = device_id;
}

fn apply_master(device: &mut DefaultDevice, master: MasterPatch) {
    if let Some(volume) = master.volume {
        device.master_volume = clamp_volume(volume);
    }
    if let Some(muted) = master.muted {
        device.master_muted = muted;
    }
}

fn apply_sessions(device: &mut DefaultDevice, patches: &[SessionPatch]) -> Vec<String> {
    let mut changed = Vec::with_capacity(patches.len());

    for patch in patches {
        let mut found = false;
        for session in device.sessions.iter_mut().filter(|s| s.id == patch.id) {
            if let Some(volume) = patch.volume {
                session.volume = clamp_volume(volume);
            }
            if let Some(muted) = patch.muted {
                session.muted = muted;
            }
            found = true;
        }

        if found {
            changed.push(patch.id.clone());
        } else {
            warn!(session_id = %patch.id, name = ?patch.name, "Session not found, skipping patch");
        }
    }

    changed
}
