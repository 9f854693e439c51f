//! Canned mixer states for running without a real audio backend.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::state::{DefaultDevice, DeviceId, FullState, ProtocolVersion, Session};

const SPEAKERS: &str = "0f4090a9-dee2-4563-ba29-0ad6b93d9e22";
const HEADPHONES: &str = "c5a32106-264d-40b2-a2e0-74eda397454c";
const HEADSET: &str = "c98e4030-926b-4e62-8c83-1c529574cc51";

/// A plausible desktop mixer: three output devices, four sessions on the speakers.
#[must_use]
pub fn demo_state(version: ProtocolVersion) -> FullState {
    let device_ids = BTreeMap::from([
        (DeviceId::from(SPEAKERS), "Speakers (Realtek High Definition Audio)".to_string()),
        (DeviceId::from(HEADPHONES), "Headphones (Rift Audio)".to_string()),
        (DeviceId::from(HEADSET), "Headset (5- USB Audio Device)".to_string()),
    ]);

    let sessions = [
        ("OVRServer_x64", "Oculus\\Support\\oculus-runtime\\OVRServer_x64.exe", 77.0),
        ("Steam Client Bootstrapper", "Steam\\Steam.exe", 83.0),
        ("qemu-system-i386", "Android\\emulator\\qemu-system-i386.exe", 100.0),
        ("Google Chrome", "Google\\Chrome\\Application\\chrome.exe", 35.0),
    ]
    .into_iter()
    .map(|(name, exe, volume)| Session {
        name: name.to_string(),
        id: format!("{{0.0.0.00000000}}.{{{SPEAKERS}}}|\\Program Files\\{exe}"),
        volume,
        muted: false,
    })
    .collect();

    FullState {
        version,
        default_device: DefaultDevice {
            device_id: DeviceId::from(SPEAKERS),
            name: device_ids[SPEAKERS].clone(),
            master_volume: 80.0,
            master_muted: false,
            sessions,
        },
        device_ids,
    }
}

/// Load a seed state from a JSON file.
///
/// The file's `version` field is replaced by `version` so a seed captured
/// from one protocol revision can be served by another.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a full state.
pub fn load_seed(path: &Path, version: ProtocolVersion) -> Result<FullState> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| Error::SeedIo { path: path.to_path_buf(), source })?;
    let mut state: FullState =
        serde_json::from_str(&content).map_err(|e| Error::MalformedState(e.to_string()))?;
    state.version = version;
    info!(?path, sessions = state.default_device.sessions.len(), "Loaded seed state");
    Ok(state)
}
