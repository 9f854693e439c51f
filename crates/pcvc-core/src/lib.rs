//! PCVC Core - mixer state model, update classification and reconciliation.
//!
//! This crate holds the pure state-synchronization logic shared by the
//! protocol server and client. It performs no network I/O.

pub mod classify;
pub mod error;
pub mod provider;
pub mod reconcile;
pub mod seed;
pub mod state;
pub mod update;

pub use classify::{MasterPatch, UpdateCategory, UpdateKind, classify, classify_shape, match_sessions};
pub use error::{Error, Result};
pub use provider::{MemoryMixer, StateProvider};
pub use reconcile::{Reconciled, Reconciler};
pub use state::{DefaultDevice, DeviceId, FullState, ProtocolVersion, Session};
pub use update::{DevicePatch, SessionPatch, UpdateDocument};
