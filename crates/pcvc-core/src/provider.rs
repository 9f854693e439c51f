//! The seam between the protocol and the host's audio mixer.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use crate::classify::classify_shape;
use crate::error::{Error, Result};
use crate::reconcile::merge;
use crate::state::{FullState, ProtocolVersion};
use crate::update::UpdateDocument;

/// Source of the authoritative mixer state.
///
/// A real backend reads the OS mixer and applies committed updates to it.
pub trait StateProvider: Send + Sync {
    /// Current state of the host mixer, used to seed each connection.
    fn full_state(&self) -> FullState;

    /// Apply a validated update to the host mixer and return its new state.
    ///
    /// # Errors
    /// Returns an error if the backend rejects the update.
    fn commit(&self, update: &UpdateDocument) -> Result<FullState>;
}

/// In-memory mixer used when no audio backend is available.
///
/// Connections validate updates against their own state before committing,
/// so commits are merged by shape alone. A master or session change for a
/// device that is no longer the default is logged and left out.
pub struct MemoryMixer {
    state: ArcSwap<FullState>,
    version: ProtocolVersion,
}

impl MemoryMixer {
    #[must_use]
    pub fn new(seed: FullState) -> Self {
        let version = seed.version;
        Self { state: ArcSwap::from_pointee(seed), version }
    }

    /// Borrow-free snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FullState> {
        self.state.load_full()
    }
}

impl StateProvider for MemoryMixer {
    fn full_state(&self) -> FullState {
        FullState::clone(&self.state.load())
    }

    fn commit(&self, update: &UpdateDocument) -> Result<FullState> {
        self.version.check(update.version)?;
        let kind = classify_shape(update);
        let mut result = Err(Error::malformed("update not applied"));

        self.state.rcu(|current| {
            let default = &current.default_device.device_id;
            if let Some(device_id) = kind.routed_device().filter(|id| *id != default) {
                warn!(%device_id, %default, "Update routed to a device that is no longer the default, skipping");
                result = Ok(FullState::clone(current));
                return Arc::clone(current);
            }

            let mut next = FullState::clone(current);
            match merge(&mut next, kind.clone()) {
                Ok(outcome) => {
                    debug!(category = %outcome.category, "Committed update to memory mixer");
                    result = Ok(next.clone());
                    Arc::new(next)
                }
                Err(e) => {
                    result = Err(e);
                    Arc::clone(current)
                }
            }
        });

        result
    }
}
