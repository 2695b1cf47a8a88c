//! Store factory wiring configuration to the control-plane actor

use std::time::Duration;

use usagegate::MemoryStore;

use crate::actor::{ControlPlaneActor, ControlPlaneHandle};
use crate::config::Config;

/// Build the configured store and spawn the control-plane actor over it.
///
/// Returns a handle cloned into every transport; the actor behind it is the
/// single owner of all mutable state.
pub fn create_control_plane(config: &Config) -> ControlPlaneHandle {
    let store = MemoryStore::builder()
        .capacity(config.store.capacity)
        .initial_grant(config.store.initial_grant)
        .bucket_retention(Duration::from_secs(config.store.bucket_retention))
        .sweep_interval(Duration::from_secs(config.store.sweep_interval))
        .build();

    ControlPlaneActor::spawn(config.buffer_size, store, config.reward_day_offset_secs)
}
