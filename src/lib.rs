pub mod config;
pub mod modules;
pub mod services;

use std::sync::Arc;

use config::Config;
use services::mirror::{MirrorError, ScopedStore};
use services::portal::PortalApi;
use services::publisher::StatePublisher;
use services::sync::engine::SyncEngine;
use services::sync::retry::PollPolicy;
use services::sync::timer::TimerController;

/// Wire the full runtime from configuration: file-backed mirror, publisher,
/// timer controller, engine.
pub fn create_engine(config: &Config, api: Arc<dyn PortalApi>) -> Result<SyncEngine, MirrorError> {
    let mirror = Arc::new(ScopedStore::open(&config.mirror_path)?);
    Ok(build_engine(api, mirror, config.poll_policy()))
}

/// Assembly seam shared by the binary and the tests.
pub fn build_engine(
    api: Arc<dyn PortalApi>,
    mirror: Arc<ScopedStore>,
    policy: PollPolicy,
) -> SyncEngine {
    let publisher = Arc::new(StatePublisher::new(Arc::clone(&mirror)));
    let timers = TimerController::new(policy.clone(), Arc::clone(&publisher));
    SyncEngine::new(api, mirror, publisher, timers, policy)
}
