use std::sync::Arc;

use hsm_discovery::DiscoverySvc;
use hsm_locks::LockEngine;
use hsm_scn::ScnEngine;
use hsm_store::HsmStore;
use hsm_vault::CredentialVault;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn HsmStore>,
    pub scn: Arc<ScnEngine>,
    pub locks: LockEngine,
    pub discovery: Arc<DiscoverySvc>,
    pub vault: Arc<dyn CredentialVault>,
}
