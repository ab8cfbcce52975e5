use std::sync::Arc;

use flare_common::AuthConfig;

use crate::metrics::Metrics;
use crate::runtime::SessionRuntime;

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<dyn SessionRuntime>,
    pub auth: AuthConfig,
    pub metrics: Arc<Metrics>,
}

impl AsRef<AuthConfig> for AppState {
    fn as_ref(&self) -> &AuthConfig {
        &self.auth
    }
}
