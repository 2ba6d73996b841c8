//! Gateway state

use crate::dispatch::Dispatcher;
use crate::hub::Hub;
use ripple_common::{AppConfig, JwtService};
use std::sync::Arc;

/// Shared state of the gateway server
#[derive(Clone)]
pub struct GatewayState {
    hub: Arc<Hub>,
    dispatcher: Arc<Dispatcher>,
    jwt: Arc<JwtService>,
    config: Arc<AppConfig>,
}

impl GatewayState {
    #[must_use]
    pub fn new(
        hub: Arc<Hub>,
        dispatcher: Arc<Dispatcher>,
        jwt: Arc<JwtService>,
        config: AppConfig,
    ) -> Self {
        Self {
            hub,
            dispatcher,
            jwt,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    #[must_use]
    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}
