//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::db::RolePools;
use crate::services::auth::JwtKeys;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the role pools, token keys and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pools: RolePools,
    jwt: JwtKeys,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ApiConfig, pools: RolePools) -> Self {
        let jwt = JwtKeys::new(&config.jwt_secret);

        Self {
            inner: Arc::new(AppStateInner { config, pools, jwt }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the role-scoped pools.
    #[must_use]
    pub fn pools(&self) -> &RolePools {
        &self.inner.pools
    }

    /// Get a reference to the token keys.
    #[must_use]
    pub fn jwt(&self) -> &JwtKeys {
        &self.inner.jwt
    }
}
