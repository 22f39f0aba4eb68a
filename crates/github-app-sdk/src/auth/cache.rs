//! Expiry-aware installation token cache.
//!
//! Installation tokens are valid for roughly one hour; minting one costs two
//! round trips (assertion signing is local, the exchange is not). The cache
//! returns a token only while it is comfortably inside its validity window,
//! so callers never receive an expired or about-to-expire credential.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Duration;

use super::{InstallationId, InstallationToken};

/// Thread-safe in-memory cache of installation tokens keyed by installation.
pub struct InstallationTokenCache {
    tokens: RwLock<HashMap<InstallationId, InstallationToken>>,
    refresh_margin: Duration,
}

impl InstallationTokenCache {
    /// Create a cache with the given refresh margin.
    ///
    /// A cached token is served only when it expires no sooner than
    /// `refresh_margin` from now.
    pub fn new(refresh_margin: Duration) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            refresh_margin,
        }
    }

    /// Get a still-valid token for the installation, if one is cached.
    pub fn get(&self, installation_id: InstallationId) -> Option<InstallationToken> {
        let tokens = self.tokens.read().ok()?;
        let token = tokens.get(&installation_id)?;
        if token.expires_soon(self.refresh_margin) {
            None
        } else {
            Some(token.clone())
        }
    }

    /// Store a freshly minted token.
    pub fn store(&self, token: InstallationToken) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token.installation_id(), token);
        }
    }

    /// Drop the cached token for one installation.
    pub fn invalidate(&self, installation_id: InstallationId) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.remove(&installation_id);
        }
    }

    /// Evict every token that is expired or inside the refresh margin.
    pub fn evict_stale(&self) {
        let margin = self.refresh_margin;
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.retain(|_, token| !token.expires_soon(margin));
        }
    }
}

impl Default for InstallationTokenCache {
    fn default() -> Self {
        Self::new(Duration::minutes(5))
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
