//! Scheme-based protocol dispatch.
//!
//! Routes `open` and `check` to the protocol registered under a URL's scheme.
//! URLs without a scheme go to the default protocol, if one is set.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::CachedFileConfig;
use crate::error::{CfError, CfResult};
use crate::protocol::{Protocol, UrlContext};
use crate::protocols::CachedFileProtocol;
use crate::types::{Access, OpenMode};
use crate::url::Url;

/// Table of protocols keyed by scheme.
pub struct ProtocolRegistry {
    protocols: RwLock<BTreeMap<String, Arc<dyn Protocol>>>,
    default: RwLock<Option<String>>,
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.names())
            .field("default", &*self.default.read())
            .finish()
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            protocols: RwLock::new(BTreeMap::new()),
            default: RwLock::new(None),
        }
    }

    /// Registry with the `cf` protocol installed as the default.
    pub fn with_defaults(config: CachedFileConfig) -> Self {
        let registry = Self::new();
        let protocol = CachedFileProtocol::new(config);
        tracing::debug!(buf_size = protocol.config().buf_size(), "installing default protocol");
        registry.register(protocol);
        registry.set_default(CachedFileProtocol::NAME);
        registry
    }

    /// Register a protocol under its own name.
    ///
    /// Returns the protocol it replaced, if any.
    pub fn register(&self, protocol: impl Protocol + 'static) -> Option<Arc<dyn Protocol>> {
        self.register_arc(Arc::new(protocol))
    }

    /// Register a protocol (already wrapped in Arc).
    pub fn register_arc(&self, protocol: Arc<dyn Protocol>) -> Option<Arc<dyn Protocol>> {
        let name = protocol.name().to_string();
        tracing::debug!(protocol = %name, "registered");
        self.protocols.write().insert(name, protocol)
    }

    /// Remove a protocol. Returns `true` if one was registered under `name`.
    pub fn unregister(&self, name: &str) -> bool {
        let mut default = self.default.write();
        if default.as_deref() == Some(name) {
            *default = None;
        }
        self.protocols.write().remove(name).is_some()
    }

    /// Route scheme-less URLs to `name`.
    pub fn set_default(&self, name: &str) {
        *self.default.write() = Some(name.to_string());
    }

    /// Names of all registered protocols, sorted.
    pub fn names(&self) -> Vec<String> {
        self.protocols.read().keys().cloned().collect()
    }

    /// Find the protocol responsible for `url`.
    pub fn find(&self, url: &str) -> CfResult<Arc<dyn Protocol>> {
        let scheme = match Url::parse(url).scheme {
            Some(scheme) => scheme.to_string(),
            None => self
                .default
                .read()
                .clone()
                .ok_or_else(|| CfError::unknown_protocol(url))?,
        };

        self.protocols
            .read()
            .get(&scheme)
            .cloned()
            .ok_or_else(|| CfError::unknown_protocol(scheme))
    }

    /// Open `url` through its protocol.
    pub fn open(&self, url: &str, mode: OpenMode) -> CfResult<Box<dyn UrlContext>> {
        self.find(url)?.open(url, mode)
    }

    /// Check access to `url` through its protocol.
    pub fn check(&self, url: &str, mask: Access) -> CfResult<Access> {
        self.find(url)?.check(url, mask)
    }
}
