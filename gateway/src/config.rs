//! Gateway configuration from environment and CLI.

use serde::Serialize;
use std::env;

/// Default port appended to a host-only pub/sub address.
pub const DEFAULT_BROKER_PORT: u16 = 6379;

/// Environment variable naming the object store endpoint.
pub const STORE_URL_VAR: &str = "TESSERA_STORE_URL";

/// Environment variable naming the pub/sub endpoint.
pub const BROKER_ADDR_VAR: &str = "TESSERA_BROKER_ADDR";

/// Endpoints for the fabric's external collaborators.
///
/// Dialing belongs to deployment-specific backend crates; the gateway only
/// carries and normalizes the endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoints {
    pub store_url: Option<String>,
    pub broker_addr: Option<String>,
}

impl Endpoints {
    /// Reads endpoints from the environment. A host-only broker address gets
    /// the default port appended.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            store_url: env::var(STORE_URL_VAR).ok().filter(|s| !s.is_empty()),
            broker_addr: env::var(BROKER_ADDR_VAR)
                .ok()
                .filter(|s| !s.is_empty())
                .map(|addr| normalize_broker_addr(&addr)),
        }
    }
}

/// Appends the default port when the address names only a host.
#[must_use]
pub fn normalize_broker_addr(addr: &str) -> String {
    if addr.contains(':') {
        addr.to_string()
    } else {
        format!("{addr}:{DEFAULT_BROKER_PORT}")
    }
}
