//! Shared connection dependencies

use std::sync::Arc;

use lc_core::traits::Connector;
use lc_core::CredentialStore;
use lc_protocol::Origin;

/// Everything a transport needs to open sockets
///
/// Passed in at construction so handlers always see the current
/// collaborators instead of capturing them ad hoc.
#[derive(Clone)]
pub struct ConnectionContext {
    /// Origin the socket URLs are derived from
    pub origin: Origin,
    /// Token source, consulted on every connect
    pub credentials: Arc<dyn CredentialStore>,
    /// Socket factory
    pub connector: Arc<dyn Connector>,
}

impl ConnectionContext {
    /// Bundle the connection dependencies
    pub fn new(
        origin: Origin,
        credentials: Arc<dyn CredentialStore>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            origin,
            credentials,
            connector,
        }
    }

    /// Current bearer token
    pub fn token(&self) -> Option<String> {
        self.credentials.token()
    }
}

impl std::fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
