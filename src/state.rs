//! Gateway state abstraction
//!
//! Handlers and middleware are generic over `HasGateway`, so the production
//! wiring (gRPC upstreams, Redis) and the test wiring (in-memory fakes) drive
//! the same router.

use crate::cache::UserCache;
use crate::context::Deadline;
use crate::credential::CredentialIssuer;
use crate::directory::UserDirectory;
use crate::gateway::UserGateway;
use crate::jwt::TokenManager;
use std::time::Duration;

/// Per-process settings of the HTTP edge
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Budget given to every inbound request
    pub request_timeout: Duration,
    /// Guard the user-management routes with an admin access token
    pub require_admin: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(5000),
            require_admin: false,
        }
    }
}

pub trait HasGateway: Clone + Send + Sync + 'static {
    type Directory: UserDirectory + 'static;
    type Cache: UserCache + 'static;
    type Credentials: CredentialIssuer + 'static;

    fn gateway(&self) -> &UserGateway<Self::Directory, Self::Cache, Self::Credentials>;

    fn settings(&self) -> &GatewaySettings;

    /// Verifier for bearer tokens. Only present when the admin guard is on.
    fn token_manager(&self) -> Option<&TokenManager>;

    /// Fresh deadline for an inbound request.
    fn deadline(&self) -> Deadline {
        Deadline::after(self.settings().request_timeout)
    }
}
