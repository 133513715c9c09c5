//! Server-side authentication trait and interceptor

use tonic::{Request, Status};

/// Authenticated caller, attached to request extensions
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Client identifier derived from the credential (never the raw key)
    pub client_id: String,
    pub auth_method: AuthMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    /// Authentication disabled
    None,
}

impl AuthContext {
    pub fn api_key(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            auth_method: AuthMethod::ApiKey,
        }
    }

    pub fn none() -> Self {
        Self {
            client_id: "anonymous".to_string(),
            auth_method: AuthMethod::None,
        }
    }
}

/// Authenticates a request from its metadata alone.
pub trait GrpcAuthenticator: Send + Sync {
    #[allow(clippy::result_large_err)]
    fn authenticate(&self, metadata: &tonic::metadata::MetadataMap) -> Result<AuthContext, Status>;

    fn name(&self) -> &'static str;
}

/// Authentication mode selected from configuration
#[derive(Clone)]
pub enum AuthenticatorMode {
    None,
    ApiKey(super::api_key::ApiKeyAuthenticator),
}

impl AuthenticatorMode {
    #[allow(clippy::result_large_err)]
    pub fn authenticate(
        &self,
        metadata: &tonic::metadata::MetadataMap,
    ) -> Result<AuthContext, Status> {
        match self {
            AuthenticatorMode::None => Ok(AuthContext::none()),
            AuthenticatorMode::ApiKey(auth) => auth.authenticate(metadata),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthenticatorMode::None => "none",
            AuthenticatorMode::ApiKey(auth) => auth.name(),
        }
    }
}

#[derive(Clone)]
pub struct AuthInterceptor {
    mode: AuthenticatorMode,
}

impl AuthInterceptor {
    pub fn new(mode: AuthenticatorMode) -> Self {
        Self { mode }
    }

    pub fn noop() -> Self {
        Self {
            mode: AuthenticatorMode::None,
        }
    }

    pub fn api_key(authenticator: super::api_key::ApiKeyAuthenticator) -> Self {
        Self {
            mode: AuthenticatorMode::ApiKey(authenticator),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        self.mode.name()
    }
}

impl tonic::service::Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let auth_context = self.mode.authenticate(request.metadata()).inspect_err(|status| {
            tracing::warn!(mode = self.mode.name(), reason = %status.message(), "Rejected gRPC call");
        })?;
        request.extensions_mut().insert(auth_context);
        Ok(request)
    }
}
