//! Internal gRPC authentication
//!
//! The Users and Auth servers accept calls only from peers presenting a shared
//! API key when `GRPC_AUTH_MODE=api_key`. Clients attach the key through
//! [`ClientKeyInterceptor`].

pub mod api_key;
pub mod auth;
pub mod client;

pub use api_key::{ApiKeyAuthenticator, API_KEY_HEADER};
pub use auth::{AuthContext, AuthInterceptor, AuthMethod, AuthenticatorMode, GrpcAuthenticator};
pub use client::ClientKeyInterceptor;
