//! Identity Hub
//!
//! User directory, credential issuance and an HTTP gateway with a cache-aside
//! tier. Each role runs as its own process; they talk gRPC to each other.

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod credential;
pub mod directory;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod grpc;
pub mod jwt;
pub mod middleware;
pub mod repository;
pub mod server;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
