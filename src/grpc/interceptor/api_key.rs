//! API key authentication for internal gRPC traffic
//!
//! Validates requests using an API key passed in the `x-api-key` header.

use super::auth::{AuthContext, GrpcAuthenticator};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tonic::Status;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Checks `x-api-key` against the configured keys. Only SHA-256 hashes of the
/// keys are held in memory.
#[derive(Clone)]
pub struct ApiKeyAuthenticator {
    valid_key_hashes: HashSet<String>,
}

impl ApiKeyAuthenticator {
    pub fn new(api_keys: Vec<String>) -> Self {
        let valid_key_hashes = api_keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(|k| Self::hash_key(&k))
            .collect();

        Self { valid_key_hashes }
    }

    fn hash_key(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn validate_key(&self, key: &str) -> bool {
        self.valid_key_hashes.contains(&Self::hash_key(key))
    }

    pub fn has_keys(&self) -> bool {
        !self.valid_key_hashes.is_empty()
    }
}

impl GrpcAuthenticator for ApiKeyAuthenticator {
    fn authenticate(&self, metadata: &tonic::metadata::MetadataMap) -> Result<AuthContext, Status> {
        let api_key = metadata
            .get(API_KEY_HEADER)
            .ok_or_else(|| Status::unauthenticated("Missing API key. Provide 'x-api-key' header."))?
            .to_str()
            .map_err(|_| Status::unauthenticated("Invalid API key format"))?;

        if !self.validate_key(api_key) {
            return Err(Status::unauthenticated("Invalid API key"));
        }

        // First 8 hex chars of the hash identify the caller in logs
        let key_hash = Self::hash_key(api_key);
        Ok(AuthContext::api_key(format!("apikey:{}", &key_hash[..8])))
    }

    fn name(&self) -> &'static str {
        "api_key"
    }
}
