//! Client-side interceptor attaching the shared API key

use super::api_key::API_KEY_HEADER;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::{Request, Status};

/// Adds `x-api-key` to every outgoing call when a key is configured.
#[derive(Clone, Default)]
pub struct ClientKeyInterceptor {
    key: Option<MetadataValue<Ascii>>,
}

impl ClientKeyInterceptor {
    pub fn new(api_key: Option<&str>) -> anyhow::Result<Self> {
        let key = match api_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(k) => Some(
                MetadataValue::try_from(k)
                    .map_err(|_| anyhow::anyhow!("GRPC_CLIENT_API_KEY is not valid ASCII metadata"))?,
            ),
            None => None,
        };
        Ok(Self { key })
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl tonic::service::Interceptor for ClientKeyInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(key) = &self.key {
            request.metadata_mut().insert(API_KEY_HEADER, key.clone());
        }
        Ok(request)
    }
}
