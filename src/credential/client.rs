//! Remote credential service reached over gRPC

use super::CredentialIssuer;
use crate::context::Deadline;
use crate::domain::{StringUuid, User};
use crate::error::Result;
use crate::grpc::interceptor::ClientKeyInterceptor;
use crate::grpc::proto::auth::{
    auth_client::AuthClient, IsAdminRequest, LoginRequest, RefreshRequest, RegisterRequest,
};
use crate::grpc::{from_status, missing_user};
use crate::jwt::TokenPair;
use async_trait::async_trait;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

type Client = AuthClient<InterceptedService<Channel, ClientKeyInterceptor>>;

/// [`CredentialIssuer`] backed by the auth service
#[derive(Clone)]
pub struct GrpcCredentialClient {
    client: Client,
}

impl GrpcCredentialClient {
    pub fn new(channel: Channel, interceptor: ClientKeyInterceptor) -> Self {
        Self {
            client: AuthClient::with_interceptor(channel, interceptor),
        }
    }

    pub fn connect_lazy(url: &str, interceptor: ClientKeyInterceptor) -> anyhow::Result<Self> {
        let channel = Endpoint::from_shared(url.to_string())?.connect_lazy();
        Ok(Self::new(channel, interceptor))
    }

    fn request<T>(deadline: Deadline, message: T) -> Request<T> {
        let mut request = Request::new(message);
        deadline.apply(&mut request);
        request
    }
}

#[async_trait]
impl CredentialIssuer for GrpcCredentialClient {
    async fn login(&self, deadline: Deadline, login: &str, password: &str) -> Result<TokenPair> {
        deadline.check("login")?;
        let request = Self::request(
            deadline,
            LoginRequest {
                login: login.to_string(),
                password: password.to_string(),
            },
        );
        let response = self
            .client
            .clone()
            .login(request)
            .await
            .map_err(|s| from_status(s, deadline, "login"))?
            .into_inner();

        Ok(TokenPair {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
        })
    }

    async fn register(&self, deadline: Deadline, user: User) -> Result<User> {
        deadline.check("register")?;
        let request = Self::request(
            deadline,
            RegisterRequest {
                user: Some(user.into()),
            },
        );
        let user = self
            .client
            .clone()
            .register(request)
            .await
            .map_err(|s| from_status(s, deadline, "register"))?
            .into_inner()
            .user
            .ok_or_else(|| missing_user("register"))?;

        User::try_from(user)
    }

    async fn is_admin(&self, deadline: Deadline, id: StringUuid) -> Result<bool> {
        deadline.check("is_admin")?;
        let request = Self::request(
            deadline,
            IsAdminRequest {
                user_id: id.to_string(),
            },
        );
        let response = self
            .client
            .clone()
            .is_admin(request)
            .await
            .map_err(|s| from_status(s, deadline, "is_admin"))?;

        Ok(response.into_inner().is_admin)
    }

    async fn refresh(&self, deadline: Deadline, refresh_token: &str) -> Result<TokenPair> {
        deadline.check("refresh")?;
        let request = Self::request(
            deadline,
            RefreshRequest {
                refresh_token: refresh_token.to_string(),
            },
        );
        let response = self
            .client
            .clone()
            .refresh(request)
            .await
            .map_err(|s| from_status(s, deadline, "refresh"))?
            .into_inner();

        Ok(TokenPair {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_expired_deadline_short_circuits() {
        let client =
            GrpcCredentialClient::connect_lazy("http://127.0.0.1:1", ClientKeyInterceptor::none())
                .unwrap();

        let err = client
            .login(Deadline::expired(), "alice", "p1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);

        let err = client
            .is_admin(Deadline::expired(), StringUuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }
}
