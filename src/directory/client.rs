//! Remote user directory reached over gRPC

use super::UserDirectory;
use crate::context::Deadline;
use crate::domain::{StringUuid, User};
use crate::error::Result;
use crate::grpc::interceptor::ClientKeyInterceptor;
use crate::grpc::proto::users::{
    users_manager_client::UsersManagerClient, DeleteRequest, GetUserByIdRequest,
    GetUserByLoginRequest, GetUsersRequest, InsertRequest, UpdateRequest,
};
use crate::grpc::{from_status, missing_user};
use async_trait::async_trait;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

type Client = UsersManagerClient<InterceptedService<Channel, ClientKeyInterceptor>>;

/// [`UserDirectory`] backed by the users service.
///
/// The channel is multiplexed and cheap to clone; each call clones the client.
#[derive(Clone)]
pub struct GrpcUserDirectory {
    client: Client,
}

impl GrpcUserDirectory {
    pub fn new(channel: Channel, interceptor: ClientKeyInterceptor) -> Self {
        Self {
            client: UsersManagerClient::with_interceptor(channel, interceptor),
        }
    }

    /// Build a client whose connection is established on first use.
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
impl UserDirectory for GrpcUserDirectory {
    async fn get_users(&self, deadline: Deadline) -> Result<Vec<User>> {
        deadline.check("get_users")?;
        let response = self
            .client
            .clone()
            .get_users(Self::request(deadline, GetUsersRequest {}))
            .await
            .map_err(|s| from_status(s, deadline, "get_users"))?;

        response
            .into_inner()
            .users
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn get_user_by_id(&self, deadline: Deadline, id: StringUuid) -> Result<User> {
        deadline.check("get_user_by_id")?;
        let request = Self::request(deadline, GetUserByIdRequest { id: id.to_string() });
        let response = self
            .client
            .clone()
            .get_user_by_id(request)
            .await
            .map_err(|s| from_status(s, deadline, "get_user_by_id"))?;

        let user = response
            .into_inner()
            .user
            .ok_or_else(|| missing_user("get_user_by_id"))?;
        User::try_from(user)
    }

    async fn get_user_by_login(&self, deadline: Deadline, login: &str) -> Result<User> {
        deadline.check("get_user_by_login")?;
        let request = Self::request(
            deadline,
            GetUserByLoginRequest {
                login: login.to_string(),
            },
        );
        let response = self
            .client
            .clone()
            .get_user_by_login(request)
            .await
            .map_err(|s| from_status(s, deadline, "get_user_by_login"))?;

        let user = response
            .into_inner()
            .user
            .ok_or_else(|| missing_user("get_user_by_login"))?;
        User::try_from(user)
    }

    async fn insert(&self, deadline: Deadline, user: User) -> Result<User> {
        deadline.check("insert")?;
        let request = Self::request(
            deadline,
            InsertRequest {
                user: Some(user.into()),
            },
        );
        let response = self
            .client
            .clone()
            .insert(request)
            .await
            .map_err(|s| from_status(s, deadline, "insert"))?;

        let user = response
            .into_inner()
            .user
            .ok_or_else(|| missing_user("insert"))?;
        User::try_from(user)
    }

    async fn update(&self, deadline: Deadline, id: StringUuid, user: User) -> Result<User> {
        deadline.check("update")?;
        let request = Self::request(
            deadline,
            UpdateRequest {
                id: id.to_string(),
                user: Some(user.into()),
            },
        );
        let response = self
            .client
            .clone()
            .update(request)
            .await
            .map_err(|s| from_status(s, deadline, "update"))?;

        let user = response
            .into_inner()
            .user
            .ok_or_else(|| missing_user("update"))?;
        User::try_from(user)
    }

    async fn delete(&self, deadline: Deadline, id: StringUuid) -> Result<User> {
        deadline.check("delete")?;
        let request = Self::request(deadline, DeleteRequest { id: id.to_string() });
        let response = self
            .client
            .clone()
            .delete(request)
            .await
            .map_err(|s| from_status(s, deadline, "delete"))?;

        let user = response
            .into_inner()
            .user
            .ok_or_else(|| missing_user("delete"))?;
        User::try_from(user)
    }
}
