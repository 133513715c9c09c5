//! `auth.Auth` gRPC server

use super::{observe, parse_id};
use crate::context::Deadline;
use crate::credential::CredentialIssuer;
use crate::domain::User;
use crate::error::AppError;
use crate::grpc::proto::auth::{
    auth_server::Auth, IsAdminRequest, IsAdminResponse, LoginRequest, LoginResponse,
    RefreshRequest, RefreshResponse, RegisterRequest, RegisterResponse,
};
use std::sync::Arc;
use std::time::Instant;
use tonic::{Request, Response, Status};

const SERVICE: &str = "Auth";

pub struct AuthGrpcService<C: CredentialIssuer> {
    credentials: Arc<C>,
}

impl<C: CredentialIssuer> AuthGrpcService<C> {
    pub fn new(credentials: Arc<C>) -> Self {
        Self { credentials }
    }
}

#[tonic::async_trait]
impl<C: CredentialIssuer + 'static> Auth for AuthGrpcService<C> {
    async fn login(&self, request: Request<LoginRequest>) -> Result<Response<LoginResponse>, Status> {
        let started = Instant::now();
        let deadline = Deadline::from_metadata(request.metadata());
        let req = request.into_inner();

        let result = self
            .credentials
            .login(deadline, &req.login, &req.password)
            .await
            .map(|pair| {
                Response::new(LoginResponse {
                    access_token: pair.access_token,
                    refresh_token: pair.refresh_token,
                    expires_in: pair.expires_in,
                })
            })
            .map_err(Status::from);

        observe(SERVICE, "Login", started, &result);
        result
    }

    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let started = Instant::now();
        let deadline = Deadline::from_metadata(request.metadata());
        let req = request.into_inner();

        let result = async {
            let user = req
                .user
                .ok_or_else(|| AppError::InvalidArgument("user is required".to_string()))?;
            let created = self
                .credentials
                .register(deadline, User::try_from(user)?)
                .await?;
            Ok::<_, AppError>(Response::new(RegisterResponse {
                user: Some(created.into()),
            }))
        }
        .await
        .map_err(Status::from);

        observe(SERVICE, "Register", started, &result);
        result
    }

    async fn is_admin(
        &self,
        request: Request<IsAdminRequest>,
    ) -> Result<Response<IsAdminResponse>, Status> {
        let started = Instant::now();
        let deadline = Deadline::from_metadata(request.metadata());
        let req = request.into_inner();

        let result = async {
            let id = parse_id(&req.user_id)?;
            let is_admin = self.credentials.is_admin(deadline, id).await?;
            Ok::<_, AppError>(Response::new(IsAdminResponse { is_admin }))
        }
        .await
        .map_err(Status::from);

        observe(SERVICE, "IsAdmin", started, &result);
        result
    }

    async fn refresh(
        &self,
        request: Request<RefreshRequest>,
    ) -> Result<Response<RefreshResponse>, Status> {
        let started = Instant::now();
        let deadline = Deadline::from_metadata(request.metadata());
        let req = request.into_inner();

        let result = self
            .credentials
            .refresh(deadline, &req.refresh_token)
            .await
            .map(|pair| {
                Response::new(RefreshResponse {
                    access_token: pair.access_token,
                    refresh_token: pair.refresh_token,
                    expires_in: pair.expires_in,
                })
            })
            .map_err(Status::from);

        observe(SERVICE, "Refresh", started, &result);
        result
    }
}
