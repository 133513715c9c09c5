//! `users.UsersManager` gRPC server

use super::{observe, parse_id};
use crate::context::Deadline;
use crate::directory::UserDirectory;
use crate::domain::User;
use crate::error::AppError;
use crate::grpc::proto::users::{
    users_manager_server::UsersManager, DeleteRequest, DeleteResponse, GetUserByIdRequest,
    GetUserByIdResponse, GetUserByLoginRequest, GetUserByLoginResponse, GetUsersRequest,
    GetUsersResponse, InsertRequest, InsertResponse, UpdateRequest, UpdateResponse,
};
use std::sync::Arc;
use std::time::Instant;
use tonic::{Request, Response, Status};

const SERVICE: &str = "UsersManager";

fn required_user(user: Option<crate::grpc::proto::users::User>) -> Result<User, AppError> {
    let user = user.ok_or_else(|| AppError::InvalidArgument("user is required".to_string()))?;
    User::try_from(user)
}

pub struct UsersGrpcService<D: UserDirectory> {
    directory: Arc<D>,
}

impl<D: UserDirectory> UsersGrpcService<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }
}

#[tonic::async_trait]
impl<D: UserDirectory + 'static> UsersManager for UsersGrpcService<D> {
    async fn get_users(
        &self,
        request: Request<GetUsersRequest>,
    ) -> Result<Response<GetUsersResponse>, Status> {
        let started = Instant::now();
        let deadline = Deadline::from_metadata(request.metadata());

        let result = self
            .directory
            .get_users(deadline)
            .await
            .map(|users| {
                Response::new(GetUsersResponse {
                    users: users.into_iter().map(Into::into).collect(),
                })
            })
            .map_err(Status::from);

        observe(SERVICE, "GetUsers", started, &result);
        result
    }

    async fn get_user_by_id(
        &self,
        request: Request<GetUserByIdRequest>,
    ) -> Result<Response<GetUserByIdResponse>, Status> {
        let started = Instant::now();
        let deadline = Deadline::from_metadata(request.metadata());
        let req = request.into_inner();

        let result = async {
            let id = parse_id(&req.id)?;
            let user = self.directory.get_user_by_id(deadline, id).await?;
            Ok::<_, AppError>(Response::new(GetUserByIdResponse {
                user: Some(user.into()),
            }))
        }
        .await
        .map_err(Status::from);

        observe(SERVICE, "GetUserById", started, &result);
        result
    }

    async fn get_user_by_login(
        &self,
        request: Request<GetUserByLoginRequest>,
    ) -> Result<Response<GetUserByLoginResponse>, Status> {
        let started = Instant::now();
        let deadline = Deadline::from_metadata(request.metadata());
        let req = request.into_inner();

        let result = self
            .directory
            .get_user_by_login(deadline, &req.login)
            .await
            .map(|user| {
                Response::new(GetUserByLoginResponse {
                    user: Some(user.into()),
                })
            })
            .map_err(Status::from);

        observe(SERVICE, "GetUserByLogin", started, &result);
        result
    }

    async fn insert(
        &self,
        request: Request<InsertRequest>,
    ) -> Result<Response<InsertResponse>, Status> {
        let started = Instant::now();
        let deadline = Deadline::from_metadata(request.metadata());
        let req = request.into_inner();

        let result = async {
            let user = required_user(req.user)?;
            let created = self.directory.insert(deadline, user).await?;
            Ok::<_, AppError>(Response::new(InsertResponse {
                user: Some(created.into()),
            }))
        }
        .await
        .map_err(Status::from);

        observe(SERVICE, "Insert", started, &result);
        result
    }

    async fn update(
        &self,
        request: Request<UpdateRequest>,
    ) -> Result<Response<UpdateResponse>, Status> {
        let started = Instant::now();
        let deadline = Deadline::from_metadata(request.metadata());
        let req = request.into_inner();

        let result = async {
            let id = parse_id(&req.id)?;
            // The path id wins over whatever id the body carries.
            let user = required_user(req.user)?.with_id(id);
            let updated = self.directory.update(deadline, id, user).await?;
            Ok::<_, AppError>(Response::new(UpdateResponse {
                user: Some(updated.into()),
            }))
        }
        .await
        .map_err(Status::from);

        observe(SERVICE, "Update", started, &result);
        result
    }

    async fn delete(
        &self,
        request: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let started = Instant::now();
        let deadline = Deadline::from_metadata(request.metadata());
        let req = request.into_inner();

        let result = async {
            let id = parse_id(&req.id)?;
            let deleted = self.directory.delete(deadline, id).await?;
            Ok::<_, AppError>(Response::new(DeleteResponse {
                user: Some(deleted.into()),
            }))
        }
        .await
        .map_err(Status::from);

        observe(SERVICE, "Delete", started, &result);
        result
    }
}
