//! gRPC services, clients' shared conversions and interceptors

pub mod auth;
pub mod interceptor;
pub mod users;

pub use auth::AuthGrpcService;
pub use interceptor::{ApiKeyAuthenticator, AuthContext, AuthInterceptor, ClientKeyInterceptor};
pub use users::UsersGrpcService;

use crate::context::Deadline;
use crate::domain::{StringUuid, User};
use crate::error::{AppError, Result};
use metrics::{counter, histogram};
use std::time::Instant;
use tonic::{Code, Status};

// Include generated protobuf code
pub mod proto {
    pub mod users {
        tonic::include_proto!("users");
    }

    pub mod auth {
        tonic::include_proto!("auth");
    }
}

/// Parse an id carried as a string on the wire.
pub(crate) fn parse_id(raw: &str) -> Result<StringUuid> {
    raw.parse::<StringUuid>()
        .map_err(|_| AppError::InvalidArgument(format!("Invalid user id: {:?}", raw)))
}

/// An empty id on the wire means "not assigned yet".
fn parse_optional_id(raw: &str) -> Result<StringUuid> {
    if raw.is_empty() {
        Ok(StringUuid::nil())
    } else {
        parse_id(raw)
    }
}

fn wire_id(id: StringUuid) -> String {
    if id.is_nil() {
        String::new()
    } else {
        id.to_string()
    }
}

/// Translate a failed client call into the taxonomy.
///
/// A server-side timeout surfaces as `CANCELLED`; when our own deadline has
/// passed it is reported as `DeadlineExceeded`.
pub(crate) fn from_status(status: Status, deadline: Deadline, op: &'static str) -> AppError {
    if status.code() == Code::Cancelled && deadline.is_expired() {
        return AppError::DeadlineExceeded(format!("{}: {}", op, status.message()));
    }
    AppError::from(status).context(op)
}

/// Record the outcome of a served RPC.
pub(crate) fn observe<T>(
    service: &'static str,
    method: &'static str,
    started: Instant,
    result: &std::result::Result<T, Status>,
) {
    let code = match result {
        Ok(_) => Code::Ok,
        Err(status) => status.code(),
    };
    counter!(
        "identity_grpc_requests_total",
        "service" => service,
        "method" => method,
        "code" => format!("{:?}", code)
    )
    .increment(1);
    histogram!("identity_grpc_request_duration_seconds", "service" => service, "method" => method)
        .record(started.elapsed().as_secs_f64());
}

pub(crate) fn missing_user(op: &'static str) -> AppError {
    AppError::Internal(anyhow::anyhow!("{}: response carried no user", op))
}

impl From<User> for proto::users::User {
    fn from(user: User) -> Self {
        Self {
            id: wire_id(user.id),
            login: user.login,
            password: user.password,
            role: user.role,
        }
    }
}

impl TryFrom<proto::users::User> for User {
    type Error = AppError;

    fn try_from(user: proto::users::User) -> Result<Self> {
        Ok(User {
            id: parse_optional_id(&user.id)?,
            login: user.login,
            password: user.password,
            role: user.role,
        })
    }
}

impl From<User> for proto::auth::User {
    fn from(user: User) -> Self {
        Self {
            id: wire_id(user.id),
            login: user.login,
            password: user.password,
            role: user.role,
        }
    }
}

impl TryFrom<proto::auth::User> for User {
    type Error = AppError;

    fn try_from(user: proto::auth::User) -> Result<Self> {
        Ok(User {
            id: parse_optional_id(&user.id)?,
            login: user.login,
            password: user.password,
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_user_wire_conversion() {
        let user = User::new("alice", "p1", "user").with_id(StringUuid::new_v4());
        let wire: proto::users::User = user.clone().into();
        assert_eq!(wire.id, user.id.to_string());
        let back = User::try_from(wire).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_nil_id_travels_as_empty_string() {
        let wire: proto::auth::User = User::new("bob", "pw", "user").into();
        assert!(wire.id.is_empty());
        let back = User::try_from(wire).unwrap();
        assert!(back.id.is_nil());
    }

    #[test]
    fn test_malformed_wire_id_is_invalid_argument() {
        let wire = proto::users::User {
            id: "not-a-uuid".to_string(),
            login: "bob".to_string(),
            password: "pw".to_string(),
            role: "user".to_string(),
        };
        let err = User::try_from(wire).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(parse_id("").unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_cancelled_after_deadline_is_deadline_exceeded() {
        let err = from_status(Status::cancelled("Timeout expired"), Deadline::expired(), "get_users");
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);

        let err = from_status(Status::cancelled("client went away"), Deadline::none(), "get_users");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_from_status_keeps_kind() {
        let err = from_status(Status::not_found("User x not found"), Deadline::none(), "get_user_by_id");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("get_user_by_id"));
    }
}
