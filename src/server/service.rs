use std::time::Instant;

use metrics::{counter, histogram};
use tonic::{Request, Response, Status};
use tracing::error;

use crate::proto::auth_server::Auth;
use crate::proto::{
    DeleteAppRequest, DeleteAppResponse, LoginRequest, LoginResponse, RegisterAppRequest,
    RegisterAppResponse, RegisterRequest, RegisterResponse,
};
use crate::{AuthService, Error};

const MAX_EMAIL_LEN: usize = 254;
const MAX_PASSWORD_LEN: usize = 1024;
const MAX_ID_LEN: usize = 64;
const MAX_APP_NAME_LEN: usize = 256;
const MAX_SECRET_LEN: usize = 1024;

/// gRPC handler for the `auth.Auth` service.
///
/// Checks that required fields are present, calls [`AuthService`] and turns
/// its errors into status codes with fixed messages.
#[derive(Clone)]
pub struct AuthServiceImpl {
    auth: AuthService,
}

impl AuthServiceImpl {
    /// Creates a handler delegating to `auth`.
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    #[allow(clippy::result_large_err)]
    fn require(field: &str, value: &str, max_len: usize) -> Result<(), Status> {
        if value.is_empty() {
            return Err(Status::invalid_argument(format!("{field} is required")));
        }

        if value.len() > max_len {
            return Err(Status::invalid_argument(format!("{field} is too long")));
        }

        Ok(())
    }

    fn record<T>(rpc: &str, start: Instant, result: &Result<T, Status>) {
        histogram!(format!("auth.{rpc}.duration")).record(start.elapsed().as_secs_f64());

        if result.is_ok() {
            counter!(format!("auth.{rpc}.success")).increment(1);
        } else {
            counter!(format!("auth.{rpc}.failure")).increment(1);
        }
    }
}

/// Maps a service error onto a status. Internal causes are logged here and
/// replaced by `fallback`.
fn to_status(err: Error, fallback: &'static str) -> Status {
    match err {
        Error::InvalidInput(msg) => Status::invalid_argument(msg),
        Error::InvalidCredentials => Status::invalid_argument("invalid email or password"),
        Error::InvalidData => Status::invalid_argument("invalid data"),
        Error::AlreadyExists => Status::already_exists("user already exists"),
        Error::NotFound => Status::not_found("app not found"),
        Error::PermissionDenied => Status::permission_denied("permission denied"),
        err @ Error::Internal { .. } => {
            error!(error = ?err, "request failed");
            Status::internal(fallback)
        }
    }
}

#[tonic::async_trait]
impl Auth for AuthServiceImpl {
    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        let start = Instant::now();
        counter!("auth.login.requests").increment(1);

        let req = request.into_inner();

        Self::require("email", &req.email, MAX_EMAIL_LEN)?;
        Self::require("password", &req.password, MAX_PASSWORD_LEN)?;
        Self::require("app_id", &req.app_id, MAX_ID_LEN)?;

        let result = self
            .auth
            .login(&req.email, &req.password, &req.app_id)
            .await
            .map_err(|e| to_status(e, "failed to login"));

        Self::record("login", start, &result);

        Ok(Response::new(LoginResponse { token: result? }))
    }

    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let start = Instant::now();
        counter!("auth.register.requests").increment(1);

        let req = request.into_inner();

        Self::require("email", &req.email, MAX_EMAIL_LEN)?;
        Self::require("password", &req.password, MAX_PASSWORD_LEN)?;

        let result = self
            .auth
            .register_new_user(&req.email, &req.password)
            .await
            .map_err(|e| to_status(e, "failed to register new user"));

        Self::record("register", start, &result);

        Ok(Response::new(RegisterResponse { user_id: result? }))
    }

    async fn register_app(
        &self,
        request: Request<RegisterAppRequest>,
    ) -> Result<Response<RegisterAppResponse>, Status> {
        let start = Instant::now();
        counter!("auth.register_app.requests").increment(1);

        let req = request.into_inner();

        Self::require("name", &req.name, MAX_APP_NAME_LEN)?;
        Self::require("secret", &req.secret, MAX_SECRET_LEN)?;

        let result = self
            .auth
            .register_new_app(&req.name, &req.secret, &req.admin_key)
            .await
            .map_err(|e| to_status(e, "failed to register app"));

        Self::record("register_app", start, &result);

        Ok(Response::new(RegisterAppResponse { app_id: result? }))
    }

    async fn delete_app(
        &self,
        request: Request<DeleteAppRequest>,
    ) -> Result<Response<DeleteAppResponse>, Status> {
        let start = Instant::now();
        counter!("auth.delete_app.requests").increment(1);

        let req = request.into_inner();

        Self::require("app_id", &req.app_id, MAX_ID_LEN)?;

        let result = self
            .auth
            .delete_app(&req.app_id)
            .await
            .map_err(|e| to_status(e, "failed to delete app"));

        Self::record("delete_app", start, &result);

        result?;

        Ok(Response::new(DeleteAppResponse {}))
    }
}
