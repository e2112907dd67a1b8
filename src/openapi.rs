use utoipa::OpenApi;

use crate::{
    error::{ErrorBody, FieldError},
    health::{HealthResponse, RootResponse},
    users::{
        dto::{CreateUserRequest, UpdateUserRequest, UserResponse},
        handlers,
    },
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "User Management API",
        description = "User management microservice backed by MongoDB"
    ),
    paths(
        crate::health::root,
        crate::health::health,
        handlers::create_user,
        handlers::list_users,
        handlers::get_user,
        handlers::update_user,
        handlers::delete_user,
    ),
    components(schemas(
        CreateUserRequest,
        UpdateUserRequest,
        UserResponse,
        ErrorBody,
        FieldError,
        HealthResponse,
        RootResponse,
    )),
    tags(
        (name = "users", description = "User CRUD"),
        (name = "meta", description = "Service metadata")
    )
)]
pub struct ApiDoc;
