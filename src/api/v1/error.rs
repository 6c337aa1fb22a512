use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(err) = err.find::<ApiErrorCode>() {
        let json = warp::reply::json(&ApiResponse::<()>::err(err.clone(), err.to_string()));
        Ok(warp::reply::with_status(json, err.status()))
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        // Malformed body never reaches service logic.
        let code = ApiErrorCode::InvalidRequest;
        let json = warp::reply::json(&ApiResponse::<()>::err(code, "Malformed request body"));
        Ok(warp::reply::with_status(json, StatusCode::BAD_REQUEST))
    } else if err.is_not_found() {
        let code = ApiErrorCode::NotFound;
        let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), code.to_string()));
        Ok(warp::reply::with_status(json, StatusCode::NOT_FOUND))
    } else {
        let json = warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ApiError {
                code: ApiErrorCode::InternalError,
                message: format!("Unhandled error: {:?}", err),
            }),
        });
        Ok(warp::reply::with_status(
            json,
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid request")]
    InvalidRequest,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Username or email is already taken")]
    UserTaken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Insufficient permissions")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiErrorCode::UserTaken => StatusCode::BAD_REQUEST,
            ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::UserExists => ApiErrorCode::UserTaken,
            AuthError::UserNotFound => ApiErrorCode::NotFound,
            AuthError::TokenInvalid | AuthError::TokenExpired => ApiErrorCode::InvalidToken,
            AuthError::InsufficientRole => ApiErrorCode::Forbidden,
            AuthError::Validation(_) => ApiErrorCode::InvalidRequest,
            AuthError::Store(e) | AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<MessageError> for ApiErrorCode {
    fn from(error: MessageError) -> Self {
        match error {
            MessageError::NotFound => ApiErrorCode::NotFound,
            MessageError::NotParticipant => ApiErrorCode::Forbidden,
            MessageError::Validation(_) => ApiErrorCode::InvalidRequest,
            MessageError::Store(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<NotificationError> for ApiErrorCode {
    fn from(error: NotificationError) -> Self {
        match error {
            NotificationError::PostNotFound
            | NotificationError::UserNotFound
            | NotificationError::NotFound => ApiErrorCode::NotFound,
            NotificationError::Store(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<PostError> for ApiErrorCode {
    fn from(error: PostError) -> Self {
        match error {
            PostError::NotFound => ApiErrorCode::NotFound,
            PostError::Validation(_) => ApiErrorCode::InvalidRequest,
            PostError::Store(e) => ApiErrorCode::internal(e),
        }
    }
}
