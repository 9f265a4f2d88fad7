use std::fmt;

use axum::async_trait;
use axum::body::HttpBody;
use axum::extract::{FromRequest, Path, Query, RequestParts};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Json};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::store::StoreError;

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: Some(format!("Invalid path: {}", path)),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

impl<V: Serialize> IntoResponse for Success<V> {
    fn into_response(self) -> Response {
        Json::into_response(Json(self))
    }
}

/// Every failure a route can surface. The `error` tag is the stable,
/// machine-readable kind; `message` is for humans.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum Error {
    ValidationError {
        message: String,
    },
    Unauthorized {
        message: String,
    },
    AccessDenied {
        message: String,
    },
    NotFound {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Conflict {
        message: String,
    },
    InternalError {
        #[serde(skip)]
        kind: &'static str,
        #[serde(skip)]
        message: String,
    },
}

impl Error {
    pub fn validation<S: Into<String>>(msg: S) -> Error {
        Error::ValidationError {
            message: msg.into(),
        }
    }

    pub fn unauthorized<S: Into<String>>(msg: S) -> Error {
        Error::Unauthorized {
            message: msg.into(),
        }
    }

    pub fn access_denied<S: Into<String>>(msg: S) -> Error {
        Error::AccessDenied {
            message: msg.into(),
        }
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Error {
        Error::NotFound {
            message: Some(msg.into()),
        }
    }

    /// Not found without any detail about what was looked up.
    pub fn bare_not_found() -> Error {
        Error::NotFound { message: None }
    }

    pub fn conflict<S: Into<String>>(msg: S) -> Error {
        Error::Conflict {
            message: msg.into(),
        }
    }

    pub fn internal<S: Into<String>>(kind: &'static str, msg: S) -> Error {
        Error::InternalError {
            kind,
            message: msg.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::ValidationError { .. } => StatusCode::BAD_REQUEST,
            Error::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Error::AccessDenied { .. } => StatusCode::FORBIDDEN,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ValidationError { message }
            | Error::Unauthorized { message }
            | Error::AccessDenied { message }
            | Error::Conflict { message } => f.write_str(message),
            Error::NotFound { message } => f.write_str(message.as_deref().unwrap_or("not found")),
            Error::InternalError { kind, message } => write!(f, "{}: {}", kind, message),
        }
    }
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if let Error::InternalError { kind, message } = &self {
            log::error!("{}: {}", kind, message);
        }
        (self.status(), Json(self)).into_response()
    }
}

/// `Json` whose rejections come back as a `validation_error` instead of
/// axum's plain-text body. The deserializer's message is only logged.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for ApiJson<T>
where
    T: DeserializeOwned,
    B: HttpBody + Send,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                log::debug!("Rejected request body: {}", rejection);
                Err(Error::validation("Request body is not valid for this operation"))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for ApiQuery<T>
where
    T: DeserializeOwned,
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request(req).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => {
                log::debug!("Rejected query string: {}", rejection);
                Err(Error::validation("Query string is not valid for this operation"))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request(req).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => {
                log::debug!("Rejected path: {}", rejection);
                Err(Error::validation("Malformed identifier in path"))
            }
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Error::not_found("Record not found"),
            StoreError::Conflict(message) => Error::Conflict { message },
            StoreError::Backend(message) => Error::InternalError {
                kind: "DatabaseError",
                message,
            },
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "PasswordHashError",
            message: err.to_string(),
        }
    }
}
