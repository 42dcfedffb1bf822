use std::fmt::{self, Display};

use warp::{http::StatusCode, reject::Rejection};

use crate::validation::ValidationError;

/// Error returned to HTTP clients. `field` names the payload field the message
/// belongs to; without one the message is reported as `detail`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
    pub field: Option<&'static str>,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn message(&self) -> String {
        self.info.to_owned().unwrap_or_else(|| {
            self.status()
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_owned()
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code)
    }
}

impl std::error::Error for Error {}

impl warp::reject::Reject for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    InvalidSession,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalServerError,
}

impl HtmlError {
    pub fn code(&self) -> u16 {
        match self {
            HtmlError::InvalidRequest => 400,
            HtmlError::InvalidSession => 401,
            HtmlError::Unauthorized => 401,
            HtmlError::Forbidden => 403,
            HtmlError::NotFound => 404,
            HtmlError::InternalServerError => 500,
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_owned()),
            field: None,
        }
    }

    pub fn default(self) -> Error {
        let info = match self {
            HtmlError::InvalidRequest => "Invalid request",
            HtmlError::InvalidSession => "Invalid session",
            HtmlError::Unauthorized => "Authentication credentials were not provided",
            HtmlError::Forbidden => "You don't have permission to perform this action",
            HtmlError::NotFound => "Not found",
            HtmlError::InternalServerError => "Internal server error",
        };
        self.new(info)
    }
}

impl From<ValidationError> for Error {
    fn from(value: ValidationError) -> Self {
        log::debug!("Rejected payload: {value}");
        Error {
            code: 400,
            info: Some(value.to_string()),
            field: Some(value.field()),
        }
    }
}

#[derive(Debug)]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}

impl std::error::Error for QueryError {}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(format!("Unknown error")),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for QueryError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        Self::new(format!("Migration failed: {value}"))
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        log::error!("Storage error: {}", value.info);
        HtmlError::InternalServerError.default()
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

impl From<TypeError> for Rejection {
    fn from(value: TypeError) -> Self {
        Error::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_become_bad_requests_with_a_field() {
        let error: Error = ValidationError::DuplicateTag.into();

        assert_eq!(error.code, 400);
        assert_eq!(error.field, Some("tags"));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_errors_hide_their_details() {
        let error: Error = QueryError::from(sqlx::Error::PoolTimedOut).into();

        assert_eq!(error.code, 500);
        assert_eq!(error.message(), "Internal server error");
    }

    #[test]
    fn html_errors_carry_their_status() {
        assert_eq!(HtmlError::Forbidden.default().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            HtmlError::NotFound.new("No recipe exists with specified id").message(),
            "No recipe exists with specified id"
        );
    }

    #[test]
    fn errors_are_recoverable_from_rejections() {
        let rejection: Rejection = HtmlError::NotFound.new("Missing").into();
        let typed: Rejection = TypeError::new("Bad number").into();

        assert_eq!(rejection.find::<Error>().map(|e| e.code), Some(404));
        assert_eq!(
            typed.find::<Error>().map(Error::message),
            Some("Bad number".to_owned())
        );
    }
}
