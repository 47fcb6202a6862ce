use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use warp::{
    http::StatusCode,
    reject::Reject,
    reply::Response,
    Reply,
};

use crate::media::MediaError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Authentication(String),

    #[error("Not found.")]
    NotFound,

    #[error("Method not allowed.")]
    MethodNotAllowed,

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Media(MediaError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::default();
        errors.add(field, message);
        Self::Validation(errors)
    }

    pub fn unauthenticated() -> Self {
        Self::Authentication("Authentication credentials were not provided.".to_owned())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::InvalidCredentials => StatusCode::BAD_REQUEST,
            Error::Authentication(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::Query(_) | Error::Media(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Renders the error as the JSON body sent to clients. Internal failures
    /// are logged here and replaced by a generic message.
    pub fn to_response(&self) -> Response {
        let body = match self {
            Error::Validation(errors) => json!(errors),
            Error::InvalidCredentials => json!({ "error": self.to_string() }),
            Error::Query(_) | Error::Media(_) | Error::Internal(_) => {
                log::error!("{self}");
                json!({ "detail": "A server error occurred." })
            }
            _ => json!({ "detail": self.to_string() }),
        };

        warp::reply::with_status(warp::reply::json(&body), self.status()).into_response()
    }
}

impl Reject for Error {}

impl From<MediaError> for Error {
    fn from(value: MediaError) -> Self {
        match value {
            MediaError::InvalidImage => Error::invalid("image", &value.to_string()),
            other => Error::Media(other),
        }
    }
}

/// Field name -> messages, serialized the way clients expect validation
/// errors: `{"email": ["This field is required."]}`.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.to_owned());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Returns `value` when nothing was collected.
    pub fn into_result<T>(self, value: T) -> Result<T, Error> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{field}: {}", messages.join(" "))?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
#[error("Query failed: {info}")]
pub struct QueryError {
    info: String,
    unique_violation: bool,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            unique_violation: false,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.unique_violation
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        let unique_violation =
            matches!(&value, sqlx::Error::Database(e) if e.is_unique_violation());

        let info = match value {
            sqlx::Error::RowNotFound => "Row not found".to_owned(),
            sqlx::Error::TypeNotFound { type_name } => format!("Type not found: {type_name}"),
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                format!("Column index out of bounds {index} ({len})")
            }
            sqlx::Error::ColumnDecode { index, source } => {
                format!("Column decode {index} ({source})")
            }
            sqlx::Error::PoolTimedOut => "Pool timed out".to_owned(),
            sqlx::Error::PoolClosed => "Pool closed".to_owned(),
            sqlx::Error::WorkerCrashed => "Worker crashed".to_owned(),
            e => format!("{e}"),
        };

        Self {
            info,
            unique_violation,
        }
    }
}

impl From<sqlx::migrate::MigrateError> for QueryError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        Self::new(format!("Migration failed: {value}"))
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        Error::Query(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_group_messages_per_field() {
        let mut errors = FieldErrors::default();
        errors.add("title", "This field is required.");
        errors.add("price", "Ensure that there are no more than 2 decimal places.");
        errors.add("title", "Ensure this field has no more than 255 characters.");

        assert_eq!(errors.get("title").map(|m| m.len()), Some(2));
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({
                "price": ["Ensure that there are no more than 2 decimal places."],
                "title": [
                    "This field is required.",
                    "Ensure this field has no more than 255 characters."
                ]
            })
        );
    }

    #[test]
    fn empty_field_errors_pass_value_through() {
        assert_eq!(FieldErrors::default().into_result(7).unwrap(), 7);
    }

    #[test]
    fn ownership_and_missing_rows_share_not_found() {
        assert_eq!(Error::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::unauthenticated().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::InvalidCredentials.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn errors_convert_into_rejections() {
        let rejection: warp::Rejection = Error::NotFound.into();
        assert!(matches!(rejection.find::<Error>(), Some(Error::NotFound)));
    }
}
