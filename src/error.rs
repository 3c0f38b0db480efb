use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;
use tracing::error;

use crate::model::transition::TransitionError;
use crate::store::{Constraint, StoreError};

#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),

    #[display(fmt = "{}", _0)]
    Unauthorized(&'static str),

    #[display(fmt = "{}", _0)]
    Forbidden(&'static str),

    #[display(fmt = "{}", _0)]
    NotFound(&'static str),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "{}", _0)]
    InvalidTransition(TransitionError),

    #[display(fmt = "{}", _0)]
    Store(StoreError),

    #[display(fmt = "{}", _0)]
    Internal(String),
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        ApiError::InvalidTransition(e)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::InvalidTransition(_) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::NoRows) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Constraint(Constraint::Duplicate, _)) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::Constraint(Constraint::MissingReference, _)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Store(StoreError::MissingFilter(..) | StoreError::EmptyRow(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = match self {
            ApiError::Store(StoreError::NoRows) => "Record not found".to_string(),
            ApiError::Store(StoreError::Constraint(Constraint::Duplicate, _)) => {
                "Record conflicts with an existing one".to_string()
            }
            ApiError::Store(StoreError::Constraint(Constraint::MissingReference, _)) => {
                "Referenced record does not exist".to_string()
            }
            ApiError::Store(StoreError::EmptyRow(_)) => "No fields provided".to_string(),
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                error!(error = %self, "Request failed");
                "Something went wrong, Contact with system admin".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(status).json(json!({ "message": message }))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::LeaveStatus;

    #[test]
    fn missing_rows_map_to_not_found() {
        let err = ApiError::from(StoreError::NoRows);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn disallowed_transitions_map_to_conflict() {
        let err = ApiError::from(TransitionError::new(
            "leave request",
            LeaveStatus::Approved.as_ref(),
            LeaveStatus::Pending.as_ref(),
        ));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            err.to_string(),
            "leave request cannot move from approved to pending"
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::Internal("token signing failed".into());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn constraint_failures_are_split_by_kind() {
        let duplicate = ApiError::from(StoreError::Constraint(
            Constraint::Duplicate,
            sqlx::Error::RowNotFound,
        ));
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);

        let dangling = ApiError::from(StoreError::Constraint(
            Constraint::MissingReference,
            sqlx::Error::RowNotFound,
        ));
        assert_eq!(dangling.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(dangling.error_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unfiltered_writes_are_client_errors() {
        let err = ApiError::from(StoreError::MissingFilter("update", "payroll"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
