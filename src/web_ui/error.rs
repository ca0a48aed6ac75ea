use axum::http::header::LOCATION;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use crate::error::TagmarkError;

#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(&'static str),

    #[error("authentication required")]
    Unauthenticated {
        login_url: String,
        next: Option<String>,
    },

    #[error("an internal error occurred: {0}")]
    Internal(TagmarkError),

    #[error("an internal server error occurred: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl From<TagmarkError> for WebError {
    fn from(value: TagmarkError) -> Self {
        match value {
            TagmarkError::NotFound(_) => WebError::NotFound,
            other => WebError::Internal(other),
        }
    }
}

impl WebError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated { .. } => StatusCode::FOUND,
            Self::Internal(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `302 Found` to `location`.
pub fn redirect_to(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated { ref login_url, ref next } => {
                let location = match next {
                    Some(next) => format!("{}?next={}", login_url, urlencoding::encode(next)),
                    None => login_url.clone(),
                };
                return redirect_to(&location);
            }

            Self::Internal(ref e) => {
                error!("Database error: {:?}", e);
            }

            Self::Anyhow(ref e) => {
                error!("Generic error: {:?}", e);
            }

            _ => (),
        }

        (self.status_code(), self.to_string()).into_response()
    }
}
