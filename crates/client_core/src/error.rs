use shared::error::{ApiException, ErrorCode};
use thiserror::Error;

/// Failures the client surfaces to its pages.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("caller is not the admin")]
    NotAdmin,
    #[error("sign in required")]
    NotAuthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
}

impl ClientError {
    /// Classifies a transport error, keeping the backend's error code when present.
    pub fn from_backend(err: anyhow::Error) -> Self {
        match err.downcast_ref::<ApiException>() {
            Some(api) => match api.code {
                ErrorCode::Unauthorized => ClientError::NotAuthenticated,
                ErrorCode::Forbidden => ClientError::Forbidden(api.message.clone()),
                ErrorCode::Validation => ClientError::Validation(api.message.clone()),
                ErrorCode::NotFound | ErrorCode::Internal => {
                    ClientError::Unavailable(api.message.clone())
                }
            },
            None => ClientError::Unavailable(format!("{err:#}")),
        }
    }
}
