use thiserror::Error;

use backend_domain::{BusError, SchemaViolation, UnknownEventKind};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),
    #[error(transparent)]
    UnknownEventKind(#[from] UnknownEventKind),
    #[error(transparent)]
    BusUnavailable(#[from] BusError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<backend_domain::RegistryError> for AppError {
    fn from(err: backend_domain::RegistryError) -> Self {
        match err {
            backend_domain::RegistryError::UnknownEventKind(err) => AppError::UnknownEventKind(err),
            backend_domain::RegistryError::SchemaViolation(err) => AppError::SchemaViolation(err),
        }
    }
}
