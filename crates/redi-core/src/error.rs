//! Normalized error types for the core driver/query/migration surface (§7).
//!
//! Every driver maps its own failure modes onto this one enum so callers can
//! match on a kind instead of a driver-specific error.

use thiserror::Error;

/// The classified reason a [`CoreError::ConstraintViolation`] was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    NotNull,
    ForeignKey,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {message}")]
    ConfigError { message: String },

    #[error("connection failed: {message}")]
    ConnectionError { message: String },

    #[error("schema validation failed: {0}")]
    SchemaValidationError(#[from] redi_schema::SchemaError),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("model '{model}' has no field '{field}'")]
    UnknownField { model: String, field: String },

    #[error("constraint violation ({kind:?}): {message}")]
    ConstraintViolation { kind: ConstraintKind, message: String },

    #[error("transaction error: {message}")]
    TransactionError { message: String },

    #[error("migration error: {message}")]
    MigrationError { message: String },

    #[error("introspection error: {message}")]
    IntrospectionError { message: String },

    #[error("operation cancelled")]
    CanceledError,
}

impl CoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError { message: msg.into() }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError { message: msg.into() }
    }

    pub fn unknown_model(name: impl Into<String>) -> Self {
        Self::UnknownModel(name.into())
    }

    pub fn unknown_field(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField { model: model.into(), field: field.into() }
    }

    pub fn constraint(kind: ConstraintKind, msg: impl Into<String>) -> Self {
        Self::ConstraintViolation { kind, message: msg.into() }
    }

    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::TransactionError { message: msg.into() }
    }

    pub fn migration(msg: impl Into<String>) -> Self {
        Self::MigrationError { message: msg.into() }
    }

    pub fn introspection(msg: impl Into<String>) -> Self {
        Self::IntrospectionError { message: msg.into() }
    }

    pub fn cancelled() -> Self {
        Self::CanceledError
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
