use thiserror::Error;

/// Errors surfaced across crate boundaries.
///
/// Each variant carries a stable machine-readable name (`name()`) so API
/// consumers can branch on the kind of failure without parsing messages.
#[derive(Error, Debug)]
pub enum FlagtrailError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlagtrailError {
    pub fn name(&self) -> &'static str {
        match self {
            FlagtrailError::Database(_) => "DatabaseError",
            FlagtrailError::Validation(_) => "ValidationError",
            FlagtrailError::NotFound(_) => "NotFoundError",
            FlagtrailError::Config(_) => "ConfigError",
        }
    }
}
