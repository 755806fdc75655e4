pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("{message}")]
    AlreadyExists {
        field: &'static str,
        message: String,
    },

    #[error("Object with slug={value} does not exist")]
    InvalidReference { field: &'static str, value: String },

    #[error("Invalid order by field: {0}")]
    InvalidOrderByField(String),
}

impl Error {
    pub(crate) fn already_exists(field: &'static str, message: impl Into<String>) -> Self {
        Error::AlreadyExists {
            field,
            message: message.into(),
        }
    }

    /// Maps unique constraint violation to [`Error::AlreadyExists`], `message_for` receives
    /// database message to distinguish between several unique columns
    pub(crate) fn on_unique_violation<F>(err: sqlx::Error, message_for: F) -> Self
    where
        F: FnOnce(&str) -> (&'static str, String),
    {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                let (field, message) = message_for(db_err.message());
                Error::AlreadyExists { field, message }
            }
            other => Error::DatabaseError(other),
        }
    }
}
