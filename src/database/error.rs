use thiserror::Error;

/// Field-level failures detected before anything is persisted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("cooking time must be within the allowed bounds")]
    InvalidCookingTime,
    #[error("a recipe requires at least one tag")]
    MissingTags,
    #[error("tag list contains a duplicate reference")]
    DuplicateTags,
    #[error("a recipe requires at least one ingredient")]
    MissingIngredients,
    #[error("ingredient list contains a duplicate reference")]
    DuplicateIngredients,
    #[error("ingredient amount must be at least 1")]
    InvalidAmount,
    #[error("image payload is not a valid base64 data URI")]
    InvalidImageEncoding,
    #[error("recipe name is empty or longer than the allowed maximum")]
    InvalidName,
    #[error("username is empty or longer than the allowed maximum")]
    InvalidUsername,
    #[error("email is malformed or longer than the allowed maximum")]
    InvalidEmail,
    #[error("users cannot follow themselves")]
    SelfReferenceNotAllowed,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("referenced entity does not exist")]
    NotFound,
    #[error("acting user does not own this resource")]
    Forbidden,
    #[error("relation already exists")]
    AlreadyExists,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid session: {0}")]
    InvalidSession(&'static str),
    #[error("query failed: {0}")]
    Query(String),
}

impl warp::reject::Reject for Error {}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        match value {
            // Constraint violations carry meaning: a unique violation on a
            // relation table is the race-guard firing, a foreign-key violation
            // means the referenced row is absent, a check violation on follows
            // is the self-follow constraint.
            sqlx::Error::Database(e) => match e.code().as_deref() {
                Some("23503") => Self::NotFound,
                Some("23505") => Self::AlreadyExists,
                Some("23514") => Self::Validation(ValidationError::SelfReferenceNotAllowed),
                _ => Self::Query(format!("{e}")),
            },
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Configuration(e) => Self::Query(format!("{e}")),
            sqlx::Error::Io(e) => Self::Query(format!("{e}")),
            sqlx::Error::Tls(e) => Self::Query(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::Query(format!("{e}")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::Query(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::Query(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::Query(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Query(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::Query(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::Query(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::Query(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::Query(String::from("Worker crashed")),
            _ => Self::Query(String::from("Unknown error")),
        }
    }
}
