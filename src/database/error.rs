use std::fmt::{self, Display};

use potion::{Error, HtmlError};

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug)]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

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
            _ => Self::new(format!("Unknown error")),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        Error {
            code: 500,
            info: Some(value.info),
            redirect: None,
        }
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

/// Failure of a recipe, mark or subscription write.
///
/// None of these are retryable: every variant is either bad caller input or a
/// storage failure that propagates unchanged.
#[derive(Debug)]
pub enum ActionError {
    Validation { field: String, info: String },
    NotFound(String),
    Conflict(String),
    Query(QueryError),
}

impl ActionError {
    pub fn validation(field: &str, info: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            info: info.to_string(),
        }
    }

    pub fn not_found(info: &str) -> Self {
        Self::NotFound(info.to_string())
    }

    pub fn conflict(info: &str) -> Self {
        Self::Conflict(info.to_string())
    }
}

impl From<sqlx::Error> for ActionError {
    fn from(value: sqlx::Error) -> Self {
        if let sqlx::Error::Database(e) = &value {
            if e.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return Self::Conflict(format!("{e}"));
            }
        }

        match value {
            sqlx::Error::RowNotFound => Self::not_found("Object doesn't exist"),
            other => Self::Query(QueryError::from(other)),
        }
    }
}

impl From<TypeError> for ActionError {
    fn from(value: TypeError) -> Self {
        Self::Validation {
            field: String::from("non_field_errors"),
            info: value.info,
        }
    }
}

impl Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::Validation { field, info } => write!(f, "{field}: {info}"),
            ActionError::NotFound(info) => write!(f, "Not found: {info}"),
            ActionError::Conflict(info) => write!(f, "Conflict: {info}"),
            ActionError::Query(e) => write!(f, "Query failed: {e}"),
        }
    }
}

impl std::error::Error for ActionError {}

impl From<ActionError> for Error {
    fn from(value: ActionError) -> Self {
        match value {
            ActionError::Validation { field, info } => {
                HtmlError::InvalidRequest.new(&format!("{field}: {info}"))
            }
            ActionError::NotFound(info) => Error {
                code: 404,
                info: Some(info),
                redirect: None,
            },
            ActionError::Conflict(info) => Error {
                code: 409,
                info: Some(info),
                redirect: None,
            },
            ActionError::Query(e) => e.into(),
        }
    }
}
