//! Table store error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No row with this id in the table
    #[error("Record not found: {table}/{id}")]
    NotFound { table: String, id: String },

    /// Insert with an id that is already taken
    #[error("Record already exists: {table}/{id}")]
    Conflict { table: String, id: String },

    /// Rows must be JSON objects
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<rusqlite::Error> for TableError {
    fn from(err: rusqlite::Error) -> Self {
        TableError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for TableError {
    fn from(err: serde_json::Error) -> Self {
        TableError::Serialization(err.to_string())
    }
}

pub type TableResult<T> = Result<T, TableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TableError::NotFound {
            table: "clients".to_string(),
            id: "42".to_string(),
        };
        assert_eq!(err.to_string(), "Record not found: clients/42");
    }
}
