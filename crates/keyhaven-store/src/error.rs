//! Store error types.
//!
//! Every variant carries enough context to diagnose the problem without a
//! debugger. Values are never included — keys and entity names only.

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint was violated (duplicate version snapshot,
    /// duplicate secret id, ...).
    #[error("duplicate {entity}")]
    Duplicate { entity: String },

    /// A query against the backing store failed.
    #[error("query failed: {reason}")]
    Query { reason: String },

    /// Failed to connect to or pool connections for the backing store.
    #[error("connection failed: {reason}")]
    Connection { reason: String },

    /// A stored row could not be decoded into its typed model.
    #[error("corrupt row: {reason}")]
    Corrupt { reason: String },
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                // PostgreSQL unique violation
                if db_err.code().as_deref() == Some("23505") {
                    Self::Duplicate {
                        entity: db_err
                            .constraint()
                            .unwrap_or("row")
                            .to_owned(),
                    }
                } else {
                    Self::Query {
                        reason: db_err.to_string(),
                    }
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Connection {
                    reason: err.to_string(),
                }
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::Corrupt {
                reason: err.to_string(),
            },
            _ => Self::Query {
                reason: err.to_string(),
            },
        }
    }
}
