//! Error types for Cloud SQL MySQL operations.
//!
//! Every failure is terminal for the operation that produced it: nothing in
//! this crate retries. Errors are categorized so callers can tell a resource
//! that vanished out of band apart from a statement the engine rejected, and
//! each variant carries the statement or procedure that failed together with
//! the engine's message.

use thiserror::Error;

/// MySQL error number for `SHOW GRANTS` on an unknown user or role.
pub const ER_NONEXISTING_GRANT: u16 = 1141;

/// Categories of errors, one per failure class an operation can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Declared values violate a structural invariant (no I/O happened)
    Validation,
    /// A connection handle could not be opened
    Connection,
    /// The expected row, role or rule is absent
    NotFound,
    /// The engine rejected a statement
    Execution,
    /// A stored procedure reported failure through its outcome variables
    ProtocolOutcome,
    /// A freshly created audit rule could not be found on re-list
    Correlation,
    /// The caller cancelled the operation or its deadline passed
    Cancelled,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid resource declaration",
            Self::Connection => "Connection failure",
            Self::NotFound => "Object not found",
            Self::Execution => "Statement rejected",
            Self::ProtocolOutcome => "Stored procedure failure",
            Self::Correlation => "Audit rule correlation failure",
            Self::Cancelled => "Operation cancelled",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the declaration; no statement was sent",
            Self::Connection => "Check the instance address, credentials and that the auth proxy is running",
            Self::NotFound => "The object was removed outside of this tool; apply again to recreate it",
            Self::Execution => "Check the statement and the privileges of the connecting user",
            Self::ProtocolOutcome => "Check the message reported by the procedure",
            Self::Correlation => "Another writer may have changed audit rules concurrently; refresh and retry",
            Self::Cancelled => "Re-run the command, with a longer --timeout if a deadline fired",
        }
    }
}

/// Errors that can occur while managing grants, roles, databases and audit rules.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Structural validation failed before any statement was issued
    #[error("invalid declaration: {message}")]
    Validation {
        /// What is wrong with the declaration
        message: String,
    },

    /// Opening a connection handle failed
    #[error("unable to connect to {target}: {message}")]
    Connection {
        /// Connection string with the password masked
        target: String,
        /// Driver message
        message: String,
    },

    /// The expected object does not exist
    #[error("{what} not found")]
    NotFound {
        /// Human-readable description of the missing object
        what: String,
    },

    /// The engine rejected a statement
    #[error("statement \"{statement}\" failed: {message}")]
    Execution {
        /// The statement text as sent
        statement: String,
        /// Engine message
        message: String,
        /// MySQL error number, when the engine reported one
        code: Option<u16>,
    },

    /// A stored procedure reported failure through `@outval` / `@outmsg`
    #[error("{procedure} failed: {message}")]
    Procedure {
        /// Name of the procedure that was invoked
        procedure: String,
        /// The message the procedure wrote to its output variable
        message: String,
    },

    /// The audit rule created by a procedure call was not found on re-list
    #[error("the audit rule is not found after creation by {procedure} ({fields})")]
    Correlation {
        /// Name of the creation procedure
        procedure: String,
        /// The submitted fields that no listed row matched
        fields: String,
    },

    /// The call was cancelled or its deadline passed
    #[error("\"{statement}\" aborted: {reason}")]
    Cancelled {
        /// The statement that was in flight
        statement: String,
        /// Why it was aborted
        reason: String,
    },
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation { .. } => ErrorCategory::Validation,
            Error::Connection { .. } => ErrorCategory::Connection,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Execution { .. } => ErrorCategory::Execution,
            Error::Procedure { .. } => ErrorCategory::ProtocolOutcome,
            Error::Correlation { .. } => ErrorCategory::Correlation,
            Error::Cancelled { .. } => ErrorCategory::Cancelled,
        }
    }

    /// Whether this error means the object is absent.
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    /// Wrap a driver error raised while running `statement`.
    pub fn from_sqlx(statement: &str, err: &sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>())
            .map(sqlx::mysql::MySqlDatabaseError::number);

        Error::Execution {
            statement: statement.to_string(),
            message: err.to_string(),
            code,
        }
    }

    /// MySQL error number carried by an execution error.
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::Execution { code, .. } => *code,
            _ => None,
        }
    }
}

/// Result type for Cloud SQL MySQL operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            Error::validation("both user and role").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::Procedure {
                procedure: "mysql.cloudsql_create_audit_rule".into(),
                message: "x".into(),
            }
            .category(),
            ErrorCategory::ProtocolOutcome
        );
        assert!(Error::not_found("role 'reader'").is_not_found());
        assert!(!Error::validation("x").is_not_found());
    }

    #[test]
    fn test_execution_error_includes_statement() {
        let err = Error::Execution {
            statement: "DROP ROLE 'reader'".into(),
            message: "Operation DROP ROLE failed".into(),
            code: Some(1396),
        };
        let text = err.to_string();
        assert!(text.contains("DROP ROLE 'reader'"));
        assert!(text.contains("Operation DROP ROLE failed"));
        assert_eq!(err.code(), Some(1396));
    }

    #[test]
    fn test_procedure_error_carries_message_verbatim() {
        let err = Error::Procedure {
            procedure: "mysql.cloudsql_delete_audit_rule".into(),
            message: "rule 7 does not exist".into(),
        };
        assert_eq!(
            err.to_string(),
            "mysql.cloudsql_delete_audit_rule failed: rule 7 does not exist"
        );
    }

    #[test]
    fn test_advice_is_present_for_every_category() {
        for category in [
            ErrorCategory::Validation,
            ErrorCategory::Connection,
            ErrorCategory::NotFound,
            ErrorCategory::Execution,
            ErrorCategory::ProtocolOutcome,
            ErrorCategory::Correlation,
            ErrorCategory::Cancelled,
        ] {
            assert!(!category.description().is_empty());
            assert!(!category.advice().is_empty());
        }
    }
}
