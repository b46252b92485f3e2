use std::fmt;

use bson::Document;

use crate::{
    document::TextError,
    filter::FilterParseError,
    store::StoreError,
};

/// Error kinds as they are reported to the user and to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectionError,
    FilterParseError,
    IdentifierResolutionFailure,
    EditValidationError,
    NotFound,
    NotFoundOnWrite,
    ConsistencyViolation,
    StoreRejected,
    Notice,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ConnectionError => "ConnectionError",
            ErrorKind::FilterParseError => "FilterParseError",
            ErrorKind::IdentifierResolutionFailure => "IdentifierResolutionFailure",
            ErrorKind::EditValidationError => "EditValidationError",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::NotFoundOnWrite => "NotFoundOnWrite",
            ErrorKind::ConsistencyViolation => "ConsistencyViolation",
            ErrorKind::StoreRejected => "StoreRejected",
            ErrorKind::Notice => "Notice",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Update,
    Replace,
    Delete,
}

impl Operation {
    pub fn is_write(self) -> bool {
        !matches!(self, Operation::Fetch)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Fetch => "fetch",
            Operation::Update => "update",
            Operation::Replace => "replace",
            Operation::Delete => "delete",
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrowseError {
    #[error("store unreachable: {0}")]
    Connection(String),
    #[error(transparent)]
    FilterParse(#[from] FilterParseError),
    #[error("invalid value for {target}: {message}")]
    EditValidation { target: String, message: String },
    #[error("{operation}: no document matches {predicate}")]
    NotFound {
        operation: Operation,
        predicate: Document,
    },
    #[error("more than one document matches {predicate}; writes against it are blocked")]
    ConsistencyViolation { predicate: Document },
    #[error("the identifier field {field} can only be changed by editing the whole document")]
    IdentifierEditRefused { field: String },
    #[error("already on the first page")]
    AtFirstPage,
    #[error("page size must be between 1 and {max}, got {size}")]
    InvalidPageSize { size: u64, max: u64 },
    #[error("{operation} rejected by store: {message}")]
    Store {
        operation: Operation,
        message: String,
    },
}

impl BrowseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrowseError::Connection(_) => ErrorKind::ConnectionError,
            BrowseError::FilterParse(_) => ErrorKind::FilterParseError,
            BrowseError::EditValidation { .. } => ErrorKind::EditValidationError,
            BrowseError::NotFound { operation, .. } if operation.is_write() => {
                ErrorKind::NotFoundOnWrite
            }
            BrowseError::NotFound { .. } => ErrorKind::NotFound,
            BrowseError::ConsistencyViolation { .. } => ErrorKind::ConsistencyViolation,
            BrowseError::Store { .. } => ErrorKind::StoreRejected,
            BrowseError::IdentifierEditRefused { .. }
            | BrowseError::AtFirstPage
            | BrowseError::InvalidPageSize { .. } => ErrorKind::Notice,
        }
    }

    /// Map a store failure at the boundary of `operation`.
    ///
    /// A query the store refuses while fetching a page is a filter problem.
    pub fn from_store(operation: Operation, err: StoreError) -> Self {
        match err {
            StoreError::Connection(message) => BrowseError::Connection(message),
            StoreError::InvalidQuery(message) if operation == Operation::Fetch => {
                BrowseError::FilterParse(FilterParseError::Rejected(message))
            }
            StoreError::InvalidQuery(message) | StoreError::Rejected(message) => {
                BrowseError::Store { operation, message }
            }
        }
    }

    pub fn edit_validation(target: impl Into<String>, err: TextError) -> Self {
        BrowseError::EditValidation {
            target: target.into(),
            message: err.to_string(),
        }
    }

    /// Errors after which the session should not keep issuing store calls.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConnectionError | ErrorKind::ConsistencyViolation
        )
    }
}

pub type Result<T> = std::result::Result<T, BrowseError>;

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn not_found_kind_depends_on_operation() {
        let read = BrowseError::NotFound {
            operation: Operation::Fetch,
            predicate: doc! {},
        };
        let write = BrowseError::NotFound {
            operation: Operation::Delete,
            predicate: doc! {},
        };
        assert_eq!(read.kind(), ErrorKind::NotFound);
        assert_eq!(write.kind(), ErrorKind::NotFoundOnWrite);
    }

    #[test]
    fn invalid_query_while_fetching_is_a_filter_error() {
        let err = BrowseError::from_store(
            Operation::Fetch,
            StoreError::InvalidQuery("unknown operator: $near".into()),
        );
        assert_eq!(err.kind(), ErrorKind::FilterParseError);

        let err = BrowseError::from_store(
            Operation::Update,
            StoreError::InvalidQuery("bad".into()),
        );
        assert_eq!(err.kind(), ErrorKind::StoreRejected);
    }

    #[test]
    fn connection_errors_are_fatal() {
        let err = BrowseError::from_store(Operation::Fetch, StoreError::Connection("down".into()));
        assert!(err.is_fatal());
        assert_eq!(err.kind().to_string(), "ConnectionError");
    }
}
