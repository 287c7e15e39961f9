//! Error types for request compilation and execution.

use std::path::PathBuf;

/// Errors raised while compiling a request. Always fatal to the request.
#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error("cannot find {keyword} in your request: {request}")]
    MissingKeyword {
        keyword: &'static str,
        request: String,
    },

    #[error("cannot find any keyword in WHERE statement: {0}")]
    NoKeyword(String),

    #[error("cannot find selected option: {column} in headers: {headers:?}")]
    UnknownSelected {
        column: String,
        headers: Vec<String>,
    },

    #[error("cannot find where condition: {column} in headers: {headers:?}")]
    UnknownFiltered {
        column: String,
        headers: Vec<String>,
    },

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("open {}: {source}", .path.display())]
    HeaderRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no header row in {}", .0.display())]
    EmptySource(PathBuf),
}

/// Errors raised while streaming a source file.
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("request cancelled")]
    Cancelled,
}

impl QueryError {
    /// True for deadline expiry and explicit cancellation alike.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, QueryError::DeadlineExceeded | QueryError::Cancelled)
    }
}

/// Convenience result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Convenience result type for execution.
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keyword_echoes_request() {
        let err = CompileError::MissingKeyword {
            keyword: "FROM",
            request: "SELECT a WHERE b=1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot find FROM in your request: SELECT a WHERE b=1"
        );
    }

    #[test]
    fn test_cancellation_classification() {
        assert!(QueryError::DeadlineExceeded.is_cancellation());
        assert!(QueryError::Cancelled.is_cancellation());
        let io = QueryError::Read {
            path: PathBuf::from("data.csv"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        };
        assert!(!io.is_cancellation());
    }
}
