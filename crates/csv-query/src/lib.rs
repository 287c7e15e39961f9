//! csv-query: a small SQL-like query engine over delimited text files.
//!
//! A request such as `SELECT location,date FROM covid.csv WHERE new_cases>500`
//! is compiled once against the file's header row, then executed as a
//! cancellable stream of projected rows.

pub mod clause;
pub mod error;
pub mod executor;
pub mod predicate;
pub mod request;
pub mod result;
pub mod value;

pub use clause::{Clause, ClauseChain, Join, Keyword, Operator};
pub use error::{CompileError, CompileResult, QueryError, QueryResult};
pub use executor::{QueryContext, QueryOutcome, RowStream};
pub use request::Request;
pub use result::{ResultSet, Row, Widths};
pub use value::{Date, Kind, Scalar, Value};
