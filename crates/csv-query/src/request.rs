//! Request compiler for `SELECT <cols> FROM <path> [WHERE <predicate>]`.
//!
//! Whitespace, tabs, newlines and `;` are removed before anything else, so
//! keywords are located by plain substring search in the prepared text.
//! Keywords are case-sensitive; data comparison is not.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::clause::ClauseChain;
use crate::error::{CompileError, CompileResult};

const SELECT: &str = "SELECT";
const FROM: &str = "FROM";
const WHERE: &str = "WHERE";

/// A compiled, immutable request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    select: Vec<String>,
    from: PathBuf,
    #[serde(rename = "where")]
    where_chain: Option<ClauseChain>,
}

impl Request {
    /// Compile `raw`, reading the header row of the source with `separator`
    /// to validate column names.
    pub fn compile(raw: &str, separator: char) -> CompileResult<Self> {
        tracing::debug!(request = raw, "compiling request");
        let prepared = strip_request(raw);

        let select_at = prepared
            .find(SELECT)
            .ok_or_else(|| missing_keyword(SELECT, raw))?;
        let from_at = prepared
            .find(FROM)
            .ok_or_else(|| missing_keyword(FROM, raw))?;
        let where_at = prepared.find(WHERE);

        if from_at < select_at + SELECT.len() {
            return Err(CompileError::Malformed(format!(
                "{FROM} must follow {SELECT}: {raw}"
            )));
        }
        if matches!(where_at, Some(at) if at < from_at + FROM.len()) {
            return Err(CompileError::Malformed(format!(
                "{WHERE} must follow {FROM}: {raw}"
            )));
        }

        let source_end = where_at.unwrap_or(prepared.len());
        let source = &prepared[from_at + FROM.len()..source_end];
        if source.is_empty() {
            return Err(CompileError::Malformed(format!(
                "missing source file after {FROM}: {raw}"
            )));
        }
        let from = PathBuf::from(source);
        let headers = read_headers(&from, separator)?;

        let select_text = &prepared[select_at + SELECT.len()..from_at];
        let select = match select_text {
            "*" => headers.clone(),
            list => {
                let columns: Vec<String> = list.split(',').map(str::to_string).collect();
                if let Some(column) = columns.iter().find(|c| !headers.contains(*c)) {
                    return Err(CompileError::UnknownSelected {
                        column: column.clone(),
                        headers,
                    });
                }
                columns
            }
        };

        let where_chain = match where_at {
            Some(at) => {
                let chain = ClauseChain::compile(&prepared[at + WHERE.len()..])?;
                if let Some(field) = chain
                    .referenced_fields()
                    .into_iter()
                    .find(|f| !headers.iter().any(|h| h == f))
                {
                    return Err(CompileError::UnknownFiltered {
                        column: field.to_string(),
                        headers,
                    });
                }
                Some(chain)
            }
            None => None,
        };

        Ok(Self {
            select,
            from,
            where_chain,
        })
    }

    /// Selected columns in output order.
    pub fn select(&self) -> &[String] {
        &self.select
    }

    pub fn from(&self) -> &Path {
        &self.from
    }

    pub fn where_chain(&self) -> Option<&ClauseChain> {
        self.where_chain.as_ref()
    }

    /// Columns referenced by the WHERE chain, if any.
    pub fn filter_fields(&self) -> Vec<&str> {
        self.where_chain
            .as_ref()
            .map(ClauseChain::referenced_fields)
            .unwrap_or_default()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn missing_keyword(keyword: &'static str, raw: &str) -> CompileError {
    CompileError::MissingKeyword {
        keyword,
        request: raw.to_string(),
    }
}

/// Drop every whitespace character and `;`.
pub fn strip_request(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != ';')
        .collect()
}

/// Split a header or data line on `separator`.
pub fn split_line(line: &str, separator: char) -> Vec<&str> {
    line.trim_end_matches(['\r', '\n']).split(separator).collect()
}

/// Column names from the first line of `path`.
pub fn read_headers(path: &Path, separator: char) -> CompileResult<Vec<String>> {
    let header_read = |source: std::io::Error| CompileError::HeaderRead {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(header_read)?;
    let mut line = Vec::new();
    let read = BufReader::new(file)
        .read_until(b'\n', &mut line)
        .map_err(header_read)?;
    if read == 0 {
        return Err(CompileError::EmptySource(path.to_path_buf()));
    }

    Ok(parse_header(&String::from_utf8_lossy(&line), separator))
}

/// Header names with surrounding whitespace and a leading BOM removed.
pub fn parse_header(line: &str, separator: char) -> Vec<String> {
    split_line(line.trim_start_matches('\u{feff}'), separator)
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect()
}
