//! WHERE compiler: turns predicate text into a flat chain of clauses.
//!
//! There is no grammar. A segment is split at the first occurrence of the
//! highest-priority keyword it contains, where priority is the order of
//! [`KEYWORD_PRIORITY`] and not the position in the text. Both halves are
//! compiled recursively and concatenated, so the chain order is the
//! textual order of the comparisons. Each clause that follows another
//! records whether it was joined by `AND` or `OR`.
//!
//! ```text
//! location=RussiaORlocation=UkraineANDnew_cases>500
//!   -> [location = russia] [OR location = ukraine] [AND new_cases > 500]
//! ```
//!
//! Because `AND` outranks `OR`, the example above splits at `AND` first even
//! though `OR` appears earlier.

use std::fmt;

use serde::Serialize;

use crate::error::{CompileError, CompileResult};
use crate::value::Value;

/// Comparison operator of a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    #[serde(rename = "NOT")]
    Not,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Not => "NOT",
            Operator::Equal => "=",
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Anything the compiler splits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Or,
    Compare(Operator),
}

impl Keyword {
    pub fn symbol(&self) -> &'static str {
        match self {
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Compare(op) => op.symbol(),
        }
    }
}

/// Split priority. `>=` and `<=` precede `=`, `>` and `<` so two-character
/// operators are never cut in half.
pub const KEYWORD_PRIORITY: [Keyword; 8] = [
    Keyword::And,
    Keyword::Or,
    Keyword::Compare(Operator::Not),
    Keyword::Compare(Operator::GreaterOrEqual),
    Keyword::Compare(Operator::LessOrEqual),
    Keyword::Compare(Operator::Equal),
    Keyword::Compare(Operator::Greater),
    Keyword::Compare(Operator::Less),
];

/// How a clause attaches to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Join {
    /// First clause of the chain.
    Lead,
    /// Strict: a failing comparison ends evaluation with `false`.
    And,
    Or,
}

/// One `field<op>literal` comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clause {
    pub field: String,
    pub op: Operator,
    /// Lower-cased at compile time.
    pub literal: String,
    pub join: Join,
}

impl Clause {
    pub fn new(field: impl Into<String>, op: Operator, literal: &str) -> Self {
        Self {
            field: field.into(),
            op,
            literal: literal.to_lowercase(),
            join: Join::Lead,
        }
    }

    pub fn literal(&self) -> Value<'_> {
        Value::new(&self.literal)
    }

    pub fn is_strict(&self) -> bool {
        self.join == Join::And
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.field, self.op, self.literal)
    }
}

/// Compiled WHERE predicate. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClauseChain {
    clauses: Vec<Clause>,
}

impl ClauseChain {
    /// Compile WHERE text that has already had whitespace and `;` removed.
    pub fn compile(where_text: &str) -> CompileResult<Self> {
        let keyword = find_keyword(where_text)
            .ok_or_else(|| CompileError::NoKeyword(where_text.to_string()))?;
        let clauses = define(where_text, keyword)?;
        Ok(Self { clauses })
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Clause> {
        self.clauses.iter()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Unique field names in order of first appearance.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for clause in &self.clauses {
            if !fields.contains(&clause.field.as_str()) {
                fields.push(&clause.field);
            }
        }
        fields
    }
}

impl<'a> IntoIterator for &'a ClauseChain {
    type Item = &'a Clause;
    type IntoIter = std::slice::Iter<'a, Clause>;

    fn into_iter(self) -> Self::IntoIter {
        self.clauses.iter()
    }
}

impl fmt::Display for ClauseChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for clause in &self.clauses {
            match clause.join {
                Join::Lead => {}
                Join::And => f.write_str(" AND ")?,
                Join::Or => f.write_str(" OR ")?,
            }
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}

/// First entry of [`KEYWORD_PRIORITY`] occurring anywhere in `segment`.
pub fn find_keyword(segment: &str) -> Option<Keyword> {
    KEYWORD_PRIORITY
        .into_iter()
        .find(|kw| segment.contains(kw.symbol()))
}

/// Split around the first occurrence of `keyword`.
fn split(segment: &str, keyword: Keyword) -> (&str, &str) {
    let symbol = keyword.symbol();
    match segment.find(symbol) {
        Some(i) => (&segment[..i], &segment[i + symbol.len()..]),
        None => (segment, ""),
    }
}

fn define(segment: &str, keyword: Keyword) -> CompileResult<Vec<Clause>> {
    let (left, right) = split(segment, keyword);
    tracing::debug!(segment, keyword = keyword.symbol(), left, right, "split WHERE segment");

    let Some(left_keyword) = find_keyword(left) else {
        return match keyword {
            Keyword::Compare(op) => Ok(vec![Clause::new(left, op, right)]),
            Keyword::And | Keyword::Or => Err(CompileError::NoKeyword(left.to_string())),
        };
    };

    let join = match keyword {
        Keyword::And => Join::And,
        Keyword::Or => Join::Or,
        Keyword::Compare(op) => {
            tracing::warn!(
                segment = right,
                "ignoring `{op}{right}` after comparison `{left}`"
            );
            return define(left, left_keyword);
        }
    };

    let mut chain = define(left, left_keyword)?;

    match find_keyword(right) {
        Some(right_keyword) => {
            let mut rest = define(right, right_keyword)?;
            if let Some(head) = rest.first_mut() {
                head.join = join;
            }
            chain.extend(rest);
        }
        None => {
            tracing::warn!(
                segment = right,
                "ignoring WHERE segment without a comparison after {}",
                keyword.symbol()
            );
        }
    }

    Ok(chain)
}
