//! Chain evaluation against a single row cell.
//!
//! A chain is evaluated once per referenced column; clauses on other
//! columns are skipped. For the clauses that match:
//!
//! - a non-strict clause (lead or `OR`) is only evaluated while the running
//!   result is still `false`;
//! - a strict (`AND`) clause is always evaluated, overwrites the result,
//!   and ends evaluation with `false` when it fails.
//!
//! The cell's inferred kind decides how the literal is coerced.

use crate::clause::{ClauseChain, Operator};
use crate::value::{Scalar, Value};

/// Lower-case and strip whitespace, matching how request text is prepared.
pub fn normalize_cell(cell: &str) -> String {
    cell.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Evaluate `chain` for the column `field` against the raw text of its cell.
pub fn evaluate(chain: &ClauseChain, field: &str, cell: &str) -> bool {
    let cell = normalize_cell(cell);
    let row = Value::new(&cell);

    let mut result = false;
    for clause in chain.iter().filter(|c| c.field == field) {
        let strict = clause.is_strict();
        if strict || !result {
            result = compare(clause.op, clause.literal(), row);
        }
        if strict && !result {
            return false;
        }
    }
    result
}

/// Compare a clause literal with a row value, typed by the row value's kind.
///
/// Ordering operators read as `row <op> literal`. Strings only support
/// `=` and `NOT`.
pub fn compare(op: Operator, literal: Value<'_>, row: Value<'_>) -> bool {
    match row.classify() {
        Scalar::Integer(r) => {
            let l = literal.as_integer();
            match op {
                Operator::Equal => r == l,
                Operator::Not => r != l,
                Operator::Greater => r > l,
                Operator::Less => r < l,
                Operator::GreaterOrEqual => r >= l,
                Operator::LessOrEqual => r <= l,
            }
        }
        Scalar::Float(r) => {
            let l = literal.as_float();
            match op {
                Operator::Equal => r == l,
                Operator::Not => r != l,
                Operator::Greater => r > l,
                Operator::Less => r < l,
                Operator::GreaterOrEqual => r >= l,
                Operator::LessOrEqual => r <= l,
            }
        }
        Scalar::Date(r) => {
            let l = literal.as_date();
            match op {
                Operator::Equal => r == l,
                Operator::Not => r != l,
                Operator::Greater => r > l,
                Operator::Less => r < l,
                Operator::GreaterOrEqual => r >= l,
                Operator::LessOrEqual => r <= l,
            }
        }
        Scalar::String(r) => match op {
            Operator::Equal => r == literal.as_str(),
            Operator::Not => r != literal.as_str(),
            Operator::Greater
            | Operator::Less
            | Operator::GreaterOrEqual
            | Operator::LessOrEqual => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(op: Operator, literal: &str, row: &str) -> bool {
        compare(op, Value::new(literal), Value::new(row))
    }

    fn chain(text: &str) -> ClauseChain {
        ClauseChain::compile(text).unwrap()
    }

    #[test]
    fn test_check_not() {
        assert!(check(Operator::Not, "45", "50"));
        assert!(!check(Operator::Not, "45", "45"));
        assert!(check(Operator::Not, "4.5", "5.0"));
        assert!(!check(Operator::Not, "4.5", "4.5"));
        assert!(check(Operator::Not, "something", "anotherthing"));
        assert!(!check(Operator::Not, "something", "something"));
        assert!(check(Operator::Not, "2020-11-18", "2020-11-19"));
        assert!(!check(Operator::Not, "2020-11-18", "2020-11-18"));
    }

    #[test]
    fn test_check_equal() {
        assert!(!check(Operator::Equal, "45", "50"));
        assert!(check(Operator::Equal, "45", "45"));
        assert!(!check(Operator::Equal, "4.5", "5.0"));
        assert!(check(Operator::Equal, "4.5", "4.5"));
        assert!(check(Operator::Equal, "something", "something"));
        assert!(check(Operator::Equal, "2020-11-18", "2020-11-18"));
        assert!(!check(Operator::Equal, "2020-11-18", "2020-11-19"));
    }

    #[test]
    fn test_ordering_reads_row_against_literal() {
        assert!(check(Operator::Greater, "45", "50"));
        assert!(!check(Operator::Greater, "45", "40"));
        assert!(check(Operator::Greater, "4.0", "4.5"));
        assert!(check(Operator::Greater, "2020-11-18", "2020-11-20"));
        assert!(check(Operator::Less, "50", "45"));
        assert!(check(Operator::Less, "2020-11-18", "2020-11-15"));
        assert!(check(Operator::GreaterOrEqual, "45", "45"));
        assert!(check(Operator::GreaterOrEqual, "2020-11-18", "2020-11-18"));
        assert!(!check(Operator::GreaterOrEqual, "4.5", "3.5"));
        assert!(check(Operator::LessOrEqual, "5.0", "5.0"));
        assert!(!check(Operator::LessOrEqual, "2020-11-18", "2020-11-20"));
    }

    #[test]
    fn test_strings_have_no_ordering() {
        assert!(!check(Operator::Greater, "a", "b"));
        assert!(!check(Operator::Less, "b", "a"));
        assert!(!check(Operator::GreaterOrEqual, "a", "a"));
        assert!(!check(Operator::LessOrEqual, "a", "a"));
    }

    #[test]
    fn test_kind_follows_row_cell() {
        assert!(check(Operator::Equal, "007", "7"));
        assert!(check(Operator::Equal, "007", "7.0"));
        assert!(!check(Operator::Equal, "007", "seven"));
    }

    #[test]
    fn test_leap_and_impossible_dates() {
        assert!(check(Operator::Less, "2020-03-01", "2020-02-29"));
        assert!(check(Operator::Greater, "2020-02-28", "2020-02-29"));
        assert!(check(Operator::Greater, "2020-12-31", "2020-19-39"));
    }

    #[test]
    fn test_and_short_circuits_to_false() {
        let c = chain("f=5ANDf=6");
        assert!(!evaluate(&c, "f", "5"));
        // the strict clause overwrites the lead's failure
        assert!(evaluate(&c, "f", "6"));
    }

    #[test]
    fn test_or_is_case_folded() {
        let c = chain("loc=russiaORloc=ukraine");
        assert!(evaluate(&c, "loc", "Ukraine"));
        assert!(evaluate(&c, "loc", "RUSSIA"));
        assert!(!evaluate(&c, "loc", "Belarus"));
    }

    #[test]
    fn test_multi_word_cell_matches_stripped_literal() {
        let c = chain("location=UnitedArabEmirates");
        assert!(evaluate(&c, "location", "United Arab Emirates"));
    }

    #[test]
    fn test_other_fields_are_skipped() {
        let c = chain("a=1ANDb=2");
        assert!(evaluate(&c, "a", "1"));
        assert!(evaluate(&c, "b", "2"));
        assert!(!evaluate(&c, "b", "3"));
        assert!(!evaluate(&c, "missing", "1"));
    }

    #[test]
    fn test_range_with_exclusion() {
        let c = chain("date>=2020-04-20ANDdate<=2020-04-30ANDdateNOT2020-04-23");
        assert!(evaluate(&c, "date", "2020-04-20"));
        assert!(evaluate(&c, "date", "2020-04-30"));
        assert!(!evaluate(&c, "date", "2020-04-23"));
        assert!(!evaluate(&c, "date", "2020-05-01"));
    }

    #[test]
    fn test_true_or_does_not_reevaluate() {
        let c = chain("n>10ORn<0");
        assert!(evaluate(&c, "n", "11"));
        assert!(evaluate(&c, "n", "-1"));
        assert!(!evaluate(&c, "n", "5"));
    }

    #[test]
    fn test_normalize_cell() {
        assert_eq!(normalize_cell(" New Zealand\t"), "newzealand");
    }
}
