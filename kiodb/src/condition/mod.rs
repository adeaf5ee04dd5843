//! Conjunctive condition matching over records.
//!
//! Conditions are evaluated structurally: each `{column, operator, operand}`
//! tuple is interpreted directly against the record's value. No expression
//! strings are ever built or evaluated at runtime.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KiodbError, Result};
use crate::schema::type_name;
use crate::snapshot::Record;

/// The six comparison operators a condition can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl FromStr for Operator {
    type Err = KiodbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            ">" => Ok(Operator::Gt),
            "<" => Ok(Operator::Lt),
            ">=" => Ok(Operator::Ge),
            "<=" => Ok(Operator::Le),
            other => Err(KiodbError::InvalidOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
        };
        write!(f, "{token}")
    }
}

/// A single comparison used for filtering records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub operand: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, operator: Operator, operand: Value) -> Self {
        Condition {
            column: column.into(),
            operator,
            operand,
        }
    }

    /// Shorthand for the most common `==` condition.
    pub fn eq(column: impl Into<String>, operand: Value) -> Self {
        Condition::new(column, Operator::Eq, operand)
    }
}

/// Returns true iff every condition holds for `record`.
/// An empty condition list matches every record.
pub fn matches(record: &Record, conditions: &[Condition]) -> Result<bool> {
    for condition in conditions {
        let value = record
            .get(&condition.column)
            .ok_or_else(|| KiodbError::UnknownConditionColumn(condition.column.clone()))?;

        let holds = match condition.operator {
            Operator::Eq => values_equal(value, &condition.operand),
            Operator::Ne => !values_equal(value, &condition.operand),
            Operator::Gt => order(condition, value)? == Ordering::Greater,
            Operator::Lt => order(condition, value)? == Ordering::Less,
            Operator::Ge => order(condition, value)? != Ordering::Less,
            Operator::Le => order(condition, value)? != Ordering::Greater,
        };

        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Deep equality, with numbers compared numerically so 1 == 1.0.
/// Matching integer representations compare exactly; the f64 fallback
/// is only for mixed integer/float pairs, so large integers that differ
/// by one never collapse to the same double.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            if let (Some(l), Some(r)) = (l.as_i64(), r.as_i64()) {
                return l == r;
            }
            if let (Some(l), Some(r)) = (l.as_u64(), r.as_u64()) {
                return l == r;
            }
            match (l.as_f64(), r.as_f64()) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            }
        }
        _ => left == right,
    }
}

/// Ordering for `>`, `<`, `>=`, `<=`: both sides must be numbers
/// or both strings.
fn order(condition: &Condition, value: &Value) -> Result<Ordering> {
    let operand = &condition.operand;
    if let (Some(l), Some(r)) = (value.as_f64(), operand.as_f64()) {
        // serde_json numbers are never NaN, so a total order exists.
        return Ok(l.partial_cmp(&r).unwrap_or(Ordering::Equal));
    }
    if let (Some(l), Some(r)) = (value.as_str(), operand.as_str()) {
        return Ok(l.cmp(r));
    }
    Err(KiodbError::IncomparableOperands {
        column: condition.column.clone(),
        left: type_name(value).to_string(),
        right: type_name(operand).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_empty_conditions_match_everything() {
        let row = record(json!({"id": 1}));
        assert!(matches(&row, &[]).unwrap());
    }

    #[test]
    fn test_equality_and_inequality() {
        let row = record(json!({"name": "alice", "active": true}));

        assert!(matches(&row, &[Condition::eq("name", json!("alice"))]).unwrap());
        assert!(!matches(&row, &[Condition::eq("name", json!("bob"))]).unwrap());
        assert!(matches(
            &row,
            &[Condition::new("name", Operator::Ne, json!("bob"))]
        )
        .unwrap());
        assert!(matches(&row, &[Condition::eq("active", json!(true))]).unwrap());
    }

    #[test]
    fn test_numeric_equality_across_representations() {
        let row = record(json!({"score": 1}));
        assert!(matches(&row, &[Condition::eq("score", json!(1.0))]).unwrap());
    }

    #[test]
    fn test_large_integer_equality_is_exact() {
        // 2^53 + 1 and 2^53 collapse to the same f64; equality must not.
        let row = record(json!({"serial": 9_007_199_254_740_993i64}));
        assert!(!matches(
            &row,
            &[Condition::eq("serial", json!(9_007_199_254_740_992i64))]
        )
        .unwrap());
        assert!(matches(
            &row,
            &[Condition::eq("serial", json!(9_007_199_254_740_993i64))]
        )
        .unwrap());
    }

    #[test]
    fn test_ordering_operators() {
        let row = record(json!({"age": 21}));

        assert!(matches(&row, &[Condition::new("age", Operator::Gt, json!(18))]).unwrap());
        assert!(!matches(&row, &[Condition::new("age", Operator::Lt, json!(18))]).unwrap());
        assert!(matches(&row, &[Condition::new("age", Operator::Ge, json!(21))]).unwrap());
        assert!(matches(&row, &[Condition::new("age", Operator::Le, json!(21))]).unwrap());
        assert!(!matches(&row, &[Condition::new("age", Operator::Ge, json!(22))]).unwrap());
    }

    #[test]
    fn test_lexicographic_string_ordering() {
        let row = record(json!({"name": "bob"}));
        assert!(matches(&row, &[Condition::new("name", Operator::Gt, json!("alice"))]).unwrap());
        assert!(matches(&row, &[Condition::new("name", Operator::Lt, json!("carol"))]).unwrap());
    }

    #[test]
    fn test_conjunction_requires_all() {
        let row = record(json!({"age": 21, "active": true}));
        let both = [
            Condition::new("age", Operator::Gt, json!(18)),
            Condition::eq("active", json!(true)),
        ];
        assert!(matches(&row, &both).unwrap());

        let one_fails = [
            Condition::new("age", Operator::Gt, json!(30)),
            Condition::eq("active", json!(true)),
        ];
        assert!(!matches(&row, &one_fails).unwrap());
    }

    #[test]
    fn test_incomparable_operands() {
        let row = record(json!({"active": true}));
        let err = matches(&row, &[Condition::new("active", Operator::Gt, json!(1))]).unwrap_err();
        assert!(matches!(err, KiodbError::IncomparableOperands { .. }));

        let row = record(json!({"age": 21}));
        let err = matches(&row, &[Condition::new("age", Operator::Lt, json!("18"))]).unwrap_err();
        assert!(matches!(err, KiodbError::IncomparableOperands { .. }));
    }

    #[test]
    fn test_unknown_condition_column() {
        let row = record(json!({"id": 1}));
        let err = matches(&row, &[Condition::eq("missing", json!(1))]).unwrap_err();
        assert!(matches!(err, KiodbError::UnknownConditionColumn(name) if name == "missing"));
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("==".parse::<Operator>().unwrap(), Operator::Eq);
        assert_eq!(">=".parse::<Operator>().unwrap(), Operator::Ge);
        assert!(matches!(
            "&&".parse::<Operator>(),
            Err(KiodbError::InvalidOperator(_))
        ));
        assert!(matches!(
            "=".parse::<Operator>(),
            Err(KiodbError::InvalidOperator(_))
        ));
    }

    #[test]
    fn test_object_equality_is_deep() {
        let row = record(json!({"payload": {"a": 1, "b": [1, 2]}}));
        assert!(matches(
            &row,
            &[Condition::eq("payload", json!({"a": 1, "b": [1, 2]}))]
        )
        .unwrap());
        assert!(!matches(
            &row,
            &[Condition::eq("payload", json!({"a": 2}))]
        )
        .unwrap());
    }
}
