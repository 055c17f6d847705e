//! Clause records accumulated by the builder and consumed by the compiler.

use searchql_model::Value;

use crate::error::QueryError;

/// Comparison operator of a structured filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    In,
    NotIn,
    Between,
}

impl Operator {
    /// Parse an operator string, case-folded, against the fixed set.
    pub fn parse(input: &str) -> Result<Operator, QueryError> {
        match input.trim().to_ascii_uppercase().as_str() {
            "=" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            "<" => Ok(Self::Lt),
            ">" => Ok(Self::Gt),
            "<=" => Ok(Self::Le),
            ">=" => Ok(Self::Ge),
            "IN" => Ok(Self::In),
            "NOT IN" => Ok(Self::NotIn),
            "BETWEEN" => Ok(Self::Between),
            _ => Err(QueryError::UnknownOperator(input.to_string())),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Between => "BETWEEN",
        }
    }
}

/// One filter condition.
///
/// Structured conditions carry a validated operator/value pair; raw
/// conditions are emitted verbatim with no column or operator decoration.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Structured {
        column: String,
        operator: Operator,
        value: Value,
    },
    Raw(String),
}

impl Condition {
    /// Build a structured condition, enforcing the operator's value shape:
    /// `BETWEEN` takes exactly two values, `IN`/`NOT IN` take a sequence.
    pub fn structured(
        column: impl Into<String>,
        operator: Operator,
        value: Value,
    ) -> Result<Condition, QueryError> {
        match operator {
            Operator::Between => match &value {
                Value::List(bounds) if bounds.len() == 2 => {}
                _ => return Err(QueryError::BetweenBounds),
            },
            Operator::In | Operator::NotIn if !value.is_list() => {
                return Err(QueryError::ExpectedSequence(operator.as_str()));
            }
            _ => {}
        }

        Ok(Condition::Structured {
            column: column.into(),
            operator,
            value,
        })
    }

    /// Build a condition with the operator inferred from the value shape:
    /// sequences filter with `IN`, everything else with `=`.
    pub fn inferred(column: impl Into<String>, value: Value) -> Condition {
        let operator = if value.is_list() {
            Operator::In
        } else {
            Operator::Eq
        };

        Condition::Structured {
            column: column.into(),
            operator,
            value,
        }
    }

    pub fn raw(expression: impl Into<String>) -> Condition {
        Condition::Raw(expression.into())
    }
}

/// Sort direction. Unrecognized input falls back to ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl From<&str> for SortOrder {
    fn from(input: &str) -> Self {
        if input.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

/// One ORDER BY / WITHIN GROUP ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub column: String,
    pub order: SortOrder,
}

/// One or more field names a full-text term applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldList(Vec<String>);

impl FieldList {
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for FieldList {
    fn from(name: &str) -> Self {
        FieldList(vec![name.to_string()])
    }
}

impl From<String> for FieldList {
    fn from(name: String) -> Self {
        FieldList(vec![name])
    }
}

impl From<Vec<String>> for FieldList {
    fn from(names: Vec<String>) -> Self {
        FieldList(names)
    }
}

impl From<Vec<&str>> for FieldList {
    fn from(names: Vec<&str>) -> Self {
        FieldList(names.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FieldList {
    fn from(names: [&str; N]) -> Self {
        FieldList(names.into_iter().map(String::from).collect())
    }
}

/// One processed full-text term.
///
/// `safe` marks text that is already valid full-text syntax and must not be
/// escaped again.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchTerm {
    pub fields: FieldList,
    pub text: String,
    pub safe: bool,
}

/// Boolean join of a raw full-text term with the terms before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchCombinator {
    And,
    Or,
}

impl MatchCombinator {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// One raw full-text expression, spliced in unescaped.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatchTerm {
    pub text: String,
    pub combinator: MatchCombinator,
}

/// One engine option, rendered verbatim as `name = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionEntry {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_parse_case_folds() {
        assert_eq!(Operator::parse("between").unwrap(), Operator::Between);
        assert_eq!(Operator::parse("In").unwrap(), Operator::In);
        assert_eq!(Operator::parse(" not in ").unwrap(), Operator::NotIn);
        assert_eq!(Operator::parse("!=").unwrap(), Operator::Ne);
    }

    #[test]
    fn test_operator_parse_rejects_unknown() {
        assert_eq!(
            Operator::parse("~"),
            Err(QueryError::UnknownOperator("~".to_string()))
        );
        assert!(Operator::parse("LIKE").is_err());
    }

    #[test]
    fn test_between_needs_two_bounds() {
        assert_eq!(
            Condition::structured("id", Operator::Between, Value::from([1])),
            Err(QueryError::BetweenBounds)
        );
        assert_eq!(
            Condition::structured("id", Operator::Between, Value::from(1)),
            Err(QueryError::BetweenBounds)
        );
        assert!(Condition::structured("id", Operator::Between, Value::from([1, 5])).is_ok());
    }

    #[test]
    fn test_in_needs_sequence() {
        assert_eq!(
            Condition::structured("id", Operator::In, Value::from(1)),
            Err(QueryError::ExpectedSequence("IN"))
        );
        assert!(Condition::structured("id", Operator::NotIn, Value::from([1, 2])).is_ok());
    }

    #[test]
    fn test_inference_prefers_in_for_sequences() {
        match Condition::inferred("id", Value::from([1, 2])) {
            Condition::Structured { operator, .. } => assert_eq!(operator, Operator::In),
            other => panic!("Expected structured condition, got {:?}", other),
        }
        match Condition::inferred("id", Value::from(7)) {
            Condition::Structured { operator, .. } => assert_eq!(operator, Operator::Eq),
            other => panic!("Expected structured condition, got {:?}", other),
        }
    }

    #[test]
    fn test_sort_order_is_lenient() {
        assert_eq!(SortOrder::from("desc"), SortOrder::Desc);
        assert_eq!(SortOrder::from("DESC"), SortOrder::Desc);
        assert_eq!(SortOrder::from("ascending-ish"), SortOrder::Asc);
        assert_eq!(SortOrder::from(""), SortOrder::Asc);
    }

    #[test]
    fn test_field_list_conversions() {
        assert_eq!(FieldList::from("title").names(), ["title"]);
        assert_eq!(
            FieldList::from(["title", "content"]).names(),
            ["title", "content"]
        );
    }
}
