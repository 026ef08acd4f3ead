//! Filter expressions for graphstore
//!
//! A filter is a recursive boolean structure: comparison leaves over the
//! `meta.` namespace, AND/OR/NOT interior nodes. Filters arrive either as
//! typed [`FilterExpr`] values or as loose JSON objects
//! (`{"field", "operator", "value"}` leaves, `{"operator", "conditions"}`
//! interior nodes) parsed by [`FilterExpr::from_json`].
//!
//! The compiler in [`compile`] turns a filter into one predicate string over
//! the typed metadata columns. Column routing is type-directed: the query
//! literal's own type selects the storage bucket, so a stored integer can
//! never be matched by a float-typed literal. That coupling is a contract,
//! not an accident.

mod compile;

pub use compile::compile;

use serde_json::Value as Json;
use thiserror::Error;

use crate::document::MetaValue;

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Invalid-filter errors. All are caller-input errors, raised at the point
/// of detection with no retry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    #[error("Filter field '{0}' is outside the 'meta.' namespace")]
    FieldOutsideMeta(String),

    #[error("Unsupported comparison operator: {0}")]
    UnknownComparator(String),

    #[error("Unsupported logic operator: {0}")]
    UnknownLogicOperator(String),

    #[error("Operator '{0}' requires a list value")]
    ListExpected(&'static str),

    #[error("Operator '{0}' requires a scalar value")]
    ScalarExpected(&'static str),

    #[error("List values must share one scalar type")]
    MixedTypeList,

    #[error("Membership list is empty")]
    EmptyList,

    #[error("A null value cannot be routed to a typed column")]
    NullComparison,

    #[error("Float value for '{0}' must be finite")]
    NonFiniteFloat(String),

    #[error("Logic node has no conditions")]
    EmptyLogicNode,

    #[error("Malformed filter: {0}")]
    Malformed(String),
}

/// Comparison operators for filter leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
}

impl CompareOp {
    /// Parses the caller-facing operator token.
    pub fn parse(token: &str) -> FilterResult<Self> {
        match token {
            "==" => Ok(CompareOp::Eq),
            "!=" => Ok(CompareOp::Ne),
            ">" => Ok(CompareOp::Gt),
            ">=" => Ok(CompareOp::Gte),
            "<" => Ok(CompareOp::Lt),
            "<=" => Ok(CompareOp::Lte),
            "in" => Ok(CompareOp::In),
            "not in" => Ok(CompareOp::NotIn),
            other => Err(FilterError::UnknownComparator(other.to_string())),
        }
    }

    /// Returns true for the membership operators, which require a list value.
    pub fn wants_list(&self) -> bool {
        matches!(self, CompareOp::In | CompareOp::NotIn)
    }

    /// Caller-facing operator token, for error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
        }
    }
}

/// Logic operators for filter interior nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
    Not,
}

impl LogicOp {
    /// Parses the caller-facing operator token (case-insensitive).
    pub fn parse(token: &str) -> FilterResult<Self> {
        match token.to_ascii_uppercase().as_str() {
            "AND" => Ok(LogicOp::And),
            "OR" => Ok(LogicOp::Or),
            "NOT" => Ok(LogicOp::Not),
            _ => Err(FilterError::UnknownLogicOperator(token.to_string())),
        }
    }

    /// Query-language keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            LogicOp::And => "AND",
            LogicOp::Or => "OR",
            LogicOp::Not => "NOT",
        }
    }
}

/// A comparison literal: one scalar, a list of scalars, or null.
///
/// Null is renderable as a literal but cannot route a scalar comparison
/// to a typed column, so `Comparison` with a null value fails to compile.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(MetaValue),
    List(Vec<MetaValue>),
    Null,
}

impl FilterValue {
    fn from_json_scalar(value: &Json) -> FilterResult<MetaValue> {
        match value {
            Json::String(s) => Ok(MetaValue::Str(s.clone())),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(MetaValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(MetaValue::Float(f))
                } else {
                    Err(FilterError::Malformed(format!("unrepresentable number: {n}")))
                }
            }
            other => Err(FilterError::Malformed(format!(
                "unsupported literal type: {other}"
            ))),
        }
    }

    /// Converts a loose JSON value into a filter literal.
    pub fn from_json(value: &Json) -> FilterResult<Self> {
        match value {
            Json::Null => Ok(FilterValue::Null),
            Json::Array(items) => {
                let items = items
                    .iter()
                    .map(Self::from_json_scalar)
                    .collect::<FilterResult<Vec<_>>>()?;
                Ok(FilterValue::List(items))
            }
            other => Ok(FilterValue::Scalar(Self::from_json_scalar(other)?)),
        }
    }
}

impl From<MetaValue> for FilterValue {
    fn from(v: MetaValue) -> Self {
        FilterValue::Scalar(v)
    }
}

/// A filter expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Leaf: `meta.<key> <op> <value>`
    Comparison {
        /// Field reference, must be of the form `meta.<key>`
        field: String,
        op: CompareOp,
        value: FilterValue,
    },
    /// Interior node combining child expressions
    Logic {
        op: LogicOp,
        children: Vec<FilterExpr>,
    },
}

impl FilterExpr {
    /// Creates a comparison leaf.
    pub fn compare(
        field: impl Into<String>,
        op: CompareOp,
        value: impl Into<FilterValue>,
    ) -> Self {
        FilterExpr::Comparison {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Creates an AND node.
    pub fn and(children: Vec<FilterExpr>) -> Self {
        FilterExpr::Logic {
            op: LogicOp::And,
            children,
        }
    }

    /// Creates an OR node.
    pub fn or(children: Vec<FilterExpr>) -> Self {
        FilterExpr::Logic {
            op: LogicOp::Or,
            children,
        }
    }

    /// Creates a NOT node. With several children, NOT negates their
    /// conjunction: `NOT (c1 AND c2 AND ...)`.
    pub fn negate(children: Vec<FilterExpr>) -> Self {
        FilterExpr::Logic {
            op: LogicOp::Not,
            children,
        }
    }

    /// Parses a loosely structured JSON filter.
    ///
    /// A leaf is `{"field": "meta.<key>", "operator": <cmp>, "value": ...}`;
    /// an interior node is `{"operator": "AND"|"OR"|"NOT",
    /// "conditions": [...]}`. Anything else is a [`FilterError`].
    pub fn from_json(value: &Json) -> FilterResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| FilterError::Malformed("filter must be an object".into()))?;

        let operator = object
            .get("operator")
            .and_then(Json::as_str)
            .ok_or_else(|| FilterError::Malformed("filter is missing 'operator'".into()))?;

        if let Some(conditions) = object.get("conditions") {
            let op = LogicOp::parse(operator)?;
            let children = conditions
                .as_array()
                .ok_or_else(|| FilterError::Malformed("'conditions' must be an array".into()))?
                .iter()
                .map(Self::from_json)
                .collect::<FilterResult<Vec<_>>>()?;
            return Ok(FilterExpr::Logic { op, children });
        }

        let field = object
            .get("field")
            .and_then(Json::as_str)
            .ok_or_else(|| FilterError::Malformed("comparison is missing 'field'".into()))?;
        let op = CompareOp::parse(operator)?;
        let value = FilterValue::from_json(
            object
                .get("value")
                .ok_or_else(|| FilterError::Malformed("comparison is missing 'value'".into()))?,
        )?;

        Ok(FilterExpr::Comparison {
            field: field.to_string(),
            op,
            value,
        })
    }
}
