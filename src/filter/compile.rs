//! Filter-to-predicate compiler
//!
//! Compiles a [`FilterExpr`] into one boolean predicate string that is
//! valid verbatim after a `WHERE` clause. Pure function, no engine access.
//!
//! Routing rule: the literal's type discriminant selects the typed column
//! (`Str` → `meta_STRING`, `Int` → `meta_INT`, `Float` → `meta_FLOAT`).
//! Literal rule: strings are single-quoted with embedded quotes doubled,
//! ints are bare, floats always carry a decimal point, null renders as
//! `NULL`.

use crate::document::MetaValue;

use super::{CompareOp, FilterError, FilterExpr, FilterResult, FilterValue, LogicOp};

/// Field-reference namespace accepted by the compiler.
const META_PREFIX: &str = "meta.";

/// Compiles a filter expression into a predicate string.
pub fn compile(expr: &FilterExpr) -> FilterResult<String> {
    match expr {
        FilterExpr::Comparison { field, op, value } => compile_comparison(field, *op, value),
        FilterExpr::Logic { op, children } => compile_logic(*op, children),
    }
}

fn compile_comparison(field: &str, op: CompareOp, value: &FilterValue) -> FilterResult<String> {
    let key = field
        .strip_prefix(META_PREFIX)
        .ok_or_else(|| FilterError::FieldOutsideMeta(field.to_string()))?;

    if op.wants_list() {
        let items = match value {
            FilterValue::List(items) => items,
            _ => return Err(FilterError::ListExpected(op.as_str())),
        };
        let column = list_column(items)?;
        for item in items {
            ensure_finite(field, item)?;
        }
        let lookup = map_lookup(column, key);
        let rendered = items.iter().map(render_scalar).collect::<Vec<_>>().join(", ");
        return Ok(match op {
            CompareOp::In => format!("{lookup} IN [{rendered}]"),
            // A missing key is NULL, which never matches IN, so the
            // negation holds: `not in` accepts documents without the
            // key, while `!=` never does.
            CompareOp::NotIn => format!("NOT {lookup} IN [{rendered}]"),
            _ => unreachable!("wants_list covers exactly In and NotIn"),
        });
    }

    let scalar = match value {
        FilterValue::Scalar(scalar) => scalar,
        FilterValue::List(_) => return Err(FilterError::ScalarExpected(op.as_str())),
        FilterValue::Null => return Err(FilterError::NullComparison),
    };
    ensure_finite(field, scalar)?;
    let lookup = map_lookup(scalar.column(), key);
    let symbol = match op {
        CompareOp::Eq => "=",
        CompareOp::Ne => "<>",
        CompareOp::Gt => ">",
        CompareOp::Gte => ">=",
        CompareOp::Lt => "<",
        CompareOp::Lte => "<=",
        CompareOp::In | CompareOp::NotIn => unreachable!("handled above"),
    };

    Ok(format!("{lookup} {symbol} {}", render_scalar(scalar)))
}

fn compile_logic(op: LogicOp, children: &[FilterExpr]) -> FilterResult<String> {
    if children.is_empty() {
        return Err(FilterError::EmptyLogicNode);
    }

    let compiled = children
        .iter()
        .map(|child| {
            let mut part = compile(child)?;
            // Nested logic nodes are parenthesized to preserve precedence.
            if matches!(child, FilterExpr::Logic { .. }) && !part.starts_with('(') {
                part = format!("({part})");
            }
            Ok(part)
        })
        .collect::<FilterResult<Vec<_>>>()?;

    match op {
        LogicOp::And | LogicOp::Or => {
            let joined = compiled.join(&format!(" {} ", op.keyword()));
            if compiled.len() >= 2 {
                Ok(format!("({joined})"))
            } else {
                Ok(joined)
            }
        }
        // NOT negates the conjunction of all its children.
        LogicOp::Not => Ok(format!("NOT ({})", compiled.join(" AND "))),
    }
}

/// Verifies a membership list is non-empty and single-typed, and returns
/// the column its element type routes to.
fn list_column(items: &[MetaValue]) -> FilterResult<&'static str> {
    let first = items.first().ok_or(FilterError::EmptyList)?;
    let column = first.column();
    if items.iter().any(|item| item.column() != column) {
        return Err(FilterError::MixedTypeList);
    }
    Ok(column)
}

/// NaN and infinity have no predicate literal, so they are rejected
/// here rather than surfacing as an engine syntax error.
fn ensure_finite(field: &str, value: &MetaValue) -> FilterResult<()> {
    match value {
        MetaValue::Float(f) if !f.is_finite() => {
            Err(FilterError::NonFiniteFloat(field.to_string()))
        }
        _ => Ok(()),
    }
}

fn map_lookup(column: &str, key: &str) -> String {
    format!("d.{column}['{}']", escape(key))
}

fn render_scalar(value: &MetaValue) -> String {
    match value {
        MetaValue::Str(s) => format!("'{}'", escape(s)),
        MetaValue::Int(i) => i.to_string(),
        // Always emit a decimal point so the literal re-types as a float.
        MetaValue::Float(f) => {
            if f.fract() == 0.0 && f.is_finite() {
                format!("{f:.1}")
            } else {
                f.to_string()
            }
        }
    }
}

/// Doubles embedded single quotes. Predicate literals are not
/// parameterized, so this is the injection boundary.
fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterExpr;

    fn eq(field: &str, value: MetaValue) -> FilterExpr {
        FilterExpr::compare(field, CompareOp::Eq, value)
    }

    #[test]
    fn test_string_comparison_routes_to_string_column() {
        let pred = compile(&eq("meta.type", MetaValue::Str("article".into()))).unwrap();
        assert_eq!(pred, "d.meta_STRING['type'] = 'article'");
    }

    #[test]
    fn test_int_and_float_routing() {
        let pred = compile(&FilterExpr::compare(
            "meta.rating",
            CompareOp::Gte,
            MetaValue::Int(4),
        ))
        .unwrap();
        assert_eq!(pred, "d.meta_INT['rating'] >= 4");

        let pred = compile(&FilterExpr::compare(
            "meta.score",
            CompareOp::Lt,
            MetaValue::Float(0.5),
        ))
        .unwrap();
        assert_eq!(pred, "d.meta_FLOAT['score'] < 0.5");
    }

    #[test]
    fn test_whole_floats_keep_a_decimal_point() {
        let pred = compile(&eq("meta.score", MetaValue::Float(4.0))).unwrap();
        assert_eq!(pred, "d.meta_FLOAT['score'] = 4.0");
    }

    #[test]
    fn test_ne_uses_angle_brackets() {
        let pred = compile(&FilterExpr::compare(
            "meta.type",
            CompareOp::Ne,
            MetaValue::Str("blog".into()),
        ))
        .unwrap();
        assert_eq!(pred, "d.meta_STRING['type'] <> 'blog'");
    }

    #[test]
    fn test_membership_operators() {
        let pred = compile(&FilterExpr::compare(
            "meta.rating",
            CompareOp::In,
            FilterValue::List(vec![MetaValue::Int(3), MetaValue::Int(4)]),
        ))
        .unwrap();
        assert_eq!(pred, "d.meta_INT['rating'] IN [3, 4]");

        let pred = compile(&FilterExpr::compare(
            "meta.type",
            CompareOp::NotIn,
            FilterValue::List(vec![MetaValue::Str("blog".into())]),
        ))
        .unwrap();
        assert_eq!(pred, "NOT d.meta_STRING['type'] IN ['blog']");
    }

    #[test]
    fn test_membership_requires_list() {
        let err = compile(&FilterExpr::compare(
            "meta.rating",
            CompareOp::In,
            MetaValue::Int(4),
        ))
        .unwrap_err();
        assert_eq!(err, FilterError::ListExpected("in"));
    }

    #[test]
    fn test_mixed_type_list_rejected() {
        let err = compile(&FilterExpr::compare(
            "meta.rating",
            CompareOp::In,
            FilterValue::List(vec![MetaValue::Int(4), MetaValue::Str("four".into())]),
        ))
        .unwrap_err();
        assert_eq!(err, FilterError::MixedTypeList);
    }

    #[test]
    fn test_and_wraps_two_conditions() {
        let expr = FilterExpr::and(vec![
            eq("meta.type", MetaValue::Str("article".into())),
            FilterExpr::compare("meta.rating", CompareOp::Gte, MetaValue::Int(4)),
        ]);
        assert_eq!(
            compile(&expr).unwrap(),
            "(d.meta_STRING['type'] = 'article' AND d.meta_INT['rating'] >= 4)"
        );
    }

    #[test]
    fn test_single_child_logic_not_wrapped() {
        let expr = FilterExpr::and(vec![eq("meta.type", MetaValue::Str("article".into()))]);
        assert_eq!(compile(&expr).unwrap(), "d.meta_STRING['type'] = 'article'");
    }

    #[test]
    fn test_nested_logic_is_parenthesized() {
        let expr = FilterExpr::or(vec![
            FilterExpr::and(vec![
                eq("meta.type", MetaValue::Str("article".into())),
                FilterExpr::compare("meta.rating", CompareOp::Gte, MetaValue::Int(4)),
            ]),
            eq("meta.type", MetaValue::Str("blog".into())),
        ]);
        assert_eq!(
            compile(&expr).unwrap(),
            "((d.meta_STRING['type'] = 'article' AND d.meta_INT['rating'] >= 4) OR d.meta_STRING['type'] = 'blog')"
        );
    }

    #[test]
    fn test_not_negates_conjunction_of_children() {
        let expr = FilterExpr::negate(vec![
            eq("meta.type", MetaValue::Str("blog".into())),
            FilterExpr::compare("meta.rating", CompareOp::Lt, MetaValue::Int(3)),
        ]);
        assert_eq!(
            compile(&expr).unwrap(),
            "NOT (d.meta_STRING['type'] = 'blog' AND d.meta_INT['rating'] < 3)"
        );
    }

    #[test]
    fn test_empty_logic_node_rejected() {
        assert_eq!(
            compile(&FilterExpr::and(vec![])).unwrap_err(),
            FilterError::EmptyLogicNode
        );
    }

    #[test]
    fn test_field_outside_meta_rejected() {
        let err = compile(&eq("content", MetaValue::Str("x".into()))).unwrap_err();
        assert_eq!(err, FilterError::FieldOutsideMeta("content".into()));
    }

    #[test]
    fn test_null_scalar_comparison_rejected() {
        let err = compile(&FilterExpr::Comparison {
            field: "meta.editor".into(),
            op: CompareOp::Eq,
            value: FilterValue::Null,
        })
        .unwrap_err();
        assert_eq!(err, FilterError::NullComparison);
    }

    #[test]
    fn test_non_finite_float_literal_rejected() {
        let err = compile(&eq("meta.score", MetaValue::Float(f64::NAN))).unwrap_err();
        assert_eq!(err, FilterError::NonFiniteFloat("meta.score".into()));

        let err = compile(&FilterExpr::compare(
            "meta.score",
            CompareOp::In,
            FilterValue::List(vec![MetaValue::Float(0.5), MetaValue::Float(f64::INFINITY)]),
        ))
        .unwrap_err();
        assert_eq!(err, FilterError::NonFiniteFloat("meta.score".into()));
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let pred = compile(&eq(
            "meta.title",
            MetaValue::Str("O'Brien's notes".into()),
        ))
        .unwrap();
        assert_eq!(pred, "d.meta_STRING['title'] = 'O''Brien''s notes'");
    }
}
