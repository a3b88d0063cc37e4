//! WHERE / HAVING condition extraction
//!
//! Flattens a predicate into `{column, operator, value}` leaves. AND/OR are
//! walked but not kept, so `a = 1 OR b = 2` and `a = 1 AND b = 2` produce the
//! same conditions. NOT negates the operator of each leaf beneath it.

use pgparser_sql::extract::expr::column_name;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{BinaryOperator, Expr, UnaryOperator};

/// A flattened predicate leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhereCondition {
    /// Column as written (`o.status`)
    pub column: String,

    /// `=`, `<>`, `IN`, `NOT BETWEEN`, `IS NULL`, `= ANY`, ...
    pub operator: String,

    /// Right-hand side text; empty for unary tests such as `IS NULL`
    pub value: String,
}

/// Extract the conditions of a predicate
pub fn extract_conditions(predicate: &Expr) -> Vec<WhereCondition> {
    let mut conditions = Vec::new();
    walk(predicate, false, &mut conditions);
    conditions
}

fn walk(expr: &Expr, negated: bool, out: &mut Vec<WhereCondition>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And | BinaryOperator::Or,
            right,
        } => {
            walk(left, negated, out);
            walk(right, negated, out);
        }
        Expr::Nested(inner) => walk(inner, negated, out),
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => walk(expr, !negated, out),
        Expr::BinaryOp { left, op, right } => {
            let Some(operator) = comparison(op) else {
                return;
            };

            let (column, value, operator) = match (column_name(left), column_name(right)) {
                (Some(column), _) => (column, right.to_string(), operator),
                (None, Some(column)) => (column, left.to_string(), flip(operator)),
                (None, None) => return,
            };

            push(out, column.to_string(), operator, value, negated);
        }
        Expr::InList {
            expr,
            list,
            negated: not,
        } => {
            let values: Vec<_> = list.iter().map(|v| v.to_string()).collect();
            leaf(out, expr, if *not { "NOT IN" } else { "IN" }, format!("({})", values.join(", ")), negated);
        }
        Expr::InSubquery {
            expr,
            subquery,
            negated: not,
        } => leaf(out, expr, if *not { "NOT IN" } else { "IN" }, format!("({})", subquery), negated),
        Expr::Between {
            expr,
            negated: not,
            low,
            high,
        } => leaf(
            out,
            expr,
            if *not { "NOT BETWEEN" } else { "BETWEEN" },
            format!("{} AND {}", low, high),
            negated,
        ),
        Expr::Like {
            negated: not,
            expr,
            pattern,
            ..
        } => leaf(out, expr, if *not { "NOT LIKE" } else { "LIKE" }, pattern.to_string(), negated),
        Expr::ILike {
            negated: not,
            expr,
            pattern,
            ..
        } => leaf(out, expr, if *not { "NOT ILIKE" } else { "ILIKE" }, pattern.to_string(), negated),
        Expr::IsNull(expr) => leaf(out, expr, "IS NULL", String::new(), negated),
        Expr::IsNotNull(expr) => leaf(out, expr, "IS NOT NULL", String::new(), negated),
        Expr::IsTrue(expr) => leaf(out, expr, "IS TRUE", String::new(), negated),
        Expr::IsNotTrue(expr) => leaf(out, expr, "IS NOT TRUE", String::new(), negated),
        Expr::IsFalse(expr) => leaf(out, expr, "IS FALSE", String::new(), negated),
        Expr::IsNotFalse(expr) => leaf(out, expr, "IS NOT FALSE", String::new(), negated),
        Expr::AnyOp {
            left,
            compare_op,
            right,
            ..
        } => leaf(out, left, &format!("{} ANY", compare_op), right.to_string(), negated),
        Expr::AllOp {
            left,
            compare_op,
            right,
            ..
        } => leaf(out, left, &format!("{} ALL", compare_op), right.to_string(), negated),
        _ => {}
    }
}

/// Record a leaf whose column operand is `expr`; skipped when it is not a column
fn leaf(out: &mut Vec<WhereCondition>, expr: &Expr, operator: &str, value: String, negated: bool) {
    if let Some(column) = column_name(expr) {
        push(out, column.to_string(), operator, value, negated);
    }
}

fn push(out: &mut Vec<WhereCondition>, column: String, operator: &str, value: String, negated: bool) {
    let operator = if negated { negate(operator) } else { operator.to_string() };
    out.push(WhereCondition {
        column,
        operator,
        value,
    });
}

fn comparison(op: &BinaryOperator) -> Option<&'static str> {
    match op {
        BinaryOperator::Eq => Some("="),
        BinaryOperator::NotEq => Some("<>"),
        BinaryOperator::Lt => Some("<"),
        BinaryOperator::LtEq => Some("<="),
        BinaryOperator::Gt => Some(">"),
        BinaryOperator::GtEq => Some(">="),
        _ => None,
    }
}

/// Operator with its operands swapped (`5 < x` is `x > 5`)
fn flip(operator: &str) -> &str {
    match operator {
        "<" => ">",
        "<=" => ">=",
        ">" => "<",
        ">=" => "<=",
        other => other,
    }
}

fn negate(operator: &str) -> String {
    let negated = match operator {
        "=" => "<>",
        "<>" => "=",
        "<" => ">=",
        "<=" => ">",
        ">" => "<=",
        ">=" => "<",
        "IS NULL" => "IS NOT NULL",
        "IS NOT NULL" => "IS NULL",
        "IS TRUE" => "IS NOT TRUE",
        "IS NOT TRUE" => "IS TRUE",
        "IS FALSE" => "IS NOT FALSE",
        "IS NOT FALSE" => "IS FALSE",
        other => {
            return match other.strip_prefix("NOT ") {
                Some(positive) => positive.to_string(),
                None => format!("NOT {}", other),
            };
        }
    };

    negated.to_string()
}
