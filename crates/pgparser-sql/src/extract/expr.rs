//! Expression helpers shared by the extractors

use pgparser_core::{ColumnEquality, ColumnName};
use sqlparser::ast::{BinaryOperator, Expr, Ident, ObjectName, Query, Value, Visit, Visitor};
use std::ops::ControlFlow;

/// Split a predicate on its top-level ANDs
pub fn split_conjuncts(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            let mut parts = split_conjuncts(left);
            parts.extend(split_conjuncts(right));
            parts
        }
        other => vec![other],
    }
}

/// Rendered top-level conjuncts of an optional predicate
pub fn conjuncts(predicate: Option<&Expr>) -> Vec<String> {
    predicate
        .map(|e| split_conjuncts(e).into_iter().map(|part| part.to_string()).collect())
        .unwrap_or_default()
}

/// Column name of a bare or qualified identifier operand
pub fn column_name(expr: &Expr) -> Option<ColumnName> {
    match expr {
        Expr::Identifier(ident) => Some(ColumnName::new(None, ident.value.clone())),
        Expr::CompoundIdentifier(parts) => compound_name(parts),
        Expr::Nested(inner) => column_name(inner),
        _ => None,
    }
}

fn compound_name(parts: &[Ident]) -> Option<ColumnName> {
    let (column, qualifier) = parts.split_last()?;
    let qualifier = if qualifier.is_empty() {
        None
    } else {
        Some(join_idents(qualifier))
    };

    Some(ColumnName::new(qualifier, column.value.clone()))
}

/// Column name of an assignment target (`status`, `t.status`)
pub fn object_column(name: &ObjectName) -> Option<ColumnName> {
    compound_name(&name.0)
}

/// `a.b.c` without quoting
pub fn join_idents(parts: &[Ident]) -> String {
    parts
        .iter()
        .map(|p| p.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

/// Split an object name into (schema, name)
pub fn split_object_name(name: &ObjectName) -> (Option<String>, String) {
    match name.0.split_last() {
        Some((last, [])) => (None, last.value.clone()),
        Some((last, rest)) => (Some(join_idents(rest)), last.value.clone()),
        None => (None, name.to_string()),
    }
}

/// Column-to-column equalities among the conjuncts of a join condition
pub fn equalities(expr: &Expr) -> Vec<ColumnEquality> {
    split_conjuncts(expr)
        .into_iter()
        .filter_map(|part| match strip_nesting(part) {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Eq,
                right,
            } => Some(ColumnEquality::new(column_name(left)?, column_name(right)?)),
            _ => None,
        })
        .collect()
}

fn strip_nesting(expr: &Expr) -> &Expr {
    match expr {
        Expr::Nested(inner) => strip_nesting(inner),
        other => other,
    }
}

/// Literal unsigned integer (LIMIT 10)
pub fn unsigned_literal(expr: &Expr) -> Option<u64> {
    match expr {
        Expr::Value(Value::Number(n, _)) => n.parse().ok(),
        Expr::Nested(inner) => unsigned_literal(inner),
        _ => None,
    }
}

/// Column references and nested queries directly inside an expression
///
/// References inside nested queries are left to the nested query's own
/// extraction.
#[derive(Default)]
pub struct ExprScan {
    pub columns: Vec<ColumnName>,
    pub queries: Vec<Query>,
    depth: usize,
}

impl ExprScan {
    pub fn scan(expr: &Expr) -> Self {
        let mut scan = Self::default();
        let _ = expr.visit(&mut scan);
        scan
    }
}

impl Visitor for ExprScan {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if self.depth == 0 {
            self.queries.push(query.clone());
        }
        self.depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.depth -= 1;
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if self.depth == 0 {
            match expr {
                Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
                    if let Some(name) = column_name(expr) {
                        self.columns.push(name);
                    }
                }
                _ => {}
            }
        }
        ControlFlow::Continue(())
    }
}
