//! Bind parameter collection

use pgparser_core::Parameter;
use sqlparser::ast::{Expr, Value, Visit, Visitor};
use std::ops::ControlFlow;

/// Collect `$n`, `?` and named placeholders in first-seen order.
///
/// `$n` is deduplicated by position and named placeholders by name; every
/// `?` is a new ordinal position.
pub fn collect<V: Visit>(node: &V) -> Vec<Parameter> {
    let mut collector = ParameterCollector::default();
    let _ = node.visit(&mut collector);
    collector.parameters
}

#[derive(Default)]
struct ParameterCollector {
    parameters: Vec<Parameter>,
    question_marks: usize,
}

impl ParameterCollector {
    fn add(&mut self, placeholder: &str) {
        let parameter = if placeholder == "?" {
            self.question_marks += 1;
            Parameter {
                position: Some(self.question_marks),
                name: placeholder.to_string(),
            }
        } else if let Some(position) = placeholder
            .strip_prefix('$')
            .and_then(|n| n.parse::<usize>().ok())
        {
            if self.parameters.iter().any(|p| p.position == Some(position)) {
                return;
            }
            Parameter {
                position: Some(position),
                name: placeholder.to_string(),
            }
        } else {
            if self.parameters.iter().any(|p| p.name == placeholder) {
                return;
            }
            Parameter {
                position: None,
                name: placeholder.to_string(),
            }
        };

        self.parameters.push(parameter);
    }
}

impl Visitor for ParameterCollector {
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if let Expr::Value(Value::Placeholder(placeholder)) = expr {
            self.add(placeholder);
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use crate::parse_sql;
    use pretty_assertions::assert_eq;

    fn positions(sql: &str) -> Vec<(Option<usize>, String)> {
        parse_sql(sql)
            .unwrap()
            .parameters
            .into_iter()
            .map(|p| (p.position, p.name))
            .collect()
    }

    #[test]
    fn dollar_parameters_are_deduplicated() {
        assert_eq!(
            positions("SELECT * FROM t WHERE a = $2 OR b = $1 OR c = $2"),
            vec![(Some(2), "$2".to_string()), (Some(1), "$1".to_string())]
        );
    }

    #[test]
    fn question_marks_are_ordinal() {
        assert_eq!(
            positions("SELECT * FROM t WHERE a = ? AND b IN (?, ?)"),
            vec![
                (Some(1), "?".to_string()),
                (Some(2), "?".to_string()),
                (Some(3), "?".to_string())
            ]
        );
    }

    #[test]
    fn jsonb_question_operator_is_not_a_parameter() {
        assert!(positions("SELECT * FROM docs WHERE body ? 'key'").is_empty());
    }

    #[test]
    fn named_parameters() {
        assert_eq!(
            positions("SELECT * FROM t WHERE a = :tenant AND b = :tenant"),
            vec![(None, ":tenant".to_string())]
        );
    }
}
