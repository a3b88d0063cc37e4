//! Schema-aware join resolution
//!
//! Turns the column equalities recorded on each join into foreign-key style
//! relationships using caller-supplied primary-key metadata. Each operand is
//! looked up among the base relations extraction resolved for it in the
//! join's own query block.

use pgparser_core::{ColumnName, ParsedQuery, SchemaColumn, SchemaMap};
use serde::{Deserialize, Serialize};

/// A join edge from a referencing column to a primary key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRelationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

/// A join operand resolved against the schema
struct Endpoint<'a> {
    table: String,
    column: &'a SchemaColumn,
}

/// Resolve join equalities into relationships
///
/// Operands that cannot be placed in the schema, and pairs without exactly one
/// primary-key side, are skipped.
pub fn resolve_relationships(ir: &ParsedQuery, schema: &SchemaMap) -> Vec<JoinRelationship> {
    let mut relationships: Vec<JoinRelationship> = Vec::new();

    for equality in ir.joins.iter().flat_map(|j| &j.equalities) {
        let (Some(left), Some(right)) = (
            resolve(schema, &equality.left, &equality.left_tables),
            resolve(schema, &equality.right, &equality.right_tables),
        ) else {
            tracing::debug!(
                left = %equality.left,
                right = %equality.right,
                "skipping join predicate with an unknown operand"
            );
            continue;
        };

        let (from, to) = match (left.column.is_primary_key, right.column.is_primary_key) {
            (false, true) => (left, right),
            (true, false) => (right, left),
            _ => {
                tracing::debug!(
                    left = %equality.left,
                    right = %equality.right,
                    "skipping join predicate without a single primary key side"
                );
                continue;
            }
        };

        let relationship = JoinRelationship {
            from_table: from.table,
            from_column: from.column.name.clone(),
            to_table: to.table,
            to_column: to.column.name.clone(),
        };

        if !relationships.contains(&relationship) {
            relationships.push(relationship);
        }
    }

    relationships
}

/// Place an operand in exactly one of its candidate tables
fn resolve<'a>(schema: &'a SchemaMap, operand: &ColumnName, tables: &[String]) -> Option<Endpoint<'a>> {
    let mut candidates = tables.iter().filter_map(|name| {
        let column = schema.column(name, &operand.column)?;
        Some(Endpoint {
            table: name.clone(),
            column,
        })
    });

    let only = candidates.next()?;
    match candidates.next() {
        Some(_) => None,
        None => Some(only),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgparser_core::{ColumnEquality, JoinClause, JoinType, QueryCommand};
    use pretty_assertions::assert_eq;

    fn schema() -> SchemaMap {
        let mut schema = SchemaMap::new();
        schema.add_table(
            "orders",
            vec![
                SchemaColumn::new("id", "bigint").primary_key(),
                SchemaColumn::new("customer_id", "bigint"),
                SchemaColumn::new("note", "text"),
            ],
        );
        schema.add_table(
            "customers",
            vec![
                SchemaColumn::new("id", "bigint").primary_key(),
                SchemaColumn::new("email", "text"),
            ],
        );
        schema
    }

    /// Operand with the tables extraction would resolve for it in
    /// `FROM orders o JOIN customers c`
    fn operand(qualifier: Option<&str>, name: &str) -> (ColumnName, Vec<String>) {
        let tables = match qualifier {
            Some("o") => vec!["orders".to_string()],
            Some("c") => vec!["customers".to_string()],
            Some(_) => Vec::new(),
            None => vec!["orders".to_string(), "customers".to_string()],
        };
        (ColumnName::new(qualifier.map(String::from), name), tables)
    }

    fn equality(left: (ColumnName, Vec<String>), right: (ColumnName, Vec<String>)) -> ColumnEquality {
        let mut equality = ColumnEquality::new(left.0, right.0);
        equality.left_tables = left.1;
        equality.right_tables = right.1;
        equality
    }

    fn ir_with(equalities: Vec<ColumnEquality>) -> ParsedQuery {
        let mut ir = ParsedQuery::new(QueryCommand::Select, "");
        ir.joins.push(JoinClause {
            join_type: JoinType::Inner,
            table: "customers".into(),
            alias: Some("c".into()),
            condition: None,
            using: Vec::new(),
            equalities,
        });
        ir
    }

    #[test]
    fn primary_key_side_becomes_target() {
        let ir = ir_with(vec![equality(
            operand(Some("c"), "id"),
            operand(Some("o"), "customer_id"),
        )]);

        assert_eq!(
            resolve_relationships(&ir, &schema()),
            vec![JoinRelationship {
                from_table: "orders".into(),
                from_column: "customer_id".into(),
                to_table: "customers".into(),
                to_column: "id".into(),
            }]
        );
    }

    #[test]
    fn both_or_neither_primary_key_is_skipped() {
        let ir = ir_with(vec![
            equality(
                operand(Some("o"), "id"),
                operand(Some("c"), "id"),
            ),
            equality(
                operand(Some("o"), "note"),
                operand(Some("c"), "email"),
            ),
        ]);

        assert!(resolve_relationships(&ir, &schema()).is_empty());
    }

    #[test]
    fn unqualified_operand_needs_single_owner() {
        let unique = ir_with(vec![equality(
            operand(None, "customer_id"),
            operand(Some("c"), "id"),
        )]);
        assert_eq!(resolve_relationships(&unique, &schema()).len(), 1);

        let ambiguous = ir_with(vec![equality(
            operand(Some("o"), "customer_id"),
            operand(None, "id"),
        )]);
        assert!(resolve_relationships(&ambiguous, &schema()).is_empty());
    }

    #[test]
    fn operands_only_use_their_own_candidates() {
        // `refunds o` in the outer block, `orders o` in a CTE
        let mut left = operand(Some("o"), "customer_id");
        left.1 = vec!["refunds".to_string()];
        let ir = ir_with(vec![equality(left, operand(Some("c"), "id"))]);

        let mut schema = schema();
        schema.add_table(
            "refunds",
            vec![
                SchemaColumn::new("id", "bigint").primary_key(),
                SchemaColumn::new("customer_id", "bigint"),
            ],
        );

        let found = resolve_relationships(&ir, &schema);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].from_table, "refunds");
    }

    #[test]
    fn unknown_tables_are_skipped() {
        let ir = ir_with(vec![equality(
            operand(Some("x"), "customer_id"),
            operand(Some("c"), "id"),
        )]);

        assert!(resolve_relationships(&ir, &schema()).is_empty());
        assert!(resolve_relationships(&ir, &SchemaMap::new()).is_empty());
    }
}
