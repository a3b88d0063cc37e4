//! INSERT extraction

use super::expr::split_object_name;
use super::query::QueryExtractor;
use pgparser_core::{ParsedQuery, QueryCommand, SubqueryClause, TableRef, Upsert, UpsertAction, UsageType};
use sqlparser::ast::{ConflictTarget, Insert, OnConflictAction, OnInsert};

pub fn extract(sql: &str, insert: &Insert) -> ParsedQuery {
    let mut extractor = QueryExtractor::new(sql, QueryCommand::Insert);

    let (schema, name) = split_object_name(&insert.table_name);
    extractor.push_scope();
    extractor.register(
        TableRef::base(name)
            .with_schema(schema)
            .with_alias(insert.table_alias.as_ref().map(|a| a.value.clone())),
    );

    extractor.ir_mut().insert_columns = insert.columns.iter().map(|c| c.value.clone()).collect();

    if let Some(source) = &insert.source {
        extractor.visit_query(source, false);
    }

    if let Some(OnInsert::OnConflict(conflict)) = &insert.on {
        let (conflict_target, constraint) = match &conflict.conflict_target {
            Some(ConflictTarget::Columns(columns)) => {
                (columns.iter().map(|c| c.value.clone()).collect(), None)
            }
            Some(ConflictTarget::OnConstraint(name)) => (Vec::new(), Some(name.to_string())),
            None => (Vec::new(), None),
        };

        let upsert = match &conflict.action {
            OnConflictAction::DoNothing => Upsert {
                action: UpsertAction::DoNothing,
                conflict_target,
                constraint,
                set_clauses: Vec::new(),
                filter: None,
            },
            OnConflictAction::DoUpdate(update) => {
                let set_clauses = extractor.visit_assignments(&update.assignments);
                if let Some(selection) = &update.selection {
                    extractor.scan_expr(selection, Some(UsageType::Filter), SubqueryClause::Where);
                }

                Upsert {
                    action: UpsertAction::DoUpdate,
                    conflict_target,
                    constraint,
                    set_clauses,
                    filter: update.selection.as_ref().map(|s| s.to_string()),
                }
            }
        };

        extractor.ir_mut().upsert = Some(upsert);
    }

    if let Some(returning) = &insert.returning {
        extractor.visit_returning(returning);
    }

    extractor.pop_scope();
    extractor.finish()
}
