//! UPDATE extraction

use super::expr;
use super::query::QueryExtractor;
use crate::dispatch::UpdateStatement;
use pgparser_core::{ParsedQuery, QueryCommand, SubqueryClause, UsageType};

pub fn extract(sql: &str, update: &UpdateStatement<'_>) -> ParsedQuery {
    let mut extractor = QueryExtractor::new(sql, QueryCommand::Update);
    extractor.push_scope();

    extractor.visit_from(std::slice::from_ref(update.table), SubqueryClause::Other);
    if let Some(from) = update.from {
        extractor.visit_from(std::slice::from_ref(from), SubqueryClause::From);
    }

    let set_clauses = extractor.visit_assignments(update.assignments);
    extractor.ir_mut().set_clauses = set_clauses;

    if let Some(selection) = update.selection {
        extractor.scan_expr(selection, Some(UsageType::Filter), SubqueryClause::Where);
        extractor.ir_mut().where_clause = expr::conjuncts(Some(selection));
    }

    if let Some(returning) = update.returning {
        extractor.visit_returning(returning);
    }

    extractor.pop_scope();
    extractor.finish()
}
