//! DELETE extraction

use super::expr;
use super::query::QueryExtractor;
use pgparser_core::{ParsedQuery, QueryCommand, SubqueryClause, UsageType};
use sqlparser::ast::{Delete, FromTable};

pub fn extract(sql: &str, delete: &Delete) -> ParsedQuery {
    let mut extractor = QueryExtractor::new(sql, QueryCommand::Delete);
    extractor.push_scope();

    let targets = match &delete.from {
        FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
    };
    extractor.visit_from(targets, SubqueryClause::Other);

    if let Some(using) = &delete.using {
        extractor.visit_from(using, SubqueryClause::From);
    }

    if let Some(selection) = &delete.selection {
        extractor.scan_expr(selection, Some(UsageType::Filter), SubqueryClause::Where);
        extractor.ir_mut().where_clause = expr::conjuncts(Some(selection));
    }

    if let Some(returning) = &delete.returning {
        extractor.visit_returning(returning);
    }

    extractor.pop_scope();
    extractor.finish()
}
