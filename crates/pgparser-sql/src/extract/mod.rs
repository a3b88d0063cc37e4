//! IR extraction
//!
//! Routes a classified statement to its extractor, then collects bind
//! parameters and classifies column usage.

pub mod expr;
pub mod query;
mod insert;
mod update;
mod delete;
mod merge;
mod ddl;
pub mod params;

use crate::dispatch::{self, StatementKind};
use crate::parser::{ParsedSql, SyntaxTree};
use pgparser_core::{ParsedQuery, QueryCommand};
use query::QueryExtractor;

/// Build the IR for a parsed statement
pub fn extract(parsed: &ParsedSql) -> ParsedQuery {
    let sql = parsed.sql.as_str();

    let mut ir = match dispatch::classify(&parsed.tree) {
        StatementKind::Select(query) => {
            let mut extractor = QueryExtractor::new(sql, QueryCommand::Select);
            extractor.visit_query(query, true);
            extractor.finish()
        }
        StatementKind::Insert(insert) => insert::extract(sql, insert),
        StatementKind::Update(update) => update::extract(sql, &update),
        StatementKind::Delete(delete) => delete::extract(sql, delete),
        StatementKind::Merge(merge) => merge::extract(sql, &merge),
        StatementKind::Ddl(ddl) => ddl::extract(sql, &ddl),
        StatementKind::Utility(_) | StatementKind::Unrecognized => {
            return ParsedQuery::unknown(sql);
        }
    };

    if let SyntaxTree::Statement(statement) = &parsed.tree {
        ir.parameters = params::collect(statement.as_ref());
    }

    ir.classify_column_usage();
    ir
}
