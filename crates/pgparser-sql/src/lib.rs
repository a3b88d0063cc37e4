//! PostgreSQL SQL to IR
//!
//! This crate handles:
//! - Parsing the first statement with sqlparser-rs (PostgreSQL dialect)
//! - Recognizing SET/SHOW/RESET utility statements without the grammar
//! - Classifying statements and extracting the `ParsedQuery` IR
//! - Collecting bind parameters and column usage

pub mod parser;
pub mod utility;
pub mod dispatch;
pub mod extract;

pub use parser::{SqlParser, ParsedSql, SyntaxTree};
pub use utility::{UtilityStatement, UtilityKind, SetScope};
pub use dispatch::StatementKind;
pub use extract::extract;

use pgparser_core::{ParseError, ParsedQuery, ParserOptions};

/// Parse `sql` into the IR with default options
///
/// Only the first statement is processed. Utility statements and valid but
/// unmodeled statements come back with `command = Unknown`.
pub fn parse_sql(sql: &str) -> Result<ParsedQuery, ParseError> {
    parse_sql_with_options(sql, ParserOptions::default())
}

/// Parse `sql` into the IR with explicit parser options
pub fn parse_sql_with_options(sql: &str, options: ParserOptions) -> Result<ParsedQuery, ParseError> {
    let parsed = SqlParser::with_options(options).parse(sql)?;
    let ir = extract(&parsed);

    tracing::debug!(
        command = %ir.command,
        tables = ir.tables.len(),
        usages = ir.column_usage.len(),
        "extracted IR"
    );

    Ok(ir)
}
