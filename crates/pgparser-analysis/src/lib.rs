//! pgparser analysis layer
//!
//! This crate post-processes the IR produced by `pgparser-sql`:
//! - WHERE / HAVING condition extraction
//! - Schema-aware join relationship inference
//! - The combined `AnalysisResult`

pub mod conditions;
pub mod joins;
pub mod analyzer;

pub use conditions::{extract_conditions, WhereCondition};
pub use joins::{resolve_relationships, JoinRelationship};
pub use analyzer::{AnalysisResult, Analyzer};

use pgparser_core::{ParseError, SchemaMap};

/// Parse and analyze the first statement of `sql`
pub fn analyze_sql(sql: &str) -> Result<AnalysisResult, ParseError> {
    Analyzer::new().analyze(sql)
}

/// Parse and analyze `sql`, resolving join relationships against `schema`
pub fn analyze_sql_with_schema(sql: &str, schema: &SchemaMap) -> Result<AnalysisResult, ParseError> {
    Analyzer::new().with_schema(schema.clone()).analyze(sql)
}

/// Flattened WHERE conditions of the first statement
pub fn extract_where_conditions(sql: &str) -> Result<Vec<WhereCondition>, ParseError> {
    Ok(analyze_sql(sql)?.where_conditions)
}

/// Join relationships of the first statement
pub fn extract_join_relationships(
    sql: &str,
    schema: &SchemaMap,
) -> Result<Vec<JoinRelationship>, ParseError> {
    Ok(analyze_sql_with_schema(sql, schema)?.join_relationships)
}
