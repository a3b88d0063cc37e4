//! Combined parse + analysis

use crate::conditions::{extract_conditions, WhereCondition};
use crate::joins::{resolve_relationships, JoinRelationship};
use pgparser_core::{Config, ParseError, ParsedQuery, ParserOptions, SchemaMap};
use pgparser_sql::dispatch::{self, StatementKind};
use pgparser_sql::{extract, ParsedSql, SqlParser};
use serde::{Deserialize, Serialize};
use sqlparser::ast::{Expr, Query, Select, SetExpr};

/// IR plus the analysis derived from it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(flatten)]
    pub query: ParsedQuery,

    /// Flattened WHERE predicate leaves
    #[serde(default)]
    pub where_conditions: Vec<WhereCondition>,

    /// Flattened HAVING predicate leaves
    #[serde(default)]
    pub having_conditions: Vec<WhereCondition>,

    /// Empty unless a schema was supplied
    #[serde(default)]
    pub join_relationships: Vec<JoinRelationship>,
}

/// Analyzer holding parser options and optional schema metadata
pub struct Analyzer {
    options: ParserOptions,
    schema: Option<SchemaMap>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            options: ParserOptions::default(),
            schema: None,
        }
    }

    /// Build an analyzer from a loaded `pgparser.toml`
    pub fn from_config(config: &Config) -> Self {
        Self {
            options: config.parser.clone(),
            schema: config.schema.clone(),
        }
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `schema` for join relationship inference
    pub fn with_schema(mut self, schema: SchemaMap) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Parse and analyze the first statement of `sql`
    pub fn analyze(&self, sql: &str) -> Result<AnalysisResult, ParseError> {
        let parsed = SqlParser::with_options(self.options.clone()).parse(sql)?;
        let query = extract(&parsed);

        let (selection, having) = predicates(&parsed);
        let where_conditions = selection.map(extract_conditions).unwrap_or_default();
        let having_conditions = having.map(extract_conditions).unwrap_or_default();

        let join_relationships = match &self.schema {
            Some(schema) if !schema.is_empty() => resolve_relationships(&query, schema),
            _ => Vec::new(),
        };

        tracing::debug!(
            conditions = where_conditions.len(),
            relationships = join_relationships.len(),
            "analyzed statement"
        );

        Ok(AnalysisResult {
            query,
            where_conditions,
            having_conditions,
            join_relationships,
        })
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-level WHERE and HAVING predicates of the statement
fn predicates(parsed: &ParsedSql) -> (Option<&Expr>, Option<&Expr>) {
    match dispatch::classify(&parsed.tree) {
        StatementKind::Select(query) => match leftmost_select(query) {
            Some(select) => (select.selection.as_ref(), select.having.as_ref()),
            None => (None, None),
        },
        StatementKind::Update(update) => (update.selection, None),
        StatementKind::Delete(delete) => (delete.selection.as_ref(), None),
        _ => (None, None),
    }
}

fn leftmost_select(query: &Query) -> Option<&Select> {
    let mut body = query.body.as_ref();

    loop {
        match body {
            SetExpr::Select(select) => return Some(select.as_ref()),
            SetExpr::Query(inner) => body = inner.body.as_ref(),
            SetExpr::SetOperation { left, .. } => body = left.as_ref(),
            _ => return None,
        }
    }
}
