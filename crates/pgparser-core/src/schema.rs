//! Caller-supplied schema metadata
//!
//! Static table -> column information used by the join resolver.
//! Nothing here talks to a live database.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A column known to the schema map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,

    /// PostgreSQL type name (`int4`, `text`, ...)
    #[serde(default)]
    pub pg_type: String,

    #[serde(default)]
    pub is_primary_key: bool,
}

impl SchemaColumn {
    pub fn new(name: impl Into<String>, pg_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pg_type: pg_type.into(),
            is_primary_key: false,
        }
    }

    /// Mark as primary key
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }
}

/// Table name -> ordered columns
///
/// Keys may be bare (`orders`) or schema-qualified (`public.orders`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaMap {
    tables: BTreeMap<String, Vec<SchemaColumn>>,
}

impl SchemaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a table
    pub fn add_table(&mut self, name: impl Into<String>, columns: Vec<SchemaColumn>) {
        self.tables.insert(name.into(), columns);
    }

    /// Look up a table's columns.
    ///
    /// Tries the exact key, then a case-insensitive match, then the
    /// unqualified last segment when one side has no schema. A fallback
    /// that matches more than one key finds nothing.
    pub fn table(&self, name: &str) -> Option<&[SchemaColumn]> {
        if let Some(columns) = self.tables.get(name) {
            return Some(columns);
        }

        let folded = single(
            self.tables
                .iter()
                .filter(|(key, _)| key.eq_ignore_ascii_case(name)),
        );
        if folded.is_some() {
            return folded;
        }

        let short = unqualified(name);
        let bare = short.len() == name.len();
        single(self.tables.iter().filter(|(key, _)| {
            (bare || unqualified(key).len() == key.len())
                && unqualified(key).eq_ignore_ascii_case(short)
        }))
    }

    /// Look up one column of a table
    pub fn column(&self, table: &str, column: &str) -> Option<&SchemaColumn> {
        self.table(table)?
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Parse a JSON object of `table -> [columns]`
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(|e| SchemaError::ParseError(e.to_string()))
    }

    /// Load a JSON schema file
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SchemaError::IoError(e.to_string()))?;

        Self::from_json(&content)
    }
}

fn single<'a>(
    mut matches: impl Iterator<Item = (&'a String, &'a Vec<SchemaColumn>)>,
) -> Option<&'a [SchemaColumn]> {
    let (_, columns) = matches.next()?;
    match matches.next() {
        Some(_) => None,
        None => Some(columns),
    }
}

fn unqualified(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SchemaMap {
        let mut schema = SchemaMap::new();
        schema.add_table(
            "public.users",
            vec![
                SchemaColumn::new("id", "int4").primary_key(),
                SchemaColumn::new("email", "text"),
            ],
        );
        schema
    }

    #[test]
    fn lookup_falls_back_to_unqualified_name() {
        let schema = sample();
        assert!(schema.table("public.users").is_some());
        assert!(schema.table("PUBLIC.USERS").is_some());
        assert!(schema.table("users").is_some());
        assert!(schema.table("orders").is_none());
    }

    #[test]
    fn ambiguous_short_names_match_nothing() {
        let mut schema = sample();
        schema.add_table("audit.users", vec![SchemaColumn::new("id", "int8")]);

        assert!(schema.table("users").is_none());
        assert_eq!(schema.column("audit.users", "id").unwrap().pg_type, "int8");
        assert_eq!(schema.column("PUBLIC.users", "id").unwrap().pg_type, "int4");
    }

    #[test]
    fn qualified_name_does_not_match_another_schema() {
        let schema = sample();
        assert!(schema.table("audit.users").is_none());

        let mut bare = SchemaMap::new();
        bare.add_table("users", vec![SchemaColumn::new("id", "int4")]);
        assert!(bare.table("audit.users").is_some());
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let schema = sample();
        let id = schema.column("users", "ID").unwrap();
        assert!(id.is_primary_key);
        assert!(schema.column("users", "missing").is_none());
    }

    #[test]
    fn loads_from_json() {
        let json = r#"{
            "orders": [
                {"name": "id", "pg_type": "int4", "is_primary_key": true},
                {"name": "customer_id", "pg_type": "int4"}
            ]
        }"#;

        let schema = SchemaMap::from_json(json).unwrap();
        assert_eq!(schema.len(), 1);
        let customer = schema.column("orders", "customer_id").unwrap();
        assert!(!customer.is_primary_key);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(SchemaMap::from_json("[1, 2").is_err());
    }
}
