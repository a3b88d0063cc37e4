//! Column usage classification
//!
//! Runs over the raw references recorded by the extractors, never over the
//! syntax tree. Each reference yields exactly one usage entry.

use crate::ir::{AliasResolution, ColumnReference, ColumnUsage, ParsedQuery};

/// Classify a single recorded reference
pub fn classify(reference: &ColumnReference) -> ColumnUsage {
    let (table_alias, resolution) = match (&reference.column.qualifier, reference.scope.as_slice()) {
        (Some(qualifier), _) => (qualifier.clone(), AliasResolution::Qualified),
        (None, [only]) => (only.clone(), AliasResolution::Inferred),
        (None, _) => (String::new(), AliasResolution::Unresolved),
    };

    ColumnUsage {
        table_alias,
        column: reference.column.column.clone(),
        usage_type: reference.usage,
        resolution,
    }
}

impl ParsedQuery {
    /// Rebuild `column_usage` from the recorded references
    pub fn classify_column_usage(&mut self) {
        self.column_usage = self.column_refs.iter().map(classify).collect();
    }
}
