//! pgparser Core
//!
//! IR model shared by the parser and analysis crates.
//! Serialized tag strings are part of the public output format.

pub mod ir;
pub mod usage;
pub mod error;
pub mod schema;
pub mod config;

pub use ir::{
    AliasResolution, ColumnDetail, ColumnEquality, ColumnName, ColumnReference, ColumnUsage,
    CommonTableExpr, Correlation, CteMaterialization, DdlAction, DdlActionKind, DdlFlag,
    DerivedColumn, JoinClause, JoinType, MergeAction, MergeActionKind, MergeInfo, OrderByItem,
    Parameter, ParsedQuery, QueryCommand, SelectColumn, SetClause, SetOperation, SetOperator,
    SortDirection, Subquery, SubqueryClause, TableRef, TableType, UpsertAction, Upsert, UsageType,
};
pub use error::{ParseError, SyntaxError};
pub use schema::{SchemaColumn, SchemaError, SchemaMap};
pub use config::{Config, ConfigError, ParserOptions};
