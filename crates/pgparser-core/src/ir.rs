//! Intermediate representation of a parsed statement
//!
//! `ParsedQuery` is the single result envelope for every statement kind.
//! Fields that do not apply to a statement stay empty. All values are
//! created fresh per call and are fully owned by the caller.

use serde::{Deserialize, Serialize};

/// Statement command tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryCommand {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Ddl,

    /// Valid SQL that is recognized but not deeply modeled
    Unknown,
}

impl QueryCommand {
    /// Stable string form of the command
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Merge => "MERGE",
            Self::Ddl => "DDL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl Default for QueryCommand {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for QueryCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of relation a table reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableType {
    /// A physical table (or view) from the catalog
    Base,

    /// A reference to a CTE defined in the same statement
    Cte,

    /// A parenthesized subquery in FROM
    Subquery,

    /// A table-producing function, UNNEST, or similar
    Derived,
}

/// A relation referenced by the statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Unqualified relation name
    pub name: String,

    /// Schema qualifier, if written
    pub schema: Option<String>,

    /// Alias, if written
    pub alias: Option<String>,

    pub table_type: TableType,
}

impl TableRef {
    /// Create a reference to a base table
    pub fn base(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            alias: None,
            table_type: TableType::Base,
        }
    }

    /// Set the schema qualifier
    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    /// Set the alias
    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    /// Set the relation kind
    pub fn with_type(mut self, table_type: TableType) -> Self {
        self.table_type = table_type;
        self
    }

    /// Schema-qualified name (`schema.name`), or the bare name
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }

    /// Name other clauses use to refer to this relation
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Check whether a column qualifier (`o` in `o.id`) points at this relation.
    ///
    /// An aliased relation is only reachable through its alias.
    pub fn matches_qualifier(&self, qualifier: &str) -> bool {
        match &self.alias {
            Some(alias) => alias.eq_ignore_ascii_case(qualifier),
            None => {
                self.name.eq_ignore_ascii_case(qualifier)
                    || self.qualified_name().eq_ignore_ascii_case(qualifier)
            }
        }
    }

    fn same_key(&self, other: &TableRef) -> bool {
        self.name == other.name
            && self.schema == other.schema
            && self.alias == other.alias
            && self.table_type == other.table_type
    }
}

/// A projected column expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectColumn {
    /// Expression text
    pub expression: String,

    /// Output alias, if written
    pub alias: Option<String>,
}

/// An aliased projection: output name and the expression behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedColumn {
    pub alias: String,
    pub expression: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

/// One ORDER BY item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub expression: String,

    /// Direction; ASC when not written
    pub direction: SortDirection,

    /// NULLS FIRST (`Some(true)`) / NULLS LAST (`Some(false)`)
    pub nulls_first: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

impl std::fmt::Display for SetOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Union => write!(f, "UNION"),
            Self::Intersect => write!(f, "INTERSECT"),
            Self::Except => write!(f, "EXCEPT"),
        }
    }
}

/// A set-operation leg following the leftmost query block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOperation {
    pub operator: SetOperator,

    /// `ALL` was written (otherwise DISTINCT semantics)
    pub all: bool,

    /// Text of the right-hand leg
    pub query: String,

    /// Projection of the right-hand leg
    pub columns: Vec<SelectColumn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CteMaterialization {
    Materialized,
    NotMaterialized,
}

/// A common table expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonTableExpr {
    pub name: String,

    /// Explicit column list (`name(a, b) AS ...`)
    pub columns: Vec<String>,

    /// Body text, sliced verbatim from the input when positions are available
    pub query: String,

    /// Defined under `WITH RECURSIVE`
    pub recursive: bool,

    pub materialization: Option<CteMaterialization>,
}

/// Clause a subquery appears in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubqueryClause {
    Select,
    From,
    Where,
    Having,
    Join,
    Other,
}

/// A nested query with its own extracted IR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subquery {
    pub clause: SubqueryClause,

    /// Alias for FROM subqueries
    pub alias: Option<String>,

    /// Query text
    pub query: String,

    /// IR of the subquery on its own
    pub parsed: Box<ParsedQuery>,
}

/// A column reference inside a subquery that points at an enclosing scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Correlation {
    /// Index into `subqueries` of the subquery holding the reference
    pub subquery: usize,

    /// Qualifier as written (`o` in `o.id`)
    pub outer_alias: String,

    /// Relation the qualifier resolves to in the enclosing scope
    pub outer_table: Option<String>,

    pub column: String,
}

/// A possibly qualified column name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnName {
    pub qualifier: Option<String>,
    pub column: String,
}

impl ColumnName {
    pub fn new(qualifier: Option<String>, column: impl Into<String>) -> Self {
        Self {
            qualifier,
            column: column.into(),
        }
    }
}

impl std::fmt::Display for ColumnName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}.{}", qualifier, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

/// `left = right` between two column operands of a join condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnEquality {
    pub left: ColumnName,
    pub right: ColumnName,

    /// Base relations `left` can belong to, resolved in the join's own block
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub left_tables: Vec<String>,

    /// Base relations `right` can belong to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub right_tables: Vec<String>,
}

impl ColumnEquality {
    /// An equality whose operands are not resolved yet
    pub fn new(left: ColumnName, right: ColumnName) -> Self {
        Self {
            left,
            right,
            left_tables: Vec::new(),
            right_tables: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Semi,
    Anti,
    Other,
}

/// One JOIN in a FROM clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinClause {
    pub join_type: JoinType,

    /// Joined relation name (or subquery alias)
    pub table: String,

    pub alias: Option<String>,

    /// ON condition text
    pub condition: Option<String>,

    /// USING column list
    pub using: Vec<String>,

    /// Column-to-column equalities found among the ON conjuncts
    pub equalities: Vec<ColumnEquality>,
}

/// Clause-driven role of a column reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageType {
    Projection,
    Filter,
    Join,
    Group,
    Order,
    DmlSet,
    Returning,
}

impl UsageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Projection => "PROJECTION",
            Self::Filter => "FILTER",
            Self::Join => "JOIN",
            Self::Group => "GROUP",
            Self::Order => "ORDER",
            Self::DmlSet => "DML_SET",
            Self::Returning => "RETURNING",
        }
    }
}

impl std::fmt::Display for UsageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the owning relation of a column usage was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AliasResolution {
    /// Qualifier written in the SQL
    Qualified,

    /// Unqualified, but exactly one relation was visible
    Inferred,

    /// Unqualified with zero or several visible relations
    Unresolved,
}

/// A classified column usage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnUsage {
    /// Owning relation's alias (or name); empty when unresolved
    pub table_alias: String,

    pub column: String,

    pub usage_type: UsageType,

    pub resolution: AliasResolution,
}

/// A raw column reference recorded during extraction
///
/// `scope` lists the reference names of the relations visible in the query
/// block the reference was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnReference {
    pub column: ColumnName,
    pub usage: UsageType,
    pub scope: Vec<String>,
}

/// `column = expression` in UPDATE / DO UPDATE / MERGE UPDATE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetClause {
    pub column: String,
    pub expression: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpsertAction {
    #[serde(rename = "DO NOTHING")]
    DoNothing,

    #[serde(rename = "DO UPDATE")]
    DoUpdate,
}

impl UpsertAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DoNothing => "DO NOTHING",
            Self::DoUpdate => "DO UPDATE",
        }
    }
}

impl std::fmt::Display for UpsertAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// INSERT ... ON CONFLICT metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upsert {
    pub action: UpsertAction,

    /// Conflict target columns
    pub conflict_target: Vec<String>,

    /// `ON CONFLICT ON CONSTRAINT name`
    pub constraint: Option<String>,

    pub set_clauses: Vec<SetClause>,

    /// WHERE of the DO UPDATE action
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MergeActionKind {
    Update,
    Insert,
    Delete,
}

/// One `WHEN ... THEN ...` arm of a MERGE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeAction {
    /// `MATCHED`, `NOT MATCHED`, ...
    pub when: String,

    /// Extra `AND` predicate of the arm
    pub predicate: Option<String>,

    pub action: MergeActionKind,

    pub set_clauses: Vec<SetClause>,
    pub insert_columns: Vec<String>,
    pub values: Vec<String>,
}

/// MERGE statement metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeInfo {
    pub target: TableRef,
    pub source: TableRef,
    pub condition: String,
    pub actions: Vec<MergeAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DdlActionKind {
    CreateTable,
    AddColumn,
    DropColumn,
    AlterColumn,
    RenameColumn,
    RenameTable,
    AddConstraint,
    DropConstraint,
    CreateIndex,
    DropTable,
    DropIndex,
    Truncate,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DdlFlag {
    IfExists,
    IfNotExists,
    Cascade,
    Unique,
    Concurrently,
    Temporary,
    Only,
}

/// Column definition carried by CREATE TABLE / ADD COLUMN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDetail {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
    pub unique: bool,

    /// `REFERENCES table(columns)`
    pub references: Option<String>,
}

/// One structural DDL action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdlAction {
    pub kind: DdlActionKind,

    /// Table the action applies to
    pub table: Option<String>,

    /// Index or constraint name
    pub name: Option<String>,

    pub columns: Vec<String>,
    pub column_details: Vec<ColumnDetail>,
    pub index_type: Option<String>,
    pub flags: Vec<DdlFlag>,

    /// Operation text for actions without a dedicated field
    pub detail: Option<String>,
}

impl DdlAction {
    pub fn new(kind: DdlActionKind, table: Option<String>) -> Self {
        Self {
            kind,
            table,
            name: None,
            columns: Vec::new(),
            column_details: Vec::new(),
            index_type: None,
            flags: Vec::new(),
            detail: None,
        }
    }

    pub fn has_flag(&self, flag: DdlFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// A bind parameter placeholder
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    /// 1-based position (`$2` -> 2, the third `?` -> 3); `None` for named ones
    pub position: Option<usize>,

    /// Placeholder as written
    pub name: String,
}

/// Root IR value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedQuery {
    pub command: QueryCommand,

    /// Original input, always populated
    pub raw_sql: String,

    pub tables: Vec<TableRef>,
    pub columns: Vec<SelectColumn>,
    pub distinct: bool,

    /// Top-level WHERE conjuncts
    pub where_clause: Vec<String>,
    pub group_by: Vec<String>,

    /// Top-level HAVING conjuncts
    pub having: Vec<String>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub set_operations: Vec<SetOperation>,
    pub ctes: Vec<CommonTableExpr>,
    pub subqueries: Vec<Subquery>,
    pub joins: Vec<JoinClause>,
    pub column_usage: Vec<ColumnUsage>,
    pub derived_columns: Vec<DerivedColumn>,
    pub correlations: Vec<Correlation>,
    pub insert_columns: Vec<String>,
    pub upsert: Option<Upsert>,
    pub returning: Vec<String>,
    pub set_clauses: Vec<SetClause>,
    pub merge: Option<MergeInfo>,
    pub ddl_actions: Vec<DdlAction>,
    pub parameters: Vec<Parameter>,

    /// Raw references feeding the column usage classifier
    #[serde(skip)]
    pub column_refs: Vec<ColumnReference>,
}

impl ParsedQuery {
    /// Create an empty IR for a command
    pub fn new(command: QueryCommand, raw_sql: impl Into<String>) -> Self {
        Self {
            command,
            raw_sql: raw_sql.into(),
            ..Self::default()
        }
    }

    /// IR for valid SQL that is not deeply modeled
    pub fn unknown(raw_sql: impl Into<String>) -> Self {
        Self::new(QueryCommand::Unknown, raw_sql)
    }

    /// Add a table reference unless an identical one exists
    pub fn add_table(&mut self, table: TableRef) {
        if !self.tables.iter().any(|t| t.same_key(&table)) {
            self.tables.push(table);
        }
    }

    /// Usages of a given role
    pub fn usages_of(&self, usage_type: UsageType) -> impl Iterator<Item = &ColumnUsage> {
        self.column_usage
            .iter()
            .filter(move |u| u.usage_type == usage_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_strings_are_stable() {
        assert_eq!(QueryCommand::Select.as_str(), "SELECT");
        assert_eq!(QueryCommand::Ddl.to_string(), "DDL");
        assert_eq!(QueryCommand::default(), QueryCommand::Unknown);
    }

    #[test]
    fn table_keyed_by_name_and_alias() {
        let mut ir = ParsedQuery::new(QueryCommand::Select, "SELECT 1");
        ir.add_table(TableRef::base("users").with_alias(Some("a".into())));
        ir.add_table(TableRef::base("users").with_alias(Some("b".into())));
        ir.add_table(TableRef::base("users").with_alias(Some("a".into())));

        assert_eq!(ir.tables.len(), 2);
    }

    #[test]
    fn aliased_table_only_matches_alias() {
        let table = TableRef::base("orders")
            .with_schema(Some("public".into()))
            .with_alias(Some("o".into()));

        assert!(table.matches_qualifier("o"));
        assert!(table.matches_qualifier("O"));
        assert!(!table.matches_qualifier("orders"));

        let bare = TableRef::base("orders").with_schema(Some("public".into()));
        assert!(bare.matches_qualifier("orders"));
        assert!(bare.matches_qualifier("public.orders"));
        assert_eq!(bare.qualified_name(), "public.orders");
    }

    #[test]
    fn enums_serialize_with_stable_tags() {
        let json = serde_json::to_string(&UsageType::DmlSet).unwrap();
        assert_eq!(json, "\"DML_SET\"");

        let json = serde_json::to_string(&UpsertAction::DoUpdate).unwrap();
        assert_eq!(json, "\"DO UPDATE\"");

        let json = serde_json::to_string(&TableType::Cte).unwrap();
        assert_eq!(json, "\"CTE\"");
    }

    #[test]
    fn column_refs_are_not_serialized() {
        let mut ir = ParsedQuery::unknown("SELECT a");
        ir.column_refs.push(ColumnReference {
            column: ColumnName::new(None, "a"),
            usage: UsageType::Projection,
            scope: Vec::new(),
        });

        let json = serde_json::to_string(&ir).unwrap();
        assert!(!json.contains("column_refs"));
        assert!(json.contains("\"command\":\"UNKNOWN\""));
    }
}
