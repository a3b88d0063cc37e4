//! Statement classification
//!
//! Classification looks only at the syntax tree variant. The borrowed views
//! below give the extractors one stable shape per statement kind.

use crate::parser::SyntaxTree;
use crate::utility::UtilityStatement;
use sqlparser::ast::{
    AlterTableOperation, Assignment, CreateIndex, CreateTable, Delete, Expr, Insert, MergeClause,
    ObjectName, ObjectType, Query, SelectItem, Statement, TableFactor, TableWithJoins,
    TruncateCascadeOption,
};

/// Borrowed view of an UPDATE
pub struct UpdateStatement<'a> {
    pub table: &'a TableWithJoins,
    pub assignments: &'a [Assignment],
    pub from: Option<&'a TableWithJoins>,
    pub selection: Option<&'a Expr>,
    pub returning: Option<&'a [SelectItem]>,
}

/// Borrowed view of a MERGE
pub struct MergeStatement<'a> {
    pub target: &'a TableFactor,
    pub source: &'a TableFactor,
    pub on: &'a Expr,
    pub clauses: &'a [MergeClause],
}

/// Borrowed view of a modeled DDL statement
pub enum DdlStatement<'a> {
    CreateTable(&'a CreateTable),
    AlterTable {
        name: &'a ObjectName,
        if_exists: bool,
        only: bool,
        operations: &'a [AlterTableOperation],
    },
    CreateIndex(&'a CreateIndex),
    DropTable {
        names: &'a [ObjectName],
        if_exists: bool,
        cascade: bool,
    },
    DropIndex {
        names: &'a [ObjectName],
        if_exists: bool,
        cascade: bool,
    },
    Truncate {
        names: Vec<&'a ObjectName>,
        cascade: bool,
    },
}

/// Statement kind of the first statement
pub enum StatementKind<'a> {
    Select(&'a Query),
    Insert(&'a Insert),
    Update(UpdateStatement<'a>),
    Delete(&'a Delete),
    Merge(MergeStatement<'a>),
    Ddl(DdlStatement<'a>),
    Utility(&'a UtilityStatement),

    /// Valid SQL that is not modeled (CREATE VIEW, GRANT, EXPLAIN, ...)
    Unrecognized,
}

impl StatementKind<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
            Self::Merge(_) => "merge",
            Self::Ddl(_) => "ddl",
            Self::Utility(_) => "utility",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Classify a parsed tree
pub fn classify(tree: &SyntaxTree) -> StatementKind<'_> {
    let statement = match tree {
        SyntaxTree::Utility(utility) => return StatementKind::Utility(utility),
        SyntaxTree::Statement(statement) => statement.as_ref(),
    };

    let kind = classify_statement(statement);
    tracing::debug!(kind = kind.name(), "classified statement");
    kind
}

fn classify_statement(statement: &Statement) -> StatementKind<'_> {
    match statement {
        Statement::Query(query) => StatementKind::Select(query),
        Statement::Insert(insert) => StatementKind::Insert(insert),
        Statement::Update {
            table,
            assignments,
            from,
            selection,
            returning,
            ..
        } => StatementKind::Update(UpdateStatement {
            table,
            assignments,
            from: from.as_ref(),
            selection: selection.as_ref(),
            returning: returning.as_deref(),
        }),
        Statement::Delete(delete) => StatementKind::Delete(delete),
        Statement::Merge {
            table,
            source,
            on,
            clauses,
            ..
        } => StatementKind::Merge(MergeStatement {
            target: table,
            source,
            on,
            clauses,
        }),
        Statement::CreateTable(create) => StatementKind::Ddl(DdlStatement::CreateTable(create)),
        Statement::AlterTable {
            name,
            if_exists,
            only,
            operations,
            ..
        } => StatementKind::Ddl(DdlStatement::AlterTable {
            name,
            if_exists: *if_exists,
            only: *only,
            operations,
        }),
        Statement::CreateIndex(index) => StatementKind::Ddl(DdlStatement::CreateIndex(index)),
        Statement::Drop {
            object_type,
            if_exists,
            names,
            cascade,
            ..
        } => match object_type {
            ObjectType::Table => StatementKind::Ddl(DdlStatement::DropTable {
                names,
                if_exists: *if_exists,
                cascade: *cascade,
            }),
            ObjectType::Index => StatementKind::Ddl(DdlStatement::DropIndex {
                names,
                if_exists: *if_exists,
                cascade: *cascade,
            }),
            _ => StatementKind::Unrecognized,
        },
        Statement::Truncate {
            table_names,
            cascade,
            ..
        } => StatementKind::Ddl(DdlStatement::Truncate {
            names: table_names.iter().map(|t| &t.name).collect(),
            cascade: matches!(cascade, Some(TruncateCascadeOption::Cascade)),
        }),
        _ => StatementKind::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SqlParser;

    fn kind_of(sql: &str) -> &'static str {
        let parsed = SqlParser::new().parse(sql).unwrap();
        classify(&parsed.tree).name()
    }

    #[test]
    fn test_dml_kinds() {
        assert_eq!(kind_of("SELECT 1"), "select");
        assert_eq!(kind_of("WITH x AS (SELECT 1) SELECT * FROM x"), "select");
        assert_eq!(kind_of("INSERT INTO t (a) VALUES (1)"), "insert");
        assert_eq!(kind_of("UPDATE t SET a = 1"), "update");
        assert_eq!(kind_of("UPDATE t SET a = s.a FROM s WHERE t.id = s.id"), "update");
        assert_eq!(kind_of("DELETE FROM t WHERE a = 1"), "delete");
        assert_eq!(
            kind_of("MERGE INTO t USING s ON t.id = s.id WHEN MATCHED THEN DELETE"),
            "merge"
        );
    }

    #[test]
    fn test_ddl_kinds() {
        assert_eq!(kind_of("CREATE TABLE t (id int)"), "ddl");
        assert_eq!(kind_of("ALTER TABLE t ADD COLUMN c text"), "ddl");
        assert_eq!(kind_of("CREATE INDEX i ON t (c)"), "ddl");
        assert_eq!(kind_of("DROP TABLE t"), "ddl");
        assert_eq!(kind_of("DROP INDEX i"), "ddl");
        assert_eq!(kind_of("TRUNCATE t"), "ddl");
    }

    #[test]
    fn test_unmodeled_statements() {
        assert_eq!(kind_of("CREATE VIEW v AS SELECT 1"), "unrecognized");
        assert_eq!(kind_of("DROP VIEW v"), "unrecognized");
        assert_eq!(kind_of("GRANT SELECT ON t TO bob"), "unrecognized");
        assert_eq!(kind_of("BEGIN"), "unrecognized");
        assert_eq!(kind_of("EXPLAIN SELECT 1"), "unrecognized");
    }

    #[test]
    fn test_utility_kind() {
        assert_eq!(kind_of("SHOW ALL"), "utility");
    }
}
