//! DDL extraction
//!
//! One `DdlAction` per structural action, in source order.

use super::expr::split_object_name;
use super::query::QueryExtractor;
use crate::dispatch::DdlStatement;
use pgparser_core::{ColumnDetail, DdlAction, DdlActionKind, DdlFlag, ParsedQuery, QueryCommand, TableRef};
use sqlparser::ast::{
    AlterTableOperation, ColumnDef, ColumnOption, CreateIndex, CreateTable, Ident, ObjectName,
    TableConstraint,
};

pub fn extract(sql: &str, ddl: &DdlStatement<'_>) -> ParsedQuery {
    let mut extractor = QueryExtractor::new(sql, QueryCommand::Ddl);

    let actions = match ddl {
        DdlStatement::CreateTable(create) => vec![create_table(&mut extractor, create)],
        DdlStatement::AlterTable {
            name,
            if_exists,
            only,
            operations,
        } => {
            register(&mut extractor, name);
            let mut table_flags = Vec::new();
            if *if_exists {
                table_flags.push(DdlFlag::IfExists);
            }
            if *only {
                table_flags.push(DdlFlag::Only);
            }

            operations
                .iter()
                .map(|op| {
                    let mut action = alter_action(name, op);
                    for flag in &table_flags {
                        if !action.has_flag(*flag) {
                            action.flags.push(*flag);
                        }
                    }
                    action
                })
                .collect()
        }
        DdlStatement::CreateIndex(index) => vec![create_index(&mut extractor, index)],
        DdlStatement::DropTable {
            names,
            if_exists,
            cascade,
        } => names
            .iter()
            .map(|name| {
                register(&mut extractor, name);
                let mut action = DdlAction::new(DdlActionKind::DropTable, Some(name.to_string()));
                action.flags = drop_flags(*if_exists, *cascade);
                action
            })
            .collect(),
        DdlStatement::DropIndex {
            names,
            if_exists,
            cascade,
        } => names
            .iter()
            .map(|name| {
                let mut action = DdlAction::new(DdlActionKind::DropIndex, None);
                action.name = Some(name.to_string());
                action.flags = drop_flags(*if_exists, *cascade);
                action
            })
            .collect(),
        DdlStatement::Truncate { names, cascade } => names
            .iter()
            .map(|name| {
                register(&mut extractor, name);
                let mut action = DdlAction::new(DdlActionKind::Truncate, Some(name.to_string()));
                if *cascade {
                    action.flags.push(DdlFlag::Cascade);
                }
                action
            })
            .collect(),
    };

    extractor.ir_mut().ddl_actions = actions;
    extractor.finish()
}

fn register(extractor: &mut QueryExtractor<'_>, name: &ObjectName) {
    let (schema, table) = split_object_name(name);
    extractor.register(TableRef::base(table).with_schema(schema));
}

fn drop_flags(if_exists: bool, cascade: bool) -> Vec<DdlFlag> {
    let mut flags = Vec::new();
    if if_exists {
        flags.push(DdlFlag::IfExists);
    }
    if cascade {
        flags.push(DdlFlag::Cascade);
    }
    flags
}

fn create_table(extractor: &mut QueryExtractor<'_>, create: &CreateTable) -> DdlAction {
    register(extractor, &create.name);

    let mut action = DdlAction::new(DdlActionKind::CreateTable, Some(create.name.to_string()));
    action.column_details = create.columns.iter().map(column_detail).collect();

    for constraint in &create.constraints {
        match constraint {
            TableConstraint::PrimaryKey { columns, .. } => {
                for detail in matching(&mut action.column_details, columns) {
                    detail.primary_key = true;
                    detail.not_null = true;
                }
            }
            TableConstraint::Unique { columns, .. } => {
                for detail in matching(&mut action.column_details, columns) {
                    detail.unique = true;
                }
            }
            TableConstraint::ForeignKey {
                columns,
                foreign_table,
                referred_columns,
                ..
            } => {
                let target = references(foreign_table, referred_columns);
                for detail in matching(&mut action.column_details, columns) {
                    detail.references = Some(target.clone());
                }
            }
            _ => {}
        }
    }

    action.columns = action.column_details.iter().map(|d| d.name.clone()).collect();

    if create.if_not_exists {
        action.flags.push(DdlFlag::IfNotExists);
    }
    if create.temporary {
        action.flags.push(DdlFlag::Temporary);
    }

    if let Some(query) = &create.query {
        extractor.visit_query(query, false);
        action.detail = Some(query.to_string());
    }

    action
}

fn matching<'a>(
    details: &'a mut [ColumnDetail],
    columns: &'a [Ident],
) -> impl Iterator<Item = &'a mut ColumnDetail> + 'a {
    details
        .iter_mut()
        .filter(move |d| columns.iter().any(|c| c.value.eq_ignore_ascii_case(&d.name)))
}

fn references(table: &ObjectName, columns: &[Ident]) -> String {
    if columns.is_empty() {
        table.to_string()
    } else {
        let columns: Vec<_> = columns.iter().map(|c| c.value.as_str()).collect();
        format!("{}({})", table, columns.join(", "))
    }
}

fn column_detail(column: &ColumnDef) -> ColumnDetail {
    let mut detail = ColumnDetail {
        name: column.name.value.clone(),
        data_type: column.data_type.to_string(),
        not_null: false,
        default: None,
        primary_key: false,
        unique: false,
        references: None,
    };

    for option in &column.options {
        match &option.option {
            ColumnOption::NotNull => detail.not_null = true,
            ColumnOption::Null => detail.not_null = false,
            ColumnOption::Default(value) => detail.default = Some(value.to_string()),
            ColumnOption::Unique { is_primary, .. } => {
                if *is_primary {
                    detail.primary_key = true;
                    detail.not_null = true;
                } else {
                    detail.unique = true;
                }
            }
            ColumnOption::ForeignKey {
                foreign_table,
                referred_columns,
                ..
            } => detail.references = Some(references(foreign_table, referred_columns)),
            _ => {}
        }
    }

    detail
}

fn idents(columns: &[Ident]) -> Vec<String> {
    columns.iter().map(|c| c.value.clone()).collect()
}

fn constraint_parts(constraint: &TableConstraint) -> (Option<String>, Vec<String>) {
    match constraint {
        TableConstraint::PrimaryKey { name, columns, .. }
        | TableConstraint::Unique { name, columns, .. }
        | TableConstraint::ForeignKey { name, columns, .. } => {
            (name.as_ref().map(|n| n.value.clone()), idents(columns))
        }
        TableConstraint::Check { name, .. } => (name.as_ref().map(|n| n.value.clone()), Vec::new()),
        _ => (None, Vec::new()),
    }
}

fn alter_action(table: &ObjectName, op: &AlterTableOperation) -> DdlAction {
    let table = Some(table.to_string());
    let cascades = op.to_string().ends_with(" CASCADE");

    match op {
        AlterTableOperation::AddColumn {
            column_def,
            if_not_exists,
            ..
        } => {
            let mut action = DdlAction::new(DdlActionKind::AddColumn, table);
            action.columns = vec![column_def.name.value.clone()];
            action.column_details = vec![column_detail(column_def)];
            if *if_not_exists {
                action.flags.push(DdlFlag::IfNotExists);
            }
            action
        }
        AlterTableOperation::DropColumn {
            column_name,
            if_exists,
            ..
        } => {
            let mut action = DdlAction::new(DdlActionKind::DropColumn, table);
            action.columns = vec![column_name.value.clone()];
            action.flags = drop_flags(*if_exists, cascades);
            action
        }
        AlterTableOperation::RenameColumn {
            old_column_name,
            new_column_name,
        } => {
            let mut action = DdlAction::new(DdlActionKind::RenameColumn, table);
            action.columns = vec![old_column_name.value.clone(), new_column_name.value.clone()];
            action
        }
        AlterTableOperation::RenameTable { table_name } => {
            let mut action = DdlAction::new(DdlActionKind::RenameTable, table);
            action.name = Some(table_name.to_string());
            action
        }
        AlterTableOperation::AlterColumn { column_name, op } => {
            let mut action = DdlAction::new(DdlActionKind::AlterColumn, table);
            action.columns = vec![column_name.value.clone()];
            action.detail = Some(op.to_string());
            action
        }
        AlterTableOperation::AddConstraint(constraint) => {
            let mut action = DdlAction::new(DdlActionKind::AddConstraint, table);
            let (name, columns) = constraint_parts(constraint);
            action.name = name;
            action.columns = columns;
            action.detail = Some(constraint.to_string());
            action
        }
        AlterTableOperation::DropConstraint {
            name, if_exists, ..
        } => {
            let mut action = DdlAction::new(DdlActionKind::DropConstraint, table);
            action.name = Some(name.value.clone());
            action.flags = drop_flags(*if_exists, cascades);
            action
        }
        other => {
            let mut action = DdlAction::new(DdlActionKind::Other, table);
            action.detail = Some(other.to_string());
            action
        }
    }
}

fn create_index(extractor: &mut QueryExtractor<'_>, index: &CreateIndex) -> DdlAction {
    register(extractor, &index.table_name);

    let mut action = DdlAction::new(DdlActionKind::CreateIndex, Some(index.table_name.to_string()));
    action.name = index.name.as_ref().map(|n| n.to_string());
    action.columns = index.columns.iter().map(|c| c.to_string()).collect();
    action.index_type = index.using.as_ref().map(|u| u.to_string());
    action.detail = index.predicate.as_ref().map(|p| p.to_string());

    if index.unique {
        action.flags.push(DdlFlag::Unique);
    }
    if index.concurrently {
        action.flags.push(DdlFlag::Concurrently);
    }
    if index.if_not_exists {
        action.flags.push(DdlFlag::IfNotExists);
    }

    action
}

#[cfg(test)]
mod tests {
    use crate::parse_sql;
    use pgparser_core::{DdlActionKind, DdlFlag, QueryCommand};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_table_details() {
        let ir = parse_sql(
            "CREATE TABLE IF NOT EXISTS orders (\
               id serial PRIMARY KEY, \
               customer_id int NOT NULL REFERENCES customers(id), \
               code text, \
               status text DEFAULT 'new', \
               UNIQUE (code))",
        )
        .unwrap();

        assert_eq!(ir.command, QueryCommand::Ddl);
        assert_eq!(ir.ddl_actions.len(), 1);

        let action = &ir.ddl_actions[0];
        assert_eq!(action.kind, DdlActionKind::CreateTable);
        assert!(action.has_flag(DdlFlag::IfNotExists));
        assert_eq!(action.columns.len(), 4);

        let details = &action.column_details;
        assert!(details[0].primary_key);
        assert!(details[1].not_null);
        assert_eq!(details[1].references.as_deref(), Some("customers(id)"));
        assert!(details[2].unique);
        assert_eq!(details[3].default.as_deref(), Some("'new'"));
    }

    #[test]
    fn test_alter_table_yields_one_action_per_operation() {
        let ir = parse_sql(
            "ALTER TABLE users ADD COLUMN age int, DROP COLUMN IF EXISTS legacy, \
             RENAME COLUMN mail TO email",
        )
        .unwrap();

        let kinds: Vec<_> = ir.ddl_actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DdlActionKind::AddColumn,
                DdlActionKind::DropColumn,
                DdlActionKind::RenameColumn
            ]
        );
        assert!(ir.ddl_actions[1].has_flag(DdlFlag::IfExists));
        assert_eq!(ir.ddl_actions[2].columns, vec!["mail".to_string(), "email".to_string()]);
    }

    #[test]
    fn test_create_index() {
        let ir = parse_sql(
            "CREATE UNIQUE INDEX CONCURRENTLY idx_users_email ON users USING btree (email) \
             WHERE deleted_at IS NULL",
        )
        .unwrap();

        let action = &ir.ddl_actions[0];
        assert_eq!(action.kind, DdlActionKind::CreateIndex);
        assert_eq!(action.name.as_deref(), Some("idx_users_email"));
        assert_eq!(action.table.as_deref(), Some("users"));
        assert_eq!(action.columns, vec!["email".to_string()]);
        assert!(action.has_flag(DdlFlag::Unique));
        assert!(action.has_flag(DdlFlag::Concurrently));
        assert!(action.index_type.as_deref().unwrap().eq_ignore_ascii_case("btree"));
    }

    #[test]
    fn test_drop_and_truncate() {
        let ir = parse_sql("DROP TABLE IF EXISTS a, b CASCADE").unwrap();
        assert_eq!(ir.ddl_actions.len(), 2);
        assert!(ir.ddl_actions[0].has_flag(DdlFlag::Cascade));

        let ir = parse_sql("DROP INDEX idx_a").unwrap();
        assert_eq!(ir.ddl_actions[0].kind, DdlActionKind::DropIndex);
        assert_eq!(ir.ddl_actions[0].name.as_deref(), Some("idx_a"));

        let ir = parse_sql("TRUNCATE orders, items CASCADE").unwrap();
        assert_eq!(ir.ddl_actions.len(), 2);
        assert_eq!(ir.ddl_actions[1].kind, DdlActionKind::Truncate);
        assert!(ir.ddl_actions[1].has_flag(DdlFlag::Cascade));
    }
}
