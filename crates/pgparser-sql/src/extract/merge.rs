//! MERGE extraction

use super::query::QueryExtractor;
use crate::dispatch::MergeStatement;
use pgparser_core::{
    MergeAction, MergeActionKind, MergeInfo, ParsedQuery, QueryCommand, SubqueryClause, TableRef,
    TableType, UsageType,
};
use sqlparser::ast::{MergeInsertKind, TableFactor};

pub fn extract(sql: &str, merge: &MergeStatement<'_>) -> ParsedQuery {
    let mut extractor = QueryExtractor::new(sql, QueryCommand::Merge);
    extractor.push_scope();

    let target = relation(&mut extractor, merge.target, SubqueryClause::Other);
    let source = relation(&mut extractor, merge.source, SubqueryClause::From);

    extractor.scan_expr(merge.on, Some(UsageType::Join), SubqueryClause::Other);

    let mut actions = Vec::new();
    for clause in merge.clauses {
        if let Some(predicate) = &clause.predicate {
            extractor.scan_expr(predicate, Some(UsageType::Filter), SubqueryClause::Where);
        }

        let mut action = MergeAction {
            when: clause.clause_kind.to_string(),
            predicate: clause.predicate.as_ref().map(|p| p.to_string()),
            action: MergeActionKind::Delete,
            set_clauses: Vec::new(),
            insert_columns: Vec::new(),
            values: Vec::new(),
        };

        match &clause.action {
            sqlparser::ast::MergeAction::Update { assignments, .. } => {
                action.action = MergeActionKind::Update;
                action.set_clauses = extractor.visit_assignments(assignments);
            }
            sqlparser::ast::MergeAction::Insert(insert) => {
                action.action = MergeActionKind::Insert;
                action.insert_columns = insert.columns.iter().map(|c| c.value.clone()).collect();
                if let MergeInsertKind::Values(values) = &insert.kind {
                    for value in values.rows.iter().flatten() {
                        extractor.scan_expr(value, None, SubqueryClause::Other);
                        action.values.push(value.to_string());
                    }
                }
            }
            sqlparser::ast::MergeAction::Delete => {}
        }

        actions.push(action);
    }

    extractor.pop_scope();

    let mut ir = extractor.finish();
    ir.merge = Some(MergeInfo {
        target,
        source,
        condition: merge.on.to_string(),
        actions,
    });
    ir
}

fn relation(extractor: &mut QueryExtractor<'_>, factor: &TableFactor, clause: SubqueryClause) -> TableRef {
    extractor
        .visit_relation(factor, clause)
        .unwrap_or_else(|| TableRef::base(factor.to_string()).with_type(TableType::Derived))
}

#[cfg(test)]
mod tests {
    use crate::parse_sql;
    use pgparser_core::{MergeActionKind, QueryCommand, TableType, UsageType};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_actions() {
        let ir = parse_sql(
            "MERGE INTO inventory t \
             USING (SELECT sku, qty FROM incoming) s ON t.sku = s.sku \
             WHEN MATCHED AND s.qty = 0 THEN DELETE \
             WHEN MATCHED THEN UPDATE SET qty = t.qty + s.qty \
             WHEN NOT MATCHED THEN INSERT (sku, qty) VALUES (s.sku, s.qty)",
        )
        .unwrap();

        assert_eq!(ir.command, QueryCommand::Merge);
        let merge = ir.merge.as_ref().unwrap();
        assert_eq!(merge.target.name, "inventory");
        assert_eq!(merge.source.table_type, TableType::Subquery);
        assert_eq!(merge.condition, "t.sku = s.sku");

        let kinds: Vec<_> = merge.actions.iter().map(|a| a.action).collect();
        assert_eq!(
            kinds,
            vec![MergeActionKind::Delete, MergeActionKind::Update, MergeActionKind::Insert]
        );
        assert_eq!(merge.actions[0].predicate.as_deref(), Some("s.qty = 0"));
        assert_eq!(merge.actions[2].insert_columns, vec!["sku".to_string(), "qty".to_string()]);
        assert_eq!(merge.actions[2].values.len(), 2);

        assert_eq!(ir.usages_of(UsageType::Join).count(), 2);
        assert_eq!(ir.usages_of(UsageType::DmlSet).count(), 1);
        assert!(ir.tables.iter().any(|t| t.name == "incoming"));
    }
}
