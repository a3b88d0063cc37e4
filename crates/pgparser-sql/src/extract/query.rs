//! Query block extraction
//!
//! `QueryExtractor` owns the `ParsedQuery` under construction and walks each
//! query block once. The statement extractors (INSERT, UPDATE, ...) reuse it
//! for their FROM sources, nested queries and expressions.

use super::expr::{self, ExprScan};
use crate::parser::offset_of;
use pgparser_core::{
    ColumnName, ColumnReference, CommonTableExpr, Correlation, CteMaterialization, DerivedColumn,
    JoinClause, JoinType, OrderByItem, ParsedQuery, QueryCommand, SelectColumn, SetClause,
    SetOperation, SetOperator, SortDirection, Subquery, SubqueryClause, TableRef, TableType,
    UsageType,
};
use sqlparser::ast::{
    Assignment, AssignmentTarget, Cte, CteAsMaterialized, Expr, GroupByExpr, Join,
    JoinConstraint, JoinOperator, Query, Select, SelectItem, SetExpr, SetQuantifier, Spanned,
    TableFactor, TableWithJoins,
};
use sqlparser::tokenizer::Location;

/// A qualified reference that resolved to a scope outside the extractor
struct OuterRef {
    /// Index into the scope stack of the owning scope
    level: usize,
    qualifier: String,
    table: String,
    column: String,
}

pub struct QueryExtractor<'s> {
    sql: &'s str,
    ir: ParsedQuery,

    /// CTE names visible at the current point
    ctes: Vec<String>,

    /// Relations of each enclosing query block, innermost last
    scopes: Vec<Vec<TableRef>>,

    /// First scope owned by this extractor; lower ones belong to enclosing queries
    floor: usize,

    outer_refs: Vec<OuterRef>,
}

impl<'s> QueryExtractor<'s> {
    pub fn new(sql: &'s str, command: QueryCommand) -> Self {
        Self {
            sql,
            ir: ParsedQuery::new(command, sql),
            ctes: Vec::new(),
            scopes: Vec::new(),
            floor: 0,
            outer_refs: Vec::new(),
        }
    }

    /// Extractor for a nested query that can see the current scopes
    fn child(&self, raw_sql: String) -> QueryExtractor<'s> {
        QueryExtractor {
            sql: self.sql,
            ir: ParsedQuery::new(QueryCommand::Select, raw_sql),
            ctes: self.ctes.clone(),
            scopes: self.scopes.clone(),
            floor: self.scopes.len(),
            outer_refs: Vec::new(),
        }
    }

    pub fn ir_mut(&mut self) -> &mut ParsedQuery {
        &mut self.ir
    }

    pub fn finish(self) -> ParsedQuery {
        self.ir
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn pop_scope(&mut self) -> Vec<TableRef> {
        self.scopes.pop().unwrap_or_default()
    }

    /// Record a relation in the IR and make it visible in the current block
    pub fn register(&mut self, table: TableRef) {
        self.ir.add_table(table.clone());
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(table);
        }
    }

    /// Walk a query. Only the root query fills the top-level IR fields;
    /// nested ones contribute relations and column references.
    pub fn visit_query(&mut self, query: &Query, root: bool) {
        self.visit_query_block(query, root);
    }

    /// Walk a query; returns the leftmost block's projection and scope
    fn visit_query_block(&mut self, query: &Query, root: bool) -> (Vec<SelectColumn>, Vec<TableRef>) {
        let visible = self.ctes.len();

        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.visit_cte(cte, with.recursive, root);
            }
        }

        let (columns, scope) = self.visit_set_expr(&query.body, root);

        if root {
            self.ir.columns = columns.clone();
            self.visit_order_by(query, &columns, scope.clone());

            let limit = query
                .limit
                .as_ref()
                .and_then(expr::unsigned_literal)
                .or_else(|| {
                    query
                        .fetch
                        .as_ref()
                        .and_then(|f| f.quantity.as_ref())
                        .and_then(expr::unsigned_literal)
                });
            let offset = query
                .offset
                .as_ref()
                .and_then(|o| expr::unsigned_literal(&o.value));

            // `(SELECT ... LIMIT 5) ORDER BY x` keeps the inner limit
            self.ir.limit = limit.or(self.ir.limit);
            self.ir.offset = offset.or(self.ir.offset);
        }

        self.ctes.truncate(visible);
        (columns, scope)
    }

    /// ORDER BY items; a bare name matching an output alias sorts by that
    /// output column and is not a column of the FROM relations.
    fn visit_order_by(&mut self, query: &Query, columns: &[SelectColumn], scope: Vec<TableRef>) {
        let Some(order_by) = &query.order_by else {
            return;
        };

        self.scopes.push(scope);
        for item in &order_by.exprs {
            self.ir.order_by.push(OrderByItem {
                expression: item.expr.to_string(),
                direction: match item.asc {
                    Some(false) => SortDirection::Desc,
                    _ => SortDirection::Asc,
                },
                nulls_first: item.nulls_first,
            });

            let usage = if names_output_column(&item.expr, columns) {
                None
            } else {
                Some(UsageType::Order)
            };
            self.scan_expr(&item.expr, usage, SubqueryClause::Other);
        }
        self.scopes.pop();
    }

    fn visit_cte(&mut self, cte: &Cte, recursive: bool, root: bool) {
        let name = cte.alias.name.value.clone();

        // A CTE only sees itself under WITH RECURSIVE.
        if recursive {
            self.ctes.push(name.clone());
        }
        self.visit_query(&cte.query, false);
        if !recursive {
            self.ctes.push(name.clone());
        }

        if root {
            let close = cte.closing_paren_token.0.span.start;
            let query = self
                .slice(cte.query.span().start, close)
                .map(|text| text.trim().to_string())
                .unwrap_or_else(|| cte.query.to_string());

            self.ir.ctes.push(CommonTableExpr {
                name,
                columns: cte.alias.columns.iter().map(|c| c.to_string()).collect(),
                query,
                recursive,
                materialization: cte.materialized.as_ref().map(|m| match m {
                    CteAsMaterialized::Materialized => CteMaterialization::Materialized,
                    CteAsMaterialized::NotMaterialized => CteMaterialization::NotMaterialized,
                }),
            });
        }
    }

    /// Walk a query body; returns the leftmost block's projection and scope
    fn visit_set_expr(&mut self, body: &SetExpr, root: bool) -> (Vec<SelectColumn>, Vec<TableRef>) {
        match body {
            SetExpr::Select(select) => self.visit_select(select, root),
            SetExpr::Query(query) => self.visit_query_block(query, root),
            SetExpr::SetOperation {
                op,
                set_quantifier,
                left,
                right,
            } => {
                let leftmost = self.visit_set_expr(left, root);
                let (columns, _) = self.visit_set_expr(right, false);

                if root {
                    self.ir.set_operations.push(SetOperation {
                        operator: match op {
                            sqlparser::ast::SetOperator::Union => SetOperator::Union,
                            sqlparser::ast::SetOperator::Intersect => SetOperator::Intersect,
                            _ => SetOperator::Except,
                        },
                        all: matches!(
                            set_quantifier,
                            SetQuantifier::All | SetQuantifier::AllByName
                        ),
                        query: right.to_string(),
                        columns,
                    });
                }

                leftmost
            }
            SetExpr::Values(values) => {
                for row in &values.rows {
                    for value in row {
                        self.scan_expr(value, None, SubqueryClause::Other);
                    }
                }
                (Vec::new(), Vec::new())
            }
            _ => (Vec::new(), Vec::new()),
        }
    }

    fn visit_select(&mut self, select: &Select, root: bool) -> (Vec<SelectColumn>, Vec<TableRef>) {
        self.push_scope();
        self.visit_from(&select.from, SubqueryClause::From);

        let mut columns = Vec::new();
        for item in &select.projection {
            let column = match item {
                SelectItem::UnnamedExpr(e) => {
                    self.scan_expr(e, Some(UsageType::Projection), SubqueryClause::Select);
                    SelectColumn {
                        expression: e.to_string(),
                        alias: None,
                    }
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    self.scan_expr(expr, Some(UsageType::Projection), SubqueryClause::Select);
                    if root {
                        self.ir.derived_columns.push(DerivedColumn {
                            alias: alias.value.clone(),
                            expression: expr.to_string(),
                        });
                    }
                    SelectColumn {
                        expression: expr.to_string(),
                        alias: Some(alias.value.clone()),
                    }
                }
                other => SelectColumn {
                    expression: other.to_string(),
                    alias: None,
                },
            };
            columns.push(column);
        }

        if let Some(selection) = &select.selection {
            self.scan_expr(selection, Some(UsageType::Filter), SubqueryClause::Where);
        }

        if let GroupByExpr::Expressions(exprs, ..) = &select.group_by {
            for e in exprs {
                self.scan_expr(e, Some(UsageType::Group), SubqueryClause::Other);
            }
        }

        if let Some(having) = &select.having {
            self.scan_expr(having, Some(UsageType::Filter), SubqueryClause::Having);
        }

        if root {
            self.ir.distinct = select.distinct.is_some();
            self.ir.where_clause = expr::conjuncts(select.selection.as_ref());
            self.ir.having = expr::conjuncts(select.having.as_ref());
            self.ir.group_by = match &select.group_by {
                GroupByExpr::All(_) => vec!["ALL".to_string()],
                GroupByExpr::Expressions(exprs, ..) => {
                    exprs.iter().map(|e| e.to_string()).collect()
                }
            };
        }

        let scope = self.pop_scope();
        (columns, scope)
    }

    /// Register FROM relations, then process their join conditions
    pub fn visit_from(&mut self, from: &[TableWithJoins], clause: SubqueryClause) {
        let mut pending = Vec::new();

        for item in from {
            self.visit_table_with_joins(item, clause, &mut pending);
        }

        self.scan_join_conditions(pending);
    }

    /// Register a single relation (MERGE target and source)
    pub fn visit_relation(&mut self, factor: &TableFactor, clause: SubqueryClause) -> Option<TableRef> {
        let mut pending = Vec::new();
        let table = self.visit_table_factor(factor, clause, &mut pending);
        self.scan_join_conditions(pending);
        table
    }

    fn scan_join_conditions(&mut self, pending: Vec<(usize, &Expr)>) {
        for (index, condition) in pending {
            self.scan_expr(condition, Some(UsageType::Join), SubqueryClause::Join);

            let equalities: Vec<_> = expr::equalities(condition)
                .into_iter()
                .map(|mut equality| {
                    equality.left_tables = self.base_tables_for(&equality.left);
                    equality.right_tables = self.base_tables_for(&equality.right);
                    equality
                })
                .collect();

            if let Some(join) = self.ir.joins.get_mut(index) {
                join.equalities = equalities;
            }
        }
    }

    /// Base relations a join operand can belong to. A qualifier names one
    /// relation of the innermost scope that has it; a bare column may belong
    /// to any base relation of the current block.
    fn base_tables_for(&self, column: &ColumnName) -> Vec<String> {
        match &column.qualifier {
            Some(qualifier) => self
                .scopes
                .iter()
                .rev()
                .find_map(|scope| scope.iter().find(|t| t.matches_qualifier(qualifier)))
                .filter(|t| t.table_type == TableType::Base)
                .map(|t| vec![t.qualified_name()])
                .unwrap_or_default(),
            None => self
                .scopes
                .last()
                .map(|scope| {
                    scope
                        .iter()
                        .filter(|t| t.table_type == TableType::Base)
                        .map(TableRef::qualified_name)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    fn visit_table_with_joins<'a>(
        &mut self,
        item: &'a TableWithJoins,
        clause: SubqueryClause,
        pending: &mut Vec<(usize, &'a Expr)>,
    ) {
        self.visit_table_factor(&item.relation, clause, pending);

        for join in &item.joins {
            self.visit_join(join, pending);
        }
    }

    fn visit_join<'a>(&mut self, join: &'a Join, pending: &mut Vec<(usize, &'a Expr)>) {
        let table = self.visit_table_factor(&join.relation, SubqueryClause::Join, pending);
        let (join_type, constraint) = join_kind(&join.join_operator);

        let mut record = JoinClause {
            join_type,
            table: table
                .as_ref()
                .map(|t| t.qualified_name())
                .unwrap_or_else(|| join.relation.to_string()),
            alias: table.and_then(|t| t.alias),
            condition: None,
            using: Vec::new(),
            equalities: Vec::new(),
        };

        match constraint {
            Some(JoinConstraint::On(condition)) => {
                record.condition = Some(condition.to_string());
                pending.push((self.ir.joins.len(), condition));
            }
            Some(JoinConstraint::Using(columns)) => {
                record.using = columns.iter().map(|c| c.to_string()).collect();
            }
            _ => {}
        }

        self.ir.joins.push(record);
    }

    fn visit_table_factor<'a>(
        &mut self,
        factor: &'a TableFactor,
        clause: SubqueryClause,
        pending: &mut Vec<(usize, &'a Expr)>,
    ) -> Option<TableRef> {
        let table = match factor {
            TableFactor::Table {
                name, alias, args, ..
            } => {
                let (schema, table_name) = expr::split_object_name(name);
                let table_type = if args.is_some() {
                    TableType::Derived
                } else if schema.is_none() && self.is_cte(&table_name) {
                    TableType::Cte
                } else {
                    TableType::Base
                };

                TableRef::base(table_name)
                    .with_schema(schema)
                    .with_alias(alias.as_ref().map(|a| a.name.value.clone()))
                    .with_type(table_type)
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                let alias = alias.as_ref().map(|a| a.name.value.clone());
                self.extract_subquery(subquery, clause, alias.clone());

                TableRef::base(alias.unwrap_or_else(|| "subquery".to_string()))
                    .with_type(TableType::Subquery)
            }
            TableFactor::NestedJoin {
                table_with_joins,
                alias,
            } => {
                self.visit_table_with_joins(table_with_joins, clause, pending);
                let alias = alias.as_ref()?;
                TableRef::base(alias.name.value.clone()).with_type(TableType::Derived)
            }
            TableFactor::Function { name, alias, .. } => {
                let (schema, function) = expr::split_object_name(name);
                TableRef::base(function)
                    .with_schema(schema)
                    .with_alias(alias.as_ref().map(|a| a.name.value.clone()))
                    .with_type(TableType::Derived)
            }
            TableFactor::UNNEST { alias, .. } => TableRef::base("unnest")
                .with_alias(alias.as_ref().map(|a| a.name.value.clone()))
                .with_type(TableType::Derived),
            TableFactor::TableFunction { alias, .. } => TableRef::base("table_function")
                .with_alias(alias.as_ref().map(|a| a.name.value.clone()))
                .with_type(TableType::Derived),
            other => {
                tracing::debug!(relation = %other, "unmodeled FROM item");
                return None;
            }
        };

        self.register(table.clone());
        Some(table)
    }

    fn is_cte(&self, name: &str) -> bool {
        self.ctes.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Record column references of `expr` under `usage` (when given) and
    /// extract its nested queries as subqueries of `clause`.
    pub fn scan_expr(&mut self, expr: &Expr, usage: Option<UsageType>, clause: SubqueryClause) {
        let scan = ExprScan::scan(expr);

        if let Some(usage) = usage {
            for column in scan.columns {
                self.record(column, usage);
            }
        }

        for query in &scan.queries {
            self.extract_subquery(query, clause, None);
        }
    }

    /// Record one column reference with the relations of the current block
    pub fn record(&mut self, column: ColumnName, usage: UsageType) {
        if let Some(qualifier) = &column.qualifier {
            self.note_outer_reference(qualifier, &column.column);
        }

        let scope = self
            .scopes
            .last()
            .map(|s| s.iter().map(|t| t.reference_name().to_string()).collect())
            .unwrap_or_default();

        self.ir.column_refs.push(ColumnReference {
            column,
            usage,
            scope,
        });
    }

    fn note_outer_reference(&mut self, qualifier: &str, column: &str) {
        let (outer, own) = self.scopes.split_at(self.floor.min(self.scopes.len()));

        let local = own
            .iter()
            .any(|scope| scope.iter().any(|t| t.matches_qualifier(qualifier)));
        if local {
            return;
        }

        let found = outer.iter().enumerate().rev().find_map(|(level, scope)| {
            scope
                .iter()
                .find(|t| t.matches_qualifier(qualifier))
                .map(|t| (level, t.qualified_name()))
        });

        if let Some((level, table)) = found {
            self.outer_refs.push(OuterRef {
                level,
                qualifier: qualifier.to_string(),
                table,
                column: column.to_string(),
            });
        }
    }

    /// Extract a nested query into `subqueries` with its own IR
    fn extract_subquery(&mut self, query: &Query, clause: SubqueryClause, alias: Option<String>) {
        let text = query.to_string();
        let mut child = self.child(text.clone());
        child.visit_query(query, true);

        let index = self.ir.subqueries.len();
        for outer in child.outer_refs.drain(..) {
            if outer.level >= self.floor {
                self.ir.correlations.push(Correlation {
                    subquery: index,
                    outer_alias: outer.qualifier,
                    outer_table: Some(outer.table),
                    column: outer.column,
                });
            } else {
                self.outer_refs.push(outer);
            }
        }

        let mut parsed = child.ir;
        for table in &parsed.tables {
            self.ir.add_table(table.clone());
        }
        self.ir.joins.extend(parsed.joins.iter().cloned());
        self.ir.column_refs.extend(parsed.column_refs.iter().cloned());
        parsed.classify_column_usage();

        self.ir.subqueries.push(Subquery {
            clause,
            alias,
            query: text,
            parsed: Box::new(parsed),
        });
    }

    /// `col = expr` assignments; targets are DmlSet usages
    pub fn visit_assignments(&mut self, assignments: &[Assignment]) -> Vec<SetClause> {
        let mut clauses = Vec::new();

        for assignment in assignments {
            let targets: Vec<_> = match &assignment.target {
                AssignmentTarget::ColumnName(name) => vec![name],
                AssignmentTarget::Tuple(names) => names.iter().collect(),
            };

            for target in targets {
                if let Some(column) = expr::object_column(target) {
                    self.record(column, UsageType::DmlSet);
                }
            }

            self.scan_expr(&assignment.value, None, SubqueryClause::Other);
            clauses.push(SetClause {
                column: assignment.target.to_string(),
                expression: assignment.value.to_string(),
            });
        }

        clauses
    }

    pub fn visit_returning(&mut self, items: &[SelectItem]) {
        for item in items {
            match item {
                SelectItem::UnnamedExpr(e) | SelectItem::ExprWithAlias { expr: e, .. } => {
                    self.scan_expr(e, Some(UsageType::Returning), SubqueryClause::Other);
                }
                _ => {}
            }
            self.ir.returning.push(item.to_string());
        }
    }

    /// Input text between two positions, when both are known
    fn slice(&self, start: Location, end: Location) -> Option<&'s str> {
        let start = offset_of(self.sql, start)?;
        let end = offset_of(self.sql, end)?;
        self.sql.get(start..end)
    }
}

fn names_output_column(expr: &Expr, columns: &[SelectColumn]) -> bool {
    let Expr::Identifier(ident) = expr else {
        return false;
    };

    columns
        .iter()
        .filter_map(|c| c.alias.as_deref())
        .any(|alias| alias.eq_ignore_ascii_case(&ident.value))
}

fn join_kind(operator: &JoinOperator) -> (JoinType, Option<&JoinConstraint>) {
    match operator {
        JoinOperator::Inner(c) => (JoinType::Inner, Some(c)),
        JoinOperator::LeftOuter(c) => (JoinType::Left, Some(c)),
        JoinOperator::RightOuter(c) => (JoinType::Right, Some(c)),
        JoinOperator::FullOuter(c) => (JoinType::Full, Some(c)),
        JoinOperator::CrossJoin => (JoinType::Cross, None),
        JoinOperator::Semi(c) | JoinOperator::LeftSemi(c) | JoinOperator::RightSemi(c) => {
            (JoinType::Semi, Some(c))
        }
        JoinOperator::Anti(c) | JoinOperator::LeftAnti(c) | JoinOperator::RightAnti(c) => {
            (JoinType::Anti, Some(c))
        }
        _ => (JoinType::Other, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SqlParser;
    use pgparser_core::AliasResolution;
    use pretty_assertions::assert_eq;

    fn extract(sql: &str) -> ParsedQuery {
        let parsed = SqlParser::new().parse(sql).unwrap();
        let Some(sqlparser::ast::Statement::Query(query)) = parsed.statement() else {
            panic!("expected a query");
        };

        let mut extractor = QueryExtractor::new(sql, QueryCommand::Select);
        extractor.visit_query(query, true);

        let mut ir = extractor.finish();
        ir.classify_column_usage();
        ir
    }

    #[test]
    fn cte_shadowing_a_table_is_tagged_cte() {
        let ir = extract("WITH users AS (SELECT * FROM users) SELECT id FROM users");

        let types: Vec<_> = ir.tables.iter().map(|t| t.table_type).collect();
        assert_eq!(types, vec![TableType::Base, TableType::Cte]);
    }

    #[test]
    fn recursive_cte_sees_itself() {
        let ir = extract(
            "WITH RECURSIVE t(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM t WHERE n < 5) \
             SELECT n FROM t",
        );

        assert_eq!(ir.ctes.len(), 1);
        assert!(ir.ctes[0].recursive);
        assert_eq!(ir.ctes[0].columns, vec!["n".to_string()]);
        assert!(ir.tables.iter().all(|t| t.table_type == TableType::Cte));
    }

    #[test]
    fn cte_text_is_sliced_verbatim() {
        let ir = extract("WITH x AS (\n  select   a FROM  t\n) SELECT a FROM x");
        assert_eq!(ir.ctes[0].query, "select   a FROM  t");
    }

    #[test]
    fn set_operation_legs() {
        let ir = extract("SELECT a FROM t1 UNION ALL SELECT b, c FROM t2 EXCEPT SELECT d FROM t3");

        assert_eq!(ir.columns.len(), 1);
        assert_eq!(ir.set_operations.len(), 2);
        assert_eq!(ir.set_operations[0].operator, SetOperator::Union);
        assert!(ir.set_operations[0].all);
        assert_eq!(ir.set_operations[0].columns.len(), 2);
        assert_eq!(ir.set_operations[1].operator, SetOperator::Except);
        assert!(!ir.set_operations[1].all);
        assert_eq!(ir.tables.len(), 3);
    }

    #[test]
    fn where_subquery_with_correlation() {
        let ir = extract(
            "SELECT o.id FROM orders o \
             WHERE EXISTS (SELECT 1 FROM refunds r WHERE r.order_id = o.id)",
        );

        assert_eq!(ir.subqueries.len(), 1);
        assert_eq!(ir.subqueries[0].clause, SubqueryClause::Where);
        assert_eq!(ir.subqueries[0].parsed.tables.len(), 1);

        assert_eq!(ir.correlations.len(), 1);
        let correlation = &ir.correlations[0];
        assert_eq!(correlation.outer_alias, "o");
        assert_eq!(correlation.outer_table.as_deref(), Some("orders"));
        assert_eq!(correlation.column, "id");
        assert_eq!(ir.tables.len(), 2);
    }

    #[test]
    fn from_subquery_is_registered_with_alias() {
        let ir = extract("SELECT s.total FROM (SELECT sum(amount) AS total FROM payments) s");

        assert_eq!(ir.subqueries.len(), 1);
        assert_eq!(ir.subqueries[0].clause, SubqueryClause::From);
        assert_eq!(ir.subqueries[0].alias.as_deref(), Some("s"));
        assert!(ir
            .tables
            .iter()
            .any(|t| t.name == "s" && t.table_type == TableType::Subquery));
        assert!(ir.tables.iter().any(|t| t.name == "payments"));
        assert!(ir.derived_columns.is_empty());
    }

    #[test]
    fn joins_record_conditions_and_using() {
        let ir = extract(
            "SELECT * FROM a LEFT JOIN b ON a.id = b.a_id AND b.active \
             JOIN c USING (id) CROSS JOIN d",
        );

        assert_eq!(ir.joins.len(), 3);
        assert_eq!(ir.joins[0].join_type, JoinType::Left);
        assert_eq!(ir.joins[0].equalities.len(), 1);
        assert_eq!(ir.joins[1].using, vec!["id".to_string()]);
        assert_eq!(ir.joins[2].join_type, JoinType::Cross);
    }

    #[test]
    fn top_level_clauses() {
        let ir = extract(
            "SELECT DISTINCT region, count(*) AS n FROM sales \
             WHERE fiscal_year = 2024 AND amount > 0 \
             GROUP BY region HAVING count(*) > 3 \
             ORDER BY n DESC NULLS LAST LIMIT 10 OFFSET 20",
        );

        assert!(ir.distinct);
        assert_eq!(ir.where_clause, vec!["fiscal_year = 2024", "amount > 0"]);
        assert_eq!(ir.group_by, vec!["region"]);
        assert_eq!(ir.having, vec!["count(*) > 3"]);
        assert_eq!(ir.order_by[0].direction, SortDirection::Desc);
        assert_eq!(ir.order_by[0].nulls_first, Some(false));
        assert_eq!(ir.limit, Some(10));
        assert_eq!(ir.offset, Some(20));
        assert_eq!(ir.derived_columns.len(), 1);
        assert_eq!(ir.derived_columns[0].alias, "n");
    }

    #[test]
    fn order_by_output_alias_is_not_a_relation_column() {
        let ir = extract("SELECT region, count(*) AS n FROM sales ORDER BY n, region");

        let ordered: Vec<_> = ir
            .usages_of(UsageType::Order)
            .map(|u| (u.table_alias.as_str(), u.column.as_str()))
            .collect();
        assert_eq!(ordered, vec![("sales", "region")]);
        assert_eq!(ir.order_by.len(), 2);
    }

    #[test]
    fn parenthesized_query_order_by_sees_inner_relations() {
        let ir = extract("(SELECT id FROM t) ORDER BY id LIMIT 3");

        let ordered: Vec<_> = ir.usages_of(UsageType::Order).collect();
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].table_alias, "t");
        assert_eq!(ordered[0].resolution, AliasResolution::Inferred);
        assert_eq!(ir.columns.len(), 1);
        assert_eq!(ir.limit, Some(3));
    }

    #[test]
    fn join_operands_resolve_in_their_own_block() {
        let ir = extract(
            "WITH big AS (SELECT o.id FROM orders o JOIN lines l ON l.order_id = o.id) \
             SELECT * FROM refunds o JOIN customers c ON o.customer_id = c.id",
        );

        let outer = ir.joins.iter().find(|j| j.table == "customers").unwrap();
        assert_eq!(outer.equalities[0].left_tables, vec!["refunds".to_string()]);
        assert_eq!(outer.equalities[0].right_tables, vec!["customers".to_string()]);

        let inner = ir.joins.iter().find(|j| j.table == "lines").unwrap();
        assert_eq!(inner.equalities[0].right_tables, vec!["orders".to_string()]);
    }

    #[test]
    fn join_operands_naming_a_cte_are_not_base_tables() {
        let ir = extract(
            "WITH c AS (SELECT 1 AS id) \
             SELECT * FROM orders o JOIN c ON o.customer_id = c.id JOIN users u USING (id) \
             JOIN accounts ON account_id = u.id",
        );

        assert!(ir.joins[0].equalities[0].right_tables.is_empty());
        assert_eq!(
            ir.joins[2].equalities[0].left_tables,
            vec!["orders".to_string(), "users".to_string(), "accounts".to_string()]
        );
    }
}
