//! SQL rendering for query plans using SeaQuery.
//!
//! The executor collaborator owns execution; rendering exists for the
//! `to_query_string()`/`bindings()` diagnostic pair and for executors
//! that consume a rendered statement. Relation-existence filters become
//! correlated EXISTS subqueries; ordering by a related field becomes a
//! join against an aliased relation table.

use sea_query::{
    Alias, Asterisk, Cond, Expr, ExprTrait, JoinType, Order, PostgresQueryBuilder, Query,
    SelectStatement, SimpleExpr, Value,
};

use crate::catalog::{EntityCatalog, EntityDef, RelationKind};
use crate::error::{QueryError, QueryResult};
use crate::plan::{
    Comparison, Conjunction, FieldCondition, PageRequest, PlanOp, QueryPlan, SortDirection,
};

impl QueryPlan {
    /// Render the plan as a SeaQuery SELECT statement.
    pub fn to_select(&self, catalog: &dyn EntityCatalog) -> QueryResult<SelectStatement> {
        let root = catalog
            .entity(&self.entity)
            .ok_or_else(|| QueryError::UnknownEntity(self.entity.clone()))?;

        let mut query = Query::select();
        if self.is_count() {
            query.expr(Expr::col(Asterisk).count());
        } else {
            query.column((Alias::new(&self.table), Asterisk));
        }
        query.from(Alias::new(&self.table));

        // Predicates fold left in op order; AND binds tighter than OR, so
        // `A and B or C` groups as `(A and B) or C`. Key and parent
        // restrictions stay outside the fold: an OR clause must never
        // widen a request past its resource or parent scope.
        let mut filter: Option<Cond> = None;

        for op in self.ops() {
            match op {
                PlanOp::Predicate { field, cond, conjunction } => {
                    let expr = condition_expr(Expr::col(Alias::new(field)), cond);
                    filter = Some(merge(filter, *conjunction, expr));
                }
                PlanOp::RelationExists { path, field, cond } => {
                    let expr = exists_for_path(catalog, root, path, field, cond)?;
                    filter = Some(merge(filter, Conjunction::And, expr));
                }
                PlanOp::KeyEquals { field, key } => {
                    query.and_where(
                        Expr::col((Alias::new(&self.table), Alias::new(field))).eq(*key),
                    );
                }
                PlanOp::ParentRestrict { parent_entity, relation, key } => {
                    let expr = parent_restrict_expr(catalog, root, parent_entity, relation, *key)?;
                    query.and_where(expr);
                }
                PlanOp::OrderBy { field, direction } => {
                    if !self.is_count() {
                        query.order_by(Alias::new(field), order(*direction));
                    }
                }
                PlanOp::OrderByRelated { relation, field, direction } => {
                    if !self.is_count() {
                        order_related(&mut query, catalog, root, relation, field, *direction)?;
                    }
                }
                PlanOp::GroupBy { field } => {
                    if !self.is_count() {
                        query.group_by_col(Alias::new(field));
                    }
                }
                // Eager loads are executor instructions; they do not
                // appear in the root statement.
                PlanOp::EagerLoad { .. } => {}
                PlanOp::Paginate(request) => {
                    if !self.is_count() {
                        match request {
                            PageRequest::Offset { offset, limit } => {
                                query.limit(*limit).offset(*offset);
                            }
                            PageRequest::Page { number, size } => {
                                // Page numbers come straight from the query
                                // string; saturate instead of overflowing.
                                let offset = number.saturating_sub(1).saturating_mul(*size);
                                query.limit(*size).offset(offset);
                            }
                        }
                    }
                }
            }
        }

        if let Some(cond) = filter {
            query.cond_where(cond);
        }
        Ok(query)
    }

    /// The SQL statement built so far, with inlined values. Diagnostic
    /// counterpart of `bindings`.
    pub fn to_query_string(&self, catalog: &dyn EntityCatalog) -> QueryResult<String> {
        Ok(self.to_select(catalog)?.to_string(PostgresQueryBuilder))
    }

    /// The bind values of the rendered statement, in placeholder order.
    pub fn bindings(&self, catalog: &dyn EntityCatalog) -> QueryResult<Vec<Value>> {
        let (_, values) = self.to_select(catalog)?.build(PostgresQueryBuilder);
        Ok(values.0)
    }
}

fn order(direction: SortDirection) -> Order {
    match direction {
        SortDirection::Asc => Order::Asc,
        SortDirection::Desc => Order::Desc,
    }
}

fn merge(acc: Option<Cond>, conjunction: Conjunction, expr: SimpleExpr) -> Cond {
    match (acc, conjunction) {
        (None, _) => Cond::all().add(expr),
        (Some(prev), Conjunction::And) => Cond::all().add(prev).add(expr),
        (Some(prev), Conjunction::Or) => Cond::any().add(prev).add(expr),
    }
}

/// Coerce a query-string value into a typed bind value when the text
/// round-trips exactly; everything else binds as a string, so values
/// like `01234` keep their leading zero.
fn coerce_value(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        if int.to_string() == raw {
            return int.into();
        }
    }
    if let Ok(float) = raw.parse::<f64>() {
        if float.to_string() == raw {
            return float.into();
        }
    }
    match raw {
        "true" => true.into(),
        "false" => false.into(),
        _ => raw.to_owned().into(),
    }
}

fn condition_expr(col: Expr, cond: &FieldCondition) -> SimpleExpr {
    match cond {
        FieldCondition::Compare { op, value } => match op {
            Comparison::Eq => col.eq(coerce_value(value)),
            Comparison::Gt => col.gt(coerce_value(value)),
            Comparison::Gte => col.gte(coerce_value(value)),
            Comparison::Lt => col.lt(coerce_value(value)),
            Comparison::Lte => col.lte(coerce_value(value)),
            // LIKE patterns are already-wrapped text, never coerced.
            Comparison::Like => col.like(value.as_str()),
        },
        FieldCondition::Null { negated: false } => col.is_null(),
        FieldCondition::Null { negated: true } => col.is_not_null(),
        FieldCondition::Between { low, high } => {
            col.between(coerce_value(low), coerce_value(high))
        }
        FieldCondition::InList { values, negated } => {
            let values = values.iter().map(|v| coerce_value(v));
            if *negated {
                col.is_not_in(values)
            } else {
                col.is_in(values)
            }
        }
    }
}

/// Correlated EXISTS subquery restricting `current` rows to those with a
/// related record through `path` satisfying `cond` on `field`. Multi-hop
/// paths nest one EXISTS per hop.
fn exists_for_path(
    catalog: &dyn EntityCatalog,
    current: &EntityDef,
    path: &str,
    field: &str,
    cond: &FieldCondition,
) -> QueryResult<SimpleExpr> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let relation = current
        .relation(head)
        .ok_or_else(|| QueryError::UnknownRelation {
            entity: current.name.clone(),
            relation: head.to_string(),
        })?;
    let related = catalog
        .entity(&relation.target)
        .ok_or_else(|| QueryError::UnknownEntity(relation.target.clone()))?;

    let mut sub = Query::select();
    sub.expr(Expr::val(1)).from(Alias::new(&related.table));

    match &relation.kind {
        RelationKind::ToMany { foreign_key, local_key } => {
            sub.and_where(
                Expr::col((Alias::new(&related.table), Alias::new(foreign_key)))
                    .equals((Alias::new(&current.table), Alias::new(local_key))),
            );
        }
        RelationKind::ToOne { foreign_key, owner_key } => {
            sub.and_where(
                Expr::col((Alias::new(&related.table), Alias::new(owner_key)))
                    .equals((Alias::new(&current.table), Alias::new(foreign_key))),
            );
        }
        RelationKind::ThroughPivot {
            pivot_table,
            local_pivot_key,
            related_pivot_key,
            local_key,
            related_key,
        } => {
            sub.join(
                JoinType::InnerJoin,
                Alias::new(pivot_table),
                Expr::col((Alias::new(pivot_table), Alias::new(related_pivot_key)))
                    .equals((Alias::new(&related.table), Alias::new(related_key))),
            );
            sub.and_where(
                Expr::col((Alias::new(pivot_table), Alias::new(local_pivot_key)))
                    .equals((Alias::new(&current.table), Alias::new(local_key))),
            );
        }
    }

    let inner = match rest {
        Some(rest) => exists_for_path(catalog, related, rest, field, cond)?,
        None => condition_expr(
            Expr::col((Alias::new(&related.table), Alias::new(field))),
            cond,
        ),
    };
    sub.and_where(inner);

    Ok(Expr::exists(sub))
}

/// Restriction of the working set to the named relation of one parent
/// record, shaped by the relation kind.
fn parent_restrict_expr(
    catalog: &dyn EntityCatalog,
    root: &EntityDef,
    parent_entity: &str,
    relation_name: &str,
    key: i64,
) -> QueryResult<SimpleExpr> {
    let parent = catalog
        .entity(parent_entity)
        .ok_or_else(|| QueryError::UnknownEntity(parent_entity.to_string()))?;
    let relation = parent
        .relation(relation_name)
        .ok_or_else(|| QueryError::UnknownRelation {
            entity: parent.name.clone(),
            relation: relation_name.to_string(),
        })?;

    match &relation.kind {
        // The related rows carry the parent key directly.
        RelationKind::ToMany { foreign_key, .. } => Ok(Expr::col((
            Alias::new(&root.table),
            Alias::new(foreign_key),
        ))
        .eq(key)),
        RelationKind::ToOne { foreign_key, owner_key } => {
            let mut sub = Query::select();
            sub.expr(Expr::val(1)).from(Alias::new(&parent.table));
            sub.and_where(
                Expr::col((Alias::new(&parent.table), Alias::new(&parent.primary_key))).eq(key),
            );
            sub.and_where(
                Expr::col((Alias::new(&parent.table), Alias::new(foreign_key)))
                    .equals((Alias::new(&root.table), Alias::new(owner_key))),
            );
            Ok(Expr::exists(sub))
        }
        RelationKind::ThroughPivot {
            pivot_table,
            local_pivot_key,
            related_pivot_key,
            local_key,
            related_key,
        } => {
            let mut sub = Query::select();
            sub.expr(Expr::val(1)).from(Alias::new(pivot_table));
            sub.join(
                JoinType::InnerJoin,
                Alias::new(&parent.table),
                Expr::col((Alias::new(&parent.table), Alias::new(local_key)))
                    .equals((Alias::new(pivot_table), Alias::new(local_pivot_key))),
            );
            sub.and_where(
                Expr::col((Alias::new(pivot_table), Alias::new(related_pivot_key)))
                    .equals((Alias::new(&root.table), Alias::new(related_key))),
            );
            sub.and_where(
                Expr::col((Alias::new(&parent.table), Alias::new(&parent.primary_key))).eq(key),
            );
            Ok(Expr::exists(sub))
        }
    }
}

/// Join the relation table under an alias and order by its field.
/// Pivot relations have no single join the engine can pick, so ordering
/// through them is rejected rather than guessed.
fn order_related(
    query: &mut SelectStatement,
    catalog: &dyn EntityCatalog,
    root: &EntityDef,
    relation_name: &str,
    field: &str,
    direction: SortDirection,
) -> QueryResult<()> {
    let relation = root
        .relation(relation_name)
        .ok_or_else(|| QueryError::UnknownRelation {
            entity: root.name.clone(),
            relation: relation_name.to_string(),
        })?;
    let related = catalog
        .entity(&relation.target)
        .ok_or_else(|| QueryError::UnknownEntity(relation.target.clone()))?;
    let alias = format!("rel_{relation_name}");

    let on_condition = match &relation.kind {
        RelationKind::ToOne { foreign_key, owner_key } => {
            Expr::col((Alias::new(&alias), Alias::new(owner_key)))
                .equals((Alias::new(&root.table), Alias::new(foreign_key)))
        }
        RelationKind::ToMany { foreign_key, local_key } => {
            Expr::col((Alias::new(&alias), Alias::new(foreign_key)))
                .equals((Alias::new(&root.table), Alias::new(local_key)))
        }
        RelationKind::ThroughPivot { .. } => {
            return Err(QueryError::UnsupportedRelationKind {
                entity: root.name.clone(),
                relation: relation_name.to_string(),
            });
        }
    };

    query.join_as(
        JoinType::InnerJoin,
        Alias::new(&related.table),
        Alias::new(&alias),
        on_condition,
    );
    query.order_by((Alias::new(&alias), Alias::new(field)), order(direction));
    Ok(())
}
