//! The abstract query plan.
//!
//! A plan is the ordered list of operations the engine hands to the
//! external executor: predicates, relation-existence filters, ordering,
//! grouping, eager loads, and one pagination directive. The plan never
//! performs I/O itself; `render` turns it into SQL for diagnostics and
//! for executors that want a rendered statement.

use crate::catalog::EntityDef;

/// How a predicate combines with what came before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

/// Comparison operators usable in a field condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse a query-string direction value; anything other than a
    /// case-insensitive `desc` sorts ascending.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

/// A condition on a single field. Values stay as the (transformed)
/// query-string text; coercion to typed bindings happens at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldCondition {
    Compare { op: Comparison, value: String },
    Null { negated: bool },
    Between { low: String, high: String },
    InList { values: Vec<String>, negated: bool },
}

/// Pagination directive, one per plan at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// Skip `offset` rows, take `limit`.
    Offset { offset: u64, limit: u64 },
    /// 1-indexed page of `size` rows.
    Page { number: u64, size: u64 },
}

/// One abstract operation in the plan, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOp {
    /// Root-entity predicate.
    Predicate {
        field: String,
        cond: FieldCondition,
        conjunction: Conjunction,
    },
    /// Restrict to rows having a related record through `path` whose
    /// `field` satisfies `cond`.
    RelationExists {
        path: String,
        field: String,
        cond: FieldCondition,
    },
    /// Primary-key (or foreign-key) restriction, always AND, never folded
    /// into an OR group.
    KeyEquals { field: String, key: i64 },
    /// Restrict the working set to the named relation of one parent record.
    ParentRestrict {
        parent_entity: String,
        relation: String,
        key: i64,
    },
    OrderBy {
        field: String,
        direction: SortDirection,
    },
    /// Order the root rows by a field of a to-one/to-many relation,
    /// rendered as a join.
    OrderByRelated {
        relation: String,
        field: String,
        direction: SortDirection,
    },
    GroupBy { field: String },
    /// Eager-load a named relation; carried for the executor, invisible
    /// in the rendered root statement.
    EagerLoad { relation: String },
    Paginate(PageRequest),
}

/// The accumulating output of one request. Owned by the builder while it
/// runs, then handed to the executor and never mutated again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Logical name of the entity the plan is rooted at.
    pub entity: String,
    /// Table backing the root entity.
    pub table: String,
    /// Primary key field of the root entity.
    pub primary_key: String,
    ops: Vec<PlanOp>,
    count: bool,
}

impl QueryPlan {
    /// Start a fresh plan scoped to one entity.
    pub fn for_entity(def: &EntityDef) -> Self {
        Self {
            entity: def.name.clone(),
            table: def.table.clone(),
            primary_key: def.primary_key.clone(),
            ops: Vec::new(),
            count: false,
        }
    }

    pub fn push(&mut self, op: PlanOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[PlanOp] {
        &self.ops
    }

    pub fn is_count(&self) -> bool {
        self.count
    }

    /// Derive a count projection of this plan: same predicates and joins,
    /// a single count aggregate instead of rows. Read-only with respect
    /// to `self`.
    pub fn to_count(&self) -> QueryPlan {
        let mut counter = self.clone();
        counter.count = true;
        counter
    }

    /// Relations requested for eager loading, in request order.
    pub fn eager_loads(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                PlanOp::EagerLoad { relation } => Some(relation.as_str()),
                _ => None,
            })
            .collect()
    }
}
