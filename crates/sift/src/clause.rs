//! Clause registry and per-clause dispatch.
//!
//! A clause recognizes query-string parameters by a literal, case-sensitive
//! name prefix (`whereFirstName`, `betweenLetterId[]`) and turns each match
//! into one plan operation. The registry is built once at startup and
//! shared read-only across requests.

use crate::error::{QueryError, QueryResult};
use crate::params::ParamValue;
use crate::plan::{
    Comparison, Conjunction, FieldCondition, PlanOp, QueryPlan, SortDirection,
};

/// Pure value transform applied before a clause emits its operation.
/// Transforms must not capture mutable state; they run concurrently
/// across requests.
pub type ValueTransform = fn(&str) -> String;

fn identity(value: &str) -> String {
    value.to_string()
}

/// Wrap a value in SQL LIKE wildcard markers on both sides.
fn like_wrap(value: &str) -> String {
    format!("%{value}%")
}

/// What a clause does with the field/value pair it extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseAction {
    NullCheck { negated: bool },
    Predicate { conjunction: Conjunction, op: Comparison },
    OrderBy,
    GroupBy,
    Between,
    InList { negated: bool },
}

/// A field name extracted from a parameter, split into relation path and
/// leaf when dot-notation points into a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReference {
    pub field: String,
    /// `(relation_path, leaf_field)` when the raw field contained a dot.
    pub relation: Option<(String, String)>,
}

/// Static descriptor for one registered prefix.
#[derive(Debug, Clone)]
pub struct ClauseDescriptor {
    pub prefix: &'static str,
    pub action: ClauseAction,
    transform: ValueTransform,
    /// For a multi-value input, whether the transform runs once per
    /// element (default) or the collection passes through untouched for
    /// the action to handle as a whole.
    elementwise: bool,
}

impl ClauseDescriptor {
    pub fn new(prefix: &'static str, action: ClauseAction) -> Self {
        Self {
            prefix,
            action,
            transform: identity,
            elementwise: true,
        }
    }

    pub fn with_transform(mut self, transform: ValueTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn collection_transform(mut self) -> Self {
        self.elementwise = false;
        self
    }

    /// Strip the prefix and any trailing array marker, then split at the
    /// last dot into relation path and leaf field.
    pub fn field_reference(&self, param: &str) -> FieldReference {
        let name = param.strip_prefix(self.prefix).unwrap_or(param);
        let name = name.strip_suffix("[]").unwrap_or(name);
        let relation = name
            .rsplit_once('.')
            .map(|(path, leaf)| (path.to_string(), leaf.to_string()));
        FieldReference {
            field: name.to_string(),
            relation,
        }
    }

    /// Run the value transform under the clause's array-walk policy.
    pub fn transform_value(&self, value: &ParamValue) -> ParamValue {
        match value {
            ParamValue::Scalar(s) => ParamValue::Scalar((self.transform)(s)),
            ParamValue::List(items) if self.elementwise => {
                ParamValue::List(items.iter().map(|v| (self.transform)(v)).collect())
            }
            ParamValue::List(items) => ParamValue::List(items.clone()),
        }
    }

    /// Emit this clause's operation(s) onto the plan.
    pub fn apply(&self, plan: &mut QueryPlan, param: &str, value: &ParamValue) -> QueryResult<()> {
        let fref = self.field_reference(param);
        let value = self.transform_value(value);

        match self.action {
            ClauseAction::NullCheck { negated } => {
                emit(plan, &fref, FieldCondition::Null { negated }, Conjunction::And);
            }
            ClauseAction::Predicate { conjunction, op } => {
                // Multiple values compose additively, one predicate each.
                for v in value.values() {
                    emit(
                        plan,
                        &fref,
                        FieldCondition::Compare { op, value: v.to_string() },
                        conjunction,
                    );
                }
            }
            ClauseAction::OrderBy => {
                let direction = value
                    .values()
                    .first()
                    .map(|v| SortDirection::parse(v))
                    .unwrap_or_default();
                match &fref.relation {
                    Some((path, leaf)) => plan.push(PlanOp::OrderByRelated {
                        relation: path.clone(),
                        field: leaf.clone(),
                        direction,
                    }),
                    None => plan.push(PlanOp::OrderBy {
                        field: fref.field.clone(),
                        direction,
                    }),
                }
            }
            ClauseAction::GroupBy => {
                if fref.relation.is_some() {
                    return Err(QueryError::MalformedParameter {
                        name: param.to_string(),
                        reason: "grouping by a related field is not supported".to_string(),
                    });
                }
                plan.push(PlanOp::GroupBy { field: fref.field.clone() });
            }
            ClauseAction::Between => {
                let values = value.values();
                let [low, high] = values.as_slice() else {
                    return Err(QueryError::MalformedParameter {
                        name: param.to_string(),
                        reason: format!("between requires exactly two values, got {}", values.len()),
                    });
                };
                emit(
                    plan,
                    &fref,
                    FieldCondition::Between {
                        low: (*low).to_string(),
                        high: (*high).to_string(),
                    },
                    Conjunction::And,
                );
            }
            ClauseAction::InList { negated } => {
                let values = value.values().iter().map(|v| (*v).to_string()).collect();
                emit(
                    plan,
                    &fref,
                    FieldCondition::InList { values, negated },
                    Conjunction::And,
                );
            }
        }
        Ok(())
    }
}

/// A dotted field routes the condition into a relation-existence filter;
/// a plain field becomes a root predicate.
fn emit(plan: &mut QueryPlan, fref: &FieldReference, cond: FieldCondition, conjunction: Conjunction) {
    match &fref.relation {
        Some((path, leaf)) => plan.push(PlanOp::RelationExists {
            path: path.clone(),
            field: leaf.clone(),
            cond,
        }),
        None => plan.push(PlanOp::Predicate {
            field: fref.field.clone(),
            cond,
            conjunction,
        }),
    }
}

/// The set of registered clauses, immutable after construction.
#[derive(Debug, Clone)]
pub struct ClauseRegistry {
    clauses: Vec<ClauseDescriptor>,
}

impl ClauseRegistry {
    /// The standard clause table.
    ///
    /// `greaterthan`/`lessthan` are exclusive; the inclusive variants are
    /// registered as distinct clauses so callers never have to guess.
    pub fn standard() -> Self {
        use ClauseAction::*;
        use Comparison::*;
        use Conjunction::*;

        let clauses = vec![
            ClauseDescriptor::new("isnull", NullCheck { negated: false }),
            ClauseDescriptor::new("isnotnull", NullCheck { negated: true }),
            ClauseDescriptor::new("where", Predicate { conjunction: And, op: Eq }),
            ClauseDescriptor::new("orwhere", Predicate { conjunction: Or, op: Eq }),
            ClauseDescriptor::new("orderby", OrderBy),
            ClauseDescriptor::new("groupby", GroupBy),
            ClauseDescriptor::new("between", Between),
            ClauseDescriptor::new("inarray", InList { negated: false }),
            ClauseDescriptor::new("notinarray", InList { negated: true }),
            ClauseDescriptor::new("like", Predicate { conjunction: And, op: Like })
                .with_transform(like_wrap),
            ClauseDescriptor::new("orlike", Predicate { conjunction: Or, op: Like })
                .with_transform(like_wrap),
            ClauseDescriptor::new("greaterthan", Predicate { conjunction: And, op: Gt }),
            ClauseDescriptor::new("greaterthanorequal", Predicate { conjunction: And, op: Gte }),
            ClauseDescriptor::new("lessthan", Predicate { conjunction: And, op: Lt }),
            ClauseDescriptor::new("lessthanorequal", Predicate { conjunction: And, op: Lte }),
        ];
        Self { clauses }
    }

    /// An empty registry, for callers building a custom clause table.
    pub fn empty() -> Self {
        Self { clauses: Vec::new() }
    }

    pub fn register(&mut self, clause: ClauseDescriptor) -> &mut Self {
        self.clauses.push(clause);
        self
    }

    /// The clause matching a parameter name, if any.
    ///
    /// Matching is a case-sensitive prefix test with a non-empty
    /// remainder; when prefixes overlap the longest one wins, so a
    /// parameter never fires two clauses. A parameter that IS a
    /// registered clause name carries no field at all, so it matches
    /// nothing rather than falling through to a shorter prefix
    /// (`greaterthanorequal` must not become `greaterthan` on field
    /// `orequal`).
    pub fn matching(&self, param: &str) -> Option<&ClauseDescriptor> {
        if self.clauses.iter().any(|c| c.prefix == param) {
            return None;
        }
        self.clauses
            .iter()
            .filter(|c| param.len() > c.prefix.len() && param.starts_with(c.prefix))
            .max_by_key(|c| c.prefix.len())
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl Default for ClauseRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
