//! Named query refinements.
//!
//! A refinement is a reusable, entity-specific query modification invoked
//! by name (`filterWithStatus=3`) rather than by field and operator. The
//! registry is a closed table built at startup: a request naming an
//! unregistered refinement fails fast instead of dispatching on an
//! arbitrary string.

use std::collections::HashMap;

use crate::error::{QueryError, QueryResult};
use crate::params::ParamValue;
use crate::plan::QueryPlan;

/// A named refinement handler. Handlers grow the plan directly and take
/// zero or one argument from the query string.
pub trait Refinement: Send + Sync {
    fn apply(&self, plan: &mut QueryPlan, arg: Option<&ParamValue>) -> QueryResult<()>;
}

impl<F> Refinement for F
where
    F: Fn(&mut QueryPlan, Option<&ParamValue>) -> QueryResult<()> + Send + Sync,
{
    fn apply(&self, plan: &mut QueryPlan, arg: Option<&ParamValue>) -> QueryResult<()> {
        self(plan, arg)
    }
}

/// Refinement name validation: non-empty, ascii alphanumeric or
/// underscore, starting with a letter, at most 64 characters.
fn is_valid_refinement_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Registry of named refinements, immutable once the engine is built.
#[derive(Default)]
pub struct RefinementRegistry {
    handlers: HashMap<String, Box<dyn Refinement>>,
}

impl RefinementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a canonical (lower-camel) name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl Refinement + 'static,
    ) -> QueryResult<&mut Self> {
        let name = name.into();
        if !is_valid_refinement_name(&name) {
            return Err(QueryError::InvalidRefinementName(name));
        }
        self.handlers.insert(name, Box::new(handler));
        Ok(self)
    }

    /// Look up a refinement; unknown names are fatal to the request.
    pub fn get(&self, name: &str) -> QueryResult<&dyn Refinement> {
        self.handlers
            .get(name)
            .map(Box::as_ref)
            .ok_or_else(|| QueryError::UnknownRefinement(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for RefinementRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("RefinementRegistry")
            .field("names", &names)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::EntityDef;
    use crate::plan::{Comparison, Conjunction, FieldCondition, PlanOp};

    fn with_status(plan: &mut QueryPlan, arg: Option<&ParamValue>) -> QueryResult<()> {
        let status = arg.and_then(ParamValue::as_scalar).unwrap_or("1");
        plan.push(PlanOp::Predicate {
            field: "StatusId".to_string(),
            cond: FieldCondition::Compare {
                op: Comparison::Eq,
                value: status.to_string(),
            },
            conjunction: Conjunction::And,
        });
        Ok(())
    }

    #[test]
    fn registered_refinements_grow_the_plan() {
        let mut registry = RefinementRegistry::new();
        registry
            .register("withStatus", with_status)
            .expect("valid name");

        let mut plan = QueryPlan::for_entity(&EntityDef::new("Letter", "Letter", "LetterId"));
        let arg = ParamValue::Scalar("3".to_string());
        registry
            .get("withStatus")
            .expect("registered")
            .apply(&mut plan, Some(&arg))
            .expect("applies");

        assert_eq!(plan.ops().len(), 1);
    }

    #[test]
    fn unknown_refinements_fail_fast() {
        let registry = RefinementRegistry::new();
        assert!(matches!(
            registry.get("withStatus").err(),
            Some(QueryError::UnknownRefinement(_))
        ));
    }

    #[test]
    fn names_are_validated_on_registration() {
        let mut registry = RefinementRegistry::new();
        assert!(matches!(
            registry.register("", with_status),
            Err(QueryError::InvalidRefinementName(_))
        ));
        assert!(matches!(
            registry.register("1badName", with_status),
            Err(QueryError::InvalidRefinementName(_))
        ));
        assert!(matches!(
            registry.register("with status", with_status),
            Err(QueryError::InvalidRefinementName(_))
        ));
        assert!(registry.register("with_status", with_status).is_ok());
    }
}
