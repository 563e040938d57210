//! The query engine and its per-request plan builder.
//!
//! `QueryEngine` holds everything configured once at startup: the route
//! map, the clause table, the refinement registry, and the engine
//! configuration. `PlanBuilder` is the per-request state machine that
//! walks the build pipeline and hands back a finished `QueryPlan`.
//!
//! The pipeline runs seven stages in a fixed order: parent restriction,
//! resource restriction, eager loads, clause dispatch, named filters,
//! legacy scopes, and translation loading. Every stage validates what it
//! appends, so a plan that builds successfully renders and executes
//! without surprises.

use crate::catalog::{EntityCatalog, EntityDef, RelationKind};
use crate::clause::ClauseRegistry;
use crate::config::EngineConfig;
use crate::error::{QueryError, QueryResult};
use crate::paginate::Paginator;
use crate::params::Params;
use crate::plan::{PlanOp, QueryPlan};
use crate::refinement::{Refinement, RefinementRegistry};
use crate::route::{ParentContext, RouteDescriptor, RouteMap};

/// Parameter names the pipeline consumes outside the clause table.
const WITH_PARAM: &str = "with";
const LOCALE_PARAM: &str = "locale";
const FILTER_PREFIX: &str = "filter";
const SCOPE_PREFIX: &str = "scope";
const TRANSLATIONS_RELATION: &str = "translations";

/// Shared, immutable request-to-plan translator.
pub struct QueryEngine {
    config: EngineConfig,
    routes: RouteMap,
    clauses: ClauseRegistry,
    refinements: RefinementRegistry,
}

impl QueryEngine {
    /// An engine with the standard clause table and no refinements.
    pub fn new(config: EngineConfig, routes: RouteMap) -> Self {
        Self {
            config,
            routes,
            clauses: ClauseRegistry::standard(),
            refinements: RefinementRegistry::new(),
        }
    }

    /// Replace the clause table wholesale.
    pub fn with_clauses(mut self, clauses: ClauseRegistry) -> Self {
        self.clauses = clauses;
        self
    }

    /// Register a named refinement reachable via `filter<Name>` (and the
    /// deprecated `scope<Name>` alias).
    pub fn with_refinement(
        mut self,
        name: impl Into<String>,
        handler: impl Refinement + 'static,
    ) -> QueryResult<Self> {
        self.refinements.register(name, handler)?;
        Ok(self)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteMap {
        &self.routes
    }

    /// Classify a request path under the configured base URI.
    pub fn parse_route(&self, path: &str) -> RouteDescriptor {
        RouteDescriptor::parse(path, &self.config.base_uri)
    }

    /// Resolve a parsed route against the catalog and open a plan builder
    /// for it. Fails when the route is unregistered or its target is
    /// missing from the catalog.
    pub fn request<'a>(
        &'a self,
        catalog: &'a dyn EntityCatalog,
        route: &RouteDescriptor,
        params: Params,
    ) -> QueryResult<PlanBuilder<'a>> {
        let path = self.routes.resolve(&route.route_name)?;

        let (entity_name, parent) = match &path.relation {
            Some(relation) => {
                let parent_def = catalog
                    .entity(&path.entity)
                    .ok_or_else(|| QueryError::UnknownEntity(path.entity.clone()))?;
                let rel = parent_def
                    .relation(relation)
                    .ok_or_else(|| QueryError::UnknownRelation {
                        entity: path.entity.clone(),
                        relation: relation.clone(),
                    })?;
                let context = ParentContext {
                    parent_entity: path.entity.clone(),
                    parent_key: route.parent_id()?,
                    relation: relation.clone(),
                };
                (rel.target.clone(), Some(context))
            }
            None => (path.entity.clone(), None),
        };

        let def = catalog
            .entity(&entity_name)
            .ok_or_else(|| QueryError::UnknownEntity(entity_name.clone()))?;

        tracing::debug!(
            route = %route.route_name,
            entity = %entity_name,
            resource_id = ?route.resource_id,
            "resolved request route"
        );

        Ok(PlanBuilder {
            engine: self,
            catalog,
            params,
            plan: QueryPlan::for_entity(def),
            parent,
            resource_id: route.resource_id,
        })
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("config", &self.config)
            .field("routes", &self.routes.len())
            .field("clauses", &self.clauses.len())
            .field("refinements", &self.refinements)
            .finish()
    }
}

/// Per-request plan accumulator.
///
/// Stages are individually callable for callers that want a partial
/// pipeline; `build` runs all of them in the canonical order.
pub struct PlanBuilder<'a> {
    engine: &'a QueryEngine,
    catalog: &'a dyn EntityCatalog,
    params: Params,
    plan: QueryPlan,
    parent: Option<ParentContext>,
    resource_id: Option<i64>,
}

impl PlanBuilder<'_> {
    /// Run the full pipeline.
    pub fn build(self) -> QueryResult<Self> {
        Ok(self
            .filter_by_parent()?
            .restrict_to_resource()
            .include_relations()
            .apply_wheres()?
            .apply_filters()?
            .apply_scopes()?
            .include_translations())
    }

    /// Stage 1: restrict the working set to the children of the parent
    /// record named in the URI. The parent must exist; a filtered-out or
    /// absent parent yields an error rather than a silently empty result.
    pub fn filter_by_parent(mut self) -> QueryResult<Self> {
        if let Some(parent) = &self.parent {
            let def = self
                .catalog
                .entity(&parent.parent_entity)
                .ok_or_else(|| QueryError::UnknownEntity(parent.parent_entity.clone()))?;
            if !self.catalog.record_exists(def, parent.parent_key) {
                return Err(QueryError::ParentRecordNotFound {
                    entity: parent.parent_entity.clone(),
                    key: parent.parent_key,
                });
            }
            self.plan.push(PlanOp::ParentRestrict {
                parent_entity: parent.parent_entity.clone(),
                relation: parent.relation.clone(),
                key: parent.parent_key,
            });
        }
        Ok(self)
    }

    /// Stage 2: pin the plan to one record when the URI ends in an id.
    pub fn restrict_to_resource(mut self) -> Self {
        if let Some(key) = self.resource_id {
            self.plan.push(PlanOp::KeyEquals {
                field: self.plan.primary_key.clone(),
                key,
            });
        }
        self
    }

    /// Stage 3: record `with[]` eager-load requests, in request order.
    pub fn include_relations(mut self) -> Self {
        let relations: Vec<String> = self
            .params
            .all(WITH_PARAM)
            .into_iter()
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        for relation in relations {
            self.plan.push(PlanOp::EagerLoad { relation });
        }
        self
    }

    /// Stage 4: dispatch clause-prefixed parameters in request order.
    /// Parameters matching no clause pass through untouched; matched
    /// parameters must validate against the catalog.
    pub fn apply_wheres(mut self) -> QueryResult<Self> {
        let catalog = self.catalog;
        let root = catalog
            .entity(&self.plan.entity)
            .ok_or_else(|| QueryError::UnknownEntity(self.plan.entity.clone()))?;

        let params = self.params.clone();
        for (name, value) in params.iter() {
            let Some(clause) = self.engine.clauses.matching(name) else {
                continue;
            };
            tracing::debug!(param = name, prefix = clause.prefix, "dispatching clause");
            let appended_from = self.plan.ops().len();
            clause.apply(&mut self.plan, name, value)?;
            for op in &self.plan.ops()[appended_from..] {
                validate_op(catalog, root, op)?;
            }
        }
        Ok(self)
    }

    /// Stage 5: invoke named refinements for `filter<Name>` parameters.
    pub fn apply_filters(self) -> QueryResult<Self> {
        self.apply_refinements(FILTER_PREFIX, false)
    }

    /// Stage 6: the deprecated `scope<Name>` alias for stage 5.
    pub fn apply_scopes(self) -> QueryResult<Self> {
        self.apply_refinements(SCOPE_PREFIX, true)
    }

    fn apply_refinements(mut self, prefix: &str, deprecated: bool) -> QueryResult<Self> {
        let params = self.params.clone();
        for (name, value) in params.iter() {
            let Some(rest) = name.strip_prefix(prefix) else {
                continue;
            };
            let rest = rest.strip_suffix("[]").unwrap_or(rest);
            if rest.is_empty() {
                continue;
            }
            let refinement = lcfirst(rest);
            if deprecated {
                tracing::warn!(
                    param = name,
                    refinement = %refinement,
                    "the 'scope' parameter prefix is deprecated; use 'filter'"
                );
            }
            let handler = self.engine.refinements.get(&refinement)?;
            let arg = (!value.is_empty()).then_some(value);
            handler.apply(&mut self.plan, arg)?;
        }
        Ok(self)
    }

    /// Stage 7: a `locale` parameter eager-loads the translations
    /// relation. Locale selection itself belongs to the executor.
    pub fn include_translations(mut self) -> Self {
        if self.params.scalar(LOCALE_PARAM).is_some_and(|l| !l.is_empty()) {
            self.plan.push(PlanOp::EagerLoad {
                relation: TRANSLATIONS_RELATION.to_string(),
            });
        }
        self
    }

    /// Append the pagination directive resolved from the request
    /// parameters and the engine configuration. An explicit limit from
    /// the caller wins over the query string.
    pub fn paginate(mut self, explicit_limit: Option<u64>) -> QueryResult<Self> {
        let request =
            Paginator::new(&self.engine.config).page_request(&self.params, explicit_limit)?;
        self.plan.push(PlanOp::Paginate(request));
        Ok(self)
    }

    /// The plan built so far.
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Count projection of the plan built so far; the row plan stays
    /// available and unchanged.
    pub fn count_plan(&self) -> QueryPlan {
        self.plan.to_count()
    }

    /// Finish and hand the plan to the executor.
    pub fn into_plan(self) -> QueryPlan {
        self.plan
    }
}

impl std::fmt::Debug for PlanBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanBuilder")
            .field("plan", &self.plan)
            .field("parent", &self.parent)
            .field("resource_id", &self.resource_id)
            .finish()
    }
}

/// Lowercase the first character, so `filterWithStatus` dispatches to the
/// refinement registered as `withStatus`.
fn lcfirst(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Build-time validation of one appended operation, so every relation
/// named in a request fails before anything executes.
fn validate_op(catalog: &dyn EntityCatalog, root: &EntityDef, op: &PlanOp) -> QueryResult<()> {
    match op {
        PlanOp::RelationExists { path, .. } => validate_path(catalog, root, path),
        PlanOp::OrderByRelated { relation, .. } => {
            let rel = root
                .relation(relation)
                .ok_or_else(|| QueryError::UnknownRelation {
                    entity: root.name.clone(),
                    relation: relation.clone(),
                })?;
            catalog
                .entity(&rel.target)
                .ok_or_else(|| QueryError::UnknownEntity(rel.target.clone()))?;
            if matches!(rel.kind, RelationKind::ThroughPivot { .. }) {
                return Err(QueryError::UnsupportedRelationKind {
                    entity: root.name.clone(),
                    relation: relation.clone(),
                });
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn validate_path(catalog: &dyn EntityCatalog, root: &EntityDef, path: &str) -> QueryResult<()> {
    let mut current = root;
    for hop in path.split('.') {
        let rel = current
            .relation(hop)
            .ok_or_else(|| QueryError::UnknownRelation {
                entity: current.name.clone(),
                relation: hop.to_string(),
            })?;
        current = catalog
            .entity(&rel.target)
            .ok_or_else(|| QueryError::UnknownEntity(rel.target.clone()))?;
    }
    Ok(())
}
