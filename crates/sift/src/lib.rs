//! Sift Query Engine
//!
//! Sift turns REST resource URIs and their query strings into structured,
//! validated query plans. A URI like `/api/v1/letters/23/photos` plus a
//! query string like `likeCaption=sunset&with[]=original&limit=25` becomes
//! a `QueryPlan` an executor can run, inspect, or render to SQL.
//!
//! The engine performs no I/O of its own: the entity catalog and the
//! executor are external collaborators.

pub mod builder;
pub mod catalog;
pub mod clause;
pub mod config;
pub mod error;
pub mod paginate;
pub mod params;
pub mod plan;
pub mod refinement;
mod render;
pub mod route;

pub use builder::{PlanBuilder, QueryEngine};
pub use catalog::{EntityCatalog, EntityDef, MemoryCatalog, Relation, RelationKind};
pub use clause::{ClauseAction, ClauseDescriptor, ClauseRegistry};
pub use config::{EngineConfig, PaginationConfig};
pub use error::{QueryError, QueryResult};
pub use paginate::{PageStyle, Paginator};
pub use params::{ParamValue, Params};
pub use plan::{PageRequest, PlanOp, QueryPlan};
pub use refinement::{Refinement, RefinementRegistry};
pub use route::{RouteDescriptor, RouteMap};
