//! Engine error types.
//!
//! Every error is raised while the query plan is being built, before
//! anything reaches the executor, so a failed request never leaves
//! partial side effects on the underlying store.

use thiserror::Error;

/// Errors raised during route resolution and plan building.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The URI resolved to a route name that is not in the route map.
    /// Client-facing: the resource does not exist.
    #[error("route '{0}' is not registered in the route map")]
    RouteNotRegistered(String),

    /// A nested route named a parent record that does not exist.
    /// Client-facing: 404-equivalent.
    #[error("parent {entity} with key {key} was not found")]
    ParentRecordNotFound { entity: String, key: i64 },

    /// A parent-level accessor was called on a route with no parent.
    /// This is a programming error, not bad user input.
    #[error("route '{0}' has no parent; parent id was requested anyway")]
    NoParentRequested(String),

    /// A nested route did not carry a key for its parent segment.
    #[error("route '{0}' names a parent but the URI carries no parent key")]
    MissingParentKey(String),

    /// Ordering by a related field through a relation kind the engine
    /// cannot join. Surfaced as feature-not-supported, never ignored.
    #[error("cannot order by relation '{relation}' on entity '{entity}': unsupported relation kind")]
    UnsupportedRelationKind { entity: String, relation: String },

    /// An entity name that the catalog does not know.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// A relation name that the entity does not define.
    #[error("unknown relation '{relation}' on entity '{entity}'")]
    UnknownRelation { entity: String, relation: String },

    /// A `filter<Name>`/`scope<Name>` parameter named a refinement that
    /// was never registered.
    #[error("no refinement named '{0}' is registered")]
    UnknownRefinement(String),

    /// A refinement was registered under a name the registry rejects.
    #[error("invalid refinement name '{0}'")]
    InvalidRefinementName(String),

    /// A route map entry failed validation at load time.
    #[error("invalid route mapping for '{route}': {reason}")]
    InvalidRouteTarget { route: String, reason: String },

    /// A query-string parameter carried a value the matched clause
    /// cannot use (wrong arity, non-numeric page size, and so on).
    #[error("malformed parameter '{name}': {reason}")]
    MalformedParameter { name: String, reason: String },
}

/// Result type alias using QueryError.
pub type QueryResult<T> = Result<T, QueryError>;
