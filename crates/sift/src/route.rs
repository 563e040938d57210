//! Route resolution.
//!
//! A URI path such as `/api/v1/letters/23/photos` is classified once per
//! request: non-numeric segments form the route name (`letters.photos`),
//! numeric segments form the key sequence (`[23]`), and the trailing
//! segment, when numeric, is the id of a single resource.

use std::collections::HashMap;

use crate::error::{QueryError, QueryResult};

/// Immutable result of parsing one URI path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    /// Non-numeric path segments joined by `.`, in original order.
    pub route_name: String,
    /// Numeric path segments in original order.
    pub key_sequence: Vec<i64>,
    /// The trailing segment iff it was numeric: `/letters/23` targets one
    /// record, `/letters` targets the collection.
    pub resource_id: Option<i64>,
}

impl RouteDescriptor {
    /// Parse a URI path, stripping the configured base prefix (for
    /// example `/api/v1/`) from the start first.
    pub fn parse(path: &str, base_uri: &str) -> Self {
        let base: Vec<&str> = segments(base_uri);
        let mut segs: Vec<&str> = segments(path);
        if segs.len() >= base.len() && segs[..base.len()] == base[..] {
            segs.drain(..base.len());
        }

        let mut names = Vec::new();
        let mut keys = Vec::new();
        for seg in &segs {
            match seg.parse::<i64>() {
                Ok(key) => keys.push(key),
                Err(_) => names.push(*seg),
            }
        }
        let resource_id = segs.last().and_then(|seg| seg.parse::<i64>().ok());

        Self {
            route_name: names.join("."),
            key_sequence: keys,
            resource_id,
        }
    }

    fn segment_count(&self) -> usize {
        if self.route_name.is_empty() {
            0
        } else {
            self.route_name.split('.').count()
        }
    }

    /// True iff the route targets a nested resource.
    pub fn has_parent(&self) -> bool {
        self.segment_count() > 1
    }

    /// Route name of the parent resource, absent for top-level routes.
    pub fn parent_route_name(&self) -> Option<String> {
        let (parent, _) = self.route_name.rsplit_once('.')?;
        Some(parent.to_string())
    }

    /// Last segment of the parent route name.
    pub fn parent_basename(&self) -> Option<&str> {
        let (parent, _) = self.route_name.rsplit_once('.')?;
        Some(parent.rsplit('.').next().unwrap_or(parent))
    }

    /// Primary key value of the parent record, taken from the key
    /// sequence at the position matching the parent segment.
    pub fn parent_id(&self) -> QueryResult<i64> {
        if !self.has_parent() {
            return Err(QueryError::NoParentRequested(self.route_name.clone()));
        }
        self.key_sequence
            .get(self.segment_count() - 2)
            .copied()
            .ok_or_else(|| QueryError::MissingParentKey(self.route_name.clone()))
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Logical target of a route: a root entity and at most one relation hop.
/// Deeper nesting is expressed by chaining routes, never by multi-hop
/// relation strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRelationPath {
    /// Root entity. For nested routes this is the parent entity that owns
    /// the relation.
    pub entity: String,
    /// Relation on the root entity, present only for nested routes.
    pub relation: Option<String>,
}

/// Parent restriction context for one nested request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentContext {
    pub parent_entity: String,
    pub parent_key: i64,
    pub relation: String,
}

/// Immutable route-name to entity-path map, constructed once at startup
/// and shared read-only across requests.
#[derive(Debug, Clone, Default)]
pub struct RouteMap {
    routes: HashMap<String, EntityRelationPath>,
}

impl RouteMap {
    /// Build and validate a route map from `route -> "Entity[.relation]"`
    /// pairs. Validation happens here so a bad mapping fails at startup
    /// rather than on the first request that hits it.
    pub fn new<I, R, T>(pairs: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = (R, T)>,
        R: Into<String>,
        T: AsRef<str>,
    {
        let mut routes = HashMap::new();
        for (route, target) in pairs {
            let route = route.into();
            let path = Self::parse_target(&route, target.as_ref())?;
            let nested = route.contains('.');
            if nested && path.relation.is_none() {
                return Err(QueryError::InvalidRouteTarget {
                    route,
                    reason: "nested route requires an 'Entity.relation' target".to_string(),
                });
            }
            if !nested && path.relation.is_some() {
                return Err(QueryError::InvalidRouteTarget {
                    route,
                    reason: "top-level route cannot target a relation".to_string(),
                });
            }
            routes.insert(route, path);
        }
        Ok(Self { routes })
    }

    fn parse_target(route: &str, target: &str) -> QueryResult<EntityRelationPath> {
        let mut parts = target.split('.');
        let entity = parts.next().unwrap_or_default();
        let relation = parts.next();
        if entity.is_empty() {
            return Err(QueryError::InvalidRouteTarget {
                route: route.to_string(),
                reason: "empty entity name".to_string(),
            });
        }
        if parts.next().is_some() {
            return Err(QueryError::InvalidRouteTarget {
                route: route.to_string(),
                reason: format!("'{target}' has more than one relation hop"),
            });
        }
        Ok(EntityRelationPath {
            entity: entity.to_string(),
            relation: relation.map(str::to_string),
        })
    }

    /// Resolve a route name. Unknown route names are fatal to the request.
    pub fn resolve(&self, route_name: &str) -> QueryResult<&EntityRelationPath> {
        self.routes
            .get(route_name)
            .ok_or_else(|| QueryError::RouteNotRegistered(route_name.to_string()))
    }

    pub fn contains(&self, route_name: &str) -> bool {
        self.routes.contains_key(route_name)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
