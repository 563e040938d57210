//! Entity catalog interface.
//!
//! The catalog is an external collaborator: it knows every logical entity,
//! its table, its primary key, and its relation graph, and it owns any
//! I/O needed to answer existence checks. The engine only reads from it.

use std::collections::{HashMap, HashSet};

/// Shape of a relation, carrying exactly the join keys each kind needs.
///
/// Pattern-matched exhaustively wherever relations are joined or
/// restricted, so an unhandled kind is a compile error rather than a
/// runtime fallthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// The owning entity holds `foreign_key` pointing at the related
    /// entity's `owner_key`.
    ToOne { foreign_key: String, owner_key: String },
    /// The related entity holds `foreign_key` pointing back at the owning
    /// entity's `local_key`.
    ToMany { foreign_key: String, local_key: String },
    /// Membership through a pivot table.
    ThroughPivot {
        pivot_table: String,
        local_pivot_key: String,
        related_pivot_key: String,
        local_key: String,
        related_key: String,
    },
}

/// A named relation from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    /// Logical name of the target entity.
    pub target: String,
    pub kind: RelationKind,
}

impl Relation {
    pub fn to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        owner_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::ToOne {
                foreign_key: foreign_key.into(),
                owner_key: owner_key.into(),
            },
        }
    }

    pub fn to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::ToMany {
                foreign_key: foreign_key.into(),
                local_key: local_key.into(),
            },
        }
    }
}

/// Schema handle for one logical entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDef {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    relations: HashMap<String, Relation>,
}

impl EntityDef {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: primary_key.into(),
            relations: HashMap::new(),
        }
    }

    /// Builder-style relation registration.
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    /// Relation lookup by name.
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }
}

/// Read-only entity catalog consumed by the engine.
///
/// Implementations must be safe for concurrent reads; `record_exists` may
/// perform I/O but the engine treats it as a plain predicate.
pub trait EntityCatalog: Send + Sync {
    /// Look up an entity by logical name.
    fn entity(&self, name: &str) -> Option<&EntityDef>;

    /// Whether a record with the given primary key exists.
    fn record_exists(&self, entity: &EntityDef, key: i64) -> bool;
}

/// In-memory catalog backed by plain maps. Useful for tests and for
/// callers whose schema is static.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    entities: HashMap<String, EntityDef>,
    records: HashSet<(String, i64)>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: EntityDef) -> &mut Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Mark a record as existing so `record_exists` can answer.
    pub fn add_record(&mut self, entity: impl Into<String>, key: i64) -> &mut Self {
        self.records.insert((entity.into(), key));
        self
    }
}

impl EntityCatalog for MemoryCatalog {
    fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    fn record_exists(&self, entity: &EntityDef, key: i64) -> bool {
        self.records.contains(&(entity.name.clone(), key))
    }
}
