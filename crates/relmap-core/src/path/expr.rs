//! Node and expression types stored in a [`QueryTree`](super::QueryTree).

use std::fmt;

use crate::model::domain::{Attribute, DomainTypeId, ElementType};
use crate::model::entity::CollectionKind;
use crate::model::jdbc::JdbcMapping;
use crate::path::navigable::{self, NavigablePath};

/// Index of a path node, tagged with the tree that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathId {
    pub(crate) tree: u32,
    pub(crate) index: u32,
}

impl PathId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Index of a non-path expression, tagged with the tree that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId {
    pub(crate) tree: u32,
    pub(crate) index: u32,
}

impl ExprId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Synthetic parts of a plural path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    Element,
    Index,
    Key,
    Value,
}

impl PartKind {
    pub fn part_name(&self) -> &'static str {
        match self {
            PartKind::Element => navigable::ELEMENT,
            PartKind::Index => navigable::INDEX,
            PartKind::Key => navigable::KEY,
            PartKind::Value => navigable::VALUE,
        }
    }
}

/// How a path node was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSource {
    Root { entity: DomainTypeId },
    Attribute(Attribute),
    Part(PartKind),
    /// A narrowed view over `treated`.
    Treat { treated: PathId, target: DomainTypeId },
}

impl PathSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathSource::Root { .. } => "root",
            PathSource::Attribute(_) => "attribute",
            PathSource::Part(_) => "part",
            PathSource::Treat { .. } => "treat",
        }
    }
}

/// Static type of a path node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathType {
    Domain(DomainTypeId),
    Basic(JdbcMapping),
    Collection {
        kind: CollectionKind,
        element: ElementType,
    },
    Map {
        key: ElementType,
        value: ElementType,
    },
}

impl PathType {
    pub fn domain_type(&self) -> Option<DomainTypeId> {
        match self {
            PathType::Domain(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_plural(&self) -> bool {
        matches!(self, PathType::Collection { .. } | PathType::Map { .. })
    }

    pub(crate) fn of_element(element: &ElementType) -> Self {
        match element {
            ElementType::Basic(mapping) => PathType::Basic(mapping.clone()),
            ElementType::Domain(id) => PathType::Domain(*id),
        }
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathType::Domain(id) => write!(f, "domain#{}", id.index()),
            PathType::Basic(mapping) => write!(f, "{mapping}"),
            PathType::Collection { kind, .. } => write!(f, "{}", kind.as_str()),
            PathType::Map { .. } => f.write_str("map"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PathNode {
    pub(crate) source: PathSource,
    pub(crate) lhs: Option<PathId>,
    pub(crate) navigable_path: NavigablePath,
    pub(crate) ty: PathType,
}

/// Non-path expressions: plural attribute references and type discriminators.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Collection {
        path: PathId,
        kind: CollectionKind,
        element: ElementType,
    },
    Map {
        path: PathId,
        key: ElementType,
        value: ElementType,
    },
    /// Runtime discriminator of `path`, resolved by the translation layer.
    Type { path: PathId, base: DomainTypeId },
}

impl Expression {
    /// The path this expression is anchored at.
    pub fn path(&self) -> PathId {
        match self {
            Expression::Collection { path, .. }
            | Expression::Map { path, .. }
            | Expression::Type { path, .. } => *path,
        }
    }
}
