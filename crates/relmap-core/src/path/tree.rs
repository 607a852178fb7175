//! Arena-backed query expression tree.
//!
//! Every node stores its `lhs` as a [`PathId`]; nodes are appended and never
//! rewritten, so repeated navigation yields distinct nodes that compare
//! equal through their [`NavigablePath`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{RelmapError, Result};
use crate::model::domain::{Attribute, AttributeNature, DomainModel, DomainTypeId};
use crate::model::entity::{CollectionKind, Entity, TypeKind};
use crate::model::ident::is_ident_segment;
use crate::model::jdbc::{JdbcMapping, JdbcType};
use crate::obs::CoreMetrics;
use crate::path::expr::{ExprId, Expression, PartKind, PathId, PathNode, PathSource, PathType};
use crate::path::navigable::NavigablePath;

static NEXT_TREE: AtomicU32 = AtomicU32::new(0);

/// One query's expression tree.
///
/// Ids are only meaningful for the tree that issued them (or a clone of it).
/// Fallible operations reject a foreign id with an error; the plain accessors
/// panic on one.
#[derive(Debug, Clone)]
pub struct QueryTree {
    id: u32,
    domain: Arc<DomainModel>,
    paths: Vec<PathNode>,
    expressions: Vec<Expression>,
}

impl QueryTree {
    pub fn new(domain: Arc<DomainModel>) -> Self {
        Self {
            id: NEXT_TREE.fetch_add(1, Ordering::Relaxed),
            domain,
            paths: Vec::new(),
            expressions: Vec::new(),
        }
    }

    pub fn domain(&self) -> &DomainModel {
        &self.domain
    }

    /// Number of path nodes.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Whether `path` was issued by this tree.
    pub fn contains(&self, path: PathId) -> bool {
        path.tree == self.id && path.index() < self.paths.len()
    }

    pub(crate) fn check_path(&self, path: PathId) -> Result<()> {
        if self.contains(path) {
            Ok(())
        } else {
            Err(RelmapError::ForeignNode(format!("path #{}", path.index())))
        }
    }

    fn node(&self, id: PathId) -> &PathNode {
        assert!(self.contains(id), "path id issued by another query tree");
        &self.paths[id.index()]
    }

    fn push_path(&mut self, node: PathNode) -> PathId {
        let id = PathId {
            tree: self.id,
            index: self.paths.len() as u32,
        };
        trace!(path = %node.navigable_path, source = node.source.as_str(), "path created");
        CoreMetrics::path_created(node.source.as_str());
        self.paths.push(node);
        id
    }

    fn push_expression(&mut self, expression: Expression) -> ExprId {
        let id = ExprId {
            tree: self.id,
            index: self.expressions.len() as u32,
        };
        self.expressions.push(expression);
        id
    }

    /// Root reference to an entity, by domain or host type name.
    pub fn root(&mut self, entity_name: &str, alias: Option<&str>) -> Result<PathId> {
        let entity = self.domain.type_by_name(entity_name)?;
        self.root_of(entity, alias)
    }

    pub fn root_of(&mut self, entity: DomainTypeId, alias: Option<&str>) -> Result<PathId> {
        let ty = self.domain.domain_type(entity)?;
        if ty.kind() != TypeKind::Entity {
            return Err(RelmapError::NotNavigable {
                path: ty.name().to_string(),
                reason: "only entities can be query roots".into(),
            });
        }
        let navigable_path = match alias {
            Some(alias) if !is_ident_segment(alias) => {
                return Err(RelmapError::InvalidPath {
                    input: format!("{}({alias})", ty.name()),
                    reason: "alias is not a plain identifier".into(),
                });
            }
            Some(alias) => NavigablePath::root_aliased(ty.name(), alias),
            None => NavigablePath::root(ty.name()),
        };
        Ok(self.push_path(PathNode {
            source: PathSource::Root { entity },
            lhs: None,
            navigable_path,
            ty: PathType::Domain(entity),
        }))
    }

    pub fn navigable_path(&self, path: PathId) -> &NavigablePath {
        &self.node(path).navigable_path
    }

    pub fn lhs(&self, path: PathId) -> Option<PathId> {
        self.node(path).lhs
    }

    /// Always the node's `lhs`; `None` only at a query root.
    pub fn parent_path(&self, path: PathId) -> Option<PathId> {
        self.lhs(path)
    }

    pub fn path_type(&self, path: PathId) -> &PathType {
        &self.node(path).ty
    }

    /// Domain type of the node, if it is entity or embeddable valued.
    pub fn static_type(&self, path: PathId) -> Option<DomainTypeId> {
        self.node(path).ty.domain_type()
    }

    pub fn source(&self, path: PathId) -> &PathSource {
        &self.node(path).source
    }

    /// The `lhs` chain, nearest first.
    pub fn ancestors(&self, path: PathId) -> impl Iterator<Item = PathId> + '_ {
        let mut next = self.lhs(path);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.lhs(current);
            Some(current)
        })
    }

    pub fn query_root(&self, path: PathId) -> PathId {
        self.ancestors(path).last().unwrap_or(path)
    }

    pub fn expression(&self, expr: ExprId) -> &Expression {
        assert_eq!(expr.tree, self.id, "expression id issued by another query tree");
        &self.expressions[expr.index()]
    }

    /// Types consulted for attribute lookup: narrowed types first, then the
    /// treated node's own type.
    fn lookup_types(&self, path: PathId) -> Result<Vec<DomainTypeId>> {
        let mut types = Vec::new();
        let mut current = path;
        loop {
            let node = self.node(current);
            let ty = node.ty.domain_type().ok_or_else(|| self.not_navigable(current))?;
            if !types.contains(&ty) {
                types.push(ty);
            }
            match node.source {
                PathSource::Treat { treated, .. } => current = treated,
                _ => return Ok(types),
            }
        }
    }

    fn not_navigable(&self, path: PathId) -> RelmapError {
        let node = self.node(path);
        let reason = match &node.ty {
            PathType::Basic(mapping) => format!("basic value of type {}", mapping.jdbc_type()),
            PathType::Collection { kind, .. } => format!("plural {} attribute", kind.as_str()),
            PathType::Map { .. } => "plural map attribute".to_string(),
            PathType::Domain(_) => "domain path".to_string(),
        };
        RelmapError::NotNavigable {
            path: node.navigable_path.to_string(),
            reason,
        }
    }

    fn resolve_attribute(&self, path: PathId, name: &str) -> Result<Attribute> {
        self.check_path(path)?;
        let types = self.lookup_types(path)?;
        types
            .iter()
            .find_map(|ty| self.domain.find_attribute(*ty, name))
            .cloned()
            .ok_or_else(|| RelmapError::UnknownAttribute {
                type_name: self.domain.type_name(types[0]).to_string(),
                attribute: name.to_string(),
            })
    }

    fn attribute_node(&mut self, path: PathId, attribute: Attribute) -> PathId {
        let ty = match attribute.nature() {
            AttributeNature::Basic(mapping) => PathType::Basic(mapping.clone()),
            AttributeNature::Embedded(target) | AttributeNature::ToOne(target) => {
                PathType::Domain(*target)
            }
            AttributeNature::Plural { collection, element } => PathType::Collection {
                kind: *collection,
                element: element.clone(),
            },
            AttributeNature::Map { key, value } => PathType::Map {
                key: key.clone(),
                value: value.clone(),
            },
        };
        let navigable_path = self.navigable_path(path).append(attribute.name());
        self.push_path(PathNode {
            source: PathSource::Attribute(attribute),
            lhs: Some(path),
            navigable_path,
            ty,
        })
    }

    /// Navigate to an attribute by name. Plural attributes yield a
    /// plural-valued path.
    pub fn get(&mut self, path: PathId, name: &str) -> Result<PathId> {
        let attribute = self.resolve_attribute(path, name)?;
        Ok(self.attribute_node(path, attribute))
    }

    /// Attribute must belong to the node's (possibly narrowed) type.
    fn check_member(&self, path: PathId, attribute: &Attribute) -> Result<()> {
        let resolved = self.resolve_attribute(path, attribute.name())?;
        if resolved != *attribute {
            return Err(RelmapError::UnknownAttribute {
                type_name: self.domain.type_name(attribute.declaring_type()).to_string(),
                attribute: attribute.name().to_string(),
            });
        }
        Ok(())
    }

    pub fn get_singular(&mut self, path: PathId, attribute: &Attribute) -> Result<PathId> {
        self.check_member(path, attribute)?;
        if attribute.is_plural() {
            return Err(RelmapError::NotNavigable {
                path: self.navigable_path(path).append(attribute.name()).to_string(),
                reason: "plural attribute used as a singular reference".into(),
            });
        }
        Ok(self.attribute_node(path, attribute.clone()))
    }

    /// Collection-valued reference to a bag, list or set attribute.
    pub fn get_plural(&mut self, path: PathId, attribute: &Attribute) -> Result<ExprId> {
        self.check_member(path, attribute)?;
        let (kind, element) = match attribute.nature() {
            AttributeNature::Plural { collection, element } => (*collection, element.clone()),
            _ => {
                return Err(RelmapError::NotNavigable {
                    path: self.navigable_path(path).append(attribute.name()).to_string(),
                    reason: "not a collection attribute".into(),
                })
            }
        };
        let plural = self.attribute_node(path, attribute.clone());
        Ok(self.push_expression(Expression::Collection {
            path: plural,
            kind,
            element,
        }))
    }

    pub fn get_map(&mut self, path: PathId, attribute: &Attribute) -> Result<ExprId> {
        self.check_member(path, attribute)?;
        let (key, value) = match attribute.nature() {
            AttributeNature::Map { key, value } => (key.clone(), value.clone()),
            _ => {
                return Err(RelmapError::NotNavigable {
                    path: self.navigable_path(path).append(attribute.name()).to_string(),
                    reason: "not a map attribute".into(),
                })
            }
        };
        let plural = self.attribute_node(path, attribute.clone());
        Ok(self.push_expression(Expression::Map {
            path: plural,
            key,
            value,
        }))
    }

    fn part_node(&mut self, path: PathId, part: PartKind, ty: PathType) -> PathId {
        let navigable_path = self.navigable_path(path).append(part.part_name());
        self.push_path(PathNode {
            source: PathSource::Part(part),
            lhs: Some(path),
            navigable_path,
            ty,
        })
    }

    fn wrong_part(&self, path: PathId, part: PartKind) -> RelmapError {
        RelmapError::NotNavigable {
            path: self.navigable_path(path).to_string(),
            reason: format!("{} is not available here", part.part_name()),
        }
    }

    /// Element of a bag, list or set path.
    pub fn element(&mut self, path: PathId) -> Result<PathId> {
        self.check_path(path)?;
        let ty = match self.path_type(path) {
            PathType::Collection { element, .. } => PathType::of_element(element),
            _ => return Err(self.wrong_part(path, PartKind::Element)),
        };
        Ok(self.part_node(path, PartKind::Element, ty))
    }

    /// Position of a list element.
    pub fn index(&mut self, path: PathId) -> Result<PathId> {
        self.check_path(path)?;
        match self.path_type(path) {
            PathType::Collection {
                kind: CollectionKind::List,
                ..
            } => {}
            _ => return Err(self.wrong_part(path, PartKind::Index)),
        }
        let ty = PathType::Basic(JdbcMapping::new(JdbcType::Integer));
        Ok(self.part_node(path, PartKind::Index, ty))
    }

    pub fn key(&mut self, path: PathId) -> Result<PathId> {
        self.check_path(path)?;
        let ty = match self.path_type(path) {
            PathType::Map { key, .. } => PathType::of_element(key),
            _ => return Err(self.wrong_part(path, PartKind::Key)),
        };
        Ok(self.part_node(path, PartKind::Key, ty))
    }

    pub fn value(&mut self, path: PathId) -> Result<PathId> {
        self.check_path(path)?;
        let ty = match self.path_type(path) {
            PathType::Map { value, .. } => PathType::of_element(value),
            _ => return Err(self.wrong_part(path, PartKind::Value)),
        };
        Ok(self.part_node(path, PartKind::Value, ty))
    }

    /// Narrow (or widen) a domain-valued path within its hierarchy.
    ///
    /// The result shares the original's navigable path and `lhs`; the
    /// original node stays usable.
    pub fn treat_as(&mut self, path: PathId, target: DomainTypeId) -> Result<PathId> {
        self.check_path(path)?;
        let current = self
            .static_type(path)
            .ok_or_else(|| self.not_navigable(path))?;
        self.domain.domain_type(target)?;
        if !self.domain.are_related(current, target) {
            return Err(RelmapError::InvalidTreat {
                from: self.domain.type_name(current).to_string(),
                to: self.domain.type_name(target).to_string(),
            });
        }

        let node = self.node(path);
        let treated = PathNode {
            source: PathSource::Treat {
                treated: path,
                target,
            },
            lhs: node.lhs,
            navigable_path: node.navigable_path.clone(),
            ty: PathType::Domain(target),
        };
        debug!(
            path = %treated.navigable_path,
            from = self.domain.type_name(current),
            to = self.domain.type_name(target),
            "treat applied"
        );
        Ok(self.push_path(treated))
    }

    /// Treat by domain or host type name.
    pub fn treat_as_named(&mut self, path: PathId, type_name: &str) -> Result<PathId> {
        let target = self.domain.type_by_name(type_name)?;
        self.treat_as(path, target)
    }

    pub fn treat_as_entity<E: Entity>(&mut self, path: PathId) -> Result<PathId> {
        self.treat_as_named(path, E::MODEL.entity_name)
    }

    /// Runtime discriminator of a domain-valued path.
    pub fn type_of(&mut self, path: PathId) -> Result<ExprId> {
        self.check_path(path)?;
        let base = self
            .static_type(path)
            .ok_or_else(|| self.not_navigable(path))?;
        Ok(self.push_expression(Expression::Type { path, base }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::domain::tests::shop_model;

    fn tree() -> QueryTree {
        QueryTree::new(Arc::new(shop_model()))
    }

    #[test]
    fn test_treat_scenario() {
        let mut tree = tree();
        let order = tree.root("Order", Some("o")).unwrap();
        let customer = tree.get(order, "customer").unwrap();

        assert_eq!(tree.navigable_path(customer).local_name(), "customer");
        assert_eq!(tree.parent_path(customer), Some(order));

        let premium = tree.treat_as_named(customer, "PremiumCustomer").unwrap();
        assert_eq!(tree.navigable_path(premium), tree.navigable_path(customer));
        assert_eq!(tree.parent_path(premium), tree.parent_path(customer));
        assert_eq!(
            tree.static_type(premium),
            Some(tree.domain().type_by_name("PremiumCustomer").unwrap())
        );

        let tier = tree.get(premium, "loyaltyTier").unwrap();
        assert_eq!(tree.navigable_path(tier).to_string(), "Order(o).customer.loyaltyTier");

        let err = tree.get(customer, "loyaltyTier").unwrap_err();
        assert!(matches!(err, RelmapError::UnknownAttribute { .. }));
        assert_eq!(err.kind(), ErrorKind::PathResolution);

        // original node remains usable
        assert!(tree.get(customer, "name").is_ok());
    }

    #[test]
    fn test_treat_unrelated_type_fails() {
        let mut tree = tree();
        let order = tree.root("Order", None).unwrap();
        let customer = tree.get(order, "customer").unwrap();

        let err = tree.treat_as_named(customer, "LineItem").unwrap_err();
        assert!(matches!(err, RelmapError::InvalidTreat { .. }));
        assert_eq!(err.kind(), ErrorKind::PathResolution);
        assert!(tree.treat_as_named(customer, "Customer").is_ok());
    }

    #[test]
    fn test_widened_treat_keeps_original_attributes() {
        let mut tree = tree();
        let order = tree.root("Order", None).unwrap();
        let customer = tree.get(order, "customer").unwrap();
        let premium = tree.treat_as_named(customer, "PremiumCustomerEntity").unwrap();
        let widened = tree.treat_as_named(premium, "Customer").unwrap();

        assert!(tree.get(widened, "name").is_ok());
        assert!(tree.get(widened, "loyaltyTier").is_ok());
        assert_eq!(tree.query_root(widened), order);
    }

    #[test]
    fn test_repeated_navigation_is_structurally_equal() {
        let mut tree = tree();
        let order = tree.root("Order", None).unwrap();
        let a = tree.get(order, "customer").unwrap();
        let b = tree.get(order, "customer").unwrap();
        assert_ne!(a, b);
        assert_eq!(tree.navigable_path(a), tree.navigable_path(b));
    }

    #[test]
    fn test_basic_and_plural_paths_not_navigable() {
        let mut tree = tree();
        let order = tree.root("Order", None).unwrap();
        let status = tree.get(order, "status").unwrap();
        let lines = tree.get(order, "lines").unwrap();

        assert!(matches!(
            tree.get(status, "length").unwrap_err(),
            RelmapError::NotNavigable { .. }
        ));
        assert!(matches!(
            tree.get(lines, "quantity").unwrap_err(),
            RelmapError::NotNavigable { .. }
        ));
        assert!(tree.treat_as_named(status, "Customer").is_err());
    }

    #[test]
    fn test_collection_parts() {
        let mut tree = tree();
        let order = tree.root("Order", None).unwrap();
        let lines = tree.get(order, "lines").unwrap();

        let element = tree.element(lines).unwrap();
        let quantity = tree.get(element, "quantity").unwrap();
        assert_eq!(
            tree.navigable_path(quantity).full_path(),
            "Order.lines.{element}.quantity"
        );
        assert!(tree.index(lines).is_ok());

        let tags = tree.get(order, "tags").unwrap();
        assert!(tree.index(tags).is_err());
        assert!(tree.key(tags).is_err());
    }

    #[test]
    fn test_plural_and_map_expressions() {
        let mut tree = tree();
        let domain = Arc::new(shop_model());
        let order_id = domain.type_by_name("Order").unwrap();
        let lines_attr = domain.find_attribute(order_id, "lines").unwrap().clone();
        let attrs_attr = domain.find_attribute(order_id, "attributes").unwrap().clone();

        let order = tree.root_of(order_id, None).unwrap();
        let lines = tree.get_plural(order, &lines_attr).unwrap();
        assert!(matches!(
            tree.expression(lines),
            Expression::Collection { kind: CollectionKind::List, .. }
        ));
        assert!(tree.get_map(order, &lines_attr).is_err());
        assert!(tree.get_singular(order, &lines_attr).is_err());

        let attrs = tree.get_map(order, &attrs_attr).unwrap();
        let map_path = tree.expression(attrs).path();
        let key = tree.key(map_path).unwrap();
        assert!(matches!(tree.path_type(key), PathType::Basic(_)));
        assert_eq!(tree.navigable_path(key).local_name(), "{key}");
    }

    #[test]
    fn test_type_of() {
        let mut tree = tree();
        let order = tree.root("Order", None).unwrap();
        let customer = tree.get(order, "customer").unwrap();
        let expr = tree.type_of(customer).unwrap();
        assert_eq!(
            tree.expression(expr),
            &Expression::Type {
                path: customer,
                base: tree.domain().type_by_name("Customer").unwrap()
            }
        );
    }

    #[test]
    fn test_ids_from_another_tree_are_rejected() {
        let mut first = tree();
        let mut second = tree();
        let order = first.root("Order", None).unwrap();
        second.root("Order", None).unwrap();

        assert!(first.contains(order));
        assert!(!second.contains(order));
        let err = second.get(order, "status").unwrap_err();
        assert!(matches!(err, RelmapError::ForeignNode(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(second.treat_as_named(order, "Order").is_err());
        assert!(second.type_of(order).is_err());

        // a clone keeps the ids it was issued
        let copy = first.clone();
        assert!(copy.contains(order));
    }

    #[test]
    fn test_rendered_paths_parse_back() {
        let mut tree = tree();
        let order = tree.root("Order", Some("o")).unwrap();
        let lines = tree.get(order, "lines").unwrap();
        let element = tree.element(lines).unwrap();
        let quantity = tree.get(element, "quantity").unwrap();

        for path in [order, lines, element, quantity] {
            let rendered = tree.navigable_path(path);
            let parsed: NavigablePath = rendered.to_string().parse().unwrap();
            assert_eq!(&parsed, rendered);
        }
        assert!(matches!(
            tree.root("Order", Some("o o")).unwrap_err(),
            RelmapError::InvalidPath { .. }
        ));
    }

    #[test]
    fn test_embeddable_cannot_be_root() {
        let mut tree = tree();
        assert!(tree.root("Address", None).is_err());
        assert!(matches!(
            tree.root("Nobody", None).unwrap_err(),
            RelmapError::UnknownType(_)
        ));
    }
}
