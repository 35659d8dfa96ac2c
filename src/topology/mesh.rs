//! Read-only mesh contract consumed by the DOF manager.
//!
//! A [`Mesh`] is one rank's view of a partitioned mesh: the coordinating rank
//! holds the complete mesh, every other rank holds the entities touched by the
//! elements and facets it owns (see [`Mesh::partition`]). Entity ids are global,
//! every entity records its owning rank, and the mesh stores named fields per
//! entity category.

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap;

use crate::fem_error::FemError;
use crate::topology::element_kind::ElementKind;
use crate::topology::entity::{EntityCategory, EntityId, GroupId};

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: EntityId,
    pub owner: usize,
    pub coords: [f64; 3],
}

/// Edge or face: a lower-dimensional entity that may carry DOFs.
#[derive(Clone, Debug, PartialEq)]
pub struct SubEntity {
    pub id: EntityId,
    pub owner: usize,
    pub nodes: Vec<EntityId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub id: EntityId,
    pub owner: usize,
    pub block: GroupId,
    pub kind: ElementKind,
    pub nodes: Vec<EntityId>,
    pub edges: Vec<EntityId>,
    pub faces: Vec<EntityId>,
}

impl Element {
    pub fn new(
        id: EntityId,
        owner: usize,
        block: GroupId,
        kind: ElementKind,
        nodes: Vec<EntityId>,
    ) -> Self {
        Self {
            id,
            owner,
            block,
            kind,
            nodes,
            edges: Vec::new(),
            faces: Vec::new(),
        }
    }

    pub fn with_edges(mut self, edges: Vec<EntityId>) -> Self {
        self.edges = edges;
        self
    }

    pub fn with_faces(mut self, faces: Vec<EntityId>) -> Self {
        self.faces = faces;
        self
    }

    /// Corner nodes, in local order.
    pub fn corner_nodes(&self) -> &[EntityId] {
        let n = self.kind.num_corners().min(self.nodes.len());
        &self.nodes[..n]
    }
}

/// A sideset member. `master` is the element the facet belongs to; cut and
/// thin-shell facets also reference the element and the duplicated nodes on
/// the opposite side.
#[derive(Clone, Debug, PartialEq)]
pub struct Facet {
    pub id: EntityId,
    pub owner: usize,
    pub sideset: GroupId,
    pub kind: ElementKind,
    pub nodes: Vec<EntityId>,
    pub edges: Vec<EntityId>,
    pub master: EntityId,
    pub slave: Option<EntityId>,
    pub slave_nodes: Vec<EntityId>,
}

impl Facet {
    pub fn new(
        id: EntityId,
        owner: usize,
        sideset: GroupId,
        kind: ElementKind,
        nodes: Vec<EntityId>,
        master: EntityId,
    ) -> Self {
        Self {
            id,
            owner,
            sideset,
            kind,
            nodes,
            edges: Vec::new(),
            master,
            slave: None,
            slave_nodes: Vec::new(),
        }
    }

    pub fn with_edges(mut self, edges: Vec<EntityId>) -> Self {
        self.edges = edges;
        self
    }

    pub fn with_slave(mut self, slave: EntityId, slave_nodes: Vec<EntityId>) -> Self {
        self.slave = Some(slave);
        self.slave_nodes = slave_nodes;
        self
    }
}

/// Field values for one entity category. Entity `i` (local index) owns
/// `values[i * multiplicity .. (i + 1) * multiplicity]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub label: String,
    pub category: EntityCategory,
    pub multiplicity: usize,
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    nodes: Vec<Node>,
    edges: Vec<SubEntity>,
    faces: Vec<SubEntity>,
    elements: Vec<Element>,
    facets: Vec<Facet>,
    bearings: BTreeMap<GroupId, EntityId>,
    index: [HashMap<EntityId, usize>; EntityCategory::COUNT],
    corner: Vec<bool>,
    fields: BTreeMap<String, Field>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- building -------------------------------------------------------

    pub fn add_node(&mut self, id: EntityId, owner: usize, coords: [f64; 3]) {
        self.index[EntityCategory::Node.index()].insert(id, self.nodes.len());
        self.nodes.push(Node { id, owner, coords });
        self.corner.push(false);
        self.grow_fields(EntityCategory::Node);
    }

    pub fn add_edge(&mut self, id: EntityId, owner: usize, nodes: [EntityId; 2]) {
        self.index[EntityCategory::Edge.index()].insert(id, self.edges.len());
        self.edges.push(SubEntity {
            id,
            owner,
            nodes: nodes.to_vec(),
        });
        self.grow_fields(EntityCategory::Edge);
    }

    pub fn add_face(&mut self, id: EntityId, owner: usize, nodes: Vec<EntityId>) {
        self.index[EntityCategory::Face.index()].insert(id, self.faces.len());
        self.faces.push(SubEntity { id, owner, nodes });
        self.grow_fields(EntityCategory::Face);
    }

    /// Add an element. Its nodes must already exist; its corner nodes are
    /// flagged as corners.
    pub fn add_element(&mut self, element: Element) -> Result<(), FemError> {
        for (k, &n) in element.nodes.iter().enumerate() {
            let idx = self.require_index(EntityCategory::Node, n)?;
            if k < element.kind.num_corners() {
                self.corner[idx] = true;
            }
        }
        self.index[EntityCategory::Cell.index()].insert(element.id, self.elements.len());
        self.elements.push(element);
        self.grow_fields(EntityCategory::Cell);
        Ok(())
    }

    pub fn add_facet(&mut self, facet: Facet) -> Result<(), FemError> {
        for &n in facet.nodes.iter().chain(&facet.slave_nodes) {
            self.require_index(EntityCategory::Node, n)?;
        }
        self.index[EntityCategory::Lambda.index()].insert(facet.id, self.facets.len());
        self.facets.push(facet);
        self.grow_fields(EntityCategory::Lambda);
        Ok(())
    }

    /// Register a single-node set.
    pub fn add_bearing(&mut self, id: GroupId, node: EntityId) -> Result<(), FemError> {
        self.require_index(EntityCategory::Node, node)?;
        self.bearings.insert(id, node);
        Ok(())
    }

    // ----- queries --------------------------------------------------------

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
    pub fn edges(&self) -> &[SubEntity] {
        &self.edges
    }
    pub fn faces(&self) -> &[SubEntity] {
        &self.faces
    }
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    pub fn num_entities(&self, cat: EntityCategory) -> usize {
        match cat {
            EntityCategory::Node => self.nodes.len(),
            EntityCategory::Edge => self.edges.len(),
            EntityCategory::Face => self.faces.len(),
            EntityCategory::Cell => self.elements.len(),
            EntityCategory::Lambda => self.facets.len(),
        }
    }

    /// Global id of the entity at local index `i`.
    pub fn entity_id(&self, cat: EntityCategory, i: usize) -> EntityId {
        match cat {
            EntityCategory::Node => self.nodes[i].id,
            EntityCategory::Edge => self.edges[i].id,
            EntityCategory::Face => self.faces[i].id,
            EntityCategory::Cell => self.elements[i].id,
            EntityCategory::Lambda => self.facets[i].id,
        }
    }

    pub fn entity_owner(&self, cat: EntityCategory, i: usize) -> usize {
        match cat {
            EntityCategory::Node => self.nodes[i].owner,
            EntityCategory::Edge => self.edges[i].owner,
            EntityCategory::Face => self.faces[i].owner,
            EntityCategory::Cell => self.elements[i].owner,
            EntityCategory::Lambda => self.facets[i].owner,
        }
    }

    pub fn entity_index(&self, cat: EntityCategory, id: EntityId) -> Option<usize> {
        self.index[cat.index()].get(&id).copied()
    }

    pub fn require_index(&self, cat: EntityCategory, id: EntityId) -> Result<usize, FemError> {
        self.entity_index(cat, id)
            .ok_or(FemError::MissingEntity { category: cat, id })
    }

    /// Largest entity id of a category, `None` if the category is empty.
    pub fn max_entity_id(&self, cat: EntityCategory) -> Option<EntityId> {
        self.index[cat.index()].keys().copied().max()
    }

    pub fn entity_ids(&self, cat: EntityCategory) -> impl Iterator<Item = EntityId> + '_ {
        (0..self.num_entities(cat)).map(move |i| self.entity_id(cat, i))
    }

    /// True if the node is a corner node of at least one element.
    pub fn is_corner_node(&self, node_index: usize) -> bool {
        self.corner.get(node_index).copied().unwrap_or(false)
    }

    /// True if any element has nodes besides its corners.
    pub fn is_higher_order(&self) -> bool {
        self.elements.iter().any(|e| !e.kind.is_linear())
    }

    pub fn node(&self, id: EntityId) -> Result<&Node, FemError> {
        Ok(&self.nodes[self.require_index(EntityCategory::Node, id)?])
    }

    pub fn element(&self, id: EntityId) -> Result<&Element, FemError> {
        Ok(&self.elements[self.require_index(EntityCategory::Cell, id)?])
    }

    pub fn block_ids(&self) -> BTreeSet<GroupId> {
        self.elements.iter().map(|e| e.block).collect()
    }

    pub fn sideset_ids(&self) -> BTreeSet<GroupId> {
        self.facets.iter().map(|f| f.sideset).collect()
    }

    /// `(local index, element)` for every element of block `id`.
    pub fn block_elements(&self, id: GroupId) -> impl Iterator<Item = (usize, &Element)> + '_ {
        self.elements
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.block == id)
    }

    /// `(local index, facet)` for every facet of sideset `id`.
    pub fn sideset_facets(&self, id: GroupId) -> impl Iterator<Item = (usize, &Facet)> + '_ {
        self.facets
            .iter()
            .enumerate()
            .filter(move |(_, f)| f.sideset == id)
    }

    pub fn bearing_node(&self, id: GroupId) -> Option<EntityId> {
        self.bearings.get(&id).copied()
    }

    pub fn bearing_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.bearings.keys().copied()
    }

    /// Physical coordinates of the given nodes.
    pub fn coords_of(&self, nodes: &[EntityId]) -> Result<Vec<[f64; 3]>, FemError> {
        nodes
            .iter()
            .map(|&n| self.node(n).map(|node| node.coords))
            .collect()
    }

    // ----- fields ---------------------------------------------------------

    /// Create a zero-initialized field, or keep the existing one if it has the
    /// same category and multiplicity.
    pub fn create_field(
        &mut self,
        label: &str,
        category: EntityCategory,
        multiplicity: usize,
    ) -> Result<(), FemError> {
        if let Some(f) = self.fields.get(label) {
            if f.category == category && f.multiplicity == multiplicity {
                return Ok(());
            }
            return Err(FemError::InvalidConfiguration(format!(
                "field `{label}` already exists on {} entities with multiplicity {}",
                f.category, f.multiplicity
            )));
        }
        let len = self.num_entities(category) * multiplicity;
        self.fields.insert(
            label.to_string(),
            Field {
                label: label.to_string(),
                category,
                multiplicity,
                values: vec![0.0; len],
            },
        );
        Ok(())
    }

    pub fn has_field(&self, label: &str) -> bool {
        self.fields.contains_key(label)
    }

    pub fn field(&self, label: &str) -> Result<&Field, FemError> {
        self.fields
            .get(label)
            .ok_or_else(|| FemError::MissingField(label.to_string()))
    }

    pub fn field_mut(&mut self, label: &str) -> Result<&mut Field, FemError> {
        self.fields
            .get_mut(label)
            .ok_or_else(|| FemError::MissingField(label.to_string()))
    }

    pub fn field_labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.keys().map(String::as_str)
    }

    /// Value `k` of field `label` on entity `id`.
    pub fn field_value(&self, label: &str, id: EntityId, k: usize) -> Result<f64, FemError> {
        let f = self.field(label)?;
        let i = self.require_index(f.category, id)?;
        let slot = value_slot(i, k, f.multiplicity)?;
        f.values
            .get(slot)
            .copied()
            .ok_or(FemError::DofIndexOutOfBounds {
                index: slot,
                len: f.values.len(),
            })
    }

    pub fn set_field_value(
        &mut self,
        label: &str,
        id: EntityId,
        k: usize,
        value: f64,
    ) -> Result<(), FemError> {
        let (cat, mult) = {
            let f = self.field(label)?;
            (f.category, f.multiplicity)
        };
        let i = self.require_index(cat, id)?;
        let slot = value_slot(i, k, mult)?;
        let values = &mut self.field_mut(label)?.values;
        let len = values.len();
        *values
            .get_mut(slot)
            .ok_or(FemError::DofIndexOutOfBounds { index: slot, len })? = value;
        Ok(())
    }

    fn grow_fields(&mut self, cat: EntityCategory) {
        let n = self.num_entities(cat);
        for f in self.fields.values_mut().filter(|f| f.category == cat) {
            f.values.resize(n * f.multiplicity, 0.0);
        }
    }

    // ----- partitioning ---------------------------------------------------

    /// Extract the view of `rank`: its owned elements and facets, every entity
    /// they reference (with the original owners), the master/slave elements of
    /// its facets, bearings on included nodes, and the matching field values.
    pub fn partition(&self, rank: usize) -> Result<Mesh, FemError> {
        let mut elements: BTreeSet<usize> = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.owner == rank)
            .map(|(i, _)| i)
            .collect();
        let facets: Vec<usize> = self
            .facets
            .iter()
            .enumerate()
            .filter(|(_, f)| f.owner == rank)
            .map(|(i, _)| i)
            .collect();
        for &fi in &facets {
            let f = &self.facets[fi];
            elements.insert(self.require_index(EntityCategory::Cell, f.master)?);
            if let Some(s) = f.slave {
                elements.insert(self.require_index(EntityCategory::Cell, s)?);
            }
        }

        let mut nodes = BTreeSet::new();
        let mut edges = BTreeSet::new();
        let mut faces = BTreeSet::new();
        for &ei in &elements {
            let e = &self.elements[ei];
            nodes.extend(e.nodes.iter().copied());
            edges.extend(e.edges.iter().copied());
            faces.extend(e.faces.iter().copied());
        }
        for &fi in &facets {
            let f = &self.facets[fi];
            nodes.extend(f.nodes.iter().chain(&f.slave_nodes).copied());
            edges.extend(f.edges.iter().copied());
        }

        let mut part = Mesh::new();
        for id in &nodes {
            let n = self.node(*id)?;
            part.add_node(n.id, n.owner, n.coords);
        }
        for id in &edges {
            let e = &self.edges[self.require_index(EntityCategory::Edge, *id)?];
            part.add_edge(e.id, e.owner, [e.nodes[0], e.nodes[1]]);
        }
        for id in &faces {
            let f = &self.faces[self.require_index(EntityCategory::Face, *id)?];
            part.add_face(f.id, f.owner, f.nodes.clone());
        }
        for &ei in &elements {
            part.add_element(self.elements[ei].clone())?;
        }
        for &fi in &facets {
            part.add_facet(self.facets[fi].clone())?;
        }
        for (&b, &node) in &self.bearings {
            if part.entity_index(EntityCategory::Node, node).is_some() {
                part.bearings.insert(b, node);
            }
        }
        for f in self.fields.values() {
            let m = f.multiplicity;
            let n = part.num_entities(f.category);
            let mut values = vec![0.0; n * m];
            for i in 0..n {
                let src = self.require_index(f.category, part.entity_id(f.category, i))?;
                values[i * m..(i + 1) * m].copy_from_slice(&f.values[src * m..(src + 1) * m]);
            }
            part.fields.insert(
                f.label.clone(),
                Field {
                    label: f.label.clone(),
                    category: f.category,
                    multiplicity: m,
                    values,
                },
            );
        }
        Ok(part)
    }
}

/// Flat position of component `k` of entity `i`; `k` must stay below the
/// field multiplicity.
fn value_slot(i: usize, k: usize, multiplicity: usize) -> Result<usize, FemError> {
    if k >= multiplicity {
        return Err(FemError::DofIndexOutOfBounds {
            index: k,
            len: multiplicity,
        });
    }
    Ok(i * multiplicity + k)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Mesh {
        let mut m = Mesh::new();
        for i in 0..4u64 {
            m.add_node(i, if i < 2 { 0 } else { 1 }, [i as f64, 0.0, 0.0]);
        }
        m.add_element(Element::new(0, 0, 1, ElementKind::Line2, vec![0, 1]))
            .unwrap();
        m.add_element(Element::new(1, 0, 1, ElementKind::Line2, vec![1, 2]))
            .unwrap();
        m.add_element(Element::new(2, 1, 2, ElementKind::Line2, vec![2, 3]))
            .unwrap();
        m
    }

    #[test]
    fn partition_keeps_referenced_entities() {
        let m = chain();
        let p1 = m.partition(1).unwrap();
        assert_eq!(p1.elements().len(), 1);
        let ids: Vec<_> = p1.entity_ids(EntityCategory::Node).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(p1.node(2).unwrap().owner, 1);
        assert_eq!(p1.max_entity_id(EntityCategory::Node), Some(3));
    }

    #[test]
    fn field_component_past_multiplicity_is_rejected() {
        let mut m = chain();
        m.create_field("v", EntityCategory::Node, 2).unwrap();
        m.set_field_value("v", 1, 1, 4.0).unwrap();
        assert_eq!(m.field_value("v", 1, 1).unwrap(), 4.0);
        assert!(matches!(
            m.set_field_value("v", 1, 2, 9.0),
            Err(FemError::DofIndexOutOfBounds { index: 2, len: 2 })
        ));
        assert!(matches!(
            m.field_value("v", 3, 2),
            Err(FemError::DofIndexOutOfBounds { index: 2, len: 2 })
        ));
        // the neighbouring entity's slot is untouched
        assert_eq!(m.field_value("v", 2, 0).unwrap(), 0.0);
    }

    #[test]
    fn fields_follow_partition() {
        let mut m = chain();
        m.create_field("T", EntityCategory::Node, 1).unwrap();
        m.set_field_value("T", 3, 0, 7.0).unwrap();
        let p1 = m.partition(1).unwrap();
        assert_eq!(p1.field_value("T", 3, 0).unwrap(), 7.0);
        assert!(matches!(
            p1.field_value("T", 0, 0),
            Err(FemError::MissingEntity { .. })
        ));
    }

    #[test]
    fn corners_are_flagged() {
        let mut m = Mesh::new();
        for i in 0..3u64 {
            m.add_node(i, 0, [i as f64 * 0.5, 0.0, 0.0]);
        }
        m.add_element(Element::new(0, 0, 1, ElementKind::Line3, vec![0, 2, 1]))
            .unwrap();
        assert!(m.is_corner_node(0));
        assert!(m.is_corner_node(2));
        assert!(!m.is_corner_node(1));
        assert!(m.is_higher_order());
    }

    #[test]
    fn element_with_unknown_node_is_rejected() {
        let mut m = Mesh::new();
        let r = m.add_element(Element::new(0, 0, 1, ElementKind::Line2, vec![0, 1]));
        assert!(matches!(r, Err(FemError::MissingEntity { .. })));
    }
}
