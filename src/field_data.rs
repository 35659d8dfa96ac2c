//! Cross-rank consistency of mesh fields.
//!
//! Every entity is owned by exactly one rank, and the owner's value is the
//! authoritative one. The coordinator holds the canonical array of every
//! field (its mesh view is complete):
//!
//! - [`FieldData::collect`] moves owned values from every rank into the
//!   canonical arrays;
//! - [`FieldData::distribute`] sends each rank the canonical values of the
//!   entities it can see.
//!
//! With linear interpolation enforced on a higher-order mesh, node fields
//! are distributed in two rounds: corner values first, then every rank
//! interpolates the other nodes of its owned elements, pushes those values
//! back to the coordinator, and the coordinator forwards them.

use crate::algs::communicator::{CommTag, Communicator, tags};
use crate::algs::exchange::{gather_to_coordinator, scatter_from_coordinator};
use crate::algs::wire::WireEntityValue;
use crate::fem_error::FemError;
use crate::topology::entity::{EntityCategory, EntityId};
use crate::topology::mesh::Mesh;

type PerCategory<T> = [Vec<T>; EntityCategory::COUNT];

#[derive(Clone, Debug, Default)]
pub struct FieldData {
    initialized: bool,
    /// Coordinator only: coordinator-local indices of the entities each rank sees.
    visible: Vec<PerCategory<usize>>,
    /// Coordinator only: coordinator-local indices of the entities each rank owns.
    owned: Vec<PerCategory<usize>>,
    /// Local indices of the entities this rank owns.
    local_owned: PerCategory<usize>,
}

impl FieldData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Collective: every rank reports which entities it sees and owns.
    pub fn initialize<C: Communicator>(&mut self, comm: &C, mesh: &Mesh) -> Result<(), FemError> {
        self.reset();
        let rank = comm.rank();
        for cat in EntityCategory::ALL {
            let n = mesh.num_entities(cat);
            self.local_owned[cat.index()] = (0..n)
                .filter(|&i| mesh.entity_owner(cat, i) == rank)
                .collect();

            let seen: Vec<u64> = mesh.entity_ids(cat).collect();
            let mine: Vec<u64> = self.local_owned[cat.index()]
                .iter()
                .map(|&i| mesh.entity_id(cat, i))
                .collect();
            let tag = tags::FIELD_ENTITIES.offset(2 * cat.index() as u16);
            let seen = gather_to_coordinator(comm, tag, seen)?;
            let mine = gather_to_coordinator(comm, tag.offset(1), mine)?;
            if let (Some(seen), Some(mine)) = (seen, mine) {
                self.visible.resize_with(comm.size(), Default::default);
                self.owned.resize_with(comm.size(), Default::default);
                for r in 0..comm.size() {
                    self.visible[r][cat.index()] = to_indices(mesh, cat, &seen[r])?;
                    self.owned[r][cat.index()] = to_indices(mesh, cat, &mine[r])?;
                }
            }
        }
        comm.barrier();
        self.initialized = true;
        Ok(())
    }

    /// Collective: owners send their values of `labels` to the coordinator.
    pub fn collect<C: Communicator>(
        &self,
        comm: &C,
        mesh: &mut Mesh,
        labels: &[String],
    ) -> Result<(), FemError> {
        self.require_initialized()?;
        for label in labels {
            let (cat, m) = field_shape(mesh, label)?;
            let values = &mesh.field(label)?.values;
            let mine: Vec<f64> = self.local_owned[cat.index()]
                .iter()
                .flat_map(|&i| values[i * m..(i + 1) * m].iter().copied())
                .collect();
            let Some(all) = gather_to_coordinator(comm, tags::FIELD_COLLECT, mine)? else {
                continue;
            };
            let field = mesh.field_mut(label)?;
            for (r, vals) in all.iter().enumerate() {
                if r == comm.coordinator() {
                    continue;
                }
                let targets = &self.owned[r][cat.index()];
                if vals.len() != targets.len() * m {
                    return Err(FemError::NnzMismatch {
                        rank: r,
                        what: "field collect",
                        expected: targets.len() * m,
                        got: vals.len(),
                    });
                }
                for (&i, chunk) in targets.iter().zip(vals.chunks_exact(m)) {
                    field.values[i * m..(i + 1) * m].copy_from_slice(chunk);
                }
            }
        }
        comm.barrier();
        Ok(())
    }

    /// Collective: every rank receives the canonical values of the entities it
    /// sees. With `enforce_linear`, non-corner nodes are interpolated from the
    /// corners.
    pub fn distribute<C: Communicator>(
        &self,
        comm: &C,
        mesh: &mut Mesh,
        labels: &[String],
        enforce_linear: bool,
    ) -> Result<(), FemError> {
        self.require_initialized()?;
        for label in labels {
            let (cat, _) = field_shape(mesh, label)?;
            if enforce_linear && cat == EntityCategory::Node && mesh.is_higher_order() {
                self.send_visible(comm, mesh, label, tags::FIELD_CORNER)?;
                let computed = project_linear_local(mesh, label, Some(comm.rank()))?;
                self.push_back(comm, mesh, label, computed)?;
            }
            self.send_visible(comm, mesh, label, tags::FIELD_DISTRIBUTE)?;
        }
        comm.barrier();
        Ok(())
    }

    fn send_visible<C: Communicator>(
        &self,
        comm: &C,
        mesh: &mut Mesh,
        label: &str,
        tag: CommTag,
    ) -> Result<(), FemError> {
        let (cat, m) = field_shape(mesh, label)?;
        let slices = if comm.is_coordinator() {
            let values = &mesh.field(label)?.values;
            Some(
                (0..comm.size())
                    .map(|r| {
                        if r == comm.coordinator() {
                            return Vec::new();
                        }
                        self.visible[r][cat.index()]
                            .iter()
                            .flat_map(|&i| values[i * m..(i + 1) * m].iter().copied())
                            .collect()
                    })
                    .collect(),
            )
        } else {
            None
        };
        let mine = scatter_from_coordinator(comm, tag, slices)?;
        if comm.is_coordinator() {
            return Ok(());
        }
        let field = mesh.field_mut(label)?;
        if mine.len() != field.values.len() {
            return Err(FemError::NnzMismatch {
                rank: comm.rank(),
                what: "field distribute",
                expected: field.values.len(),
                got: mine.len(),
            });
        }
        field.values.copy_from_slice(&mine);
        Ok(())
    }

    fn push_back<C: Communicator>(
        &self,
        comm: &C,
        mesh: &mut Mesh,
        label: &str,
        computed: Vec<(EntityId, usize, f64)>,
    ) -> Result<(), FemError> {
        let mine: Vec<WireEntityValue> = computed
            .iter()
            .map(|&(n, k, v)| WireEntityValue::new(n, k, v))
            .collect();
        let Some(all) = gather_to_coordinator(comm, tags::FIELD_PUSHBACK, mine)? else {
            return Ok(());
        };
        for (r, vals) in all.iter().enumerate() {
            if r == comm.coordinator() {
                continue;
            }
            for w in vals {
                mesh.set_field_value(label, w.entity(), w.k(), w.value())?;
            }
        }
        Ok(())
    }

    fn require_initialized(&self) -> Result<(), FemError> {
        if self.initialized {
            Ok(())
        } else {
            Err(FemError::NotInitialized("field data has not been initialized"))
        }
    }
}

fn field_shape(mesh: &Mesh, label: &str) -> Result<(EntityCategory, usize), FemError> {
    let f = mesh.field(label)?;
    Ok((f.category, f.multiplicity))
}

fn to_indices(mesh: &Mesh, cat: EntityCategory, ids: &[u64]) -> Result<Vec<usize>, FemError> {
    ids.iter().map(|&id| mesh.require_index(cat, id)).collect()
}

/// Interpolate node field `label` linearly from the corner nodes onto the
/// other nodes of every element (of every element owned by `owner`, if
/// given). Returns the `(node, sub-index, value)` triples written.
pub fn project_linear_local(
    mesh: &mut Mesh,
    label: &str,
    owner: Option<usize>,
) -> Result<Vec<(EntityId, usize, f64)>, FemError> {
    let (cat, m) = field_shape(mesh, label)?;
    if cat != EntityCategory::Node {
        return Err(FemError::InvalidConfiguration(format!(
            "linear projection needs a node field, `{label}` lives on {cat} entities"
        )));
    }
    let mut written = Vec::new();
    for e in mesh.elements() {
        if e.kind.is_linear() || owner.is_some_and(|o| e.owner != o) {
            continue;
        }
        let corners = e.corner_nodes();
        for (i, &node) in e.nodes.iter().enumerate().skip(corners.len()) {
            if mesh.is_corner_node(mesh.require_index(EntityCategory::Node, node)?) {
                continue;
            }
            let Some(w) = e.kind.linear_weights(i) else {
                continue;
            };
            for k in 0..m {
                let mut v = 0.0;
                for (&c, &wc) in corners.iter().zip(&w) {
                    v += wc * mesh.field_value(label, c, k)?;
                }
                written.push((node, k, v));
            }
        }
    }
    for &(node, k, v) in &written {
        mesh.set_field_value(label, node, k, v)?;
    }
    Ok(written)
}
