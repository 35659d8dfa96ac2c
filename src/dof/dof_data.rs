//! Distributed DOF registry.
//!
//! [`DofData`] owns every [`Dof`] this rank knows about. Creation is collective:
//! the coordinating rank walks the complete mesh, decides which DOFs exist and
//! which ranks see them, and hands every rank its slice. Index numbering is
//! collective as well: ranks report the DOFs their boundary conditions fix,
//! the coordinator merges the reports and numbers free and fixed DOFs
//! contiguously in id order.
//!
//! The coordinator keeps all DOFs of the problem; worker ranks keep the DOFs
//! touched by the elements and facets they own.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::algs::communicator::{Communicator, tags};
use crate::algs::exchange::{
    broadcast, coordinator_phase, gather_to_coordinator, scatter_from_coordinator,
};
use crate::algs::wire::{WireDof, WireDofState};
use crate::dof::bitset::{RankSet, TypeSet};
use crate::dof::parameters::Parameters;
use crate::dof::record::{Dof, DofHandle, DofTable};
use crate::dof::scheme::{DofIdScheme, DofLayout};
use crate::equation::{AssemblyUnit, Equation, SideSetRole};
use crate::fem_error::FemError;
use crate::topology::entity::{EntityCategory, EntityId};
use crate::topology::mesh::Mesh;

/// Entities of category `cat` a unit carries DOFs on, in local order.
///
/// Facets of cut and thin-shell sidesets list their slave nodes after their own
/// nodes. With `enforce_linear`, nodes that are not element corners carry no
/// DOFs and are skipped.
pub fn unit_entities(
    mesh: &Mesh,
    unit: AssemblyUnit<'_>,
    cat: EntityCategory,
    role: SideSetRole,
    enforce_linear: bool,
) -> Vec<EntityId> {
    let mut out: Vec<EntityId> = match (unit, cat) {
        (AssemblyUnit::Element(e), EntityCategory::Node) => e.nodes.clone(),
        (AssemblyUnit::Element(e), EntityCategory::Edge) => e.edges.clone(),
        (AssemblyUnit::Element(e), EntityCategory::Face) => e.faces.clone(),
        (AssemblyUnit::Element(e), EntityCategory::Cell) => vec![e.id],
        (AssemblyUnit::Element(_), EntityCategory::Lambda) => Vec::new(),
        (AssemblyUnit::Facet(f), EntityCategory::Node) => {
            let mut n = f.nodes.clone();
            if role != SideSetRole::Plain {
                n.extend_from_slice(&f.slave_nodes);
            }
            n
        }
        (AssemblyUnit::Facet(f), EntityCategory::Edge) => f.edges.clone(),
        (AssemblyUnit::Facet(f), EntityCategory::Lambda) => vec![f.id],
        (AssemblyUnit::Facet(_), _) => Vec::new(),
    };
    if enforce_linear && cat == EntityCategory::Node {
        out.retain(|&n| {
            mesh.entity_index(EntityCategory::Node, n)
                .is_some_and(|i| mesh.is_corner_node(i))
        });
    }
    out
}

/// Visit every `(category, entity index, owner rank, slot)` reference the
/// selected groups make. Both discovery passes run this same walk.
fn walk_references<F>(
    mesh: &Mesh,
    eq: &dyn Equation,
    layout: &DofLayout,
    enforce_linear: bool,
    mut visit: F,
) -> Result<(), FemError>
where
    F: FnMut(EntityCategory, usize, usize, usize) -> Result<(), FemError>,
{
    let mut visit_unit =
        |unit: AssemblyUnit<'_>, owner: usize, table: &DofTable, role: SideSetRole| {
            for cat in EntityCategory::ALL {
                let types = table.types(cat);
                if types.is_empty() {
                    continue;
                }
                let entities = unit_entities(mesh, unit, cat, role, enforce_linear);
                for ent in entities {
                    let idx = mesh.require_index(cat, ent)?;
                    for &t in types {
                        for k in 0..layout.multiplicity(cat) {
                            visit(cat, idx, owner, layout.slot(cat, t, k))?;
                        }
                    }
                }
            }
            Ok::<(), FemError>(())
        };

    for b in eq.selected_blocks() {
        let table = DofTable::for_block(eq, b);
        for (_, e) in mesh.block_elements(b) {
            visit_unit(AssemblyUnit::Element(e), e.owner, &table, SideSetRole::Plain)?;
        }
    }
    for s in eq.selected_sidesets() {
        let table = DofTable::for_sideset(eq, s);
        let role = eq.sideset_role(s);
        for (_, f) in mesh.sideset_facets(s) {
            visit_unit(AssemblyUnit::Facet(f), f.owner, &table, role)?;
        }
    }
    Ok(())
}

/// Result of the coordinator's discovery walk.
struct Discovery {
    scheme: DofIdScheme,
    all: Vec<WireDof>,
    per_rank: Vec<Vec<WireDof>>,
}

fn discover(
    mesh: &Mesh,
    eq: &dyn Equation,
    layout: &DofLayout,
    enforce_linear: bool,
    n_ranks: usize,
) -> Result<Discovery, FemError> {
    // pass 1: which slots exist on which entity
    let mut types: [Vec<TypeSet>; EntityCategory::COUNT] = Default::default();
    for cat in EntityCategory::ALL {
        if layout.slots(cat) > 0 {
            types[cat.index()] = vec![TypeSet::default(); mesh.num_entities(cat)];
        }
    }
    walk_references(mesh, eq, layout, enforce_linear, |cat, idx, _, slot| {
        types[cat.index()][idx].insert(slot);
        Ok(())
    })?;
    let counts: Vec<usize> = types
        .iter()
        .map(|v| v.iter().map(TypeSet::len).sum())
        .collect();
    let total: usize = counts.iter().sum();

    let max_ids = EntityCategory::ALL.map(|c| {
        if layout.slots(c) > 0 {
            mesh.max_entity_id(c)
        } else {
            None
        }
    });
    let scheme = DofIdScheme::new(layout, max_ids);

    // pass 2: which ranks see each DOF
    let mut ranks: BTreeMap<u64, RankSet> = BTreeMap::new();
    walk_references(mesh, eq, layout, enforce_linear, |cat, idx, owner, slot| {
        if owner >= n_ranks {
            return Err(FemError::InvalidConfiguration(format!(
                "{cat} entity {} is owned by rank {owner}, world has {n_ranks} ranks",
                mesh.entity_id(cat, idx)
            )));
        }
        let id = scheme.id(cat, mesh.entity_id(cat, idx), slot);
        ranks.entry(id).or_default().insert(owner);
        Ok(())
    })?;
    if ranks.len() != total {
        return Err(FemError::InvalidConfiguration(format!(
            "discovery found {} DOF ids but {total} type bits",
            ranks.len()
        )));
    }
    log::debug!(
        "discovered {total} DOFs (node {}, edge {}, face {}, cell {}, lambda {})",
        counts[0],
        counts[1],
        counts[2],
        counts[3],
        counts[4]
    );

    let mut all = Vec::with_capacity(total);
    let mut per_rank = vec![Vec::new(); n_ranks];
    for (&id, seen) in &ranks {
        let (cat, entity, slot) = scheme.decode(id).ok_or_else(|| {
            FemError::InvalidConfiguration(format!("DOF id {id} outside the id space"))
        })?;
        let w = WireDof::new(id, entity, cat, slot);
        all.push(w);
        for r in seen.iter() {
            per_rank[r].push(w);
        }
    }
    Ok(Discovery {
        scheme,
        all,
        per_rank,
    })
}

/// All DOFs one rank knows about, with their global numbering.
#[derive(Clone, Debug, Default)]
pub struct DofData {
    rank: usize,
    layout: Option<DofLayout>,
    scheme: DofIdScheme,
    dofs: Vec<Dof>,
    lookup: HashMap<u64, DofHandle>,
    /// Coordinator only: the ids held by each rank.
    rank_ids: Vec<Vec<u64>>,
    /// Fixed flags at the last numbering.
    numbered_fixed: Vec<bool>,
    n_free: usize,
    n_fixed: usize,
    indexed: bool,
}

impl DofData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every DOF and all numbering.
    pub fn reset(&mut self) {
        *self = Self {
            rank: self.rank,
            ..Self::default()
        };
    }

    /// Collective: decide which DOFs exist, assign their ids and give every
    /// rank its slice.
    pub fn create_dofs<C: Communicator>(
        &mut self,
        comm: &C,
        mesh: &Mesh,
        eq: &dyn Equation,
        params: &Parameters,
    ) -> Result<(), FemError> {
        self.reset();
        self.rank = comm.rank();
        if comm.size() > RankSet::CAPACITY {
            return Err(FemError::RankCapacityExceeded {
                ranks: comm.size(),
                capacity: RankSet::CAPACITY,
            });
        }
        let layout = DofLayout::from_equation(eq)?;

        let discovery = coordinator_phase(comm, || {
            discover(mesh, eq, &layout, params.enforce_linear(), comm.size())
        })?;
        let (words, slices) = match discovery {
            Some(d) => {
                self.rank_ids = d
                    .per_rank
                    .iter()
                    .map(|s| s.iter().map(WireDof::id).collect())
                    .collect();
                let mut slices = d.per_rank;
                slices[comm.coordinator()] = d.all;
                (Some(d.scheme.to_words()), Some(slices))
            }
            None => (None, None),
        };
        let words = broadcast(comm, tags::DOF_SCHEME, words)?;
        self.scheme = DofIdScheme::from_words(&words)?;
        let slice = scatter_from_coordinator(comm, tags::DOF_SLICE, slices)?;

        self.dofs.reserve(slice.len());
        for w in &slice {
            let cat = w.category().ok_or_else(|| {
                FemError::InvalidConfiguration(format!("DOF {} has no valid category", w.id()))
            })?;
            let idx = mesh.require_index(cat, w.entity())?;
            let mult = self.scheme.multiplicity(cat);
            self.dofs.push(Dof::new(
                w.id(),
                w.slot() / mult,
                cat,
                w.entity(),
                idx,
                w.slot() % mult,
            ));
        }
        self.dofs.sort_unstable_by_key(|d| d.id);
        self.lookup = self
            .dofs
            .iter()
            .enumerate()
            .map(|(h, d)| (d.id, h))
            .collect();
        self.layout = Some(layout);
        comm.barrier();
        log::debug!("rank {}: {} DOFs instantiated", self.rank, self.dofs.len());
        Ok(())
    }

    /// Free every DOF, then fix the given `(category, entity, dof type, value)`
    /// targets. All multiplicity sub-indices of a type are fixed. Returns the
    /// number of DOFs fixed here.
    ///
    /// Groups only target DOFs the owning rank holds, so a target naming a DOF
    /// absent from this rank is a [`FemError::MissingDof`].
    pub fn apply_dirichlet(
        &mut self,
        targets: &[(EntityCategory, EntityId, usize, f64)],
    ) -> Result<usize, FemError> {
        let layout = self
            .layout
            .as_ref()
            .ok_or(FemError::NotInitialized("DOFs have not been created"))?;
        for d in &mut self.dofs {
            d.free();
        }
        let mut fixed = 0;
        for &(cat, entity, dof_type, value) in targets {
            if dof_type >= layout.n_types() {
                return Err(FemError::UnknownDofType {
                    dof_type,
                    count: layout.n_types(),
                });
            }
            if layout.type_category(dof_type) != Some(cat) {
                return Err(FemError::InvalidConfiguration(format!(
                    "DOF type {dof_type} does not live on {cat} entities"
                )));
            }
            for k in 0..layout.multiplicity(cat) {
                let id = self.scheme.id(cat, entity, layout.slot(cat, dof_type, k));
                let h = *self.lookup.get(&id).ok_or(FemError::MissingDof {
                    id,
                    rank: self.rank,
                })?;
                let d = &mut self.dofs[h];
                if !d.fixed {
                    fixed += 1;
                }
                d.fix(value);
            }
        }
        self.indexed = false;
        Ok(fixed)
    }

    /// Collective: merge the fixed DOFs of all ranks on the coordinator, number
    /// free and fixed DOFs contiguously in id order, and hand every rank the
    /// result. Returns true if the set of fixed DOFs changed since the last
    /// numbering.
    pub fn compute_indices<C: Communicator>(&mut self, comm: &C) -> Result<bool, FemError> {
        if self.layout.is_none() {
            return Err(FemError::NotInitialized("DOFs have not been created"));
        }
        let report: Vec<WireDofState> = self
            .dofs
            .iter()
            .filter(|d| d.fixed)
            .map(|d| WireDofState::new(d.id, true, d.value, 0))
            .collect();
        let reports = gather_to_coordinator(comm, tags::DOF_REPORT, report)?;

        let coord = comm.coordinator();
        let replies = coordinator_phase(comm, || {
            let reports = reports.unwrap_or_default();
            self.merge_reports(&reports, coord)
        })?;
        let mine = scatter_from_coordinator(comm, tags::DOF_INDICES, replies)?;
        if !comm.is_coordinator() {
            self.apply_reply(&mine)?;
        }

        let totals = comm.is_coordinator().then(|| {
            let n_fixed = self.dofs.iter().filter(|d| d.fixed).count() as u64;
            let fixed: Vec<bool> = self.dofs.iter().map(|d| d.fixed).collect();
            let changed = fixed != self.numbered_fixed;
            vec![self.dofs.len() as u64 - n_fixed, n_fixed, changed as u64]
        });
        let totals = broadcast(comm, tags::DOF_TOTALS, totals)?;
        let [n_free, n_fixed, changed] = totals[..] else {
            return Err(FemError::BufferSizeMismatch {
                neighbor: coord,
                expected: 3,
                got: totals.len(),
            });
        };
        self.n_free = n_free as usize;
        self.n_fixed = n_fixed as usize;
        self.numbered_fixed = self.dofs.iter().map(|d| d.fixed).collect();
        self.indexed = true;
        comm.barrier();
        log::debug!(
            "rank {}: {} free / {} fixed DOFs in total",
            self.rank,
            self.n_free,
            self.n_fixed
        );
        Ok(changed != 0)
    }

    /// Collective: propagate new Dirichlet values after the boundary conditions
    /// were re-applied (e.g. for a new time). Numbering is recomputed the same
    /// way as [`compute_indices`](Self::compute_indices); the return value
    /// tells whether the fixed set changed and the solver graph is stale.
    pub fn sync_dirichlet_values<C: Communicator>(&mut self, comm: &C) -> Result<bool, FemError> {
        self.compute_indices(comm)
    }

    fn merge_reports(
        &mut self,
        reports: &[Vec<WireDofState>],
        coord: usize,
    ) -> Result<Vec<Vec<WireDofState>>, FemError> {
        for d in &mut self.dofs {
            d.free();
        }
        // lowest rank wins on conflicting values
        for rep in reports {
            for s in rep {
                let h = *self
                    .lookup
                    .get(&s.id())
                    .ok_or(FemError::MissingDof { id: s.id(), rank: coord })?;
                if !self.dofs[h].fixed {
                    self.dofs[h].fix(s.value());
                }
            }
        }
        let (mut n_free, mut n_fixed) = (0, 0);
        for d in &mut self.dofs {
            if d.fixed {
                d.index = n_fixed;
                n_fixed += 1;
            } else {
                d.index = n_free;
                n_free += 1;
            }
        }
        self.rank_ids
            .iter()
            .enumerate()
            .map(|(r, ids)| {
                if r == coord {
                    return Ok(Vec::new());
                }
                ids.iter()
                    .map(|&id| {
                        let h = *self
                            .lookup
                            .get(&id)
                            .ok_or(FemError::MissingDof { id, rank: coord })?;
                        let d = &self.dofs[h];
                        Ok(WireDofState::new(id, d.fixed, d.value, d.index))
                    })
                    .collect()
            })
            .collect()
    }

    fn apply_reply(&mut self, reply: &[WireDofState]) -> Result<(), FemError> {
        if reply.len() != self.dofs.len() {
            return Err(FemError::NnzMismatch {
                rank: self.rank,
                what: "DOF index",
                expected: self.dofs.len(),
                got: reply.len(),
            });
        }
        for (d, s) in self.dofs.iter_mut().zip(reply) {
            if d.id != s.id() {
                return Err(FemError::MissingDof {
                    id: s.id(),
                    rank: self.rank,
                });
            }
            d.fixed = s.fixed();
            d.value = s.value();
            d.index = s.index();
        }
        Ok(())
    }

    // ----- queries --------------------------------------------------------

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn len(&self) -> usize {
        self.dofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dofs.is_empty()
    }

    pub fn is_created(&self) -> bool {
        self.layout.is_some()
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn layout(&self) -> Option<&DofLayout> {
        self.layout.as_ref()
    }

    pub fn scheme(&self) -> &DofIdScheme {
        &self.scheme
    }

    pub fn dofs(&self) -> &[Dof] {
        &self.dofs
    }

    pub fn dof(&self, h: DofHandle) -> &Dof {
        &self.dofs[h]
    }

    pub(crate) fn dofs_mut(&mut self) -> &mut [Dof] {
        &mut self.dofs
    }

    /// Global number of free DOFs.
    pub fn n_free(&self) -> usize {
        self.n_free
    }

    /// Global number of fixed DOFs.
    pub fn n_fixed(&self) -> usize {
        self.n_fixed
    }

    /// Handle of the DOF with global id `id`, if this rank holds it.
    pub fn handle_of(&self, id: u64) -> Option<DofHandle> {
        self.lookup.get(&id).copied()
    }

    /// Like [`handle_of`](Self::handle_of) but a missing id is an error.
    pub fn dof_by_id(&self, id: u64) -> Result<DofHandle, FemError> {
        self.handle_of(id).ok_or(FemError::MissingDof {
            id,
            rank: self.rank,
        })
    }

    /// Handle of sub-index `k` of type `dof_type` on `entity`.
    pub fn find(
        &self,
        cat: EntityCategory,
        entity: EntityId,
        dof_type: usize,
        k: usize,
    ) -> Option<DofHandle> {
        let layout = self.layout.as_ref()?;
        if layout.slots(cat) == 0 || dof_type >= layout.n_types() || k >= layout.multiplicity(cat)
        {
            return None;
        }
        let h = self.handle_of(self.scheme.id(cat, entity, layout.slot(cat, dof_type, k)))?;
        let d = &self.dofs[h];
        (d.category == cat && d.entity == entity).then_some(h)
    }
}
