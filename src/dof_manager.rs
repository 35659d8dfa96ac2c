//! `DofManager`: one equation on one rank's mesh view.
//!
//! A manager moves through three states:
//!
//! ```text
//! Uninitialized --set_equation--> EquationBound --initialize--> Ready
//!       ^                                                         |
//!       +------------------------- reset -------------------------+
//! ```
//!
//! `initialize` runs lazily on the first compute call. Every collective
//! operation must be called by all ranks in the same order.
//!
//! A manager may own projectors: subordinate managers on the same mesh that
//! post-process the primary solution (e.g. an L2 recovery of a flux). They
//! initialize on first use and re-solve after every primary solve.

use std::io::{Read, Write};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;

use crate::algs::communicator::Communicator;
use crate::algs::exchange::coordinator_phase;
use crate::dof::{DofData, DofLayout, Parameters};
use crate::equation::Equation;
use crate::fem_error::FemError;
use crate::field_data::FieldData;
use crate::groups::{BearingData, BlockData, BoundaryCondition, DofTarget, SideSetData};
use crate::solver::{AssemblyInput, AssemblyTarget, SolverData, SystemArchive};
use crate::topology::entity::{EntityCategory, GroupId};
use crate::topology::mesh::Mesh;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    EquationBound,
    Ready,
}

pub struct DofManager<C: Communicator> {
    mesh: Arc<RwLock<Mesh>>,
    comm: Arc<C>,
    params: Parameters,
    state: ManagerState,
    equation: Option<Box<dyn Equation>>,
    time: f64,
    dofs: DofData,
    blocks: BlockData,
    sidesets: SideSetData,
    bearings: BearingData,
    fields: FieldData,
    solver: SolverData,
    projectors: Vec<DofManager<C>>,
}

impl<C: Communicator> std::fmt::Debug for DofManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DofManager")
            .field("rank", &self.comm.rank())
            .field("state", &self.state)
            .field("equation", &self.equation.as_ref().map(|e| e.name().to_string()))
            .field("time", &self.time)
            .field("dofs", &self.dofs.len())
            .field("projectors", &self.projectors.len())
            .finish()
    }
}

impl<C: Communicator> DofManager<C> {
    pub fn new(mesh: Arc<RwLock<Mesh>>, comm: Arc<C>, params: Parameters) -> Self {
        Self {
            mesh,
            comm,
            params,
            state: ManagerState::Uninitialized,
            equation: None,
            time: 0.0,
            dofs: DofData::new(),
            blocks: BlockData::default(),
            sidesets: SideSetData::default(),
            bearings: BearingData::default(),
            fields: FieldData::new(),
            solver: SolverData::new(),
            projectors: Vec::new(),
        }
    }

    // ----- lifecycle ------------------------------------------------------

    /// Drop the equation, all DOFs, groups, solver structures and
    /// projectors. Safe in every state.
    pub fn reset(&mut self) {
        self.equation = None;
        self.dofs.reset();
        self.blocks = BlockData::default();
        self.sidesets = SideSetData::default();
        self.bearings = BearingData::default();
        self.fields.reset();
        self.solver.reset();
        self.projectors.clear();
        self.state = ManagerState::Uninitialized;
    }

    /// Reset, then bind `eq` and build its groups on this rank.
    pub fn set_equation(&mut self, eq: Box<dyn Equation>) -> Result<(), FemError> {
        self.reset();
        let rank = self.comm.rank();
        {
            let mesh = self.mesh.read();
            self.blocks = BlockData::new(&mesh, eq.as_ref(), rank);
            self.sidesets = SideSetData::new(&mesh, eq.as_ref(), rank)?;
            self.bearings = BearingData::new(&mesh, eq.as_ref(), self.comm.is_coordinator());
        }
        debug!(
            "rank {rank}: `{}` bound with {} blocks, {} sidesets, {} bearings",
            eq.name(),
            self.blocks.len(),
            self.sidesets.len(),
            self.bearings.len()
        );
        self.equation = Some(eq);
        self.state = ManagerState::EquationBound;
        Ok(())
    }

    /// Boundary conditions bound after `initialize` take effect at the next
    /// [`set_time`](Self::set_time).
    pub fn bind_block_bc(&mut self, block: GroupId, bc: BoundaryCondition) -> Result<bool, FemError> {
        self.require_equation()?;
        Ok(self.blocks.bind_bc(block, bc))
    }

    pub fn bind_sideset_bc(
        &mut self,
        sideset: GroupId,
        bc: BoundaryCondition,
    ) -> Result<bool, FemError> {
        self.require_equation()?;
        Ok(self.sidesets.bind_bc(sideset, bc))
    }

    /// Bearings live on the coordinator; worker ranks return `Ok(false)`.
    pub fn bind_bearing_bc(
        &mut self,
        bearing: GroupId,
        bc: BoundaryCondition,
    ) -> Result<bool, FemError> {
        self.require_equation()?;
        Ok(self.bearings.bind_bc(bearing, bc))
    }

    /// Collective: create fields and DOFs, apply the Dirichlet conditions at
    /// the current time, number the DOFs and build the solver graph.
    pub fn initialize(&mut self) -> Result<(), FemError> {
        let comm = Arc::clone(&self.comm);
        let eq = self.equation.as_deref().ok_or(FemError::EquationNotSet)?;
        let linear = self.params.enforce_linear();
        {
            let mesh = self.mesh.read();
            self.dofs.create_dofs(&*comm, &mesh, eq, &self.params)?;
        }
        {
            let mut mesh = self.mesh.write();
            let layout = self
                .dofs
                .layout()
                .ok_or(FemError::NotInitialized("DOFs have not been created"))?;
            create_fields(&mut mesh, eq, layout)?;
        }
        {
            let mesh = self.mesh.read();
            self.blocks.link_dofs(&mesh, &self.dofs, eq, linear)?;
            self.sidesets.link_dofs(&mesh, &self.dofs, eq, linear)?;
            self.bearings.link_dofs(&self.dofs);
        }
        self.check_bearings()?;
        {
            let mesh = self.mesh.read();
            let targets = self.dirichlet_targets(&mesh)?;
            self.dofs.apply_dirichlet(&targets)?;
        }
        self.dofs.compute_indices(&*comm)?;
        {
            let mesh = self.mesh.read();
            self.fields.initialize(&*comm, &mesh)?;
        }
        self.solver.build_graph(
            &*comm,
            &mut self.dofs,
            &self.blocks,
            &self.sidesets,
            eq.num_rhs_cols(),
        )?;
        self.state = ManagerState::Ready;
        if comm.is_coordinator() {
            info!(
                "`{}` initialized: {} free and {} fixed DOFs on {} ranks",
                eq.name(),
                self.dofs.n_free(),
                self.dofs.n_fixed(),
                comm.size()
            );
        }
        Ok(())
    }

    /// Collective: move to time `t`, re-evaluate the Dirichlet conditions
    /// and renumber if the fixed set changed.
    pub fn set_time(&mut self, t: f64) -> Result<(), FemError> {
        self.time = t;
        if self.state != ManagerState::Ready {
            return Ok(());
        }
        let comm = Arc::clone(&self.comm);
        self.check_bearings()?;
        {
            let mesh = self.mesh.read();
            let targets = self.dirichlet_targets(&mesh)?;
            self.dofs.apply_dirichlet(&targets)?;
        }
        if self.dofs.sync_dirichlet_values(&*comm)? {
            debug!("rank {}: fixed set changed at t = {t}, rebuilding graph", comm.rank());
            let eq = self.equation.as_deref().ok_or(FemError::EquationNotSet)?;
            self.solver.build_graph(
                &*comm,
                &mut self.dofs,
                &self.blocks,
                &self.sidesets,
                eq.num_rhs_cols(),
            )?;
        }
        for p in &mut self.projectors {
            p.set_time(t)?;
        }
        Ok(())
    }

    // ----- assembly and solve ---------------------------------------------

    /// Collective.
    pub fn compute_jacobian(&mut self) -> Result<(), FemError> {
        self.assemble(AssemblyTarget::Jacobian)
    }

    /// Collective.
    pub fn compute_rhs(&mut self) -> Result<(), FemError> {
        self.assemble(AssemblyTarget::Rhs)
    }

    /// Collective.
    pub fn compute_jacobian_and_rhs(&mut self) -> Result<(), FemError> {
        self.assemble(AssemblyTarget::Both)
    }

    fn assemble(&mut self, target: AssemblyTarget) -> Result<(), FemError> {
        self.ensure_ready()?;
        let eq = self
            .equation
            .as_deref_mut()
            .ok_or(FemError::EquationNotSet)?;
        {
            let mesh = self.mesh.read();
            let input = AssemblyInput {
                mesh: &mesh,
                dofs: &self.dofs,
                blocks: &self.blocks,
                sidesets: &self.sidesets,
                bearings: &self.bearings,
                params: &self.params,
                time: self.time,
            };
            self.solver.assemble(input, eq, target)?;
        }
        self.solver.collect(&*self.comm, target)
    }

    /// Collective: solve on the coordinator, distribute the DOF fields and
    /// re-solve every projector. Returns the residual ratio, identical on
    /// every rank.
    pub fn solve(&mut self) -> Result<f64, FemError> {
        self.ensure_ready()?;
        let eq = self.equation.as_deref().ok_or(FemError::EquationNotSet)?;
        let ratio = {
            let mut mesh = self.mesh.write();
            self.solver
                .solve(&*self.comm, &mut mesh, &self.dofs, eq, &self.params)?
        };
        self.distribute(&eq.dof_fields())?;
        for p in &mut self.projectors {
            p.compute_jacobian_and_rhs()?;
            p.solve()?;
        }
        Ok(ratio)
    }

    /// Collective: owners send every field of the equation to the
    /// coordinator.
    pub fn collect_fields(&mut self) -> Result<(), FemError> {
        self.ensure_ready()?;
        let labels = self.labels()?;
        let mut mesh = self.mesh.write();
        self.fields.collect(&*self.comm, &mut mesh, &labels)
    }

    /// Collective: the coordinator sends every field of the equation to the
    /// ranks that see it.
    pub fn distribute_fields(&mut self) -> Result<(), FemError> {
        self.ensure_ready()?;
        let labels = self.labels()?;
        self.distribute(&labels)
    }

    fn distribute(&self, labels: &[String]) -> Result<(), FemError> {
        let mut mesh = self.mesh.write();
        self.fields.distribute(
            &*self.comm,
            &mut mesh,
            labels,
            self.params.enforce_linear(),
        )
    }

    // ----- projectors -----------------------------------------------------

    /// Attach a projector solving `eq` on the same mesh. Returns its index.
    pub fn create_projector(
        &mut self,
        eq: Box<dyn Equation>,
        params: Parameters,
    ) -> Result<usize, FemError> {
        self.require_equation()?;
        let mut p = DofManager::new(Arc::clone(&self.mesh), Arc::clone(&self.comm), params);
        p.set_equation(eq)?;
        p.time = self.time;
        self.projectors.push(p);
        Ok(self.projectors.len() - 1)
    }

    pub fn projector(&self, i: usize) -> Option<&DofManager<C>> {
        self.projectors.get(i)
    }

    pub fn projector_mut(&mut self, i: usize) -> Option<&mut DofManager<C>> {
        self.projectors.get_mut(i)
    }

    // ----- persistence ----------------------------------------------------

    /// Write the assembled system. A no-op on ranks other than the
    /// coordinator.
    pub fn save_system<W: Write>(&self, writer: W) -> Result<(), FemError> {
        self.require_ready()?;
        match self.solver.system() {
            Some(sys) => SystemArchive::of(sys).save(writer),
            None => {
                debug!("rank {}: save_system skipped, no global system here", self.comm.rank());
                Ok(())
            }
        }
    }

    /// Restore the values of a system saved with the same graph. A no-op on
    /// ranks other than the coordinator.
    pub fn load_system<R: Read>(&mut self, reader: R) -> Result<(), FemError> {
        self.require_ready()?;
        match self.solver.system_mut() {
            Some(sys) => SystemArchive::load(reader)?.restore(sys),
            None => {
                debug!("rank {}: load_system skipped, no global system here", self.comm.rank());
                Ok(())
            }
        }
    }

    // ----- queries --------------------------------------------------------

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn mesh(&self) -> &Arc<RwLock<Mesh>> {
        &self.mesh
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn equation(&self) -> Option<&dyn Equation> {
        self.equation.as_deref()
    }

    pub fn dofs(&self) -> &DofData {
        &self.dofs
    }

    pub fn blocks(&self) -> &BlockData {
        &self.blocks
    }

    pub fn sidesets(&self) -> &SideSetData {
        &self.sidesets
    }

    pub fn bearings(&self) -> &BearingData {
        &self.bearings
    }

    pub fn solver(&self) -> &SolverData {
        &self.solver
    }

    // ----- helpers --------------------------------------------------------

    fn require_equation(&self) -> Result<(), FemError> {
        match self.state {
            ManagerState::Uninitialized => Err(FemError::EquationNotSet),
            _ => Ok(()),
        }
    }

    fn require_ready(&self) -> Result<(), FemError> {
        match self.state {
            ManagerState::Ready => Ok(()),
            ManagerState::EquationBound => Err(FemError::NotInitialized("call initialize first")),
            ManagerState::Uninitialized => Err(FemError::EquationNotSet),
        }
    }

    fn ensure_ready(&mut self) -> Result<(), FemError> {
        match self.state {
            ManagerState::Ready => Ok(()),
            ManagerState::EquationBound => self.initialize(),
            ManagerState::Uninitialized => Err(FemError::EquationNotSet),
        }
    }

    fn labels(&self) -> Result<Vec<String>, FemError> {
        self.equation
            .as_deref()
            .map(|e| e.all_fields())
            .ok_or(FemError::EquationNotSet)
    }

    /// Collective: the coordinator validates the bearings it placed.
    fn check_bearings(&self) -> Result<(), FemError> {
        coordinator_phase(&*self.comm, || self.bearings.check(&self.dofs)).map(|_| ())
    }

    fn dirichlet_targets(&self, mesh: &Mesh) -> Result<Vec<DofTarget>, FemError> {
        let layout = self
            .dofs
            .layout()
            .ok_or(FemError::NotInitialized("DOFs have not been created"))?;
        let linear = self.params.enforce_linear();
        let mut targets = self.blocks.dirichlet_targets(mesh, layout, self.time, linear);
        targets.extend(self.sidesets.dirichlet_targets(mesh, layout, self.time, linear));
        targets.extend(self.bearings.dirichlet_targets(layout, self.time));
        Ok(targets)
    }
}

/// One field per DOF type on the type's category, one node field per flux.
fn create_fields(mesh: &mut Mesh, eq: &dyn Equation, layout: &DofLayout) -> Result<(), FemError> {
    for (t, label) in eq.dof_fields().iter().enumerate() {
        let cat = layout.type_category(t).unwrap_or(EntityCategory::Node);
        mesh.create_field(label, cat, layout.multiplicity(cat))?;
    }
    for label in eq.flux_fields() {
        mesh.create_field(&label, EntityCategory::Node, 1)?;
    }
    Ok(())
}
