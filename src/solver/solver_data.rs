//! Sparse system of one DOF manager: graph, assembly, collection and solve.
//!
//! Every rank assembles the elements it owns into local structures that use
//! global free/fixed indices but only carry the local pattern. The
//! coordinator unites the patterns of all ranks once per graph build and
//! keeps, for every rank, the position of each local nonzero in the global
//! structures. Collection sends plain value arrays that are added through
//! these tables.
//!
//! Rows of fixed DOFs are never stored. Element entries coupling a free row
//! to a fixed column go into the Dirichlet matrix with flipped sign, so that
//! the effective right-hand side is `rhs + D · x_fixed`.

use log::info;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use nalgebra_sparse::pattern::SparsityPattern;

use crate::algs::communicator::{CommTag, Communicator, tags};
use crate::algs::exchange::{broadcast_status, gather_to_coordinator};
use crate::algs::wire::WireAdj;
use crate::dof::{Dof, DofData, DofHandle, DofLayout, Parameters};
use crate::equation::{Algorithm, AssemblyUnit, ElementContext, Equation, SolverMode};
use crate::fem_error::FemError;
use crate::groups::{BearingData, BlockData, DofTarget, SideSetData};
use crate::solver::graph::{
    Incidence, dof_adjacency, pattern_coords, pattern_from_coords, position, position_in,
    zero_matrix,
};
use crate::solver::linear::spmv;
use crate::topology::entity::GroupId;
use crate::topology::mesh::Mesh;

/// Which element quantities an assembly pass computes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssemblyTarget {
    Jacobian,
    Rhs,
    Both,
}

impl AssemblyTarget {
    fn jacobian(self) -> bool {
        matches!(self, AssemblyTarget::Jacobian | AssemblyTarget::Both)
    }
    fn rhs(self) -> bool {
        matches!(self, AssemblyTarget::Rhs | AssemblyTarget::Both)
    }
}

/// Everything an assembly pass reads.
#[derive(Copy, Clone, Debug)]
pub struct AssemblyInput<'a> {
    pub mesh: &'a Mesh,
    pub dofs: &'a DofData,
    pub blocks: &'a BlockData,
    pub sidesets: &'a SideSetData,
    pub bearings: &'a BearingData,
    pub params: &'a Parameters,
    pub time: f64,
}

/// Position of every local nonzero of one rank in the global structures.
#[derive(Clone, Debug, Default)]
struct NnzTable {
    jacobian: Vec<usize>,
    dirichlet: Vec<usize>,
    rows: Vec<usize>,
}

/// Rank-local assembly buffers.
#[derive(Clone, Debug)]
struct LocalSystem {
    jacobian: CsrMatrix<f64>,
    dirichlet: CsrMatrix<f64>,
    /// Free indices of the rows this rank contributes to, sorted.
    rows: Vec<usize>,
    /// `rows.len() × n_cols`
    rhs: DMatrix<f64>,
    surface_loads: Vec<f64>,
    volume_loads: Vec<f64>,
}

/// The authoritative system on the coordinator.
#[derive(Clone, Debug)]
pub struct GlobalSystem {
    pub jacobian: CsrMatrix<f64>,
    pub dirichlet: CsrMatrix<f64>,
    /// `n_free × n_cols`
    pub rhs: DMatrix<f64>,
    pub surface_loads: DVector<f64>,
    pub volume_loads: DVector<f64>,
    /// Latest solution of the free DOFs, one column per right-hand side.
    pub solution: DMatrix<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct SolverData {
    n_free: usize,
    n_fixed: usize,
    n_cols: usize,
    local: Option<LocalSystem>,
    global: Option<GlobalSystem>,
    tables: Vec<NnzTable>,
    iteration: usize,
}

impl SolverData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_built(&self) -> bool {
        self.local.is_some()
    }

    /// Solve iterations since the last graph build.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Coordinator only: the assembled system.
    pub fn system(&self) -> Option<&GlobalSystem> {
        self.global.as_ref()
    }

    pub(crate) fn system_mut(&mut self) -> Option<&mut GlobalSystem> {
        self.global.as_mut()
    }

    /// Collective: build the DOF graph of this rank's units, the local
    /// patterns, and on the coordinator the global patterns and nonzero
    /// tables.
    pub fn build_graph<C: Communicator>(
        &mut self,
        comm: &C,
        dofs: &mut DofData,
        blocks: &BlockData,
        sidesets: &SideSetData,
        n_cols: usize,
    ) -> Result<(), FemError> {
        if !dofs.is_indexed() {
            return Err(FemError::NotInitialized("DOF indices have not been computed"));
        }
        self.reset();
        self.n_free = dofs.n_free();
        self.n_fixed = dofs.n_fixed();
        self.n_cols = n_cols.max(1);

        let mut lists: Vec<&[DofHandle]> = Vec::new();
        for b in blocks.iter() {
            lists.extend((0..b.len()).map(|i| b.element_dofs(i)));
        }
        for s in sidesets.iter() {
            lists.extend((0..s.len()).map(|i| s.facet_dofs(i)));
        }
        let units = Incidence::from_lists(lists);
        let adjacency = dof_adjacency(dofs.len(), &units);
        let mut in_unit = vec![false; dofs.len()];
        for u in 0..units.num_rows() {
            for &h in units.row(u) {
                in_unit[h] = true;
            }
        }

        let mut jac = Vec::new();
        let mut dir = Vec::new();
        for (h, adj) in adjacency.iter().enumerate() {
            let d = dofs.dof(h);
            if d.fixed || !in_unit[h] {
                continue;
            }
            jac.push((d.index, d.index));
            for &g in adj {
                let n = dofs.dof(g);
                if n.fixed {
                    dir.push((d.index, n.index));
                } else {
                    jac.push((d.index, n.index));
                }
            }
        }
        for (d, adj) in dofs.dofs_mut().iter_mut().zip(adjacency) {
            d.adjacency = adj;
        }

        let mut rows: Vec<usize> = dofs
            .dofs()
            .iter()
            .filter(|d| !d.fixed)
            .map(|d| d.index)
            .collect();
        rows.sort_unstable();

        let jac_p = pattern_from_coords(self.n_free, self.n_free, jac)?;
        let dir_p = pattern_from_coords(self.n_free, self.n_fixed, dir)?;
        let to_wire = |p: &SparsityPattern| -> Vec<WireAdj> {
            pattern_coords(p)
                .into_iter()
                .map(|(i, j)| WireAdj::new(i as u64, j as u64))
                .collect()
        };
        let all_jac = gather_to_coordinator(comm, tags::GRAPH_PATTERN, to_wire(&jac_p))?;
        let all_dir = gather_to_coordinator(comm, tags::GRAPH_PATTERN.offset(1), to_wire(&dir_p))?;
        let all_rows = gather_to_coordinator(
            comm,
            tags::GRAPH_PATTERN.offset(2),
            rows.iter().map(|&r| r as u64).collect(),
        )?;

        if let (Some(all_jac), Some(all_dir), Some(all_rows)) = (all_jac, all_dir, all_rows) {
            self.unite(all_jac, all_dir, all_rows)?;
        }

        self.local = Some(LocalSystem {
            jacobian: zero_matrix(jac_p)?,
            dirichlet: zero_matrix(dir_p)?,
            rhs: DMatrix::zeros(rows.len(), self.n_cols),
            surface_loads: vec![0.0; rows.len()],
            volume_loads: vec![0.0; rows.len()],
            rows,
        });
        comm.barrier();
        Ok(())
    }

    fn unite(
        &mut self,
        all_jac: Vec<Vec<WireAdj>>,
        all_dir: Vec<Vec<WireAdj>>,
        all_rows: Vec<Vec<u64>>,
    ) -> Result<(), FemError> {
        let coords = |lists: &[Vec<WireAdj>]| -> Vec<(usize, usize)> {
            lists
                .iter()
                .flatten()
                .map(|w| (w.src() as usize, w.dst() as usize))
                .collect()
        };
        let jac_p = pattern_from_coords(self.n_free, self.n_free, coords(&all_jac))?;
        let dir_p = pattern_from_coords(self.n_free, self.n_fixed, coords(&all_dir))?;

        let locate = |p: &SparsityPattern, list: &[WireAdj]| -> Result<Vec<usize>, FemError> {
            list.iter()
                .map(|w| {
                    position(p, w.src() as usize, w.dst() as usize).ok_or_else(|| {
                        FemError::PatternMismatch(format!(
                            "entry ({}, {}) missing from the global pattern",
                            w.src(),
                            w.dst()
                        ))
                    })
                })
                .collect()
        };
        self.tables = (0..all_jac.len())
            .map(|r| {
                Ok(NnzTable {
                    jacobian: locate(&jac_p, &all_jac[r])?,
                    dirichlet: locate(&dir_p, &all_dir[r])?,
                    rows: all_rows[r].iter().map(|&x| x as usize).collect(),
                })
            })
            .collect::<Result<_, FemError>>()?;

        info!(
            "solver graph: {} free, {} fixed, {} Jacobian and {} Dirichlet nonzeros",
            self.n_free,
            self.n_fixed,
            jac_p.nnz(),
            dir_p.nnz()
        );
        self.global = Some(GlobalSystem {
            jacobian: zero_matrix(jac_p)?,
            dirichlet: zero_matrix(dir_p)?,
            rhs: DMatrix::zeros(self.n_free, self.n_cols),
            surface_loads: DVector::zeros(self.n_free),
            volume_loads: DVector::zeros(self.n_free),
            solution: DMatrix::zeros(self.n_free, self.n_cols),
        });
        Ok(())
    }

    /// Local: run the equation on every owned element and facet and scatter
    /// the results. Loads are assembled together with the right-hand side.
    pub fn assemble(
        &mut self,
        input: AssemblyInput<'_>,
        eq: &mut dyn Equation,
        target: AssemblyTarget,
    ) -> Result<(), FemError> {
        let local = self
            .local
            .as_mut()
            .ok_or(FemError::NotInitialized("solver graph has not been built"))?;
        let dofs = input.dofs;
        if target.jacobian() {
            local.jacobian.values_mut().fill(0.0);
            local.dirichlet.values_mut().fill(0.0);
        }
        if target.rhs() {
            local.rhs.fill(0.0);
            local.surface_loads.fill(0.0);
            local.volume_loads.fill(0.0);
        }

        let labels = eq.dof_fields();
        let order_b = input.params.block_integration_order();
        let order_s = input.params.sideset_integration_order();
        let mut work: Vec<(AssemblyUnit<'_>, GroupId, &[DofHandle], u32)> = Vec::new();
        for b in input.blocks.iter() {
            for (i, &e) in b.elements().iter().enumerate() {
                let unit = AssemblyUnit::Element(&input.mesh.elements()[e]);
                work.push((unit, b.id(), b.element_dofs(i), order_b));
            }
        }
        for s in input.sidesets.iter() {
            for (i, &f) in s.facets().iter().enumerate() {
                let unit = AssemblyUnit::Facet(&input.mesh.facets()[f]);
                work.push((unit, s.id(), s.facet_dofs(i), order_s));
            }
        }

        let mut ids = Vec::new();
        let mut types = Vec::new();
        let mut values = Vec::new();
        for (unit, group, handles, order) in work {
            let n = handles.len();
            ids.clear();
            types.clear();
            values.clear();
            for &h in handles {
                let d = dofs.dof(h);
                ids.push(d.id);
                types.push(d.dof_type);
                values.push(dof_value(input.mesh, &labels, d)?);
            }
            let ctx = ElementContext {
                mesh: input.mesh,
                group,
                unit,
                dof_ids: &ids,
                dof_types: &types,
                dof_values: &values,
                integration_order: order,
                time: input.time,
            };
            let mut jac = DMatrix::zeros(n, n);
            let mut rhs = DMatrix::zeros(n, self.n_cols);
            match target {
                AssemblyTarget::Jacobian => eq.compute_jacobian(&ctx, &mut jac),
                AssemblyTarget::Rhs => eq.compute_rhs(&ctx, &mut rhs),
                AssemblyTarget::Both => eq.compute_jacobian_and_rhs(&ctx, &mut jac, &mut rhs),
            }
            scatter(
                local,
                dofs,
                handles,
                target.jacobian().then_some(&jac),
                target.rhs().then_some(&rhs),
            );
        }

        if target.rhs() {
            let layout = layout(dofs)?;
            let linear = input.params.enforce_linear();
            let volume = input
                .blocks
                .load_targets(input.mesh, layout, input.time, linear)?;
            add_loads(&mut local.volume_loads, &local.rows, dofs, volume)?;
            let mut surface = input
                .sidesets
                .load_targets(input.mesh, layout, input.time, linear)?;
            surface.extend(input.bearings.load_targets(layout, input.time));
            add_loads(&mut local.surface_loads, &local.rows, dofs, surface)?;
        }
        Ok(())
    }

    /// Collective: add the local values of every rank into the coordinator's
    /// system.
    pub fn collect<C: Communicator>(
        &mut self,
        comm: &C,
        target: AssemblyTarget,
    ) -> Result<(), FemError> {
        let local = self
            .local
            .as_ref()
            .ok_or(FemError::NotInitialized("solver graph has not been built"))?;
        let base = tags::ASSEMBLY_VALUES;
        let mut received: Vec<Vec<Vec<f64>>> = Vec::new();
        if target.jacobian() {
            received.push(self.gather(comm, base, local.jacobian.values())?);
            received.push(self.gather(comm, base.offset(1), local.dirichlet.values())?);
        }
        if target.rhs() {
            let row_major = local.rhs.transpose();
            received.push(self.gather(comm, base.offset(2), row_major.as_slice())?);
            received.push(self.gather(comm, base.offset(3), &local.surface_loads)?);
            received.push(self.gather(comm, base.offset(4), &local.volume_loads)?);
        }
        comm.barrier();
        if !comm.is_coordinator() {
            return Ok(());
        }

        let n_cols = self.n_cols;
        let tables = &self.tables;
        let global = self
            .global
            .as_mut()
            .ok_or(FemError::NotInitialized("coordinator system missing"))?;
        let mut parts = received.into_iter();
        if target.jacobian() {
            let jac = parts.next().unwrap_or_default();
            let dir = parts.next().unwrap_or_default();
            global.jacobian.values_mut().fill(0.0);
            global.dirichlet.values_mut().fill(0.0);
            for (r, t) in tables.iter().enumerate() {
                accumulate(global.jacobian.values_mut(), &t.jacobian, &jac[r], r, "Jacobian")?;
                accumulate(global.dirichlet.values_mut(), &t.dirichlet, &dir[r], r, "Dirichlet")?;
            }
        }
        if target.rhs() {
            let rhs = parts.next().unwrap_or_default();
            let surface = parts.next().unwrap_or_default();
            let volume = parts.next().unwrap_or_default();
            global.rhs.fill(0.0);
            global.surface_loads.fill(0.0);
            global.volume_loads.fill(0.0);
            for (r, t) in tables.iter().enumerate() {
                if rhs[r].len() != t.rows.len() * n_cols {
                    return Err(FemError::NnzMismatch {
                        rank: r,
                        what: "right-hand side",
                        expected: t.rows.len() * n_cols,
                        got: rhs[r].len(),
                    });
                }
                for (k, &row) in t.rows.iter().enumerate() {
                    for c in 0..n_cols {
                        global.rhs[(row, c)] += rhs[r][k * n_cols + c];
                    }
                }
                let (s, v) = (&surface[r], &volume[r]);
                accumulate(global.surface_loads.as_mut_slice(), &t.rows, s, r, "surface loads")?;
                accumulate(global.volume_loads.as_mut_slice(), &t.rows, v, r, "volume loads")?;
            }
        }
        Ok(())
    }

    fn gather<C: Communicator>(
        &self,
        comm: &C,
        tag: CommTag,
        values: &[f64],
    ) -> Result<Vec<Vec<f64>>, FemError> {
        Ok(gather_to_coordinator(comm, tag, values.to_vec())?.unwrap_or_default())
    }

    /// Collective: the coordinator solves (or performs one nonlinear
    /// iteration) and writes the result into its node fields; every rank
    /// returns the residual ratio or the coordinator's failure.
    pub fn solve<C: Communicator>(
        &mut self,
        comm: &C,
        mesh: &mut Mesh,
        dofs: &DofData,
        eq: &dyn Equation,
        params: &Parameters,
    ) -> Result<f64, FemError> {
        if self.local.is_none() {
            return Err(FemError::NotInitialized("solver graph has not been built"));
        }
        self.iteration += 1;
        let outcome = comm
            .is_coordinator()
            .then(|| self.solve_on_coordinator(mesh, dofs, eq, params));
        let ratio = broadcast_status(comm, outcome)?;
        comm.barrier();
        Ok(ratio)
    }

    fn solve_on_coordinator(
        &mut self,
        mesh: &mut Mesh,
        dofs: &DofData,
        eq: &dyn Equation,
        params: &Parameters,
    ) -> Result<f64, FemError> {
        let iteration = self.iteration;
        let global = self
            .global
            .as_mut()
            .ok_or(FemError::NotInitialized("coordinator system missing"))?;
        let labels = eq.dof_fields();
        let solver = params.linear_solver().build();

        let mut x_fixed = DVector::zeros(self.n_fixed);
        let mut x_free = DVector::zeros(self.n_free);
        for d in dofs.dofs() {
            if d.fixed {
                x_fixed[d.index] = d.value;
            } else {
                x_free[d.index] = dof_value(mesh, &labels, d)?;
            }
        }
        let d_x = spmv(&global.dirichlet, &x_fixed);
        let mut b = global.rhs.clone();
        for c in 0..self.n_cols {
            let mut col = b.column_mut(c);
            col += &d_x;
        }
        {
            let mut col0 = b.column_mut(0);
            col0 += &global.surface_loads;
            col0 += &global.volume_loads;
        }

        let ratio = match eq.mode() {
            SolverMode::Direct => {
                let mut worst: f64 = 0.0;
                for c in 0..self.n_cols {
                    let bc = b.column(c).into_owned();
                    let x = solver.solve(&global.jacobian, &bc)?;
                    let r = spmv(&global.jacobian, &x) - &bc;
                    worst = worst.max(residual_ratio(&r, &bc));
                    global.solution.set_column(c, &x);
                }
                check_residual(worst, iteration, params)?;
                worst
            }
            SolverMode::Iterative => {
                let b0 = b.column(0).into_owned();
                let omega = eq.omega();
                let (x_new, ratio) = match eq.algorithm() {
                    Algorithm::NewtonRaphson => {
                        let r = spmv(&global.jacobian, &x_free) - &b0;
                        let ratio = residual_ratio(&r, &b0);
                        check_first_residual(ratio, iteration)?;
                        check_residual(ratio, iteration, params)?;
                        let dx = solver.solve(&global.jacobian, &r)?;
                        (&x_free - omega * dx, ratio)
                    }
                    // the zero guard looks at the previous iterate, the
                    // reported ratio at the blended one
                    Algorithm::Picard => {
                        let r_prev = spmv(&global.jacobian, &x_free) - &b0;
                        check_first_residual(residual_ratio(&r_prev, &b0), iteration)?;
                        let x_star = solver.solve(&global.jacobian, &b0)?;
                        let x_new = omega * x_star + (1.0 - omega) * &x_free;
                        let r = spmv(&global.jacobian, &x_new) - &b0;
                        let ratio = residual_ratio(&r, &b0);
                        check_residual(ratio, iteration, params)?;
                        (x_new, ratio)
                    }
                };
                global.solution.set_column(0, &x_new);
                ratio
            }
        };
        info!("solve iteration {iteration}: residual ratio {ratio:e}");

        let solution = global.solution.column(0).into_owned();
        for d in dofs.dofs() {
            let v = if d.fixed { d.value } else { solution[d.index] };
            set_dof_value(mesh, &labels, d, v)?;
        }
        Ok(ratio)
    }

}

fn layout(dofs: &DofData) -> Result<&DofLayout, FemError> {
    dofs.layout()
        .ok_or(FemError::NotInitialized("DOFs have not been created"))
}

fn scatter(
    local: &mut LocalSystem,
    dofs: &DofData,
    handles: &[DofHandle],
    jac: Option<&DMatrix<f64>>,
    rhs: Option<&DMatrix<f64>>,
) {
    let (jac_offsets, jac_cols, jac_values) = local.jacobian.csr_data_mut();
    let (dir_offsets, dir_cols, dir_values) = local.dirichlet.csr_data_mut();
    for (a, &ha) in handles.iter().enumerate() {
        let da = dofs.dof(ha);
        if da.fixed {
            continue;
        }
        let row = da.index;
        if let Some(rhs) = rhs {
            if let Ok(k) = local.rows.binary_search(&row) {
                for c in 0..rhs.ncols().min(local.rhs.ncols()) {
                    local.rhs[(k, c)] += rhs[(a, c)];
                }
            }
        }
        let Some(jac) = jac else { continue };
        for (b, &hb) in handles.iter().enumerate() {
            let db = dofs.dof(hb);
            let v = jac[(a, b)];
            if db.fixed {
                if let Some(k) = position_in(dir_offsets, dir_cols, row, db.index) {
                    dir_values[k] -= v;
                }
            } else if let Some(k) = position_in(jac_offsets, jac_cols, row, db.index) {
                jac_values[k] += v;
            }
        }
    }
}

/// Loads on fixed DOFs are dropped.
fn add_loads(
    loads: &mut [f64],
    rows: &[usize],
    dofs: &DofData,
    targets: Vec<DofTarget>,
) -> Result<(), FemError> {
    for (cat, entity, t, v) in targets {
        let h = dofs.find(cat, entity, t, 0).ok_or_else(|| FemError::MissingDof {
            id: dofs
                .layout()
                .map_or(0, |l| dofs.scheme().id(cat, entity, l.slot(cat, t, 0))),
            rank: dofs.rank(),
        })?;
        let d = dofs.dof(h);
        if d.fixed {
            continue;
        }
        let k = rows
            .binary_search(&d.index)
            .map_err(|_| FemError::DofIndexOutOfBounds {
                index: d.index,
                len: rows.len(),
            })?;
        loads[k] += v;
    }
    Ok(())
}

/// Add `values[k]` to `global[table[k]]`.
fn accumulate(
    global: &mut [f64],
    table: &[usize],
    values: &[f64],
    rank: usize,
    what: &'static str,
) -> Result<(), FemError> {
    if values.len() != table.len() {
        return Err(FemError::NnzMismatch {
            rank,
            what,
            expected: table.len(),
            got: values.len(),
        });
    }
    for (&k, &v) in table.iter().zip(values) {
        let len = global.len();
        *global
            .get_mut(k)
            .ok_or(FemError::DofIndexOutOfBounds { index: k, len })? += v;
    }
    Ok(())
}

fn residual_ratio(r: &DVector<f64>, b: &DVector<f64>) -> f64 {
    let bn = b.norm();
    if bn == 0.0 { r.norm() } else { r.norm() / bn }
}

/// A residual of exactly zero before the first update means nothing drives
/// the system.
fn check_first_residual(ratio: f64, iteration: usize) -> Result<(), FemError> {
    if iteration == 1 && ratio == 0.0 {
        return Err(FemError::ZeroResidual);
    }
    Ok(())
}

fn check_residual(ratio: f64, iteration: usize, params: &Parameters) -> Result<(), FemError> {
    if !ratio.is_finite() {
        return Err(FemError::NonFiniteResidual { iteration });
    }
    if ratio > params.divergence_bound() {
        return Err(FemError::Divergence {
            iteration,
            residual: ratio,
        });
    }
    Ok(())
}

/// Current field value of DOF `d`.
pub(crate) fn dof_value(
    mesh: &Mesh,
    labels: &[String],
    d: &Dof,
) -> Result<f64, FemError> {
    let label = labels.get(d.field_index).ok_or(FemError::UnknownDofType {
        dof_type: d.field_index,
        count: labels.len(),
    })?;
    let f = mesh.field(label)?;
    f.values
        .get(d.entity_index * f.multiplicity + d.sub_index)
        .copied()
        .ok_or(FemError::DofIndexOutOfBounds {
            index: d.entity_index * f.multiplicity + d.sub_index,
            len: f.values.len(),
        })
}

pub(crate) fn set_dof_value(
    mesh: &mut Mesh,
    labels: &[String],
    d: &Dof,
    v: f64,
) -> Result<(), FemError> {
    let label = labels.get(d.field_index).ok_or(FemError::UnknownDofType {
        dof_type: d.field_index,
        count: labels.len(),
    })?;
    let f = mesh.field_mut(label)?;
    let k = d.entity_index * f.multiplicity + d.sub_index;
    let len = f.values.len();
    *f.values
        .get_mut(k)
        .ok_or(FemError::DofIndexOutOfBounds { index: k, len })? = v;
    Ok(())
}
