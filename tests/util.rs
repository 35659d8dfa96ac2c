#![allow(dead_code)]
use std::sync::Arc;

use dof_sieve::prelude::*;
use nalgebra::DMatrix;
use parking_lot::RwLock;

/// Straight chain along x: node `i` at `x = i`, element `e` joins nodes `e`
/// and `e + 1`. `elements[e] = (owner, block)`; a node is owned by the owner
/// of its left element (node 0 by the first element's owner).
pub fn chain_mesh(elements: &[(usize, GroupId)]) -> Mesh {
    let mut m = Mesh::new();
    for i in 0..=elements.len() {
        let owner = elements[i.saturating_sub(1).min(elements.len() - 1)].0;
        m.add_node(i as u64, owner, [i as f64, 0.0, 0.0]);
    }
    for (e, &(owner, block)) in elements.iter().enumerate() {
        let e = e as u64;
        m.add_element(Element::new(e, owner, block, ElementKind::Line2, vec![e, e + 1]))
            .unwrap();
    }
    m
}

/// The 1-D scenario: three unit elements, block 1 = {0, 1}, block 2 = {2},
/// split over `ranks` ranks in contiguous chunks. Bearing 10 sits on node 0,
/// bearing 11 on node 3.
pub fn scenario_mesh(ranks: usize) -> Mesh {
    let owner = |e: usize| e * ranks / 3;
    let mut m = chain_mesh(&[(owner(0), 1), (owner(1), 1), (owner(2), 2)]);
    m.add_bearing(10, 0).unwrap();
    m.add_bearing(11, 3).unwrap();
    m
}

/// Bind `u(node 0) = left` and `u(node 3) = right` where the bearings live.
pub fn bind_ends<C: Communicator>(m: &mut DofManager<C>, left: f64, right: f64) {
    m.bind_bearing_bc(10, BoundaryCondition::dirichlet(0, left)).unwrap();
    m.bind_bearing_bc(11, BoundaryCondition::dirichlet(0, right)).unwrap();
}

/// The mesh view of `rank`: the coordinator holds everything.
pub fn rank_mesh(full: &Mesh, rank: usize) -> Mesh {
    if rank == 0 {
        full.clone()
    } else {
        full.partition(rank).unwrap()
    }
}

/// `-u'' = source` with linear elements and one scalar `u` per node.
#[derive(Clone, Debug)]
pub struct Laplace1d {
    pub blocks: Vec<GroupId>,
    pub bearings: Vec<GroupId>,
    pub source: f64,
    pub mode: SolverMode,
    pub algorithm: Algorithm,
    pub omega: f64,
}

impl Laplace1d {
    pub fn direct(blocks: &[GroupId]) -> Self {
        Self {
            blocks: blocks.to_vec(),
            bearings: vec![10, 11],
            source: 0.0,
            mode: SolverMode::Direct,
            algorithm: Algorithm::NewtonRaphson,
            omega: 1.0,
        }
    }

    pub fn iterative(blocks: &[GroupId], algorithm: Algorithm, omega: f64) -> Self {
        Self {
            mode: SolverMode::Iterative,
            algorithm,
            omega,
            ..Self::direct(blocks)
        }
    }
}

impl Equation for Laplace1d {
    fn name(&self) -> &str {
        "laplace-1d"
    }
    fn selected_blocks(&self) -> Vec<GroupId> {
        self.blocks.clone()
    }
    fn selected_bearings(&self) -> Vec<GroupId> {
        self.bearings.clone()
    }
    fn dof_fields(&self) -> Vec<String> {
        vec!["u".into()]
    }
    fn dofs_per_node(&self, _: GroupId) -> Vec<usize> {
        vec![0]
    }
    fn number_of_dofs_per_element(&self, _: GroupId) -> Option<usize> {
        Some(2)
    }
    fn compute_jacobian(&mut self, ctx: &ElementContext<'_>, jac: &mut DMatrix<f64>) {
        let x = ctx.node_coords().unwrap();
        let k = 1.0 / (x[1][0] - x[0][0]).abs();
        jac[(0, 0)] = k;
        jac[(1, 1)] = k;
        jac[(0, 1)] = -k;
        jac[(1, 0)] = -k;
    }
    fn compute_rhs(&mut self, ctx: &ElementContext<'_>, rhs: &mut DMatrix<f64>) {
        let x = ctx.node_coords().unwrap();
        let h = (x[1][0] - x[0][0]).abs();
        rhs[(0, 0)] = 0.5 * self.source * h;
        rhs[(1, 0)] = 0.5 * self.source * h;
    }
    fn mode(&self) -> SolverMode {
        self.mode
    }
    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
    fn omega(&self) -> f64 {
        self.omega
    }
}

/// A manager on `rank`'s view of `full` with `eq` bound.
pub fn manager<C: Communicator>(
    full: &Mesh,
    comm: C,
    eq: impl Equation + 'static,
    params: Parameters,
) -> DofManager<C> {
    let rank = comm.rank();
    let mesh = Arc::new(RwLock::new(rank_mesh(full, rank)));
    let mut m = DofManager::new(mesh, Arc::new(comm), params);
    m.set_equation(Box::new(eq)).unwrap();
    m
}

/// Run `f` once per rank of a fresh `n`-rank world, each on its own thread,
/// and return the results in rank order.
pub fn run_ranks<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(LocalComm) -> R + Sync,
{
    let comms = LocalComm::world(n);
    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                let f = &f;
                s.spawn(move || f(c))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Node values of field `label`, by node id.
pub fn node_values(m: &DofManager<impl Communicator>, label: &str) -> Vec<(u64, f64)> {
    let mesh = m.mesh().read();
    mesh.nodes()
        .iter()
        .map(|n| (n.id, mesh.field_value(label, n.id, 0).unwrap()))
        .collect()
}

pub fn assert_close(got: f64, want: f64) {
    assert!((got - want).abs() < 1e-9, "got {got}, want {want}");
}
