mod util;
use dof_sieve::prelude::*;
use nalgebra::DMatrix;
use util::*;

/// Two quadratic bars: corners 0, 1, 2 at x = 0, 1, 2 and mid nodes 3, 4.
fn quadratic_bar(ranks: usize) -> Mesh {
    let second = ranks - 1;
    let mut m = Mesh::new();
    m.add_node(0, 0, [0.0, 0.0, 0.0]);
    m.add_node(1, 0, [1.0, 0.0, 0.0]);
    m.add_node(2, second, [2.0, 0.0, 0.0]);
    m.add_node(3, 0, [0.5, 0.0, 0.0]);
    m.add_node(4, second, [1.5, 0.0, 0.0]);
    m.add_element(Element::new(0, 0, 1, ElementKind::Line3, vec![0, 1, 3]))
        .unwrap();
    m.add_element(Element::new(1, second, 2, ElementKind::Line3, vec![1, 2, 4]))
        .unwrap();
    m.add_bearing(10, 0).unwrap();
    m.add_bearing(11, 2).unwrap();
    m
}

#[test]
fn enforced_linear_interpolates_mid_nodes() {
    let expected = [1.0, 0.5, 0.0, 0.75, 0.25];
    for ranks in [1, 2] {
        let full = quadratic_bar(ranks);
        let out = run_ranks(ranks, |comm| {
            let params = Parameters::default().with_enforced_linear(true);
            let mut m = manager(&full, comm, Laplace1d::direct(&[1, 2]), params);
            bind_ends(&mut m, 1.0, 0.0);
            m.compute_jacobian_and_rhs().unwrap();
            m.solve().unwrap();
            let ids: Vec<u64> = m.dofs().dofs().iter().map(|d| d.entity).collect();
            (ids, m.dofs().n_free(), node_values(&m, "u"))
        });
        let coord_nodes = &out[0].0;
        assert_eq!(coord_nodes, &vec![0, 1, 2]);
        for (_, n_free, values) in &out {
            assert_eq!(*n_free, 1);
            for &(node, v) in values {
                assert_close(v, expected[node as usize]);
            }
        }
    }
}

#[test]
fn without_enforced_linear_mid_nodes_carry_dofs() {
    let full = quadratic_bar(1);
    let mut m = manager(&full, NoComm, Laplace1d::direct(&[1, 2]), Parameters::default());
    assert!(matches!(
        m.initialize(),
        Err(FemError::ElementDofCountMismatch {
            expected: 2,
            got: 3,
            ..
        })
    ));

    let mut m = manager(&full, NoComm, Quadratic, Parameters::default());
    m.initialize().unwrap();
    assert_eq!(m.dofs().len(), 5);
}

/// Accepts whatever the DOF table yields; assembles nothing.
struct Quadratic;

impl Equation for Quadratic {
    fn selected_blocks(&self) -> Vec<GroupId> {
        vec![1, 2]
    }
    fn dof_fields(&self) -> Vec<String> {
        vec!["u".into()]
    }
    fn dofs_per_node(&self, _: GroupId) -> Vec<usize> {
        vec![0]
    }
    fn compute_jacobian(&mut self, _: &ElementContext<'_>, _: &mut DMatrix<f64>) {}
    fn compute_rhs(&mut self, _: &ElementContext<'_>, _: &mut DMatrix<f64>) {}
}

/// Lumped L2 projection of `du/dx` onto the nodes.
struct Gradient;

impl Equation for Gradient {
    fn name(&self) -> &str {
        "gradient"
    }
    fn selected_blocks(&self) -> Vec<GroupId> {
        vec![1, 2]
    }
    fn dof_fields(&self) -> Vec<String> {
        vec!["q".into()]
    }
    fn dofs_per_node(&self, _: GroupId) -> Vec<usize> {
        vec![0]
    }
    fn compute_jacobian(&mut self, ctx: &ElementContext<'_>, jac: &mut DMatrix<f64>) {
        let x = ctx.node_coords().unwrap();
        let h = (x[1][0] - x[0][0]).abs();
        jac[(0, 0)] = 0.5 * h;
        jac[(1, 1)] = 0.5 * h;
    }
    fn compute_rhs(&mut self, ctx: &ElementContext<'_>, rhs: &mut DMatrix<f64>) {
        let nodes = ctx.unit.nodes();
        let u0 = ctx.mesh.field_value("u", nodes[0], 0).unwrap();
        let u1 = ctx.mesh.field_value("u", nodes[1], 0).unwrap();
        rhs[(0, 0)] = 0.5 * (u1 - u0);
        rhs[(1, 0)] = 0.5 * (u1 - u0);
    }
}

#[test]
fn projector_resolves_after_every_primary_solve() {
    for ranks in [1, 2] {
        let full = scenario_mesh(ranks);
        let out = run_ranks(ranks, |comm| {
            let mut m = manager(&full, comm, Laplace1d::direct(&[1, 2]), Parameters::default());
            bind_ends(&mut m, 1.0, 0.0);
            let p = m
                .create_projector(Box::new(Gradient), Parameters::default())
                .unwrap();
            assert_eq!(m.projector(p).unwrap().state(), ManagerState::EquationBound);

            m.compute_jacobian_and_rhs().unwrap();
            m.solve().unwrap();
            let first = node_values(&m, "q");

            m.set_time(1.0).unwrap();
            m.compute_jacobian_and_rhs().unwrap();
            m.solve().unwrap();
            assert_eq!(m.projector(p).unwrap().state(), ManagerState::Ready);
            (first, node_values(&m, "q"))
        });
        for (first, second) in out {
            for (_, q) in first.into_iter().chain(second) {
                assert_close(q, -1.0 / 3.0);
            }
        }
    }
}

#[test]
fn collect_then_distribute_moves_owned_values() {
    let full = scenario_mesh(2);
    let out = run_ranks(2, |comm| {
        let rank = comm.rank();
        let mut m = manager(&full, comm, Laplace1d::direct(&[1, 2]), Parameters::default());
        m.initialize().unwrap();
        if rank == 1 {
            // node 3 is owned by rank 1; node 2 is only a ghost here
            let mut mesh = m.mesh().write();
            mesh.set_field_value("u", 3, 0, 7.0).unwrap();
            mesh.set_field_value("u", 2, 0, -1.0).unwrap();
        }
        m.collect_fields().unwrap();
        let collected = node_values(&m, "u");
        m.distribute_fields().unwrap();
        (collected, node_values(&m, "u"))
    });
    let (coord_collected, _) = &out[0];
    assert_eq!(coord_collected[3], (3, 7.0));
    assert_eq!(coord_collected[2], (2, 0.0));
    let (_, worker) = &out[1];
    assert!(worker.contains(&(3, 7.0)));
    assert!(worker.contains(&(2, 0.0)));
}
