mod util;
use dof_sieve::prelude::*;
use util::*;

fn iterate(ranks: usize, eq: Laplace1d, steps: usize) -> Vec<Vec<f64>> {
    let full = scenario_mesh(ranks);
    run_ranks(ranks, |comm| {
        let mut m = manager(&full, comm, eq.clone(), Parameters::default());
        bind_ends(&mut m, 1.0, 0.0);
        (0..steps)
            .map(|_| {
                m.compute_jacobian_and_rhs().unwrap();
                m.solve().unwrap()
            })
            .collect()
    })
}

#[test]
fn newton_converges_in_one_step_on_a_linear_problem() {
    for ranks in [1, 2] {
        let out = iterate(ranks, Laplace1d::iterative(&[1, 2], Algorithm::NewtonRaphson, 1.0), 2);
        for ratios in &out {
            assert_eq!(ratios, &out[0]);
            assert_close(ratios[0], 1.0);
            assert!(ratios[1] < 1e-12, "{ratios:?}");
        }
    }
}

#[test]
fn relaxed_newton_halves_the_residual() {
    let out = iterate(2, Laplace1d::iterative(&[1, 2], Algorithm::NewtonRaphson, 0.5), 5);
    let ratios = &out[0];
    for w in ratios.windows(2) {
        assert!(w[1] < w[0], "{ratios:?}");
        assert_close(w[1], 0.5 * w[0]);
    }
}

#[test]
fn picard_blends_with_the_previous_iterate() {
    let out = iterate(1, Laplace1d::iterative(&[1, 2], Algorithm::Picard, 0.5), 3);
    assert_close(out[0][0], 0.5);
    assert_close(out[0][1], 0.25);
    assert_close(out[0][2], 0.125);
}

#[test]
fn unrelaxed_picard_solves_a_linear_problem_in_one_step() {
    for ranks in [1, 2] {
        let full = scenario_mesh(ranks);
        let out = run_ranks(ranks, |comm| {
            let eq = Laplace1d::iterative(&[1, 2], Algorithm::Picard, 1.0);
            let mut m = manager(&full, comm, eq, Parameters::default());
            bind_ends(&mut m, 1.0, 0.0);
            m.compute_jacobian_and_rhs().unwrap();
            let first = m.solve().unwrap();
            m.compute_jacobian_and_rhs().unwrap();
            let second = m.solve().unwrap();
            (first, second, node_values(&m, "u"))
        });
        for (first, second, values) in out {
            assert!(first < 1e-12, "{first}");
            assert!(second < 1e-12, "{second}");
            for (node, v) in values {
                assert_close(v, (3 - node) as f64 / 3.0);
            }
        }
    }
}

#[test]
fn zero_first_residual_fails_under_picard() {
    let full = scenario_mesh(1);
    let eq = Laplace1d::iterative(&[1, 2], Algorithm::Picard, 1.0);
    let mut m = manager(&full, NoComm, eq, Parameters::default());
    bind_ends(&mut m, 0.0, 0.0);
    m.compute_jacobian_and_rhs().unwrap();
    assert!(matches!(m.solve(), Err(FemError::ZeroResidual)));
}

#[test]
fn newton_iterates_approach_the_solution() {
    let full = scenario_mesh(1);
    let eq = Laplace1d::iterative(&[1, 2], Algorithm::NewtonRaphson, 0.5);
    let mut m = manager(&full, NoComm, eq, Parameters::default());
    bind_ends(&mut m, 1.0, 0.0);
    let mut errors = Vec::new();
    for _ in 0..4 {
        m.compute_jacobian_and_rhs().unwrap();
        m.solve().unwrap();
        let u = node_values(&m, "u");
        errors.push((u[1].1 - 2.0 / 3.0).abs());
    }
    assert_close(errors[0], 1.0 / 3.0);
    assert_close(errors[3], 1.0 / 24.0);
}

#[test]
fn fully_fixed_system_reproduces_the_prescribed_values() {
    for ranks in [1, 2, 3] {
        let full = scenario_mesh(ranks);
        let out = run_ranks(ranks, |comm| {
            let mut m = manager(&full, comm, Laplace1d::direct(&[1, 2]), Parameters::default());
            m.bind_block_bc(1, BoundaryCondition::dirichlet(0, 2.5)).unwrap();
            m.bind_block_bc(2, BoundaryCondition::dirichlet(0, 2.5)).unwrap();
            m.compute_jacobian_and_rhs().unwrap();
            m.solve().unwrap();
            (m.dofs().n_free(), node_values(&m, "u"))
        });
        for (n_free, values) in out {
            assert_eq!(n_free, 0);
            assert!(values.iter().all(|&(_, v)| v == 2.5), "{values:?}");
        }
    }
}

#[test]
fn zero_first_residual_fails_on_every_rank() {
    let full = scenario_mesh(2);
    let out = run_ranks(2, |comm| {
        let eq = Laplace1d::iterative(&[1, 2], Algorithm::NewtonRaphson, 1.0);
        let mut m = manager(&full, comm, eq, Parameters::default());
        m.bind_block_bc(1, BoundaryCondition::dirichlet(0, 1.0)).unwrap();
        m.bind_block_bc(2, BoundaryCondition::dirichlet(0, 1.0)).unwrap();
        m.compute_jacobian_and_rhs().unwrap();
        m.solve()
    });
    assert!(matches!(out[0], Err(FemError::ZeroResidual)));
    assert!(matches!(out[1], Err(FemError::RemoteFailure { code: 10 })));
}

#[test]
fn divergence_bound_is_enforced() {
    let full = scenario_mesh(1);
    let eq = Laplace1d::iterative(&[1, 2], Algorithm::NewtonRaphson, 1.0);
    let params = Parameters::default().with_divergence_bound(0.5);
    let mut m = manager(&full, NoComm, eq, params);
    bind_ends(&mut m, 1.0, 0.0);
    m.compute_jacobian_and_rhs().unwrap();
    let err = m.solve().unwrap_err();
    assert!(matches!(err, FemError::Divergence { iteration: 1, .. }));
    assert!(err.is_numerical());
}

#[test]
fn conjugate_gradient_matches_direct_lu() {
    let full = scenario_mesh(1);
    let params = Parameters::default().with_linear_solver(LinearSolverKind::ConjugateGradient {
        tolerance: 1e-12,
        max_iterations: 50,
    });
    let mut m = manager(&full, NoComm, Laplace1d::direct(&[1, 2]), params);
    bind_ends(&mut m, 1.0, 0.0);
    m.compute_jacobian_and_rhs().unwrap();
    m.solve().unwrap();
    let u = node_values(&m, "u");
    assert_close(u[1].1, 2.0 / 3.0);
    assert_close(u[2].1, 1.0 / 3.0);
}

#[test]
fn ramped_dirichlet_value_follows_time() {
    let full = scenario_mesh(2);
    let out = run_ranks(2, |comm| {
        let mut m = manager(&full, comm, Laplace1d::direct(&[1, 2]), Parameters::default());
        let ramp = BoundaryCondition::dirichlet(0, 3.0).with_scaling(TimeScaling::Ramp {
            t_start: 0.0,
            t_end: 2.0,
        });
        m.bind_bearing_bc(10, ramp).unwrap();
        m.bind_bearing_bc(11, BoundaryCondition::dirichlet(0, 0.0)).unwrap();
        let mut mids = Vec::new();
        for t in [1.0, 2.0] {
            m.set_time(t).unwrap();
            m.compute_jacobian_and_rhs().unwrap();
            m.solve().unwrap();
            mids.push(node_values(&m, "u"));
        }
        mids
    });
    for per_time in out {
        for &(node, v) in &per_time[0] {
            assert_close(v, 1.5 * (3 - node) as f64 / 3.0);
        }
        for &(node, v) in &per_time[1] {
            assert_close(v, 3.0 * (3 - node) as f64 / 3.0);
        }
    }
}

#[test]
fn source_term_and_point_load() {
    // -u'' = 1 on [0, 3], u(0) = u(3) = 0, plus a unit point load at node 1
    let mut full = scenario_mesh(1);
    full.add_bearing(12, 1).unwrap();
    let mut eq = Laplace1d::direct(&[1, 2]);
    eq.source = 1.0;
    eq.bearings.push(12);
    let mut m = manager(&full, NoComm, eq, Parameters::default());
    bind_ends(&mut m, 0.0, 0.0);
    m.bind_bearing_bc(12, BoundaryCondition::load(0, 1.0)).unwrap();
    m.compute_jacobian_and_rhs().unwrap();
    m.solve().unwrap();
    let sys = m.solver().system().unwrap();
    assert_eq!(sys.surface_loads.as_slice(), &[1.0, 0.0]);
    // K = [[2, -1], [-1, 2]], b = [1 + 1, 1]
    let u = node_values(&m, "u");
    assert_close(u[1].1, 5.0 / 3.0);
    assert_close(u[2].1, 4.0 / 3.0);
}

#[test]
fn bearing_on_a_node_its_owner_cannot_see() {
    // node 3 belongs to rank 1, but its only element is owned by rank 0
    let mut full = Mesh::new();
    for (i, owner) in [0, 0, 1, 1].into_iter().enumerate() {
        full.add_node(i as u64, owner, [i as f64, 0.0, 0.0]);
    }
    for (e, owner, block) in [(0u64, 0, 1), (1, 1, 1), (2, 0, 2)] {
        full.add_element(Element::new(e, owner, block, ElementKind::Line2, vec![e, e + 1]))
            .unwrap();
    }
    full.add_bearing(10, 0).unwrap();
    full.add_bearing(11, 3).unwrap();
    assert!(full.partition(1).unwrap().bearing_node(11).is_none());

    let out = run_ranks(2, |comm| {
        let mut m = manager(&full, comm, Laplace1d::direct(&[1, 2]), Parameters::default());
        bind_ends(&mut m, 1.0, 0.0);
        m.compute_jacobian_and_rhs().unwrap();
        m.solve().unwrap();
        (m.dofs().n_fixed(), node_values(&m, "u"))
    });
    for (n_fixed, values) in out {
        assert_eq!(n_fixed, 2);
        for (node, v) in values {
            assert_close(v, (3 - node) as f64 / 3.0);
        }
    }
}

#[test]
fn selected_bearing_missing_from_the_mesh_fails_on_every_rank() {
    let full = scenario_mesh(2);
    let out = run_ranks(2, |comm| {
        let mut eq = Laplace1d::direct(&[1, 2]);
        eq.bearings.push(99);
        let mut m = manager(&full, comm, eq, Parameters::default());
        m.initialize()
    });
    assert!(matches!(&out[0], Err(e) if e.is_configuration()));
    assert!(matches!(out[1], Err(FemError::RemoteFailure { .. })));
}
