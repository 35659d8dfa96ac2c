mod util;
use dof_sieve::prelude::*;
use util::*;

#[derive(Debug)]
struct Outcome {
    rank: usize,
    ids: Vec<(u64, u64)>,
    n_free: usize,
    n_fixed: usize,
    values: Vec<(u64, f64)>,
    free_edges: Option<Vec<(u64, u64)>>,
    ratio: f64,
}

fn run_scenario(ranks: usize) -> Vec<Outcome> {
    let full = scenario_mesh(ranks);
    run_ranks(ranks, |comm| {
        let rank = comm.rank();
        let mut m = manager(&full, comm, Laplace1d::direct(&[1, 2]), Parameters::default());
        bind_ends(&mut m, 1.0, 0.0);
        m.compute_jacobian_and_rhs().unwrap();
        let ratio = m.solve().unwrap();

        let dofs = m.dofs();
        let free_edges = m.solver().system().map(|sys| {
            let mut id_of = vec![0; dofs.n_free()];
            for d in dofs.dofs().iter().filter(|d| !d.fixed) {
                id_of[d.index] = d.id;
            }
            let mut edges = Vec::new();
            for (i, row) in sys.jacobian.row_iter().enumerate() {
                for &j in row.col_indices().iter().filter(|&&j| j != i) {
                    edges.push((id_of[i], id_of[j]));
                }
            }
            edges
        });
        Outcome {
            rank,
            ids: dofs.dofs().iter().map(|d| (d.entity, d.id)).collect(),
            n_free: dofs.n_free(),
            n_fixed: dofs.n_fixed(),
            values: node_values(&m, "u"),
            free_edges,
            ratio,
        }
    })
}

fn check(ranks: usize) {
    let exact = [1.0, 2.0 / 3.0, 1.0 / 3.0, 0.0];
    let out = run_scenario(ranks);
    assert_eq!(out.len(), ranks);
    for o in &out {
        assert_eq!((o.n_free, o.n_fixed), (2, 2), "rank {}", o.rank);
        for &(node, v) in &o.values {
            assert_close(v, exact[node as usize]);
        }
        assert_eq!(o.ratio, out[0].ratio);
        assert!(o.ratio < 1e-12);
    }
    let coord = &out[0];
    assert_eq!(coord.ids, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    assert_eq!(coord.free_edges, Some(vec![(1, 2), (2, 1)]));
    for o in &out[1..] {
        assert!(o.free_edges.is_none());
    }
}

#[test]
fn four_node_chain_on_one_rank() {
    check(1);
}

#[test]
fn four_node_chain_on_two_ranks() {
    check(2);
}

#[test]
fn four_node_chain_on_three_ranks() {
    check(3);
}

#[test]
fn serial_manager_without_threads() {
    let full = scenario_mesh(1);
    let mut m = manager(&full, NoComm, Laplace1d::direct(&[1, 2]), Parameters::default());
    bind_ends(&mut m, 1.0, 0.0);
    assert_eq!(m.state(), ManagerState::EquationBound);
    m.compute_jacobian_and_rhs().unwrap();
    assert_eq!(m.state(), ManagerState::Ready);
    m.solve().unwrap();
    let u: Vec<f64> = node_values(&m, "u").into_iter().map(|(_, v)| v).collect();
    assert_close(u[1], 2.0 / 3.0);
    assert_close(u[2], 1.0 / 3.0);

    let sys = m.solver().system().unwrap();
    assert_eq!(sys.dirichlet.nrows(), 2);
    assert_eq!(sys.dirichlet.ncols(), 2);
    // -K_free,fixed: node 1 couples to node 0, node 2 to node 3
    let dense = nalgebra::DMatrix::from(&sys.dirichlet);
    assert_close(dense[(0, 0)], 1.0);
    assert_close(dense[(1, 1)], 1.0);
}
