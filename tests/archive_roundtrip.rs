mod util;
use dof_sieve::prelude::*;
use util::*;

fn assembled(ranks: usize) -> Vec<Vec<u8>> {
    let full = scenario_mesh(ranks);
    run_ranks(ranks, |comm| {
        let mut m = manager(&full, comm, Laplace1d::direct(&[1, 2]), Parameters::default());
        bind_ends(&mut m, 1.0, 0.0);
        m.compute_jacobian_and_rhs().unwrap();
        let mut buf = Vec::new();
        m.save_system(&mut buf).unwrap();
        buf
    })
}

#[test]
fn only_the_coordinator_writes() {
    let out = assembled(2);
    let text = String::from_utf8(out[0].clone()).unwrap();
    for section in ["Matrix", "Dirichlet", "LHS", "RHS", "SurfaceLoads", "VolumeLoads"] {
        assert!(text.contains(section), "missing {section}");
    }
    assert!(out[1].is_empty());
}

#[test]
fn loaded_system_solves_without_assembly() {
    let saved = assembled(2);
    let full = scenario_mesh(2);
    let out = run_ranks(2, |comm| {
        let rank = comm.rank();
        let mut m = manager(&full, comm, Laplace1d::direct(&[1, 2]), Parameters::default());
        bind_ends(&mut m, 1.0, 0.0);
        m.initialize().unwrap();
        m.load_system(&saved[rank][..]).unwrap();
        m.solve().unwrap();
        node_values(&m, "u")
    });
    let exact = [1.0, 2.0 / 3.0, 1.0 / 3.0, 0.0];
    for values in out {
        for (node, v) in values {
            assert_close(v, exact[node as usize]);
        }
    }
}

#[test]
fn system_from_another_mesh_is_rejected() {
    let saved = assembled(1).remove(0);
    let longer = chain_mesh(&[(0, 1), (0, 1), (0, 1), (0, 2)]);
    let mut m = manager(&longer, NoComm, Laplace1d::direct(&[1, 2]), Parameters::default());
    m.initialize().unwrap();
    assert!(matches!(
        m.load_system(&saved[..]),
        Err(FemError::PatternMismatch(_))
    ));
}

#[test]
fn load_requires_an_initialized_manager() {
    let saved = assembled(1).remove(0);
    let full = scenario_mesh(1);
    let mut m = manager(&full, NoComm, Laplace1d::direct(&[1, 2]), Parameters::default());
    assert!(matches!(
        m.load_system(&saved[..]),
        Err(FemError::NotInitialized(_))
    ));
}
