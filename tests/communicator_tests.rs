use dof_sieve::algs::communicator::{CommTag, Communicator, LocalComm, Wait};
use dof_sieve::algs::{broadcast, gather_to_coordinator, scatter_from_coordinator};

#[test]
fn local_round_trip() {
    let tag = CommTag(0x1000);
    let world = LocalComm::world(2);

    let msg = b"hello";
    world[0].isend(1, tag.as_u16(), msg);
    let got = world[1].irecv(0, tag.as_u16(), msg.len()).wait().unwrap();
    assert_eq!(&got, msg);
}

#[test]
fn local_fifo_order() {
    let tag = CommTag(0x1001);
    let world = LocalComm::world(2);

    for i in 0..10u8 {
        world[0].isend(1, tag.as_u16(), &[i]);
    }
    let out: Vec<u8> = (0..10)
        .map(|_| world[1].irecv(0, tag.as_u16(), 1).wait().unwrap()[0])
        .collect();
    assert_eq!(out, (0u8..10u8).collect::<Vec<_>>());
}

#[test]
fn received_message_is_whole() {
    let tag = CommTag(0x1002);
    let world = LocalComm::world(2);

    world[0].isend(1, tag.as_u16(), &[1, 2, 3, 4, 5, 6]);
    let got = world[1].irecv(0, tag.as_u16(), 4).wait().unwrap();
    assert_eq!(got, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn collectives_over_threads() {
    let tag = CommTag(0x2000);
    let world = LocalComm::world(4);
    let results: Vec<(Option<Vec<Vec<u64>>>, Vec<u64>, Vec<u64>)> = std::thread::scope(|s| {
        let handles: Vec<_> = world
            .iter()
            .map(|c| {
                s.spawn(move || {
                    let r = c.rank() as u64;
                    let gathered = gather_to_coordinator(c, tag, vec![r; c.rank()]).unwrap();
                    let per_rank = c
                        .is_coordinator()
                        .then(|| (0..4u64).map(|k| vec![10 * k]).collect());
                    let mine = scatter_from_coordinator(c, tag.offset(1), per_rank).unwrap();
                    let all = broadcast(c, tag.offset(2), c.is_coordinator().then(|| vec![7u64, 8]))
                        .unwrap();
                    (gathered, mine, all)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let gathered = results[0].0.as_ref().unwrap();
    assert_eq!(gathered, &vec![vec![], vec![1], vec![2, 2], vec![3, 3, 3]]);
    for (r, (g, mine, all)) in results.iter().enumerate() {
        assert_eq!(g.is_some(), r == 0);
        assert_eq!(mine, &vec![10 * r as u64]);
        assert_eq!(all, &vec![7, 8]);
    }
}
