//! Typed point-to-point exchanges between the coordinating rank and the workers.
//!
//! Every transfer is length-prefixed: a [`WireCount`] header followed by the
//! payload, both on the same tag. The receiving side validates the payload
//! length against the header before it trusts the data.
//!
//! The coordinator never sends to itself; its own slice is handed back
//! directly.

use bytemuck::Pod;

use crate::algs::communicator::{CommTag, Communicator, Wait, tags};
use crate::algs::wire::{WireCount, WireStatus, cast_slice, cast_slice_mut};
use crate::fem_error::FemError;

/// Send `data` to `peer` with a count header.
pub fn send_slice<T, C>(comm: &C, peer: usize, tag: CommTag, data: &[T])
where
    T: Pod,
    C: Communicator,
{
    let header = WireCount::new(data.len());
    let h = comm.isend(peer, tag.as_u16(), cast_slice(std::slice::from_ref(&header)));
    let p = comm.isend(peer, tag.as_u16(), cast_slice(data));
    let _ = h.wait();
    let _ = p.wait();
}

/// Receive a count-prefixed vector from `peer`.
pub fn recv_vec<T, C>(comm: &C, peer: usize, tag: CommTag) -> Result<Vec<T>, FemError>
where
    T: Pod,
    C: Communicator,
{
    let header_len = std::mem::size_of::<WireCount>();
    let raw = comm
        .irecv(peer, tag.as_u16(), header_len)
        .wait()
        .ok_or_else(|| FemError::CommError {
            neighbor: peer,
            message: format!("no size header received on tag {:#06x}", tag.as_u16()),
        })?;
    if raw.len() != header_len {
        return Err(FemError::BufferSizeMismatch {
            neighbor: peer,
            expected: header_len,
            got: raw.len(),
        });
    }
    let mut count = WireCount::new(0);
    cast_slice_mut(std::slice::from_mut(&mut count)).copy_from_slice(&raw);
    let n = count.get();

    let expected = n * std::mem::size_of::<T>();
    let raw = comm
        .irecv(peer, tag.as_u16(), expected)
        .wait()
        .ok_or_else(|| FemError::CommError {
            neighbor: peer,
            message: format!("no payload received on tag {:#06x}", tag.as_u16()),
        })?;
    if raw.len() != expected {
        return Err(FemError::BufferSizeMismatch {
            neighbor: peer,
            expected,
            got: raw.len(),
        });
    }
    let mut out = vec![T::zeroed(); n];
    cast_slice_mut(&mut out).copy_from_slice(&raw);
    Ok(out)
}

/// Every rank contributes `local`; the coordinator receives one vector per rank
/// (its own included, in rank order), workers receive `None`.
pub fn gather_to_coordinator<T, C>(
    comm: &C,
    tag: CommTag,
    local: Vec<T>,
) -> Result<Option<Vec<Vec<T>>>, FemError>
where
    T: Pod,
    C: Communicator,
{
    let coord = comm.coordinator();
    if comm.rank() != coord {
        send_slice(comm, coord, tag, &local);
        return Ok(None);
    }
    let mut local = Some(local);
    let mut all = Vec::with_capacity(comm.size());
    for r in 0..comm.size() {
        if r == coord {
            all.push(local.take().unwrap_or_default());
        } else {
            all.push(recv_vec(comm, r, tag)?);
        }
    }
    Ok(Some(all))
}

/// The coordinator hands rank `r` the vector `per_rank[r]`; every rank returns
/// its own slice.
pub fn scatter_from_coordinator<T, C>(
    comm: &C,
    tag: CommTag,
    per_rank: Option<Vec<Vec<T>>>,
) -> Result<Vec<T>, FemError>
where
    T: Pod,
    C: Communicator,
{
    let coord = comm.coordinator();
    if comm.rank() != coord {
        return recv_vec(comm, coord, tag);
    }
    let per_rank = per_rank.ok_or_else(|| {
        FemError::InvalidConfiguration("coordinator scatter without payload".into())
    })?;
    if per_rank.len() != comm.size() {
        return Err(FemError::InvalidConfiguration(format!(
            "scatter needs {} slices, got {}",
            comm.size(),
            per_rank.len()
        )));
    }
    let mut own = Vec::new();
    for (r, slice) in per_rank.into_iter().enumerate() {
        if r == coord {
            own = slice;
        } else {
            send_slice(comm, r, tag, &slice);
        }
    }
    Ok(own)
}

/// Coordinator sends `data` to every rank; everybody returns the same vector.
pub fn broadcast<T, C>(comm: &C, tag: CommTag, data: Option<Vec<T>>) -> Result<Vec<T>, FemError>
where
    T: Pod,
    C: Communicator,
{
    let coord = comm.coordinator();
    if comm.rank() != coord {
        return recv_vec(comm, coord, tag);
    }
    let data = data.ok_or_else(|| {
        FemError::InvalidConfiguration("coordinator broadcast without payload".into())
    })?;
    for r in (0..comm.size()).filter(|&r| r != coord) {
        send_slice(comm, r, tag, &data);
    }
    Ok(data)
}

/// Broadcast the outcome of a coordinator-only phase so that workers fail
/// together with the coordinator instead of waiting forever.
///
/// Workers pass `None` and get back the coordinator's value or
/// [`FemError::RemoteFailure`].
pub fn broadcast_status<C>(
    comm: &C,
    outcome: Option<Result<f64, FemError>>,
) -> Result<f64, FemError>
where
    C: Communicator,
{
    let coord = comm.coordinator();
    if comm.rank() != coord {
        let st: Vec<WireStatus> = recv_vec(comm, coord, tags::SOLVE_STATUS)?;
        let st = st.first().ok_or_else(|| FemError::CommError {
            neighbor: coord,
            message: "empty status record".into(),
        })?;
        return match st.code() {
            0 => Ok(st.value()),
            code => Err(FemError::RemoteFailure { code }),
        };
    }
    let outcome = outcome.unwrap_or(Err(FemError::InvalidConfiguration(
        "coordinator status missing".into(),
    )));
    let record = match &outcome {
        Ok(v) => WireStatus::ok(*v),
        Err(e) => WireStatus::failed(e.status_code()),
    };
    for r in (0..comm.size()).filter(|&r| r != coord) {
        send_slice(comm, r, tags::SOLVE_STATUS, std::slice::from_ref(&record));
    }
    outcome
}

/// Run `work` on the coordinator only and let every rank learn whether it
/// succeeded. The coordinator gets `Some(result)`, workers get `None`.
pub fn coordinator_phase<T, C, F>(comm: &C, work: F) -> Result<Option<T>, FemError>
where
    C: Communicator,
    F: FnOnce() -> Result<T, FemError>,
{
    if !comm.is_coordinator() {
        broadcast_status(comm, None)?;
        return Ok(None);
    }
    match work() {
        Ok(v) => {
            broadcast_status(comm, Some(Ok(0.0)))?;
            Ok(Some(v))
        }
        Err(e) => broadcast_status(comm, Some(Err(e))).map(|_| None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, NoComm};

    #[test]
    fn gather_and_scatter_three_ranks() {
        let comms = LocalComm::world(3);
        let tag = CommTag::new(0x7000);
        std::thread::scope(|s| {
            for c in &comms {
                s.spawn(move || {
                    let mine = vec![c.rank() as u64; c.rank() + 1];
                    let all = gather_to_coordinator(c, tag, mine).unwrap();
                    let back = if let Some(all) = all {
                        assert_eq!(all.len(), 3);
                        assert_eq!(all[2], vec![2, 2, 2]);
                        Some(all.into_iter().map(|v| vec![v.len() as u64]).collect())
                    } else {
                        None
                    };
                    let own = scatter_from_coordinator(c, tag.offset(1), back).unwrap();
                    assert_eq!(own, vec![c.rank() as u64 + 1]);
                });
            }
        });
    }

    #[test]
    fn status_failure_reaches_workers() {
        let comms = LocalComm::world(2);
        std::thread::scope(|s| {
            let c0 = &comms[0];
            let c1 = &comms[1];
            s.spawn(move || {
                let r = broadcast_status(c0, Some(Err(FemError::ZeroResidual)));
                assert!(matches!(r, Err(FemError::ZeroResidual)));
            });
            s.spawn(move || {
                let r = broadcast_status(c1, None);
                assert!(matches!(r, Err(FemError::RemoteFailure { code: 10 })));
            });
        });
    }

    #[test]
    fn single_rank_collectives_are_local() {
        let c = NoComm;
        let all = gather_to_coordinator(&c, CommTag::new(1), vec![1.5f64]).unwrap();
        assert_eq!(all, Some(vec![vec![1.5]]));
        let b = broadcast(&c, CommTag::new(2), Some(vec![3u64])).unwrap();
        assert_eq!(b, vec![3]);
        let p = coordinator_phase(&c, || Ok(7usize)).unwrap();
        assert_eq!(p, Some(7));
    }

    #[test]
    fn failed_phase_fails_every_rank() {
        let comms = LocalComm::world(3);
        std::thread::scope(|s| {
            for c in &comms {
                s.spawn(move || {
                    let r: Result<Option<()>, _> =
                        coordinator_phase(c, || Err(FemError::SingularSystem { size: 4 }));
                    if c.is_coordinator() {
                        assert!(matches!(r, Err(FemError::SingularSystem { size: 4 })));
                    } else {
                        assert!(matches!(r, Err(FemError::RemoteFailure { code: 13 })));
                    }
                });
            }
        });
    }

    #[test]
    fn payload_length_is_checked() {
        let comms = LocalComm::world(2);
        // header claims 2 u64 but only 8 bytes follow
        comms[0].isend(1, 9, bytemuck::cast_slice(&[WireCount::new(2)]));
        comms[0].isend(1, 9, &[0u8; 8]);
        let r: Result<Vec<u64>, _> = recv_vec(&comms[1], 0, CommTag::new(9));
        assert!(matches!(
            r,
            Err(FemError::BufferSizeMismatch {
                expected: 16,
                got: 8,
                ..
            })
        ));
    }
}
