//! Thin façade over intra-process or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees) addressed by
//! `(source rank, destination rank, tag)`. Messages with the same address are
//! delivered in FIFO order. All handles are **waitable** but posting them never
//! blocks; callers `.wait()` before they trust that a buffer is ready.
//!
//! Besides point-to-point transfer the only synchronization primitive is
//! [`Communicator::barrier`].

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Barrier};

/// Message tag. Each exchange phase uses its own tag so that a fast producer
/// can never be confused with an earlier phase.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommTag(pub u16);

impl CommTag {
    #[inline]
    pub const fn new(raw: u16) -> Self {
        CommTag(raw)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Derive a tag `k` slots after this one.
    #[inline]
    pub const fn offset(self, k: u16) -> Self {
        CommTag(self.0.wrapping_add(k))
    }
}

/// Tags used by the DOF manager phases.
pub mod tags {
    use super::CommTag;

    pub const DOF_SCHEME: CommTag = CommTag::new(0x0100);
    pub const DOF_SLICE: CommTag = CommTag::new(0x0110);
    pub const DOF_REPORT: CommTag = CommTag::new(0x0120);
    pub const DOF_INDICES: CommTag = CommTag::new(0x0130);
    pub const DOF_TOTALS: CommTag = CommTag::new(0x0140);
    pub const GRAPH_PATTERN: CommTag = CommTag::new(0x0200);
    pub const ASSEMBLY_VALUES: CommTag = CommTag::new(0x0210);
    pub const SOLVE_STATUS: CommTag = CommTag::new(0x0220);
    pub const FIELD_ENTITIES: CommTag = CommTag::new(0x0300);
    pub const FIELD_COLLECT: CommTag = CommTag::new(0x0310);
    pub const FIELD_DISTRIBUTE: CommTag = CommTag::new(0x0320);
    pub const FIELD_CORNER: CommTag = CommTag::new(0x0330);
    pub const FIELD_PUSHBACK: CommTag = CommTag::new(0x0340);
}

/// Non-blocking communication interface (minimal by design).
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// This process' rank.
    fn rank(&self) -> usize;
    /// Number of cooperating ranks.
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive for a message of `len` bytes. The received message is
    /// returned whole by `wait`, so callers can validate its length.
    fn irecv(&self, peer: usize, tag: u16, len: usize) -> Self::RecvHandle;

    /// Block until every rank has reached the barrier.
    fn barrier(&self);

    /// The rank that makes all global numbering and merge decisions.
    #[inline]
    fn coordinator(&self) -> usize {
        0
    }

    #[inline]
    fn is_coordinator(&self) -> bool {
        self.rank() == self.coordinator()
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Compile-time no-op comm for single-rank runs and serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _len: usize) {}
    fn barrier(&self) {}
}

// --- LocalComm: intra-process, one thread per rank ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Debug)]
struct LocalWorld {
    size: usize,
    mailbox: DashMap<Key, VecDeque<Bytes>>,
    barrier: Barrier,
}

/// In-process communicator: every rank of a [`LocalComm::world`] shares one
/// mailbox, so separate worlds never observe each other's messages.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    world: Arc<LocalWorld>,
}

impl LocalComm {
    /// Create the communicators of a world with `size` ranks.
    pub fn world(size: usize) -> Vec<LocalComm> {
        let world = Arc::new(LocalWorld {
            size,
            mailbox: DashMap::new(),
            barrier: Barrier::new(size.max(1)),
        });
        (0..size)
            .map(|rank| LocalComm {
                rank,
                world: Arc::clone(&world),
            })
            .collect()
    }
}

pub struct LocalHandle {
    world: Arc<LocalWorld>,
    key: Key,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(mut queue) = self.world.mailbox.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    return Some(bytes.to_vec());
                }
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.world.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        self.world
            .mailbox
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, _len: usize) -> Self::RecvHandle {
        LocalHandle {
            world: Arc::clone(&self.world),
            key: (peer, self.rank, tag),
        }
    }

    fn barrier(&self) {
        self.world.barrier.wait();
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// Blocking MPI transport; handles complete eagerly.
    pub struct MpiComm {
        pub world: SimpleCommunicator,
        pub rank: usize,
        size: usize,
        _universe: mpi::environment::Universe,
    }

    impl MpiComm {
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }
    }

    pub struct MpiHandle(Option<Vec<u8>>);

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
            MpiHandle(None)
        }

        fn irecv(&self, peer: usize, tag: u16, _len: usize) -> MpiHandle {
            let (data, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(i32::from(tag));
            MpiHandle(Some(data))
        }

        fn barrier(&self) {
            self.world.barrier();
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
