//! Message passing between cooperating ranks.

pub mod communicator;
pub mod exchange;
pub mod wire;

pub use communicator::{CommTag, Communicator, LocalComm, NoComm};
pub use exchange::{broadcast, broadcast_status, gather_to_coordinator, scatter_from_coordinator};
