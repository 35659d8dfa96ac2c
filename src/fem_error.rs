//! FemError: unified error type for dof-sieve public APIs.
//!
//! Every failure in this crate is fatal for the run that produced it; nothing is
//! retried. The variants fall in four groups:
//! configuration/precondition violations, data-consistency violations between
//! ranks, numerical failures of the solve, and persistence errors.

use crate::topology::entity::EntityCategory;
use thiserror::Error;

/// Unified error type for dof-sieve operations.
#[derive(Debug, Error)]
pub enum FemError {
    // ----- configuration / precondition -----------------------------------
    /// An operation needs an equation but none has been bound.
    #[error("no equation bound to the DOF manager")]
    EquationNotSet,
    /// The solver structures were used before `initialize` ran.
    #[error("DOF manager is not initialized: {0}")]
    NotInitialized(&'static str),
    /// More cooperating ranks than the visibility bit set can represent.
    #[error("{ranks} ranks exceed the rank bit set capacity of {capacity}")]
    RankCapacityExceeded { ranks: usize, capacity: usize },
    /// More DOF slots on one entity than the type bit set can represent.
    #[error("{category} entities carry {slots} DOF slots, type bit set capacity is {capacity}")]
    TypeCapacityExceeded {
        category: EntityCategory,
        slots: usize,
        capacity: usize,
    },
    /// Multiple right-hand-side columns are not supported together with edge DOFs.
    #[error("equation requests {cols} right-hand-side columns but declares edge DOFs")]
    RhsColumnsWithEdgeDofs { cols: usize },
    /// A DOF type was declared on two different entity categories.
    #[error("DOF type {dof_type} is declared on both {first} and {second} entities")]
    FieldCategoryConflict {
        dof_type: usize,
        first: EntityCategory,
        second: EntityCategory,
    },
    /// The equation and the DOF table disagree on the element DOF count.
    #[error("group {group}: equation expects {expected} DOFs per element, DOF table yields {got}")]
    ElementDofCountMismatch {
        group: u32,
        expected: usize,
        got: usize,
    },
    /// A DOF type index outside the declared field list.
    #[error("DOF type {dof_type} is not declared by the equation ({count} DOF fields)")]
    UnknownDofType { dof_type: usize, count: usize },
    /// Any other inconsistent configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ----- data consistency -----------------------------------------------
    /// A rank's contribution does not match the coordinator's nonzero table.
    #[error("rank {rank}: {what} payload has {got} entries, expected {expected}")]
    NnzMismatch {
        rank: usize,
        what: &'static str,
        expected: usize,
        got: usize,
    },
    /// Received a message whose byte length is inconsistent with its header.
    #[error("buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    /// Communication failure with a peer.
    #[error("communication error with rank {neighbor}: {message}")]
    CommError { neighbor: usize, message: String },
    /// A DOF index lies outside the valid range.
    #[error("DOF index {index} out of bounds (len {len})")]
    DofIndexOutOfBounds { index: usize, len: usize },
    /// A DOF id was referenced on a rank that never received it.
    #[error("DOF {id} does not exist on rank {rank}")]
    MissingDof { id: u64, rank: usize },
    /// A mesh entity id is not present in this rank's mesh view.
    #[error("{category} entity {id} is not present in the mesh")]
    MissingEntity { category: EntityCategory, id: u64 },
    /// A field label is not known to the mesh.
    #[error("field `{0}` does not exist")]
    MissingField(String),
    /// A sparsity pattern could not be built or does not match stored data.
    #[error("sparsity pattern error: {0}")]
    PatternMismatch(String),

    // ----- numerical ------------------------------------------------------
    /// The residual vanished on the very first iteration.
    #[error("residual is exactly zero on the first iteration; check boundary conditions and loads")]
    ZeroResidual,
    /// The residual exceeded the divergence bound.
    #[error(
        "iteration {iteration} diverged with residual {residual:e}; check boundary conditions, \
         mesh quality, solver and preconditioner choice, timestep and relaxation factor"
    )]
    Divergence { iteration: usize, residual: f64 },
    /// The residual is NaN or infinite.
    #[error(
        "iteration {iteration} produced a non-finite residual; check boundary conditions, \
         mesh quality, solver and preconditioner choice, timestep and relaxation factor"
    )]
    NonFiniteResidual { iteration: usize },
    /// The linear system could not be factorized.
    #[error("linear system with {size} unknowns is singular")]
    SingularSystem { size: usize },
    /// The iterative linear solver hit its iteration limit.
    #[error("linear solver did not converge after {iterations} iterations (residual {residual:e})")]
    SolverDidNotConverge { iterations: usize, residual: f64 },
    /// The coordinating rank failed and reported it to this rank.
    #[error("coordinating rank reported failure (code {code})")]
    RemoteFailure { code: u32 },

    // ----- persistence ----------------------------------------------------
    /// A stored system is malformed or does not fit the current graph.
    #[error("archive error: {0}")]
    Archive(String),
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FemError {
    /// True for configuration and precondition violations.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FemError::EquationNotSet
                | FemError::NotInitialized(_)
                | FemError::RankCapacityExceeded { .. }
                | FemError::TypeCapacityExceeded { .. }
                | FemError::RhsColumnsWithEdgeDofs { .. }
                | FemError::FieldCategoryConflict { .. }
                | FemError::ElementDofCountMismatch { .. }
                | FemError::UnknownDofType { .. }
                | FemError::InvalidConfiguration(_)
        )
    }

    /// True for failures of the numerical solve.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            FemError::ZeroResidual
                | FemError::Divergence { .. }
                | FemError::NonFiniteResidual { .. }
                | FemError::SingularSystem { .. }
                | FemError::SolverDidNotConverge { .. }
        )
    }

    /// Status code broadcast to worker ranks when the coordinator fails.
    pub(crate) fn status_code(&self) -> u32 {
        match self {
            FemError::ZeroResidual => 10,
            FemError::Divergence { .. } => 11,
            FemError::NonFiniteResidual { .. } => 12,
            FemError::SingularSystem { .. } => 13,
            FemError::SolverDidNotConverge { .. } => 14,
            FemError::NnzMismatch { .. } => 20,
            _ => 1,
        }
    }
}

impl From<serde_json::Error> for FemError {
    fn from(e: serde_json::Error) -> Self {
        FemError::Archive(e.to_string())
    }
}
