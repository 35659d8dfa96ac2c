//! Read-only configuration snapshot of one DOF manager.

use serde::{Deserialize, Serialize};

use crate::fem_error::FemError;
use crate::solver::linear::LinearSolverKind;

/// Residual ratio above which an iteration counts as diverged.
pub const DEFAULT_DIVERGENCE_BOUND: f64 = 1.0e12;

/// Configuration of a [`DofManager`](crate::dof_manager::DofManager).
///
/// Built once with the `with_*` methods and never mutated afterwards; every
/// component of the manager reads from the same snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    block_integration_order: u32,
    sideset_integration_order: u32,
    enforce_linear: bool,
    linear_solver: LinearSolverKind,
    divergence_bound: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            block_integration_order: 2,
            sideset_integration_order: 2,
            enforce_linear: false,
            linear_solver: LinearSolverKind::DirectLu,
            divergence_bound: DEFAULT_DIVERGENCE_BOUND,
        }
    }
}

impl Parameters {
    pub fn with_block_integration_order(mut self, order: u32) -> Self {
        self.block_integration_order = order;
        self
    }

    pub fn with_sideset_integration_order(mut self, order: u32) -> Self {
        self.sideset_integration_order = order;
        self
    }

    /// Only corner nodes carry node DOFs; the other nodes of higher-order
    /// elements are interpolated linearly.
    pub fn with_enforced_linear(mut self, enforce: bool) -> Self {
        self.enforce_linear = enforce;
        self
    }

    pub fn with_linear_solver(mut self, kind: LinearSolverKind) -> Self {
        self.linear_solver = kind;
        self
    }

    pub fn with_divergence_bound(mut self, bound: f64) -> Self {
        self.divergence_bound = bound;
        self
    }

    pub fn block_integration_order(&self) -> u32 {
        self.block_integration_order
    }

    pub fn sideset_integration_order(&self) -> u32 {
        self.sideset_integration_order
    }

    pub fn enforce_linear(&self) -> bool {
        self.enforce_linear
    }

    pub fn linear_solver(&self) -> &LinearSolverKind {
        &self.linear_solver
    }

    pub fn divergence_bound(&self) -> f64 {
        self.divergence_bound
    }

    /// Parse a JSON document; missing keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, FemError> {
        let p: Parameters = serde_json::from_str(text)?;
        if !(p.divergence_bound > 0.0) {
            return Err(FemError::InvalidConfiguration(format!(
                "divergence bound must be positive, got {}",
                p.divergence_bound
            )));
        }
        Ok(p)
    }
}
