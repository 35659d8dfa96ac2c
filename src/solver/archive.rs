//! JSON archive of an assembled system.
//!
//! The archive mirrors [`GlobalSystem`]: the Jacobian in CSR form, the
//! current solution (`LHS`), the right-hand side and both load vectors.
//! Loading requires the stored pattern to match the pattern of the current
//! graph exactly; only values are restored.

use std::io::{Read, Write};

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

use crate::fem_error::FemError;
use crate::solver::solver_data::GlobalSystem;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CsrArchive {
    pub nrows: usize,
    pub ncols: usize,
    pub offsets: Vec<usize>,
    pub cols: Vec<usize>,
    pub values: Vec<f64>,
}

impl CsrArchive {
    fn of(m: &CsrMatrix<f64>) -> Self {
        Self {
            nrows: m.nrows(),
            ncols: m.ncols(),
            offsets: m.row_offsets().to_vec(),
            cols: m.col_indices().to_vec(),
            values: m.values().to_vec(),
        }
    }

    fn restore_into(&self, m: &mut CsrMatrix<f64>, section: &str) -> Result<(), FemError> {
        if self.values.len() != self.cols.len() {
            return Err(FemError::Archive(format!(
                "{section}: {} values for {} column indices",
                self.values.len(),
                self.cols.len()
            )));
        }
        if self.nrows != m.nrows()
            || self.ncols != m.ncols()
            || self.offsets != m.row_offsets()
            || self.cols != m.col_indices()
        {
            return Err(FemError::PatternMismatch(format!(
                "{section}: stored {}x{} pattern with {} nonzeros does not match the current \
                 {}x{} pattern with {} nonzeros",
                self.nrows,
                self.ncols,
                self.cols.len(),
                m.nrows(),
                m.ncols(),
                m.nnz()
            )));
        }
        m.values_mut().copy_from_slice(&self.values);
        Ok(())
    }
}

/// Serialized form of a [`GlobalSystem`]. Dense blocks are stored column by
/// column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemArchive {
    #[serde(rename = "Matrix")]
    pub matrix: CsrArchive,
    #[serde(rename = "Dirichlet", default, skip_serializing_if = "Option::is_none")]
    pub dirichlet: Option<CsrArchive>,
    #[serde(rename = "LHS")]
    pub lhs: Vec<Vec<f64>>,
    #[serde(rename = "RHS")]
    pub rhs: Vec<Vec<f64>>,
    #[serde(rename = "SurfaceLoads")]
    pub surface_loads: Vec<f64>,
    #[serde(rename = "VolumeLoads")]
    pub volume_loads: Vec<f64>,
}

fn columns(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.column_iter().map(|c| c.iter().copied().collect()).collect()
}

fn restore_columns(
    m: &mut DMatrix<f64>,
    cols: &[Vec<f64>],
    section: &str,
) -> Result<(), FemError> {
    if cols.len() != m.ncols() || cols.iter().any(|c| c.len() != m.nrows()) {
        return Err(FemError::Archive(format!(
            "{section}: expected {} columns of length {}",
            m.ncols(),
            m.nrows()
        )));
    }
    for (j, c) in cols.iter().enumerate() {
        m.set_column(j, &DVector::from_column_slice(c));
    }
    Ok(())
}

fn restore_vector(v: &mut DVector<f64>, data: &[f64], section: &str) -> Result<(), FemError> {
    if data.len() != v.len() {
        return Err(FemError::Archive(format!(
            "{section}: expected {} entries, got {}",
            v.len(),
            data.len()
        )));
    }
    v.copy_from_slice(data);
    Ok(())
}

impl SystemArchive {
    pub fn of(system: &GlobalSystem) -> Self {
        Self {
            matrix: CsrArchive::of(&system.jacobian),
            dirichlet: Some(CsrArchive::of(&system.dirichlet)),
            lhs: columns(&system.solution),
            rhs: columns(&system.rhs),
            surface_loads: system.surface_loads.iter().copied().collect(),
            volume_loads: system.volume_loads.iter().copied().collect(),
        }
    }

    /// Copy the stored values into `system`, whose patterns must match.
    pub fn restore(&self, system: &mut GlobalSystem) -> Result<(), FemError> {
        self.matrix.restore_into(&mut system.jacobian, "Matrix")?;
        if let Some(d) = &self.dirichlet {
            d.restore_into(&mut system.dirichlet, "Dirichlet")?;
        }
        restore_columns(&mut system.solution, &self.lhs, "LHS")?;
        restore_columns(&mut system.rhs, &self.rhs, "RHS")?;
        restore_vector(&mut system.surface_loads, &self.surface_loads, "SurfaceLoads")?;
        restore_vector(&mut system.volume_loads, &self.volume_loads, "VolumeLoads")?;
        Ok(())
    }

    pub fn save<W: Write>(&self, writer: W) -> Result<(), FemError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load<R: Read>(reader: R) -> Result<Self, FemError> {
        Ok(serde_json::from_reader(reader)?)
    }
}
