//! Linear solvers for the assembled free×free system.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

use crate::fem_error::FemError;

/// Which [`LinearSolver`] the coordinator uses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LinearSolverKind {
    /// Dense LU factorization; for small and moderate systems.
    DirectLu,
    /// Jacobi-preconditioned conjugate gradients; symmetric positive definite
    /// systems only.
    ConjugateGradient { tolerance: f64, max_iterations: usize },
}

impl LinearSolverKind {
    pub fn build(&self) -> Box<dyn LinearSolver> {
        match *self {
            LinearSolverKind::DirectLu => Box::new(DirectLu),
            LinearSolverKind::ConjugateGradient {
                tolerance,
                max_iterations,
            } => Box::new(ConjugateGradient {
                tolerance,
                max_iterations,
            }),
        }
    }
}

pub trait LinearSolver {
    /// Solve `a · x = b`.
    fn solve(&self, a: &CsrMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, FemError>;
}

/// `y = a · x`
pub fn spmv(a: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let mut y = DVector::zeros(a.nrows());
    for (i, row) in a.row_iter().enumerate() {
        y[i] = row
            .col_indices()
            .iter()
            .zip(row.values())
            .map(|(&j, &v)| v * x[j])
            .sum();
    }
    y
}

#[derive(Copy, Clone, Debug, Default)]
pub struct DirectLu;

impl LinearSolver for DirectLu {
    fn solve(&self, a: &CsrMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, FemError> {
        let n = a.nrows();
        if n == 0 {
            return Ok(DVector::zeros(0));
        }
        let dense = DMatrix::from(a);
        dense
            .lu()
            .solve(b)
            .ok_or(FemError::SingularSystem { size: n })
    }
}

#[derive(Copy, Clone, Debug)]
pub struct ConjugateGradient {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl LinearSolver for ConjugateGradient {
    fn solve(&self, a: &CsrMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, FemError> {
        let n = a.nrows();
        let mut inv_diag = DVector::from_element(n, 1.0);
        for (i, row) in a.row_iter().enumerate() {
            if let Some(k) = row.col_indices().iter().position(|&j| j == i) {
                let d = row.values()[k];
                if d == 0.0 {
                    return Err(FemError::SingularSystem { size: n });
                }
                inv_diag[i] = 1.0 / d;
            }
        }

        let b_norm = b.norm();
        let mut x = DVector::zeros(n);
        if b_norm == 0.0 {
            return Ok(x);
        }
        let mut r = b.clone();
        let mut z = r.component_mul(&inv_diag);
        let mut p = z.clone();
        let mut rz = r.dot(&z);
        for _ in 0..self.max_iterations {
            let ap = spmv(a, &p);
            let pap = p.dot(&ap);
            if pap == 0.0 || !pap.is_finite() {
                return Err(FemError::SingularSystem { size: n });
            }
            let alpha = rz / pap;
            x.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &ap, 1.0);
            if r.norm() <= self.tolerance * b_norm {
                return Ok(x);
            }
            z = r.component_mul(&inv_diag);
            let rz_next = r.dot(&z);
            p = &z + (rz_next / rz) * &p;
            rz = rz_next;
        }
        Err(FemError::SolverDidNotConverge {
            iterations: self.max_iterations,
            residual: r.norm() / b_norm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    fn tridiag(n: usize) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for i in 0..n {
            coo.push(i, i, 2.0);
            if i > 0 {
                coo.push(i, i - 1, -1.0);
            }
            if i + 1 < n {
                coo.push(i, i + 1, -1.0);
            }
        }
        CsrMatrix::from(&coo)
    }

    #[test]
    fn lu_and_cg_agree() {
        let a = tridiag(6);
        let b = DVector::from_fn(6, |i, _| i as f64 + 1.0);
        let x_lu = DirectLu.solve(&a, &b).unwrap();
        let x_cg = ConjugateGradient {
            tolerance: 1e-12,
            max_iterations: 100,
        }
        .solve(&a, &b)
        .unwrap();
        assert!((&x_lu - &x_cg).norm() < 1e-9);
        assert!((spmv(&a, &x_lu) - b).norm() < 1e-10);
    }

    #[test]
    fn singular_matrix_is_reported() {
        let coo = CooMatrix::<f64>::new(2, 2);
        let a = CsrMatrix::from(&coo);
        let b = DVector::from_element(2, 1.0);
        assert!(matches!(
            DirectLu.solve(&a, &b),
            Err(FemError::SingularSystem { size: 2 })
        ));
    }

    #[test]
    fn cg_iteration_limit() {
        let a = tridiag(20);
        let b = DVector::from_element(20, 1.0);
        let r = ConjugateGradient {
            tolerance: 1e-14,
            max_iterations: 2,
        }
        .solve(&a, &b);
        assert!(matches!(r, Err(FemError::SolverDidNotConverge { iterations: 2, .. })));
    }

    #[test]
    fn empty_system() {
        let a = CsrMatrix::<f64>::zeros(0, 0);
        let x = DirectLu.solve(&a, &DVector::zeros(0)).unwrap();
        assert_eq!(x.len(), 0);
    }
}
