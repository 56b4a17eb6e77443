//! Matrix-free GMRES
//!
//! Solves `A·x = b` using only matrix-vector products supplied by a
//! [`MatrixFreeProblem`]. The Krylov basis is orthogonalized with modified
//! Gram-Schmidt and the Hessenberg least-squares problem is reduced with
//! incremental Givens rotations, so the residual norm is known at every
//! iteration without forming the solution.

use log::trace;
use nalgebra::{DMatrix, DVector};

use crate::common::error::check_dimension;
use crate::common::{NmpcError, NmpcResult};

/// Default absolute tolerance on the GMRES residual estimate
pub const DEFAULT_GMRES_TOLERANCE: f64 = 1e-10;

/// Relative size of `h_{k+1,k}` below which the Arnoldi process is considered broken down
const BREAKDOWN_RATIO: f64 = 1e-12;

/// Linear system given only through its right-hand side and matrix action
pub trait MatrixFreeProblem {
    /// Dimension of the unknown
    fn dim(&self) -> usize;

    /// Writes the right-hand side `b`. Called once per solve, before any `apply`.
    fn rhs(&mut self, b: &mut DVector<f64>);

    /// Writes `A·direction` into `product`
    fn apply(&mut self, direction: &DVector<f64>, product: &mut DVector<f64>);
}

/// Outcome of one GMRES solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GmresReport {
    /// Arnoldi vectors actually used in the solution
    pub iterations: usize,
    /// `‖b − A·x₀‖` for the initial guess `x₀`
    pub initial_residual_norm: f64,
    /// Residual estimate `‖b − A·x‖` after the solve
    pub residual_norm: f64,
    /// Tolerance reached or Krylov space exhausted (lucky breakdown)
    pub converged: bool,
}

impl GmresReport {
    /// Achieved residual reduction `‖r‖ / ‖r₀‖` (zero for a zero initial residual)
    pub fn reduction(&self) -> f64 {
        if self.initial_residual_norm > 0.0 {
            self.residual_norm / self.initial_residual_norm
        } else {
            0.0
        }
    }
}

/// Restart-free GMRES with a workspace sized once at construction
#[derive(Debug, Clone)]
pub struct MatrixFreeGmres {
    dim: usize,
    kmax: usize,
    tolerance: f64,
    basis: Vec<DVector<f64>>,
    hessenberg: DMatrix<f64>,
    givens_c: DVector<f64>,
    givens_s: DVector<f64>,
    g: DVector<f64>,
    y: DVector<f64>,
    product: DVector<f64>,
}

impl MatrixFreeGmres {
    /// `kmax` larger than `dim` is clamped, the Krylov space cannot grow further
    pub fn new(dim: usize, kmax: usize) -> Self {
        let kmax = kmax.min(dim);
        MatrixFreeGmres {
            dim,
            kmax,
            tolerance: DEFAULT_GMRES_TOLERANCE,
            basis: vec![DVector::zeros(dim); kmax + 1],
            hessenberg: DMatrix::zeros(kmax + 1, kmax),
            givens_c: DVector::zeros(kmax),
            givens_s: DVector::zeros(kmax),
            g: DVector::zeros(kmax + 1),
            y: DVector::zeros(kmax),
            product: DVector::zeros(dim),
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn kmax(&self) -> usize {
        self.kmax
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Improves `solution` (used as the initial guess) towards `A·x = b`.
    ///
    /// The correction added to `solution` minimizes `‖b − A·x‖` over the
    /// Krylov subspace that was built.
    pub fn solve<P: MatrixFreeProblem>(
        &mut self,
        problem: &mut P,
        solution: &mut DVector<f64>,
    ) -> NmpcResult<GmresReport> {
        check_dimension("GMRES problem", self.dim, problem.dim())?;
        check_dimension("GMRES solution", self.dim, solution.len())?;

        self.hessenberg.fill(0.0);
        self.g.fill(0.0);

        // r0 = b - A x0
        problem.rhs(&mut self.basis[0]);
        if solution.iter().any(|&v| v != 0.0) {
            problem.apply(solution, &mut self.product);
            self.basis[0] -= &self.product;
        }
        let beta = self.basis[0].norm();
        if !beta.is_finite() {
            return Err(NmpcError::NumericalError(format!(
                "initial GMRES residual is not finite ({})",
                beta
            )));
        }
        if beta <= f64::MIN_POSITIVE {
            return Ok(GmresReport {
                iterations: 0,
                initial_residual_norm: beta,
                residual_norm: beta,
                converged: true,
            });
        }
        self.basis[0] /= beta;
        self.g[0] = beta;

        let mut k = 0;
        let mut residual = beta;
        let mut converged = false;
        while k < self.kmax {
            let (done, rest) = self.basis.split_at_mut(k + 1);
            let w = &mut rest[0];
            problem.apply(&done[k], w);
            let w_norm = w.norm();

            // Modified Gram-Schmidt
            for (j, v) in done.iter().enumerate() {
                let h = w.dot(v);
                self.hessenberg[(j, k)] = h;
                w.axpy(-h, v, 1.0);
            }
            let h_next = w.norm();
            self.hessenberg[(k + 1, k)] = h_next;
            let breakdown = !(h_next > BREAKDOWN_RATIO * w_norm);
            if !breakdown {
                *w /= h_next;
            }

            for j in 0..k {
                let (c, s) = (self.givens_c[j], self.givens_s[j]);
                let top = self.hessenberg[(j, k)];
                let bottom = self.hessenberg[(j + 1, k)];
                self.hessenberg[(j, k)] = c * top + s * bottom;
                self.hessenberg[(j + 1, k)] = -s * top + c * bottom;
            }

            let diag = self.hessenberg[(k, k)];
            let sub = self.hessenberg[(k + 1, k)];
            let nu = diag.hypot(sub);
            if !nu.is_finite() {
                return Err(NmpcError::NumericalError(format!(
                    "non-finite Hessenberg entry at GMRES iteration {}",
                    k
                )));
            }
            if nu == 0.0 {
                // A·v_k has no component outside the previous basis and none along v_k
                trace!("GMRES stopped at singular column {}", k);
                break;
            }
            let (c, s) = (diag / nu, sub / nu);
            self.givens_c[k] = c;
            self.givens_s[k] = s;
            self.hessenberg[(k, k)] = nu;
            self.hessenberg[(k + 1, k)] = 0.0;
            self.g[k + 1] = -s * self.g[k];
            self.g[k] *= c;

            k += 1;
            residual = self.g[k].abs();
            trace!("GMRES iteration {}: residual {:e}", k, residual);

            if residual <= self.tolerance || breakdown {
                converged = true;
                break;
            }
        }

        // Back-substitution on the triangularized Hessenberg matrix
        for i in (0..k).rev() {
            let mut acc = self.g[i];
            for j in (i + 1)..k {
                acc -= self.hessenberg[(i, j)] * self.y[j];
            }
            self.y[i] = acc / self.hessenberg[(i, i)];
        }
        for j in 0..k {
            solution.axpy(self.y[j], &self.basis[j], 1.0);
        }

        Ok(GmresReport {
            iterations: k,
            initial_residual_norm: beta,
            residual_norm: residual,
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    struct DenseProblem {
        a: DMatrix<f64>,
        b: DVector<f64>,
        products: usize,
    }

    impl DenseProblem {
        fn new(a: DMatrix<f64>, b: DVector<f64>) -> Self {
            DenseProblem { a, b, products: 0 }
        }
    }

    impl MatrixFreeProblem for DenseProblem {
        fn dim(&self) -> usize {
            self.b.len()
        }

        fn rhs(&mut self, b: &mut DVector<f64>) {
            b.copy_from(&self.b);
        }

        fn apply(&mut self, direction: &DVector<f64>, product: &mut DVector<f64>) {
            self.products += 1;
            product.copy_from(&(&self.a * direction));
        }
    }

    fn nonsymmetric_matrix() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            4,
            4,
            &[
                4.0, 1.0, 0.0, 0.5, //
                -1.0, 3.0, 0.2, 0.0, //
                0.0, 0.3, 5.0, -1.0, //
                0.4, 0.0, 1.0, 2.0,
            ],
        )
    }

    #[test]
    fn test_single_iteration_for_eigenvector_rhs() {
        let a = DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 3.0, 4.0]));
        let b = DVector::from_vec(vec![3.0, 0.0, 0.0]);
        let mut problem = DenseProblem::new(a.clone(), b.clone());
        let mut gmres = MatrixFreeGmres::new(3, 3);
        let mut x = DVector::zeros(3);

        let report = gmres.solve(&mut problem, &mut x).unwrap();

        assert_eq!(report.iterations, 1);
        assert!(report.converged);
        assert_relative_eq!(x[0], 1.5, epsilon = 1e-12);
        let ax = &a * &x;
        for i in 0..3 {
            assert_relative_eq!(ax[i], b[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_full_krylov_space_solves_exactly() {
        let a = nonsymmetric_matrix();
        let b = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0]);
        let expected = a.clone().lu().solve(&b).unwrap();

        let mut problem = DenseProblem::new(a, b);
        let mut gmres = MatrixFreeGmres::new(4, 4).with_tolerance(0.0);
        let mut x = DVector::zeros(4);
        let report = gmres.solve(&mut problem, &mut x).unwrap();

        assert!(report.iterations <= 4);
        assert!(report.residual_norm < 1e-10);
        for i in 0..4 {
            assert_relative_eq!(x[i], expected[i], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_truncated_krylov_space_reports_true_residual() {
        let a = nonsymmetric_matrix();
        let b = DVector::from_vec(vec![1.0, 1.0, 1.0, 1.0]);
        let mut problem = DenseProblem::new(a.clone(), b.clone());
        let mut gmres = MatrixFreeGmres::new(4, 2).with_tolerance(0.0);
        let mut x = DVector::zeros(4);

        let report = gmres.solve(&mut problem, &mut x).unwrap();

        assert_eq!(report.iterations, 2);
        assert!(!report.converged);
        assert!(report.reduction() < 1.0);
        let true_residual = (&b - &a * &x).norm();
        assert_relative_eq!(report.residual_norm, true_residual, epsilon = 1e-10);
        assert_relative_eq!(report.initial_residual_norm, b.norm(), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_rhs_returns_zero_direction() {
        let mut problem = DenseProblem::new(nonsymmetric_matrix(), DVector::zeros(4));
        let mut gmres = MatrixFreeGmres::new(4, 4);
        let mut x = DVector::zeros(4);

        let report = gmres.solve(&mut problem, &mut x).unwrap();

        assert_eq!(report.iterations, 0);
        assert_eq!(problem.products, 0);
        assert!(x.iter().all(|&v| v == 0.0));
        assert_eq!(report.reduction(), 0.0);
    }

    #[test]
    fn test_exact_warm_start_is_kept() {
        let a = nonsymmetric_matrix();
        let expected = DVector::from_vec(vec![0.5, -1.0, 2.0, 1.0]);
        let b = &a * &expected;
        let mut problem = DenseProblem::new(a, b);
        let mut gmres = MatrixFreeGmres::new(4, 4);
        let mut x = expected.clone();

        let report = gmres.solve(&mut problem, &mut x).unwrap();

        assert!(report.iterations <= 1);
        for i in 0..4 {
            assert_relative_eq!(x[i], expected[i], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_random_diagonally_dominant_system() {
        let n = 20;
        let mut rng = StdRng::seed_from_u64(7);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut a = DMatrix::from_fn(n, n, |_, _| 0.1 * normal.sample(&mut rng));
        for i in 0..n {
            a[(i, i)] += 5.0;
        }
        let b = DVector::from_fn(n, |_, _| normal.sample(&mut rng));

        let mut problem = DenseProblem::new(a.clone(), b.clone());
        let mut gmres = MatrixFreeGmres::new(n, n).with_tolerance(1e-12);
        let mut x = DVector::zeros(n);
        let report = gmres.solve(&mut problem, &mut x).unwrap();

        assert!(report.converged);
        assert!((&b - &a * &x).norm() < 1e-9);
    }

    #[test]
    fn test_kmax_is_clamped_to_dimension() {
        let gmres = MatrixFreeGmres::new(3, 10);
        assert_eq!(gmres.kmax(), 3);
        assert_eq!(MatrixFreeGmres::new(0, 5).kmax(), 0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut problem = DenseProblem::new(nonsymmetric_matrix(), DVector::zeros(4));
        let mut gmres = MatrixFreeGmres::new(3, 3);
        let mut x = DVector::zeros(3);
        let err = gmres.solve(&mut problem, &mut x).unwrap_err();
        assert!(matches!(err, NmpcError::DimensionMismatch { expected: 3, actual: 4, .. }));
    }
}
