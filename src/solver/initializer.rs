//! Newton-GMRES solution of the zero-horizon problem
//!
//! At the initial time the horizon length is zero, so the optimal control
//! problem collapses to `[H_u ; C](t0, x0, u, φ_x(t0, x0)) = 0`. It is
//! solved to a tolerance with Newton iterations whose linear systems are
//! solved by the matrix-free GMRES.

use log::{debug, info, warn};
use nalgebra::DVector;

use crate::common::error::{check_dimension, check_finite};
use crate::common::{NmpcError, NmpcModel, NmpcResult};
use crate::linalg::{MatrixFreeGmres, MatrixFreeProblem};
use crate::solver::config::InitParams;
use crate::solver::optimality::stage_residual;

/// Convergence summary of the initialization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitReport {
    pub iterations: usize,
    pub residual_norm: f64,
}

/// Newton-GMRES solver of the static initialization problem
#[derive(Debug, Clone)]
pub struct NewtonGmresInitializer {
    params: InitParams,
    gmres: MatrixFreeGmres,
    solution: DVector<f64>,
    update: DVector<f64>,
    lambda: DVector<f64>,
    error: DVector<f64>,
    perturbed: DVector<f64>,
    perturbed_error: DVector<f64>,
}

struct StaticProblem<'a, M: NmpcModel> {
    model: &'a M,
    time: f64,
    state: &'a [f64],
    lambda: &'a [f64],
    finite_difference_step: f64,
    solution: &'a DVector<f64>,
    error: &'a mut DVector<f64>,
    perturbed: &'a mut DVector<f64>,
    perturbed_error: &'a mut DVector<f64>,
}

impl<'a, M: NmpcModel> MatrixFreeProblem for StaticProblem<'a, M> {
    fn dim(&self) -> usize {
        self.solution.len()
    }

    fn rhs(&mut self, b: &mut DVector<f64>) {
        stage_residual(
            self.model,
            self.time,
            self.state,
            self.solution.as_slice(),
            self.lambda,
            self.error.as_mut_slice(),
        );
        b.copy_from(&*self.error);
        b.neg_mut();
    }

    fn apply(&mut self, direction: &DVector<f64>, product: &mut DVector<f64>) {
        let h = self.finite_difference_step;
        self.perturbed.copy_from(self.solution);
        self.perturbed.axpy(h, direction, 1.0);
        stage_residual(
            self.model,
            self.time,
            self.state,
            self.perturbed.as_slice(),
            self.lambda,
            self.perturbed_error.as_mut_slice(),
        );
        product.copy_from(&*self.perturbed_error);
        *product -= &*self.error;
        *product /= h;
    }
}

impl NewtonGmresInitializer {
    pub fn new<M: NmpcModel>(model: &M, params: InitParams) -> NmpcResult<Self> {
        let dim = model.dim_control_input_and_constraints();
        params.validate(dim)?;
        Ok(NewtonGmresInitializer {
            gmres: MatrixFreeGmres::new(dim, params.kmax),
            solution: DVector::from_column_slice(&params.initial_guess),
            update: DVector::zeros(dim),
            lambda: DVector::zeros(model.dim_state()),
            error: DVector::zeros(dim),
            perturbed: DVector::zeros(dim),
            perturbed_error: DVector::zeros(dim),
            params,
        })
    }

    pub fn params(&self) -> &InitParams {
        &self.params
    }

    /// Latest iterate, the converged solution after a successful `solve`
    pub fn solution(&self) -> &DVector<f64> {
        &self.solution
    }

    /// Solves the static problem at `(initial_time, initial_state)` starting
    /// from the configured guess.
    ///
    /// The solution is meant to seed `stages` identical stages, so the
    /// iteration stops once `sqrt(stages) * ‖F‖` is below the tolerance and
    /// the reported residual is that of the whole seeded horizon.
    pub fn solve<M: NmpcModel>(
        &mut self,
        model: &M,
        initial_time: f64,
        initial_state: &DVector<f64>,
        stages: usize,
    ) -> NmpcResult<InitReport> {
        check_dimension("initial state", model.dim_state(), initial_state.len())?;
        check_finite("initial state", initial_state.as_slice())?;

        self.solution.copy_from_slice(&self.params.initial_guess);
        model.terminal_cost_gradient(
            initial_time,
            initial_state.as_slice(),
            self.lambda.as_mut_slice(),
        );

        let scale = (stages.max(1) as f64).sqrt();
        let tolerance = self.params.residual_tolerance;
        let mut residual_norm = scale * self.residual_norm(model, initial_time, initial_state);
        let mut iterations = 0;
        while residual_norm >= tolerance && iterations < self.params.max_iteration {
            self.update.fill(0.0);
            let mut problem = StaticProblem {
                model,
                time: initial_time,
                state: initial_state.as_slice(),
                lambda: self.lambda.as_slice(),
                finite_difference_step: self.params.finite_difference_step,
                solution: &self.solution,
                error: &mut self.error,
                perturbed: &mut self.perturbed,
                perturbed_error: &mut self.perturbed_error,
            };
            let report = self.gmres.solve(&mut problem, &mut self.update).map_err(|err| {
                warn!("init Newton iteration {} failed: {}", iterations + 1, err);
                NmpcError::InitializationFailed {
                    iterations,
                    residual_norm,
                    tolerance,
                }
            })?;
            self.solution += &self.update;

            residual_norm = scale * self.residual_norm(model, initial_time, initial_state);
            iterations += 1;
            debug!(
                "init Newton iteration {}: residual {:e}, GMRES {} iterations (reduction {:e})",
                iterations,
                residual_norm,
                report.iterations,
                report.reduction()
            );
        }

        if residual_norm < tolerance {
            info!(
                "initial solution converged after {} iterations, residual {:e}",
                iterations, residual_norm
            );
            Ok(InitReport {
                iterations,
                residual_norm,
            })
        } else {
            Err(NmpcError::InitializationFailed {
                iterations,
                residual_norm,
                tolerance,
            })
        }
    }

    fn residual_norm<M: NmpcModel>(&mut self, model: &M, t: f64, x: &DVector<f64>) -> f64 {
        stage_residual(
            model,
            t,
            x.as_slice(),
            self.solution.as_slice(),
            self.lambda.as_slice(),
            self.error.as_mut_slice(),
        );
        self.error.norm()
    }
}
