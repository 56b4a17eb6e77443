//! Multiple-shooting C/GMRES controller
//!
//! Every call to [`MultipleShootingCgmres::control_update`] performs a single
//! continuation step: the KKT residual is driven along `dF/dt = -ζ F` by one
//! GMRES solve and one Euler step of the control sequence. The solution is
//! never iterated to convergence within a sampling period.

use log::{debug, info, warn};
use nalgebra::DVector;

use crate::common::error::{check_dimension, check_finite, check_positive};
use crate::common::{ControlInputSequence, NmpcError, NmpcModel, NmpcResult, Trajectory};
use crate::linalg::{GmresReport, MatrixFreeGmres};
use crate::solver::config::{CgmresConfig, InitParams};
use crate::solver::horizon::Horizon;
use crate::solver::initializer::{InitReport, NewtonGmresInitializer};
use crate::solver::optimality::{ContinuationProblem, ContinuationWorkspace};

/// NMPC controller tracking the optimal control sequence with C/GMRES
#[derive(Debug, Clone)]
pub struct MultipleShootingCgmres<M: NmpcModel> {
    model: M,
    config: CgmresConfig,
    horizon: Horizon,
    gmres: MatrixFreeGmres,
    initializer: NewtonGmresInitializer,
    initialized: bool,
    solution: ControlInputSequence,
    trajectory: Trajectory,
    update: DVector<f64>,
    work: ContinuationWorkspace,
    last_gmres_report: Option<GmresReport>,
    last_init_report: Option<InitReport>,
}

impl<M: NmpcModel> MultipleShootingCgmres<M> {
    pub fn new(model: M, config: CgmresConfig) -> NmpcResult<Self> {
        config.validate()?;
        let dim_state = model.dim_state();
        let dim_u = model.dim_control_input();
        if dim_state == 0 {
            return Err(NmpcError::InvalidParameter {
                name: "dim_state",
                reason: "the model must have at least one state".to_string(),
            });
        }
        if dim_u == 0 {
            return Err(NmpcError::InvalidParameter {
                name: "dim_control_input",
                reason: "the model must have at least one control input".to_string(),
            });
        }

        let dim_uc = model.dim_control_input_and_constraints();
        let n = config.horizon_division_num;
        let horizon = Horizon::new(config.final_horizon, config.alpha, n)?;
        let gmres =
            MatrixFreeGmres::new(dim_uc * n, config.kmax).with_tolerance(config.gmres_tolerance);
        let initializer =
            NewtonGmresInitializer::new(&model, InitParams::with_dimension(dim_uc))?;

        Ok(MultipleShootingCgmres {
            horizon,
            gmres,
            initializer,
            initialized: false,
            solution: ControlInputSequence::zeros(dim_uc, n),
            trajectory: Trajectory::zeros(dim_state, n),
            update: DVector::zeros(dim_uc * n),
            work: ContinuationWorkspace::new(dim_state, dim_uc, n),
            last_gmres_report: None,
            last_init_report: None,
            config,
            model,
        })
    }

    /// Replaces the parameters of the initial Newton-GMRES solve
    pub fn set_init_params(&mut self, params: InitParams) -> NmpcResult<()> {
        self.initializer = NewtonGmresInitializer::new(&self.model, params)?;
        Ok(())
    }

    /// Solves the zero-length horizon problem at `(t0, x0)`, fills every stage
    /// of the sequence with it and shoots the trajectory from `x0`. Returns
    /// the first control input.
    pub fn init_solution(&mut self, t0: f64, x0: &DVector<f64>) -> NmpcResult<DVector<f64>> {
        check_finite("initial time", &[t0])?;
        check_dimension("initial state", self.model.dim_state(), x0.len())?;
        check_finite("initial state", x0.as_slice())?;

        let n = self.config.horizon_division_num;
        let report = self.initializer.solve(&self.model, t0, x0, n)?;
        self.horizon.set_initial_time(t0);
        self.solution.fill_steps(self.initializer.solution().as_slice())?;

        // Nodes consistent with the seeded sequence, also for a fixed horizon
        self.work.shooting.compute_trajectory(
            &self.model,
            t0,
            self.horizon.step(t0),
            x0,
            &self.solution,
            None,
            &mut self.trajectory,
        );

        self.update.fill(0.0);
        self.initialized = true;
        self.last_gmres_report = None;
        self.last_init_report = Some(report);
        info!(
            "C/GMRES initialized at t0 = {}: {} Newton iterations, residual {:e}",
            t0, report.iterations, report.residual_norm
        );
        Ok(self.first_control_input())
    }

    /// One continuation step at time `t` for the measured state `x`, `dt`
    /// being the sampling period. Returns the control input to apply.
    pub fn control_update(
        &mut self,
        t: f64,
        dt: f64,
        x: &DVector<f64>,
    ) -> NmpcResult<DVector<f64>> {
        self.check_call(t, x)?;
        check_positive("sampling_period", dt)?;

        let h = self.config.finite_difference_step;
        let mut problem = ContinuationProblem::new(
            &self.model,
            &self.horizon,
            t,
            x,
            h,
            self.config.zeta,
            &self.solution,
            &self.trajectory,
            &mut self.work,
        );
        let report = match self.gmres.solve(&mut problem, &mut self.update) {
            Ok(report) => report,
            Err(err) => {
                self.update.fill(0.0);
                warn!("C/GMRES update rejected at t = {}: {}", t, err);
                return Err(err);
            }
        };
        problem.perturbed_trajectory(&self.update);

        let finite = self.update.iter().all(|v| v.is_finite());
        if !finite || !self.work.perturbed_trajectory.is_finite() {
            self.update.fill(0.0);
            warn!("C/GMRES update rejected at t = {}: non-finite update", t);
            return Err(NmpcError::NumericalError(format!(
                "non-finite continuation update at t = {}",
                t
            )));
        }

        self.trajectory
            .advance_towards(&self.work.perturbed_trajectory, dt / h);
        self.solution.as_vector_mut().axpy(dt, &self.update, 1.0);
        self.last_gmres_report = Some(report);

        debug!(
            "C/GMRES update at t = {}: {} GMRES iterations, residual {:e} -> {:e}",
            t, report.iterations, report.initial_residual_norm, report.residual_norm
        );
        Ok(self.first_control_input())
    }

    /// Optimality residual `sqrt(‖F‖² + ‖defects‖²)` of the stored solution at `(t, x)`
    pub fn get_error(&mut self, t: f64, x: &DVector<f64>) -> NmpcResult<f64> {
        self.check_call(t, x)?;
        let delta_tau = self.horizon.step(t);
        Ok(self.work.error_norm(
            &self.model,
            t,
            delta_tau,
            x,
            &self.solution,
            &self.trajectory,
        ))
    }

    fn check_call(&self, t: f64, x: &DVector<f64>) -> NmpcResult<()> {
        if !self.initialized {
            return Err(NmpcError::NotInitialized);
        }
        check_finite("time", &[t])?;
        check_dimension("state", self.model.dim_state(), x.len())?;
        check_finite("state", x.as_slice())?;
        let initial_time = self.horizon.initial_time();
        if t < initial_time {
            return Err(NmpcError::TimeBeforeInitial { time: t, initial_time });
        }
        Ok(())
    }

    /// Control input of the first stage, empty for an empty horizon
    pub fn first_control_input(&self) -> DVector<f64> {
        if self.solution.is_empty() {
            return DVector::zeros(0);
        }
        DVector::from_column_slice(&self.solution.step(0)[..self.model.dim_control_input()])
    }

    pub fn control_input_and_constraints_seq(&self) -> &ControlInputSequence {
        &self.solution
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    pub fn config(&self) -> &CgmresConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn last_gmres_report(&self) -> Option<&GmresReport> {
        self.last_gmres_report.as_ref()
    }

    pub fn last_init_report(&self) -> Option<&InitReport> {
        self.last_init_report.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}
