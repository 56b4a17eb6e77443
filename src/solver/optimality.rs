//! Optimality conditions and the linearized continuation problem
//!
//! The stationarity residual of stage `i` is `[H_u ; C]` evaluated at
//! `(τ_i, x_i, u_i, λ_{i+1})`. Together with the shooting defects it vanishes
//! at the optimum. [`ContinuationProblem`] exposes the forward-difference
//! linearization of `dF/dt = -ζ F` to the matrix-free GMRES.

use itertools::izip;
use nalgebra::DVector;

use crate::common::{ControlInputSequence, NmpcModel, Trajectory};
use crate::linalg::MatrixFreeProblem;
use crate::solver::horizon::Horizon;
use crate::solver::shooting::Shooting;

/// Writes `[H_u ; C]` of one stage into `out` (`dim_control_input + dim_constraints` entries)
pub fn stage_residual<M: NmpcModel>(
    model: &M,
    t: f64,
    x: &[f64],
    u: &[f64],
    lambda: &[f64],
    out: &mut [f64],
) {
    let (hu, c) = out.split_at_mut(model.dim_control_input());
    model.hamiltonian_grad_u(t, x, u, lambda, hu);
    model.constraint_residual(t, x, u, c);
}

/// Stationarity residual of every stage, stage 0 evaluated at the state `x`
#[allow(clippy::too_many_arguments)]
pub fn compute_control_error<M: NmpcModel>(
    model: &M,
    t: f64,
    delta_tau: f64,
    x: &DVector<f64>,
    seq: &ControlInputSequence,
    trajectory: &Trajectory,
    out: &mut DVector<f64>,
) {
    let dim = seq.dim();
    for i in 0..seq.horizon_division_num() {
        let tau = t + i as f64 * delta_tau;
        let state = if i == 0 { x } else { &trajectory.states[i] };
        stage_residual(
            model,
            tau,
            state.as_slice(),
            seq.step(i),
            trajectory.costates[i + 1].as_slice(),
            &mut out.as_mut_slice()[i * dim..(i + 1) * dim],
        );
    }
}

/// `sqrt(‖F‖² + ‖defects‖²)`
pub fn error_norm(control_error: &DVector<f64>, defects: &Trajectory) -> f64 {
    (control_error.norm_squared() + defects.squared_norm()).sqrt()
}

/// Buffers reused by every continuation update, sized once per controller
#[derive(Debug, Clone)]
pub struct ContinuationWorkspace {
    pub(crate) shooting: Shooting,
    pub(crate) dx: DVector<f64>,
    pub(crate) incremented_state: DVector<f64>,
    pub(crate) control_error: DVector<f64>,
    pub(crate) incremented_control_error: DVector<f64>,
    pub(crate) perturbed_control_error: DVector<f64>,
    pub(crate) defects: Trajectory,
    pub(crate) corrections: Trajectory,
    pub(crate) incremented_trajectory: Trajectory,
    pub(crate) perturbed_trajectory: Trajectory,
    pub(crate) perturbed_seq: ControlInputSequence,
}

impl ContinuationWorkspace {
    pub fn new(
        dim_state: usize,
        dim_control_input_and_constraints: usize,
        horizon_division_num: usize,
    ) -> Self {
        let (dim_uc, n) = (dim_control_input_and_constraints, horizon_division_num);
        let dim_seq = dim_uc * n;
        ContinuationWorkspace {
            shooting: Shooting::new(dim_state),
            dx: DVector::zeros(dim_state),
            incremented_state: DVector::zeros(dim_state),
            control_error: DVector::zeros(dim_seq),
            incremented_control_error: DVector::zeros(dim_seq),
            perturbed_control_error: DVector::zeros(dim_seq),
            defects: Trajectory::zeros(dim_state, horizon_division_num),
            corrections: Trajectory::zeros(dim_state, horizon_division_num),
            incremented_trajectory: Trajectory::zeros(dim_state, horizon_division_num),
            perturbed_trajectory: Trajectory::zeros(dim_state, horizon_division_num),
            perturbed_seq: ControlInputSequence::zeros(dim_uc, n),
        }
    }

    /// Error norm of `seq`/`trajectory` at `(t, x)`
    #[allow(clippy::too_many_arguments)]
    pub fn error_norm<M: NmpcModel>(
        &mut self,
        model: &M,
        t: f64,
        delta_tau: f64,
        x: &DVector<f64>,
        seq: &ControlInputSequence,
        trajectory: &Trajectory,
    ) -> f64 {
        compute_control_error(model, t, delta_tau, x, seq, trajectory, &mut self.control_error);
        self.shooting
            .compute_defects(model, t, delta_tau, x, seq, trajectory, &mut self.defects);
        error_norm(&self.control_error, &self.defects)
    }
}

/// One continuation step linearized around `(U, X, x, t)`.
///
/// With `t' = t + h`, `x' = x + h ẋ` and `X'(U)` the trajectory shot from
/// `(t', x')` whose defects are `(1 - hζ)` times the current ones:
///
/// * `b   = -ζ F(U, X, x, t) - (F(U, X'(U), x', t') - F(U, X, x, t)) / h`
/// * `A v = (F(U + h v, X'(U + h v), x', t') - F(U, X'(U), x', t')) / h`
pub struct ContinuationProblem<'a, M: NmpcModel> {
    model: &'a M,
    time: f64,
    delta_tau: f64,
    incremented_time: f64,
    incremented_delta_tau: f64,
    state: &'a DVector<f64>,
    finite_difference_step: f64,
    zeta: f64,
    seq: &'a ControlInputSequence,
    trajectory: &'a Trajectory,
    work: &'a mut ContinuationWorkspace,
}

impl<'a, M: NmpcModel> ContinuationProblem<'a, M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: &'a M,
        horizon: &Horizon,
        time: f64,
        state: &'a DVector<f64>,
        finite_difference_step: f64,
        zeta: f64,
        seq: &'a ControlInputSequence,
        trajectory: &'a Trajectory,
        work: &'a mut ContinuationWorkspace,
    ) -> Self {
        let incremented_time = time + finite_difference_step;

        // x' = x + h f(t, x, u_0)
        work.incremented_state.copy_from(state);
        if !seq.is_empty() {
            model.state_derivative(time, state.as_slice(), seq.step(0), work.dx.as_mut_slice());
            work.incremented_state.axpy(finite_difference_step, &work.dx, 1.0);
        }

        ContinuationProblem {
            model,
            time,
            delta_tau: horizon.step(time),
            incremented_time,
            incremented_delta_tau: horizon.step(incremented_time),
            state,
            finite_difference_step,
            zeta,
            seq,
            trajectory,
            work,
        }
    }

    /// Trajectory `X'(U + h·direction)`, i.e. where the shooting nodes move
    /// along `direction` over one forward-difference step. Requires `rhs`.
    pub fn perturbed_trajectory(&mut self, direction: &DVector<f64>) -> &Trajectory {
        let work = &mut *self.work;
        work.perturbed_seq
            .assign_perturbed(self.seq, self.finite_difference_step, direction);
        work.shooting.compute_trajectory(
            self.model,
            self.incremented_time,
            self.incremented_delta_tau,
            &work.incremented_state,
            &work.perturbed_seq,
            Some(&work.corrections),
            &mut work.perturbed_trajectory,
        );
        &work.perturbed_trajectory
    }
}

impl<'a, M: NmpcModel> MatrixFreeProblem for ContinuationProblem<'a, M> {
    fn dim(&self) -> usize {
        self.seq.as_vector().len()
    }

    fn rhs(&mut self, b: &mut DVector<f64>) {
        let work = &mut *self.work;
        let h = self.finite_difference_step;

        compute_control_error(
            self.model,
            self.time,
            self.delta_tau,
            self.state,
            self.seq,
            self.trajectory,
            &mut work.control_error,
        );
        work.shooting.compute_defects(
            self.model,
            self.time,
            self.delta_tau,
            self.state,
            self.seq,
            self.trajectory,
            &mut work.defects,
        );
        work.corrections
            .assign_scaled(&work.defects, 1.0 - h * self.zeta);

        work.shooting.compute_trajectory(
            self.model,
            self.incremented_time,
            self.incremented_delta_tau,
            &work.incremented_state,
            self.seq,
            Some(&work.corrections),
            &mut work.incremented_trajectory,
        );
        compute_control_error(
            self.model,
            self.incremented_time,
            self.incremented_delta_tau,
            &work.incremented_state,
            self.seq,
            &work.incremented_trajectory,
            &mut work.incremented_control_error,
        );

        for (bi, &f, &f_inc) in izip!(
            b.iter_mut(),
            work.control_error.iter(),
            work.incremented_control_error.iter()
        ) {
            *bi = -self.zeta * f - (f_inc - f) / h;
        }
    }

    fn apply(&mut self, direction: &DVector<f64>, product: &mut DVector<f64>) {
        let h = self.finite_difference_step;
        self.perturbed_trajectory(direction);

        let work = &mut *self.work;
        compute_control_error(
            self.model,
            self.incremented_time,
            self.incremented_delta_tau,
            &work.incremented_state,
            &work.perturbed_seq,
            &work.perturbed_trajectory,
            &mut work.perturbed_control_error,
        );

        for (p, &f_pert, &f_inc) in izip!(
            product.iter_mut(),
            work.perturbed_control_error.iter(),
            work.incremented_control_error.iter()
        ) {
            *p = (f_pert - f_inc) / h;
        }
    }
}
