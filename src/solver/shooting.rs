//! Forward/backward shooting along the horizon
//!
//! States are integrated forward and costates backward with explicit Euler
//! steps. Optional correction terms are added after every step, which makes
//! the defects of the resulting trajectory equal to the corrections. This is
//! how the multiple-shooting unknowns are condensed out of the KKT system.

use nalgebra::DVector;

use crate::common::{ControlInputSequence, NmpcModel, Trajectory};

#[derive(Debug, Clone)]
pub struct Shooting {
    dx: DVector<f64>,
}

impl Shooting {
    pub fn new(dim_state: usize) -> Self {
        Shooting {
            dx: DVector::zeros(dim_state),
        }
    }

    /// Shoots from the state `x` at time `t` with step `delta_tau`.
    ///
    /// `trajectory.states[0]` is set to `x`. With `corrections == None` the
    /// result is the nominal single-shooting trajectory.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_trajectory<M: NmpcModel>(
        &mut self,
        model: &M,
        t: f64,
        delta_tau: f64,
        x: &DVector<f64>,
        seq: &ControlInputSequence,
        corrections: Option<&Trajectory>,
        trajectory: &mut Trajectory,
    ) {
        let n = seq.horizon_division_num();
        debug_assert_eq!(trajectory.horizon_division_num(), n);

        trajectory.states[0].copy_from(x);
        for i in 0..n {
            let tau = t + i as f64 * delta_tau;
            let (done, rest) = trajectory.states.split_at_mut(i + 1);
            let current = &done[i];
            model.state_derivative(tau, current.as_slice(), seq.step(i), self.dx.as_mut_slice());

            let next = &mut rest[0];
            next.copy_from(current);
            next.axpy(delta_tau, &self.dx, 1.0);
            if let Some(c) = corrections {
                *next += &c.states[i + 1];
            }
        }

        let terminal_time = t + n as f64 * delta_tau;
        model.terminal_cost_gradient(
            terminal_time,
            trajectory.states[n].as_slice(),
            trajectory.costates[n].as_mut_slice(),
        );
        if let Some(c) = corrections {
            trajectory.costates[n] += &c.costates[n];
        }

        for i in (0..n).rev() {
            let tau = t + i as f64 * delta_tau;
            let (head, tail) = trajectory.costates.split_at_mut(i + 1);
            let later = &tail[0];
            model.hamiltonian_grad_x(
                tau,
                trajectory.states[i].as_slice(),
                seq.step(i),
                later.as_slice(),
                self.dx.as_mut_slice(),
            );

            let earlier = &mut head[i];
            earlier.copy_from(later);
            earlier.axpy(delta_tau, &self.dx, 1.0);
            if let Some(c) = corrections {
                *earlier += &c.costates[i];
            }
        }
    }

    /// Mismatch between the nodes of `trajectory` and one Euler step from
    /// their neighbours. Stage 0 starts from `x`; node 0 of `defects` is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_defects<M: NmpcModel>(
        &mut self,
        model: &M,
        t: f64,
        delta_tau: f64,
        x: &DVector<f64>,
        seq: &ControlInputSequence,
        trajectory: &Trajectory,
        defects: &mut Trajectory,
    ) {
        let n = seq.horizon_division_num();
        debug_assert_eq!(trajectory.horizon_division_num(), n);

        defects.states[0].fill(0.0);
        defects.costates[0].fill(0.0);
        if n == 0 {
            return;
        }

        for i in 0..n {
            let tau = t + i as f64 * delta_tau;
            let current = if i == 0 { x } else { &trajectory.states[i] };
            model.state_derivative(tau, current.as_slice(), seq.step(i), self.dx.as_mut_slice());

            let defect = &mut defects.states[i + 1];
            defect.copy_from(&trajectory.states[i + 1]);
            *defect -= current;
            defect.axpy(-delta_tau, &self.dx, 1.0);
        }

        let terminal_time = t + n as f64 * delta_tau;
        model.terminal_cost_gradient(
            terminal_time,
            trajectory.states[n].as_slice(),
            self.dx.as_mut_slice(),
        );
        let terminal = &mut defects.costates[n];
        terminal.copy_from(&trajectory.costates[n]);
        *terminal -= &self.dx;

        for i in (1..n).rev() {
            let tau = t + i as f64 * delta_tau;
            model.hamiltonian_grad_x(
                tau,
                trajectory.states[i].as_slice(),
                seq.step(i),
                trajectory.costates[i + 1].as_slice(),
                self.dx.as_mut_slice(),
            );

            let defect = &mut defects.costates[i];
            defect.copy_from(&trajectory.costates[i]);
            *defect -= &trajectory.costates[i + 1];
            defect.axpy(-delta_tau, &self.dx, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScalarIntegrator;
    use approx::assert_relative_eq;

    struct Frozen;

    impl NmpcModel for Frozen {
        fn dim_state(&self) -> usize {
            2
        }

        fn dim_control_input(&self) -> usize {
            1
        }

        fn state_derivative(&self, _t: f64, _x: &[f64], _u: &[f64], dx: &mut [f64]) {
            dx.iter_mut().for_each(|v| *v = 0.0);
        }

        fn terminal_cost_gradient(&self, _t: f64, x: &[f64], phix: &mut [f64]) {
            phix.copy_from_slice(x);
        }

        fn hamiltonian_grad_x(&self, _t: f64, _x: &[f64], _u: &[f64], _l: &[f64], hx: &mut [f64]) {
            hx.iter_mut().for_each(|v| *v = 0.0);
        }

        fn hamiltonian_grad_u(&self, _t: f64, _x: &[f64], u: &[f64], _l: &[f64], hu: &mut [f64]) {
            hu[0] = u[0];
        }
    }

    #[test]
    fn test_zero_dynamics_keeps_state_constant() {
        let x = DVector::from_vec(vec![1.5, -0.5]);
        let seq = ControlInputSequence::zeros(1, 8);
        let mut traj = Trajectory::zeros(2, 8);
        let mut shooting = Shooting::new(2);

        shooting.compute_trajectory(&Frozen, 0.0, 0.1, &x, &seq, None, &mut traj);

        for state in traj.states.iter() {
            assert_eq!(state, &x);
        }
        for costate in traj.costates.iter() {
            assert_eq!(costate, &x);
        }
    }

    #[test]
    fn test_integrator_forward_and_backward() {
        let model = ScalarIntegrator::default();
        let x = DVector::from_element(1, 1.0);
        let seq = ControlInputSequence::from_repeated(&[-1.0], 4);
        let mut traj = Trajectory::zeros(1, 4);
        let mut shooting = Shooting::new(1);
        let dt = 0.25;

        shooting.compute_trajectory(&model, 0.0, dt, &x, &seq, None, &mut traj);

        // x_i = 1 - i * 0.25
        for i in 0..=4 {
            assert_relative_eq!(traj.states[i][0], 1.0 - i as f64 * dt, epsilon = 1e-12);
        }
        // lambda_N = 2 sf x_N, lambda_i = lambda_{i+1} + dt * 2 q x_i
        let mut lambda = 2.0 * model.sf * traj.states[4][0];
        assert_relative_eq!(traj.costates[4][0], lambda, epsilon = 1e-12);
        for i in (0..4).rev() {
            lambda += dt * 2.0 * model.q * traj.states[i][0];
            assert_relative_eq!(traj.costates[i][0], lambda, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_nominal_trajectory_has_no_defects() {
        let model = ScalarIntegrator::default();
        let x = DVector::from_element(1, 0.7);
        let seq = ControlInputSequence::from_repeated(&[0.3], 5);
        let mut traj = Trajectory::zeros(1, 5);
        let mut defects = Trajectory::zeros(1, 5);
        let mut shooting = Shooting::new(1);

        shooting.compute_trajectory(&model, 1.0, 0.1, &x, &seq, None, &mut traj);
        shooting.compute_defects(&model, 1.0, 0.1, &x, &seq, &traj, &mut defects);

        assert!(defects.squared_norm() < 1e-24);
    }

    #[test]
    fn test_corrections_become_defects() {
        let model = ScalarIntegrator::default();
        let x = DVector::from_element(1, -0.4);
        let seq = ControlInputSequence::from_repeated(&[0.2], 5);
        let mut corrections = Trajectory::zeros(1, 5);
        for i in 1..=5 {
            corrections.states[i][0] = 0.01 * i as f64;
            corrections.costates[i][0] = -0.02 * i as f64;
        }
        let mut traj = Trajectory::zeros(1, 5);
        let mut defects = Trajectory::zeros(1, 5);
        let mut shooting = Shooting::new(1);

        shooting.compute_trajectory(&model, 0.0, 0.05, &x, &seq, Some(&corrections), &mut traj);
        shooting.compute_defects(&model, 0.0, 0.05, &x, &seq, &traj, &mut defects);

        for i in 1..=5 {
            assert_relative_eq!(defects.states[i][0], corrections.states[i][0], epsilon = 1e-12);
            assert_relative_eq!(
                defects.costates[i][0],
                corrections.costates[i][0],
                epsilon = 1e-12
            );
        }
        assert_eq!(defects.states[0][0], 0.0);
        assert_eq!(defects.costates[0][0], 0.0);
    }

    #[test]
    fn test_empty_horizon() {
        let model = ScalarIntegrator::default();
        let x = DVector::from_element(1, 2.0);
        let seq = ControlInputSequence::zeros(1, 0);
        let mut traj = Trajectory::zeros(1, 0);
        let mut defects = Trajectory::zeros(1, 0);
        let mut shooting = Shooting::new(1);

        shooting.compute_trajectory(&model, 0.0, 0.0, &x, &seq, None, &mut traj);
        shooting.compute_defects(&model, 0.0, 0.0, &x, &seq, &traj, &mut defects);

        assert_eq!(traj.states.len(), 1);
        assert_eq!(traj.states[0][0], 2.0);
        assert_relative_eq!(traj.costates[0][0], 2.0 * model.sf * 2.0);
        assert_eq!(defects.squared_norm(), 0.0);
    }
}
