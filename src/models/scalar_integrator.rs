//! Single integrator `ẋ = u` with quadratic costs
//!
//! Stage cost `q x² + r u²`, terminal cost `sf x²`. The unconstrained LQR
//! gain of the infinite-horizon problem is `sqrt(q / r)`, which bounds the
//! magnitude of any receding-horizon control for `|x| = 1`.

use crate::common::NmpcModel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarIntegrator {
    pub q: f64,
    pub r: f64,
    pub sf: f64,
}

impl Default for ScalarIntegrator {
    fn default() -> Self {
        ScalarIntegrator {
            q: 1.0,
            r: 1.0,
            sf: 0.5,
        }
    }
}

impl ScalarIntegrator {
    pub fn new(q: f64, r: f64, sf: f64) -> Self {
        ScalarIntegrator { q, r, sf }
    }

    /// Infinite-horizon LQR gain
    pub fn lqr_gain(&self) -> f64 {
        (self.q / self.r).sqrt()
    }
}

impl NmpcModel for ScalarIntegrator {
    fn dim_state(&self) -> usize {
        1
    }

    fn dim_control_input(&self) -> usize {
        1
    }

    fn state_derivative(&self, _t: f64, _x: &[f64], u: &[f64], dx: &mut [f64]) {
        dx[0] = u[0];
    }

    fn terminal_cost_gradient(&self, _t: f64, x: &[f64], phix: &mut [f64]) {
        phix[0] = 2.0 * self.sf * x[0];
    }

    fn hamiltonian_grad_x(&self, _t: f64, x: &[f64], _u: &[f64], _lambda: &[f64], hx: &mut [f64]) {
        hx[0] = 2.0 * self.q * x[0];
    }

    fn hamiltonian_grad_u(&self, _t: f64, _x: &[f64], u: &[f64], lambda: &[f64], hu: &mut [f64]) {
        hu[0] = 2.0 * self.r * u[0] + lambda[0];
    }
}
