//! Common traits defining the plant model seen by the solver

/// Nonlinear optimal control problem evaluated by the C/GMRES solver.
///
/// The Hamiltonian is `H = L(t, x, u) + λᵀ f(t, x, u) + ρᵀ C(t, x, u)`.
/// Every `u` argument is the full per-stage block: the `dim_control_input`
/// controls followed by the `dim_constraints` multipliers `ρ`. Results are
/// written into caller-provided slices so that evaluation never allocates.
pub trait NmpcModel {
    fn dim_state(&self) -> usize;

    fn dim_control_input(&self) -> usize;

    /// Number of equality constraints (and multipliers)
    fn dim_constraints(&self) -> usize {
        0
    }

    fn dim_control_input_and_constraints(&self) -> usize {
        self.dim_control_input() + self.dim_constraints()
    }

    /// State equation `dx = f(t, x, u)`
    fn state_derivative(&self, t: f64, x: &[f64], u: &[f64], dx: &mut [f64]);

    /// Terminal cost gradient `phix = ∂φ/∂x (t, x)`
    fn terminal_cost_gradient(&self, t: f64, x: &[f64], phix: &mut [f64]);

    /// `hx = ∂H/∂x`, driving the costate equation
    fn hamiltonian_grad_x(&self, t: f64, x: &[f64], u: &[f64], lambda: &[f64], hx: &mut [f64]);

    /// `hu = ∂H/∂u`, `dim_control_input` entries
    fn hamiltonian_grad_u(&self, t: f64, x: &[f64], u: &[f64], lambda: &[f64], hu: &mut [f64]);

    /// `c = C(t, x, u)`, `dim_constraints` entries
    fn constraint_residual(&self, _t: f64, _x: &[f64], _u: &[f64], _c: &mut [f64]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl NmpcModel for Decay {
        fn dim_state(&self) -> usize {
            1
        }

        fn dim_control_input(&self) -> usize {
            1
        }

        fn state_derivative(&self, _t: f64, x: &[f64], u: &[f64], dx: &mut [f64]) {
            dx[0] = -x[0] + u[0];
        }

        fn terminal_cost_gradient(&self, _t: f64, x: &[f64], phix: &mut [f64]) {
            phix[0] = x[0];
        }

        fn hamiltonian_grad_x(&self, _t: f64, _x: &[f64], _u: &[f64], l: &[f64], hx: &mut [f64]) {
            hx[0] = -l[0];
        }

        fn hamiltonian_grad_u(&self, _t: f64, _x: &[f64], u: &[f64], l: &[f64], hu: &mut [f64]) {
            hu[0] = u[0] + l[0];
        }
    }

    #[test]
    fn test_default_dimensions() {
        let model = Decay;
        assert_eq!(model.dim_constraints(), 0);
        assert_eq!(model.dim_control_input_and_constraints(), 1);

        let mut c: [f64; 0] = [];
        model.constraint_residual(0.0, &[1.0], &[0.0], &mut c);
    }
}
