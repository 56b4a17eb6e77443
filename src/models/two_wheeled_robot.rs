// Two-wheeled robot for nonlinear MPC with C/GMRES
//
// State (x, y, yaw, v), inputs (acceleration u_1, steering u_2). Input bounds
// are turned into equality constraints with dummy inputs:
//   u_1^2 + dummy_1^2 = U_A_MAX^2
//   u_2^2 + dummy_2^2 = U_OMEGA_MAX^2
// and the dummy inputs are rewarded so that they stay away from zero.
//
// Reference:
// Shunichi09/nonlinear_control: Implementing the nonlinear model predictive
// control, sliding mode control https://github.com/Shunichi09/PythonLinearNonlinearControl

use std::f64::consts::PI;

use crate::common::NmpcModel;

/// Physical and cost parameters of the two-wheeled robot
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TwoWheeledRobotParams {
    /// Wheelbase [m]
    pub wheel_base: f64,
    /// Maximum acceleration input
    pub max_acceleration: f64,
    /// Maximum steering input [rad]
    pub max_steering: f64,
    /// Reward weight of the acceleration dummy input
    pub phi_v: f64,
    /// Reward weight of the steering dummy input
    pub phi_omega: f64,
}

impl Default for TwoWheeledRobotParams {
    fn default() -> Self {
        TwoWheeledRobotParams {
            wheel_base: 0.25,
            max_acceleration: 1.0,
            max_steering: PI / 4.0,
            phi_v: 0.01,
            phi_omega: 0.01,
        }
    }
}

/// Differential model of the robot, returns (dx, dy, d_yaw, dv)
pub fn differential_model(
    wheel_base: f64,
    v: f64,
    yaw: f64,
    u_1: f64,
    u_2: f64,
) -> (f64, f64, f64, f64) {
    let dx = yaw.cos() * v;
    let dy = yaw.sin() * v;
    let dv = u_1;
    // sin(u_2) instead of tan(u_2) keeps the model smooth for the optimizer
    let d_yaw = v / wheel_base * u_2.sin();

    (dx, dy, d_yaw, dv)
}

/// Control block layout: `[u_1, u_2, dummy_1, dummy_2, rho_1, rho_2]`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TwoWheeledRobot {
    pub params: TwoWheeledRobotParams,
}

impl TwoWheeledRobot {
    pub fn new(params: TwoWheeledRobotParams) -> Self {
        TwoWheeledRobot { params }
    }

    /// Hamiltonian `L + λᵀf + ρᵀC` of one stage
    pub fn hamiltonian(&self, x: &[f64], u: &[f64], lambda: &[f64]) -> f64 {
        let p = &self.params;
        let (u_1, u_2, dummy_1, dummy_2, rho_1, rho_2) = (u[0], u[1], u[2], u[3], u[4], u[5]);
        let (dx, dy, d_yaw, dv) = differential_model(p.wheel_base, x[3], x[2], u_1, u_2);

        let stage_cost =
            0.5 * (u_1.powi(2) + u_2.powi(2)) - p.phi_v * dummy_1 - p.phi_omega * dummy_2;
        let costate_term = lambda[0] * dx + lambda[1] * dy + lambda[2] * d_yaw + lambda[3] * dv;
        let c_1 = u_1.powi(2) + dummy_1.powi(2) - p.max_acceleration.powi(2);
        let c_2 = u_2.powi(2) + dummy_2.powi(2) - p.max_steering.powi(2);

        stage_cost + costate_term + rho_1 * c_1 + rho_2 * c_2
    }
}

impl NmpcModel for TwoWheeledRobot {
    fn dim_state(&self) -> usize {
        4
    }

    fn dim_control_input(&self) -> usize {
        4
    }

    fn dim_constraints(&self) -> usize {
        2
    }

    fn state_derivative(&self, _t: f64, x: &[f64], u: &[f64], dx: &mut [f64]) {
        let (d_x, d_y, d_yaw, d_v) =
            differential_model(self.params.wheel_base, x[3], x[2], u[0], u[1]);
        dx[0] = d_x;
        dx[1] = d_y;
        dx[2] = d_yaw;
        dx[3] = d_v;
    }

    // Terminal cost 0.5 |x|^2
    fn terminal_cost_gradient(&self, _t: f64, x: &[f64], phix: &mut [f64]) {
        phix.copy_from_slice(x);
    }

    fn hamiltonian_grad_x(&self, _t: f64, x: &[f64], u: &[f64], lambda: &[f64], hx: &mut [f64]) {
        let (yaw, v) = (x[2], x[3]);
        hx[0] = 0.0;
        hx[1] = 0.0;
        hx[2] = -lambda[0] * yaw.sin() * v + lambda[1] * yaw.cos() * v;
        hx[3] = lambda[0] * yaw.cos()
            + lambda[1] * yaw.sin()
            + lambda[2] * u[1].sin() / self.params.wheel_base;
    }

    fn hamiltonian_grad_u(&self, _t: f64, x: &[f64], u: &[f64], lambda: &[f64], hu: &mut [f64]) {
        let p = &self.params;
        let v = x[3];
        let (u_1, u_2, dummy_1, dummy_2, rho_1, rho_2) = (u[0], u[1], u[2], u[3], u[4], u[5]);

        hu[0] = u_1 + lambda[3] + 2.0 * rho_1 * u_1;
        hu[1] = u_2 + lambda[2] * v / p.wheel_base * u_2.cos() + 2.0 * rho_2 * u_2;
        hu[2] = -p.phi_v + 2.0 * rho_1 * dummy_1;
        hu[3] = -p.phi_omega + 2.0 * rho_2 * dummy_2;
    }

    fn constraint_residual(&self, _t: f64, _x: &[f64], u: &[f64], c: &mut [f64]) {
        let p = &self.params;
        c[0] = u[0].powi(2) + u[2].powi(2) - p.max_acceleration.powi(2);
        c[1] = u[1].powi(2) + u[3].powi(2) - p.max_steering.powi(2);
    }
}
