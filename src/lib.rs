//! rust_cgmres - multiple-shooting C/GMRES for nonlinear model predictive control
//!
//! The controller tracks the solution of a receding-horizon optimal control
//! problem with the continuation/GMRES method: every sampling period it
//! performs one matrix-free Krylov solve and one Euler step of the control
//! sequence instead of iterating the optimization to convergence.

// Core modules
pub mod common;
pub mod linalg;

// Solver and reference problems
pub mod solver;
pub mod models;

// Re-export common types for convenience
pub use common::{ControlInputSequence, NmpcModel, Trajectory};
pub use common::{NmpcError, NmpcResult};
pub use linalg::{GmresReport, MatrixFreeGmres, MatrixFreeProblem};
pub use solver::{CgmresConfig, Horizon, InitParams, InitReport, MultipleShootingCgmres};
