//! Reference optimal control problems

pub mod scalar_integrator;
pub mod two_wheeled_robot;

pub use scalar_integrator::ScalarIntegrator;
pub use two_wheeled_robot::{TwoWheeledRobot, TwoWheeledRobotParams};
