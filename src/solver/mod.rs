//! C/GMRES solver components

pub mod config;
pub mod continuation;
pub mod horizon;
pub mod initializer;
pub mod optimality;
pub mod shooting;

pub use config::{CgmresConfig, InitParams};
pub use continuation::MultipleShootingCgmres;
pub use horizon::Horizon;
pub use initializer::{InitReport, NewtonGmresInitializer};
pub use optimality::{ContinuationProblem, ContinuationWorkspace};
pub use shooting::Shooting;
