//! Solver configuration

use crate::common::error::{check_dimension, check_finite, check_non_negative, check_positive};
use crate::common::{NmpcError, NmpcResult};
use crate::linalg::DEFAULT_GMRES_TOLERANCE;

/// Configuration of the multiple-shooting C/GMRES controller
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CgmresConfig {
    /// Final horizon length `T_f`
    pub final_horizon: f64,
    /// Growth rate of the horizon length
    pub alpha: f64,
    /// Number of discretization steps `N`
    pub horizon_division_num: usize,
    /// Forward-difference step `h`
    pub finite_difference_step: f64,
    /// Stabilization gain of the continuation
    pub zeta: f64,
    /// Maximum number of GMRES iterations per update
    pub kmax: usize,
    /// Absolute tolerance on the GMRES residual estimate
    pub gmres_tolerance: f64,
}

impl Default for CgmresConfig {
    fn default() -> Self {
        CgmresConfig {
            final_horizon: 1.0,
            alpha: 1.0,
            horizon_division_num: 50,
            finite_difference_step: 1e-6,
            zeta: 100.0,
            kmax: 5,
            gmres_tolerance: DEFAULT_GMRES_TOLERANCE,
        }
    }
}

impl CgmresConfig {
    pub fn new(
        final_horizon: f64,
        alpha: f64,
        horizon_division_num: usize,
        finite_difference_step: f64,
        zeta: f64,
        kmax: usize,
    ) -> Self {
        CgmresConfig {
            final_horizon,
            alpha,
            horizon_division_num,
            finite_difference_step,
            zeta,
            kmax,
            gmres_tolerance: DEFAULT_GMRES_TOLERANCE,
        }
    }

    pub fn with_gmres_tolerance(mut self, tolerance: f64) -> Self {
        self.gmres_tolerance = tolerance;
        self
    }

    pub fn validate(&self) -> NmpcResult<()> {
        check_positive("final_horizon", self.final_horizon)?;
        check_non_negative("alpha", self.alpha)?;
        check_positive("finite_difference_step", self.finite_difference_step)?;
        check_non_negative("zeta", self.zeta)?;
        check_non_negative("gmres_tolerance", self.gmres_tolerance)?;
        if self.kmax == 0 {
            return Err(NmpcError::InvalidParameter {
                name: "kmax",
                reason: "at least one GMRES iteration is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Parameters of the Newton-GMRES initialization at the initial time
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InitParams {
    /// Guess for one stage of controls and multipliers
    pub initial_guess: Vec<f64>,
    /// Newton iterations stop once the residual norm is below this value
    pub residual_tolerance: f64,
    pub max_iteration: usize,
    pub finite_difference_step: f64,
    pub kmax: usize,
}

impl InitParams {
    pub fn new(
        initial_guess: Vec<f64>,
        residual_tolerance: f64,
        max_iteration: usize,
        finite_difference_step: f64,
        kmax: usize,
    ) -> Self {
        InitParams {
            initial_guess,
            residual_tolerance,
            max_iteration,
            finite_difference_step,
            kmax,
        }
    }

    /// Zero guess, exact Newton steps
    pub fn with_dimension(dim: usize) -> Self {
        InitParams::new(vec![0.0; dim], 1e-8, 50, 1e-8, dim)
    }

    pub fn validate(&self, dim: usize) -> NmpcResult<()> {
        check_dimension("initial guess", dim, self.initial_guess.len())?;
        check_finite("initial_guess", &self.initial_guess)?;
        check_positive("residual_tolerance", self.residual_tolerance)?;
        check_positive("finite_difference_step", self.finite_difference_step)?;
        if self.kmax == 0 {
            return Err(NmpcError::InvalidParameter {
                name: "kmax",
                reason: "at least one GMRES iteration is required".to_string(),
            });
        }
        Ok(())
    }
}
