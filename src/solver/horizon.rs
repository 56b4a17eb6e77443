//! Receding horizon length schedule
//!
//! The horizon grows from zero at the initial time towards `T_f` as
//! `L(t) = T_f (1 - exp(-alpha (t - t0)))`, which lets the solution start from
//! the trivially solvable zero-length problem.

use crate::common::error::{check_non_negative, check_positive};
use crate::common::NmpcResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizon {
    final_length: f64,
    alpha: f64,
    division_num: usize,
    initial_time: f64,
}

impl Horizon {
    pub fn new(final_length: f64, alpha: f64, division_num: usize) -> NmpcResult<Self> {
        check_positive("T_f", final_length)?;
        check_non_negative("alpha", alpha)?;
        Ok(Horizon {
            final_length,
            alpha,
            division_num,
            initial_time: 0.0,
        })
    }

    pub fn set_initial_time(&mut self, initial_time: f64) {
        self.initial_time = initial_time;
    }

    pub fn initial_time(&self) -> f64 {
        self.initial_time
    }

    pub fn final_length(&self) -> f64 {
        self.final_length
    }

    pub fn division_num(&self) -> usize {
        self.division_num
    }

    /// Horizon length at time `t`. `alpha == 0` means a fixed horizon of `T_f`.
    pub fn length(&self, t: f64) -> f64 {
        if self.alpha == 0.0 {
            return self.final_length;
        }
        let elapsed = (t - self.initial_time).max(0.0);
        self.final_length * (1.0 - (-self.alpha * elapsed).exp())
    }

    /// Discretization step `L(t) / N`, zero for an empty horizon
    pub fn step(&self, t: f64) -> f64 {
        if self.division_num == 0 {
            0.0
        } else {
            self.length(t) / self.division_num as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_length_starts_at_zero_and_saturates() {
        let mut horizon = Horizon::new(1.0, 0.5, 10).unwrap();
        horizon.set_initial_time(2.0);

        assert_eq!(horizon.length(2.0), 0.0);
        assert_relative_eq!(horizon.length(4.0), 1.0 - (-1.0f64).exp(), epsilon = 1e-12);
        assert!(horizon.length(1000.0) <= 1.0);
        assert_relative_eq!(horizon.length(1000.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_length_is_monotonic() {
        let horizon = Horizon::new(3.0, 2.0, 5).unwrap();
        let mut prev = horizon.length(0.0);
        for i in 1..200 {
            let len = horizon.length(i as f64 * 0.05);
            assert!(len >= prev);
            assert!(len <= 3.0);
            prev = len;
        }
    }

    #[test]
    fn test_step() {
        let horizon = Horizon::new(2.0, 1.0, 4).unwrap();
        assert_relative_eq!(horizon.step(1.0), horizon.length(1.0) / 4.0);
    }

    #[test]
    fn test_fixed_horizon_when_alpha_is_zero() {
        let horizon = Horizon::new(2.0, 0.0, 4).unwrap();
        assert_eq!(horizon.length(0.0), 2.0);
        assert_eq!(horizon.step(10.0), 0.5);
    }

    #[test]
    fn test_empty_horizon_has_zero_step() {
        let horizon = Horizon::new(1.0, 1.0, 0).unwrap();
        assert_eq!(horizon.step(5.0), 0.0);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(Horizon::new(0.0, 1.0, 10).is_err());
        assert!(Horizon::new(-1.0, 1.0, 10).is_err());
        assert!(Horizon::new(1.0, -0.1, 10).is_err());
    }
}
