//! Common types used throughout rust_cgmres

use nalgebra::DVector;

use crate::common::error::{check_dimension, NmpcResult};

/// Control inputs and constraint multipliers over the horizon.
///
/// Stored as one contiguous vector of `horizon_division_num` blocks, each of
/// `dim_control_input + dim_constraints` entries: the controls of that stage
/// followed by its constraint multipliers.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlInputSequence {
    data: DVector<f64>,
    dim: usize,
}

impl ControlInputSequence {
    pub fn zeros(dim: usize, horizon_division_num: usize) -> Self {
        Self {
            data: DVector::zeros(dim * horizon_division_num),
            dim,
        }
    }

    /// Sequence with every stage set to `block`
    pub fn from_repeated(block: &[f64], horizon_division_num: usize) -> Self {
        let mut seq = Self::zeros(block.len(), horizon_division_num);
        seq.copy_into_steps(block);
        seq
    }

    /// Entries per stage (controls + multipliers)
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn horizon_division_num(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn step(&self, i: usize) -> &[f64] {
        &self.data.as_slice()[i * self.dim..(i + 1) * self.dim]
    }

    pub fn step_mut(&mut self, i: usize) -> &mut [f64] {
        let dim = self.dim;
        &mut self.data.as_mut_slice()[i * dim..(i + 1) * dim]
    }

    /// Sets every stage to `block`
    pub fn fill_steps(&mut self, block: &[f64]) -> NmpcResult<()> {
        check_dimension("control input block", self.dim, block.len())?;
        self.copy_into_steps(block);
        Ok(())
    }

    fn copy_into_steps(&mut self, block: &[f64]) {
        for i in 0..self.horizon_division_num() {
            self.step_mut(i).copy_from_slice(block);
        }
    }

    pub fn as_vector(&self) -> &DVector<f64> {
        &self.data
    }

    pub fn as_vector_mut(&mut self) -> &mut DVector<f64> {
        &mut self.data
    }

    /// `self = base + scale * direction`, without reallocating
    pub fn assign_perturbed(
        &mut self,
        base: &ControlInputSequence,
        scale: f64,
        direction: &DVector<f64>,
    ) {
        self.data.copy_from(&base.data);
        self.data.axpy(scale, direction, 1.0);
    }
}

/// State and costate nodes along the horizon.
///
/// Both sequences hold `horizon_division_num + 1` vectors. Shooting defects
/// are stored with the same layout, node 0 being identically zero there.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub states: Vec<DVector<f64>>,
    pub costates: Vec<DVector<f64>>,
}

impl Trajectory {
    pub fn zeros(dim_state: usize, horizon_division_num: usize) -> Self {
        Self {
            states: vec![DVector::zeros(dim_state); horizon_division_num + 1],
            costates: vec![DVector::zeros(dim_state); horizon_division_num + 1],
        }
    }

    pub fn horizon_division_num(&self) -> usize {
        self.states.len() - 1
    }

    /// Sets every state node to `state` and every costate node to `costate`
    pub fn fill(&mut self, state: &DVector<f64>, costate: &DVector<f64>) {
        for x in self.states.iter_mut() {
            x.copy_from(state);
        }
        for lambda in self.costates.iter_mut() {
            lambda.copy_from(costate);
        }
    }

    /// `self = factor * other`
    pub fn assign_scaled(&mut self, other: &Trajectory, factor: f64) {
        for (dst, src) in self.nodes_mut().zip(other.nodes()) {
            dst.copy_from(src);
            *dst *= factor;
        }
    }

    /// `self += ratio * (target - self)`
    pub fn advance_towards(&mut self, target: &Trajectory, ratio: f64) {
        for (dst, src) in self.nodes_mut().zip(target.nodes()) {
            dst.axpy(ratio, src, 1.0 - ratio);
        }
    }

    pub fn squared_norm(&self) -> f64 {
        self.nodes().map(|v| v.norm_squared()).sum()
    }

    pub fn is_finite(&self) -> bool {
        self.nodes().all(|v| v.iter().all(|e| e.is_finite()))
    }

    fn nodes(&self) -> impl Iterator<Item = &DVector<f64>> {
        self.states.iter().chain(self.costates.iter())
    }

    fn nodes_mut(&mut self) -> impl Iterator<Item = &mut DVector<f64>> {
        self.states.iter_mut().chain(self.costates.iter_mut())
    }
}
