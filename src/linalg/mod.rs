// Linear algebra module

pub mod matrixfree_gmres;

pub use matrixfree_gmres::{
    GmresReport, MatrixFreeGmres, MatrixFreeProblem, DEFAULT_GMRES_TOLERANCE,
};
