//! Common types, traits, and error definitions for rust_cgmres
//!
//! This module provides the building blocks shared by the Krylov solver,
//! the shooting recursions and the continuation controller.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::{NmpcError, NmpcResult};
