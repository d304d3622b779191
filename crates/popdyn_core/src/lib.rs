//! The `popdyn_core` crate is the computational layer of the modeling-course
//! dashboard: every page's math lives here, the web chrome does not.
//!
//! Key components:
//! - **Traits**: `Scalar` (numeric type abstraction), `OdeSystem`
//!   (right-hand sides), `Steppable` (fixed-step solvers).
//! - **Growth**: closed-form exponential and logistic evaluators.
//! - **Epidemic**: SIR, SEIR, adoption-SIR and vital-dynamics SEIR models
//!   with parameter sweeps.
//! - **Solvers**: fixed-step RK4 and adaptive Dormand-Prince 5(4), plus the
//!   `integrate` entry point with the constant-series fallback.
//! - **Expr/Field**: allow-listed formula compiler and the 2D vector-field
//!   evaluator built on it.

pub mod epidemic;
pub mod expr;
pub mod field;
pub mod grid;
pub mod growth;
pub mod solvers;
pub mod traits;

pub use grid::{SolveStatus, Solution, TimeGrid, Trajectory};
pub use solvers::{integrate, SolverSettings};
