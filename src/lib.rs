//! Parse human-typed algebraic equations and evaluate the names they define.
//!
//! Equation text is normalized first, so the usual shorthand works
//! (`8x + 6y`, `cos[sin(y)]`, `2pi`), then parsed into an [`Expression`] tree
//! and stored in a [`Solver`]. Evaluating a name walks its tree, recursively
//! evaluating every name it depends on.
//!
//! ```rust
//! use eqsolve::{Solver, Sweep};
//!
//! let mut solver = Solver::new();
//! solver.define("x", "y^2")?;
//!
//! let points = solver.sample("x", "y", Sweep::new(-1.0..1.0, 0.5)?)?;
//! assert_eq!(points, vec![(-1.0, 1.0), (-0.5, 0.25), (0.0, 0.0), (0.5, 0.25)]);
//! # Ok::<(), eqsolve::SolveError>(())
//! ```

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod algebra;
mod config;
mod equations;
pub mod ops;
mod sample;
mod solve;

pub use algebra::{
    normalize, parse, BinaryOperation, Expression, NormalizationError,
    ParseError,
};
pub use config::{CachePolicy, Config, DomainPolicy};
pub use equations::{Binding, Equation, EquationError, Equations};
pub use sample::Sweep;
pub use solve::{SolveError, Solver};
