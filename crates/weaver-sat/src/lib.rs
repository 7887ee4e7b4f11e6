#![doc = include_str!("../README.md")]

//! Propositional encoding for bounded workflow synthesis.
//!
//! The structural encoder and the formula compiler share one
//! [`weaver_ir::AtomSpace`]; their output is lowered either to DIMACS via the
//! Tseitin transform or to an SMT-LIB script, and handed to a [`SatSolver`].

pub mod backends;
pub mod cnf;
pub mod encoder;
pub mod errors;
pub mod expr;
pub mod solver;
pub mod sorts;
pub mod terms;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod test_fixtures;
pub mod tseitin;

pub use cnf::{Clause, Cnf, Literal};
pub use encoder::{Backend, Encoding, EncodingOptions, Lowered, SkippedConstraint, UsePolicy};
pub use errors::ConstraintError;
pub use expr::BoolExpr;
pub use solver::{Model, Problem, SatResult, SatSolver};
