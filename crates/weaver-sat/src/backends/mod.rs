pub mod dimacs;
pub mod process;
pub mod smtlib;

pub use dimacs::{parse_dimacs_output, render_dimacs, write_dimacs};
pub use process::{InputFormat, ProcessSolver, ProcessSolverError};
pub use smtlib::{to_smtlib, SmtScript};
