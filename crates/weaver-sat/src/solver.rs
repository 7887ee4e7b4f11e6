use std::collections::BTreeSet;
use std::time::Duration;

use weaver_ir::AtomId;

use crate::backends::smtlib::SmtScript;
use crate::cnf::{Clause, Cnf};

/// A lowered encoding, ready for a solver.
#[derive(Debug, Clone)]
pub enum Problem {
    Cnf(Cnf),
    Smt(SmtScript),
}

impl Problem {
    /// Add a blocking clause ruling out a previous model.
    pub fn block(&mut self, clause: Clause) {
        match self {
            Problem::Cnf(cnf) => cnf.add_clause(clause),
            Problem::Smt(script) => script.block(&clause),
        }
    }

    pub fn clause_count(&self) -> usize {
        match self {
            Problem::Cnf(cnf) => cnf.len(),
            Problem::Smt(script) => script.assertion_count(),
        }
    }
}

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatResult {
    Sat(Model),
    Unsat,
    Unknown(String),
}

/// The variables assigned true by a satisfying assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    true_vars: BTreeSet<AtomId>,
}

impl Model {
    pub fn new(true_vars: impl IntoIterator<Item = AtomId>) -> Self {
        Self {
            true_vars: true_vars.into_iter().collect(),
        }
    }

    pub fn is_true(&self, id: AtomId) -> bool {
        self.true_vars.contains(&id)
    }

    /// True variables in ascending id order.
    pub fn true_vars(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.true_vars.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.true_vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.true_vars.is_empty()
    }
}

/// Abstract solver interface. Implementations own whatever process or
/// library they drive; the encoding is handed over whole on every call.
pub trait SatSolver {
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &str;

    /// Check satisfiability, giving up after `timeout` if one is set.
    fn solve(&mut self, problem: &Problem, timeout: Option<Duration>)
        -> Result<SatResult, Self::Error>;
}
