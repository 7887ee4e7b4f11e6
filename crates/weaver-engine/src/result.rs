use serde::Serialize;
use std::fmt;
use weaver_sat::SkippedConstraint;

use crate::workflow::WorkflowGraph;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every length bound up to the maximum was exhausted.
    Complete,
    /// The requested number of solutions was reached.
    SolutionLimit,
    /// The overall deadline expired; the solutions found so far are kept.
    Timeout,
    /// The solver failed; the solutions found so far are kept.
    SolverFailed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Complete => write!(f, "COMPLETE"),
            RunStatus::SolutionLimit => write!(f, "SOLUTION_LIMIT"),
            RunStatus::Timeout => write!(f, "TIMEOUT"),
            RunStatus::SolverFailed => write!(f, "SOLVER_FAILED"),
        }
    }
}

/// Statistics of one length bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LengthReport {
    pub length: usize,
    /// Named atoms plus auxiliaries.
    pub vars: u32,
    pub clauses: usize,
    pub solutions: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisResult {
    pub status: RunStatus,
    /// Decoded workflows, shortest first.
    pub solutions: Vec<WorkflowGraph>,
    pub lengths: Vec<LengthReport>,
    pub skipped_constraints: Vec<SkippedConstraint>,
    pub warnings: Vec<String>,
    /// Models that could not be decoded, with the reason.
    pub decode_failures: Vec<String>,
    pub solver_error: Option<String>,
}

impl SynthesisResult {
    pub(crate) fn new() -> Self {
        Self {
            status: RunStatus::Complete,
            solutions: Vec::new(),
            lengths: Vec::new(),
            skipped_constraints: Vec::new(),
            warnings: Vec::new(),
            decode_failures: Vec::new(),
            solver_error: None,
        }
    }

    pub fn timed_out(&self) -> bool {
        self.status == RunStatus::Timeout
    }

    pub fn solution_count(&self) -> usize {
        self.solutions.len()
    }

    /// Pretty-printed JSON for rendering and script generation.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for SynthesisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Result: {} ({} solution(s))", self.status, self.solutions.len())?;
        for (i, solution) in self.solutions.iter().enumerate() {
            writeln!(f, "--- solution {} (length {}) ---", i + 1, solution.length)?;
            write!(f, "{solution}")?;
        }
        for skipped in &self.skipped_constraints {
            writeln!(f, "skipped: {} ({})", skipped.constraint, skipped.reason)?;
        }
        if let Some(err) = &self.solver_error {
            writeln!(f, "solver error: {err}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_in_snake_case() {
        let mut result = SynthesisResult::new();
        result.status = RunStatus::SolutionLimit;
        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "solution_limit");
        assert_eq!(json["solutions"].as_array().map(Vec::len), Some(0));
        assert!(json["solver_error"].is_null());
    }

    #[test]
    fn display_flags_timeouts() {
        let mut result = SynthesisResult::new();
        result.status = RunStatus::Timeout;
        assert!(result.timed_out());
        assert!(result.to_string().starts_with("Result: TIMEOUT (0 solution(s))"));
    }
}
