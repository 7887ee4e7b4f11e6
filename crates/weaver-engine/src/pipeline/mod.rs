//! Synthesis pipeline.
//!
//! Length bounds are tried in increasing order. Each bound gets its own
//! automaton, atom space and encoding; its models are enumerated one by one,
//! each decoded and then ruled out by a blocking clause.

mod enumeration;
mod parallel;
mod timeout;

use std::io;
use std::ops::RangeInclusive;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use weaver_dsl::ConstraintSpec;
use weaver_ir::atoms::DEFAULT_AUX_WATERMARK;
use weaver_ir::Domain;
use weaver_sat::{Backend, ConstraintError, EncodingOptions, SatSolver, UsePolicy};

use crate::result::{RunStatus, SynthesisResult};

use self::enumeration::{explore_length, LengthOutcome};
pub use self::parallel::synthesize_parallel;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Constraint error: {0}")]
    Constraint(#[from] ConstraintError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error("Worker for length {0} panicked")]
    WorkerPanicked(usize),
}

/// Which atoms a blocking clause negates after a model is found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingMode {
    /// Every named atom: solutions differ somewhere in tools or data flow.
    #[default]
    FullModel,
    /// Tool atoms only: every solution has a distinct tool sequence.
    ToolSequence,
}

/// Options of one synthesis run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SynthesisOptions {
    pub min_length: usize,
    pub max_length: usize,
    pub max_solutions: usize,
    /// Input branching. Defaults to what the domain needs.
    pub max_inputs: Option<usize>,
    /// Output branching. Defaults to what the domain needs.
    pub max_outputs: Option<usize>,
    /// Overall deadline in seconds; 0 disables it.
    pub timeout_secs: u64,
    pub backend: Backend,
    pub blocking: BlockingMode,
    pub use_workflow_input: UsePolicy,
    pub use_generated_data: UsePolicy,
    pub aux_watermark: u32,
    /// Length bounds explored at once by [`synthesize_parallel`].
    pub parallel_lengths: usize,
    /// Directory receiving the DIMACS or SMT-LIB text of every bound.
    pub dump_encoding: Option<PathBuf>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            min_length: 1,
            max_length: 10,
            max_solutions: 100,
            max_inputs: None,
            max_outputs: None,
            timeout_secs: 300,
            backend: Backend::Cnf,
            blocking: BlockingMode::FullModel,
            use_workflow_input: UsePolicy::All,
            use_generated_data: UsePolicy::One,
            aux_watermark: DEFAULT_AUX_WATERMARK,
            parallel_lengths: 1,
            dump_encoding: None,
        }
    }
}

impl SynthesisOptions {
    pub fn encoding_options(&self) -> EncodingOptions {
        EncodingOptions {
            use_workflow_input: self.use_workflow_input,
            use_generated_data: self.use_generated_data,
            aux_watermark: self.aux_watermark,
        }
    }

    /// Length bounds to try. A minimum of 0 is raised to 1.
    pub fn lengths(&self) -> RangeInclusive<usize> {
        self.min_length.max(1)..=self.max_length
    }

    /// Input and output branching. Workflow outputs are read through the
    /// input slots of the sink and workflow inputs sit in an output-sized
    /// block, hence the crossover.
    pub fn branching(&self, domain: &Domain) -> (usize, usize) {
        let inputs = self
            .max_inputs
            .unwrap_or_else(|| domain.max_tool_inputs().max(domain.outputs().len()));
        let outputs = self
            .max_outputs
            .unwrap_or_else(|| domain.max_tool_outputs().max(domain.inputs().len()));
        (inputs.max(1), outputs.max(1))
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_length < self.min_length.max(1) {
            return Err(PipelineError::InvalidOptions(format!(
                "max_length {} is below min_length {}",
                self.max_length,
                self.min_length.max(1)
            )));
        }
        if self.max_solutions == 0 {
            return Err(PipelineError::InvalidOptions(
                "max_solutions must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Run the synthesis over every length bound, shortest first, with one
/// solver reused across bounds.
pub fn synthesize<S: SatSolver>(
    domain: &Domain,
    constraints: &[ConstraintSpec],
    options: &SynthesisOptions,
    solver: &mut S,
) -> Result<SynthesisResult, PipelineError> {
    options.validate()?;
    let deadline = timeout::deadline_from_timeout_secs(options.timeout_secs);
    let mut result = SynthesisResult::new();
    info!(
        solver = solver.name(),
        min_length = options.min_length,
        max_length = options.max_length,
        constraints = constraints.len(),
        "synthesis started"
    );
    for length in options.lengths() {
        let budget = options.max_solutions - result.solutions.len();
        let outcome = explore_length(domain, constraints, options, solver, length, budget, deadline)?;
        if merge(&mut result, outcome, options.max_solutions) {
            break;
        }
    }
    info!(status = %result.status, solutions = result.solutions.len(), "synthesis finished");
    Ok(result)
}

/// Fold one bound's outcome into the run result. Returns whether the run
/// should stop.
fn merge(result: &mut SynthesisResult, outcome: LengthOutcome, max_solutions: usize) -> bool {
    let LengthOutcome {
        report,
        solutions,
        skipped,
        warnings,
        decode_failures,
        stop,
    } = outcome;
    info!(
        length = report.length,
        vars = report.vars,
        clauses = report.clauses,
        solutions = report.solutions,
        elapsed_ms = report.elapsed_ms,
        "length explored"
    );
    result.lengths.push(report);
    for s in skipped {
        if !result.skipped_constraints.contains(&s) {
            result.skipped_constraints.push(s);
        }
    }
    for w in warnings {
        if !result.warnings.contains(&w) {
            result.warnings.push(w);
        }
    }
    result.decode_failures.extend(decode_failures);
    result.solutions.extend(solutions);

    if let Some(stop) = stop {
        match stop {
            Stop::Timeout => result.status = RunStatus::Timeout,
            Stop::SolverFailed(err) => {
                result.status = RunStatus::SolverFailed;
                result.solver_error = Some(err);
            }
        }
        return true;
    }
    if result.solutions.len() >= max_solutions {
        result.solutions.truncate(max_solutions);
        result.status = RunStatus::SolutionLimit;
        return true;
    }
    false
}

/// Abnormal end of a bound's enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Stop {
    Timeout,
    SolverFailed(String),
}
