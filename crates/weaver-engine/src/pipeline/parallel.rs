//! Parallel exploration of independent length bounds.

use std::thread;

use tracing::info;

use weaver_dsl::ConstraintSpec;
use weaver_ir::Domain;
use weaver_sat::SatSolver;

use super::enumeration::{explore_length, LengthOutcome};
use super::{merge, timeout, PipelineError, SynthesisOptions};
use crate::result::SynthesisResult;

/// Like [`super::synthesize`], but explores up to
/// `options.parallel_lengths` bounds at once, each on its own thread with
/// its own solver from `make_solver`. Results are merged shortest bound
/// first, so the output matches the sequential run.
pub fn synthesize_parallel<S, F>(
    domain: &Domain,
    constraints: &[ConstraintSpec],
    options: &SynthesisOptions,
    make_solver: F,
) -> Result<SynthesisResult, PipelineError>
where
    S: SatSolver,
    F: Fn() -> S + Sync,
{
    options.validate()?;
    let deadline = timeout::deadline_from_timeout_secs(options.timeout_secs);
    let width = options.parallel_lengths.max(1);
    let lengths: Vec<usize> = options.lengths().collect();
    let mut result = SynthesisResult::new();
    info!(width, bounds = lengths.len(), "parallel synthesis started");

    for batch in lengths.chunks(width) {
        let budget = options.max_solutions - result.solutions.len();
        let outcomes: Vec<Result<LengthOutcome, PipelineError>> = thread::scope(|scope| {
            let workers: Vec<_> = batch
                .iter()
                .map(|&length| {
                    let make_solver = &make_solver;
                    let handle = scope.spawn(move || {
                        let mut solver = make_solver();
                        explore_length(
                            domain,
                            constraints,
                            options,
                            &mut solver,
                            length,
                            budget,
                            deadline,
                        )
                    });
                    (length, handle)
                })
                .collect();
            workers
                .into_iter()
                .map(|(length, handle)| {
                    handle
                        .join()
                        .unwrap_or(Err(PipelineError::WorkerPanicked(length)))
                })
                .collect()
        });
        for outcome in outcomes {
            if merge(&mut result, outcome?, options.max_solutions) {
                info!(status = %result.status, solutions = result.solutions.len(), "parallel synthesis finished");
                return Ok(result);
            }
        }
    }
    info!(status = %result.status, solutions = result.solutions.len(), "parallel synthesis finished");
    Ok(result)
}
