//! Model enumeration for one length bound.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use weaver_dsl::ConstraintSpec;
use weaver_ir::{AtomKind, AtomSpace, AutomatonBuilder, Domain};
use weaver_sat::backends::render_dimacs;
use weaver_sat::{Clause, Encoding, Literal, Lowered, Model, Problem, SatResult, SatSolver, SkippedConstraint};

use super::timeout;
use super::{BlockingMode, PipelineError, Stop, SynthesisOptions};
use crate::decoder::decode;
use crate::result::LengthReport;
use crate::workflow::WorkflowGraph;

/// Everything one length bound contributes to the run result.
#[derive(Debug)]
pub(crate) struct LengthOutcome {
    pub(crate) report: LengthReport,
    pub(crate) solutions: Vec<WorkflowGraph>,
    pub(crate) skipped: Vec<SkippedConstraint>,
    pub(crate) warnings: Vec<String>,
    pub(crate) decode_failures: Vec<String>,
    pub(crate) stop: Option<Stop>,
}

/// Encode the bound `length` and enumerate up to `budget` of its models.
pub(crate) fn explore_length<S: SatSolver>(
    domain: &Domain,
    constraints: &[ConstraintSpec],
    options: &SynthesisOptions,
    solver: &mut S,
    length: usize,
    budget: usize,
    deadline: Option<Instant>,
) -> Result<LengthOutcome, PipelineError> {
    let started = Instant::now();
    let (inputs, outputs) = options.branching(domain);
    let automaton = AutomatonBuilder::new(length, inputs, outputs).build();
    let mut encoding = Encoding::new(domain, automaton, &options.encoding_options())?;
    for spec in constraints {
        encoding.add_constraint(spec)?;
    }
    let Lowered {
        mut problem,
        space,
        automaton,
        skipped,
        warnings,
    } = encoding.lower(options.backend)?;

    if let Some(dir) = &options.dump_encoding {
        dump(dir, length, &problem, &space)?;
    }
    let vars = match &problem {
        Problem::Cnf(cnf) => space.max_id().max(cnf.max_var()),
        Problem::Smt(_) => space.max_id(),
    };
    let clauses = problem.clause_count();
    debug!(length, vars, clauses, "encoding ready");

    let mut solutions = Vec::new();
    let mut decode_failures = Vec::new();
    let mut stop = None;
    while solutions.len() < budget {
        let remaining = timeout::remaining(deadline);
        if remaining == Some(Duration::ZERO) {
            stop = Some(Stop::Timeout);
            break;
        }
        let model = match solver.solve(&problem, remaining) {
            Ok(SatResult::Sat(model)) => model,
            Ok(SatResult::Unsat) => break,
            Ok(SatResult::Unknown(reason)) => {
                stop = Some(if timeout::deadline_exceeded(deadline) || reason == "timeout" {
                    Stop::Timeout
                } else {
                    Stop::SolverFailed(format!("solver gave up at length {length}: {reason}"))
                });
                break;
            }
            Err(err) => {
                warn!(length, solver = solver.name(), error = %err, "solver failed");
                stop = Some(Stop::SolverFailed(err.to_string()));
                break;
            }
        };
        match decode(&model, &space, &automaton, domain) {
            Ok(graph) => solutions.push(graph),
            Err(err) => {
                warn!(length, error = %err, "model could not be decoded");
                decode_failures.push(format!("length {length}: {err}"));
            }
        }
        let block = blocking_clause(&model, &space, domain, options.blocking);
        if block.is_empty() {
            break;
        }
        problem.block(block);
    }

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    Ok(LengthOutcome {
        report: LengthReport {
            length,
            vars,
            clauses,
            solutions: solutions.len(),
            elapsed_ms,
        },
        solutions,
        skipped,
        warnings,
        decode_failures,
        stop,
    })
}

/// Clause ruling out `model`: the negated assignment of every named atom,
/// or of the concrete tool atoms only.
pub(crate) fn blocking_clause(
    model: &Model,
    space: &AtomSpace,
    domain: &Domain,
    mode: BlockingMode,
) -> Clause {
    let literals = space
        .iter()
        .filter(|(_, atom)| match mode {
            BlockingMode::FullModel => true,
            BlockingMode::ToolSequence => {
                atom.kind == AtomKind::Module
                    && atom.predicate.is_some_and(|p| domain.tool(p).is_some())
            }
        })
        .map(|(id, _)| {
            if model.is_true(id) {
                Literal::neg(id)
            } else {
                Literal::pos(id)
            }
        })
        .collect();
    Clause::new(literals)
}

fn dump(dir: &Path, length: usize, problem: &Problem, space: &AtomSpace) -> Result<(), PipelineError> {
    fs::create_dir_all(dir)?;
    let (name, text) = match problem {
        Problem::Cnf(cnf) => (format!("weaver_len{length}.cnf"), render_dimacs(cnf, Some(space))),
        Problem::Smt(script) => (format!("weaver_len{length}.smt2"), script.render()),
    };
    let path = dir.join(name);
    fs::write(&path, text)?;
    debug!(path = %path.display(), "encoding dumped");
    Ok(())
}
