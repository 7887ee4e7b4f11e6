use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::backends::dimacs::{parse_dimacs_output, write_dimacs};
use crate::solver::{Problem, SatResult, SatSolver};

/// Input language an external solver reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum InputFormat {
    Dimacs,
    SmtLib,
}

#[derive(Debug, Error)]
pub enum ProcessSolverError {
    #[error("solver executable not found: {0}")]
    NotFound(String),
    #[error("solver I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("solver exited with {status}: {stderr}")]
    Crashed { status: String, stderr: String },
    #[error("failed to parse solver output: {0}")]
    UnparsableOutput(String),
    #[error("solver reads {expected:?} but was handed another encoding")]
    FormatMismatch { expected: InputFormat },
}

/// Runs an external solver binary on a temporary file. The file path is
/// passed as the last argument.
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    program: String,
    args: Vec<String>,
    format: InputFormat,
}

impl ProcessSolver {
    pub fn new(program: impl Into<String>, format: InputFormat) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            format,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn format(&self) -> InputFormat {
        self.format
    }
}

fn spawn_reader(pipe: Option<impl Read + Send + 'static>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

impl SatSolver for ProcessSolver {
    type Error = ProcessSolverError;

    fn name(&self) -> &str {
        &self.program
    }

    fn solve(
        &mut self,
        problem: &Problem,
        timeout: Option<Duration>,
    ) -> Result<SatResult, ProcessSolverError> {
        let suffix = match (problem, self.format) {
            (Problem::Cnf(_), InputFormat::Dimacs) => ".cnf",
            (Problem::Smt(_), InputFormat::SmtLib) => ".smt2",
            _ => {
                return Err(ProcessSolverError::FormatMismatch {
                    expected: self.format,
                })
            }
        };
        let mut file = tempfile::Builder::new()
            .prefix("weaver-")
            .suffix(suffix)
            .tempfile()?;
        match problem {
            Problem::Cnf(cnf) => write_dimacs(cnf, None, &mut file)?,
            Problem::Smt(script) => file.write_all(script.render().as_bytes())?,
        }
        file.flush()?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ProcessSolverError::NotFound(self.program.clone()),
                _ => ProcessSolverError::Io(e),
            })?;
        debug!(solver = %self.program, input = %file.path().display(), "solver started");

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = match timeout {
            Some(limit) => match child.wait_timeout(limit)? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(solver = %self.program, ?limit, "solver timed out");
                    return Ok(SatResult::Unknown("timeout".into()));
                }
            },
            None => child.wait()?,
        };
        let out = stdout.join().unwrap_or_default();

        let parsed = match problem {
            Problem::Cnf(_) => parse_dimacs_output(&out),
            Problem::Smt(script) => script.parse_response(&out),
        };
        parsed.map_err(|reason| {
            // SAT solvers conventionally exit with 10 or 20.
            if status.success() || matches!(status.code(), Some(10 | 20)) {
                ProcessSolverError::UnparsableOutput(reason)
            } else {
                ProcessSolverError::Crashed {
                    status: status.to_string(),
                    stderr: stderr.join().unwrap_or_default().trim().to_string(),
                }
            }
        })
    }
}
