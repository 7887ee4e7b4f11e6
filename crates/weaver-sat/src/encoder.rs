//! One length bound worth of encoding: structural clauses plus compiled
//! user constraints, lowered on demand to DIMACS or SMT-LIB.

pub mod formula;
pub mod structural;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use weaver_dsl::{
    expand_template_for_length, parse_formula, ConstraintSpec, Expansion, Formula, TemplateError,
};
use weaver_ir::atoms::DEFAULT_AUX_WATERMARK;
use weaver_ir::{AtomSpace, Automaton, Domain, FrozenAtomSpace};

use crate::backends::smtlib::SmtScript;
use crate::cnf::Cnf;
use crate::errors::ConstraintError;
use crate::expr::BoolExpr;
use crate::solver::Problem;
use crate::tseitin::Tseitin;

use self::formula::Compiler;
use self::structural::Structural;

/// How many of a group of data slots must be consumed by some tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsePolicy {
    /// Every non-empty slot is consumed.
    #[default]
    All,
    /// At least one slot of each group is consumed.
    One,
    /// No requirement.
    None,
}

/// Target representation of a lowered encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Cnf,
    Smt,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EncodingOptions {
    pub use_workflow_input: UsePolicy,
    pub use_generated_data: UsePolicy,
    /// First id handed to named atoms; auxiliaries are numbered below it.
    pub aux_watermark: u32,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            use_workflow_input: UsePolicy::All,
            use_generated_data: UsePolicy::One,
            aux_watermark: DEFAULT_AUX_WATERMARK,
        }
    }
}

/// A constraint that was left out of the encoding, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedConstraint {
    pub constraint: String,
    pub reason: String,
}

/// Encoding of a synthesis problem for one length bound.
#[derive(Debug)]
pub struct Encoding<'d> {
    domain: &'d Domain,
    automaton: Automaton,
    space: AtomSpace,
    structural: Cnf,
    constraints: Vec<BoolExpr>,
    skipped: Vec<SkippedConstraint>,
    warnings: Vec<String>,
}

impl<'d> Encoding<'d> {
    /// Create the atoms and structural clauses for `automaton`.
    pub fn new(
        domain: &'d Domain,
        automaton: Automaton,
        options: &EncodingOptions,
    ) -> Result<Self, ConstraintError> {
        let mut space = AtomSpace::with_watermark(options.aux_watermark)?;
        let mut structural = Cnf::new();
        let mut warnings = Vec::new();
        Structural::new(domain, &automaton, &mut space, &mut structural)
            .encode(options, &mut warnings)?;
        info!(
            length = automaton.length(),
            atoms = space.len(),
            clauses = structural.len(),
            "structural encoding done"
        );
        Ok(Self {
            domain,
            automaton,
            space,
            structural,
            constraints: Vec::new(),
            skipped: Vec::new(),
            warnings,
        })
    }

    /// Add a user constraint. Templates without an encoding and unknown
    /// template ids are recorded as skipped; everything else that fails
    /// aborts.
    pub fn add_constraint(&mut self, spec: &ConstraintSpec) -> Result<(), ConstraintError> {
        let formula = match spec {
            ConstraintSpec::Template { id, parameters } => match expand_template_for_length(
                id,
                parameters,
                self.automaton.length(),
            ) {
                Ok(Expansion::Formula(f)) => f,
                Ok(Expansion::Unsupported { reason, .. }) => {
                    warn!(constraint = %spec, %reason, "constraint skipped");
                    self.skip(spec, reason);
                    return Ok(());
                }
                Err(err @ TemplateError::Unknown(_)) => {
                    warn!(constraint = %spec, "unknown template skipped");
                    self.skip(spec, err.to_string());
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            },
            ConstraintSpec::Formula { formula } => parse_formula(formula)?,
        };
        self.add_formula(&formula)
    }

    fn skip(&mut self, spec: &ConstraintSpec, reason: String) {
        self.skipped.push(SkippedConstraint {
            constraint: spec.to_string(),
            reason,
        });
    }

    /// Compile `formula` at the first step and assert it.
    pub fn add_formula(&mut self, formula: &Formula) -> Result<(), ConstraintError> {
        let mut definitions = Vec::new();
        let expr = Compiler::new(self.domain, &self.automaton, &mut self.space, &mut definitions)
            .compile_root(formula)?;
        debug!(size = expr.size(), definitions = definitions.len(), "constraint compiled");
        self.constraints.extend(definitions);
        self.constraints.push(expr);
        Ok(())
    }

    pub fn domain(&self) -> &'d Domain {
        self.domain
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub fn space(&self) -> &AtomSpace {
        &self.space
    }

    pub fn structural(&self) -> &Cnf {
        &self.structural
    }

    /// Compiled constraints, equality definitions included.
    pub fn constraints(&self) -> &[BoolExpr] {
        &self.constraints
    }

    pub fn skipped(&self) -> &[SkippedConstraint] {
        &self.skipped
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Finish the encoding. The atom space is frozen afterwards, so the
    /// decoder sees exactly the atoms the solver saw.
    pub fn lower(self, backend: Backend) -> Result<Lowered, ConstraintError> {
        let Encoding {
            domain,
            automaton,
            mut space,
            structural,
            constraints,
            skipped,
            warnings,
        } = self;
        let problem = match backend {
            Backend::Cnf => {
                let mut cnf = structural;
                let mut tseitin = Tseitin::new(&mut space, &mut cnf);
                for expr in &constraints {
                    tseitin.assert(expr)?;
                }
                debug!(auxiliaries = tseitin.auxiliaries(), "constraints lowered to cnf");
                Problem::Cnf(cnf)
            }
            Backend::Smt => Problem::Smt(SmtScript::build(
                &space,
                automaton.states().len(),
                domain.taxonomy().len(),
                &structural,
                &constraints,
            )),
        };
        Ok(Lowered {
            problem,
            space: space.freeze(),
            automaton,
            skipped,
            warnings,
        })
    }
}

/// An encoding handed over to a solver, with what the decoder needs.
#[derive(Debug)]
pub struct Lowered {
    pub problem: Problem,
    pub space: FrozenAtomSpace,
    pub automaton: Automaton,
    pub skipped: Vec<SkippedConstraint>,
    pub warnings: Vec<String>,
}
