use thiserror::Error;

use weaver_dsl::{ParseError, TemplateError};
use weaver_ir::{AtomSpaceError, DomainError};

/// Errors that abort the encoding of a run.
#[derive(Debug, Error)]
pub enum ConstraintError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to parse constraint formula")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("variable ?{0} is not bound by any quantifier")]
    UnboundVariable(String),

    #[error("'{name}' cannot take {inputs} input and {outputs} output argument(s)")]
    PredicateArity {
        name: String,
        inputs: usize,
        outputs: usize,
    },

    #[error("'{name}' is a {found} predicate, expected {expected}")]
    WrongPredicateKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    AtomSpace(#[from] AtomSpaceError),
}
