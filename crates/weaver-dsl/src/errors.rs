#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use crate::ast::Span;

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("Syntax error: {message}")]
    #[diagnostic(code(weaver::parse::syntax))]
    Syntax {
        message: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Variable ?{name} is already bound by an enclosing quantifier")]
    #[diagnostic(
        code(weaver::parse::rebound_variable),
        help("rename the inner variable")
    )]
    ReboundVariable {
        name: String,
        #[label("shadows an outer binding")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, span: Span, source: &str, filename: &str) -> Self {
        ParseError::Syntax {
            message: message.into(),
            span: (span.start, span.end.saturating_sub(span.start)).into(),
            src: miette::NamedSource::new(filename, source.to_owned()),
        }
    }

    pub fn rebound(name: impl Into<String>, span: Span, source: &str, filename: &str) -> Self {
        ParseError::ReboundVariable {
            name: name.into(),
            span: (span.start, span.end.saturating_sub(span.start)).into(),
            src: miette::NamedSource::new(filename, source.to_owned()),
        }
    }
}

/// Errors raised while expanding a constraint template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown constraint template '{0}'")]
    Unknown(String),
    #[error("template '{id}' expects {expected} parameter(s), got {found}")]
    Arity {
        id: String,
        expected: usize,
        found: usize,
    },
    #[error("template '{id}': invalid parameter '{value}': {reason}")]
    BadParameter {
        id: String,
        value: String,
        reason: String,
    },
}
