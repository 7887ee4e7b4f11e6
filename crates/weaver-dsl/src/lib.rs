#![doc = include_str!("../README.md")]

pub mod ast;
pub mod errors;
pub mod parser;
pub mod templates;

pub use ast::{AtomicFormula, BinaryOp, Formula, ModalOp, Quantifier, Span, ANY_TOOL};
pub use errors::{ParseError, TemplateError};
pub use parser::{parse_formula, parse_formula_named};
pub use templates::{
    expand_template, expand_template_for_length, template_info, ConstraintSpec, Expansion,
    TemplateInfo, MAX_TEMPLATE_STEP, TEMPLATES,
};
