use serde::Serialize;
use std::fmt;

/// Name standing for any tool.
pub const ANY_TOOL: &str = "*";

/// Source span for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Atomic proposition. Variables are stored without the leading `?`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AtomicFormula {
    /// `Name`, `Name(?a,?b)` or `Name(?a;?c)`. Whether the name is a tool or
    /// a data type is decided against the taxonomy at compile time.
    Predicate {
        name: String,
        inputs: Vec<String>,
        outputs: Vec<String>,
        has_args: bool,
    },
    /// `R(?a,?b)`: `derived` derives from `source`.
    Dependency { source: String, derived: String },
    /// `?a = ?b`
    Equality(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    And,
    Or,
    Implies,
    Iff,
    Until,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::And => write!(f, "&"),
            BinaryOp::Or => write!(f, "|"),
            BinaryOp::Implies => write!(f, "->"),
            BinaryOp::Iff => write!(f, "<->"),
            BinaryOp::Until => write!(f, "U"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Quantifier {
    Exists,
    Forall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModalOp {
    /// Globally: at every step from now on.
    Always,
    /// Finally: at some step from now on.
    Eventually,
    /// At the next step; false at the last one.
    Next,
}

impl fmt::Display for ModalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModalOp::Always => write!(f, "G"),
            ModalOp::Eventually => write!(f, "F"),
            ModalOp::Next => write!(f, "X"),
        }
    }
}

/// Parsed constraint formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Formula {
    Literal(bool),
    Atom(AtomicFormula),
    Not(Box<Formula>),
    Binary {
        op: BinaryOp,
        lhs: Box<Formula>,
        rhs: Box<Formula>,
    },
    Quantified {
        quantifier: Quantifier,
        variable: String,
        body: Box<Formula>,
    },
    Modal {
        op: ModalOp,
        body: Box<Formula>,
    },
}

impl Formula {
    /// Bare predicate reference, e.g. a tool used now.
    pub fn name(name: impl Into<String>) -> Self {
        Formula::Atom(AtomicFormula::Predicate {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            has_args: false,
        })
    }

    /// Predicate applied to input and output variables.
    pub fn apply(name: impl Into<String>, inputs: &[&str], outputs: &[&str]) -> Self {
        Formula::Atom(AtomicFormula::Predicate {
            name: name.into(),
            inputs: inputs.iter().map(|v| v.to_string()).collect(),
            outputs: outputs.iter().map(|v| v.to_string()).collect(),
            has_args: true,
        })
    }

    pub fn negate(self) -> Self {
        Formula::Not(Box::new(self))
    }

    pub fn and(self, rhs: Formula) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn or(self, rhs: Formula) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    pub fn implies(self, rhs: Formula) -> Self {
        self.binary(BinaryOp::Implies, rhs)
    }

    pub fn until(self, rhs: Formula) -> Self {
        self.binary(BinaryOp::Until, rhs)
    }

    fn binary(self, op: BinaryOp, rhs: Formula) -> Self {
        Formula::Binary {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    pub fn always(self) -> Self {
        self.modal(ModalOp::Always)
    }

    pub fn eventually(self) -> Self {
        self.modal(ModalOp::Eventually)
    }

    pub fn next(self) -> Self {
        self.modal(ModalOp::Next)
    }

    fn modal(self, op: ModalOp) -> Self {
        Formula::Modal {
            op,
            body: Box::new(self),
        }
    }

    pub fn exists(variable: impl Into<String>, body: Formula) -> Self {
        Formula::Quantified {
            quantifier: Quantifier::Exists,
            variable: variable.into(),
            body: Box::new(body),
        }
    }

    pub fn forall(variable: impl Into<String>, body: Formula) -> Self {
        Formula::Quantified {
            quantifier: Quantifier::Forall,
            variable: variable.into(),
            body: Box::new(body),
        }
    }

    /// Nesting depth of modal operators.
    pub fn modal_depth(&self) -> usize {
        match self {
            Formula::Literal(_) | Formula::Atom(_) => 0,
            Formula::Not(inner) => inner.modal_depth(),
            Formula::Quantified { body, .. } => body.modal_depth(),
            Formula::Binary { op, lhs, rhs } => {
                let inner = lhs.modal_depth().max(rhs.modal_depth());
                if *op == BinaryOp::Until {
                    inner + 1
                } else {
                    inner
                }
            }
            Formula::Modal { body, .. } => body.modal_depth() + 1,
        }
    }
}

const KEYWORDS: &[&str] = &["true", "false", "G", "F", "X", "U", "Exists", "Forall"];

fn needs_quotes(name: &str) -> bool {
    if name == ANY_TOOL {
        return false;
    }
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    !(head_ok && tail_ok) || KEYWORDS.contains(&name)
}

fn fmt_vars(f: &mut fmt::Formatter<'_>, vars: &[String]) -> fmt::Result {
    for (i, v) in vars.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "?{v}")?;
    }
    Ok(())
}

impl fmt::Display for AtomicFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomicFormula::Predicate {
                name,
                inputs,
                outputs,
                has_args,
            } => {
                // `R` with two inputs would read back as a dependency.
                let reserved = name == "R" && inputs.len() == 2 && outputs.is_empty();
                if needs_quotes(name) || reserved {
                    write!(f, "'{name}'")?;
                } else {
                    write!(f, "{name}")?;
                }
                if *has_args {
                    write!(f, "(")?;
                    fmt_vars(f, inputs)?;
                    if !outputs.is_empty() {
                        write!(f, ";")?;
                        fmt_vars(f, outputs)?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            AtomicFormula::Dependency { source, derived } => write!(f, "R(?{source},?{derived})"),
            AtomicFormula::Equality(a, b) => write!(f, "?{a} = ?{b}"),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Literal(b) => write!(f, "{b}"),
            Formula::Atom(AtomicFormula::Equality(a, b)) => write!(f, "(?{a} = ?{b})"),
            Formula::Atom(atom) => write!(f, "{atom}"),
            Formula::Not(inner) => write!(f, "!{inner}"),
            Formula::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Formula::Quantified {
                quantifier,
                variable,
                body,
            } => {
                let q = match quantifier {
                    Quantifier::Exists => "Exists",
                    Quantifier::Forall => "Forall",
                };
                write!(f, "{q}(?{variable}) {body}")
            }
            Formula::Modal { op, body } => write!(f, "{op} {body}"),
        }
    }
}
