/// Abstract SMT term representation, solver-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtTerm {
    /// Constant or variable reference by name.
    Var(String),
    BoolLit(bool),
    /// Bit-vector literal of the given width.
    BvLit { value: u64, width: u32 },
    /// Application of a declared function.
    App(String, Vec<SmtTerm>),

    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Eq(Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn bv(value: u64, width: u32) -> Self {
        SmtTerm::BvLit { value, width }
    }

    pub fn app(name: impl Into<String>, args: Vec<SmtTerm>) -> Self {
        SmtTerm::App(name.into(), args)
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::And(terms)
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(terms)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }
}
