//! Boolean expression trees over atom ids.
//!
//! Constructors simplify constants and flatten nested conjunctions and
//! disjunctions, so compiled constraints stay small before lowering.

use std::collections::BTreeSet;
use std::fmt;

use weaver_ir::AtomId;

use crate::cnf::Literal;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoolExpr {
    Const(bool),
    Var(AtomId),
    Not(Box<BoolExpr>),
    And(Vec<BoolExpr>),
    Or(Vec<BoolExpr>),
    Iff(Box<BoolExpr>, Box<BoolExpr>),
}

impl BoolExpr {
    pub fn var(id: AtomId) -> Self {
        BoolExpr::Var(id)
    }

    pub fn literal(lit: Literal) -> Self {
        let v = BoolExpr::Var(lit.var());
        if lit.is_positive() {
            v
        } else {
            v.not()
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        match self {
            BoolExpr::Const(b) => BoolExpr::Const(!b),
            BoolExpr::Not(inner) => *inner,
            other => BoolExpr::Not(Box::new(other)),
        }
    }

    pub fn and(items: impl IntoIterator<Item = BoolExpr>) -> Self {
        let mut out = Vec::new();
        for item in items {
            match item {
                BoolExpr::Const(true) => {}
                BoolExpr::Const(false) => return BoolExpr::Const(false),
                BoolExpr::And(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => BoolExpr::Const(true),
            1 => out.pop().unwrap_or(BoolExpr::Const(true)),
            _ => BoolExpr::And(out),
        }
    }

    pub fn or(items: impl IntoIterator<Item = BoolExpr>) -> Self {
        let mut out = Vec::new();
        for item in items {
            match item {
                BoolExpr::Const(false) => {}
                BoolExpr::Const(true) => return BoolExpr::Const(true),
                BoolExpr::Or(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => BoolExpr::Const(false),
            1 => out.pop().unwrap_or(BoolExpr::Const(false)),
            _ => BoolExpr::Or(out),
        }
    }

    pub fn implies(self, rhs: BoolExpr) -> Self {
        BoolExpr::or([self.not(), rhs])
    }

    pub fn iff(self, rhs: BoolExpr) -> Self {
        match (self, rhs) {
            (BoolExpr::Const(true), e) | (e, BoolExpr::Const(true)) => e,
            (BoolExpr::Const(false), e) | (e, BoolExpr::Const(false)) => e.not(),
            (a, b) if a == b => BoolExpr::Const(true),
            (a, b) => BoolExpr::Iff(Box::new(a), Box::new(b)),
        }
    }

    pub fn is_const(&self) -> Option<bool> {
        match self {
            BoolExpr::Const(b) => Some(*b),
            _ => None,
        }
    }

    /// The single evaluator: value under an assignment of variables.
    pub fn eval(&self, assignment: &impl Fn(AtomId) -> bool) -> bool {
        match self {
            BoolExpr::Const(b) => *b,
            BoolExpr::Var(id) => assignment(*id),
            BoolExpr::Not(inner) => !inner.eval(assignment),
            BoolExpr::And(items) => items.iter().all(|e| e.eval(assignment)),
            BoolExpr::Or(items) => items.iter().any(|e| e.eval(assignment)),
            BoolExpr::Iff(a, b) => a.eval(assignment) == b.eval(assignment),
        }
    }

    /// Variables mentioned, ascending.
    pub fn vars(&self) -> BTreeSet<AtomId> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<AtomId>) {
        match self {
            BoolExpr::Const(_) => {}
            BoolExpr::Var(id) => {
                out.insert(*id);
            }
            BoolExpr::Not(inner) => inner.collect_vars(out),
            BoolExpr::And(items) | BoolExpr::Or(items) => {
                for e in items {
                    e.collect_vars(out);
                }
            }
            BoolExpr::Iff(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        match self {
            BoolExpr::Const(_) | BoolExpr::Var(_) => 1,
            BoolExpr::Not(inner) => 1 + inner.size(),
            BoolExpr::And(items) | BoolExpr::Or(items) => {
                1 + items.iter().map(BoolExpr::size).sum::<usize>()
            }
            BoolExpr::Iff(a, b) => 1 + a.size() + b.size(),
        }
    }
}

impl fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolExpr::Const(b) => write!(f, "{b}"),
            BoolExpr::Var(id) => write!(f, "v{id}"),
            BoolExpr::Not(inner) => write!(f, "!{inner}"),
            BoolExpr::And(items) | BoolExpr::Or(items) => {
                let sep = if matches!(self, BoolExpr::And(_)) {
                    " & "
                } else {
                    " | "
                };
                write!(f, "(")?;
                for (i, e) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{sep}")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            BoolExpr::Iff(a, b) => write!(f, "({a} <-> {b})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(n: u32) -> BoolExpr {
        BoolExpr::var(AtomId::new(n))
    }

    #[test]
    fn constructors_fold_constants() {
        assert_eq!(BoolExpr::and([v(1), BoolExpr::Const(true)]), v(1));
        assert_eq!(
            BoolExpr::and([v(1), BoolExpr::Const(false)]),
            BoolExpr::Const(false)
        );
        assert_eq!(BoolExpr::or(Vec::new()), BoolExpr::Const(false));
        assert_eq!(BoolExpr::and(Vec::new()), BoolExpr::Const(true));
        assert_eq!(v(1).not().not(), v(1));
        assert_eq!(v(2).iff(BoolExpr::Const(false)), v(2).not());
        assert_eq!(v(2).iff(v(2)), BoolExpr::Const(true));
    }

    #[test]
    fn nested_connectives_flatten() {
        let e = BoolExpr::or([v(1), BoolExpr::or([v(2), v(3)])]);
        assert_eq!(e, BoolExpr::Or(vec![v(1), v(2), v(3)]));
        assert_eq!(e.size(), 4);
    }

    #[test]
    fn eval_and_vars() {
        let e = v(1).implies(v(2)).iff(v(3));
        let assign = |id: AtomId| id.get() != 2;
        assert!(!e.eval(&assign));
        let ids: Vec<u32> = e.vars().into_iter().map(AtomId::get).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(e.to_string(), "((!v1 | v2) <-> v3)");
    }
}
