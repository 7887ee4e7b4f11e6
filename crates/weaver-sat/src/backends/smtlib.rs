//! SMT-LIB assertion backend.
//!
//! Every atom kind becomes one uninterpreted boolean function over
//! bit-vector encoded state and predicate indices, so a module atom reads
//! `(module (_ bv2 3) (_ bv1 2))`. The null state is encoded as the index one
//! past the last real state.

use std::collections::{BTreeSet, HashMap};

use weaver_ir::{Atom, AtomId, AtomKind, AtomSpace, StateId};

use crate::cnf::{Clause, Cnf, Literal};
use crate::expr::BoolExpr;
use crate::solver::{Model, SatResult};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

const KINDS: [AtomKind; 6] = [
    AtomKind::Module,
    AtomKind::MemoryType,
    AtomKind::UsedType,
    AtomKind::MemTypeReference,
    AtomKind::TypeDependency,
    AtomKind::TypeEquality,
];

/// A complete `QF_UFBV` script plus what is needed to read the answer back.
#[derive(Debug, Clone)]
pub struct SmtScript {
    preamble: Vec<String>,
    assertions: Vec<String>,
    terms: HashMap<AtomId, SmtTerm>,
    queries: Vec<AtomId>,
    declared_aux: BTreeSet<AtomId>,
}

impl SmtScript {
    /// Build the script for one length bound. `state_count` is the number of
    /// automaton states, `predicate_count` the taxonomy size.
    pub fn build(
        space: &AtomSpace,
        state_count: usize,
        predicate_count: usize,
        structural: &Cnf,
        constraints: &[BoolExpr],
    ) -> Self {
        let sw = SmtSort::width_for(state_count + 1);
        let pw = SmtSort::width_for(predicate_count);
        let (state_sort, pred_sort) = (SmtSort::BitVec(sw), SmtSort::BitVec(pw));

        let mut preamble = vec![
            "(set-logic QF_UFBV)".to_string(),
            "(set-option :produce-models true)".to_string(),
        ];
        for kind in KINDS {
            let second = match kind {
                AtomKind::Module | AtomKind::MemoryType | AtomKind::UsedType => pred_sort,
                _ => state_sort,
            };
            preamble.push(format!("(declare-fun {kind} ({state_sort} {second}) {})", SmtSort::Bool));
        }

        let state_index = |s: StateId| -> u64 {
            if s.is_null() {
                state_count as u64
            } else {
                s.order() as u64
            }
        };
        let mut terms = HashMap::with_capacity(space.len());
        let mut queries = Vec::with_capacity(space.len());
        for (id, atom) in space.iter() {
            terms.insert(id, atom_term(atom, sw, pw, &state_index));
            queries.push(id);
        }

        let mut script = Self {
            preamble,
            assertions: Vec::with_capacity(structural.len() + constraints.len()),
            terms,
            queries,
            declared_aux: BTreeSet::new(),
        };
        for clause in structural.clauses() {
            let term = script.clause_term(clause.literals());
            script.assert(term);
        }
        for expr in constraints {
            let term = script.expr_term(expr);
            script.assert(term);
        }
        script
    }

    fn assert(&mut self, term: SmtTerm) {
        self.assertions.push(format!("(assert {})", to_smtlib(&term)));
    }

    fn var_term(&mut self, id: AtomId) -> SmtTerm {
        if let Some(term) = self.terms.get(&id) {
            return term.clone();
        }
        if self.declared_aux.insert(id) {
            self.preamble.push(format!("(declare-const aux_{id} {})", SmtSort::Bool));
        }
        SmtTerm::var(format!("aux_{id}"))
    }

    fn literal_term(&mut self, lit: Literal) -> SmtTerm {
        let term = self.var_term(lit.var());
        if lit.is_positive() {
            term
        } else {
            term.not()
        }
    }

    fn clause_term(&mut self, literals: &[Literal]) -> SmtTerm {
        SmtTerm::or(literals.iter().map(|l| self.literal_term(*l)).collect())
    }

    fn expr_term(&mut self, expr: &BoolExpr) -> SmtTerm {
        match expr {
            BoolExpr::Const(b) => SmtTerm::bool(*b),
            BoolExpr::Var(id) => self.var_term(*id),
            BoolExpr::Not(inner) => self.expr_term(inner).not(),
            BoolExpr::And(items) => SmtTerm::and(items.iter().map(|e| self.expr_term(e)).collect()),
            BoolExpr::Or(items) => SmtTerm::or(items.iter().map(|e| self.expr_term(e)).collect()),
            BoolExpr::Iff(a, b) => {
                let a = self.expr_term(a);
                a.eq(self.expr_term(b))
            }
        }
    }

    /// Add a blocking assertion.
    pub fn block(&mut self, clause: &Clause) {
        let term = self.clause_term(clause.literals());
        self.assert(term);
    }

    pub fn assertion_count(&self) -> usize {
        self.assertions.len()
    }

    /// Atom ids in the order of the `get-value` query.
    pub fn queries(&self) -> &[AtomId] {
        &self.queries
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.preamble.iter().chain(&self.assertions) {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("(check-sat)\n");
        if !self.queries.is_empty() {
            let query: Vec<String> = self
                .queries
                .iter()
                .filter_map(|id| self.terms.get(id))
                .map(to_smtlib)
                .collect();
            out.push_str(&format!("(get-value ({}))\n", query.join(" ")));
        }
        out
    }

    /// Read a solver answer: a status line, then the `get-value` pairs in
    /// query order.
    pub fn parse_response(&self, output: &str) -> Result<SatResult, String> {
        let trimmed = output.trim_start();
        let (status, rest) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));
        match status {
            "unsat" => return Ok(SatResult::Unsat),
            "unknown" => return Ok(SatResult::Unknown("solver answered unknown".into())),
            "timeout" => return Ok(SatResult::Unknown("timeout".into())),
            "sat" => {}
            other => return Err(format!("unexpected solver status '{other}'")),
        }
        if self.queries.is_empty() {
            return Ok(SatResult::Sat(Model::default()));
        }
        let values = match parse_sexp(rest)? {
            Sexp::List(items) => items,
            Sexp::Atom(a) => return Err(format!("expected a value list, found '{a}'")),
        };
        if values.len() != self.queries.len() {
            return Err(format!(
                "expected {} values, found {}",
                self.queries.len(),
                values.len()
            ));
        }
        let mut true_vars = Vec::new();
        for (id, pair) in self.queries.iter().zip(values) {
            match pair {
                Sexp::List(mut parts) if parts.len() == 2 => match parts.pop() {
                    Some(Sexp::Atom(v)) if v == "true" => true_vars.push(*id),
                    Some(Sexp::Atom(v)) if v == "false" => {}
                    other => return Err(format!("bad value for atom {id}: {other:?}")),
                },
                other => return Err(format!("bad value pair for atom {id}: {other:?}")),
            }
        }
        Ok(SatResult::Sat(Model::new(true_vars)))
    }
}

fn atom_term(atom: &Atom, sw: u32, pw: u32, state_index: impl Fn(StateId) -> u64) -> SmtTerm {
    let first = SmtTerm::bv(state_index(atom.state), sw);
    let second = match (atom.predicate, atom.state2) {
        (Some(p), _) => SmtTerm::bv(p as u64, pw),
        (None, Some(s2)) => SmtTerm::bv(state_index(s2), sw),
        (None, None) => SmtTerm::bv(0, pw),
    };
    SmtTerm::app(atom.kind.to_string(), vec![first, second])
}

/// Print an SmtTerm as SMT-LIB2 format.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => name.clone(),
        SmtTerm::BoolLit(b) => b.to_string(),
        SmtTerm::BvLit { value, width } => format!("(_ bv{value} {width})"),
        SmtTerm::App(name, args) => {
            let inner: Vec<String> = args.iter().map(to_smtlib).collect();
            format!("({name} {})", inner.join(" "))
        }
        SmtTerm::And(terms) => match terms.len() {
            0 => "true".to_string(),
            1 => to_smtlib(&terms[0]),
            _ => {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(and {})", inner.join(" "))
            }
        },
        SmtTerm::Or(terms) => match terms.len() {
            0 => "false".to_string(),
            1 => to_smtlib(&terms[0]),
            _ => {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(or {})", inner.join(" "))
            }
        },
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Eq(lhs, rhs) => format!("(= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

fn parse_sexp(text: &str) -> Result<Sexp, String> {
    let mut stack: Vec<Vec<Sexp>> = Vec::new();
    let mut token = String::new();
    let flush = |token: &mut String, stack: &mut Vec<Vec<Sexp>>| {
        if !token.is_empty() {
            if let Some(top) = stack.last_mut() {
                top.push(Sexp::Atom(std::mem::take(token)));
            }
        }
    };
    for c in text.chars() {
        match c {
            '(' => {
                flush(&mut token, &mut stack);
                stack.push(Vec::new());
            }
            ')' => {
                flush(&mut token, &mut stack);
                let done = stack.pop().ok_or("unbalanced ')'")?;
                match stack.last_mut() {
                    Some(parent) => parent.push(Sexp::List(done)),
                    None => return Ok(Sexp::List(done)),
                }
            }
            c if c.is_whitespace() => flush(&mut token, &mut stack),
            c => token.push(c),
        }
    }
    Err("unterminated value list".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use weaver_ir::AutomatonBuilder;

    fn small_script() -> (SmtScript, AtomId, AtomId) {
        let automaton = AutomatonBuilder::new(1, 1, 1).build();
        let mut space = AtomSpace::new();
        let a = space.add_module(1, automaton.modules()[0]);
        let b = space.add(Atom::reference(automaton.sink()[0], StateId::NULL));
        let mut cnf = Cnf::new();
        cnf.add(vec![Literal::pos(a), Literal::neg(b)]);
        let script = SmtScript::build(
            &space,
            automaton.states().len(),
            3,
            &cnf,
            &[BoolExpr::var(a).iff(BoolExpr::var(b))],
        );
        (script, a, b)
    }

    #[test]
    fn renders_declarations_and_queries() {
        let (script, _, _) = small_script();
        let text = script.render();
        assert!(text.starts_with("(set-logic QF_UFBV)"));
        assert!(text.contains("(declare-fun module ((_ BitVec 3) (_ BitVec 2)) Bool)"));
        assert!(text.contains("(declare-fun ref ((_ BitVec 3) (_ BitVec 3)) Bool)"));
        // 5 states, so null is index 5
        assert!(text.contains("(assert (or (module (_ bv2 3) (_ bv1 2)) (not (ref (_ bv4 3) (_ bv5 3)))))"));
        assert!(text.contains("(assert (= (module (_ bv2 3) (_ bv1 2)) (ref (_ bv4 3) (_ bv5 3))))"));
        assert!(text.contains("(check-sat)\n(get-value ("));
        assert_eq!(script.assertion_count(), 2);
    }

    #[test]
    fn response_maps_values_by_position() {
        let (script, a, b) = small_script();
        let out = "sat\n((|x| true)\n ((ref (_ bv4 3) (_ bv5 3)) false))\n";
        let SatResult::Sat(model) = script.parse_response(out).unwrap() else {
            panic!("expected sat");
        };
        assert!(model.is_true(a));
        assert!(!model.is_true(b));
        assert_eq!(script.parse_response("unsat\n").unwrap(), SatResult::Unsat);
        assert!(script.parse_response("error").is_err());
        assert!(script.parse_response("sat\n((x true))").is_err());
    }

    #[test]
    fn blocking_declares_unknown_ids_once() {
        let (mut script, a, _) = small_script();
        let aux = AtomId::new(7);
        script.block(&Clause::new(vec![Literal::neg(a), Literal::pos(aux)]));
        script.block(&Clause::new(vec![Literal::neg(aux)]));
        let text = script.render();
        assert_eq!(text.matches("(declare-const aux_7 Bool)").count(), 1);
        assert_eq!(script.assertion_count(), 4);
    }
}
