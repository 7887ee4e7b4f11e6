//! Reference solver for tests: plain DPLL with unit propagation.
//!
//! Only meant for the small encodings built in tests. Exposed to other
//! crates through the `test-fixtures` feature.

use std::collections::HashMap;
use std::convert::Infallible;
use std::time::Duration;

use weaver_ir::AtomId;

use crate::cnf::{Cnf, Literal};
use crate::solver::{Model, Problem, SatResult, SatSolver};

type Lit = (usize, bool);

pub struct Dpll {
    index: HashMap<AtomId, usize>,
    vars: Vec<AtomId>,
    clauses: Vec<Vec<Lit>>,
}

impl Dpll {
    pub fn new(cnf: &Cnf) -> Self {
        let mut solver = Self {
            index: HashMap::new(),
            vars: Vec::new(),
            clauses: Vec::with_capacity(cnf.len()),
        };
        for clause in cnf.clauses() {
            solver.add_clause(clause.literals());
        }
        solver
    }

    pub fn add_clause(&mut self, literals: &[Literal]) {
        let clause = literals
            .iter()
            .map(|l| (self.slot(l.var()), l.is_positive()))
            .collect();
        self.clauses.push(clause);
    }

    fn slot(&mut self, id: AtomId) -> usize {
        if let Some(&i) = self.index.get(&id) {
            return i;
        }
        self.vars.push(id);
        self.index.insert(id, self.vars.len() - 1);
        self.vars.len() - 1
    }

    /// True variables of some model, ascending, or `None` if unsatisfiable.
    pub fn solve(&self) -> Option<Vec<AtomId>> {
        let mut assign = vec![None; self.vars.len()];
        if !search(&self.clauses, &mut assign) {
            return None;
        }
        let mut out: Vec<AtomId> = assign
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == Some(true))
            .map(|(i, _)| self.vars[i])
            .collect();
        out.sort();
        Some(out)
    }
}

fn search(clauses: &[Vec<Lit>], assign: &mut [Option<bool>]) -> bool {
    let mut trail = Vec::new();
    if !propagate(clauses, assign, &mut trail) {
        undo(assign, &trail);
        return false;
    }
    let open = clauses.iter().find(|c| !c.iter().any(|&(v, p)| assign[v] == Some(p)));
    let Some(open) = open else {
        for v in assign.iter_mut().filter(|v| v.is_none()) {
            *v = Some(false);
        }
        return true;
    };
    let Some(&(var, polarity)) = open.iter().find(|(v, _)| assign[*v].is_none()) else {
        undo(assign, &trail);
        return false;
    };
    for value in [polarity, !polarity] {
        assign[var] = Some(value);
        if search(clauses, assign) {
            return true;
        }
        assign[var] = None;
    }
    undo(assign, &trail);
    false
}

fn propagate(clauses: &[Vec<Lit>], assign: &mut [Option<bool>], trail: &mut Vec<usize>) -> bool {
    loop {
        let mut changed = false;
        for clause in clauses {
            let mut unassigned = None;
            let mut open = 0;
            let mut satisfied = false;
            for &(v, p) in clause {
                match assign[v] {
                    Some(b) if b == p => {
                        satisfied = true;
                        break;
                    }
                    Some(_) => {}
                    None => {
                        open += 1;
                        unassigned = Some((v, p));
                    }
                }
            }
            if satisfied {
                continue;
            }
            match (open, unassigned) {
                (0, _) => return false,
                (1, Some((v, p))) => {
                    assign[v] = Some(p);
                    trail.push(v);
                    changed = true;
                }
                _ => {}
            }
        }
        if !changed {
            return true;
        }
    }
}

fn undo(assign: &mut [Option<bool>], trail: &[usize]) {
    for &v in trail {
        assign[v] = None;
    }
}

/// Every distinct projection of the models of `cnf` onto `vars`. Each
/// projection lists the true variables in the order of `vars`.
pub fn all_models(cnf: &Cnf, vars: &[AtomId]) -> Vec<Vec<AtomId>> {
    let mut solver = Dpll::new(cnf);
    let mut out = Vec::new();
    while let Some(model) = solver.solve() {
        let projection: Vec<AtomId> = vars
            .iter()
            .copied()
            .filter(|v| model.binary_search(v).is_ok())
            .collect();
        let block: Vec<Literal> = vars
            .iter()
            .map(|&v| {
                if projection.contains(&v) {
                    Literal::neg(v)
                } else {
                    Literal::pos(v)
                }
            })
            .collect();
        out.push(projection);
        if block.is_empty() {
            break;
        }
        solver.add_clause(&block);
    }
    out
}

/// [`SatSolver`] adapter over [`Dpll`]. SMT scripts are answered `Unknown`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DpllSolver;

impl SatSolver for DpllSolver {
    type Error = Infallible;

    fn name(&self) -> &str {
        "dpll"
    }

    fn solve(&mut self, problem: &Problem, _timeout: Option<Duration>) -> Result<SatResult, Infallible> {
        match problem {
            Problem::Cnf(cnf) => Ok(match Dpll::new(cnf).solve() {
                Some(vars) => SatResult::Sat(Model::new(vars)),
                None => SatResult::Unsat,
            }),
            Problem::Smt(_) => Ok(SatResult::Unknown("dpll only reads clauses".into())),
        }
    }
}
