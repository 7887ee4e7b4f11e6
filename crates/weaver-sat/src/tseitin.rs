//! Definitional CNF: one auxiliary variable per distinct subformula, tied to
//! it by a full bi-implication so every auxiliary is functionally determined.

use std::collections::HashMap;

use weaver_ir::{AtomSpace, AtomSpaceError};

use crate::cnf::{Cnf, Literal};
use crate::expr::BoolExpr;

pub struct Tseitin<'a> {
    space: &'a mut AtomSpace,
    cnf: &'a mut Cnf,
    defined: HashMap<BoolExpr, Literal>,
}

impl<'a> Tseitin<'a> {
    pub fn new(space: &'a mut AtomSpace, cnf: &'a mut Cnf) -> Self {
        Self {
            space,
            cnf,
            defined: HashMap::new(),
        }
    }

    /// Assert `expr`. Top-level conjunctions and flat disjunctions become
    /// clauses directly; everything else goes through a definition.
    pub fn assert(&mut self, expr: &BoolExpr) -> Result<(), AtomSpaceError> {
        match expr {
            BoolExpr::Const(true) => Ok(()),
            BoolExpr::Const(false) => {
                self.cnf.add(Vec::new());
                Ok(())
            }
            BoolExpr::And(items) => items.iter().try_for_each(|e| self.assert(e)),
            BoolExpr::Or(items) => {
                let lits = items
                    .iter()
                    .map(|e| self.define(e))
                    .collect::<Result<Vec<_>, _>>()?;
                self.cnf.add(lits);
                Ok(())
            }
            other => {
                let lit = self.define(other)?;
                self.cnf.add(vec![lit]);
                Ok(())
            }
        }
    }

    /// Literal equivalent to `expr`.
    pub fn define(&mut self, expr: &BoolExpr) -> Result<Literal, AtomSpaceError> {
        match expr {
            BoolExpr::Var(id) => return Ok(Literal::pos(*id)),
            BoolExpr::Not(inner) => return Ok(self.define(inner)?.negate()),
            _ => {}
        }
        if let Some(lit) = self.defined.get(expr) {
            return Ok(*lit);
        }
        let aux = Literal::pos(self.space.fresh_auxiliary()?);
        match expr {
            BoolExpr::Const(b) => {
                self.cnf.add(vec![if *b { aux } else { aux.negate() }]);
            }
            BoolExpr::And(items) => {
                let lits = self.define_all(items)?;
                // aux -> l_i, and (l_1 & ... & l_n) -> aux
                for &l in &lits {
                    self.cnf.implies(aux, l);
                }
                let mut back: Vec<Literal> = lits.iter().map(|l| l.negate()).collect();
                back.push(aux);
                self.cnf.add(back);
            }
            BoolExpr::Or(items) => {
                let lits = self.define_all(items)?;
                for &l in &lits {
                    self.cnf.implies(l, aux);
                }
                self.cnf.implies_any(aux, lits);
            }
            BoolExpr::Iff(a, b) => {
                let a = self.define(a)?;
                let b = self.define(b)?;
                self.cnf.add(vec![aux.negate(), a.negate(), b]);
                self.cnf.add(vec![aux.negate(), a, b.negate()]);
                self.cnf.add(vec![aux, a, b]);
                self.cnf.add(vec![aux, a.negate(), b.negate()]);
            }
            BoolExpr::Var(_) | BoolExpr::Not(_) => {}
        }
        self.defined.insert(expr.clone(), aux);
        Ok(aux)
    }

    fn define_all(&mut self, items: &[BoolExpr]) -> Result<Vec<Literal>, AtomSpaceError> {
        items.iter().map(|e| self.define(e)).collect()
    }

    pub fn auxiliaries(&self) -> usize {
        self.defined.len()
    }
}
