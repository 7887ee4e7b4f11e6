use std::collections::HashSet;
use std::fmt;

use weaver_ir::AtomId;

/// Variable with a sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    var: AtomId,
    positive: bool,
}

impl Literal {
    pub fn pos(var: AtomId) -> Self {
        Self {
            var,
            positive: true,
        }
    }

    pub fn neg(var: AtomId) -> Self {
        Self {
            var,
            positive: false,
        }
    }

    pub fn negate(self) -> Self {
        Self {
            var: self.var,
            positive: !self.positive,
        }
    }

    pub fn var(self) -> AtomId {
        self.var
    }

    pub fn is_positive(self) -> bool {
        self.positive
    }

    /// Signed DIMACS integer.
    pub fn to_dimacs(self) -> i64 {
        let v = i64::from(self.var.get());
        if self.positive {
            v
        } else {
            -v
        }
    }

    /// Inverse of [`Literal::to_dimacs`]; `None` for 0 or out-of-range values.
    pub fn from_dimacs(value: i64) -> Option<Self> {
        let var = u32::try_from(value.unsigned_abs()).ok().filter(|v| *v > 0)?;
        Some(Self {
            var: AtomId::new(var),
            positive: value > 0,
        })
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

/// Disjunction of literals, kept sorted and free of duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause(Vec<Literal>);

impl Clause {
    pub fn new(mut literals: Vec<Literal>) -> Self {
        literals.sort();
        literals.dedup();
        Clause(literals)
    }

    pub fn unit(literal: Literal) -> Self {
        Clause(vec![literal])
    }

    pub fn literals(&self) -> &[Literal] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Contains both a literal and its negation.
    pub fn is_tautology(&self) -> bool {
        // Sorted by var first, so complementary literals are adjacent.
        self.0.windows(2).any(|w| w[0].var == w[1].var)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for lit in &self.0 {
            write!(f, "{lit} ")?;
        }
        write!(f, "0")
    }
}

/// Deduplicating clause set.
#[derive(Debug, Clone, Default)]
pub struct Cnf {
    clauses: Vec<Clause>,
    keys: HashSet<Clause>,
    candidates: usize,
    dedup_hits: usize,
}

impl Cnf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clause unless it is a tautology or already present.
    pub fn add(&mut self, literals: Vec<Literal>) {
        self.add_clause(Clause::new(literals));
    }

    pub fn add_clause(&mut self, clause: Clause) {
        self.candidates = self.candidates.saturating_add(1);
        if clause.is_tautology() {
            return;
        }
        if self.keys.insert(clause.clone()) {
            self.clauses.push(clause);
        } else {
            self.dedup_hits = self.dedup_hits.saturating_add(1);
        }
    }

    /// `a -> b`
    pub fn implies(&mut self, a: Literal, b: Literal) {
        self.add(vec![a.negate(), b]);
    }

    /// `a -> (b_1 | ... | b_n)`
    pub fn implies_any(&mut self, a: Literal, bs: impl IntoIterator<Item = Literal>) {
        let mut lits = vec![a.negate()];
        lits.extend(bs);
        self.add(lits);
    }

    /// At most one of the literals holds.
    pub fn at_most_one(&mut self, lits: &[Literal]) {
        for (i, a) in lits.iter().enumerate() {
            for b in &lits[i + 1..] {
                self.add(vec![a.negate(), b.negate()]);
            }
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn candidates(&self) -> usize {
        self.candidates
    }

    pub fn dedup_hits(&self) -> usize {
        self.dedup_hits
    }

    /// Largest variable id mentioned, 0 if none.
    pub fn max_var(&self) -> u32 {
        self.clauses
            .iter()
            .flat_map(|c| c.literals())
            .map(|l| l.var().get())
            .max()
            .unwrap_or(0)
    }

    pub fn extend(&mut self, other: &Cnf) {
        for clause in &other.clauses {
            self.add_clause(clause.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(v: i64) -> Literal {
        Literal::from_dimacs(v).unwrap()
    }

    #[test]
    fn dimacs_sign_round_trips() {
        assert_eq!(lit(-7).to_dimacs(), -7);
        assert!(!lit(-7).is_positive());
        assert_eq!(lit(7).negate(), lit(-7));
        assert!(Literal::from_dimacs(0).is_none());
    }

    #[test]
    fn clauses_are_normalised() {
        let c = Clause::new(vec![lit(3), lit(-1), lit(3)]);
        assert_eq!(c.literals(), &[lit(-1), lit(3)]);
        assert_eq!(c.to_string(), "-1 3 0");
        assert!(Clause::new(vec![lit(2), lit(-2)]).is_tautology());
    }

    #[test]
    fn cnf_skips_duplicates_and_tautologies() {
        let mut cnf = Cnf::new();
        cnf.add(vec![lit(1), lit(2)]);
        cnf.add(vec![lit(2), lit(1)]);
        cnf.add(vec![lit(4), lit(-4)]);
        assert_eq!(cnf.len(), 1);
        assert_eq!(cnf.candidates(), 3);
        assert_eq!(cnf.dedup_hits(), 1);
        assert_eq!(cnf.max_var(), 2);
    }

    #[test]
    fn at_most_one_emits_pairs() {
        let mut cnf = Cnf::new();
        cnf.at_most_one(&[lit(1), lit(2), lit(3)]);
        assert_eq!(cnf.len(), 3);
        assert!(cnf
            .clauses()
            .contains(&Clause::new(vec![lit(-1), lit(-3)])));
    }
}
