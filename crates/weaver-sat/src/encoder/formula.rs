//! Compiles constraint formulas into boolean expressions over atoms.
//!
//! Modal operators are unrolled over the module steps of the automaton:
//! `G` becomes a conjunction over the remaining steps, `F` a disjunction,
//! `X` moves one step ahead (false at the last step) and `a U b` picks a
//! witness step for `b` with `a` holding at every step before it.
//! Quantified variables range over all memory slots.

use weaver_dsl::{AtomicFormula, BinaryOp, Formula, ModalOp, Quantifier, ANY_TOOL};
use weaver_ir::{Atom, AtomSpace, Automaton, Domain, Hierarchy, Predicate, StateId};

use crate::errors::ConstraintError;
use crate::expr::BoolExpr;

pub(crate) struct Compiler<'a> {
    domain: &'a Domain,
    automaton: &'a Automaton,
    space: &'a mut AtomSpace,
    /// Definitions of equality atoms introduced while compiling.
    definitions: &'a mut Vec<BoolExpr>,
    bindings: Vec<(String, StateId)>,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(
        domain: &'a Domain,
        automaton: &'a Automaton,
        space: &'a mut AtomSpace,
        definitions: &'a mut Vec<BoolExpr>,
    ) -> Self {
        Self {
            domain,
            automaton,
            space,
            definitions,
            bindings: Vec::new(),
        }
    }

    /// Compile `formula` as seen from the first step.
    pub(crate) fn compile_root(&mut self, formula: &Formula) -> Result<BoolExpr, ConstraintError> {
        self.compile(formula, 0)
    }

    fn compile(&mut self, formula: &Formula, step: usize) -> Result<BoolExpr, ConstraintError> {
        let length = self.automaton.length();
        match formula {
            Formula::Literal(b) => Ok(BoolExpr::Const(*b)),
            Formula::Atom(atom) => self.atomic(atom, step),
            Formula::Not(inner) => Ok(self.compile(inner, step)?.not()),
            Formula::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => Ok(BoolExpr::and([
                    self.compile(lhs, step)?,
                    self.compile(rhs, step)?,
                ])),
                BinaryOp::Or => Ok(BoolExpr::or([
                    self.compile(lhs, step)?,
                    self.compile(rhs, step)?,
                ])),
                BinaryOp::Implies => Ok(self.compile(lhs, step)?.implies(self.compile(rhs, step)?)),
                BinaryOp::Iff => Ok(self.compile(lhs, step)?.iff(self.compile(rhs, step)?)),
                BinaryOp::Until => {
                    let mut witnesses = Vec::with_capacity(length - step);
                    let mut prefix = Vec::new();
                    for j in step..length {
                        let mut here = prefix.clone();
                        here.push(self.compile(rhs, j)?);
                        witnesses.push(BoolExpr::and(here));
                        prefix.push(self.compile(lhs, j)?);
                    }
                    Ok(BoolExpr::or(witnesses))
                }
            },
            Formula::Modal { op, body } => match op {
                ModalOp::Always => Ok(BoolExpr::and(
                    (step..length)
                        .map(|j| self.compile(body, j))
                        .collect::<Result<Vec<_>, _>>()?,
                )),
                ModalOp::Eventually => Ok(BoolExpr::or(
                    (step..length)
                        .map(|j| self.compile(body, j))
                        .collect::<Result<Vec<_>, _>>()?,
                )),
                ModalOp::Next => match self.automaton.next_step(step) {
                    Some(next) => self.compile(body, next),
                    None => Ok(BoolExpr::Const(false)),
                },
            },
            Formula::Quantified {
                quantifier,
                variable,
                body,
            } => {
                let states: Vec<StateId> = self.automaton.memory_states().collect();
                let mut parts = Vec::with_capacity(states.len());
                for state in states {
                    self.bindings.push((variable.clone(), state));
                    let part = self.compile(body, step);
                    self.bindings.pop();
                    parts.push(part?);
                }
                Ok(match quantifier {
                    Quantifier::Exists => BoolExpr::or(parts),
                    Quantifier::Forall => BoolExpr::and(parts),
                })
            }
        }
    }

    fn bound(&self, variable: &str) -> Result<StateId, ConstraintError> {
        self.bindings
            .iter()
            .rev()
            .find(|(name, _)| name == variable)
            .map(|(_, state)| *state)
            .ok_or_else(|| ConstraintError::UnboundVariable(variable.to_string()))
    }

    fn lookup(&self, atom: Atom) -> BoolExpr {
        self.space
            .lookup(&atom)
            .map_or(BoolExpr::Const(false), BoolExpr::var)
    }

    fn predicate(&self, name: &str) -> Result<&'a Predicate, ConstraintError> {
        let domain: &'a Domain = self.domain;
        let tax = domain.taxonomy();
        let name = if name == ANY_TOOL {
            tax.get(tax.tool_root()).map_or(name, |root| root.id.as_str())
        } else {
            name
        };
        Ok(tax.resolve(name)?)
    }

    fn atomic(&mut self, atom: &AtomicFormula, step: usize) -> Result<BoolExpr, ConstraintError> {
        match atom {
            AtomicFormula::Predicate {
                name,
                inputs,
                outputs,
                has_args,
            } => {
                let p = self.predicate(name)?;
                if p.hierarchy == Hierarchy::Tool {
                    self.tool_at(p, inputs, outputs, *has_args, step)
                } else {
                    self.type_atom(p, inputs, outputs, *has_args, step)
                }
            }
            AtomicFormula::Dependency { source, derived } => {
                let (source, derived) = (self.bound(source)?, self.bound(derived)?);
                Ok(self.lookup(Atom::dependency(derived, source)))
            }
            AtomicFormula::Equality(a, b) => {
                let (a, b) = (self.bound(a)?, self.bound(b)?);
                self.equality(a, b)
            }
        }
    }

    /// Tool (or tool class) used at `step`, optionally consuming and
    /// producing the bound data slots.
    fn tool_at(
        &mut self,
        p: &Predicate,
        inputs: &[String],
        outputs: &[String],
        has_args: bool,
        step: usize,
    ) -> Result<BoolExpr, ConstraintError> {
        let Some(state) = self.automaton.module(step) else {
            return Ok(BoolExpr::Const(false));
        };
        let used = self.lookup(Atom::module(p.index, state));
        if !has_args {
            return Ok(used);
        }
        let mut parts = vec![used];
        for var in inputs {
            let memory = self.bound(var)?;
            let consumed = self.automaton.used_blocks()[step]
                .iter()
                .map(|&u| self.lookup(Atom::reference(u, memory)));
            parts.push(BoolExpr::or(consumed.collect::<Vec<_>>()));
        }
        for var in outputs {
            let memory = self.bound(var)?;
            let produced = self.automaton.memory_blocks()[step + 1].contains(&memory);
            parts.push(if produced {
                self.lookup(Atom::memory_type(self.domain.taxonomy().empty(), memory))
                    .not()
            } else {
                BoolExpr::Const(false)
            });
        }
        Ok(BoolExpr::and(parts))
    }

    /// `Type` alone: some input consumed at `step` has the type.
    /// `Type(?x)`: slot `?x` carries the type.
    fn type_atom(
        &mut self,
        p: &Predicate,
        inputs: &[String],
        outputs: &[String],
        has_args: bool,
        step: usize,
    ) -> Result<BoolExpr, ConstraintError> {
        match (has_args, inputs, outputs.is_empty()) {
            (false, _, _) => {
                let used: Vec<BoolExpr> = self
                    .automaton
                    .used_blocks()
                    .get(step)
                    .map(|block| {
                        block
                            .iter()
                            .map(|&u| self.lookup(Atom::used_type(p.index, u)))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(BoolExpr::or(used))
            }
            (true, [var], true) => {
                let memory = self.bound(var)?;
                Ok(self.lookup(Atom::memory_type(p.index, memory)))
            }
            _ => Err(ConstraintError::PredicateArity {
                name: p.id.clone(),
                inputs: inputs.len(),
                outputs: outputs.len(),
            }),
        }
    }

    /// Equality atom, defined on first use: both slots carry the same
    /// leaves in every dimension (or are both empty).
    fn equality(&mut self, a: StateId, b: StateId) -> Result<BoolExpr, ConstraintError> {
        if a == b {
            return Ok(BoolExpr::Const(true));
        }
        let atom = Atom::equality(a, b);
        if let Some(id) = self.space.lookup(&atom) {
            return Ok(BoolExpr::var(id));
        }
        let tax = self.domain.taxonomy();
        let mut contents: Vec<_> = tax
            .dimensions()
            .into_iter()
            .flat_map(|d| tax.relevant_leaves(d))
            .collect();
        contents.push(tax.empty());
        let same = BoolExpr::and(contents.into_iter().map(|p| {
            self.lookup(Atom::memory_type(p, a))
                .iff(self.lookup(Atom::memory_type(p, b)))
        }));
        let id = self.space.add(atom);
        self.definitions.push(BoolExpr::var(id).iff(same));
        Ok(BoolExpr::var(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{Backend, Encoding, EncodingOptions, Lowered};
    use crate::solver::Problem;
    use crate::test_fixtures::Dpll;
    use weaver_dsl::ConstraintSpec;
    use weaver_ir::{
        AtomKind, AutomatonBuilder, DataAnnotation, DomainInput, RawClass, Roots, ToolAnnotation,
    };

    fn domain() -> Domain {
        Domain::build(&DomainInput {
            roots: Roots {
                tools: "Tools".into(),
                data: vec!["Type".into()],
                label: None,
            },
            classes: vec![
                RawClass::new("Convert", &["Tools"]),
                RawClass::new("Image", &["Type"]),
                RawClass::new("Photo", &["Image"]),
                RawClass::new("Table", &["Type"]),
            ],
            tools: vec![
                ToolAnnotation::new("snap")
                    .under("Convert")
                    .output(DataAnnotation::of(&["Photo"])),
                ToolAnnotation::new("tabulate")
                    .input(DataAnnotation::of(&["Image"]))
                    .output(DataAnnotation::of(&["Table"])),
            ],
            inputs: vec![],
            outputs: vec![],
        })
        .unwrap()
    }

    fn encoding(domain: &Domain, length: usize) -> Encoding<'_> {
        let automaton = AutomatonBuilder::new(length, 1, 1).build();
        Encoding::new(domain, automaton, &EncodingOptions::default()).unwrap()
    }

    fn solve(encoding: Encoding<'_>) -> (Lowered, Option<Vec<weaver_ir::AtomId>>) {
        let lowered = encoding.lower(Backend::Cnf).unwrap();
        let Problem::Cnf(cnf) = &lowered.problem else {
            panic!("expected clauses");
        };
        let model = Dpll::new(cnf).solve();
        (lowered, model)
    }

    fn holds(lowered: &Lowered, model: &[weaver_ir::AtomId], tool: &str, step: usize) -> bool {
        let d = domain();
        let p = d.taxonomy().lookup(tool).unwrap();
        let state = lowered.automaton.modules()[step];
        lowered
            .space
            .lookup(&Atom::module(p, state))
            .is_some_and(|id| model.contains(&id))
    }

    // ---- modal operators ----

    #[test]
    fn eventually_places_the_tool_after_its_producer() {
        let d = domain();
        let mut enc = encoding(&d, 2);
        enc.add_formula(&Formula::name("tabulate").eventually()).unwrap();
        let (lowered, model) = solve(enc);
        let model = model.expect("satisfiable");
        assert!(holds(&lowered, &model, "snap", 0));
        assert!(holds(&lowered, &model, "tabulate", 1));
    }

    #[test]
    fn always_not_blocks_the_only_producer() {
        let d = domain();
        let mut enc = encoding(&d, 2);
        enc.add_formula(&Formula::name("tabulate").eventually()).unwrap();
        enc.add_formula(&Formula::name("snap").negate().always()).unwrap();
        assert!(solve(enc).1.is_none());
    }

    #[test]
    fn next_is_false_at_the_last_step() {
        let d = domain();
        let mut enc = encoding(&d, 1);
        enc.add_formula(&Formula::Literal(true).next()).unwrap();
        assert_eq!(enc.constraints().last(), Some(&BoolExpr::Const(false)));
        assert!(solve(enc).1.is_none());
    }

    #[test]
    fn until_requires_a_witness() {
        let d = domain();
        let mut enc = encoding(&d, 2);
        enc.add_formula(&Formula::name("snap").until(Formula::name("tabulate")))
            .unwrap();
        let (lowered, model) = solve(enc);
        let model = model.expect("satisfiable");
        assert!(holds(&lowered, &model, "snap", 0));
        assert!(holds(&lowered, &model, "tabulate", 1));
    }

    // ---- variables ----

    #[test]
    fn unbound_variables_are_rejected() {
        let d = domain();
        let mut enc = encoding(&d, 1);
        let err = enc
            .add_formula(&Formula::apply("Photo", &["x"], &[]))
            .unwrap_err();
        assert!(matches!(err, ConstraintError::UnboundVariable(v) if v == "x"));
    }

    #[test]
    fn type_predicates_take_one_input() {
        let d = domain();
        let mut enc = encoding(&d, 1);
        let f = Formula::exists("x", Formula::apply("Photo", &["x"], &["x"]));
        assert!(matches!(
            enc.add_formula(&f),
            Err(ConstraintError::PredicateArity { inputs: 1, outputs: 1, .. })
        ));
    }

    #[test]
    fn tool_outputs_bind_to_the_next_block() {
        let d = domain();
        let mut enc = encoding(&d, 1);
        let f = Formula::exists(
            "x",
            Formula::apply("Photo", &["x"], &[]).and(Formula::apply("snap", &[], &["x"])),
        );
        enc.add_formula(&f).unwrap();
        let (lowered, model) = solve(enc);
        assert!(holds(&lowered, &model.expect("satisfiable"), "snap", 0));
    }

    #[test]
    fn equality_atoms_are_defined_once_per_pair() {
        let d = domain();
        let mut enc = encoding(&d, 1);
        let eq = Formula::Atom(AtomicFormula::Equality("x".into(), "y".into()));
        let f = Formula::exists("x", Formula::exists("y", eq));
        enc.add_formula(&f).unwrap();
        let slots = enc.automaton().memory_states().count();
        let eq_atoms = enc
            .space()
            .iter()
            .filter(|(_, a)| a.kind == AtomKind::TypeEquality)
            .count();
        assert_eq!(eq_atoms, slots * (slots - 1) / 2);
        assert_eq!(enc.constraints().len(), eq_atoms + 1);
    }

    #[test]
    fn self_equality_is_true() {
        let d = domain();
        let mut enc = encoding(&d, 1);
        let eq = Formula::Atom(AtomicFormula::Equality("x".into(), "x".into()));
        enc.add_formula(&Formula::forall("x", eq)).unwrap();
        assert_eq!(enc.constraints(), &[BoolExpr::Const(true)]);
    }

    // ---- constraint specs ----

    #[test]
    fn unknown_and_unsupported_templates_are_skipped() {
        let d = domain();
        let mut enc = encoding(&d, 1);
        enc.add_constraint(&ConstraintSpec::template("no_such_template", &["snap"]))
            .unwrap();
        enc.add_constraint(&ConstraintSpec::template("use_m_n_times", &["snap", "2"]))
            .unwrap();
        assert_eq!(enc.skipped().len(), 2);
        assert!(enc.constraints().is_empty());
    }

    #[test]
    fn template_arity_errors_abort() {
        let d = domain();
        let mut enc = encoding(&d, 1);
        assert!(matches!(
            enc.add_constraint(&ConstraintSpec::template("use_m", &[])),
            Err(ConstraintError::Template(_))
        ));
    }

    #[test]
    fn unknown_predicates_abort() {
        let d = domain();
        let mut enc = encoding(&d, 1);
        assert!(matches!(
            enc.add_constraint(&ConstraintSpec::template("use_m", &["Frobnicate"])),
            Err(ConstraintError::Domain(_))
        ));
    }

    #[test]
    fn smt_lowering_keeps_the_atom_space() {
        let d = domain();
        let mut enc = encoding(&d, 2);
        enc.add_constraint(&ConstraintSpec::template("use_m", &["tabulate"]))
            .unwrap();
        let atoms = enc.space().len();
        let lowered = enc.lower(Backend::Smt).unwrap();
        assert_eq!(lowered.space.len(), atoms);
        let Problem::Smt(script) = &lowered.problem else {
            panic!("expected a script");
        };
        assert!(script.render().contains("(check-sat)"));
    }
}
