//! Structural clauses: what every workflow of the bound must satisfy
//! regardless of user constraints.
//!
//! All clauses are emitted directly over atom literals; nothing here needs
//! auxiliary variables.

use tracing::{debug, warn};

use weaver_ir::{
    Atom, AtomKind, AtomSpace, Automaton, Domain, DomainError, Hierarchy, PredicateId, StateId,
    Taxonomy,
};

use crate::cnf::{Cnf, Literal};
use crate::encoder::{EncodingOptions, UsePolicy};

pub(crate) struct Structural<'a> {
    domain: &'a Domain,
    tax: &'a Taxonomy,
    automaton: &'a Automaton,
    space: &'a mut AtomSpace,
    cnf: &'a mut Cnf,
    tool_preds: Vec<PredicateId>,
    type_preds: Vec<PredicateId>,
    /// Relevant leaves of every data and label dimension.
    type_leaves: Vec<PredicateId>,
    tool_pairs: Vec<(PredicateId, PredicateId)>,
    type_pairs: Vec<(PredicateId, PredicateId)>,
}

impl<'a> Structural<'a> {
    pub(crate) fn new(
        domain: &'a Domain,
        automaton: &'a Automaton,
        space: &'a mut AtomSpace,
        cnf: &'a mut Cnf,
    ) -> Self {
        let tax = domain.taxonomy();
        let mut type_preds = tax.relevant_in(Hierarchy::Data);
        type_preds.extend(tax.relevant_in(Hierarchy::Label));
        type_preds.push(tax.empty());
        let type_leaves = tax
            .dimensions()
            .into_iter()
            .flat_map(|d| tax.relevant_leaves(d))
            .collect();
        let (tool_pairs, type_pairs): (Vec<_>, Vec<_>) = tax
            .pairs_within_hierarchy()
            .into_iter()
            .partition(|(a, _)| tax.get(*a).is_some_and(|p| p.hierarchy == Hierarchy::Tool));
        Self {
            domain,
            tax,
            automaton,
            space,
            cnf,
            tool_preds: tax.relevant_in(Hierarchy::Tool),
            type_preds,
            type_leaves,
            tool_pairs,
            type_pairs,
        }
    }

    pub(crate) fn encode(
        mut self,
        options: &EncodingOptions,
        warnings: &mut Vec<String>,
    ) -> Result<(), DomainError> {
        self.modules();
        self.type_slots();
        self.tool_io(warnings);
        self.workflow_io()?;
        self.references();
        self.dependencies();
        self.usage(options);
        debug!(
            length = self.automaton.length(),
            atoms = self.space.len(),
            clauses = self.cnf.len(),
            dedup_hits = self.cnf.dedup_hits(),
            "structural encoding done"
        );
        Ok(())
    }

    fn unary(&mut self, kind: AtomKind, predicate: PredicateId, state: StateId) -> Literal {
        let atom = match kind {
            AtomKind::Module => Atom::module(predicate, state),
            AtomKind::UsedType => Atom::used_type(predicate, state),
            _ => Atom::memory_type(predicate, state),
        };
        Literal::pos(self.space.add(atom))
    }

    fn empty(&mut self, kind: AtomKind, state: StateId) -> Literal {
        let empty = self.tax.empty();
        self.unary(kind, empty, state)
    }

    fn reference(&mut self, used: StateId, memory: StateId) -> Literal {
        Literal::pos(self.space.add(Atom::reference(used, memory)))
    }

    fn dependency(&mut self, state: StateId, source: StateId) -> Literal {
        Literal::pos(self.space.add(Atom::dependency(state, source)))
    }

    fn block_of(&self, state: StateId) -> usize {
        self.automaton.state(state).map_or(0, |s| s.block)
    }

    /// Leaf implies every relevant parent; a non-leaf implies one of its
    /// relevant children.
    fn propagate(&mut self, kind: AtomKind, preds: &[PredicateId], state: StateId) {
        let tax = self.tax;
        for &p in preds {
            let lit = self.unary(kind, p, state);
            for q in tax.relevant_parents(p) {
                let parent = self.unary(kind, q, state);
                self.cnf.implies(lit, parent);
            }
            if !tax.get(p).is_some_and(|x| x.is_leaf()) {
                let children: Vec<Literal> = tax
                    .relevant_children(p)
                    .map(|c| self.unary(kind, c, state))
                    .collect();
                self.cnf.implies_any(lit, children);
            }
        }
    }

    // --- Exactly one tool per step ---

    fn modules(&mut self) {
        let preds = self.tool_preds.clone();
        let leaves = self.tax.relevant_leaves(self.tax.tool_root());
        let pairs = self.tool_pairs.clone();
        let automaton = self.automaton;
        for &k in automaton.modules() {
            for &p in &preds {
                self.unary(AtomKind::Module, p, k);
            }
            let any: Vec<Literal> = leaves
                .iter()
                .map(|&t| self.unary(AtomKind::Module, t, k))
                .collect();
            self.cnf.add(any);
            for &(a, b) in &pairs {
                let a = self.unary(AtomKind::Module, a, k);
                let b = self.unary(AtomKind::Module, b, k);
                self.cnf.add(vec![a.negate(), b.negate()]);
            }
            self.propagate(AtomKind::Module, &preds, k);
        }
    }

    // --- Each slot holds one leaf per dimension, or is empty ---

    fn type_slots(&mut self) {
        let preds = self.type_preds.clone();
        let pairs = self.type_pairs.clone();
        let dimensions: Vec<Vec<PredicateId>> = self
            .tax
            .dimensions()
            .into_iter()
            .map(|d| self.tax.relevant_leaves(d))
            .collect();
        let slots: Vec<(AtomKind, StateId)> = self
            .automaton
            .memory_states()
            .map(|s| (AtomKind::MemoryType, s))
            .chain(self.automaton.used_states().map(|s| (AtomKind::UsedType, s)))
            .collect();
        for (kind, s) in slots {
            for &p in &preds {
                self.unary(kind, p, s);
            }
            let empty = self.empty(kind, s);
            for leaves in &dimensions {
                let mut clause = vec![empty];
                clause.extend(leaves.iter().map(|&l| self.unary(kind, l, s)));
                self.cnf.add(clause);
            }
            for &(a, b) in &pairs {
                let a = self.unary(kind, a, s);
                let b = self.unary(kind, b, s);
                self.cnf.add(vec![a.negate(), b.negate()]);
            }
            self.propagate(kind, &preds, s);
        }
    }

    // --- Tool inputs and outputs, by position ---

    fn tool_io(&mut self, warnings: &mut Vec<String>) {
        let (automaton, domain) = (self.automaton, self.domain);
        let (max_in, max_out) = (automaton.input_branching(), automaton.output_branching());
        for tool in domain.tools() {
            let fits = tool.inputs.len() <= max_in && tool.outputs.len() <= max_out;
            if !fits {
                warn!(
                    tool = %tool.id,
                    inputs = tool.inputs.len(),
                    outputs = tool.outputs.len(),
                    max_in,
                    max_out,
                    "tool exceeds the branching bounds and is never used"
                );
                warnings.push(format!(
                    "tool '{}' needs {} input(s) and {} output(s), bound is {max_in}/{max_out}",
                    tool.id,
                    tool.inputs.len(),
                    tool.outputs.len()
                ));
            }
            for (k, &state) in automaton.modules().iter().enumerate() {
                let used = self.unary(AtomKind::Module, tool.predicate, state);
                if !fits {
                    self.cnf.add(vec![used.negate()]);
                    continue;
                }
                for (j, &slot) in automaton.used_blocks()[k].iter().enumerate() {
                    let types = tool.inputs.get(j).map(|d| d.types.as_slice());
                    self.slot_content(used, AtomKind::UsedType, slot, types);
                }
                for (j, &slot) in automaton.memory_blocks()[k + 1].iter().enumerate() {
                    let types = tool.outputs.get(j).map(|d| d.types.as_slice());
                    self.slot_content(used, AtomKind::MemoryType, slot, types);
                }
            }
        }
    }

    /// `guard -> slot carries types` or, without types, `guard -> slot empty`.
    fn slot_content(
        &mut self,
        guard: Literal,
        kind: AtomKind,
        slot: StateId,
        types: Option<&[PredicateId]>,
    ) {
        let empty = self.empty(kind, slot);
        match types {
            Some(types) => {
                self.cnf.implies(guard, empty.negate());
                for &p in types {
                    let lit = self.unary(kind, p, slot);
                    self.cnf.implies(guard, lit);
                }
            }
            None => self.cnf.implies(guard, empty),
        }
    }

    // --- Workflow inputs in memory block 0, outputs in the sink ---

    fn workflow_io(&mut self) -> Result<(), DomainError> {
        let (automaton, domain) = (self.automaton, self.domain);
        let sides = [
            (
                "workflow inputs",
                AtomKind::MemoryType,
                domain.inputs(),
                automaton.workflow_input_slots(),
            ),
            (
                "workflow outputs",
                AtomKind::UsedType,
                domain.outputs(),
                automaton.sink(),
            ),
        ];
        for (what, kind, specs, slots) in sides {
            if specs.len() > slots.len() {
                return Err(DomainError::BranchingExceeded {
                    what: what.to_string(),
                    needed: specs.len(),
                    allowed: slots.len(),
                });
            }
            for (j, &slot) in slots.iter().enumerate() {
                let empty = self.empty(kind, slot);
                match specs.get(j) {
                    Some(spec) => {
                        self.cnf.add(vec![empty.negate()]);
                        for &p in &spec.types {
                            let lit = self.unary(kind, p, slot);
                            self.cnf.add(vec![lit]);
                        }
                    }
                    None => self.cnf.add(vec![empty]),
                }
            }
        }
        Ok(())
    }

    // --- Each used slot references exactly one earlier memory slot or null ---

    fn references(&mut self) {
        let automaton = self.automaton;
        let leaves = self.type_leaves.clone();
        for u in automaton.used_states() {
            let none = self.reference(u, StateId::NULL);
            let empty_u = self.empty(AtomKind::UsedType, u);
            self.cnf.implies(empty_u, none);
            self.cnf.implies(none, empty_u);

            let mut options = vec![none];
            for m in automaton.legal_references(u) {
                let r = self.reference(u, m);
                options.push(r);
                let empty_m = self.empty(AtomKind::MemoryType, m);
                self.cnf.implies(r, empty_m.negate());
                for &p in &leaves {
                    let up = self.unary(AtomKind::UsedType, p, u);
                    let mp = self.unary(AtomKind::MemoryType, p, m);
                    self.cnf.add(vec![r.negate(), up.negate(), mp]);
                    self.cnf.add(vec![r.negate(), up, mp.negate()]);
                }
            }
            self.cnf.add(options.clone());
            self.cnf.at_most_one(&options);
        }
    }

    // --- Data lineage ---

    fn dependencies(&mut self) {
        let automaton = self.automaton;
        let blocks = automaton.memory_blocks();

        // A produced slot derives from whatever its tool's inputs derive from.
        for (b, block) in blocks.iter().enumerate().skip(1) {
            let sources: Vec<StateId> = blocks[..b].iter().flatten().copied().collect();
            let feeders = &automaton.used_blocks()[b - 1];
            for &o in block {
                let empty_o = self.empty(AtomKind::MemoryType, o);
                for &x in &sources {
                    let d = self.dependency(o, x);
                    self.cnf.implies(d, empty_o.negate());
                    let via: Vec<Literal> = feeders.iter().map(|&u| self.dependency(u, x)).collect();
                    self.cnf.implies_any(d, via.iter().copied());
                    for f in via {
                        self.cnf.add(vec![f.negate(), empty_o, d]);
                    }
                }
            }
        }

        // A used slot derives from what it references and that slot's lineage.
        for u in automaton.used_states() {
            let legal: Vec<StateId> = automaton.legal_references(u).collect();
            let none = self.reference(u, StateId::NULL);
            for &x in &legal {
                let d = self.dependency(u, x);
                self.cnf.implies(none, d.negate());
            }
            for &m in &legal {
                let r = self.reference(u, m);
                let direct = self.dependency(u, m);
                self.cnf.implies(r, direct);
                let m_block = self.block_of(m);
                for &x in &legal {
                    if x == m {
                        continue;
                    }
                    let ux = self.dependency(u, x);
                    if m_block > 0 && self.block_of(x) < m_block {
                        let mx = self.dependency(m, x);
                        self.cnf.add(vec![r.negate(), ux.negate(), mx]);
                        self.cnf.add(vec![r.negate(), ux, mx.negate()]);
                    } else {
                        self.cnf.add(vec![r.negate(), ux.negate()]);
                    }
                }
            }
        }
    }

    // --- Usage policies ---

    fn references_to(&mut self, memory: StateId) -> Vec<Literal> {
        let later: Vec<StateId> = self
            .automaton
            .used_states()
            .filter(|u| memory < *u)
            .collect();
        later.into_iter().map(|u| self.reference(u, memory)).collect()
    }

    fn usage(&mut self, options: &EncodingOptions) {
        let automaton = self.automaton;
        let blocks = automaton.memory_blocks();

        match options.use_workflow_input {
            UsePolicy::All => {
                for &m in &blocks[0] {
                    let mut clause = vec![self.empty(AtomKind::MemoryType, m)];
                    clause.extend(self.references_to(m));
                    self.cnf.add(clause);
                }
            }
            UsePolicy::One if !self.domain.inputs().is_empty() => {
                let mut clause = Vec::new();
                for &m in &blocks[0] {
                    clause.extend(self.references_to(m));
                }
                self.cnf.add(clause);
            }
            UsePolicy::One | UsePolicy::None => {}
        }

        // Without workflow outputs the sink is empty, so nothing could
        // consume the last block.
        let produced = if self.domain.outputs().is_empty() {
            &blocks[1..blocks.len() - 1]
        } else {
            &blocks[1..]
        };
        for block in produced {
            match options.use_generated_data {
                UsePolicy::All => {
                    for &m in block {
                        let mut clause = vec![self.empty(AtomKind::MemoryType, m)];
                        clause.extend(self.references_to(m));
                        self.cnf.add(clause);
                    }
                }
                UsePolicy::One => {
                    let Some(&first) = block.first() else {
                        continue;
                    };
                    let mut clause = vec![self.empty(AtomKind::MemoryType, first)];
                    for &m in block {
                        clause.extend(self.references_to(m));
                    }
                    self.cnf.add(clause);
                }
                UsePolicy::None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::Dpll;
    use weaver_ir::{AutomatonBuilder, DataAnnotation, DomainInput, RawClass, Roots, ToolAnnotation};

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

    fn encode(domain: &Domain, automaton: &Automaton) -> (AtomSpace, Cnf, Vec<String>) {
        let mut space = AtomSpace::new();
        let mut cnf = Cnf::new();
        let mut warnings = Vec::new();
        Structural::new(domain, automaton, &mut space, &mut cnf)
            .encode(&EncodingOptions::default(), &mut warnings)
            .unwrap();
        (space, cnf, warnings)
    }

    fn module(space: &AtomSpace, domain: &Domain, name: &str, state: StateId) -> Literal {
        let p = domain.taxonomy().lookup(name).unwrap();
        Literal::pos(space.lookup(&Atom::module(p, state)).unwrap())
    }

    #[test]
    fn encoding_is_satisfiable() {
        let d = domain();
        let a = AutomatonBuilder::new(2, 1, 1).build();
        let (_, cnf, warnings) = encode(&d, &a);
        assert!(warnings.is_empty());
        assert!(Dpll::new(&cnf).solve().is_some());
    }

    #[test]
    fn consumer_needs_a_producer_first() {
        let d = domain();
        let a = AutomatonBuilder::new(2, 1, 1).build();
        let (space, mut cnf, _) = encode(&d, &a);
        let first_tabulate = module(&space, &d, "tabulate", a.modules()[0]);
        cnf.add(vec![first_tabulate]);
        assert!(Dpll::new(&cnf).solve().is_none());
    }

    #[test]
    fn abstract_operation_forces_a_member() {
        let d = domain();
        let a = AutomatonBuilder::new(1, 1, 1).build();
        let (space, mut cnf, _) = encode(&d, &a);
        let k = a.modules()[0];
        cnf.add(vec![module(&space, &d, "Convert", k)]);
        let model = Dpll::new(&cnf).solve().unwrap();
        assert!(model.contains(&module(&space, &d, "snap", k).var()));
    }

    #[test]
    fn oversized_tools_are_disabled_with_a_warning() {
        let d = domain();
        let a = AutomatonBuilder::new(1, 0, 1).build();
        let (space, mut cnf, warnings) = encode(&d, &a);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("tabulate"));
        cnf.add(vec![module(&space, &d, "tabulate", a.modules()[0])]);
        assert!(Dpll::new(&cnf).solve().is_none());
    }

    #[test]
    fn too_many_workflow_inputs_is_an_error() {
        let mut input = DomainInput {
            roots: Roots {
                tools: "Tools".into(),
                data: vec!["Type".into()],
                label: None,
            },
            classes: vec![RawClass::new("Table", &["Type"])],
            tools: vec![ToolAnnotation::new("t")
                .input(DataAnnotation::of(&["Table"]))],
            inputs: vec![DataAnnotation::of(&["Table"]); 2],
            outputs: vec![],
        };
        let d = Domain::build(&input).unwrap();
        let a = AutomatonBuilder::new(1, 1, 1).build();
        let mut space = AtomSpace::new();
        let mut cnf = Cnf::new();
        let err = Structural::new(&d, &a, &mut space, &mut cnf)
            .encode(&EncodingOptions::default(), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::BranchingExceeded { needed: 2, allowed: 1, .. }));

        input.inputs.truncate(1);
        let d = Domain::build(&input).unwrap();
        let (_, cnf, _) = encode(&d, &a);
        assert!(Dpll::new(&cnf).solve().is_some());
    }
}
