//! Turns a satisfying assignment into a workflow graph.
//!
//! True atoms are visited in automaton order. Module atoms of concrete
//! tools give the steps, memory-type atoms of leaf predicates give the data
//! content of each slot and reference atoms give the edges. Abstract
//! classes, empty markers and auxiliary variables never materialize.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use weaver_ir::{
    Atom, AtomKind, AtomSpace, Automaton, Domain, Hierarchy, NodeKind, PredicateId, State,
    StateId, Tool,
};
use weaver_sat::Model;

use crate::workflow::{Consumer, DataNode, Producer, ToolNode, WorkflowGraph};

/// A model that does not fit the encoding it was produced for. Aborts the
/// decoding of that one model only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("model assigns variable {0}, which is neither an atom nor an auxiliary")]
    UnknownAtom(u32),
    #[error("state {0} is not part of the automaton")]
    UnknownState(StateId),
    #[error("no tool is chosen at step {step}")]
    MissingTool { step: usize },
    #[error("tools '{first}' and '{second}' are both chosen at step {step}")]
    ConflictingTools {
        step: usize,
        first: String,
        second: String,
    },
    #[error("slot {used} references {memory}, which holds no data")]
    DanglingReference { used: StateId, memory: StateId },
}

fn state_of(automaton: &Automaton, id: StateId) -> Result<&State, LookupError> {
    automaton.state(id).ok_or(LookupError::UnknownState(id))
}

/// Decode `model` against the atom space and automaton it was solved on.
pub fn decode(
    model: &Model,
    space: &AtomSpace,
    automaton: &Automaton,
    domain: &Domain,
) -> Result<WorkflowGraph, LookupError> {
    let tax = domain.taxonomy();
    let mut atoms: Vec<Atom> = Vec::with_capacity(model.len());
    for id in model.true_vars() {
        if space.is_auxiliary(id) {
            continue;
        }
        let atom = space.resolve(id).ok_or(LookupError::UnknownAtom(id.get()))?;
        atoms.push(*atom);
    }
    atoms.sort();

    let length = automaton.length();
    let mut chosen: Vec<Option<&Tool>> = vec![None; length];
    let mut contents: BTreeMap<StateId, Vec<PredicateId>> = BTreeMap::new();
    let mut references: Vec<(StateId, StateId)> = Vec::new();

    for atom in &atoms {
        match atom.kind {
            AtomKind::Module => {
                let Some(tool) = atom.predicate.and_then(|p| domain.tool(p)) else {
                    continue;
                };
                let step = state_of(automaton, atom.state)?.block;
                match chosen.get_mut(step) {
                    Some(Some(first)) => {
                        return Err(LookupError::ConflictingTools {
                            step,
                            first: first.id.clone(),
                            second: tool.id.clone(),
                        })
                    }
                    Some(slot) => *slot = Some(tool),
                    None => return Err(LookupError::UnknownState(atom.state)),
                }
            }
            AtomKind::MemoryType => {
                let Some(p) = atom.predicate.and_then(|p| tax.get(p)) else {
                    continue;
                };
                if matches!(p.kind, NodeKind::Leaf | NodeKind::ArtificialLeaf) {
                    contents.entry(atom.state).or_default().push(p.index);
                }
            }
            AtomKind::MemTypeReference => match atom.state2 {
                Some(memory) if !memory.is_null() => references.push((atom.state, memory)),
                _ => {}
            },
            _ => {}
        }
    }

    // Data items: every memory slot carrying a data leaf.
    let mut data = Vec::new();
    let mut index_of: HashMap<StateId, usize> = HashMap::new();
    for slot in automaton.memory_states() {
        let Some(preds) = contents.get(&slot) else {
            continue;
        };
        let mut types = Vec::new();
        let mut label = None;
        for p in preds.iter().filter_map(|&p| tax.get(p)) {
            match p.hierarchy {
                Hierarchy::Label => label = Some(p.id.clone()),
                _ => types.push(p.id.clone()),
            }
        }
        if types.is_empty() {
            continue;
        }
        let state = state_of(automaton, slot)?;
        let producer = match state.block {
            0 => Producer::WorkflowInput(state.local),
            b => Producer::Tool { step: b - 1 },
        };
        index_of.insert(slot, data.len());
        data.push(DataNode {
            index: data.len(),
            types,
            label,
            producer,
            consumers: Vec::new(),
        });
    }

    // Edges.
    let mut tool_inputs: Vec<Vec<(usize, usize)>> = vec![Vec::new(); length];
    let mut outputs: Vec<(usize, usize)> = Vec::new();
    for (used, memory) in references {
        let &d = index_of
            .get(&memory)
            .ok_or(LookupError::DanglingReference { used, memory })?;
        let state = state_of(automaton, used)?;
        let consumer = if state.block < length {
            tool_inputs[state.block].push((state.local, d));
            Consumer::Tool {
                step: state.block,
                input: state.local,
            }
        } else {
            outputs.push((state.local, d));
            Consumer::WorkflowOutput(state.local)
        };
        data[d].consumers.push(consumer);
    }
    outputs.sort_unstable();

    let mut tools = Vec::with_capacity(length);
    for (step, tool) in chosen.into_iter().enumerate() {
        let tool = tool.ok_or(LookupError::MissingTool { step })?;
        let mut inputs = vec![None; tool.inputs.len()];
        for &(position, d) in &tool_inputs[step] {
            if let Some(input) = inputs.get_mut(position) {
                *input = Some(d);
            }
        }
        let produced = automaton.memory_blocks()[step + 1]
            .iter()
            .filter_map(|slot| index_of.get(slot).copied())
            .collect();
        tools.push(ToolNode {
            step,
            tool: tool.id.clone(),
            label: tool.label.clone(),
            inputs,
            outputs: produced,
            execution_template: tool.execution_template.clone(),
        });
    }

    let inputs = automaton.memory_blocks()[0]
        .iter()
        .filter_map(|slot| index_of.get(slot).copied())
        .collect();

    Ok(WorkflowGraph {
        length,
        tools,
        data,
        inputs,
        outputs: outputs.into_iter().map(|(_, d)| d).collect(),
    })
}
