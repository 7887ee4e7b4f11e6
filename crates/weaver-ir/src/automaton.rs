use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use tracing::warn;

/// Position in the automaton. The raw value is the absolute order of the
/// state; [`StateId::NULL`] stands for "no reference" and orders before
/// everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StateId(u32);

impl StateId {
    pub const NULL: StateId = StateId(u32::MAX);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    /// Absolute order; `-1` for the null state.
    pub fn order(self) -> i64 {
        if self.is_null() {
            -1
        } else {
            i64::from(self.0)
        }
    }

    pub(crate) fn from_order(order: usize) -> Self {
        StateId(order as u32)
    }
}

impl PartialOrd for StateId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StateId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order().cmp(&other.order())
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "s{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StateRole {
    /// Holds the tool used at one step.
    Module,
    /// Holds data available after a step (block 0: workflow inputs).
    Memory,
    /// Holds data consumed by a step (the last block is the output sink).
    Used,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct State {
    pub id: StateId,
    pub role: StateRole,
    /// Position within the block.
    pub local: usize,
    /// Block index: module step, memory block or used block.
    pub block: usize,
}

impl State {
    pub fn order(&self) -> i64 {
        self.id.order()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            StateRole::Module => write!(f, "module[{}]", self.block),
            StateRole::Memory => write!(f, "mem[{}.{}]", self.block, self.local),
            StateRole::Used => write!(f, "used[{}.{}]", self.block, self.local),
        }
    }
}

/// Bounded template of positions a workflow of `length` steps can occupy.
///
/// Layout by absolute order, with `i` input and `o` output branching:
///
/// ```text
/// mem[0.*]  used[0.*] module[0] mem[1.*]  used[1.*] module[1] ... mem[n.*]  used[n.*]
/// ```
///
/// `used[n.*]` is the output sink: the workflow outputs are read from it.
#[derive(Debug, Clone)]
pub struct Automaton {
    length: usize,
    input_branching: usize,
    output_branching: usize,
    states: Vec<State>,
    modules: Vec<StateId>,
    memory: Vec<Vec<StateId>>,
    used: Vec<Vec<StateId>>,
}

impl Automaton {
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn input_branching(&self) -> usize {
        self.input_branching
    }

    pub fn output_branching(&self) -> usize {
        self.output_branching
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        if id.is_null() {
            return None;
        }
        self.states.get(id.0 as usize)
    }

    /// All states in absolute order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn modules(&self) -> &[StateId] {
        &self.modules
    }

    pub fn module(&self, step: usize) -> Option<StateId> {
        self.modules.get(step).copied()
    }

    pub fn first_module(&self) -> StateId {
        self.modules[0]
    }

    pub fn last_module(&self) -> StateId {
        self.modules[self.length - 1]
    }

    /// `length + 1` memory blocks; block 0 holds the workflow inputs.
    pub fn memory_blocks(&self) -> &[Vec<StateId>] {
        &self.memory
    }

    /// `length + 1` used blocks; block `k < length` feeds module `k`,
    /// block `length` is the output sink.
    pub fn used_blocks(&self) -> &[Vec<StateId>] {
        &self.used
    }

    pub fn workflow_input_slots(&self) -> &[StateId] {
        &self.memory[0]
    }

    pub fn sink(&self) -> &[StateId] {
        &self.used[self.length]
    }

    pub fn memory_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.memory.iter().flatten().copied()
    }

    pub fn used_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.used.iter().flatten().copied()
    }

    /// Memory states a used slot may reference: every memory state of strictly
    /// smaller order. The null state is always legal in addition.
    pub fn legal_references(&self, used: StateId) -> impl Iterator<Item = StateId> + '_ {
        self.memory_states().filter(move |m| m.order() < used.order())
    }

    /// Module producing the given memory block, if any.
    pub fn producer_of_block(&self, block: usize) -> Option<StateId> {
        block.checked_sub(1).and_then(|k| self.module(k))
    }

    /// Module step immediately after the given one.
    pub fn next_step(&self, step: usize) -> Option<usize> {
        (step + 1 < self.length).then_some(step + 1)
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Automaton(length={}, inputs={}, outputs={})",
            self.length, self.input_branching, self.output_branching
        )?;
        for state in &self.states {
            writeln!(f, "  {:>4}: {state}", state.order())?;
        }
        Ok(())
    }
}

/// Builds the module and type automata for one length bound. Numbering
/// lives on the builder so independent bounds can be built concurrently.
#[derive(Debug, Clone)]
pub struct AutomatonBuilder {
    length: usize,
    input_branching: usize,
    output_branching: usize,
}

impl AutomatonBuilder {
    pub fn new(length: usize, input_branching: usize, output_branching: usize) -> Self {
        let length = if length == 0 {
            warn!("workflow length 0 is not representable, using 1");
            1
        } else {
            length
        };
        Self {
            length,
            input_branching,
            output_branching,
        }
    }

    fn block_base(&self, step: usize) -> usize {
        self.output_branching + step * (self.input_branching + 1 + self.output_branching)
    }

    /// Module states, one per step, in order.
    pub fn build_module_automaton(&self) -> Vec<State> {
        (0..self.length)
            .map(|k| State {
                id: StateId::from_order(self.block_base(k) + self.input_branching),
                role: StateRole::Module,
                local: 0,
                block: k,
            })
            .collect()
    }

    /// Memory blocks `0..=length` and used blocks `0..=length`.
    pub fn build_type_automaton(&self) -> (Vec<Vec<State>>, Vec<Vec<State>>) {
        let memory = (0..=self.length)
            .map(|block| {
                let start = match block {
                    0 => 0,
                    k => self.block_base(k - 1) + self.input_branching + 1,
                };
                (0..self.output_branching)
                    .map(|j| State {
                        id: StateId::from_order(start + j),
                        role: StateRole::Memory,
                        local: j,
                        block,
                    })
                    .collect()
            })
            .collect();
        let used = (0..=self.length)
            .map(|block| {
                let start = self.block_base(block);
                (0..self.input_branching)
                    .map(|j| State {
                        id: StateId::from_order(start + j),
                        role: StateRole::Used,
                        local: j,
                        block,
                    })
                    .collect()
            })
            .collect();
        (memory, used)
    }

    pub fn build(&self) -> Automaton {
        let modules = self.build_module_automaton();
        let (memory, used) = self.build_type_automaton();

        let mut states: Vec<State> = modules
            .iter()
            .chain(memory.iter().flatten())
            .chain(used.iter().flatten())
            .copied()
            .collect();
        states.sort_by_key(|s| s.id);

        let ids = |blocks: &Vec<Vec<State>>| -> Vec<Vec<StateId>> {
            blocks
                .iter()
                .map(|b| b.iter().map(|s| s.id).collect())
                .collect()
        };
        Automaton {
            length: self.length,
            input_branching: self.input_branching,
            output_branching: self.output_branching,
            modules: modules.iter().map(|s| s.id).collect(),
            memory: ids(&memory),
            used: ids(&used),
            states,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_are_dense_and_follow_progression() {
        let a = AutomatonBuilder::new(2, 2, 1).build();
        let orders: Vec<i64> = a.states().iter().map(State::order).collect();
        let expected: Vec<i64> = (0..orders.len() as i64).collect();
        assert_eq!(orders, expected);
        // 1 + 2 * (2 + 1 + 1) + 2
        assert_eq!(a.states().len(), 11);

        for k in 0..a.length() {
            let module = a.modules()[k];
            assert!(a.used_blocks()[k].iter().all(|u| *u < module));
            assert!(a.memory_blocks()[k + 1].iter().all(|m| module < *m));
            assert!(a.memory_blocks()[k + 1]
                .iter()
                .all(|m| a.used_blocks()[k + 1].iter().all(|u| m < u)));
        }
    }

    // ---------------------------------------------------------------
    // Roles and blocks
    // ---------------------------------------------------------------

    #[test]
    fn blocks_have_branching_sizes() {
        let a = AutomatonBuilder::new(3, 2, 4).build();
        assert_eq!(a.memory_blocks().len(), 4);
        assert_eq!(a.used_blocks().len(), 4);
        assert!(a.memory_blocks().iter().all(|b| b.len() == 4));
        assert!(a.used_blocks().iter().all(|b| b.len() == 2));
        assert_eq!(a.sink(), a.used_blocks()[3].as_slice());
        assert_eq!(a.workflow_input_slots(), a.memory_blocks()[0].as_slice());

        let m = a.state(a.memory_blocks()[2][3]).unwrap();
        assert_eq!((m.role, m.block, m.local), (StateRole::Memory, 2, 3));
        let module = a.state(a.last_module()).unwrap();
        assert_eq!((module.role, module.block), (StateRole::Module, 2));
    }

    #[test]
    fn zero_length_is_clamped_to_one() {
        let a = AutomatonBuilder::new(0, 1, 1).build();
        assert_eq!(a.length(), 1);
        assert_eq!(a.first_module(), a.last_module());
    }

    #[test]
    fn null_state_orders_first() {
        assert_eq!(StateId::NULL.order(), -1);
        assert!(StateId::NULL < StateId::from_order(0));
        let a = AutomatonBuilder::new(1, 1, 1).build();
        assert!(a.state(StateId::NULL).is_none());
        assert_eq!(StateId::NULL.to_string(), "null");
    }

    #[test]
    fn legal_references_point_backwards() {
        let a = AutomatonBuilder::new(2, 1, 2).build();
        let first_used = a.used_blocks()[0][0];
        let legal: Vec<_> = a.legal_references(first_used).collect();
        assert_eq!(legal, a.memory_blocks()[0]);

        let sink = a.sink()[0];
        assert_eq!(a.legal_references(sink).count(), 6);
    }

    #[test]
    fn producer_and_next_step() {
        let a = AutomatonBuilder::new(2, 1, 1).build();
        assert_eq!(a.producer_of_block(0), None);
        assert_eq!(a.producer_of_block(2), Some(a.modules()[1]));
        assert_eq!(a.next_step(0), Some(1));
        assert_eq!(a.next_step(1), None);
    }

    #[test]
    fn display_lists_states() {
        let a = AutomatonBuilder::new(1, 1, 1).build();
        let text = a.to_string();
        assert!(text.contains("mem[0.0]"));
        assert!(text.contains("module[0]"));
        assert!(text.contains("used[1.0]"));
    }
}
