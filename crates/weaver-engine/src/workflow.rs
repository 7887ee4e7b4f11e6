use serde::Serialize;
use std::fmt;

/// Where a data item comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Producer {
    /// Declared workflow input at the given position.
    WorkflowInput(usize),
    /// Output of the tool at `step`.
    Tool { step: usize },
}

/// Who reads a data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Consumer {
    /// Input `input` of the tool at `step`.
    Tool { step: usize, input: usize },
    /// Declared workflow output at the given position.
    WorkflowOutput(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataNode {
    /// Index into [`WorkflowGraph::data`].
    pub index: usize,
    /// Leaf type per data dimension.
    pub types: Vec<String>,
    pub label: Option<String>,
    pub producer: Producer,
    pub consumers: Vec<Consumer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolNode {
    pub step: usize,
    pub tool: String,
    pub label: String,
    /// Data consumed, by input position. `None` for unused input slots.
    pub inputs: Vec<Option<usize>>,
    /// Data produced, by output position.
    pub outputs: Vec<usize>,
    pub execution_template: Option<String>,
}

/// A decoded solution. Tools are in step order and data items in the
/// order their slots appear in the automaton, so every edge points forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowGraph {
    pub length: usize,
    pub tools: Vec<ToolNode>,
    pub data: Vec<DataNode>,
    /// Data items in the first memory block.
    pub inputs: Vec<usize>,
    /// Data items read by the output sink, by sink position.
    pub outputs: Vec<usize>,
}

impl WorkflowGraph {
    /// Tool ids in step order.
    pub fn tool_sequence(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.tool.as_str()).collect()
    }

    /// Producer/consumer edges as `(data, consumer)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&DataNode, Consumer)> + '_ {
        self.data
            .iter()
            .flat_map(|d| d.consumers.iter().map(move |c| (d, *c)))
    }

    /// Whether every edge runs from an earlier producer to a later
    /// consumer.
    pub fn is_forward(&self) -> bool {
        self.edges().all(|(d, c)| match (d.producer, c) {
            (Producer::Tool { step: from }, Consumer::Tool { step: to, .. }) => from < to,
            _ => true,
        })
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}: {}", self.index, self.types.join(", "))?;
        if let Some(label) = &self.label {
            write!(f, " ({label})")?;
        }
        Ok(())
    }
}

impl fmt::Display for WorkflowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &i in &self.inputs {
            writeln!(f, "in   {}", self.data[i])?;
        }
        for tool in &self.tools {
            let inputs: Vec<String> = tool
                .inputs
                .iter()
                .flatten()
                .map(|i| format!("d{i}"))
                .collect();
            let outputs: Vec<String> = tool.outputs.iter().map(|&o| self.data[o].to_string()).collect();
            writeln!(
                f,
                "{:>3}. {}({}) -> [{}]",
                tool.step + 1,
                tool.tool,
                inputs.join(", "),
                outputs.join("; ")
            )?;
        }
        for &o in &self.outputs {
            writeln!(f, "out  d{o}")?;
        }
        Ok(())
    }
}
