//! Tool library and workflow I/O resolved against the taxonomy.
//!
//! Building a [`Domain`] is a two-phase affair: the raw class tree is first
//! validated on its own, then tools, workflow labels and artificial leaves are
//! attached and the final taxonomy is rebuilt with relevance marked.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::errors::DomainError;
use crate::taxonomy::{
    Hierarchy, Predicate, PredicateId, RawClass, Roots, Taxonomy, ARTIFICIAL_SUFFIX,
    EMPTY_LABEL_ID,
};

/// Data annotation as written in a tool or problem description: a set of
/// type names (at most one per dimension) and an optional label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DataAnnotation {
    pub types: Vec<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl DataAnnotation {
    pub fn of(types: &[&str]) -> Self {
        Self {
            types: types.iter().map(|t| t.to_string()).collect(),
            label: None,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A tool record handed over by the annotation loader.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolAnnotation {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Operation classes the tool is attached under. Empty means the root.
    #[serde(default)]
    pub operations: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<DataAnnotation>,
    #[serde(default)]
    pub outputs: Vec<DataAnnotation>,
    #[serde(default)]
    pub execution_template: Option<String>,
}

impl ToolAnnotation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            operations: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            execution_template: None,
        }
    }

    pub fn under(mut self, operation: impl Into<String>) -> Self {
        self.operations.push(operation.into());
        self
    }

    pub fn input(mut self, data: DataAnnotation) -> Self {
        self.inputs.push(data);
        self
    }

    pub fn output(mut self, data: DataAnnotation) -> Self {
        self.outputs.push(data);
        self
    }
}

/// Everything needed to build the domain of one run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DomainInput {
    pub roots: Roots,
    #[serde(default)]
    pub classes: Vec<RawClass>,
    #[serde(default)]
    pub tools: Vec<ToolAnnotation>,
    /// Workflow inputs, available in the first memory block.
    #[serde(default)]
    pub inputs: Vec<DataAnnotation>,
    /// Workflow outputs, required in the output sink.
    #[serde(default)]
    pub outputs: Vec<DataAnnotation>,
}

/// Conjunctive set of type predicates, ordered by dimension.
///
/// Produced data (tool outputs, workflow inputs) names one leaf per
/// dimension; consumed data may omit dimensions it does not care about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DataSpec {
    pub types: Vec<PredicateId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tool {
    pub predicate: PredicateId,
    pub id: String,
    pub label: String,
    pub inputs: Vec<DataSpec>,
    pub outputs: Vec<DataSpec>,
    pub execution_template: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Domain {
    taxonomy: Taxonomy,
    tools: Vec<Tool>,
    by_predicate: HashMap<PredicateId, usize>,
    inputs: Vec<DataSpec>,
    outputs: Vec<DataSpec>,
}

/// Classes to attach in the second phase, keyed by id.
#[derive(Default)]
struct Extension {
    classes: IndexMap<String, RawClass>,
    artificial: IndexSet<String>,
}

impl Extension {
    fn attach(&mut self, id: &str, parent: &str) {
        self.classes
            .entry(id.to_string())
            .or_insert_with(|| RawClass::new(id, &[]))
            .parents
            .push(parent.to_string());
    }
}

/// A data annotation resolved to predicate ids of the validated class tree.
struct PendingSpec {
    names: Vec<String>,
}

impl Domain {
    pub fn build(input: &DomainInput) -> Result<Self, DomainError> {
        let base = Taxonomy::build(&input.roots, &input.classes)?;
        let mut ext = Extension::default();

        let mut pending_tools = Vec::with_capacity(input.tools.len());
        for tool in &input.tools {
            if tool.inputs.is_empty() && tool.outputs.is_empty() {
                return Err(DomainError::UnusableTool(tool.id.clone()));
            }
            attach_tool(&base, &input.roots, tool, &mut ext)?;
            let inputs = tool
                .inputs
                .iter()
                .map(|d| resolve_annotation(&base, &input.roots, d, false, &mut ext))
                .collect::<Result<Vec<_>, _>>()?;
            let outputs = tool
                .outputs
                .iter()
                .map(|d| {
                    if d.label.is_some() {
                        return Err(DomainError::LabelledToolOutput(tool.id.clone()));
                    }
                    resolve_annotation(&base, &input.roots, d, true, &mut ext)
                })
                .collect::<Result<Vec<_>, _>>()?;
            pending_tools.push((tool, inputs, outputs));
        }
        let pending_inputs = input
            .inputs
            .iter()
            .map(|d| resolve_annotation(&base, &input.roots, d, true, &mut ext))
            .collect::<Result<Vec<_>, _>>()?;
        let pending_outputs = input
            .outputs
            .iter()
            .map(|d| resolve_annotation(&base, &input.roots, d, false, &mut ext))
            .collect::<Result<Vec<_>, _>>()?;

        let mut classes = input.classes.clone();
        classes.extend(ext.classes.into_values());
        let taxonomy = Taxonomy::build_with_artificial(&input.roots, &classes, &ext.artificial)?;

        let finish = |pending: &PendingSpec| -> Result<DataSpec, DomainError> {
            let types = pending
                .names
                .iter()
                .map(|n| {
                    taxonomy
                        .lookup(n)
                        .ok_or_else(|| DomainError::UnknownPredicate(n.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DataSpec { types })
        };

        let mut tools = Vec::with_capacity(pending_tools.len());
        for (ann, ins, outs) in &pending_tools {
            let predicate = taxonomy
                .lookup(&ann.id)
                .ok_or_else(|| DomainError::UnknownPredicate(ann.id.clone()))?;
            tools.push(Tool {
                predicate,
                id: ann.id.clone(),
                label: ann.label.clone().unwrap_or_else(|| ann.id.clone()),
                inputs: ins.iter().map(&finish).collect::<Result<_, _>>()?,
                outputs: outs.iter().map(&finish).collect::<Result<_, _>>()?,
                execution_template: ann.execution_template.clone(),
            });
        }
        let inputs = pending_inputs
            .iter()
            .map(&finish)
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = pending_outputs
            .iter()
            .map(&finish)
            .collect::<Result<Vec<_>, _>>()?;

        let seeds: Vec<PredicateId> = tools
            .iter()
            .flat_map(|t| {
                std::iter::once(t.predicate)
                    .chain(t.inputs.iter().flat_map(|d| d.types.iter().copied()))
                    .chain(t.outputs.iter().flat_map(|d| d.types.iter().copied()))
            })
            .chain(inputs.iter().flat_map(|d| d.types.iter().copied()))
            .chain(outputs.iter().flat_map(|d| d.types.iter().copied()))
            .collect();
        let taxonomy = taxonomy.with_relevance(seeds);

        let by_predicate = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.predicate, i))
            .collect();
        info!(
            predicates = taxonomy.len(),
            relevant = taxonomy.iter().filter(|p| p.relevant).count(),
            tools = tools.len(),
            inputs = inputs.len(),
            outputs = outputs.len(),
            "domain built"
        );
        Ok(Self {
            taxonomy,
            tools,
            by_predicate,
            inputs,
            outputs,
        })
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Tool whose leaf predicate is `predicate`, if any.
    pub fn tool(&self, predicate: PredicateId) -> Option<&Tool> {
        self.by_predicate.get(&predicate).map(|&i| &self.tools[i])
    }

    pub fn inputs(&self) -> &[DataSpec] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[DataSpec] {
        &self.outputs
    }

    pub fn max_tool_inputs(&self) -> usize {
        self.tools.iter().map(|t| t.inputs.len()).max().unwrap_or(0)
    }

    pub fn max_tool_outputs(&self) -> usize {
        self.tools.iter().map(|t| t.outputs.len()).max().unwrap_or(0)
    }

    /// Human-readable rendering of a data spec, e.g. `Photo+PNG`.
    pub fn describe(&self, spec: &DataSpec) -> String {
        let parts: Vec<&str> = spec
            .types
            .iter()
            .filter_map(|&t| self.taxonomy.get(t))
            .map(|p| p.label.as_str())
            .collect();
        if parts.is_empty() {
            "any".to_string()
        } else {
            parts.join("+")
        }
    }
}

fn attach_tool(
    base: &Taxonomy,
    roots: &Roots,
    tool: &ToolAnnotation,
    ext: &mut Extension,
) -> Result<(), DomainError> {
    if let Some(existing) = base.lookup(&tool.id).and_then(|id| base.get(id)) {
        if existing.hierarchy != Hierarchy::Tool || !existing.children.is_empty() {
            return Err(DomainError::WrongHierarchy {
                name: tool.id.clone(),
                expected: "tool leaf".into(),
            });
        }
        debug!(tool = %tool.id, "tool already declared in the class tree");
        return Ok(());
    }
    if ext.classes.contains_key(&tool.id) {
        return Err(DomainError::DuplicateClass(tool.id.clone()));
    }
    if tool.operations.is_empty() {
        ext.attach(&tool.id, &roots.tools);
    }
    for op in &tool.operations {
        let p = base.resolve(op)?;
        if p.hierarchy != Hierarchy::Tool {
            return Err(DomainError::WrongHierarchy {
                name: op.clone(),
                expected: "tool class".into(),
            });
        }
        ext.attach(&tool.id, &p.id);
    }
    if let Some(class) = ext.classes.get_mut(&tool.id) {
        class.label = tool.label.clone();
    }
    Ok(())
}

fn resolve_annotation(
    base: &Taxonomy,
    roots: &Roots,
    ann: &DataAnnotation,
    produced: bool,
    ext: &mut Extension,
) -> Result<PendingSpec, DomainError> {
    let dims = base.data_roots();
    let mut chosen: Vec<Option<&Predicate>> = vec![None; dims.len()];
    for name in &ann.types {
        let p = base.resolve(name)?;
        let dim = dims
            .iter()
            .position(|&d| d == p.root)
            .filter(|_| p.hierarchy == Hierarchy::Data)
            .ok_or_else(|| DomainError::WrongHierarchy {
                name: name.clone(),
                expected: "data type".into(),
            })?;
        if let Some(first) = chosen[dim] {
            return Err(DomainError::DuplicateDimension {
                dimension: roots.data[dim].clone(),
                first: first.id.clone(),
                second: p.id.clone(),
            });
        }
        chosen[dim] = Some(p);
    }

    let mut names = Vec::with_capacity(dims.len() + 1);
    for (dim, choice) in chosen.into_iter().enumerate() {
        let p = match (choice, produced) {
            (Some(p), _) => p,
            (None, false) => continue,
            (None, true) => base
                .get(dims[dim])
                .ok_or_else(|| DomainError::UnknownPredicate(roots.data[dim].clone()))?,
        };
        if !produced || p.is_leaf() {
            names.push(p.id.clone());
            continue;
        }
        let leaf = format!("{}{ARTIFICIAL_SUFFIX}", p.id);
        if base.lookup(&leaf).is_none() && ext.artificial.insert(leaf.clone()) {
            ext.attach(&leaf, &p.id);
            if let Some(class) = ext.classes.get_mut(&leaf) {
                class.label = Some(p.label.clone());
            }
        }
        names.push(leaf);
    }

    match (&ann.label, &roots.label) {
        (Some(label), None) => return Err(DomainError::NoLabelDimension(label.clone())),
        (Some(label), Some(label_root)) => {
            match base.lookup(label).and_then(|id| base.get(id)) {
                Some(p) if p.hierarchy != Hierarchy::Label => {
                    return Err(DomainError::WrongHierarchy {
                        name: label.clone(),
                        expected: "label".into(),
                    })
                }
                Some(_) => {}
                None => {
                    if !ext.classes.contains_key(label) {
                        ext.attach(label, label_root);
                    }
                }
            }
            names.push(label.clone());
        }
        (None, Some(_)) if produced => names.push(EMPTY_LABEL_ID.to_string()),
        (None, _) => {}
    }
    Ok(PendingSpec { names })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::NodeKind;

    fn roots() -> Roots {
        Roots {
            tools: "Tools".into(),
            data: vec!["Type".into(), "Format".into()],
            label: None,
        }
    }

    fn base_input() -> DomainInput {
        DomainInput {
            roots: roots(),
            classes: vec![
                RawClass::new("Convert", &["Tools"]),
                RawClass::new("Image", &["Type"]),
                RawClass::new("Photo", &["Image"]),
                RawClass::new("Table", &["Type"]),
                RawClass::new("PNG", &["Format"]),
                RawClass::new("CSV", &["Format"]),
            ],
            tools: vec![
                ToolAnnotation::new("to_png")
                    .under("Convert")
                    .input(DataAnnotation::of(&["Image"]))
                    .output(DataAnnotation::of(&["Photo", "PNG"])),
                ToolAnnotation::new("tabulate")
                    .input(DataAnnotation::of(&["Photo"]))
                    .output(DataAnnotation::of(&["Table"])),
            ],
            inputs: vec![DataAnnotation::of(&["Photo", "CSV"])],
            outputs: vec![DataAnnotation::of(&["Table"])],
        }
    }

    #[test]
    fn tools_become_leaves_under_their_operations() {
        let domain = Domain::build(&base_input()).unwrap();
        let tax = domain.taxonomy();
        let to_png = tax.resolve("to_png").unwrap();
        assert_eq!(to_png.kind, NodeKind::Leaf);
        assert_eq!(to_png.parents, vec![tax.lookup("Convert").unwrap()]);
        let tabulate = tax.resolve("tabulate").unwrap();
        assert_eq!(tabulate.parents, vec![tax.tool_root()]);
        assert_eq!(domain.tool(to_png.index).unwrap().id, "to_png");
        assert!(to_png.relevant);
    }

    #[test]
    fn missing_produced_dimension_defaults_to_artificial_root_leaf() {
        let domain = Domain::build(&base_input()).unwrap();
        let tax = domain.taxonomy();
        let tabulate = domain.tool(tax.lookup("tabulate").unwrap()).unwrap();
        let produced = &tabulate.outputs[0];
        assert_eq!(produced.types.len(), 2);
        let format_leaf = tax.get(produced.types[1]).unwrap();
        assert_eq!(format_leaf.id, "Format_plain");
        assert_eq!(format_leaf.kind, NodeKind::ArtificialLeaf);
        assert_eq!(domain.describe(produced), "Table+Format");
    }

    #[test]
    fn consumed_specs_keep_abstract_types() {
        let domain = Domain::build(&base_input()).unwrap();
        let tax = domain.taxonomy();
        let to_png = domain.tool(tax.lookup("to_png").unwrap()).unwrap();
        assert_eq!(to_png.inputs[0].types, vec![tax.lookup("Image").unwrap()]);
        assert!(tax.lookup("Image_plain").is_none());
    }

    #[test]
    fn abstract_output_gets_artificial_leaf() {
        let mut input = base_input();
        input.tools.push(
            ToolAnnotation::new("snap")
                .input(DataAnnotation::of(&["Table"]))
                .output(DataAnnotation::of(&["Image", "PNG"])),
        );
        let domain = Domain::build(&input).unwrap();
        let tax = domain.taxonomy();
        let leaf = tax.resolve("Image_plain").unwrap();
        assert_eq!(leaf.kind, NodeKind::ArtificialLeaf);
        assert_eq!(leaf.parents, vec![tax.lookup("Image").unwrap()]);
        assert_eq!(tax.resolve("Image").unwrap().kind, NodeKind::Abstract);
    }

    #[test]
    fn unusable_tool_is_rejected() {
        let mut input = base_input();
        input.tools.push(ToolAnnotation::new("noop"));
        assert_eq!(
            Domain::build(&input).unwrap_err(),
            DomainError::UnusableTool("noop".into())
        );
    }

    #[test]
    fn two_types_of_one_dimension_are_rejected() {
        let mut input = base_input();
        input.inputs.push(DataAnnotation::of(&["Photo", "Table"]));
        assert!(matches!(
            Domain::build(&input),
            Err(DomainError::DuplicateDimension { ref dimension, .. }) if dimension == "Type"
        ));
    }

    #[test]
    fn tool_class_as_data_type_is_rejected() {
        let mut input = base_input();
        input.outputs.push(DataAnnotation::of(&["Convert"]));
        assert!(matches!(
            Domain::build(&input),
            Err(DomainError::WrongHierarchy { .. })
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut input = base_input();
        input.outputs.push(DataAnnotation::of(&["Spreadsheet"]));
        assert_eq!(
            Domain::build(&input).unwrap_err(),
            DomainError::UnknownPredicate("Spreadsheet".into())
        );
    }

    #[test]
    fn labels_require_label_dimension() {
        let mut input = base_input();
        input.inputs[0] = DataAnnotation::of(&["Photo"]).labelled("holiday");
        assert_eq!(
            Domain::build(&input).unwrap_err(),
            DomainError::NoLabelDimension("holiday".into())
        );

        input.roots.label = Some("Label".into());
        let domain = Domain::build(&input).unwrap();
        let tax = domain.taxonomy();
        let holiday = tax.resolve("holiday").unwrap();
        assert_eq!(holiday.hierarchy, Hierarchy::Label);
        assert_eq!(domain.inputs()[0].types.last(), Some(&holiday.index));
        let tabulate = domain.tool(tax.lookup("tabulate").unwrap()).unwrap();
        assert_eq!(tabulate.outputs[0].types.last().copied(), tax.empty_label());
    }

    #[test]
    fn labelled_tool_output_is_rejected() {
        let mut input = base_input();
        input.roots.label = Some("Label".into());
        input.tools[0].outputs[0].label = Some("x".into());
        assert_eq!(
            Domain::build(&input).unwrap_err(),
            DomainError::LabelledToolOutput("to_png".into())
        );
    }

    #[test]
    fn unreferenced_classes_are_irrelevant() {
        let mut input = base_input();
        input.classes.push(RawClass::new("Audio", &["Type"]));
        let domain = Domain::build(&input).unwrap();
        assert!(!domain.taxonomy().resolve("Audio").unwrap().relevant);
        assert_eq!(domain.max_tool_inputs(), 1);
        assert_eq!(domain.max_tool_outputs(), 1);
    }
}
