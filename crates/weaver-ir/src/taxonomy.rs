use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::errors::DomainError;

/// Index of a predicate in the taxonomy arena.
pub type PredicateId = usize;

/// Identifier of the synthetic predicate marking an unused data slot.
pub const EMPTY_ID: &str = "weaver:empty";
/// Identifier of the synthetic "no label" leaf of the label dimension.
pub const EMPTY_LABEL_ID: &str = "weaver:empty_label";
/// Suffix of the artificial leaf standing for an abstract class itself.
pub const ARTIFICIAL_SUFFIX: &str = "_plain";

/// Structural role of a predicate in its hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Root,
    Abstract,
    Leaf,
    /// Concrete stand-in for an abstract class that is produced as data.
    ArtificialLeaf,
    Empty,
    EmptyLabel,
}

impl NodeKind {
    /// Whether a predicate of this kind can be the concrete content of a slot.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeKind::Leaf | NodeKind::ArtificialLeaf | NodeKind::Empty | NodeKind::EmptyLabel
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Root => write!(f, "root"),
            NodeKind::Abstract => write!(f, "abstract"),
            NodeKind::Leaf => write!(f, "leaf"),
            NodeKind::ArtificialLeaf => write!(f, "artificial_leaf"),
            NodeKind::Empty => write!(f, "empty"),
            NodeKind::EmptyLabel => write!(f, "empty_label"),
        }
    }
}

/// Which family of declared roots a predicate hangs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Hierarchy {
    Tool,
    Data,
    Label,
}

/// Declared hierarchy roots of one run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Roots {
    /// Root of the tool/operation hierarchy.
    pub tools: String,
    /// Roots of the data dimensions (e.g. `Type`, `Format`).
    pub data: Vec<String>,
    /// Optional root of the data-instance label dimension.
    #[serde(default)]
    pub label: Option<String>,
}

/// One class of the raw class tree handed over by the ontology loader.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawClass {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl RawClass {
    pub fn new(id: impl Into<String>, parents: &[&str]) -> Self {
        Self {
            id: id.into(),
            label: None,
            parents: parents.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// A node of the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predicate {
    pub index: PredicateId,
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    /// Root of the hierarchy this predicate belongs to.
    pub root: PredicateId,
    pub hierarchy: Hierarchy,
    pub relevant: bool,
    pub children: Vec<PredicateId>,
    pub parents: Vec<PredicateId>,
}

impl Predicate {
    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }
}

#[derive(Clone, Copy)]
enum Visit {
    Unvisited,
    InProgress,
    Done(PredicateId),
}

/// Immutable arena of predicates keyed by index, with sub/super links
/// stored as index lists.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    predicates: Vec<Predicate>,
    index: IndexMap<String, PredicateId>,
    tool_root: PredicateId,
    data_roots: Vec<PredicateId>,
    label_root: Option<PredicateId>,
    empty: PredicateId,
    empty_label: Option<PredicateId>,
}

impl Taxonomy {
    /// Build the taxonomy from declared roots and a raw class tree.
    ///
    /// Fails when a class reaches two declared roots, references an absent
    /// superclass, sits on a subclass cycle, or reaches no root at all.
    pub fn build(roots: &Roots, classes: &[RawClass]) -> Result<Self, DomainError> {
        Self::build_with_artificial(roots, classes, &IndexSet::new())
    }

    pub(crate) fn build_with_artificial(
        roots: &Roots,
        classes: &[RawClass],
        artificial: &IndexSet<String>,
    ) -> Result<Self, DomainError> {
        let mut declared: Vec<(&str, Hierarchy)> = vec![(roots.tools.as_str(), Hierarchy::Tool)];
        declared.extend(roots.data.iter().map(|r| (r.as_str(), Hierarchy::Data)));
        if let Some(label) = &roots.label {
            declared.push((label.as_str(), Hierarchy::Label));
        }

        let mut index: IndexMap<String, PredicateId> = IndexMap::new();
        let mut labels: Vec<String> = Vec::new();
        let mut raw_parents: Vec<Vec<String>> = Vec::new();
        let mut root_hierarchy: HashMap<PredicateId, Hierarchy> = HashMap::new();

        for (name, hierarchy) in &declared {
            if let Some(&existing) = index.get(*name) {
                return Err(DomainError::HierarchyOverlap {
                    class: name.to_string(),
                    first: labels[existing].clone(),
                    second: name.to_string(),
                });
            }
            let id = index.len();
            index.insert(name.to_string(), id);
            labels.push(name.to_string());
            raw_parents.push(Vec::new());
            root_hierarchy.insert(id, *hierarchy);
        }

        for class in classes {
            if class.id == EMPTY_ID || class.id == EMPTY_LABEL_ID {
                return Err(DomainError::DuplicateClass(class.id.clone()));
            }
            if let Some(&id) = index.get(&class.id) {
                if !root_hierarchy.contains_key(&id) {
                    return Err(DomainError::DuplicateClass(class.id.clone()));
                }
                if !class.parents.is_empty() {
                    return Err(DomainError::RootWithParent(class.id.clone()));
                }
                if let Some(label) = &class.label {
                    labels[id] = label.clone();
                }
                continue;
            }
            let id = index.len();
            index.insert(class.id.clone(), id);
            labels.push(class.label.clone().unwrap_or_else(|| class.id.clone()));
            raw_parents.push(class.parents.clone());
        }

        let empty = index.len();
        index.insert(EMPTY_ID.to_string(), empty);
        labels.push("empty".to_string());
        raw_parents.push(Vec::new());
        root_hierarchy.insert(empty, Hierarchy::Data);

        let empty_label = roots.label.as_ref().map(|label_root| {
            let id = index.len();
            index.insert(EMPTY_LABEL_ID.to_string(), id);
            labels.push("unlabelled".to_string());
            raw_parents.push(vec![label_root.clone()]);
            id
        });

        let names: Vec<&str> = index.keys().map(String::as_str).collect();
        let mut parents: Vec<Vec<PredicateId>> = vec![Vec::new(); names.len()];
        for (id, raw) in raw_parents.iter().enumerate() {
            for parent in raw {
                let pid = index.get(parent).copied().ok_or_else(|| {
                    DomainError::DanglingSuperclass {
                        class: names[id].to_string(),
                        superclass: parent.clone(),
                    }
                })?;
                if !parents[id].contains(&pid) {
                    parents[id].push(pid);
                }
            }
        }

        let mut visits = vec![Visit::Unvisited; names.len()];
        let mut owning_root = Vec::with_capacity(names.len());
        for id in 0..names.len() {
            owning_root.push(resolve_root(
                id,
                &parents,
                &root_hierarchy,
                &names,
                &mut visits,
            )?);
        }

        let mut children: Vec<Vec<PredicateId>> = vec![Vec::new(); names.len()];
        for (id, ps) in parents.iter().enumerate() {
            for &p in ps {
                children[p].push(id);
            }
        }

        let predicates = (0..names.len())
            .map(|id| {
                let kind = if id == empty {
                    NodeKind::Empty
                } else if Some(id) == empty_label {
                    NodeKind::EmptyLabel
                } else if root_hierarchy.contains_key(&id) {
                    NodeKind::Root
                } else if !children[id].is_empty() {
                    NodeKind::Abstract
                } else if artificial.contains(names[id]) {
                    NodeKind::ArtificialLeaf
                } else {
                    NodeKind::Leaf
                };
                let root = owning_root[id];
                Predicate {
                    index: id,
                    id: names[id].to_string(),
                    label: labels[id].clone(),
                    kind,
                    root,
                    hierarchy: root_hierarchy[&root],
                    relevant: false,
                    children: children[id].clone(),
                    parents: parents[id].clone(),
                }
            })
            .collect();

        let data_roots = roots.data.iter().map(|r| index[r.as_str()]).collect();
        let label_root = roots.label.as_ref().map(|r| index[r.as_str()]);
        Ok(Self {
            tool_root: index[roots.tools.as_str()],
            predicates,
            index,
            data_roots,
            label_root,
            empty,
            empty_label,
        })
    }

    /// Flag the seeds, their ancestors and (outside the tool hierarchy)
    /// their descendants as relevant. Only relevant predicates get atoms.
    pub fn with_relevance(mut self, seeds: impl IntoIterator<Item = PredicateId>) -> Self {
        let mut marked = IndexSet::new();
        marked.insert(self.empty);
        if let Some(empty_label) = self.empty_label {
            marked.insert(empty_label);
        }
        for seed in seeds {
            if seed >= self.predicates.len() {
                continue;
            }
            marked.insert(seed);
            marked.extend(self.ancestors(seed));
            if self.predicates[seed].hierarchy != Hierarchy::Tool {
                marked.extend(self.descendants(seed));
            }
        }
        for id in marked {
            self.predicates[id].relevant = true;
        }
        self
    }

    pub fn get(&self, id: PredicateId) -> Option<&Predicate> {
        self.predicates.get(id)
    }

    pub fn lookup(&self, name: &str) -> Option<PredicateId> {
        self.index.get(name).copied()
    }

    /// Resolve a predicate by id string or, failing that, by label.
    pub fn resolve(&self, name: &str) -> Result<&Predicate, DomainError> {
        self.lookup(name)
            .or_else(|| self.predicates.iter().position(|p| p.label == name))
            .map(|id| &self.predicates[id])
            .ok_or_else(|| DomainError::UnknownPredicate(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn tool_root(&self) -> PredicateId {
        self.tool_root
    }

    pub fn data_roots(&self) -> &[PredicateId] {
        &self.data_roots
    }

    pub fn label_root(&self) -> Option<PredicateId> {
        self.label_root
    }

    /// Data dimensions including the label dimension, in declaration order.
    pub fn dimensions(&self) -> Vec<PredicateId> {
        self.data_roots.iter().copied().chain(self.label_root).collect()
    }

    pub fn empty(&self) -> PredicateId {
        self.empty
    }

    pub fn empty_label(&self) -> Option<PredicateId> {
        self.empty_label
    }

    pub fn is_root(&self, id: PredicateId) -> bool {
        self.predicates
            .get(id)
            .is_some_and(|p| p.kind == NodeKind::Root)
    }

    pub fn children(&self, id: PredicateId) -> &[PredicateId] {
        self.predicates
            .get(id)
            .map(|p| p.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parents(&self, id: PredicateId) -> &[PredicateId] {
        self.predicates
            .get(id)
            .map(|p| p.parents.as_slice())
            .unwrap_or(&[])
    }

    /// Transitive superclasses, nearest first, without duplicates.
    pub fn ancestors(&self, id: PredicateId) -> Vec<PredicateId> {
        self.walk(id, |p| &p.parents)
    }

    /// Transitive subclasses, nearest first, without duplicates.
    pub fn descendants(&self, id: PredicateId) -> Vec<PredicateId> {
        self.walk(id, |p| &p.children)
    }

    fn walk(&self, id: PredicateId, next: impl Fn(&Predicate) -> &Vec<PredicateId>) -> Vec<PredicateId> {
        let mut seen = IndexSet::new();
        let mut queue: VecDeque<PredicateId> = self.get(id).map(|p| next(p).clone()).unwrap_or_default().into();
        while let Some(cur) = queue.pop_front() {
            if cur != id && seen.insert(cur) {
                queue.extend(next(&self.predicates[cur]).iter().copied());
            }
        }
        seen.into_iter().collect()
    }

    /// Whether `id` equals `ancestor` or sits below it.
    pub fn is_subsumed_by(&self, id: PredicateId, ancestor: PredicateId) -> bool {
        id == ancestor || self.ancestors(id).contains(&ancestor)
    }

    pub fn relevant_children(&self, id: PredicateId) -> impl Iterator<Item = PredicateId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.predicates[c].relevant)
    }

    pub fn relevant_parents(&self, id: PredicateId) -> impl Iterator<Item = PredicateId> + '_ {
        self.parents(id)
            .iter()
            .copied()
            .filter(|&p| self.predicates[p].relevant)
    }

    /// Relevant predicates of one hierarchy family, in arena order.
    pub fn relevant_in(&self, hierarchy: Hierarchy) -> Vec<PredicateId> {
        self.predicates
            .iter()
            .filter(|p| p.relevant && p.hierarchy == hierarchy && p.kind != NodeKind::Empty)
            .map(|p| p.index)
            .collect()
    }

    /// Relevant leaves owned by `root`.
    pub fn relevant_leaves(&self, root: PredicateId) -> Vec<PredicateId> {
        self.predicates
            .iter()
            .filter(|p| p.relevant && p.root == root && p.is_leaf() && p.index != root)
            .map(|p| p.index)
            .collect()
    }

    /// All unordered pairs of relevant leaf/empty predicates that must be
    /// mutually exclusive at one state: leaves sharing a root, plus the empty
    /// predicate paired with every leaf of every data and label dimension.
    pub fn pairs_within_hierarchy(&self) -> Vec<(PredicateId, PredicateId)> {
        let mut pairs = Vec::new();
        let roots = std::iter::once(self.tool_root).chain(self.dimensions());
        for root in roots {
            let leaves = self.relevant_leaves(root);
            for (i, &a) in leaves.iter().enumerate() {
                for &b in &leaves[i + 1..] {
                    pairs.push((a, b));
                }
            }
        }
        for root in self.dimensions() {
            for leaf in self.relevant_leaves(root) {
                pairs.push((self.empty, leaf));
            }
        }
        pairs
    }
}

fn resolve_root(
    id: PredicateId,
    parents: &[Vec<PredicateId>],
    roots: &HashMap<PredicateId, Hierarchy>,
    names: &[&str],
    visits: &mut [Visit],
) -> Result<PredicateId, DomainError> {
    if roots.contains_key(&id) {
        return Ok(id);
    }
    match visits[id] {
        Visit::Done(root) => return Ok(root),
        Visit::InProgress => return Err(DomainError::Cycle(names[id].to_string())),
        Visit::Unvisited => {}
    }
    visits[id] = Visit::InProgress;
    let mut found: Option<PredicateId> = None;
    for &parent in &parents[id] {
        let root = resolve_root(parent, parents, roots, names, visits)?;
        match found {
            None => found = Some(root),
            Some(first) if first != root => {
                return Err(DomainError::HierarchyOverlap {
                    class: names[id].to_string(),
                    first: names[first].to_string(),
                    second: names[root].to_string(),
                });
            }
            Some(_) => {}
        }
    }
    let root = found.ok_or_else(|| DomainError::Unrooted(names[id].to_string()))?;
    visits[id] = Visit::Done(root);
    Ok(root)
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Taxonomy:")?;
        let roots = std::iter::once(self.tool_root)
            .chain(self.dimensions())
            .chain(std::iter::once(self.empty));
        for root in roots {
            fmt_subtree(self, f, root, 1)?;
        }
        Ok(())
    }
}

fn fmt_subtree(
    taxonomy: &Taxonomy,
    f: &mut fmt::Formatter<'_>,
    id: PredicateId,
    depth: usize,
) -> fmt::Result {
    let p = &taxonomy.predicates[id];
    let relevance = if p.relevant { "" } else { " (irrelevant)" };
    writeln!(f, "{}{} [{}]{relevance}", "  ".repeat(depth), p.id, p.kind)?;
    for &child in &p.children {
        fmt_subtree(taxonomy, f, child, depth + 1)?;
    }
    Ok(())
}
