#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};

use weaver_ir::{
    Atom, AtomId, AutomatonBuilder, DataAnnotation, Domain, DomainInput, RawClass,
    Roots, ToolAnnotation,
};
use weaver_sat::test_fixtures::all_models;
use weaver_sat::{Backend, Cnf, Encoding, EncodingOptions, Lowered, Problem};

/// Two ways of producing an image, one consumer, and a converter that
/// keeps the dimension.
pub fn imaging_domain() -> Domain {
    Domain::build(&DomainInput {
        roots: Roots {
            tools: "Tools".into(),
            data: vec!["Type".into()],
            label: None,
        },
        classes: vec![
            RawClass::new("Acquire", &["Tools"]),
            RawClass::new("Analyse", &["Tools"]),
            RawClass::new("Image", &["Type"]),
            RawClass::new("Photo", &["Image"]),
            RawClass::new("Scan", &["Image"]),
            RawClass::new("Table", &["Type"]),
        ],
        tools: vec![
            ToolAnnotation::new("camera")
                .under("Acquire")
                .output(DataAnnotation::of(&["Photo"])),
            ToolAnnotation::new("scanner")
                .under("Acquire")
                .output(DataAnnotation::of(&["Scan"])),
            ToolAnnotation::new("measure")
                .under("Analyse")
                .input(DataAnnotation::of(&["Image"]))
                .output(DataAnnotation::of(&["Table"])),
        ],
        inputs: vec![],
        outputs: vec![],
    })
    .expect("valid domain")
}

/// A three-stage chain `mk -> conv -> fin`, plus `fetch` which provides
/// the middle type without any ancestry.
pub fn lineage_domain() -> Domain {
    Domain::build(&DomainInput {
        roots: Roots {
            tools: "Tools".into(),
            data: vec!["Type".into()],
            label: None,
        },
        classes: vec![
            RawClass::new("Stage", &["Tools"]),
            RawClass::new("Raw", &["Type"]),
            RawClass::new("Mid", &["Type"]),
            RawClass::new("Done", &["Type"]),
        ],
        tools: vec![
            ToolAnnotation::new("mk")
                .under("Stage")
                .output(DataAnnotation::of(&["Raw"])),
            ToolAnnotation::new("conv")
                .under("Stage")
                .input(DataAnnotation::of(&["Raw"]))
                .output(DataAnnotation::of(&["Mid"])),
            ToolAnnotation::new("fin")
                .under("Stage")
                .input(DataAnnotation::of(&["Mid"]))
                .output(DataAnnotation::of(&["Done"])),
            ToolAnnotation::new("fetch")
                .under("Stage")
                .output(DataAnnotation::of(&["Mid"])),
        ],
        inputs: vec![],
        outputs: vec![],
    })
    .expect("valid domain")
}

pub fn encoding(domain: &Domain, length: usize) -> Encoding<'_> {
    let automaton = AutomatonBuilder::new(length, 1, 1).build();
    Encoding::new(domain, automaton, &EncodingOptions::default()).expect("encodes")
}

pub fn clauses(lowered: &Lowered) -> &Cnf {
    match &lowered.problem {
        Problem::Cnf(cnf) => cnf,
        Problem::Smt(_) => panic!("expected clauses"),
    }
}

pub fn lower(encoding: Encoding<'_>) -> Lowered {
    encoding.lower(Backend::Cnf).expect("lowers")
}

/// Module atom of `tool` at `step`.
pub fn module_atom(domain: &Domain, lowered: &Lowered, tool: &str, step: usize) -> AtomId {
    let p = domain.taxonomy().lookup(tool).expect("known tool");
    lowered
        .space
        .lookup(&Atom::module(p, lowered.automaton.modules()[step]))
        .expect("module atom")
}

/// Module atoms of every concrete tool at every step.
pub fn tool_choice_atoms(domain: &Domain, lowered: &Lowered) -> Vec<AtomId> {
    lowered
        .automaton
        .modules()
        .iter()
        .flat_map(|&state| {
            domain
                .tools()
                .iter()
                .filter_map(move |tool| lowered.space.lookup(&Atom::module(tool.predicate, state)))
        })
        .collect()
}

/// Every admissible tool sequence, by tool id.
pub fn tool_sequences(domain: &Domain, lowered: &Lowered) -> BTreeSet<Vec<String>> {
    let mut names = HashMap::new();
    for &state in lowered.automaton.modules() {
        for tool in domain.tools() {
            if let Some(id) = lowered.space.lookup(&Atom::module(tool.predicate, state)) {
                names.insert(id, tool.id.clone());
            }
        }
    }
    let vars = tool_choice_atoms(domain, lowered);
    all_models(clauses(lowered), &vars)
        .into_iter()
        .map(|model| model.iter().map(|id| names[id].clone()).collect())
        .collect()
}
