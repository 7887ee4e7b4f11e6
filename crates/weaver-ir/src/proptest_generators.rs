//! Proptest strategies for IR values.

use proptest::prelude::*;

use crate::atoms::{Atom, AtomKind};
use crate::automaton::StateId;
use crate::taxonomy::{RawClass, Roots};

pub fn arb_state() -> impl Strategy<Value = StateId> {
    prop_oneof![
        1 => Just(StateId::NULL),
        8 => (0usize..64).prop_map(StateId::from_order),
    ]
}

pub fn arb_atom() -> impl Strategy<Value = Atom> {
    let unary = (
        prop_oneof![
            Just(AtomKind::Module),
            Just(AtomKind::MemoryType),
            Just(AtomKind::UsedType),
        ],
        0usize..16,
        arb_state(),
    )
        .prop_map(|(kind, p, s)| Atom {
            state: s,
            kind,
            predicate: Some(p),
            state2: None,
        });
    let binary = (
        prop_oneof![
            Just(AtomKind::MemTypeReference),
            Just(AtomKind::TypeDependency),
        ],
        arb_state(),
        arb_state(),
    )
        .prop_map(|(kind, s, s2)| Atom {
            state: s,
            kind,
            predicate: None,
            state2: Some(s2),
        });
    let equality = (arb_state(), arb_state()).prop_map(|(a, b)| Atom::equality(a, b));
    prop_oneof![4 => unary, 2 => binary, 1 => equality]
}

/// Sequences with plenty of repeats.
pub fn arb_atoms(max: usize) -> impl Strategy<Value = Vec<Atom>> {
    prop::collection::vec(arb_atom(), 0..max).prop_flat_map(|atoms| {
        let len = atoms.len();
        (Just(atoms), prop::collection::vec(any::<prop::sample::Index>(), 0..=len))
    })
    .prop_map(|(mut atoms, picks)| {
        if !atoms.is_empty() {
            let repeats: Vec<Atom> = picks.iter().map(|i| atoms[i.index(atoms.len())]).collect();
            atoms.extend(repeats);
        }
        atoms
    })
}

/// Random class tree for a single data dimension rooted at `Type`.
pub fn arb_type_tree() -> impl Strategy<Value = (Roots, Vec<RawClass>)> {
    prop::collection::vec(prop::option::of(0usize..8), 1..12).prop_map(|parents| {
        let mut classes = Vec::with_capacity(parents.len());
        for (i, parent) in parents.iter().enumerate() {
            let parent = match parent {
                Some(p) if *p < i => format!("T{p}"),
                _ => "Type".to_string(),
            };
            classes.push(RawClass::new(format!("T{i}"), &[parent.as_str()]));
        }
        let roots = Roots {
            tools: "Tools".into(),
            data: vec!["Type".into()],
            label: None,
        };
        (roots, classes)
    })
}
