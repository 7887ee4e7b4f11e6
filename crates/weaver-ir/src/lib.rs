#![doc = include_str!("../README.md")]

//! Weaver intermediate representation.
//!
//! This crate defines the taxonomy arena, the tool library built on top of
//! it, the module/type automaton for one length bound, and the atom space
//! that maps symbolic atoms to dense solver variables.

pub mod atoms;
pub mod automaton;
pub mod domain;
pub mod errors;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod taxonomy;

pub use atoms::{Atom, AtomId, AtomKind, AtomSpace, AtomSpaceError, FrozenAtomSpace};
pub use automaton::{Automaton, AutomatonBuilder, State, StateId, StateRole};
pub use domain::{DataAnnotation, DataSpec, Domain, DomainInput, Tool, ToolAnnotation};
pub use errors::DomainError;
pub use taxonomy::{Hierarchy, NodeKind, Predicate, PredicateId, RawClass, Roots, Taxonomy};
