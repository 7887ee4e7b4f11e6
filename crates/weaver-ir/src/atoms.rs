use indexmap::IndexSet;
use serde::Serialize;
use std::fmt;
use std::ops::Deref;
use thiserror::Error;

use crate::automaton::StateId;
use crate::taxonomy::PredicateId;

/// Ids below this value are reserved for auxiliary variables.
pub const DEFAULT_AUX_WATERMARK: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AtomKind {
    /// Tool (or tool class) used at a module state.
    Module,
    /// Memory slot carries a type.
    MemoryType,
    /// Used slot carries a type.
    UsedType,
    /// Used slot references a memory slot (`state2`, possibly null).
    MemTypeReference,
    /// Slot derives from an earlier memory slot (`state2`).
    TypeDependency,
    /// Two memory slots carry identical content.
    TypeEquality,
}

impl fmt::Display for AtomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AtomKind::Module => "module",
            AtomKind::MemoryType => "mem_type",
            AtomKind::UsedType => "used_type",
            AtomKind::MemTypeReference => "ref",
            AtomKind::TypeDependency => "dep",
            AtomKind::TypeEquality => "eq",
        };
        write!(f, "{name}")
    }
}

/// Elementary proposition. Field order matters: atoms sort by their primary
/// state's absolute order first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Atom {
    pub state: StateId,
    pub kind: AtomKind,
    pub predicate: Option<PredicateId>,
    pub state2: Option<StateId>,
}

impl Atom {
    pub fn module(predicate: PredicateId, state: StateId) -> Self {
        Self::unary(AtomKind::Module, predicate, state)
    }

    pub fn memory_type(predicate: PredicateId, state: StateId) -> Self {
        Self::unary(AtomKind::MemoryType, predicate, state)
    }

    pub fn used_type(predicate: PredicateId, state: StateId) -> Self {
        Self::unary(AtomKind::UsedType, predicate, state)
    }

    pub fn reference(used: StateId, memory: StateId) -> Self {
        Self::binary(AtomKind::MemTypeReference, used, memory)
    }

    pub fn dependency(state: StateId, source: StateId) -> Self {
        Self::binary(AtomKind::TypeDependency, state, source)
    }

    /// Equality is symmetric; the smaller state always comes first.
    pub fn equality(a: StateId, b: StateId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self::binary(AtomKind::TypeEquality, lo, hi)
    }

    fn unary(kind: AtomKind, predicate: PredicateId, state: StateId) -> Self {
        Self {
            state,
            kind,
            predicate: Some(predicate),
            state2: None,
        }
    }

    fn binary(kind: AtomKind, state: StateId, state2: StateId) -> Self {
        Self {
            state,
            kind,
            predicate: None,
            state2: Some(state2),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.predicate, self.state2) {
            (Some(p), _) => write!(f, "{}(p{p}, {})", self.kind, self.state),
            (None, Some(s2)) => write!(f, "{}({}, {s2})", self.kind, self.state),
            (None, None) => write!(f, "{}({})", self.kind, self.state),
        }
    }
}

/// Dense positive variable id. Sign is carried by literals, not ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AtomId(u32);

impl AtomId {
    pub fn new(raw: u32) -> Self {
        AtomId(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtomSpaceError {
    #[error("auxiliary variable range below {watermark} is exhausted")]
    AuxiliaryExhausted { watermark: u32 },
    #[error("auxiliary watermark must be at least 2, got {0}")]
    InvalidWatermark(u32),
}

/// Bijection between atoms and variable ids for one run.
///
/// Auxiliary ids are handed out from `1` upwards and stay below the
/// watermark; atom ids start at the watermark and grow monotonically.
#[derive(Debug, Clone)]
pub struct AtomSpace {
    watermark: u32,
    next_auxiliary: u32,
    atoms: IndexSet<Atom>,
}

impl Default for AtomSpace {
    fn default() -> Self {
        Self {
            watermark: DEFAULT_AUX_WATERMARK,
            next_auxiliary: 1,
            atoms: IndexSet::new(),
        }
    }
}

impl AtomSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watermark(watermark: u32) -> Result<Self, AtomSpaceError> {
        if watermark < 2 {
            return Err(AtomSpaceError::InvalidWatermark(watermark));
        }
        Ok(Self {
            watermark,
            ..Self::default()
        })
    }

    /// Id of the atom, allocating the next free one on first sight.
    pub fn add(&mut self, atom: Atom) -> AtomId {
        let (index, _) = self.atoms.insert_full(atom);
        AtomId(self.watermark + index as u32)
    }

    pub fn add_module(&mut self, predicate: PredicateId, state: StateId) -> AtomId {
        self.add(Atom::module(predicate, state))
    }

    pub fn add_memory_type(&mut self, predicate: PredicateId, state: StateId) -> AtomId {
        self.add(Atom::memory_type(predicate, state))
    }

    pub fn add_used_type(&mut self, predicate: PredicateId, state: StateId) -> AtomId {
        self.add(Atom::used_type(predicate, state))
    }

    /// Id of an already allocated atom.
    pub fn lookup(&self, atom: &Atom) -> Option<AtomId> {
        self.atoms
            .get_index_of(atom)
            .map(|i| AtomId(self.watermark + i as u32))
    }

    /// Inverse lookup. Auxiliary ids never resolve.
    pub fn resolve(&self, id: AtomId) -> Option<&Atom> {
        id.0.checked_sub(self.watermark)
            .and_then(|i| self.atoms.get_index(i as usize))
    }

    pub fn fresh_auxiliary(&mut self) -> Result<AtomId, AtomSpaceError> {
        if self.next_auxiliary >= self.watermark {
            return Err(AtomSpaceError::AuxiliaryExhausted {
                watermark: self.watermark,
            });
        }
        let id = AtomId(self.next_auxiliary);
        self.next_auxiliary += 1;
        Ok(id)
    }

    pub fn is_auxiliary(&self, id: AtomId) -> bool {
        id.0 < self.watermark
    }

    pub fn watermark(&self) -> u32 {
        self.watermark
    }

    /// Number of atoms (auxiliaries excluded).
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn auxiliary_count(&self) -> u32 {
        self.next_auxiliary - 1
    }

    /// Largest id handed out so far, 0 if none.
    pub fn max_id(&self) -> u32 {
        if self.atoms.is_empty() {
            self.next_auxiliary - 1
        } else {
            self.watermark + self.atoms.len() as u32 - 1
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> + '_ {
        self.atoms
            .iter()
            .enumerate()
            .map(|(i, a)| (AtomId(self.watermark + i as u32), a))
    }

    /// Stop growth before handing the encoding to a solver.
    pub fn freeze(self) -> FrozenAtomSpace {
        FrozenAtomSpace(self)
    }
}

/// Read-only view of an atom space.
#[derive(Debug, Clone)]
pub struct FrozenAtomSpace(AtomSpace);

impl Deref for FrozenAtomSpace {
    type Target = AtomSpace;

    fn deref(&self) -> &AtomSpace {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::AutomatonBuilder;
    use crate::proptest_generators::arb_atoms;
    use proptest::prelude::*;

    #[test]
    fn readding_returns_same_id() {
        let a = AutomatonBuilder::new(1, 1, 1).build();
        let mut space = AtomSpace::new();
        let m = a.modules()[0];
        let first = space.add_module(3, m);
        let second = space.add_used_type(3, a.used_blocks()[0][0]);
        assert_ne!(first, second);
        assert_eq!(space.add_module(3, m), first);
        assert_eq!(space.len(), 2);
        assert_eq!(first.get(), DEFAULT_AUX_WATERMARK);
        assert_eq!(space.resolve(first), Some(&Atom::module(3, m)));
    }

    #[test]
    fn auxiliaries_stay_below_watermark() {
        let mut space = AtomSpace::with_watermark(3).unwrap();
        let x = space.fresh_auxiliary().unwrap();
        let y = space.fresh_auxiliary().unwrap();
        assert_eq!((x.get(), y.get()), (1, 2));
        assert!(space.is_auxiliary(y));
        assert!(space.resolve(y).is_none());
        assert_eq!(
            space.fresh_auxiliary(),
            Err(AtomSpaceError::AuxiliaryExhausted { watermark: 3 })
        );
        assert_eq!(space.max_id(), 2);
    }

    #[test]
    fn watermark_below_two_is_rejected() {
        assert_eq!(
            AtomSpace::with_watermark(1).unwrap_err(),
            AtomSpaceError::InvalidWatermark(1)
        );
    }

    #[test]
    fn equality_is_symmetric() {
        let a = AutomatonBuilder::new(1, 1, 2).build();
        let (x, y) = (a.memory_blocks()[0][0], a.memory_blocks()[1][1]);
        assert_eq!(Atom::equality(x, y), Atom::equality(y, x));
    }

    #[test]
    fn atoms_order_by_primary_state() {
        let a = AutomatonBuilder::new(2, 1, 1).build();
        let late = Atom::module(0, a.modules()[1]);
        let early = Atom::reference(a.used_blocks()[0][0], StateId::NULL);
        assert!(early < late);
    }

    #[test]
    fn frozen_space_still_resolves() {
        let mut space = AtomSpace::new();
        let a = AutomatonBuilder::new(1, 1, 1).build();
        let id = space.add(Atom::dependency(a.sink()[0], a.memory_blocks()[0][0]));
        let frozen = space.freeze();
        assert_eq!(frozen.resolve(id).map(|a| a.kind), Some(AtomKind::TypeDependency));
        assert_eq!(frozen.max_id(), id.get());
    }

    proptest! {
        #[test]
        fn atom_ids_form_a_bijection(atoms in arb_atoms(64)) {
            let mut space = AtomSpace::new();
            let ids: Vec<AtomId> = atoms.iter().map(|a| space.add(*a)).collect();
            for (atom, id) in atoms.iter().zip(&ids) {
                prop_assert_eq!(space.add(*atom), *id);
                prop_assert_eq!(space.resolve(*id), Some(atom));
                prop_assert_eq!(space.lookup(atom), Some(*id));
                prop_assert!(!space.is_auxiliary(*id));
            }
            let distinct: std::collections::HashSet<_> = atoms.iter().collect();
            prop_assert_eq!(space.len(), distinct.len());
        }
    }
}
