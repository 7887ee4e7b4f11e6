/// SMT sorts used by the assertion backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmtSort {
    Bool,
    BitVec(u32),
}

impl SmtSort {
    /// Smallest bit-vector sort able to hold `count` distinct values.
    pub fn bits_for(count: usize) -> Self {
        SmtSort::BitVec(Self::width_for(count))
    }

    /// Bit width needed for `count` distinct values, at least 1.
    pub fn width_for(count: usize) -> u32 {
        let mut width = 1;
        while (1usize << width) < count {
            width += 1;
        }
        width
    }
}

impl std::fmt::Display for SmtSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtSort::Bool => write!(f, "Bool"),
            SmtSort::BitVec(w) => write!(f, "(_ BitVec {w})"),
        }
    }
}
