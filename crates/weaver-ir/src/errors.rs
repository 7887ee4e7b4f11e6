use thiserror::Error;

/// Errors raised while building the taxonomy, the tool library or the
/// workflow I/O for a run. Any of these aborts the run before encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("class '{class}' is reachable from two hierarchy roots ('{first}' and '{second}')")]
    HierarchyOverlap {
        class: String,
        first: String,
        second: String,
    },
    #[error("class '{class}' references unknown superclass '{superclass}'")]
    DanglingSuperclass { class: String, superclass: String },
    #[error("class '{0}' is declared more than once")]
    DuplicateClass(String),
    #[error("class '{0}' is not reachable from any declared root")]
    Unrooted(String),
    #[error("subclass cycle through '{0}'")]
    Cycle(String),
    #[error("root '{0}' declares a superclass")]
    RootWithParent(String),
    #[error("unknown predicate '{0}'")]
    UnknownPredicate(String),
    #[error("predicate '{name}' is not a {expected}")]
    WrongHierarchy { name: String, expected: String },
    #[error("data annotation names two types of dimension '{dimension}' ('{first}', '{second}')")]
    DuplicateDimension {
        dimension: String,
        first: String,
        second: String,
    },
    #[error("tool '{0}' has neither inputs nor outputs")]
    UnusableTool(String),
    #[error("label '{0}' is used but no label dimension is declared")]
    NoLabelDimension(String),
    #[error("tool '{0}' declares a labelled output")]
    LabelledToolOutput(String),
    #[error("{what} needs {needed} slots but the bound allows {allowed}")]
    BranchingExceeded {
        what: String,
        needed: usize,
        allowed: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_message_names_both_roots() {
        let err = DomainError::HierarchyOverlap {
            class: "Image".into(),
            first: "Type".into(),
            second: "Format".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Image"));
        assert!(msg.contains("'Type'"));
        assert!(msg.contains("'Format'"));
    }

    #[test]
    fn branching_message_reports_counts() {
        let err = DomainError::BranchingExceeded {
            what: "workflow inputs".into(),
            needed: 4,
            allowed: 3,
        };
        assert_eq!(
            err.to_string(),
            "workflow inputs needs 4 slots but the bound allows 3"
        );
    }
}
