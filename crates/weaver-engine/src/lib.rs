#![doc = include_str!("../README.md")]

//! Weaver synthesis engine.
//!
//! Builds one encoding per length bound, enumerates its models through a
//! [`weaver_sat::SatSolver`] and decodes each model into a
//! [`WorkflowGraph`].

pub mod decoder;
pub mod pipeline;
pub mod result;
pub mod workflow;

pub use decoder::{decode, LookupError};
pub use pipeline::{
    synthesize, synthesize_parallel, BlockingMode, PipelineError, SynthesisOptions,
};
pub use result::{LengthReport, RunStatus, SynthesisResult};
pub use workflow::{Consumer, DataNode, Producer, ToolNode, WorkflowGraph};
