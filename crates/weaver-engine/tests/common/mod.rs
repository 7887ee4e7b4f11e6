#![allow(dead_code)]

use weaver_engine::SynthesisOptions;
use weaver_ir::{DataAnnotation, Domain, DomainInput, RawClass, Roots, ToolAnnotation};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `Root -> {A, B}` operations, one data leaf `X`, a producer `T1` under
/// `A` and a consumer `T2` under `B`.
pub fn producer_consumer() -> Domain {
    Domain::build(&DomainInput {
        roots: Roots {
            tools: "Root".into(),
            data: vec!["Data".into()],
            label: None,
        },
        classes: vec![
            RawClass::new("A", &["Root"]),
            RawClass::new("B", &["Root"]),
            RawClass::new("X", &["Data"]),
        ],
        tools: vec![
            ToolAnnotation::new("T1")
                .under("A")
                .output(DataAnnotation::of(&["X"])),
            ToolAnnotation::new("T2")
                .under("B")
                .input(DataAnnotation::of(&["X"])),
        ],
        inputs: vec![],
        outputs: vec![],
    })
    .expect("valid domain")
}

/// Two workflow inputs of type `X` and a single-input tool, so the same
/// tool sequence admits two data flows.
pub fn two_inputs() -> Domain {
    Domain::build(&DomainInput {
        roots: Roots {
            tools: "Tools".into(),
            data: vec!["Data".into()],
            label: None,
        },
        classes: vec![RawClass::new("X", &["Data"]), RawClass::new("Y", &["Data"])],
        tools: vec![ToolAnnotation::new("digest")
            .input(DataAnnotation::of(&["X"]))
            .output(DataAnnotation::of(&["Y"]))],
        inputs: vec![DataAnnotation::of(&["X"]); 2],
        outputs: vec![],
    })
    .expect("valid domain")
}

/// `mk` makes `Raw`, `conv` turns it into `Mid`, `fin` turns that into
/// `Done`, and `fetch` provides `Mid` from nowhere.
pub fn chain() -> Domain {
    Domain::build(&DomainInput {
        roots: Roots {
            tools: "Tools".into(),
            data: vec!["Type".into()],
            label: None,
        },
        classes: vec![
            RawClass::new("Raw", &["Type"]),
            RawClass::new("Mid", &["Type"]),
            RawClass::new("Done", &["Type"]),
        ],
        tools: vec![
            ToolAnnotation::new("mk").output(DataAnnotation::of(&["Raw"])),
            ToolAnnotation::new("conv")
                .input(DataAnnotation::of(&["Raw"]))
                .output(DataAnnotation::of(&["Mid"])),
            ToolAnnotation::new("fin")
                .input(DataAnnotation::of(&["Mid"]))
                .output(DataAnnotation::of(&["Done"])),
            ToolAnnotation::new("fetch").output(DataAnnotation::of(&["Mid"])),
        ],
        inputs: vec![],
        outputs: vec![],
    })
    .expect("valid domain")
}

pub fn bounded(min_length: usize, max_length: usize) -> SynthesisOptions {
    SynthesisOptions {
        min_length,
        max_length,
        timeout_secs: 0,
        ..SynthesisOptions::default()
    }
}
