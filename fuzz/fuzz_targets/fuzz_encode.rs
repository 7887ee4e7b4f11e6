#![no_main]
use libfuzzer_sys::fuzz_target;
use weaver_ir::{AutomatonBuilder, DataAnnotation, Domain, DomainInput, RawClass, Roots, ToolAnnotation};
use weaver_sat::{Backend, Encoding, EncodingOptions};

fn domain() -> Option<Domain> {
    Domain::build(&DomainInput {
        roots: Roots {
            tools: "Tools".into(),
            data: vec!["Type".into()],
            label: None,
        },
        classes: vec![
            RawClass::new("Convert", &["Tools"]),
            RawClass::new("Image", &["Type"]),
            RawClass::new("Table", &["Type"]),
        ],
        tools: vec![
            ToolAnnotation::new("snap").under("Convert").output(DataAnnotation::of(&["Image"])),
            ToolAnnotation::new("tabulate")
                .input(DataAnnotation::of(&["Image"]))
                .output(DataAnnotation::of(&["Table"])),
        ],
        inputs: vec![],
        outputs: vec![],
    })
    .ok()
}

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(formula) = weaver_dsl::parse_formula(s) else {
        return;
    };
    let Some(domain) = domain() else {
        return;
    };
    let automaton = AutomatonBuilder::new(3, 1, 1).build();
    // Compile at a small bound and lower; skip solving.
    if let Ok(mut encoding) = Encoding::new(&domain, automaton, &EncodingOptions::default()) {
        if encoding.add_formula(&formula).is_ok() {
            let _ = encoding.lower(Backend::Cnf);
        }
    }
});
