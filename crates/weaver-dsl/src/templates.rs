//! Template catalogue: fixed shortcuts for small modal formulas.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ast::{Formula, ANY_TOOL};
use crate::errors::TemplateError;

/// A constraint as handed over by the constraint-file loader.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConstraintSpec {
    Template {
        id: String,
        #[serde(default)]
        parameters: Vec<String>,
    },
    Formula {
        formula: String,
    },
}

impl ConstraintSpec {
    pub fn template(id: impl Into<String>, parameters: &[&str]) -> Self {
        ConstraintSpec::Template {
            id: id.into(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn formula(text: impl Into<String>) -> Self {
        ConstraintSpec::Formula {
            formula: text.into(),
        }
    }
}

impl fmt::Display for ConstraintSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintSpec::Template { id, parameters } => {
                write!(f, "{id}({})", parameters.join(", "))
            }
            ConstraintSpec::Formula { formula } => write!(f, "{formula}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateInfo {
    pub id: &'static str,
    pub arity: usize,
    pub description: &'static str,
}

const fn info(id: &'static str, arity: usize, description: &'static str) -> TemplateInfo {
    TemplateInfo {
        id,
        arity,
        description,
    }
}

pub const TEMPLATES: &[TemplateInfo] = &[
    info("use_m", 1, "use tool X"),
    info("nuse_m", 1, "never use tool X"),
    info("first_m", 1, "use tool X as the first step"),
    info("last_m", 1, "use tool X as the last step"),
    info("use_m_at", 2, "use tool X at step N"),
    info("ite_m", 2, "if X is used, Y is used later"),
    info("itn_m", 2, "if X is used, Y is not used later"),
    info("depend_m", 2, "if X is used, Y is used before it"),
    info("next_m", 2, "if X is used, Y is used at the next step"),
    info("prev_m", 2, "if X is used, Y is used at the step before"),
    info("connected_m", 2, "X immediately precedes Y"),
    info("use_t", 1, "some tool consumes data of type T"),
    info("nuse_t", 1, "no tool consumes data of type T"),
    info("gen_t", 1, "some tool produces data of type T"),
    info("ngen_t", 1, "no tool produces data of type T"),
    info("use_ite_t", 2, "if T is consumed, U is consumed later"),
    info("gen_ite_t", 2, "if T is produced, U is produced later"),
    info("operation_input", 2, "tool X consumes data of type T"),
    info("operation_output", 2, "tool X produces data of type T"),
    info("connected_op", 2, "an output of X is consumed by a later Y"),
    info("not_connected_op", 2, "no output of X is consumed by a later Y"),
    info("use_m_n_times", 2, "use tool X exactly N times"),
];

pub fn template_info(id: &str) -> Option<&'static TemplateInfo> {
    TEMPLATES.iter().find(|t| t.id == id)
}

/// Result of expanding a known template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    Formula(Formula),
    /// Known template without an encoding. Callers warn and skip it.
    Unsupported { id: String, reason: String },
}

/// Largest position `use_m_at` accepts when the workflow length is unknown.
pub const MAX_TEMPLATE_STEP: usize = 1024;

/// Expand a template instance into its formula.
pub fn expand_template(id: &str, parameters: &[String]) -> Result<Expansion, TemplateError> {
    expand(id, parameters, None)
}

/// Expand a template instance for a workflow of `length` steps. Positions
/// past the last step expand to `false`.
pub fn expand_template_for_length(
    id: &str,
    parameters: &[String],
    length: usize,
) -> Result<Expansion, TemplateError> {
    expand(id, parameters, Some(length))
}

fn expand(id: &str, parameters: &[String], length: Option<usize>) -> Result<Expansion, TemplateError> {
    let template = template_info(id).ok_or_else(|| TemplateError::Unknown(id.to_string()))?;
    if parameters.len() != template.arity {
        return Err(TemplateError::Arity {
            id: id.to_string(),
            expected: template.arity,
            found: parameters.len(),
        });
    }
    let p = |i: usize| Formula::name(parameters[i].as_str());
    let n = |i: usize| parameters[i].as_str();

    let formula = match id {
        "use_m" => p(0).eventually(),
        "nuse_m" => p(0).negate().always(),
        "first_m" => p(0),
        "last_m" => p(0).and(Formula::Literal(true).next().negate()).eventually(),
        "use_m_at" => {
            let step = parse_step(id, n(1))?;
            match length {
                Some(length) if step > length => Formula::Literal(false),
                None if step > MAX_TEMPLATE_STEP => {
                    return Err(TemplateError::BadParameter {
                        id: id.to_string(),
                        value: n(1).to_string(),
                        reason: format!("step is beyond {MAX_TEMPLATE_STEP}"),
                    })
                }
                _ => (1..step).fold(p(0), |f, _| f.next()),
            }
        }
        "ite_m" => p(0).implies(p(1).eventually().next()).always(),
        "itn_m" => p(0).implies(p(1).negate().always().next()).always(),
        "depend_m" => p(0).eventually().implies(p(0).negate().until(p(1))),
        "next_m" => p(0).implies(p(1).next()).always(),
        "prev_m" => p(0)
            .negate()
            .and(p(1).negate().implies(p(0).next().negate()).always()),
        "connected_m" => p(0).and(p(1).next()).eventually(),
        "use_t" => consumed(n(0)).eventually(),
        "nuse_t" => consumed(n(0)).eventually().negate(),
        "gen_t" => produced(n(0)).eventually(),
        "ngen_t" => produced(n(0)).eventually().negate(),
        "use_ite_t" => consumed(n(0))
            .implies(consumed(n(1)).eventually().next())
            .always(),
        "gen_ite_t" => produced(n(0))
            .implies(produced(n(1)).eventually().next())
            .always(),
        "operation_input" => Formula::exists(
            "x",
            Formula::apply(n(1), &["x"], &[]).and(Formula::apply(n(0), &["x"], &[])),
        )
        .eventually(),
        "operation_output" => Formula::exists(
            "x",
            Formula::apply(n(1), &["x"], &[]).and(Formula::apply(n(0), &[], &["x"])),
        )
        .eventually(),
        "connected_op" => connected(n(0), n(1)),
        "not_connected_op" => connected(n(0), n(1)).negate(),
        "use_m_n_times" => {
            return Ok(Expansion::Unsupported {
                id: id.to_string(),
                reason: "exact repetition counts have no encoding".into(),
            })
        }
        other => return Err(TemplateError::Unknown(other.to_string())),
    };
    Ok(Expansion::Formula(formula))
}

fn parse_step(id: &str, value: &str) -> Result<usize, TemplateError> {
    match value.trim().parse::<usize>() {
        Ok(step) if step >= 1 => Ok(step),
        _ => Err(TemplateError::BadParameter {
            id: id.to_string(),
            value: value.to_string(),
            reason: "expected a step number starting at 1".into(),
        }),
    }
}

/// Some tool used now consumes data of type `ty`.
fn consumed(ty: &str) -> Formula {
    Formula::exists(
        "x",
        Formula::apply(ty, &["x"], &[]).and(Formula::apply(ANY_TOOL, &["x"], &[])),
    )
}

/// Some tool used now produces data of type `ty`.
fn produced(ty: &str) -> Formula {
    Formula::exists(
        "x",
        Formula::apply(ty, &["x"], &[]).and(Formula::apply(ANY_TOOL, &[], &["x"])),
    )
}

fn connected(from: &str, to: &str) -> Formula {
    Formula::exists(
        "x",
        Formula::apply(from, &[], &["x"]).and(Formula::apply(to, &["x"], &[]).eventually().next()),
    )
    .eventually()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;

    fn expand(id: &str, params: &[&str]) -> Formula {
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        match expand_template(id, &params).unwrap() {
            Expansion::Formula(f) => f,
            other => panic!("expected a formula, got {other:?}"),
        }
    }

    #[test]
    fn tool_templates_match_their_formulas() {
        let cases = [
            ("use_m", vec!["A"], "F A"),
            ("nuse_m", vec!["A"], "G !A"),
            ("first_m", vec!["A"], "A"),
            ("last_m", vec!["A"], "F (A & !X true)"),
            ("use_m_at", vec!["A", "3"], "X X A"),
            ("ite_m", vec!["A", "B"], "G (A -> X F B)"),
            ("itn_m", vec!["A", "B"], "G (A -> X G !B)"),
            ("depend_m", vec!["A", "B"], "F A -> !A U B"),
            ("next_m", vec!["A", "B"], "G (A -> X B)"),
            ("prev_m", vec!["A", "B"], "!A & G (!B -> !X A)"),
            ("connected_m", vec!["A", "B"], "F (A & X B)"),
        ];
        for (id, params, text) in cases {
            assert_eq!(
                expand(id, &params),
                parse_formula(text).unwrap(),
                "template {id}"
            );
        }
    }

    #[test]
    fn type_templates_quantify_over_data() {
        assert_eq!(
            expand("use_t", &["Table"]),
            parse_formula("F Exists(?x) (Table(?x) & *(?x))").unwrap()
        );
        assert_eq!(
            expand("ngen_t", &["Table"]),
            parse_formula("!F Exists(?x) (Table(?x) & *(;?x))").unwrap()
        );
        assert_eq!(
            expand("connected_op", &["A", "B"]),
            parse_formula("F Exists(?x) (A(;?x) & X F B(?x))").unwrap()
        );
    }

    #[test]
    fn arity_is_checked() {
        let err = expand_template("ite_m", &["A".into()]).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Arity {
                id: "ite_m".into(),
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn unknown_template_is_reported() {
        assert_eq!(
            expand_template("teleport", &[]).unwrap_err(),
            TemplateError::Unknown("teleport".into())
        );
    }

    #[test]
    fn step_parameter_must_be_positive() {
        let err = expand_template("use_m_at", &["A".into(), "0".into()]).unwrap_err();
        assert!(matches!(err, TemplateError::BadParameter { .. }));
        assert_eq!(expand("use_m_at", &["A", "1"]), Formula::name("A"));
    }

    #[test]
    fn steps_past_the_workflow_are_false() {
        let params = vec!["A".to_string(), "50000000".to_string()];
        assert_eq!(
            expand_template_for_length("use_m_at", &params, 3).unwrap(),
            Expansion::Formula(Formula::Literal(false))
        );
        let err = expand_template("use_m_at", &params).unwrap_err();
        assert!(matches!(err, TemplateError::BadParameter { ref value, .. } if value == "50000000"));

        let within = vec!["A".to_string(), "3".to_string()];
        assert_eq!(
            expand_template_for_length("use_m_at", &within, 3).unwrap(),
            Expansion::Formula(parse_formula("X X A").unwrap())
        );
    }

    #[test]
    fn repetition_count_is_a_known_gap() {
        let out = expand_template("use_m_n_times", &["A".into(), "2".into()]).unwrap();
        assert!(matches!(out, Expansion::Unsupported { ref id, .. } if id == "use_m_n_times"));
    }

    #[test]
    fn constraint_specs_deserialize_untagged() {
        let specs: Vec<ConstraintSpec> = serde_json::from_str(
            r#"[{"id": "use_m", "parameters": ["A"]}, {"formula": "G !B"}]"#,
        )
        .unwrap();
        assert_eq!(specs[0], ConstraintSpec::template("use_m", &["A"]));
        assert_eq!(specs[1], ConstraintSpec::formula("G !B"));
        assert_eq!(specs[0].to_string(), "use_m(A)");
    }

    #[test]
    fn every_catalogued_template_expands() {
        for t in TEMPLATES {
            let params: Vec<String> = (0..t.arity)
                .map(|i| if i == 1 && t.id.ends_with("_at") { "2".into() } else { format!("P{i}") })
                .collect();
            assert!(expand_template(t.id, &params).is_ok(), "{}", t.id);
        }
    }
}
