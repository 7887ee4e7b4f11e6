#![allow(clippy::result_large_err)]

use pest::Parser;
use pest_derive::Parser;

use crate::ast::*;
use crate::errors::ParseError;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct FormulaParser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;
type Pairs<'a> = pest::iterators::Pairs<'a, Rule>;

fn span_from(pair: &Pair<'_>) -> Span {
    let s = pair.as_span();
    Span::new(s.start(), s.end())
}

/// Parse constraint formula text.
pub fn parse_formula(source: &str) -> Result<Formula, ParseError> {
    parse_formula_named(source, "<constraint>")
}

/// Parse constraint formula text, naming the source in diagnostics.
pub fn parse_formula_named(source: &str, filename: &str) -> Result<Formula, ParseError> {
    let mut pairs = FormulaParser::parse(Rule::formula, source).map_err(|e| {
        let (start, end) = match e.location {
            pest::error::InputLocation::Pos(p) => (p, p + 1),
            pest::error::InputLocation::Span((s, e)) => (s, e),
        };
        let end = end.min(source.len());
        ParseError::syntax(
            e.variant.message().to_string(),
            Span::new(start.min(end), end),
            source,
            filename,
        )
    })?;

    let mut builder = Builder {
        source,
        filename,
        bound: Vec::new(),
    };
    let whole = Span::new(0, source.len());
    let formula_pair = builder.expect(&mut pairs, whole, "formula")?;
    let mut inner = formula_pair.into_inner();
    let body = builder.expect(&mut inner, whole, "formula body")?;
    builder.formula(body)
}

struct Builder<'s> {
    source: &'s str,
    filename: &'s str,
    /// Variables bound by enclosing quantifiers.
    bound: Vec<String>,
}

impl<'s> Builder<'s> {
    fn error(&self, span: Span, message: impl Into<String>) -> ParseError {
        ParseError::syntax(message, span, self.source, self.filename)
    }

    fn expect<'a>(
        &self,
        pairs: &mut Pairs<'a>,
        outer: Span,
        what: &str,
    ) -> Result<Pair<'a>, ParseError> {
        pairs
            .next()
            .ok_or_else(|| self.error(outer, format!("missing {what}")))
    }

    fn formula(&mut self, pair: Pair<'_>) -> Result<Formula, ParseError> {
        let span = span_from(&pair);
        match pair.as_rule() {
            Rule::iff_expr | Rule::or_expr | Rule::and_expr => {
                let mut inner = pair.into_inner();
                let first = self.expect(&mut inner, span, "operand")?;
                let mut result = self.formula(first)?;
                while let Some(op_pair) = inner.next() {
                    let op = binary_op(&op_pair)
                        .ok_or_else(|| self.error(span_from(&op_pair), "unknown operator"))?;
                    let rhs_pair = self.expect(&mut inner, span, "right operand")?;
                    let rhs = self.formula(rhs_pair)?;
                    result = Formula::Binary {
                        op,
                        lhs: Box::new(result),
                        rhs: Box::new(rhs),
                    };
                }
                Ok(result)
            }
            Rule::imp_expr | Rule::until_expr => {
                let mut inner = pair.into_inner();
                let first = self.expect(&mut inner, span, "operand")?;
                let lhs = self.formula(first)?;
                match inner.next() {
                    None => Ok(lhs),
                    Some(op_pair) => {
                        let op = binary_op(&op_pair)
                            .ok_or_else(|| self.error(span_from(&op_pair), "unknown operator"))?;
                        let rhs_pair = self.expect(&mut inner, span, "right operand")?;
                        let rhs = self.formula(rhs_pair)?;
                        Ok(Formula::Binary {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        })
                    }
                }
            }
            Rule::unary => self.unary(pair),
            Rule::literal => Ok(Formula::Literal(pair.as_str() == "true")),
            Rule::equality => {
                let mut inner = pair.into_inner();
                let a = self.expect(&mut inner, span, "variable")?;
                let b = self.expect(&mut inner, span, "variable")?;
                Ok(Formula::Atom(AtomicFormula::Equality(
                    variable_name(&a),
                    variable_name(&b),
                )))
            }
            Rule::predicate => self.predicate(pair),
            _ => {
                let mut inner: Vec<_> = pair.into_inner().collect();
                if inner.len() == 1 {
                    self.formula(inner.remove(0))
                } else {
                    Err(self.error(
                        span,
                        format!("unexpected formula shape ({} children)", inner.len()),
                    ))
                }
            }
        }
    }

    /// Prefix operators apply right to left; quantifier variables are in
    /// scope for the operand.
    fn unary(&mut self, pair: Pair<'_>) -> Result<Formula, ParseError> {
        let span = span_from(&pair);
        let mut children: Vec<Pair<'_>> = pair.into_inner().collect();
        let operand = children
            .pop()
            .ok_or_else(|| self.error(span, "missing operand"))?;

        let scope_depth = self.bound.len();
        let mut prefixes = Vec::with_capacity(children.len());
        for prefix in children {
            let prefix_span = span_from(&prefix);
            match prefix.as_rule() {
                Rule::not_op => prefixes.push(Prefix::Not),
                Rule::modal_op => {
                    let op = match prefix.as_str() {
                        "G" => ModalOp::Always,
                        "F" => ModalOp::Eventually,
                        _ => ModalOp::Next,
                    };
                    prefixes.push(Prefix::Modal(op));
                }
                Rule::quantifier => {
                    let mut inner = prefix.into_inner();
                    let kw = self.expect(&mut inner, prefix_span, "quantifier keyword")?;
                    let var = self.expect(&mut inner, prefix_span, "quantified variable")?;
                    let name = variable_name(&var);
                    if self.bound.contains(&name) {
                        return Err(ParseError::rebound(
                            name,
                            prefix_span,
                            self.source,
                            self.filename,
                        ));
                    }
                    self.bound.push(name.clone());
                    let quantifier = if kw.as_str() == "Exists" {
                        Quantifier::Exists
                    } else {
                        Quantifier::Forall
                    };
                    prefixes.push(Prefix::Quantifier(quantifier, name));
                }
                _ => return Err(self.error(prefix_span, "unknown prefix operator")),
            }
        }

        let body = self.formula(operand);
        self.bound.truncate(scope_depth);
        let mut result = body?;
        for prefix in prefixes.into_iter().rev() {
            result = match prefix {
                Prefix::Not => Formula::Not(Box::new(result)),
                Prefix::Modal(op) => Formula::Modal {
                    op,
                    body: Box::new(result),
                },
                Prefix::Quantifier(quantifier, variable) => Formula::Quantified {
                    quantifier,
                    variable,
                    body: Box::new(result),
                },
            };
        }
        Ok(result)
    }

    fn predicate(&mut self, pair: Pair<'_>) -> Result<Formula, ParseError> {
        let span = span_from(&pair);
        let mut inner = pair.into_inner();
        let name_pair = self.expect(&mut inner, span, "predicate name")?;
        let plain_r = name_pair.as_rule() == Rule::ident && name_pair.as_str() == "R";
        let name = match name_pair.as_rule() {
            Rule::quoted => name_pair
                .into_inner()
                .next()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
            _ => name_pair.as_str().to_string(),
        };

        let Some(args) = inner.next() else {
            return Ok(Formula::Atom(AtomicFormula::Predicate {
                name,
                inputs: Vec::new(),
                outputs: Vec::new(),
                has_args: false,
            }));
        };
        let mut lists = args.into_inner();
        let inputs: Vec<String> = match lists.next() {
            Some(list) => list.into_inner().map(|v| variable_name(&v)).collect(),
            None => Vec::new(),
        };
        let outputs_pair = lists.next();
        let has_semicolon = outputs_pair.is_some();
        let outputs: Vec<String> = outputs_pair
            .map(|list| list.into_inner().map(|v| variable_name(&v)).collect())
            .unwrap_or_default();

        if plain_r && !has_semicolon && inputs.len() == 2 {
            return Ok(Formula::Atom(AtomicFormula::Dependency {
                source: inputs[0].clone(),
                derived: inputs[1].clone(),
            }));
        }
        Ok(Formula::Atom(AtomicFormula::Predicate {
            name,
            inputs,
            outputs,
            has_args: true,
        }))
    }
}

enum Prefix {
    Not,
    Modal(ModalOp),
    Quantifier(Quantifier, String),
}

fn binary_op(pair: &Pair<'_>) -> Option<BinaryOp> {
    match pair.as_rule() {
        Rule::iff_op => Some(BinaryOp::Iff),
        Rule::imp_op => Some(BinaryOp::Implies),
        Rule::or_op => Some(BinaryOp::Or),
        Rule::and_op => Some(BinaryOp::And),
        Rule::until_op => Some(BinaryOp::Until),
        _ => None,
    }
}

fn variable_name(pair: &Pair<'_>) -> String {
    pair.as_str().trim_start_matches('?').to_string()
}
