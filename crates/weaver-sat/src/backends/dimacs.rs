use std::io::{self, Write};

use weaver_ir::{Atom, AtomSpace};

use crate::cnf::{Cnf, Literal};
use crate::solver::{Model, SatResult};

/// Write `cnf` in DIMACS format. With an atom space, each atom gets a
/// `c <id> <atom>` comment line, in automaton order.
pub fn write_dimacs(cnf: &Cnf, space: Option<&AtomSpace>, out: &mut impl Write) -> io::Result<()> {
    let vars = space.map_or(0, AtomSpace::max_id).max(cnf.max_var());
    if let Some(space) = space {
        let mut atoms: Vec<(u32, &Atom)> = space.iter().map(|(id, a)| (id.get(), a)).collect();
        atoms.sort_by_key(|(_, a)| **a);
        for (id, atom) in atoms {
            writeln!(out, "c {id} {atom}")?;
        }
    }
    writeln!(out, "p cnf {vars} {}", cnf.len())?;
    for clause in cnf.clauses() {
        writeln!(out, "{clause}")?;
    }
    Ok(())
}

pub fn render_dimacs(cnf: &Cnf, space: Option<&AtomSpace>) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_dimacs(cnf, space, &mut out);
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse solver output in the competition format (`s SATISFIABLE` plus
/// `v` lines) or the bare `SAT`/`UNSAT` result-file format.
pub fn parse_dimacs_output(text: &str) -> Result<SatResult, String> {
    let mut status: Option<bool> = None;
    let mut true_vars = Vec::new();
    for line in text.lines().map(str::trim) {
        let values = match line {
            "" => continue,
            "s SATISFIABLE" | "SAT" | "SATISFIABLE" => {
                status = Some(true);
                continue;
            }
            "s UNSATISFIABLE" | "UNSAT" | "UNSATISFIABLE" => {
                status = Some(false);
                continue;
            }
            "s UNKNOWN" | "UNKNOWN" | "INDET" => {
                return Ok(SatResult::Unknown("solver answered unknown".into()))
            }
            l if l.starts_with('c') => continue,
            l if l.starts_with('v') => &l[1..],
            l if status == Some(true) => l,
            _ => continue,
        };
        for token in values.split_whitespace() {
            let value: i64 = token
                .parse()
                .map_err(|_| format!("bad literal '{token}' in model"))?;
            if let Some(lit) = Literal::from_dimacs(value) {
                if lit.is_positive() {
                    true_vars.push(lit.var());
                }
            }
        }
    }
    match status {
        Some(true) => Ok(SatResult::Sat(Model::new(true_vars))),
        Some(false) => Ok(SatResult::Unsat),
        None => Err("no satisfiability status in solver output".into()),
    }
}
