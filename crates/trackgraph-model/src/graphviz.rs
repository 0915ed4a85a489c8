//! Dot export of a built model, optionally overlaying a solution.

use std::io::{self, Write};

use trackgraph_core::Labeling;

use crate::model::BuiltModel;

/// Writes the hypothesis graph in graphviz dot format.
///
/// Active nodes and transitions of the given solution are highlighted
/// in blue; exclusion sets are drawn as red edges.
pub fn write_dot<W: Write>(
    model: &BuiltModel,
    solution: Option<&Labeling>,
    writer: &mut W,
) -> io::Result<()> {
    writeln!(writer, "digraph G {{")?;

    for hypothesis in model.hypotheses() {
        let dividing = hypothesis
            .division()
            .graph_id()
            .and_then(|var| solution.map(|sol| sol[var] > 0))
            .unwrap_or(false);
        write!(
            writer,
            "\t{} [ label=\"{}, div={}\" ",
            hypothesis.id(),
            hypothesis.id(),
            if dividing { "yes" } else { "no" }
        )?;
        let active = hypothesis
            .detection()
            .graph_id()
            .and_then(|var| solution.map(|sol| sol[var] > 0))
            .unwrap_or(false);
        if active {
            write!(writer, "color=\"blue\" fontcolor=\"blue\" ")?;
        }
        writeln!(writer, "];")?;
    }

    for link in model.links() {
        write!(writer, "\t{} -> {}", link.src(), link.dest())?;
        if let (Some(var), Some(sol)) = (link.graph_id(), solution) {
            write!(writer, " [ label=\"value={}\"", sol[var])?;
            if sol[var] > 0 {
                write!(writer, " color=\"blue\" fontcolor=\"blue\"")?;
            }
            write!(writer, " ]")?;
        }
        writeln!(writer, ";")?;
    }

    for division in model.divisions() {
        let [first, second] = *division.children();
        let name = format!(
            "\"divisionOf{}To{}And{}\"",
            division.parent(),
            first,
            second
        );
        write!(writer, "\t{} -> {}", division.parent(), name)?;
        if let (Some(var), Some(sol)) = (division.graph_id(), solution) {
            write!(writer, " [ label=\"value={}\"", sol[var])?;
            if sol[var] > 0 {
                write!(writer, " color=\"blue\" fontcolor=\"blue\"")?;
            }
            write!(writer, " ]")?;
        }
        writeln!(writer, ";")?;
        writeln!(writer, "\t{} -> {};", name, first)?;
        writeln!(writer, "\t{} -> {};", name, second)?;
    }

    for exclusion in model.exclusions() {
        let ids = exclusion.ids();
        for (index, a) in ids.iter().enumerate() {
            for b in &ids[index + 1..] {
                writeln!(
                    writer,
                    "\t{} -> {} [ color=\"red\" fontcolor=\"red\" ];",
                    a, b
                )?;
            }
        }
    }

    writeln!(writer, "}}")
}
