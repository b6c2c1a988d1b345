//! GraphViz rendering of a graph's topology.
//!
//! Diagnostics only: [`to_dot`] walks the vertex list and edge sets and
//! emits a DOT digraph. Topics render as boxes (double periphery when
//! named), detectors as ellipses; future edges are dotted so feedback
//! loops stand out from the evaluated DAG. Vertex naming is informational
//! and derived from type names.

use std::fmt::Write;

use crate::graph::{Graph, VertexKind, ANONYMOUS_TOPIC_STATE};

/// Renders the graph's vertices and edges as a GraphViz DOT digraph.
#[must_use]
pub fn to_dot(graph: &Graph) -> String {
    let mut out = String::new();
    out.push_str("digraph Reflex {\n");
    out.push_str("\trankdir = \"LR\";\n");
    out.push_str("\tnode [fontname=Helvetica];\n");

    for (id, slot) in graph.slots() {
        let label = minimal_name(slot.name);
        match slot.kind() {
            VertexKind::Topic => {
                let named = slot
                    .as_topic()
                    .is_some_and(|t| t.state_id() != ANONYMOUS_TOPIC_STATE);
                let peripheries = if named { "peripheries=2, " } else { "" };
                let _ = writeln!(
                    out,
                    "\t\"v{}\" [label=\"{}\", shape=box, style=filled, {}color=lightblue];",
                    id.0, label, peripheries
                );
            }
            VertexKind::Detector => {
                let _ = writeln!(out, "\t\"v{}\" [label=\"{}\", color=blue];", id.0, label);
            }
        }
        for target in &slot.out_edges {
            let _ = writeln!(out, "\t\"v{}\" -> \"v{}\";", id.0, target.0);
        }
        for target in &slot.future_out_edges {
            let _ = writeln!(
                out,
                "\t\"v{}\" -> \"v{}\" [style=dotted, color=red, constraint=false];",
                id.0, target.0
            );
        }
    }

    out.push_str("}\n");
    out
}

/// Strips module paths from a type name, inside generic arguments too:
/// `a::b::Foo<c::Bar>` becomes `Foo<Bar>`.
fn minimal_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut ident = String::new();
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            ident.clear();
        } else if c.is_alphanumeric() || c == '_' {
            ident.push(c);
        } else {
            out.push_str(&ident);
            ident.clear();
            out.push(c);
        }
    }
    out.push_str(&ident);
    out
}
