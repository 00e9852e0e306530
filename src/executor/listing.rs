//! Read-only actions over the context snapshot.

use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::command::ListTarget;
use crate::context::ContextSnapshot;

/// Items shown per library by `list libraries` / `list footprints`.
pub const LIST_ITEMS_PER_LIBRARY: usize = 10;

/// Summary of the command language.
pub const HELP_TEXT: &str = "Available commands:
- add component <lib>:<symbol> [at <x>,<y>]
- connect <ref>.<pin> to <ref>.<pin>
- add trace from <x1>,<y1> to <x2>,<y2> [width <w>]
- modify component <refdes>
- modify footprint <name>
- list components - Show components in current design
- list libraries - Show available symbol libraries
- list footprints - Show available footprint libraries
- query <component/footprint name> - Search for specific parts
";

/// Renders a `list` action.
#[must_use]
pub fn list(target: ListTarget, context: &ContextSnapshot) -> String {
    match target {
        ListTarget::Components => list_components(context),
        ListTarget::Libraries => list_libraries(
            "Available symbol libraries and components:\n",
            "No symbol libraries available.",
            "components",
            &context.symbol_libs,
        ),
        ListTarget::Footprints => list_libraries(
            "Available footprint libraries and footprints:\n",
            "No footprint libraries available.",
            "footprints",
            &context.footprint_libs,
        ),
    }
}

fn list_components(context: &ContextSnapshot) -> String {
    let placed: Vec<_> = context
        .present_refs
        .iter()
        .chain(&context.present_footprints)
        .collect();
    if placed.is_empty() {
        return "No components found in current design.".to_string();
    }

    let mut out = String::from("Components in current design:\n");
    for (reference, name) in placed {
        let _ = writeln!(out, "  - {reference} ({name})");
    }
    out
}

fn list_libraries(
    header: &str,
    empty: &str,
    noun: &str,
    libraries: &IndexMap<String, Vec<String>>,
) -> String {
    if libraries.is_empty() {
        return empty.to_string();
    }

    let mut out = String::from(header);
    for (nickname, items) in libraries {
        let _ = writeln!(out, "  Library: {nickname}");
        for item in items.iter().take(LIST_ITEMS_PER_LIBRARY) {
            let _ = writeln!(out, "    - {item}");
        }
        if items.len() > LIST_ITEMS_PER_LIBRARY {
            let _ = writeln!(out, "    ... (more {noun} available)");
        }
    }
    out
}

/// Case-insensitive substring search over placed parts and library entries.
#[must_use]
pub fn query(term: &str, context: &ContextSnapshot) -> String {
    let needle = term.to_lowercase();
    let mut out = format!("Search results for '{needle}':\n");
    let mut found = false;

    let components = context
        .present_refs
        .iter()
        .map(|(reference, name)| format!("{reference} ({name})"))
        .chain(context.symbol_entries());
    for hit in components.filter(|c| c.to_lowercase().contains(&needle)) {
        let _ = writeln!(out, "  Component: {hit}");
        found = true;
    }

    let footprints = context
        .present_footprints
        .iter()
        .map(|(reference, name)| format!("{reference} ({name})"))
        .chain(context.footprint_entries());
    for hit in footprints.filter(|f| f.to_lowercase().contains(&needle)) {
        let _ = writeln!(out, "  Footprint: {hit}");
        found = true;
    }

    if !found {
        out.push_str("No matches found.");
    }
    out
}
