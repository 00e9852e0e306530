//! Read-only snapshot of host state for one request.
//!
//! The snapshot feeds both the system prompt and the listing/query actions.
//! Library enumeration is capped so a large installation does not blow up
//! the prompt.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::host::{Editor, HostHandle, LibraryScope};

/// Maximum number of libraries enumerated per table.
pub const MAX_LIBRARIES: usize = 20;

/// Maximum number of items enumerated per library.
pub const MAX_ITEMS_PER_LIBRARY: usize = 50;

/// Kind of editor frame the request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorKind {
    /// Schematic editor.
    Schematic,
    /// PCB editor.
    Board,
    /// Footprint editor.
    Footprint,
    /// Anything else.
    Unknown,
}

impl fmt::Display for EditorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Schematic => "schematic",
            Self::Board => "board",
            Self::Footprint => "footprint",
            Self::Unknown => "unknown",
        })
    }
}

/// Options for building a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectOptions {
    /// Include file and project paths.
    pub include_file_paths: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            include_file_paths: true,
        }
    }
}

/// Immutable view of the host captured once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSnapshot {
    /// Active editor.
    pub editor_kind: EditorKind,
    /// Open document path.
    pub file_path: Option<String>,
    /// Project directory.
    pub project_path: Option<String>,
    /// `(reference, symbol name)` of symbols in the design.
    pub present_refs: Vec<(String, String)>,
    /// `(reference, footprint name)` of footprints on the board.
    pub present_footprints: Vec<(String, String)>,
    /// Symbol library nickname to symbol names, host order and case.
    pub symbol_libs: IndexMap<String, Vec<String>>,
    /// Footprint library nickname to footprint names.
    pub footprint_libs: IndexMap<String, Vec<String>>,
}

impl ContextSnapshot {
    /// An empty snapshot for `editor_kind`.
    #[must_use]
    pub fn empty(editor_kind: EditorKind) -> Self {
        Self {
            editor_kind,
            file_path: None,
            project_path: None,
            present_refs: Vec::new(),
            present_footprints: Vec::new(),
            symbol_libs: IndexMap::new(),
            footprint_libs: IndexMap::new(),
        }
    }

    /// Captures the current host state.
    #[must_use]
    pub fn collect(host: &HostHandle<'_>, options: CollectOptions) -> Self {
        let mut snapshot = Self::empty(host.editor_kind());

        if options.include_file_paths {
            snapshot.file_path = host.file_path();
            snapshot.project_path.clone_from(&host.project_path);
        }

        match &host.editor {
            Editor::Schematic(sch) => {
                snapshot.present_refs = sch
                    .reference_list()
                    .into_iter()
                    .map(|r| (r.reference, r.lib_id.item_name))
                    .collect();
            }
            Editor::Board(board) => {
                snapshot.present_footprints = board
                    .footprints()
                    .into_iter()
                    .map(|fp| (fp.reference, fp.fpid.item_name))
                    .collect();
            }
            Editor::Footprint | Editor::Unknown => {}
        }

        let symbols = host.symbol_libraries;
        snapshot.symbol_libs = collect_table(
            symbols
                .rows(LibraryScope::Both)
                .into_iter()
                .map(|row| row.nickname),
            |nick| symbols.symbol_names(nick),
        );

        if let Some(footprints) = host.footprint_libraries {
            snapshot.footprint_libs = collect_table(
                footprints
                    .rows(LibraryScope::Both)
                    .into_iter()
                    .map(|row| row.nickname),
                |nick| footprints.footprint_names(nick),
            );
        }

        snapshot
    }

    /// `lib:item` entries of the symbol table, in table order.
    pub fn symbol_entries(&self) -> impl Iterator<Item = String> + '_ {
        qualified_entries(&self.symbol_libs)
    }

    /// `lib:item` entries of the footprint table, in table order.
    pub fn footprint_entries(&self) -> impl Iterator<Item = String> + '_ {
        qualified_entries(&self.footprint_libs)
    }
}

fn collect_table(
    nicknames: impl Iterator<Item = String>,
    names: impl Fn(&str) -> Vec<String>,
) -> IndexMap<String, Vec<String>> {
    let mut table = IndexMap::new();
    for nickname in nicknames {
        if table.len() >= MAX_LIBRARIES {
            break;
        }
        if nickname.is_empty() || table.contains_key(&nickname) {
            continue;
        }
        let mut items = names(&nickname);
        items.truncate(MAX_ITEMS_PER_LIBRARY);
        table.insert(nickname, items);
    }
    table
}

fn qualified_entries(table: &IndexMap<String, Vec<String>>) -> impl Iterator<Item = String> + '_ {
    table
        .iter()
        .flat_map(|(lib, items)| items.iter().map(move |item| format!("{lib}:{item}")))
}
