//! In-memory host backed by a JSON design document.
//!
//! Used by the CLI to run the pipeline without a live EDA application, and by
//! the tests as a fully observable host. Newly placed symbols get `PREFIX?`
//! references and are annotated when the design is marked modified, the way
//! an interactive schematic editor re-annotates after an edit.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{
    BoardEditor, Commit, Editor, FootprintLibraryTable, HostError, HostHandle, ItemId, LibPin,
    LibSymbol, LibraryRow, LibraryScope, PlacedFootprint, SchItem, SchLayer, SchPin,
    SchematicEditor, SymbolHandle, SymbolLibraryTable, SymbolReference,
};
use crate::command::{LibraryId, Point};
use crate::context::EditorKind;

/// Errors loading or saving a design document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Failed to read or write the file.
    #[error("Failed to access design file '{path}': {source}")]
    Io {
        /// Path to the design file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid design document.
    #[error("Failed to parse design file '{path}': {source}")]
    Parse {
        /// Path to the design file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The design could not be encoded for writing.
    #[error("Failed to serialise design for '{path}': {source}")]
    Serialize {
        /// Path the design was to be written to.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// A symbol library held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemorySymbolLibrary {
    /// Library nickname.
    pub nickname: String,
    /// Table the library is configured in.
    #[serde(default = "default_scope")]
    pub scope: LibraryScope,
    /// Symbols in library order.
    #[serde(default)]
    pub symbols: Vec<LibSymbol>,
}

/// A footprint library held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryFootprintLibrary {
    /// Library nickname.
    pub nickname: String,
    /// Table the library is configured in.
    #[serde(default = "default_scope")]
    pub scope: LibraryScope,
    /// Footprint names in library order.
    #[serde(default)]
    pub footprints: Vec<String>,
}

const fn default_scope() -> LibraryScope {
    LibraryScope::Global
}

/// Symbol library table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolLibraries(pub Vec<MemorySymbolLibrary>);

impl SymbolLibraries {
    fn find(&self, nickname: &str) -> Option<&MemorySymbolLibrary> {
        self.0.iter().find(|lib| lib.nickname == nickname)
    }
}

impl SymbolLibraryTable for SymbolLibraries {
    fn rows(&self, scope: LibraryScope) -> Vec<LibraryRow> {
        table_rows(self.0.iter().map(|lib| (&lib.nickname, lib.scope)), scope)
    }

    fn symbol_names(&self, nickname: &str) -> Vec<String> {
        self.find(nickname)
            .map(|lib| lib.symbols.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    fn load_symbol(&self, nickname: &str, name: &str) -> Option<LibSymbol> {
        self.find(nickname)?
            .symbols
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }
}

/// Footprint library table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FootprintLibraries(pub Vec<MemoryFootprintLibrary>);

impl FootprintLibraryTable for FootprintLibraries {
    fn rows(&self, scope: LibraryScope) -> Vec<LibraryRow> {
        table_rows(self.0.iter().map(|lib| (&lib.nickname, lib.scope)), scope)
    }

    fn footprint_names(&self, nickname: &str) -> Vec<String> {
        self.0
            .iter()
            .find(|lib| lib.nickname == nickname)
            .map(|lib| lib.footprints.clone())
            .unwrap_or_default()
    }
}

/// Global rows first, then project rows, each in document order.
fn table_rows<'a>(
    libs: impl Iterator<Item = (&'a String, LibraryScope)> + Clone,
    scope: LibraryScope,
) -> Vec<LibraryRow> {
    [LibraryScope::Global, LibraryScope::Project]
        .into_iter()
        .filter(|&row_scope| scope.includes(row_scope))
        .flat_map(|row_scope| {
            libs.clone()
                .filter(move |(_, s)| *s == row_scope)
                .map(|(nickname, scope)| LibraryRow {
                    nickname: nickname.clone(),
                    scope,
                })
        })
        .collect()
}

/// A symbol instance on the schematic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlacedSymbol {
    /// Item id.
    #[serde(default = "Uuid::new_v4")]
    pub id: ItemId,
    /// Reference designator; `PREFIX?` until annotated.
    pub reference: String,
    /// Library the symbol was instantiated from.
    pub lib_id: LibraryId,
    /// Sheet path.
    #[serde(default = "default_sheet")]
    pub sheet: String,
    /// Unit number.
    #[serde(default = "default_unit")]
    pub unit: u32,
    /// Placement position.
    #[serde(default)]
    pub position: Point,
    /// Pins relative to `position`.
    #[serde(default)]
    pub pins: Vec<LibPin>,
    /// Whether fields were autoplaced on insertion.
    #[serde(default)]
    pub fields_autoplaced: bool,
}

impl PlacedSymbol {
    fn is_annotated(&self) -> bool {
        !self.reference.ends_with('?')
    }
}

/// A wire segment on the schematic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Wire {
    /// Item id.
    #[serde(default = "Uuid::new_v4")]
    pub id: ItemId,
    /// Start point.
    pub start: Point,
    /// End point.
    pub end: Point,
}

/// A commit pushed onto the undo stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// User-visible label.
    pub label: String,
    /// Items added by the commit.
    pub items: Vec<ItemId>,
}

fn default_sheet() -> String {
    "/".to_string()
}

const fn default_unit() -> u32 {
    1
}

/// World position of a pin, `None` if it does not fit in host coordinates.
fn pin_position(origin: Point, offset: Point) -> Option<Point> {
    Some(Point::new(
        origin.x.checked_add(offset.x)?,
        origin.y.checked_add(offset.y)?,
    ))
}

/// Schematic state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemorySchematic {
    /// Schematic file path.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Sheet being edited.
    #[serde(default = "default_sheet")]
    pub sheet: String,
    /// Autoplace fields of new symbols.
    #[serde(default)]
    pub autoplace_fields: bool,
    /// Reject every edit.
    #[serde(default)]
    pub read_only: bool,
    /// Placed symbols in placement order.
    #[serde(default)]
    pub symbols: Vec<PlacedSymbol>,
    /// Wires in drawing order.
    #[serde(default)]
    pub wires: Vec<Wire>,
    /// Commits pushed during this session.
    #[serde(skip)]
    pub commits: Vec<CommitRecord>,
    /// Canvas refresh requests during this session.
    #[serde(skip)]
    pub refreshes: usize,
    /// Times the design was marked modified during this session.
    #[serde(skip)]
    pub modified: usize,
}

impl Default for MemorySchematic {
    fn default() -> Self {
        Self {
            file_name: None,
            sheet: default_sheet(),
            autoplace_fields: false,
            read_only: false,
            symbols: Vec::new(),
            wires: Vec::new(),
            commits: Vec::new(),
            refreshes: 0,
            modified: 0,
        }
    }
}

impl MemorySchematic {
    /// Assigns the lowest free number to every `PREFIX?` reference, in
    /// placement order.
    pub fn annotate(&mut self) {
        for index in 0..self.symbols.len() {
            if self.symbols[index].is_annotated() {
                continue;
            }
            let prefix = self.symbols[index].reference.trim_end_matches('?').to_string();
            let mut number = 1;
            while self.reference_in_use(&format!("{prefix}{number}")) {
                number += 1;
            }
            self.symbols[index].reference = format!("{prefix}{number}");
        }
    }

    fn reference_in_use(&self, reference: &str) -> bool {
        self.symbols
            .iter()
            .any(|s| s.reference.eq_ignore_ascii_case(reference))
    }

    fn contains(&self, id: ItemId) -> bool {
        self.symbols.iter().any(|s| s.id == id) || self.wires.iter().any(|w| w.id == id)
    }
}

impl SchematicEditor for MemorySchematic {
    fn file_name(&self) -> Option<String> {
        self.file_name.clone()
    }

    fn current_sheet(&self) -> String {
        self.sheet.clone()
    }

    fn reference_list(&self) -> Vec<SymbolReference> {
        self.symbols
            .iter()
            .map(|s| SymbolReference {
                reference: s.reference.clone(),
                lib_id: s.lib_id.clone(),
                handle: s.id,
            })
            .collect()
    }

    fn symbol_pins(&self, handle: SymbolHandle) -> Vec<SchPin> {
        self.symbols
            .iter()
            .find(|s| s.id == handle)
            .map(|s| {
                s.pins
                    .iter()
                    .map(|pin| SchPin {
                        shown_name: pin.name.clone(),
                        shown_number: pin.number.clone(),
                        position: Point::new(
                            s.position.x.saturating_add(pin.offset.x),
                            s.position.y.saturating_add(pin.offset.y),
                        ),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn autoplace_fields(&self) -> bool {
        self.autoplace_fields
    }

    fn add_to_screen(&mut self, item: SchItem) -> Result<ItemId, HostError> {
        if self.read_only {
            return Err(HostError::Rejected {
                message: format!("sheet '{}' is read-only", self.sheet),
            });
        }

        if let SchItem::Symbol(new) = &item {
            if let Some(pin) = new
                .symbol
                .pins
                .iter()
                .find(|pin| pin_position(new.position, pin.offset).is_none())
            {
                return Err(HostError::Rejected {
                    message: format!(
                        "pin {} of '{}' at {} lies outside the coordinate range",
                        pin.number, new.lib_id, new.position
                    ),
                });
            }
        }

        let id = Uuid::new_v4();
        match item {
            SchItem::Symbol(new) => self.symbols.push(PlacedSymbol {
                id,
                reference: format!("{}?", new.symbol.reference_prefix),
                lib_id: new.lib_id,
                sheet: new.sheet,
                unit: new.unit,
                position: new.position,
                pins: new.symbol.pins,
                fields_autoplaced: new.autoplace_fields,
            }),
            SchItem::Line(line) => match line.layer {
                SchLayer::Wire => self.wires.push(Wire {
                    id,
                    start: line.start,
                    end: line.end,
                }),
            },
        }
        Ok(id)
    }

    fn push_commit(&mut self, commit: Commit, label: &str) -> Result<(), HostError> {
        if let Some(&id) = commit.items().iter().find(|&&id| !self.contains(id)) {
            return Err(HostError::UnknownItem { id });
        }
        self.commits.push(CommitRecord {
            label: label.to_string(),
            items: commit.items().to_vec(),
        });
        Ok(())
    }

    fn refresh_canvas(&mut self) {
        self.refreshes += 1;
    }

    fn mark_modified(&mut self) {
        self.modified += 1;
        self.annotate();
    }
}

/// Board state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryBoard {
    /// Board file path.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Footprints on the board.
    #[serde(default)]
    pub footprints: Vec<PlacedFootprint>,
}

impl BoardEditor for MemoryBoard {
    fn file_name(&self) -> Option<String> {
        self.file_name.clone()
    }

    fn footprints(&self) -> Vec<PlacedFootprint> {
        self.footprints.clone()
    }
}

const fn default_editor() -> EditorKind {
    EditorKind::Schematic
}

/// A complete host held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryHost {
    /// Active editor.
    #[serde(default = "default_editor")]
    pub editor: EditorKind,
    /// Project directory.
    #[serde(default)]
    pub project_path: Option<String>,
    /// Symbol library table.
    #[serde(default)]
    pub symbol_libraries: SymbolLibraries,
    /// Footprint library table.
    #[serde(default)]
    pub footprint_libraries: FootprintLibraries,
    /// Schematic document.
    #[serde(default)]
    pub schematic: MemorySchematic,
    /// Board document.
    #[serde(default)]
    pub board: MemoryBoard,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self {
            editor: default_editor(),
            project_path: None,
            symbol_libraries: SymbolLibraries::default(),
            footprint_libraries: FootprintLibraries::default(),
            schematic: MemorySchematic::default(),
            board: MemoryBoard::default(),
        }
    }
}

impl MemoryHost {
    /// Loads a design document from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| DocumentError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Writes the design document to `path` as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| DocumentError::Serialize {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| DocumentError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Borrows the host as a pipeline handle.
    pub fn handle(&mut self) -> HostHandle<'_> {
        let editor = match self.editor {
            EditorKind::Schematic => Editor::Schematic(&mut self.schematic),
            EditorKind::Board => Editor::Board(&mut self.board),
            EditorKind::Footprint => Editor::Footprint,
            EditorKind::Unknown => Editor::Unknown,
        };
        HostHandle {
            editor,
            project_path: self.project_path.clone(),
            symbol_libraries: &self.symbol_libraries,
            footprint_libraries: Some(&self.footprint_libraries),
        }
    }

    /// Finds a placed symbol by exact reference.
    #[must_use]
    pub fn symbol(&self, reference: &str) -> Option<&PlacedSymbol> {
        self.schematic
            .symbols
            .iter()
            .find(|s| s.reference == reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NewSymbol;

    const DESIGN: &str = r#"{
        "editor": "schematic",
        "project_path": "/work/psu",
        "symbol_libraries": [
            { "nickname": "Local", "scope": "project", "symbols": [ { "name": "X" } ] },
            { "nickname": "Device", "symbols": [
                { "name": "R", "reference_prefix": "R", "pins": [
                    { "name": "~", "number": "1", "offset": { "x": 0, "y": -3810 } },
                    { "name": "~", "number": "2", "offset": { "x": 0, "y": 3810 } }
                ] }
            ] }
        ],
        "schematic": {
            "file_name": "/work/psu/psu.kicad_sch",
            "symbols": [
                { "reference": "R1", "lib_id": { "nickname": "Device", "item_name": "R" },
                  "position": { "x": 1000, "y": 2000 },
                  "pins": [ { "name": "~", "number": "1", "offset": { "x": 0, "y": -3810 } } ] }
            ]
        }
    }"#;

    fn host() -> MemoryHost {
        serde_json::from_str(DESIGN).unwrap()
    }

    fn new_resistor(host: &MemoryHost) -> SchItem {
        let symbol = host.symbol_libraries.load_symbol("Device", "R").unwrap();
        SchItem::Symbol(NewSymbol {
            symbol,
            lib_id: LibraryId::new("Device", "R"),
            sheet: "/".into(),
            unit: 1,
            position: Point::new(0, 0),
            is_new: true,
            autoplace_fields: false,
        })
    }

    #[test]
    fn global_rows_come_first() {
        let host = host();
        let rows = host.symbol_libraries.rows(LibraryScope::Both);
        let names: Vec<_> = rows.iter().map(|r| r.nickname.as_str()).collect();
        assert_eq!(names, ["Device", "Local"]);
        assert_eq!(host.symbol_libraries.rows(LibraryScope::Project).len(), 1);
    }

    #[test]
    fn load_symbol_is_exact() {
        let host = host();
        assert!(host.symbol_libraries.load_symbol("Device", "R").is_some());
        assert!(host.symbol_libraries.load_symbol("device", "R").is_none());
        assert!(host.symbol_libraries.symbol_names("Nope").is_empty());
    }

    #[test]
    fn pin_positions_are_world_coordinates() {
        let host = host();
        let r1 = host.symbol("R1").unwrap();
        let pins = host.schematic.symbol_pins(r1.id);
        assert_eq!(pins[0].position, Point::new(1000, -1810));
    }

    #[test]
    fn new_symbols_are_annotated_on_modify() {
        let mut host = host();
        let item = new_resistor(&host);
        let id = host.schematic.add_to_screen(item).unwrap();
        assert_eq!(host.schematic.symbols[1].reference, "R?");

        let mut commit = Commit::new();
        commit.added(id);
        host.schematic.push_commit(commit, "Place Symbol").unwrap();
        host.schematic.mark_modified();

        assert!(host.symbol("R2").is_some());
        assert_eq!(host.schematic.commits[0].label, "Place Symbol");
    }

    #[test]
    fn commit_of_unknown_item_fails() {
        let mut host = host();
        let mut commit = Commit::new();
        commit.added(Uuid::new_v4());
        let err = host.schematic.push_commit(commit, "Draw Wire").unwrap_err();
        assert!(matches!(err, HostError::UnknownItem { .. }));
    }

    #[test]
    fn read_only_sheet_rejects_edits() {
        let mut host = host();
        host.schematic.read_only = true;
        let item = new_resistor(&host);
        assert!(host.schematic.add_to_screen(item).is_err());
    }

    #[test]
    fn serialise_failure_is_not_a_parse_error() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let err = DocumentError::Serialize {
            path: PathBuf::from("/tmp/out.json"),
            source,
        };
        let message = err.to_string();
        assert!(message.starts_with("Failed to serialise design for '/tmp/out.json'"));
        assert!(!message.contains("parse"));
    }

    #[test]
    fn stored_pin_positions_saturate() {
        let mut host = host();
        host.schematic.symbols[0].position = Point::new(i64::MAX, i64::MIN);
        let id = host.schematic.symbols[0].id;
        let pins = host.schematic.symbol_pins(id);
        assert_eq!(pins[0].position, Point::new(i64::MAX, i64::MIN));
    }

    #[test]
    fn handle_reports_editor_kind() {
        let mut host = host();
        assert_eq!(host.handle().editor_kind(), EditorKind::Schematic);
        host.editor = EditorKind::Board;
        assert_eq!(host.handle().editor_kind(), EditorKind::Board);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("design.json");
        let host = host();
        host.save(&path).unwrap();
        let reloaded = MemoryHost::load(&path).unwrap();
        assert_eq!(reloaded.schematic.symbols, host.schematic.symbols);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<MemoryHost, _> = serde_json::from_str(r#"{ "bogus": 1 }"#);
        assert!(result.is_err());
    }
}
