//! Interface to the host EDA application.
//!
//! The pipeline never owns host objects. Each run receives a [`HostHandle`]
//! that borrows the capabilities of the active editor frame. The editor kind
//! is carried by the [`Editor`] variant itself, so dispatch is a `match`
//! instead of a runtime type check.
//!
//! Host objects are not reentrancy-safe: every call through these traits
//! must happen on the task that owns the handle.

pub mod memory;

pub use memory::MemoryHost;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::command::{LibraryId, Point};
use crate::context::EditorKind;

/// Identifier of an item added to a host screen.
pub type ItemId = Uuid;

/// Errors reported by the host when an edit cannot be applied.
#[derive(Debug, Error)]
pub enum HostError {
    /// The editor has no screen to add items to.
    #[error("no active screen")]
    NoScreen,

    /// The host rejected the item.
    #[error("item rejected: {message}")]
    Rejected {
        /// Host-provided reason.
        message: String,
    },

    /// A commit referenced an item that is not on the screen.
    #[error("unknown item {id}")]
    UnknownItem {
        /// The missing item.
        id: ItemId,
    },
}

/// Which library table rows to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryScope {
    /// User-global table.
    Global,
    /// Project-local table.
    Project,
    /// Both tables, global rows first.
    Both,
}

impl LibraryScope {
    /// Returns `true` if a row of scope `row` is part of this selection.
    #[must_use]
    pub fn includes(self, row: Self) -> bool {
        self == Self::Both || self == row
    }
}

/// A row of a library table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryRow {
    /// Nickname exactly as configured.
    pub nickname: String,
    /// Table the row comes from.
    pub scope: LibraryScope,
}

/// A pin as defined in a library symbol, relative to the symbol origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibPin {
    /// Pin name (`VIN`, `~` when unnamed).
    pub name: String,
    /// Pin number (`1`, `A3`).
    pub number: String,
    /// Offset from the symbol origin.
    #[serde(default)]
    pub offset: Point,
}

/// A symbol loaded from a library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibSymbol {
    /// Symbol name as stored in the library.
    pub name: String,
    /// Reference prefix used for annotation (`R`, `U`).
    #[serde(default = "default_reference_prefix")]
    pub reference_prefix: String,
    /// Pins of the symbol.
    #[serde(default)]
    pub pins: Vec<LibPin>,
}

fn default_reference_prefix() -> String {
    "U".to_string()
}

/// Symbol library table (global and project scopes merged).
pub trait SymbolLibraryTable {
    /// Library rows in table order.
    fn rows(&self, scope: LibraryScope) -> Vec<LibraryRow>;

    /// Symbol names of a library, in library order. Empty if unknown.
    fn symbol_names(&self, nickname: &str) -> Vec<String>;

    /// Loads a symbol by exact nickname and name.
    fn load_symbol(&self, nickname: &str, name: &str) -> Option<LibSymbol>;
}

/// Footprint library table.
pub trait FootprintLibraryTable {
    /// Library rows in table order.
    fn rows(&self, scope: LibraryScope) -> Vec<LibraryRow>;

    /// Footprint names of a library, in library order. Empty if unknown.
    fn footprint_names(&self, nickname: &str) -> Vec<String>;
}

/// Opaque handle to a placed schematic symbol.
pub type SymbolHandle = ItemId;

/// An entry of the schematic reference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolReference {
    /// Reference designator (`U1`, or `R?` before annotation).
    pub reference: String,
    /// Library the symbol was instantiated from.
    pub lib_id: LibraryId,
    /// Handle for pin queries.
    pub handle: SymbolHandle,
}

/// A pin of a placed symbol, in world coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchPin {
    /// Name as shown on the canvas.
    pub shown_name: String,
    /// Number as shown on the canvas.
    pub shown_number: String,
    /// World position of the pin's connection point.
    pub position: Point,
}

/// Schematic drawing layers used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchLayer {
    /// Electrical wire layer.
    Wire,
}

/// A new symbol instance to add to the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSymbol {
    /// Library symbol the instance is created from.
    pub symbol: LibSymbol,
    /// Canonical library identifier.
    pub lib_id: LibraryId,
    /// Sheet path the instance belongs to.
    pub sheet: String,
    /// Unit number (1-based).
    pub unit: u32,
    /// Placement position.
    pub position: Point,
    /// Set for items created by this edit.
    pub is_new: bool,
    /// Autoplace reference/value fields after insertion.
    pub autoplace_fields: bool,
}

/// A line segment on a schematic layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLine {
    /// Layer the line lives on.
    pub layer: SchLayer,
    /// Start point.
    pub start: Point,
    /// End point.
    pub end: Point,
    /// Set for items created by this edit.
    pub is_new: bool,
}

/// Items the pipeline adds to a schematic screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchItem {
    /// A symbol instance.
    Symbol(NewSymbol),
    /// A wire or other line.
    Line(NewLine),
}

/// An atomic, undoable edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commit {
    added: Vec<ItemId>,
}

impl Commit {
    /// Starts an empty commit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an item added to the screen.
    pub fn added(&mut self, id: ItemId) {
        self.added.push(id);
    }

    /// Items recorded so far.
    #[must_use]
    pub fn items(&self) -> &[ItemId] {
        &self.added
    }
}

/// Schematic editor capabilities.
pub trait SchematicEditor {
    /// Path of the schematic file, if saved.
    fn file_name(&self) -> Option<String>;

    /// Path of the sheet being edited.
    fn current_sheet(&self) -> String;

    /// All symbols of the schematic hierarchy.
    fn reference_list(&self) -> Vec<SymbolReference>;

    /// Pins of a placed symbol with world positions.
    fn symbol_pins(&self, handle: SymbolHandle) -> Vec<SchPin>;

    /// Whether the user enabled automatic field placement.
    fn autoplace_fields(&self) -> bool;

    /// Adds an item to the current screen.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the item.
    fn add_to_screen(&mut self, item: SchItem) -> Result<ItemId, HostError>;

    /// Pushes a commit onto the undo stack under `label`.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit cannot be applied.
    fn push_commit(&mut self, commit: Commit, label: &str) -> Result<(), HostError>;

    /// Requests a canvas redraw.
    fn refresh_canvas(&mut self);

    /// Marks the sheet content modified so the host re-runs annotation.
    fn mark_modified(&mut self);
}

/// A footprint placed on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedFootprint {
    /// Reference designator.
    pub reference: String,
    /// Library footprint identifier.
    pub fpid: LibraryId,
}

/// Board editor capabilities.
pub trait BoardEditor {
    /// Path of the board file, if saved.
    fn file_name(&self) -> Option<String>;

    /// Footprints on the board.
    fn footprints(&self) -> Vec<PlacedFootprint>;
}

/// Capabilities of the active editor frame.
pub enum Editor<'a> {
    /// Schematic editor.
    Schematic(&'a mut dyn SchematicEditor),
    /// PCB editor.
    Board(&'a mut dyn BoardEditor),
    /// Footprint editor (library view only).
    Footprint,
    /// Any other frame.
    Unknown,
}

/// Everything the pipeline may touch during one run.
pub struct HostHandle<'a> {
    /// Active editor.
    pub editor: Editor<'a>,
    /// Project directory, if a project is open.
    pub project_path: Option<String>,
    /// Symbol library table.
    pub symbol_libraries: &'a dyn SymbolLibraryTable,
    /// Footprint library table, when the host exposes one.
    pub footprint_libraries: Option<&'a dyn FootprintLibraryTable>,
}

impl HostHandle<'_> {
    /// Editor kind derived from the active editor.
    #[must_use]
    pub fn editor_kind(&self) -> EditorKind {
        match self.editor {
            Editor::Schematic(_) => EditorKind::Schematic,
            Editor::Board(_) => EditorKind::Board,
            Editor::Footprint => EditorKind::Footprint,
            Editor::Unknown => EditorKind::Unknown,
        }
    }

    /// File path of the open document.
    #[must_use]
    pub fn file_path(&self) -> Option<String> {
        match &self.editor {
            Editor::Schematic(sch) => sch.file_name(),
            Editor::Board(board) => board.file_name(),
            Editor::Footprint | Editor::Unknown => None,
        }
    }

    /// Marks the schematic modified; no-op in other editors.
    pub fn mark_modified(&mut self) {
        if let Editor::Schematic(sch) = &mut self.editor {
            sch.mark_modified();
        }
    }
}
