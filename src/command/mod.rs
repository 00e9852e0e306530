//! Structured design-action language.
//!
//! A generator reply is reduced to a list of command lines by the
//! [`miner`], and each line is turned into a typed [`Action`] by the
//! [`parser`]. The grammar is line-oriented and keyword case-insensitive:
//!
//! ```text
//! add component <lib>:<sym> [at <x>,<y>]
//! add component <sym>       [at <x>,<y>]
//! connect <ref1>.<pin1> to <ref2>.<pin2>
//! connect <ref1> pin <pin1> to <ref2> pin <pin2>
//! wire …                    (synonym for connect)
//! add trace from <x1>,<y1> to <x2>,<y2> [width <w>]
//! modify component <ref>
//! modify footprint <name>
//! help | list components | list libraries | list footprints | query <term>
//! ```
//!
//! Coordinates are opaque signed integers in host units. Only the executor
//! knows what a unit means.

pub mod lexer;
pub mod miner;
pub mod parser;

pub use miner::mine;
pub use parser::{parse, ParseDiagnostic, ParseErrorKind};

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 2D position in host-internal units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: i64,
    /// Y coordinate.
    pub y: i64,
}

impl Point {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// A library item identifier: `(library_nickname, item_name)`.
///
/// Equality is case-sensitive. Case-insensitive resolution against the host
/// library table happens in the executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryId {
    /// Library nickname as it appears in the library table.
    pub nickname: String,
    /// Symbol or footprint name within the library.
    pub item_name: String,
}

impl LibraryId {
    /// Creates a new library identifier.
    pub fn new(nickname: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            item_name: item_name.into(),
        }
    }

    /// Splits `lib:item` at the first colon.
    ///
    /// Returns `None` if the text has no colon or either side is empty.
    #[must_use]
    pub fn split(text: &str) -> Option<Self> {
        let (lib, item) = text.split_once(':')?;
        if lib.is_empty() || item.is_empty() {
            return None;
        }
        Some(Self::new(lib, item))
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.nickname, self.item_name)
    }
}

/// The component named by an `add component` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentId {
    /// `lib:sym` form.
    Qualified(LibraryId),
    /// Bare symbol name, searched across all libraries.
    Bare(String),
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qualified(id) => write!(f, "{id}"),
            Self::Bare(name) => write!(f, "{name}"),
        }
    }
}

/// What `list` enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListTarget {
    /// Components placed in the current design.
    Components,
    /// Symbol libraries and their symbols.
    Libraries,
    /// Footprint libraries and their footprints.
    Footprints,
}

/// Execution phase an action belongs to.
///
/// Placements run before connections so that newly placed symbols are
/// annotated before connections resolve references against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PassKey {
    /// Pass 1: symbol placement.
    Placement,
    /// Pass 2: wiring between pins.
    Connection,
    /// Everything else, executed after both passes.
    Other,
}

/// A typed, executable design edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Place a symbol from a library.
    AddComponent {
        /// Symbol to place.
        id: ComponentId,
        /// Optional placement position.
        at: Option<Point>,
    },
    /// Draw a wire between two symbol pins.
    Connect {
        /// First reference designator.
        ref1: String,
        /// Pin on the first symbol (name or number).
        pin1: String,
        /// Second reference designator.
        ref2: String,
        /// Pin on the second symbol (name or number).
        pin2: String,
    },
    /// Add a board trace (board editor only).
    AddTrace {
        /// Trace start.
        start: Point,
        /// Trace end.
        end: Point,
        /// Optional track width in host units.
        width: Option<i64>,
    },
    /// Modify a placed component (acknowledged, not executed).
    ModifyComponent {
        /// Reference designator.
        refdes: String,
    },
    /// Modify a footprint (acknowledged, not executed).
    ModifyFootprint {
        /// Footprint name.
        name: String,
    },
    /// Show the command summary.
    Help,
    /// Enumerate components, libraries, or footprints.
    List {
        /// What to list.
        target: ListTarget,
    },
    /// Case-insensitive substring search over the context snapshot.
    Query {
        /// Search term as typed.
        term: String,
    },
}

impl Action {
    /// Returns the execution pass for this action.
    #[must_use]
    pub const fn pass(&self) -> PassKey {
        match self {
            Self::AddComponent { .. } => PassKey::Placement,
            Self::Connect { .. } => PassKey::Connection,
            _ => PassKey::Other,
        }
    }
}

/// Formats the action in canonical command syntax.
///
/// The output of this impl parses back to an equal action.
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddComponent { id, at } => {
                write!(f, "add component {id}")?;
                if let Some(at) = at {
                    write!(f, " at {at}")?;
                }
                Ok(())
            }
            Self::Connect {
                ref1,
                pin1,
                ref2,
                pin2,
            } => write!(f, "connect {ref1}.{pin1} to {ref2}.{pin2}"),
            Self::AddTrace { start, end, width } => {
                write!(f, "add trace from {start} to {end}")?;
                if let Some(width) = width {
                    write!(f, " width {width}")?;
                }
                Ok(())
            }
            Self::ModifyComponent { refdes } => write!(f, "modify component {refdes}"),
            Self::ModifyFootprint { name } => write!(f, "modify footprint {name}"),
            Self::Help => f.write_str("help"),
            Self::List { target } => match target {
                ListTarget::Components => f.write_str("list components"),
                ListTarget::Libraries => f.write_str("list libraries"),
                ListTarget::Footprints => f.write_str("list footprints"),
            },
            Self::Query { term } => write!(f, "query {term}"),
        }
    }
}
