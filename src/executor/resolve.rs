//! Name resolution against the host.
//!
//! Library nicknames, symbol names, reference designators and pins are all
//! matched case-insensitively, but whatever is handed back to the host uses
//! the host's own spelling.

use crate::command::{ComponentId, LibraryId, Point};
use crate::error::ActionError;
use crate::host::{LibSymbol, LibraryScope, SchPin, SchematicEditor, SymbolLibraryTable, SymbolReference};

/// Library nicknames of the merged table, first occurrence wins.
#[must_use]
pub fn nicknames(table: &dyn SymbolLibraryTable) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for row in table.rows(LibraryScope::Both) {
        if !names.contains(&row.nickname) {
            names.push(row.nickname);
        }
    }
    names
}

/// Returns the table's spelling of `nickname`.
///
/// # Errors
///
/// Returns [`ActionError::LibraryNotFound`] listing the table's nicknames.
pub fn resolve_library(
    table: &dyn SymbolLibraryTable,
    nickname: &str,
) -> Result<String, ActionError> {
    let available = nicknames(table);
    match available
        .iter()
        .find(|name| name.eq_ignore_ascii_case(nickname))
    {
        Some(name) => Ok(name.clone()),
        None => Err(ActionError::LibraryNotFound {
            nickname: nickname.to_string(),
            available,
        }),
    }
}

/// Resolves a component identifier to a canonical id and loaded symbol.
///
/// # Errors
///
/// Returns an error if the library or symbol does not exist, or the symbol
/// cannot be loaded.
pub fn resolve_symbol(
    table: &dyn SymbolLibraryTable,
    id: &ComponentId,
) -> Result<(LibraryId, LibSymbol), ActionError> {
    match id {
        ComponentId::Qualified(requested) => {
            let nickname = resolve_library(table, &requested.nickname)?;
            let name = canonical_symbol_name(table, &nickname, &requested.item_name);
            table
                .load_symbol(&nickname, &name)
                .map(|symbol| (LibraryId::new(nickname.clone(), name.clone()), symbol))
                .ok_or_else(|| ActionError::SymbolLoadFailed {
                    name: id.to_string(),
                    nickname,
                    symbol: name,
                })
        }
        ComponentId::Bare(requested) => {
            for nickname in nicknames(table) {
                let Some(name) = table
                    .symbol_names(&nickname)
                    .into_iter()
                    .find(|name| name.eq_ignore_ascii_case(requested))
                else {
                    continue;
                };
                return match table.load_symbol(&nickname, &name) {
                    Some(symbol) => Ok((LibraryId::new(nickname, name), symbol)),
                    None => Err(ActionError::SymbolLoadFailed {
                        name: requested.clone(),
                        nickname,
                        symbol: name,
                    }),
                };
            }
            Err(ActionError::SymbolNotFound {
                name: requested.clone(),
            })
        }
    }
}

/// Library spelling of `name`, or `name` itself if the library lists no
/// case-insensitive match.
fn canonical_symbol_name(table: &dyn SymbolLibraryTable, nickname: &str, name: &str) -> String {
    if table.load_symbol(nickname, name).is_some() {
        return name.to_string();
    }
    table
        .symbol_names(nickname)
        .into_iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(name))
        .unwrap_or_else(|| name.to_string())
}

/// Finds a placed symbol by reference designator.
///
/// # Errors
///
/// Returns [`ActionError::ReferenceNotFound`] if no symbol matches.
pub fn find_reference(
    schematic: &dyn SchematicEditor,
    reference: &str,
) -> Result<SymbolReference, ActionError> {
    schematic
        .reference_list()
        .into_iter()
        .find(|r| r.reference.eq_ignore_ascii_case(reference))
        .ok_or_else(|| ActionError::reference_not_found(reference))
}

/// Returns `true` if `pin` answers to `requested`.
///
/// Name and number are compared verbatim (ignoring case), then again with a
/// leading `P` stripped from the request, so `P1` finds pin number `1`.
#[must_use]
pub fn pin_matches(pin: &SchPin, requested: &str) -> bool {
    let matches = |wanted: &str| {
        pin.shown_name.eq_ignore_ascii_case(wanted) || pin.shown_number.eq_ignore_ascii_case(wanted)
    };
    if matches(requested) {
        return true;
    }
    requested
        .strip_prefix(['P', 'p'])
        .is_some_and(|rest| !rest.is_empty() && matches(rest))
}

/// World position of a pin of a placed symbol.
///
/// # Errors
///
/// Returns [`ActionError::PinNotFound`] if no pin matches.
pub fn find_pin(
    schematic: &dyn SchematicEditor,
    symbol: &SymbolReference,
    pin: &str,
) -> Result<Point, ActionError> {
    schematic
        .symbol_pins(symbol.handle)
        .into_iter()
        .find(|candidate| pin_matches(candidate, pin))
        .map(|found| found.position)
        .ok_or_else(|| ActionError::pin_not_found(pin, &symbol.reference))
}
