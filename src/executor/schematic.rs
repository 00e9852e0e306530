//! Schematic edits: symbol placement and wiring.
//!
//! Every edit is one commit on the host's undo stack followed by a canvas
//! refresh. Overlap trimming and junctions are left to the host's next
//! schematic update.

use tracing::{debug, info};

use super::resolve::{find_pin, find_reference, resolve_symbol};
use crate::command::{ComponentId, Point};
use crate::error::ActionError;
use crate::host::{
    Commit, ItemId, NewLine, NewSymbol, SchItem, SchLayer, SchematicEditor, SymbolLibraryTable,
};

/// Undo label of a placement.
pub const PLACE_SYMBOL: &str = "Place Symbol";

/// Undo label of a wire.
pub const DRAW_WIRE: &str = "Draw Wire";

fn commit_single(
    schematic: &mut dyn SchematicEditor,
    item: SchItem,
    label: &str,
) -> Result<ItemId, ActionError> {
    let id = schematic.add_to_screen(item)?;
    let mut commit = Commit::new();
    commit.added(id);
    schematic.push_commit(commit, label)?;
    schematic.refresh_canvas();
    Ok(id)
}

/// Places a library symbol on the current sheet.
///
/// # Errors
///
/// Returns an error if the symbol cannot be resolved or the host rejects it.
pub fn place_component(
    schematic: &mut dyn SchematicEditor,
    libraries: &dyn SymbolLibraryTable,
    id: &ComponentId,
    at: Point,
) -> Result<String, ActionError> {
    let (lib_id, symbol) = resolve_symbol(libraries, id)?;

    let item = SchItem::Symbol(NewSymbol {
        symbol,
        lib_id: lib_id.clone(),
        sheet: schematic.current_sheet(),
        unit: 1,
        position: at,
        is_new: true,
        autoplace_fields: schematic.autoplace_fields(),
    });
    let item_id = commit_single(schematic, item, PLACE_SYMBOL)?;

    info!(%lib_id, x = at.x, y = at.y, %item_id, "Placed symbol");
    Ok(format!("Added component '{id}' at ({}, {})", at.x, at.y))
}

/// Draws a wire segment between two points.
///
/// # Errors
///
/// Returns an error if the host rejects the wire.
pub fn draw_wire(
    schematic: &mut dyn SchematicEditor,
    start: Point,
    end: Point,
) -> Result<ItemId, ActionError> {
    let item = SchItem::Line(NewLine {
        layer: SchLayer::Wire,
        start,
        end,
        is_new: true,
    });
    let id = commit_single(schematic, item, DRAW_WIRE)?;
    debug!(%start, %end, %id, "Drew wire");
    Ok(id)
}

/// Wires `ref1.pin1` to `ref2.pin2`.
///
/// # Errors
///
/// Returns an error if a reference or pin cannot be found, or the host
/// rejects the wire.
pub fn connect(
    schematic: &mut dyn SchematicEditor,
    ref1: &str,
    pin1: &str,
    ref2: &str,
    pin2: &str,
) -> Result<String, ActionError> {
    let first = find_reference(schematic, ref1)?;
    let second = find_reference(schematic, ref2)?;
    let start = find_pin(schematic, &first, pin1)?;
    let end = find_pin(schematic, &second, pin2)?;

    draw_wire(schematic, start, end)?;
    info!(from = %first.reference, to = %second.reference, "Connected pins");
    Ok(format!("Connected {ref1}.{pin1} to {ref2}.{pin2}"))
}
