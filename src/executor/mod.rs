//! Action execution against the host.
//!
//! The executor dispatches on the active [`Editor`] variant. Every action
//! yields its own [`CommandResult`]; a failing action never stops the caller
//! from running the next one.

pub mod listing;
pub mod resolve;
pub mod schematic;

use serde::Serialize;
use tracing::{debug, warn};

use crate::command::{Action, Point};
use crate::config::ExecutorConfig;
use crate::context::{ContextSnapshot, EditorKind};
use crate::error::ActionError;
use crate::host::{Editor, HostHandle};

/// Outcome of one action, or of a whole pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// Whether the action succeeded.
    pub success: bool,
    /// User-facing message on success.
    pub message: String,
    /// User-facing error on failure.
    pub error: Option<String>,
}

impl CommandResult {
    /// A successful result.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    /// A failed result.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: String::new(),
            error: Some(error.into()),
        }
    }
}

impl From<Result<String, ActionError>> for CommandResult {
    fn from(result: Result<String, ActionError>) -> Self {
        match result {
            Ok(message) => Self::ok(message),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Executes parsed actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executor {
    default_position: Point,
}

impl Default for Executor {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

impl Executor {
    /// Creates an executor placing unpositioned symbols at `default_position`.
    #[must_use]
    pub const fn new(default_position: Point) -> Self {
        Self { default_position }
    }

    /// Creates an executor from configuration.
    #[must_use]
    pub const fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.default_point())
    }

    /// Position used when an `add component` gives none.
    #[must_use]
    pub const fn default_position(&self) -> Point {
        self.default_position
    }

    /// Executes one action.
    pub fn execute(
        &self,
        action: &Action,
        host: &mut HostHandle<'_>,
        context: &ContextSnapshot,
    ) -> CommandResult {
        let result = self.dispatch(action, host, context);
        match &result {
            Ok(message) => debug!(%action, message = %message, "Action succeeded"),
            Err(e) => warn!(%action, error = %e, "Action failed"),
        }
        result.into()
    }

    fn dispatch(
        &self,
        action: &Action,
        host: &mut HostHandle<'_>,
        context: &ContextSnapshot,
    ) -> Result<String, ActionError> {
        let kind = host.editor_kind();
        let libraries = host.symbol_libraries;

        match action {
            Action::AddComponent { id, at } => {
                let Editor::Schematic(sch) = &mut host.editor else {
                    return Err(ActionError::wrong_editor("add component", "schematic editor", kind));
                };
                schematic::place_component(
                    &mut **sch,
                    libraries,
                    id,
                    at.unwrap_or(self.default_position),
                )
            }
            Action::Connect {
                ref1,
                pin1,
                ref2,
                pin2,
            } => {
                let Editor::Schematic(sch) = &mut host.editor else {
                    return Err(ActionError::wrong_editor("connect", "schematic editor", kind));
                };
                schematic::connect(&mut **sch, ref1, pin1, ref2, pin2)
            }
            Action::AddTrace { start, end, width } => {
                if kind != EditorKind::Board {
                    return Err(ActionError::wrong_editor("add trace", "board editor", kind));
                }
                Ok(format!(
                    "Would add trace from ({}, {}) to ({}, {}) width {}",
                    start.x,
                    start.y,
                    end.x,
                    end.y,
                    width.unwrap_or(0)
                ))
            }
            Action::ModifyComponent { refdes } => {
                if kind != EditorKind::Schematic {
                    return Err(ActionError::wrong_editor(
                        "modify component",
                        "schematic editor",
                        kind,
                    ));
                }
                Ok(format!("Would modify component '{refdes}'"))
            }
            Action::ModifyFootprint { name } => {
                if !matches!(kind, EditorKind::Board | EditorKind::Footprint) {
                    return Err(ActionError::wrong_editor(
                        "modify footprint",
                        "board or footprint editor",
                        kind,
                    ));
                }
                Ok(format!("Would modify footprint '{name}'"))
            }
            Action::Help => Ok(listing::HELP_TEXT.to_string()),
            Action::List { target } => Ok(listing::list(*target, context)),
            Action::Query { term } => Ok(listing::query(term, context)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{parse, ComponentId, LibraryId};
    use crate::context::CollectOptions;
    use crate::host::memory::MemorySymbolLibrary;
    use crate::host::{LibSymbol, LibraryScope, MemoryHost};

    fn host(editor: EditorKind) -> MemoryHost {
        let mut host = MemoryHost {
            editor,
            ..MemoryHost::default()
        };
        host.symbol_libraries.0.push(MemorySymbolLibrary {
            nickname: "Device".into(),
            scope: LibraryScope::Global,
            symbols: vec![LibSymbol {
                name: "R".into(),
                reference_prefix: "R".into(),
                pins: Vec::new(),
            }],
        });
        host
    }

    fn run(host: &mut MemoryHost, line: &str) -> CommandResult {
        let action = parse(line).unwrap();
        let mut handle = host.handle();
        let context = ContextSnapshot::collect(&handle, CollectOptions::default());
        Executor::default().execute(&action, &mut handle, &context)
    }

    #[test]
    fn missing_position_uses_default() {
        let mut host = host(EditorKind::Schematic);
        let result = run(&mut host, "add component Device:R");
        assert!(result.success);
        assert_eq!(result.message, "Added component 'Device:R' at (100000, 100000)");
        assert_eq!(host.schematic.symbols[0].position, Point::new(100_000, 100_000));
    }

    #[test]
    fn configured_default_position() {
        let mut host = host(EditorKind::Schematic);
        let action = Action::AddComponent {
            id: ComponentId::Qualified(LibraryId::new("Device", "R")),
            at: None,
        };
        let mut handle = host.handle();
        let context = ContextSnapshot::empty(EditorKind::Schematic);
        let executor = Executor::new(Point::new(0, 0));
        assert_eq!(executor.default_position(), Point::new(0, 0));
        assert_eq!(Executor::default().default_position(), Point::new(100_000, 100_000));
        assert!(executor.execute(&action, &mut handle, &context).success);
        assert_eq!(host.schematic.symbols[0].position, Point::new(0, 0));
    }

    #[test]
    fn schematic_actions_need_schematic_editor() {
        let mut host = host(EditorKind::Board);
        let result = run(&mut host, "add component Device:R at 0,0");
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("'add component' is only available in the schematic editor (current editor: board)")
        );
        assert!(!run(&mut host, "connect R1.1 to R2.1").success);
    }

    #[test]
    fn trace_is_rejected_cleanly_in_schematic() {
        let mut host = host(EditorKind::Schematic);
        let result = run(&mut host, "add trace from 0,0 to 1000,0 width 250");
        assert!(!result.success);
        assert!(host.schematic.commits.is_empty());
    }

    #[test]
    fn board_actions_are_acknowledged() {
        let mut host = host(EditorKind::Board);
        let result = run(&mut host, "add trace from 0,0 to 1000,0 width 250");
        assert_eq!(result.message, "Would add trace from (0, 0) to (1000, 0) width 250");

        let result = run(&mut host, "modify footprint R_0603");
        assert_eq!(result.message, "Would modify footprint 'R_0603'");
    }

    #[test]
    fn modify_component_is_acknowledged() {
        let mut host = host(EditorKind::Schematic);
        let result = run(&mut host, "modify component R1");
        assert!(result.success);
        assert_eq!(result.message, "Would modify component 'R1'");
        assert!(host.schematic.commits.is_empty());
    }

    #[test]
    fn read_only_actions_work_everywhere() {
        for editor in [
            EditorKind::Schematic,
            EditorKind::Board,
            EditorKind::Footprint,
            EditorKind::Unknown,
        ] {
            let mut host = host(editor);
            assert!(run(&mut host, "help").success);
            let result = run(&mut host, "list libraries");
            assert!(result.message.contains("  Library: Device\n"), "{editor}");
        }
    }

    #[test]
    fn unknown_library_fails_without_mutation() {
        let mut host = host(EditorKind::Schematic);
        let result = run(&mut host, "add component Foo:Bar");
        assert_eq!(
            result.error.as_deref(),
            Some("Library 'Foo' not found. Available libraries: Device")
        );
        assert!(host.schematic.symbols.is_empty());
    }
}
