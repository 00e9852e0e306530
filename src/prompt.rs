//! System prompt construction.
//!
//! The prompt embeds the context snapshot and a worked example of the
//! command language, which makes the generator's reply far more likely to
//! contain lines the miner can pick up.

use std::fmt::Write as _;

use crate::context::ContextSnapshot;

/// Upper bound on list entries per section.
pub const MAX_PROMPT_ENTRIES: usize = 100;

/// Builds system prompts from context snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBuilder {
    cap: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            cap: MAX_PROMPT_ENTRIES,
        }
    }
}

impl PromptBuilder {
    /// Creates a builder listing at most `cap` entries per section
    /// (never more than [`MAX_PROMPT_ENTRIES`]).
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.clamp(1, MAX_PROMPT_ENTRIES),
        }
    }

    /// Entries listed per section.
    #[must_use]
    pub const fn cap(&self) -> usize {
        self.cap
    }

    /// Renders the system prompt for `context`.
    #[must_use]
    pub fn build(&self, context: &ContextSnapshot) -> String {
        let mut prompt = String::from(
            "You are an assistant for an EDA application. You help users with \
             schematic capture and PCB layout.\n",
        );

        let _ = write!(prompt, "Current context: {} editor.", context.editor_kind);
        if let Some(file) = &context.file_path {
            let _ = write!(prompt, " Working on file: {file}.");
        }
        if let Some(project) = &context.project_path {
            let _ = write!(prompt, " Project path: {project}.");
        }
        prompt.push('\n');

        let placed = context
            .present_refs
            .iter()
            .map(|(reference, symbol)| format!("{reference} ({symbol})"));
        self.section(&mut prompt, "Components in the current design", placed);

        let placed_fps = context
            .present_footprints
            .iter()
            .map(|(reference, footprint)| format!("{reference} ({footprint})"));
        self.section(&mut prompt, "Footprints on the current board", placed_fps);

        self.section(
            &mut prompt,
            "Available symbols (lib:sym)",
            context.symbol_entries(),
        );
        self.section(
            &mut prompt,
            "Available footprints (lib:fp)",
            context.footprint_entries(),
        );

        prompt.push_str(COMMAND_SECTION);
        prompt
    }

    fn section(&self, prompt: &mut String, title: &str, entries: impl Iterator<Item = String>) {
        let mut entries = entries.peekable();
        if entries.peek().is_none() {
            return;
        }

        let _ = writeln!(prompt, "\n{title}:");
        let mut shown = 0;
        let mut hidden = 0;
        for entry in entries {
            if shown < self.cap {
                let _ = writeln!(prompt, "  - {entry}");
                shown += 1;
            } else {
                hidden += 1;
            }
        }
        if hidden > 0 {
            let _ = writeln!(prompt, "  ... and {hidden} more");
        }
    }
}

const COMMAND_SECTION: &str = "
IMPORTANT: When asked to create or modify a circuit, respond with EXECUTABLE COMMANDS, one per line:
  add component <lib>:<sym> at <x>,<y>
  connect <ref>.<pin> to <ref>.<pin>
Coordinates are integers in internal units. Place every component before connecting it.

Example for 'create a 5V voltage regulator':
1. add component Regulator_Linear:LM7805_TO220 at 100000,100000
2. add component Device:C at 50000,100000
3. add component Device:C at 150000,100000
4. connect U1.VI to C1.1
5. connect U1.VO to C2.1
6. connect U1.GND to C1.2
7. connect U1.GND to C2.2

Use the symbols and footprints listed above.
";
