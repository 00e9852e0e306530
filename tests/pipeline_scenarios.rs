//! End-to-end pipeline tests against the in-memory host.
//!
//! A scripted generator stands in for the HTTP service so that replies,
//! failures and streaming cancellation are deterministic.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use eda_assist::command::PassKey;
use eda_assist::context::{CollectOptions, ContextSnapshot, EditorKind};
use eda_assist::generator::{Generator, GeneratorError, GeneratorResponse};
use eda_assist::host::memory::MemorySchematic;
use eda_assist::host::{
    Commit, Editor, HostError, HostHandle, ItemId, MemoryHost, SchItem, SchPin, SchematicEditor,
    SymbolHandle, SymbolReference,
};
use eda_assist::{Executor, LibraryId, Pipeline, Point};

const DESIGN: &str = include_str!("../demos/psu.json");

fn design() -> MemoryHost {
    serde_json::from_str(DESIGN).unwrap()
}

// =============================================================================
// Scripted generator
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Failure {
    Unreachable,
    Service,
}

struct Scripted {
    available: bool,
    fragments: Vec<String>,
    failure: Option<Failure>,
    model: String,
}

impl Scripted {
    fn replying(text: &str) -> Self {
        Self {
            available: true,
            fragments: vec![text.to_string()],
            failure: None,
            model: "scripted".into(),
        }
    }

    fn streaming(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(ToString::to_string).collect(),
            ..Self::replying("")
        }
    }

    fn offline() -> Self {
        Self {
            available: false,
            ..Self::replying("")
        }
    }

    fn failing(failure: Failure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::replying("")
        }
    }

    fn check(&self) -> Result<(), GeneratorError> {
        match self.failure {
            None => Ok(()),
            Some(Failure::Unreachable) => Err(GeneratorError::Unavailable {
                message: "connection refused".into(),
            }),
            Some(Failure::Service) => Err(GeneratorError::service("model 'scripted' not found")),
        }
    }
}

#[async_trait]
impl Generator for Scripted {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn list_models(&self) -> Result<Vec<String>, GeneratorError> {
        Ok(vec![self.model.clone()])
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, name: &str) {
        self.model = name.to_string();
    }

    async fn generate(
        &self,
        _prompt: &str,
        _context: &ContextSnapshot,
    ) -> Result<GeneratorResponse, GeneratorError> {
        self.check()?;
        Ok(GeneratorResponse::complete(self.fragments.concat()))
    }

    async fn generate_streaming(
        &self,
        _prompt: &str,
        _context: &ContextSnapshot,
        on_chunk: &mut (dyn for<'s> FnMut(&'s str) + Send),
        cancel: &CancellationToken,
    ) -> Result<GeneratorResponse, GeneratorError> {
        self.check()?;
        let mut text = String::new();
        for fragment in &self.fragments {
            if cancel.is_cancelled() {
                return Ok(GeneratorResponse::cancelled(text));
            }
            on_chunk(fragment);
            text.push_str(fragment);
        }
        Ok(GeneratorResponse::complete(text))
    }
}

async fn run(pipeline: &Pipeline, host: &mut MemoryHost, prompt: &str) -> eda_assist::CommandResult {
    let mut handle = host.handle();
    pipeline
        .run(prompt, &mut handle, None, &CancellationToken::new())
        .await
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_bare_placement() {
    let mut host = design();
    let pipeline = Pipeline::default();
    let mut handle = host.handle();

    let result = pipeline.execute_response(
        "add component Device:R at 50000,75000",
        &mut handle,
        &CancellationToken::new(),
    );

    assert!(result.success);
    assert_eq!(
        result.message,
        "Executed 1 command(s):\n\u{2713} add component Device:R at 50000,75000"
    );
    let placed = &host.schematic.symbols[0];
    assert_eq!(placed.lib_id, LibraryId::new("Device", "R"));
    assert_eq!(placed.position, Point::new(50_000, 75_000));
    assert_eq!(host.schematic.commits[0].label, "Place Symbol");
}

#[test]
fn test_case_insensitive_library() {
    let mut host = design();
    let pipeline = Pipeline::default();
    let mut handle = host.handle();

    let result =
        pipeline.execute_response("add component device:r", &mut handle, &CancellationToken::new());

    assert!(result.success, "{result:?}");
    let lib_id = &host.schematic.symbols[0].lib_id;
    assert_eq!(lib_id.nickname, "Device");
    assert_eq!(lib_id.item_name, "R");
}

#[test]
fn test_unknown_library() {
    let mut host = design();
    host.symbol_libraries.0.truncate(2);
    let pipeline = Pipeline::default();
    let mut handle = host.handle();

    let result =
        pipeline.execute_response("add component Foo:Bar", &mut handle, &CancellationToken::new());

    assert!(!result.success);
    assert_eq!(
        result.message,
        "Executed 0 command(s), 1 failed:\n\u{2717} add component Foo:Bar \
         (Library 'Foo' not found. Available libraries: Device,Connector)"
    );
    assert_eq!(result.error.as_deref(), Some("1 command(s) failed"));
    assert!(host.schematic.symbols.is_empty());
}

#[tokio::test]
async fn test_two_phase_ordering() {
    let mut host = design();
    let reply = "connect U1.1 to R1.1\nadd component Device:R\nadd component Device:U";
    let pipeline = Pipeline::default().with_generator(Scripted::replying(reply));
    assert_eq!(pipeline.generator().map(|g| g.model()), Some("scripted"));

    let result = run(&pipeline, &mut host, "build it").await;

    assert!(result.success, "{result:?}");
    assert_eq!(
        result.message,
        format!(
            "Executed 3 command(s):\n\u{2713} add component Device:R\n\u{2713} add component \
             Device:U\n\u{2713} connect U1.1 to R1.1\n\n{reply}"
        )
    );

    let r1 = host.symbol("R1").unwrap();
    let u1 = host.symbol("U1").unwrap();
    assert_eq!(r1.position, Point::new(100_000, 100_000));
    assert_eq!(u1.position, Point::new(100_000, 100_000));

    let wire = &host.schematic.wires[0];
    assert_eq!(wire.start, Point::new(92_380, 100_000));
    assert_eq!(wire.end, Point::new(100_000, 96_190));

    let labels: Vec<_> = host.schematic.commits.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, ["Place Symbol", "Place Symbol", "Draw Wire"]);
}

#[tokio::test]
async fn test_streaming_cancellation() {
    let mut host = design();
    let pipeline =
        Pipeline::default().with_generator(Scripted::streaming(&["add ", "component ", "Device:R"]));
    let cancel = CancellationToken::new();

    let mut seen = Vec::new();
    let stop = cancel.clone();
    let mut on_chunk = |chunk: &str| {
        seen.push(chunk.to_string());
        if seen.len() == 2 {
            stop.cancel();
        }
    };

    let mut handle = host.handle();
    let result = pipeline
        .run("add a resistor", &mut handle, Some(&mut on_chunk), &cancel)
        .await;

    assert!(result.success);
    assert_eq!(result.message, "Request cancelled.");
    assert_eq!(seen, ["add ", "component "]);
    assert!(host.schematic.symbols.is_empty());
    assert!(host.schematic.commits.is_empty());
}

#[tokio::test]
async fn test_pin_alias() {
    let mut host = design();
    {
        let pipeline = Pipeline::default();
        let mut handle = host.handle();
        pipeline.execute_response(
            "add component Regulator_Linear:LM7805_TO220 at 0,0\nadd component Device:C at 20000,0",
            &mut handle,
            &CancellationToken::new(),
        );
    }
    host.schematic.annotate();

    let result = run(&Pipeline::default(), &mut host, "connect U1.P1 to C1.2").await;

    assert!(result.success, "{result:?}");
    assert_eq!(result.message, "Connected U1.P1 to C1.2");
    let wire = &host.schematic.wires[0];
    assert_eq!(wire.start, Point::new(-7620, 0));
    assert_eq!(wire.end, Point::new(20_000, 3810));
}

// =============================================================================
// Degraded paths
// =============================================================================

#[test]
fn test_placement_at_coordinate_limit_fails_cleanly() {
    let mut host = design();
    let pipeline = Pipeline::default();
    let mut handle = host.handle();

    let result = pipeline.execute_response(
        "add component Device:R at 9223372036854775807,9223372036854775807\nconnect R1.2 to R1.1",
        &mut handle,
        &CancellationToken::new(),
    );

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("2 command(s) failed"));
    assert!(result.message.contains("outside the coordinate range"));
    assert!(result.message.contains("Reference 'R1' not found"));
    assert!(host.schematic.symbols.is_empty());
    assert!(host.schematic.wires.is_empty());
}

#[tokio::test]
async fn test_unavailable_generator_parses_prompt() {
    let mut host = design();
    let pipeline = Pipeline::default().with_generator(Scripted::offline());
    assert!(pipeline.generator().is_some());
    assert!(Pipeline::default().generator().is_none());

    let result = run(&pipeline, &mut host, "add component Device:C at 1000,2000").await;

    assert!(result.success);
    assert_eq!(result.message, "Added component 'Device:C' at (1000, 2000)");
    assert!(host.symbol("C1").is_some());
}

#[tokio::test]
async fn test_unreachable_generator_parses_prompt() {
    let mut host = design();
    let pipeline = Pipeline::default().with_generator(Scripted::failing(Failure::Unreachable));

    let result = run(&pipeline, &mut host, "make me a regulator").await;

    assert!(!result.success);
    assert!(result
        .error
        .unwrap()
        .starts_with("Command not recognized or incomplete: unknown command 'make'"));
}

#[tokio::test]
async fn test_service_error_is_reported() {
    let mut host = design();
    let pipeline = Pipeline::default().with_generator(Scripted::failing(Failure::Service));

    let result = run(&pipeline, &mut host, "add component Device:R").await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("generator error: model 'scripted' not found")
    );
    assert!(host.schematic.symbols.is_empty());
}

#[tokio::test]
async fn test_reply_without_commands() {
    let mut host = design();
    let text = "A linear regulator drops the input voltage to a fixed output.";
    let pipeline = Pipeline::default().with_generator(Scripted::replying(text));

    let result = run(&pipeline, &mut host, "what is a regulator?").await;
    assert!(result.success);
    assert_eq!(result.message, text);

    let result = run(&pipeline, &mut host, "add component Device:R at 0,0").await;
    assert!(result.success);
    assert_eq!(
        result.message,
        format!("{text}\n\nAdded component 'Device:R' at (0, 0)")
    );
    assert!(host.symbol("R1").is_some());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let mut host = design();
    let pipeline = Pipeline::default().with_generator(Scripted::replying("add component Device:R"));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut handle = host.handle();
    let result = pipeline.run("add a resistor", &mut handle, None, &cancel).await;

    assert!(result.success);
    assert_eq!(result.message, "Request cancelled.");
    assert!(host.schematic.symbols.is_empty());
}

#[test]
fn test_unparsed_lines_run_last() {
    let mut host = design();
    let pipeline = Pipeline::default();
    let mut handle = host.handle();
    let context = ContextSnapshot::collect(&handle, CollectOptions::default());

    let commands = vec![
        "add component".to_string(),
        "connect R1.1 to R2.2".to_string(),
        "add component Device:R at 0,0".to_string(),
        "add component Device:R at 0,10000".to_string(),
    ];
    let report = pipeline.execute_commands(&commands, &mut handle, &context, &CancellationToken::new());

    let order: Vec<_> = report
        .entries()
        .iter()
        .map(|e| (e.command.as_str(), e.pass))
        .collect();
    assert_eq!(
        order,
        [
            ("add component Device:R at 0,0", PassKey::Placement),
            ("add component Device:R at 0,10000", PassKey::Placement),
            ("connect R1.1 to R2.2", PassKey::Connection),
            ("add component", PassKey::Other),
        ]
    );
    assert_eq!(report.succeeded(), 3);
    assert_eq!(
        report.entries()[3].result.error.as_deref(),
        Some("Command not recognized or incomplete: expected component name")
    );
}

// =============================================================================
// Cancellation between passes
// =============================================================================

/// Raises the cancel token when the pipeline marks the design modified,
/// which happens between the placement and connection passes.
struct CancelOnModify<'a> {
    inner: &'a mut MemorySchematic,
    cancel: CancellationToken,
}

impl SchematicEditor for CancelOnModify<'_> {
    fn file_name(&self) -> Option<String> {
        self.inner.file_name()
    }

    fn current_sheet(&self) -> String {
        self.inner.current_sheet()
    }

    fn reference_list(&self) -> Vec<SymbolReference> {
        self.inner.reference_list()
    }

    fn symbol_pins(&self, handle: SymbolHandle) -> Vec<SchPin> {
        self.inner.symbol_pins(handle)
    }

    fn autoplace_fields(&self) -> bool {
        self.inner.autoplace_fields()
    }

    fn add_to_screen(&mut self, item: SchItem) -> Result<ItemId, HostError> {
        self.inner.add_to_screen(item)
    }

    fn push_commit(&mut self, commit: Commit, label: &str) -> Result<(), HostError> {
        self.inner.push_commit(commit, label)
    }

    fn refresh_canvas(&mut self) {
        self.inner.refresh_canvas();
    }

    fn mark_modified(&mut self) {
        self.inner.mark_modified();
        self.cancel.cancel();
    }
}

#[test]
fn test_cancel_between_passes_skips_connections() {
    let mut host = design();
    let cancel = CancellationToken::new();
    let mut editor = CancelOnModify {
        inner: &mut host.schematic,
        cancel: cancel.clone(),
    };
    let mut handle = HostHandle {
        editor: Editor::Schematic(&mut editor),
        project_path: None,
        symbol_libraries: &host.symbol_libraries,
        footprint_libraries: None,
    };
    assert_eq!(handle.editor_kind(), EditorKind::Schematic);

    let pipeline = Pipeline::new(Executor::default());
    let context = ContextSnapshot::collect(&handle, CollectOptions::default());
    let commands = [
        "add component Device:R at 0,0",
        "connect R1.1 to R1.2",
        "add component Device:C at 0,5000",
    ]
    .map(String::from);
    let report = pipeline.execute_commands(&commands, &mut handle, &context, &cancel);
    assert!(report.was_cancelled());
    assert_eq!(report.failed(), 0);
    let result = report.into_result(None);

    assert!(result.success);
    assert_eq!(
        result.message,
        "Executed 2 command(s):\n\u{2713} add component Device:R at 0,0\n\u{2713} add component \
         Device:C at 0,5000\n\nRequest cancelled."
    );
    assert_eq!(host.schematic.symbols.len(), 2);
    assert!(host.schematic.wires.is_empty());
    assert_eq!(host.schematic.modified, 1);
}
