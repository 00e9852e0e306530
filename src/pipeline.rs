//! Top-level orchestration of one user request.
//!
//! A run snapshots the host, asks the generator for a reply, mines command
//! lines out of it and executes them in two passes: every placement first,
//! then every connection, then everything else. Symbols placed in the first
//! pass are annotated before the second pass resolves references against
//! them.
//!
//! Cancellation is checked before each pass and before each action. An
//! action that has started always runs to completion.

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{mine, parse, Action, ParseDiagnostic, PassKey};
use crate::context::{CollectOptions, ContextSnapshot};
use crate::error::ActionError;
use crate::executor::{CommandResult, Executor};
use crate::generator::Generator;
use crate::host::HostHandle;

/// Message returned when a request is cancelled before anything ran.
pub const CANCELLED_MESSAGE: &str = "Request cancelled.";

/// Error returned by [`Pipeline::execute_response`] when nothing was mined.
pub const NO_COMMANDS_MESSAGE: &str = "No commands found in response";

const PASSES: [PassKey; 3] = [PassKey::Placement, PassKey::Connection, PassKey::Other];

/// One executed command line and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Command text as mined.
    pub command: String,
    /// Pass the command ran in.
    pub pass: PassKey,
    /// Outcome of the command.
    pub result: CommandResult,
}

/// Per-command log of a run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    entries: Vec<ReportEntry>,
    cancelled: bool,
}

impl RunReport {
    /// Entries in execution order.
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Number of successful commands.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.result.success).count()
    }

    /// Number of failed commands.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    /// Whether cancellation cut the run short.
    #[must_use]
    pub const fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Folds the report into a single result, appending `explanation`.
    #[must_use]
    pub fn into_result(self, explanation: Option<&str>) -> CommandResult {
        if self.entries.is_empty() && self.cancelled {
            return CommandResult::ok(CANCELLED_MESSAGE);
        }

        let mut message = self.to_string();
        if let Some(text) = explanation.filter(|t| !t.trim().is_empty()) {
            message.push_str("\n\n");
            message.push_str(text);
        }

        let failed = self.failed();
        CommandResult {
            success: failed == 0,
            message,
            error: (failed > 0).then(|| format!("{failed} command(s) failed")),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Executed {} command(s)", self.succeeded())?;
        let failed = self.failed();
        if failed > 0 {
            write!(f, ", {failed} failed")?;
        }
        f.write_str(":")?;

        for entry in &self.entries {
            match (entry.result.success, &entry.result.error) {
                (true, _) => write!(f, "\n\u{2713} {}", entry.command)?,
                (false, Some(error)) => write!(f, "\n\u{2717} {} ({error})", entry.command)?,
                (false, None) => write!(f, "\n\u{2717} {}", entry.command)?,
            }
        }

        if self.cancelled {
            write!(f, "\n\n{CANCELLED_MESSAGE}")?;
        }
        Ok(())
    }
}

/// Drives requests from prompt to executed edits.
pub struct Pipeline {
    generator: Option<Box<dyn Generator>>,
    executor: Executor,
    collect: CollectOptions,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Executor::default())
    }
}

impl Pipeline {
    /// Creates an offline pipeline: prompts are parsed as commands directly.
    #[must_use]
    pub fn new(executor: Executor) -> Self {
        Self {
            generator: None,
            executor,
            collect: CollectOptions::default(),
        }
    }

    /// Routes prompts through `generator`.
    #[must_use]
    pub fn with_generator(mut self, generator: impl Generator + 'static) -> Self {
        self.generator = Some(Box::new(generator));
        self
    }

    /// Sets how the context snapshot is collected.
    #[must_use]
    pub fn with_collect_options(mut self, options: CollectOptions) -> Self {
        self.collect = options;
        self
    }

    /// The generator, if one is attached.
    #[must_use]
    pub fn generator(&self) -> Option<&dyn Generator> {
        self.generator.as_deref()
    }

    /// Handles one user prompt.
    ///
    /// With `on_chunk`, the reply is streamed and each fragment is passed to
    /// the callback as it arrives. If the generator is missing, unreachable
    /// or times out, the prompt itself is parsed as a command.
    pub async fn run(
        &self,
        prompt: &str,
        host: &mut HostHandle<'_>,
        on_chunk: Option<&mut (dyn FnMut(&str) + Send)>,
        cancel: &CancellationToken,
    ) -> CommandResult {
        if cancel.is_cancelled() {
            return CommandResult::ok(CANCELLED_MESSAGE);
        }

        let context = ContextSnapshot::collect(host, self.collect);
        debug!(
            editor = %context.editor_kind,
            symbols = context.present_refs.len(),
            libraries = context.symbol_libs.len(),
            "Collected context"
        );

        let Some(generator) = self.generator.as_deref() else {
            return self.execute_direct(prompt, host, &context);
        };

        if !generator.is_available().await {
            info!("Generator unavailable, parsing prompt directly");
            return self.execute_direct(prompt, host, &context);
        }

        let reply = match on_chunk {
            Some(on_chunk) => {
                generator
                    .generate_streaming(prompt, &context, on_chunk, cancel)
                    .await
            }
            None => generator.generate(prompt, &context).await,
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, "Generator request failed, parsing prompt directly");
                return self.execute_direct(prompt, host, &context);
            }
            Err(e) => return CommandResult::failed(e.to_string()),
        };

        if !reply.complete || cancel.is_cancelled() {
            info!(received = reply.text.len(), "Request cancelled");
            return CommandResult::ok(CANCELLED_MESSAGE);
        }

        let commands = mine(&reply.text);
        info!(commands = commands.len(), "Mined generator reply");

        if commands.is_empty() {
            if parse(prompt.trim()).is_ok() {
                let direct = self.execute_direct(prompt, host, &context);
                if direct.success {
                    return CommandResult::ok(format!("{}\n\n{}", reply.text, direct.message));
                }
            }
            return CommandResult::ok(reply.text);
        }

        self.execute_commands(&commands, host, &context, cancel)
            .into_result(Some(&reply.text))
    }

    /// Mines and executes a reply produced elsewhere.
    pub fn execute_response(
        &self,
        text: &str,
        host: &mut HostHandle<'_>,
        cancel: &CancellationToken,
    ) -> CommandResult {
        let commands = mine(text);
        if commands.is_empty() {
            return CommandResult::failed(NO_COMMANDS_MESSAGE);
        }
        let context = ContextSnapshot::collect(host, self.collect);
        self.execute_commands(&commands, host, &context, cancel)
            .into_result(None)
    }

    /// Parses and executes command lines in pass order.
    ///
    /// Lines that do not parse are reported as failures after the last pass.
    pub fn execute_commands(
        &self,
        commands: &[String],
        host: &mut HostHandle<'_>,
        context: &ContextSnapshot,
        cancel: &CancellationToken,
    ) -> RunReport {
        let parsed: Vec<(&str, Result<Action, ParseDiagnostic>)> = commands
            .iter()
            .map(|line| (line.as_str(), parse(line)))
            .collect();

        let mut report = RunReport::default();
        let mut placed = 0usize;

        'passes: for pass in PASSES {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            if pass == PassKey::Connection && placed > 0 {
                debug!(placed, "Marking design modified before connections");
                host.mark_modified();
            }

            let in_pass = parsed.iter().filter(|(_, action)| {
                action.as_ref().map_or(PassKey::Other, Action::pass) == pass
            });

            for (line, action) in in_pass {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'passes;
                }

                let result = match action {
                    Ok(action) => self.executor.execute(action, host, context),
                    Err(diagnostic) => {
                        debug!(line, %diagnostic, "Unparsed command");
                        CommandResult::failed(ActionError::ParseFailed(diagnostic.clone()).to_string())
                    }
                };
                if pass == PassKey::Placement && result.success {
                    placed += 1;
                }
                report.entries.push(ReportEntry {
                    command: (*line).to_string(),
                    pass,
                    result,
                });
            }
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled = report.cancelled,
            "Executed commands"
        );
        report
    }

    fn execute_direct(
        &self,
        prompt: &str,
        host: &mut HostHandle<'_>,
        context: &ContextSnapshot,
    ) -> CommandResult {
        match parse(prompt.trim()) {
            Ok(action) => {
                let result = self.executor.execute(&action, host, context);
                if action.pass() == PassKey::Placement && result.success {
                    host.mark_modified();
                }
                result
            }
            Err(diagnostic) => {
                CommandResult::failed(ActionError::ParseFailed(diagnostic).to_string())
            }
        }
    }
}
