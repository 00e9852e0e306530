//! Error types for eda-assist.
//!
//! Action errors are never propagated out of the executor: their `Display`
//! text becomes the `error` field of the action's `CommandResult`, so the
//! wording here is what the user reads.

use std::path::PathBuf;

use thiserror::Error;

use crate::command::ParseDiagnostic;
use crate::context::EditorKind;
use crate::host::HostError;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors from executing a single action.
#[derive(Error, Debug)]
pub enum ActionError {
    /// The action is not available in the active editor.
    #[error("'{action}' is only available in the {expected} (current editor: {actual})")]
    NotInExpectedEditor {
        /// Command verb phrase.
        action: String,
        /// Editor(s) the action needs.
        expected: String,
        /// Active editor.
        actual: EditorKind,
    },

    /// The line is not a complete command.
    #[error("Command not recognized or incomplete: {0}")]
    ParseFailed(#[from] ParseDiagnostic),

    /// No library row matches the requested nickname.
    #[error(
        "Library '{nickname}' not found. Available libraries: {}",
        available_list(.available)
    )]
    LibraryNotFound {
        /// Nickname as typed.
        nickname: String,
        /// Nicknames of the library table.
        available: Vec<String>,
    },

    /// No library contains the requested symbol.
    #[error("Component '{name}' not found")]
    SymbolNotFound {
        /// Symbol name as typed.
        name: String,
    },

    /// The library row exists but the symbol could not be loaded.
    #[error(
        "Failed to place component '{name}' (library: {nickname}, symbol: {symbol}). \
         Check that the library is loaded and the symbol exists."
    )]
    SymbolLoadFailed {
        /// Identifier as typed.
        name: String,
        /// Resolved library nickname.
        nickname: String,
        /// Symbol name that was tried.
        symbol: String,
    },

    /// No placed symbol has the reference designator.
    #[error("Reference '{reference}' not found")]
    ReferenceNotFound {
        /// Reference designator as typed.
        reference: String,
    },

    /// The symbol has no pin with that name or number.
    #[error("pin '{pin}' not found on {reference}")]
    PinNotFound {
        /// Pin as typed.
        pin: String,
        /// Reference designator of the symbol.
        reference: String,
    },

    /// The host rejected the edit.
    #[error("host edit failed: {0}")]
    HostEditFailed(#[from] HostError),
}

impl ActionError {
    /// Creates an editor mismatch error.
    pub fn wrong_editor(
        action: impl Into<String>,
        expected: impl Into<String>,
        actual: EditorKind,
    ) -> Self {
        Self::NotInExpectedEditor {
            action: action.into(),
            expected: expected.into(),
            actual,
        }
    }

    /// Creates a reference lookup error.
    pub fn reference_not_found(reference: impl Into<String>) -> Self {
        Self::ReferenceNotFound {
            reference: reference.into(),
        }
    }

    /// Creates a pin lookup error.
    pub fn pin_not_found(pin: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::PinNotFound {
            pin: pin.into(),
            reference: reference.into(),
        }
    }
}

fn available_list(available: &[String]) -> String {
    if available.is_empty() {
        "(none - check the symbol library table)".to_string()
    } else {
        available.join(",")
    }
}
