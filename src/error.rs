// SPDX-License-Identifier: MIT
// Typed errors for the event-processing path.

use thiserror::Error;

/// Why an event record was rejected by the reconciler.
///
/// None of these are fatal: the ingest loop logs the diagnostic, drops the
/// event, and keeps processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// A required field (`cmd`, `id`) was missing or empty.
    #[error("event is missing required field `{0}`")]
    MissingField(&'static str),

    /// The `cmd` value is not one of the eight lifecycle commands.
    #[error("unrecognized command `{0}`")]
    UnrecognizedCommand(String),
}
