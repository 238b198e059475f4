#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

mod cancel;
mod client;
mod config;
mod emit;
mod incremental;
mod listing;
mod outcome;
mod run;
mod scope;

pub use cancel::CancelToken;
pub use client::{ApiError, WorkspaceClient};
pub use config::{EnvSnapshot, Settings};
pub use outcome::{to_json_response, CommandStatus, ExecutionOutcome};
pub use run::{export, ExportError, ExportRequest};
pub use scope::{Scope, Warning};
